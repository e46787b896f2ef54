use chrono::{DateTime, Utc};
use data_encoding::{BASE32_NOPAD, HEXLOWER};
use hmac::{Hmac, Mac};
use rand::{CryptoRng, RngCore};
use serde::{Deserialize, Serialize};
use sha2::Sha256;

use super::VoteRecord;
use crate::error::{Error, Result};
use crate::model::common::{
    election::{ElectionId, PositionId},
    VoteHash,
};

pub type HmacSha256 = Hmac<Sha256>;

/// Proof handed to a voter that their vote was recorded.
///
/// The receipt does not say who the vote was for, only that a vote with this hash
/// exists. The voter can later check it against [`crate::Ledger::verify_receipt`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Receipt {
    /// Human-friendly reference for the receipt.
    pub receipt_number: String,
    pub vote_hash: VoteHash,
    pub election_id: ElectionId,
    pub position_id: PositionId,
    pub issued_at: DateTime<Utc>,
    /// Hex HMAC-SHA256 over the other fields.
    pub signature: String,
}

impl Receipt {
    /// The bytes covered by the signature.
    fn message(&self) -> Vec<u8> {
        let mut msg = Vec::new();
        for field in [
            self.receipt_number.as_bytes(),
            self.vote_hash.as_ref(),
            self.election_id.as_bytes(),
            self.position_id.as_bytes(),
        ] {
            msg.extend((field.len() as u64).to_le_bytes());
            msg.extend(field);
        }
        msg.extend(self.issued_at.timestamp_micros().to_le_bytes());
        msg
    }
}

/// Signs and checks receipts with a secret key.
#[derive(Clone)]
pub struct ReceiptIssuer {
    secret: Vec<u8>,
}

impl ReceiptIssuer {
    pub fn new(secret: impl Into<Vec<u8>>) -> Self {
        Self {
            secret: secret.into(),
        }
    }

    /// An issuer with a random key. Its receipts cannot be verified after a restart.
    pub fn random(mut rng: impl RngCore + CryptoRng) -> Self {
        let mut secret = vec![0; 32];
        rng.fill_bytes(&mut secret);
        Self { secret }
    }

    fn mac(&self) -> HmacSha256 {
        match HmacSha256::new_from_slice(&self.secret) {
            Ok(mac) => mac,
            Err(_) => unreachable!("HMAC can take a key of any size"),
        }
    }

    /// Issue a receipt for a recorded vote.
    pub fn issue(&self, record: &VoteRecord, rng: impl RngCore + CryptoRng) -> Receipt {
        let mut receipt = Receipt {
            receipt_number: receipt_number(record, rng),
            vote_hash: record.hash,
            election_id: record.election_id.clone(),
            position_id: record.position_id.clone(),
            issued_at: record.timestamp,
            signature: String::new(),
        };
        let mut mac = self.mac();
        mac.update(&receipt.message());
        receipt.signature = HEXLOWER.encode(&mac.finalize().into_bytes());
        receipt
    }

    /// Check the receipt was signed by this issuer and has not been altered.
    pub fn verify(&self, receipt: &Receipt) -> Result<()> {
        let invalid = || Error::InvalidReceipt(receipt.vote_hash);
        let signature = HEXLOWER
            .decode(receipt.signature.as_bytes())
            .map_err(|_| invalid())?;
        let mut mac = self.mac();
        mac.update(&receipt.message());
        mac.verify_slice(&signature).map_err(|_| invalid())
    }
}

impl std::fmt::Debug for ReceiptIssuer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReceiptIssuer").finish_non_exhaustive()
    }
}

/// A short random reference, prefixed with the first bytes of the vote hash so
/// receipts for the same vote are easy to match up by eye.
fn receipt_number(record: &VoteRecord, mut rng: impl RngCore + CryptoRng) -> String {
    let mut bytes = [0; 10];
    bytes[..3].copy_from_slice(&record.hash.as_bytes()[..3]);
    rng.fill_bytes(&mut bytes[3..]);
    BASE32_NOPAD.encode(&bytes)
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use rand::{rngs::StdRng, SeedableRng};

    use super::*;

    fn record() -> VoteRecord {
        VoteRecord {
            hash: VoteHash::new([0xA1; 32]),
            election_id: "E1".to_string(),
            position_id: "P1".to_string(),
            candidate_id: "C1".to_string(),
            voter: "V1".into(),
            timestamp: Utc.with_ymd_and_hms(2030, 1, 1, 9, 10, 0).unwrap(),
            seq: 9,
        }
    }

    #[test]
    fn issued_receipts_verify() {
        let issuer = ReceiptIssuer::new("secret");
        let receipt = issuer.issue(&record(), StdRng::seed_from_u64(1));
        assert_eq!(receipt.receipt_number.len(), 16);
        assert_eq!(receipt.signature.len(), 64);
        assert_eq!(issuer.verify(&receipt), Ok(()));

        // Survives a JSON round trip, as a voter would store it.
        let json = serde_json::to_string(&receipt).unwrap();
        let parsed: Receipt = serde_json::from_str(&json).unwrap();
        assert_eq!(issuer.verify(&parsed), Ok(()));
    }

    #[test]
    fn forged_receipts_fail() {
        let issuer = ReceiptIssuer::new("secret");
        let receipt = issuer.issue(&record(), StdRng::seed_from_u64(1));
        let invalid = Err(Error::InvalidReceipt(receipt.vote_hash));

        let mut forged = receipt.clone();
        forged.position_id = "P2".to_string();
        assert_eq!(issuer.verify(&forged), invalid);

        let mut forged = receipt.clone();
        forged.signature = "not hex".to_string();
        assert_eq!(issuer.verify(&forged), invalid);

        assert_eq!(ReceiptIssuer::new("other").verify(&receipt), invalid);
        assert!(ReceiptIssuer::random(StdRng::seed_from_u64(2))
            .verify(&receipt)
            .is_err());
    }
}
