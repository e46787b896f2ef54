use std::fmt::{Debug, Display, Formatter};
use std::str::FromStr;

use data_encoding::HEXLOWER_PERMISSIVE;
use serde::{de::Error as _, Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};
use thiserror::Error;

use super::Identity;

/// Width of a vote hash in bytes.
pub const VOTE_HASH_LEN: usize = 32;

/// Opaque, caller-supplied identifier of a single ballot.
///
/// The ledger only requires these to be non-zero and globally unique; callers are
/// expected to derive them deterministically from ballot content so that resubmitting
/// the same ballot is rejected as a replay. [`VoteHash::for_ballot`] is one such
/// derivation.
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VoteHash([u8; VOTE_HASH_LEN]);

impl VoteHash {
    /// The all-zero hash, treated as "no hash".
    pub const ZERO: Self = Self([0; VOTE_HASH_LEN]);

    pub const fn new(bytes: [u8; VOTE_HASH_LEN]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; VOTE_HASH_LEN] {
        &self.0
    }

    /// Is this the empty (all-zero) hash?
    pub fn is_empty(&self) -> bool {
        *self == Self::ZERO
    }

    /// Derive a hash from ballot content: SHA-256 over the length-prefixed fields
    /// and a caller-chosen nonce.
    pub fn for_ballot(
        election_id: &str,
        position_id: &str,
        candidate_id: &str,
        voter: &Identity,
        nonce: &[u8],
    ) -> Self {
        let mut hasher = Sha256::new();
        for field in [
            election_id.as_bytes(),
            position_id.as_bytes(),
            candidate_id.as_bytes(),
            voter.as_ref(),
            nonce,
        ] {
            hasher.update((field.len() as u64).to_be_bytes());
            hasher.update(field);
        }
        Self(hasher.finalize().into())
    }

    /// Lower-case hex representation.
    pub fn to_hex(&self) -> String {
        data_encoding::HEXLOWER.encode(&self.0)
    }
}

impl From<[u8; VOTE_HASH_LEN]> for VoteHash {
    fn from(bytes: [u8; VOTE_HASH_LEN]) -> Self {
        Self(bytes)
    }
}

impl AsRef<[u8]> for VoteHash {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl Display for VoteHash {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl Debug for VoteHash {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "VoteHash({})", self.to_hex())
    }
}

/// Errors from parsing a hex vote hash.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VoteHashParseError {
    #[error("Invalid hex: {0}")]
    Hex(String),
    #[error("Expected {VOTE_HASH_LEN} bytes, got {0}")]
    Length(usize),
}

impl FromStr for VoteHash {
    type Err = VoteHashParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.strip_prefix("0x").unwrap_or(s);
        let bytes = HEXLOWER_PERMISSIVE
            .decode(s.as_bytes())
            .map_err(|e| VoteHashParseError::Hex(e.to_string()))?;
        let bytes: [u8; VOTE_HASH_LEN] = bytes
            .try_into()
            .map_err(|b: Vec<u8>| VoteHashParseError::Length(b.len()))?;
        Ok(Self(bytes))
    }
}

impl Serialize for VoteHash {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for VoteHash {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(D::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_parse_and_display() {
        let hash = VoteHash::new([0xAA; VOTE_HASH_LEN]);
        let hex = hash.to_string();
        assert_eq!(hex.len(), 64);
        assert_eq!(hex.parse::<VoteHash>(), Ok(hash));
        assert_eq!(format!("0x{hex}").parse::<VoteHash>(), Ok(hash));
        assert_eq!(hex.to_uppercase().parse::<VoteHash>(), Ok(hash));

        assert_eq!("abcd".parse::<VoteHash>(), Err(VoteHashParseError::Length(2)));
        assert!(matches!(
            "zz".repeat(32).parse::<VoteHash>(),
            Err(VoteHashParseError::Hex(_))
        ));
    }

    #[test]
    fn serde_as_string() {
        let hash = VoteHash::new([7; VOTE_HASH_LEN]);
        let json = serde_json::to_string(&hash).unwrap();
        assert_eq!(json, format!("\"{}\"", "07".repeat(32)));
        assert_eq!(serde_json::from_str::<VoteHash>(&json).unwrap(), hash);
    }

    #[test]
    fn ballot_derivation() {
        let voter = Identity::from("V1");
        let a = VoteHash::for_ballot("E1", "P1", "C1", &voter, b"nonce");
        let b = VoteHash::for_ballot("E1", "P1", "C1", &voter, b"nonce");
        let c = VoteHash::for_ballot("E1", "P1", "C2", &voter, b"nonce");
        // Field boundaries matter.
        let d = VoteHash::for_ballot("E1P", "1", "C1", &voter, b"nonce");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_ne!(a, d);
        assert!(!a.is_empty());
        assert!(VoteHash::ZERO.is_empty());
    }
}
