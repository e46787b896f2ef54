use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::common::{
    election::{CandidateId, CandidateKey, ElectionId, PositionId},
    Identity, VoteHash,
};

/// A cast vote. Never modified once recorded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteRecord {
    pub hash: VoteHash,
    pub election_id: ElectionId,
    pub position_id: PositionId,
    pub candidate_id: CandidateId,
    pub voter: Identity,
    pub timestamp: DateTime<Utc>,
    /// Sequence number of the transition that recorded this vote.
    pub seq: u64,
}

impl VoteRecord {
    pub fn candidate(&self) -> CandidateKey {
        CandidateKey::new(
            self.election_id.clone(),
            self.position_id.clone(),
            self.candidate_id.clone(),
        )
    }

    pub fn voter_key(&self) -> VoterKey {
        VoterKey {
            voter: self.voter.clone(),
            election_id: self.election_id.clone(),
            position_id: self.position_id.clone(),
        }
    }
}

/// Key of the has-voted index: one vote per voter per position.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VoterKey {
    pub voter: Identity,
    pub election_id: ElectionId,
    pub position_id: PositionId,
}
