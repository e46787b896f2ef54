mod state;

pub use state::ElectionState;

use serde::{Deserialize, Serialize};

/// Election IDs are chosen by the creating administrator.
pub type ElectionId = String;
/// Position IDs are unique within their election.
pub type PositionId = String;
/// Candidate IDs are unique within their position.
pub type CandidateId = String;

/// Flat key for a position: positions are not nested inside their election.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PositionKey {
    pub election_id: ElectionId,
    pub position_id: PositionId,
}

impl PositionKey {
    pub fn new(election_id: impl Into<ElectionId>, position_id: impl Into<PositionId>) -> Self {
        Self {
            election_id: election_id.into(),
            position_id: position_id.into(),
        }
    }

    /// Extend this key down to a candidate of the position.
    pub fn candidate(&self, candidate_id: impl Into<CandidateId>) -> CandidateKey {
        CandidateKey {
            election_id: self.election_id.clone(),
            position_id: self.position_id.clone(),
            candidate_id: candidate_id.into(),
        }
    }
}

/// Flat key for a candidate.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CandidateKey {
    pub election_id: ElectionId,
    pub position_id: PositionId,
    pub candidate_id: CandidateId,
}

impl CandidateKey {
    pub fn new(
        election_id: impl Into<ElectionId>,
        position_id: impl Into<PositionId>,
        candidate_id: impl Into<CandidateId>,
    ) -> Self {
        Self {
            election_id: election_id.into(),
            position_id: position_id.into(),
            candidate_id: candidate_id.into(),
        }
    }
}
