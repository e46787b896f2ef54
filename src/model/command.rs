use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::common::{
    election::{CandidateId, CandidateKey, ElectionId, PositionId, PositionKey},
    Identity, Role, VoteHash,
};
use super::election::{CandidateSpec, ElectionSpec, PositionSpec};

/// A vote as submitted by a voter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BallotSpec {
    pub election_id: ElectionId,
    pub position_id: PositionId,
    pub candidate_id: CandidateId,
    pub vote_hash: VoteHash,
}

impl BallotSpec {
    pub fn candidate(&self) -> CandidateKey {
        CandidateKey::new(
            self.election_id.clone(),
            self.position_id.clone(),
            self.candidate_id.clone(),
        )
    }
}

/// Every state-changing operation the ledger accepts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op")]
pub enum Command {
    /// Fix the root authority. Always the first transition, and only that.
    Genesis { root: Identity },
    CreateElection(ElectionSpec),
    AddPosition {
        election_id: ElectionId,
        position: PositionSpec,
    },
    RegisterCandidate {
        position: PositionKey,
        candidate: CandidateSpec,
    },
    WithdrawCandidate(CandidateKey),
    StartElection { election_id: ElectionId },
    EndElection { election_id: ElectionId },
    PublishResults { election_id: ElectionId },
    GrantRole { identity: Identity, role: Role },
    RevokeRole { identity: Identity, role: Role },
    RegisterVoter { identity: Identity },
    RevokeVoter { identity: Identity },
    Pause,
    Unpause,
    CastVote(BallotSpec),
}

impl Command {
    /// Short name of the command, for logging.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Genesis { .. } => "genesis",
            Self::CreateElection(_) => "createElection",
            Self::AddPosition { .. } => "addPosition",
            Self::RegisterCandidate { .. } => "registerCandidate",
            Self::WithdrawCandidate(_) => "withdrawCandidate",
            Self::StartElection { .. } => "startElection",
            Self::EndElection { .. } => "endElection",
            Self::PublishResults { .. } => "publishResults",
            Self::GrantRole { .. } => "grantRole",
            Self::RevokeRole { .. } => "revokeRole",
            Self::RegisterVoter { .. } => "registerVoter",
            Self::RevokeVoter { .. } => "revokeVoter",
            Self::Pause => "pause",
            Self::Unpause => "unpause",
            Self::CastVote(_) => "castVote",
        }
    }
}

/// A command stamped with everything needed to apply it deterministically.
/// Transitions are what the journal stores and what replay re-applies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transition {
    pub seq: u64,
    pub at: DateTime<Utc>,
    pub caller: Identity,
    pub command: Command,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_shape() {
        let command = Command::StartElection {
            election_id: "E1".to_string(),
        };
        assert_eq!(
            serde_json::to_value(&command).unwrap(),
            serde_json::json!({"op": "StartElection", "election_id": "E1"})
        );

        let command = Command::WithdrawCandidate(CandidateKey::new("E1", "P1", "C1"));
        let json = serde_json::to_string(&command).unwrap();
        assert_eq!(serde_json::from_str::<Command>(&json).unwrap(), command);
        assert_eq!(
            serde_json::from_str::<Command>(r#"{"op":"Pause"}"#).unwrap(),
            Command::Pause
        );
    }
}
