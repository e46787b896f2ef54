use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::journal::JournalError;
use crate::model::common::{
    election::{CandidateId, ElectionId, ElectionState, PositionId},
    Authority, Identity, Role, VoteHash,
};

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Every way a ledger operation can be rejected.
///
/// Errors are returned before any state is written, so a rejected operation never
/// leaves a partial transition behind.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    // Authorization
    #[error("Unauthorized: {identity} must be {required}")]
    Unauthorized {
        identity: Identity,
        required: Authority,
    },
    #[error("{identity} does not hold role {role}")]
    NotRegistered { identity: Identity, role: Role },

    // Not found
    #[error("Election {0} not found")]
    ElectionNotFound(ElectionId),
    #[error("Position {position_id} not found in election {election_id}")]
    PositionNotFound {
        election_id: ElectionId,
        position_id: PositionId,
    },
    #[error("No active candidate {candidate_id} for {position_id} in election {election_id}")]
    InvalidCandidate {
        election_id: ElectionId,
        position_id: PositionId,
        candidate_id: CandidateId,
    },
    #[error("No vote with hash {0}")]
    VoteNotFound(VoteHash),

    // State conflict
    #[error("Election {0} already exists")]
    DuplicateElection(ElectionId),
    #[error("Position {position_id} already exists in election {election_id}")]
    DuplicatePosition {
        election_id: ElectionId,
        position_id: PositionId,
    },
    #[error("Candidate {candidate_id} already registered for position {position_id}")]
    DuplicateCandidate {
        position_id: PositionId,
        candidate_id: CandidateId,
    },
    #[error("Election {id} is {state} and can no longer be edited")]
    ElectionNotEditable { id: ElectionId, state: ElectionState },
    #[error("Election {id} has already been started (currently {state})")]
    AlreadyActive { id: ElectionId, state: ElectionState },
    #[error("Election {id} is {state}, not Active")]
    NotActive { id: ElectionId, state: ElectionState },
    #[error("Election {0} has not ended yet")]
    ElectionNotEnded(ElectionId),
    #[error("Election {0} is still active")]
    ElectionStillActive(ElectionId),
    #[error("Results for election {0} have already been published")]
    AlreadyPublished(ElectionId),
    #[error("Voting is not open for election {0}")]
    VotingNotOpen(ElectionId),
    #[error("{voter} has already voted for position {position_id} in election {election_id}")]
    AlreadyVoted {
        voter: Identity,
        election_id: ElectionId,
        position_id: PositionId,
    },
    #[error("Vote hash {0} has already been used")]
    DuplicateVoteHash(VoteHash),
    #[error("{identity} already holds role {role}")]
    AlreadyRegistered { identity: Identity, role: Role },
    #[error("Cannot revoke Administrator from {0}, the last administrator")]
    LastAdministrator(Identity),
    #[error("Candidate {0} has already been withdrawn")]
    CandidateWithdrawn(CandidateId),
    #[error("The ledger is already paused")]
    AlreadyPaused,
    #[error("The ledger is not paused")]
    NotPaused,
    #[error("The ledger has already been initialised")]
    AlreadyInitialized,

    // Validation
    #[error("Invalid time range {start} to {end}: must be ordered and end in the future")]
    InvalidTimeRange {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },
    #[error("Election {id} cannot start before {start_time}")]
    TooEarly {
        id: ElectionId,
        start_time: DateTime<Utc>,
    },
    #[error("Election {0} has no positions")]
    NoPositions(ElectionId),
    #[error("{0} must be at least 1")]
    InvalidSeats(&'static str),
    #[error("{0} must not be empty")]
    EmptyField(&'static str),
    #[error("Receipt for vote {0} has an invalid signature")]
    InvalidReceipt(VoteHash),

    // Availability
    #[error("The ledger is paused")]
    SystemPaused,

    // Storage
    #[error(transparent)]
    Journal(#[from] JournalError),
}

/// Broad classes of [`Error`], for callers that map errors onto their own responses.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    Authorization,
    NotFound,
    StateConflict,
    Validation,
    Availability,
    Storage,
}

impl Error {
    pub fn category(&self) -> ErrorCategory {
        use ErrorCategory::*;
        match self {
            Self::Unauthorized { .. } | Self::NotRegistered { .. } => Authorization,
            Self::ElectionNotFound(_)
            | Self::PositionNotFound { .. }
            | Self::InvalidCandidate { .. }
            | Self::VoteNotFound(_) => NotFound,
            Self::DuplicateElection(_)
            | Self::DuplicatePosition { .. }
            | Self::DuplicateCandidate { .. }
            | Self::ElectionNotEditable { .. }
            | Self::AlreadyActive { .. }
            | Self::NotActive { .. }
            | Self::ElectionNotEnded(_)
            | Self::ElectionStillActive(_)
            | Self::AlreadyPublished(_)
            | Self::VotingNotOpen(_)
            | Self::AlreadyVoted { .. }
            | Self::DuplicateVoteHash(_)
            | Self::AlreadyRegistered { .. }
            | Self::LastAdministrator(_)
            | Self::CandidateWithdrawn(_)
            | Self::AlreadyPaused
            | Self::NotPaused
            | Self::AlreadyInitialized => StateConflict,
            Self::InvalidTimeRange { .. }
            | Self::TooEarly { .. }
            | Self::NoPositions(_)
            | Self::InvalidSeats(_)
            | Self::EmptyField(_)
            | Self::InvalidReceipt(_) => Validation,
            Self::SystemPaused => Availability,
            Self::Journal(_) => Storage,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn categories() {
        assert_eq!(
            Error::Unauthorized {
                identity: "V1".into(),
                required: Authority::Role(Role::Administrator),
            }
            .category(),
            ErrorCategory::Authorization
        );
        assert_eq!(
            Error::VoteNotFound(VoteHash::ZERO).category(),
            ErrorCategory::NotFound
        );
        assert_eq!(
            Error::VotingNotOpen("E1".into()).category(),
            ErrorCategory::StateConflict
        );
        assert_eq!(
            Error::EmptyField("identity").category(),
            ErrorCategory::Validation
        );
        assert_eq!(Error::SystemPaused.category(), ErrorCategory::Availability);
        assert_eq!(
            Error::from(JournalError::BrokenChain { seq: 3 }).category(),
            ErrorCategory::Storage
        );
    }

    #[test]
    fn messages() {
        let err = Error::Unauthorized {
            identity: "V1".into(),
            required: Authority::Either(Role::Auditor, Role::Administrator),
        };
        assert_eq!(
            err.to_string(),
            "Unauthorized: V1 must be Auditor or Administrator"
        );
        assert_eq!(
            Error::InvalidSeats("availableSeats").to_string(),
            "availableSeats must be at least 1"
        );
    }
}
