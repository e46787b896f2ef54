use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use super::common::{
    election::{CandidateId, ElectionId, PositionId},
    Identity, Role, VoteHash,
};

/// Domain events, one per committed transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum LedgerEvent {
    LedgerInitialized {
        root: Identity,
    },
    ElectionCreated {
        election_id: ElectionId,
        title: String,
    },
    PositionAdded {
        election_id: ElectionId,
        position_id: PositionId,
    },
    CandidateRegistered {
        election_id: ElectionId,
        position_id: PositionId,
        candidate_id: CandidateId,
        ballot_number: u32,
    },
    CandidateWithdrawn {
        election_id: ElectionId,
        position_id: PositionId,
        candidate_id: CandidateId,
    },
    ElectionStarted {
        election_id: ElectionId,
    },
    ElectionEnded {
        election_id: ElectionId,
    },
    ResultsPublished {
        election_id: ElectionId,
        total_votes: u64,
    },
    VoteCast {
        election_id: ElectionId,
        position_id: PositionId,
        vote_hash: VoteHash,
    },
    VoterRegistered {
        identity: Identity,
    },
    VoterRevoked {
        identity: Identity,
    },
    RoleGranted {
        identity: Identity,
        role: Role,
    },
    RoleRevoked {
        identity: Identity,
        role: Role,
    },
    Paused,
    Unpaused,
}

impl LedgerEvent {
    /// The election this event concerns, if any.
    pub fn election_id(&self) -> Option<&str> {
        match self {
            Self::ElectionCreated { election_id, .. }
            | Self::PositionAdded { election_id, .. }
            | Self::CandidateRegistered { election_id, .. }
            | Self::CandidateWithdrawn { election_id, .. }
            | Self::ElectionStarted { election_id }
            | Self::ElectionEnded { election_id }
            | Self::ResultsPublished { election_id, .. }
            | Self::VoteCast { election_id, .. } => Some(election_id),
            Self::LedgerInitialized { .. }
            | Self::VoterRegistered { .. }
            | Self::VoterRevoked { .. }
            | Self::RoleGranted { .. }
            | Self::RoleRevoked { .. }
            | Self::Paused
            | Self::Unpaused => None,
        }
    }

    /// Short name of the event, for logging.
    pub fn name(&self) -> &'static str {
        match self {
            Self::LedgerInitialized { .. } => "LedgerInitialized",
            Self::ElectionCreated { .. } => "ElectionCreated",
            Self::PositionAdded { .. } => "PositionAdded",
            Self::CandidateRegistered { .. } => "CandidateRegistered",
            Self::CandidateWithdrawn { .. } => "CandidateWithdrawn",
            Self::ElectionStarted { .. } => "ElectionStarted",
            Self::ElectionEnded { .. } => "ElectionEnded",
            Self::ResultsPublished { .. } => "ResultsPublished",
            Self::VoteCast { .. } => "VoteCast",
            Self::VoterRegistered { .. } => "VoterRegistered",
            Self::VoterRevoked { .. } => "VoterRevoked",
            Self::RoleGranted { .. } => "RoleGranted",
            Self::RoleRevoked { .. } => "RoleRevoked",
            Self::Paused => "Paused",
            Self::Unpaused => "Unpaused",
        }
    }
}

/// A committed event, as stored in the audit trail and delivered to observers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventRecord {
    /// Sequence number of the transition that produced this event.
    pub seq: u64,
    pub at: DateTime<Utc>,
    /// The caller whose operation produced this event.
    pub actor: Identity,
    pub event: LedgerEvent,
}

/// Receives every committed event.
///
/// Observers are called on the committing thread after the ledger lock is released,
/// so they may query the ledger. Events committed concurrently by different threads
/// may arrive out of order; use [`EventRecord::seq`] to order them.
///
/// A panicking observer is logged and skipped. The event it was handed is already
/// committed, and later observers still receive it.
pub trait Observer: Send + Sync {
    fn notify(&self, record: &EventRecord);
}

/// Keeps every event it sees. Clones share the same buffer.
#[derive(Debug, Clone, Default)]
pub struct RecordingObserver(Arc<Mutex<Vec<EventRecord>>>);

impl RecordingObserver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything recorded so far.
    pub fn records(&self) -> Vec<EventRecord> {
        self.0.lock().clone()
    }

    /// Remove and return everything recorded so far.
    pub fn take(&self) -> Vec<EventRecord> {
        std::mem::take(&mut *self.0.lock())
    }
}

impl Observer for RecordingObserver {
    fn notify(&self, record: &EventRecord) {
        self.0.lock().push(record.clone());
    }
}
