use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::common::{
    election::{CandidateId, ElectionId, PositionId},
    Identity,
};

/// An election specification, as submitted by an administrator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElectionSpec {
    /// Unique election ID.
    pub id: ElectionId,
    pub title: String,
    pub description: String,
    /// Voting opens at this time.
    pub start_time: DateTime<Utc>,
    /// Voting closes at this time.
    pub end_time: DateTime<Utc>,
}

/// A position (contest) specification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PositionSpec {
    /// Unique within the election.
    pub id: PositionId,
    pub title: String,
    pub description: String,
    pub max_votes_per_voter: u32,
    pub available_seats: u32,
}

/// A candidate specification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateSpec {
    /// Unique within the position.
    pub id: CandidateId,
    pub name: String,
    pub party: String,
    pub manifesto: String,
    /// The identity of the person standing.
    pub identity: Identity,
}


#[cfg(test)]
pub use examples::t0;
