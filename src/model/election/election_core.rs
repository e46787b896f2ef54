use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::spec::{CandidateSpec, ElectionSpec, PositionSpec};
use crate::model::common::{
    election::{CandidateId, CandidateKey, ElectionId, ElectionState, PositionId, PositionKey},
    Identity,
};

/// Core election data. Elections are never deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Election {
    pub id: ElectionId,
    pub title: String,
    pub description: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub state: ElectionState,
    /// Number of votes cast across all positions.
    pub total_votes: u64,
    pub creator: Identity,
    /// Position IDs, in the order they were added.
    pub positions: Vec<PositionId>,
    pub created_at: DateTime<Utc>,
    pub results_published_at: Option<DateTime<Utc>>,
}

impl Election {
    pub fn new(spec: ElectionSpec, creator: Identity, created_at: DateTime<Utc>) -> Self {
        Self {
            id: spec.id,
            title: spec.title,
            description: spec.description,
            start_time: spec.start_time,
            end_time: spec.end_time,
            state: ElectionState::Created,
            total_votes: 0,
            creator,
            positions: Vec::new(),
            created_at,
            results_published_at: None,
        }
    }

    /// Is voting open at the given time?
    pub fn is_open_at(&self, now: DateTime<Utc>) -> bool {
        self.state == ElectionState::Active && self.start_time <= now && now <= self.end_time
    }
}

/// A contest within an election.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    pub election_id: ElectionId,
    pub id: PositionId,
    pub title: String,
    pub description: String,
    pub max_votes_per_voter: u32,
    pub available_seats: u32,
    /// Candidate IDs, in ballot order.
    pub candidates: Vec<CandidateId>,
}

impl Position {
    pub fn new(election_id: ElectionId, spec: PositionSpec) -> Self {
        Self {
            election_id,
            id: spec.id,
            title: spec.title,
            description: spec.description,
            max_votes_per_voter: spec.max_votes_per_voter,
            available_seats: spec.available_seats,
            candidates: Vec::new(),
        }
    }

    pub fn key(&self) -> PositionKey {
        PositionKey::new(self.election_id.clone(), self.id.clone())
    }
}

/// A candidate standing for a position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candidate {
    pub election_id: ElectionId,
    pub position_id: PositionId,
    pub id: CandidateId,
    pub name: String,
    pub party: String,
    pub manifesto: String,
    pub identity: Identity,
    pub vote_count: u64,
    /// False once withdrawn. Withdrawn candidates keep their votes but cannot receive more.
    pub active: bool,
    /// 1-based position on the ballot, in registration order.
    pub ballot_number: u32,
}

impl Candidate {
    pub fn new(position: &PositionKey, spec: CandidateSpec, ballot_number: u32) -> Self {
        Self {
            election_id: position.election_id.clone(),
            position_id: position.position_id.clone(),
            id: spec.id,
            name: spec.name,
            party: spec.party,
            manifesto: spec.manifesto,
            identity: spec.identity,
            vote_count: 0,
            active: true,
            ballot_number,
        }
    }

    pub fn key(&self) -> CandidateKey {
        CandidateKey::new(
            self.election_id.clone(),
            self.position_id.clone(),
            self.id.clone(),
        )
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::super::spec::t0;
    use super::*;

    #[test]
    fn open_only_while_active_and_in_window() {
        let mut election = Election::new(ElectionSpec::example(), "root".into(), t0());
        assert!(!election.is_open_at(t0()));

        election.state = ElectionState::Active;
        assert!(!election.is_open_at(t0() - Duration::seconds(1)));
        assert!(election.is_open_at(t0()));
        assert!(election.is_open_at(election.end_time));
        assert!(!election.is_open_at(election.end_time + Duration::seconds(1)));

        election.state = ElectionState::Ended;
        assert!(!election.is_open_at(t0()));
    }
}
