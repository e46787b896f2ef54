//! Read-only projections of a [`LedgerState`]. Nothing here mutates, and every
//! returned value is owned so it can outlive the lock it was read under.

use std::collections::HashSet;

use serde::Serialize;

pub use results::{CandidateResult, ElectionResults, PositionResults};
pub use statistics::{LedgerStatistics, Turnout};

use super::{
    ballot::{VoteRecord, VoterKey},
    common::{
        election::{CandidateKey, PositionKey},
        Authority, Identity, Role, VoteHash,
    },
    election::{Candidate, Election, Position},
    event::EventRecord,
    state::LedgerState,
};
use crate::error::Result;

mod results;
mod statistics;

/// An election with its positions and their candidates, in ballot order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ElectionView {
    pub election: Election,
    pub positions: Vec<PositionView>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PositionView {
    pub position: Position,
    pub candidates: Vec<Candidate>,
}

/// Read-only access to a ledger state.
#[derive(Debug, Copy, Clone)]
pub struct QueryService<'a> {
    state: &'a LedgerState,
}

impl<'a> QueryService<'a> {
    pub fn new(state: &'a LedgerState) -> Self {
        Self { state }
    }

    pub fn get_election(&self, election_id: &str) -> Result<ElectionView> {
        let registry = self.state.registry();
        let election = registry.election(election_id)?;
        let positions = registry
            .positions_of(election)
            .map(|position| PositionView {
                position: position.clone(),
                candidates: registry.candidates_of(position).cloned().collect(),
            })
            .collect();
        Ok(ElectionView {
            election: election.clone(),
            positions,
        })
    }

    /// Every election, in creation order.
    pub fn list_elections(&self) -> Vec<Election> {
        self.state.registry().elections().cloned().collect()
    }

    /// Votes for a candidate, including votes received before a withdrawal.
    pub fn get_candidate_vote_count(&self, key: &CandidateKey) -> Result<u64> {
        let registry = self.state.registry();
        registry.election(&key.election_id)?;
        Ok(registry.candidate(key)?.vote_count)
    }

    pub fn has_voter_voted(&self, voter: &Identity, position: &PositionKey) -> Result<bool> {
        self.state.registry().position(position)?;
        let key = VoterKey {
            voter: voter.clone(),
            election_id: position.election_id.clone(),
            position_id: position.position_id.clone(),
        };
        Ok(self.state.votes().vote_of(&key).is_some())
    }

    pub fn verify_vote(&self, hash: &VoteHash) -> Result<VoteRecord> {
        self.state.votes().get(hash).cloned()
    }

    pub fn get_election_count(&self) -> usize {
        self.state.registry().election_count()
    }

    pub fn get_total_votes_cast(&self) -> u64 {
        self.state.votes().len() as u64
    }

    pub fn get_results(&self, election_id: &str) -> Result<ElectionResults> {
        let registry = self.state.registry();
        let election = registry.election(election_id)?;
        Ok(ElectionResults::tally(registry, election))
    }

    pub fn get_statistics(&self) -> LedgerStatistics {
        LedgerStatistics::gather(self.state)
    }

    pub fn get_turnout(&self, election_id: &str) -> Result<Turnout> {
        let election = self.state.registry().election(election_id)?;
        let voters: HashSet<&Identity> = self
            .state
            .votes()
            .records_for(&election.id)
            .map(|r| &r.voter)
            .collect();
        let revoked_since = voters
            .iter()
            .filter(|voter| !self.state.access().is_registered_voter(voter))
            .count();
        Ok(Turnout::new(
            election.id.clone(),
            voters.len(),
            self.state.access().registered_voter_count() + revoked_since,
        ))
    }

    /// The committed events, optionally only those concerning one election.
    /// Restricted to auditors and administrators.
    pub fn audit_trail(
        &self,
        caller: &Identity,
        election_id: Option<&str>,
    ) -> Result<Vec<EventRecord>> {
        self.state
            .access()
            .require(caller, Authority::Either(Role::Auditor, Role::Administrator))?;
        if let Some(election_id) = election_id {
            self.state.registry().election(election_id)?;
        }
        Ok(self
            .state
            .trail()
            .iter()
            .filter(|record| election_id.is_none() || record.event.election_id() == election_id)
            .cloned()
            .collect())
    }
}

/// Round a share to a percentage with two decimal places.
pub(crate) fn percentage(part: u64, whole: u64) -> f64 {
    if whole == 0 {
        0.0
    } else {
        (part as f64 * 10_000.0 / whole as f64).round() / 100.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percentages_round_to_two_places() {
        assert_eq!(percentage(0, 0), 0.0);
        assert_eq!(percentage(1, 3), 33.33);
        assert_eq!(percentage(2, 3), 66.67);
        assert_eq!(percentage(3, 3), 100.0);
        assert_eq!(percentage(1, 8), 12.5);
    }
}
