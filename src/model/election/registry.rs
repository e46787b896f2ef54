use std::collections::HashMap;

use chrono::{DateTime, Utc};

use super::{Candidate, CandidateSpec, Election, ElectionSpec, Position, PositionSpec};
use crate::error::{Error, Result};
use crate::model::common::{
    election::{CandidateKey, ElectionId, ElectionState, PositionKey},
    Identity,
};

/// Elections, positions and candidates, stored flat under composite keys.
///
/// Every mutation is split into a `check_*` method, which validates against the
/// current state without writing, and an `apply_*` method, which writes without
/// validating. Callers must only apply what they have just checked.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ElectionRegistry {
    elections: HashMap<ElectionId, Election>,
    positions: HashMap<PositionKey, Position>,
    candidates: HashMap<CandidateKey, Candidate>,
    /// Election IDs in creation order.
    order: Vec<ElectionId>,
}

impl ElectionRegistry {
    pub fn election(&self, id: &str) -> Result<&Election> {
        self.elections
            .get(id)
            .ok_or_else(|| Error::ElectionNotFound(id.to_string()))
    }

    pub fn position(&self, key: &PositionKey) -> Result<&Position> {
        self.election(&key.election_id)?;
        self.positions
            .get(key)
            .ok_or_else(|| Error::PositionNotFound {
                election_id: key.election_id.clone(),
                position_id: key.position_id.clone(),
            })
    }

    /// Look up a candidate, active or not.
    pub fn candidate(&self, key: &CandidateKey) -> Result<&Candidate> {
        self.candidates
            .get(key)
            .ok_or_else(|| invalid_candidate(key))
    }

    /// All elections, in creation order.
    pub fn elections(&self) -> impl Iterator<Item = &Election> + '_ {
        self.order.iter().filter_map(|id| self.elections.get(id))
    }

    /// The positions of an election, in the order they were added.
    pub fn positions_of<'a>(
        &'a self,
        election: &'a Election,
    ) -> impl Iterator<Item = &'a Position> + 'a {
        election.positions.iter().filter_map(move |position_id| {
            self.positions
                .get(&PositionKey::new(election.id.clone(), position_id.clone()))
        })
    }

    /// The candidates of a position, in ballot order.
    pub fn candidates_of<'a>(
        &'a self,
        position: &'a Position,
    ) -> impl Iterator<Item = &'a Candidate> + 'a {
        let key = position.key();
        position
            .candidates
            .iter()
            .filter_map(move |candidate_id| {
                self.candidates.get(&key.candidate(candidate_id.clone()))
            })
    }

    pub fn election_count(&self) -> usize {
        self.elections.len()
    }

    /// Every candidate, in no particular order.
    pub(crate) fn all_candidates(&self) -> impl Iterator<Item = &Candidate> + '_ {
        self.candidates.values()
    }

    /// Look up an election that may still be edited.
    fn editable_election(&self, id: &str) -> Result<&Election> {
        let election = self.election(id)?;
        if !election.state.is_editable() {
            return Err(Error::ElectionNotEditable {
                id: election.id.clone(),
                state: election.state,
            });
        }
        Ok(election)
    }

    pub fn check_create(&self, spec: &ElectionSpec, now: DateTime<Utc>) -> Result<()> {
        if spec.id.trim().is_empty() {
            return Err(Error::EmptyField("election id"));
        }
        if self.elections.contains_key(&spec.id) {
            return Err(Error::DuplicateElection(spec.id.clone()));
        }
        if spec.start_time >= spec.end_time || spec.end_time <= now {
            return Err(Error::InvalidTimeRange {
                start: spec.start_time,
                end: spec.end_time,
            });
        }
        Ok(())
    }

    pub fn apply_create(&mut self, spec: ElectionSpec, creator: Identity, at: DateTime<Utc>) {
        let election = Election::new(spec, creator, at);
        self.order.push(election.id.clone());
        self.elections.insert(election.id.clone(), election);
    }

    pub fn check_add_position(&self, election_id: &str, spec: &PositionSpec) -> Result<()> {
        self.editable_election(election_id)?;
        if spec.id.trim().is_empty() {
            return Err(Error::EmptyField("position id"));
        }
        if self
            .positions
            .contains_key(&PositionKey::new(election_id, spec.id.clone()))
        {
            return Err(Error::DuplicatePosition {
                election_id: election_id.to_string(),
                position_id: spec.id.clone(),
            });
        }
        if spec.max_votes_per_voter < 1 {
            return Err(Error::InvalidSeats("maxVotesPerVoter"));
        }
        if spec.available_seats < 1 {
            return Err(Error::InvalidSeats("availableSeats"));
        }
        Ok(())
    }

    pub fn apply_add_position(&mut self, election_id: &str, spec: PositionSpec) {
        let position = Position::new(election_id.to_string(), spec);
        if let Some(election) = self.elections.get_mut(election_id) {
            election.positions.push(position.id.clone());
        }
        self.positions.insert(position.key(), position);
    }

    /// Check a candidate registration, returning the ballot number it will receive.
    pub fn check_register_candidate(
        &self,
        position: &PositionKey,
        spec: &CandidateSpec,
    ) -> Result<u32> {
        self.editable_election(&position.election_id)?;
        let existing = self.position(position)?;
        if spec.id.trim().is_empty() {
            return Err(Error::EmptyField("candidate id"));
        }
        if spec.identity.is_empty() {
            return Err(Error::EmptyField("candidate identity"));
        }
        let duplicate = |candidate_id: &str| Error::DuplicateCandidate {
            position_id: position.position_id.clone(),
            candidate_id: candidate_id.to_string(),
        };
        if self.candidates.contains_key(&position.candidate(spec.id.clone())) {
            return Err(duplicate(&spec.id));
        }
        if let Some(standing) = self
            .candidates_of(existing)
            .find(|c| c.identity == spec.identity)
        {
            return Err(duplicate(&standing.id));
        }
        Ok(existing.candidates.len() as u32 + 1)
    }

    pub fn apply_register_candidate(&mut self, position: &PositionKey, spec: CandidateSpec) {
        let Some(existing) = self.positions.get_mut(position) else {
            return;
        };
        let ballot_number = existing.candidates.len() as u32 + 1;
        let candidate = Candidate::new(position, spec, ballot_number);
        existing.candidates.push(candidate.id.clone());
        self.candidates.insert(candidate.key(), candidate);
    }

    pub fn check_withdraw_candidate(&self, key: &CandidateKey) -> Result<()> {
        let election = self.election(&key.election_id)?;
        let candidate = self.candidate(key)?;
        if !matches!(election.state, ElectionState::Created | ElectionState::Active) {
            return Err(Error::ElectionNotEditable {
                id: election.id.clone(),
                state: election.state,
            });
        }
        if !candidate.active {
            return Err(Error::CandidateWithdrawn(candidate.id.clone()));
        }
        Ok(())
    }

    pub fn apply_withdraw_candidate(&mut self, key: &CandidateKey) {
        if let Some(candidate) = self.candidates.get_mut(key) {
            candidate.active = false;
        }
    }

    pub fn check_start(&self, id: &str, now: DateTime<Utc>) -> Result<()> {
        let election = self.election(id)?;
        if election.state != ElectionState::Created {
            return Err(Error::AlreadyActive {
                id: election.id.clone(),
                state: election.state,
            });
        }
        if now < election.start_time {
            return Err(Error::TooEarly {
                id: election.id.clone(),
                start_time: election.start_time,
            });
        }
        if election.positions.is_empty() {
            return Err(Error::NoPositions(election.id.clone()));
        }
        Ok(())
    }

    pub fn check_end(&self, id: &str) -> Result<()> {
        let election = self.election(id)?;
        if election.state != ElectionState::Active {
            return Err(Error::NotActive {
                id: election.id.clone(),
                state: election.state,
            });
        }
        Ok(())
    }

    /// Check results may be published, returning the election's final vote total.
    pub fn check_publish(&self, id: &str) -> Result<u64> {
        let election = self.election(id)?;
        match election.state {
            ElectionState::Ended => Ok(election.total_votes),
            ElectionState::Created => Err(Error::ElectionNotEnded(election.id.clone())),
            ElectionState::Active => Err(Error::ElectionStillActive(election.id.clone())),
            ElectionState::ResultsPublished => Err(Error::AlreadyPublished(election.id.clone())),
        }
    }

    /// Move an election to a later state.
    pub fn apply_state(&mut self, id: &str, state: ElectionState, at: DateTime<Utc>) {
        if let Some(election) = self.elections.get_mut(id) {
            debug_assert!(election.state < state, "elections only move forwards");
            election.state = state;
            if state == ElectionState::ResultsPublished {
                election.results_published_at = Some(at);
            }
        }
    }

    /// Count a vote for a candidate, and for its election.
    pub fn apply_vote(&mut self, key: &CandidateKey) {
        if let Some(candidate) = self.candidates.get_mut(key) {
            candidate.vote_count += 1;
        }
        if let Some(election) = self.elections.get_mut(&key.election_id) {
            election.total_votes += 1;
        }
    }
}

fn invalid_candidate(key: &CandidateKey) -> Error {
    Error::InvalidCandidate {
        election_id: key.election_id.clone(),
        position_id: key.position_id.clone(),
        candidate_id: key.candidate_id.clone(),
    }
}
