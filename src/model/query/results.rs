use serde::Serialize;

use super::percentage;
use crate::model::{
    common::election::{CandidateId, ElectionId, ElectionState, PositionId},
    election::{Election, ElectionRegistry, Position},
};

/// Ranked results of an election. Provisional until the results are published.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ElectionResults {
    pub election_id: ElectionId,
    pub title: String,
    pub state: ElectionState,
    pub total_votes: u64,
    /// True once results have been published, after which tallies cannot change.
    pub is_final: bool,
    pub positions: Vec<PositionResults>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PositionResults {
    pub position_id: PositionId,
    pub title: String,
    pub available_seats: u32,
    pub total_votes: u64,
    /// Ranked, most votes first.
    pub candidates: Vec<CandidateResult>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CandidateResult {
    pub candidate_id: CandidateId,
    pub name: String,
    pub party: String,
    pub ballot_number: u32,
    pub active: bool,
    pub votes: u64,
    /// Share of the position's votes, rounded to two decimal places.
    pub percentage: f64,
    /// Competition ranking: tied candidates share a rank, and the next rank is skipped.
    pub rank: u32,
    pub is_winner: bool,
}

impl ElectionResults {
    pub(crate) fn tally(registry: &ElectionRegistry, election: &Election) -> Self {
        Self {
            election_id: election.id.clone(),
            title: election.title.clone(),
            state: election.state,
            total_votes: election.total_votes,
            is_final: election.state == ElectionState::ResultsPublished,
            positions: registry
                .positions_of(election)
                .map(|position| PositionResults::tally(registry, position))
                .collect(),
        }
    }

    pub fn position(&self, position_id: &str) -> Option<&PositionResults> {
        self.positions.iter().find(|p| p.position_id == position_id)
    }
}

impl PositionResults {
    fn tally(registry: &ElectionRegistry, position: &Position) -> Self {
        let mut candidates: Vec<_> = registry.candidates_of(position).collect();
        candidates.sort_by(|a, b| {
            b.vote_count
                .cmp(&a.vote_count)
                .then(a.ballot_number.cmp(&b.ballot_number))
        });
        let total_votes: u64 = candidates.iter().map(|c| c.vote_count).sum();

        let mut results = Vec::with_capacity(candidates.len());
        let mut rank = 0;
        let mut previous_votes = None;
        for (i, candidate) in candidates.into_iter().enumerate() {
            if previous_votes != Some(candidate.vote_count) {
                rank = i as u32 + 1;
                previous_votes = Some(candidate.vote_count);
            }
            results.push(CandidateResult {
                candidate_id: candidate.id.clone(),
                name: candidate.name.clone(),
                party: candidate.party.clone(),
                ballot_number: candidate.ballot_number,
                active: candidate.active,
                votes: candidate.vote_count,
                percentage: percentage(candidate.vote_count, total_votes),
                rank,
                is_winner: rank <= position.available_seats && candidate.vote_count > 0,
            });
        }

        Self {
            position_id: position.id.clone(),
            title: position.title.clone(),
            available_seats: position.available_seats,
            total_votes,
            candidates: results,
        }
    }

    pub fn winners(&self) -> impl Iterator<Item = &CandidateResult> + '_ {
        self.candidates.iter().filter(|c| c.is_winner)
    }
}
