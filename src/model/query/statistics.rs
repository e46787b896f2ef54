use std::collections::BTreeMap;

use serde::Serialize;

use super::percentage;
use crate::model::{
    common::election::{ElectionId, ElectionState},
    state::LedgerState,
};

/// Ledger-wide counters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LedgerStatistics {
    pub total_elections: usize,
    /// Every state is present, with zero for states no election is in.
    pub elections_by_state: BTreeMap<ElectionState, usize>,
    pub registered_voters: usize,
    pub total_votes: u64,
    pub paused: bool,
}

impl LedgerStatistics {
    pub(crate) fn gather(state: &LedgerState) -> Self {
        let mut elections_by_state: BTreeMap<_, _> =
            ElectionState::all().into_iter().map(|s| (s, 0)).collect();
        for election in state.registry().elections() {
            *elections_by_state.entry(election.state).or_default() += 1;
        }
        Self {
            total_elections: state.registry().election_count(),
            elections_by_state,
            registered_voters: state.access().registered_voter_count(),
            total_votes: state.votes().len() as u64,
            paused: state.pause().is_paused(),
        }
    }
}

/// Participation in one election.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Turnout {
    pub election_id: ElectionId,
    /// Distinct voters who cast at least one vote in the election.
    pub voters_participated: usize,
    /// Voters registered now, plus those who voted and have been revoked since.
    pub electorate: usize,
    pub percentage: f64,
}

impl Turnout {
    pub(crate) fn new(
        election_id: ElectionId,
        voters_participated: usize,
        electorate: usize,
    ) -> Self {
        Self {
            election_id,
            voters_participated,
            electorate,
            percentage: percentage(voters_participated as u64, electorate as u64),
        }
    }
}
