use std::collections::HashMap;

use chrono::{DateTime, Utc};

use super::{VoteRecord, VoterKey};
use crate::error::{Error, Result};
use crate::model::{
    access::AccessControl,
    command::BallotSpec,
    common::{election::ElectionId, Authority, Identity, Role, VoteHash},
    election::ElectionRegistry,
    pause::PauseSwitch,
};

/// The state a vote is checked against, besides the vote ledger itself.
#[derive(Debug, Copy, Clone)]
pub struct CastContext<'a> {
    pub access: &'a AccessControl,
    pub pause: &'a PauseSwitch,
    pub registry: &'a ElectionRegistry,
}

/// Append-only store of cast votes, indexed by hash and by voter.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct VoteLedger {
    records: HashMap<VoteHash, VoteRecord>,
    has_voted: HashMap<VoterKey, VoteHash>,
    /// Vote hashes in the order they were cast.
    order: Vec<VoteHash>,
}

impl VoteLedger {
    /// Check a vote may be cast. Checks run in a fixed order, and the first failure wins.
    pub fn check_cast(
        &self,
        ctx: CastContext<'_>,
        voter: &Identity,
        ballot: &BallotSpec,
        now: DateTime<Utc>,
    ) -> Result<()> {
        ctx.pause.ensure_running()?;
        if !ctx.access.is_eligible_voter(voter) {
            return Err(Error::Unauthorized {
                identity: voter.clone(),
                required: Authority::Role(Role::Voter),
            });
        }
        let election = ctx.registry.election(&ballot.election_id)?;
        if !election.is_open_at(now) {
            return Err(Error::VotingNotOpen(election.id.clone()));
        }
        let key = VoterKey {
            voter: voter.clone(),
            election_id: ballot.election_id.clone(),
            position_id: ballot.position_id.clone(),
        };
        if self.has_voted.contains_key(&key) {
            return Err(Error::AlreadyVoted {
                voter: key.voter,
                election_id: key.election_id,
                position_id: key.position_id,
            });
        }
        let candidate_key = ballot.candidate();
        match ctx.registry.candidate(&candidate_key) {
            Ok(candidate) if candidate.active => {}
            _ => {
                return Err(Error::InvalidCandidate {
                    election_id: candidate_key.election_id,
                    position_id: candidate_key.position_id,
                    candidate_id: candidate_key.candidate_id,
                })
            }
        }
        if ballot.vote_hash.is_empty() || self.records.contains_key(&ballot.vote_hash) {
            return Err(Error::DuplicateVoteHash(ballot.vote_hash));
        }
        Ok(())
    }

    /// Record a checked vote and count it.
    pub fn apply_cast(
        &mut self,
        registry: &mut ElectionRegistry,
        voter: &Identity,
        ballot: &BallotSpec,
        seq: u64,
        at: DateTime<Utc>,
    ) {
        let record = VoteRecord {
            hash: ballot.vote_hash,
            election_id: ballot.election_id.clone(),
            position_id: ballot.position_id.clone(),
            candidate_id: ballot.candidate_id.clone(),
            voter: voter.clone(),
            timestamp: at,
            seq,
        };
        registry.apply_vote(&record.candidate());
        self.has_voted.insert(record.voter_key(), record.hash);
        self.order.push(record.hash);
        self.records.insert(record.hash, record);
    }

    pub fn get(&self, hash: &VoteHash) -> Result<&VoteRecord> {
        self.records.get(hash).ok_or(Error::VoteNotFound(*hash))
    }

    /// The vote a voter cast for a position, if any.
    pub fn vote_of(&self, key: &VoterKey) -> Option<&VoteHash> {
        self.has_voted.get(key)
    }

    /// All votes, in the order they were cast.
    pub fn records(&self) -> impl Iterator<Item = &VoteRecord> + '_ {
        self.order.iter().filter_map(|hash| self.records.get(hash))
    }

    /// Votes cast in one election, in the order they were cast.
    pub fn records_for<'a>(
        &'a self,
        election_id: &'a ElectionId,
    ) -> impl Iterator<Item = &'a VoteRecord> + 'a {
        self.records().filter(move |r| &r.election_id == election_id)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// The raw has-voted index, for integrity checks.
    pub(crate) fn has_voted_index(&self) -> &HashMap<VoterKey, VoteHash> {
        &self.has_voted
    }
}
