use std::collections::HashMap;

use thiserror::Error;

use super::{
    access::AccessControl,
    ballot::{CastContext, VoteLedger},
    command::{Command, Transition},
    common::{
        election::{CandidateKey, ElectionId, ElectionState},
        Authority, Role, VoteHash,
    },
    election::ElectionRegistry,
    event::{EventRecord, LedgerEvent},
    pause::PauseSwitch,
    query::QueryService,
};
use crate::error::{Error, Result};
use crate::journal::JournalError;

/// The whole ledger state: every component, plus the audit trail.
///
/// State only changes through [`LedgerState::plan`] followed by [`LedgerState::commit`].
/// `plan` runs every check and writes nothing; `commit` writes and never fails. A
/// transition that fails to plan therefore leaves no trace.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LedgerState {
    access: AccessControl,
    registry: ElectionRegistry,
    votes: VoteLedger,
    pause: PauseSwitch,
    trail: Vec<EventRecord>,
    next_seq: u64,
}

impl LedgerState {
    /// Sequence number the next transition must carry.
    pub fn next_seq(&self) -> u64 {
        self.next_seq
    }

    pub fn access(&self) -> &AccessControl {
        &self.access
    }

    pub fn registry(&self) -> &ElectionRegistry {
        &self.registry
    }

    pub fn votes(&self) -> &VoteLedger {
        &self.votes
    }

    pub fn pause(&self) -> &PauseSwitch {
        &self.pause
    }

    /// Every committed event, in order.
    pub fn trail(&self) -> &[EventRecord] {
        &self.trail
    }

    pub fn query(&self) -> QueryService<'_> {
        QueryService::new(self)
    }

    /// Check a transition against the current state, returning the event it will produce.
    pub fn plan(&self, transition: &Transition) -> Result<LedgerEvent> {
        if transition.seq != self.next_seq {
            return Err(JournalError::Sequence {
                expected: self.next_seq,
                found: transition.seq,
            }
            .into());
        }
        let caller = &transition.caller;
        let now = transition.at;
        let admin = Authority::Role(Role::Administrator);

        match &transition.command {
            Command::Genesis { root } => {
                let event = self.access.check_genesis(root)?;
                if caller != root {
                    return Err(Error::Unauthorized {
                        identity: caller.clone(),
                        required: Authority::Root,
                    });
                }
                Ok(event)
            }
            Command::CreateElection(spec) => {
                self.access.require(caller, admin)?;
                self.registry.check_create(spec, now)?;
                Ok(LedgerEvent::ElectionCreated {
                    election_id: spec.id.clone(),
                    title: spec.title.clone(),
                })
            }
            Command::AddPosition {
                election_id,
                position,
            } => {
                self.access.require(caller, admin)?;
                self.registry.check_add_position(election_id, position)?;
                Ok(LedgerEvent::PositionAdded {
                    election_id: election_id.clone(),
                    position_id: position.id.clone(),
                })
            }
            Command::RegisterCandidate {
                position,
                candidate,
            } => {
                self.access.require(caller, admin)?;
                let ballot_number = self
                    .registry
                    .check_register_candidate(position, candidate)?;
                Ok(LedgerEvent::CandidateRegistered {
                    election_id: position.election_id.clone(),
                    position_id: position.position_id.clone(),
                    candidate_id: candidate.id.clone(),
                    ballot_number,
                })
            }
            Command::WithdrawCandidate(key) => {
                self.access.require(caller, admin)?;
                self.registry.check_withdraw_candidate(key)?;
                Ok(LedgerEvent::CandidateWithdrawn {
                    election_id: key.election_id.clone(),
                    position_id: key.position_id.clone(),
                    candidate_id: key.candidate_id.clone(),
                })
            }
            Command::StartElection { election_id } => {
                self.access.require(caller, admin)?;
                self.registry.check_start(election_id, now)?;
                Ok(LedgerEvent::ElectionStarted {
                    election_id: election_id.clone(),
                })
            }
            Command::EndElection { election_id } => {
                self.access.require(caller, admin)?;
                self.registry.check_end(election_id)?;
                Ok(LedgerEvent::ElectionEnded {
                    election_id: election_id.clone(),
                })
            }
            Command::PublishResults { election_id } => {
                self.access.require(caller, admin)?;
                let total_votes = self.registry.check_publish(election_id)?;
                Ok(LedgerEvent::ResultsPublished {
                    election_id: election_id.clone(),
                    total_votes,
                })
            }
            Command::GrantRole { identity, role } => {
                self.access.check_grant(caller, identity, *role)
            }
            Command::RevokeRole { identity, role } => {
                self.access.check_revoke(caller, identity, *role)
            }
            Command::RegisterVoter { identity } => {
                self.access.check_register_voter(caller, identity)
            }
            Command::RevokeVoter { identity } => self.access.check_revoke_voter(caller, identity),
            Command::Pause => self.pause.check_set(&self.access, caller, true),
            Command::Unpause => self.pause.check_set(&self.access, caller, false),
            Command::CastVote(ballot) => {
                let ctx = CastContext {
                    access: &self.access,
                    pause: &self.pause,
                    registry: &self.registry,
                };
                self.votes.check_cast(ctx, caller, ballot, now)?;
                Ok(LedgerEvent::VoteCast {
                    election_id: ballot.election_id.clone(),
                    position_id: ballot.position_id.clone(),
                    vote_hash: ballot.vote_hash,
                })
            }
        }
    }

    /// Apply a transition that has just been planned against this exact state.
    pub fn commit(&mut self, transition: &Transition, event: LedgerEvent) -> EventRecord {
        let caller = &transition.caller;
        let at = transition.at;

        match &transition.command {
            Command::Genesis { root } => self.access.apply_genesis(root.clone()),
            Command::CreateElection(spec) => {
                self.registry.apply_create(spec.clone(), caller.clone(), at)
            }
            Command::AddPosition {
                election_id,
                position,
            } => self.registry.apply_add_position(election_id, position.clone()),
            Command::RegisterCandidate {
                position,
                candidate,
            } => self
                .registry
                .apply_register_candidate(position, candidate.clone()),
            Command::WithdrawCandidate(key) => self.registry.apply_withdraw_candidate(key),
            Command::StartElection { election_id } => {
                self.registry
                    .apply_state(election_id, ElectionState::Active, at)
            }
            Command::EndElection { election_id } => {
                self.registry
                    .apply_state(election_id, ElectionState::Ended, at)
            }
            Command::PublishResults { election_id } => {
                self.registry
                    .apply_state(election_id, ElectionState::ResultsPublished, at)
            }
            Command::GrantRole { identity, role } => self.access.apply_grant(identity, *role, at),
            Command::RevokeRole { identity, role } => {
                self.access.apply_revoke(identity, *role, at)
            }
            Command::RegisterVoter { identity } => self.access.apply_register_voter(identity, at),
            Command::RevokeVoter { identity } => self.access.apply_revoke_voter(identity, at),
            Command::Pause => self.pause.apply_set(true, caller, at),
            Command::Unpause => self.pause.apply_set(false, caller, at),
            Command::CastVote(ballot) => {
                self.votes
                    .apply_cast(&mut self.registry, caller, ballot, transition.seq, at)
            }
        }

        let record = EventRecord {
            seq: transition.seq,
            at,
            actor: caller.clone(),
            event,
        };
        self.trail.push(record.clone());
        self.next_seq = transition.seq + 1;
        record
    }

    /// Plan then commit.
    pub fn execute(&mut self, transition: &Transition) -> Result<EventRecord> {
        let event = self.plan(transition)?;
        Ok(self.commit(transition, event))
    }

    /// Rebuild a state from a sequence of transitions.
    pub fn replay<'a>(
        transitions: impl IntoIterator<Item = &'a Transition>,
    ) -> Result<Self, JournalError> {
        let mut state = Self::default();
        for transition in transitions {
            state
                .execute(transition)
                .map_err(|source| JournalError::Replay {
                    seq: transition.seq,
                    source: Box::new(source),
                })?;
        }
        Ok(state)
    }

    /// Recount every tally and rebuild every index from the vote records, and compare
    /// with what is stored.
    pub fn verify_integrity(&self) -> Result<(), IntegrityError> {
        if self.access.root().is_some() && self.access.administrator_count() == 0 {
            return Err(IntegrityError::NoAdministrator);
        }

        let mut by_candidate: HashMap<CandidateKey, u64> = HashMap::new();
        let mut by_election: HashMap<&ElectionId, u64> = HashMap::new();
        for record in self.votes.records() {
            let key = record.candidate();
            if self.registry.candidate(&key).is_err() {
                return Err(IntegrityError::UnknownCandidate(record.hash));
            }
            *by_candidate.entry(key).or_default() += 1;
            *by_election.entry(&record.election_id).or_default() += 1;
            if self.votes.vote_of(&record.voter_key()) != Some(&record.hash) {
                return Err(IntegrityError::MissingIndex(record.hash));
            }
        }

        let index = self.votes.has_voted_index();
        if index.len() != self.votes.len() {
            return Err(IntegrityError::IndexSize {
                index: index.len(),
                records: self.votes.len(),
            });
        }

        for candidate in self.registry.all_candidates() {
            let key = candidate.key();
            let counted = by_candidate.get(&key).copied().unwrap_or(0);
            if candidate.vote_count != counted {
                return Err(IntegrityError::CandidateTally {
                    candidate: key,
                    stored: candidate.vote_count,
                    counted,
                });
            }
        }
        for election in self.registry.elections() {
            let counted = by_election.get(&election.id).copied().unwrap_or(0);
            if election.total_votes != counted {
                return Err(IntegrityError::ElectionTally {
                    election_id: election.id.clone(),
                    stored: election.total_votes,
                    counted,
                });
            }
        }
        Ok(())
    }
}

/// The first inconsistency [`LedgerState::verify_integrity`] found.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IntegrityError {
    #[error("No identity holds Administrator")]
    NoAdministrator,
    #[error("Vote {0} references an unknown candidate")]
    UnknownCandidate(VoteHash),
    #[error("Vote {0} is missing from the has-voted index")]
    MissingIndex(VoteHash),
    #[error("Has-voted index holds {index} entries for {records} votes")]
    IndexSize { index: usize, records: usize },
    #[error("Candidate {candidate:?} has {stored} votes stored but {counted} recorded")]
    CandidateTally {
        candidate: CandidateKey,
        stored: u64,
        counted: u64,
    },
    #[error("Election {election_id} has {stored} votes stored but {counted} recorded")]
    ElectionTally {
        election_id: ElectionId,
        stored: u64,
        counted: u64,
    },
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, Duration, Utc};
    use proptest::prelude::*;

    use super::*;
    use crate::model::{
        command::BallotSpec,
        common::{election::PositionKey, Identity},
        election::{t0, CandidateSpec, ElectionSpec, PositionSpec},
    };

    struct Harness {
        state: LedgerState,
        now: DateTime<Utc>,
        log: Vec<Transition>,
    }

    impl Harness {
        /// E1 with positions P0 and P1, each with candidates C0 to C2, started at t0,
        /// with voters V0 and V1 registered.
        fn new() -> Self {
            let mut harness = Self {
                state: LedgerState::default(),
                now: t0() - Duration::hours(1),
                log: Vec::new(),
            };
            let mut setup = vec![
                Command::Genesis {
                    root: "root".into(),
                },
                Command::CreateElection(ElectionSpec::example()),
            ];
            for p in 0..2 {
                let position = PositionSpec {
                    id: format!("P{p}"),
                    ..PositionSpec::example()
                };
                setup.push(Command::AddPosition {
                    election_id: "E1".to_string(),
                    position,
                });
                for c in 0..3 {
                    setup.push(Command::RegisterCandidate {
                        position: PositionKey::new("E1", format!("P{p}")),
                        candidate: CandidateSpec {
                            id: format!("C{c}"),
                            identity: format!("candidate-{p}-{c}").into(),
                            ..CandidateSpec::example1()
                        },
                    });
                }
            }
            for v in 0..2 {
                setup.push(Command::RegisterVoter {
                    identity: format!("V{v}").into(),
                });
            }
            for command in setup {
                harness.run("root", command).unwrap();
            }
            harness.now = t0();
            harness
                .run(
                    "root",
                    Command::StartElection {
                        election_id: "E1".to_string(),
                    },
                )
                .unwrap();
            harness
        }

        fn run(&mut self, caller: &str, command: Command) -> Result<()> {
            let transition = Transition {
                seq: self.state.next_seq(),
                at: self.now,
                caller: Identity::from(caller),
                command,
            };
            self.state.execute(&transition)?;
            self.log.push(transition);
            Ok(())
        }

        fn apply(&mut self, op: Op) -> Result<()> {
            let command = match op {
                Op::Cast {
                    voter,
                    position,
                    candidate,
                    hash,
                } => {
                    let ballot = BallotSpec {
                        election_id: "E1".to_string(),
                        position_id: format!("P{position}"),
                        candidate_id: format!("C{candidate}"),
                        vote_hash: VoteHash::new([hash; 32]),
                    };
                    return self.run(&format!("V{voter}"), Command::CastVote(ballot));
                }
                Op::Withdraw {
                    position,
                    candidate,
                } => Command::WithdrawCandidate(CandidateKey::new(
                    "E1",
                    format!("P{position}"),
                    format!("C{candidate}"),
                )),
                Op::Register(voter) => Command::RegisterVoter {
                    identity: format!("V{voter}").into(),
                },
                Op::Revoke(voter) => Command::RevokeVoter {
                    identity: format!("V{voter}").into(),
                },
                Op::Pause => Command::Pause,
                Op::Unpause => Command::Unpause,
                Op::End => Command::EndElection {
                    election_id: "E1".to_string(),
                },
                Op::Advance(seconds) => {
                    self.now = self.now + Duration::seconds(seconds);
                    return Ok(());
                }
            };
            self.run("root", command)
        }
    }

    #[derive(Debug, Clone)]
    enum Op {
        Cast {
            voter: u8,
            position: u8,
            candidate: u8,
            hash: u8,
        },
        Withdraw {
            position: u8,
            candidate: u8,
        },
        Register(u8),
        Revoke(u8),
        Pause,
        Unpause,
        End,
        Advance(i64),
    }

    fn op() -> impl Strategy<Value = Op> {
        prop_oneof![
            8 => (0..4u8, 0..2u8, 0..4u8, 0..24u8).prop_map(
                |(voter, position, candidate, hash)| Op::Cast {
                    voter,
                    position,
                    candidate,
                    hash,
                }
            ),
            1 => (0..2u8, 0..3u8)
                .prop_map(|(position, candidate)| Op::Withdraw { position, candidate }),
            2 => (0..4u8).prop_map(Op::Register),
            1 => (0..4u8).prop_map(Op::Revoke),
            1 => Just(Op::Pause),
            1 => Just(Op::Unpause),
            1 => Just(Op::End),
            1 => (0..900i64).prop_map(Op::Advance),
        ]
    }

    proptest! {
        #[test]
        fn random_operations_keep_tallies_consistent(ops in prop::collection::vec(op(), 1..80)) {
            let mut harness = Harness::new();
            for op in ops {
                let before = harness.state.clone();
                if harness.apply(op).is_err() {
                    prop_assert_eq!(&harness.state, &before);
                }
                prop_assert_eq!(harness.state.verify_integrity(), Ok(()));
            }

            let votes = harness.state.votes().len() as u64;
            let election = harness.state.registry().election("E1").unwrap();
            prop_assert_eq!(election.total_votes, votes);

            let replayed = LedgerState::replay(&harness.log).unwrap();
            prop_assert_eq!(replayed, harness.state);
        }
    }

    #[test]
    fn out_of_sequence_transition() {
        let harness = Harness::new();
        let transition = Transition {
            seq: harness.state.next_seq() + 1,
            at: harness.now,
            caller: "root".into(),
            command: Command::Pause,
        };
        assert_eq!(
            harness.state.plan(&transition),
            Err(Error::Journal(JournalError::Sequence {
                expected: harness.state.next_seq(),
                found: harness.state.next_seq() + 1,
            }))
        );
    }

    #[test]
    fn genesis_only_once_and_by_root() {
        let mut state = LedgerState::default();
        let genesis = |seq, caller: &str| Transition {
            seq,
            at: t0(),
            caller: caller.into(),
            command: Command::Genesis {
                root: "root".into(),
            },
        };
        assert!(matches!(
            state.plan(&genesis(0, "someone")),
            Err(Error::Unauthorized { .. })
        ));
        // Nothing works before genesis.
        let pause = Transition {
            seq: 0,
            at: t0(),
            caller: "root".into(),
            command: Command::Pause,
        };
        assert!(matches!(state.plan(&pause), Err(Error::Unauthorized { .. })));

        state.execute(&genesis(0, "root")).unwrap();
        assert_eq!(state.plan(&genesis(1, "root")), Err(Error::AlreadyInitialized));
        assert_eq!(state.trail().len(), 1);
    }

    #[test]
    fn tampered_tally_is_detected() {
        let mut harness = Harness::new();
        harness
            .apply(Op::Cast {
                voter: 0,
                position: 0,
                candidate: 1,
                hash: 9,
            })
            .unwrap();
        assert_eq!(harness.state.verify_integrity(), Ok(()));

        harness.state.registry.apply_vote(&CandidateKey::new("E1", "P0", "C2"));
        assert_eq!(
            harness.state.verify_integrity(),
            Err(IntegrityError::CandidateTally {
                candidate: CandidateKey::new("E1", "P0", "C2"),
                stored: 1,
                counted: 0,
            })
        );
    }
}
