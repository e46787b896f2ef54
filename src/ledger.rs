use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::clock::Clock;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::journal::Journal;
use crate::logging::LogObserver;
use crate::model::{
    ballot::{Receipt, ReceiptIssuer, VoteRecord},
    command::{BallotSpec, Command, Transition},
    common::{
        election::{CandidateKey, PositionKey},
        Identity, Role, VoteHash,
    },
    election::{CandidateSpec, Election, ElectionSpec, PositionSpec},
    event::{EventRecord, Observer},
    query::{ElectionResults, ElectionView, LedgerStatistics, QueryService, Turnout},
    state::{IntegrityError, LedgerState},
};

#[derive(Debug, Default)]
struct Inner {
    state: LedgerState,
    journal: Option<Journal>,
}

/// A shareable handle to the ledger.
///
/// Every mutation runs under one write lock: the clock is read, the transition is
/// checked, journalled and only then applied. Queries take the read lock and so
/// always see whole transitions. Observers are notified after the lock is released.
pub struct Ledger {
    inner: RwLock<Inner>,
    clock: Arc<dyn Clock>,
    receipts: ReceiptIssuer,
    observers: RwLock<Vec<Arc<dyn Observer>>>,
}

impl Ledger {
    /// A ledger with no journal, initialised with the given root authority. Receipts
    /// are signed with a random key.
    pub fn in_memory(root: impl Into<Identity>, clock: impl Clock + 'static) -> Result<Self> {
        let ledger = Self {
            inner: RwLock::default(),
            clock: Arc::new(clock),
            receipts: ReceiptIssuer::random(rand::thread_rng()),
            observers: RwLock::default(),
        };
        let root = root.into();
        ledger.submit(&root, Command::Genesis { root: root.clone() })?;
        Ok(ledger)
    }

    /// Open a ledger as configured, replaying its journal if there is one. Committed
    /// events are logged through a [`LogObserver`].
    pub fn open(config: &Config, clock: impl Clock + 'static) -> Result<Self> {
        let inner = match config.journal_path() {
            Some(path) => {
                let (journal, transitions) = Journal::open(path, config.journal_sync())?;
                let state = LedgerState::replay(&transitions)?;
                Inner {
                    state,
                    journal: Some(journal),
                }
            }
            None => {
                warn!("No journal configured, the ledger will not survive a restart");
                Inner::default()
            }
        };
        let ledger = Self {
            inner: RwLock::new(inner),
            clock: Arc::new(clock),
            receipts: ReceiptIssuer::new(config.receipt_secret()),
            observers: RwLock::new(vec![Arc::new(LogObserver)]),
        };

        let root = ledger.inner.read().state.access().root().cloned();
        match root {
            None => {
                info!("Initialising new ledger with root {}", config.root());
                ledger.submit(
                    config.root(),
                    Command::Genesis {
                        root: config.root().clone(),
                    },
                )?;
            }
            Some(root) if &root != config.root() => warn!(
                "Configured root {} ignored, the ledger was initialised with root {root}",
                config.root()
            ),
            Some(_) => {}
        }
        Ok(ledger)
    }

    /// Deliver every future committed event to the observer.
    pub fn subscribe(&self, observer: Arc<dyn Observer>) {
        self.observers.write().push(observer);
    }

    /// Run a command as the caller. This is the only path by which state changes.
    fn submit(&self, caller: &Identity, command: Command) -> Result<EventRecord> {
        let record = {
            let mut guard = self.inner.write();
            let inner = &mut *guard;
            let transition = Transition {
                seq: inner.state.next_seq(),
                at: self.clock.now(),
                caller: caller.clone(),
                command,
            };
            let name = transition.command.name();

            let event = inner.state.plan(&transition).map_err(|err| {
                warn!("Rejected {name} by {caller}: {err}");
                err
            })?;
            if let Some(journal) = inner.journal.as_mut() {
                journal.append(&transition).map_err(|err| {
                    error!("Could not journal {name} by {caller}: {err}");
                    Error::from(err)
                })?;
            }
            let record = inner.state.commit(&transition, event);
            debug!("Committed #{} {name} by {caller}", record.seq);
            record
        };

        let observers = self.observers.read().clone();
        for observer in observers {
            if panic::catch_unwind(AssertUnwindSafe(|| observer.notify(&record))).is_err() {
                error!("Observer panicked on #{}, the change stands", record.seq);
            }
        }
        Ok(record)
    }

    fn query<T>(&self, f: impl FnOnce(QueryService<'_>) -> T) -> T {
        f(self.inner.read().state.query())
    }

    // Administration

    pub fn create_election(&self, caller: &Identity, spec: ElectionSpec) -> Result<EventRecord> {
        self.submit(caller, Command::CreateElection(spec))
    }

    pub fn add_position(
        &self,
        caller: &Identity,
        election_id: &str,
        position: PositionSpec,
    ) -> Result<EventRecord> {
        self.submit(
            caller,
            Command::AddPosition {
                election_id: election_id.to_string(),
                position,
            },
        )
    }

    pub fn register_candidate(
        &self,
        caller: &Identity,
        election_id: &str,
        position_id: &str,
        candidate: CandidateSpec,
    ) -> Result<EventRecord> {
        self.submit(
            caller,
            Command::RegisterCandidate {
                position: PositionKey::new(election_id, position_id),
                candidate,
            },
        )
    }

    pub fn withdraw_candidate(
        &self,
        caller: &Identity,
        election_id: &str,
        position_id: &str,
        candidate_id: &str,
    ) -> Result<EventRecord> {
        self.submit(
            caller,
            Command::WithdrawCandidate(CandidateKey::new(election_id, position_id, candidate_id)),
        )
    }

    pub fn start_election(&self, caller: &Identity, election_id: &str) -> Result<EventRecord> {
        self.submit(
            caller,
            Command::StartElection {
                election_id: election_id.to_string(),
            },
        )
    }

    pub fn end_election(&self, caller: &Identity, election_id: &str) -> Result<EventRecord> {
        self.submit(
            caller,
            Command::EndElection {
                election_id: election_id.to_string(),
            },
        )
    }

    pub fn publish_results(&self, caller: &Identity, election_id: &str) -> Result<EventRecord> {
        self.submit(
            caller,
            Command::PublishResults {
                election_id: election_id.to_string(),
            },
        )
    }

    pub fn grant_role(
        &self,
        caller: &Identity,
        identity: &Identity,
        role: Role,
    ) -> Result<EventRecord> {
        self.submit(
            caller,
            Command::GrantRole {
                identity: identity.clone(),
                role,
            },
        )
    }

    pub fn revoke_role(
        &self,
        caller: &Identity,
        identity: &Identity,
        role: Role,
    ) -> Result<EventRecord> {
        self.submit(
            caller,
            Command::RevokeRole {
                identity: identity.clone(),
                role,
            },
        )
    }

    pub fn register_voter(&self, caller: &Identity, identity: &Identity) -> Result<EventRecord> {
        self.submit(
            caller,
            Command::RegisterVoter {
                identity: identity.clone(),
            },
        )
    }

    /// Deregister a voter. Votes they have already cast are kept.
    pub fn revoke_voter(&self, caller: &Identity, identity: &Identity) -> Result<EventRecord> {
        self.submit(
            caller,
            Command::RevokeVoter {
                identity: identity.clone(),
            },
        )
    }

    pub fn pause(&self, caller: &Identity) -> Result<EventRecord> {
        self.submit(caller, Command::Pause)
    }

    pub fn unpause(&self, caller: &Identity) -> Result<EventRecord> {
        self.submit(caller, Command::Unpause)
    }

    // Voting

    /// Cast a vote, returning a signed receipt.
    pub fn cast_vote(
        &self,
        voter: &Identity,
        election_id: &str,
        position_id: &str,
        candidate_id: &str,
        vote_hash: VoteHash,
    ) -> Result<Receipt> {
        let ballot = BallotSpec {
            election_id: election_id.to_string(),
            position_id: position_id.to_string(),
            candidate_id: candidate_id.to_string(),
            vote_hash,
        };
        self.submit(voter, Command::CastVote(ballot))?;
        let record = self.verify_vote(&vote_hash)?;
        Ok(self.receipts.issue(&record, rand::thread_rng()))
    }

    // Queries

    pub fn get_election(&self, election_id: &str) -> Result<ElectionView> {
        self.query(|q| q.get_election(election_id))
    }

    pub fn list_elections(&self) -> Vec<Election> {
        self.query(|q| q.list_elections())
    }

    pub fn get_candidate_vote_count(
        &self,
        election_id: &str,
        position_id: &str,
        candidate_id: &str,
    ) -> Result<u64> {
        let key = CandidateKey::new(election_id, position_id, candidate_id);
        self.query(|q| q.get_candidate_vote_count(&key))
    }

    pub fn has_voter_voted(
        &self,
        voter: &Identity,
        election_id: &str,
        position_id: &str,
    ) -> Result<bool> {
        let key = PositionKey::new(election_id, position_id);
        self.query(|q| q.has_voter_voted(voter, &key))
    }

    pub fn verify_vote(&self, hash: &VoteHash) -> Result<VoteRecord> {
        self.query(|q| q.verify_vote(hash))
    }

    /// Check a receipt was issued by this ledger and still matches a recorded vote.
    pub fn verify_receipt(&self, receipt: &Receipt) -> Result<VoteRecord> {
        self.receipts.verify(receipt)?;
        let record = self.verify_vote(&receipt.vote_hash)?;
        if record.election_id != receipt.election_id
            || record.position_id != receipt.position_id
            || record.timestamp != receipt.issued_at
        {
            return Err(Error::InvalidReceipt(receipt.vote_hash));
        }
        Ok(record)
    }

    pub fn get_election_count(&self) -> usize {
        self.query(|q| q.get_election_count())
    }

    pub fn get_total_votes_cast(&self) -> u64 {
        self.query(|q| q.get_total_votes_cast())
    }

    pub fn get_results(&self, election_id: &str) -> Result<ElectionResults> {
        self.query(|q| q.get_results(election_id))
    }

    pub fn get_statistics(&self) -> LedgerStatistics {
        self.query(|q| q.get_statistics())
    }

    pub fn get_turnout(&self, election_id: &str) -> Result<Turnout> {
        self.query(|q| q.get_turnout(election_id))
    }

    pub fn audit_trail(
        &self,
        caller: &Identity,
        election_id: Option<&str>,
    ) -> Result<Vec<EventRecord>> {
        self.query(|q| q.audit_trail(caller, election_id))
    }

    pub fn has_role(&self, identity: &Identity, role: Role) -> bool {
        self.inner.read().state.access().has_role(identity, role)
    }

    pub fn is_paused(&self) -> bool {
        self.inner.read().state.pause().is_paused()
    }

    /// The root authority fixed at genesis.
    pub fn root(&self) -> Option<Identity> {
        self.inner.read().state.access().root().cloned()
    }

    pub fn verify_integrity(&self) -> Result<(), IntegrityError> {
        self.inner.read().state.verify_integrity()
    }

    /// A copy of the whole current state.
    pub fn snapshot(&self) -> LedgerState {
        self.inner.read().state.clone()
    }
}

impl std::fmt::Debug for Ledger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.read();
        f.debug_struct("Ledger")
            .field("next_seq", &inner.state.next_seq())
            .field("journal", &inner.journal.as_ref().map(|j| j.path()))
            .field("observers", &self.observers.read().len())
            .finish_non_exhaustive()
    }
}
