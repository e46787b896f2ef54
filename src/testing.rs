//! Shared fixtures for `#[ledger_test]` tests.

use std::sync::Arc;

use chrono::Duration;

use crate::clock::ManualClock;
use crate::ledger::Ledger;
use crate::model::{
    common::{Identity, VoteHash},
    election::{t0, CandidateSpec, ElectionSpec, PositionSpec},
    event::RecordingObserver,
};

pub struct Fixture {
    pub ledger: Ledger,
    pub clock: ManualClock,
    pub events: RecordingObserver,
}

pub fn root() -> Identity {
    Identity::from("root")
}

pub fn v1() -> Identity {
    Identity::from("V1")
}

/// A non-zero vote hash, distinct for each `n` from 1 up.
pub fn hash(n: u8) -> VoteHash {
    VoteHash::new([n.max(1); 32])
}

impl Fixture {
    /// A fresh ledger with root `root`, an hour before [`t0`].
    pub fn genesis() -> Self {
        let clock = ManualClock::new(t0() - Duration::hours(1));
        let ledger = Ledger::in_memory(root(), clock.clone()).unwrap();
        let events = RecordingObserver::new();
        ledger.subscribe(Arc::new(events.clone()));
        Self {
            ledger,
            clock,
            events,
        }
    }

    /// Election `E1` (open from [`t0`] for an hour) with position `P1` (one seat) and
    /// candidates `C1` and `C2`, started at [`t0`], with `V1` registered to vote.
    /// The recorded events are cleared.
    pub fn active() -> Self {
        let fixture = Self::genesis();
        let ledger = &fixture.ledger;
        ledger
            .create_election(&root(), ElectionSpec::example())
            .unwrap();
        ledger
            .add_position(&root(), "E1", PositionSpec::example())
            .unwrap();
        for candidate in [CandidateSpec::example1(), CandidateSpec::example2()] {
            ledger
                .register_candidate(&root(), "E1", "P1", candidate)
                .unwrap();
        }
        fixture.clock.set(t0());
        ledger.start_election(&root(), "E1").unwrap();
        ledger.register_voter(&root(), &v1()).unwrap();
        fixture.events.take();
        fixture
    }
}
