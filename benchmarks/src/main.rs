use anyhow::anyhow;
use chrono::{Duration, Utc};
use clap::{Parser, ValueEnum};
use comitia_ledger::model::common::{Identity, VoteHash};
use comitia_ledger::model::election::{CandidateSpec, ElectionSpec, PositionSpec};
use comitia_ledger::{Config, Ledger, SystemClock};
use rand::seq::SliceRandom;
use rand::Rng;
use std::ops::{AddAssign, Div};
use std::process;
use std::thread;
use std::time::{Duration as StdDuration, Instant};
use tempfile::TempDir;

const ELECTION_ID: &str = "bench";

#[rustfmt::skip]
const CANDIDATES: &[&str] = &[
    "Alice",
    "Bob",
    "Carol",
    "Dave",
    "Eve",
    "Fred",
    "Grace",
    "Henry",
    "Irene",
    "Joe",
];

#[derive(Parser)]
struct Args {
    /// How many threads to use. Defaults to the number of logical CPUs.
    #[arg(long, default_value_t = num_cpus::get())]
    threads: usize,

    /// How many voters each thread registers and votes for.
    #[arg(long, default_value_t = 100)]
    voters_per_thread: usize,

    /// How many positions each voter votes on.
    #[arg(long, default_value_t = 3)]
    positions: usize,

    /// Where to keep the journal.
    #[arg(long, value_enum, default_value_t)]
    storage: Storage,

    /// Verify ledger integrity after completion.
    #[arg(long)]
    verify: bool,
}

/// Where the ledger journal lives during the run.
#[derive(Debug, Copy, Clone, Default, ValueEnum)]
enum Storage {
    /// No journal at all.
    #[default]
    Memory,
    /// A journal in a temporary directory, written without syncing.
    Journal,
    /// A journal in a temporary directory, synced after every transition.
    Synced,
}

/// Open a ledger according to `storage`. The returned directory must outlive the ledger.
fn open_ledger(storage: Storage, root: &Identity) -> anyhow::Result<(Ledger, Option<TempDir>)> {
    let config = Config::in_memory(root.clone(), "benchmark");
    match storage {
        Storage::Memory => Ok((Ledger::in_memory(root.clone(), SystemClock)?, None)),
        Storage::Journal | Storage::Synced => {
            let dir = tempfile::tempdir()?;
            let mut config = config.with_journal(dir.path().join("ledger.jsonl"));
            if matches!(storage, Storage::Journal) {
                config = config.without_sync();
            }
            Ok((Ledger::open(&config, SystemClock)?, Some(dir)))
        }
    }
}

/// Create and start an election with `positions` positions, each contested by every
/// candidate.
fn setup_election(ledger: &Ledger, root: &Identity, positions: usize) -> anyhow::Result<()> {
    let now = Utc::now();
    ledger.create_election(
        root,
        ElectionSpec {
            id: ELECTION_ID.to_string(),
            title: "Benchmark".to_string(),
            description: String::new(),
            start_time: now,
            end_time: now + Duration::days(1),
        },
    )?;
    for p in 0..positions {
        let position_id = format!("P{p}");
        ledger.add_position(
            root,
            ELECTION_ID,
            PositionSpec {
                id: position_id.clone(),
                title: format!("Position {p}"),
                description: String::new(),
                max_votes_per_voter: 1,
                available_seats: 1,
            },
        )?;
        for name in CANDIDATES {
            ledger.register_candidate(
                root,
                ELECTION_ID,
                &position_id,
                CandidateSpec {
                    id: name.to_string(),
                    name: name.to_string(),
                    party: String::new(),
                    manifesto: String::new(),
                    identity: format!("{name}-{p}").into(),
                },
            )?;
        }
    }
    ledger.start_election(root, ELECTION_ID)?;
    Ok(())
}

/// Durations of each part of the voting process.
#[derive(Debug, Default)]
struct VoteTimings {
    register: StdDuration,
    cast: StdDuration,
}

impl AddAssign for VoteTimings {
    fn add_assign(&mut self, rhs: Self) {
        self.register += rhs.register;
        self.cast += rhs.cast;
    }
}

impl Div<u32> for VoteTimings {
    type Output = Self;

    fn div(self, rhs: u32) -> Self {
        Self {
            register: self.register / rhs,
            cast: self.cast / rhs,
        }
    }
}

/// Register a voter, then cast one vote on every position for a random candidate.
fn vote(
    ledger: &Ledger,
    root: &Identity,
    voter_id: usize,
    positions: usize,
) -> anyhow::Result<VoteTimings> {
    let voter = Identity::new(format!("voter-{voter_id}"));

    let pre_register = Instant::now();
    ledger.register_voter(root, &voter)?;
    let post_register = Instant::now();

    let mut rng = rand::thread_rng();
    let pre_cast = Instant::now();
    for p in 0..positions {
        let position_id = format!("P{p}");
        let candidate = CANDIDATES
            .choose(&mut rng)
            .ok_or_else(|| anyhow!("no candidates"))?;
        let nonce: [u8; 16] = rng.gen();
        let hash = VoteHash::for_ballot(ELECTION_ID, &position_id, candidate, &voter, &nonce);
        ledger.cast_vote(&voter, ELECTION_ID, &position_id, candidate, hash)?;
    }
    let post_cast = Instant::now();

    Ok(VoteTimings {
        register: post_register.duration_since(pre_register),
        cast: post_cast.duration_since(pre_cast) / positions.max(1) as u32,
    })
}

/// Run the benchmark.
fn benchmark(ledger: &Ledger, root: &Identity, args: &Args) -> anyhow::Result<()> {
    let per_thread = args.voters_per_thread;
    let end_val: usize = args.threads * per_thread;
    let positions = args.positions;

    let start = Instant::now();
    thread::scope(|s| {
        let mut threads = Vec::with_capacity(args.threads);

        for start in (0..end_val).step_by(per_thread.max(1)) {
            let t = s.spawn(move || {
                let mut duration = VoteTimings::default();
                for voter_id in start..(start + per_thread) {
                    duration += vote(ledger, root, voter_id, positions)?;
                }
                Ok::<_, anyhow::Error>(duration / per_thread.max(1) as u32)
            });
            threads.push(t);
        }

        let mut duration = VoteTimings::default();
        for t in threads {
            duration += t.join().map_err(|_| anyhow!("thread panicked"))??;
        }
        let total_duration = start.elapsed();

        let avg = duration / args.threads.max(1) as u32;
        let votes = end_val * positions;
        let actual_votes_per_sec = votes as f64 / total_duration.as_secs_f64();

        println!("register: {:?}", avg.register);
        println!("cast:     {:?}", avg.cast);
        println!(
            "\nactual duration: {} votes from {} voters in {:?} ({:.2}/s)",
            votes, end_val, total_duration, actual_votes_per_sec
        );

        Ok(())
    })
}

/// Check the ledger's tallies and the number of votes recorded.
fn verify(ledger: &Ledger, expected_votes: u64) -> anyhow::Result<()> {
    ledger.verify_integrity()?;
    let recorded = ledger.get_total_votes_cast();
    if recorded != expected_votes {
        return Err(anyhow!("expected {expected_votes} votes, found {recorded}"));
    }
    let results = ledger.get_results(ELECTION_ID)?;
    for position in &results.positions {
        let winners: Vec<_> = position.winners().map(|c| c.name.as_str()).collect();
        println!(
            "{}: {} votes, won by {}",
            position.position_id,
            position.total_votes,
            winners.join(", ")
        );
    }
    println!("\nVerification succeeded.");
    Ok(())
}

fn run() -> anyhow::Result<()> {
    let args = Args::parse();
    let root = Identity::from("benchmark-root");

    let (ledger, _dir) = open_ledger(args.storage, &root)?;
    setup_election(&ledger, &root, args.positions)?;
    benchmark(&ledger, &root, &args)?;

    if args.verify {
        let expected = (args.threads * args.voters_per_thread * args.positions) as u64;
        verify(&ledger, expected)?;
    }
    Ok(())
}

fn main() {
    if let Err(e) = run() {
        eprintln!("FATAL: {}", e);
        process::exit(1);
    }
}
