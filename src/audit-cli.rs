//! A simple CLI tool for auditing a ledger journal.
//! This replays the journal through the same state machine the ledger itself runs, so
//! anything it accepts the ledger would have accepted too.

#[macro_use]
extern crate log;

use std::fmt::{Display, Formatter};

use clap::{Arg, ArgAction, ArgMatches, Command};

use comitia_ledger::{
    journal::{self, JournalError},
    model::{
        query::{CandidateResult, ElectionResults},
        state::{IntegrityError, LedgerState},
    },
};

const PROGRAM_NAME: &str = "ledger-audit";

const ABOUT_TEXT: &str = "Audit the journal of an election ledger.

EXIT CODES:
     0: Audit succeeded.
   255: Ran successfully, but the audit failed.
 Other: Error.";

const JOURNAL_PATH: &str = "JOURNAL_PATH";

const JOURNAL_PATH_HELP: &str = "The path to a ledger journal,\n\
as configured by `journal_path` in Ledger.toml";

const ELECTION: &str = "election";

const LOG_CONFIG: &str = "log-config";

/// Construct the CLI configuration.
fn cli() -> Command {
    // Make the build dirty when the toml changes.
    include_str!("../Cargo.toml");

    clap::command!(PROGRAM_NAME)
        .about(ABOUT_TEXT)
        .arg(
            Arg::new(JOURNAL_PATH)
                .help(JOURNAL_PATH_HELP)
                .action(ArgAction::Set)
                .required(true),
        )
        .arg(
            Arg::new(ELECTION)
                .long(ELECTION)
                .short('e')
                .value_name("ELECTION_ID")
                .help("Only report the results of this election")
                .action(ArgAction::Set),
        )
        .arg(
            Arg::new(LOG_CONFIG)
                .long(LOG_CONFIG)
                .value_name("FILE")
                .help("A log4rs configuration file; without one nothing is logged")
                .action(ArgAction::Set),
        )
}

/// Errors that this program may produce.
#[derive(Debug, PartialEq)]
enum Error {
    /// IO error described by the inner message.
    IO(String),
    /// A line of the journal could not be decoded.
    Format(String),
    /// The requested election does not appear in the journal.
    UnknownElection(String),
    /// The journal was tampered with or holds a transition the ledger would reject.
    Journal(JournalError),
    /// The replayed state is internally inconsistent.
    Integrity(IntegrityError),
}

impl From<JournalError> for Error {
    fn from(err: JournalError) -> Self {
        match err {
            JournalError::Io(msg) => Self::IO(msg),
            JournalError::Format { line, message } => {
                Self::Format(format!("line {line}: {message}"))
            }
            err => Self::Journal(err),
        }
    }
}

/// What a successful audit found.
#[derive(Debug, PartialEq)]
struct AuditReport {
    pub entries: usize,
    pub results: Vec<ElectionResults>,
}

/// One ranked line of a results table.
struct Standing<'a>(&'a CandidateResult);

impl Display for Standing<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let c = self.0;
        write!(
            f,
            "{:>3}. {} ({}): {} vote{} ({:.2}%)",
            c.rank,
            c.name,
            c.party,
            c.votes,
            if c.votes != 1 { "s" } else { "" },
            c.percentage
        )?;
        if !c.active {
            write!(f, " [withdrawn]")?;
        }
        if c.is_winner {
            write!(f, " [elected]")?;
        }
        Ok(())
    }
}

/// Run the audit.
fn audit(path: &str, election: Option<&str>) -> Result<AuditReport, Error> {
    let transitions = journal::read_entries(path)?;
    debug!("Read {} journal entries from {path}", transitions.len());

    let state = LedgerState::replay(&transitions)?;
    state.verify_integrity().map_err(Error::Integrity)?;

    let query = state.query();
    let results = match election {
        Some(id) => vec![query
            .get_results(id)
            .map_err(|_| Error::UnknownElection(id.to_string()))?],
        None => state
            .registry()
            .elections()
            .filter_map(|e| query.get_results(&e.id).ok())
            .collect(),
    };
    Ok(AuditReport {
        entries: transitions.len(),
        results,
    })
}

/// Run the audit, report the result, and return the exit code.
fn run(args: &ArgMatches) -> u8 {
    // Required argument is guaranteed to be present.
    let path: &String = args.get_one(JOURNAL_PATH).unwrap();
    let election = args.get_one::<String>(ELECTION).map(String::as_str);
    match audit(path, election) {
        Ok(report) => {
            println!("Audit succeeded: {} journal entries.", report.entries);
            for election in report.results {
                println!();
                println!(
                    "{} \"{}\" ({}{}): {} vote{}",
                    election.election_id,
                    election.title,
                    election.state,
                    if election.is_final { "" } else { ", provisional" },
                    election.total_votes,
                    if election.total_votes != 1 { "s" } else { "" }
                );
                for position in &election.positions {
                    println!(
                        "  {} \"{}\", {} seat{}:",
                        position.position_id,
                        position.title,
                        position.available_seats,
                        if position.available_seats != 1 { "s" } else { "" }
                    );
                    for candidate in &position.candidates {
                        println!("  {}", Standing(candidate));
                    }
                }
            }
            0
        }
        Err(Error::IO(msg)) => {
            println!("IO error: {}", msg);
            1
        }
        Err(Error::Format(msg)) => {
            println!("Malformed journal: {}", msg);
            1
        }
        Err(Error::UnknownElection(id)) => {
            println!("Election {} is not in the journal.", id);
            1
        }
        Err(Error::Journal(err)) => {
            println!("Audit failed: {}", err);
            255
        }
        Err(Error::Integrity(err)) => {
            println!("Audit failed: {}", err);
            255
        }
    }
}

fn main() {
    let args = cli().get_matches();
    if let Some(log_config) = args.get_one::<String>(LOG_CONFIG) {
        if let Err(err) = log4rs::init_file(log_config, Default::default()) {
            eprintln!("Failed to load logging configuration: {err}");
            std::process::exit(1)
        }
    }
    let exit_code = run(&args);
    std::process::exit(exit_code.into())
}

#[cfg(test)]
mod tests {
    use std::path::{Path, PathBuf};

    use chrono::{Duration, TimeZone, Utc};
    use comitia_ledger::{
        journal::Journal,
        model::{
            command::{BallotSpec, Command as LedgerCommand, Transition},
            common::{election::ElectionState, Identity, VoteHash},
            election::{CandidateSpec, ElectionSpec, PositionSpec},
        },
        Config, Ledger, ManualClock,
    };
    use tempfile::TempDir;

    use super::*;

    /// Write a journal for a finished election in which C1 beat C2 by 2 votes to 1.
    fn write_journal(dir: &TempDir) -> PathBuf {
        let path = dir.path().join("ledger.jsonl");
        let start = Utc.with_ymd_and_hms(2030, 1, 1, 9, 0, 0).unwrap();
        let clock = ManualClock::new(start - Duration::hours(1));
        let config = Config::in_memory("root", "secret").with_journal(&path);
        let ledger = Ledger::open(&config, clock.clone()).unwrap();
        let root = Identity::from("root");

        let election = ElectionSpec {
            id: "E1".to_string(),
            title: "Committee".to_string(),
            description: "Annual committee election".to_string(),
            start_time: start,
            end_time: start + Duration::hours(1),
        };
        ledger.create_election(&root, election).unwrap();
        let position = PositionSpec {
            id: "P1".to_string(),
            title: "Chair".to_string(),
            description: "Runs the meetings".to_string(),
            max_votes_per_voter: 1,
            available_seats: 1,
        };
        ledger.add_position(&root, "E1", position).unwrap();
        for (id, name) in [("C1", "Ada Obi"), ("C2", "Bo Lind")] {
            let candidate = CandidateSpec {
                id: id.to_string(),
                name: name.to_string(),
                party: "Independent".to_string(),
                manifesto: String::new(),
                identity: name.into(),
            };
            ledger.register_candidate(&root, "E1", "P1", candidate).unwrap();
        }
        for voter in ["v1", "v2", "v3"] {
            ledger.register_voter(&root, &voter.into()).unwrap();
        }

        clock.set(start);
        ledger.start_election(&root, "E1").unwrap();
        let ballots = [("v1", "C1"), ("v2", "C2"), ("v3", "C1")];
        for (n, (voter, candidate)) in ballots.into_iter().enumerate() {
            let hash = VoteHash::new([n as u8 + 1; 32]);
            ledger.cast_vote(&voter.into(), "E1", "P1", candidate, hash).unwrap();
        }
        ledger.end_election(&root, "E1").unwrap();
        ledger.publish_results(&root, "E1").unwrap();
        path
    }

    fn edit(path: &Path, from: &str, to: &str) {
        let contents = std::fs::read_to_string(path).unwrap();
        assert!(contents.contains(from));
        std::fs::write(path, contents.replacen(from, to, 1)).unwrap();
    }

    #[test]
    fn audit_journal() {
        // This test actually enters ledger code, so enable logging.
        log4rs_test_utils::test_logging::init_logging_once_for(
            ["comitia_ledger", "ledger_audit"],
            None,
            None,
        );

        let dir = tempfile::tempdir().unwrap();
        let path = write_journal(&dir);
        let path = path.to_str().unwrap();

        let report = audit(path, None).unwrap();
        assert_eq!(report.entries, 14);
        assert_eq!(report.results.len(), 1);
        let results = &report.results[0];
        assert_eq!(results.state, ElectionState::ResultsPublished);
        assert!(results.is_final);
        let chair = results.position("P1").unwrap();
        let tallies: Vec<_> = chair
            .candidates
            .iter()
            .map(|c| (c.candidate_id.as_str(), c.votes, c.rank, c.is_winner))
            .collect();
        assert_eq!(tallies, [("C1", 2, 1, true), ("C2", 1, 2, false)]);

        assert_eq!(audit(path, Some("E1")).unwrap(), report);
        assert_eq!(
            audit(path, Some("E9")),
            Err(Error::UnknownElection("E9".to_string()))
        );
    }

    #[test]
    fn tampered_journal() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_journal(&dir);
        // Move v2's vote to C1.
        edit(&path, r#""candidate_id":"C2","vote_hash""#, r#""candidate_id":"C1","vote_hash""#);
        assert!(matches!(
            audit(path.to_str().unwrap(), None),
            Err(Error::Journal(JournalError::BrokenChain { .. }))
        ));
    }

    #[test]
    fn rejected_transition() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_journal(&dir);

        // A correctly chained entry that the ledger would never have accepted.
        let (mut journal, transitions) = Journal::open(&path, false).unwrap();
        let last = transitions.last().unwrap();
        let ballot = BallotSpec {
            election_id: "E1".to_string(),
            position_id: "P1".to_string(),
            candidate_id: "C2".to_string(),
            vote_hash: VoteHash::new([9; 32]),
        };
        journal
            .append(&Transition {
                seq: last.seq + 1,
                at: last.at,
                caller: "stranger".into(),
                command: LedgerCommand::CastVote(ballot),
            })
            .unwrap();
        drop(journal);

        match audit(path.to_str().unwrap(), None) {
            Err(Error::Journal(JournalError::Replay { seq, .. })) => assert_eq!(seq, last.seq + 1),
            other => panic!("unexpected audit outcome: {other:?}"),
        }
    }

    #[test]
    fn standings() {
        let result = CandidateResult {
            candidate_id: "C2".to_string(),
            name: "Bo Lind".to_string(),
            party: "Independent".to_string(),
            ballot_number: 2,
            active: false,
            votes: 1,
            percentage: 33.333,
            rank: 2,
            is_winner: false,
        };
        assert_eq!(
            Standing(&result).to_string(),
            "  2. Bo Lind (Independent): 1 vote (33.33%) [withdrawn]"
        );
    }

    #[test]
    fn correct_cli_usage() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_journal(&dir);
        let path = path.to_str().unwrap();

        let command_line = [PROGRAM_NAME, path];
        let args = cli().try_get_matches_from(command_line).unwrap();
        assert_eq!(run(&args), 0);

        let command_line = [PROGRAM_NAME, path, "--election", "E1"];
        let args = cli().try_get_matches_from(command_line).unwrap();
        assert_eq!(run(&args), 0);

        let command_line = [PROGRAM_NAME, "-e", "E2", path];
        let args = cli().try_get_matches_from(command_line).unwrap();
        assert_eq!(run(&args), 1);

        let command_line = [PROGRAM_NAME, "not a real file"];
        let args = cli().try_get_matches_from(command_line).unwrap();
        assert_eq!(run(&args), 1);

        let garbage = dir.path().join("garbage.jsonl");
        std::fs::write(&garbage, "this is not json\n").unwrap();
        let command_line = [PROGRAM_NAME, garbage.to_str().unwrap()];
        let args = cli().try_get_matches_from(command_line).unwrap();
        assert_eq!(run(&args), 1);

        edit(Path::new(path), r#""seq":4,"#, r#""seq":5,"#);
        let command_line = [PROGRAM_NAME, path];
        let args = cli().try_get_matches_from(command_line).unwrap();
        assert_eq!(run(&args), 255);
    }

    #[test]
    fn bad_cli_usage() {
        // Something very wrong.
        let command_line = [PROGRAM_NAME, "this", "invocation", "is", "incorrect"];
        cli().try_get_matches_from(command_line).unwrap_err();

        // No options at all.
        let command_line = [PROGRAM_NAME];
        cli().try_get_matches_from(command_line).unwrap_err();

        // Election without an ID.
        let command_line = [PROGRAM_NAME, "ledger.jsonl", "--election"];
        cli().try_get_matches_from(command_line).unwrap_err();
    }
}
