//! Write-ahead journal of committed transitions.
//!
//! The journal is a JSON-lines file. Each line holds one transition together with a
//! SHA-256 digest chained to the line before it, so that any edit, reordering or
//! deletion short of truncating the tail is detected on open.

use std::fs::{File, OpenOptions};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

use data_encoding::HEXLOWER;
use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::error::Error;
use crate::model::command::Transition;

type Digest32 = [u8; 32];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum JournalError {
    #[error("Journal I/O error: {0}")]
    Io(String),
    #[error("Malformed journal entry on line {line}: {message}")]
    Format { line: usize, message: String },
    #[error("Journal chain broken at entry {seq}")]
    BrokenChain { seq: u64 },
    #[error("Out of sequence transition: expected {expected}, found {found}")]
    Sequence { expected: u64, found: u64 },
    #[error("Journal entry {seq} was rejected on replay: {source}")]
    Replay { seq: u64, source: Box<Error> },
}

impl From<io::Error> for JournalError {
    fn from(err: io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

/// One line of the journal.
#[derive(Serialize, Deserialize)]
struct Entry {
    seq: u64,
    /// Digest of the previous entry; absent on the first.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    prev: Option<String>,
    digest: String,
    /// Kept as raw JSON so the digest covers exactly the stored bytes.
    transition: Box<RawValue>,
}

fn chain_digest(prev: Option<&Digest32>, transition: &str) -> Digest32 {
    let mut hasher = Sha256::new();
    if let Some(prev) = prev {
        hasher.update(prev);
    }
    hasher.update(transition.as_bytes());
    hasher.finalize().into()
}

/// The verified contents of a journal file.
struct Verified {
    transitions: Vec<Transition>,
    /// Length of the file up to the end of the last complete line.
    good_len: u64,
    last_digest: Option<Digest32>,
    /// Whether there were unterminated bytes after `good_len`.
    torn: bool,
}

fn verify(contents: &[u8]) -> Result<Verified, JournalError> {
    let mut verified = Verified {
        transitions: Vec::new(),
        good_len: 0,
        last_digest: None,
        torn: false,
    };
    let mut offset = 0;
    let mut line_no = 0;

    while offset < contents.len() {
        let rest = &contents[offset..];
        let Some(end) = rest.iter().position(|&b| b == b'\n') else {
            verified.torn = true;
            break;
        };
        let line = &rest[..end];
        offset += end + 1;
        line_no += 1;
        if line.iter().all(u8::is_ascii_whitespace) {
            verified.good_len = offset as u64;
            continue;
        }

        let format_err = |err: serde_json::Error| JournalError::Format {
            line: line_no,
            message: err.to_string(),
        };
        let entry: Entry = serde_json::from_slice(line).map_err(format_err)?;
        let expected = verified.transitions.len() as u64;
        if entry.seq != expected {
            return Err(JournalError::Sequence {
                expected,
                found: entry.seq,
            });
        }

        let expected_prev = verified.last_digest.map(|d| HEXLOWER.encode(&d));
        let digest = chain_digest(verified.last_digest.as_ref(), entry.transition.get());
        if entry.prev != expected_prev || entry.digest != HEXLOWER.encode(&digest) {
            return Err(JournalError::BrokenChain { seq: entry.seq });
        }

        let transition: Transition =
            serde_json::from_str(entry.transition.get()).map_err(format_err)?;
        if transition.seq != entry.seq {
            return Err(JournalError::BrokenChain { seq: entry.seq });
        }
        verified.transitions.push(transition);
        verified.last_digest = Some(digest);
        verified.good_len = offset as u64;
    }
    Ok(verified)
}

/// Read and verify a journal without modifying it. A torn trailing line is ignored.
pub fn read_entries(path: impl AsRef<Path>) -> Result<Vec<Transition>, JournalError> {
    let contents = std::fs::read(path)?;
    Ok(verify(&contents)?.transitions)
}

/// An open journal, positioned for appending.
#[derive(Debug)]
pub struct Journal {
    file: File,
    path: PathBuf,
    /// Length of the file, all of it complete entries.
    len: u64,
    sync: bool,
    last_digest: Option<Digest32>,
    next_seq: u64,
    /// Set when a failed append could not be rolled back. The file then ends in a
    /// partial entry, so nothing more may be appended after it.
    poisoned: bool,
    #[cfg(test)]
    fault: Option<Fault>,
}

/// Failures a test can inject into the next append.
#[cfg(test)]
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub(crate) enum Fault {
    /// The write stops halfway through the line.
    TornWrite,
    /// As `TornWrite`, and cutting the partial line off fails too.
    TornWriteNoRollback,
}

impl Journal {
    /// Open or create a journal, verify it and return every transition in it.
    ///
    /// A torn trailing line, left by a crash mid-append, is truncated away.
    pub fn open(
        path: impl AsRef<Path>,
        sync: bool,
    ) -> Result<(Self, Vec<Transition>), JournalError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let mut file = OpenOptions::new()
            .read(true)
            .append(true)
            .create(true)
            .open(path)?;
        let mut contents = Vec::new();
        file.read_to_end(&mut contents)?;

        let verified = verify(&contents)?;
        if verified.torn {
            warn!(
                "Discarding {} bytes of torn entry at the end of journal {}",
                contents.len() as u64 - verified.good_len,
                path.display()
            );
            file.set_len(verified.good_len)?;
            file.sync_all()?;
        }
        info!(
            "Opened journal {} with {} entries",
            path.display(),
            verified.transitions.len()
        );

        let journal = Self {
            file,
            path: path.to_path_buf(),
            len: verified.good_len,
            sync,
            last_digest: verified.last_digest,
            next_seq: verified.transitions.len() as u64,
            poisoned: false,
            #[cfg(test)]
            fault: None,
        };
        Ok((journal, verified.transitions))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of entries in the journal.
    pub fn entries(&self) -> u64 {
        self.next_seq
    }

    /// Append a transition. The transition is durable once this returns `Ok`; on error
    /// the file is cut back to its previous length.
    ///
    /// If the rollback fails too, the journal refuses every later append.
    pub fn append(&mut self, transition: &Transition) -> Result<(), JournalError> {
        if self.poisoned {
            return Err(JournalError::Io(format!(
                "journal {} ends in a partial entry and accepts no more appends",
                self.path.display()
            )));
        }
        if transition.seq != self.next_seq {
            return Err(JournalError::Sequence {
                expected: self.next_seq,
                found: transition.seq,
            });
        }
        let raw = serde_json::value::to_raw_value(transition).map_err(|err| JournalError::Format {
            line: self.next_seq as usize + 1,
            message: err.to_string(),
        })?;
        let digest = chain_digest(self.last_digest.as_ref(), raw.get());
        let entry = Entry {
            seq: transition.seq,
            prev: self.last_digest.map(|d| HEXLOWER.encode(&d)),
            digest: HEXLOWER.encode(&digest),
            transition: raw,
        };
        let mut line = serde_json::to_vec(&entry).map_err(|err| JournalError::Format {
            line: self.next_seq as usize + 1,
            message: err.to_string(),
        })?;
        line.push(b'\n');

        if let Err(err) = self.write_line(&line) {
            error!(
                "Failed to append entry {} to journal {}: {err}",
                transition.seq,
                self.path.display()
            );
            if let Err(err) = self.roll_back() {
                error!(
                    "Failed to roll back journal {}, refusing further appends: {err}",
                    self.path.display()
                );
                self.poisoned = true;
            }
            return Err(err.into());
        }

        self.len += line.len() as u64;
        self.last_digest = Some(digest);
        self.next_seq += 1;
        trace!("Journalled entry {}", transition.seq);
        Ok(())
    }

    fn write_line(&mut self, line: &[u8]) -> io::Result<()> {
        #[cfg(test)]
        if self.fault.is_some() {
            self.file.write_all(&line[..line.len() / 2])?;
            return Err(io::Error::new(io::ErrorKind::Other, "injected torn write"));
        }
        self.file.write_all(line)?;
        if self.sync {
            self.file.sync_data()?;
        }
        Ok(())
    }

    /// Cut the file back to its last complete entry.
    fn roll_back(&mut self) -> io::Result<()> {
        #[cfg(test)]
        if self.fault.take() == Some(Fault::TornWriteNoRollback) {
            return Err(io::Error::new(io::ErrorKind::Other, "injected rollback failure"));
        }
        self.file.set_len(self.len)?;
        if self.sync {
            self.file.sync_data()?;
        }
        Ok(())
    }

    #[cfg(test)]
    pub(crate) fn inject(&mut self, fault: Fault) {
        self.fault = Some(fault);
    }
}
