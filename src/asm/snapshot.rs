//! Snapshot file format for Baby machine state.
//!
//! A snapshot is plain text:
//! - 32 store lines in address order, each 32 bits in machine order
//!   (least significant bit first), optionally prefixed by `NN:`
//! - `ACC:` accumulator, same bit layout
//! - `CI:` control instruction as a decimal line number
//! - `STOP:` stop flag, `0` or `1`
//! - Lines starting with `;` are comments; blank lines are ignored
//!
//! Files holding only the 32 store lines are accepted; the registers then
//! default to zero and the stop flag to clear.

use crate::word::Word;
use crate::cpu::store::STORE_SIZE;
use serde::{Serialize, Deserialize};
use std::fmt;
use std::path::Path;
use thiserror::Error;

/// Complete machine state: store, accumulator, CI and stop flag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "SnapshotFields")]
pub struct Snapshot {
    pub store: [Word; STORE_SIZE],
    pub accumulator: Word,
    pub control_instruction: u8,
    pub stop: bool,
}

impl Snapshot {
    /// A cleared machine.
    pub fn new() -> Self {
        Self {
            store: [Word::ZERO; STORE_SIZE],
            accumulator: Word::ZERO,
            control_instruction: 0,
            stop: false,
        }
    }

    /// Build a snapshot from loose parts, checking sizes and ranges.
    pub fn from_parts(
        words: &[Word],
        accumulator: Word,
        control_instruction: u32,
        stop: bool,
    ) -> Result<Self, SnapshotError> {
        let store: [Word; STORE_SIZE] = words
            .try_into()
            .map_err(|_| SnapshotError::WrongWordCount { found: words.len() })?;

        if control_instruction as usize >= STORE_SIZE {
            return Err(SnapshotError::OutOfRangeValue {
                field: "CI",
                value: control_instruction as i64,
            });
        }

        Ok(Self {
            store,
            accumulator,
            control_instruction: control_instruction as u8,
            stop,
        })
    }

    /// Parse the text format.
    pub fn parse(text: &str) -> Result<Self, SnapshotError> {
        let mut words = Vec::with_capacity(STORE_SIZE);
        let mut accumulator = Word::ZERO;
        let mut control_instruction: u32 = 0;
        let mut stop = false;

        for (line_num, line) in text.lines().enumerate() {
            let line_num = line_num + 1;
            let trimmed = line.trim();

            // Skip empty lines and comments
            if trimmed.is_empty() || trimmed.starts_with(';') {
                continue;
            }

            let (tag, value) = match trimmed.split_once(':') {
                Some((tag, value)) => (Some(tag.trim()), value.trim()),
                None => (None, trimmed),
            };

            match tag.map(str::to_ascii_uppercase).as_deref() {
                Some("ACC") => {
                    accumulator = parse_word(value, line_num)?;
                }
                Some("CI") => {
                    control_instruction = value.parse::<i64>()
                        .map_err(|_| SnapshotError::Parse {
                            line: line_num,
                            message: format!("invalid CI value '{}'", value),
                        })
                        .and_then(|ci| {
                            u32::try_from(ci).map_err(|_| SnapshotError::OutOfRangeValue {
                                field: "CI",
                                value: ci,
                            })
                        })?;
                }
                Some("STOP") => {
                    stop = match value {
                        "0" => false,
                        "1" => true,
                        other => {
                            return Err(SnapshotError::Parse {
                                line: line_num,
                                message: format!("invalid STOP flag '{}'", other),
                            })
                        }
                    };
                }
                Some(addr) if addr.chars().all(|c| c.is_ascii_digit()) => {
                    let addr: usize = addr.parse().map_err(|_| SnapshotError::Parse {
                        line: line_num,
                        message: format!("invalid address '{}'", addr),
                    })?;
                    if addr != words.len() {
                        return Err(SnapshotError::Parse {
                            line: line_num,
                            message: format!("expected line {:02}, found {:02}", words.len(), addr),
                        });
                    }
                    words.push(parse_word(value, line_num)?);
                }
                None => {
                    words.push(parse_word(value, line_num)?);
                }
                Some(other) => {
                    return Err(SnapshotError::Parse {
                        line: line_num,
                        message: format!("unknown field '{}'", other),
                    });
                }
            }
        }

        Self::from_parts(&words, accumulator, control_instruction, stop)
    }
}

/// Unchecked deserialized form of [`Snapshot`].
#[derive(Deserialize)]
struct SnapshotFields {
    store: Vec<Word>,
    accumulator: Word,
    control_instruction: u32,
    stop: bool,
}

impl TryFrom<SnapshotFields> for Snapshot {
    type Error = SnapshotError;

    fn try_from(fields: SnapshotFields) -> Result<Self, SnapshotError> {
        Snapshot::from_parts(
            &fields.store,
            fields.accumulator,
            fields.control_instruction,
            fields.stop,
        )
    }
}

impl Default for Snapshot {
    fn default() -> Self {
        Self::new()
    }
}

/// The text format read by [`Snapshot::parse`].
impl fmt::Display for Snapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "; Manchester Baby snapshot")?;
        for (addr, word) in self.store.iter().enumerate() {
            writeln!(f, "{:02}: {}", addr, word)?;
        }
        writeln!(f, "ACC: {}", self.accumulator)?;
        writeln!(f, "CI: {}", self.control_instruction)?;
        writeln!(f, "STOP: {}", u8::from(self.stop))
    }
}

fn parse_word(value: &str, line_num: usize) -> Result<Word, SnapshotError> {
    Word::parse(value).map_err(|e| SnapshotError::Parse {
        line: line_num,
        message: e.to_string(),
    })
}

/// Load a snapshot file from disk.
pub fn load_snapshot_file<P: AsRef<Path>>(path: P) -> Result<Snapshot, SnapshotError> {
    let text = std::fs::read_to_string(path.as_ref())
        .map_err(|e| SnapshotError::Io(e.to_string()))?;
    let snapshot = Snapshot::parse(&text)?;
    log::info!("Loaded snapshot from {}", path.as_ref().display());
    Ok(snapshot)
}

/// Save a snapshot file to disk.
pub fn save_snapshot_file<P: AsRef<Path>>(path: P, snapshot: &Snapshot) -> Result<(), SnapshotError> {
    std::fs::write(path.as_ref(), snapshot.to_string())
        .map_err(|e| SnapshotError::Io(e.to_string()))?;
    log::info!("Saved snapshot to {}", path.as_ref().display());
    Ok(())
}

/// Errors that can occur while loading snapshots.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SnapshotError {
    #[error("snapshot has {found} store words, expected 32")]
    WrongWordCount { found: usize },

    #[error("{field} value {value} out of range")]
    OutOfRangeValue { field: &'static str, value: i64 },

    #[error("parse error on line {line}: {message}")]
    Parse { line: usize, message: String },

    #[error("I/O error: {0}")]
    Io(String),
}
