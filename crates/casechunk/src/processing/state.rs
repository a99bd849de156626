//! Per-run completion state and its append-only progress log

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// One line of the progress log: a file whose chunks are durably written
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionEntry {
    pub filename: String,
    /// Number of records written for the file
    pub chunks: usize,
    /// Output length in bytes right after the file's records were synced
    pub output_len: u64,
    pub completed_at: DateTime<Utc>,
}

impl CompletionEntry {
    pub fn new(filename: impl Into<String>, chunks: usize, output_len: u64) -> Self {
        Self {
            filename: filename.into(),
            chunks,
            output_len,
            completed_at: Utc::now(),
        }
    }
}

/// Files completed so far and the output length they account for
#[derive(Debug, Clone, Default)]
pub struct ProcessingState {
    completed: HashMap<String, CompletionEntry>,
    committed_len: u64,
}

impl ProcessingState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a progress log.
    ///
    /// Returns the state together with the byte length of the log's valid
    /// prefix. A torn last line (crash mid-append) is dropped; a malformed
    /// line anywhere else is a State error.
    pub fn load(path: &Path) -> Result<(Self, u64)> {
        let raw = std::fs::read(path).map_err(|e| {
            Error::state(path.display().to_string(), format!("cannot read progress log: {}", e))
        })?;

        let mut state = Self::new();
        let mut valid_len = 0u64;
        let mut lines = raw.split_inclusive(|&b| b == b'\n').peekable();

        // Parsed as bytes: a crash can cut the last line inside a multi-byte char
        while let Some(line) = lines.next() {
            let is_last = lines.peek().is_none();
            let complete = line.ends_with(b"\n");

            match serde_json::from_slice::<CompletionEntry>(line) {
                Ok(entry) if complete => {
                    state.mark_completed(entry);
                    valid_len += line.len() as u64;
                }
                Err(e) if !is_last => {
                    return Err(Error::state(
                        path.display().to_string(),
                        format!("malformed progress entry: {}", e),
                    ));
                }
                _ => {
                    tracing::warn!(
                        "Dropping torn last line of progress log {}",
                        path.display()
                    );
                }
            }
        }

        Ok((state, valid_len))
    }

    pub fn is_completed(&self, filename: &str) -> bool {
        self.completed.contains_key(filename)
    }

    pub fn get(&self, filename: &str) -> Option<&CompletionEntry> {
        self.completed.get(filename)
    }

    pub fn mark_completed(&mut self, entry: CompletionEntry) {
        self.committed_len = self.committed_len.max(entry.output_len);
        self.completed.insert(entry.filename.clone(), entry);
    }

    pub fn completed_count(&self) -> usize {
        self.completed.len()
    }

    /// Output length covered by completed files; anything past it is uncommitted
    pub fn committed_len(&self) -> u64 {
        self.committed_len
    }
}

/// Append-only writer for the progress log
#[derive(Debug)]
pub struct StateLog {
    path: PathBuf,
    file: File,
}

impl StateLog {
    /// Start an empty progress log, discarding any previous one
    pub fn create(path: &Path) -> Result<Self> {
        let file = File::create(path).map_err(|e| Error::write(path.display().to_string(), e))?;
        Ok(Self {
            path: path.to_path_buf(),
            file,
        })
    }

    /// Reopen an existing progress log for appending after its first `valid_len` bytes
    pub fn open_at(path: &Path, valid_len: u64) -> Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|e| Error::write(path.display().to_string(), e))?;

        file.set_len(valid_len)
            .map_err(|e| Error::write(path.display().to_string(), e))?;

        Ok(Self {
            path: path.to_path_buf(),
            file,
        })
    }

    /// Append one entry and sync it to disk
    pub fn append(&mut self, entry: &CompletionEntry) -> Result<()> {
        let mut line = serde_json::to_vec(entry)?;
        line.push(b'\n');

        self.file
            .write_all(&line)
            .and_then(|_| self.file.sync_data())
            .map_err(|e| Error::write(self.path.display().to_string(), e))
    }
}

/// Length of `path`, or `None` if it does not exist
pub(crate) fn file_len(path: &Path) -> Result<Option<u64>> {
    match std::fs::metadata(path) {
        Ok(meta) => Ok(Some(meta.len())),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(Error::Io(e)),
    }
}
