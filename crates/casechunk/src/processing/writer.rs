//! JSONL output and the shared, resumable output sink

use parking_lot::Mutex;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::types::{Chunk, ChunkRecord};

use super::state::{file_len, CompletionEntry, ProcessingState, StateLog};

/// Appends JSONL records to a file, one synced batch at a time
#[derive(Debug)]
pub struct JsonlWriter {
    path: PathBuf,
    file: File,
    len: u64,
}

impl JsonlWriter {
    /// Create or truncate the output file
    pub fn create(path: &Path) -> Result<Self> {
        let file = File::create(path).map_err(|e| Error::write(path.display().to_string(), e))?;
        Ok(Self {
            path: path.to_path_buf(),
            file,
            len: 0,
        })
    }

    /// Open the output for appending after its first `len` bytes; anything
    /// beyond is cut off
    pub fn open_at(path: &Path, len: u64) -> Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|e| Error::write(path.display().to_string(), e))?;

        file.set_len(len)
            .map_err(|e| Error::write(path.display().to_string(), e))?;

        Ok(Self {
            path: path.to_path_buf(),
            file,
            len,
        })
    }

    /// Write all records as one batch and sync them to disk.
    ///
    /// Returns the file length after the batch.
    pub fn write_batch(&mut self, records: &[ChunkRecord]) -> Result<u64> {
        let mut buf = Vec::new();
        for record in records {
            serde_json::to_writer(&mut buf, record)?;
            buf.push(b'\n');
        }

        self.file
            .write_all(&buf)
            .and_then(|_| self.file.sync_data())
            .map_err(|e| Error::write(self.path.display().to_string(), e))?;

        self.len += buf.len() as u64;
        Ok(self.len)
    }
}

struct SinkInner {
    writer: JsonlWriter,
    state_log: StateLog,
    state: ProcessingState,
    /// Set after a failed write; the sink accepts nothing afterwards
    poisoned: bool,
}

/// The run's single shared output: the JSONL file, the progress log next to
/// it, and the completion table they describe.
///
/// All three are updated under one lock, so a file's records are written
/// contiguously and its completion is recorded only after they are on disk.
pub struct OutputSink {
    output_path: PathBuf,
    failure_log_path: PathBuf,
    inner: Mutex<SinkInner>,
}

impl OutputSink {
    /// Open the sink for `output`.
    ///
    /// A fresh run truncates the output and its progress log. A resumed run
    /// loads the progress log and rolls the output back to the length the
    /// last completed file left it at.
    pub fn open(output: &Path, resume: bool) -> Result<Self> {
        let progress_path = Self::progress_path(output);

        let (writer, state_log, state) = if resume {
            Self::open_resumed(output, &progress_path)?
        } else {
            // Progress log first: an empty log next to stale output still resumes
            let state_log = StateLog::create(&progress_path)?;
            (JsonlWriter::create(output)?, state_log, ProcessingState::new())
        };

        Ok(Self {
            output_path: output.to_path_buf(),
            failure_log_path: Self::failure_log_path(output),
            inner: Mutex::new(SinkInner {
                writer,
                state_log,
                state,
                poisoned: false,
            }),
        })
    }

    fn open_resumed(
        output: &Path,
        progress_path: &Path,
    ) -> Result<(JsonlWriter, StateLog, ProcessingState)> {
        let output_len = file_len(output)?.unwrap_or(0);

        let (state, valid_len) = match file_len(progress_path)? {
            Some(_) => ProcessingState::load(progress_path)?,
            None if output_len > 0 => {
                return Err(Error::state(
                    progress_path.display().to_string(),
                    format!(
                        "progress log is missing but {} already has content; run without resume to start over",
                        output.display()
                    ),
                ));
            }
            None => (ProcessingState::new(), 0),
        };

        let committed = state.committed_len();
        if output_len < committed {
            return Err(Error::state(
                progress_path.display().to_string(),
                format!(
                    "{} is {} bytes but {} bytes were recorded as complete",
                    output.display(),
                    output_len,
                    committed
                ),
            ));
        }
        if output_len > committed {
            tracing::warn!(
                "Discarding {} bytes of uncommitted output from {}",
                output_len - committed,
                output.display()
            );
        }

        tracing::info!(
            "Resuming: {} files already complete in {}",
            state.completed_count(),
            output.display()
        );

        Ok((
            JsonlWriter::open_at(output, committed)?,
            StateLog::open_at(progress_path, valid_len)?,
            state,
        ))
    }

    /// `<output>.progress.jsonl`
    pub fn progress_path(output: &Path) -> PathBuf {
        append_suffix(output, ".progress.jsonl")
    }

    /// `<output>.log`
    pub fn failure_log_path(output: &Path) -> PathBuf {
        append_suffix(output, ".log")
    }

    pub fn output_path(&self) -> &Path {
        &self.output_path
    }

    pub fn is_completed(&self, filename: &str) -> bool {
        self.inner.lock().state.is_completed(filename)
    }

    pub fn completed_count(&self) -> usize {
        self.inner.lock().state.completed_count()
    }

    /// Write a file's chunks as one batch, then record the file as complete.
    ///
    /// Returns the number of records written. Any write failure poisons the
    /// sink and is fatal for the run.
    pub fn commit(&self, filename: &str, chunks: &[Chunk]) -> Result<usize> {
        let mut inner = self.inner.lock();

        if inner.poisoned {
            return Err(Error::state(
                self.output_path.display().to_string(),
                "output is unusable after an earlier write failure",
            ));
        }
        if inner.state.is_completed(filename) {
            tracing::warn!("{} is already complete, not writing it again", filename);
            return Ok(0);
        }

        let records: Vec<ChunkRecord> = chunks.iter().map(Chunk::to_record).collect();

        let output_len = match inner.writer.write_batch(&records) {
            Ok(len) => len,
            Err(e) => {
                inner.poisoned = true;
                return Err(e);
            }
        };

        let entry = CompletionEntry::new(filename, records.len(), output_len);
        if let Err(e) = inner.state_log.append(&entry) {
            inner.poisoned = true;
            return Err(e);
        }
        inner.state.mark_completed(entry);

        Ok(records.len())
    }

    /// Append a per-file failure to `<output>.log`. Failures to log are only
    /// warned about, they never affect the run.
    pub fn record_failure(&self, filename: &str, reason: &str) {
        let line = format!(
            "{} ERROR {}: {}\n",
            chrono::Utc::now().to_rfc3339(),
            filename,
            reason
        );

        let result = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.failure_log_path)
            .and_then(|mut file| file.write_all(line.as_bytes()));

        if let Err(e) = result {
            tracing::warn!(
                "Could not write failure log {}: {}",
                self.failure_log_path.display(),
                e
            );
        }
    }
}

fn append_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut os = path.as_os_str().to_os_string();
    os.push(suffix);
    PathBuf::from(os)
}
