//! Batch processing: discovery, resumable output and the worker pool

mod discovery;
mod orchestrator;
mod state;
mod writer;

pub use discovery::{compile_pattern, dedupe, discover_files, resolve_file, WorkItem};
pub use orchestrator::{
    FileFailure, FileOutcome, ProgressFn, ResumableOrchestrator, RunSummary, StopHandle,
};
pub use state::{CompletionEntry, ProcessingState, StateLog};
pub use writer::{JsonlWriter, OutputSink};
