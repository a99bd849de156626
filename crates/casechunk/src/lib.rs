//! casechunk: section-aware chunking of legal decision PDFs
//!
//! Turns a directory of workers' compensation appeal decisions into a JSONL
//! stream of bounded, self-describing text chunks for an embedding pipeline.
//! Each document is split into its canonical sections (APPEARANCES, FINDINGS
//! OF FACT, AWARD, ...) and every chunk carries the case metadata found in the
//! document's front matter.
//!
//! Batch runs are resumable: a file is marked complete only after all of its
//! chunks are durably written, and a resumed run rolls the output back to the
//! last completed file before continuing.

pub mod config;
pub mod error;
pub mod ingestion;
pub mod processing;
pub mod types;

pub use config::PipelineConfig;
pub use error::{Error, Result};
pub use ingestion::{
    DocumentPipeline, MetadataExtractor, PageExtractor, PdfExtractor, SectionDetector,
    TextChunker,
};
pub use processing::{OutputSink, ResumableOrchestrator, RunSummary, StopHandle, WorkItem};
pub use types::{CaseMetadata, Chunk, ChunkRecord, RawDocument, Section, SectionLabel};
