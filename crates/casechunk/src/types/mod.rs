//! Core types: documents, sections, case metadata and chunks

pub mod chunk;
pub mod document;
pub mod metadata;

pub use chunk::{Chunk, ChunkRecord, ChunkRecordMetadata, ChunkSource};
pub use document::{RawDocument, Section, SectionLabel};
pub use metadata::{CaseMetadata, UNKNOWN};
