//! Output chunks and their JSONL record form

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::document::SectionLabel;
use super::metadata::CaseMetadata;

/// Where a section's chunks come from: shared by every chunk of the section
#[derive(Debug, Clone)]
pub struct ChunkSource {
    /// Filename of the originating document
    pub filename: Arc<str>,
    /// Metadata of the originating document
    pub metadata: Arc<CaseMetadata>,
    /// 1-based page on which the section starts
    pub page: u32,
}

impl ChunkSource {
    pub fn new(filename: Arc<str>, metadata: Arc<CaseMetadata>, page: u32) -> Self {
        Self {
            filename,
            metadata,
            page,
        }
    }
}

/// A bounded, self-describing passage of one section
#[derive(Debug, Clone)]
pub struct Chunk {
    /// Context header followed by the chunk body
    pub text: String,
    /// Byte range of the body within the chunked section text
    pub body_start: usize,
    pub body_end: usize,
    /// Zero-based position within the section's chunk sequence
    pub chunk_index: usize,
    /// Number of chunks produced for the section
    pub chunk_count: usize,
    /// Label of the originating section
    pub source_section: SectionLabel,
    /// Filename of the originating document
    pub source_document: Arc<str>,
    /// 1-based page on which the originating section starts
    pub page: u32,
    /// Document metadata shared by all chunks of the document
    pub metadata: Arc<CaseMetadata>,
}

impl Chunk {
    /// Chunk text without its context header
    pub fn body(&self) -> &str {
        let header_len = self.header().len();
        &self.text[header_len..]
    }

    /// The context header this chunk was rendered with
    pub fn header(&self) -> String {
        self.metadata.context_header(self.source_section.as_str())
    }

    /// Serializable JSONL form
    pub fn to_record(&self) -> ChunkRecord {
        ChunkRecord {
            text: self.text.clone(),
            metadata: ChunkRecordMetadata {
                docket_number: self.metadata.docket_number_or_unknown().to_string(),
                claimant_name: self.metadata.claimant_name_or_unknown().to_string(),
                respondent_name: self.metadata.respondent.clone(),
                section: self.source_section,
                chunk_index: self.chunk_index,
                chunk_count: self.chunk_count,
                page: self.page,
                filename: self.source_document.to_string(),
            },
        }
    }
}

/// One line of the JSONL output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkRecord {
    pub text: String,
    pub metadata: ChunkRecordMetadata,
}

/// Metadata object of a JSONL record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkRecordMetadata {
    pub docket_number: String,
    pub claimant_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub respondent_name: Option<String>,
    pub section: SectionLabel,
    pub chunk_index: usize,
    pub chunk_count: usize,
    pub page: u32,
    pub filename: String,
}
