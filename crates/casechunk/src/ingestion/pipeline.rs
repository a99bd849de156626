//! Per-document pipeline: extract, detect metadata and sections, chunk

use std::path::Path;
use std::sync::Arc;

use crate::config::PipelineConfig;
use crate::error::Result;
use crate::types::{Chunk, ChunkSource, RawDocument};

use super::chunker::TextChunker;
use super::extractor::{PageExtractor, PdfExtractor};
use super::metadata::MetadataExtractor;
use super::sections::{clean_section_text, SectionDetector};

/// Turns one file into its ordered chunk sequence
pub struct DocumentPipeline {
    extractor: Arc<dyn PageExtractor>,
    metadata: MetadataExtractor,
    detector: SectionDetector,
    chunker: TextChunker,
    clean_sections: bool,
}

impl DocumentPipeline {
    /// Create a pipeline around the given page extractor
    pub fn new(extractor: Arc<dyn PageExtractor>, config: &PipelineConfig) -> Result<Self> {
        Ok(Self {
            extractor,
            metadata: MetadataExtractor::new(config.metadata.prefix_window_chars),
            detector: SectionDetector::new(),
            chunker: TextChunker::from_config(&config.chunking)?,
            clean_sections: config.chunking.clean_sections,
        })
    }

    /// Create a pipeline that reads PDF files
    pub fn from_config(config: &PipelineConfig) -> Result<Self> {
        Self::new(Arc::new(PdfExtractor::new()), config)
    }

    /// Extract and chunk the file at `path`. Chunks are attributed to
    /// `filename`. Extraction failures are returned as-is; nothing else in the
    /// pipeline can fail.
    pub fn process(&self, path: &Path, filename: &str) -> Result<Vec<Chunk>> {
        let pages = self.extractor.extract_pages(path)?;
        let doc = RawDocument::from_pages(filename, pages);
        Ok(self.process_document(&doc))
    }

    /// Chunk an already extracted document, sections in document order
    pub fn process_document(&self, doc: &RawDocument) -> Vec<Chunk> {
        let full_text = doc.full_text();
        let metadata = Arc::new(self.metadata.extract(full_text));
        let filename: Arc<str> = Arc::from(doc.filename());

        let sections = self.detector.detect(full_text);
        let mut chunks = Vec::new();

        for section in &sections {
            let span = section.text(full_text);
            let source = ChunkSource::new(
                filename.clone(),
                metadata.clone(),
                doc.page_for_offset(section.start_offset),
            );

            if self.clean_sections {
                let cleaned = clean_section_text(section.label, span);
                chunks.extend(self.chunker.chunk(section, &cleaned, &source));
            } else {
                chunks.extend(self.chunker.chunk(section, span, &source));
            }
        }

        tracing::debug!(
            "{}: {} sections, {} chunks",
            doc.filename(),
            sections.len(),
            chunks.len()
        );

        chunks
    }
}
