//! Document ingestion: text extraction, metadata, sections and chunking

mod chunker;
pub mod extractor;
mod metadata;
mod pipeline;
pub mod sections;

pub use chunker::TextChunker;
pub use extractor::{cleanup_pdf_text, PageExtractor, PdfExtractor};
pub use metadata::MetadataExtractor;
pub use pipeline::DocumentPipeline;
pub use sections::{clean_section_text, SectionDetector};
