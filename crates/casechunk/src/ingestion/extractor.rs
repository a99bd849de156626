//! Page text extraction from PDF files

use std::path::Path;

use crate::error::{Error, Result};

/// Produces the ordered per-page text of a document.
///
/// The pipeline only depends on this trait; [`PdfExtractor`] is the production
/// implementation.
pub trait PageExtractor: Send + Sync {
    /// Extract one plain-text string per page, in page order
    fn extract_pages(&self, path: &Path) -> Result<Vec<String>>;
}

/// PDF extractor backed by lopdf, with pdf-extract as a whole-document fallback
#[derive(Debug, Clone, Copy, Default)]
pub struct PdfExtractor;

impl PdfExtractor {
    pub fn new() -> Self {
        Self
    }

    fn extract_per_page(filename: &str, doc: &lopdf::Document) -> Vec<String> {
        let pages = doc.get_pages();
        let mut texts = Vec::with_capacity(pages.len());

        for page_num in pages.keys() {
            match doc.extract_text(&[*page_num]) {
                Ok(text) => texts.push(cleanup_pdf_text(&text)),
                Err(e) => {
                    tracing::debug!("{}: no text for page {}: {}", filename, page_num, e);
                    texts.push(String::new());
                }
            }
        }

        texts
    }

    fn extract_whole_document(filename: &str, data: &[u8]) -> Result<String> {
        pdf_extract::extract_text_from_mem(data)
            .map(|text| cleanup_pdf_text(&text))
            .map_err(|e| Error::extraction(filename, format!("pdf-extract failed: {}", e)))
    }
}

impl PageExtractor for PdfExtractor {
    fn extract_pages(&self, path: &Path) -> Result<Vec<String>> {
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());

        let data = std::fs::read(path)
            .map_err(|e| Error::extraction(&filename, format!("cannot read file: {}", e)))?;

        let doc = lopdf::Document::load_mem(&data)
            .map_err(|e| Error::extraction(&filename, format!("failed to load PDF: {}", e)))?;

        if doc.is_encrypted() {
            return Err(Error::extraction(&filename, "PDF is encrypted"));
        }

        let pages = Self::extract_per_page(&filename, &doc);
        if pages.iter().any(|p| !p.trim().is_empty()) {
            return Ok(pages);
        }

        tracing::warn!("{}: per-page extraction produced no text, trying fallback", filename);
        let text = Self::extract_whole_document(&filename, &data)?;
        if text.trim().is_empty() {
            return Err(Error::extraction(
                &filename,
                "no extractable text (image-only or scanned PDF without OCR layer)",
            ));
        }

        Ok(vec![text])
    }
}

/// Normalise PDF glyph artifacts to plain text.
///
/// Removes NUL bytes and maps ligatures, smart quotes, dashes and non-breaking
/// spaces to their ASCII equivalents so the heading and metadata patterns see
/// ordinary characters.
pub fn cleanup_pdf_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '\0' => {}
            '\u{2010}' | '\u{2011}' | '\u{2012}' | '\u{2013}' | '\u{2212}' => out.push('-'),
            '\u{2014}' | '\u{2015}' => out.push_str("--"),
            '\u{2018}' | '\u{2019}' | '\u{201A}' => out.push('\''),
            '\u{201C}' | '\u{201D}' | '\u{201E}' => out.push('"'),
            '\u{2022}' => out.push_str("* "),
            '\u{2026}' => out.push_str("..."),
            '\u{00A0}' | '\u{2002}' | '\u{2003}' | '\u{2009}' => out.push(' '),
            '\u{FB00}' => out.push_str("ff"),
            '\u{FB01}' => out.push_str("fi"),
            '\u{FB02}' => out.push_str("fl"),
            '\u{FB03}' => out.push_str("ffi"),
            '\u{FB04}' => out.push_str("ffl"),
            '\r' => {}
            other => out.push(other),
        }
    }
    out
}
