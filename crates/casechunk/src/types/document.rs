//! Extracted documents and their labeled sections

use serde::{Deserialize, Serialize};
use std::fmt;

/// Canonical section headings of an appeal decision
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SectionLabel {
    #[serde(rename = "APPEARANCES")]
    Appearances,
    #[serde(rename = "RECORD AND STIPULATIONS")]
    RecordAndStipulations,
    #[serde(rename = "ISSUES")]
    Issues,
    #[serde(rename = "FINDINGS OF FACT")]
    FindingsOfFact,
    #[serde(rename = "PRINCIPLES OF LAW AND ANALYSIS")]
    PrinciplesOfLaw,
    #[serde(rename = "CONCLUSIONS OF LAW")]
    ConclusionsOfLaw,
    #[serde(rename = "ANALYSIS")]
    Analysis,
    #[serde(rename = "CONCLUSION")]
    Conclusion,
    #[serde(rename = "AWARD")]
    Award,
    #[serde(rename = "ORDER")]
    Order,
    #[serde(rename = "DECISION")]
    Decision,
    /// Text before the first recognized heading
    #[serde(rename = "UNLABELED")]
    Unlabeled,
}

impl SectionLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Appearances => "APPEARANCES",
            Self::RecordAndStipulations => "RECORD AND STIPULATIONS",
            Self::Issues => "ISSUES",
            Self::FindingsOfFact => "FINDINGS OF FACT",
            Self::PrinciplesOfLaw => "PRINCIPLES OF LAW AND ANALYSIS",
            Self::ConclusionsOfLaw => "CONCLUSIONS OF LAW",
            Self::Analysis => "ANALYSIS",
            Self::Conclusion => "CONCLUSION",
            Self::Award => "AWARD",
            Self::Order => "ORDER",
            Self::Decision => "DECISION",
            Self::Unlabeled => "UNLABELED",
        }
    }
}

impl fmt::Display for SectionLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A document's extracted text, page by page.
///
/// Immutable once built: `full_text` is the pages joined with `\n`, and the
/// start offset of every page is kept so any offset can be mapped back to its
/// page.
#[derive(Debug, Clone)]
pub struct RawDocument {
    filename: String,
    pages: Vec<String>,
    full_text: String,
    page_offsets: Vec<usize>,
}

impl RawDocument {
    pub fn from_pages(filename: impl Into<String>, pages: Vec<String>) -> Self {
        let mut full_text = String::with_capacity(pages.iter().map(|p| p.len() + 1).sum());
        let mut page_offsets = Vec::with_capacity(pages.len());

        for (i, page) in pages.iter().enumerate() {
            if i > 0 {
                full_text.push('\n');
            }
            page_offsets.push(full_text.len());
            full_text.push_str(page);
        }

        Self {
            filename: filename.into(),
            pages,
            full_text,
            page_offsets,
        }
    }

    pub fn filename(&self) -> &str {
        &self.filename
    }

    pub fn pages(&self) -> &[String] {
        &self.pages
    }

    pub fn full_text(&self) -> &str {
        &self.full_text
    }

    /// 1-based page containing the byte `offset` of `full_text`
    pub fn page_for_offset(&self, offset: usize) -> u32 {
        // The joining newline belongs to the preceding page.
        let idx = match self.page_offsets.binary_search(&offset) {
            Ok(i) => i,
            Err(i) => i.saturating_sub(1),
        };
        idx as u32 + 1
    }
}

/// A contiguous labeled span `[start_offset, end_offset)` of a document's text
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Section {
    pub label: SectionLabel,
    /// Byte offset of the first character (on a char boundary)
    pub start_offset: usize,
    /// Byte offset one past the last character
    pub end_offset: usize,
}

impl Section {
    pub fn new(label: SectionLabel, start_offset: usize, end_offset: usize) -> Self {
        Self {
            label,
            start_offset,
            end_offset,
        }
    }

    /// Slice of `full_text` covered by this section
    pub fn text<'a>(&self, full_text: &'a str) -> &'a str {
        &full_text[self.start_offset..self.end_offset]
    }
}
