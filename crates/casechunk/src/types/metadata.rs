//! Case-identifying metadata found in a decision's front matter

use serde::{Deserialize, Serialize};

/// Placeholder emitted for any field that could not be found
pub const UNKNOWN: &str = "unknown";

/// Case metadata attached to every chunk of a document.
///
/// A missing field stays `None`; it is rendered as [`UNKNOWN`] only at the
/// output boundary, never stored as a fabricated value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaseMetadata {
    /// Docket number with its original punctuation, e.g. "1,234,567"
    pub docket_number: Option<String>,
    /// Claimant name, single-spaced upper case
    pub claimant_name: Option<String>,
    /// Respondent (employer), single-spaced upper case
    pub respondent: Option<String>,
}

impl CaseMetadata {
    pub fn docket_number_or_unknown(&self) -> &str {
        self.docket_number.as_deref().unwrap_or(UNKNOWN)
    }

    pub fn claimant_name_or_unknown(&self) -> &str {
        self.claimant_name.as_deref().unwrap_or(UNKNOWN)
    }

    /// Names of the fields that could not be extracted
    pub fn missing_fields(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.docket_number.is_none() {
            missing.push("docket_number");
        }
        if self.claimant_name.is_none() {
            missing.push("claimant_name");
        }
        if self.respondent.is_none() {
            missing.push("respondent");
        }
        missing
    }

    /// Context header prefixed to every chunk body
    pub fn context_header(&self, section: &str) -> String {
        format!(
            "Case: {} | Claimant: {}\nSection: {}\n\n",
            self.docket_number_or_unknown(),
            self.claimant_name_or_unknown(),
            section
        )
    }
}
