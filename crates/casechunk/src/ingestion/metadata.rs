//! Case metadata extraction from decision front matter

use once_cell::sync::Lazy;
use regex::Regex;

use crate::types::CaseMetadata;

/// Docket number patterns, most specific first
static DOCKET_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    compile(&[
        r"(?i)\bDocket\s+(?:No\.?|Number|#)\s*:?\s*(\d(?:[\d,.\-]*\d)?)",
        r"\b((?:AP|CS)-\d+-\d+-\d+)\b",
        r"(?m)(?:^|\s)(\d{3},\d{3})(?:$|\s)",
    ])
});

/// Claimant name patterns
static CLAIMANT_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    compile(&[
        r"(?im)^[ \t]*Claimant[ \t]*:[ \t]*([A-Za-z][A-Za-z .'\-]*[A-Za-z.])",
        r"(?i)\bIN[ \t]+THE[ \t]+MATTER[ \t]+OF(?:[ \t]+THE[ \t]+CLAIM[ \t]+OF)?[ \t:]*\n?[ \t]*([A-Za-z][A-Za-z .'\-]*[A-Za-z.])",
        r"(?m)^[ \t]*([A-Z][A-Z \t.']*[A-Z.])[ \t]*\)[ \t]*\n[ \t]*Claimant",
        r"(?m)^[ \t]*([A-Z][A-Z \t.']*[A-Z.])[ \t]+(?:vs|VS)\.",
        r"BEFORE\s+THE\s+[A-Z\s]+?\s+APPEALS\s+BOARD\s+([A-Z][A-Z \t.']*[A-Z.])",
    ])
});

/// Respondent patterns
static RESPONDENT_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    compile(&[
        r"(?im)^[ \t]*Respondents?[ \t]*:[ \t]*([A-Za-z0-9][A-Za-z0-9 .,&'\-]*[A-Za-z0-9.])",
        r"VS\.[ \t]*\)[ \t]*\n(?:[ \t]*\)[^\n]*\n)?[ \t]*([A-Z][A-Z0-9 \t.,&'\-]*[A-Z0-9.])",
        r"\b(?:vs|VS|v)\.[ \t]+([A-Z][A-Za-z0-9 .,&'\-]*[A-Za-z0-9.])",
    ])
});

/// Words that end a caption name rather than belong to it
const ROLE_WORDS: &[&str] = &[
    "CLAIMANT", "RESPONDENT", "RESPONDENTS", "EMPLOYER", "INSURANCE", "CARRIER", "AND",
];

/// Words that show a candidate is boilerplate, not a person or company
const BOILERPLATE_WORDS: &[&str] = &["BOARD", "COMPENSATION", "DOCKET", "APPEALS", "DIVISION"];

fn compile(patterns: &[&str]) -> Vec<Regex> {
    patterns
        .iter()
        .map(|p| Regex::new(p).expect("Invalid metadata regex"))
        .collect()
}

/// Extracts docket number, claimant and respondent from the start of a document
#[derive(Debug, Clone)]
pub struct MetadataExtractor {
    prefix_window_chars: usize,
}

impl MetadataExtractor {
    pub fn new(prefix_window_chars: usize) -> Self {
        Self {
            prefix_window_chars,
        }
    }

    /// Extract case metadata. Every field is independent: a miss yields `None`
    /// for that field only.
    pub fn extract(&self, full_text: &str) -> CaseMetadata {
        let window = prefix(full_text, self.prefix_window_chars);

        let meta = CaseMetadata {
            docket_number: first_capture(&DOCKET_PATTERNS, window, |s| Some(s.trim().to_string())),
            claimant_name: first_capture(&CLAIMANT_PATTERNS, window, normalize_claimant),
            respondent: first_capture(&RESPONDENT_PATTERNS, window, normalize_respondent),
        };

        let missing = meta.missing_fields();
        if !missing.is_empty() {
            tracing::debug!("Metadata fields not found: {}", missing.join(", "));
        }

        meta
    }
}

impl Default for MetadataExtractor {
    fn default() -> Self {
        Self::new(6000)
    }
}

/// First `max_chars` characters of `text`
fn prefix(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// Try each pattern in order and return the first capture the validator accepts
fn first_capture(
    patterns: &[Regex],
    text: &str,
    validate: impl Fn(&str) -> Option<String>,
) -> Option<String> {
    patterns.iter().find_map(|re| {
        re.captures_iter(text)
            .filter_map(|cap| cap.get(1))
            .find_map(|m| validate(m.as_str()))
    })
}

/// Single-space, uppercase, strip surrounding punctuation and trailing role words
fn normalize_name(raw: &str) -> Option<String> {
    let mut words: Vec<String> = raw
        .split_whitespace()
        .map(|w| w.to_uppercase())
        .collect();

    while let Some(last) = words.last() {
        let bare = last.trim_matches(|c: char| !c.is_alphanumeric());
        if bare.is_empty() || ROLE_WORDS.contains(&bare) {
            words.pop();
        } else {
            break;
        }
    }

    let name = words.join(" ");
    let name = name.trim_matches(|c: char| !c.is_alphanumeric() && c != '.');
    let name = name.trim_start_matches('.');

    if !name.chars().any(|c| c.is_alphabetic()) {
        return None;
    }
    if name
        .split_whitespace()
        .any(|w| BOILERPLATE_WORDS.contains(&w.trim_matches(|c: char| !c.is_alphanumeric())))
    {
        return None;
    }

    Some(name.to_string())
}

fn normalize_claimant(raw: &str) -> Option<String> {
    let name = normalize_name(raw)?;
    if name.chars().any(|c| c.is_ascii_digit()) || name.split_whitespace().count() < 2 {
        return None;
    }
    Some(name)
}

fn normalize_respondent(raw: &str) -> Option<String> {
    let name = normalize_name(raw)?;
    if name.chars().filter(|c| c.is_alphanumeric()).count() < 2 {
        return None;
    }
    Some(name)
}
