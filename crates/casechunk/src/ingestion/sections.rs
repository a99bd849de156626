//! Section heading detection and section body cleanup

use once_cell::sync::Lazy;
use regex::Regex;
use std::borrow::Cow;

use crate::types::{Section, SectionLabel};

/// Whole-line headings are short; a longer line can only open with an inline heading
const MAX_HEADING_LINE_CHARS: usize = 80;

/// A recognized heading, as a line of its own or as an uppercase lead-in
/// followed by `:` and body text on the same line
struct HeadingPattern {
    label: SectionLabel,
    line: Regex,
    inline: Regex,
}

/// Heading patterns in priority order. When two match the same line the
/// earlier one wins.
static HEADING_PATTERNS: Lazy<Vec<HeadingPattern>> = Lazy::new(|| {
    [
        (r"APPEARANCES?", SectionLabel::Appearances),
        (r"RECORD\s*(?:AND|&)\s*STIPULATIONS?", SectionLabel::RecordAndStipulations),
        (r"ISSUES?", SectionLabel::Issues),
        (
            r"FINDINGS?\s*OF\s*FACTS?(?:\s*(?:AND|&)\s*CONCLUSIONS?\s*OF\s*LAW)?",
            SectionLabel::FindingsOfFact,
        ),
        (
            r"PRINCIPLES?\s*OF\s*LAW(?:\s*(?:AND|&)\s*ANALYSIS)?",
            SectionLabel::PrinciplesOfLaw,
        ),
        (r"CONCLUSIONS?\s*OF\s*LAW", SectionLabel::ConclusionsOfLaw),
        (r"ANALYSIS", SectionLabel::Analysis),
        (r"CONCLUSIONS?", SectionLabel::Conclusion),
        (r"AWARD", SectionLabel::Award),
        (r"ORDER", SectionLabel::Order),
        (r"DECISION", SectionLabel::Decision),
    ]
    .into_iter()
    .map(|(words, label)| HeadingPattern {
        label,
        line: heading_regex(words),
        inline: inline_heading_regex(words),
    })
    .collect()
});

static HYPHENATED_BREAK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"([A-Za-z])-[ \t]*\n[ \t]*([a-z])").expect("Invalid hyphenation regex"));

static PARAGRAPH_BREAK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\n[ \t]*(?:\n[ \t]*)+").expect("Invalid paragraph regex"));

/// A heading must fill its line, allowing an outline marker ("I.", "2)", "A.")
/// and stray whitespace or punctuation from OCR around it.
fn heading_regex(words: &str) -> Regex {
    let pattern = format!(
        r"(?i)^[\s\p{{P}}]*(?:(?:[IVXLC]+|\d{{1,2}}|[A-Z])[.)]\s*)?{}[\s\p{{P}}]*$",
        words
    );
    Regex::new(&pattern).expect("Invalid heading regex")
}

/// Case-sensitive, so prose such as "Order: the parties..." is not a heading.
/// The text after the colon is captured.
fn inline_heading_regex(words: &str) -> Regex {
    let pattern = format!(
        r"^[\s\p{{P}}]*(?:(?:[IVXLC]+|\d{{1,2}}|[A-Z])[.)]\s*)?{}[ \t]*:[ \t]*(\S.*)$",
        words
    );
    Regex::new(&pattern).expect("Invalid heading regex")
}

/// Splits a document into labeled sections at recognized heading lines
#[derive(Debug, Clone, Copy, Default)]
pub struct SectionDetector;

impl SectionDetector {
    pub fn new() -> Self {
        Self
    }

    /// Detect sections. The returned spans are ordered, contiguous and cover
    /// `[0, full_text.len())` exactly; text before the first heading (or the
    /// whole text when no heading is found) is one `UNLABELED` section.
    pub fn detect(&self, full_text: &str) -> Vec<Section> {
        let boundaries = Self::heading_boundaries(full_text);

        if boundaries.is_empty() {
            tracing::debug!("No section headings found, treating document as UNLABELED");
            return vec![Section::new(SectionLabel::Unlabeled, 0, full_text.len())];
        }

        let mut sections = Vec::with_capacity(boundaries.len() + 1);
        if boundaries[0].0 > 0 {
            sections.push(Section::new(SectionLabel::Unlabeled, 0, boundaries[0].0));
        }

        for (i, &(start, label)) in boundaries.iter().enumerate() {
            let end = boundaries
                .get(i + 1)
                .map(|&(next, _)| next)
                .unwrap_or(full_text.len());
            sections.push(Section::new(label, start, end));
        }

        sections
    }

    /// Line-start offsets of heading lines with their labels, in document order
    fn heading_boundaries(full_text: &str) -> Vec<(usize, SectionLabel)> {
        let mut boundaries = Vec::new();
        let mut offset = 0usize;

        for raw_line in full_text.split_inclusive('\n') {
            let line = raw_line.trim_end_matches(['\n', '\r']);

            if !line.trim().is_empty() {
                let short = line.chars().count() <= MAX_HEADING_LINE_CHARS;
                if let Some(heading) = HEADING_PATTERNS
                    .iter()
                    .find(|h| (short && h.line.is_match(line)) || h.inline.is_match(line))
                {
                    boundaries.push((offset, heading.label));
                }
            }

            offset += raw_line.len();
        }

        boundaries
    }
}

/// Prepare a section span for chunking.
///
/// Drops the heading of labeled sections (the whole line, or only the lead-in
/// of an inline heading), joins words hyphenated across line breaks, and
/// reflows each paragraph onto a single line while keeping blank-line
/// paragraph breaks.
pub fn clean_section_text(label: SectionLabel, span: &str) -> String {
    let body: Cow<'_, str> = if label == SectionLabel::Unlabeled {
        Cow::Borrowed(span)
    } else {
        let (first, rest) = span.split_once('\n').unwrap_or((span, ""));
        let first = first.trim_end_matches('\r');

        match inline_tail(label, first) {
            Some(tail) => Cow::Owned(format!("{}\n{}", tail, rest)),
            None => Cow::Borrowed(rest),
        }
    };

    let joined = HYPHENATED_BREAK.replace_all(&body, "$1$2");

    PARAGRAPH_BREAK
        .split(joined.trim())
        .map(|para| para.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|para| !para.is_empty())
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Body text following an inline `label` heading on `line`
fn inline_tail(label: SectionLabel, line: &str) -> Option<&str> {
    let heading = HEADING_PATTERNS.iter().find(|h| h.label == label)?;
    if heading.line.is_match(line) {
        return None;
    }
    heading
        .inline
        .captures(line)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn labels(sections: &[Section]) -> Vec<SectionLabel> {
        sections.iter().map(|s| s.label).collect()
    }

    #[test]
    fn test_two_sections_scenario() {
        let text = "APPEARANCES\nMr. Smith for claimant.\n\nFINDINGS OF FACT\nThe claimant sustained an injury...";
        let sections = SectionDetector::new().detect(text);

        assert_eq!(
            labels(&sections),
            vec![SectionLabel::Appearances, SectionLabel::FindingsOfFact]
        );
        assert_eq!(sections[0].text(text), "APPEARANCES\nMr. Smith for claimant.\n\n");
        assert_eq!(
            sections[1].text(text),
            "FINDINGS OF FACT\nThe claimant sustained an injury..."
        );
    }

    #[test]
    fn test_preamble_is_unlabeled() {
        let text = "BEFORE THE APPEALS BOARD\nDocket No. 1\nORDER\nAffirmed.";
        let sections = SectionDetector::new().detect(text);

        assert_eq!(labels(&sections), vec![SectionLabel::Unlabeled, SectionLabel::Order]);
        assert_eq!(sections[0].text(text), "BEFORE THE APPEALS BOARD\nDocket No. 1\n");
    }

    #[test]
    fn test_no_headings_is_single_unlabeled_section() {
        let text = "Just some prose without any structure.";
        let sections = SectionDetector::new().detect(text);

        assert_eq!(sections, vec![Section::new(SectionLabel::Unlabeled, 0, text.len())]);
    }

    #[test]
    fn test_ocr_noise_and_outline_markers() {
        let text = "intro\n  I.  Findings   of  Fact :\nbody\n-- AWARD --\nmore\n2. CONCLUSIONS OF LAW\nend\r\nIssue.\n";
        let sections = SectionDetector::new().detect(text);

        assert_eq!(
            labels(&sections),
            vec![
                SectionLabel::Unlabeled,
                SectionLabel::FindingsOfFact,
                SectionLabel::Award,
                SectionLabel::ConclusionsOfLaw,
                SectionLabel::Issues,
            ]
        );
    }

    #[test]
    fn test_priority_prefers_longer_heading() {
        let text = "PRINCIPLES OF LAW AND ANALYSIS\nx\nANALYSIS\ny";
        let sections = SectionDetector::new().detect(text);

        assert_eq!(
            labels(&sections),
            vec![SectionLabel::PrinciplesOfLaw, SectionLabel::Analysis]
        );
    }

    #[test]
    fn test_prose_starting_with_heading_word_is_not_a_heading() {
        let text = "ORDER\nThe Order of the Board is affirmed.\nDecision of the judge stands.";
        let sections = SectionDetector::new().detect(text);

        assert_eq!(labels(&sections), vec![SectionLabel::Order]);
    }

    #[test]
    fn test_duplicate_headings_are_kept_in_order() {
        let text = "ISSUES\na\nISSUES\nb\n";
        let sections = SectionDetector::new().detect(text);

        assert_eq!(labels(&sections), vec![SectionLabel::Issues, SectionLabel::Issues]);
        assert_eq!(sections[1].text(text), "ISSUES\nb\n");
    }

    #[test]
    fn test_inline_heading_with_colon() {
        let text = "intro\nFINDINGS OF FACT: The claimant was injured.\nAWARD\nGranted.";
        let sections = SectionDetector::new().detect(text);

        assert_eq!(
            labels(&sections),
            vec![SectionLabel::Unlabeled, SectionLabel::FindingsOfFact, SectionLabel::Award]
        );
        assert_eq!(
            clean_section_text(SectionLabel::FindingsOfFact, sections[1].text(text)),
            "The claimant was injured."
        );
    }

    #[test]
    fn test_mixed_case_lead_in_is_prose() {
        let text = "ORDER\nOrder: the parties shall confer.\nDecision: pending.";
        let sections = SectionDetector::new().detect(text);

        assert_eq!(labels(&sections), vec![SectionLabel::Order]);
    }

    #[test]
    fn test_clean_section_text() {
        let span = "FINDINGS OF FACT\nThe claimant sus-\ntained an   injury\nat work.\n\n  Second   paragraph.\n";
        assert_eq!(
            clean_section_text(SectionLabel::FindingsOfFact, span),
            "The claimant sustained an injury at work.\n\nSecond paragraph."
        );
    }

    #[test]
    fn test_clean_heading_only_section_is_empty() {
        assert_eq!(clean_section_text(SectionLabel::Award, "AWARD\n\n"), "");
        assert_eq!(clean_section_text(SectionLabel::Award, "AWARD"), "");
    }

    #[test]
    fn test_clean_unlabeled_keeps_first_line() {
        assert_eq!(
            clean_section_text(SectionLabel::Unlabeled, "Kansas Board\nDocket No. 5\n"),
            "Kansas Board Docket No. 5"
        );
    }

    proptest! {
        #[test]
        fn prop_sections_cover_text_exactly(
            lines in proptest::collection::vec(
                prop_oneof![
                    Just("APPEARANCES".to_string()),
                    Just("FINDINGS OF FACT".to_string()),
                    Just("  award:".to_string()),
                    Just(String::new()),
                    "[a-zA-Z .,é]{0,40}",
                ],
                0..30,
            )
        ) {
            let text = lines.join("\n");
            let sections = SectionDetector::new().detect(&text);

            prop_assert!(!sections.is_empty());
            prop_assert_eq!(sections[0].start_offset, 0);
            prop_assert_eq!(sections.last().unwrap().end_offset, text.len());
            for pair in sections.windows(2) {
                prop_assert_eq!(pair[0].end_offset, pair[1].start_offset);
            }

            let rebuilt: String = sections.iter().map(|s| s.text(&text)).collect();
            prop_assert_eq!(rebuilt, text);
        }
    }
}
