//! Section headings and how to find them in a response.
//!
//! Responses follow a numbered template such as:
//!
//! ```text
//! 1. **FINAL TEXT:**
//! ...
//! 2. **QUALITY REPORT:**
//! { ... }
//! ```
//!
//! The labels live in a [`SectionTable`], so a template change is a data
//! change. Headings match case-insensitively with optional `#` markers,
//! `N.`/`N)` numbering and markdown emphasis, followed by a colon or the end
//! of the line.

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;

/// Sections the extractor understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SectionKind {
    FinalText,
    QualityReport,
    Issues,
    Suggestions,
    CulturalNotes,
    GlossarySuggestions,
    ChapterMemory,
    ChapterSummary,
    FormattingReport,
    ReadabilityScore,
}

impl SectionKind {
    pub const ALL: [SectionKind; 10] = [
        SectionKind::FinalText,
        SectionKind::QualityReport,
        SectionKind::Issues,
        SectionKind::Suggestions,
        SectionKind::CulturalNotes,
        SectionKind::GlossarySuggestions,
        SectionKind::ChapterMemory,
        SectionKind::ChapterSummary,
        SectionKind::FormattingReport,
        SectionKind::ReadabilityScore,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SectionKind::FinalText => "final text",
            SectionKind::QualityReport => "quality report",
            SectionKind::Issues => "issues",
            SectionKind::Suggestions => "suggestions",
            SectionKind::CulturalNotes => "cultural notes",
            SectionKind::GlossarySuggestions => "glossary suggestions",
            SectionKind::ChapterMemory => "chapter memory",
            SectionKind::ChapterSummary => "chapter summary",
            SectionKind::FormattingReport => "formatting report",
            SectionKind::ReadabilityScore => "readability score",
        }
    }
}

impl std::fmt::Display for SectionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Heading labels per section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SectionTable {
    labels: Vec<(SectionKind, Vec<String>)>,
}

impl Default for SectionTable {
    fn default() -> Self {
        let table: [(SectionKind, &[&str]); 10] = [
            (
                SectionKind::FinalText,
                &["FINAL TEXT", "FINAL TRANSLATION", "TRANSLATION", "OCR TEXT", "EXTRACTED TEXT"],
            ),
            (SectionKind::QualityReport, &["QUALITY REPORT"]),
            (SectionKind::Issues, &["ISSUES"]),
            (SectionKind::Suggestions, &["SUGGESTIONS"]),
            (SectionKind::CulturalNotes, &["CULTURAL NOTES"]),
            (SectionKind::GlossarySuggestions, &["GLOSSARY SUGGESTIONS"]),
            (SectionKind::ChapterMemory, &["CHAPTER MEMORY"]),
            (SectionKind::ChapterSummary, &["CHAPTER SUMMARY"]),
            (SectionKind::FormattingReport, &["FORMATTING REPORT"]),
            (SectionKind::ReadabilityScore, &["READABILITY SCORE"]),
        ];
        Self {
            labels: table
                .into_iter()
                .map(|(kind, labels)| (kind, labels.iter().map(|l| l.to_string()).collect()))
                .collect(),
        }
    }
}

impl SectionTable {
    /// Table with no sections.
    pub fn empty() -> Self {
        Self { labels: Vec::new() }
    }

    /// Replace the labels recognised for `kind`.
    pub fn with_labels<I, S>(mut self, kind: SectionKind, labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let labels: Vec<String> = labels
            .into_iter()
            .map(Into::into)
            .map(|l| l.trim().to_string())
            .filter(|l| !l.is_empty())
            .collect();
        self.labels.retain(|(k, _)| *k != kind);
        if !labels.is_empty() {
            self.labels.push((kind, labels));
        }
        self
    }

    pub fn labels(&self, kind: SectionKind) -> &[String] {
        self.labels
            .iter()
            .find(|(k, _)| *k == kind)
            .map(|(_, labels)| labels.as_slice())
            .unwrap_or(&[])
    }

    /// True if `text` (ignoring case, emphasis and a trailing colon) is one
    /// of the known labels.
    pub fn is_label(&self, text: &str) -> bool {
        let cleaned = normalize_label(text);
        !cleaned.is_empty()
            && self
                .labels
                .iter()
                .flat_map(|(_, labels)| labels)
                .any(|l| normalize_label(l) == cleaned)
    }

    pub(crate) fn compile(&self) -> Result<SectionMatcher, regex::Error> {
        let mut by_label: HashMap<String, SectionKind> = HashMap::new();
        let mut all: Vec<&str> = Vec::new();
        for (kind, labels) in &self.labels {
            for label in labels {
                by_label.entry(normalize_label(label)).or_insert(*kind);
                all.push(label.as_str());
            }
        }
        // Longest first so "FINAL TRANSLATION" wins over "TRANSLATION".
        all.sort_by_key(|l| std::cmp::Reverse(l.len()));

        let heading = if all.is_empty() {
            None
        } else {
            let alternation = all
                .iter()
                .map(|l| {
                    l.split_whitespace()
                        .map(regex::escape)
                        .collect::<Vec<_>>()
                        .join(r"[ \t]+")
                })
                .collect::<Vec<_>>()
                .join("|");
            Some(Regex::new(&format!(
                r"(?im)^[ \t]*(?:#{{1,6}}[ \t]*)?(?:\d{{1,2}}[.)][ \t]*)?(?:[*_]{{1,3}}[ \t]*)?(?P<label>{})[ \t]*(?:[*_]{{1,3}})?[ \t]*(?::[ \t]*(?:[*_]{{1,3}})?|$)",
                alternation
            ))?)
        };

        Ok(SectionMatcher { heading, by_label })
    }
}

/// Upper-case label with emphasis, hashes, numbering and colons removed.
fn normalize_label(text: &str) -> String {
    let trimmed = text
        .trim_start_matches(|c: char| {
            matches!(c, '#' | '*' | '_' | '.' | ')') || c.is_ascii_digit() || c.is_whitespace()
        })
        .trim_end_matches(|c: char| matches!(c, '*' | '_' | ':') || c.is_whitespace());
    trimmed
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_uppercase()
}

/// Numbered upper-case heading not in the table, e.g. `7. TONE NOTES:`.
static GENERIC_HEADING: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?m)^[ \t]*(?:#{1,6}[ \t]*)?\d{1,2}[.)][ \t]*(?:[*_]{1,3}[ \t]*)?[A-Z][A-Z0-9 &/'-]{2,}[ \t]*(?:[*_]{1,3})?[ \t]*:",
    )
    .expect("generic heading pattern should compile")
});

/// A located heading.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Heading {
    pub kind: SectionKind,
    /// Byte offset where the heading line starts.
    pub start: usize,
    /// Byte offset where the section content starts.
    pub content_start: usize,
}

/// Compiled form of a [`SectionTable`].
#[derive(Debug, Clone)]
pub(crate) struct SectionMatcher {
    heading: Option<Regex>,
    by_label: HashMap<String, SectionKind>,
}

/// Sections found in one response.
#[derive(Debug, Clone, Default)]
pub(crate) struct LocatedSections<'a> {
    sections: HashMap<SectionKind, &'a str>,
    first_heading: Option<usize>,
}

impl<'a> LocatedSections<'a> {
    /// Trimmed content of `kind`, if its heading was found.
    pub fn get(&self, kind: SectionKind) -> Option<&'a str> {
        self.sections.get(&kind).copied()
    }

    /// Content of `kind` when present and non-empty.
    pub fn non_empty(&self, kind: SectionKind) -> Option<&'a str> {
        self.get(kind).filter(|s| !s.is_empty())
    }

    /// Offset of the first known heading.
    pub fn first_heading(&self) -> Option<usize> {
        self.first_heading
    }
}

impl SectionMatcher {
    pub fn headings(&self, text: &str) -> Vec<Heading> {
        let Some(re) = &self.heading else {
            return Vec::new();
        };
        re.captures_iter(text)
            .filter_map(|caps| {
                let whole = caps.get(0)?;
                let label = caps.name("label")?;
                let kind = *self.by_label.get(&normalize_label(label.as_str()))?;
                Some(Heading {
                    kind,
                    start: whole.start(),
                    content_start: whole.end(),
                })
            })
            .collect()
    }

    /// Split `text` into sections. A section runs to the next known heading,
    /// the next numbered upper-case heading, or the end of the text. The
    /// first occurrence of a section wins.
    pub fn locate<'a>(&self, text: &'a str) -> LocatedSections<'a> {
        let headings = self.headings(text);
        let mut boundaries: Vec<usize> = headings.iter().map(|h| h.start).collect();
        boundaries.extend(GENERIC_HEADING.find_iter(text).map(|m| m.start()));
        boundaries.sort_unstable();
        boundaries.dedup();

        let mut located = LocatedSections {
            sections: HashMap::new(),
            first_heading: headings.first().map(|h| h.start),
        };
        for heading in &headings {
            if located.sections.contains_key(&heading.kind) {
                continue;
            }
            let end = boundaries
                .iter()
                .copied()
                .find(|&b| b >= heading.content_start)
                .unwrap_or(text.len());
            located
                .sections
                .insert(heading.kind, text[heading.content_start..end].trim());
        }
        located
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matcher() -> SectionMatcher {
        SectionTable::default().compile().unwrap()
    }

    #[test]
    fn test_heading_variants() {
        let m = matcher();
        for text in [
            "1. **FINAL TEXT:**\nbody",
            "1) FINAL TEXT:\nbody",
            "## Final Text\nbody",
            "**Final Text**: body",
            "final text: body",
            "  2. __FINAL TRANSLATION:__ body",
        ] {
            let located = m.locate(text);
            assert_eq!(located.get(SectionKind::FinalText), Some("body"), "input: {:?}", text);
        }
    }

    #[test]
    fn test_label_inside_sentence_is_not_heading() {
        let m = matcher();
        let located = m.locate("The final text: was long\nand the issues were many");
        assert!(located.get(SectionKind::FinalText).is_none());
        assert!(located.first_heading().is_none());
    }

    #[test]
    fn test_section_ends_at_next_heading() {
        let m = matcher();
        let text = "1. **FINAL TEXT:**\nHello\nWorld\n2. **QUALITY REPORT:**\n{}\n3. **ISSUES:**\n- one";
        let located = m.locate(text);
        assert_eq!(located.get(SectionKind::FinalText), Some("Hello\nWorld"));
        assert_eq!(located.get(SectionKind::QualityReport), Some("{}"));
        assert_eq!(located.get(SectionKind::Issues), Some("- one"));
        assert_eq!(located.first_heading(), Some(0));
    }

    #[test]
    fn test_unknown_numbered_heading_is_boundary() {
        let m = matcher();
        let text = "1. FINAL TEXT:\nHello\n2. TONE NOTES:\nkeep it casual";
        assert_eq!(m.locate(text).get(SectionKind::FinalText), Some("Hello"));
    }

    #[test]
    fn test_first_occurrence_wins() {
        let m = matcher();
        let text = "ISSUES:\n- first\nISSUES:\n- second";
        assert_eq!(m.locate(text).get(SectionKind::Issues), Some("- first"));
    }

    #[test]
    fn test_custom_labels() {
        let table = SectionTable::default().with_labels(SectionKind::FinalText, ["RESULT"]);
        let m = table.compile().unwrap();
        assert_eq!(m.locate("1. RESULT:\nok").get(SectionKind::FinalText), Some("ok"));
        assert!(m.locate("1. FINAL TEXT:\nok").get(SectionKind::FinalText).is_none());
    }

    #[test]
    fn test_is_label() {
        let table = SectionTable::default();
        assert!(table.is_label("**ISSUES:**"));
        assert!(table.is_label("3. Cultural Notes"));
        assert!(!table.is_label("Honorifics dropped"));
    }
}
