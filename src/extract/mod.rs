//! Structured extraction of model responses.
//!
//! The model is asked for a numbered, sectioned answer: the final text, then
//! a quality report (usually a JSON object) and optional dedicated sections.
//! Model output drifts, so extraction never fails. Every field falls back
//! along the chain JSON value → scraped field → dedicated section → default,
//! and each fallback taken is recorded as a [`Degradation`].

pub mod formatting;
mod fields;
mod report;
mod sections;

pub use formatting::check_formatting;
pub use report::{
    EntityType, ExtractedReport, FormattingReport, Gender, GlossarySuggestion, QualityReport, Role,
    DEFAULT_READABILITY_SCORE,
};
pub use sections::{SectionKind, SectionTable};

use std::panic::AssertUnwindSafe;
use std::sync::LazyLock;

use serde_json::Value;
use tracing::{debug, warn};

use fields::JsonFields;
use sections::{LocatedSections, SectionMatcher};

static DEFAULT_EXTRACTOR: LazyLock<Extractor> = LazyLock::new(Extractor::default);

/// Parse `raw` with the default section table.
pub fn extract(raw: &str) -> ExtractedReport {
    DEFAULT_EXTRACTOR.extract(raw)
}

/// Parse `raw` with the default section table and report fallbacks taken.
pub fn extract_with_diagnostics(raw: &str) -> Extraction {
    DEFAULT_EXTRACTOR.extract_with_diagnostics(raw)
}

/// How the primary text was obtained when its heading was missing or empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrimaryFallback {
    /// Response opened with a page delimiter; text up to the first heading.
    PageDelimited,
    /// Entire trimmed response.
    WholeResponse,
}

/// A soft parsing fallback. Never an error for the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Degradation {
    EmptyResponse,
    PrimaryText(PrimaryFallback),
    MalformedPayload { section: SectionKind, error: String },
    FieldsScraped { section: SectionKind, fields: Vec<&'static str> },
    DefaultReadability,
    /// Extraction panicked; the all-default report was returned.
    Recovered(String),
}

impl std::fmt::Display for Degradation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Degradation::EmptyResponse => write!(f, "empty response"),
            Degradation::PrimaryText(PrimaryFallback::PageDelimited) => {
                write!(f, "primary text taken from page-delimited opening")
            }
            Degradation::PrimaryText(PrimaryFallback::WholeResponse) => {
                write!(f, "primary text taken from whole response")
            }
            Degradation::MalformedPayload { section, error } => {
                write!(f, "malformed {} payload: {}", section, error)
            }
            Degradation::FieldsScraped { section, fields } => {
                write!(f, "scraped {} from {}", fields.join(", "), section)
            }
            Degradation::DefaultReadability => write!(f, "readability score defaulted"),
            Degradation::Recovered(message) => write!(f, "recovered from parser failure: {}", message),
        }
    }
}

/// Report plus the fallbacks taken to build it.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Extraction {
    pub report: ExtractedReport,
    pub degradations: Vec<Degradation>,
}

impl Extraction {
    pub fn is_clean(&self) -> bool {
        self.degradations.is_empty()
    }
}

/// Values recovered by field scraping after a strict parse failed.
#[derive(Debug, Default)]
struct Scraped {
    memory: Option<String>,
    summary: Option<String>,
    score: Option<u8>,
}

impl Scraped {
    fn from_text(text: &str) -> Self {
        let (memory, summary) = fields::scrape_notes(text);
        Self {
            memory,
            summary,
            score: fields::scrape_score(text),
        }
    }

    fn field_names(&self) -> Vec<&'static str> {
        let mut names = Vec::new();
        if self.memory.is_some() {
            names.push("chapterMemory");
        }
        if self.summary.is_some() {
            names.push("chapterSummary");
        }
        if self.score.is_some() {
            names.push("readabilityScore");
        }
        names
    }
}

/// Extractor over a configurable section table.
#[derive(Debug, Clone)]
pub struct Extractor {
    table: SectionTable,
    matcher: SectionMatcher,
}

impl Default for Extractor {
    fn default() -> Self {
        Self::new(SectionTable::default()).expect("default section table should compile")
    }
}

impl Extractor {
    pub fn new(table: SectionTable) -> Result<Self, regex::Error> {
        let matcher = table.compile()?;
        Ok(Self { table, matcher })
    }

    pub fn table(&self) -> &SectionTable {
        &self.table
    }

    pub fn extract(&self, raw: &str) -> ExtractedReport {
        self.extract_with_diagnostics(raw).report
    }

    pub fn extract_with_diagnostics(&self, raw: &str) -> Extraction {
        match std::panic::catch_unwind(AssertUnwindSafe(|| self.run(raw))) {
            Ok(extraction) => extraction,
            Err(_) => {
                warn!("Extraction failed unexpectedly; returning default report");
                Extraction {
                    report: ExtractedReport::default(),
                    degradations: vec![Degradation::Recovered(
                        "panic during extraction".to_string(),
                    )],
                }
            }
        }
    }

    fn run(&self, raw: &str) -> Extraction {
        let normalized = raw.replace("\r\n", "\n");
        let text = normalized.trim();
        let mut degradations = Vec::new();

        if text.is_empty() {
            debug!("Empty response; using default report");
            degradations.push(Degradation::EmptyResponse);
            return Extraction {
                report: ExtractedReport::default(),
                degradations,
            };
        }

        let sections = self.matcher.locate(text);
        let final_text = self.primary_text(text, &sections, &mut degradations);
        let quality_report = self.quality_report(&sections, &mut degradations);

        Extraction {
            report: ExtractedReport {
                final_text,
                quality_report,
            },
            degradations,
        }
    }

    fn primary_text(
        &self,
        text: &str,
        sections: &LocatedSections<'_>,
        degradations: &mut Vec<Degradation>,
    ) -> String {
        if let Some(body) = sections.non_empty(SectionKind::FinalText) {
            return body.to_string();
        }
        debug!("No final text section found; falling back");

        if formatting::starts_with_page_delimiter(text) {
            let end = sections.first_heading().unwrap_or(text.len());
            let body = text[..end].trim();
            if !body.is_empty() {
                degradations.push(Degradation::PrimaryText(PrimaryFallback::PageDelimited));
                return body.to_string();
            }
        }

        degradations.push(Degradation::PrimaryText(PrimaryFallback::WholeResponse));
        text.to_string()
    }

    fn quality_report(
        &self,
        sections: &LocatedSections<'_>,
        degradations: &mut Vec<Degradation>,
    ) -> QualityReport {
        let table = &self.table;
        let mut json: Option<Value> = None;
        let mut scraped = Scraped::default();

        if let Some(section) = sections.non_empty(SectionKind::QualityReport) {
            match fields::parse_payload(section) {
                Some(Ok(value)) if value.is_object() => json = Some(value),
                Some(Ok(_)) => {
                    warn!("Quality report payload is not an object; scraping fields");
                    degradations.push(Degradation::MalformedPayload {
                        section: SectionKind::QualityReport,
                        error: "payload is not an object".to_string(),
                    });
                    scraped = Scraped::from_text(section);
                }
                Some(Err(e)) => {
                    warn!("Quality report payload is malformed ({}); scraping fields", e);
                    degradations.push(Degradation::MalformedPayload {
                        section: SectionKind::QualityReport,
                        error: e.to_string(),
                    });
                    scraped = Scraped::from_text(section);
                }
                None => {
                    debug!("Quality report has no structured payload; scraping fields");
                    scraped = Scraped::from_text(section);
                }
            }
            let names = scraped.field_names();
            if !names.is_empty() {
                degradations.push(Degradation::FieldsScraped {
                    section: SectionKind::QualityReport,
                    fields: names,
                });
            }
        } else {
            debug!("No quality report section found");
        }

        let json = json.as_ref().and_then(JsonFields::new);
        let list = |keys: &[&str], kind: SectionKind| -> Vec<String> {
            json.as_ref()
                .and_then(|j| j.list(keys, table))
                .or_else(|| sections.non_empty(kind).map(|s| fields::split_list(s, table)))
                .unwrap_or_default()
        };
        let note = |keys: &[&str], scraped: Option<String>, kind: SectionKind| -> String {
            json.as_ref()
                .and_then(|j| j.string(keys))
                .or(scraped)
                .or_else(|| sections.non_empty(kind).map(str::to_string))
                .unwrap_or_default()
        };

        let issues = list(&["issues"], SectionKind::Issues);
        let suggestions = list(&["suggestions"], SectionKind::Suggestions);
        let cultural_notes = list(&["culturalNotes", "cultural_notes"], SectionKind::CulturalNotes);
        let chapter_memory = note(
            &["chapterMemory", "chapter_memory"],
            scraped.memory.take(),
            SectionKind::ChapterMemory,
        );
        let chapter_summary = note(
            &["chapterSummary", "chapter_summary"],
            scraped.summary.take(),
            SectionKind::ChapterSummary,
        );

        let glossary_suggestions = json
            .as_ref()
            .and_then(|j| j.glossary(&["glossarySuggestions", "glossary_suggestions", "glossary"]))
            .or_else(|| {
                sections
                    .non_empty(SectionKind::GlossarySuggestions)
                    .map(|s| self.section_glossary(s, degradations))
            })
            .unwrap_or_default();

        let formatting = json
            .as_ref()
            .and_then(|j| j.formatting(&["formatting", "formattingReport", "formatting_report"]))
            .or_else(|| {
                sections
                    .non_empty(SectionKind::FormattingReport)
                    .and_then(|s| match fields::parse_payload(s) {
                        Some(Ok(value)) => fields::formatting_from_value(&value),
                        _ => fields::parse_formatting_lines(s),
                    })
            })
            .unwrap_or_default();

        let readability_score = json
            .as_ref()
            .and_then(|j| j.score(&["readabilityScore", "readability_score", "readability"]))
            .or(scraped.score)
            .or_else(|| {
                sections
                    .non_empty(SectionKind::ReadabilityScore)
                    .and_then(fields::parse_score)
            });
        if readability_score.is_none() {
            degradations.push(Degradation::DefaultReadability);
        }

        QualityReport {
            issues,
            suggestions,
            cultural_notes,
            glossary_suggestions,
            chapter_memory,
            chapter_summary,
            formatting,
            readability_score: fields::score_or_default(readability_score),
        }
    }

    fn section_glossary(
        &self,
        section: &str,
        degradations: &mut Vec<Degradation>,
    ) -> Vec<GlossarySuggestion> {
        match fields::parse_payload(section) {
            Some(Ok(value)) => fields::glossary_from_value(&value),
            Some(Err(e)) => {
                warn!("Glossary payload is malformed ({}); reading lines", e);
                degradations.push(Degradation::MalformedPayload {
                    section: SectionKind::GlossarySuggestions,
                    error: e.to_string(),
                });
                fields::parse_glossary_lines(section)
            }
            None => fields::parse_glossary_lines(section),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEMPLATE: &str = r#"1. **FINAL TEXT:**
[Page 1]
Ji-woo: Run!
[SFX] BOOM

2. **QUALITY REPORT:**
```json
{
  "issues": ["Exclamation feels flat"],
  "suggestions": ["Use 'Move it!'"],
  "culturalNotes": ["Kept honorific -ssi"],
  "glossarySuggestions": [
    {"source": "지우", "target": "Ji-woo", "entityType": "character", "gender": "female", "role": "protagonist"}
  ],
  "chapterMemory": "Ji-woo escaped the tower.",
  "chapterSummary": "An explosion frees the captives.",
  "formatting": {"tagConsistency": true, "pageHeadersPresent": true, "missingTags": []},
  "readabilityScore": 93
}
```
"#;

    #[test]
    fn test_template_round_trip() {
        let extraction = extract_with_diagnostics(TEMPLATE);
        assert!(extraction.is_clean(), "{:?}", extraction.degradations);

        let report = extraction.report;
        assert_eq!(report.final_text, "[Page 1]\nJi-woo: Run!\n[SFX] BOOM");
        let q = &report.quality_report;
        assert_eq!(q.issues, vec!["Exclamation feels flat"]);
        assert_eq!(q.suggestions, vec!["Use 'Move it!'"]);
        assert_eq!(q.cultural_notes, vec!["Kept honorific -ssi"]);
        assert_eq!(q.glossary_suggestions.len(), 1);
        assert_eq!(q.glossary_suggestions[0].gender, Some(Gender::Female));
        assert_eq!(q.chapter_memory, "Ji-woo escaped the tower.");
        assert_eq!(q.chapter_summary, "An explosion frees the captives.");
        assert!(q.formatting.is_clean());
        assert_eq!(q.readability_score, 93);
    }

    #[test]
    fn test_extract_is_idempotent() {
        assert_eq!(extract(TEMPLATE), extract(TEMPLATE));
        let messy = "## Translation\nhello\n**Issues**\n- a\n- b";
        assert_eq!(extract(messy), extract(messy));
    }

    #[test]
    fn test_dedicated_sections_fill_gaps() {
        let raw = "1. FINAL TRANSLATION:\nHi.\n2. ISSUES:\n- Typo on page 2\n3. CHAPTER MEMORY:\nThe sword is cursed.\n4. READABILITY SCORE: 77/100\n5. FORMATTING REPORT:\nTag consistency: no\nMissing tags: [Thought]";
        let report = extract(raw);
        assert_eq!(report.final_text, "Hi.");
        assert_eq!(report.quality_report.issues, vec!["Typo on page 2"]);
        assert_eq!(report.quality_report.chapter_memory, "The sword is cursed.");
        assert_eq!(report.quality_report.readability_score, 77);
        assert!(!report.quality_report.formatting.tag_consistency);
        assert_eq!(report.quality_report.formatting.missing_tags, vec!["[Thought]"]);
    }

    #[test]
    fn test_json_wins_over_dedicated_section() {
        let raw = "FINAL TEXT:\nx\nQUALITY REPORT:\n{\"issues\": [\"from json\"]}\nISSUES:\n- from section";
        assert_eq!(extract(raw).quality_report.issues, vec!["from json"]);
    }

    #[test]
    fn test_page_delimited_fallback() {
        let raw = "[Page 1]\nHello\n[Page 2]\nBye\n\nQUALITY REPORT:\n{\"readabilityScore\": 60}";
        let extraction = extract_with_diagnostics(raw);
        assert_eq!(extraction.report.final_text, "[Page 1]\nHello\n[Page 2]\nBye");
        assert_eq!(extraction.report.quality_report.readability_score, 60);
        assert!(extraction
            .degradations
            .contains(&Degradation::PrimaryText(PrimaryFallback::PageDelimited)));
    }

    #[test]
    fn test_glossary_section_lines() {
        let raw = "FINAL TEXT:\nx\nGLOSSARY SUGGESTIONS:\n- 마왕 → Demon King (character, male, antagonist)\n- 성검 → Holy Sword (item): legendary";
        let glossary = extract(raw).quality_report.glossary_suggestions;
        assert_eq!(glossary.len(), 2);
        assert_eq!(glossary[0].role, Some(Role::Antagonist));
        assert_eq!(glossary[1].note.as_deref(), Some("legendary"));
    }

    #[test]
    fn test_custom_table() {
        let table = SectionTable::default().with_labels(SectionKind::FinalText, ["OUTPUT"]);
        let extractor = Extractor::new(table).unwrap();
        assert_eq!(extractor.extract("1. OUTPUT:\ndone\n2. ISSUES:\n- none").final_text, "done");
    }

    #[test]
    fn test_crlf_input() {
        let raw = "1. FINAL TEXT:\r\nline one\r\nline two\r\n2. QUALITY REPORT:\r\n{}";
        assert_eq!(extract(raw).final_text, "line one\nline two");
    }
}
