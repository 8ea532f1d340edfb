//! Typed result of parsing one model response.

use serde::{Deserialize, Serialize};

/// Readability score used when the response carries none.
pub const DEFAULT_READABILITY_SCORE: u8 = 85;

/// Primary text plus the quality report that accompanies it.
///
/// Every field has a safe default, so a report can always be rendered even
/// when the response was malformed or empty.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ExtractedReport {
    /// Final translation or OCR text.
    pub final_text: String,
    pub quality_report: QualityReport,
}

impl ExtractedReport {
    pub fn has_text(&self) -> bool {
        !self.final_text.trim().is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct QualityReport {
    pub issues: Vec<String>,
    pub suggestions: Vec<String>,
    pub cultural_notes: Vec<String>,
    pub glossary_suggestions: Vec<GlossarySuggestion>,
    /// Running notes carried into the next chapter's prompt.
    pub chapter_memory: String,
    pub chapter_summary: String,
    pub formatting: FormattingReport,
    /// 0..=100.
    pub readability_score: u8,
}

impl Default for QualityReport {
    fn default() -> Self {
        Self {
            issues: Vec::new(),
            suggestions: Vec::new(),
            cultural_notes: Vec::new(),
            glossary_suggestions: Vec::new(),
            chapter_memory: String::new(),
            chapter_summary: String::new(),
            formatting: FormattingReport::default(),
            readability_score: DEFAULT_READABILITY_SCORE,
        }
    }
}

/// Formatting consistency flags. Defaults report no problem.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FormattingReport {
    pub tag_consistency: bool,
    pub page_headers_present: bool,
    pub missing_tags: Vec<String>,
}

impl Default for FormattingReport {
    fn default() -> Self {
        Self {
            tag_consistency: true,
            page_headers_present: true,
            missing_tags: Vec::new(),
        }
    }
}

impl FormattingReport {
    pub fn is_clean(&self) -> bool {
        self.tag_consistency && self.page_headers_present && self.missing_tags.is_empty()
    }

    /// Combine two reports, keeping every problem either one found.
    pub fn merge(&self, other: &FormattingReport) -> FormattingReport {
        let mut missing_tags = self.missing_tags.clone();
        for tag in &other.missing_tags {
            if !missing_tags.contains(tag) {
                missing_tags.push(tag.clone());
            }
        }
        FormattingReport {
            tag_consistency: self.tag_consistency && other.tag_consistency && missing_tags.is_empty(),
            page_headers_present: self.page_headers_present && other.page_headers_present,
            missing_tags,
        }
    }
}

/// A proposed glossary entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GlossarySuggestion {
    pub source: String,
    pub target: String,
    #[serde(default)]
    pub entity_type: EntityType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gender: Option<Gender>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl GlossarySuggestion {
    pub fn new(source: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            entity_type: EntityType::default(),
            gender: None,
            role: None,
            note: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityType {
    Character,
    Place,
    Organization,
    Skill,
    Item,
    #[default]
    Term,
    Other,
}

impl EntityType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityType::Character => "character",
            EntityType::Place => "place",
            EntityType::Organization => "organization",
            EntityType::Skill => "skill",
            EntityType::Item => "item",
            EntityType::Term => "term",
            EntityType::Other => "other",
        }
    }

    /// Lenient parse accepting common synonyms.
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "character" | "person" | "name" | "people" => Some(EntityType::Character),
            "place" | "location" | "city" | "region" => Some(EntityType::Place),
            "organization" | "organisation" | "org" | "group" | "faction" | "guild" | "clan" => {
                Some(EntityType::Organization)
            }
            "skill" | "ability" | "technique" | "spell" => Some(EntityType::Skill),
            "item" | "object" | "weapon" | "artifact" => Some(EntityType::Item),
            "term" | "concept" | "title" => Some(EntityType::Term),
            "other" => Some(EntityType::Other),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    Male,
    Female,
    Neutral,
}

impl Gender {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "male" | "m" | "man" | "he" => Some(Gender::Male),
            "female" | "f" | "woman" | "she" => Some(Gender::Female),
            "neutral" | "unknown" | "nonbinary" | "non-binary" | "they" => Some(Gender::Neutral),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Protagonist,
    Antagonist,
    Supporting,
    Minor,
}

impl Role {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "protagonist" | "main" | "lead" | "hero" => Some(Role::Protagonist),
            "antagonist" | "villain" => Some(Role::Antagonist),
            "supporting" | "support" | "side" => Some(Role::Supporting),
            "minor" | "extra" | "background" => Some(Role::Minor),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_report_shape() {
        let json = serde_json::to_value(ExtractedReport::default()).unwrap();
        assert_eq!(json["finalText"], "");
        let report = &json["qualityReport"];
        assert_eq!(report["issues"], serde_json::json!([]));
        assert_eq!(report["glossarySuggestions"], serde_json::json!([]));
        assert_eq!(report["readabilityScore"], 85);
        assert_eq!(report["formatting"]["tagConsistency"], true);
        assert_eq!(report["formatting"]["pageHeadersPresent"], true);
        assert_eq!(report["formatting"]["missingTags"], serde_json::json!([]));
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let report: QualityReport = serde_json::from_str(r#"{"issues":["x"]}"#).unwrap();
        assert_eq!(report.issues, vec!["x"]);
        assert_eq!(report.readability_score, 85);
        assert!(report.formatting.is_clean());
    }

    #[test]
    fn test_entity_synonyms() {
        assert_eq!(EntityType::from_str("Location"), Some(EntityType::Place));
        assert_eq!(EntityType::from_str(" faction "), Some(EntityType::Organization));
        assert_eq!(EntityType::from_str("banana"), None);
        assert_eq!(Gender::from_str("F"), Some(Gender::Female));
        assert_eq!(Role::from_str("villain"), Some(Role::Antagonist));
    }

    #[test]
    fn test_formatting_merge_keeps_problems() {
        let local = FormattingReport {
            tag_consistency: false,
            page_headers_present: true,
            missing_tags: vec!["[SFX]".into()],
        };
        let merged = FormattingReport::default().merge(&local);
        assert!(!merged.tag_consistency);
        assert_eq!(merged.missing_tags, vec!["[SFX]"]);
    }
}
