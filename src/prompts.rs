//! Prompt templates for OCR and translation requests.
//!
//! Prompt wording is configuration, not code: projects override these with
//! files or inline text in the config. The defaults only pin the section
//! layout the extractor expects.

/// Default prompt for page OCR.
pub const DEFAULT_OCR_PROMPT: &str = r#"Extract all text from this webtoon page in reading order. Prefix speech types with tags such as [SFX], [Narration] or [Thought] where they apply.

Respond in this format:
1. **OCR TEXT:**
<the extracted text>"#;

/// Default prompt for chapter translation.
pub const DEFAULT_TRANSLATE_PROMPT: &str = r#"Translate the following webtoon script from {source_language} to {target_language}. Keep every [tag] and page header exactly as in the source.

Glossary:
{glossary}

Story so far:
{memory}

Script:
{text}

Respond in this format:
1. **FINAL TEXT:**
<the translation>

2. **QUALITY REPORT:**
A JSON object with the keys issues, suggestions, culturalNotes, glossarySuggestions, chapterMemory, chapterSummary, formatting and readabilityScore."#;

/// Values substituted into a template.
#[derive(Debug, Clone, Copy, Default)]
pub struct PromptVars<'a> {
    pub text: &'a str,
    pub glossary: &'a str,
    pub memory: &'a str,
    pub source_language: &'a str,
    pub target_language: &'a str,
}

/// An opaque prompt string with `{text}`, `{glossary}`, `{memory}`,
/// `{source_language}` and `{target_language}` placeholders.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptTemplate(String);

impl PromptTemplate {
    pub fn new(template: impl Into<String>) -> Self {
        Self(template.into())
    }

    pub fn ocr_default() -> Self {
        Self::new(DEFAULT_OCR_PROMPT)
    }

    pub fn translate_default() -> Self {
        Self::new(DEFAULT_TRANSLATE_PROMPT)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Substitute placeholders. Empty glossary and memory render as "(none)".
    pub fn render(&self, vars: &PromptVars<'_>) -> String {
        self.0
            .replace("{glossary}", or_none(vars.glossary))
            .replace("{memory}", or_none(vars.memory))
            .replace("{source_language}", vars.source_language)
            .replace("{target_language}", vars.target_language)
            // Last, so placeholders inside the script are left alone.
            .replace("{text}", vars.text)
    }
}

fn or_none(value: &str) -> &str {
    if value.trim().is_empty() {
        "(none)"
    } else {
        value
    }
}
