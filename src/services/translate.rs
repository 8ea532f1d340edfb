//! Chapter translation with structured quality reports.

use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};

use crate::batch::{BatchError, BatchOrchestrator, BatchResult, WorkItem};
use crate::extract::{self, check_formatting, Degradation, ExtractedReport, FormattingReport};
use crate::prompts::{PromptTemplate, PromptVars};
use crate::provider::{Payload, Provider, ProviderError};

/// Source script plus the context the prompt needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranslationRequest {
    pub text: String,
    pub glossary: String,
    /// Chapter memory carried from earlier chapters.
    pub memory: String,
    pub source_language: String,
    pub target_language: String,
}

impl TranslationRequest {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            glossary: String::new(),
            memory: String::new(),
            source_language: "Korean".to_string(),
            target_language: "English".to_string(),
        }
    }

    pub fn with_languages(mut self, source: impl Into<String>, target: impl Into<String>) -> Self {
        self.source_language = source.into();
        self.target_language = target.into();
        self
    }

    pub fn with_glossary(mut self, glossary: impl Into<String>) -> Self {
        self.glossary = glossary.into();
        self
    }

    pub fn with_memory(mut self, memory: impl Into<String>) -> Self {
        self.memory = memory.into();
        self
    }

    fn vars(&self) -> PromptVars<'_> {
        PromptVars {
            text: &self.text,
            glossary: &self.glossary,
            memory: &self.memory,
            source_language: &self.source_language,
            target_language: &self.target_language,
        }
    }
}

/// Extracted report plus the local formatting check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TranslationOutcome {
    pub report: ExtractedReport,
    /// Tag and page header comparison between source and translation.
    pub local_formatting: FormattingReport,
    #[serde(skip)]
    pub degradations: Vec<Degradation>,
}

impl TranslationOutcome {
    /// Problems reported by the model or found locally.
    pub fn formatting(&self) -> FormattingReport {
        self.report.quality_report.formatting.merge(&self.local_formatting)
    }
}

/// Translate one script.
///
/// When the template has a `{text}` placeholder the script travels inside
/// the prompt; otherwise it is sent as a separate text part.
pub async fn translate_text(
    provider: &dyn Provider,
    template: &PromptTemplate,
    request: &TranslationRequest,
) -> Result<TranslationOutcome, ProviderError> {
    let prompt = template.render(&request.vars());
    let payload = if template.as_str().contains("{text}") {
        Payload::Text(String::new())
    } else {
        Payload::Text(request.text.clone())
    };

    let raw = provider.send(&payload, &prompt).await?;
    let extraction = extract::extract_with_diagnostics(&raw);
    if !extraction.is_clean() {
        warn!(
            "Translation response degraded: {} fallback(s)",
            extraction.degradations.len()
        );
    }

    let local_formatting = check_formatting(&request.text, &extraction.report.final_text);
    Ok(TranslationOutcome {
        report: extraction.report,
        local_formatting,
        degradations: extraction.degradations,
    })
}

/// Translate several scripts as one batch. Results follow request order.
pub async fn translate_chapters(
    provider: Arc<dyn Provider>,
    template: PromptTemplate,
    requests: Vec<TranslationRequest>,
    orchestrator: &BatchOrchestrator,
) -> Result<BatchResult<TranslationOutcome>, BatchError> {
    info!("Translating {} chapter(s) with {}", requests.len(), provider.name());
    let template = Arc::new(template);

    orchestrator
        .run(WorkItem::sequence_all(requests), move |request: TranslationRequest| {
            let provider = provider.clone();
            let template = template.clone();
            async move { translate_text(provider.as_ref(), &template, &request).await }
        })
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch::BatchConfig;
    use crate::services::testing::ScriptedProvider;
    use std::time::Duration;

    const RESPONSE: &str = "1. **FINAL TEXT:**\n[Page 1]\n[SFX] BANG\nRun!\n\n2. **QUALITY REPORT:**\n{\"issues\": [], \"chapterMemory\": \"They ran.\", \"readabilityScore\": 88}";

    #[tokio::test]
    async fn test_translate_text_renders_prompt_and_extracts() {
        let provider = ScriptedProvider::new(|payload: &Payload, _: &str, _| {
            assert_eq!(payload, &Payload::Text(String::new()));
            Ok(RESPONSE.to_string())
        });
        let request = TranslationRequest::new("[Page 1]\n[SFX] 쾅\n[Narration] 도망쳐!\n")
            .with_memory("Chapter 3 recap");

        let outcome = translate_text(&provider, &PromptTemplate::translate_default(), &request)
            .await
            .unwrap();

        let prompt = provider.prompts.lock().unwrap()[0].clone();
        assert!(prompt.contains("from Korean to English"));
        assert!(prompt.contains("Chapter 3 recap"));
        assert!(prompt.contains("[SFX] 쾅"));

        assert_eq!(outcome.report.final_text, "[Page 1]\n[SFX] BANG\nRun!");
        assert_eq!(outcome.report.quality_report.chapter_memory, "They ran.");
        assert_eq!(outcome.report.quality_report.readability_score, 88);
        assert_eq!(outcome.local_formatting.missing_tags, vec!["[Narration]"]);
        assert!(!outcome.formatting().tag_consistency);
    }

    #[tokio::test]
    async fn test_template_without_placeholder_sends_text_part() {
        let provider = ScriptedProvider::new(|payload: &Payload, _: &str, _| {
            assert_eq!(payload, &Payload::Text("hello".to_string()));
            Ok("hi".to_string())
        });
        let outcome = translate_text(&provider, &PromptTemplate::new("Translate."), &TranslationRequest::new("hello"))
            .await
            .unwrap();
        assert_eq!(outcome.report.final_text, "hi");
    }

    #[tokio::test]
    async fn test_translate_chapters_retries_transient_errors() {
        let provider = Arc::new(ScriptedProvider::new(|_: &Payload, prompt: &str, call: usize| {
            if call == 0 {
                return Err(ProviderError::Server {
                    status: 503,
                    body: "overloaded".into(),
                });
            }
            let chapter = if prompt.contains("chapter one") { "one" } else { "two" };
            Ok(format!("FINAL TEXT:\n{}", chapter))
        }));
        let orchestrator = BatchOrchestrator::new(BatchConfig::new(
            1,
            Duration::from_secs(5),
            2,
            Duration::from_millis(1),
        ));
        let requests = vec![
            TranslationRequest::new("chapter one"),
            TranslationRequest::new("chapter two"),
        ];

        let result = translate_chapters(provider.clone(), PromptTemplate::translate_default(), requests, &orchestrator)
            .await
            .unwrap();

        assert!(result.all_succeeded());
        let texts: Vec<&str> = result
            .successes()
            .map(|(_, o)| o.report.final_text.as_str())
            .collect();
        assert_eq!(texts, vec!["one", "two"]);
        assert_eq!(provider.calls(), 3);
    }
}
