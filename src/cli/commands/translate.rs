//! `toonlate translate`: batch translation of chapter scripts.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use console::style;

use super::{AppContext, BatchArgs};
use crate::batch::BatchOrchestrator;
use crate::cli::icons;
use crate::cli::progress::BatchProgress;
use crate::credentials::VISION_SCOPE;
use crate::prompts::PromptTemplate;
use crate::provider::{Provider, RotatingProvider};
use crate::services::{translate_chapters, TranslationOutcome, TranslationRequest};

/// Options for the translate command.
pub struct TranslateArgs {
    pub files: Vec<PathBuf>,
    pub glossary: Option<PathBuf>,
    pub memory: Option<PathBuf>,
    pub from: String,
    pub to: String,
    pub suffix: Option<String>,
    pub prompt: Option<String>,
    pub json: bool,
}

async fn read_optional(path: Option<&Path>) -> anyhow::Result<String> {
    match path {
        Some(path) => tokio::fs::read_to_string(path)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to read {}: {}", path.display(), e)),
        None => Ok(String::new()),
    }
}

/// `chapter.txt` + `.en.txt` -> `chapter.en.txt`.
fn output_path(input: &Path, suffix: &str) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "translation".to_string());
    input.with_file_name(format!("{}{}", stem, suffix))
}

pub async fn cmd_translate(
    ctx: &AppContext,
    args: TranslateArgs,
    batch: &BatchArgs,
) -> anyhow::Result<()> {
    let glossary = read_optional(args.glossary.as_deref()).await?;
    let memory = read_optional(args.memory.as_deref()).await?;

    let mut requests = Vec::with_capacity(args.files.len());
    for file in &args.files {
        let text = tokio::fs::read_to_string(file)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to read {}: {}", file.display(), e))?;
        requests.push(
            TranslationRequest::new(text)
                .with_languages(args.from.as_str(), args.to.as_str())
                .with_glossary(glossary.as_str())
                .with_memory(memory.as_str()),
        );
    }

    let template = ctx
        .config
        .resolve_prompt(args.prompt.as_deref().or(ctx.config.prompts.translate.as_deref()))
        .await
        .map(PromptTemplate::new)
        .unwrap_or_else(PromptTemplate::translate_default);

    let provider: Arc<dyn Provider> = Arc::new(RotatingProvider::gemini(
        ctx.credentials.clone(),
        VISION_SCOPE,
        ctx.config.provider.clone(),
    )?);

    if !args.json {
        eprintln!(
            "{} Translating {} file(s) from {} to {}",
            icons::info(),
            args.files.len(),
            args.from,
            args.to
        );
    }
    let progress = if args.json {
        BatchProgress::hidden()
    } else {
        BatchProgress::new(args.files.len(), "Translating...")
    };
    let (tx, progress_handle) = progress.spawn();
    let orchestrator = BatchOrchestrator::new(batch.apply(ctx.config.batch.clone())).with_events(tx);

    let outcome = translate_chapters(provider, template, requests, &orchestrator).await;
    drop(orchestrator);
    progress_handle.await?;
    let result = outcome?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&result)?);
        return Ok(());
    }

    for item in &result.results_in_order {
        let input = &args.files[item.sequence_number as usize];
        match &item.payload {
            Some(outcome) => write_outcome(input, outcome, args.suffix.as_deref()).await?,
            None => eprintln!(
                "{} {}: {}",
                icons::error(),
                input.display(),
                item.error.as_deref().unwrap_or("unknown error")
            ),
        }
    }

    eprintln!(
        "{} {} succeeded, {} failed",
        if result.all_succeeded() {
            icons::success()
        } else {
            icons::warn()
        },
        result.success_count,
        result.failure_count
    );
    Ok(())
}

async fn write_outcome(
    input: &Path,
    outcome: &TranslationOutcome,
    suffix: Option<&str>,
) -> anyhow::Result<()> {
    let report = &outcome.report;
    match suffix {
        Some(suffix) => {
            let path = output_path(input, suffix);
            tokio::fs::write(&path, &report.final_text).await?;
            eprintln!(
                "{} {} {} {}",
                icons::success(),
                input.display(),
                icons::dim_arrow(),
                path.display()
            );
        }
        None => {
            println!("{}", style(format!("== {} ==", input.display())).bold());
            println!("{}\n", report.final_text);
        }
    }

    eprintln!(
        "  {} readability {}",
        icons::bullet(),
        report.quality_report.readability_score
    );
    let formatting = outcome.formatting();
    if !formatting.page_headers_present {
        eprintln!("  {} page headers missing or renumbered", icons::warn());
    }
    if !formatting.missing_tags.is_empty() {
        eprintln!(
            "  {} missing tags: {}",
            icons::warn(),
            formatting.missing_tags.join(", ")
        );
    } else if !formatting.tag_consistency {
        eprintln!("  {} tag counts differ from the source", icons::warn());
    }
    for issue in &report.quality_report.issues {
        eprintln!("  {} {}", icons::bullet(), style(issue).dim());
    }
    if !outcome.degradations.is_empty() {
        eprintln!(
            "  {} response needed {} fallback(s) to parse",
            icons::warn(),
            outcome.degradations.len()
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_path_replaces_extension() {
        assert_eq!(
            output_path(Path::new("ch12/script.txt"), ".en.txt"),
            PathBuf::from("ch12/script.en.txt")
        );
    }
}
