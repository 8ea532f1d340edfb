//! `toonlate ocr`: batch OCR of page images.

use std::path::PathBuf;
use std::sync::Arc;

use console::style;

use super::{AppContext, BatchArgs};
use crate::batch::BatchOrchestrator;
use crate::cli::icons;
use crate::cli::progress::BatchProgress;
use crate::credentials::VISION_SCOPE;
use crate::prompts::DEFAULT_OCR_PROMPT;
use crate::provider::{Provider, RotatingProvider};
use crate::services::{combine_pages, failed_pages, list_page_images, ocr_pages};

pub async fn cmd_ocr(
    ctx: &AppContext,
    inputs: Vec<PathBuf>,
    output: Option<PathBuf>,
    prompt: Option<String>,
    json: bool,
    batch: &BatchArgs,
) -> anyhow::Result<()> {
    let pages = if inputs.len() == 1 && inputs[0].is_dir() {
        list_page_images(&inputs[0]).await?
    } else {
        inputs
    };
    if pages.is_empty() {
        anyhow::bail!("No page images found");
    }

    let prompt = match ctx
        .config
        .resolve_prompt(prompt.as_deref().or(ctx.config.prompts.ocr.as_deref()))
        .await
    {
        Some(p) => p,
        None => DEFAULT_OCR_PROMPT.to_string(),
    };

    let provider: Arc<dyn Provider> = Arc::new(RotatingProvider::gemini(
        ctx.credentials.clone(),
        VISION_SCOPE,
        ctx.config.provider.clone(),
    )?);

    let total = pages.len();
    if !json {
        eprintln!("{} Running OCR on {} page(s)", icons::info(), total);
    }
    let progress = if json {
        BatchProgress::hidden()
    } else {
        BatchProgress::new(total, "Running OCR...")
    };
    let (tx, progress_handle) = progress.spawn();
    let orchestrator = BatchOrchestrator::new(batch.apply(ctx.config.batch.clone())).with_events(tx);

    let outcome = ocr_pages(provider, pages, &prompt, &orchestrator).await;
    // Closing the event channel lets the progress task finish.
    drop(orchestrator);
    let summary = progress_handle.await?;
    let result = outcome?;

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
        return Ok(());
    }

    let text = combine_pages(&result);
    match output {
        Some(path) => {
            tokio::fs::write(&path, &text).await?;
            eprintln!("{} Wrote {}", icons::success(), path.display());
        }
        None => println!("{}", text),
    }

    eprintln!(
        "{} {} page(s) succeeded, {} failed ({} retries)",
        if result.all_succeeded() {
            icons::success()
        } else {
            icons::warn()
        },
        result.success_count,
        result.failure_count,
        summary.retries
    );
    for failure in failed_pages(&result) {
        eprintln!(
            "  {} page {}: {}",
            icons::error(),
            failure.page_number,
            style(&failure.error).dim()
        );
    }

    Ok(())
}
