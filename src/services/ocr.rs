//! Chapter OCR: page images in, ordered page text out.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info};

use crate::batch::{BatchError, BatchOrchestrator, BatchResult, Disposition, Retryable, WorkItem};
use crate::extract;
use crate::provider::{image, Provider, ProviderError};

/// OCR text of one page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageText {
    /// 1-based page number.
    pub page_number: usize,
    pub file_name: String,
    pub text: String,
}

/// A page that failed OCR, for a selective retry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageFailure {
    pub page_number: usize,
    pub error: String,
}

/// Provider error tagged with the page file it concerns.
#[derive(Debug)]
pub struct PageError {
    pub file_name: String,
    pub source: ProviderError,
}

impl fmt::Display for PageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.file_name, self.source)
    }
}

impl std::error::Error for PageError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.source)
    }
}

impl Retryable for PageError {
    fn disposition(&self) -> Disposition {
        self.source.disposition()
    }
}

#[derive(Debug, Clone)]
struct PageJob {
    page_number: usize,
    path: PathBuf,
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// OCR every page as one batch. Results follow page order.
///
/// Pages are numbered from 1 in the order given; sequence `n` is page
/// `n + 1`. Per-page errors carry the file name.
pub async fn ocr_pages(
    provider: Arc<dyn Provider>,
    pages: Vec<PathBuf>,
    prompt: &str,
    orchestrator: &BatchOrchestrator,
) -> Result<BatchResult<PageText>, BatchError> {
    info!("Running OCR on {} page(s) with {}", pages.len(), provider.name());

    let items = WorkItem::sequence_all(pages.into_iter().enumerate().map(|(i, path)| PageJob {
        page_number: i + 1,
        path,
    }));
    let prompt: Arc<str> = Arc::from(prompt);

    orchestrator
        .run(items, move |job: PageJob| {
            let provider = provider.clone();
            let prompt = prompt.clone();
            async move {
                let name = file_name(&job.path);
                let tag = |source: ProviderError| PageError {
                    file_name: name.clone(),
                    source,
                };
                let payload = image::load_image(&job.path).await.map_err(tag)?;
                let raw = provider.send(&payload, &prompt).await.map_err(tag)?;
                let text = extract::extract(&raw).final_text;
                debug!("Page {} ({}): {} chars", job.page_number, name, text.len());
                Ok::<_, PageError>(PageText {
                    page_number: job.page_number,
                    file_name: name.clone(),
                    text,
                })
            }
        })
        .await
}

/// Join successful pages with `[Page N]` headers.
pub fn combine_pages(result: &BatchResult<PageText>) -> String {
    result
        .successes()
        .map(|(_, page)| format!("[Page {}]\n{}", page.page_number, page.text.trim()))
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Pages that failed, with their error messages.
pub fn failed_pages(result: &BatchResult<PageText>) -> Vec<PageFailure> {
    result
        .failures()
        .map(|(sequence, error)| PageFailure {
            page_number: sequence as usize + 1,
            error: error.to_string(),
        })
        .collect()
}

/// Image files in `dir`, ordered by file name with numbers compared by value
/// (`2.png` before `10.png`).
pub async fn list_page_images(dir: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut entries = tokio::fs::read_dir(dir).await?;
    let mut pages = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if entry.file_type().await?.is_file() && image::is_image_path(&path) {
            pages.push(path);
        }
    }
    pages.sort_by_key(|p| natural_key(&file_name(p)));
    Ok(pages)
}

#[derive(Debug, PartialEq, Eq, PartialOrd, Ord)]
enum KeyPart {
    Number(u64),
    Text(String),
}

fn natural_key(name: &str) -> Vec<KeyPart> {
    let mut parts = Vec::new();
    let mut digits = String::new();
    let mut text = String::new();
    for c in name.chars() {
        if c.is_ascii_digit() {
            if !text.is_empty() {
                parts.push(KeyPart::Text(std::mem::take(&mut text).to_lowercase()));
            }
            digits.push(c);
        } else {
            if !digits.is_empty() {
                parts.push(KeyPart::Number(std::mem::take(&mut digits).parse().unwrap_or(u64::MAX)));
            }
            text.push(c);
        }
    }
    if !digits.is_empty() {
        parts.push(KeyPart::Number(digits.parse().unwrap_or(u64::MAX)));
    }
    if !text.is_empty() {
        parts.push(KeyPart::Text(text.to_lowercase()));
    }
    parts
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch::BatchConfig;
    use crate::provider::Payload;
    use crate::services::testing::ScriptedProvider;
    use std::time::Duration;

    const PNG: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 0];

    fn orchestrator() -> BatchOrchestrator {
        BatchOrchestrator::new(BatchConfig::new(2, Duration::from_secs(5), 1, Duration::from_millis(1)))
    }

    fn write_pages(dir: &Path, names: &[&str]) -> Vec<PathBuf> {
        names
            .iter()
            .map(|name| {
                let path = dir.join(name);
                std::fs::write(&path, PNG).unwrap();
                path
            })
            .collect()
    }

    #[tokio::test]
    async fn test_ocr_pages_in_order_with_failure_names() {
        let dir = tempfile::tempdir().unwrap();
        let mut pages = write_pages(dir.path(), &["01.png", "02.png"]);
        pages.push(dir.path().join("03.png")); // missing file

        let provider = Arc::new(ScriptedProvider::new(|payload: &Payload, _prompt: &str, call: usize| {
            assert!(payload.is_image());
            Ok(format!("1. OCR TEXT:\nline {}", call))
        }));

        let result = ocr_pages(provider.clone(), pages, "read it", &orchestrator())
            .await
            .unwrap();

        assert_eq!(result.success_count, 2);
        let failures = failed_pages(&result);
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].page_number, 3);
        assert!(failures[0].error.starts_with("03.png:"));
        // IO errors fail fast: only the two readable pages reached the provider.
        assert_eq!(provider.calls(), 2);

        let names: Vec<&str> = result.successes().map(|(_, p)| p.file_name.as_str()).collect();
        assert_eq!(names, vec!["01.png", "02.png"]);
        assert!(result.successes().all(|(_, p)| p.text.starts_with("line ")));
    }

    #[tokio::test]
    async fn test_combine_pages_adds_headers() {
        let dir = tempfile::tempdir().unwrap();
        let pages = write_pages(dir.path(), &["a.png", "b.png"]);
        let provider = Arc::new(ScriptedProvider::new(|_: &Payload, _: &str, _| Ok("text".to_string())));

        let result = ocr_pages(provider, pages, "p", &orchestrator()).await.unwrap();
        assert_eq!(combine_pages(&result), "[Page 1]\ntext\n\n[Page 2]\ntext");
    }

    #[tokio::test]
    async fn test_missing_key_aborts_ocr() {
        let dir = tempfile::tempdir().unwrap();
        let pages = write_pages(dir.path(), &["a.png"]);
        let provider = Arc::new(ScriptedProvider::new(|_: &Payload, _: &str, _| {
            Err(ProviderError::MissingCredentials {
                scope: "vision".into(),
                message: "configure API keys for scope 'vision'".into(),
            })
        }));

        let err = ocr_pages(provider, pages, "p", &orchestrator()).await.unwrap_err();
        assert!(matches!(err, BatchError::Configuration(msg) if msg.contains("configure API keys")));
    }

    #[tokio::test]
    async fn test_list_page_images_natural_order() {
        let dir = tempfile::tempdir().unwrap();
        write_pages(dir.path(), &["10.png", "2.png", "1.jpg"]);
        std::fs::write(dir.path().join("notes.txt"), "x").unwrap();

        let pages = list_page_images(dir.path()).await.unwrap();
        let names: Vec<String> = pages.iter().map(|p| file_name(p)).collect();
        assert_eq!(names, vec!["1.jpg", "2.png", "10.png"]);
    }
}
