//! Progress bar driven by batch events.

use indicatif::{ProgressBar, ProgressStyle};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::icons;
use crate::batch::BatchEvent;

/// Counts collected while a batch runs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProgressSummary {
    pub succeeded: usize,
    pub failed: usize,
    pub retries: usize,
}

/// Progress display for one batch.
pub struct BatchProgress {
    bar: ProgressBar,
}

impl BatchProgress {
    pub fn new(total: usize, message: &str) -> Self {
        let bar = ProgressBar::new(total as u64);
        bar.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{bar:30.cyan/blue}] {pos}/{len} {wide_msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("█▓░"),
        );
        bar.set_message(message.to_string());
        Self { bar }
    }

    /// Hidden display, for `--json` output.
    pub fn hidden() -> Self {
        Self {
            bar: ProgressBar::hidden(),
        }
    }

    /// Consume events until the sender side is dropped.
    pub fn spawn(self) -> (mpsc::Sender<BatchEvent>, JoinHandle<ProgressSummary>) {
        let (tx, rx) = mpsc::channel(256);
        let handle = tokio::spawn(self.drive(rx));
        (tx, handle)
    }

    async fn drive(self, mut rx: mpsc::Receiver<BatchEvent>) -> ProgressSummary {
        let mut summary = ProgressSummary::default();
        while let Some(event) = rx.recv().await {
            match event {
                BatchEvent::ItemStarted { .. } => {}
                BatchEvent::ItemRetrying {
                    sequence,
                    attempt,
                    error,
                    delay,
                } => {
                    summary.retries += 1;
                    self.bar.println(format!(
                        "  {} item {} attempt {} failed, retrying in {:?}: {}",
                        icons::warn(),
                        sequence + 1,
                        attempt,
                        delay,
                        error
                    ));
                }
                BatchEvent::ItemSucceeded { .. } => {
                    summary.succeeded += 1;
                    self.bar.inc(1);
                }
                BatchEvent::ItemFailed { error, .. } => {
                    summary.failed += 1;
                    self.bar.println(format!("  {} {}", icons::error(), error));
                    self.bar.inc(1);
                }
                BatchEvent::BatchAborted { reason } => {
                    self.bar.println(format!("{} Batch aborted: {}", icons::error(), reason));
                }
            }
        }
        self.bar.finish_and_clear();
        summary
    }
}
