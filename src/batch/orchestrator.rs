//! Batch orchestrator: semaphore-bounded fan-out with timeout and retry.

use std::collections::HashSet;
use std::fmt::Display;
use std::future::Future;
use std::sync::Arc;

use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use super::config::BatchConfig;
use super::types::{BatchEvent, BatchResult, ItemResult, WorkItem};
use super::{BatchError, Disposition, Retryable};

/// Internal outcome of one item task.
enum ItemReport<T> {
    Done(ItemResult<T>),
    Abort { sequence: u64, reason: String },
}

/// Runs work items through an async function with bounded concurrency.
#[derive(Debug, Clone)]
pub struct BatchOrchestrator {
    config: BatchConfig,
    events: Option<mpsc::Sender<BatchEvent>>,
}

impl BatchOrchestrator {
    pub fn new(config: BatchConfig) -> Self {
        Self {
            config,
            events: None,
        }
    }

    /// Emit progress events on `tx`.
    pub fn with_events(mut self, tx: mpsc::Sender<BatchEvent>) -> Self {
        self.events = Some(tx);
        self
    }

    pub fn config(&self) -> &BatchConfig {
        &self.config
    }

    /// Run every item through `process` and collect ordered results.
    ///
    /// Each attempt runs as its own task while its item holds one semaphore
    /// permit, so at most `concurrency` attempts are awaited at once. When an
    /// attempt times out its task is detached, not cancelled: the underlying
    /// call may still finish in the background and its result is discarded.
    /// The permit is returned when the timeout fires, so a call that never
    /// settles cannot stall the batch.
    ///
    /// Item failures are reported in the result. The call itself fails only
    /// for invalid input or when an item reports a configuration error, which
    /// aborts the remaining items.
    pub async fn run<P, T, E, F, Fut>(
        &self,
        items: Vec<WorkItem<P>>,
        process: F,
    ) -> Result<BatchResult<T>, BatchError>
    where
        P: Clone + Send + Sync + 'static,
        T: Send + 'static,
        E: Retryable + Display + Send + 'static,
        F: Fn(P) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
    {
        self.config.validate()?;
        if items.is_empty() {
            return Err(BatchError::EmptyBatch);
        }
        let mut seen = HashSet::with_capacity(items.len());
        for item in &items {
            if !seen.insert(item.sequence) {
                return Err(BatchError::DuplicateSequence(item.sequence));
            }
        }

        let total = items.len();
        info!(
            "Starting batch of {} item(s) (concurrency {}, timeout {:?}, max retries {})",
            total,
            self.config.concurrency,
            self.config.timeout(),
            self.config.max_retries
        );

        let semaphore = Arc::new(Semaphore::new(self.config.concurrency));
        let process = Arc::new(process);
        let mut sequences: Vec<u64> = Vec::with_capacity(total);
        let mut tasks = JoinSet::new();

        for (slot, item) in items.into_iter().enumerate() {
            sequences.push(item.sequence);
            let semaphore = semaphore.clone();
            let process = process.clone();
            let config = self.config.clone();
            let events = self.events.clone();
            tasks.spawn(async move {
                let report = run_item(item, process, semaphore, config, events).await;
                (slot, report)
            });
        }

        let mut slots: Vec<Option<ItemResult<T>>> = (0..total).map(|_| None).collect();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((slot, ItemReport::Done(result))) => slots[slot] = Some(result),
                Ok((_, ItemReport::Abort { sequence, reason })) => {
                    warn!("Batch aborted by item {}: {}", sequence, reason);
                    tasks.abort_all();
                    emit(&self.events, BatchEvent::BatchAborted {
                        reason: reason.clone(),
                    })
                    .await;
                    return Err(BatchError::Configuration(reason));
                }
                Err(e) => warn!("Batch item task ended unexpectedly: {}", e),
            }
        }

        let mut results: Vec<ItemResult<T>> = slots
            .into_iter()
            .zip(sequences)
            .map(|(result, sequence)| {
                result.unwrap_or_else(|| ItemResult::failed(sequence, "item did not complete", 0))
            })
            .collect();
        results.sort_by_key(|r| r.sequence_number);

        let result = BatchResult::from_results(results);
        info!(
            "Batch finished: {} succeeded, {} failed",
            result.success_count, result.failure_count
        );
        Ok(result)
    }
}

/// Attempt loop for a single item.
async fn run_item<P, T, E, F, Fut>(
    item: WorkItem<P>,
    process: Arc<F>,
    semaphore: Arc<Semaphore>,
    config: BatchConfig,
    events: Option<mpsc::Sender<BatchEvent>>,
) -> ItemReport<T>
where
    P: Clone + Send + Sync + 'static,
    T: Send + 'static,
    E: Retryable + Display + Send + 'static,
    F: Fn(P) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T, E>> + Send + 'static,
{
    let sequence = item.sequence;
    let mut attempts: u32 = 0;

    loop {
        let permit = match semaphore.clone().acquire_owned().await {
            Ok(permit) => permit,
            Err(_) => {
                return ItemReport::Done(ItemResult::failed(sequence, "batch closed", attempts));
            }
        };
        attempts += 1;
        emit(&events, BatchEvent::ItemStarted {
            sequence,
            attempt: attempts,
        })
        .await;

        let handle = tokio::spawn(process(item.payload.clone()));
        let outcome = tokio::time::timeout(config.timeout(), handle).await;
        // The slot frees as soon as the race settles; an abandoned call keeps
        // running detached and its result is dropped.
        drop(permit);

        let (message, disposition) = match outcome {
            Ok(Ok(Ok(value))) => {
                debug!("Item {} succeeded after {} attempt(s)", sequence, attempts);
                emit(&events, BatchEvent::ItemSucceeded { sequence, attempts }).await;
                return ItemReport::Done(ItemResult::succeeded(sequence, value, attempts));
            }
            Ok(Ok(Err(e))) => (e.to_string(), e.disposition()),
            Ok(Err(join_err)) => (format!("task failed: {}", join_err), Disposition::FailFast),
            Err(_) => (
                format!("timed out after {:?}", config.timeout()),
                Disposition::Retry { after: None },
            ),
        };

        match disposition {
            Disposition::Abort => {
                return ItemReport::Abort {
                    sequence,
                    reason: message,
                };
            }
            Disposition::Retry { after } if attempts <= config.max_retries => {
                let delay = after.unwrap_or_else(|| config.retry_delay());
                warn!(
                    "Item {} failed (attempt {}), retrying in {:?}: {}",
                    sequence, attempts, delay, message
                );
                emit(&events, BatchEvent::ItemRetrying {
                    sequence,
                    attempt: attempts,
                    error: message,
                    delay,
                })
                .await;
                tokio::time::sleep(delay).await;
            }
            _ => {
                warn!(
                    "Item {} failed after {} attempt(s): {}",
                    sequence, attempts, message
                );
                emit(&events, BatchEvent::ItemFailed {
                    sequence,
                    attempts,
                    error: message.clone(),
                })
                .await;
                return ItemReport::Done(ItemResult::failed(sequence, message, attempts));
            }
        }
    }
}

async fn emit(events: &Option<mpsc::Sender<BatchEvent>>, event: BatchEvent) {
    if let Some(tx) = events {
        let _ = tx.send(event).await;
    }
}
