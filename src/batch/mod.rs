//! Bounded-concurrency batch orchestration for provider calls.
//!
//! OCR or translation of a chapter is many independent calls. The
//! orchestrator runs them with a concurrency cap, a per-attempt timeout and a
//! bounded retry loop, and returns one ordered result per item. Individual
//! failures never abort the batch; only configuration-class errors do.

mod config;
mod orchestrator;
mod types;

pub use config::BatchConfig;
pub use orchestrator::BatchOrchestrator;
pub use types::{BatchEvent, BatchResult, ItemResult, WorkItem};

use std::time::Duration;

use thiserror::Error;

/// Errors that reject or abort a whole batch.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BatchError {
    #[error("Invalid batch configuration: {0}")]
    InvalidConfig(String),
    #[error("Batch contains no items")]
    EmptyBatch,
    #[error("Duplicate sequence number {0} in batch")]
    DuplicateSequence(u64),
    #[error("Batch aborted: {0}")]
    Configuration(String),
}

/// How the orchestrator should treat a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Transient failure: retry if budget remains, optionally after a
    /// provider-requested delay instead of the configured one.
    Retry { after: Option<Duration> },
    /// Permanent failure for this item: stop without using retry budget.
    FailFast,
    /// Configuration failure: abort the whole batch.
    Abort,
}

/// Classification of an item error for the retry policy.
pub trait Retryable {
    fn disposition(&self) -> Disposition;
}

impl Retryable for anyhow::Error {
    fn disposition(&self) -> Disposition {
        Disposition::Retry { after: None }
    }
}
