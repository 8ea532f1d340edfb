//! Batch request/response types and progress events.

use std::time::Duration;

use serde::Serialize;

/// One unit of batch work.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkItem<P> {
    /// Caller-assigned sequence number, used to order results.
    pub sequence: u64,
    pub payload: P,
}

impl<P> WorkItem<P> {
    pub fn new(sequence: u64, payload: P) -> Self {
        Self { sequence, payload }
    }

    /// Number payloads 0..n in iteration order.
    pub fn sequence_all<I>(payloads: I) -> Vec<Self>
    where
        I: IntoIterator<Item = P>,
    {
        payloads
            .into_iter()
            .enumerate()
            .map(|(i, payload)| Self::new(i as u64, payload))
            .collect()
    }
}

/// Terminal outcome of one item.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemResult<T> {
    pub sequence_number: u64,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Attempts made, including the first.
    pub attempts: u32,
}

impl<T> ItemResult<T> {
    pub fn succeeded(sequence_number: u64, payload: T, attempts: u32) -> Self {
        Self {
            sequence_number,
            success: true,
            payload: Some(payload),
            error: None,
            attempts,
        }
    }

    pub fn failed(sequence_number: u64, error: impl Into<String>, attempts: u32) -> Self {
        Self {
            sequence_number,
            success: false,
            payload: None,
            error: Some(error.into()),
            attempts,
        }
    }
}

/// Ordered results of a batch run.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchResult<T> {
    pub results_in_order: Vec<ItemResult<T>>,
    pub success_count: usize,
    pub failure_count: usize,
}

impl<T> BatchResult<T> {
    pub(crate) fn from_results(results_in_order: Vec<ItemResult<T>>) -> Self {
        let success_count = results_in_order.iter().filter(|r| r.success).count();
        let failure_count = results_in_order.len() - success_count;
        Self {
            results_in_order,
            success_count,
            failure_count,
        }
    }

    pub fn len(&self) -> usize {
        self.results_in_order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results_in_order.is_empty()
    }

    pub fn all_succeeded(&self) -> bool {
        self.failure_count == 0
    }

    /// Successful payloads in order.
    pub fn successes(&self) -> impl Iterator<Item = (u64, &T)> {
        self.results_in_order
            .iter()
            .filter_map(|r| r.payload.as_ref().map(|p| (r.sequence_number, p)))
    }

    /// Failed items as (sequence, error message).
    pub fn failures(&self) -> impl Iterator<Item = (u64, &str)> {
        self.results_in_order
            .iter()
            .filter(|r| !r.success)
            .map(|r| (r.sequence_number, r.error.as_deref().unwrap_or("unknown error")))
    }

    /// Sequence numbers of failed items, for retrying only that subset.
    pub fn failed_sequences(&self) -> Vec<u64> {
        self.failures().map(|(seq, _)| seq).collect()
    }
}

/// Progress events emitted while a batch runs.
#[derive(Debug, Clone, PartialEq)]
pub enum BatchEvent {
    ItemStarted {
        sequence: u64,
        attempt: u32,
    },
    ItemRetrying {
        sequence: u64,
        attempt: u32,
        error: String,
        delay: Duration,
    },
    ItemSucceeded {
        sequence: u64,
        attempts: u32,
    },
    ItemFailed {
        sequence: u64,
        attempts: u32,
        error: String,
    },
    BatchAborted {
        reason: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counts_and_failed_sequences() {
        let result = BatchResult::from_results(vec![
            ItemResult::succeeded(0, "a", 1),
            ItemResult::failed(1, "boom", 3),
            ItemResult::succeeded(2, "c", 2),
        ]);
        assert_eq!(result.success_count, 2);
        assert_eq!(result.failure_count, 1);
        assert_eq!(result.failed_sequences(), vec![1]);
        assert_eq!(result.successes().map(|(s, _)| s).collect::<Vec<_>>(), vec![0, 2]);
    }

    #[test]
    fn test_response_shape_is_camel_case() {
        let result = BatchResult::from_results(vec![
            ItemResult::succeeded(0, "text".to_string(), 1),
            ItemResult::<String>::failed(1, "page-2.png: timed out", 2),
        ]);
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["successCount"], 1);
        assert_eq!(json["failureCount"], 1);
        assert_eq!(json["resultsInOrder"][0]["sequenceNumber"], 0);
        assert_eq!(json["resultsInOrder"][0]["payload"], "text");
        assert!(json["resultsInOrder"][0].get("error").is_none());
        assert_eq!(json["resultsInOrder"][1]["success"], false);
        assert_eq!(json["resultsInOrder"][1]["error"], "page-2.png: timed out");
    }

    #[test]
    fn test_sequence_all() {
        let items = WorkItem::sequence_all(["x", "y"]);
        assert_eq!(items[1], WorkItem::new(1, "y"));
    }
}
