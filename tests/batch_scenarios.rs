//! Batch orchestration end-to-end behavior.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use toonlate::batch::{BatchConfig, BatchOrchestrator, WorkItem};

fn config(concurrency: usize, max_retries: u32) -> BatchConfig {
    BatchConfig::new(
        concurrency,
        Duration::from_secs(5),
        max_retries,
        Duration::from_millis(5),
    )
}

#[tokio::test]
async fn one_failing_item_does_not_disturb_the_rest() {
    let attempts: Arc<Mutex<HashMap<u64, u32>>> = Arc::new(Mutex::new(HashMap::new()));
    let orchestrator = BatchOrchestrator::new(config(2, 1));
    let items: Vec<WorkItem<u64>> = (1..=5).map(|n| WorkItem::new(n, n)).collect();

    let seen = attempts.clone();
    let result = orchestrator
        .run(items, move |n: u64| {
            let seen = seen.clone();
            async move {
                *seen.lock().unwrap().entry(n).or_insert(0) += 1;
                tokio::time::sleep(Duration::from_millis(10 * (6 - n))).await;
                if n == 3 {
                    anyhow::bail!("page {} is unreadable", n);
                }
                Ok(n * 10)
            }
        })
        .await
        .unwrap();

    let order: Vec<u64> = result.results_in_order.iter().map(|r| r.sequence_number).collect();
    assert_eq!(order, vec![1, 2, 3, 4, 5]);
    assert_eq!(result.success_count, 4);
    assert_eq!(result.failure_count, 1);

    let failed = &result.results_in_order[2];
    assert!(!failed.success);
    assert_eq!(failed.attempts, 2);
    assert!(failed.error.as_deref().unwrap().contains("unreadable"));
    assert_eq!(attempts.lock().unwrap()[&3], 2);

    let payloads: Vec<u64> = result.successes().map(|(_, v)| *v).collect();
    assert_eq!(payloads, vec![10, 20, 40, 50]);
    assert_eq!(result.failed_sequences(), vec![3]);
}

#[tokio::test]
async fn concurrency_bound_holds_under_retries() {
    let in_flight = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));
    let calls = Arc::new(AtomicUsize::new(0));
    let orchestrator = BatchOrchestrator::new(config(3, 2));

    let (f, p, c) = (in_flight.clone(), peak.clone(), calls.clone());
    let result = orchestrator
        .run(WorkItem::sequence_all(0..12u64), move |n: u64| {
            let (f, p, c) = (f.clone(), p.clone(), c.clone());
            async move {
                let now = f.fetch_add(1, Ordering::SeqCst) + 1;
                p.fetch_max(now, Ordering::SeqCst);
                let call = c.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(5 + (n * 7) % 13)).await;
                f.fetch_sub(1, Ordering::SeqCst);
                // Every third call fails once and is retried.
                if call % 3 == 0 {
                    anyhow::bail!("transient");
                }
                Ok(n)
            }
        })
        .await
        .unwrap();

    assert!(peak.load(Ordering::SeqCst) <= 3);
    assert_eq!(result.len(), 12);
    let order: Vec<u64> = result.results_in_order.iter().map(|r| r.sequence_number).collect();
    assert_eq!(order, (0..12).collect::<Vec<_>>());
}

#[tokio::test]
async fn failed_subset_can_be_rerun() {
    let orchestrator = BatchOrchestrator::new(config(2, 0));
    let first = orchestrator
        .run(WorkItem::sequence_all(["ok", "bad", "ok"]), |s: &'static str| async move {
            if s == "bad" {
                anyhow::bail!("rejected");
            }
            Ok(s.len())
        })
        .await
        .unwrap();
    assert_eq!(first.failed_sequences(), vec![1]);

    let retry_items: Vec<WorkItem<&'static str>> = first
        .failed_sequences()
        .into_iter()
        .map(|seq| WorkItem::new(seq, "fixed"))
        .collect();
    let second = orchestrator
        .run(retry_items, |s: &'static str| async move { Ok::<_, anyhow::Error>(s.len()) })
        .await
        .unwrap();
    assert!(second.all_succeeded());
    assert_eq!(second.results_in_order[0].sequence_number, 1);
}
