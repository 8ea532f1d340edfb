//! Credential rotation through the public API.

use std::sync::Arc;

use toonlate::credentials::{
    CredentialError, CredentialPoolManager, Selection, StaticCredentialSource, VISION_SCOPE,
};

fn manager(keys: &[&str]) -> CredentialPoolManager {
    let source = StaticCredentialSource::new().with_scope(VISION_SCOPE, keys.iter().copied());
    CredentialPoolManager::new(Arc::new(source))
}

#[tokio::test]
async fn round_robin_wraps_after_last_key() {
    let m = manager(&["a", "b", "c"]);
    let mut picked = Vec::new();
    for _ in 0..4 {
        picked.push(m.next(VISION_SCOPE).await.unwrap());
    }
    assert_eq!(picked, vec!["a", "b", "c", "a"]);
}

#[tokio::test]
async fn pinned_and_least_used_selection() {
    let m = manager(&["a", "b", "c"]);
    assert_eq!(m.select(VISION_SCOPE, Selection::Pinned(4)).await.unwrap(), "b");
    assert_eq!(m.select(VISION_SCOPE, Selection::LeastUsed).await.unwrap(), "a");
    assert_eq!(m.select(VISION_SCOPE, Selection::LeastUsed).await.unwrap(), "c");
    // Pinned selection leaves the round-robin cursor at the start.
    assert_eq!(m.next(VISION_SCOPE).await.unwrap(), "a");

    let stats = m.usage_stats(VISION_SCOPE).unwrap();
    assert_eq!(stats.per_credential_usage, vec![2, 1, 1]);
    assert_eq!(stats.total_usage, 4);
}

#[tokio::test]
async fn unknown_scope_has_no_credentials() {
    let m = manager(&["a"]);
    let err = m.next("drive-access").await.unwrap_err();
    assert!(matches!(err, CredentialError::NoCredentials(scope) if scope == "drive-access"));
}
