//! Credential pool manager shared by all concurrent provider calls.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{debug, info, warn};

use super::pool::{CredentialPool, Selection, UsageStats};
use super::source::{CredentialError, CredentialResult, CredentialSource};
use super::mask_credential;

/// Hands out credentials per scope from lazily loaded pools.
///
/// Construct one instance in the composition root and share it behind an
/// `Arc`. Selection never awaits while holding pool state; only loading from
/// the source is asynchronous, and loads for the same manager are serialized
/// so a pool is replaced whole or not at all.
pub struct CredentialPoolManager {
    source: Arc<dyn CredentialSource>,
    pools: Mutex<HashMap<String, CredentialPool>>,
    init_lock: tokio::sync::Mutex<()>,
}

impl CredentialPoolManager {
    pub fn new(source: Arc<dyn CredentialSource>) -> Self {
        Self {
            source,
            pools: Mutex::new(HashMap::new()),
            init_lock: tokio::sync::Mutex::new(()),
        }
    }

    /// Load the credential list for `scope`, replacing any existing pool.
    ///
    /// On source failure nothing is stored, so the scope stays uninitialized
    /// and the next request retries the load.
    pub async fn initialize(&self, scope: &str) -> CredentialResult<()> {
        let _guard = self.init_lock.lock().await;
        self.load_locked(scope).await
    }

    /// Force a reload of `scope`: list, counters and cursor are all reset.
    pub async fn refresh(&self, scope: &str) -> CredentialResult<()> {
        let _guard = self.init_lock.lock().await;
        self.pools().remove(scope);
        debug!("Refreshing credential pool for scope '{}'", scope);
        self.load_locked(scope).await
    }

    pub fn is_initialized(&self, scope: &str) -> bool {
        self.pools().contains_key(scope)
    }

    /// Scopes that currently have a loaded pool.
    pub fn scopes(&self) -> Vec<String> {
        let mut scopes: Vec<String> = self.pools().keys().cloned().collect();
        scopes.sort();
        scopes
    }

    /// Next credential in round-robin order.
    pub async fn next(&self, scope: &str) -> CredentialResult<String> {
        self.select(scope, Selection::RoundRobin).await
    }

    /// Credential at `index % len`, for deterministic per-worker assignment.
    pub async fn by_index(&self, scope: &str, index: usize) -> CredentialResult<String> {
        self.select(scope, Selection::Pinned(index)).await
    }

    /// Credential with the lowest usage count.
    pub async fn least_used(&self, scope: &str) -> CredentialResult<String> {
        self.select(scope, Selection::LeastUsed).await
    }

    /// Pick a credential using `selection`, initializing the scope if needed.
    pub async fn select(&self, scope: &str, selection: Selection) -> CredentialResult<String> {
        self.ensure_initialized(scope).await?;

        let mut pools = self.pools();
        let pool = pools
            .get_mut(scope)
            .ok_or_else(|| CredentialError::NoCredentials(scope.to_string()))?;
        let credential = pool
            .select(selection)
            .map(str::to_string)
            .ok_or_else(|| CredentialError::NoCredentials(scope.to_string()))?;
        drop(pools);

        debug!(
            "Selected credential {} for scope '{}' ({:?})",
            mask_credential(&credential),
            scope,
            selection
        );
        Ok(credential)
    }

    /// Usage statistics, or `None` if the scope was never loaded.
    pub fn usage_stats(&self, scope: &str) -> Option<UsageStats> {
        self.pools().get(scope).map(|pool| pool.stats(scope))
    }

    /// Masked credentials of a loaded scope, in pool order.
    pub fn masked_credentials(&self, scope: &str) -> Option<Vec<String>> {
        self.pools().get(scope).map(CredentialPool::masked)
    }

    async fn ensure_initialized(&self, scope: &str) -> CredentialResult<()> {
        if self.is_initialized(scope) {
            return Ok(());
        }
        let _guard = self.init_lock.lock().await;
        // Another task may have finished loading while we waited.
        if self.is_initialized(scope) {
            return Ok(());
        }
        self.load_locked(scope).await
    }

    /// Load from the source and install the pool. Caller holds `init_lock`.
    async fn load_locked(&self, scope: &str) -> CredentialResult<()> {
        let credentials = match self.source.load(scope).await {
            Ok(credentials) => credentials,
            Err(e) => {
                warn!("Failed to load credentials for scope '{}': {}", scope, e);
                return Err(e);
            }
        };

        if credentials.is_empty() {
            warn!("No credentials configured for scope '{}'", scope);
        } else {
            info!(
                "Loaded {} credential(s) for scope '{}'",
                credentials.len(),
                scope
            );
        }

        self.pools()
            .insert(scope.to_string(), CredentialPool::new(credentials));
        Ok(())
    }

    fn pools(&self) -> MutexGuard<'_, HashMap<String, CredentialPool>> {
        self.pools.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::StaticCredentialSource;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn manager(keys: &[&str]) -> CredentialPoolManager {
        let source = StaticCredentialSource::new().with_scope("vision", keys.iter().copied());
        CredentialPoolManager::new(Arc::new(source))
    }

    /// Fails the first `failures` loads, then returns a fixed list.
    struct FlakySource {
        failures: usize,
        calls: AtomicUsize,
        keys: Vec<String>,
    }

    #[async_trait]
    impl CredentialSource for FlakySource {
        async fn load(&self, scope: &str) -> CredentialResult<Vec<String>> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.failures {
                return Err(CredentialError::Configuration {
                    scope: scope.to_string(),
                    message: "unreachable".to_string(),
                });
            }
            Ok(self.keys.clone())
        }
    }

    #[tokio::test]
    async fn test_round_robin_sequence() {
        let m = manager(&["a", "b", "c"]);
        let mut picked = Vec::new();
        for _ in 0..4 {
            picked.push(m.next("vision").await.unwrap());
        }
        assert_eq!(picked, vec!["a", "b", "c", "a"]);
    }

    #[tokio::test]
    async fn test_lazy_initialization() {
        let m = manager(&["a"]);
        assert!(!m.is_initialized("vision"));
        assert!(m.usage_stats("vision").is_none());
        m.next("vision").await.unwrap();
        assert!(m.is_initialized("vision"));
        assert_eq!(m.scopes(), vec!["vision"]);
    }

    #[tokio::test]
    async fn test_empty_scope_is_no_credentials() {
        let m = manager(&["a"]);
        let err = m.next("drive-access").await.unwrap_err();
        assert_eq!(err, CredentialError::NoCredentials("drive-access".to_string()));
        // Empty list still counts as initialized; it is not a source failure.
        assert!(m.is_initialized("drive-access"));
    }

    #[tokio::test]
    async fn test_failed_initialization_retries_next_time() {
        let source = FlakySource {
            failures: 1,
            calls: AtomicUsize::new(0),
            keys: vec!["k1".to_string(), "k2".to_string()],
        };
        let m = CredentialPoolManager::new(Arc::new(source));

        let err = m.next("vision").await.unwrap_err();
        assert!(matches!(err, CredentialError::Configuration { .. }));
        assert!(!m.is_initialized("vision"));

        assert_eq!(m.next("vision").await.unwrap(), "k1");
        assert!(m.is_initialized("vision"));
    }

    #[tokio::test]
    async fn test_refresh_resets_counters_and_cursor() {
        let m = manager(&["a", "b", "c"]);
        m.next("vision").await.unwrap();
        m.next("vision").await.unwrap();
        m.refresh("vision").await.unwrap();

        let stats = m.usage_stats("vision").unwrap();
        assert_eq!(stats.total_usage, 0);
        assert_eq!(m.next("vision").await.unwrap(), "a");
    }

    #[tokio::test]
    async fn test_usage_stats_total_matches_hand_outs() {
        let m = manager(&["a", "b", "c"]);
        m.next("vision").await.unwrap();
        m.by_index("vision", 5).await.unwrap();
        m.least_used("vision").await.unwrap();
        m.next("vision").await.unwrap();
        m.next("vision").await.unwrap();

        let stats = m.usage_stats("vision").unwrap();
        assert_eq!(stats.count, 3);
        assert_eq!(stats.total_usage, 5);
        assert_eq!(stats.per_credential_usage.iter().sum::<u64>(), 5);
    }

    #[tokio::test]
    async fn test_masked_credentials_after_initialize() {
        let m = manager(&["AIzaSyABCDEFGH1234", "short"]);
        assert!(m.masked_credentials("vision").is_none());
        m.initialize("vision").await.unwrap();
        assert_eq!(
            m.masked_credentials("vision").unwrap(),
            vec!["AIza…1234".to_string(), "****".to_string()]
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_round_robin_is_fair() {
        let m = Arc::new(manager(&["a", "b", "c", "d"]));
        let mut handles = Vec::new();
        for _ in 0..40 {
            let m = m.clone();
            handles.push(tokio::spawn(async move {
                let mut picked = Vec::new();
                for _ in 0..10 {
                    picked.push(m.next("vision").await.unwrap());
                }
                picked
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let stats = m.usage_stats("vision").unwrap();
        assert_eq!(stats.total_usage, 400);
        assert_eq!(stats.per_credential_usage, vec![100, 100, 100, 100]);
    }
}
