//! Pluggable sources that supply credential lists per scope.
//!
//! A source may be an in-memory map (tests, composition roots), environment
//! variables, or the config file. A scope that a source does not know about
//! yields an empty list; only an unreachable source is an error.

use std::collections::HashMap;

use async_trait::async_trait;

use super::normalize_credentials;

/// Result type for credential operations.
pub type CredentialResult<T> = Result<T, CredentialError>;

/// Errors from credential loading and selection.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CredentialError {
    #[error("Credential source unavailable for scope '{scope}': {message}")]
    Configuration { scope: String, message: String },
    #[error("No credentials configured for scope '{0}'; configure API keys for this scope")]
    NoCredentials(String),
}

/// Trait for credential configuration sources.
#[async_trait]
pub trait CredentialSource: Send + Sync {
    /// Load the ordered credential list for a scope.
    async fn load(&self, scope: &str) -> CredentialResult<Vec<String>>;
}

/// Fixed in-memory credential lists.
#[derive(Debug, Clone, Default)]
pub struct StaticCredentialSource {
    scopes: HashMap<String, Vec<String>>,
}

impl StaticCredentialSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add (or replace) the credential list for a scope.
    pub fn with_scope<I, S>(mut self, scope: &str, credentials: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.scopes
            .insert(scope.to_string(), normalize_credentials(credentials));
        self
    }
}

#[async_trait]
impl CredentialSource for StaticCredentialSource {
    async fn load(&self, scope: &str) -> CredentialResult<Vec<String>> {
        Ok(self.scopes.get(scope).cloned().unwrap_or_default())
    }
}
