//! Provider that picks a pooled credential for every call.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use super::gemini::{build_http_client, GeminiClient};
use super::{Payload, Provider, ProviderError, ProviderSettings};
use crate::credentials::{mask_credential, CredentialPoolManager, Selection};

type ClientFactory = dyn Fn(String) -> Box<dyn Provider> + Send + Sync;

/// Spreads calls across the keys of one credential scope.
///
/// A key is selected per call, so concurrent batch items use different keys
/// under round-robin. Pool errors map to
/// [`ProviderError::MissingCredentials`], which aborts a batch.
pub struct RotatingProvider {
    manager: Arc<CredentialPoolManager>,
    scope: String,
    selection: Selection,
    factory: Box<ClientFactory>,
}

impl RotatingProvider {
    /// Gemini clients sharing one HTTP connection pool.
    pub fn gemini(
        manager: Arc<CredentialPoolManager>,
        scope: impl Into<String>,
        settings: ProviderSettings,
    ) -> Result<Self, ProviderError> {
        let http = build_http_client(&settings)?;
        Ok(Self::with_factory(manager, scope, move |key| {
            Box::new(GeminiClient::with_http(http.clone(), settings.clone(), key))
        }))
    }

    /// Build a provider for each selected key with `factory`.
    pub fn with_factory<F>(manager: Arc<CredentialPoolManager>, scope: impl Into<String>, factory: F) -> Self
    where
        F: Fn(String) -> Box<dyn Provider> + Send + Sync + 'static,
    {
        Self {
            manager,
            scope: scope.into(),
            selection: Selection::RoundRobin,
            factory: Box::new(factory),
        }
    }

    pub fn with_selection(mut self, selection: Selection) -> Self {
        self.selection = selection;
        self
    }

    pub fn scope(&self) -> &str {
        &self.scope
    }

    pub fn manager(&self) -> &Arc<CredentialPoolManager> {
        &self.manager
    }
}

#[async_trait]
impl Provider for RotatingProvider {
    fn name(&self) -> &str {
        "rotating"
    }

    async fn send(&self, payload: &Payload, prompt: &str) -> Result<String, ProviderError> {
        let key = self.manager.select(&self.scope, self.selection).await?;
        debug!("Using key {} for scope '{}'", mask_credential(&key), self.scope);
        let client = (self.factory)(key);
        client.send(payload, prompt).await
    }
}
