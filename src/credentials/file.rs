//! Credential source backed by the config file (plus env keys).

use std::path::PathBuf;

use async_trait::async_trait;

use super::env::EnvCredentialSource;
use super::normalize_credentials;
use super::source::{CredentialError, CredentialResult, CredentialSource};
use crate::config::Config;

/// Re-reads the config file on every load so `refresh` picks up rotated keys.
/// Keys from the environment are appended after the file's keys.
#[derive(Debug, Clone)]
pub struct ConfigFileCredentialSource {
    path: Option<PathBuf>,
    env: EnvCredentialSource,
}

impl ConfigFileCredentialSource {
    /// Source reading `path`. With `None`, only env keys are used.
    pub fn new(path: Option<PathBuf>) -> Self {
        Self {
            path,
            env: EnvCredentialSource::default(),
        }
    }

    pub fn with_env(mut self, env: EnvCredentialSource) -> Self {
        self.env = env;
        self
    }
}

#[async_trait]
impl CredentialSource for ConfigFileCredentialSource {
    async fn load(&self, scope: &str) -> CredentialResult<Vec<String>> {
        let mut raw: Vec<String> = Vec::new();

        if let Some(ref path) = self.path {
            let config =
                Config::load_from_path(path)
                    .await
                    .map_err(|e| CredentialError::Configuration {
                        scope: scope.to_string(),
                        message: e.to_string(),
                    })?;
            if let Some(keys) = config.credentials.get(scope) {
                raw.extend(keys.iter().cloned());
            }
        }

        raw.extend(self.env.raw_keys(scope));
        Ok(normalize_credentials(raw))
    }
}
