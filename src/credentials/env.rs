//! Credential source backed by environment variables.
//!
//! Env vars (comma separated lists):
//! - TOONLATE_<SCOPE>_KEYS, scope upper-cased with `-` mapped to `_`
//!   (e.g. TOONLATE_VISION_KEYS, TOONLATE_DRIVE_ACCESS_KEYS)
//! - GEMINI_API_KEYS / GEMINI_API_KEY, appended for the `vision` scope
//!   by the default source

use async_trait::async_trait;

use super::source::{CredentialResult, CredentialSource};
use super::{normalize_credentials, VISION_SCOPE};

/// Reads credential lists from the process environment on every load.
#[derive(Debug, Clone)]
pub struct EnvCredentialSource {
    prefix: String,
    /// Also read the provider's own GEMINI_API_KEY(S) vars for `vision`.
    provider_vars: bool,
}

impl Default for EnvCredentialSource {
    fn default() -> Self {
        Self {
            prefix: "TOONLATE".to_string(),
            provider_vars: true,
        }
    }
}

impl EnvCredentialSource {
    /// Source reading only `<prefix>_<SCOPE>_KEYS`.
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            provider_vars: false,
        }
    }

    /// Name of the env var holding keys for `scope`.
    pub fn var_name(&self, scope: &str) -> String {
        let scope = scope.to_uppercase().replace(['-', '.', ' '], "_");
        format!("{}_{}_KEYS", self.prefix, scope)
    }

    /// Collect keys for `scope` without normalization.
    pub(crate) fn raw_keys(&self, scope: &str) -> Vec<String> {
        let mut raw: Vec<String> = Vec::new();
        if let Ok(val) = std::env::var(self.var_name(scope)) {
            raw.extend(val.split(',').map(str::to_string));
        }
        if self.provider_vars && scope == VISION_SCOPE {
            if let Ok(val) = std::env::var("GEMINI_API_KEYS") {
                raw.extend(val.split(',').map(str::to_string));
            }
            if let Ok(val) = std::env::var("GEMINI_API_KEY") {
                raw.push(val);
            }
        }
        raw
    }
}

#[async_trait]
impl CredentialSource for EnvCredentialSource {
    async fn load(&self, scope: &str) -> CredentialResult<Vec<String>> {
        Ok(normalize_credentials(self.raw_keys(scope)))
    }
}
