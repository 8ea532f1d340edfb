//! Generative AI provider adapters.
//!
//! The rest of the crate talks to the model through the narrow [`Provider`]
//! trait: send one payload with one prompt, get text back. [`GeminiClient`]
//! speaks the `generateContent` API with a single key and
//! [`RotatingProvider`] draws a key from the credential pool per call.

mod gemini;
pub mod image;
mod rotating;

pub use gemini::GeminiClient;
pub use rotating::RotatingProvider;

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::batch::{Disposition, Retryable};
use crate::credentials::CredentialError;

/// Input sent to the model alongside the prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    /// Base64-encoded image data.
    InlineImage { data: String, mime_type: String },
    Text(String),
}

impl Payload {
    pub fn text(text: impl Into<String>) -> Self {
        Payload::Text(text.into())
    }

    pub fn is_image(&self) -> bool {
        matches!(self, Payload::InlineImage { .. })
    }
}

/// Provider call failures, classified for the batch retry policy.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("No API key available for scope '{scope}': {message}")]
    MissingCredentials { scope: String, message: String },

    #[error("Provider misconfigured: {0}")]
    Configuration(String),

    #[error("Rate limited by provider")]
    RateLimited { retry_after: Option<Duration> },

    #[error("Provider server error ({status}): {body}")]
    Server { status: u16, body: String },

    #[error("Provider request timed out")]
    Timeout,

    #[error("Connection to provider failed: {0}")]
    Connection(String),

    #[error("Could not read provider response: {0}")]
    InvalidResponse(String),

    #[error("Provider rejected credentials ({status})")]
    Unauthorized { status: u16 },

    #[error("Provider rejected request ({status}): {body}")]
    Rejected { status: u16, body: String },

    #[error("Provider returned no content")]
    EmptyResponse,

    #[error("IO error: {0}")]
    Io(String),
}

impl From<CredentialError> for ProviderError {
    fn from(e: CredentialError) -> Self {
        match e {
            CredentialError::Configuration { scope, message } => {
                ProviderError::MissingCredentials { scope, message }
            }
            CredentialError::NoCredentials(scope) => ProviderError::MissingCredentials {
                message: format!("configure API keys for scope '{}'", scope),
                scope,
            },
        }
    }
}

impl From<std::io::Error> for ProviderError {
    fn from(e: std::io::Error) -> Self {
        ProviderError::Io(e.to_string())
    }
}

impl From<reqwest::Error> for ProviderError {
    fn from(e: reqwest::Error) -> Self {
        let e = e.without_url();
        if e.is_timeout() {
            ProviderError::Timeout
        } else if e.is_connect() || e.is_request() {
            ProviderError::Connection(e.to_string())
        } else if e.is_decode() || e.is_body() {
            ProviderError::InvalidResponse(e.to_string())
        } else {
            ProviderError::Connection(e.to_string())
        }
    }
}

impl Retryable for ProviderError {
    fn disposition(&self) -> Disposition {
        match self {
            ProviderError::MissingCredentials { .. } | ProviderError::Configuration(_) => {
                Disposition::Abort
            }
            ProviderError::RateLimited { retry_after } => Disposition::Retry {
                after: *retry_after,
            },
            ProviderError::Server { .. }
            | ProviderError::Timeout
            | ProviderError::Connection(_)
            | ProviderError::InvalidResponse(_) => Disposition::Retry { after: None },
            ProviderError::Unauthorized { .. }
            | ProviderError::Rejected { .. }
            | ProviderError::EmptyResponse
            | ProviderError::Io(_) => Disposition::FailFast,
        }
    }
}

/// A generative model that turns a payload and prompt into text.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &str;

    async fn send(&self, payload: &Payload, prompt: &str) -> Result<String, ProviderError>;
}

/// Endpoint and generation settings for the Gemini API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderSettings {
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_max_output_tokens")]
    pub max_output_tokens: u32,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_endpoint() -> String {
    "https://generativelanguage.googleapis.com/v1beta".to_string()
}

fn default_model() -> String {
    "gemini-2.0-flash".to_string()
}

fn default_temperature() -> f32 {
    0.1
}

fn default_max_output_tokens() -> u32 {
    8192
}

fn default_request_timeout_secs() -> u64 {
    180
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            model: default_model(),
            temperature: default_temperature(),
            max_output_tokens: default_max_output_tokens(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl ProviderSettings {
    /// Override model and endpoint from TOONLATE_MODEL and TOONLATE_ENDPOINT.
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(model) = std::env::var("TOONLATE_MODEL") {
            if !model.trim().is_empty() {
                self.model = model.trim().to_string();
            }
        }
        if let Ok(endpoint) = std::env::var("TOONLATE_ENDPOINT") {
            if !endpoint.trim().is_empty() {
                self.endpoint = endpoint.trim().trim_end_matches('/').to_string();
            }
        }
        self
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}
