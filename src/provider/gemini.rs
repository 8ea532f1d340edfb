//! Google Gemini `generateContent` client.
//!
//! One client holds one API key. Rate limiting and retries are left to the
//! caller: a 429 surfaces as [`ProviderError::RateLimited`] carrying the
//! Retry-After delay so the batch orchestrator can honour it.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{Payload, Provider, ProviderError, ProviderSettings};
use crate::credentials::mask_credential;

/// The key travels in a header so it never appears in URLs or error text.
const API_KEY_HEADER: &str = "x-goog-api-key";

/// Upper bound on a provider-requested wait.
const MAX_RETRY_AFTER_SECS: u64 = 60;

pub struct GeminiClient {
    http: reqwest::Client,
    settings: ProviderSettings,
    api_key: String,
}

#[derive(Debug, Serialize)]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
    #[serde(rename = "generationConfig")]
    generation_config: GeminiGenerationConfig,
}

#[derive(Debug, Serialize)]
struct GeminiContent {
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum GeminiPart {
    Text { text: String },
    InlineData { inline_data: GeminiInlineData },
}

#[derive(Debug, Serialize)]
struct GeminiInlineData {
    mime_type: String,
    data: String,
}

#[derive(Debug, Serialize)]
struct GeminiGenerationConfig {
    temperature: f32,
    #[serde(rename = "maxOutputTokens")]
    max_output_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct GeminiResponse {
    candidates: Option<Vec<GeminiCandidate>>,
    error: Option<GeminiError>,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidate {
    content: Option<GeminiResponseContent>,
}

#[derive(Debug, Deserialize)]
struct GeminiResponseContent {
    #[serde(default)]
    parts: Vec<GeminiResponsePart>,
}

#[derive(Debug, Deserialize)]
struct GeminiResponsePart {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GeminiError {
    message: String,
}

impl GeminiClient {
    /// Build a client with its own HTTP connection pool.
    pub fn new(settings: ProviderSettings, api_key: impl Into<String>) -> Result<Self, ProviderError> {
        let http = build_http_client(&settings)?;
        Ok(Self::with_http(http, settings, api_key))
    }

    /// Build a client sharing an existing HTTP connection pool.
    pub fn with_http(
        http: reqwest::Client,
        settings: ProviderSettings,
        api_key: impl Into<String>,
    ) -> Self {
        Self {
            http,
            settings,
            api_key: api_key.into(),
        }
    }

    pub fn model(&self) -> &str {
        &self.settings.model
    }

    fn url(&self) -> String {
        format!(
            "{}/models/{}:generateContent",
            self.settings.endpoint.trim_end_matches('/'),
            self.settings.model
        )
    }

    fn request(&self, payload: &Payload, prompt: &str) -> GeminiRequest {
        let mut parts = vec![GeminiPart::Text {
            text: prompt.to_string(),
        }];
        match payload {
            Payload::InlineImage { data, mime_type } => parts.push(GeminiPart::InlineData {
                inline_data: GeminiInlineData {
                    mime_type: mime_type.clone(),
                    data: data.clone(),
                },
            }),
            Payload::Text(text) if !text.is_empty() => {
                parts.push(GeminiPart::Text { text: text.clone() })
            }
            // Text already rendered into the prompt.
            Payload::Text(_) => {}
        }

        GeminiRequest {
            contents: vec![GeminiContent { parts }],
            generation_config: GeminiGenerationConfig {
                temperature: self.settings.temperature,
                max_output_tokens: self.settings.max_output_tokens,
            },
        }
    }
}

pub(crate) fn build_http_client(settings: &ProviderSettings) -> Result<reqwest::Client, ProviderError> {
    reqwest::Client::builder()
        .timeout(settings.request_timeout())
        .user_agent(concat!("toonlate/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| ProviderError::Configuration(format!("Failed to build HTTP client: {}", e)))
}

#[async_trait]
impl Provider for GeminiClient {
    fn name(&self) -> &str {
        "gemini"
    }

    async fn send(&self, payload: &Payload, prompt: &str) -> Result<String, ProviderError> {
        let request = self.request(payload, prompt);
        debug!(
            "Gemini request: model {}, key {}",
            self.settings.model,
            mask_credential(&self.api_key)
        );

        let response = self
            .http
            .post(self.url())
            .header(API_KEY_HEADER, &self.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let retry_after = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string);
            let body = response.text().await.unwrap_or_default();
            return Err(status_error(status, retry_after.as_deref(), body));
        }

        let gemini_response: GeminiResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::InvalidResponse(format!("Failed to parse response: {}", e)))?;

        if let Some(error) = gemini_response.error {
            return Err(ProviderError::InvalidResponse(format!(
                "Gemini API error: {}",
                error.message
            )));
        }

        let text: String = gemini_response
            .candidates
            .and_then(|c| c.into_iter().next())
            .and_then(|c| c.content)
            .map(|content| {
                content
                    .parts
                    .into_iter()
                    .filter_map(|p| p.text)
                    .collect::<Vec<_>>()
                    .join("")
            })
            .unwrap_or_default();

        if text.trim().is_empty() {
            return Err(ProviderError::EmptyResponse);
        }
        Ok(text)
    }
}

/// Parse a Retry-After header value in seconds, capped at one minute.
fn parse_retry_after(header_value: Option<&str>) -> Option<Duration> {
    let value = header_value?;
    value
        .trim()
        .parse::<u64>()
        .ok()
        .map(|secs| Duration::from_secs(secs.min(MAX_RETRY_AFTER_SECS)))
}

fn status_error(status: StatusCode, retry_after: Option<&str>, body: String) -> ProviderError {
    match status.as_u16() {
        429 => ProviderError::RateLimited {
            retry_after: parse_retry_after(retry_after),
        },
        401 | 403 => ProviderError::Unauthorized {
            status: status.as_u16(),
        },
        code if status.is_server_error() => ProviderError::Server { status: code, body },
        code => ProviderError::Rejected { status: code, body },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert!(matches!(
            status_error(StatusCode::TOO_MANY_REQUESTS, Some("12"), String::new()),
            ProviderError::RateLimited { retry_after: Some(d) } if d == Duration::from_secs(12)
        ));
        assert!(matches!(
            status_error(StatusCode::FORBIDDEN, None, String::new()),
            ProviderError::Unauthorized { status: 403 }
        ));
        assert!(matches!(
            status_error(StatusCode::SERVICE_UNAVAILABLE, None, "busy".into()),
            ProviderError::Server { status: 503, .. }
        ));
        assert!(matches!(
            status_error(StatusCode::PAYLOAD_TOO_LARGE, None, String::new()),
            ProviderError::Rejected { status: 413, .. }
        ));
    }

    #[test]
    fn test_retry_after_is_capped() {
        assert_eq!(parse_retry_after(Some("600")), Some(Duration::from_secs(60)));
        assert_eq!(parse_retry_after(Some("soon")), None);
        assert_eq!(parse_retry_after(None), None);
    }

    #[test]
    fn test_request_shape() {
        let client = GeminiClient::with_http(
            reqwest::Client::new(),
            ProviderSettings::default(),
            "AIzaTESTKEY1234",
        );
        let payload = Payload::InlineImage {
            data: "aGVsbG8=".into(),
            mime_type: "image/png".into(),
        };
        let json = serde_json::to_value(client.request(&payload, "Read this page")).unwrap();
        assert_eq!(json["contents"][0]["parts"][0]["text"], "Read this page");
        assert_eq!(
            json["contents"][0]["parts"][1]["inline_data"]["mime_type"],
            "image/png"
        );
        assert_eq!(json["generationConfig"]["maxOutputTokens"], 8192);
        assert!(client.url().ends_with("models/gemini-2.0-flash:generateContent"));
        assert!(!client.url().contains("AIzaTESTKEY1234"));
    }

    #[tokio::test]
    async fn test_transport_error_does_not_leak_key() {
        let settings = ProviderSettings {
            endpoint: "http://127.0.0.1:1/v1beta".to_string(),
            request_timeout_secs: 5,
            ..ProviderSettings::default()
        };
        let client = GeminiClient::new(settings, "SECRETKEY1234567890").unwrap();

        let err = client.send(&Payload::text("hi"), "Read this").await.unwrap_err();
        assert!(
            matches!(err, ProviderError::Connection(_) | ProviderError::Timeout),
            "{:?}",
            err
        );
        assert!(!err.to_string().contains("SECRETKEY1234567890"), "{}", err);
    }

    #[test]
    fn test_response_text_parts_are_joined() {
        let body = r#"{"candidates":[{"content":{"parts":[{"text":"1. FINAL TEXT:"},{"text":" hello"}]}}]}"#;
        let parsed: GeminiResponse = serde_json::from_str(body).unwrap();
        let parts = parsed.candidates.unwrap().remove(0).content.unwrap().parts;
        let text: String = parts.into_iter().filter_map(|p| p.text).collect();
        assert_eq!(text, "1. FINAL TEXT: hello");
    }
}
