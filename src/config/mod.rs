//! Configuration management for toonlate using the prefer crate.
//!
//! Config files (`toonlate.toml`, `.yaml`, `.json`, ...) are discovered by
//! prefer in the standard locations, or passed explicitly with `--config`.
//! Every section has defaults, and a handful of env vars override the file.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::batch::BatchConfig;
use crate::provider::ProviderSettings;

/// Application name used for config discovery.
pub const CONFIG_NAME: &str = "toonlate";

/// Errors from reading or parsing a config file.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse {format} config {path}: {message}")]
    Parse {
        path: PathBuf,
        format: &'static str,
        message: String,
    },
}

/// Prompt template overrides. Each value is either a path to a file or the
/// template text itself.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PromptConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ocr: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub translate: Option<String>,
}

/// Configuration file structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Credential lists keyed by scope (e.g. `vision`, `drive-access`).
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub credentials: HashMap<String, Vec<String>>,
    /// Generative provider connection settings.
    #[serde(default)]
    pub provider: ProviderSettings,
    /// Default batch orchestration settings.
    #[serde(default)]
    pub batch: BatchConfig,
    /// Prompt template overrides.
    #[serde(default)]
    pub prompts: PromptConfig,
    /// Path to the config file this was loaded from (not serialized).
    #[serde(skip)]
    pub source_path: Option<PathBuf>,
}

impl Config {
    /// Load configuration using prefer crate for discovery.
    /// Falls back to defaults (with env overrides) when no file is found.
    pub async fn load() -> Self {
        match prefer::load(CONFIG_NAME).await {
            Ok(pref_config) => {
                if let Some(path) = pref_config.source_path() {
                    match Self::load_from_path(path).await {
                        Ok(config) => config,
                        Err(e) => {
                            tracing::warn!("{}; using defaults", e);
                            Self::default().with_env_overrides()
                        }
                    }
                } else {
                    Self::default().with_env_overrides()
                }
            }
            Err(_) => Self::default().with_env_overrides(),
        }
    }

    /// Load configuration from a specific file path.
    /// Supports JSON, TOML and YAML based on file extension.
    pub async fn load_from_path(path: &Path) -> Result<Self, ConfigError> {
        let contents = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| ConfigError::Read {
                path: path.to_path_buf(),
                source,
            })?;

        let mut config = Self::parse(&contents, path)?;
        config.source_path = Some(path.to_path_buf());
        Ok(config.with_env_overrides())
    }

    /// Parse config text, picking the format from the path's extension.
    pub fn parse(contents: &str, path: &Path) -> Result<Self, ConfigError> {
        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("toml");
        let parse_err = |format: &'static str, message: String| ConfigError::Parse {
            path: path.to_path_buf(),
            format,
            message,
        };

        match ext {
            "json" => serde_json::from_str(contents).map_err(|e| parse_err("JSON", e.to_string())),
            "yaml" | "yml" => {
                serde_yaml::from_str(contents).map_err(|e| parse_err("YAML", e.to_string()))
            }
            _ => toml::from_str(contents).map_err(|e| parse_err("TOML", e.to_string())),
        }
    }

    /// Apply environment variable overrides on top of file values.
    pub fn with_env_overrides(mut self) -> Self {
        self.batch = self.batch.with_env_overrides();
        self.provider = self.provider.with_env_overrides();
        self
    }

    /// Directory used to resolve relative paths (config file dir, else CWD).
    pub fn base_dir(&self) -> PathBuf {
        self.source_path
            .as_ref()
            .and_then(|p| p.parent().map(Path::to_path_buf))
            .unwrap_or_else(|| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")))
    }

    /// Resolve a path that may be relative to the config file.
    pub fn resolve_path(&self, path_str: &str) -> PathBuf {
        let expanded = shellexpand::tilde(path_str);
        let path = Path::new(expanded.as_ref());
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base_dir().join(path)
        }
    }

    /// Resolve a prompt override: read it as a file if one exists at the
    /// resolved path, otherwise treat the value as inline template text.
    pub async fn resolve_prompt(&self, value: Option<&str>) -> Option<String> {
        let value = value?;
        let path = self.resolve_path(value);
        if path.is_file() {
            match tokio::fs::read_to_string(&path).await {
                Ok(text) => return Some(text),
                Err(e) => tracing::warn!("Failed to read prompt {}: {}", path.display(), e),
            }
        }
        Some(value.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_toml_config() {
        let text = r#"
[credentials]
vision = ["key-a", "key-b"]
drive-access = ["token-1"]

[provider]
model = "gemini-2.0-flash"

[batch]
concurrency = 3
max_retries = 1
"#;
        let config = Config::parse(text, Path::new("toonlate.toml")).unwrap();
        assert_eq!(config.credentials["vision"], vec!["key-a", "key-b"]);
        assert_eq!(config.credentials["drive-access"], vec!["token-1"]);
        assert_eq!(config.provider.model, "gemini-2.0-flash");
        assert_eq!(config.batch.concurrency, 3);
        assert_eq!(config.batch.max_retries, 1);
        // Unset batch fields keep their defaults.
        assert_eq!(config.batch.timeout_ms, BatchConfig::default().timeout_ms);
    }

    #[test]
    fn parse_json_and_yaml_configs() {
        let json = r#"{"credentials": {"vision": ["j1"]}}"#;
        let config = Config::parse(json, Path::new("toonlate.json")).unwrap();
        assert_eq!(config.credentials["vision"], vec!["j1"]);

        let yaml = "credentials:\n  vision:\n    - y1\n    - y2\n";
        let config = Config::parse(yaml, Path::new("toonlate.yml")).unwrap();
        assert_eq!(config.credentials["vision"], vec!["y1", "y2"]);
    }

    #[test]
    fn parse_error_names_format() {
        let err = Config::parse("credentials = [", Path::new("bad.toml")).unwrap_err();
        assert!(err.to_string().contains("TOML"));
    }

    #[tokio::test]
    async fn load_from_path_records_source() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("toonlate.toml");
        std::fs::write(&path, "[credentials]\nvision = [\"a\"]\n").unwrap();

        let config = Config::load_from_path(&path).await.unwrap();
        assert_eq!(config.source_path.as_deref(), Some(path.as_path()));
        assert_eq!(config.base_dir(), dir.path());
    }

    #[tokio::test]
    async fn load_from_missing_path_is_read_error() {
        let err = Config::load_from_path(Path::new("/nonexistent/toonlate.toml"))
            .await
            .unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[tokio::test]
    async fn resolve_prompt_reads_file_or_inline() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("ocr.txt"), "Read {text}").unwrap();
        let config = Config {
            source_path: Some(dir.path().join("toonlate.toml")),
            ..Config::default()
        };

        assert_eq!(
            config.resolve_prompt(Some("ocr.txt")).await.as_deref(),
            Some("Read {text}")
        );
        assert_eq!(
            config.resolve_prompt(Some("Inline prompt")).await.as_deref(),
            Some("Inline prompt")
        );
        assert!(config.resolve_prompt(None).await.is_none());
    }
}
