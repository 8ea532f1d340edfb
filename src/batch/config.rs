//! Batch orchestration settings.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::BatchError;

/// Concurrency, timeout and retry settings for one batch run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchConfig {
    /// Maximum number of in-flight calls.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    /// Per-attempt timeout in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    /// Retries after the first attempt (total attempts = max_retries + 1).
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Delay before a retry in milliseconds.
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
}

fn default_concurrency() -> usize {
    4
}

fn default_timeout_ms() -> u64 {
    120_000
}

fn default_max_retries() -> u32 {
    2
}

fn default_retry_delay_ms() -> u64 {
    2_000
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            timeout_ms: default_timeout_ms(),
            max_retries: default_max_retries(),
            retry_delay_ms: default_retry_delay_ms(),
        }
    }
}

impl BatchConfig {
    pub fn new(concurrency: usize, timeout: Duration, max_retries: u32, retry_delay: Duration) -> Self {
        Self {
            concurrency,
            timeout_ms: saturating_millis(timeout),
            max_retries,
            retry_delay_ms: saturating_millis(retry_delay),
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    pub fn validate(&self) -> Result<(), BatchError> {
        if self.concurrency == 0 {
            return Err(BatchError::InvalidConfig(
                "concurrency must be at least 1".to_string(),
            ));
        }
        if self.timeout_ms == 0 {
            return Err(BatchError::InvalidConfig(
                "timeout_ms must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }

    /// Override fields from TOONLATE_CONCURRENCY, TOONLATE_TIMEOUT_MS,
    /// TOONLATE_MAX_RETRIES and TOONLATE_RETRY_DELAY_MS.
    pub fn with_env_overrides(mut self) -> Self {
        if let Some(v) = env_number("TOONLATE_CONCURRENCY") {
            self.concurrency = usize::try_from(v).unwrap_or(usize::MAX);
        }
        if let Some(v) = env_number("TOONLATE_TIMEOUT_MS") {
            self.timeout_ms = v;
        }
        if let Some(v) = env_number("TOONLATE_MAX_RETRIES") {
            self.max_retries = u32::try_from(v).unwrap_or(u32::MAX);
        }
        if let Some(v) = env_number("TOONLATE_RETRY_DELAY_MS") {
            self.retry_delay_ms = v;
        }
        self
    }
}

fn saturating_millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

fn env_number(var: &str) -> Option<u64> {
    std::env::var(var).ok().and_then(|s| s.trim().parse::<u64>().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = BatchConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.timeout(), Duration::from_secs(120));
        assert_eq!(config.retry_delay(), Duration::from_secs(2));
    }

    #[test]
    fn test_zero_concurrency_rejected() {
        let config = BatchConfig {
            concurrency: 0,
            ..BatchConfig::default()
        };
        assert!(matches!(config.validate(), Err(BatchError::InvalidConfig(_))));
    }

    #[test]
    fn test_huge_durations_saturate() {
        let config = BatchConfig::new(1, Duration::MAX, 0, Duration::MAX);
        assert_eq!(config.timeout_ms, u64::MAX);
        assert_eq!(config.retry_delay_ms, u64::MAX);
    }

    #[test]
    fn test_env_retries_saturate() {
        std::env::set_var("TOONLATE_MAX_RETRIES", "99999999999");
        let config = BatchConfig::default().with_env_overrides();
        std::env::remove_var("TOONLATE_MAX_RETRIES");
        assert_eq!(config.max_retries, u32::MAX);
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let config = BatchConfig::new(2, Duration::ZERO, 1, Duration::from_millis(5));
        assert!(matches!(config.validate(), Err(BatchError::InvalidConfig(_))));
    }
}
