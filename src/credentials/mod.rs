//! Credential rotation for external provider scopes.
//!
//! Each scope (e.g. `vision`, `drive-access`) owns an ordered pool of API keys.
//! Callers ask the [`CredentialPoolManager`] for the next key instead of
//! tracking which key was used last:
//! - round-robin (`next`) for ordinary traffic
//! - by index (`by_index`) for deterministic per-worker fan-out
//! - least used (`least_used`) to rebalance long-lived processes
//!
//! Pools are loaded lazily from a pluggable [`CredentialSource`].

mod env;
mod file;
mod manager;
mod pool;
mod source;

pub use env::EnvCredentialSource;
pub use file::ConfigFileCredentialSource;
pub use manager::CredentialPoolManager;
pub use pool::{CredentialPool, Selection, UsageStats};
pub use source::{CredentialError, CredentialResult, CredentialSource, StaticCredentialSource};

/// Scope used for the generative vision/translation provider.
pub const VISION_SCOPE: &str = "vision";

/// Scope used for the image hosting / file listing provider.
pub const DRIVE_SCOPE: &str = "drive-access";

/// Mask a credential for log output, keeping only a short prefix and suffix.
pub fn mask_credential(credential: &str) -> String {
    let chars: Vec<char> = credential.chars().collect();
    if chars.len() <= 8 {
        return "****".to_string();
    }
    let head: String = chars[..4].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{}…{}", head, tail)
}

/// Trim entries, drop blanks and de-duplicate while keeping first-seen order.
pub(crate) fn normalize_credentials<I, S>(raw: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut out: Vec<String> = Vec::new();
    for entry in raw {
        let trimmed = entry.as_ref().trim();
        if trimmed.is_empty() || out.iter().any(|existing| existing == trimmed) {
            continue;
        }
        out.push(trimmed.to_string());
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mask_credential() {
        assert_eq!(mask_credential("short"), "****");
        assert_eq!(mask_credential("AIzaSyExampleKey1234"), "AIza…1234");
    }

    #[test]
    fn test_normalize_credentials() {
        let keys = normalize_credentials([" a ", "", "b", "a", "  ", "c"]);
        assert_eq!(keys, vec!["a", "b", "c"]);
    }
}
