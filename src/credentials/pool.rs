//! In-memory credential pool for a single scope.

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Strategy used to pick a credential from a pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Selection {
    /// Cyclic cursor over the pool.
    #[default]
    RoundRobin,
    /// Credential with the lowest usage counter (ties go to the lowest index).
    LeastUsed,
    /// Fixed worker slot: credential `index % len`, cursor untouched.
    Pinned(usize),
}

/// Usage statistics for a scope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageStats {
    pub scope: String,
    pub count: usize,
    pub per_credential_usage: Vec<u64>,
    pub total_usage: u64,
    pub loaded_at: DateTime<Utc>,
}

/// Ordered credentials with a rotation cursor and per-credential usage counters.
///
/// Every selection method is synchronous: reading the cursor/counters and
/// writing them back happens in one call, so callers holding the pool behind
/// a mutex never interleave two selections.
#[derive(Debug, Clone)]
pub struct CredentialPool {
    credentials: Vec<String>,
    cursor: usize,
    usage: Vec<u64>,
    loaded_at: DateTime<Utc>,
}

impl CredentialPool {
    pub fn new(credentials: Vec<String>) -> Self {
        let usage = vec![0; credentials.len()];
        Self {
            credentials,
            cursor: 0,
            usage,
            loaded_at: Utc::now(),
        }
    }

    pub fn len(&self) -> usize {
        self.credentials.len()
    }

    pub fn is_empty(&self) -> bool {
        self.credentials.is_empty()
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Hand out the credential at the cursor and advance it.
    pub fn next(&mut self) -> Option<&str> {
        if self.credentials.is_empty() {
            return None;
        }
        let index = self.cursor;
        self.cursor = (self.cursor + 1) % self.credentials.len();
        Some(self.take(index))
    }

    /// Hand out the credential at `index % len` without moving the cursor.
    pub fn by_index(&mut self, index: usize) -> Option<&str> {
        if self.credentials.is_empty() {
            return None;
        }
        let index = index % self.credentials.len();
        Some(self.take(index))
    }

    /// Hand out the least used credential (lowest index on ties).
    pub fn least_used(&mut self) -> Option<&str> {
        let index = self
            .usage
            .iter()
            .enumerate()
            .min_by_key(|(i, count)| (**count, *i))
            .map(|(i, _)| i)?;
        Some(self.take(index))
    }

    /// Select according to a strategy.
    pub fn select(&mut self, selection: Selection) -> Option<&str> {
        match selection {
            Selection::RoundRobin => self.next(),
            Selection::LeastUsed => self.least_used(),
            Selection::Pinned(index) => self.by_index(index),
        }
    }

    pub fn stats(&self, scope: &str) -> UsageStats {
        UsageStats {
            scope: scope.to_string(),
            count: self.credentials.len(),
            per_credential_usage: self.usage.clone(),
            total_usage: self.usage.iter().sum(),
            loaded_at: self.loaded_at,
        }
    }

    /// Credentials in pool order, masked for display.
    pub fn masked(&self) -> Vec<String> {
        self.credentials.iter().map(|c| super::mask_credential(c)).collect()
    }

    fn take(&mut self, index: usize) -> &str {
        self.usage[index] += 1;
        &self.credentials[index]
    }
}
