//! Durable per-key small-value storage with advisory locks.
//!
//! [`Store`] is the sole coupling between the collector engine and whichever
//! concrete backend a deployment chooses. Only one backend ships here
//! ([`file::FileStore`], for on-host / single-box deployments) plus an
//! in-memory backend used by tests; cloud-table and cloud-document backends
//! are expected to implement the same trait without the engine knowing the
//! difference.

pub mod file;
pub mod memory;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

/// An arbitrary small structured record. Backed by [`serde_json::Value`] so
/// that numeric values (including sub-second epoch floats) round-trip
/// exactly through backends that serialize to JSON or a JSON-like encoding.
pub type Value = serde_json::Value;

#[derive(Debug, Error)]
pub enum KvError {
    #[error("key value store io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("key value store encoding error: {0}")]
    Encoding(#[from] serde_json::Error),
    #[error("lock already held for key {0}")]
    LockHeld(String),
}

pub type Result<T> = std::result::Result<T, KvError>;

/// Durable per-key store with advisory locks, per spec §4.1.
#[async_trait]
pub trait Store: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Value>>;

    async fn set(&self, key: &str, value: Value) -> Result<()>;

    async fn has(&self, key: &str) -> Result<bool> {
        Ok(self.get(key).await?.is_some())
    }

    async fn delete(&self, key: &str) -> Result<()>;

    /// Atomic compare-and-set on a key derived from `key`. Returns `true`
    /// iff the caller now holds the lock.
    async fn acquire_lock(&self, key: &str) -> Result<bool>;

    async fn release_lock(&self, key: &str) -> Result<bool>;

    /// Releases the lock only if its recorded timestamp is older than
    /// `expiry`, after verifying no live holder exists underneath. Returns
    /// `true` if the lock was released.
    async fn release_lock_if_expired(&self, key: &str, expiry: chrono::Duration)
        -> Result<bool>;
}

pub fn lock_key(key: &str) -> String {
    format!("lockon_{key}")
}

/// Stored shape of a lock record, shared by every backend.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct LockRecord {
    pub value: u8,
    pub last_locked_date: DateTime<Utc>,
}

impl LockRecord {
    pub fn held(now: DateTime<Utc>) -> Self {
        LockRecord {
            value: 1,
            last_locked_date: now,
        }
    }

    pub fn released(now: DateTime<Utc>) -> Self {
        LockRecord {
            value: 0,
            last_locked_date: now,
        }
    }

    pub fn is_held(&self) -> bool {
        self.value == 1
    }
}
