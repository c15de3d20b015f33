//! In-process store used by tests and dry runs. Not durable across restarts.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;

use crate::{lock_key, KvError, LockRecord, Result, Store, Value};

#[derive(Default)]
pub struct MemoryStore {
    values: Mutex<HashMap<String, Value>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<Value>> {
        Ok(self.values.lock().unwrap().get(key).cloned())
    }

    async fn set(&self, key: &str, value: Value) -> Result<()> {
        self.values.lock().unwrap().insert(key.to_string(), value);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.values.lock().unwrap().remove(key);
        Ok(())
    }

    async fn acquire_lock(&self, key: &str) -> Result<bool> {
        let lkey = lock_key(key);
        let mut values = self.values.lock().unwrap();
        let held = values
            .get(&lkey)
            .and_then(|v| serde_json::from_value::<LockRecord>(v.clone()).ok())
            .map(|l| l.is_held())
            .unwrap_or(false);
        if held {
            return Ok(false);
        }
        let record = LockRecord::held(Utc::now());
        values.insert(lkey, serde_json::to_value(record).map_err(KvError::from)?);
        Ok(true)
    }

    async fn release_lock(&self, key: &str) -> Result<bool> {
        let lkey = lock_key(key);
        let mut values = self.values.lock().unwrap();
        let record = LockRecord::released(Utc::now());
        values.insert(lkey, serde_json::to_value(record).map_err(KvError::from)?);
        Ok(true)
    }

    async fn release_lock_if_expired(
        &self,
        key: &str,
        expiry: chrono::Duration,
    ) -> Result<bool> {
        let lkey = lock_key(key);
        let mut values = self.values.lock().unwrap();
        let expired = values
            .get(&lkey)
            .and_then(|v| serde_json::from_value::<LockRecord>(v.clone()).ok())
            .map(|l| l.is_held() && Utc::now() - l.last_locked_date > expiry)
            .unwrap_or(false);
        if expired {
            let record = LockRecord::released(Utc::now());
            values.insert(lkey, serde_json::to_value(record).map_err(KvError::from)?);
        }
        Ok(expired)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn get_set_roundtrip() {
        let store = MemoryStore::new();
        assert_eq!(store.get("k").await.unwrap(), None);
        store.set("k", serde_json::json!({"a": 1})).await.unwrap();
        assert_eq!(store.get("k").await.unwrap(), Some(serde_json::json!({"a": 1})));
        assert!(store.has("k").await.unwrap());
        store.delete("k").await.unwrap();
        assert!(!store.has("k").await.unwrap());
    }

    #[tokio::test]
    async fn lock_is_mutually_exclusive() {
        let store = MemoryStore::new();
        assert!(store.acquire_lock("job").await.unwrap());
        assert!(!store.acquire_lock("job").await.unwrap());
        assert!(store.release_lock("job").await.unwrap());
        assert!(store.acquire_lock("job").await.unwrap());
    }

    #[tokio::test]
    async fn expired_lock_is_force_released() {
        let store = MemoryStore::new();
        assert!(store.acquire_lock("job").await.unwrap());
        // Not yet expired under a generous window.
        assert!(!store
            .release_lock_if_expired("job", chrono::Duration::hours(1))
            .await
            .unwrap());
        // Forcibly backdate the lock to simulate expiry.
        let lkey = lock_key("job");
        let backdated = LockRecord {
            value: 1,
            last_locked_date: Utc::now() - chrono::Duration::minutes(30),
        };
        store
            .set(&lkey, serde_json::to_value(backdated).unwrap())
            .await
            .unwrap();
        assert!(store
            .release_lock_if_expired("job", chrono::Duration::minutes(10))
            .await
            .unwrap());
        assert!(store.acquire_lock("job").await.unwrap());
    }
}
