//! JSON-file-backed [`Store`], one file per namespace. Intended for
//! single-box / on-host deployments where there is no managed table or
//! document store available, mirroring the on-prem local-disk provider of
//! the system this crate replaces.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::Utc;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use crate::{lock_key, KvError, LockRecord, Result, Store, Value};

/// All keys for a namespace live in a single JSON object on disk. Reads and
/// writes go through an in-process mutex; the whole file is rewritten on
/// every mutation, which is fine at the key counts a single collector
/// instance touches (cursors plus a handful of locks).
pub struct FileStore {
    path: PathBuf,
    state: Mutex<HashMap<String, Value>>,
}

impl FileStore {
    /// Loads `path` if it exists, otherwise starts from an empty map. The
    /// parent directory must already exist.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let state = match tokio::fs::read(&path).await {
            Ok(bytes) if bytes.is_empty() => HashMap::new(),
            Ok(bytes) => serde_json::from_slice(&bytes)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => HashMap::new(),
            Err(e) => return Err(KvError::Io(e)),
        };
        Ok(FileStore {
            path,
            state: Mutex::new(state),
        })
    }

    async fn persist(&self, state: &HashMap<String, Value>) -> Result<()> {
        let encoded = serde_json::to_vec_pretty(state)?;
        let tmp_path = self.path.with_extension("tmp");
        let mut tmp = tokio::fs::File::create(&tmp_path).await?;
        tmp.write_all(&encoded).await?;
        tmp.sync_all().await?;
        tokio::fs::rename(&tmp_path, &self.path).await?;
        Ok(())
    }
}

#[async_trait]
impl Store for FileStore {
    async fn get(&self, key: &str) -> Result<Option<Value>> {
        Ok(self.state.lock().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: Value) -> Result<()> {
        let mut state = self.state.lock().await;
        state.insert(key.to_string(), value);
        self.persist(&state).await
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let mut state = self.state.lock().await;
        state.remove(key);
        self.persist(&state).await
    }

    async fn acquire_lock(&self, key: &str) -> Result<bool> {
        let lkey = lock_key(key);
        let mut state = self.state.lock().await;
        let held = state
            .get(&lkey)
            .and_then(|v| serde_json::from_value::<LockRecord>(v.clone()).ok())
            .map(|l| l.is_held())
            .unwrap_or(false);
        if held {
            return Ok(false);
        }
        state.insert(lkey, serde_json::to_value(LockRecord::held(Utc::now()))?);
        self.persist(&state).await?;
        Ok(true)
    }

    async fn release_lock(&self, key: &str) -> Result<bool> {
        let lkey = lock_key(key);
        let mut state = self.state.lock().await;
        state.insert(lkey, serde_json::to_value(LockRecord::released(Utc::now()))?);
        self.persist(&state).await?;
        Ok(true)
    }

    async fn release_lock_if_expired(
        &self,
        key: &str,
        expiry: chrono::Duration,
    ) -> Result<bool> {
        let lkey = lock_key(key);
        let mut state = self.state.lock().await;
        let expired = state
            .get(&lkey)
            .and_then(|v| serde_json::from_value::<LockRecord>(v.clone()).ok())
            .map(|l| l.is_held() && Utc::now() - l.last_locked_date > expiry)
            .unwrap_or(false);
        if expired {
            state.insert(lkey, serde_json::to_value(LockRecord::released(Utc::now()))?);
            self.persist(&state).await?;
        }
        Ok(expired)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cursors.json");

        let store = FileStore::open(&path).await.unwrap();
        store
            .set("stream:log", serde_json::json!({"since": 100}))
            .await
            .unwrap();
        drop(store);

        let reopened = FileStore::open(&path).await.unwrap();
        assert_eq!(
            reopened.get("stream:log").await.unwrap(),
            Some(serde_json::json!({"since": 100}))
        );
    }

    #[tokio::test]
    async fn missing_file_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("does-not-exist.json");
        let store = FileStore::open(&path).await.unwrap();
        assert_eq!(store.get("anything").await.unwrap(), None);
    }

    #[tokio::test]
    async fn lock_roundtrips_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("locks.json");
        let store = FileStore::open(&path).await.unwrap();

        assert!(store.acquire_lock("discovery").await.unwrap());
        let reopened = FileStore::open(&path).await.unwrap();
        assert!(!reopened.acquire_lock("discovery").await.unwrap());
    }
}
