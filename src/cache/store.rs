//! Cache entry storage
//!
//! `MemoryCacheStore` lives for the process; `FileCacheStore` keeps one JSON
//! file per fingerprint so cached inference survives restarts.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Cache I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Cache entry could not be encoded: {0}")]
    Serialization(String),

    #[error("Cache store lock poisoned")]
    Poisoned,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    /// Fingerprint of (action, version, args).
    pub key: String,
    pub action: String,
    pub version: String,
    pub value: Value,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl CacheEntry {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<CacheEntry>, CacheError>;

    async fn put(&self, entry: CacheEntry) -> Result<(), CacheError>;

    async fn remove(&self, key: &str) -> Result<(), CacheError>;

    /// Drop every entry expired at `now`; returns how many were removed.
    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<usize, CacheError>;

    async fn len(&self) -> Result<usize, CacheError>;
}

#[derive(Default)]
pub struct MemoryCacheStore {
    entries: RwLock<HashMap<String, CacheEntry>>,
}

impl MemoryCacheStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CacheStore for MemoryCacheStore {
    async fn get(&self, key: &str) -> Result<Option<CacheEntry>, CacheError> {
        let entries = self.entries.read().map_err(|_| CacheError::Poisoned)?;
        Ok(entries.get(key).cloned())
    }

    async fn put(&self, entry: CacheEntry) -> Result<(), CacheError> {
        let mut entries = self.entries.write().map_err(|_| CacheError::Poisoned)?;
        entries.insert(entry.key.clone(), entry);
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), CacheError> {
        let mut entries = self.entries.write().map_err(|_| CacheError::Poisoned)?;
        entries.remove(key);
        Ok(())
    }

    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<usize, CacheError> {
        let mut entries = self.entries.write().map_err(|_| CacheError::Poisoned)?;
        let before = entries.len();
        entries.retain(|_, entry| !entry.is_expired(now));
        Ok(before - entries.len())
    }

    async fn len(&self) -> Result<usize, CacheError> {
        Ok(self.entries.read().map_err(|_| CacheError::Poisoned)?.len())
    }
}

/// One `{fingerprint}.json` file per entry under `dir`.
pub struct FileCacheStore {
    dir: PathBuf,
}

impl FileCacheStore {
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self, CacheError> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir).map_err(|source| CacheError::Io {
            path: dir.clone(),
            source,
        })?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn entry_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", key))
    }

    async fn read_entry(path: &Path) -> Result<Option<CacheEntry>, CacheError> {
        let raw = match tokio::fs::read_to_string(path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(source) => {
                return Err(CacheError::Io {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };

        match serde_json::from_str::<CacheEntry>(&raw) {
            Ok(entry) => Ok(Some(entry)),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Ignoring unreadable cache file");
                Ok(None)
            }
        }
    }

    fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> CacheError + '_ {
        move |source| CacheError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

#[async_trait]
impl CacheStore for FileCacheStore {
    async fn get(&self, key: &str) -> Result<Option<CacheEntry>, CacheError> {
        Self::read_entry(&self.entry_path(key)).await
    }

    async fn put(&self, entry: CacheEntry) -> Result<(), CacheError> {
        let path = self.entry_path(&entry.key);
        let tmp = path.with_extension("json.tmp");
        let json = serde_json::to_string_pretty(&entry)
            .map_err(|e| CacheError::Serialization(e.to_string()))?;

        tokio::fs::write(&tmp, json)
            .await
            .map_err(Self::io_error(&tmp))?;
        tokio::fs::rename(&tmp, &path)
            .await
            .map_err(Self::io_error(&path))?;

        debug!(key = %entry.key, path = %path.display(), "Cache entry written");
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), CacheError> {
        let path = self.entry_path(key);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(CacheError::Io { path, source }),
        }
    }

    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<usize, CacheError> {
        let mut removed = 0;
        let mut dir = tokio::fs::read_dir(&self.dir)
            .await
            .map_err(Self::io_error(&self.dir))?;

        while let Some(item) = dir.next_entry().await.map_err(Self::io_error(&self.dir))? {
            let path = item.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let stale = match Self::read_entry(&path).await? {
                Some(entry) => entry.is_expired(now),
                None => true,
            };
            if stale {
                tokio::fs::remove_file(&path)
                    .await
                    .map_err(Self::io_error(&path))?;
                removed += 1;
            }
        }

        Ok(removed)
    }

    async fn len(&self) -> Result<usize, CacheError> {
        let mut count = 0;
        let mut dir = tokio::fs::read_dir(&self.dir)
            .await
            .map_err(Self::io_error(&self.dir))?;
        while let Some(item) = dir.next_entry().await.map_err(Self::io_error(&self.dir))? {
            if item.path().extension().and_then(|e| e.to_str()) == Some("json") {
                count += 1;
            }
        }
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use serde_json::json;
    use tempfile::TempDir;

    fn entry(key: &str, ttl_secs: i64) -> CacheEntry {
        let now = Utc::now();
        CacheEntry {
            key: key.to_string(),
            action: "summary".to_string(),
            version: "v1".to_string(),
            value: json!({"mainFocus": "caching"}),
            created_at: now,
            expires_at: now + Duration::seconds(ttl_secs),
        }
    }

    #[tokio::test]
    async fn test_memory_store_roundtrip_and_purge() {
        let store = MemoryCacheStore::new();
        store.put(entry("fresh", 60)).await.unwrap();
        store.put(entry("stale", -1)).await.unwrap();
        assert_eq!(store.len().await.unwrap(), 2);

        assert_eq!(store.purge_expired(Utc::now()).await.unwrap(), 1);
        assert!(store.get("fresh").await.unwrap().is_some());
        assert!(store.get("stale").await.unwrap().is_none());

        store.remove("fresh").await.unwrap();
        assert_eq!(store.len().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_file_store_survives_reopen() {
        let dir = TempDir::new().unwrap();
        {
            let store = FileCacheStore::new(dir.path()).unwrap();
            store.put(entry("abc", 60)).await.unwrap();
        }

        let store = FileCacheStore::new(dir.path()).unwrap();
        let loaded = store.get("abc").await.unwrap().unwrap();
        assert_eq!(loaded.value["mainFocus"], "caching");
        assert!(store.get("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_file_store_purges_expired_and_corrupt() {
        let dir = TempDir::new().unwrap();
        let store = FileCacheStore::new(dir.path()).unwrap();
        store.put(entry("fresh", 60)).await.unwrap();
        store.put(entry("stale", -5)).await.unwrap();
        std::fs::write(dir.path().join("broken.json"), "{").unwrap();

        assert_eq!(store.len().await.unwrap(), 3);
        assert_eq!(store.purge_expired(Utc::now()).await.unwrap(), 2);
        assert_eq!(store.len().await.unwrap(), 1);
        assert!(store.get("fresh").await.unwrap().is_some());
    }

    #[test]
    fn test_expiry_boundary() {
        let e = entry("k", 0);
        assert!(e.is_expired(e.expires_at));
        assert!(!e.is_expired(e.expires_at - Duration::milliseconds(1)));
    }
}
