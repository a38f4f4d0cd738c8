use super::fingerprint::fingerprint;
use super::store::{CacheEntry, CacheError, CacheStore};
use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::any::Any;
use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Mutex as AsyncMutex;
use tracing::{debug, warn};

/// Per-key gate; holds the error of the last failed computation while
/// callers are still queued on it.
type Gate = Arc<AsyncMutex<Option<Arc<dyn Any + Send + Sync>>>>;

pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(24 * 60 * 60);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CachePolicy {
    pub ttl: Duration,
    /// Keep entries on disk under the data directory.
    pub persist: bool,
}

impl Default for CachePolicy {
    fn default() -> Self {
        Self {
            ttl: DEFAULT_CACHE_TTL,
            persist: true,
        }
    }
}

impl CachePolicy {
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn with_persist(mut self, persist: bool) -> Self {
        self.persist = persist;
        self
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: usize,
    pub misses: usize,
    pub computes: usize,
}

/// Memoizes named, deterministic, expensive computations.
///
/// At most one computation per fingerprint runs at a time: concurrent callers
/// queue on a per-key gate and read the stored value once the first caller
/// finishes. A failure is never stored; callers queued behind it receive a
/// clone of the same error, and the next caller after the queue drains
/// computes again.
pub struct ActionCache {
    store: Arc<dyn CacheStore>,
    ttl: Duration,
    gates: Mutex<HashMap<String, Gate>>,
    hits: AtomicUsize,
    misses: AtomicUsize,
    computes: AtomicUsize,
}

impl ActionCache {
    pub fn new(store: Arc<dyn CacheStore>, policy: CachePolicy) -> Self {
        Self {
            store,
            ttl: policy.ttl,
            gates: Mutex::new(HashMap::new()),
            hits: AtomicUsize::new(0),
            misses: AtomicUsize::new(0),
            computes: AtomicUsize::new(0),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::SeqCst),
            misses: self.misses.load(Ordering::SeqCst),
            computes: self.computes.load(Ordering::SeqCst),
        }
    }

    /// Return the cached value for `(action, version, args)` or compute it.
    pub async fn fetch<T, E, F, Fut>(
        &self,
        action: &str,
        version: &str,
        args: &Value,
        compute: F,
    ) -> Result<T, E>
    where
        T: Serialize + DeserializeOwned,
        E: Clone + Send + Sync + 'static,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let key = fingerprint(action, version, args);

        if let Some(value) = self.lookup::<T>(&key).await {
            self.hits.fetch_add(1, Ordering::SeqCst);
            debug!(action, fingerprint = %key, "Cache hit");
            return Ok(value);
        }

        let gate = self.gate_for(&key);
        let result = {
            let mut failure = gate.lock().await;

            // Another caller may have filled the entry while we queued
            if let Some(value) = self.lookup::<T>(&key).await {
                self.hits.fetch_add(1, Ordering::SeqCst);
                debug!(action, fingerprint = %key, "Cache hit after wait");
                Ok(value)
            } else if let Some(error) = failure.as_ref().and_then(|f| f.downcast_ref::<E>()) {
                self.misses.fetch_add(1, Ordering::SeqCst);
                debug!(action, fingerprint = %key, "Sharing failure of the computation we queued on");
                Err(error.clone())
            } else {
                self.misses.fetch_add(1, Ordering::SeqCst);
                self.computes.fetch_add(1, Ordering::SeqCst);
                debug!(action, fingerprint = %key, "Cache miss, computing");

                let computed = compute().await;
                match &computed {
                    Ok(value) => self.store_value(action, version, &key, value).await,
                    Err(error) => *failure = Some(Arc::new(error.clone())),
                }
                computed
            }
        };

        self.release_gate(&key, gate);
        result
    }

    /// Remove expired entries from the backing store.
    pub async fn purge_expired(&self) -> Result<usize, CacheError> {
        let removed = self.store.purge_expired(Utc::now()).await?;
        if removed > 0 {
            debug!(removed, "Purged expired cache entries");
        }
        Ok(removed)
    }

    pub async fn invalidate(&self, action: &str, version: &str, args: &Value) -> Result<(), CacheError> {
        self.store.remove(&fingerprint(action, version, args)).await
    }

    async fn lookup<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let entry = match self.store.get(key).await {
            Ok(Some(entry)) => entry,
            Ok(None) => return None,
            Err(e) => {
                warn!(fingerprint = %key, error = %e, "Cache read failed, treating as miss");
                return None;
            }
        };

        if entry.is_expired(Utc::now()) {
            debug!(fingerprint = %key, "Cache entry expired");
            return None;
        }

        match serde_json::from_value(entry.value) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(fingerprint = %key, error = %e, "Cached value has an unexpected shape");
                None
            }
        }
    }

    async fn store_value<T: Serialize>(&self, action: &str, version: &str, key: &str, value: &T) {
        let encoded = match serde_json::to_value(value) {
            Ok(encoded) => encoded,
            Err(e) => {
                warn!(fingerprint = %key, error = %e, "Result not cacheable");
                return;
            }
        };

        let now = Utc::now();
        let ttl = chrono::Duration::from_std(self.ttl).unwrap_or_else(|_| chrono::Duration::days(36_500));
        let entry = CacheEntry {
            key: key.to_string(),
            action: action.to_string(),
            version: version.to_string(),
            value: encoded,
            created_at: now,
            expires_at: now.checked_add_signed(ttl).unwrap_or(now),
        };

        if let Err(e) = self.store.put(entry).await {
            warn!(fingerprint = %key, error = %e, "Cache write failed");
        }
    }

    fn gate_for(&self, key: &str) -> Gate {
        let mut gates = self.gates.lock().unwrap_or_else(|e| e.into_inner());
        gates
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(AsyncMutex::new(None)))
            .clone()
    }

    fn release_gate(&self, key: &str, gate: Gate) {
        drop(gate);
        let mut gates = self.gates.lock().unwrap_or_else(|e| e.into_inner());
        // Only the map still holds the gate: nobody is queued
        if gates.get(key).is_some_and(|g| Arc::strong_count(g) == 1) {
            gates.remove(key);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::store::MemoryCacheStore;
    use serde_json::json;
    use std::sync::atomic::AtomicU32;

    fn cache(ttl: Duration) -> ActionCache {
        ActionCache::new(
            Arc::new(MemoryCacheStore::new()),
            CachePolicy::default().with_ttl(ttl),
        )
    }

    #[tokio::test]
    async fn test_second_fetch_is_served_from_cache() {
        let cache = cache(DEFAULT_CACHE_TTL);
        let calls = AtomicU32::new(0);
        let args = json!({"repo": "api", "date": "2024-05-01"});

        for _ in 0..2 {
            let value: String = cache
                .fetch("summary", "v1", &args, || async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok::<_, String>("summary text".to_string())
                })
                .await
                .unwrap();
            assert_eq!(value, "summary text");
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.computes, 1);
    }

    #[tokio::test]
    async fn test_errors_are_not_cached() {
        let cache = cache(DEFAULT_CACHE_TTL);
        let args = json!({"repo": "api"});

        let first: Result<String, String> = cache
            .fetch("summary", "v1", &args, || async { Err("provider down".to_string()) })
            .await;
        assert_eq!(first.unwrap_err(), "provider down");

        let second: Result<String, String> = cache
            .fetch("summary", "v1", &args, || async { Ok("recovered".to_string()) })
            .await;
        assert_eq!(second.unwrap(), "recovered");
        assert_eq!(cache.stats().computes, 2);
    }

    #[tokio::test]
    async fn test_zero_ttl_always_recomputes() {
        let cache = cache(Duration::ZERO);
        let calls = AtomicU32::new(0);
        let args = json!({});

        for _ in 0..3 {
            let _: u32 = cache
                .fetch("count", "v1", &args, || async {
                    Ok::<_, String>(calls.fetch_add(1, Ordering::SeqCst))
                })
                .await
                .unwrap();
        }
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_version_bump_misses() {
        let cache = cache(DEFAULT_CACHE_TTL);
        let args = json!({"repo": "api"});

        let v1: String = cache
            .fetch("summary", "v1", &args, || async { Ok::<_, String>("old".into()) })
            .await
            .unwrap();
        let v2: String = cache
            .fetch("summary", "v2", &args, || async { Ok::<_, String>("new".into()) })
            .await
            .unwrap();
        assert_eq!(v1, "old");
        assert_eq!(v2, "new");
    }

    #[tokio::test]
    async fn test_concurrent_fetches_share_one_compute() {
        let cache = Arc::new(cache(DEFAULT_CACHE_TTL));
        let calls = Arc::new(AtomicU32::new(0));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let cache = Arc::clone(&cache);
            let calls = Arc::clone(&calls);
            handles.push(tokio::spawn(async move {
                cache
                    .fetch("slow", "v1", &json!({"k": 1}), || async {
                        calls.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(50)).await;
                        Ok::<_, String>(42u32)
                    })
                    .await
            }));
        }

        for handle in handles {
            assert_eq!(handle.await.unwrap().unwrap(), 42);
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(cache.gates.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_queued_callers_share_a_failure() {
        let cache = Arc::new(cache(DEFAULT_CACHE_TTL));
        let calls = Arc::new(AtomicU32::new(0));

        let mut handles = Vec::new();
        for _ in 0..4 {
            let cache = Arc::clone(&cache);
            let calls = Arc::clone(&calls);
            handles.push(tokio::spawn(async move {
                cache
                    .fetch::<String, String, _, _>("summary", "v1", &json!({"repo": "api"}), || async {
                        calls.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(30)).await;
                        Err("provider down".to_string())
                    })
                    .await
            }));
        }

        for handle in handles {
            assert_eq!(handle.await.unwrap().unwrap_err(), "provider down");
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.stats().computes, 1);
        assert!(cache.gates.lock().unwrap().is_empty());

        // Nothing was stored, so the next caller computes again
        let recovered: String = cache
            .fetch("summary", "v1", &json!({"repo": "api"}), || async {
                Ok::<_, String>("fresh".to_string())
            })
            .await
            .unwrap();
        assert_eq!(recovered, "fresh");
        assert_eq!(cache.stats().computes, 2);
    }

    #[tokio::test]
    async fn test_cancelled_leader_hands_over_the_computation() {
        let cache = Arc::new(cache(DEFAULT_CACHE_TTL));
        let args = json!({"repo": "api"});

        let leader = cache.fetch::<String, String, _, _>("summary", "v1", &args, || async {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok("never".to_string())
        });
        assert!(tokio::time::timeout(Duration::from_millis(20), leader).await.is_err());

        let value: String = cache
            .fetch("summary", "v1", &args, || async { Ok::<_, String>("second".to_string()) })
            .await
            .unwrap();
        assert_eq!(value, "second");
    }

    #[tokio::test]
    async fn test_invalidate_and_purge() {
        let cache = cache(Duration::ZERO);
        let args = json!({"a": 1});
        let _: u8 = cache
            .fetch("x", "v1", &args, || async { Ok::<_, String>(1) })
            .await
            .unwrap();
        assert_eq!(cache.purge_expired().await.unwrap(), 1);
        cache.invalidate("x", "v1", &args).await.unwrap();
    }
}
