//! Idempotent cache for expensive inference actions
//!
//! Keys are fingerprints of `(action, version, canonical args)`. Values expire
//! after the policy TTL and failed computations are never stored.

mod action_cache;
mod fingerprint;
mod store;

pub use action_cache::{ActionCache, CachePolicy, CacheStats, DEFAULT_CACHE_TTL};
pub use fingerprint::{canonical_json, fingerprint};
pub use store::{CacheEntry, CacheError, CacheStore, FileCacheStore, MemoryCacheStore};
