//! Live Data Cache
//!
//! Keeps DeFiLlama responses in memory so switching between protocols in
//! the dashboard does not hit the upstream API on every request.
//!
//! # Flow
//! ```text
//! Request → Check Cache → Hit? → Return
//!              ↓
//!            Miss? → Fetch → Some? → Store → Return
//!                              ↓
//!                            None → Return None (not cached)
//! ```
//!
//! The fetch itself happens outside the cache lock (`api::live_data`).
//! Keys are lowercased. Entries expire after the TTL and are swept on
//! every insert. Nothing is persisted.

use crate::llama::LiveProtocolData;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

/// Default entry lifetime
pub const DEFAULT_TTL: Duration = Duration::from_secs(60);

struct CachedEntry {
    data: LiveProtocolData,
    inserted_at: Instant,
}

pub struct LiveDataCache {
    entries: HashMap<String, CachedEntry>,
    ttl: Duration,
    hits: u64,
    misses: u64,
}

impl Default for LiveDataCache {
    fn default() -> Self {
        Self::new()
    }
}

impl LiveDataCache {
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
            ttl: DEFAULT_TTL,
            hits: 0,
            misses: 0,
        }
    }

    /// Set custom TTL
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Cached data for `protocol`, if present and fresh.
    /// Expired entries are evicted on lookup.
    pub fn get(&mut self, protocol: &str) -> Option<LiveProtocolData> {
        let key = cache_key(protocol);
        let fresh = match self.entries.get(&key) {
            Some(entry) => entry.inserted_at.elapsed() < self.ttl,
            None => {
                self.misses += 1;
                debug!("Cache MISS for {}", key);
                return None;
            }
        };

        if !fresh {
            self.entries.remove(&key);
            self.misses += 1;
            debug!("Cache EXPIRED for {}", key);
            return None;
        }

        self.hits += 1;
        debug!("Cache HIT for {}", key);
        self.entries.get(&key).map(|e| e.data.clone())
    }

    /// Store `data` and sweep every expired entry.
    pub fn insert(&mut self, protocol: &str, data: LiveProtocolData) {
        let ttl = self.ttl;
        self.entries.retain(|_, entry| entry.inserted_at.elapsed() < ttl);

        let key = cache_key(protocol);
        debug!("Cached live data for {} (TTL: {:?})", key, ttl);
        self.entries.insert(
            key,
            CachedEntry {
                data,
                inserted_at: Instant::now(),
            },
        );
    }

    /// Force a refresh on the next lookup
    pub fn invalidate(&mut self, protocol: &str) {
        self.entries.remove(&cache_key(protocol));
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        debug!("Cleared live data cache");
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            total_keys: self.entries.len(),
            hits: self.hits,
            misses: self.misses,
            ttl_secs: self.ttl.as_secs(),
        }
    }
}

/// Protocol ids are case-insensitive
fn cache_key(protocol: &str) -> String {
    protocol.trim().to_ascii_lowercase()
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CacheStats {
    pub total_keys: usize,
    pub hits: u64,
    pub misses: u64,
    pub ttl_secs: u64,
}
