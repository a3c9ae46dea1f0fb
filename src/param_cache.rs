//! Parameter-keyed result cache (`spec.md` §4.8), grounded on the original
//! Python `ParameterCache`: a hash of the tool name plus its normalized
//! (sorted-key JSON) arguments is the cache key, each entry carries its
//! own TTL, and callers get told whether they hit the cache
//! (`_cache_hit` in the envelope).

use std::collections::HashMap;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use serde_json::Value;
use sha2::{Digest, Sha256};

struct CachedValue {
    value: Value,
    expires_at: Instant,
}

/// Generic TTL-keyed cache shared by market-data fetchers and any other
/// tool wrapper that wants to memoize identical calls for a short window.
pub struct ParameterCache {
    entries: Mutex<HashMap<String, CachedValue>>,
}

impl ParameterCache {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Hash a tool name plus its (already-normalized) parameters into a
    /// stable cache key. Normalization (sorting object keys) is the
    /// caller's responsibility — `serde_json::Value`'s `Map` is a BTreeMap
    /// by default so `to_string()` already emits keys in sorted order.
    pub fn key(tool: &str, params: &Value) -> String {
        let mut hasher = Sha256::new();
        hasher.update(tool.as_bytes());
        hasher.update(params.to_string().as_bytes());
        hex::encode(hasher.finalize())
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        let mut entries = self.entries.lock();
        match entries.get(key) {
            Some(entry) if entry.expires_at > Instant::now() => Some(entry.value.clone()),
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        }
    }

    pub fn put(&self, key: String, value: Value, ttl: Duration) {
        self.entries.lock().insert(
            key,
            CachedValue {
                value,
                expires_at: Instant::now() + ttl,
            },
        );
    }
}

impl Default for ParameterCache {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn identical_params_hash_the_same() {
        let a = ParameterCache::key("fetch_orderbook", &json!({"symbol": "BTCUSDT", "limit": 50}));
        let b = ParameterCache::key("fetch_orderbook", &json!({"symbol": "BTCUSDT", "limit": 50}));
        assert_eq!(a, b);
    }

    #[test]
    fn entry_expires_after_ttl() {
        let cache = ParameterCache::new();
        let key = ParameterCache::key("fetch_mark_price", &json!({"symbol": "BTCUSDT"}));
        cache.put(key.clone(), json!({"price": "50000"}), Duration::from_millis(1));
        std::thread::sleep(Duration::from_millis(5));
        assert!(cache.get(&key).is_none());
    }

    #[test]
    fn fresh_entry_hits() {
        let cache = ParameterCache::new();
        let key = ParameterCache::key("fetch_mark_price", &json!({"symbol": "BTCUSDT"}));
        cache.put(key.clone(), json!({"price": "50000"}), Duration::from_secs(5));
        assert!(cache.get(&key).is_some());
    }
}
