//! Short-TTL content cache for market-data fetches (`spec.md` §4.7).
//!
//! A thin specialization of [`crate::param_cache::ParameterCache`] with
//! the fixed per-kind TTLs the spec assigns: depth and trades are cached
//! for half a second, mark price for a full second.

use std::time::Duration;

use serde_json::Value;

use crate::param_cache::ParameterCache;

pub const DEPTH_TTL: Duration = Duration::from_millis(500);
pub const TRADES_TTL: Duration = Duration::from_millis(500);
pub const MARK_PRICE_TTL: Duration = Duration::from_millis(1000);

pub struct MarketDataCache {
    inner: ParameterCache,
}

impl MarketDataCache {
    pub fn new() -> Self {
        Self {
            inner: ParameterCache::new(),
        }
    }

    /// Returns `(value, cache_hit)` — a miss runs `fetch` and stores the
    /// result under `ttl`; a hit returns the cached value unchanged.
    pub async fn get_or_fetch<F, Fut>(
        &self,
        tool: &str,
        params: &Value,
        ttl: Duration,
        fetch: F,
    ) -> anyhow::Result<(Value, bool)>
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = anyhow::Result<Value>>,
    {
        let key = ParameterCache::key(tool, params);
        if let Some(cached) = self.inner.get(&key) {
            return Ok((cached, true));
        }

        let value = fetch().await?;
        self.inner.put(key, value.clone(), ttl);
        Ok((value, false))
    }
}

impl Default for MarketDataCache {
    fn default() -> Self {
        Self::new()
    }
}
