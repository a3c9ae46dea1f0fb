//! REST market-data fetchers (`spec.md` §4.7), each routed through the
//! short-TTL [`MarketDataCache`] so bursts of analytics calls against the
//! same symbol within a poll tick don't multiply outbound requests.

use std::sync::Arc;

use reqwest::Method;
use serde_json::{json, Value};

use crate::client::FuturesClient;
use crate::config::normalize_symbol;
use crate::envelope::ToolResponse;
use crate::error::{ErrorKind, ToolError};
use crate::stream::AggTradeStream;

use super::cache::{MarketDataCache, DEPTH_TTL, MARK_PRICE_TTL, TRADES_TTL};

pub struct MarketDataCollector {
    client: Arc<FuturesClient>,
    cache: MarketDataCache,
    stream: Arc<AggTradeStream>,
}

impl MarketDataCollector {
    pub fn new(client: Arc<FuturesClient>, stream: Arc<AggTradeStream>) -> Self {
        Self {
            client,
            cache: MarketDataCache::new(),
            stream,
        }
    }

    /// `fetch_orderbook` (`spec.md` §4.7).
    pub async fn fetch_orderbook(&self, symbol: &str, limit: u32) -> ToolResponse<Value> {
        let symbol = match normalize_symbol(symbol) {
            Ok(s) => s,
            Err(e) => return ToolResponse::err(ToolError::validation(e)),
        };
        let limit = clamp_depth_limit(limit);
        let params = json!({"symbol": &symbol, "limit": limit});

        let client = Arc::clone(&self.client);
        let sym = symbol.clone();
        let fetched = self
            .cache
            .get_or_fetch("fetch_orderbook", &params, DEPTH_TTL, || async move {
                let result = client
                    .public_request(
                        Method::GET,
                        "/fapi/v1/depth",
                        vec![
                            ("symbol".to_string(), sym),
                            ("limit".to_string(), limit.to_string()),
                        ],
                    )
                    .await;
                if result.success {
                    Ok(result.body)
                } else {
                    anyhow::bail!(result.error_msg.unwrap_or_default())
                }
            })
            .await;

        respond_from_fetch(fetched)
    }

    /// `fetch_recent_trades` (`spec.md` §4.7).
    pub async fn fetch_recent_trades(&self, symbol: &str, limit: u32) -> ToolResponse<Value> {
        let symbol = match normalize_symbol(symbol) {
            Ok(s) => s,
            Err(e) => return ToolResponse::err(ToolError::validation(e)),
        };
        let limit = limit.clamp(1, 1000);
        let params = json!({"symbol": &symbol, "limit": limit});

        let client = Arc::clone(&self.client);
        let sym = symbol.clone();
        let fetched = self
            .cache
            .get_or_fetch("fetch_recent_trades", &params, TRADES_TTL, || async move {
                let result = client
                    .public_request(
                        Method::GET,
                        "/fapi/v1/trades",
                        vec![
                            ("symbol".to_string(), sym),
                            ("limit".to_string(), limit.to_string()),
                        ],
                    )
                    .await;
                if result.success {
                    Ok(result.body)
                } else {
                    anyhow::bail!(result.error_msg.unwrap_or_default())
                }
            })
            .await;

        respond_from_fetch(fetched)
    }

    /// `fetch_historical_trades` (`spec.md` §4.7): signed endpoint, not
    /// cached — callers pass an explicit `from_id` to page backwards.
    pub async fn fetch_historical_trades(
        &self,
        symbol: &str,
        limit: u32,
        from_id: Option<i64>,
    ) -> ToolResponse<Value> {
        let symbol = match normalize_symbol(symbol) {
            Ok(s) => s,
            Err(e) => return ToolResponse::err(ToolError::validation(e)),
        };
        let mut params = vec![
            ("symbol".to_string(), symbol),
            ("limit".to_string(), limit.clamp(1, 1000).to_string()),
        ];
        if let Some(id) = from_id {
            params.push(("fromId".to_string(), id.to_string()));
        }

        let result = self
            .client
            .signed_request(Method::GET, "/fapi/v1/historicalTrades", params)
            .await;
        if result.success {
            ToolResponse::ok(result.body)
        } else {
            ToolResponse::err(ToolError::new(
                ErrorKind::DataError,
                result.error_msg.unwrap_or_default(),
            ))
        }
    }

    /// `fetch_mark_price` (`spec.md` §4.7).
    pub async fn fetch_mark_price(&self, symbol: &str) -> ToolResponse<Value> {
        let symbol = match normalize_symbol(symbol) {
            Ok(s) => s,
            Err(e) => return ToolResponse::err(ToolError::validation(e)),
        };
        let params = json!({"symbol": &symbol});

        let client = Arc::clone(&self.client);
        let sym = symbol.clone();
        let fetched = self
            .cache
            .get_or_fetch("fetch_mark_price", &params, MARK_PRICE_TTL, || async move {
                let result = client
                    .public_request(
                        Method::GET,
                        "/fapi/v1/premiumIndex",
                        vec![("symbol".to_string(), sym)],
                    )
                    .await;
                if result.success {
                    Ok(result.body)
                } else {
                    anyhow::bail!(result.error_msg.unwrap_or_default())
                }
            })
            .await;

        respond_from_fetch(fetched)
    }

    /// `ensure_trade_history` (`spec.md` §4.7): makes sure the aggTrade
    /// stream is subscribed to `symbol` so its ring buffer starts filling.
    pub fn ensure_trade_history(&self, symbol: &str) -> ToolResponse<Value> {
        let symbol = match normalize_symbol(symbol) {
            Ok(s) => s,
            Err(e) => return ToolResponse::err(ToolError::validation(e)),
        };
        self.stream.subscribe(&symbol);
        ToolResponse::ok(json!({"symbol": symbol, "subscribed": true}))
    }

    /// `get_buffered_trades` (`spec.md` §4.7): reads straight from the
    /// stream's ring buffer, no REST call involved.
    pub fn get_buffered_trades(&self, symbol: &str, limit: usize) -> ToolResponse<Value> {
        let symbol = match normalize_symbol(symbol) {
            Ok(s) => s,
            Err(e) => return ToolResponse::err(ToolError::validation(e)),
        };
        let trades = self.stream.get_buffered_trades(&symbol, limit);
        ToolResponse::ok(json!({"symbol": symbol, "trades": trades}))
    }
}

fn clamp_depth_limit(limit: u32) -> u32 {
    const VALID: [u32; 6] = [5, 10, 20, 50, 100, 500];
    VALID
        .iter()
        .copied()
        .find(|&v| v >= limit)
        .unwrap_or(*VALID.last().unwrap())
}

fn respond_from_fetch(fetched: anyhow::Result<(Value, bool)>) -> ToolResponse<Value> {
    match fetched {
        Ok((body, hit)) => ToolResponse::ok(body).with_cache_hit(hit),
        Err(e) => ToolResponse::err(ToolError::new(ErrorKind::DataError, e.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clamps_depth_to_nearest_valid_tier() {
        assert_eq!(clamp_depth_limit(1), 5);
        assert_eq!(clamp_depth_limit(7), 10);
        assert_eq!(clamp_depth_limit(500), 500);
        assert_eq!(clamp_depth_limit(10_000), 500);
    }
}
