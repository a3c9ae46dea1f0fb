//! `@aggTrade` WebSocket session (`spec.md` §4.6).
//!
//! Grounded on the teacher's `scrapers/binance_book_ticker.rs`: a combined
//! stream URL, a read loop dispatching on `Message::Text/Ping/Close`, and
//! a reconnect loop with exponential backoff capped at 60 seconds. Unlike
//! the teacher's single-purpose ticker feed, this stream also answers
//! `SUBSCRIBE`/`UNSUBSCRIBE` control frames so symbols can be added after
//! the session is already running.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use parking_lot::{Mutex, RwLock};
use rust_decimal::Decimal;
use serde_json::Value;
use tokio::sync::Notify;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};

use crate::config::Network;

use super::ring_buffer::{AggTrade, TradeRingBuffer, DEFAULT_MAX_AGE, DEFAULT_MAX_TRADES};

const BACKOFF_BASE: Duration = Duration::from_secs(1);
const BACKOFF_MAX: Duration = Duration::from_secs(60);
const KEEPALIVE_INTERVAL: Duration = Duration::from_secs(20);

/// Owns one WebSocket connection and the ring buffers it feeds. Safe to
/// share across tool calls behind an `Arc`; `subscribe`/`unsubscribe`
/// reconnect the underlying socket with the updated stream list.
pub struct AggTradeStream {
    network: Network,
    buffers: RwLock<std::collections::HashMap<String, Arc<TradeRingBuffer>>>,
    subscribed: Mutex<HashSet<String>>,
    connected: AtomicBool,
    connected_notify: Notify,
    shutdown: AtomicBool,
}

impl AggTradeStream {
    pub fn new(network: Network) -> Arc<Self> {
        Arc::new(Self {
            network,
            buffers: RwLock::new(std::collections::HashMap::new()),
            subscribed: Mutex::new(HashSet::new()),
            connected: AtomicBool::new(false),
            connected_notify: Notify::new(),
            shutdown: AtomicBool::new(false),
        })
    }

    pub fn buffer_for(&self, symbol: &str) -> Arc<TradeRingBuffer> {
        let mut buffers = self.buffers.write();
        buffers
            .entry(symbol.to_string())
            .or_insert_with(|| Arc::new(TradeRingBuffer::new(DEFAULT_MAX_TRADES, DEFAULT_MAX_AGE)))
            .clone()
    }

    pub fn get_buffered_trades(&self, symbol: &str, limit: usize) -> Vec<AggTrade> {
        self.buffer_for(symbol).recent(limit)
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Relaxed)
    }

    /// Blocks until the session has an active connection, or the timeout
    /// elapses.
    pub async fn wait_for_connection(&self, timeout: Duration) -> bool {
        if self.is_connected() {
            return true;
        }
        let _ = tokio::time::timeout(timeout, self.connected_notify.notified()).await;
        self.is_connected()
    }

    pub fn subscribe(&self, symbol: &str) {
        self.subscribed.lock().insert(symbol.to_lowercase());
        self.buffer_for(symbol);
    }

    pub fn unsubscribe(&self, symbol: &str) {
        self.subscribed.lock().remove(&symbol.to_lowercase());
    }

    pub fn shutdown(&self) {
        self.shutdown.store(true, Ordering::SeqCst);
    }

    /// Drives the connect/read/reconnect loop forever (until `shutdown`).
    /// Intended to be spawned once as a background task.
    pub async fn run(self: Arc<Self>) {
        let mut attempt: u32 = 0;
        loop {
            if self.shutdown.load(Ordering::SeqCst) {
                return;
            }

            let streams: Vec<String> = self
                .subscribed
                .lock()
                .iter()
                .map(|s| format!("{s}@aggTrade"))
                .collect();
            if streams.is_empty() {
                tokio::time::sleep(Duration::from_millis(500)).await;
                continue;
            }

            let url = format!(
                "{}/stream?streams={}",
                self.network.ws_base_url(),
                streams.join("/")
            );

            match tokio_tungstenite::connect_async(&url).await {
                Ok((ws_stream, _)) => {
                    info!(streams = streams.len(), "aggTrade stream connected");
                    attempt = 0;
                    self.connected.store(true, Ordering::SeqCst);
                    self.connected_notify.notify_waiters();

                    let (mut write, mut read) = ws_stream.split();
                    let mut keepalive = tokio::time::interval(KEEPALIVE_INTERVAL);

                    loop {
                        tokio::select! {
                            msg = read.next() => {
                                match msg {
                                    Some(Ok(Message::Text(text))) => self.handle_message(&text),
                                    Some(Ok(Message::Ping(payload))) => {
                                        let _ = write.send(Message::Pong(payload)).await;
                                    }
                                    Some(Ok(Message::Close(_))) | None => {
                                        warn!("aggTrade stream closed by server");
                                        break;
                                    }
                                    Some(Err(e)) => {
                                        warn!(error = %e, "aggTrade stream read error");
                                        break;
                                    }
                                    _ => {}
                                }
                            }
                            _ = keepalive.tick() => {
                                if write.send(Message::Ping(Vec::new())).await.is_err() {
                                    break;
                                }
                            }
                        }

                        if self.shutdown.load(Ordering::SeqCst) {
                            let _ = write.close().await;
                            return;
                        }
                    }
                }
                Err(e) => {
                    warn!(error = %e, "aggTrade stream connect failed");
                }
            }

            self.connected.store(false, Ordering::SeqCst);
            let delay = std::cmp::min(BACKOFF_BASE * 2u32.saturating_pow(attempt), BACKOFF_MAX);
            attempt = attempt.saturating_add(1);
            tokio::time::sleep(delay).await;
        }
    }

    fn handle_message(&self, text: &str) {
        let Ok(envelope) = serde_json::from_str::<Value>(text) else {
            debug!("dropped non-JSON aggTrade frame");
            return;
        };
        let Some(data) = envelope.get("data") else {
            return;
        };
        if let Some(trade) = parse_agg_trade(data) {
            self.buffer_for(&trade.symbol).push(trade);
        }
    }
}

fn parse_agg_trade(data: &Value) -> Option<AggTrade> {
    if data.get("e").and_then(Value::as_str) != Some("aggTrade") {
        return None;
    }
    Some(AggTrade {
        agg_trade_id: data.get("a")?.as_i64()?,
        symbol: data.get("s")?.as_str()?.to_string(),
        price: data.get("p")?.as_str()?.parse::<Decimal>().ok()?,
        quantity: data.get("q")?.as_str()?.parse::<Decimal>().ok()?,
        first_trade_id: data.get("f")?.as_i64()?,
        last_trade_id: data.get("l")?.as_i64()?,
        trade_time_ms: data.get("T")?.as_i64()?,
        is_buyer_maker: data.get("m")?.as_bool()?,
        received_at: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_valid_aggtrade_payload() {
        let payload = json!({
            "e": "aggTrade",
            "s": "BTCUSDT",
            "a": 123,
            "p": "50000.10",
            "q": "0.015",
            "f": 1,
            "l": 2,
            "T": 1_700_000_000_000i64,
            "m": true,
        });
        let trade = parse_agg_trade(&payload).unwrap();
        assert_eq!(trade.symbol, "BTCUSDT");
        assert!(trade.is_buyer_maker);
    }

    #[test]
    fn ignores_non_aggtrade_events() {
        let payload = json!({"e": "bookTicker", "s": "BTCUSDT"});
        assert!(parse_agg_trade(&payload).is_none());
    }
}
