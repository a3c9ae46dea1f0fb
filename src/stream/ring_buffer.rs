//! Per-symbol ring buffer of aggregated trades (`spec.md` §4.6), capped
//! both by count and by age so a quiet symbol's buffer doesn't grow
//! unbounded and a busy symbol's buffer doesn't hold stale data.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use parking_lot::RwLock;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

pub const DEFAULT_MAX_TRADES: usize = 500_000;
pub const DEFAULT_MAX_AGE: Duration = Duration::from_secs(360 * 60);
const PRUNE_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggTrade {
    pub agg_trade_id: i64,
    pub symbol: String,
    pub price: Decimal,
    pub quantity: Decimal,
    pub first_trade_id: i64,
    pub last_trade_id: i64,
    pub trade_time_ms: i64,
    pub is_buyer_maker: bool,
    #[serde(skip)]
    pub received_at: Option<Instant>,
}

struct Inner {
    trades: VecDeque<AggTrade>,
    max_trades: usize,
    max_age: Duration,
    last_pruned: Instant,
}

/// Thread-safe, bounded trade history for a single symbol.
pub struct TradeRingBuffer {
    inner: RwLock<Inner>,
}

impl TradeRingBuffer {
    pub fn new(max_trades: usize, max_age: Duration) -> Self {
        Self {
            inner: RwLock::new(Inner {
                trades: VecDeque::new(),
                max_trades,
                max_age,
                last_pruned: Instant::now(),
            }),
        }
    }

    pub fn push(&self, mut trade: AggTrade) {
        trade.received_at = Some(Instant::now());
        let mut inner = self.inner.write();
        inner.trades.push_back(trade);
        while inner.trades.len() > inner.max_trades {
            inner.trades.pop_front();
        }

        if inner.last_pruned.elapsed() >= PRUNE_INTERVAL {
            prune_by_age(&mut inner);
        }
    }

    /// Returns up to `limit` of the most recent trades, newest last.
    pub fn recent(&self, limit: usize) -> Vec<AggTrade> {
        let inner = self.inner.read();
        let len = inner.trades.len();
        let start = len.saturating_sub(limit);
        inner.trades.iter().skip(start).cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.inner.read().trades.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn prune_by_age(inner: &mut Inner) {
    let now = Instant::now();
    while let Some(front) = inner.trades.front() {
        let age = front
            .received_at
            .map(|t| now.duration_since(t))
            .unwrap_or_default();
        if age > inner.max_age {
            inner.trades.pop_front();
        } else {
            break;
        }
    }
    inner.last_pruned = now;
}

impl Default for TradeRingBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_TRADES, DEFAULT_MAX_AGE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn trade(id: i64) -> AggTrade {
        AggTrade {
            agg_trade_id: id,
            symbol: "BTCUSDT".to_string(),
            price: dec!(50000),
            quantity: dec!(0.01),
            first_trade_id: id,
            last_trade_id: id,
            trade_time_ms: id,
            is_buyer_maker: false,
            received_at: None,
        }
    }

    #[test]
    fn caps_by_count() {
        let buffer = TradeRingBuffer::new(3, Duration::from_secs(3600));
        for i in 0..5 {
            buffer.push(trade(i));
        }
        assert_eq!(buffer.len(), 3);
        let recent = buffer.recent(10);
        assert_eq!(recent.first().unwrap().agg_trade_id, 2);
        assert_eq!(recent.last().unwrap().agg_trade_id, 4);
    }

    #[test]
    fn recent_respects_limit() {
        let buffer = TradeRingBuffer::new(100, Duration::from_secs(3600));
        for i in 0..10 {
            buffer.push(trade(i));
        }
        assert_eq!(buffer.recent(3).len(), 3);
    }
}
