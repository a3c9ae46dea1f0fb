//! Shared input/output types for the analytics kernels (`spec.md` §4.9).

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// One side of an order-book snapshot: price-ascending for asks,
/// price-descending for bids, matching `/fapi/v1/depth`'s own ordering.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookLevel {
    pub price: Decimal,
    pub quantity: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderBookSnapshot {
    pub symbol: String,
    pub bids: Vec<BookLevel>,
    pub asks: Vec<BookLevel>,
}

impl OrderBookSnapshot {
    pub fn best_bid(&self) -> Option<&BookLevel> {
        self.bids.first()
    }

    pub fn best_ask(&self) -> Option<&BookLevel> {
        self.asks.first()
    }

    pub fn mid_price(&self) -> Option<Decimal> {
        match (self.best_bid(), self.best_ask()) {
            (Some(b), Some(a)) => Some((b.price + a.price) / Decimal::from(2)),
            _ => None,
        }
    }

    /// Order book imbalance over the top `depth` levels on each side,
    /// in `[-1, 1]`: positive means bid-heavy.
    pub fn imbalance(&self, depth: usize) -> f64 {
        let bid_qty: Decimal = self.bids.iter().take(depth).map(|l| l.quantity).sum();
        let ask_qty: Decimal = self.asks.iter().take(depth).map(|l| l.quantity).sum();
        let total = bid_qty + ask_qty;
        if total.is_zero() {
            return 0.0;
        }
        ((bid_qty - ask_qty) / total)
            .to_string()
            .parse::<f64>()
            .unwrap_or(0.0)
    }
}

/// A single executed trade, as consumed from the aggTrade ring buffer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeTapeEntry {
    pub price: Decimal,
    pub quantity: Decimal,
    pub trade_time_ms: i64,
    pub is_buyer_maker: bool,
}
