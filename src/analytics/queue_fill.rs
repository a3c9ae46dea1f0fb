//! Queue-fill ETA and probability kernel (`spec.md` §4.9).
//!
//! Models a resting order's place in its price level's queue as a
//! constant-rate exponential service process: the level drains at the
//! trade tape's recent consumption rate, so the probability the order has
//! been reached by time `t` is `1 - exp(-rate * t / queue_ahead)`.

use rust_decimal::prelude::*;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::common::{OrderBookSnapshot, TradeTapeEntry};
use crate::types::Side;

const OBI_DEPTH: usize = 5;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueFillSummary {
    pub symbol: String,
    pub side: Side,
    pub price: Decimal,
    pub queue_ahead: Decimal,
    pub consumption_rate_per_sec: f64,
    pub estimated_fill_seconds: Option<f64>,
    pub fill_probability_60s: f64,
    pub fill_probability_300s: f64,
    pub adverse_selection_score: f64,
    pub order_book_imbalance: f64,
    pub micro_health_score: f64,
    pub recommendation: String,
}

/// `analyze_queue_fill` (`spec.md` §4.9).
///
/// `own_order_position` is the quantity already resting ahead of the
/// caller's order at `price` (0 if the caller would be first in queue).
pub fn analyze_queue_fill(
    book: &OrderBookSnapshot,
    trade_tape: &[TradeTapeEntry],
    side: Side,
    price: Decimal,
    own_order_position: Decimal,
    window_seconds: f64,
) -> QueueFillSummary {
    let level_qty = level_quantity(book, side, price);
    let queue_ahead = own_order_position.min(level_qty).max(Decimal::ZERO);

    let consumed_qty: Decimal = trade_tape
        .iter()
        .filter(|t| trade_hits_level(t, side, price))
        .map(|t| t.quantity)
        .sum();
    let consumption_rate_per_sec = if window_seconds > 0.0 {
        to_f64(consumed_qty) / window_seconds
    } else {
        0.0
    };

    let queue_ahead_f64 = to_f64(queue_ahead);
    let estimated_fill_seconds = if consumption_rate_per_sec > 0.0 && queue_ahead_f64 > 0.0 {
        Some(queue_ahead_f64 / consumption_rate_per_sec)
    } else if queue_ahead_f64 == 0.0 {
        Some(0.0)
    } else {
        None
    };

    let fill_probability_60s = fill_probability(queue_ahead_f64, consumption_rate_per_sec, 60.0);
    let fill_probability_300s = fill_probability(queue_ahead_f64, consumption_rate_per_sec, 300.0);

    let adverse_selection_score = adverse_selection(trade_tape, side);
    let order_book_imbalance = book.imbalance(OBI_DEPTH);

    let micro_health_score = micro_health(
        fill_probability_300s,
        adverse_selection_score,
        order_book_imbalance,
        side,
    );

    let recommendation = recommend(fill_probability_300s, adverse_selection_score, micro_health_score);

    QueueFillSummary {
        symbol: book.symbol.clone(),
        side,
        price,
        queue_ahead,
        consumption_rate_per_sec,
        estimated_fill_seconds,
        fill_probability_60s,
        fill_probability_300s,
        adverse_selection_score,
        order_book_imbalance,
        micro_health_score,
        recommendation,
    }
}

fn level_quantity(book: &OrderBookSnapshot, side: Side, price: Decimal) -> Decimal {
    let levels = match side {
        Side::Buy => &book.bids,
        Side::Sell => &book.asks,
    };
    levels
        .iter()
        .find(|l| l.price == price)
        .map(|l| l.quantity)
        .unwrap_or(Decimal::ZERO)
}

/// A resting buy order is consumed by aggressive sells hitting the bid
/// (`is_buyer_maker == true`); a resting sell is consumed by aggressive
/// buys lifting the ask (`is_buyer_maker == false`).
fn trade_hits_level(trade: &TradeTapeEntry, side: Side, price: Decimal) -> bool {
    if trade.price != price {
        return false;
    }
    match side {
        Side::Buy => trade.is_buyer_maker,
        Side::Sell => !trade.is_buyer_maker,
    }
}

fn fill_probability(queue_ahead: f64, rate_per_sec: f64, horizon_secs: f64) -> f64 {
    if queue_ahead <= 0.0 {
        return 1.0;
    }
    if rate_per_sec <= 0.0 {
        return 0.0;
    }
    1.0 - (-rate_per_sec * horizon_secs / queue_ahead).exp()
}

/// Fraction of recent trades that were aggressive fills against the
/// resting side's disadvantage (sells hitting the bid when we're a buyer,
/// buys lifting the ask when we're a seller) — a higher score means the
/// tape is running against the order's side.
fn adverse_selection(trade_tape: &[TradeTapeEntry], side: Side) -> f64 {
    if trade_tape.is_empty() {
        return 0.0;
    }
    let against = trade_tape
        .iter()
        .filter(|t| match side {
            Side::Buy => t.is_buyer_maker,
            Side::Sell => !t.is_buyer_maker,
        })
        .count();
    against as f64 / trade_tape.len() as f64
}

/// Composite score in `[0, 1]`: high fill probability, low adverse
/// selection, and book imbalance favoring the order's side all push it up.
fn micro_health(fill_probability: f64, adverse_selection: f64, obi: f64, side: Side) -> f64 {
    let obi_component = match side {
        Side::Buy => (obi + 1.0) / 2.0,
        Side::Sell => (1.0 - obi) / 2.0,
    };
    (0.5 * fill_probability + 0.3 * (1.0 - adverse_selection) + 0.2 * obi_component).clamp(0.0, 1.0)
}

fn recommend(fill_probability_300s: f64, adverse_selection: f64, micro_health: f64) -> String {
    if micro_health > 0.7 && fill_probability_300s > 0.5 {
        "hold".to_string()
    } else if adverse_selection > 0.65 {
        "cancel_adverse_flow".to_string()
    } else if fill_probability_300s < 0.1 {
        "reprice_closer".to_string()
    } else {
        "monitor".to_string()
    }
}

fn to_f64(d: Decimal) -> f64 {
    d.to_f64().unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use super::super::common::BookLevel;
    use rust_decimal_macros::dec;

    fn sample_book() -> OrderBookSnapshot {
        OrderBookSnapshot {
            symbol: "BTCUSDT".to_string(),
            bids: vec![
                BookLevel { price: dec!(50000), quantity: dec!(2.0) },
                BookLevel { price: dec!(49990), quantity: dec!(1.0) },
            ],
            asks: vec![
                BookLevel { price: dec!(50010), quantity: dec!(1.5) },
                BookLevel { price: dec!(50020), quantity: dec!(1.0) },
            ],
        }
    }

    #[test]
    fn zero_queue_ahead_means_certain_fill() {
        let book = sample_book();
        let summary = analyze_queue_fill(&book, &[], Side::Buy, dec!(50000), dec!(0), 60.0);
        assert_eq!(summary.fill_probability_60s, 1.0);
        assert_eq!(summary.estimated_fill_seconds, Some(0.0));
    }

    #[test]
    fn stalled_queue_with_no_consumption_has_no_eta() {
        let book = sample_book();
        let summary = analyze_queue_fill(&book, &[], Side::Buy, dec!(50000), dec!(2.0), 60.0);
        assert_eq!(summary.estimated_fill_seconds, None);
        assert_eq!(summary.fill_probability_60s, 0.0);
    }

    #[test]
    fn consumption_improves_fill_probability() {
        let book = sample_book();
        let tape = vec![
            TradeTapeEntry { price: dec!(50000), quantity: dec!(0.5), trade_time_ms: 1, is_buyer_maker: true },
            TradeTapeEntry { price: dec!(50000), quantity: dec!(0.5), trade_time_ms: 2, is_buyer_maker: true },
        ];
        let summary = analyze_queue_fill(&book, &tape, Side::Buy, dec!(50000), dec!(1.0), 60.0);
        assert!(summary.fill_probability_300s > 0.0);
        assert!(summary.estimated_fill_seconds.is_some());
    }
}
