//! Wall persistence / spoof-risk scoring kernel (`spec.md` §4.9).
//!
//! A "wall" is a resting size at a level far larger than its neighbors.
//! Persistence is tracked across successive snapshots of the same level;
//! a wall that shrinks sharply without a matching trade print is scored
//! as likely spoofed rather than genuinely consumed.

use rust_decimal::prelude::*;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::common::{BookLevel, TradeTapeEntry};

/// A wall is flagged when a level's size exceeds this multiple of the
/// mean size of the levels around it.
const WALL_SIZE_MULTIPLE: f64 = 3.0;
/// Weight given to observed persistence (fraction of snapshots the wall
/// survived) in the final score.
const PERSISTENCE_WEIGHT: f64 = 0.6;
/// Weight given to the fraction of the wall's shrinkage that is
/// unexplained by matching trade prints.
const UNEXPLAINED_SHRINK_WEIGHT: f64 = 0.4;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WallObservation {
    pub price: Decimal,
    pub quantity: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WallReport {
    pub price: Decimal,
    pub is_wall: bool,
    pub size_ratio_to_neighbors: f64,
    pub persistence_score: f64,
    pub unexplained_shrink_ratio: f64,
    pub spoof_risk_score: f64,
}

/// `analyze_wall_persistence` (`spec.md` §4.9).
///
/// `snapshots` is a time-ordered series of book-level observations for a
/// single price (oldest first); `trade_tape` is the trade history over
/// the same window, used to explain away quantity drops that correspond
/// to real fills rather than order pulls.
pub fn analyze_wall_persistence(
    snapshots: &[WallObservation],
    neighbor_levels: &[BookLevel],
    trade_tape: &[TradeTapeEntry],
) -> WallReport {
    let price = snapshots
        .first()
        .map(|o| o.price)
        .unwrap_or(Decimal::ZERO);

    let neighbor_mean = mean_quantity(neighbor_levels);
    let peak_qty = snapshots
        .iter()
        .map(|o| o.quantity)
        .max()
        .unwrap_or(Decimal::ZERO);
    let size_ratio_to_neighbors = if neighbor_mean > 0.0 {
        to_f64(peak_qty) / neighbor_mean
    } else {
        0.0
    };
    let is_wall = size_ratio_to_neighbors >= WALL_SIZE_MULTIPLE;

    let survived = snapshots
        .iter()
        .filter(|o| o.quantity >= peak_qty * Decimal::new(5, 1))
        .count();
    let persistence_score = if snapshots.is_empty() {
        0.0
    } else {
        survived as f64 / snapshots.len() as f64
    };

    let total_shrink = snapshots
        .first()
        .zip(snapshots.last())
        .map(|(first, last)| (first.quantity - last.quantity).max(Decimal::ZERO))
        .unwrap_or(Decimal::ZERO);
    let matched_volume: Decimal = trade_tape
        .iter()
        .filter(|t| t.price == price)
        .map(|t| t.quantity)
        .sum();
    let unexplained_shrink_ratio = if total_shrink > Decimal::ZERO {
        ((total_shrink - matched_volume).max(Decimal::ZERO) / total_shrink)
            .to_string()
            .parse::<f64>()
            .unwrap_or(0.0)
    } else {
        0.0
    };

    let spoof_risk_score = if is_wall {
        (PERSISTENCE_WEIGHT * (1.0 - persistence_score)
            + UNEXPLAINED_SHRINK_WEIGHT * unexplained_shrink_ratio)
            .clamp(0.0, 1.0)
    } else {
        0.0
    };

    WallReport {
        price,
        is_wall,
        size_ratio_to_neighbors,
        persistence_score,
        unexplained_shrink_ratio,
        spoof_risk_score,
    }
}

fn mean_quantity(levels: &[BookLevel]) -> f64 {
    if levels.is_empty() {
        return 0.0;
    }
    let sum: Decimal = levels.iter().map(|l| l.quantity).sum();
    to_f64(sum) / levels.len() as f64
}

fn to_f64(d: Decimal) -> f64 {
    d.to_f64().unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn neighbors() -> Vec<BookLevel> {
        vec![
            BookLevel { price: dec!(49990), quantity: dec!(1.0) },
            BookLevel { price: dec!(49980), quantity: dec!(1.2) },
        ]
    }

    #[test]
    fn large_persistent_size_is_flagged_a_wall() {
        let snapshots = vec![
            WallObservation { price: dec!(50000), quantity: dec!(10.0) },
            WallObservation { price: dec!(50000), quantity: dec!(9.8) },
            WallObservation { price: dec!(50000), quantity: dec!(9.5) },
        ];
        let report = analyze_wall_persistence(&snapshots, &neighbors(), &[]);
        assert!(report.is_wall);
        assert!(report.spoof_risk_score < 0.5);
    }

    #[test]
    fn sudden_unexplained_drop_scores_high_spoof_risk() {
        let snapshots = vec![
            WallObservation { price: dec!(50000), quantity: dec!(10.0) },
            WallObservation { price: dec!(50000), quantity: dec!(0.2) },
        ];
        let report = analyze_wall_persistence(&snapshots, &neighbors(), &[]);
        assert!(report.is_wall);
        assert!(report.spoof_risk_score > 0.5);
    }

    #[test]
    fn drop_explained_by_trades_scores_low_spoof_risk() {
        let snapshots = vec![
            WallObservation { price: dec!(50000), quantity: dec!(10.0) },
            WallObservation { price: dec!(50000), quantity: dec!(0.5) },
        ];
        let tape = vec![TradeTapeEntry {
            price: dec!(50000),
            quantity: dec!(9.5),
            trade_time_ms: 1,
            is_buyer_maker: true,
        }];
        let report = analyze_wall_persistence(&snapshots, &neighbors(), &tape);
        assert!(report.unexplained_shrink_ratio < 0.1);
    }
}
