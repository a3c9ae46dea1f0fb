//! Volume profile kernel (`spec.md` §4.9): buckets a trade tape into price
//! bins and derives the point of control, value area, high/low-volume
//! nodes, single prints, and price magnets a mean-reversion or breakout
//! strategy would care about.

use std::collections::BTreeMap;

use rust_decimal::prelude::*;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::common::TradeTapeEntry;

/// Fraction of total volume the value area must contain (70%, expressed
/// as basis points so it can be used in exact `Decimal` arithmetic).
const VALUE_AREA_FRACTION_BP: i64 = 7000;
/// A bin is a "high-volume node" above this fraction of the POC's volume.
const HVN_THRESHOLD_OF_POC: f64 = 0.70;
/// A bin is a "low-volume node" below this fraction of the mean bin volume.
const LVN_THRESHOLD_OF_MEAN: f64 = 0.30;
/// Cap on reported zones so the summary stays bounded regardless of how
/// many bins the price range produces.
const MAX_REPORTED_ZONES: usize = 8;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceZone {
    pub price: Decimal,
    pub volume: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VolumeProfileSummary {
    pub symbol: String,
    pub bin_size: Decimal,
    pub total_volume: Decimal,
    pub poc_price: Decimal,
    pub value_area_high: Decimal,
    pub value_area_low: Decimal,
    pub high_volume_nodes: Vec<PriceZone>,
    pub low_volume_nodes: Vec<PriceZone>,
    pub single_prints: Vec<Decimal>,
    pub magnets: Vec<Decimal>,
    pub avoid_zones: Vec<Decimal>,
    pub confidence: f64,
}

/// `analyze_volume_profile` (`spec.md` §4.9).
pub fn analyze_volume_profile(
    symbol: &str,
    trade_tape: &[TradeTapeEntry],
    bin_size: Decimal,
) -> VolumeProfileSummary {
    if trade_tape.is_empty() || bin_size <= Decimal::ZERO {
        return empty_summary(symbol, bin_size);
    }

    let mut bins: BTreeMap<Decimal, Decimal> = BTreeMap::new();
    for trade in trade_tape {
        let bin = floor_bin(trade.price, bin_size);
        *bins.entry(bin).or_insert(Decimal::ZERO) += trade.quantity;
    }

    let total_volume: Decimal = bins.values().copied().sum();
    let (poc_price, poc_volume) = bins
        .iter()
        .max_by_key(|(_, &v)| v)
        .map(|(&p, &v)| (p, v))
        .unwrap_or((Decimal::ZERO, Decimal::ZERO));

    let (value_area_high, value_area_low) = value_area(&bins, poc_price, total_volume);

    let mean_bin_volume = to_f64(total_volume) / bins.len() as f64;
    let poc_volume_f64 = to_f64(poc_volume);

    let mut hvn: Vec<PriceZone> = bins
        .iter()
        .filter(|(_, &v)| to_f64(v) >= poc_volume_f64 * HVN_THRESHOLD_OF_POC)
        .map(|(&p, &v)| PriceZone { price: p, volume: v })
        .collect();
    hvn.sort_by(|a, b| b.volume.cmp(&a.volume));
    hvn.truncate(MAX_REPORTED_ZONES);

    let mut lvn: Vec<PriceZone> = bins
        .iter()
        .filter(|(_, &v)| to_f64(v) <= mean_bin_volume * LVN_THRESHOLD_OF_MEAN)
        .map(|(&p, &v)| PriceZone { price: p, volume: v })
        .collect();
    lvn.sort_by(|a, b| a.volume.cmp(&b.volume));
    lvn.truncate(MAX_REPORTED_ZONES);

    let single_prints: Vec<Decimal> = bins
        .iter()
        .filter(|(_, &v)| v == bin_size_volume_unit(&bins))
        .map(|(&p, _)| p)
        .take(MAX_REPORTED_ZONES)
        .collect();

    // Magnets: the POC plus the edges of the value area tend to attract
    // price on a retest.
    let mut magnets = vec![poc_price, value_area_high, value_area_low];
    magnets.dedup();

    let avoid_zones: Vec<Decimal> = lvn.iter().map(|z| z.price).take(MAX_REPORTED_ZONES).collect();

    let confidence = profile_confidence(trade_tape.len(), bins.len());

    VolumeProfileSummary {
        symbol: symbol.to_string(),
        bin_size,
        total_volume,
        poc_price,
        value_area_high,
        value_area_low,
        high_volume_nodes: hvn,
        low_volume_nodes: lvn,
        single_prints,
        magnets,
        avoid_zones,
        confidence,
    }
}

fn empty_summary(symbol: &str, bin_size: Decimal) -> VolumeProfileSummary {
    VolumeProfileSummary {
        symbol: symbol.to_string(),
        bin_size,
        total_volume: Decimal::ZERO,
        poc_price: Decimal::ZERO,
        value_area_high: Decimal::ZERO,
        value_area_low: Decimal::ZERO,
        high_volume_nodes: Vec::new(),
        low_volume_nodes: Vec::new(),
        single_prints: Vec::new(),
        magnets: Vec::new(),
        avoid_zones: Vec::new(),
        confidence: 0.0,
    }
}

fn floor_bin(price: Decimal, bin_size: Decimal) -> Decimal {
    (price / bin_size).floor() * bin_size
}

/// Expands outward from the POC bin, alternating sides, until the
/// accumulated volume reaches `VALUE_AREA_FRACTION` of the total —
/// the standard volume-profile value-area construction.
fn value_area(
    bins: &BTreeMap<Decimal, Decimal>,
    poc_price: Decimal,
    total_volume: Decimal,
) -> (Decimal, Decimal) {
    let prices: Vec<Decimal> = bins.keys().copied().collect();
    let Some(poc_idx) = prices.iter().position(|&p| p == poc_price) else {
        return (poc_price, poc_price);
    };

    let target = total_volume * Decimal::new(VALUE_AREA_FRACTION_BP, 4);
    let mut accumulated = *bins.get(&poc_price).unwrap_or(&Decimal::ZERO);
    let mut low_idx = poc_idx;
    let mut high_idx = poc_idx;

    while accumulated < target && (low_idx > 0 || high_idx + 1 < prices.len()) {
        let below = if low_idx > 0 {
            bins.get(&prices[low_idx - 1]).copied()
        } else {
            None
        };
        let above = if high_idx + 1 < prices.len() {
            bins.get(&prices[high_idx + 1]).copied()
        } else {
            None
        };

        match (below, above) {
            (Some(b), Some(a)) if b >= a => {
                accumulated += b;
                low_idx -= 1;
            }
            (Some(_), Some(a)) => {
                accumulated += a;
                high_idx += 1;
            }
            (Some(b), None) => {
                accumulated += b;
                low_idx -= 1;
            }
            (None, Some(a)) => {
                accumulated += a;
                high_idx += 1;
            }
            (None, None) => break,
        }
    }

    (prices[high_idx], prices[low_idx])
}

fn bin_size_volume_unit(bins: &BTreeMap<Decimal, Decimal>) -> Decimal {
    bins.values()
        .copied()
        .min()
        .unwrap_or(Decimal::ZERO)
}

fn profile_confidence(trade_count: usize, bin_count: usize) -> f64 {
    if bin_count == 0 {
        return 0.0;
    }
    let samples_per_bin = trade_count as f64 / bin_count as f64;
    (samples_per_bin / 20.0).clamp(0.0, 1.0)
}

fn to_f64(d: Decimal) -> f64 {
    d.to_f64().unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn tape() -> Vec<TradeTapeEntry> {
        vec![
            TradeTapeEntry { price: dec!(50000), quantity: dec!(5.0), trade_time_ms: 1, is_buyer_maker: false },
            TradeTapeEntry { price: dec!(50000), quantity: dec!(3.0), trade_time_ms: 2, is_buyer_maker: true },
            TradeTapeEntry { price: dec!(50010), quantity: dec!(1.0), trade_time_ms: 3, is_buyer_maker: false },
            TradeTapeEntry { price: dec!(49990), quantity: dec!(0.5), trade_time_ms: 4, is_buyer_maker: true },
        ]
    }

    #[test]
    fn poc_is_the_heaviest_bin() {
        let summary = analyze_volume_profile("BTCUSDT", &tape(), dec!(10));
        assert_eq!(summary.poc_price, dec!(50000));
    }

    #[test]
    fn empty_tape_yields_empty_summary() {
        let summary = analyze_volume_profile("BTCUSDT", &[], dec!(10));
        assert_eq!(summary.confidence, 0.0);
        assert!(summary.high_volume_nodes.is_empty());
    }

    #[test]
    fn value_area_contains_poc() {
        let summary = analyze_volume_profile("BTCUSDT", &tape(), dec!(10));
        assert!(summary.value_area_high >= summary.poc_price);
        assert!(summary.value_area_low <= summary.poc_price);
    }
}
