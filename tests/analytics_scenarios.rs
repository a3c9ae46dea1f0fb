//! Cross-module analytics scenarios (`spec.md` §4.9, §8): a synthetic
//! order book and trade tape run through all four kernels together, the
//! way an agent evaluating a single resting order would call them in
//! sequence.

use binance_futures_agent_tools::analytics::common::{BookLevel, OrderBookSnapshot, TradeTapeEntry};
use binance_futures_agent_tools::analytics::multi_horizon::analyze_multi_horizon;
use binance_futures_agent_tools::analytics::queue_fill::analyze_queue_fill;
use binance_futures_agent_tools::analytics::volume_profile::analyze_volume_profile;
use binance_futures_agent_tools::analytics::wall_persistence::{analyze_wall_persistence, WallObservation};
use binance_futures_agent_tools::types::Side;
use rust_decimal_macros::dec;

fn synthetic_book() -> OrderBookSnapshot {
    OrderBookSnapshot {
        symbol: "BTCUSDT".to_string(),
        bids: vec![
            BookLevel { price: dec!(50000), quantity: dec!(3.0) },
            BookLevel { price: dec!(49990), quantity: dec!(1.5) },
            BookLevel { price: dec!(49980), quantity: dec!(1.0) },
        ],
        asks: vec![
            BookLevel { price: dec!(50010), quantity: dec!(1.2) },
            BookLevel { price: dec!(50020), quantity: dec!(1.0) },
        ],
    }
}

fn synthetic_tape() -> Vec<TradeTapeEntry> {
    vec![
        TradeTapeEntry { price: dec!(50000), quantity: dec!(0.4), trade_time_ms: 1, is_buyer_maker: true },
        TradeTapeEntry { price: dec!(50000), quantity: dec!(0.3), trade_time_ms: 2, is_buyer_maker: true },
        TradeTapeEntry { price: dec!(50010), quantity: dec!(0.2), trade_time_ms: 3, is_buyer_maker: false },
        TradeTapeEntry { price: dec!(49990), quantity: dec!(0.1), trade_time_ms: 4, is_buyer_maker: true },
    ]
}

#[test]
fn resting_buy_order_gets_a_coherent_queue_fill_and_horizon_picture() {
    let book = synthetic_book();
    let tape = synthetic_tape();

    let queue_summary = analyze_queue_fill(&book, &tape, Side::Buy, dec!(50000), dec!(1.5), 30.0);
    assert!(queue_summary.fill_probability_300s >= queue_summary.fill_probability_60s);
    assert!((0.0..=1.0).contains(&queue_summary.micro_health_score));

    let horizon_summary = analyze_multi_horizon(
        queue_summary.queue_ahead.to_string().parse::<f64>().unwrap(),
        queue_summary.consumption_rate_per_sec.max(0.01),
        0.35,
        &[60, 300, 900],
    );
    assert_eq!(horizon_summary.horizons.len(), 3);
    for pair in horizon_summary.horizons.windows(2) {
        assert!(pair[1].fill_probability >= pair[0].fill_probability - 1e-9);
    }
}

#[test]
fn volume_profile_and_wall_scan_agree_on_the_dominant_price() {
    let tape = synthetic_tape();
    let profile = analyze_volume_profile("BTCUSDT", &tape, dec!(10));
    assert_eq!(profile.poc_price, dec!(50000));
    assert!(profile.confidence >= 0.0);

    let book = synthetic_book();
    let snapshots = vec![
        WallObservation { price: dec!(50000), quantity: dec!(9.0) },
        WallObservation { price: dec!(50000), quantity: dec!(8.5) },
    ];
    let wall_report = analyze_wall_persistence(&snapshots, &book.bids[1..], &tape);
    assert_eq!(wall_report.price, profile.poc_price);
    assert!(wall_report.is_wall);
}
