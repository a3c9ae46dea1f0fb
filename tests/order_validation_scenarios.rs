//! Cross-module scenarios for the symbol rules engine (`spec.md` §4.2,
//! §8): tick/step rounding, minimum-notional rejection, and market-order
//! lot-size overrides, exercised through `rules::validate_order_plan`
//! exactly as `orders::place_order` would call it.

use binance_futures_agent_tools::rules::{validate_order_plan, SymbolFilters};
use binance_futures_agent_tools::types::OrderType;
use rust_decimal_macros::dec;

fn btcusdt_filters() -> SymbolFilters {
    SymbolFilters {
        symbol: "BTCUSDT".to_string(),
        price_tick: dec!(0.10),
        qty_step: dec!(0.001),
        market_qty_step: dec!(0.001),
        min_qty: dec!(0.001),
        max_qty: dec!(1000),
        min_market_qty: dec!(0.001),
        max_market_qty: dec!(120),
        min_price: dec!(556.80),
        max_price: dec!(4529764),
        min_notional: dec!(5),
        price_precision: 1,
        quantity_precision: 3,
    }
}

#[test]
fn limit_order_price_and_quantity_floor_to_exchange_steps() {
    let filters = btcusdt_filters();
    let outcome =
        validate_order_plan(&filters, OrderType::Limit, Some(dec!(67123.456)), dec!(0.01234));

    assert!(outcome.is_valid());
    assert_eq!(outcome.rounded_price, Some(dec!(67123.4)));
    assert_eq!(outcome.rounded_quantity, Some(dec!(0.012)));
    assert_eq!(outcome.warnings.len(), 2);
}

#[test]
fn order_below_minimum_notional_is_rejected() {
    let filters = btcusdt_filters();
    let outcome = validate_order_plan(&filters, OrderType::Limit, Some(dec!(100)), dec!(0.001));

    assert!(!outcome.is_valid());
    assert!(outcome.errors.iter().any(|e| e.contains("notional")));
}

#[test]
fn market_orders_are_validated_against_market_lot_size() {
    let filters = btcusdt_filters();
    // 150 exceeds max_market_qty (120) though it would be fine for a LIMIT order.
    let market_outcome = validate_order_plan(&filters, OrderType::Market, None, dec!(150));
    assert!(!market_outcome.is_valid());

    let limit_outcome = validate_order_plan(&filters, OrderType::Limit, Some(dec!(60000)), dec!(150));
    assert!(limit_outcome.is_valid());
}

#[test]
fn price_below_exchange_floor_is_rejected_after_rounding() {
    let filters = btcusdt_filters();
    let outcome = validate_order_plan(&filters, OrderType::Limit, Some(dec!(500)), dec!(1));
    assert!(!outcome.is_valid());
    assert!(outcome.errors.iter().any(|e| e.contains("below minimum")));
}
