//! Symbol rules engine (`spec.md` §4.2): exchange filter cache, price/qty
//! rounding, notional validation, and leverage bracket lookup.
//!
//! Mirrors the original Python `ExchangeInfoCache` + `OrderValidator`:
//! filters are fetched once from `/fapi/v1/exchangeInfo` and cached for a
//! fixed TTL, then every order tool rounds against the cached filters
//! using `rust_decimal` so no floating-point drift can creep into a price
//! or quantity sent to the exchange.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use parking_lot::RwLock;
use reqwest::Method;
use rust_decimal::prelude::*;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::client::FuturesClient;
use crate::types::OrderType;

const RULES_TTL: Duration = Duration::from_secs(300);

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SymbolFilters {
    pub symbol: String,
    pub price_tick: Decimal,
    pub qty_step: Decimal,
    pub market_qty_step: Decimal,
    pub min_qty: Decimal,
    pub max_qty: Decimal,
    pub min_market_qty: Decimal,
    pub max_market_qty: Decimal,
    pub min_price: Decimal,
    pub max_price: Decimal,
    pub min_notional: Decimal,
    pub price_precision: u32,
    pub quantity_precision: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeverageBracket {
    pub bracket: i64,
    pub initial_leverage: i64,
    pub notional_cap: Decimal,
    pub notional_floor: Decimal,
    pub maint_margin_ratio: Decimal,
}

struct CacheEntry {
    filters: SymbolFilters,
    brackets: Vec<LeverageBracket>,
    fetched_at: Instant,
}

/// Caches exchange filters and leverage brackets per symbol, refreshing
/// each entry independently once its TTL elapses.
pub struct RulesEngine {
    cache: RwLock<HashMap<String, CacheEntry>>,
}

impl RulesEngine {
    pub fn new() -> Self {
        Self {
            cache: RwLock::new(HashMap::new()),
        }
    }

    fn cached_fresh(&self, symbol: &str) -> Option<(SymbolFilters, Vec<LeverageBracket>)> {
        let cache = self.cache.read();
        cache.get(symbol).and_then(|e| {
            if e.fetched_at.elapsed() < RULES_TTL {
                Some((e.filters.clone(), e.brackets.clone()))
            } else {
                None
            }
        })
    }

    /// Fetch (or return cached) filters + leverage brackets for a symbol.
    /// No lock is held across the network call (`spec.md` §5).
    pub async fn get_symbol_info(
        &self,
        client: &FuturesClient,
        symbol: &str,
    ) -> anyhow::Result<(SymbolFilters, Vec<LeverageBracket>)> {
        if let Some(hit) = self.cached_fresh(symbol) {
            return Ok(hit);
        }

        let info_resp = client
            .public_request(Method::GET, "/fapi/v1/exchangeInfo", vec![])
            .await;
        if !info_resp.success {
            anyhow::bail!(
                "exchangeInfo fetch failed: {}",
                info_resp.error_msg.unwrap_or_default()
            );
        }
        let filters = parse_symbol_filters(&info_resp.body, symbol)?;

        let bracket_resp = client
            .signed_request(
                Method::GET,
                "/fapi/v1/leverageBracket",
                vec![("symbol".to_string(), symbol.to_string())],
            )
            .await;
        let brackets = if bracket_resp.success {
            parse_leverage_brackets(&bracket_resp.body).unwrap_or_default()
        } else {
            Vec::new()
        };

        self.cache.write().insert(
            symbol.to_string(),
            CacheEntry {
                filters: filters.clone(),
                brackets: brackets.clone(),
                fetched_at: Instant::now(),
            },
        );

        Ok((filters, brackets))
    }
}

impl Default for RulesEngine {
    fn default() -> Self {
        Self::new()
    }
}

fn parse_symbol_filters(exchange_info: &Value, symbol: &str) -> anyhow::Result<SymbolFilters> {
    let symbols = exchange_info
        .get("symbols")
        .and_then(Value::as_array)
        .ok_or_else(|| anyhow::anyhow!("exchangeInfo response missing symbols array"))?;

    let entry = symbols
        .iter()
        .find(|s| s.get("symbol").and_then(Value::as_str) == Some(symbol))
        .ok_or_else(|| anyhow::anyhow!("symbol '{symbol}' not found in exchangeInfo"))?;

    let price_precision = entry
        .get("pricePrecision")
        .and_then(Value::as_u64)
        .unwrap_or(2) as u32;
    let quantity_precision = entry
        .get("quantityPrecision")
        .and_then(Value::as_u64)
        .unwrap_or(3) as u32;

    let filters = entry
        .get("filters")
        .and_then(Value::as_array)
        .ok_or_else(|| anyhow::anyhow!("symbol entry missing filters array"))?;

    let mut price_tick = Decimal::new(1, price_precision);
    let mut min_price = Decimal::ZERO;
    let mut max_price = Decimal::MAX;
    let mut qty_step = Decimal::new(1, quantity_precision);
    let mut min_qty = Decimal::ZERO;
    let mut max_qty = Decimal::MAX;
    let mut market_qty_step = qty_step;
    let mut min_market_qty = Decimal::ZERO;
    let mut max_market_qty = Decimal::MAX;
    let mut min_notional = Decimal::ZERO;

    for f in filters {
        let filter_type = f.get("filterType").and_then(Value::as_str).unwrap_or("");
        match filter_type {
            "PRICE_FILTER" => {
                price_tick = decimal_field(f, "tickSize").unwrap_or(price_tick);
                min_price = decimal_field(f, "minPrice").unwrap_or(min_price);
                max_price = decimal_field(f, "maxPrice").unwrap_or(max_price);
            }
            "LOT_SIZE" => {
                qty_step = decimal_field(f, "stepSize").unwrap_or(qty_step);
                min_qty = decimal_field(f, "minQty").unwrap_or(min_qty);
                max_qty = decimal_field(f, "maxQty").unwrap_or(max_qty);
            }
            "MARKET_LOT_SIZE" => {
                market_qty_step = decimal_field(f, "stepSize").unwrap_or(market_qty_step);
                min_market_qty = decimal_field(f, "minQty").unwrap_or(min_market_qty);
                max_market_qty = decimal_field(f, "maxQty").unwrap_or(max_market_qty);
            }
            "MIN_NOTIONAL" | "NOTIONAL" => {
                min_notional = decimal_field(f, "notional")
                    .or_else(|| decimal_field(f, "minNotional"))
                    .unwrap_or(min_notional);
            }
            _ => {}
        }
    }

    Ok(SymbolFilters {
        symbol: symbol.to_string(),
        price_tick,
        qty_step,
        market_qty_step,
        min_qty,
        max_qty,
        min_market_qty,
        max_market_qty,
        min_price,
        max_price,
        min_notional,
        price_precision,
        quantity_precision,
    })
}

fn parse_leverage_brackets(body: &Value) -> Option<Vec<LeverageBracket>> {
    let arr = body.as_array()?;
    let first = arr.first()?;
    let brackets = first.get("brackets")?.as_array()?;
    Some(
        brackets
            .iter()
            .filter_map(|b| {
                Some(LeverageBracket {
                    bracket: b.get("bracket")?.as_i64()?,
                    initial_leverage: b.get("initialLeverage")?.as_i64()?,
                    notional_cap: decimal_field(b, "notionalCap")?,
                    notional_floor: decimal_field(b, "notionalFloor")?,
                    maint_margin_ratio: decimal_field(b, "maintMarginRatio")?,
                })
            })
            .collect(),
    )
}

fn decimal_field(v: &Value, key: &str) -> Option<Decimal> {
    v.get(key)
        .and_then(Value::as_str)
        .and_then(|s| Decimal::from_str(s).ok())
}

/// Floor a value down to the nearest multiple of `step` (never rounds up —
/// rounding a quantity up could exceed the caller's intended risk).
pub fn floor_to_step(value: Decimal, step: Decimal) -> Decimal {
    if step.is_zero() {
        return value;
    }
    (value / step).floor() * step
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ValidationOutcome {
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    pub rounded_price: Option<Decimal>,
    pub rounded_quantity: Option<Decimal>,
}

impl ValidationOutcome {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Round and validate a price against `PRICE_FILTER` bounds.
pub fn validate_and_round_price(filters: &SymbolFilters, price: Decimal) -> (Decimal, Vec<String>) {
    let mut warnings = Vec::new();
    let rounded = floor_to_step(price, filters.price_tick);
    if rounded != price {
        warnings.push(format!("price rounded from {price} to {rounded}"));
    }
    (rounded, warnings)
}

/// Round and validate a quantity against `LOT_SIZE`/`MARKET_LOT_SIZE`.
pub fn validate_and_round_quantity(
    filters: &SymbolFilters,
    quantity: Decimal,
    order_type: OrderType,
) -> (Decimal, Vec<String>) {
    let mut warnings = Vec::new();
    let step = if order_type.is_market_family() {
        filters.market_qty_step
    } else {
        filters.qty_step
    };
    let rounded = floor_to_step(quantity, step);
    if rounded != quantity {
        warnings.push(format!("quantity rounded from {quantity} to {rounded}"));
    }
    (rounded, warnings)
}

pub fn validate_notional(filters: &SymbolFilters, price: Decimal, quantity: Decimal) -> Vec<String> {
    let mut errors = Vec::new();
    let notional = price * quantity;
    if notional < filters.min_notional {
        errors.push(format!(
            "order notional {notional} is below minimum {}",
            filters.min_notional
        ));
    }
    errors
}

/// Full validation pass used by `place_order`/`place_bracket_orders`:
/// rounds price (if present) and quantity, checks bounds and notional.
pub fn validate_order_plan(
    filters: &SymbolFilters,
    order_type: OrderType,
    price: Option<Decimal>,
    quantity: Decimal,
) -> ValidationOutcome {
    let mut outcome = ValidationOutcome::default();

    let (rounded_qty, qty_warnings) = validate_and_round_quantity(filters, quantity, order_type);
    outcome.warnings.extend(qty_warnings);
    outcome.rounded_quantity = Some(rounded_qty);

    let (min_qty, max_qty) = if order_type.is_market_family() {
        (filters.min_market_qty, filters.max_market_qty)
    } else {
        (filters.min_qty, filters.max_qty)
    };
    if rounded_qty < min_qty {
        outcome
            .errors
            .push(format!("quantity {rounded_qty} is below minimum {min_qty}"));
    }
    if rounded_qty > max_qty {
        outcome
            .errors
            .push(format!("quantity {rounded_qty} exceeds maximum {max_qty}"));
    }

    let rounded_price = if let Some(p) = price {
        let (rp, price_warnings) = validate_and_round_price(filters, p);
        outcome.warnings.extend(price_warnings);
        if rp < filters.min_price {
            outcome
                .errors
                .push(format!("price {rp} is below minimum {}", filters.min_price));
        }
        if rp > filters.max_price {
            outcome
                .errors
                .push(format!("price {rp} exceeds maximum {}", filters.max_price));
        }
        outcome.rounded_price = Some(rp);
        Some(rp)
    } else {
        None
    };

    if let Some(rp) = rounded_price {
        outcome.errors.extend(validate_notional(filters, rp, rounded_qty));
    }

    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn btc_filters() -> SymbolFilters {
        SymbolFilters {
            symbol: "BTCUSDT".to_string(),
            price_tick: dec!(0.1),
            qty_step: dec!(0.001),
            market_qty_step: dec!(0.001),
            min_qty: dec!(0.001),
            max_qty: dec!(1000),
            min_market_qty: dec!(0.001),
            max_market_qty: dec!(120),
            min_price: dec!(0.1),
            max_price: dec!(1000000),
            min_notional: dec!(5),
            price_precision: 1,
            quantity_precision: 3,
        }
    }

    #[test]
    fn floors_never_rounds_up() {
        assert_eq!(floor_to_step(dec!(10.27), dec!(0.1)), dec!(10.2));
        assert_eq!(floor_to_step(dec!(1.23456), dec!(0.001)), dec!(1.234));
    }

    #[test]
    fn rejects_below_min_notional() {
        let filters = btc_filters();
        let outcome = validate_order_plan(&filters, OrderType::Limit, Some(dec!(10.0)), dec!(0.0001));
        assert!(!outcome.is_valid());
    }

    #[test]
    fn accepts_and_rounds_valid_order() {
        let filters = btc_filters();
        let outcome =
            validate_order_plan(&filters, OrderType::Limit, Some(dec!(50000.27)), dec!(0.0015));
        assert!(outcome.is_valid());
        assert_eq!(outcome.rounded_price, Some(dec!(50000.2)));
        assert_eq!(outcome.rounded_quantity, Some(dec!(0.001)));
        assert!(!outcome.warnings.is_empty());
    }

    #[test]
    fn market_orders_use_market_lot_size() {
        let filters = btc_filters();
        let outcome = validate_order_plan(&filters, OrderType::Market, None, dec!(150));
        assert!(!outcome.is_valid());
    }
}
