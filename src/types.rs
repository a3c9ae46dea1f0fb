//! Shared domain enums for the order lifecycle and orchestrator tools
//! (`spec.md` §3, §4.3).

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    pub fn opposite(self) -> Side {
        match self {
            Side::Buy => Side::Sell,
            Side::Sell => Side::Buy,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Side::Buy => "BUY",
            Side::Sell => "SELL",
        }
    }

    pub fn parse(s: &str) -> Result<Side, String> {
        match s.to_uppercase().as_str() {
            "BUY" => Ok(Side::Buy),
            "SELL" => Ok(Side::Sell),
            other => Err(format!("invalid side: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderType {
    Limit,
    Market,
    Stop,
    StopMarket,
    TakeProfit,
    TakeProfitMarket,
    TrailingStopMarket,
}

impl OrderType {
    pub fn as_str(self) -> &'static str {
        match self {
            OrderType::Limit => "LIMIT",
            OrderType::Market => "MARKET",
            OrderType::Stop => "STOP",
            OrderType::StopMarket => "STOP_MARKET",
            OrderType::TakeProfit => "TAKE_PROFIT",
            OrderType::TakeProfitMarket => "TAKE_PROFIT_MARKET",
            OrderType::TrailingStopMarket => "TRAILING_STOP_MARKET",
        }
    }

    /// Market-family order types use market-specific step/min/max overrides
    /// (`spec.md` §4.2/§4.3).
    pub fn is_market_family(self) -> bool {
        matches!(
            self,
            OrderType::Market | OrderType::StopMarket | OrderType::TakeProfitMarket
        )
    }

    pub fn requires_stop_price(self) -> bool {
        matches!(
            self,
            OrderType::Stop
                | OrderType::StopMarket
                | OrderType::TakeProfit
                | OrderType::TakeProfitMarket
                | OrderType::TrailingStopMarket
        )
    }

    pub fn parse(s: &str) -> Result<OrderType, String> {
        match s.to_uppercase().as_str() {
            "LIMIT" => Ok(OrderType::Limit),
            "MARKET" => Ok(OrderType::Market),
            "STOP" => Ok(OrderType::Stop),
            "STOP_MARKET" => Ok(OrderType::StopMarket),
            "TAKE_PROFIT" => Ok(OrderType::TakeProfit),
            "TAKE_PROFIT_MARKET" => Ok(OrderType::TakeProfitMarket),
            "TRAILING_STOP_MARKET" => Ok(OrderType::TrailingStopMarket),
            other => Err(format!("invalid order type: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TimeInForce {
    Gtc,
    Ioc,
    Fok,
    Gtx,
}

impl TimeInForce {
    pub fn as_str(self) -> &'static str {
        match self {
            TimeInForce::Gtc => "GTC",
            TimeInForce::Ioc => "IOC",
            TimeInForce::Fok => "FOK",
            TimeInForce::Gtx => "GTX",
        }
    }

    pub fn parse(s: &str) -> Result<TimeInForce, String> {
        match s.to_uppercase().as_str() {
            "GTC" => Ok(TimeInForce::Gtc),
            "IOC" => Ok(TimeInForce::Ioc),
            "FOK" => Ok(TimeInForce::Fok),
            "GTX" => Ok(TimeInForce::Gtx),
            other => Err(format!("invalid timeInForce: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PositionSide {
    Both,
    Long,
    Short,
}

impl PositionSide {
    pub fn as_str(self) -> &'static str {
        match self {
            PositionSide::Both => "BOTH",
            PositionSide::Long => "LONG",
            PositionSide::Short => "SHORT",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WorkingType {
    MarkPrice,
    ContractPrice,
}

impl WorkingType {
    pub fn as_str(self) -> &'static str {
        match self {
            WorkingType::MarkPrice => "MARK_PRICE",
            WorkingType::ContractPrice => "CONTRACT_PRICE",
        }
    }
}

impl Default for WorkingType {
    fn default() -> Self {
        WorkingType::ContractPrice
    }
}

/// Normalized order status flags (`spec.md` §4.3, `get_order_status`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderStatusFlags {
    pub is_filled: bool,
    pub is_partially_filled: bool,
    pub is_cancelled: bool,
    pub is_expired: bool,
    pub is_active: bool,
    pub fill_percentage: f64,
}

pub fn order_status_flags(status: &str, executed_qty: f64, orig_qty: f64) -> OrderStatusFlags {
    let is_filled = status == "FILLED";
    let is_partially_filled = status == "PARTIALLY_FILLED";
    let is_cancelled = matches!(status, "CANCELED" | "CANCELLED");
    let is_expired = status == "EXPIRED";
    let is_active = matches!(status, "NEW" | "PARTIALLY_FILLED");
    let fill_percentage = if orig_qty > 0.0 {
        (executed_qty / orig_qty) * 100.0
    } else {
        0.0
    };

    OrderStatusFlags {
        is_filled,
        is_partially_filled,
        is_cancelled,
        is_expired,
        is_active,
        fill_percentage,
    }
}

/// Terminal exchange order states — anything except these means the
/// order is still live (`spec.md` §4.5 TTL precheck).
pub fn is_terminal_status(status: &str) -> bool {
    !matches!(status, "NEW" | "PARTIALLY_FILLED")
}
