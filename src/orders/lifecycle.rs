//! Order placement, amendment, status, and cancellation
//! (`spec.md` §4.3), plus `set_leverage`/`set_margin_type`.

use reqwest::Method;
use rust_decimal::Decimal;
use serde_json::{json, Value};
use tracing::info;

use crate::client::FuturesClient;
use crate::config::normalize_symbol;
use crate::envelope::ToolResponse;
use crate::error::{kind_for_exchange_code, ErrorKind, ToolError};
use crate::rules::{validate_order_plan, RulesEngine};
use crate::types::{order_status_flags, OrderType, PositionSide, Side, TimeInForce, WorkingType};

/// Parameters accepted by `place_order`. Mirrors the original's
/// `place_order_futures` argument set.
#[derive(Debug, Clone)]
pub struct PlaceOrderParams {
    pub symbol: String,
    pub side: Side,
    pub order_type: OrderType,
    pub quantity: Decimal,
    pub price: Option<Decimal>,
    pub stop_price: Option<Decimal>,
    pub time_in_force: Option<TimeInForce>,
    pub reduce_only: bool,
    pub close_position: bool,
    pub position_side: PositionSide,
    pub working_type: WorkingType,
    pub client_order_id: Option<String>,
}

fn build_order_params(
    symbol: &str,
    side: Side,
    order_type: OrderType,
    quantity: Option<Decimal>,
    price: Option<Decimal>,
    stop_price: Option<Decimal>,
    time_in_force: Option<TimeInForce>,
    reduce_only: bool,
    close_position: bool,
    position_side: PositionSide,
    working_type: WorkingType,
    client_order_id: Option<&str>,
) -> Vec<(String, String)> {
    let mut params = vec![
        ("symbol".to_string(), symbol.to_string()),
        ("side".to_string(), side.as_str().to_string()),
        ("type".to_string(), order_type.as_str().to_string()),
        ("positionSide".to_string(), position_side.as_str().to_string()),
    ];

    if let Some(q) = quantity {
        params.push(("quantity".to_string(), q.to_string()));
    }
    if let Some(p) = price {
        params.push(("price".to_string(), p.to_string()));
    }
    if let Some(sp) = stop_price {
        params.push(("stopPrice".to_string(), sp.to_string()));
        params.push(("workingType".to_string(), working_type.as_str().to_string()));
    }
    if let Some(tif) = time_in_force {
        params.push(("timeInForce".to_string(), tif.as_str().to_string()));
    }
    if reduce_only {
        params.push(("reduceOnly".to_string(), "true".to_string()));
    }
    if close_position {
        params.push(("closePosition".to_string(), "true".to_string()));
    }
    if let Some(id) = client_order_id {
        params.push(("newClientOrderId".to_string(), id.to_string()));
    }

    params
}

/// `place_order` (`spec.md` §4.3): validates symbol + rounds price/quantity
/// against cached filters, then submits a single order.
pub async fn place_order(
    client: &FuturesClient,
    rules: &RulesEngine,
    params: PlaceOrderParams,
) -> ToolResponse<Value> {
    let symbol = match normalize_symbol(&params.symbol) {
        Ok(s) => s,
        Err(e) => return ToolResponse::err(ToolError::validation(e)),
    };

    if params.order_type.requires_stop_price() && params.stop_price.is_none() {
        return ToolResponse::err(ToolError::validation(format!(
            "{} requires a stopPrice",
            params.order_type.as_str()
        )));
    }
    if matches!(params.order_type, OrderType::Limit) && params.price.is_none() {
        return ToolResponse::err(ToolError::validation("LIMIT orders require a price"));
    }

    let (filters, _brackets) = match rules.get_symbol_info(client, &symbol).await {
        Ok(v) => v,
        Err(e) => return ToolResponse::err(ToolError::new(ErrorKind::DataError, e.to_string())),
    };

    if !params.close_position {
        let outcome =
            validate_order_plan(&filters, params.order_type, params.price, params.quantity);
        if !outcome.is_valid() {
            return ToolResponse::err(
                ToolError::validation("order failed validation")
                    .with_details(json!({"errors": outcome.errors, "warnings": outcome.warnings})),
            );
        }

        let rounded_price = outcome.rounded_price;
        let rounded_qty = outcome.rounded_quantity;
        let rounded_stop = params
            .stop_price
            .map(|sp| crate::rules::floor_to_step(sp, filters.price_tick));

        let req_params = build_order_params(
            &symbol,
            params.side,
            params.order_type,
            rounded_qty,
            rounded_price,
            rounded_stop,
            params.time_in_force,
            params.reduce_only,
            false,
            params.position_side,
            params.working_type,
            params.client_order_id.as_deref(),
        );

        submit_order(client, req_params, outcome.warnings).await
    } else {
        let rounded_stop = params
            .stop_price
            .map(|sp| crate::rules::floor_to_step(sp, filters.price_tick));
        let req_params = build_order_params(
            &symbol,
            params.side,
            params.order_type,
            None,
            None,
            rounded_stop,
            params.time_in_force,
            params.reduce_only,
            true,
            params.position_side,
            params.working_type,
            params.client_order_id.as_deref(),
        );
        submit_order(client, req_params, Vec::new()).await
    }
}

async fn submit_order(
    client: &FuturesClient,
    params: Vec<(String, String)>,
    warnings: Vec<String>,
) -> ToolResponse<Value> {
    let result = client.signed_request(Method::POST, "/fapi/v1/order", params).await;

    if result.success {
        info!(order_id = ?result.body.get("orderId"), "order placed");
        let mut resp = ToolResponse::ok(result.body.clone()).with_raw(result.body);
        if !warnings.is_empty() {
            resp = resp.with_quality_flags(warnings);
        }
        resp
    } else {
        let code = result.error_code.unwrap_or(-1);
        ToolResponse::err(
            ToolError::new(
                kind_for_exchange_code(code),
                result.error_msg.unwrap_or_default(),
            )
            .with_details(json!({"code": code})),
        )
        .with_raw(result.body)
    }
}

/// `amend_order` (`spec.md` §4.3): modify price/quantity of a live order
/// via `PUT /fapi/v1/order`.
pub async fn amend_order(
    client: &FuturesClient,
    rules: &RulesEngine,
    symbol: &str,
    order_id: i64,
    side: Side,
    quantity: Decimal,
    price: Decimal,
) -> ToolResponse<Value> {
    let symbol = match normalize_symbol(symbol) {
        Ok(s) => s,
        Err(e) => return ToolResponse::err(ToolError::validation(e)),
    };

    let (filters, _) = match rules.get_symbol_info(client, &symbol).await {
        Ok(v) => v,
        Err(e) => return ToolResponse::err(ToolError::new(ErrorKind::DataError, e.to_string())),
    };

    let outcome = validate_order_plan(&filters, OrderType::Limit, Some(price), quantity);
    if !outcome.is_valid() {
        return ToolResponse::err(
            ToolError::validation("amendment failed validation")
                .with_details(json!({"errors": outcome.errors})),
        );
    }

    let params = vec![
        ("symbol".to_string(), symbol),
        ("orderId".to_string(), order_id.to_string()),
        ("side".to_string(), side.as_str().to_string()),
        (
            "quantity".to_string(),
            outcome.rounded_quantity.unwrap().to_string(),
        ),
        (
            "price".to_string(),
            outcome.rounded_price.unwrap().to_string(),
        ),
    ];

    let result = client.signed_request(Method::PUT, "/fapi/v1/order", params).await;
    if result.success {
        ToolResponse::ok(result.body.clone()).with_raw(result.body)
    } else {
        let code = result.error_code.unwrap_or(-1);
        ToolResponse::err(ToolError::new(
            kind_for_exchange_code(code),
            result.error_msg.unwrap_or_default(),
        ))
        .with_raw(result.body)
    }
}

/// `get_order_status` (`spec.md` §4.3): fetches a single order and
/// annotates it with normalized status flags.
pub async fn get_order_status(
    client: &FuturesClient,
    symbol: &str,
    order_id: Option<i64>,
    orig_client_order_id: Option<&str>,
) -> ToolResponse<Value> {
    let symbol = match normalize_symbol(symbol) {
        Ok(s) => s,
        Err(e) => return ToolResponse::err(ToolError::validation(e)),
    };

    let mut params = vec![("symbol".to_string(), symbol)];
    if let Some(id) = order_id {
        params.push(("orderId".to_string(), id.to_string()));
    }
    if let Some(cid) = orig_client_order_id {
        params.push(("origClientOrderId".to_string(), cid.to_string()));
    }

    let result = client
        .signed_request(Method::GET, "/fapi/v1/order", params)
        .await;

    if result.success {
        let status = result.body.get("status").and_then(Value::as_str).unwrap_or("");
        let executed_qty: f64 = result
            .body
            .get("executedQty")
            .and_then(Value::as_str)
            .and_then(|s| s.parse().ok())
            .unwrap_or(0.0);
        let orig_qty: f64 = result
            .body
            .get("origQty")
            .and_then(Value::as_str)
            .and_then(|s| s.parse().ok())
            .unwrap_or(0.0);
        let flags = order_status_flags(status, executed_qty, orig_qty);

        let mut data = result.body.clone();
        if let Value::Object(ref mut map) = data {
            map.insert("flags".to_string(), serde_json::to_value(flags).unwrap());
        }
        ToolResponse::ok(data).with_raw(result.body)
    } else {
        let code = result.error_code.unwrap_or(-1);
        ToolResponse::err(ToolError::new(
            kind_for_exchange_code(code),
            result.error_msg.unwrap_or_default(),
        ))
        .with_raw(result.body)
    }
}

/// `cancel_order` (`spec.md` §4.3).
pub async fn cancel_order(
    client: &FuturesClient,
    symbol: &str,
    order_id: Option<i64>,
    orig_client_order_id: Option<&str>,
) -> ToolResponse<Value> {
    let symbol = match normalize_symbol(symbol) {
        Ok(s) => s,
        Err(e) => return ToolResponse::err(ToolError::validation(e)),
    };

    let mut params = vec![("symbol".to_string(), symbol)];
    if let Some(id) = order_id {
        params.push(("orderId".to_string(), id.to_string()));
    }
    if let Some(cid) = orig_client_order_id {
        params.push(("origClientOrderId".to_string(), cid.to_string()));
    }

    let result = client
        .signed_request(Method::DELETE, "/fapi/v1/order", params)
        .await;

    if result.success {
        ToolResponse::ok(result.body.clone()).with_raw(result.body)
    } else {
        let code = result.error_code.unwrap_or(-1);
        let kind = if code == crate::error::ExchangeErrorCode::ORDER_NOT_FOUND.0 {
            ErrorKind::OrderNotFound
        } else {
            ErrorKind::CancelFailed
        };
        ToolResponse::err(ToolError::new(kind, result.error_msg.unwrap_or_default()))
            .with_raw(result.body)
    }
}

/// `cancel_multiple_orders` (`spec.md` §4.3): batch-cancel up to 10 orders
/// in one request via `/fapi/v1/batchOrders`.
pub async fn cancel_multiple_orders(
    client: &FuturesClient,
    symbol: &str,
    order_ids: Vec<i64>,
) -> ToolResponse<Value> {
    let symbol = match normalize_symbol(symbol) {
        Ok(s) => s,
        Err(e) => return ToolResponse::err(ToolError::validation(e)),
    };

    if order_ids.is_empty() {
        return ToolResponse::err(ToolError::validation("order_ids must be non-empty"));
    }
    if order_ids.len() > 10 {
        return ToolResponse::err(ToolError::validation(
            "at most 10 orders can be cancelled in a single batch",
        ));
    }

    let ids_json = serde_json::to_string(&order_ids).unwrap();
    let params = vec![
        ("symbol".to_string(), symbol),
        ("orderIdList".to_string(), ids_json),
    ];

    let result = client
        .signed_request(Method::DELETE, "/fapi/v1/batchOrders", params)
        .await;

    if result.success {
        ToolResponse::ok(result.body.clone()).with_raw(result.body)
    } else {
        let code = result.error_code.unwrap_or(-1);
        ToolResponse::err(ToolError::new(
            ErrorKind::CancelFailed,
            result.error_msg.unwrap_or_default(),
        ))
        .with_details_code(code)
    }
}

/// `set_leverage` (`spec.md` §4.3): idempotent — a `-4046`
/// ("No need to change leverage") response is treated as success.
pub async fn set_leverage(client: &FuturesClient, symbol: &str, leverage: u32) -> ToolResponse<Value> {
    let symbol = match normalize_symbol(symbol) {
        Ok(s) => s,
        Err(e) => return ToolResponse::err(ToolError::validation(e)),
    };
    if !(1..=125).contains(&leverage) {
        return ToolResponse::err(ToolError::validation("leverage must be between 1 and 125"));
    }

    let params = vec![
        ("symbol".to_string(), symbol.clone()),
        ("leverage".to_string(), leverage.to_string()),
    ];
    let result = client
        .signed_request(Method::POST, "/fapi/v1/leverage", params)
        .await;

    if result.success {
        ToolResponse::ok(result.body.clone()).with_raw(result.body)
    } else {
        let code = result.error_code.unwrap_or(-1);
        if code == crate::error::ExchangeErrorCode::LEVERAGE_NOT_CHANGED.0 {
            ToolResponse::ok(json!({"leverage": leverage, "symbol": symbol}))
                .with_quality_flags(vec!["leverage already at requested value".to_string()])
        } else {
            ToolResponse::err(ToolError::new(
                ErrorKind::ApiError,
                result.error_msg.unwrap_or_default(),
            ))
            .with_raw(result.body)
        }
    }
}

/// `set_margin_type` (`spec.md` §4.3): idempotent — a `-4048`
/// ("Margin type cannot be changed if there exists position") response is
/// surfaced as `position_exists`, not a hard failure for the caller to
/// treat as transient.
pub async fn set_margin_type(
    client: &FuturesClient,
    symbol: &str,
    margin_type: &str,
) -> ToolResponse<Value> {
    let symbol = match normalize_symbol(symbol) {
        Ok(s) => s,
        Err(e) => return ToolResponse::err(ToolError::validation(e)),
    };
    let margin_type = margin_type.to_uppercase();
    if margin_type != "ISOLATED" && margin_type != "CROSSED" {
        return ToolResponse::err(ToolError::validation(
            "marginType must be ISOLATED or CROSSED",
        ));
    }

    let params = vec![
        ("symbol".to_string(), symbol),
        ("marginType".to_string(), margin_type),
    ];
    let result = client
        .signed_request(Method::POST, "/fapi/v1/marginType", params)
        .await;

    if result.success {
        ToolResponse::ok(result.body.clone()).with_raw(result.body)
    } else {
        let code = result.error_code.unwrap_or(-1);
        if code == crate::error::ExchangeErrorCode::MARGIN_TYPE_POSITION_EXISTS.0 {
            ToolResponse::err(ToolError::new(
                ErrorKind::PositionExists,
                "margin type cannot change while a position is open",
            ))
        } else {
            ToolResponse::err(ToolError::new(
                ErrorKind::ApiError,
                result.error_msg.unwrap_or_default(),
            ))
            .with_raw(result.body)
        }
    }
}

trait WithDetailsCode {
    fn with_details_code(self, code: i64) -> Self;
}

impl WithDetailsCode for ToolResponse<Value> {
    fn with_details_code(mut self, code: i64) -> Self {
        if let Some(err) = self.error.as_mut() {
            err.details = Some(json!({"code": code}));
        }
        self
    }
}
