//! Bracket order orchestrator (`spec.md` §4.4): places an entry order,
//! then watches for its fill and emulates an OCO group of exit orders
//! (one stop-loss, one or more take-profits) — cancelling the remaining
//! exits as soon as one of them fills.
//!
//! Grounded on the original Python `bracket_orders.py`: a background
//! worker with two phases (entry-watch, then exit-watch), a 2-second poll
//! interval, and a 1-hour wall-clock cap on the entry-watch phase.

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use reqwest::Method;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::client::FuturesClient;
use crate::config::normalize_symbol;
use crate::envelope::ToolResponse;
use crate::error::{ErrorKind, ToolError};
use crate::rules::{floor_to_step, validate_order_plan, RulesEngine};
use crate::types::{OrderType, Side};

use super::registry::{generate_job_id, CancelFlag, JobRegistry};

const POLL_INTERVAL: Duration = Duration::from_secs(2);
const MAX_ENTRY_WAIT: Duration = Duration::from_secs(3600);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BracketPhase {
    AwaitingEntry,
    MonitoringExits,
    Completed,
    Cancelled,
    Error,
}

/// One leg of the exit group.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TakeProfitSpec {
    pub price: Decimal,
    /// Exactly one of `quantity`/`percentage` is honored; if neither is
    /// set on the last take-profit, it absorbs whatever quantity remains
    /// after the earlier legs (`spec.md` §4.4).
    pub quantity: Option<Decimal>,
    pub percentage: Option<Decimal>,
}

#[derive(Debug, Clone)]
pub struct PlaceBracketParams {
    pub symbol: String,
    pub side: Side,
    pub entry_type: OrderType,
    pub entry_price: Option<Decimal>,
    pub entry_quantity: Decimal,
    pub stop_loss_price: Decimal,
    pub take_profits: Vec<TakeProfitSpec>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BracketJob {
    pub job_id: String,
    pub symbol: String,
    pub side: Side,
    pub entry_order_id: i64,
    pub exit_order_ids: Vec<i64>,
    pub filled_exit_order_id: Option<i64>,
    pub phase: BracketPhase,
    pub error_message: Option<String>,
    #[serde(skip)]
    pub cancel_flag: CancelFlag,
}

pub struct BracketOrchestrator {
    registry: Arc<JobRegistry<BracketJob>>,
}

impl BracketOrchestrator {
    pub fn new() -> Self {
        Self {
            registry: Arc::new(JobRegistry::new()),
        }
    }

    pub fn get_job(&self, job_id: &str) -> Option<BracketJob> {
        self.registry.get(job_id)
    }

    /// `get_bracket_job_status` (`spec.md` §4.4).
    pub fn get_job_status(&self, job_id: &str) -> ToolResponse<Value> {
        match self.registry.get(job_id) {
            Some(job) => ToolResponse::ok(serde_json::to_value(&job).unwrap()).with_job_id(job_id),
            None => {
                ToolResponse::err(ToolError::not_found(format!("bracket job '{job_id}' not found")))
            }
        }
    }

    /// `cancel_bracket_job` (`spec.md` §4.4): best-effort, silent cancel of
    /// whatever orders are still outstanding for the job, and sets the
    /// cooperative cancel flag so the monitor worker stops placing more.
    pub async fn cancel_job(&self, client: &FuturesClient, job_id: &str) -> ToolResponse<Value> {
        let job = match self.registry.get(job_id) {
            Some(j) => j,
            None => return ToolResponse::err(ToolError::not_found(format!("bracket job '{job_id}' not found"))),
        };

        job.cancel_flag.cancel();

        let mut cancelled = Vec::new();
        let mut failed = Vec::new();

        let mut order_ids = vec![job.entry_order_id];
        order_ids.extend(job.exit_order_ids.iter().copied());

        for order_id in order_ids {
            let params = vec![
                ("symbol".to_string(), job.symbol.clone()),
                ("orderId".to_string(), order_id.to_string()),
            ];
            let result = client.signed_request(Method::DELETE, "/fapi/v1/order", params).await;
            if result.success {
                cancelled.push(order_id);
            } else {
                failed.push(order_id);
            }
        }

        self.registry.update(job_id, |j| j.phase = BracketPhase::Cancelled);

        ToolResponse::ok(json!({
            "job_id": job_id,
            "cancelled_orders": cancelled,
            "failed_cancellations": failed,
        }))
        .with_job_id(job_id)
    }

    /// `place_bracket_orders` (`spec.md` §4.4).
    pub async fn place_bracket_orders(
        self: &Arc<Self>,
        client: Arc<FuturesClient>,
        rules: Arc<RulesEngine>,
        params: PlaceBracketParams,
    ) -> ToolResponse<Value> {
        let symbol = match normalize_symbol(&params.symbol) {
            Ok(s) => s,
            Err(e) => return ToolResponse::err(ToolError::validation(e)),
        };

        if params.take_profits.is_empty() {
            return ToolResponse::err(ToolError::validation("at least one take-profit is required"));
        }

        // Directional invariants: stop-loss must sit on the losing side of
        // the entry, take-profits on the winning side.
        if let Some(entry_price) = params.entry_price {
            let sl_ok = match params.side {
                Side::Buy => params.stop_loss_price < entry_price,
                Side::Sell => params.stop_loss_price > entry_price,
            };
            if !sl_ok {
                return ToolResponse::err(ToolError::validation(
                    "stop_loss_price is not on the loss side of the entry price",
                ));
            }
            for tp in &params.take_profits {
                let tp_ok = match params.side {
                    Side::Buy => tp.price > entry_price,
                    Side::Sell => tp.price < entry_price,
                };
                if !tp_ok {
                    return ToolResponse::err(ToolError::validation(
                        "take_profit price is not on the profit side of the entry price",
                    ));
                }
            }
        }

        let (filters, _brackets) = match rules.get_symbol_info(&client, &symbol).await {
            Ok(v) => v,
            Err(e) => return ToolResponse::err(ToolError::new(ErrorKind::DataError, e.to_string())),
        };

        let outcome = validate_order_plan(
            &filters,
            params.entry_type,
            params.entry_price,
            params.entry_quantity,
        );
        if !outcome.is_valid() {
            return ToolResponse::err(
                ToolError::validation("entry order failed validation")
                    .with_details(json!({"errors": outcome.errors})),
            );
        }
        let entry_qty = outcome.rounded_quantity.unwrap();

        // Entry order.
        let mut entry_params = vec![
            ("symbol".to_string(), symbol.clone()),
            ("side".to_string(), params.side.as_str().to_string()),
            ("type".to_string(), params.entry_type.as_str().to_string()),
            ("quantity".to_string(), entry_qty.to_string()),
        ];
        if let Some(price) = outcome.rounded_price {
            entry_params.push(("price".to_string(), price.to_string()));
            entry_params.push(("timeInForce".to_string(), "GTC".to_string()));
        }

        let entry_result = client
            .signed_request(Method::POST, "/fapi/v1/order", entry_params)
            .await;
        if !entry_result.success {
            return ToolResponse::err(
                ToolError::new(ErrorKind::EntryFailed, entry_result.error_msg.unwrap_or_default())
                    .with_details(json!({"code": entry_result.error_code})),
            );
        }
        let entry_order_id = entry_result
            .body
            .get("orderId")
            .and_then(Value::as_i64)
            .unwrap_or_default();
        let entry_status = entry_result
            .body
            .get("status")
            .and_then(Value::as_str)
            .unwrap_or("NEW")
            .to_string();

        let job_id = generate_job_id("bracket");
        let job = BracketJob {
            job_id: job_id.clone(),
            symbol: symbol.clone(),
            side: params.side,
            entry_order_id,
            exit_order_ids: Vec::new(),
            filled_exit_order_id: None,
            phase: BracketPhase::AwaitingEntry,
            error_message: None,
            cancel_flag: CancelFlag::new(),
        };
        self.registry.insert(job_id.clone(), job);

        let exit_qtys = split_exit_quantities(&params.take_profits, entry_qty, filters.qty_step);

        let orchestrator = Arc::clone(self);
        let monitor_job_id = job_id.clone();
        let monitor_symbol = symbol.clone();
        let monitor_side = params.side;
        let monitor_sl = params.stop_loss_price;
        let monitor_tps: Vec<(Decimal, Decimal)> = params
            .take_profits
            .iter()
            .zip(exit_qtys.into_iter())
            .map(|(tp, qty)| (tp.price, qty))
            .collect();
        let price_tick = filters.price_tick;

        if entry_status == "FILLED" {
            tokio::spawn(async move {
                orchestrator
                    .run_exit_phase(
                        client,
                        monitor_job_id,
                        monitor_symbol,
                        monitor_side,
                        entry_order_id,
                        monitor_sl,
                        monitor_tps,
                        price_tick,
                    )
                    .await;
            });
        } else {
            tokio::spawn(async move {
                orchestrator
                    .run_entry_then_exit(
                        client,
                        monitor_job_id,
                        monitor_symbol,
                        monitor_side,
                        entry_order_id,
                        monitor_sl,
                        monitor_tps,
                        price_tick,
                    )
                    .await;
            });
        }

        info!(job_id = %job_id, %symbol, "bracket order entry placed");
        ToolResponse::ok(json!({
            "job_id": job_id,
            "entry_order_id": entry_order_id,
            "symbol": symbol,
        }))
        .with_job_id(job_id)
        .with_raw(entry_result.body)
    }

    /// Phase 1: poll the entry order until it fills, is cancelled/expired,
    /// or the wall-clock cap elapses.
    #[allow(clippy::too_many_arguments)]
    async fn run_entry_then_exit(
        self: Arc<Self>,
        client: Arc<FuturesClient>,
        job_id: String,
        symbol: String,
        side: Side,
        entry_order_id: i64,
        stop_loss_price: Decimal,
        take_profits: Vec<(Decimal, Decimal)>,
        price_tick: Decimal,
    ) {
        let start = Instant::now();
        loop {
            if let Some(job) = self.registry.get(&job_id) {
                if job.cancel_flag.is_cancelled() {
                    return;
                }
            } else {
                return;
            }

            if start.elapsed() > MAX_ENTRY_WAIT {
                self.registry.update(&job_id, |j| {
                    j.phase = BracketPhase::Error;
                    j.error_message = Some("entry order did not fill within 1 hour".to_string());
                });
                warn!(%job_id, "bracket entry wait timed out");
                return;
            }

            let params = vec![
                ("symbol".to_string(), symbol.clone()),
                ("orderId".to_string(), entry_order_id.to_string()),
            ];
            let result = client.signed_request(Method::GET, "/fapi/v1/order", params).await;
            if result.success {
                let status = result.body.get("status").and_then(Value::as_str).unwrap_or("");
                if status == "FILLED" {
                    break;
                }
                if matches!(status, "CANCELED" | "CANCELLED" | "EXPIRED" | "REJECTED") {
                    self.registry.update(&job_id, |j| {
                        j.phase = BracketPhase::Error;
                        j.error_message = Some(format!("entry order ended in status {status}"));
                    });
                    return;
                }
            }

            tokio::time::sleep(POLL_INTERVAL).await;
        }

        self.run_exit_phase(
            client,
            job_id,
            symbol,
            side,
            entry_order_id,
            stop_loss_price,
            take_profits,
            price_tick,
        )
        .await;
    }

    /// Phase 2: place the exit group, then poll until one exit fills and
    /// cancel the rest (OCO emulation).
    #[allow(clippy::too_many_arguments)]
    async fn run_exit_phase(
        self: Arc<Self>,
        client: Arc<FuturesClient>,
        job_id: String,
        symbol: String,
        side: Side,
        _entry_order_id: i64,
        stop_loss_price: Decimal,
        take_profits: Vec<(Decimal, Decimal)>,
        price_tick: Decimal,
    ) {
        let exit_side = side.opposite();
        let mut exit_order_ids = Vec::new();

        let sl_price = floor_to_step(stop_loss_price, price_tick);
        let sl_params = vec![
            ("symbol".to_string(), symbol.clone()),
            ("side".to_string(), exit_side.as_str().to_string()),
            ("type".to_string(), OrderType::StopMarket.as_str().to_string()),
            ("stopPrice".to_string(), sl_price.to_string()),
            ("closePosition".to_string(), "false".to_string()),
            ("reduceOnly".to_string(), "true".to_string()),
        ];
        let mut sl_full_params = sl_params.clone();
        let total_qty: Decimal = take_profits.iter().map(|(_, q)| *q).sum();
        sl_full_params.push(("quantity".to_string(), total_qty.to_string()));

        if total_qty > Decimal::ZERO {
            let result = client
                .signed_request(Method::POST, "/fapi/v1/order", sl_full_params)
                .await;
            if result.success {
                if let Some(id) = result.body.get("orderId").and_then(Value::as_i64) {
                    exit_order_ids.push(id);
                }
            }
        }

        for (tp_price, qty) in &take_profits {
            if *qty <= Decimal::ZERO {
                continue;
            }
            let tp_price = floor_to_step(*tp_price, price_tick);
            let params = vec![
                ("symbol".to_string(), symbol.clone()),
                ("side".to_string(), exit_side.as_str().to_string()),
                (
                    "type".to_string(),
                    OrderType::TakeProfitMarket.as_str().to_string(),
                ),
                ("stopPrice".to_string(), tp_price.to_string()),
                ("quantity".to_string(), qty.to_string()),
                ("reduceOnly".to_string(), "true".to_string()),
            ];
            let result = client.signed_request(Method::POST, "/fapi/v1/order", params).await;
            if result.success {
                if let Some(id) = result.body.get("orderId").and_then(Value::as_i64) {
                    exit_order_ids.push(id);
                }
            }
        }

        self.registry.update(&job_id, |j| {
            j.exit_order_ids = exit_order_ids.clone();
            j.phase = BracketPhase::MonitoringExits;
        });

        loop {
            let job = match self.registry.get(&job_id) {
                Some(j) => j,
                None => return,
            };
            if job.cancel_flag.is_cancelled() {
                return;
            }

            for &order_id in &exit_order_ids {
                let params = vec![
                    ("symbol".to_string(), symbol.clone()),
                    ("orderId".to_string(), order_id.to_string()),
                ];
                let result = client.signed_request(Method::GET, "/fapi/v1/order", params).await;
                if result.success {
                    let status = result.body.get("status").and_then(Value::as_str).unwrap_or("");
                    if status == "FILLED" {
                        self.registry.update(&job_id, |j| {
                            j.phase = BracketPhase::Completed;
                            j.filled_exit_order_id = Some(order_id);
                        });
                        cancel_remaining(&client, &symbol, &exit_order_ids, order_id).await;
                        info!(%job_id, filled_order_id = order_id, "bracket exit filled, OCO group closed");
                        return;
                    }
                }
            }

            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }
}

impl Default for BracketOrchestrator {
    fn default() -> Self {
        Self::new()
    }
}

async fn cancel_remaining(client: &FuturesClient, symbol: &str, all: &[i64], filled: i64) {
    for &order_id in all {
        if order_id == filled {
            continue;
        }
        let params = vec![
            ("symbol".to_string(), symbol.to_string()),
            ("orderId".to_string(), order_id.to_string()),
        ];
        let _ = client.signed_request(Method::DELETE, "/fapi/v1/order", params).await;
    }
}

/// Splits `total_qty` across take-profit legs: explicit `quantity` wins,
/// otherwise `percentage` of `total_qty`, and if the last leg specifies
/// neither it absorbs whatever remains — rounded down to `qty_step`.
fn split_exit_quantities(
    take_profits: &[TakeProfitSpec],
    total_qty: Decimal,
    qty_step: Decimal,
) -> Vec<Decimal> {
    let mut allocated = Decimal::ZERO;
    let mut result = Vec::with_capacity(take_profits.len());

    for (i, tp) in take_profits.iter().enumerate() {
        let is_last = i == take_profits.len() - 1;
        let qty = if let Some(q) = tp.quantity {
            floor_to_step(q, qty_step)
        } else if let Some(pct) = tp.percentage {
            floor_to_step(total_qty * pct / Decimal::ONE_HUNDRED, qty_step)
        } else if is_last {
            floor_to_step(total_qty - allocated, qty_step)
        } else {
            Decimal::ZERO
        };
        allocated += qty;
        result.push(qty.max(Decimal::ZERO));
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn splits_explicit_quantities() {
        let tps = vec![
            TakeProfitSpec {
                price: dec!(51000),
                quantity: Some(dec!(0.5)),
                percentage: None,
            },
            TakeProfitSpec {
                price: dec!(52000),
                quantity: Some(dec!(0.5)),
                percentage: None,
            },
        ];
        let qtys = split_exit_quantities(&tps, dec!(1.0), dec!(0.001));
        assert_eq!(qtys, vec![dec!(0.5), dec!(0.5)]);
    }

    #[test]
    fn last_leg_absorbs_remainder() {
        let tps = vec![
            TakeProfitSpec {
                price: dec!(51000),
                quantity: Some(dec!(0.3)),
                percentage: None,
            },
            TakeProfitSpec {
                price: dec!(52000),
                quantity: None,
                percentage: None,
            },
        ];
        let qtys = split_exit_quantities(&tps, dec!(1.0), dec!(0.001));
        assert_eq!(qtys[0], dec!(0.3));
        assert_eq!(qtys[1], dec!(0.7));
    }

    #[test]
    fn percentage_legs_split_total() {
        let tps = vec![
            TakeProfitSpec {
                price: dec!(51000),
                quantity: None,
                percentage: Some(dec!(50)),
            },
            TakeProfitSpec {
                price: dec!(52000),
                quantity: None,
                percentage: Some(dec!(50)),
            },
        ];
        let qtys = split_exit_quantities(&tps, dec!(2.0), dec!(0.001));
        assert_eq!(qtys[0], dec!(1.0));
        assert_eq!(qtys[1], dec!(1.0));
    }
}
