//! TTL cancel orchestrator (`spec.md` §4.5): schedules a conditional
//! cancel of an order after a bounded wait, either blocking the caller or
//! running in the background and returning a job id.
//!
//! Grounded on the original Python `cancel_on_ttl.py`: `origClientOrderId`
//! is resolved to an order id once, up front; a pre-check short-circuits
//! to `no_action` if the order is already terminal; and the worker state
//! machine is `scheduled -> waiting -> executing -> (completed|error)`.

use std::sync::Arc;
use std::time::Duration;

use reqwest::Method;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::info;

use crate::client::FuturesClient;
use crate::config::normalize_symbol;
use crate::envelope::ToolResponse;
use crate::error::ToolError;
use crate::types::is_terminal_status;

use super::registry::{generate_job_id, CancelFlag, JobRegistry};

pub const MAX_TTL_SECONDS: u64 = 600;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TtlJobStatus {
    Scheduled,
    Waiting,
    Executing,
    Completed,
    Cancelled,
    Error,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TtlJob {
    pub job_id: String,
    pub symbol: String,
    pub order_id: i64,
    pub ttl_seconds: u64,
    pub status: TtlJobStatus,
    pub outcome: Option<String>,
    pub error_message: Option<String>,
    #[serde(skip)]
    pub cancel_flag: CancelFlag,
}

pub struct TtlOrchestrator {
    registry: Arc<JobRegistry<TtlJob>>,
}

impl TtlOrchestrator {
    pub fn new() -> Self {
        Self {
            registry: Arc::new(JobRegistry::new()),
        }
    }

    pub fn get_job(&self, job_id: &str) -> Option<TtlJob> {
        self.registry.get(job_id)
    }

    /// `get_ttl_job_status` (`spec.md` §4.5).
    pub fn get_job_status(&self, job_id: &str) -> ToolResponse<Value> {
        match self.registry.get(job_id) {
            Some(job) => ToolResponse::ok(serde_json::to_value(&job).unwrap()).with_job_id(job_id),
            None => ToolResponse::err(ToolError::not_found(format!("ttl job '{job_id}' not found"))),
        }
    }

    /// `cancel_ttl_job` (`spec.md` §4.5): only valid while the job is
    /// still `scheduled` or `waiting` — once the worker has moved to
    /// `executing` the cancel race has already started.
    pub fn cancel_ttl_job(&self, job_id: &str) -> ToolResponse<Value> {
        let job = match self.registry.get(job_id) {
            Some(j) => j,
            None => return ToolResponse::err(ToolError::not_found(format!("ttl job '{job_id}' not found"))),
        };

        if !matches!(job.status, TtlJobStatus::Scheduled | TtlJobStatus::Waiting) {
            return ToolResponse::err(ToolError::new(
                crate::error::ErrorKind::CannotCancel,
                format!("ttl job '{job_id}' is already {:?}", job.status),
            ));
        }

        job.cancel_flag.cancel();
        self.registry.update(job_id, |j| j.status = TtlJobStatus::Cancelled);
        ToolResponse::ok(json!({"job_id": job_id, "status": "cancelled"})).with_job_id(job_id)
    }

    /// `cancel_on_ttl` (`spec.md` §4.5).
    ///
    /// Resolves `order_id`/`orig_client_order_id` to a concrete order id,
    /// pre-checks terminal status (short-circuits to `no_action`), then
    /// either blocks for `ttl_seconds` and cancels inline, or spawns a
    /// background worker and returns immediately with a job id.
    pub async fn cancel_on_ttl(
        self: &Arc<Self>,
        client: Arc<FuturesClient>,
        symbol: &str,
        order_id: Option<i64>,
        orig_client_order_id: Option<&str>,
        ttl_seconds: u64,
        blocking: bool,
    ) -> ToolResponse<Value> {
        let symbol = match normalize_symbol(symbol) {
            Ok(s) => s,
            Err(e) => return ToolResponse::err(ToolError::validation(e)),
        };

        if ttl_seconds == 0 || ttl_seconds > MAX_TTL_SECONDS {
            return ToolResponse::err(ToolError::validation(format!(
                "ttl_seconds must be between 1 and {MAX_TTL_SECONDS}"
            )));
        }
        if order_id.is_none() && orig_client_order_id.is_none() {
            return ToolResponse::err(ToolError::validation(
                "either order_id or orig_client_order_id is required",
            ));
        }

        let resolved_order_id = match self
            .resolve_order_id(&client, &symbol, order_id, orig_client_order_id)
            .await
        {
            Ok(id) => id,
            Err(e) => return ToolResponse::err(e),
        };

        let status = self.fetch_status(&client, &symbol, resolved_order_id).await;
        if let Some(status) = &status {
            if is_terminal_status(status) {
                return ToolResponse::ok(json!({
                    "order_id": resolved_order_id,
                    "status": status,
                    "outcome": "no_action",
                    "reason": format!("order already in terminal status {status}"),
                }));
            }
        }

        let job_id = generate_job_id("ttl");
        let job = TtlJob {
            job_id: job_id.clone(),
            symbol: symbol.clone(),
            order_id: resolved_order_id,
            ttl_seconds,
            status: TtlJobStatus::Scheduled,
            outcome: None,
            error_message: None,
            cancel_flag: CancelFlag::new(),
        };
        self.registry.insert(job_id.clone(), job);

        if blocking {
            self.run_ttl_worker(Arc::clone(&client), job_id.clone()).await;
            let job = self.registry.get(&job_id);
            ToolResponse::ok(json!({
                "job_id": job_id,
                "order_id": resolved_order_id,
                "outcome": job.and_then(|j| j.outcome),
            }))
            .with_job_id(job_id)
        } else {
            let orchestrator = Arc::clone(self);
            let worker_job_id = job_id.clone();
            tokio::spawn(async move {
                orchestrator.run_ttl_worker(client, worker_job_id).await;
            });
            ToolResponse::ok(json!({
                "job_id": job_id,
                "order_id": resolved_order_id,
                "outcome": "scheduled",
            }))
            .with_job_id(job_id)
        }
    }

    async fn resolve_order_id(
        &self,
        client: &FuturesClient,
        symbol: &str,
        order_id: Option<i64>,
        orig_client_order_id: Option<&str>,
    ) -> Result<i64, ToolError> {
        if let Some(id) = order_id {
            return Ok(id);
        }
        let cid = orig_client_order_id.expect("validated by caller");
        let params = vec![
            ("symbol".to_string(), symbol.to_string()),
            ("origClientOrderId".to_string(), cid.to_string()),
        ];
        let result = client.signed_request(Method::GET, "/fapi/v1/order", params).await;
        if result.success {
            result
                .body
                .get("orderId")
                .and_then(Value::as_i64)
                .ok_or_else(|| ToolError::not_found("order lookup returned no orderId"))
        } else {
            Err(ToolError::not_found(format!(
                "could not resolve clientOrderId '{cid}': {}",
                result.error_msg.unwrap_or_default()
            )))
        }
    }

    async fn fetch_status(&self, client: &FuturesClient, symbol: &str, order_id: i64) -> Option<String> {
        let params = vec![
            ("symbol".to_string(), symbol.to_string()),
            ("orderId".to_string(), order_id.to_string()),
        ];
        let result = client.signed_request(Method::GET, "/fapi/v1/order", params).await;
        if result.success {
            result
                .body
                .get("status")
                .and_then(Value::as_str)
                .map(str::to_string)
        } else {
            None
        }
    }

    async fn run_ttl_worker(self: Arc<Self>, client: Arc<FuturesClient>, job_id: String) {
        self.registry.update(&job_id, |j| j.status = TtlJobStatus::Waiting);

        let job = match self.registry.get(&job_id) {
            Some(j) => j,
            None => return,
        };

        tokio::time::sleep(Duration::from_secs(job.ttl_seconds)).await;

        let job = match self.registry.get(&job_id) {
            Some(j) => j,
            None => return,
        };
        if job.cancel_flag.is_cancelled() {
            return;
        }

        self.registry.update(&job_id, |j| j.status = TtlJobStatus::Executing);

        let status = self.fetch_status(&client, &job.symbol, job.order_id).await;
        let should_cancel = status
            .as_deref()
            .map(|s| !is_terminal_status(s))
            .unwrap_or(false);

        if !should_cancel {
            self.registry.update(&job_id, |j| {
                j.status = TtlJobStatus::Completed;
                j.outcome = Some("no_action".to_string());
            });
            return;
        }

        let params = vec![
            ("symbol".to_string(), job.symbol.clone()),
            ("orderId".to_string(), job.order_id.to_string()),
        ];
        let result = client.signed_request(Method::DELETE, "/fapi/v1/order", params).await;

        if result.success {
            self.registry.update(&job_id, |j| {
                j.status = TtlJobStatus::Completed;
                j.outcome = Some("cancelled".to_string());
            });
            info!(%job_id, order_id = job.order_id, "ttl cancel executed");
        } else {
            self.registry.update(&job_id, |j| {
                j.status = TtlJobStatus::Error;
                j.error_message = result.error_msg.clone();
            });
        }
    }
}

impl Default for TtlOrchestrator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ttl_seconds_bounds() {
        assert!(MAX_TTL_SECONDS == 600);
    }
}
