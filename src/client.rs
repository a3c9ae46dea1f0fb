//! Signed REST client for Binance USDⓈ-M futures (`spec.md` §4.1).
//!
//! Mirrors the original Python `FuturesClient`: every private endpoint is
//! signed with HMAC-SHA256 over the url-encoded query string, `recvWindow`
//! is attached to every signed request, and a `-1021` ("Timestamp for this
//! request is outside of the recvWindow") response triggers exactly one
//! clock resync against `/fapi/v1/time` followed by one retry.

use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Duration;

use hmac::{Hmac, Mac};
use reqwest::Method;
use serde_json::Value;
use sha2::Sha256;
use tracing::{debug, warn};

use crate::config::FuturesConfig;
use crate::error::ExchangeErrorCode;

type HmacSha256 = Hmac<Sha256>;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);
const TIME_ENDPOINT_TIMEOUT: Duration = Duration::from_secs(5);

/// Result of a single REST call: the parsed JSON body (success or exchange
/// error payload) plus whether the HTTP/exchange layer considers it a
/// success. Tool wrappers translate this into a [`crate::envelope::ToolResponse`].
#[derive(Debug, Clone)]
pub struct ApiResult {
    pub success: bool,
    pub body: Value,
    /// Negative Binance error code, or a synthesized transport code
    /// (`-1001`/`-1002`/`-1`) when the exchange was never reached.
    pub error_code: Option<i64>,
    pub error_msg: Option<String>,
}

impl ApiResult {
    fn ok(body: Value) -> Self {
        Self {
            success: true,
            body,
            error_code: None,
            error_msg: None,
        }
    }

    fn exchange_err(code: i64, msg: String, body: Value) -> Self {
        Self {
            success: false,
            body,
            error_code: Some(code),
            error_msg: Some(msg),
        }
    }

    fn transport_err(code: ExchangeErrorCode, msg: impl Into<String>) -> Self {
        Self {
            success: false,
            body: Value::Null,
            error_code: Some(code.0),
            error_msg: Some(msg.into()),
        }
    }
}

/// Signed REST client. One instance is shared (behind an `Arc`) across all
/// tool calls for a process; `clock_offset_ms` is the only mutable state
/// and is updated lock-free.
pub struct FuturesClient {
    config: FuturesConfig,
    http: reqwest::Client,
    /// server_time - local_time, in milliseconds. Added to every signed
    /// request's timestamp so the server sees a time inside its recvWindow
    /// even when the local clock drifts.
    clock_offset_ms: AtomicI64,
}

impl FuturesClient {
    pub fn new(config: FuturesConfig) -> Self {
        let http = reqwest::Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .build()
            .expect("reqwest client builds with default TLS backend");

        Self {
            config,
            http,
            clock_offset_ms: AtomicI64::new(0),
        }
    }

    pub fn config(&self) -> &FuturesConfig {
        &self.config
    }

    fn timestamp_ms(&self) -> i64 {
        let now = chrono::Utc::now().timestamp_millis();
        now + self.clock_offset_ms.load(Ordering::Relaxed)
    }

    /// Resync `clock_offset_ms` against `/fapi/v1/time`. Best-effort: a
    /// failure here just leaves the previous offset in place.
    pub async fn sync_server_time(&self) -> anyhow::Result<()> {
        let url = format!("{}/fapi/v1/time", self.config.rest_base_url());
        let local_before = chrono::Utc::now().timestamp_millis();
        let resp = self
            .http
            .get(&url)
            .timeout(TIME_ENDPOINT_TIMEOUT)
            .send()
            .await?;
        let body: Value = resp.json().await?;
        let server_time = body
            .get("serverTime")
            .and_then(Value::as_i64)
            .ok_or_else(|| anyhow::anyhow!("missing serverTime in response"))?;
        let local_after = chrono::Utc::now().timestamp_millis();
        let local_mid = (local_before + local_after) / 2;
        let offset = server_time - local_mid;
        self.clock_offset_ms.store(offset, Ordering::Relaxed);
        debug!(offset_ms = offset, "resynced clock against server time");
        Ok(())
    }

    fn sign(&self, query: &str) -> String {
        let mut mac = HmacSha256::new_from_slice(self.config.api_secret.as_bytes())
            .expect("HMAC accepts a key of any length");
        mac.update(query.as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }

    /// Build the final, signed query string for a private request: sorted
    /// insertion order is preserved (Binance does not require alphabetical
    /// sorting), `timestamp` and `recvWindow` are appended, then `signature`
    /// is appended last.
    fn build_signed_query(&self, params: &[(String, String)]) -> String {
        let mut pairs = params.to_vec();
        pairs.push(("timestamp".to_string(), self.timestamp_ms().to_string()));
        pairs.push((
            "recvWindow".to_string(),
            self.config.recv_window_ms.to_string(),
        ));

        let query = serde_urlencoded::to_string(&pairs).expect("param values are valid utf-8");
        let signature = self.sign(&query);
        format!("{query}&signature={signature}")
    }

    /// Issue a signed request against a private futures endpoint.
    /// `params` are the business parameters only — timestamp/recvWindow/
    /// signature are added here.
    pub async fn signed_request(
        &self,
        method: Method,
        path: &str,
        params: Vec<(String, String)>,
    ) -> ApiResult {
        self.signed_request_inner(method, path, params, true).await
    }

    async fn signed_request_inner(
        &self,
        method: Method,
        path: &str,
        params: Vec<(String, String)>,
        allow_resync_retry: bool,
    ) -> ApiResult {
        let query = self.build_signed_query(&params);
        let url = format!("{}{}?{}", self.config.rest_base_url(), path, query);

        let req = self
            .http
            .request(method.clone(), &url)
            .header("X-MBX-APIKEY", &self.config.api_key)
            .timeout(DEFAULT_TIMEOUT);

        let resp = match req.send().await {
            Ok(r) => r,
            Err(e) => return self.transport_error(e),
        };

        let status = resp.status();
        let body: Value = match resp.json().await {
            Ok(v) => v,
            Err(e) => return ApiResult::transport_err(ExchangeErrorCode::OTHER_TRANSPORT, e.to_string()),
        };

        if status.is_success() {
            return ApiResult::ok(body);
        }

        let code = body.get("code").and_then(Value::as_i64).unwrap_or(-1);
        let msg = body
            .get("msg")
            .and_then(Value::as_str)
            .unwrap_or("unknown exchange error")
            .to_string();

        if code == ExchangeErrorCode::TIMESTAMP_OUT_OF_WINDOW.0 && allow_resync_retry {
            warn!("timestamp outside recvWindow, resyncing clock and retrying once");
            if self.sync_server_time().await.is_ok() {
                return Box::pin(self.signed_request_inner(method, path, params, false)).await;
            }
        }

        ApiResult::exchange_err(code, msg, body)
    }

    /// Issue an unsigned request against a public futures endpoint
    /// (e.g. `/fapi/v1/exchangeInfo`, `/fapi/v1/depth`).
    pub async fn public_request(
        &self,
        method: Method,
        path: &str,
        params: Vec<(String, String)>,
    ) -> ApiResult {
        let url = if params.is_empty() {
            format!("{}{}", self.config.rest_base_url(), path)
        } else {
            let query = serde_urlencoded::to_string(&params).expect("param values are valid utf-8");
            format!("{}{}?{}", self.config.rest_base_url(), path, query)
        };

        let resp = match self
            .http
            .request(method, &url)
            .timeout(DEFAULT_TIMEOUT)
            .send()
            .await
        {
            Ok(r) => r,
            Err(e) => return self.transport_error(e),
        };

        let status = resp.status();
        let body: Value = match resp.json().await {
            Ok(v) => v,
            Err(e) => return ApiResult::transport_err(ExchangeErrorCode::OTHER_TRANSPORT, e.to_string()),
        };

        if status.is_success() {
            ApiResult::ok(body)
        } else {
            let code = body.get("code").and_then(Value::as_i64).unwrap_or(-1);
            let msg = body
                .get("msg")
                .and_then(Value::as_str)
                .unwrap_or("unknown exchange error")
                .to_string();
            ApiResult::exchange_err(code, msg, body)
        }
    }

    fn transport_error(&self, e: reqwest::Error) -> ApiResult {
        if e.is_timeout() {
            ApiResult::transport_err(ExchangeErrorCode::TIMEOUT, e.to_string())
        } else if e.is_connect() {
            ApiResult::transport_err(ExchangeErrorCode::CONNECTION, e.to_string())
        } else {
            ApiResult::transport_err(ExchangeErrorCode::OTHER_TRANSPORT, e.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Network;

    fn test_config() -> FuturesConfig {
        FuturesConfig {
            api_key: "test-key".to_string(),
            api_secret: "test-secret".to_string(),
            network: Network::Testnet,
            recv_window_ms: 5000,
        }
    }

    #[test]
    fn signature_is_deterministic_hex() {
        let client = FuturesClient::new(test_config());
        let sig1 = client.sign("symbol=BTCUSDT&side=BUY");
        let sig2 = client.sign("symbol=BTCUSDT&side=BUY");
        assert_eq!(sig1, sig2);
        assert_eq!(sig1.len(), 64);
        assert!(sig1.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn signed_query_appends_timestamp_recvwindow_and_signature() {
        let client = FuturesClient::new(test_config());
        let query = client.build_signed_query(&[("symbol".to_string(), "BTCUSDT".to_string())]);
        assert!(query.contains("symbol=BTCUSDT"));
        assert!(query.contains("timestamp="));
        assert!(query.contains("recvWindow=5000"));
        assert!(query.contains("&signature="));
    }

    #[test]
    fn clock_offset_shifts_timestamp() {
        let client = FuturesClient::new(test_config());
        let before = client.timestamp_ms();
        client.clock_offset_ms.store(10_000, Ordering::Relaxed);
        let after = client.timestamp_ms();
        assert!(after - before >= 9_000);
    }
}
