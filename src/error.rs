//! Error taxonomy surfaced in every tool's result envelope (`spec.md` §7).
//!
//! Individual tools never throw to callers — they return an
//! [`crate::envelope::ToolResponse`] carrying one of these kinds. Orchestrator
//! workers never propagate panics beyond themselves either; they set the
//! job's terminal status to `error` with the message (see
//! `orchestrator::bracket` / `orchestrator::ttl`).

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    ValidationError,
    ApiError,
    OrderNotFound,
    InvalidOrderType,
    PositionExists,
    CancelFailed,
    EntryFailed,
    CannotCancel,
    NotFound,
    DataError,
    RetryExhausted,
    ToolError,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::ValidationError => "validation_error",
            ErrorKind::ApiError => "api_error",
            ErrorKind::OrderNotFound => "order_not_found",
            ErrorKind::InvalidOrderType => "invalid_order_type",
            ErrorKind::PositionExists => "position_exists",
            ErrorKind::CancelFailed => "cancel_failed",
            ErrorKind::EntryFailed => "entry_failed",
            ErrorKind::CannotCancel => "cannot_cancel",
            ErrorKind::NotFound => "not_found",
            ErrorKind::DataError => "data_error",
            ErrorKind::RetryExhausted => "retry_exhausted",
            ErrorKind::ToolError => "tool_error",
        }
    }
}

/// Structured error body attached to a failed [`crate::envelope::ToolResponse`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolError {
    #[serde(rename = "type")]
    pub kind: ErrorKind,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ToolError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ValidationError, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, message)
    }

    pub fn tool_error(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ToolError, message)
    }
}

impl std::fmt::Display for ToolError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.kind.as_str(), self.message)
    }
}

impl std::error::Error for ToolError {}

/// Exchange error code carried through from a non-200 response
/// (`spec.md` §4.1/§7). Negative transport codes (`-1001`, `-1002`, `-1`)
/// are synthesized by the signed client itself; positive/other negative
/// codes pass through from Binance unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExchangeErrorCode(pub i64);

impl ExchangeErrorCode {
    pub const TIMEOUT: ExchangeErrorCode = ExchangeErrorCode(-1001);
    pub const CONNECTION: ExchangeErrorCode = ExchangeErrorCode(-1002);
    pub const OTHER_TRANSPORT: ExchangeErrorCode = ExchangeErrorCode(-1);
    pub const TIMESTAMP_OUT_OF_WINDOW: ExchangeErrorCode = ExchangeErrorCode(-1021);
    pub const ORDER_NOT_FOUND: ExchangeErrorCode = ExchangeErrorCode(-2011);
    pub const INVALID_ORDER_TYPE: ExchangeErrorCode = ExchangeErrorCode(-4141);
    pub const LEVERAGE_NOT_CHANGED: ExchangeErrorCode = ExchangeErrorCode(-4046);
    pub const MARGIN_TYPE_POSITION_EXISTS: ExchangeErrorCode = ExchangeErrorCode(-4048);
    pub const RATE_LIMIT: ExchangeErrorCode = ExchangeErrorCode(-1003);
    pub const TOO_MANY_REQUESTS_WEIGHT: ExchangeErrorCode = ExchangeErrorCode(-1015);
    pub const HTTP_TOO_MANY_REQUESTS: ExchangeErrorCode = ExchangeErrorCode(429);
}

pub fn kind_for_exchange_code(code: i64) -> ErrorKind {
    if code == ExchangeErrorCode::ORDER_NOT_FOUND.0 {
        ErrorKind::OrderNotFound
    } else if code == ExchangeErrorCode::INVALID_ORDER_TYPE.0 {
        ErrorKind::InvalidOrderType
    } else if code == ExchangeErrorCode::MARGIN_TYPE_POSITION_EXISTS.0 {
        ErrorKind::PositionExists
    } else {
        ErrorKind::ApiError
    }
}
