//! Uniform tool result envelope (`spec.md` §6).
//!
//! Every tool in this crate returns a [`ToolResponse`]. Orchestrator tools
//! additionally stamp a `job_id`; analytic tools stamp `_cache_hit`,
//! `ts_ms`, and an optional, capped `quality_flags` list.

use serde::{Deserialize, Serialize};

use crate::error::ToolError;

fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

const MAX_QUALITY_FLAGS: usize = 6;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResponse<T: Serialize> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ToolError>,
    pub timestamp: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw_response: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub _cache_hit: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ts_ms: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quality_flags: Option<Vec<String>>,
}

impl<T: Serialize> ToolResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            timestamp: now_ms(),
            raw_response: None,
            job_id: None,
            _cache_hit: None,
            ts_ms: None,
            quality_flags: None,
        }
    }

    pub fn err(error: ToolError) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error),
            timestamp: now_ms(),
            raw_response: None,
            job_id: None,
            _cache_hit: None,
            ts_ms: None,
            quality_flags: None,
        }
    }

    pub fn with_job_id(mut self, job_id: impl Into<String>) -> Self {
        self.job_id = Some(job_id.into());
        self
    }

    pub fn with_raw(mut self, raw: serde_json::Value) -> Self {
        self.raw_response = Some(raw);
        self
    }

    pub fn with_cache_hit(mut self, hit: bool) -> Self {
        self._cache_hit = Some(hit);
        self.ts_ms = Some(now_ms());
        self
    }

    /// Attach quality flags, capped at 6 entries per `spec.md` §6.
    pub fn with_quality_flags(mut self, mut flags: Vec<String>) -> Self {
        flags.truncate(MAX_QUALITY_FLAGS);
        self.quality_flags = Some(flags);
        self
    }
}
