//! Adaptive retry with exponential backoff and jitter (`spec.md` §4.8),
//! grounded on the original Python `RetryConfig`/`calculate_backoff_delay`.

use std::time::Duration;

use rand::Rng;

#[derive(Debug, Clone, Copy)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    pub jitter_factor: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay_ms: 1000,
            max_delay_ms: 30_000,
            jitter_factor: 0.3,
        }
    }
}

/// Exchange error codes this wrapper treats as retryable
/// (`spec.md` §4.8): rate-limit and request-weight codes, plus the raw
/// HTTP 429.
pub const RETRY_CODES: [i64; 3] = [-1003, -1015, 429];

pub fn is_retryable_code(code: i64) -> bool {
    RETRY_CODES.contains(&code)
}

/// `base * 2^attempt`, capped at `max_delay_ms`, with up to
/// `±jitter_factor` of random jitter applied multiplicatively.
pub fn calculate_backoff_delay(config: &RetryConfig, attempt: u32) -> Duration {
    let exp = config.base_delay_ms.saturating_mul(1u64 << attempt.min(20));
    let capped = exp.min(config.max_delay_ms) as f64;

    let mut rng = rand::thread_rng();
    let jitter = rng.gen_range(-config.jitter_factor..=config.jitter_factor);
    let delayed = (capped * (1.0 + jitter)).max(0.0);
    Duration::from_millis(delayed as u64)
}

/// Runs `f` up to `config.max_retries + 1` times. `f` returns `Ok(T)` on
/// success or `Err((retryable, message))`; a non-retryable error aborts
/// immediately, a retryable one backs off and tries again until the
/// attempt budget is exhausted.
pub async fn with_retry<T, F, Fut>(config: &RetryConfig, mut f: F) -> Result<T, String>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, (bool, String)>>,
{
    let mut attempt = 0;
    loop {
        match f().await {
            Ok(v) => return Ok(v),
            Err((retryable, msg)) => {
                if !retryable || attempt >= config.max_retries {
                    return Err(msg);
                }
                let delay = calculate_backoff_delay(config, attempt);
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retry_codes_match_spec() {
        assert!(is_retryable_code(-1003));
        assert!(is_retryable_code(-1015));
        assert!(is_retryable_code(429));
        assert!(!is_retryable_code(-2011));
    }

    #[test]
    fn backoff_is_capped() {
        let config = RetryConfig::default();
        let delay = calculate_backoff_delay(&config, 10);
        let max_with_jitter = (config.max_delay_ms as f64 * (1.0 + config.jitter_factor)) as u64;
        assert!(delay.as_millis() as u64 <= max_with_jitter);
    }

    #[tokio::test]
    async fn stops_on_non_retryable_error() {
        let config = RetryConfig::default();
        let mut calls = 0;
        let result: Result<(), String> = with_retry(&config, || {
            calls += 1;
            async { Err((false, "bad request".to_string())) }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls, 1);
    }

    #[tokio::test]
    async fn exhausts_retries_on_retryable_error() {
        let config = RetryConfig {
            max_retries: 2,
            base_delay_ms: 1,
            max_delay_ms: 2,
            jitter_factor: 0.0,
        };
        let mut calls = 0;
        let result: Result<(), String> = with_retry(&config, || {
            calls += 1;
            async { Err((true, "rate limited".to_string())) }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls, 3);
    }
}
