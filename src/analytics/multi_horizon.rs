//! Multi-horizon fill probability kernel (`spec.md` §4.9).
//!
//! Extends the single-horizon exponential queue model in
//! [`super::queue_fill`] across several time horizons at once, using a
//! Poisson arrival model for the number of consuming trades and a
//! normal approximation once the expected count is large enough for the
//! Poisson/normal gap to stop mattering (`> 30` events).

use serde::{Deserialize, Serialize};

const NORMAL_APPROX_THRESHOLD: f64 = 30.0;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HorizonEstimate {
    pub horizon_seconds: u32,
    pub fill_probability: f64,
    pub model: &'static str,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MultiHorizonSummary {
    pub queue_ahead: f64,
    pub consumption_rate_per_sec: f64,
    pub horizons: Vec<HorizonEstimate>,
}

/// `analyze_multi_horizon_fill` (`spec.md` §4.9): evaluates fill
/// probability at each of `horizons_seconds` given a queue position and a
/// trade-consumption rate (trades/sec and mean trade size feed a Poisson
/// volume model).
pub fn analyze_multi_horizon(
    queue_ahead: f64,
    trades_per_sec: f64,
    mean_trade_size: f64,
    horizons_seconds: &[u32],
) -> MultiHorizonSummary {
    let horizons = horizons_seconds
        .iter()
        .map(|&h| estimate_horizon(queue_ahead, trades_per_sec, mean_trade_size, h))
        .collect();

    MultiHorizonSummary {
        queue_ahead,
        consumption_rate_per_sec: trades_per_sec * mean_trade_size,
        horizons,
    }
}

fn estimate_horizon(
    queue_ahead: f64,
    trades_per_sec: f64,
    mean_trade_size: f64,
    horizon_seconds: u32,
) -> HorizonEstimate {
    if queue_ahead <= 0.0 {
        return HorizonEstimate {
            horizon_seconds,
            fill_probability: 1.0,
            model: "trivial",
        };
    }
    if trades_per_sec <= 0.0 || mean_trade_size <= 0.0 {
        return HorizonEstimate {
            horizon_seconds,
            fill_probability: 0.0,
            model: "trivial",
        };
    }

    // Expected number of consuming trades in the horizon.
    let lambda = trades_per_sec * horizon_seconds as f64;
    // Volume needed to clear the queue, expressed in units of trades.
    let trades_needed = queue_ahead / mean_trade_size;

    if lambda <= NORMAL_APPROX_THRESHOLD {
        HorizonEstimate {
            horizon_seconds,
            fill_probability: poisson_at_least(lambda, trades_needed),
            model: "poisson",
        }
    } else {
        HorizonEstimate {
            horizon_seconds,
            fill_probability: normal_approx_at_least(lambda, trades_needed),
            model: "normal_approx",
        }
    }
}

/// `P(N >= k)` for `N ~ Poisson(lambda)`, via the complement of the CDF.
fn poisson_at_least(lambda: f64, k: f64) -> f64 {
    let k_ceil = k.ceil().max(0.0) as u64;
    if k_ceil == 0 {
        return 1.0;
    }
    let mut cdf = 0.0;
    let mut term = (-lambda).exp();
    cdf += term;
    for i in 1..k_ceil {
        term *= lambda / i as f64;
        cdf += term;
    }
    (1.0 - cdf).clamp(0.0, 1.0)
}

/// Normal approximation to `P(N >= k)` for large `lambda`, with a
/// continuity correction.
fn normal_approx_at_least(lambda: f64, k: f64) -> f64 {
    let sigma = lambda.sqrt();
    if sigma == 0.0 {
        return if lambda >= k { 1.0 } else { 0.0 };
    }
    let z = (k - 0.5 - lambda) / sigma;
    (1.0 - standard_normal_cdf(z)).clamp(0.0, 1.0)
}

fn standard_normal_cdf(z: f64) -> f64 {
    0.5 * (1.0 + erf(z / std::f64::consts::SQRT_2))
}

/// Abramowitz-Stegun rational approximation to the error function.
fn erf(x: f64) -> f64 {
    let sign = if x < 0.0 { -1.0 } else { 1.0 };
    let x = x.abs();
    let a1 = 0.254829592;
    let a2 = -0.284496736;
    let a3 = 1.421413741;
    let a4 = -1.453152027;
    let a5 = 1.061405429;
    let p = 0.3275911;

    let t = 1.0 / (1.0 + p * x);
    let y = 1.0 - (((((a5 * t + a4) * t) + a3) * t + a2) * t + a1) * t * (-x * x).exp();
    sign * y
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_queue_is_always_filled() {
        let summary = analyze_multi_horizon(0.0, 2.0, 0.1, &[60, 300]);
        assert!(summary.horizons.iter().all(|h| h.fill_probability == 1.0));
    }

    #[test]
    fn longer_horizon_has_higher_fill_probability() {
        let summary = analyze_multi_horizon(5.0, 1.0, 0.5, &[30, 300]);
        assert!(summary.horizons[1].fill_probability >= summary.horizons[0].fill_probability);
    }

    #[test]
    fn switches_to_normal_approx_for_large_lambda() {
        let summary = analyze_multi_horizon(1000.0, 50.0, 0.1, &[3600]);
        assert_eq!(summary.horizons[0].model, "normal_approx");
    }
}
