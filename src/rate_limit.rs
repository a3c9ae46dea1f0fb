//! Request-weight rate limiter (`spec.md` §4.8), grounded on the teacher's
//! sliding-window limiter in `middleware/rate_limit.rs` but switched from a
//! per-IP counter to a single process-wide sliding window over outbound
//! Binance requests (matches the original Python `RateLimitTracker`).

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tokio::time::sleep;

const DEFAULT_MAX_REQUESTS: u32 = 1200;
const DEFAULT_WINDOW: Duration = Duration::from_secs(60);

struct Window {
    timestamps: VecDeque<Instant>,
}

/// Tracks outbound request timestamps in a sliding window and makes
/// callers wait when the window is saturated, rather than rejecting them
/// outright — matches the original's `wait_if_needed`.
pub struct RateLimitTracker {
    max_requests: u32,
    window: Duration,
    state: Mutex<Window>,
}

impl RateLimitTracker {
    pub fn new(max_requests: u32, window: Duration) -> Self {
        Self {
            max_requests,
            window,
            state: Mutex::new(Window {
                timestamps: VecDeque::new(),
            }),
        }
    }

    fn prune(&self, state: &mut Window, now: Instant) {
        while let Some(front) = state.timestamps.front() {
            if now.duration_since(*front) > self.window {
                state.timestamps.pop_front();
            } else {
                break;
            }
        }
    }

    /// Returns true if a request can be made right now without waiting.
    pub fn can_make_request(&self) -> bool {
        let mut state = self.state.lock();
        let now = Instant::now();
        self.prune(&mut state, now);
        (state.timestamps.len() as u32) < self.max_requests
    }

    pub fn record_request(&self) {
        let mut state = self.state.lock();
        let now = Instant::now();
        self.prune(&mut state, now);
        state.timestamps.push_back(now);
    }

    /// Block (async) until a request slot is free, then record it. No lock
    /// is held across the `sleep` — only across the short bookkeeping
    /// sections (`spec.md` §5).
    pub async fn wait_if_needed(&self) {
        loop {
            let wait = {
                let mut state = self.state.lock();
                let now = Instant::now();
                self.prune(&mut state, now);
                if (state.timestamps.len() as u32) < self.max_requests {
                    state.timestamps.push_back(now);
                    return;
                }
                let oldest = *state.timestamps.front().expect("window is full, non-empty");
                self.window.saturating_sub(now.duration_since(oldest))
            };
            sleep(wait).await;
        }
    }
}

impl Default for RateLimitTracker {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_REQUESTS, DEFAULT_WINDOW)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allows_requests_under_cap() {
        let tracker = RateLimitTracker::new(3, Duration::from_secs(60));
        assert!(tracker.can_make_request());
        tracker.record_request();
        tracker.record_request();
        tracker.record_request();
        assert!(!tracker.can_make_request());
    }

    #[tokio::test]
    async fn wait_if_needed_returns_immediately_under_cap() {
        let tracker = RateLimitTracker::new(5, Duration::from_secs(60));
        tracker.wait_if_needed().await;
        assert_eq!(tracker.state.lock().timestamps.len(), 1);
    }
}
