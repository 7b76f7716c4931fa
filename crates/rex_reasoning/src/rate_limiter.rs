//! Sliding-window + minimum-interval call gate, shared by the remote and
//! local think-cycle backends with different constructor arguments.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

pub struct RateLimiter {
    max_calls_per_window: usize,
    window: Duration,
    min_interval: Duration,
    calls: VecDeque<Instant>,
    last_call: Option<Instant>,
}

impl RateLimiter {
    pub fn new(max_calls_per_window: usize, window_seconds: u64, min_interval_seconds: f64) -> Self {
        Self {
            max_calls_per_window,
            window: Duration::from_secs(window_seconds),
            min_interval: Duration::from_secs_f64(min_interval_seconds),
            calls: VecDeque::new(),
            last_call: None,
        }
    }

    /// The remote backend's default: 5 calls per 60s, 30s minimum interval.
    pub fn for_remote() -> Self {
        Self::new(5, 60, 30.0)
    }

    /// The local backend's default: less restrictive, no external cost.
    pub fn for_local() -> Self {
        Self::new(30, 60, 5.0)
    }

    fn prune(&mut self, now: Instant) {
        while let Some(&front) = self.calls.front() {
            if now.duration_since(front) > self.window {
                self.calls.pop_front();
            } else {
                break;
            }
        }
    }

    pub fn may_call(&mut self) -> bool {
        let now = Instant::now();
        self.prune(now);

        let interval_ok = self
            .last_call
            .map(|last| now.duration_since(last) >= self.min_interval)
            .unwrap_or(true);
        let window_ok = self.calls.len() < self.max_calls_per_window;

        interval_ok && window_ok
    }

    pub fn record(&mut self) {
        let now = Instant::now();
        self.calls.push_back(now);
        self.last_call = Some(now);
    }

    /// Seconds until `may_call()` would next return true, assuming no
    /// further calls are recorded in the meantime.
    pub fn wait_time(&mut self) -> f64 {
        let now = Instant::now();
        self.prune(now);

        let interval_wait = self
            .last_call
            .map(|last| {
                let elapsed = now.duration_since(last);
                if elapsed >= self.min_interval {
                    0.0
                } else {
                    (self.min_interval - elapsed).as_secs_f64()
                }
            })
            .unwrap_or(0.0);

        let window_wait = if self.calls.len() < self.max_calls_per_window {
            0.0
        } else {
            self.calls
                .front()
                .map(|&oldest| {
                    let remaining = self.window.saturating_sub(now.duration_since(oldest));
                    remaining.as_secs_f64()
                })
                .unwrap_or(0.0)
        };

        interval_wait.max(window_wait)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allows_first_call_immediately() {
        let mut limiter = RateLimiter::new(5, 60, 0.0);
        assert!(limiter.may_call());
    }

    #[test]
    fn min_interval_blocks_rapid_successive_calls() {
        let mut limiter = RateLimiter::new(100, 60, 10.0);
        assert!(limiter.may_call());
        limiter.record();
        assert!(!limiter.may_call());
        assert!(limiter.wait_time() > 0.0);
    }

    #[test]
    fn window_limit_blocks_after_max_calls() {
        let mut limiter = RateLimiter::new(2, 60, 0.0);
        limiter.record();
        limiter.record();
        assert!(!limiter.may_call());
    }

    #[test]
    fn rate_limit_honored_across_two_back_to_back_attempts() {
        let mut limiter = RateLimiter::new(1, 60, 30.0);
        assert!(limiter.may_call());
        limiter.record();
        assert!(!limiter.may_call());
    }
}
