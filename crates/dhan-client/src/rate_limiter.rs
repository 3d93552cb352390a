//! Sliding-window rate limiter for broker calls.
//!
//! The broker caps calls per second across the whole account, so one
//! limiter is shared by interactive placement, bulk workers and the
//! deferred poller.

use crate::config::RateLimitConfig;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

/// Sliding-window limiter: at most `max_calls` acquisitions per `window`.
pub struct RateLimiter {
    max_calls: usize,
    window: Duration,
    /// Acquisition times inside the current window, oldest first.
    timestamps: Mutex<VecDeque<Instant>>,
}

impl RateLimiter {
    /// Create a limiter.
    ///
    /// # Arguments
    /// * `max_calls` - Ceiling per window (0 is treated as 1)
    /// * `window` - Window length
    pub fn new(max_calls: u32, window: Duration) -> Self {
        let max_calls = max_calls.max(1) as usize;
        Self {
            max_calls,
            window,
            timestamps: Mutex::new(VecDeque::with_capacity(max_calls)),
        }
    }

    pub fn per_second(max_calls: u32) -> Self {
        Self::new(max_calls, Duration::from_secs(1))
    }

    pub fn from_config(config: &RateLimitConfig) -> Self {
        Self::new(config.max_calls, config.window())
    }

    /// Wait for a free slot and claim it.
    ///
    /// Checking and recording happen under one lock, so concurrent callers
    /// never overshoot the ceiling.
    ///
    /// # Returns
    /// Time spent waiting.
    pub async fn acquire(&self) -> Duration {
        let started = Instant::now();
        loop {
            let wait = {
                let mut timestamps = self.timestamps.lock();
                let now = Instant::now();
                Self::evict(&mut timestamps, now, self.window);
                if timestamps.len() < self.max_calls {
                    timestamps.push_back(now);
                    None
                } else {
                    timestamps
                        .front()
                        .map(|&oldest| (oldest + self.window).saturating_duration_since(now))
                }
            };

            match wait {
                None => {
                    let waited = started.elapsed();
                    if !waited.is_zero() {
                        debug!(waited_ms = waited.as_millis() as u64, "Rate limiter delayed call");
                    }
                    return waited;
                }
                Some(delay) => tokio::time::sleep(delay).await,
            }
        }
    }

    /// Calls recorded in the current window.
    pub fn current_count(&self) -> usize {
        let mut timestamps = self.timestamps.lock();
        Self::evict(&mut timestamps, Instant::now(), self.window);
        timestamps.len()
    }

    pub fn remaining_capacity(&self) -> usize {
        self.max_calls.saturating_sub(self.current_count())
    }

    pub fn max_calls(&self) -> usize {
        self.max_calls
    }

    fn evict(timestamps: &mut VecDeque<Instant>, now: Instant, window: Duration) {
        while timestamps
            .front()
            .is_some_and(|&t| now.duration_since(t) >= window)
        {
            timestamps.pop_front();
        }
    }
}
