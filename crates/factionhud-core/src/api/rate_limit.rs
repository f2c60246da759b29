//! Sliding-window call log for the Torn per-key budget.

use std::collections::VecDeque;
use std::time::Duration;

use serde::Serialize;
use tokio::time::Instant;

/// Length of the trailing window the rate limit applies to.
pub const RATE_WINDOW: Duration = Duration::from_secs(60);

/// Snapshot of the call budget, for display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RateStatus {
    pub used: usize,
    pub limit: usize,
    pub remaining: usize,
    pub reset_in_seconds: u64,
}

#[derive(Debug)]
pub struct RateLimitLog {
    calls: VecDeque<Instant>,
    limit: usize,
}

impl RateLimitLog {
    pub fn new(limit: usize) -> Self {
        Self {
            calls: VecDeque::new(),
            limit: limit.max(1),
        }
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Drop timestamps that have left the trailing window.
    pub fn prune(&mut self, now: Instant) {
        while let Some(&oldest) = self.calls.front() {
            if now.saturating_duration_since(oldest) >= RATE_WINDOW {
                self.calls.pop_front();
            } else {
                break;
            }
        }
    }

    pub fn is_full(&self) -> bool {
        self.calls.len() >= self.limit
    }

    pub fn record(&mut self, now: Instant) {
        self.calls.push_back(now);
    }

    /// How long until the oldest logged call leaves the window.
    pub fn time_until_slot(&self, now: Instant) -> Duration {
        match self.calls.front() {
            Some(&oldest) => RATE_WINDOW.saturating_sub(now.saturating_duration_since(oldest)),
            None => Duration::ZERO,
        }
    }

    /// Budget report computed without pruning the log.
    pub fn status(&self, now: Instant) -> RateStatus {
        let mut recent = self
            .calls
            .iter()
            .filter(|&&t| now.saturating_duration_since(t) < RATE_WINDOW);
        let oldest = recent.next().copied();
        let used = oldest.map(|_| 1 + recent.count()).unwrap_or(0);

        let reset_in_seconds = oldest
            .map(|t| {
                let left = RATE_WINDOW.saturating_sub(now.saturating_duration_since(t));
                left.as_millis().div_ceil(1000) as u64
            })
            .unwrap_or(0);

        RateStatus {
            used,
            limit: self.limit,
            remaining: self.limit.saturating_sub(used),
            reset_in_seconds,
        }
    }
}
