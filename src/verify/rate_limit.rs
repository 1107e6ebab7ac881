//! Per-source admission control: a fixed number of accepted submissions per window.

use std::time::{Duration, Instant};

use dashmap::DashMap;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitPolicy {
    pub max_submissions: u32,
    pub window_secs: u64,
}

impl Default for RateLimitPolicy {
    fn default() -> Self {
        RateLimitPolicy {
            max_submissions: 10,
            window_secs: 3600,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Window {
    started: Instant,
    accepted: u32,
}

/// Fixed-window limiter keyed by source address.
///
/// `check` gates admission before verification; `record` counts a submission
/// only once it has been accepted, so rejected payloads do not use up quota.
#[derive(Debug)]
pub struct RateLimiter {
    policy: RateLimitPolicy,
    windows: DashMap<String, Window>,
}

impl RateLimiter {
    pub fn new(policy: RateLimitPolicy) -> Self {
        RateLimiter {
            policy,
            windows: DashMap::new(),
        }
    }

    pub fn policy(&self) -> RateLimitPolicy {
        self.policy
    }

    fn window(&self) -> Duration {
        Duration::from_secs(self.policy.window_secs)
    }

    /// `Err(retry_after)` when `source` has used up its quota for the current window.
    pub fn check(&self, source: &str, now: Instant) -> Result<(), Duration> {
        let Some(entry) = self.windows.get(source) else {
            return Ok(());
        };
        let elapsed = now.saturating_duration_since(entry.started);
        if elapsed >= self.window() || entry.accepted < self.policy.max_submissions {
            Ok(())
        } else {
            Err(self.window() - elapsed)
        }
    }

    /// Count one accepted submission for `source`.
    pub fn record(&self, source: &str, now: Instant) {
        let window = self.window();
        let mut entry = self.windows.entry(source.to_string()).or_insert(Window {
            started: now,
            accepted: 0,
        });
        if now.saturating_duration_since(entry.started) >= window {
            *entry = Window {
                started: now,
                accepted: 0,
            };
        }
        entry.accepted += 1;
    }

    /// Drop windows that have expired.
    pub fn prune(&self, now: Instant) {
        let window = self.window();
        self.windows
            .retain(|_, w| now.saturating_duration_since(w.started) < window);
    }

    pub fn tracked_sources(&self) -> usize {
        self.windows.len()
    }
}
