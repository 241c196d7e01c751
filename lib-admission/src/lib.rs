//! ICO Gateway Admission Control
//!
//! Sliding-window per-key rate limiting for purchase requests.
//!
//! # Algorithm
//!
//! Each client key tracks `(count, window_start)` over a 60-second
//! window. A request from an unseen key opens a window with count 1; a
//! request after the window elapsed resets it; a request at the limit is
//! rejected without incrementing; anything else increments.
//!
//! # Housekeeping
//!
//! When the number of tracked keys exceeds a configurable threshold,
//! expired entries are swept on the admit path to bound memory. This is
//! opportunistic housekeeping, not a correctness requirement. State is
//! in-memory only and resets on restart; rate limiting is a soft
//! defense, not a security boundary on its own.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

use tracing::{debug, warn};

/// Window length in seconds.
pub const WINDOW_SECS: u64 = 60;

/// Default bound on tracked keys before a sweep runs.
pub const DEFAULT_MAX_TRACKED: usize = 1_000;

#[derive(Debug, Clone, Copy)]
struct Window {
    count: u32,
    window_start: u64,
}

/// Sliding-window rate limiter keyed by client identifier.
#[derive(Debug)]
pub struct RateLimiter {
    limit: u32,
    max_tracked: usize,
    windows: Mutex<HashMap<String, Window>>,
}

impl RateLimiter {
    /// Create a limiter admitting `limit` requests per key per window.
    pub fn new(limit: u32) -> Self {
        Self::with_max_tracked(limit, DEFAULT_MAX_TRACKED)
    }

    /// Create a limiter with an explicit tracked-key bound.
    pub fn with_max_tracked(limit: u32, max_tracked: usize) -> Self {
        Self {
            limit,
            max_tracked,
            windows: Mutex::new(HashMap::new()),
        }
    }

    /// Requests admitted per key per window.
    pub fn limit(&self) -> u32 {
        self.limit
    }

    /// Check and record a request for `key`. `true` means admitted.
    pub fn admit(&self, key: &str) -> bool {
        self.admit_at(key, unix_now())
    }

    /// Clock-explicit admission check (drives the tests).
    pub fn admit_at(&self, key: &str, now: u64) -> bool {
        let mut windows = self.windows.lock().unwrap_or_else(|e| e.into_inner());

        if windows.len() > self.max_tracked {
            let before = windows.len();
            windows.retain(|_, w| now.saturating_sub(w.window_start) < WINDOW_SECS);
            debug!(
                swept = before - windows.len(),
                remaining = windows.len(),
                "swept expired rate-limit windows"
            );
        }

        match windows.get_mut(key) {
            Some(window) => {
                if now.saturating_sub(window.window_start) >= WINDOW_SECS {
                    *window = Window {
                        count: 1,
                        window_start: now,
                    };
                    debug!(key, "rate-limit window reset");
                    true
                } else if window.count >= self.limit {
                    warn!(key, count = window.count, limit = self.limit, "rate limit exceeded");
                    false
                } else {
                    window.count += 1;
                    true
                }
            }
            None => {
                windows.insert(
                    key.to_string(),
                    Window {
                        count: 1,
                        window_start: now,
                    },
                );
                true
            }
        }
    }

    /// Number of keys currently tracked.
    pub fn tracked_keys(&self) -> usize {
        self.windows.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
