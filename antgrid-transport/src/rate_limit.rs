//! Per-connection inbound rate limiting.
//!
//! Fixed window counter: the first message of a window starts it, and the
//! count resets once a full window has elapsed since then.

use std::time::{Duration, Instant};

/// Rate limiter configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitConfig {
    pub window: Duration,
    /// Messages accepted per window; the next one is rejected.
    pub max_messages: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            window: Duration::from_secs(1),
            max_messages: 30,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RateLimiter {
    config: RateLimitConfig,
    window_start: Option<Instant>,
    count: u32,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            window_start: None,
            count: 0,
        }
    }

    /// Counts one message received at `now`. Returns true if it is allowed.
    pub fn check(&mut self, now: Instant) -> bool {
        match self.window_start {
            Some(start) if now.saturating_duration_since(start) < self.config.window => {}
            _ => {
                self.window_start = Some(now);
                self.count = 0;
            }
        }

        self.count = self.count.saturating_add(1);
        self.count <= self.config.max_messages
    }
}
