//! Reconnect schedule for push streams.
//!
//! Delays grow linearly: attempt `n` waits `base_interval × n`. After
//! `max_attempts` failed attempts the stream gives up until something
//! external (the reconnect trigger) resets the counter.

use std::time::Duration;

use lectern_config::SyncSettings;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    /// Delay unit; attempt `n` waits `n` units.
    pub base_interval: Duration,
    /// Attempts allowed before the stream is considered exhausted.
    pub max_attempts: u32,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            base_interval: Duration::from_secs(1),
            max_attempts: 5,
        }
    }
}

impl ReconnectPolicy {
    #[must_use]
    pub fn from_settings(settings: &SyncSettings) -> Self {
        Self {
            base_interval: settings.reconnect_interval,
            max_attempts: settings.max_reconnect_attempts,
        }
    }

    /// Delay before reconnect attempt `attempt` (1-based), or `None` once the
    /// budget is spent.
    #[must_use]
    pub fn delay_for(&self, attempt: u32) -> Option<Duration> {
        if attempt == 0 || attempt > self.max_attempts {
            return None;
        }
        Some(self.base_interval.saturating_mul(attempt))
    }
}
