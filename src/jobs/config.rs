//! Engine-wide tuning knobs.
//!
//! Values can be deserialized from a host settings file (missing fields fall
//! back to the defaults) or assembled with the builder-style setters.

use std::time::Duration;

use serde::{Deserialize, Serialize};

// ─────────────────────────────────────────────────────────────────────────────
// Constants
// ─────────────────────────────────────────────────────────────────────────────

/// How often a paused loop re-checks its pause flag (500 ms).
pub const DEFAULT_PAUSE_POLL_MS: u64 = 500;

/// Clock tick period for elapsed-time recomputation (1 second).
pub const DEFAULT_TICK_INTERVAL_MS: u64 = 1_000;

/// Buffered events per subscriber before slow receivers start lagging.
pub const DEFAULT_EVENT_CAPACITY: usize = 256;

/// Inter-item delay applied when a job does not choose its own (1 second).
pub const DEFAULT_ITEM_DELAY_MS: u64 = 1_000;

/// Upper bound for a job's in-flight window.
pub const DEFAULT_MAX_BATCH_SIZE: usize = 10;

// ─────────────────────────────────────────────────────────────────────────────
// EngineConfig
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub pause_poll_ms: u64,
    pub tick_interval_ms: u64,
    pub event_capacity: usize,
    pub default_delay_ms: u64,
    pub max_batch_size: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            pause_poll_ms: DEFAULT_PAUSE_POLL_MS,
            tick_interval_ms: DEFAULT_TICK_INTERVAL_MS,
            event_capacity: DEFAULT_EVENT_CAPACITY,
            default_delay_ms: DEFAULT_ITEM_DELAY_MS,
            max_batch_size: DEFAULT_MAX_BATCH_SIZE,
        }
    }
}

impl EngineConfig {
    pub fn pause_poll(mut self, interval: Duration) -> Self {
        self.pause_poll_ms = interval.as_millis() as u64;
        self
    }

    pub fn tick_interval(mut self, interval: Duration) -> Self {
        self.tick_interval_ms = interval.as_millis() as u64;
        self
    }

    pub fn event_capacity(mut self, capacity: usize) -> Self {
        self.event_capacity = capacity;
        self
    }

    pub fn default_delay(mut self, delay: Duration) -> Self {
        self.default_delay_ms = delay.as_millis() as u64;
        self
    }

    pub fn max_batch_size(mut self, max: usize) -> Self {
        self.max_batch_size = max;
        self
    }

    /// Pause poll interval, never shorter than 1 ms so a paused loop cannot spin.
    pub fn pause_poll_interval(&self) -> Duration {
        Duration::from_millis(self.pause_poll_ms.max(1))
    }

    /// Clock period, never shorter than 1 ms.
    pub fn tick_period(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms.max(1))
    }

    /// Broadcast capacity; tokio rejects a zero-sized channel.
    pub(crate) fn channel_capacity(&self) -> usize {
        self.event_capacity.max(1)
    }
}
