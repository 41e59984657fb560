mod engine;

use serde::{Deserialize, Serialize};

pub use engine::{DriftTimer, TimerState, TimerStatus, DEFAULT_TICK_INTERVAL_MS};

/// Host loop settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimerConfig {
    /// Minimum spacing between two Tick events.
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,
    /// How often the host wakes the session.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

fn default_tick_interval_ms() -> u64 {
    DEFAULT_TICK_INTERVAL_MS
}

fn default_poll_interval_ms() -> u64 {
    16
}

impl Default for TimerConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: default_tick_interval_ms(),
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}
