use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::policy::BellType;

/// Identifier returned by [`super::EventScheduler::schedule`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntryId(pub u64);

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryState {
    /// Waiting in the queue for its target to enter the lookahead window.
    Pending,
    /// Handed to the synthesizer; a voice is (or was) sounding.
    Materialized,
    Canceled,
}

/// Per-request options.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScheduleOptions {
    /// Overrides the scheduler's default volume (0..=1).
    pub volume: Option<f32>,
    /// Free-form labels carried through to the entry.
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

impl ScheduleOptions {
    pub fn with_volume(volume: f32) -> Self {
        Self {
            volume: Some(volume),
            ..Self::default()
        }
    }

    pub fn label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

/// A request to ring one bell at an absolute audio-clock time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleEntry {
    pub id: EntryId,
    pub bell_type: BellType,
    /// Seconds on the destination's audio-rendering clock.
    pub target_time: f64,
    pub volume: f32,
    pub metadata: BTreeMap<String, String>,
    pub state: EntryState,
}
