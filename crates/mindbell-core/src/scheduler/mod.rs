//! Lookahead bell scheduler.
//!
//! Ring requests are converted into absolute times on the destination's
//! audio-rendering clock and queued in target order. A periodic pass (driven
//! by the host at a coarse cadence) hands every entry whose target lies within
//! the lookahead window to the synthesizer. The voice itself starts on the
//! exact frame of its target, so start accuracy does not depend on how often
//! the pass runs.
//!
//! The scheduler stops itself once both its queue and its set of sounding
//! voices are empty, and starts again on the next [`EventScheduler::schedule`].

mod entry;

use std::collections::{BTreeMap, VecDeque};

use serde::{Deserialize, Serialize};

use crate::audio::{AudioDestination, VoiceId};
use crate::events::Event;
use crate::policy::BellType;
use crate::synth::{BellSynthesizer, SynthConfig};

pub use entry::{EntryId, EntryState, ScheduleEntry, ScheduleOptions};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Horizon within which pending entries are materialized.
    #[serde(default = "default_lookahead_ms")]
    pub lookahead_ms: u64,
    /// Host cadence of the materialization pass.
    #[serde(default = "default_pass_interval_ms")]
    pub pass_interval_ms: u64,
    /// Extra time a voice is kept after its natural end before release.
    #[serde(default = "default_cleanup_margin_ms")]
    pub cleanup_margin_ms: u64,
    /// Delay added to policy rings.
    #[serde(default)]
    pub ring_delay_ms: u64,
    /// Default volume for entries without an override.
    #[serde(default = "default_volume")]
    pub volume: f32,
}

fn default_lookahead_ms() -> u64 {
    100
}

fn default_pass_interval_ms() -> u64 {
    25
}

fn default_cleanup_margin_ms() -> u64 {
    1_000
}

fn default_volume() -> f32 {
    0.8
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            lookahead_ms: default_lookahead_ms(),
            pass_interval_ms: default_pass_interval_ms(),
            cleanup_margin_ms: default_cleanup_margin_ms(),
            ring_delay_ms: 0,
            volume: default_volume(),
        }
    }
}

/// A materialized entry and the voice it produced.
#[derive(Debug, Clone)]
struct ActiveVoice {
    entry: ScheduleEntry,
    voice: VoiceId,
    release_at: f64,
}

pub struct EventScheduler<D: AudioDestination> {
    destination: D,
    synth: BellSynthesizer,
    config: SchedulerConfig,
    queue: VecDeque<ScheduleEntry>,
    active: BTreeMap<EntryId, ActiveVoice>,
    /// Canceled voices still ramping out, with their release time.
    releasing: Vec<(VoiceId, f64)>,
    next_id: u64,
    running: bool,
}

impl<D: AudioDestination> EventScheduler<D> {
    pub fn new(destination: D, config: SchedulerConfig, synth: SynthConfig) -> Self {
        Self {
            destination,
            synth: BellSynthesizer::new(synth),
            config,
            queue: VecDeque::new(),
            active: BTreeMap::new(),
            releasing: Vec::new(),
            next_id: 0,
            running: false,
        }
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    pub fn synthesizer(&self) -> &BellSynthesizer {
        &self.synth
    }

    pub fn destination(&self) -> &D {
        &self.destination
    }

    pub fn destination_mut(&mut self) -> &mut D {
        &mut self.destination
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Pending entries in target order.
    pub fn pending(&self) -> impl Iterator<Item = &ScheduleEntry> {
        self.queue.iter()
    }

    /// Materialized entries whose voice has not been released yet.
    pub fn active(&self) -> impl Iterator<Item = &ScheduleEntry> {
        self.active.values().map(|a| &a.entry)
    }

    pub fn entry(&self, id: EntryId) -> Option<&ScheduleEntry> {
        self.queue
            .iter()
            .find(|e| e.id == id)
            .or_else(|| self.active.get(&id).map(|a| &a.entry))
    }

    /// Queue `bell` to ring `delay_ms` from the destination's current time.
    pub fn schedule(
        &mut self,
        bell: BellType,
        delay_ms: u64,
        options: ScheduleOptions,
    ) -> (EntryId, Event) {
        let id = EntryId(self.next_id);
        self.next_id += 1;
        let target_time = self.destination.current_time() + delay_ms as f64 / 1000.0;
        let entry = ScheduleEntry {
            id,
            bell_type: bell,
            target_time,
            volume: options.volume.unwrap_or(self.config.volume).clamp(0.0, 1.0),
            metadata: options.metadata,
            state: EntryState::Pending,
        };

        // Equal targets keep request order.
        let at = self.queue.partition_point(|e| e.target_time <= target_time);
        self.queue.insert(at, entry);

        if !self.running {
            tracing::debug!("scheduler started");
            self.running = true;
        }
        tracing::debug!(entry = %id, bell = %bell, target_time, delay_ms, "bell scheduled");

        (
            id,
            Event::BellScheduled {
                id,
                bell_type: bell,
                target_time,
                delay_ms,
            },
        )
    }

    /// One materialization and cleanup pass.
    pub fn poll(&mut self) -> Vec<Event> {
        let mut events = Vec::new();
        if !self.running {
            return events;
        }

        let now = self.destination.current_time();
        let horizon = now + self.config.lookahead_ms as f64 / 1000.0;

        while self.queue.front().is_some_and(|e| e.target_time <= horizon) {
            let Some(mut entry) = self.queue.pop_front() else {
                break;
            };
            match self.synth.create_voice(
                entry.bell_type,
                entry.target_time,
                entry.volume,
                &mut self.destination,
            ) {
                Ok(voice) => {
                    let start = entry.target_time.max(now);
                    let duration = self.synth.duration_s(entry.bell_type);
                    let release_at =
                        start + duration + self.config.cleanup_margin_ms as f64 / 1000.0;
                    tracing::debug!(
                        entry = %entry.id,
                        bell = %entry.bell_type,
                        start,
                        release_at,
                        "entry materialized"
                    );
                    events.push(Event::AudioLoaded {
                        bell_type: entry.bell_type,
                        frames: (duration * self.destination.sample_rate() as f64) as usize,
                    });
                    entry.state = EntryState::Materialized;
                    self.active.insert(
                        entry.id,
                        ActiveVoice {
                            entry,
                            voice,
                            release_at,
                        },
                    );
                }
                Err(e) => {
                    tracing::error!(entry = %entry.id, bell = %entry.bell_type, error = %e, "bell synthesis failed; entry dropped");
                    events.push(Event::AudioError {
                        message: e.to_string(),
                        entry_id: Some(entry.id),
                    });
                }
            }
        }

        self.release_finished(now);

        if self.queue.is_empty() && self.active.is_empty() && self.releasing.is_empty() {
            tracing::debug!("scheduler idle, stopping");
            self.running = false;
        }
        events
    }

    /// Cancel one entry. A materialized entry has its voice ramped to
    /// silence. Unknown (or already canceled) ids return false.
    pub fn cancel(&mut self, id: EntryId) -> bool {
        if let Some(pos) = self.queue.iter().position(|e| e.id == id) {
            self.queue.remove(pos);
            tracing::debug!(entry = %id, "pending entry canceled");
            return true;
        }
        match self.active.remove(&id) {
            Some(active) => {
                self.silence(active.voice);
                tracing::debug!(entry = %id, "sounding entry canceled");
                true
            }
            None => false,
        }
    }

    /// Cancel everything; returns the canceled entries.
    pub fn cancel_all(&mut self) -> Vec<ScheduleEntry> {
        let ids: Vec<EntryId> = self
            .queue
            .iter()
            .map(|e| e.id)
            .chain(self.active.keys().copied())
            .collect();
        self.cancel_ids(ids)
    }

    /// Cancel every entry of one bell type; returns the canceled entries.
    pub fn cancel_type(&mut self, bell: BellType) -> Vec<ScheduleEntry> {
        let ids: Vec<EntryId> = self
            .queue
            .iter()
            .chain(self.active.values().map(|a| &a.entry))
            .filter(|e| e.bell_type == bell)
            .map(|e| e.id)
            .collect();
        self.cancel_ids(ids)
    }

    fn cancel_ids(&mut self, ids: Vec<EntryId>) -> Vec<ScheduleEntry> {
        let mut canceled = Vec::with_capacity(ids.len());
        for id in ids {
            let entry = self.entry(id).cloned();
            if let Some(mut entry) = entry {
                if self.cancel(id) {
                    entry.state = EntryState::Canceled;
                    canceled.push(entry);
                }
            }
        }
        canceled
    }

    fn silence(&mut self, voice: VoiceId) {
        if self.synth.stop(&mut self.destination, voice) {
            let ramp_s = self.synth.config().stop_ramp_ms as f64 / 1000.0;
            let release_at = self.destination.current_time() + ramp_s;
            self.releasing.push((voice, release_at));
        }
    }

    fn release_finished(&mut self, now: f64) {
        let expired: Vec<EntryId> = self
            .active
            .iter()
            .filter(|(_, a)| now >= a.release_at)
            .map(|(id, _)| *id)
            .collect();
        for id in expired {
            if let Some(active) = self.active.remove(&id) {
                self.destination.disconnect(active.voice);
                tracing::debug!(entry = %id, "voice released");
            }
        }

        let destination = &mut self.destination;
        self.releasing.retain(|&(voice, release_at)| {
            if now >= release_at {
                destination.disconnect(voice);
                false
            } else {
                true
            }
        });
    }
}

impl<D: AudioDestination> std::fmt::Debug for EventScheduler<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventScheduler")
            .field("config", &self.config)
            .field("pending", &self.queue.len())
            .field("active", &self.active.len())
            .field("releasing", &self.releasing.len())
            .field("running", &self.running)
            .finish()
    }
}
