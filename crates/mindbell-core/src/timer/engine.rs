//! Drift-compensated interval timer.
//!
//! The timer is a clock-driven state machine. It does not own a thread;
//! the host calls [`DriftTimer::tick`] as often as it can (~16ms) and the
//! timer decides whether a Tick or Complete event is due.
//!
//! ## State Transitions
//!
//! ```text
//! Idle -> Running -> (Paused <-> Running) -> Stopped -> Idle
//! ```
//!
//! ## Drift compensation
//!
//! On completion the drift `now - expected_deadline` is measured. When no
//! completion handler re-arms the timer, the next deadline becomes
//! `now + interval - drift`, i.e. exactly one interval after the previous
//! *expected* deadline, so host lag never compounds across cycles.

use serde::{Deserialize, Serialize};

use crate::clock::Clock;
use crate::events::Event;

/// Default throttle between two Tick events.
pub const DEFAULT_TICK_INTERVAL_MS: u64 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimerStatus {
    Idle,
    Running,
    Paused,
    Stopped,
}

/// Snapshot of the timer returned by [`DriftTimer::status`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimerState {
    pub status: TimerStatus,
    pub interval_ms: u64,
    /// Clock reading at the start of the current cycle (pause-shifted).
    pub started_at_ms: u64,
    pub expected_deadline_ms: u64,
    pub elapsed_ms: u64,
    pub remaining_ms: u64,
    pub tick_count: u64,
    pub cycle_count: u64,
    pub cumulative_drift_ms: u64,
}

/// Core timer engine.
///
/// All readings come from the injected [`Clock`]; elapsed time is always
/// derived as `now - started_at`, never accumulated.
#[derive(Debug)]
pub struct DriftTimer<C: Clock> {
    clock: C,
    status: TimerStatus,
    interval_ms: u64,
    started_at_ms: u64,
    expected_deadline_ms: u64,
    last_tick_emit_ms: u64,
    paused_at_ms: Option<u64>,
    tick_interval_ms: u64,
    tick_count: u64,
    cycle_count: u64,
    cumulative_drift_ms: u64,
    /// Set when `reset` is called; lets `tick` tell whether a completion
    /// handler re-armed the timer.
    rearmed: bool,
}

impl<C: Clock> DriftTimer<C> {
    pub fn new(clock: C) -> Self {
        Self::with_tick_interval(clock, DEFAULT_TICK_INTERVAL_MS)
    }

    pub fn with_tick_interval(clock: C, tick_interval_ms: u64) -> Self {
        Self {
            clock,
            status: TimerStatus::Idle,
            interval_ms: 0,
            started_at_ms: 0,
            expected_deadline_ms: 0,
            last_tick_emit_ms: 0,
            paused_at_ms: None,
            tick_interval_ms,
            tick_count: 0,
            cycle_count: 0,
            cumulative_drift_ms: 0,
            rearmed: false,
        }
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn clock(&self) -> &C {
        &self.clock
    }

    pub fn state(&self) -> TimerStatus {
        self.status
    }

    pub fn is_active(&self) -> bool {
        matches!(self.status, TimerStatus::Running | TimerStatus::Paused)
    }

    pub fn interval_ms(&self) -> u64 {
        self.interval_ms
    }

    pub fn expected_deadline_ms(&self) -> u64 {
        self.expected_deadline_ms
    }

    pub fn cumulative_drift_ms(&self) -> u64 {
        self.cumulative_drift_ms
    }

    pub fn tick_interval_ms(&self) -> u64 {
        self.tick_interval_ms
    }

    pub fn set_tick_interval_ms(&mut self, ms: u64) {
        self.tick_interval_ms = ms;
    }

    /// Elapsed time of the current cycle, frozen while paused.
    pub fn elapsed_ms(&self) -> u64 {
        match self.status {
            TimerStatus::Running => self.clock.now_ms().saturating_sub(self.started_at_ms),
            TimerStatus::Paused => self
                .paused_at_ms
                .unwrap_or(self.started_at_ms)
                .saturating_sub(self.started_at_ms),
            TimerStatus::Idle | TimerStatus::Stopped => 0,
        }
    }

    pub fn remaining_ms(&self) -> u64 {
        match self.status {
            TimerStatus::Running => self.expected_deadline_ms.saturating_sub(self.clock.now_ms()),
            TimerStatus::Paused => self
                .expected_deadline_ms
                .saturating_sub(self.paused_at_ms.unwrap_or(self.expected_deadline_ms)),
            TimerStatus::Idle | TimerStatus::Stopped => 0,
        }
    }

    pub fn status(&self) -> TimerState {
        TimerState {
            status: self.status,
            interval_ms: self.interval_ms,
            started_at_ms: self.started_at_ms,
            expected_deadline_ms: self.expected_deadline_ms,
            elapsed_ms: self.elapsed_ms(),
            remaining_ms: self.remaining_ms(),
            tick_count: self.tick_count,
            cycle_count: self.cycle_count,
            cumulative_drift_ms: self.cumulative_drift_ms,
        }
    }

    // ── Commands ─────────────────────────────────────────────────────

    /// Start a fresh countdown. Ignored (with a warning) while already
    /// running or paused.
    pub fn start(&mut self, interval_ms: u64) -> Option<Event> {
        match self.status {
            TimerStatus::Idle | TimerStatus::Stopped => {
                let now = self.clock.now_ms();
                self.status = TimerStatus::Running;
                self.interval_ms = interval_ms;
                self.started_at_ms = now;
                self.expected_deadline_ms = now + interval_ms;
                self.last_tick_emit_ms = now;
                self.paused_at_ms = None;
                self.tick_count = 0;
                self.cycle_count = 0;
                self.cumulative_drift_ms = 0;
                self.rearmed = true;
                Some(Event::TimerStarted {
                    interval_ms,
                    start_time_ms: now,
                })
            }
            TimerStatus::Running | TimerStatus::Paused => {
                tracing::warn!(status = ?self.status, "start ignored: timer already active");
                None
            }
        }
    }

    pub fn pause(&mut self) -> Option<Event> {
        match self.status {
            TimerStatus::Running => {
                let now = self.clock.now_ms();
                self.paused_at_ms = Some(now);
                self.status = TimerStatus::Paused;
                Some(Event::TimerPaused {
                    elapsed_ms: now.saturating_sub(self.started_at_ms),
                })
            }
            _ => {
                tracing::warn!(status = ?self.status, "pause ignored: timer not running");
                None
            }
        }
    }

    /// Shift every reference point forward by the pause duration so that
    /// elapsed/remaining accounting is exact.
    pub fn resume(&mut self) -> Option<Event> {
        match (self.status, self.paused_at_ms) {
            (TimerStatus::Paused, Some(paused_at)) => {
                let now = self.clock.now_ms();
                let pause_duration_ms = now.saturating_sub(paused_at);
                self.started_at_ms += pause_duration_ms;
                self.expected_deadline_ms += pause_duration_ms;
                self.last_tick_emit_ms += pause_duration_ms;
                self.paused_at_ms = None;
                self.status = TimerStatus::Running;
                Some(Event::TimerResumed { pause_duration_ms })
            }
            _ => {
                tracing::warn!(status = ?self.status, "resume ignored: timer not paused");
                None
            }
        }
    }

    /// Idempotent: stopping an idle or stopped timer is a silent no-op.
    pub fn stop(&mut self) -> Option<Event> {
        match self.status {
            TimerStatus::Idle | TimerStatus::Stopped => None,
            TimerStatus::Running | TimerStatus::Paused => {
                let event = Event::TimerStopped {
                    elapsed_ms: self.elapsed_ms(),
                    total_drift_ms: self.cumulative_drift_ms,
                    tick_count: self.tick_count,
                };
                self.status = TimerStatus::Stopped;
                self.interval_ms = 0;
                self.started_at_ms = 0;
                self.expected_deadline_ms = 0;
                self.last_tick_emit_ms = 0;
                self.paused_at_ms = None;
                self.tick_count = 0;
                self.cycle_count = 0;
                self.cumulative_drift_ms = 0;
                self.rearmed = false;
                Some(event)
            }
        }
    }

    /// Return a stopped timer to Idle.
    pub fn clear(&mut self) {
        if self.status == TimerStatus::Stopped {
            self.status = TimerStatus::Idle;
        }
    }

    /// Re-arm the countdown with a new interval measured from now.
    ///
    /// While paused the new cycle starts at the pause instant and stays
    /// frozen until resumed. Counters are kept.
    pub fn reset(&mut self, interval_ms: u64) {
        let anchor = match self.status {
            TimerStatus::Running => self.clock.now_ms(),
            TimerStatus::Paused => self.paused_at_ms.unwrap_or_else(|| self.clock.now_ms()),
            TimerStatus::Idle | TimerStatus::Stopped => {
                tracing::warn!(status = ?self.status, "reset ignored: timer not active");
                return;
            }
        };
        self.interval_ms = interval_ms;
        self.started_at_ms = anchor;
        self.expected_deadline_ms = anchor + interval_ms;
        self.rearmed = true;
    }

    /// Start when inactive, otherwise re-arm.
    pub fn arm(&mut self, interval_ms: u64) -> Option<Event> {
        if self.is_active() {
            self.reset(interval_ms);
            None
        } else {
            self.clear();
            self.start(interval_ms)
        }
    }

    /// Host wake-up without a completion handler.
    pub fn tick(&mut self) -> Vec<Event> {
        self.tick_with(|_, _| {})
    }

    /// Host wake-up.
    ///
    /// Emits a throttled Tick, and a single Complete once the deadline has
    /// passed. `on_complete` receives the timer and the measured drift; if it
    /// neither re-arms nor stops the timer, the timer restarts itself with a
    /// drift-compensated deadline.
    pub fn tick_with<F>(&mut self, mut on_complete: F) -> Vec<Event>
    where
        F: FnMut(&mut Self, i64),
    {
        let mut events = Vec::new();
        if self.status != TimerStatus::Running {
            return events;
        }

        let now = self.clock.now_ms();
        let drift = now as i64 - self.expected_deadline_ms as i64;

        if now.saturating_sub(self.last_tick_emit_ms) >= self.tick_interval_ms {
            self.last_tick_emit_ms = now;
            self.tick_count += 1;
            events.push(Event::TimerTick {
                elapsed_ms: now.saturating_sub(self.started_at_ms),
                remaining_ms: self.expected_deadline_ms.saturating_sub(now),
                drift_ms: drift,
            });
        }

        if now < self.expected_deadline_ms {
            return events;
        }

        self.cumulative_drift_ms += drift.unsigned_abs();
        self.cycle_count += 1;
        events.push(Event::TimerCompleted { drift_ms: drift });

        self.rearmed = false;
        on_complete(self, drift);

        if self.status == TimerStatus::Running && !self.rearmed {
            self.restart_compensated(now, drift);
        }
        events
    }

    // ── Internal ─────────────────────────────────────────────────────

    fn restart_compensated(&mut self, now: u64, drift: i64) {
        let next = (now + self.interval_ms) as i64 - drift;
        // The deadline may never lie before the instant it is set.
        self.expected_deadline_ms = next.max(now as i64) as u64;
        self.started_at_ms = now;
    }
}
