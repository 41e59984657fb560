//! A running bell session.
//!
//! [`BellSession`] owns one timer, one timing policy and one scheduler, and
//! serializes everything inside [`BellSession::poll`], which the host calls
//! from a single periodic callback. Every state change is published on the
//! session's [`EventBus`].

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::audio::AudioDestination;
use crate::clock::Clock;
use crate::error::ValidationError;
use crate::events::{Event, EventBus};
use crate::policy::{
    BellCounters, BellType, Policy, PolicyConfig, PolicyContext, PolicyMode, PolicyOutcome,
    TimingPolicy,
};
use crate::scheduler::{EventScheduler, ScheduleOptions, SchedulerConfig};
use crate::storage::AppConfig;
use crate::synth::SynthConfig;
use crate::timer::{DriftTimer, TimerConfig, TimerState};

/// Engine settings for a session (everything in [`AppConfig`] except the
/// policy).
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SessionSettings {
    pub timer: TimerConfig,
    pub scheduler: SchedulerConfig,
    pub synth: SynthConfig,
}

impl From<&AppConfig> for SessionSettings {
    fn from(config: &AppConfig) -> Self {
        Self {
            timer: config.timer,
            scheduler: config.scheduler,
            synth: config.synth,
        }
    }
}

/// Point-in-time view of a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub mode: PolicyMode,
    pub timer: TimerState,
    pub counters: BellCounters,
    pub next_deadline_ms: Option<u64>,
    pub pending_bells: usize,
    pub sounding_bells: usize,
}

pub struct BellSession<C: Clock + Clone, D: AudioDestination> {
    clock: C,
    timer: DriftTimer<C>,
    policy: TimingPolicy,
    scheduler: EventScheduler<D>,
    bus: EventBus,
    settings: SessionSettings,
    last_pass_ms: Option<u64>,
}

impl<C: Clock + Clone, D: AudioDestination> BellSession<C, D> {
    pub fn new(clock: C, destination: D, policy: TimingPolicy, settings: SessionSettings) -> Self {
        let timer = DriftTimer::with_tick_interval(clock.clone(), settings.timer.tick_interval_ms);
        Self {
            clock,
            timer,
            policy,
            scheduler: EventScheduler::new(destination, settings.scheduler, settings.synth),
            bus: EventBus::new(),
            settings,
            last_pass_ms: None,
        }
    }

    /// Build from a loaded configuration with an entropy-seeded policy.
    pub fn from_config(clock: C, destination: D, config: &AppConfig) -> Result<Self, ValidationError> {
        config.validate()?;
        let policy = TimingPolicy::from_config(&config.policy)?;
        Ok(Self::new(clock, destination, policy, SessionSettings::from(config)))
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    pub fn bus_mut(&mut self) -> &mut EventBus {
        &mut self.bus
    }

    pub fn timer(&self) -> &DriftTimer<C> {
        &self.timer
    }

    pub fn policy(&self) -> &TimingPolicy {
        &self.policy
    }

    pub fn scheduler(&self) -> &EventScheduler<D> {
        &self.scheduler
    }

    pub fn scheduler_mut(&mut self) -> &mut EventScheduler<D> {
        &mut self.scheduler
    }

    pub fn settings(&self) -> &SessionSettings {
        &self.settings
    }

    pub fn is_active(&self) -> bool {
        self.timer.is_active()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            mode: self.policy.mode(),
            timer: self.timer.status(),
            counters: self.policy.counters(),
            next_deadline_ms: self.policy.next_deadline_ms(),
            pending_bells: self.scheduler.pending().count(),
            sounding_bells: self.scheduler.active().count(),
        }
    }

    // ── Commands ─────────────────────────────────────────────────────

    /// Start the policy. Ignored while a session is already active.
    pub fn start(&mut self) {
        if self.timer.is_active() {
            tracing::warn!("start ignored: session already active");
            return;
        }
        let ctx = PolicyContext::from_clock(&self.clock);
        tracing::info!(mode = ?self.policy.mode(), "session started");
        let outcome = self.policy.on_start(&mut self.timer, &ctx);
        self.apply(outcome, ctx.local_now);
    }

    /// Pause the timer. Bells already ringing are left to finish.
    pub fn pause(&mut self) {
        if let Some(event) = self.timer.pause() {
            self.bus.publish(&event);
        }
    }

    pub fn resume(&mut self) {
        let Some(event) = self.timer.resume() else {
            return;
        };
        let pause_ms = match event {
            Event::TimerResumed { pause_duration_ms } => pause_duration_ms,
            _ => 0,
        };
        self.bus.publish(&event);
        let ctx = PolicyContext::from_clock(&self.clock);
        let outcome = self.policy.on_resume(&mut self.timer, &ctx, pause_ms);
        self.apply(outcome, ctx.local_now);
    }

    /// Stop the timer and silence every queued or ringing bell. Idempotent.
    pub fn stop(&mut self) {
        let stopped = self.timer.stop();
        let canceled = self.scheduler.cancel_all();
        if let Some(event) = stopped {
            tracing::info!(
                counters = ?self.policy.counters(),
                canceled = canceled.len(),
                "session stopped"
            );
            self.bus.publish(&event);
        }
    }

    /// Host wake-up: advance the timer (running policy callbacks on
    /// completion) and run a scheduler pass when one is due.
    pub fn poll(&mut self) {
        let policy = &mut self.policy;
        let mut outcome = PolicyOutcome::default();
        let mut fired_at = None;
        let events = self.timer.tick_with(|timer, _drift| {
            let ctx = PolicyContext::from_clock(timer.clock());
            fired_at = Some(ctx.local_now);
            outcome = policy.on_complete(timer, &ctx);
        });
        self.bus.publish_all(events);
        if let Some(at) = fired_at {
            self.apply(outcome, at);
        }

        let now = self.clock.now_ms();
        let due = self
            .last_pass_ms
            .map_or(true, |last| now.saturating_sub(last) >= self.settings.scheduler.pass_interval_ms);
        if due {
            self.run_scheduler_pass(now);
        }
    }

    /// Swap in a new policy. An invalid config is rejected and the running
    /// policy is left untouched; an active session restarts on the new one.
    pub fn update_policy(&mut self, config: &PolicyConfig) -> Result<(), ValidationError> {
        let policy = TimingPolicy::from_config(config)?;
        self.replace_policy(policy);
        Ok(())
    }

    /// Like [`BellSession::update_policy`] with an already-built policy.
    pub fn replace_policy(&mut self, policy: TimingPolicy) {
        let was_active = self.timer.is_active();
        if let Some(event) = self.timer.stop() {
            self.bus.publish(&event);
        }
        tracing::info!(from = ?self.policy.mode(), to = ?policy.mode(), "policy replaced");
        self.policy = policy;
        if was_active {
            self.start();
        }
    }

    /// Ring a bell immediately, outside the policy's cadence.
    pub fn ring_now(&mut self, bell: BellType) {
        let at = self.clock.local_now();
        self.ring(bell, at);
    }

    // ── Internal ─────────────────────────────────────────────────────

    fn apply(&mut self, outcome: PolicyOutcome, at: NaiveDateTime) {
        self.bus.publish_all(outcome.events);
        for bell in outcome.rings {
            self.ring(bell, at);
        }
        if outcome.finished {
            let counters = self.policy.counters();
            tracing::info!(?counters, "session complete: no deadline left");
            self.bus.publish(&Event::SessionComplete {
                mode: self.policy.mode(),
                counters,
            });
        }
    }

    fn ring(&mut self, bell: BellType, at: NaiveDateTime) {
        if !self.audio_ready() {
            return;
        }
        let (_, scheduled) = self.scheduler.schedule(
            bell,
            self.settings.scheduler.ring_delay_ms,
            ScheduleOptions::default().label("mode", format!("{:?}", self.policy.mode())),
        );
        self.bus.publish(&scheduled);
        self.bus.publish(&Event::BellRing {
            bell_type: bell,
            timestamp: at,
            mode: self.policy.mode(),
            counters: self.policy.counters(),
        });
        // Zero-delay rings should not wait for the next pass.
        self.run_scheduler_pass(self.clock.now_ms());
    }

    /// Wake a suspended destination before it is asked to sound.
    fn audio_ready(&mut self) -> bool {
        let destination = self.scheduler.destination_mut();
        if destination.is_running() {
            return true;
        }
        match destination.resume() {
            Ok(()) => {
                tracing::info!("audio destination resumed");
                true
            }
            Err(e) => {
                tracing::error!(error = %e, "audio destination could not be resumed; ring dropped");
                self.bus.publish(&Event::AudioError {
                    message: e.to_string(),
                    entry_id: None,
                });
                false
            }
        }
    }

    fn run_scheduler_pass(&mut self, now_ms: u64) {
        self.last_pass_ms = Some(now_ms);
        let events = self.scheduler.poll();
        self.bus.publish_all(events);
    }
}

impl<C: Clock + Clone, D: AudioDestination> std::fmt::Debug for BellSession<C, D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BellSession")
            .field("mode", &self.policy.mode())
            .field("timer", &self.timer.state())
            .field("scheduler", &self.scheduler)
            .finish()
    }
}
