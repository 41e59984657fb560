//! Timing policies.
//!
//! A policy decides *when* the next bell is due and *which* bell rings. All
//! four variants sit behind the closed [`TimingPolicy`] union and are driven
//! through the [`Policy`] operations only: the session never inspects which
//! variant it holds.

mod clock_time;
mod hourly;
mod periodic;
mod random;
mod reminder;

use std::fmt;

use chrono::NaiveDateTime;
use rand::{Rng, SeedableRng};
use rand_pcg::Mcg128Xsl64;
use serde::{Deserialize, Serialize};

use crate::clock::Clock;
use crate::error::ValidationError;
use crate::events::Event;
use crate::timer::DriftTimer;

pub use clock_time::{delay_ms, minutes_to_ms, next_hour_boundary, TimeOfDay, MS_PER_MIN};
pub use hourly::{HourlyConfig, HourlyPolicy, TimeWindow};
pub use periodic::{PeriodicConfig, PeriodicPolicy};
pub use random::{IntervalStats, RandomConfig, RandomPolicy, INTERVAL_HISTORY_CAP};
pub use reminder::{ReminderConfig, ReminderPolicy, MAX_REMINDERS};

/// Upper bound for any interval expressed in minutes (one day).
pub const MAX_INTERVAL_MIN: u32 = 1440;

pub(crate) type PolicyRng = Mcg128Xsl64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BellType {
    Big,
    Small,
}

impl fmt::Display for BellType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BellType::Big => write!(f, "big"),
            BellType::Small => write!(f, "small"),
        }
    }
}

impl std::str::FromStr for BellType {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "big" => Ok(BellType::Big),
            "small" => Ok(BellType::Small),
            other => Err(ValidationError::invalid(
                "bell_type",
                format!("unknown bell '{other}' (expected big|small)"),
            )),
        }
    }
}

/// Which bell a policy rings: a fixed type, or a fair coin flip per ring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BellChoice {
    Big,
    #[default]
    Small,
    Random,
}

impl BellChoice {
    pub(crate) fn resolve<R: Rng>(&self, rng: &mut R) -> BellType {
        match self {
            BellChoice::Big => BellType::Big,
            BellChoice::Small => BellType::Small,
            BellChoice::Random => {
                if rng.gen_bool(0.5) {
                    BellType::Big
                } else {
                    BellType::Small
                }
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PolicyMode {
    Periodic,
    Random,
    Reminder,
    Hourly,
}

/// Bells rung during the current session, per type.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BellCounters {
    pub big: u32,
    pub small: u32,
}

impl BellCounters {
    pub fn record(&mut self, bell: BellType) {
        match bell {
            BellType::Big => self.big += 1,
            BellType::Small => self.small += 1,
        }
    }

    pub fn total(&self) -> u32 {
        self.big + self.small
    }
}

/// Validated-on-use configuration for one of the four policies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum PolicyConfig {
    Periodic(PeriodicConfig),
    Random(RandomConfig),
    Reminder(ReminderConfig),
    Hourly(HourlyConfig),
}

impl PolicyConfig {
    pub fn mode(&self) -> PolicyMode {
        match self {
            PolicyConfig::Periodic(_) => PolicyMode::Periodic,
            PolicyConfig::Random(_) => PolicyMode::Random,
            PolicyConfig::Reminder(_) => PolicyMode::Reminder,
            PolicyConfig::Hourly(_) => PolicyMode::Hourly,
        }
    }

    /// Reject malformed parameters. Nothing is clamped.
    pub fn validate(&self) -> Result<(), ValidationError> {
        match self {
            PolicyConfig::Periodic(c) => c.validate(),
            PolicyConfig::Random(c) => c.validate(),
            PolicyConfig::Reminder(c) => c.validate().map(|_| ()),
            PolicyConfig::Hourly(c) => c.validate().map(|_| ()),
        }
    }
}

impl Default for PolicyConfig {
    fn default() -> Self {
        PolicyConfig::Periodic(PeriodicConfig::default())
    }
}

/// Time readings handed to a policy callback.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PolicyContext {
    pub now_ms: u64,
    pub local_now: NaiveDateTime,
}

impl PolicyContext {
    pub fn from_clock<C: Clock + ?Sized>(clock: &C) -> Self {
        Self {
            now_ms: clock.now_ms(),
            local_now: clock.local_now(),
        }
    }
}

/// What a policy callback decided.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PolicyOutcome {
    /// Bells to ring now, in order.
    pub rings: Vec<BellType>,
    /// Timer events produced while (re-)arming.
    pub events: Vec<Event>,
    /// No deadline remains; the timer has been stopped.
    pub finished: bool,
}

impl PolicyOutcome {
    fn ring(bell: BellType) -> Self {
        Self {
            rings: vec![bell],
            ..Self::default()
        }
    }

    fn merge(mut self, other: PolicyOutcome) -> Self {
        self.rings.extend(other.rings);
        self.events.extend(other.events);
        self.finished |= other.finished;
        self
    }
}

/// Operations every timing policy supports.
pub trait Policy {
    fn mode(&self) -> PolicyMode;

    /// Reset session counters and arm the timer for the first deadline.
    fn on_start<C: Clock>(&mut self, timer: &mut DriftTimer<C>, ctx: &PolicyContext) -> PolicyOutcome;

    /// The armed deadline passed: pick the bell(s) and re-arm.
    fn on_complete<C: Clock>(
        &mut self,
        timer: &mut DriftTimer<C>,
        ctx: &PolicyContext,
    ) -> PolicyOutcome;

    /// The timer resumed after `pause_ms` of pause.
    fn on_resume<C: Clock>(
        &mut self,
        timer: &mut DriftTimer<C>,
        ctx: &PolicyContext,
        pause_ms: u64,
    ) -> PolicyOutcome;

    fn counters(&self) -> BellCounters;

    /// Host-clock reading (ms) of the next armed deadline.
    fn next_deadline_ms(&self) -> Option<u64>;
}

/// Arm `timer` to fire `delay_ms` from now, starting it if needed.
pub(crate) fn arm<C: Clock>(timer: &mut DriftTimer<C>, delay_ms: u64) -> Vec<Event> {
    timer.arm(delay_ms).into_iter().collect()
}

/// The closed set of timing policies.
#[derive(Debug, Clone)]
pub enum TimingPolicy {
    Periodic(PeriodicPolicy),
    Random(RandomPolicy),
    Reminder(ReminderPolicy),
    Hourly(HourlyPolicy),
}

macro_rules! dispatch {
    ($self:expr, $p:ident => $body:expr) => {
        match $self {
            TimingPolicy::Periodic($p) => $body,
            TimingPolicy::Random($p) => $body,
            TimingPolicy::Reminder($p) => $body,
            TimingPolicy::Hourly($p) => $body,
        }
    };
}

impl TimingPolicy {
    /// Build a policy with an entropy-seeded RNG.
    pub fn from_config(config: &PolicyConfig) -> Result<Self, ValidationError> {
        Self::with_rng(config, PolicyRng::from_entropy())
    }

    /// Build a policy with a deterministic RNG.
    pub fn seeded(config: &PolicyConfig, seed: u64) -> Result<Self, ValidationError> {
        Self::with_rng(config, PolicyRng::seed_from_u64(seed))
    }

    fn with_rng(config: &PolicyConfig, rng: PolicyRng) -> Result<Self, ValidationError> {
        Ok(match config {
            PolicyConfig::Periodic(c) => TimingPolicy::Periodic(PeriodicPolicy::new(c.clone())?),
            PolicyConfig::Random(c) => TimingPolicy::Random(RandomPolicy::new(c.clone(), rng)?),
            PolicyConfig::Reminder(c) => {
                TimingPolicy::Reminder(ReminderPolicy::new(c.clone(), rng)?)
            }
            PolicyConfig::Hourly(c) => TimingPolicy::Hourly(HourlyPolicy::new(c.clone(), rng)?),
        })
    }

    pub fn config(&self) -> PolicyConfig {
        match self {
            TimingPolicy::Periodic(p) => PolicyConfig::Periodic(p.config().clone()),
            TimingPolicy::Random(p) => PolicyConfig::Random(p.config().clone()),
            TimingPolicy::Reminder(p) => PolicyConfig::Reminder(p.config().clone()),
            TimingPolicy::Hourly(p) => PolicyConfig::Hourly(p.config().clone()),
        }
    }
}

impl Policy for TimingPolicy {
    fn mode(&self) -> PolicyMode {
        dispatch!(self, p => p.mode())
    }

    fn on_start<C: Clock>(&mut self, timer: &mut DriftTimer<C>, ctx: &PolicyContext) -> PolicyOutcome {
        dispatch!(self, p => p.on_start(timer, ctx))
    }

    fn on_complete<C: Clock>(
        &mut self,
        timer: &mut DriftTimer<C>,
        ctx: &PolicyContext,
    ) -> PolicyOutcome {
        dispatch!(self, p => p.on_complete(timer, ctx))
    }

    fn on_resume<C: Clock>(
        &mut self,
        timer: &mut DriftTimer<C>,
        ctx: &PolicyContext,
        pause_ms: u64,
    ) -> PolicyOutcome {
        dispatch!(self, p => p.on_resume(timer, ctx, pause_ms))
    }

    fn counters(&self) -> BellCounters {
        dispatch!(self, p => p.counters())
    }

    fn next_deadline_ms(&self) -> Option<u64> {
        dispatch!(self, p => p.next_deadline_ms())
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::rc::Rc;

    use chrono::{NaiveDate, NaiveDateTime};

    use super::*;
    use crate::clock::ManualClock;

    pub fn at(day: u32, h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 6, day)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    pub fn rig(start: NaiveDateTime) -> (Rc<ManualClock>, DriftTimer<Rc<ManualClock>>) {
        let clock = Rc::new(ManualClock::starting_at(start));
        let timer = DriftTimer::new(Rc::clone(&clock));
        (clock, timer)
    }

    /// Jump to the armed deadline and run one completion; returns the rings
    /// and the wall-clock time at which they fired.
    pub fn fire<P: Policy>(
        clock: &ManualClock,
        timer: &mut DriftTimer<Rc<ManualClock>>,
        policy: &mut P,
    ) -> (Vec<BellType>, NaiveDateTime, bool) {
        clock.set_ms(timer.expected_deadline_ms());
        let fired_at = clock.local_now();
        let mut outcome = PolicyOutcome::default();
        timer.tick_with(|t, _| {
            let ctx = PolicyContext::from_clock(t.clock());
            outcome = policy.on_complete(t, &ctx);
        });
        (outcome.rings, fired_at, outcome.finished)
    }
}
