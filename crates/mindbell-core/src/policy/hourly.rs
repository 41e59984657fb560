use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use super::{
    arm, delay_ms, next_hour_boundary, BellChoice, BellCounters, Policy, PolicyContext,
    PolicyMode, PolicyOutcome, PolicyRng, TimeOfDay,
};
use crate::clock::Clock;
use crate::error::ValidationError;
use crate::timer::DriftTimer;

/// Allowed ringing hours as `[start, end)`; wraps past midnight when
/// `start > end`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    pub start: String,
    pub end: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct HourlyConfig {
    #[serde(default)]
    pub bell_choice: BellChoice,
    #[serde(default)]
    pub window: Option<TimeWindow>,
}

impl HourlyConfig {
    pub fn validate(&self) -> Result<Option<(TimeOfDay, TimeOfDay)>, ValidationError> {
        let Some(window) = &self.window else {
            return Ok(None);
        };
        let start: TimeOfDay = window.start.parse()?;
        let end: TimeOfDay = window.end.parse()?;
        if start == end {
            return Err(ValidationError::invalid(
                "window",
                format!("start and end are both {start}"),
            ));
        }
        Ok(Some((start, end)))
    }
}

/// Chimes on every hour boundary, optionally only inside a daily window.
#[derive(Debug, Clone)]
pub struct HourlyPolicy {
    config: HourlyConfig,
    window: Option<(TimeOfDay, TimeOfDay)>,
    armed_at: Option<NaiveDateTime>,
    rng: PolicyRng,
    next_deadline_ms: Option<u64>,
    skipped: u32,
    counters: BellCounters,
}

impl HourlyPolicy {
    pub(crate) fn new(config: HourlyConfig, rng: PolicyRng) -> Result<Self, ValidationError> {
        let window = config.validate()?;
        Ok(Self {
            config,
            window,
            armed_at: None,
            rng,
            next_deadline_ms: None,
            skipped: 0,
            counters: BellCounters::default(),
        })
    }

    pub fn config(&self) -> &HourlyConfig {
        &self.config
    }

    /// Hour boundaries passed outside the window this session.
    pub fn skipped(&self) -> u32 {
        self.skipped
    }

    pub fn armed_at(&self) -> Option<NaiveDateTime> {
        self.armed_at
    }

    /// The end boundary is exclusive.
    pub fn allows(&self, t: TimeOfDay) -> bool {
        match self.window {
            None => true,
            Some((start, end)) if start < end => start <= t && t < end,
            Some((start, end)) => t >= start || t < end,
        }
    }

    fn arm_next<C: Clock>(&mut self, timer: &mut DriftTimer<C>, ctx: &PolicyContext) -> PolicyOutcome {
        let reference = match self.armed_at {
            Some(at) if at > ctx.local_now => at,
            _ => ctx.local_now,
        };
        let target = next_hour_boundary(reference);
        let delay = delay_ms(ctx.local_now, target);
        self.armed_at = Some(target);
        self.next_deadline_ms = Some(ctx.now_ms + delay);
        PolicyOutcome {
            events: arm(timer, delay),
            ..PolicyOutcome::default()
        }
    }
}

impl Policy for HourlyPolicy {
    fn mode(&self) -> PolicyMode {
        PolicyMode::Hourly
    }

    fn on_start<C: Clock>(&mut self, timer: &mut DriftTimer<C>, ctx: &PolicyContext) -> PolicyOutcome {
        self.counters = BellCounters::default();
        self.skipped = 0;
        self.armed_at = None;
        self.arm_next(timer, ctx)
    }

    fn on_complete<C: Clock>(
        &mut self,
        timer: &mut DriftTimer<C>,
        ctx: &PolicyContext,
    ) -> PolicyOutcome {
        let boundary = self.armed_at.unwrap_or(ctx.local_now);
        let mut outcome = PolicyOutcome::default();
        if self.allows(TimeOfDay::of(boundary)) {
            let bell = self.config.bell_choice.resolve(&mut self.rng);
            self.counters.record(bell);
            outcome = PolicyOutcome::ring(bell);
        } else {
            self.skipped += 1;
            tracing::debug!(at = %boundary, "hourly chime outside window, skipped");
        }
        outcome.merge(self.arm_next(timer, ctx))
    }

    fn on_resume<C: Clock>(
        &mut self,
        timer: &mut DriftTimer<C>,
        ctx: &PolicyContext,
        _pause_ms: u64,
    ) -> PolicyOutcome {
        self.armed_at = None;
        self.arm_next(timer, ctx)
    }

    fn counters(&self) -> BellCounters {
        self.counters
    }

    fn next_deadline_ms(&self) -> Option<u64> {
        self.next_deadline_ms
    }
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;

    use super::*;
    use crate::policy::test_support::{at, fire, rig};

    fn policy(window: Option<(&str, &str)>) -> HourlyPolicy {
        HourlyPolicy::new(
            HourlyConfig {
                bell_choice: BellChoice::Small,
                window: window.map(|(s, e)| TimeWindow {
                    start: s.into(),
                    end: e.into(),
                }),
            },
            PolicyRng::seed_from_u64(0),
        )
        .unwrap()
    }

    #[test]
    fn window_validation() {
        let cfg = |s: &str, e: &str| HourlyConfig {
            bell_choice: BellChoice::Big,
            window: Some(TimeWindow {
                start: s.into(),
                end: e.into(),
            }),
        };
        assert!(cfg("09:00", "21:00").validate().is_ok());
        assert!(cfg("21:00", "06:00").validate().is_ok());
        assert!(cfg("09:00", "09:00").validate().is_err());
        assert!(cfg("9", "21:00").validate().is_err());
    }

    #[test]
    fn rings_only_inside_window() {
        let (clock, mut timer) = rig(at(5, 7, 30));
        let mut p = policy(Some(("09:00", "21:00")));
        p.on_start(&mut timer, &PolicyContext::from_clock(&*clock));

        let mut rung_hours = Vec::new();
        for _ in 0..24 {
            let (rings, fired, _) = fire(&clock, &mut timer, &mut p);
            if !rings.is_empty() {
                rung_hours.push(TimeOfDay::of(fired).hour());
            }
        }
        assert_eq!(rung_hours, (9..=20).collect::<Vec<u8>>());
        assert_eq!(p.counters().small, 12);
        assert_eq!(p.skipped(), 12);
    }

    #[test]
    fn end_boundary_is_exclusive_and_wrap_around() {
        let p = policy(Some(("09:00", "21:00")));
        assert!(p.allows("09:00".parse().unwrap()));
        assert!(p.allows("20:59".parse().unwrap()));
        assert!(!p.allows("21:00".parse().unwrap()));
        assert!(!p.allows("08:59".parse().unwrap()));

        let night = policy(Some(("21:00", "06:00")));
        assert!(night.allows("23:00".parse().unwrap()));
        assert!(night.allows("05:00".parse().unwrap()));
        assert!(!night.allows("06:00".parse().unwrap()));
        assert!(!night.allows("12:00".parse().unwrap()));
    }

    #[test]
    fn arms_for_next_hour_boundary() {
        let (clock, mut timer) = rig(at(5, 7, 30));
        let mut p = policy(None);
        p.on_start(&mut timer, &PolicyContext::from_clock(&*clock));
        assert_eq!(timer.expected_deadline_ms(), 30 * 60_000);
        let (rings, fired, _) = fire(&clock, &mut timer, &mut p);
        assert_eq!(rings.len(), 1);
        assert_eq!(fired, at(5, 8, 0));
        assert_eq!(timer.expected_deadline_ms(), 90 * 60_000);
    }
}
