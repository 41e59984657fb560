use std::collections::BTreeSet;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use super::{
    arm, delay_ms, BellChoice, BellCounters, Policy, PolicyContext, PolicyMode, PolicyOutcome,
    PolicyRng, TimeOfDay,
};
use crate::clock::Clock;
use crate::error::ValidationError;
use crate::timer::DriftTimer;

pub const MAX_REMINDERS: usize = 24;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReminderConfig {
    /// Daily HH:MM targets, ascending and unique.
    pub times: Vec<String>,
    #[serde(default)]
    pub recurring: bool,
    #[serde(default)]
    pub bell_choice: BellChoice,
}

impl Default for ReminderConfig {
    fn default() -> Self {
        Self {
            times: vec!["09:00".into(), "13:00".into(), "17:00".into()],
            recurring: true,
            bell_choice: BellChoice::Small,
        }
    }
}

impl ReminderConfig {
    /// Parse and check the target list.
    pub fn validate(&self) -> Result<BTreeSet<TimeOfDay>, ValidationError> {
        if self.times.is_empty() {
            return Err(ValidationError::EmptyCollection("times".into()));
        }
        if self.times.len() > MAX_REMINDERS {
            return Err(ValidationError::TooManyEntries {
                collection: "times".into(),
                len: self.times.len(),
                max: MAX_REMINDERS,
            });
        }
        let parsed = self
            .times
            .iter()
            .map(|t| t.parse::<TimeOfDay>())
            .collect::<Result<Vec<_>, _>>()?;
        if parsed.windows(2).any(|w| w[0] >= w[1]) {
            return Err(ValidationError::invalid(
                "times",
                "must be sorted ascending without duplicates",
            ));
        }
        Ok(parsed.into_iter().collect())
    }
}

/// Rings at fixed times of day.
///
/// Every cycle the timer is armed for exactly the nearest eligible target, so
/// accuracy does not depend on how many targets are configured. One-shot
/// targets drop out once fired; when none remain the timer is stopped.
#[derive(Debug, Clone)]
pub struct ReminderPolicy {
    config: ReminderConfig,
    times: BTreeSet<TimeOfDay>,
    completed: BTreeSet<TimeOfDay>,
    armed: Option<(TimeOfDay, NaiveDateTime)>,
    rng: PolicyRng,
    next_deadline_ms: Option<u64>,
    counters: BellCounters,
}

impl ReminderPolicy {
    pub(crate) fn new(config: ReminderConfig, rng: PolicyRng) -> Result<Self, ValidationError> {
        let times = config.validate()?;
        Ok(Self {
            config,
            times,
            completed: BTreeSet::new(),
            armed: None,
            rng,
            next_deadline_ms: None,
            counters: BellCounters::default(),
        })
    }

    pub fn config(&self) -> &ReminderConfig {
        &self.config
    }

    /// Targets still eligible to fire.
    pub fn pending(&self) -> impl Iterator<Item = TimeOfDay> + '_ {
        self.times.difference(&self.completed).copied()
    }

    pub fn armed_at(&self) -> Option<NaiveDateTime> {
        self.armed.map(|(_, at)| at)
    }

    fn arm_next<C: Clock>(&mut self, timer: &mut DriftTimer<C>, ctx: &PolicyContext) -> PolicyOutcome {
        // Never look for the next target before the one that just fired.
        let reference = match self.armed.take() {
            Some((_, at)) if at > ctx.local_now => at,
            _ => ctx.local_now,
        };
        let next = self
            .pending()
            .map(|t| (t, t.next_occurrence(reference)))
            .min_by_key(|&(_, at)| at);

        match next {
            Some((time, at)) => {
                let delay = delay_ms(ctx.local_now, at);
                self.armed = Some((time, at));
                self.next_deadline_ms = Some(ctx.now_ms + delay);
                PolicyOutcome {
                    events: arm(timer, delay),
                    ..PolicyOutcome::default()
                }
            }
            None => {
                self.next_deadline_ms = None;
                tracing::info!("no reminder targets left, stopping timer");
                PolicyOutcome {
                    events: timer.stop().into_iter().collect(),
                    finished: true,
                    ..PolicyOutcome::default()
                }
            }
        }
    }
}

impl Policy for ReminderPolicy {
    fn mode(&self) -> PolicyMode {
        PolicyMode::Reminder
    }

    fn on_start<C: Clock>(&mut self, timer: &mut DriftTimer<C>, ctx: &PolicyContext) -> PolicyOutcome {
        self.counters = BellCounters::default();
        self.completed.clear();
        self.armed = None;
        self.arm_next(timer, ctx)
    }

    fn on_complete<C: Clock>(
        &mut self,
        timer: &mut DriftTimer<C>,
        ctx: &PolicyContext,
    ) -> PolicyOutcome {
        let mut outcome = PolicyOutcome::default();
        if let Some((time, _)) = self.armed {
            let bell = self.config.bell_choice.resolve(&mut self.rng);
            self.counters.record(bell);
            if !self.config.recurring {
                self.completed.insert(time);
            }
            outcome = PolicyOutcome::ring(bell);
        }
        outcome.merge(self.arm_next(timer, ctx))
    }

    fn on_resume<C: Clock>(
        &mut self,
        timer: &mut DriftTimer<C>,
        ctx: &PolicyContext,
        _pause_ms: u64,
    ) -> PolicyOutcome {
        // The timer shifted its deadline by the pause; wall-clock targets do not move.
        self.armed = None;
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
    use chrono::Duration;
    use rand::SeedableRng;

    use super::*;
    use crate::policy::test_support::{at, fire, rig};
    use crate::policy::BellType;
    use crate::timer::TimerStatus;

    fn policy(times: &[&str], recurring: bool) -> ReminderPolicy {
        ReminderPolicy::new(
            ReminderConfig {
                times: times.iter().map(|t| t.to_string()).collect(),
                recurring,
                bell_choice: BellChoice::Big,
            },
            PolicyRng::seed_from_u64(0),
        )
        .unwrap()
    }

    #[test]
    fn validation() {
        let cfg = |times: &[&str]| ReminderConfig {
            times: times.iter().map(|t| t.to_string()).collect(),
            recurring: false,
            bell_choice: BellChoice::Small,
        };
        assert!(cfg(&["06:00", "12:00"]).validate().is_ok());
        assert!(cfg(&["12:00", "06:00"]).validate().is_err());
        assert!(cfg(&["06:00", "06:00"]).validate().is_err());
        assert!(matches!(
            cfg(&["6am"]).validate(),
            Err(ValidationError::InvalidTime { .. })
        ));
        assert!(matches!(
            cfg(&[]).validate(),
            Err(ValidationError::EmptyCollection(_))
        ));
        let many: Vec<String> = (0..25).map(|i| format!("{:02}:{:02}", i % 24, i / 24)).collect();
        let too_many = ReminderConfig {
            times: many,
            recurring: true,
            bell_choice: BellChoice::Small,
        };
        assert!(matches!(
            too_many.validate(),
            Err(ValidationError::TooManyEntries { len: 25, .. })
        ));
    }

    #[test]
    fn arms_for_nearest_target_today() {
        let (clock, mut timer) = rig(at(3, 10, 30));
        let mut p = policy(&["06:00", "12:00", "18:00"], true);
        p.on_start(&mut timer, &PolicyContext::from_clock(&*clock));
        assert_eq!(p.armed_at(), Some(at(3, 12, 0)));
        assert_eq!(timer.expected_deadline_ms(), 90 * 60_000);
    }

    #[test]
    fn both_passed_today_skips_to_tomorrow_then_stops() {
        let (clock, mut timer) = rig(at(3, 13, 0));
        let mut p = policy(&["06:00", "12:00"], false);
        p.on_start(&mut timer, &PolicyContext::from_clock(&*clock));
        assert_eq!(p.armed_at(), Some(at(4, 6, 0)));

        let (rings, fired, finished) = fire(&clock, &mut timer, &mut p);
        assert_eq!(rings, vec![BellType::Big]);
        assert_eq!(fired, at(4, 6, 0));
        assert!(!finished);
        assert_eq!(p.pending().collect::<Vec<_>>(), vec!["12:00".parse::<TimeOfDay>().unwrap()]);
        assert_eq!(p.armed_at(), Some(at(4, 12, 0)));

        let (rings, fired, finished) = fire(&clock, &mut timer, &mut p);
        assert_eq!(rings, vec![BellType::Big]);
        assert_eq!(fired, at(4, 12, 0));
        assert!(finished);
        assert_eq!(timer.state(), TimerStatus::Stopped);
        assert_eq!(p.next_deadline_ms(), None);
    }

    #[test]
    fn recurring_never_runs_out() {
        let (clock, mut timer) = rig(at(3, 7, 0));
        let mut p = policy(&["08:00"], true);
        p.on_start(&mut timer, &PolicyContext::from_clock(&*clock));
        for day in 0..3 {
            let (rings, fired, finished) = fire(&clock, &mut timer, &mut p);
            assert_eq!(rings.len(), 1);
            assert_eq!(fired, at(3, 8, 0) + Duration::days(day));
            assert!(!finished);
        }
        assert_eq!(p.counters().big, 3);
    }

    #[test]
    fn resume_rearms_against_wall_clock() {
        let (clock, mut timer) = rig(at(3, 11, 0));
        let mut p = policy(&["12:00"], true);
        p.on_start(&mut timer, &PolicyContext::from_clock(&*clock));
        clock.advance_ms(10 * 60_000);
        timer.pause();
        clock.advance_ms(20 * 60_000);
        timer.resume();
        p.on_resume(&mut timer, &PolicyContext::from_clock(&*clock), 20 * 60_000);
        // 11:30 now; still fires at 12:00 rather than 12:20.
        assert_eq!(timer.remaining_ms(), 30 * 60_000);
        assert_eq!(p.armed_at(), Some(at(3, 12, 0)));
    }
}
