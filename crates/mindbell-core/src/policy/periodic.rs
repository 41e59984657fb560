use serde::{Deserialize, Serialize};

use super::{
    arm, minutes_to_ms, BellCounters, BellType, Policy, PolicyContext, PolicyMode, PolicyOutcome,
    MAX_INTERVAL_MIN,
};
use crate::clock::Clock;
use crate::error::ValidationError;
use crate::timer::DriftTimer;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeriodicConfig {
    pub small_interval_min: u32,
    /// 0 disables the big bell.
    #[serde(default)]
    pub big_interval_min: u32,
}

impl Default for PeriodicConfig {
    fn default() -> Self {
        Self {
            small_interval_min: 15,
            big_interval_min: 60,
        }
    }
}

impl PeriodicConfig {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if !(1..=MAX_INTERVAL_MIN).contains(&self.small_interval_min) {
            return Err(ValidationError::invalid(
                "small_interval_min",
                format!("must be within 1..={MAX_INTERVAL_MIN}"),
            ));
        }
        if self.big_interval_min > MAX_INTERVAL_MIN {
            return Err(ValidationError::invalid(
                "big_interval_min",
                format!("must be 0 or at most {MAX_INTERVAL_MIN}"),
            ));
        }
        if self.big_interval_min != 0 && self.big_interval_min <= self.small_interval_min {
            return Err(ValidationError::NonMonotonic {
                small: self.small_interval_min,
                big: self.big_interval_min,
            });
        }
        Ok(())
    }
}

/// Small bell every `small` minutes, big bell every `big` minutes. A big bell
/// preempts a coincident small one and re-anchors the small cadence.
#[derive(Debug, Clone)]
pub struct PeriodicPolicy {
    config: PeriodicConfig,
    small_ms: u64,
    big_ms: Option<u64>,
    next_small_ms: u64,
    next_big_ms: Option<u64>,
    counters: BellCounters,
}

impl PeriodicPolicy {
    pub fn new(config: PeriodicConfig) -> Result<Self, ValidationError> {
        config.validate()?;
        let small_ms = minutes_to_ms(config.small_interval_min);
        let big_ms = (config.big_interval_min > 0).then(|| minutes_to_ms(config.big_interval_min));
        Ok(Self {
            config,
            small_ms,
            big_ms,
            next_small_ms: 0,
            next_big_ms: None,
            counters: BellCounters::default(),
        })
    }

    pub fn config(&self) -> &PeriodicConfig {
        &self.config
    }

    fn next_target(&self) -> u64 {
        match self.next_big_ms {
            Some(big) => big.min(self.next_small_ms),
            None => self.next_small_ms,
        }
    }

    /// Skip deadlines the host slept through instead of ringing in a burst.
    fn catch_up(&mut self, now: u64) {
        while self.next_small_ms <= now {
            self.next_small_ms += self.small_ms;
        }
        if let (Some(next), Some(big)) = (self.next_big_ms.as_mut(), self.big_ms) {
            while *next <= now {
                *next += big;
            }
        }
    }
}

impl Policy for PeriodicPolicy {
    fn mode(&self) -> PolicyMode {
        PolicyMode::Periodic
    }

    fn on_start<C: Clock>(&mut self, timer: &mut DriftTimer<C>, ctx: &PolicyContext) -> PolicyOutcome {
        self.counters = BellCounters::default();
        self.next_small_ms = ctx.now_ms + self.small_ms;
        self.next_big_ms = self.big_ms.map(|big| ctx.now_ms + big);
        PolicyOutcome {
            events: arm(timer, self.next_target() - ctx.now_ms),
            ..PolicyOutcome::default()
        }
    }

    fn on_complete<C: Clock>(
        &mut self,
        timer: &mut DriftTimer<C>,
        ctx: &PolicyContext,
    ) -> PolicyOutcome {
        let now = ctx.now_ms;
        let mut outcome = match (self.next_big_ms, self.big_ms) {
            (Some(next_big), Some(big)) if now >= next_big => {
                self.next_big_ms = Some(next_big + big);
                self.next_small_ms = next_big + self.small_ms;
                PolicyOutcome::ring(BellType::Big)
            }
            _ if now >= self.next_small_ms => {
                self.next_small_ms += self.small_ms;
                PolicyOutcome::ring(BellType::Small)
            }
            _ => PolicyOutcome::default(),
        };
        for bell in &outcome.rings {
            self.counters.record(*bell);
        }
        self.catch_up(now);
        outcome.events = arm(timer, self.next_target().saturating_sub(now));
        outcome
    }

    fn on_resume<C: Clock>(
        &mut self,
        _timer: &mut DriftTimer<C>,
        _ctx: &PolicyContext,
        pause_ms: u64,
    ) -> PolicyOutcome {
        self.next_small_ms += pause_ms;
        if let Some(next) = self.next_big_ms.as_mut() {
            *next += pause_ms;
        }
        PolicyOutcome::default()
    }

    fn counters(&self) -> BellCounters {
        self.counters
    }

    fn next_deadline_ms(&self) -> Option<u64> {
        (self.small_ms > 0 && self.next_small_ms > 0).then(|| self.next_target())
    }
}
