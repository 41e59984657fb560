use std::collections::VecDeque;

use rand::Rng;
use serde::{Deserialize, Serialize};

use super::{
    arm, BellChoice, BellCounters, Policy, PolicyContext, PolicyMode, PolicyOutcome, PolicyRng,
    MAX_INTERVAL_MIN, MS_PER_MIN,
};
use crate::clock::Clock;
use crate::error::ValidationError;
use crate::timer::DriftTimer;

/// Most recent intervals kept for statistics.
pub const INTERVAL_HISTORY_CAP: usize = 100;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RandomConfig {
    pub min_interval_min: u32,
    pub max_interval_min: u32,
    #[serde(default)]
    pub bell_choice: BellChoice,
}

impl Default for RandomConfig {
    fn default() -> Self {
        Self {
            min_interval_min: 5,
            max_interval_min: 20,
            bell_choice: BellChoice::Small,
        }
    }
}

impl RandomConfig {
    pub fn validate(&self) -> Result<(), ValidationError> {
        for (field, value) in [
            ("min_interval_min", self.min_interval_min),
            ("max_interval_min", self.max_interval_min),
        ] {
            if !(1..=MAX_INTERVAL_MIN).contains(&value) {
                return Err(ValidationError::invalid(
                    field,
                    format!("{value} is outside 1..={MAX_INTERVAL_MIN}"),
                ));
            }
        }
        if self.min_interval_min >= self.max_interval_min {
            return Err(ValidationError::InvalidRange {
                field: "interval_min".into(),
                min: self.min_interval_min as u64,
                max: self.max_interval_min as u64,
            });
        }
        Ok(())
    }
}

/// Summary of the recorded interval history, in minutes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IntervalStats {
    pub count: usize,
    pub mean_min: f64,
    pub variance: f64,
}

/// Bells at randomized intervals.
///
/// Each interval is the mean of two independent uniform draws over
/// `[min, max]`, which concentrates intervals around the midpoint while
/// keeping the extremes reachable.
#[derive(Debug, Clone)]
pub struct RandomPolicy {
    config: RandomConfig,
    rng: PolicyRng,
    history: VecDeque<u64>,
    next_deadline_ms: Option<u64>,
    counters: BellCounters,
}

impl RandomPolicy {
    pub(crate) fn new(config: RandomConfig, rng: PolicyRng) -> Result<Self, ValidationError> {
        config.validate()?;
        Ok(Self {
            config,
            rng,
            history: VecDeque::with_capacity(INTERVAL_HISTORY_CAP),
            next_deadline_ms: None,
            counters: BellCounters::default(),
        })
    }

    pub fn config(&self) -> &RandomConfig {
        &self.config
    }

    /// Draw the next interval in milliseconds.
    pub fn next_interval_ms(&mut self) -> u64 {
        let min = self.config.min_interval_min as f64;
        let max = self.config.max_interval_min as f64;
        let a = self.rng.gen_range(min..=max);
        let b = self.rng.gen_range(min..=max);
        let ms = ((a + b) / 2.0 * MS_PER_MIN as f64).round() as u64;
        if self.history.len() == INTERVAL_HISTORY_CAP {
            self.history.pop_front();
        }
        self.history.push_back(ms);
        ms
    }

    /// Intervals drawn so far (oldest first, at most [`INTERVAL_HISTORY_CAP`]).
    pub fn history(&self) -> impl Iterator<Item = u64> + '_ {
        self.history.iter().copied()
    }

    pub fn stats(&self) -> Option<IntervalStats> {
        if self.history.is_empty() {
            return None;
        }
        let n = self.history.len() as f64;
        let mins = self.history.iter().map(|&ms| ms as f64 / MS_PER_MIN as f64);
        let mean = mins.clone().sum::<f64>() / n;
        let variance = mins.map(|m| (m - mean).powi(2)).sum::<f64>() / n;
        Some(IntervalStats {
            count: self.history.len(),
            mean_min: mean,
            variance,
        })
    }

    fn arm_next<C: Clock>(&mut self, timer: &mut DriftTimer<C>, now_ms: u64) -> PolicyOutcome {
        let interval = self.next_interval_ms();
        self.next_deadline_ms = Some(now_ms + interval);
        PolicyOutcome {
            events: arm(timer, interval),
            ..PolicyOutcome::default()
        }
    }
}

impl Policy for RandomPolicy {
    fn mode(&self) -> PolicyMode {
        PolicyMode::Random
    }

    fn on_start<C: Clock>(&mut self, timer: &mut DriftTimer<C>, ctx: &PolicyContext) -> PolicyOutcome {
        self.counters = BellCounters::default();
        self.history.clear();
        self.arm_next(timer, ctx.now_ms)
    }

    fn on_complete<C: Clock>(
        &mut self,
        timer: &mut DriftTimer<C>,
        ctx: &PolicyContext,
    ) -> PolicyOutcome {
        let bell = self.config.bell_choice.resolve(&mut self.rng);
        self.counters.record(bell);
        PolicyOutcome::ring(bell).merge(self.arm_next(timer, ctx.now_ms))
    }

    fn on_resume<C: Clock>(
        &mut self,
        _timer: &mut DriftTimer<C>,
        _ctx: &PolicyContext,
        pause_ms: u64,
    ) -> PolicyOutcome {
        if let Some(next) = self.next_deadline_ms.as_mut() {
            *next += pause_ms;
        }
        PolicyOutcome::default()
    }

    fn counters(&self) -> BellCounters {
        self.counters
    }

    fn next_deadline_ms(&self) -> Option<u64> {
        self.next_deadline_ms
    }
}
