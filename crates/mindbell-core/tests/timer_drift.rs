//! Drift compensation properties of the interval timer.
//!
//! The host wakes the timer at a fixed poll step that does not divide the
//! interval; lag must never compound across cycles.

use std::rc::Rc;

use chrono::NaiveDate;
use mindbell_core::{Clock, DriftTimer, Event, ManualClock};
use proptest::prelude::*;

fn clock() -> Rc<ManualClock> {
    let base = NaiveDate::from_ymd_opt(2026, 6, 1)
        .unwrap()
        .and_hms_opt(7, 0, 0)
        .unwrap();
    Rc::new(ManualClock::starting_at(base))
}

/// Run until `cycles` completions; returns (fire time, drift) per cycle.
fn run_cycles(interval_ms: u64, step_ms: u64, cycles: usize) -> (Vec<(u64, i64)>, u64) {
    let clock = clock();
    let mut timer = DriftTimer::new(Rc::clone(&clock));
    timer.start(interval_ms);

    let mut fired = Vec::new();
    while fired.len() < cycles {
        clock.advance_ms(step_ms);
        for event in timer.tick() {
            if let Event::TimerCompleted { drift_ms } = event {
                fired.push((clock.now_ms(), drift_ms));
            }
        }
    }
    (fired, timer.cumulative_drift_ms())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn test_fire_times_stay_on_the_interval_grid(
        interval_ms in 100u64..4_000,
        step_ms in 1u64..=16,
        cycles in 3usize..16,
    ) {
        let (fired, cumulative) = run_cycles(interval_ms, step_ms, cycles);

        for (k, (at, drift)) in fired.iter().enumerate() {
            let expected = (k as u64 + 1) * interval_ms;
            // Never early, never later than one polling step.
            prop_assert!(*drift >= 0);
            prop_assert!((*drift as u64) < step_ms);
            prop_assert_eq!(*at as i64 - *drift, expected as i64);
        }

        let total: u64 = fired.iter().map(|(_, d)| d.unsigned_abs()).sum();
        prop_assert_eq!(cumulative, total);
        // Bounded by one step per cycle, independent of the interval length.
        prop_assert!(cumulative < step_ms * cycles as u64);
    }
}

#[test]
fn test_drift_does_not_compound_over_many_cycles() {
    // 16ms wakes against a 1s interval: 1000 is not a multiple of 16.
    let (fired, cumulative) = run_cycles(1_000, 16, 200);
    let last = fired.last().unwrap();
    assert!(last.0 - 200 * 1_000 < 16);
    assert!(cumulative < 200 * 16);
    assert!((cumulative as f64) < 0.02 * (200.0 * 1_000.0));
}

#[test]
fn test_completion_fires_once_per_interval_with_dense_wakes() {
    let clock = clock();
    let mut timer = DriftTimer::new(Rc::clone(&clock));
    timer.start(500);
    let mut completions = 0;
    for _ in 0..2_000 {
        clock.advance_ms(1);
        completions += timer
            .tick()
            .iter()
            .filter(|e| matches!(e, Event::TimerCompleted { .. }))
            .count();
    }
    assert_eq!(completions, 4);
}

#[test]
fn test_ticks_are_rate_limited() {
    let clock = clock();
    let mut timer = DriftTimer::with_tick_interval(Rc::clone(&clock), 100);
    timer.start(60_000);
    let mut ticks = 0;
    for _ in 0..1_000 {
        clock.advance_ms(1);
        ticks += timer
            .tick()
            .iter()
            .filter(|e| matches!(e, Event::TimerTick { .. }))
            .count();
    }
    assert_eq!(ticks, 10);
}
