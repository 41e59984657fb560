use std::path::Path;
use std::rc::Rc;

use chrono::{Local, NaiveDateTime};
use clap::Args;
use mindbell_core::{BellSession, Clock, ManualClock, NullDestination, TimingPolicy};

use super::{load_config, print_event, CommandResult};

#[derive(Args)]
pub struct SimulateArgs {
    /// Simulated duration in minutes
    #[arg(long, default_value = "60")]
    pub minutes: u64,
    /// Simulated host wake interval
    #[arg(long, default_value = "250")]
    pub step_ms: u64,
    /// Wall-clock start, e.g. 2026-06-01T08:30:00 (defaults to now)
    #[arg(long)]
    pub start: Option<NaiveDateTime>,
    /// Seed for random intervals and bell choice
    #[arg(long)]
    pub seed: Option<u64>,
    /// Print every event, not only rings and errors
    #[arg(long)]
    pub all: bool,
}

pub fn run(args: SimulateArgs, config_path: Option<&Path>) -> CommandResult {
    if args.step_ms == 0 {
        return Err("--step-ms must be positive".into());
    }
    let config = load_config(config_path)?;
    config.validate()?;

    let start = args.start.unwrap_or_else(|| Local::now().naive_local());
    let clock = Rc::new(ManualClock::starting_at(start));
    let policy = match args.seed {
        Some(seed) => TimingPolicy::seeded(&config.policy, seed)?,
        None => TimingPolicy::from_config(&config.policy)?,
    };
    let mut session = BellSession::new(
        Rc::clone(&clock),
        NullDestination::new(Rc::clone(&clock)),
        policy,
        (&config).into(),
    );

    let bus = session.bus_mut();
    if args.all {
        bus.subscribe(|e| print_event(e).map_err(Into::into));
    } else {
        for topic in ["bell.ring", "session.complete", "audio.error"] {
            bus.subscribe_to(topic, |e| print_event(e).map_err(Into::into));
        }
    }

    session.start();
    let end_ms = clock.now_ms() + args.minutes * 60_000;
    while clock.now_ms() < end_ms && session.is_active() {
        clock.advance_ms(args.step_ms);
        session.poll();
    }

    let snapshot = session.snapshot();
    tracing::info!(
        mode = ?snapshot.mode,
        big = snapshot.counters.big,
        small = snapshot.counters.small,
        drift_ms = snapshot.timer.cumulative_drift_ms,
        "simulation finished at {}",
        clock.local_now()
    );
    session.stop();
    Ok(())
}
