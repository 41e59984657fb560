use std::path::Path;
use std::time::Duration;

use clap::Args;
use mindbell_core::{BellSession, BellType, Clock, NullDestination, SystemClock};
use tokio::time::MissedTickBehavior;

use super::{load_config, print_event, CommandResult};

#[derive(Args)]
pub struct RunArgs {
    /// Stop after this many seconds instead of waiting for Ctrl-C
    #[arg(long)]
    pub duration_secs: Option<u64>,
    /// Also print throttled timer ticks
    #[arg(long)]
    pub ticks: bool,
    /// Ring this bell once right away
    #[arg(long)]
    pub ring_now: Option<BellType>,
}

pub fn run(args: RunArgs, config_path: Option<&Path>) -> CommandResult {
    let config = load_config(config_path)?;
    let clock = SystemClock::new();
    let mut session =
        BellSession::from_config(clock.clone(), NullDestination::new(clock.clone()), &config)?;

    let show_ticks = args.ticks;
    session.bus_mut().subscribe(move |e| {
        if !show_ticks && e.name() == "timer.tick" {
            return Ok(());
        }
        print_event(e).map_err(Into::into)
    });

    let poll_every = Duration::from_millis(config.timer.poll_interval_ms);
    let deadline = args.duration_secs.map(|s| clock.now_ms() + s * 1_000);

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    runtime.block_on(async {
        let mut interval = tokio::time::interval(poll_every);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let ctrl_c = tokio::signal::ctrl_c();
        tokio::pin!(ctrl_c);

        session.start();
        if let Some(bell) = args.ring_now {
            session.ring_now(bell);
        }
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    session.poll();
                    if !session.is_active() {
                        break;
                    }
                    if deadline.is_some_and(|d| clock.now_ms() >= d) {
                        break;
                    }
                }
                _ = &mut ctrl_c => {
                    tracing::info!("interrupted");
                    break;
                }
            }
        }
        session.stop();
    });
    Ok(())
}
