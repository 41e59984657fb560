//! # Mindbell Core Library
//!
//! This library rings synthesized bells to remind a user to pause for mindful
//! breathing. All operations are available through the standalone `mindbell`
//! CLI, which is a thin host over this crate.
//!
//! ## Architecture
//!
//! - **Timer**: A clock-driven state machine that requires the caller to
//!   periodically invoke `tick()`; it compensates for host scheduling drift
//! - **Policies**: Periodic, random, clock-time reminder and hourly timing
//!   strategies that decide when the next bell rings and which one
//! - **Scheduler**: Lookahead queue that turns ring requests into
//!   sample-accurate voice starts on the audio-rendering clock
//! - **Synthesis**: Additive bell voices with per-partial envelopes and a
//!   feedback delay network reverb
//! - **Storage**: TOML-based configuration
//!
//! ## Key Components
//!
//! - [`BellSession`]: Wires the pieces into a single cooperative poll loop
//! - [`DriftTimer`]: Core timer state machine
//! - [`TimingPolicy`]: The closed set of timing strategies
//! - [`EventScheduler`]: Lookahead bell scheduler
//! - [`BellSynthesizer`]: Bell voice construction and offline rendering
//! - [`AppConfig`]: Application configuration management

pub mod audio;
pub mod clock;
pub mod error;
pub mod events;
pub mod policy;
pub mod scheduler;
pub mod session;
pub mod storage;
pub mod synth;
pub mod timer;

pub use audio::{AudioDestination, Mixer, NullDestination, VoiceId};
pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{ConfigError, CoreError, SynthError, ValidationError};
pub use events::{Event, EventBus, SubscriberId};
pub use policy::{BellChoice, BellCounters, BellType, Policy, PolicyConfig, PolicyMode, TimingPolicy};
pub use scheduler::{EntryId, EventScheduler, ScheduleEntry, ScheduleOptions, SchedulerConfig};
pub use session::{BellSession, SessionSettings, SessionSnapshot};
pub use storage::AppConfig;
pub use synth::{BellSynthesizer, SynthConfig};
pub use timer::{DriftTimer, TimerConfig, TimerState, TimerStatus};
