pub mod config;
pub mod render;
pub mod run;
pub mod simulate;

use std::path::Path;

use mindbell_core::{AppConfig, CoreError, Event};

pub type CommandResult = Result<(), Box<dyn std::error::Error>>;

/// Load the config at `path`, or the default location when none is given.
/// A missing explicit file yields the defaults.
pub fn load_config(path: Option<&Path>) -> Result<AppConfig, CoreError> {
    match path {
        Some(p) if p.exists() => AppConfig::load_from(p),
        Some(_) => Ok(AppConfig::default()),
        None => AppConfig::load(),
    }
}

pub fn save_config(config: &AppConfig, path: Option<&Path>) -> Result<(), CoreError> {
    match path {
        Some(p) => config.save_to(p),
        None => config.save(),
    }
}

/// Print one event as a JSON line on stdout.
pub fn print_event(event: &Event) -> Result<(), serde_json::Error> {
    println!("{}", serde_json::to_string(event)?);
    Ok(())
}
