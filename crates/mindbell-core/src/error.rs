//! Core error types for mindbell-core.
//!
//! Configuration problems are rejected synchronously with a
//! [`ValidationError`]; synthesis problems surface as [`SynthError`] and are
//! reported on the event bus rather than stopping a session.

use std::path::PathBuf;
use thiserror::Error;

/// Core error type for mindbell-core.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Configuration file errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Policy or parameter validation errors
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Audio graph construction errors
    #[error("Synthesis error: {0}")]
    Synth(#[from] SynthError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Configuration-file errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to load configuration
    #[error("Failed to load configuration from {path}: {message}")]
    LoadFailed { path: PathBuf, message: String },

    /// Failed to save configuration
    #[error("Failed to save configuration to {path}: {message}")]
    SaveFailed { path: PathBuf, message: String },

    /// Unknown dot-path key
    #[error("Unknown configuration key: {0}")]
    UnknownKey(String),

    /// Invalid configuration value
    #[error("Invalid configuration value for '{key}': {message}")]
    InvalidValue { key: String, message: String },

    /// Home/config directory could not be prepared
    #[error("Configuration directory unavailable: {0}")]
    DirUnavailable(String),
}

/// Validation errors for timing-policy and engine parameters.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// A numeric range is empty or reversed
    #[error("Invalid range for '{field}': min ({min}) must be less than max ({max})")]
    InvalidRange { field: String, min: u64, max: u64 },

    /// A value outside its permitted bounds
    #[error("Invalid value for '{field}': {message}")]
    InvalidValue { field: String, message: String },

    /// A malformed HH:MM string
    #[error("Invalid time '{value}': expected HH:MM (00:00-23:59)")]
    InvalidTime { value: String },

    /// Big bell interval must exceed the small one
    #[error("Big interval ({big} min) must be 0 or greater than small interval ({small} min)")]
    NonMonotonic { small: u32, big: u32 },

    /// Collection exceeds its cap
    #[error("Too many entries in '{collection}': {len} (max {max})")]
    TooManyEntries {
        collection: String,
        len: usize,
        max: usize,
    },

    /// Collection must not be empty
    #[error("Empty collection: {0}")]
    EmptyCollection(String),
}

/// Errors raised while building or connecting a bell voice.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SynthError {
    /// The audio destination cannot accept voices (device lost, suspended)
    #[error("Audio destination unavailable: {0}")]
    DestinationUnavailable(String),

    /// Filter coefficients could not be computed
    #[error("Filter design failed: {0}")]
    Filter(String),

    /// Sample rate unusable for the parameter table
    #[error("Invalid sample rate: {0} Hz")]
    InvalidSampleRate(u32),

    /// Destination refused another concurrent voice
    #[error("Voice capacity exceeded ({0} active)")]
    CapacityExceeded(usize),
}

impl ValidationError {
    pub(crate) fn invalid(field: &str, message: impl Into<String>) -> Self {
        ValidationError::InvalidValue {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

/// Result type alias for CoreError
pub type Result<T, E = CoreError> = std::result::Result<T, E>;
