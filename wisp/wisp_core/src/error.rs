//! Error types for the Wisp concurrency toolkit.
//!
//! Each subsystem owns a small error enum; the root `Error` wraps all of
//! them so callers that mix subsystems can use a single `Result`.
//!
//! Expected races are not errors: disconnecting an unknown slot, or dropping
//! a connection whose signal is already gone, are silent no-ops and never
//! surface here.

use std::any::Any;
use std::time::Duration;
use thiserror::Error;

/// Root error type for Wisp.
#[derive(Debug, Error)]
pub enum Error {
    /// Signal/slot errors
    #[error("Event error: {0}")]
    Event(#[from] EventError),

    /// Task pool errors
    #[error("Pool error: {0}")]
    Pool(#[from] PoolError),

    /// Errors retrieving a task result
    #[error("Task error: {0}")]
    Task(#[from] TaskError),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

/// Errors raised while emitting a signal.
#[derive(Debug, Error)]
pub enum EventError {
    /// A subscriber callback panicked during an isolated emission
    #[error("Callback for slot {slot} panicked: {message}")]
    CallbackPanicked {
        /// Identifier of the slot whose callback panicked
        slot: u64,
        /// Panic message, if the payload carried one
        message: String,
    },
}

/// Errors related to submitting work to a task pool.
#[derive(Debug, Error)]
pub enum PoolError {
    /// The pool has begun shutting down and no longer accepts tasks
    #[error("thread pool is shutting down")]
    ShuttingDown,

    /// A worker thread could not be spawned
    #[error("failed to spawn worker thread {name}: {source}")]
    SpawnFailed {
        /// Name the worker would have had
        name: String,
        /// Underlying OS error
        #[source]
        source: std::io::Error,
    },

    /// The pool was configured with zero workers
    #[error("thread pool needs at least one worker")]
    NoWorkers,
}

/// Errors produced when retrieving the result of a pooled task.
#[derive(Debug, Error)]
pub enum TaskError {
    /// The task panicked; the message is extracted from the panic payload
    #[error("task panicked: {0}")]
    Panicked(String),

    /// The task was dropped without ever producing a result
    #[error("task was abandoned before producing a result")]
    Abandoned,

    /// The task did not finish within the requested wait
    #[error("task did not finish within {0:?}")]
    Timeout(Duration),
}

/// Errors while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The TOML document could not be parsed
    #[error("invalid configuration: {0}")]
    Parse(String),

    /// An environment variable held an unusable value
    #[error("invalid value {value:?} for {key}")]
    InvalidEnv {
        /// Variable name
        key: String,
        /// Raw value found in the environment
        value: String,
    },

    /// A field held a value outside its allowed range
    #[error("invalid value for {field}: {reason}")]
    InvalidValue {
        /// Offending field
        field: &'static str,
        /// Why it was rejected
        reason: String,
    },
}

/// Result type for Wisp operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Extract a human readable message from a panic payload.
///
/// Panics raised with `panic!("literal")` carry a `&'static str`, formatted
/// panics carry a `String`; anything else is reported as unknown.
pub fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "<unknown panic>".to_string()
    }
}
