//! # Wisp Core
//!
//! `wisp_core` holds the pieces shared by every Wisp crate: the error
//! hierarchy and the helpers that turn panic payloads into messages.
//!
//! ## Crate Structure
//!
//! - **error**: Error types for signals, task pools and configuration

pub mod error;

pub use error::{panic_message, ConfigError, Error, EventError, PoolError, Result, TaskError};
