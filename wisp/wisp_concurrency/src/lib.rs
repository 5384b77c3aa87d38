#![deny(warnings)]
#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

//! # Wisp Concurrency
//!
//! Low-level concurrency building blocks for an interactive application.
//!
//! This crate provides:
//!
//! - Spin locks for very short critical sections, including a
//!   reader/writer variant with writer preference
//! - Typed signals whose connections disconnect themselves when dropped,
//!   safely even after the signal is gone
//! - A fixed-size thread pool returning waitable handles for each task
//!
//! ## Usage
//!
//! The UI layer fires signals for input and state changes and subscribes
//! widgets through [`event::Observer`]; expensive or blocking work is handed
//! to a [`ThreadPool`] so the firing thread never waits on it.

/// Signal/slot event delivery
pub mod event;

/// Thread pools and task result handles
pub mod pool;

/// Spin-based synchronization primitives
pub mod sync;

// Re-export key types for easier access
pub use event::{Connection, Observer, Signal};
pub use pool::{TaskHandle, ThreadPool, ThreadPoolConfig};
pub use sync::{RwSpinLock, SpinLock};
