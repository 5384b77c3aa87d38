//! Worker pools for running closures off the calling thread.
//!
//! - [`ThreadPool`]: fixed set of workers sharing one FIFO queue
//! - [`TaskHandle`]: future-like handle to a submitted task's result
//! - [`ThreadPoolConfig`]: size, naming and statistics settings
//! - [`global`]: lazily created process-wide pool

pub mod config;
pub mod global;
pub mod task;
pub mod thread;

pub use config::{default_threads, ThreadPoolConfig};
pub use global::global;
pub use task::TaskHandle;
pub use thread::{ThreadPool, ThreadPoolStats};
