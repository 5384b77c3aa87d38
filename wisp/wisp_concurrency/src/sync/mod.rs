//! Busy-wait synchronization primitives.
//!
//! - [`SpinLock`]: exclusive test-and-set lock for very short sections
//! - [`RwSpinLock`]: reader/writer lock with writer preference
//!
//! Both spin instead of parking the thread. Prefer `parking_lot` locks for
//! anything that may be held across blocking work.

pub mod rw_spin;
pub mod spin;

pub use rw_spin::{RwSpinLock, RwSpinReadGuard, RwSpinWriteGuard};
pub use spin::{SpinLock, SpinLockGuard};
