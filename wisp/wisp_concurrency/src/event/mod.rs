//! Signal/slot event delivery with lifetime-safe disconnection.
//!
//! - [`Signal`]: typed channel that fires callbacks synchronously
//! - [`Connection`]: RAII handle for one subscription
//! - [`Observer`]: owner of many subscriptions of mixed types

pub mod connection;
pub mod observer;
pub mod signal;

pub use connection::{Connection, Subscription};
pub use observer::Observer;
pub use signal::{FireReport, Signal, SlotId};
