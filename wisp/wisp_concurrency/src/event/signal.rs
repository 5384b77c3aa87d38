//! Typed multi-subscriber signals.
//!
//! A [`Signal`] owns an ordered list of callbacks. Every call to
//! [`Signal::fire`] invokes them synchronously, in connection order, on the
//! firing thread. The list is guarded by a single [`SpinLock`]; connecting,
//! disconnecting and firing all take it exclusively, so two emissions on the
//! same signal never interleave.
//!
//! Each [`Connection`] shares a small control block with its signal. The
//! block holds the only back-reference from connections to the signal,
//! behind an [`RwSpinLock`]:
//!
//! - a connection being dropped takes read access and, if the back-reference
//!   is still set, removes its slot
//! - a signal being dropped takes write access and clears the back-reference
//!
//! Because both happen under the same lock, a connection either finishes its
//! disconnect before the signal is torn down or observes the cleared
//! reference and does nothing. Connections may therefore outlive their
//! signal freely.
//!
//! Callbacks must not connect to, disconnect from, fire, or drop connections
//! of the signal that is invoking them: the subscriber lock is not reentrant
//! and the thread would spin forever.

use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use log::{debug, trace, warn};
use wisp_core::{panic_message, EventError};

use super::connection::Connection;
use crate::sync::{RwSpinLock, SpinLock};

/// Identifier of one subscription within a signal.
///
/// Identifiers come from a per-signal counter and are never reused.
pub type SlotId = u64;

pub(crate) type Callback<Args> = Box<dyn FnMut(Args) + Send + 'static>;

/// Ordered callbacks plus the counter handing out slot ids.
struct SlotList<Args> {
    next_id: SlotId,
    slots: Vec<(SlotId, Callback<Args>)>,
}

/// The part of a signal that connections call back into.
pub(crate) struct SignalCore<Args> {
    slots: SpinLock<SlotList<Args>>,
}

impl<Args> SignalCore<Args> {
    fn new() -> Self {
        Self {
            slots: SpinLock::new(SlotList {
                next_id: 0,
                slots: Vec::new(),
            }),
        }
    }

    /// Unlink the slot and hand its callback back to the caller.
    ///
    /// The callback may own connections to this very signal, so it must be
    /// dropped only after the slot lock (and any control-block guard) is
    /// released.
    pub(crate) fn take_slot(&self, id: SlotId) -> Option<Callback<Args>> {
        let mut list = self.slots.lock();
        let index = list.slots.iter().position(|(slot, _)| *slot == id)?;
        // `remove` keeps the remaining slots in connection order
        let (_, callback) = list.slots.remove(index);
        trace!("Slot {} disconnected", id);
        Some(callback)
    }

    pub(crate) fn contains(&self, id: SlotId) -> bool {
        self.slots.lock().slots.iter().any(|(slot, _)| *slot == id)
    }
}

/// Control block shared by a signal and all of its connections.
pub(crate) struct SharedData<Args> {
    /// Back-reference to the owning signal; `None` once it is dropped
    pub(crate) parent: RwSpinLock<Option<Arc<SignalCore<Args>>>>,
}

/// Outcome of [`Signal::fire_isolated`].
#[derive(Debug, Default)]
pub struct FireReport {
    /// Callbacks that returned normally
    pub delivered: usize,

    /// One entry per callback that panicked
    pub failures: Vec<EventError>,
}

impl FireReport {
    /// Whether every callback returned normally.
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// A typed publish/subscribe channel.
///
/// `Args` is the value handed to every callback; use a tuple for several
/// arguments and `()` for none.
///
/// # Example
///
/// ```
/// use std::sync::atomic::{AtomicI32, Ordering};
/// use std::sync::Arc;
/// use wisp_concurrency::event::Signal;
///
/// let clicked = Signal::<i32>::new();
/// let total = Arc::new(AtomicI32::new(0));
///
/// let sink = Arc::clone(&total);
/// let connection = clicked.connect(move |value| {
///     sink.fetch_add(value, Ordering::SeqCst);
/// });
///
/// clicked.fire(5);
/// drop(connection);
/// clicked.fire(5);
///
/// assert_eq!(total.load(Ordering::SeqCst), 5);
/// ```
pub struct Signal<Args: 'static> {
    core: Arc<SignalCore<Args>>,
    shared: Arc<SharedData<Args>>,
}

impl<Args: 'static> Signal<Args> {
    /// Create a signal with no subscribers.
    pub fn new() -> Self {
        let core = Arc::new(SignalCore::new());
        let shared = Arc::new(SharedData {
            parent: RwSpinLock::new(Some(Arc::clone(&core))),
        });
        Self { core, shared }
    }

    /// Register a callback and return the handle that keeps it registered.
    ///
    /// Dropping the returned [`Connection`] disconnects the callback.
    pub fn connect<F>(&self, callback: F) -> Connection<Args>
    where
        F: FnMut(Args) + Send + 'static,
    {
        let id = {
            let mut list = self.core.slots.lock();
            let id = list.next_id;
            list.next_id += 1;
            list.slots.push((id, Box::new(callback)));
            id
        };

        trace!("Slot {} connected", id);
        Connection::new(id, Arc::clone(&self.shared))
    }

    /// Remove the callback registered under `id`.
    ///
    /// Returns `false`, and does nothing else, when no such slot exists.
    pub fn disconnect(&self, id: SlotId) -> bool {
        match self.core.take_slot(id) {
            Some(callback) => {
                drop(callback);
                true
            }
            None => false,
        }
    }

    /// Number of registered callbacks.
    pub fn len(&self) -> usize {
        self.core.slots.lock().slots.len()
    }

    /// Whether no callbacks are registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of connection handles still referring to this signal.
    pub fn connection_count(&self) -> usize {
        // One reference belongs to the signal itself
        Arc::strong_count(&self.shared) - 1
    }
}

impl<Args: Clone + 'static> Signal<Args> {
    /// Invoke every callback with a copy of `args`, in connection order.
    ///
    /// If a callback panics the panic propagates to the caller and the
    /// callbacks after it are skipped for this emission. The subscriber lock
    /// is still released. Use [`fire_isolated`](Self::fire_isolated) to keep
    /// delivering past a failing callback.
    pub fn fire(&self, args: Args) {
        let mut list = self.core.slots.lock();
        for (_, callback) in list.slots.iter_mut() {
            callback(args.clone());
        }
    }

    /// Invoke every callback, containing panics to the callback that raised them.
    ///
    /// Each panic is logged and recorded in the returned report; delivery
    /// continues with the next callback.
    pub fn fire_isolated(&self, args: Args) -> FireReport {
        let mut report = FireReport::default();
        let mut list = self.core.slots.lock();

        for (id, callback) in list.slots.iter_mut() {
            let value = args.clone();
            match panic::catch_unwind(AssertUnwindSafe(|| callback(value))) {
                Ok(()) => report.delivered += 1,
                Err(payload) => {
                    let message = panic_message(payload.as_ref());
                    warn!("Callback for slot {} panicked: {}", id, message);
                    report.failures.push(EventError::CallbackPanicked {
                        slot: *id,
                        message,
                    });
                }
            }
        }

        report
    }
}

impl<Args: 'static> Default for Signal<Args> {
    fn default() -> Self {
        Self::new()
    }
}

impl<Args: 'static> fmt::Debug for Signal<Args> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Signal")
            .field("slots", &self.len())
            .field("connections", &self.connection_count())
            .finish()
    }
}

impl<Args: 'static> Drop for Signal<Args> {
    fn drop(&mut self) {
        let outstanding = self.connection_count();

        // Waits for connections currently disconnecting; later ones see `None`
        let parent = self.shared.parent.write().take();
        drop(parent);

        if outstanding > 0 {
            debug!(
                "Signal dropped with {} outstanding connection(s); detaching",
                outstanding
            );
        }
    }
}
