//! Subscription handles.

use std::fmt;
use std::sync::Arc;

use log::trace;

use super::signal::{SharedData, SlotId};

/// A live subscription to a [`Signal`](super::Signal).
///
/// The callback stays registered for as long as this handle exists.
/// Dropping it disconnects the callback; if the signal is already gone the
/// drop is a no-op.
#[must_use = "dropping a Connection immediately disconnects its callback"]
pub struct Connection<Args: 'static> {
    id: SlotId,
    pub(crate) shared: Arc<SharedData<Args>>,
}

impl<Args: 'static> Connection<Args> {
    pub(crate) fn new(id: SlotId, shared: Arc<SharedData<Args>>) -> Self {
        Self { id, shared }
    }

    /// Slot identifier this connection was assigned.
    pub fn id(&self) -> SlotId {
        self.id
    }

    /// Whether the signal is still alive and still holds this slot.
    pub fn is_connected(&self) -> bool {
        match &*self.shared.parent.read() {
            Some(core) => core.contains(self.id),
            None => false,
        }
    }

    /// Disconnect now instead of at the end of the scope.
    pub fn disconnect(self) {}
}

impl<Args: 'static> Drop for Connection<Args> {
    fn drop(&mut self) {
        let removed = match &*self.shared.parent.read() {
            Some(core) => core.take_slot(self.id),
            None => {
                trace!("Slot {} dropped after its signal", self.id);
                None
            }
        };

        // Outside every lock: the callback may hold connections to the same signal
        drop(removed);
    }
}

impl<Args: 'static> fmt::Debug for Connection<Args> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection").field("id", &self.id).finish()
    }
}

/// Type-erased view of a connection, so handles for signals with different
/// argument types can be stored together.
pub trait Subscription: Send {
    /// Slot identifier within the originating signal.
    fn slot_id(&self) -> SlotId;

    /// Whether the subscription is still registered.
    fn is_connected(&self) -> bool;
}

impl<Args: 'static> Subscription for Connection<Args> {
    fn slot_id(&self) -> SlotId {
        self.id
    }

    fn is_connected(&self) -> bool {
        Connection::is_connected(self)
    }
}
