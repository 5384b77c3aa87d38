//! Bulk ownership of subscriptions.
//!
//! An [`Observer`] is embedded in whatever object reacts to signals (a
//! widget, a controller). It keeps every connection that object made, of
//! any argument type, and disconnects them all when it is dropped.

use log::trace;

use super::connection::Subscription;

/// Owns a set of connections and disconnects them together.
#[derive(Default)]
pub struct Observer {
    connections: Vec<Box<dyn Subscription>>,
}

impl Observer {
    /// Create an observer with no connections.
    pub fn new() -> Self {
        Self::default()
    }

    /// Take ownership of a connection.
    pub fn observe<S>(&mut self, connection: S)
    where
        S: Subscription + 'static,
    {
        self.connections.push(Box::new(connection));
    }

    /// Number of connections held, including ones whose signal is gone.
    pub fn len(&self) -> usize {
        self.connections.len()
    }

    /// Whether no connections are held.
    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    /// Drop held connections that no longer deliver anything.
    ///
    /// Returns how many were removed.
    pub fn prune(&mut self) -> usize {
        let before = self.connections.len();
        self.connections.retain(|connection| connection.is_connected());
        let removed = before - self.connections.len();
        if removed > 0 {
            trace!("Observer pruned {} stale connection(s)", removed);
        }
        removed
    }

    /// Disconnect everything this observer holds.
    pub fn clear(&mut self) {
        self.connections.clear();
    }
}

impl std::fmt::Debug for Observer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Observer")
            .field("connections", &self.connections.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::Signal;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_observer_holds_mixed_signals() {
        let clicked = Signal::<(i32, i32)>::new();
        let renamed = Signal::<String>::new();
        let calls = Arc::new(AtomicUsize::new(0));

        let mut observer = Observer::new();
        let counter = Arc::clone(&calls);
        observer.observe(clicked.connect(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        }));
        let counter = Arc::clone(&calls);
        observer.observe(renamed.connect(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        }));

        clicked.fire((1, 2));
        renamed.fire("title".to_string());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(observer.len(), 2);

        drop(observer);
        clicked.fire((3, 4));
        renamed.fire("other".to_string());

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert!(clicked.is_empty());
        assert!(renamed.is_empty());
    }

    #[test]
    fn test_observer_prune_and_clear() {
        let short_lived = Signal::<()>::new();
        let long_lived = Signal::<()>::new();

        let mut observer = Observer::new();
        observer.observe(short_lived.connect(|_| {}));
        observer.observe(long_lived.connect(|_| {}));

        drop(short_lived);
        assert_eq!(observer.prune(), 1);
        assert_eq!(observer.len(), 1);

        observer.clear();
        assert!(observer.is_empty());
        assert!(long_lived.is_empty());
    }
}
