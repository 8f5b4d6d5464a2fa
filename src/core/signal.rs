//! Typed publish/subscribe fan-out.
//!
//! A [`Signal`] holds an ordered list of listeners. Emitting a value calls every
//! listener synchronously, in registration order, before `emit` returns.
//! Listeners are removed by the [`ListenerId`] returned when they were added.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;

/// Listener callback for a signal carrying `T`.
pub type Listener<T> = Arc<dyn Fn(&T) + Send + Sync>;

/// Identity of a registered listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

static NEXT_LISTENER_ID: AtomicU64 = AtomicU64::new(1);

impl ListenerId {
    fn next() -> Self {
        ListenerId(NEXT_LISTENER_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// A named, multi-subscriber notification.
pub struct Signal<T> {
    name: &'static str,
    listeners: Mutex<Vec<(ListenerId, Listener<T>)>>,
}

impl<T> Signal<T> {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            listeners: Mutex::new(Vec::new()),
        }
    }

    /// Signal name, e.g. `"audio"`.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Register a listener and return its identity.
    pub fn connect<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        let id = ListenerId::next();
        self.listeners.lock().push((id, Arc::new(listener)));
        id
    }

    /// Remove a listener. Returns `false` if it was not registered here.
    pub fn disconnect(&self, id: ListenerId) -> bool {
        let mut listeners = self.listeners.lock();
        let before = listeners.len();
        listeners.retain(|(listener_id, _)| *listener_id != id);
        listeners.len() != before
    }

    /// Number of registered listeners.
    pub fn listener_count(&self) -> usize {
        self.listeners.lock().len()
    }

    /// Call every listener with `value`, in registration order.
    ///
    /// The listener list is snapshotted first, so listeners may add or remove
    /// listeners on this signal without deadlocking; such changes take effect
    /// from the next emit.
    pub fn emit(&self, value: &T) {
        let snapshot: Vec<Listener<T>> = self
            .listeners
            .lock()
            .iter()
            .map(|(_, listener)| listener.clone())
            .collect();

        for listener in snapshot {
            listener(value);
        }
    }
}

impl<T> fmt::Debug for Signal<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Signal")
            .field("name", &self.name)
            .field("listeners", &self.listener_count())
            .finish()
    }
}
