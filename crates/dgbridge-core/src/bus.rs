//! Generic one-to-many event bus.
//!
//! An [`EventBus`] keeps a registry of listeners, each backed by its own
//! unbounded [`tokio::sync::mpsc`] channel:
//!
//! ```text
//! producer ──┐                    ┌──► Listener 1 (relay to Discord)
//! producer ──┼──► EventBus<T> ────┼──► Listener 2
//! producer ──┘   (registry lock)  └──► Listener N
//! ```
//!
//! ## Rules
//! - **Non-blocking broadcast**: `broadcast()` never waits on a listener.
//!   Channels are unbounded, so a slow listener only grows its own queue and
//!   never stalls the producer (e.g. a subprocess stream reader).
//! - **No drops for live listeners**: every listener registered when
//!   `broadcast()` runs receives the value.
//! - **Ordering**: broadcasts are serialized by the registry lock, so each
//!   listener sees values in the order the broadcasts took the lock.
//! - **Lazy pruning**: a listener whose receiver was dropped without
//!   `unregister()` is removed on the next broadcast.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::mpsc;
use tracing::trace;

/// Identifier of a registered listener, used to unregister it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

/// Receiving side of a bus registration.
#[derive(Debug)]
pub struct Listener<T> {
    id: ListenerId,
    rx: mpsc::UnboundedReceiver<T>,
}

impl<T> Listener<T> {
    /// Identifier to pass to [`EventBus::unregister`].
    pub const fn id(&self) -> ListenerId {
        self.id
    }

    /// Wait for the next value.
    ///
    /// Returns `None` once the listener was unregistered or the bus closed
    /// and every queued value has been consumed.
    pub async fn recv(&mut self) -> Option<T> {
        self.rx.recv().await
    }

    /// Take the next queued value without waiting.
    pub fn try_recv(&mut self) -> Option<T> {
        self.rx.try_recv().ok()
    }
}

struct BusInner<T> {
    listeners: Mutex<HashMap<ListenerId, mpsc::UnboundedSender<T>>>,
    next_id: AtomicU64,
    closed: AtomicBool,
}

/// Thread-safe broadcast bus for values of a single type.
///
/// Cloning is cheap and yields another handle to the same registry.
pub struct EventBus<T> {
    inner: Arc<BusInner<T>>,
}

impl<T> Clone for EventBus<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> std::fmt::Debug for EventBus<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("listeners", &self.lock().len())
            .field("closed", &self.is_closed())
            .finish()
    }
}

impl<T> Default for EventBus<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> EventBus<T> {
    /// Create an empty bus.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(BusInner {
                listeners: Mutex::new(HashMap::new()),
                next_id: AtomicU64::new(0),
                closed: AtomicBool::new(false),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<ListenerId, mpsc::UnboundedSender<T>>> {
        self.inner
            .listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a new listener.
    ///
    /// The listener receives every value broadcast after this call returns.
    /// Registering on a closed bus yields a listener that is already at its
    /// end.
    pub fn register(&self) -> Listener<T> {
        let id = ListenerId(self.inner.next_id.fetch_add(1, Ordering::Relaxed));
        let (tx, rx) = mpsc::unbounded_channel();
        let mut listeners = self.lock();
        if !self.is_closed() {
            listeners.insert(id, tx);
        }
        drop(listeners);
        trace!(listener = id.0, "Listener registered");
        Listener { id, rx }
    }

    /// Remove a listener and release its channel.
    ///
    /// Returns `true` if the listener was registered. Calling this again for
    /// the same id is a no-op.
    pub fn unregister(&self, id: ListenerId) -> bool {
        let removed = self.lock().remove(&id).is_some();
        if removed {
            trace!(listener = id.0, "Listener unregistered");
        }
        removed
    }

    /// Number of currently registered listeners.
    pub fn listener_count(&self) -> usize {
        self.lock().len()
    }

    /// Close the bus: every listener ends after draining its queue, and
    /// later registrations end immediately.
    pub fn close(&self) {
        let mut listeners = self.lock();
        self.inner.closed.store(true, Ordering::Release);
        listeners.clear();
    }

    /// Whether [`close`](Self::close) has been called.
    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::Acquire)
    }
}

impl<T: Clone> EventBus<T> {
    /// Deliver `value` to every registered listener.
    ///
    /// Returns the number of listeners that received it. With no listeners
    /// the value is dropped and this returns `0`.
    pub fn broadcast(&self, value: T) -> usize {
        let mut listeners = self.lock();
        listeners.retain(|id, tx| {
            let delivered = tx.send(value.clone()).is_ok();
            if !delivered {
                trace!(listener = id.0, "Pruning dropped listener");
            }
            delivered
        });
        listeners.len()
    }
}
