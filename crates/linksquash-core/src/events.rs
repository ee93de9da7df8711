//! Change notification for persisted keys.
//!
//! `EventBus` delivers events to subscribers registered under a storage key.
//! Platform-specific implementations handle thread safety:
//! - Native: `Arc<EventBus>` with `RwLock` for multi-threaded hosts
//! - WASM: `Rc<EventBus>` with `RefCell` for the single-threaded browser page

// ============================================================================
// Native (multi-threaded) implementation
// ============================================================================

#[cfg(not(target_arch = "wasm32"))]
mod platform {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, RwLock, Weak};

    /// Shared ownership pointer used across the crate.
    pub type Shared<T> = Arc<T>;

    /// Callback accepted by `EventBus::subscribe`.
    pub trait Listener<E>: Fn(E) + Send + Sync + 'static {}
    impl<E, F: Fn(E) + Send + Sync + 'static> Listener<E> for F {}

    trait Unsubscribe: Send + Sync {
        fn unsubscribe(&self, id: usize);
    }

    /// Subscription handle that unsubscribes automatically when dropped.
    ///
    /// Hold this value for as long as the observing component lives; drop it
    /// (or call `dispose`) to stop receiving events.
    pub struct Subscription {
        bus: Weak<dyn Unsubscribe>,
        id: usize,
    }

    impl Subscription {
        /// Unsubscribe now. Equivalent to dropping the handle.
        pub fn dispose(self) {}
    }

    impl Drop for Subscription {
        fn drop(&mut self) {
            if let Some(bus) = self.bus.upgrade() {
                bus.unsubscribe(self.id);
            }
        }
    }

    type Callback<E> = Arc<dyn Fn(E) + Send + Sync>;

    /// Keyed event bus.
    ///
    /// Wrap in `Arc` to enable subscriptions.
    pub struct EventBus<E> {
        callbacks: RwLock<Vec<(usize, String, Callback<E>)>>,
        next_id: AtomicUsize,
    }

    impl<E> Default for EventBus<E> {
        fn default() -> Self {
            Self {
                callbacks: RwLock::new(Vec::new()),
                next_id: AtomicUsize::new(0),
            }
        }
    }

    impl<E: Clone + 'static> EventBus<E> {
        pub fn new() -> Self {
            Self::default()
        }

        /// Subscribe to events published under `key`.
        pub fn subscribe(self: &Arc<Self>, key: &str, callback: impl Listener<E>) -> Subscription {
            let id = self.next_id.fetch_add(1, Ordering::Relaxed);
            self.callbacks
                .write()
                .unwrap_or_else(|e| e.into_inner())
                .push((id, key.to_string(), Arc::new(callback)));
            let bus: Weak<EventBus<E>> = Arc::downgrade(self);
            Subscription { bus, id }
        }

        /// Emit an event to every subscriber of `key`.
        pub fn emit(&self, key: &str, event: E) {
            // Snapshot so a callback may subscribe or drop its handle.
            let callbacks: Vec<_> = self
                .callbacks
                .read()
                .unwrap_or_else(|e| e.into_inner())
                .iter()
                .filter(|(_, k, _)| k == key)
                .map(|(_, _, cb)| Arc::clone(cb))
                .collect();

            for callback in callbacks {
                callback(event.clone());
            }
        }

        /// Number of live subscriptions for `key`.
        pub fn subscriber_count(&self, key: &str) -> usize {
            self.callbacks
                .read()
                .unwrap_or_else(|e| e.into_inner())
                .iter()
                .filter(|(_, k, _)| k == key)
                .count()
        }
    }

    impl<E: 'static> Unsubscribe for EventBus<E> {
        fn unsubscribe(&self, id: usize) {
            // try_write: Drop may run during unwinding while emit holds a read lock.
            if let Ok(mut guard) = self.callbacks.try_write() {
                guard.retain(|(i, _, _)| *i != id);
            }
        }
    }
}

// ============================================================================
// WASM (single-threaded) implementation
// ============================================================================

#[cfg(target_arch = "wasm32")]
mod platform {
    use std::cell::{Cell, RefCell};
    use std::rc::{Rc, Weak};

    /// Shared ownership pointer used across the crate.
    pub type Shared<T> = Rc<T>;

    /// Callback accepted by `EventBus::subscribe`.
    pub trait Listener<E>: Fn(E) + 'static {}
    impl<E, F: Fn(E) + 'static> Listener<E> for F {}

    trait Unsubscribe {
        fn unsubscribe(&self, id: usize);
    }

    /// Subscription handle that unsubscribes automatically when dropped.
    ///
    /// Hold this value for as long as the observing component lives; drop it
    /// (or call `dispose`) to stop receiving events.
    pub struct Subscription {
        bus: Weak<dyn Unsubscribe>,
        id: usize,
    }

    impl Subscription {
        /// Unsubscribe now. Equivalent to dropping the handle.
        pub fn dispose(self) {}
    }

    impl Drop for Subscription {
        fn drop(&mut self) {
            if let Some(bus) = self.bus.upgrade() {
                bus.unsubscribe(self.id);
            }
        }
    }

    type Callback<E> = Rc<dyn Fn(E)>;

    /// Keyed event bus.
    ///
    /// Wrap in `Rc` to enable subscriptions.
    pub struct EventBus<E> {
        callbacks: RefCell<Vec<(usize, String, Callback<E>)>>,
        next_id: Cell<usize>,
    }

    impl<E> Default for EventBus<E> {
        fn default() -> Self {
            Self {
                callbacks: RefCell::new(Vec::new()),
                next_id: Cell::new(0),
            }
        }
    }

    impl<E: Clone + 'static> EventBus<E> {
        pub fn new() -> Self {
            Self::default()
        }

        /// Subscribe to events published under `key`.
        pub fn subscribe(self: &Rc<Self>, key: &str, callback: impl Listener<E>) -> Subscription {
            let id = self.next_id.get();
            self.next_id.set(id + 1);
            self.callbacks
                .borrow_mut()
                .push((id, key.to_string(), Rc::new(callback)));
            let bus: Weak<EventBus<E>> = Rc::downgrade(self);
            Subscription { bus, id }
        }

        /// Emit an event to every subscriber of `key`.
        pub fn emit(&self, key: &str, event: E) {
            // Snapshot so a callback may subscribe or drop its handle.
            let callbacks: Vec<_> = self
                .callbacks
                .borrow()
                .iter()
                .filter(|(_, k, _)| k == key)
                .map(|(_, _, cb)| Rc::clone(cb))
                .collect();

            for callback in callbacks {
                callback(event.clone());
            }
        }

        /// Number of live subscriptions for `key`.
        pub fn subscriber_count(&self, key: &str) -> usize {
            self.callbacks
                .borrow()
                .iter()
                .filter(|(_, k, _)| k == key)
                .count()
        }
    }

    impl<E: 'static> Unsubscribe for EventBus<E> {
        fn unsubscribe(&self, id: usize) {
            if let Ok(mut guard) = self.callbacks.try_borrow_mut() {
                guard.retain(|(i, _, _)| *i != id);
            }
        }
    }
}

pub use platform::*;
