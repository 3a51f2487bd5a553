// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Push-style event streams.
//!
//! An [`Emitter`] delivers each event synchronously to every listener, in subscription order.
//! Subscribing returns a [`Subscription`] that unregisters the listener when disposed or
//! dropped.

use debug_ignore::DebugIgnore;
use std::sync::{
    Arc, Mutex, PoisonError,
    atomic::{AtomicU64, Ordering},
};

type Listener<T> = Arc<dyn Fn(&T) + Send + Sync>;

struct Listeners<T> {
    next_id: AtomicU64,
    entries: Mutex<Vec<(u64, Listener<T>)>>,
}

/// A stream of events of type `T`.
pub struct Emitter<T> {
    listeners: Arc<Listeners<T>>,
}

impl<T: 'static> std::fmt::Debug for Emitter<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Emitter")
            .field("listener_count", &self.listener_count())
            .finish()
    }
}

impl<T: 'static> Default for Emitter<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: 'static> Emitter<T> {
    /// Creates an emitter with no listeners.
    pub fn new() -> Self {
        Self {
            listeners: Arc::new(Listeners {
                next_id: AtomicU64::new(0),
                entries: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Registers `listener`. It is called for every event until the returned subscription is
    /// disposed or dropped.
    #[must_use = "dropping the subscription unregisters the listener"]
    pub fn subscribe(&self, listener: impl Fn(&T) + Send + Sync + 'static) -> Subscription {
        let id = self.listeners.next_id.fetch_add(1, Ordering::Relaxed);
        self.listeners
            .entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((id, Arc::new(listener)));

        let listeners = Arc::downgrade(&self.listeners);
        Subscription::new(move || {
            if let Some(listeners) = listeners.upgrade() {
                listeners
                    .entries
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .retain(|(entry_id, _)| *entry_id != id);
            }
        })
    }

    /// Delivers `event` to every current listener, in subscription order.
    pub fn emit(&self, event: &T) {
        // Snapshot so listeners may subscribe or unsubscribe while being called.
        let snapshot: Vec<_> = self
            .listeners
            .entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(_, listener)| listener.clone())
            .collect();
        for listener in snapshot {
            listener(event);
        }
    }

    /// Removes every listener.
    pub fn clear(&self) {
        self.listeners
            .entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    /// The number of registered listeners.
    pub fn listener_count(&self) -> usize {
        self.listeners
            .entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

/// A handle to a registration. Disposing or dropping it undoes the registration.
#[derive(Debug)]
pub struct Subscription {
    on_dispose: DebugIgnore<Option<Box<dyn FnOnce() + Send + Sync>>>,
}

impl Subscription {
    /// Creates a subscription that runs `on_dispose` exactly once.
    pub fn new(on_dispose: impl FnOnce() + Send + Sync + 'static) -> Self {
        Self {
            on_dispose: DebugIgnore(Some(Box::new(on_dispose))),
        }
    }

    /// Undoes the registration. Calling this more than once has no further effect.
    pub fn dispose(&mut self) {
        if let Some(on_dispose) = self.on_dispose.take() {
            on_dispose();
        }
    }

    /// Returns true if the subscription has been disposed.
    pub fn is_disposed(&self) -> bool {
        self.on_dispose.is_none()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.dispose();
    }
}
