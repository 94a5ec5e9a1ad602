// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use tracing::warn;

use crate::event::Event;

type Listener = Arc<dyn Fn(&Event) + Send + Sync>;

struct ListenerEntry {
    id: u64,
    listener: Listener,
}

/// Thread-safe pub/sub for [`Event`]. Listeners are snapshotted
/// under a read lock and invoked outside it, so a listener may subscribe or
/// unsubscribe without deadlocking the emitter. Delivery within one `emit`
/// call is stable: insertion order of the listeners registered at the time
/// of the snapshot.
///
/// Shares the read-copy-update shape used by `kit_hooks::PriorityRegistry`:
/// mutation clones, modifies, and replaces the inner `Arc<Vec<_>>` under a
/// write lock; reads clone the `Arc` itself under a read lock and iterate
/// unlocked.
#[derive(Clone)]
pub struct EventBus {
    listeners: Arc<RwLock<Arc<Vec<ListenerEntry>>>>,
    next_id: Arc<AtomicU64>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

/// Handle returned by [`EventBus::subscribe`]. Dropping it does nothing —
/// call [`Subscription::unsubscribe`] explicitly. Unsubscription is an
/// explicit per-listener token, not a scope guard.
pub struct Subscription {
    id: u64,
    bus: EventBus,
}

impl Subscription {
    pub fn unsubscribe(self) {
        self.bus.remove(self.id);
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self { listeners: Arc::new(RwLock::new(Arc::new(Vec::new()))), next_id: Arc::new(AtomicU64::new(1)) }
    }

    /// Register a listener, invoked for every subsequent `emit`.
    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
    F: Fn(&Event) + Send + Sync + 'static,
    {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let mut guard = self.listeners.write().expect("event bus lock poisoned");
        let mut next: Vec<ListenerEntry> = (**guard).iter().map(|e| ListenerEntry { id: e.id, listener: e.listener.clone() }).collect();
        next.push(ListenerEntry { id, listener: Arc::new(listener) });
        *guard = Arc::new(next);
        Subscription { id, bus: self.clone() }
    }

    fn remove(&self, id: u64) {
        let mut guard = self.listeners.write().expect("event bus lock poisoned");
        let next: Vec<ListenerEntry> = (**guard).iter().filter(|e| e.id != id).map(|e| ListenerEntry { id: e.id, listener: e.listener.clone() }).collect();
        *guard = Arc::new(next);
    }

    /// Deliver `event` to every currently-registered listener, in stable
    /// registration order. A listener that panics is recovered and logged;
    /// later listeners still run (mirrors `kit_hooks`' panic policy).
    pub fn emit(&self, event: Event) {
        let snapshot = self.listeners.read().expect("event bus lock poisoned").clone();
        for entry in snapshot.iter() {
            let listener = entry.listener.clone();
            let event_ref = &event;
            let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| listener(event_ref)));
            if result.is_err() {
                warn!(listener_id = entry.id, "event bus listener panicked; skipping");
            }
        }
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.read().expect("event bus lock poisoned").len()
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
