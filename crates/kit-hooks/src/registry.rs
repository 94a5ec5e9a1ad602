// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use tracing::warn;

struct HandlerEntry<In, Out> {
    id: u64,
    priority: i32,
    seq: u64,
    handler: Arc<dyn Fn(&In) -> Option<Out> + Send + Sync>,
}

/// A generic "priority registry of `(In, Out)` handlers that returns the
/// first non-nil result" — the one abstraction backing all four
/// of hook families.
///
/// Registrations take a write lock to mutate the handler list; invocations
/// snapshot the list under a read lock and iterate unlocked, matching the read-copy-update idiom used elsewhere in
/// this codebase for live-refreshable shared state.
pub struct PriorityRegistry<In, Out> {
    handlers: RwLock<Arc<Vec<HandlerEntry<In, Out>>>>,
    next_id: AtomicU64,
    next_seq: AtomicU64,
}

impl<In, Out> Default for PriorityRegistry<In, Out> {
    fn default() -> Self {
        Self { handlers: RwLock::new(Arc::new(Vec::new())), next_id: AtomicU64::new(0), next_seq: AtomicU64::new(0) }
    }
}

/// A token returned by [`PriorityRegistry::register`]. Call `.unregister()`
/// (or drop the registry reference) to remove the handler.
pub struct Unregister<In, Out> {
    id: u64,
    registry: Arc<PriorityRegistryHandle<In, Out>>,
}

impl<In, Out> Unregister<In, Out> {
    pub fn unregister(self) {
        self.registry.remove(self.id);
    }
}

/// Shared handle so `register` can hand back an unregister closure without
/// requiring `PriorityRegistry` itself to be wrapped in an `Arc` by callers.
pub struct PriorityRegistryHandle<In, Out>(PriorityRegistry<In, Out>);

impl<In, Out> Default for PriorityRegistryHandle<In, Out> {
    fn default() -> Self {
        Self(PriorityRegistry::default())
    }
}

impl<In, Out> PriorityRegistryHandle<In, Out> {
    fn remove(&self, id: u64) {
        let mut guard = self.0.handlers.write().expect("hook registry lock poisoned");
        let retained: Vec<HandlerEntry<In, Out>> =
        guard.iter().filter(|h| h.id != id).map(clone_entry).collect();
        *guard = Arc::new(retained);
    }
}

fn clone_entry<In, Out>(e: &HandlerEntry<In, Out>) -> HandlerEntry<In, Out> {
    HandlerEntry { id: e.id, priority: e.priority, seq: e.seq, handler: e.handler.clone() }
}

impl<In, Out> std::ops::Deref for PriorityRegistryHandle<In, Out> {
    type Target = PriorityRegistry<In, Out>;
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl<In, Out> PriorityRegistry<In, Out> {
    pub fn new() -> Arc<PriorityRegistryHandle<In, Out>> {
        Arc::new(PriorityRegistryHandle::default())
    }
}

impl<In, Out> PriorityRegistryHandle<In, Out>
where
In: 'static,
Out: 'static,
{
    /// Register a handler at `priority` (lower runs first). Within equal
    /// priority, registration order is preserved. Returns an unregister
    /// token.
    pub fn register<F>(self: &Arc<Self>, priority: i32, handler: F) -> Unregister<In, Out>
    where
    F: Fn(&In) -> Option<Out> + Send + Sync + 'static,
    {
        let id = self.0.next_id.fetch_add(1, Ordering::SeqCst);
        let seq = self.0.next_seq.fetch_add(1, Ordering::SeqCst);
        let entry = HandlerEntry { id, priority, seq, handler: Arc::new(handler) };
        let mut guard = self.0.handlers.write().expect("hook registry lock poisoned");
        let mut next: Vec<HandlerEntry<In, Out>> = guard.iter().map(clone_entry).collect();
        next.push(entry);
        next.sort_by(|a, b| a.priority.cmp(&b.priority).then(a.seq.cmp(&b.seq)));
        *guard = Arc::new(next);
        Unregister { id, registry: self.clone() }
    }

    /// Register an observation-only handler (no return value), for chains
    /// like `AfterTurn` where every handler fires.
    pub fn register_observer<F>(self: &Arc<Self>, priority: i32, handler: F) -> Unregister<In, Out>
    where
    F: Fn(&In) -> Option<Out> + Send + Sync + 'static,
    Out: Default,
    {
        self.register(priority, handler)
    }

    /// Run handlers in order; the first non-nil result wins and the rest
    /// are not consulted. A panicking handler is recovered, logged, and
    /// skipped.
    pub fn invoke_first(&self, input: &In) -> Option<Out> {
        let snapshot = self.0.handlers.read().expect("hook registry lock poisoned").clone();
        for entry in snapshot.iter() {
            let handler = entry.handler.clone();
            let result = catch_unwind(AssertUnwindSafe(|| handler(input)));
            match result {
                Ok(Some(out)) => return Some(out),
                Ok(None) => continue,
                Err(_) => {
                    warn!(handler_id = entry.id, "hook handler panicked; skipping");
                    continue;
                }
            }
        }
        None
    }

    /// Invoke every registered handler, for observation-only chains. Return
    /// values (if any) are discarded; a panic in one handler does not
    /// prevent the remaining handlers from running.
    pub fn invoke_all(&self, input: &In) {
        let snapshot = self.0.handlers.read().expect("hook registry lock poisoned").clone();
        for entry in snapshot.iter() {
            let handler = entry.handler.clone();
            if catch_unwind(AssertUnwindSafe(|| handler(input))).is_err() {
                warn!(handler_id = entry.id, "hook handler panicked; skipping");
            }
        }
    }

    pub fn len(&self) -> usize {
        self.0.handlers.read().expect("hook registry lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_non_nil_result_wins() {
        let reg: Arc<PriorityRegistryHandle<i32, i32>> = PriorityRegistry::new();
        reg.register(10, |_x: &i32| None);
        reg.register(5, |x: &i32| Some(x * 2));
        reg.register(0, |_x: &i32| None);
        assert_eq!(reg.invoke_first(&3), Some(6));
    }

    #[test]
    fn lower_priority_runs_first() {
        let reg: Arc<PriorityRegistryHandle<i32, &'static str>> = PriorityRegistry::new();
        reg.register(10, |_| Some("late"));
        reg.register(0, |_| Some("early"));
        assert_eq!(reg.invoke_first(&0), Some("early"));
    }

    #[test]
    fn equal_priority_preserves_registration_order() {
        let reg: Arc<PriorityRegistryHandle<i32, &'static str>> = PriorityRegistry::new();
        reg.register(5, |_| Some("first"));
        reg.register(5, |_| Some("second"));
        assert_eq!(reg.invoke_first(&0), Some("first"));
    }

    #[test]
    fn no_handlers_returns_none() {
        let reg: Arc<PriorityRegistryHandle<i32, i32>> = PriorityRegistry::new();
        assert_eq!(reg.invoke_first(&1), None);
    }

    #[test]
    fn unregister_removes_handler() {
        let reg: Arc<PriorityRegistryHandle<i32, i32>> = PriorityRegistry::new();
        let token = reg.register(0, |x: &i32| Some(*x));
        assert_eq!(reg.len(), 1);
        token.unregister();
        assert_eq!(reg.len(), 0);
        assert_eq!(reg.invoke_first(&5), None);
    }

    #[test]
    fn panicking_handler_is_recovered_and_skipped() {
        let reg: Arc<PriorityRegistryHandle<i32, i32>> = PriorityRegistry::new();
        reg.register(0, |_: &i32| -> Option<i32> { panic!("boom") });
        reg.register(1, |x: &i32| Some(*x + 1));
        assert_eq!(reg.invoke_first(&1), Some(2));
    }

    #[test]
    fn invoke_all_calls_every_handler() {
        let reg: Arc<PriorityRegistryHandle<i32, ()>> = PriorityRegistry::new();
        let count = Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let c1 = count.clone();
        let c2 = count.clone();
        reg.register_observer(0, move |_| {
                c1.fetch_add(1, Ordering::SeqCst);
                None
        });
        reg.register_observer(1, move |_| {
                c2.fetch_add(1, Ordering::SeqCst);
                None
        });
        reg.invoke_all(&0);
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }
}
