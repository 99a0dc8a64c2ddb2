use std::collections::{HashMap, VecDeque};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use chrono::Utc;
use parking_lot::RwLock;
use uuid::Uuid;

use tidemark_core::config::{BusConfig, DEFAULT_HISTORY_CAPACITY};
use tidemark_core::{ChangeEvent, EventFilter};

use crate::subscription::{ChangeTypes, Entry, Subscription};

/// Callback invoked for each delivered event.
pub type Handler = Arc<dyn Fn(&ChangeEvent) + Send + Sync>;

#[derive(Default)]
struct Registry {
    typed: HashMap<String, Vec<Arc<Entry>>>,
    global: Vec<Arc<Entry>>,
}

pub(crate) struct BusInner {
    next_id: AtomicU64,
    registry: RwLock<Registry>,
    history: RwLock<VecDeque<Arc<ChangeEvent>>>,
    capacity: usize,
}

impl BusInner {
    pub(crate) fn remove(&self, id: u64, types: Option<&ChangeTypes>) {
        let mut registry = self.registry.write();
        match types {
            Some(types) => {
                for t in &types.0 {
                    if let Some(entries) = registry.typed.get_mut(t) {
                        entries.retain(|e| e.id != id);
                        if entries.is_empty() {
                            registry.typed.remove(t);
                        }
                    }
                }
            }
            None => registry.global.retain(|e| e.id != id),
        }
    }
}

/// In-process event distributor. Cheap to clone; clones share state.
#[derive(Clone)]
pub struct EventBus {
    inner: Arc<BusInner>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_HISTORY_CAPACITY)
    }
}

impl EventBus {
    pub fn new(config: &BusConfig) -> Self {
        Self::with_capacity(config.history_capacity)
    }

    /// Bus whose history keeps at most `capacity` events (minimum 1).
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            inner: Arc::new(BusInner {
                next_id: AtomicU64::new(1),
                registry: RwLock::new(Registry::default()),
                history: RwLock::new(VecDeque::with_capacity(capacity)),
                capacity,
            }),
        }
    }

    pub fn capacity(&self) -> usize {
        self.inner.capacity
    }

    // -----------------------------------------------------------------------
    // Subscriptions
    // -----------------------------------------------------------------------

    /// Register `handler` for one or more change types.
    pub fn subscribe<F>(&self, types: impl Into<ChangeTypes>, handler: F) -> Subscription
    where
        F: Fn(&ChangeEvent) + Send + Sync + 'static,
    {
        let types = types.into();
        let entry = self.new_entry(Arc::new(handler));
        {
            let mut registry = self.inner.registry.write();
            for t in &types.0 {
                registry
                    .typed
                    .entry(t.clone())
                    .or_default()
                    .push(entry.clone());
            }
        }
        tracing::debug!(subscription = entry.id, types = ?types.0, "subscribed to event bus");
        Subscription {
            entry,
            types: Some(types),
            bus: Arc::downgrade(&self.inner),
        }
    }

    /// Register `handler` for every emitted event.
    pub fn subscribe_all<F>(&self, handler: F) -> Subscription
    where
        F: Fn(&ChangeEvent) + Send + Sync + 'static,
    {
        let entry = self.new_entry(Arc::new(handler));
        self.inner.registry.write().global.push(entry.clone());
        tracing::debug!(subscription = entry.id, "subscribed to all bus events");
        Subscription {
            entry,
            types: None,
            bus: Arc::downgrade(&self.inner),
        }
    }

    fn new_entry(&self, handler: Handler) -> Arc<Entry> {
        Arc::new(Entry {
            id: self.inner.next_id.fetch_add(1, Ordering::Relaxed),
            active: AtomicBool::new(true),
            handler,
        })
    }

    /// Number of live registrations (a multi-type subscription counts once).
    pub fn handler_count(&self) -> usize {
        let registry = self.inner.registry.read();
        let mut ids: Vec<u64> = registry
            .typed
            .values()
            .flatten()
            .chain(registry.global.iter())
            .map(|e| e.id)
            .collect();
        ids.sort_unstable();
        ids.dedup();
        ids.len()
    }

    // -----------------------------------------------------------------------
    // Emit
    // -----------------------------------------------------------------------

    /// Record `event` in history and deliver it to matching handlers.
    ///
    /// An event with a nil id is treated as unstamped: it gets a fresh v4 id
    /// and `created_at = now`. Typed handlers run before global handlers.
    /// A panicking handler is logged and skipped; delivery continues.
    pub fn emit(&self, mut event: ChangeEvent) -> Arc<ChangeEvent> {
        if event.id.is_nil() {
            event.id = Uuid::new_v4();
            event.created_at = Utc::now();
        }
        let event = Arc::new(event);

        {
            let mut history = self.inner.history.write();
            history.push_front(event.clone());
            history.truncate(self.inner.capacity);
        }

        // Snapshot so handlers can (un)subscribe during dispatch.
        let (typed, global) = {
            let registry = self.inner.registry.read();
            let typed = registry
                .typed
                .get(&event.change_type)
                .cloned()
                .unwrap_or_default();
            (typed, registry.global.clone())
        };

        let mut delivered = 0usize;
        for entry in typed.iter().chain(global.iter()) {
            if !entry.is_active() {
                continue;
            }
            if invoke(entry, &event) {
                delivered += 1;
            }
        }

        tracing::trace!(
            event_id = %event.id,
            change_type = %event.change_type,
            delivered,
            "event emitted",
        );
        event
    }

    // -----------------------------------------------------------------------
    // History
    // -----------------------------------------------------------------------

    /// Newest-first history, optionally truncated to `limit`.
    pub fn history(&self, limit: Option<usize>) -> Vec<Arc<ChangeEvent>> {
        let history = self.inner.history.read();
        let limit = limit.unwrap_or(history.len());
        history.iter().take(limit).cloned().collect()
    }

    /// Newest-first history entries matching `filter`.
    pub fn filtered_history(
        &self,
        filter: &EventFilter,
        limit: Option<usize>,
    ) -> Vec<Arc<ChangeEvent>> {
        let history = self.inner.history.read();
        let matching = history.iter().filter(|e| filter.matches(e)).cloned();
        match limit {
            Some(limit) => matching.take(limit).collect(),
            None => matching.collect(),
        }
    }

    pub fn clear_history(&self) {
        self.inner.history.write().clear();
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("capacity", &self.inner.capacity)
            .field("history_len", &self.inner.history.read().len())
            .field("handlers", &self.handler_count())
            .finish()
    }
}

/// Run one handler, containing any panic. Returns `false` if it panicked.
fn invoke(entry: &Entry, event: &ChangeEvent) -> bool {
    match catch_unwind(AssertUnwindSafe(|| (entry.handler)(event))) {
        Ok(()) => true,
        Err(panic) => {
            let message = panic
                .downcast_ref::<&str>()
                .map(|s| (*s).to_string())
                .or_else(|| panic.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "non-string panic payload".to_string());
            tracing::error!(
                subscription = entry.id,
                event_id = %event.id,
                change_type = %event.change_type,
                panic = %message,
                "event handler panicked; continuing dispatch",
            );
            false
        }
    }
}
