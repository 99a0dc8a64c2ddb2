//! Query contract consumed by feed controllers, plus an in-memory store.
//!
//! Durable storage belongs to the host application; [`MemoryEventStore`] is
//! the reference implementation used by tests and the CLI harness.

use async_trait::async_trait;
use parking_lot::RwLock;
use uuid::Uuid;

use crate::error::StoreError;
use crate::filter::EventFilter;
use crate::types::{ChangeEvent, OrgId};

/// A page request over stored events, newest first.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct EventQuery {
    pub filter: EventFilter,
    pub limit: Option<usize>,
    pub offset: usize,
}

impl EventQuery {
    pub fn for_org(org: impl Into<OrgId>) -> Self {
        Self {
            filter: EventFilter::for_org(org),
            ..Self::default()
        }
    }

    pub fn with_filter(mut self, filter: EventFilter) -> Self {
        self.filter = filter;
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn with_offset(mut self, offset: usize) -> Self {
        self.offset = offset;
        self
    }
}

/// Snapshot source for feed controllers.
///
/// Implementations own their own timeout/retry policy; callers treat a query
/// as an opaque async operation that resolves or fails.
#[async_trait]
pub trait EventStore: Send + Sync {
    async fn query_events(&self, query: &EventQuery) -> Result<Vec<ChangeEvent>, StoreError>;
}

/// Process-local store, newest first by `created_at`.
#[derive(Debug, Default)]
pub struct MemoryEventStore {
    events: RwLock<Vec<ChangeEvent>>,
}

impl MemoryEventStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, event: ChangeEvent) {
        let mut events = self.events.write();
        let at = events
            .iter()
            .position(|e| e.created_at <= event.created_at)
            .unwrap_or(events.len());
        events.insert(at, event);
    }

    /// Replace a stored event by id (reconciliation and sync updates).
    /// Returns `false` when no event has that id.
    pub fn update(&self, event: ChangeEvent) -> bool {
        let mut events = self.events.write();
        match events.iter_mut().find(|e| e.id == event.id) {
            Some(slot) => {
                *slot = event;
                true
            }
            None => false,
        }
    }

    pub fn get(&self, id: Uuid) -> Option<ChangeEvent> {
        self.events.read().iter().find(|e| e.id == id).cloned()
    }

    pub fn len(&self) -> usize {
        self.events.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.read().is_empty()
    }

    pub fn query(&self, query: &EventQuery) -> Vec<ChangeEvent> {
        let events = self.events.read();
        let matching = events
            .iter()
            .filter(|e| query.filter.matches(e))
            .skip(query.offset)
            .cloned();
        match query.limit {
            Some(limit) => matching.take(limit).collect(),
            None => matching.collect(),
        }
    }
}

#[async_trait]
impl EventStore for MemoryEventStore {
    async fn query_events(&self, query: &EventQuery) -> Result<Vec<ChangeEvent>, StoreError> {
        Ok(self.query(query))
    }
}
