use std::sync::Arc;

use chrono::{DateTime, Utc};

use tidemark_core::ChangeEvent;

/// Immutable snapshot of a feed, replaced wholesale on every write.
#[derive(Debug, Clone, Default)]
pub struct FeedView {
    /// Newest first, at most `max_events` long.
    pub events: Vec<Arc<ChangeEvent>>,
    /// Matching pushes seen while paused.
    pub new_event_count: usize,
    pub paused: bool,
    pub loading: bool,
    /// Message of the last failed fetch; cleared by the next successful one.
    pub error: Option<String>,
    pub last_refreshed: Option<DateTime<Utc>>,
}

impl FeedView {
    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}
