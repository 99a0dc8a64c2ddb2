//! # tidemark-feed
//!
//! Per-observer feed controllers. A [`FeedController`] keeps a capped,
//! newest-first list of change events for one organization, fed by periodic
//! [`EventStore`](tidemark_core::EventStore) snapshots and realtime
//! [`EventBus`](tidemark_bus::EventBus) pushes, with pause/resume
//! backpressure.
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use tidemark_bus::EventBus;
//! use tidemark_core::{FeedConfig, MemoryEventStore, Severity};
//! use tidemark_feed::FeedController;
//!
//! async fn watch_feed(bus: Arc<EventBus>, store: Arc<MemoryEventStore>) {
//!     let mut config = FeedConfig::for_org("org-1");
//!     config.min_severity = Some(Severity::Medium);
//!
//!     let feed = FeedController::new(config, store).with_bus(bus);
//!     if feed.start().is_ok() {
//!         let mut updates = feed.subscribe();
//!         while updates.changed().await.is_ok() {
//!             let view = updates.borrow().clone();
//!             println!("{} events, {} new", view.events.len(), view.new_event_count);
//!         }
//!     }
//! }
//! ```

mod controller;
mod error;
mod view;

pub use controller::FeedController;
pub use error::FeedError;
pub use view::FeedView;
