//! Tidemark core library: change-event model, review/sync state machines,
//! filters, the query contract, and configuration.
//!
//! - [`types`]: newtypes, enums, and [`ChangeEvent`]
//! - [`reconciliation`]: the review workflow state machine
//! - [`filter`]: the shared event predicate used by feeds, history, and stores
//! - [`query`]: [`EventStore`] contract and [`MemoryEventStore`]
//! - [`config`]: serde config documents with YAML loading
//! - [`error`]: error enums

pub mod config;
pub mod error;
pub mod filter;
pub mod query;
pub mod reconciliation;
pub mod types;

pub use config::{BusConfig, ClassifierConfig, FeedConfig, TidemarkConfig};
pub use error::{ConfigError, ReconciliationError, StoreError};
pub use filter::EventFilter;
pub use query::{EventQuery, EventStore, MemoryEventStore};
pub use reconciliation::ReviewAction;
pub use types::{
    Actor, ChangeDiff, ChangeEvent, FieldChange, OrgId, ReconciliationStatus, RecordKey,
    Severity, SourceKind, SyncStatus,
};
