//! # tidemark-chain
//!
//! Content hashing, per-record hash chains, sync status tracking, and the
//! ingestion pipeline that ties them to the classifier and the event bus.
//!
//! Call [`ChangePipeline::submit`] for each incoming change. Persist
//! [`ChangePipeline::chain_index`] with [`index::save_at`] if chains must
//! survive a restart.

pub mod canonical;
pub mod error;
pub mod index;
pub mod pipeline;
pub mod tracker;

pub use canonical::{canonical_json, content_hash, hash_canonical, HashSubject};
pub use error::IngestError;
pub use index::{ChainHead, ChainIndex, ChainIndexFile, ChainLink};
pub use pipeline::{ChangeInput, ChangePipeline, IngestOutcome};
pub use tracker::{format_age, SyncRecord, SyncSummary, SyncTracker};
