//! Error types for tidemark-feed.

use thiserror::Error;

use tidemark_core::StoreError;

#[derive(Debug, Error)]
pub enum FeedError {
    /// The snapshot query failed. The view keeps its previous list.
    #[error("snapshot query failed: {0}")]
    Store(#[from] StoreError),

    /// `start()` was called outside a tokio runtime with auto-refresh enabled.
    #[error("feed auto-refresh needs a running tokio runtime")]
    NoRuntime,
}
