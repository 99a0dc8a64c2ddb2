//! Error types for tidemark-core.

use std::path::PathBuf;

use thiserror::Error;

use crate::types::ReconciliationStatus;

/// The only error the review workflow can produce.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReconciliationError {
    /// Requested transition is not in the legal set; state is left untouched.
    #[error("invalid reconciliation transition: {from} -> {to}")]
    InvalidTransition {
        from: ReconciliationStatus,
        to: ReconciliationStatus,
    },
}

/// Errors surfaced by an [`EventStore`](crate::query::EventStore) query.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The backing store could not be reached or timed out.
    #[error("event store unavailable: {0}")]
    Unavailable(String),

    /// The store rejected or failed to execute the query.
    #[error("event query failed: {0}")]
    Query(String),
}

/// Errors from loading a configuration document.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// YAML parse error on load; includes file path and line context from serde_yaml.
    #[error("failed to parse config at {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
}
