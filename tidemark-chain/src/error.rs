//! Error types for tidemark-chain.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can arise while ingesting a change or persisting chain state.
#[derive(Debug, Error)]
pub enum IngestError {
    /// The change content could not be canonicalized for hashing. Nothing was
    /// recorded and the record's chain was not advanced.
    #[error("cannot serialize change content for hashing: {0}")]
    Serialization(#[source] serde_json::Error),

    /// An I/O error, with annotated path for context.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Chain index file is not valid JSON for the expected shape.
    #[error("chain index JSON error at {path}: {source}")]
    IndexFormat {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Convenience constructor for [`IngestError::Io`].
pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> IngestError {
    IngestError::Io {
        path: path.into(),
        source,
    }
}
