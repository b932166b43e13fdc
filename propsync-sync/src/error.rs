//! Error types for propsync-sync.

use std::path::PathBuf;

use thiserror::Error;

use propsync_core::CoreError;

/// All errors that can arise from reconciliation.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Header rendering or parsing failed.
    #[error("header error: {0}")]
    Core(#[from] CoreError),

    /// An I/O error, with annotated path for context.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The document store has no document at this path.
    #[error("document not found: {path}")]
    NotFound { path: PathBuf },

    /// YAML error while handling a raw schema table.
    #[error("schema YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// JSON error while (de)serializing the last-seen schema snapshot.
    #[error("schema snapshot JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The reconciliation lock is held by a bulk run or a pending decision.
    #[error("reconciliation is busy")]
    Busy,

    /// Failure reported by an external port (document store, persistence,
    /// last-seen cache).
    #[error("{port} error: {source}")]
    Port {
        port: &'static str,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl SyncError {
    pub fn port(
        port: &'static str,
        source: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        SyncError::Port {
            port,
            source: source.into(),
        }
    }
}

/// Convenience constructor for [`SyncError::Io`].
pub fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> SyncError {
    SyncError::Io {
        path: path.into(),
        source,
    }
}
