//! Error types for propsync-core.

use thiserror::Error;

/// All errors that can arise from header parsing and rendering.
#[derive(Debug, Error)]
pub enum CoreError {
    /// YAML serialization error while rendering a header entry.
    #[error("YAML serialization error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// A reserved revision property held a timestamp that is not RFC 3339.
    #[error("invalid revision timestamp '{value}': {source}")]
    RevisionTimestamp {
        value: String,
        #[source]
        source: chrono::ParseError,
    },

    /// The document's header block exists but could not be parsed, so
    /// rewriting it would discard user content.
    #[error("refusing to rewrite a malformed header block")]
    MalformedHeader,
}
