use std::path::PathBuf;

use thiserror::Error;

/// Errors surfaced by the session registry
#[derive(Debug, Error)]
pub enum SessionError {
    /// Secure randomness could not be obtained; retrying may succeed
    #[error("secure random source unavailable: {0}")]
    RandomSource(String),

    /// Writing, reading or removing a session file failed
    /// In-memory state that triggered the write is kept
    #[error("session persistence failed for {}: {source}", path.display())]
    Persistence {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The referenced session id is unknown (or already expired)
    #[error("session not found: {0}")]
    NotFound(String),

    /// A persisted session file could not be parsed
    #[error("corrupt session file {}: {source}", path.display())]
    Deserialization {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

impl SessionError {
    pub(crate) fn persistence(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Persistence {
            path: path.into(),
            source,
        }
    }

    /// Whether the caller should treat this as "not logged in"
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

/// Output fault reported by a log sink
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("sink write failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("sink closed")]
    Closed,
}
