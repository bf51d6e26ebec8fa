//! Error types for the sync engine.

use repomirror_protocol::{ProtocolError, RevisionId};
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors that can occur during a sync pass.
#[derive(Error, Debug)]
pub enum SyncError {
    /// Network or transport failure reaching the remote host.
    #[error("remote unavailable: {message}")]
    RemoteUnavailable {
        /// Transport-level detail.
        message: String,
    },

    /// The requested remote object does not exist.
    #[error("remote object not found: {0}")]
    NotFound(String),

    /// The remote's payload could not be parsed or violated the protocol.
    #[error("malformed remote response: {0}")]
    MalformedResponse(String),

    /// The remote reports the two revisions are not comparable.
    #[error("revisions {from} and {to} are not comparable on the remote")]
    InvalidRange {
        /// Base revision of the attempted comparison.
        from: RevisionId,
        /// Target revision of the attempted comparison.
        to: RevisionId,
    },

    /// Fetching a changed file's content failed.
    #[error("failed to fetch content from {url}: {message}")]
    ContentFetchFailed {
        /// The content reference that failed.
        url: String,
        /// Transport-level detail.
        message: String,
    },

    /// A filesystem operation at the destination failed.
    #[error("filesystem error at {path}: {source}")]
    Filesystem {
        /// The path the operation touched.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// A change entry's relative path resolves outside the destination root.
    #[error("path `{path}` escapes the destination root")]
    PathEscape {
        /// The offending relative path.
        path: String,
    },

    /// The pass was cancelled.
    #[error("sync pass cancelled")]
    Cancelled,

    /// Another pass is already running on this engine.
    #[error("a sync pass is already in progress")]
    PassInProgress,
}

impl SyncError {
    /// Creates a `RemoteUnavailable` error.
    pub fn remote_unavailable(message: impl Into<String>) -> Self {
        Self::RemoteUnavailable {
            message: message.into(),
        }
    }

    /// Creates a `ContentFetchFailed` error.
    pub fn content_fetch_failed(url: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ContentFetchFailed {
            url: url.into(),
            message: message.into(),
        }
    }

    /// Creates a `Filesystem` error.
    pub fn filesystem(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Filesystem {
            path: path.into(),
            source,
        }
    }

    /// Returns true if a later pass may succeed without operator action.
    ///
    /// Transient transport failures are retryable; protocol violations,
    /// path escapes, and missing remote objects are not. The engine never
    /// retries on its own — this classification is for the host's policy.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            SyncError::RemoteUnavailable { .. } | SyncError::ContentFetchFailed { .. }
        )
    }
}

impl From<ProtocolError> for SyncError {
    fn from(err: ProtocolError) -> Self {
        Self::MalformedResponse(err.to_string())
    }
}
