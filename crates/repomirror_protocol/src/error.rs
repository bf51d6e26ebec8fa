//! Error types for wire payload validation.

use thiserror::Error;

/// Result type for protocol operations.
pub type ProtocolResult<T> = Result<T, ProtocolError>;

/// Errors that can occur while decoding or validating remote payloads.
#[derive(Error, Debug)]
pub enum ProtocolError {
    /// The payload was not valid JSON or did not match the expected shape.
    #[error("invalid JSON payload: {0}")]
    InvalidJson(#[from] serde_json::Error),

    /// A field required by the entry's status was absent.
    #[error("missing field `{field}` in change entry for `{path}`")]
    MissingField {
        /// Name of the absent field.
        field: &'static str,
        /// Path of the change entry the field belongs to.
        path: String,
    },

    /// The remote reported a change status this protocol does not know.
    #[error("unknown change status `{status}` for `{path}`")]
    UnknownStatus {
        /// The unrecognized status string.
        status: String,
        /// Path of the offending change entry.
        path: String,
    },

    /// A revision identifier was present but empty.
    #[error("empty revision identifier")]
    EmptyRevision,

    /// A change entry carried an empty path.
    #[error("empty path in change entry")]
    EmptyPath,
}
