//! # Repomirror Protocol
//!
//! Revision and changeset types for the repomirror sync engine.
//!
//! This crate provides:
//! - `RevisionId` for opaque points in remote history
//! - `FileChange` / `Changeset` for per-file differences between revisions
//! - `RemoteEntry` for directory listings of the remote tree
//! - JSON wire payloads of the remote host API and their validated
//!   conversion into domain types
//!
//! This is a pure data crate with no I/O operations.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod change;
mod error;
mod messages;
mod revision;

pub use change::{Changeset, FileChange, FileStatus, RemoteEntry};
pub use error::{ProtocolError, ProtocolResult};
pub use messages::{BranchHeadPayload, CompareFilePayload, ComparePayload, decode_contents};
pub use revision::RevisionId;
