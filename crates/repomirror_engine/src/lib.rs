//! # Repomirror Sync Engine
//!
//! Pass state machine and filesystem applier for repomirror.
//!
//! This crate provides:
//! - Sync pass state machine (idle → resolving → diffing → applying)
//! - Revision store with crash-safe persistence
//! - Remote repository abstraction (real HTTP host + mock)
//! - HTTP client abstraction
//! - Filesystem change applier with path-escape protection
//!
//! ## Architecture
//!
//! One pass mirrors the remote repository's latest revision into a local
//! directory tree:
//! 1. Resolve the branch head and compare it to the stored revision
//! 2. Short-circuit if nothing changed
//! 3. Fetch the changeset and apply it change by change
//! 4. Persist the new revision only after every change succeeded
//!
//! ## Key Invariants
//!
//! - The stored revision always reflects a fully-applied changeset
//! - Applying a change is idempotent (byte-identical content is skipped,
//!   deleting an absent file succeeds)
//! - Relative paths never escape the destination root
//! - A cancelled pass behaves exactly like a failed pass

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod error;
mod fs_applier;
mod http;
mod remote;
mod state;
mod store;

pub use config::{MirrorConfig, DEFAULT_API_BASE, DEFAULT_TIMEOUT};
pub use error::{SyncError, SyncResult};
pub use fs_applier::{ApplyOutcome, ChangeApplier};
pub use http::{HttpClient, HttpResponse, ReqwestClient};
pub use remote::{GitHubRemote, MockRemote, RemoteRepository};
pub use state::{PassOutcome, PassReport, SyncEngine, SyncState, SyncStats};
pub use store::{FileRevisionStore, MemoryRevisionStore, RevisionStore, REVISION_STATE_FILE};
