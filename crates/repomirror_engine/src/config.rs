//! Configuration for the sync engine.

use repomirror_protocol::RevisionId;
use std::path::PathBuf;
use std::time::Duration;

/// Default API base of the remote host.
pub const DEFAULT_API_BASE: &str = "https://api.github.com";

/// Default network timeout per request.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Configuration for one mirrored repository.
#[derive(Debug, Clone)]
pub struct MirrorConfig {
    /// Owner of the remote repository.
    pub owner: String,
    /// Name of the remote repository.
    pub repository: String,
    /// Branch whose head is mirrored.
    pub branch: String,
    /// Local directory the tree is written into.
    pub destination: PathBuf,
    /// Revision assumed when no sync has ever completed.
    pub initial_revision: RevisionId,
    /// Base URL of the remote host API.
    pub api_base: String,
    /// Timeout for each network request.
    pub timeout: Duration,
}

impl MirrorConfig {
    /// Creates a configuration for one repository mirror.
    pub fn new(
        owner: impl Into<String>,
        repository: impl Into<String>,
        branch: impl Into<String>,
        destination: impl Into<PathBuf>,
        initial_revision: impl Into<RevisionId>,
    ) -> Self {
        Self {
            owner: owner.into(),
            repository: repository.into(),
            branch: branch.into(),
            destination: destination.into(),
            initial_revision: initial_revision.into(),
            api_base: DEFAULT_API_BASE.to_string(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Sets the API base URL (self-hosted or test servers).
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }

    /// Sets the per-request network timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}
