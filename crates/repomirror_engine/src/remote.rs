//! Remote repository abstraction.

use crate::error::{SyncError, SyncResult};
use crate::http::HttpClient;
use repomirror_protocol::{
    decode_contents, BranchHeadPayload, Changeset, ComparePayload, FileChange, RemoteEntry,
    RevisionId,
};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

/// Read-only interface to the remote VCS host.
///
/// Implementations perform network reads only; no operation here mutates
/// remote state.
pub trait RemoteRepository: Send + Sync {
    /// Resolves the revision a branch currently points at.
    fn resolve_latest(&self, branch: &str) -> SyncResult<RevisionId>;

    /// Computes the ordered file changes between two revisions.
    fn diff(&self, from: &RevisionId, to: &RevisionId) -> SyncResult<Changeset>;

    /// Fetches the raw bytes of one changed file by reference.
    fn fetch_content(&self, url: &str) -> SyncResult<Vec<u8>>;

    /// Lists one level of the repository's current tree.
    fn list_dir(&self, path: &str) -> SyncResult<Vec<RemoteEntry>>;
}

/// Remote repository on a GitHub-style HTTP API.
pub struct GitHubRemote<C: HttpClient> {
    api_base: String,
    owner: String,
    repository: String,
    client: C,
}

impl<C: HttpClient> GitHubRemote<C> {
    /// Creates a remote for one repository.
    pub fn new(
        api_base: impl Into<String>,
        owner: impl Into<String>,
        repository: impl Into<String>,
        client: C,
    ) -> Self {
        Self {
            api_base: api_base.into().trim_end_matches('/').to_string(),
            owner: owner.into(),
            repository: repository.into(),
            client,
        }
    }

    fn repo_url(&self, tail: &str) -> String {
        format!(
            "{}/repos/{}/{}/{}",
            self.api_base, self.owner, self.repository, tail
        )
    }

    /// Issues a GET and maps transport failures and 404s.
    fn get_checked(&self, url: &str, missing: &str) -> SyncResult<Vec<u8>> {
        let response = self
            .client
            .get(url)
            .map_err(SyncError::remote_unavailable)?;

        if response.status == 404 {
            return Err(SyncError::NotFound(missing.to_string()));
        }
        if !response.is_success() {
            return Err(SyncError::remote_unavailable(format!(
                "status {} from {url}",
                response.status
            )));
        }
        Ok(response.body)
    }
}

impl<C: HttpClient> RemoteRepository for GitHubRemote<C> {
    fn resolve_latest(&self, branch: &str) -> SyncResult<RevisionId> {
        let url = self.repo_url(&format!("commits/{branch}"));
        let missing = format!(
            "branch `{branch}` of {}/{}",
            self.owner, self.repository
        );
        let body = self.get_checked(&url, &missing)?;

        Ok(BranchHeadPayload::decode(&body)?.into_revision()?)
    }

    fn diff(&self, from: &RevisionId, to: &RevisionId) -> SyncResult<Changeset> {
        let url = self.repo_url(&format!("compare/{from}...{to}"));
        let response = self
            .client
            .get(&url)
            .map_err(SyncError::remote_unavailable)?;

        // The host answers 404 or 422 when the base is not
        // ancestor-comparable to the head (rewritten history, unknown
        // revision). Surfaced as InvalidRange; recovery is the host
        // application's call.
        if response.status == 404 || response.status == 422 {
            return Err(SyncError::InvalidRange {
                from: from.clone(),
                to: to.clone(),
            });
        }
        if !response.is_success() {
            return Err(SyncError::remote_unavailable(format!(
                "status {} from {url}",
                response.status
            )));
        }

        let changes = ComparePayload::decode(&response.body)?.into_changes()?;
        Ok(Changeset::new(from.clone(), to.clone(), changes))
    }

    fn fetch_content(&self, url: &str) -> SyncResult<Vec<u8>> {
        let response = self
            .client
            .get(url)
            .map_err(|e| SyncError::content_fetch_failed(url, e))?;

        if !response.is_success() {
            return Err(SyncError::content_fetch_failed(
                url,
                format!("status {}", response.status),
            ));
        }
        Ok(response.body)
    }

    fn list_dir(&self, path: &str) -> SyncResult<Vec<RemoteEntry>> {
        let url = if path.is_empty() {
            self.repo_url("contents")
        } else {
            self.repo_url(&format!("contents/{path}"))
        };
        let missing = format!(
            "path `{path}` in {}/{}",
            self.owner, self.repository
        );
        let body = self.get_checked(&url, &missing)?;

        Ok(decode_contents(&body)?)
    }
}

/// A mock remote for testing.
///
/// Responses are scripted up front; unset responses surface as errors so
/// tests fail loudly instead of hanging on missing fixtures.
#[derive(Debug, Default)]
pub struct MockRemote {
    latest: Mutex<Option<RevisionId>>,
    changes: Mutex<Option<Vec<FileChange>>>,
    contents: Mutex<HashMap<String, Vec<u8>>>,
    listings: Mutex<HashMap<String, Vec<RemoteEntry>>>,
    failing_urls: Mutex<HashSet<String>>,
    unavailable: Mutex<bool>,
    fetches: AtomicU64,
}

impl MockRemote {
    /// Creates a mock remote with no scripted responses.
    pub fn new() -> Self {
        Self::default()
    }

    /// Scripts the branch-head revision.
    pub fn set_latest(&self, revision: impl Into<RevisionId>) {
        *self.latest.lock().unwrap() = Some(revision.into());
    }

    /// Scripts the changes returned by `diff`.
    pub fn set_changes(&self, changes: Vec<FileChange>) {
        *self.changes.lock().unwrap() = Some(changes);
    }

    /// Scripts the content behind one URL.
    pub fn set_content(&self, url: impl Into<String>, content: impl Into<Vec<u8>>) {
        self.contents
            .lock()
            .unwrap()
            .insert(url.into(), content.into());
    }

    /// Scripts one directory listing.
    pub fn set_listing(&self, path: impl Into<String>, entries: Vec<RemoteEntry>) {
        self.listings.lock().unwrap().insert(path.into(), entries);
    }

    /// Makes `fetch_content` fail for one URL.
    pub fn fail_fetch(&self, url: impl Into<String>) {
        self.failing_urls.lock().unwrap().insert(url.into());
    }

    /// Makes every operation fail as if the network were down.
    pub fn set_unavailable(&self, unavailable: bool) {
        *self.unavailable.lock().unwrap() = unavailable;
    }

    /// Number of `fetch_content` calls made so far.
    pub fn fetch_count(&self) -> u64 {
        self.fetches.load(Ordering::SeqCst)
    }

    fn check_available(&self) -> SyncResult<()> {
        if *self.unavailable.lock().unwrap() {
            Err(SyncError::remote_unavailable("mock remote set unavailable"))
        } else {
            Ok(())
        }
    }
}

impl RemoteRepository for MockRemote {
    fn resolve_latest(&self, _branch: &str) -> SyncResult<RevisionId> {
        self.check_available()?;
        self.latest
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| SyncError::MalformedResponse("no mock latest revision set".into()))
    }

    fn diff(&self, from: &RevisionId, to: &RevisionId) -> SyncResult<Changeset> {
        self.check_available()?;
        let changes = self
            .changes
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| SyncError::MalformedResponse("no mock changeset set".into()))?;
        Ok(Changeset::new(from.clone(), to.clone(), changes))
    }

    fn fetch_content(&self, url: &str) -> SyncResult<Vec<u8>> {
        self.check_available()?;
        self.fetches.fetch_add(1, Ordering::SeqCst);

        if self.failing_urls.lock().unwrap().contains(url) {
            return Err(SyncError::content_fetch_failed(url, "mock fetch failure"));
        }
        self.contents
            .lock()
            .unwrap()
            .get(url)
            .cloned()
            .ok_or_else(|| SyncError::content_fetch_failed(url, "no mock content set"))
    }

    fn list_dir(&self, path: &str) -> SyncResult<Vec<RemoteEntry>> {
        self.check_available()?;
        self.listings
            .lock()
            .unwrap()
            .get(path)
            .cloned()
            .ok_or_else(|| SyncError::NotFound(format!("mock listing for `{path}`")))
    }
}
