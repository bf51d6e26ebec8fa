//! Persisted sync state.
//!
//! The engine persists exactly one fact: the revision last applied in
//! full. Absence of the value is a normal state (no sync has ever
//! completed), never an error.

use crate::error::{SyncError, SyncResult};
use parking_lot::RwLock;
use repomirror_protocol::RevisionId;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Conventional file name for the persisted revision slot.
pub const REVISION_STATE_FILE: &str = "last-synced-revision";

/// Persists and retrieves the last-synchronized revision.
pub trait RevisionStore: Send + Sync {
    /// Loads the stored revision, or `None` if no sync ever completed.
    fn load(&self) -> SyncResult<Option<RevisionId>>;

    /// Persists the revision so a later `load` in a new process sees it.
    ///
    /// Must be atomic with respect to process crash: a crash mid-save
    /// leaves the old or the new value readable, never a torn one.
    fn save(&self, revision: &RevisionId) -> SyncResult<()>;
}

/// File-backed revision store.
///
/// Saves use the write-then-rename pattern for crash safety:
/// 1. Write to a temporary file next to the state file
/// 2. Sync the temporary file to disk
/// 3. Rename it over the state file
/// 4. Fsync the directory so the rename itself is durable
pub struct FileRevisionStore {
    path: PathBuf,
}

impl FileRevisionStore {
    /// Creates a store backed by the given state file.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Creates a store at the conventional file name inside a directory.
    pub fn in_dir(dir: impl AsRef<Path>) -> Self {
        Self::new(dir.as_ref().join(REVISION_STATE_FILE))
    }

    /// Path of the state file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[cfg(unix)]
    fn sync_parent_dir(&self) -> SyncResult<()> {
        if let Some(parent) = self.path.parent() {
            let dir =
                File::open(parent).map_err(|e| SyncError::filesystem(parent, e))?;
            // On Unix, fsync on a directory syncs the directory entries
            dir.sync_all()
                .map_err(|e| SyncError::filesystem(parent, e))?;
        }
        Ok(())
    }

    #[cfg(not(unix))]
    fn sync_parent_dir(&self) -> SyncResult<()> {
        // Windows NTFS journaling provides metadata durability; directory
        // fsync is not directly supported there.
        Ok(())
    }
}

impl RevisionStore for FileRevisionStore {
    fn load(&self) -> SyncResult<Option<RevisionId>> {
        if !self.path.exists() {
            return Ok(None);
        }

        let raw = fs::read_to_string(&self.path)
            .map_err(|e| SyncError::filesystem(&self.path, e))?;
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Ok(None);
        }
        Ok(Some(RevisionId::from(trimmed)))
    }

    fn save(&self, revision: &RevisionId) -> SyncResult<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| SyncError::filesystem(parent, e))?;
        }

        let temp_path = self.path.with_extension("tmp");

        let mut file =
            File::create(&temp_path).map_err(|e| SyncError::filesystem(&temp_path, e))?;
        file.write_all(revision.as_str().as_bytes())
            .map_err(|e| SyncError::filesystem(&temp_path, e))?;
        file.sync_all()
            .map_err(|e| SyncError::filesystem(&temp_path, e))?;
        drop(file);

        fs::rename(&temp_path, &self.path).map_err(|e| SyncError::filesystem(&self.path, e))?;

        self.sync_parent_dir()
    }
}

/// In-memory revision store for tests and embedding hosts.
#[derive(Debug, Default)]
pub struct MemoryRevisionStore {
    slot: RwLock<Option<RevisionId>>,
}

impl MemoryRevisionStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

impl RevisionStore for MemoryRevisionStore {
    fn load(&self) -> SyncResult<Option<RevisionId>> {
        Ok(self.slot.read().clone())
    }

    fn save(&self, revision: &RevisionId) -> SyncResult<()> {
        *self.slot.write() = Some(revision.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn missing_file_loads_as_unset() {
        let dir = tempdir().unwrap();
        let store = FileRevisionStore::in_dir(dir.path());

        assert_eq!(store.load().unwrap(), None);
    }

    #[test]
    fn save_survives_reopening() {
        let dir = tempdir().unwrap();

        let store = FileRevisionStore::in_dir(dir.path());
        store.save(&RevisionId::new("abc123")).unwrap();

        // A fresh store on the same path sees the value
        let reopened = FileRevisionStore::in_dir(dir.path());
        assert_eq!(reopened.load().unwrap(), Some(RevisionId::new("abc123")));
    }

    #[test]
    fn save_overwrites_previous_value() {
        let dir = tempdir().unwrap();
        let store = FileRevisionStore::in_dir(dir.path());

        store.save(&RevisionId::new("first")).unwrap();
        store.save(&RevisionId::new("second")).unwrap();

        assert_eq!(store.load().unwrap(), Some(RevisionId::new("second")));
    }

    #[test]
    fn save_creates_missing_parent_directories() {
        let dir = tempdir().unwrap();
        let store = FileRevisionStore::new(dir.path().join("state/deep/revision"));

        store.save(&RevisionId::new("abc")).unwrap();
        assert_eq!(store.load().unwrap(), Some(RevisionId::new("abc")));
    }

    #[test]
    fn empty_state_file_loads_as_unset() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(REVISION_STATE_FILE);
        fs::write(&path, "  \n").unwrap();

        let store = FileRevisionStore::new(path);
        assert_eq!(store.load().unwrap(), None);
    }

    #[test]
    fn memory_store_round_trip() {
        let store = MemoryRevisionStore::new();
        assert_eq!(store.load().unwrap(), None);

        store.save(&RevisionId::new("xyz")).unwrap();
        assert_eq!(store.load().unwrap(), Some(RevisionId::new("xyz")));
    }
}
