//! Filesystem change applier.

use crate::error::{SyncError, SyncResult};
use crate::remote::RemoteRepository;
use repomirror_protocol::{FileChange, FileStatus};
use std::fs::{self, File};
use std::io::{ErrorKind, Write};
use std::path::{Component, Path, PathBuf};

/// What applying one change actually did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// New content was written at the change's path.
    Written,
    /// On-disk content already matched; nothing was written.
    Unchanged,
    /// The file was removed.
    Deleted,
    /// The removal target was already absent.
    DeletedMissing,
}

/// Applies file changes to the destination tree.
///
/// All operations are idempotent: byte-identical content skips the write
/// entirely and deleting an absent file succeeds, so a failed pass can be
/// re-run without redundant I/O for files that already converged.
pub struct ChangeApplier {
    dest_root: PathBuf,
}

impl ChangeApplier {
    /// Creates an applier rooted at the destination directory.
    pub fn new(dest_root: impl Into<PathBuf>) -> Self {
        Self {
            dest_root: dest_root.into(),
        }
    }

    /// The destination root.
    #[must_use]
    pub fn dest_root(&self) -> &Path {
        &self.dest_root
    }

    /// Applies one change, fetching content through the remote.
    ///
    /// A rename removes the old path first and then writes the new path,
    /// strictly in that order.
    pub fn apply(
        &self,
        remote: &dyn RemoteRepository,
        change: &FileChange,
    ) -> SyncResult<ApplyOutcome> {
        match change.status {
            FileStatus::Removed => self.remove(&change.path),
            FileStatus::Added | FileStatus::Modified => {
                self.write(remote, &change.path, self.content_url(change)?)
            }
            FileStatus::Renamed => {
                let previous = change.previous_path.as_deref().ok_or_else(|| {
                    SyncError::MalformedResponse(format!(
                        "renamed entry for `{}` carries no previous path",
                        change.path
                    ))
                })?;
                self.remove(previous)?;
                self.write(remote, &change.path, self.content_url(change)?)
            }
        }
    }

    fn content_url<'c>(&self, change: &'c FileChange) -> SyncResult<&'c str> {
        change.content_url.as_deref().ok_or_else(|| {
            SyncError::MalformedResponse(format!(
                "change entry for `{}` carries no content reference",
                change.path
            ))
        })
    }

    /// Joins a repository-relative path onto the destination root.
    ///
    /// Rejects anything that could land outside the root: absolute
    /// paths, drive prefixes, and parent-directory components.
    fn resolve(&self, relative: &str) -> SyncResult<PathBuf> {
        let escape = || SyncError::PathEscape {
            path: relative.to_string(),
        };

        let rel = Path::new(relative);
        if rel.as_os_str().is_empty() {
            return Err(escape());
        }

        let mut resolved = self.dest_root.clone();
        for component in rel.components() {
            match component {
                Component::Normal(part) => resolved.push(part),
                Component::CurDir => {}
                Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                    return Err(escape())
                }
            }
        }
        Ok(resolved)
    }

    fn remove(&self, relative: &str) -> SyncResult<ApplyOutcome> {
        let path = self.resolve(relative)?;

        match fs::remove_file(&path) {
            Ok(()) => Ok(ApplyOutcome::Deleted),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(ApplyOutcome::DeletedMissing),
            Err(e) => Err(SyncError::filesystem(path, e)),
        }
    }

    fn write(
        &self,
        remote: &dyn RemoteRepository,
        relative: &str,
        url: &str,
    ) -> SyncResult<ApplyOutcome> {
        let path = self.resolve(relative)?;
        let content = remote.fetch_content(url)?;

        match fs::read(&path) {
            Ok(existing) if existing == content => return Ok(ApplyOutcome::Unchanged),
            Ok(_) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(SyncError::filesystem(path, e)),
        }

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| SyncError::filesystem(parent, e))?;
        }
        write_atomic(&path, &content)?;

        Ok(ApplyOutcome::Written)
    }
}

/// Writes content via a hidden temporary file plus rename so no partially
/// written file is ever observable at the final path.
fn write_atomic(path: &Path, content: &[u8]) -> SyncResult<()> {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let temp_path = match path.parent() {
        Some(parent) => parent.join(format!(".{file_name}.tmp")),
        None => PathBuf::from(format!(".{file_name}.tmp")),
    };

    let mut file = File::create(&temp_path).map_err(|e| SyncError::filesystem(&temp_path, e))?;
    file.write_all(content)
        .map_err(|e| SyncError::filesystem(&temp_path, e))?;
    file.sync_all()
        .map_err(|e| SyncError::filesystem(&temp_path, e))?;
    drop(file);

    fs::rename(&temp_path, path).map_err(|e| SyncError::filesystem(path, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::MockRemote;
    use proptest::prelude::*;
    use repomirror_protocol::FileChange;
    use tempfile::tempdir;

    fn applier_in(dir: &tempfile::TempDir) -> ChangeApplier {
        ChangeApplier::new(dir.path())
    }

    #[test]
    fn added_file_creates_intermediate_directories() {
        let dir = tempdir().unwrap();
        let applier = applier_in(&dir);
        let remote = MockRemote::new();
        remote.set_content("https://raw/deep", b"payload".to_vec());

        let change = FileChange::added("a/b/c.txt", "https://raw/deep");
        let outcome = applier.apply(&remote, &change).unwrap();

        assert_eq!(outcome, ApplyOutcome::Written);
        assert_eq!(fs::read(dir.path().join("a/b/c.txt")).unwrap(), b"payload");
    }

    #[test]
    fn identical_content_skips_write() {
        let dir = tempdir().unwrap();
        let applier = applier_in(&dir);
        fs::write(dir.path().join("same.txt"), b"stable").unwrap();
        let before = fs::metadata(dir.path().join("same.txt"))
            .unwrap()
            .modified()
            .unwrap();

        let remote = MockRemote::new();
        remote.set_content("https://raw/same", b"stable".to_vec());

        let change = FileChange::modified("same.txt", "https://raw/same");
        let outcome = applier.apply(&remote, &change).unwrap();

        assert_eq!(outcome, ApplyOutcome::Unchanged);
        let after = fs::metadata(dir.path().join("same.txt"))
            .unwrap()
            .modified()
            .unwrap();
        assert_eq!(before, after);
    }

    #[test]
    fn modified_file_replaces_content() {
        let dir = tempdir().unwrap();
        let applier = applier_in(&dir);
        fs::write(dir.path().join("f.txt"), b"old").unwrap();

        let remote = MockRemote::new();
        remote.set_content("https://raw/f", b"new".to_vec());

        let change = FileChange::modified("f.txt", "https://raw/f");
        assert_eq!(applier.apply(&remote, &change).unwrap(), ApplyOutcome::Written);
        assert_eq!(fs::read(dir.path().join("f.txt")).unwrap(), b"new");
    }

    #[test]
    fn removed_file_is_deleted() {
        let dir = tempdir().unwrap();
        let applier = applier_in(&dir);
        fs::write(dir.path().join("gone.txt"), b"x").unwrap();

        let remote = MockRemote::new();
        let change = FileChange::removed("gone.txt");

        assert_eq!(applier.apply(&remote, &change).unwrap(), ApplyOutcome::Deleted);
        assert!(!dir.path().join("gone.txt").exists());
    }

    #[test]
    fn removing_absent_file_succeeds() {
        let dir = tempdir().unwrap();
        let applier = applier_in(&dir);
        let remote = MockRemote::new();

        let change = FileChange::removed("never-existed.txt");
        assert_eq!(
            applier.apply(&remote, &change).unwrap(),
            ApplyOutcome::DeletedMissing
        );
    }

    #[test]
    fn rename_removes_old_path_then_writes_new() {
        let dir = tempdir().unwrap();
        let applier = applier_in(&dir);
        fs::write(dir.path().join("old.txt"), b"moved").unwrap();

        let remote = MockRemote::new();
        remote.set_content("https://raw/new", b"moved".to_vec());

        let change = FileChange::renamed("new.txt", "old.txt", "https://raw/new");
        applier.apply(&remote, &change).unwrap();

        assert!(!dir.path().join("old.txt").exists());
        assert_eq!(fs::read(dir.path().join("new.txt")).unwrap(), b"moved");
    }

    #[test]
    fn traversal_paths_rejected_without_fetching() {
        let dir = tempdir().unwrap();
        let applier = applier_in(&dir);
        let remote = MockRemote::new();

        for path in ["../../etc/passwd", "/etc/passwd", "a/../../b.txt"] {
            let change = FileChange::added(path, "https://raw/evil");
            let result = applier.apply(&remote, &change);
            assert!(
                matches!(result, Err(SyncError::PathEscape { .. })),
                "path {path}"
            );
        }
        // Rejection happens before any content fetch
        assert_eq!(remote.fetch_count(), 0);
    }

    #[test]
    fn traversal_in_rename_previous_path_rejected() {
        let dir = tempdir().unwrap();
        let applier = applier_in(&dir);
        let remote = MockRemote::new();

        let change = FileChange::renamed("safe.txt", "../outside.txt", "https://raw/safe");
        assert!(matches!(
            applier.apply(&remote, &change),
            Err(SyncError::PathEscape { .. })
        ));
    }

    #[test]
    fn fetch_failure_writes_nothing() {
        let dir = tempdir().unwrap();
        let applier = applier_in(&dir);
        let remote = MockRemote::new();
        remote.fail_fetch("https://raw/broken");

        let change = FileChange::added("f.txt", "https://raw/broken");
        assert!(matches!(
            applier.apply(&remote, &change),
            Err(SyncError::ContentFetchFailed { .. })
        ));
        assert!(!dir.path().join("f.txt").exists());
    }

    proptest! {
        #[test]
        fn parent_components_always_rejected(
            prefix in "[a-z]{1,8}",
            suffix in "[a-z]{1,8}",
        ) {
            let dir = tempdir().unwrap();
            let applier = applier_in(&dir);

            let relative = format!("{prefix}/../../{suffix}");
            prop_assert!(
                matches!(
                    applier.resolve(&relative),
                    Err(SyncError::PathEscape { .. })
                ),
                "expected PathEscape error"
            );
        }

        #[test]
        fn accepted_paths_stay_under_root(
            segments in prop::collection::vec("[a-z][a-z0-9]{0,7}", 1..5),
        ) {
            let dir = tempdir().unwrap();
            let applier = applier_in(&dir);

            let relative = segments.join("/");
            let resolved = applier.resolve(&relative).unwrap();
            prop_assert!(resolved.starts_with(dir.path()));
        }
    }
}
