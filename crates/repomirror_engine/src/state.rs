//! Sync engine state machine.

use crate::config::MirrorConfig;
use crate::error::{SyncError, SyncResult};
use crate::fs_applier::{ApplyOutcome, ChangeApplier};
use crate::remote::RemoteRepository;
use crate::store::RevisionStore;
use parking_lot::RwLock;
use repomirror_protocol::{FileChange, RemoteEntry, RevisionId};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// The current state of the sync engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    /// No pass has run yet.
    Idle,
    /// Resolving the remote branch head.
    Resolving,
    /// Computing the changeset against the stored revision.
    Diffing,
    /// Applying changes to the destination tree.
    Applying,
    /// Last pass found nothing to do.
    UpToDate,
    /// Last pass applied a changeset and persisted the new revision.
    Committed,
    /// Last pass failed; persisted state was not advanced.
    Failed,
}

impl SyncState {
    /// Returns true while a pass is running.
    #[must_use]
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            SyncState::Resolving | SyncState::Diffing | SyncState::Applying
        )
    }

    /// Returns true if a new pass can start.
    #[must_use]
    pub fn can_start_pass(&self) -> bool {
        !self.is_active()
    }
}

/// Lifetime counters across passes.
#[derive(Debug, Clone, Default)]
pub struct SyncStats {
    /// Passes that committed a new revision.
    pub passes_committed: u64,
    /// Passes that found the destination already current.
    pub passes_up_to_date: u64,
    /// Files written across all passes.
    pub files_written: u64,
    /// Files deleted across all passes.
    pub files_deleted: u64,
    /// Changes skipped because the destination already matched.
    pub files_unchanged: u64,
    /// When the last successful pass finished.
    pub last_pass_time: Option<Instant>,
    /// Message of the last failure, cleared by the next success.
    pub last_error: Option<String>,
}

/// Terminal outcome of a successful pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PassOutcome {
    /// The destination already matched the remote head.
    UpToDate,
    /// A changeset was applied and this revision persisted.
    Committed(RevisionId),
}

/// Result of one synchronization pass.
#[derive(Debug, Clone)]
pub struct PassReport {
    /// How the pass ended.
    pub outcome: PassOutcome,
    /// Files written this pass.
    pub written: u64,
    /// Files deleted this pass.
    pub deleted: u64,
    /// Changes skipped because the destination already matched.
    pub unchanged: u64,
    /// Wall-clock duration of the pass.
    pub duration: Duration,
}

#[derive(Debug, Clone, Copy, Default)]
struct Counts {
    written: u64,
    deleted: u64,
    unchanged: u64,
}

/// The sync engine drives one pass at a time against a destination tree.
///
/// The persisted revision is written exactly once per pass, after every
/// change applied cleanly; a failed or cancelled pass leaves it
/// untouched, so the next pass retries the same range and per-file
/// idempotence skips whatever already converged.
pub struct SyncEngine<R: RemoteRepository, S: RevisionStore> {
    config: MirrorConfig,
    remote: R,
    store: S,
    applier: ChangeApplier,
    state: RwLock<SyncState>,
    stats: RwLock<SyncStats>,
    cancelled: AtomicBool,
}

impl<R: RemoteRepository, S: RevisionStore> SyncEngine<R, S> {
    /// Creates an engine for one mirror configuration.
    pub fn new(config: MirrorConfig, remote: R, store: S) -> Self {
        let applier = ChangeApplier::new(config.destination.clone());
        Self {
            config,
            remote,
            store,
            applier,
            state: RwLock::new(SyncState::Idle),
            stats: RwLock::new(SyncStats::default()),
            cancelled: AtomicBool::new(false),
        }
    }

    /// The engine's configuration.
    pub fn config(&self) -> &MirrorConfig {
        &self.config
    }

    /// The remote repository.
    pub fn remote(&self) -> &R {
        &self.remote
    }

    /// The revision store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Gets the current state.
    pub fn state(&self) -> SyncState {
        *self.state.read()
    }

    /// Gets the lifetime counters.
    pub fn stats(&self) -> SyncStats {
        self.stats.read().clone()
    }

    /// Requests cancellation of the running (or next) pass.
    ///
    /// The flag stays set until [`SyncEngine::reset_cancel`]; a cancelled
    /// pass fails with [`SyncError::Cancelled`] and commits nothing.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// Clears the cancellation flag.
    pub fn reset_cancel(&self) {
        self.cancelled.store(false, Ordering::SeqCst);
    }

    /// Runs one synchronization pass.
    ///
    /// Resolves the branch head, short-circuits if it matches the stored
    /// (or configured initial) revision, otherwise applies the changeset
    /// strictly in sequence and persists the new revision once every
    /// change succeeded.
    pub fn run_pass(&self) -> SyncResult<PassReport> {
        self.begin_pass()?;
        let start = Instant::now();
        let result = self.execute_pass();
        self.finish_pass(start, result)
    }

    /// Mirrors the entire remote tree into the destination.
    ///
    /// Walks the repository's current contents recursively and applies
    /// every file as an addition; per-file idempotence skips files that
    /// already match. Never deletes local files. Intended for first
    /// population of an empty destination and for recovery after
    /// [`SyncError::InvalidRange`] (stored revision no longer comparable).
    pub fn run_full_mirror(&self) -> SyncResult<PassReport> {
        self.begin_pass()?;
        let start = Instant::now();
        let result = self.execute_full_mirror();
        self.finish_pass(start, result)
    }

    fn begin_pass(&self) -> SyncResult<()> {
        let mut state = self.state.write();
        if state.is_active() {
            return Err(SyncError::PassInProgress);
        }
        *state = SyncState::Resolving;
        Ok(())
    }

    fn execute_pass(&self) -> SyncResult<(PassOutcome, Counts)> {
        self.check_cancelled()?;

        let latest = self.remote.resolve_latest(&self.config.branch)?;
        let base = self.base_revision()?;

        if base == latest {
            info!(revision = %latest, "destination is up to date");
            return Ok((PassOutcome::UpToDate, Counts::default()));
        }

        self.check_cancelled()?;
        self.set_state(SyncState::Diffing);
        let changeset = self.remote.diff(&base, &latest)?;
        info!(
            from = %base,
            to = %latest,
            changes = changeset.len(),
            "applying changeset"
        );

        self.set_state(SyncState::Applying);
        let mut counts = Counts::default();
        for change in changeset.iter() {
            self.check_cancelled()?;
            let outcome = self.applier.apply(&self.remote, change)?;
            self.tally(&mut counts, &change.path, outcome);
        }

        self.check_cancelled()?;
        self.store.save(&latest)?;
        info!(
            revision = %latest,
            written = counts.written,
            deleted = counts.deleted,
            unchanged = counts.unchanged,
            "pass committed"
        );

        Ok((PassOutcome::Committed(latest), counts))
    }

    fn execute_full_mirror(&self) -> SyncResult<(PassOutcome, Counts)> {
        self.check_cancelled()?;

        let latest = self.remote.resolve_latest(&self.config.branch)?;
        info!(revision = %latest, "mirroring full remote tree");

        self.set_state(SyncState::Applying);
        let mut counts = Counts::default();
        let mut pending = vec![String::new()];
        while let Some(dir) = pending.pop() {
            self.check_cancelled()?;
            for entry in self.remote.list_dir(&dir)? {
                match entry {
                    RemoteEntry::File { path, content_url } => {
                        let change = FileChange::added(path, content_url);
                        let outcome = self.applier.apply(&self.remote, &change)?;
                        self.tally(&mut counts, &change.path, outcome);
                    }
                    RemoteEntry::Directory { path } => pending.push(path),
                }
            }
        }

        self.check_cancelled()?;
        self.store.save(&latest)?;
        info!(
            revision = %latest,
            written = counts.written,
            unchanged = counts.unchanged,
            "full mirror committed"
        );

        Ok((PassOutcome::Committed(latest), counts))
    }

    fn finish_pass(
        &self,
        start: Instant,
        result: SyncResult<(PassOutcome, Counts)>,
    ) -> SyncResult<PassReport> {
        match result {
            Ok((outcome, counts)) => {
                {
                    let mut stats = self.stats.write();
                    match outcome {
                        PassOutcome::UpToDate => stats.passes_up_to_date += 1,
                        PassOutcome::Committed(_) => {
                            stats.passes_committed += 1;
                            stats.files_written += counts.written;
                            stats.files_deleted += counts.deleted;
                            stats.files_unchanged += counts.unchanged;
                        }
                    }
                    stats.last_pass_time = Some(Instant::now());
                    stats.last_error = None;
                }
                self.set_state(match outcome {
                    PassOutcome::UpToDate => SyncState::UpToDate,
                    PassOutcome::Committed(_) => SyncState::Committed,
                });
                Ok(PassReport {
                    outcome,
                    written: counts.written,
                    deleted: counts.deleted,
                    unchanged: counts.unchanged,
                    duration: start.elapsed(),
                })
            }
            Err(e) => {
                self.handle_error(&e);
                Err(e)
            }
        }
    }

    fn tally(&self, counts: &mut Counts, path: &str, outcome: ApplyOutcome) {
        match outcome {
            ApplyOutcome::Written => {
                counts.written += 1;
                debug!(path, "wrote content");
            }
            ApplyOutcome::Unchanged => {
                counts.unchanged += 1;
                debug!(path, "content already current");
            }
            ApplyOutcome::Deleted => {
                counts.deleted += 1;
                debug!(path, "removed file");
            }
            ApplyOutcome::DeletedMissing => {
                counts.unchanged += 1;
                warn!(path, "removal target already absent");
            }
        }
    }

    /// The revision this pass diffs from: stored if set, else the
    /// configured initial revision.
    fn base_revision(&self) -> SyncResult<RevisionId> {
        Ok(self
            .store
            .load()?
            .unwrap_or_else(|| self.config.initial_revision.clone()))
    }

    fn check_cancelled(&self) -> SyncResult<()> {
        if self.cancelled.load(Ordering::SeqCst) {
            Err(SyncError::Cancelled)
        } else {
            Ok(())
        }
    }

    fn set_state(&self, state: SyncState) {
        *self.state.write() = state;
    }

    fn handle_error(&self, error: &SyncError) {
        warn!(%error, "sync pass failed");
        self.set_state(SyncState::Failed);
        self.stats.write().last_error = Some(error.to_string());
    }
}
