//! JSON wire payloads of the remote host API.
//!
//! The remote host speaks GitHub-shaped JSON: a branch-head payload for
//! "latest revision", a compare payload for "changes between two
//! revisions", and a contents listing for one level of the current tree.
//! Decoding and domain conversion are separate steps so a payload that
//! parses but violates the protocol (unknown status, missing content
//! reference) is still rejected with a precise error.

use crate::change::{FileChange, RemoteEntry};
use crate::error::{ProtocolError, ProtocolResult};
use crate::revision::RevisionId;
use serde::Deserialize;

/// Branch-head payload: the commit a branch currently points at.
#[derive(Debug, Clone, Deserialize)]
pub struct BranchHeadPayload {
    /// Identifier of the head commit.
    pub sha: String,
}

impl BranchHeadPayload {
    /// Decodes a branch-head payload from JSON bytes.
    pub fn decode(bytes: &[u8]) -> ProtocolResult<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }

    /// Converts the payload into a revision identifier.
    pub fn into_revision(self) -> ProtocolResult<RevisionId> {
        if self.sha.is_empty() {
            return Err(ProtocolError::EmptyRevision);
        }
        Ok(RevisionId::from(self.sha))
    }
}

/// One file entry of a compare payload.
#[derive(Debug, Clone, Deserialize)]
pub struct CompareFilePayload {
    /// Path of the file in the target revision.
    pub filename: String,
    /// Change status as reported by the remote.
    pub status: String,
    /// URL of the file's raw content, when the status carries content.
    #[serde(default)]
    pub raw_url: Option<String>,
    /// Prior path for renamed files.
    #[serde(default)]
    pub previous_filename: Option<String>,
}

impl CompareFilePayload {
    /// Validates this entry into a domain change.
    ///
    /// Returns `Ok(None)` for entries the remote reports but that carry
    /// no work (`unchanged`). The remote's `copied` is an add and
    /// `changed` is a modification from this engine's point of view.
    fn into_change(self) -> ProtocolResult<Option<FileChange>> {
        if self.filename.is_empty() {
            return Err(ProtocolError::EmptyPath);
        }

        let change = match self.status.as_str() {
            "added" | "copied" => {
                let url = self.require_raw_url()?;
                FileChange::added(self.filename, url)
            }
            "modified" | "changed" => {
                let url = self.require_raw_url()?;
                FileChange::modified(self.filename, url)
            }
            "removed" => FileChange::removed(self.filename),
            "renamed" => {
                let url = self.require_raw_url()?;
                let previous = match self.previous_filename {
                    Some(previous) => previous,
                    None => {
                        return Err(ProtocolError::MissingField {
                            field: "previous_filename",
                            path: self.filename,
                        })
                    }
                };
                FileChange::renamed(self.filename, previous, url)
            }
            "unchanged" => return Ok(None),
            _ => {
                return Err(ProtocolError::UnknownStatus {
                    status: self.status.clone(),
                    path: self.filename,
                })
            }
        };

        Ok(Some(change))
    }

    fn require_raw_url(&self) -> ProtocolResult<String> {
        self.raw_url
            .clone()
            .ok_or_else(|| ProtocolError::MissingField {
                field: "raw_url",
                path: self.filename.clone(),
            })
    }
}

/// Compare payload: per-file differences between two revisions.
#[derive(Debug, Clone, Deserialize)]
pub struct ComparePayload {
    /// File entries in remote order.
    pub files: Vec<CompareFilePayload>,
}

impl ComparePayload {
    /// Decodes a compare payload from JSON bytes.
    pub fn decode(bytes: &[u8]) -> ProtocolResult<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }

    /// Validates every entry into domain changes, preserving order.
    pub fn into_changes(self) -> ProtocolResult<Vec<FileChange>> {
        let mut changes = Vec::with_capacity(self.files.len());
        for file in self.files {
            if let Some(change) = file.into_change()? {
                changes.push(change);
            }
        }
        Ok(changes)
    }
}

/// One entry of a contents listing.
#[derive(Debug, Clone, Deserialize)]
struct ContentsEntryPayload {
    #[serde(rename = "type")]
    entry_type: String,
    path: String,
    #[serde(default)]
    download_url: Option<String>,
}

/// Decodes a contents listing into remote entries.
///
/// Entries that are neither files nor directories (symlinks, submodules)
/// have no fetchable content and are dropped.
pub fn decode_contents(bytes: &[u8]) -> ProtocolResult<Vec<RemoteEntry>> {
    let entries: Vec<ContentsEntryPayload> = serde_json::from_slice(bytes)?;

    let mut result = Vec::with_capacity(entries.len());
    for entry in entries {
        if entry.path.is_empty() {
            return Err(ProtocolError::EmptyPath);
        }
        match entry.entry_type.as_str() {
            "file" => {
                let content_url =
                    entry
                        .download_url
                        .ok_or_else(|| ProtocolError::MissingField {
                            field: "download_url",
                            path: entry.path.clone(),
                        })?;
                result.push(RemoteEntry::File {
                    path: entry.path,
                    content_url,
                });
            }
            "dir" => result.push(RemoteEntry::Directory { path: entry.path }),
            _ => {}
        }
    }
    Ok(result)
}
