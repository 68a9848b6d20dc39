//! Change executor: applies a [`ChangeBatch`] to the working tree.
//!
//! Batches are best-effort. Entries run strictly in order, a failed entry is
//! recorded and the walk continues, and nothing already applied is rolled
//! back. Successful entries are staged; committing is left to the caller so
//! one collaborator round maps to one commit.

use std::fs;
use std::io::ErrorKind;

use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use crate::core::manifest::{BlobHashManifest, HashCheck};
use crate::core::patch::render_patch;
use crate::core::rel_path::check_relative;
use crate::core::types::{
    Action, ChangeBatch, ChangeKind, DirectoryAction, FileAction, PatchSpec, RepoChange,
};
use crate::error::ChangeError;
use crate::io::config::PatchloopConfig;
use crate::io::repo::Repo;
use crate::io::shell::CommandResult;

/// Knobs for [`apply_batch`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ApplyOptions {
    /// Check each patch's `blob_hash` against the `HEAD` manifest first.
    pub verify_blob_hash: bool,
}

impl Default for ApplyOptions {
    fn default() -> Self {
        Self {
            verify_blob_hash: true,
        }
    }
}

impl From<&PatchloopConfig> for ApplyOptions {
    fn from(cfg: &PatchloopConfig) -> Self {
        Self {
            verify_blob_hash: cfg.verify_blob_hash,
        }
    }
}

/// Result for one entry of a batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EntryReport {
    /// Position in the batch (0-based).
    pub index: usize,
    pub kind: ChangeKind,
    pub path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ChangeError>,
}

impl EntryReport {
    pub fn applied(&self) -> bool {
        self.error.is_none()
    }
}

/// Per-entry results, in batch order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchReport {
    pub entries: Vec<EntryReport>,
}

impl BatchReport {
    pub fn all_applied(&self) -> bool {
        self.entries.iter().all(EntryReport::applied)
    }

    pub fn failures(&self) -> impl Iterator<Item = &EntryReport> {
        self.entries.iter().filter(|entry| !entry.applied())
    }

    pub fn applied_count(&self) -> usize {
        self.entries.iter().filter(|entry| entry.applied()).count()
    }
}

/// Apply every change in `batch`, in order, staging what succeeds.
#[instrument(skip_all, fields(entries = batch.changes.len()))]
pub fn apply_batch(repo: &Repo, batch: &ChangeBatch, options: &ApplyOptions) -> BatchReport {
    // Loaded on first use; HEAD does not move while a batch is applied.
    let mut manifest: Option<BlobHashManifest> = None;
    let mut report = BatchReport::default();

    for (index, change) in batch.changes.iter().enumerate() {
        let outcome = match change {
            RepoChange::Patch(patch) => {
                let manifest = if options.verify_blob_hash {
                    Some(&*manifest.get_or_insert_with(|| repo.blob_hash_manifest()))
                } else {
                    None
                };
                apply_patch_change(repo, patch, manifest)
            }
            RepoChange::File(file) => apply_file_action(repo, file),
            RepoChange::Directory(dir) => apply_directory_action(repo, dir),
        };
        match &outcome {
            Ok(()) => debug!(index, kind = ?change.kind(), path = change.target(), "applied"),
            Err(err) => warn!(index, kind = ?change.kind(), err = %err, "change not applied"),
        }
        report.entries.push(EntryReport {
            index,
            kind: change.kind(),
            path: change.target().to_string(),
            error: outcome.err(),
        });
    }

    info!(
        applied = report.applied_count(),
        failed = report.entries.len() - report.applied_count(),
        "batch finished"
    );
    report
}

fn apply_patch_change(
    repo: &Repo,
    patch: &PatchSpec,
    manifest: Option<&BlobHashManifest>,
) -> Result<(), ChangeError> {
    validated(&patch.file_name)?;

    if let Some(manifest) = manifest {
        match manifest.check(&patch.file_name, &patch.blob_hash) {
            HashCheck::Matches => {}
            HashCheck::Untracked => {
                debug!(file = %patch.file_name, "file not in HEAD, blob hash not checked");
            }
            HashCheck::Stale { actual } => {
                return Err(ChangeError::StaleReference {
                    file_name: patch.file_name.clone(),
                    expected: patch.blob_hash.clone(),
                    actual,
                });
            }
        }
    }

    if let Some(reason) = patch.range_mismatch() {
        warn!(file = %patch.file_name, reason = %reason, "hunk header disagrees with body");
    }

    let document = render_patch(patch);
    let applied = repo.apply_patch(&document);
    if !applied.success {
        if !applied.completed() {
            return Err(process_error(applied));
        }
        return Err(ChangeError::ApplyRejected {
            file_name: patch.file_name.clone(),
            output: applied.output.trim().to_string(),
        });
    }
    staged(&patch.file_name, repo.stage(&patch.file_name))
}

fn apply_file_action(repo: &Repo, file: &FileAction) -> Result<(), ChangeError> {
    let rel = validated(&file.file_name)?;
    let path = repo.resolve(rel);
    match file.action {
        Action::Create => {
            let content = file.content.as_deref().unwrap_or_default();
            fs::write(&path, content).map_err(|err| ChangeError::io(&file.file_name, &err))?;
            staged(&file.file_name, repo.stage(&file.file_name))
        }
        Action::Delete => {
            fs::remove_file(&path).map_err(|err| match err.kind() {
                ErrorKind::NotFound => ChangeError::NotFound {
                    path: file.file_name.clone(),
                },
                _ => ChangeError::io(&file.file_name, &err),
            })?;
            staged(&file.file_name, repo.unstage_and_delete(&file.file_name))
        }
    }
}

fn apply_directory_action(repo: &Repo, dir: &DirectoryAction) -> Result<(), ChangeError> {
    let rel = validated(&dir.directory_name)?;
    let path = repo.resolve(rel);
    match dir.action {
        Action::Create => {
            fs::create_dir_all(&path).map_err(|err| ChangeError::io(&dir.directory_name, &err))?;
            staged(&dir.directory_name, repo.stage(&dir.directory_name))
        }
        Action::Delete => {
            if path.is_dir() {
                fs::remove_dir_all(&path)
                    .map_err(|err| ChangeError::io(&dir.directory_name, &err))?;
            } else {
                debug!(dir = %dir.directory_name, "directory already absent");
            }
            staged(
                &dir.directory_name,
                repo.unstage_and_delete(&dir.directory_name),
            )
        }
    }
}

fn validated(raw: &str) -> Result<&std::path::Path, ChangeError> {
    check_relative(raw).map_err(|reason| ChangeError::InvalidPath {
        path: raw.to_string(),
        reason,
    })
}

fn staged(path: &str, result: CommandResult) -> Result<(), ChangeError> {
    if result.success {
        return Ok(());
    }
    if !result.completed() {
        return Err(process_error(result));
    }
    Err(ChangeError::StageFailed {
        path: path.to_string(),
        output: result.output.trim().to_string(),
    })
}

fn process_error(result: CommandResult) -> ChangeError {
    ChangeError::ProcessInvocation {
        message: result.output,
    }
}
