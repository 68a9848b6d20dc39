//! Change-set and requirement types exchanged with the collaborator.
//!
//! The wire shapes follow the tool-call JSON produced by the agent: a batch is
//! `{"changes": [...]}` and each entry carries exactly one of `patch`,
//! `file_action` or `directory_action`. Decoding turns that into a proper sum
//! type and rejects entries that populate zero or several keys.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::core::diff_range::DiffRange;

/// Create or delete; shared by file and directory actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Create,
    Delete,
}

/// Create (or overwrite) a file with optional content, or delete it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileAction {
    pub action: Action,
    pub file_name: String,
    /// Ignored for [`Action::Delete`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryAction {
    pub action: Action,
    pub directory_name: String,
}

/// Role of a body line inside a hunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LineKind {
    Context,
    Added,
    Removed,
}

impl LineKind {
    pub fn prefix(self) -> char {
        match self {
            LineKind::Context => ' ',
            LineKind::Added => '+',
            LineKind::Removed => '-',
        }
    }
}

/// One body line of a hunk. On the wire this is the prefixed string
/// (`" keep"`, `"+new"`, `"-old"`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PatchLine {
    pub kind: LineKind,
    pub text: String,
}

impl PatchLine {
    pub fn context(text: impl Into<String>) -> Self {
        Self {
            kind: LineKind::Context,
            text: text.into(),
        }
    }

    pub fn added(text: impl Into<String>) -> Self {
        Self {
            kind: LineKind::Added,
            text: text.into(),
        }
    }

    pub fn removed(text: impl Into<String>) -> Self {
        Self {
            kind: LineKind::Removed,
            text: text.into(),
        }
    }
}

impl fmt::Display for PatchLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.kind.prefix(), self.text)
    }
}

impl TryFrom<String> for PatchLine {
    type Error = String;

    fn try_from(raw: String) -> Result<Self, Self::Error> {
        let mut chars = raw.chars();
        // An empty record is a blank context line; `git apply` accepts it too.
        let Some(first) = chars.next() else {
            return Ok(PatchLine::context(""));
        };
        let kind = match first {
            ' ' => LineKind::Context,
            '+' => LineKind::Added,
            '-' => LineKind::Removed,
            other => {
                return Err(format!(
                    "change line must start with ' ', '+' or '-' (got {other:?} in {raw:?})"
                ));
            }
        };
        Ok(PatchLine {
            kind,
            text: chars.as_str().to_string(),
        })
    }
}

impl From<PatchLine> for String {
    fn from(line: PatchLine) -> Self {
        line.to_string()
    }
}

/// A single-hunk patch against `file_name` as it exists at `blob_hash`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatchSpec {
    pub file_name: String,
    /// Blob hash the author believes the file currently has.
    pub blob_hash: String,
    pub diff_range: DiffRange,
    pub changes: Vec<PatchLine>,
}

impl PatchSpec {
    /// Describe a disagreement between the hunk header counts and the body.
    ///
    /// `git apply` rejects such hunks; this only exists so callers can log a
    /// precise reason before handing the document over.
    pub fn range_mismatch(&self) -> Option<String> {
        let mut old = 0u32;
        let mut new = 0u32;
        for line in &self.changes {
            match line.kind {
                LineKind::Context => {
                    old += 1;
                    new += 1;
                }
                LineKind::Removed => old += 1,
                LineKind::Added => new += 1,
            }
        }
        let (want_old, want_new) = (self.diff_range.old.len(), self.diff_range.new.len());
        if old == want_old && new == want_new {
            return None;
        }
        Some(format!(
            "hunk header expects {want_old} old / {want_new} new lines, body has {old} / {new}"
        ))
    }
}

/// Which variant a [`RepoChange`] holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    Patch,
    FileAction,
    DirectoryAction,
}

/// One entry of a change batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawRepoChange", into = "RawRepoChange")]
pub enum RepoChange {
    Patch(PatchSpec),
    File(FileAction),
    Directory(DirectoryAction),
}

impl RepoChange {
    pub fn kind(&self) -> ChangeKind {
        match self {
            RepoChange::Patch(_) => ChangeKind::Patch,
            RepoChange::File(_) => ChangeKind::FileAction,
            RepoChange::Directory(_) => ChangeKind::DirectoryAction,
        }
    }

    /// Repository-relative path this entry touches.
    pub fn target(&self) -> &str {
        match self {
            RepoChange::Patch(patch) => &patch.file_name,
            RepoChange::File(file) => &file.file_name,
            RepoChange::Directory(dir) => &dir.directory_name,
        }
    }
}

/// Wire form of [`RepoChange`]: three optional keys, exactly one populated.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct RawRepoChange {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    patch: Option<PatchSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    file_action: Option<FileAction>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    directory_action: Option<DirectoryAction>,
}

impl TryFrom<RawRepoChange> for RepoChange {
    type Error = String;

    fn try_from(raw: RawRepoChange) -> Result<Self, Self::Error> {
        match (raw.patch, raw.file_action, raw.directory_action) {
            (Some(patch), None, None) => Ok(RepoChange::Patch(patch)),
            (None, Some(file), None) => Ok(RepoChange::File(file)),
            (None, None, Some(dir)) => Ok(RepoChange::Directory(dir)),
            (patch, file, dir) => {
                let set = [patch.is_some(), file.is_some(), dir.is_some()]
                    .iter()
                    .filter(|present| **present)
                    .count();
                Err(format!(
                    "repo change must set exactly one of patch, file_action, directory_action (found {set})"
                ))
            }
        }
    }
}

impl From<RepoChange> for RawRepoChange {
    fn from(change: RepoChange) -> Self {
        match change {
            RepoChange::Patch(patch) => RawRepoChange {
                patch: Some(patch),
                ..RawRepoChange::default()
            },
            RepoChange::File(file) => RawRepoChange {
                file_action: Some(file),
                ..RawRepoChange::default()
            },
            RepoChange::Directory(dir) => RawRepoChange {
                directory_action: Some(dir),
                ..RawRepoChange::default()
            },
        }
    }
}

/// Ordered changes; order is significant (create a directory before files in it).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeBatch {
    pub changes: Vec<RepoChange>,
}

/// Shell checks whose final stdout line must equal `expected_output`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Requirement {
    pub description: String,
    pub verification_commands: Vec<String>,
    pub expected_output: String,
}
