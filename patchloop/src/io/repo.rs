//! Repository adapter: versioned-storage operations on one working tree.
//!
//! Every operation runs `git` (or `sh`) with the tree root as its working
//! directory; nothing here changes the process-wide current directory.
//! Operations report failure through [`CommandResult`] instead of erroring, so
//! the executor and verifier decide what is fatal.

use std::ffi::OsStr;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use anyhow::{Result, anyhow};
use tracing::{debug, instrument, warn};

use crate::core::manifest::BlobHashManifest;
use crate::io::config::{GitConfig, PatchloopConfig};
use crate::io::process::ProcessLimits;
use crate::io::shell::{CommandResult, execute, run_shell};

/// Parsed `git status --porcelain` entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusEntry {
    /// 2-letter XY code, or "??" for untracked.
    pub code: String,
    pub path: String,
}

/// Handle on a working tree and its git history.
#[derive(Debug, Clone)]
pub struct Repo {
    root: PathBuf,
    limits: ProcessLimits,
    identity: GitConfig,
}

impl Repo {
    /// Adapter with default limits and commit identity.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            limits: ProcessLimits::default(),
            identity: GitConfig::default(),
        }
    }

    pub fn from_config(root: impl Into<PathBuf>, cfg: &PatchloopConfig) -> Self {
        Self {
            root: root.into(),
            limits: cfg.limits(),
            identity: cfg.git.clone(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Absolute location of a repository-relative path.
    pub fn resolve(&self, rel: impl AsRef<Path>) -> PathBuf {
        self.root.join(rel)
    }

    /// Create the root if needed and initialize git there. Safe to repeat.
    #[instrument(skip_all, fields(root = %self.root.display()))]
    pub fn init(&self) -> CommandResult {
        if let Err(err) = fs::create_dir_all(&self.root) {
            warn!(err = %err, "could not create repository root");
        }
        self.git(["init"], None)
    }

    /// Run an arbitrary shell pipeline in the tree root.
    pub fn run_command(&self, command: &str) -> CommandResult {
        run_shell(command, &self.root, self.limits)
    }

    /// Apply a unified diff to the working tree.
    #[instrument(skip_all)]
    pub fn apply_patch(&self, document: &str) -> CommandResult {
        let result = self.git(["apply", "-"], Some(document.as_bytes()));
        if !result.success {
            debug!(output = %result.output, "git apply rejected patch");
        }
        result
    }

    /// Undo a previously applied diff.
    #[instrument(skip_all)]
    pub fn apply_reverse_patch(&self, document: &str) -> CommandResult {
        self.git(["apply", "--reverse", "-"], Some(document.as_bytes()))
    }

    /// Include `path` (file or directory) in the next commit.
    pub fn stage(&self, path: &str) -> CommandResult {
        self.git(["add", "--", path], None)
    }

    /// Drop `path` (recursively) from the index so its removal is committed.
    ///
    /// Works whether or not the path was tracked, staged, or still on disk;
    /// removing the working-tree copy is the caller's job.
    pub fn unstage_and_delete(&self, path: &str) -> CommandResult {
        self.git(
            ["rm", "-r", "-q", "-f", "--cached", "--ignore-unmatch", "--", path],
            None,
        )
    }

    /// Record everything staged as one new commit.
    #[instrument(skip_all)]
    pub fn commit(&self, message: &str) -> CommandResult {
        let name = format!("user.name={}", self.identity.author_name);
        let email = format!("user.email={}", self.identity.author_email);
        let result = self.git(
            [
                "-c",
                name.as_str(),
                "-c",
                email.as_str(),
                "-c",
                "commit.gpgsign=false",
                "commit",
                "-m",
                message,
            ],
            None,
        );
        if result.success {
            debug!("commit created");
        } else {
            warn!(output = %result.output, "commit failed");
        }
        result
    }

    /// Full hash of `HEAD`.
    pub fn current_revision_id(&self) -> CommandResult {
        self.git(["rev-parse", "HEAD"], None)
    }

    /// Path -> blob hash for every file in the `HEAD` tree.
    ///
    /// Uncommitted edits are not reflected. A repository without commits
    /// yields an empty manifest.
    #[instrument(skip_all)]
    pub fn blob_hash_manifest(&self) -> BlobHashManifest {
        let result = self.git(["ls-tree", "-r", "-z", "HEAD"], None);
        if !result.success {
            debug!(output = %result.output, "no committed tree");
            return BlobHashManifest::default();
        }
        match BlobHashManifest::from_ls_tree(&result.output) {
            Ok(manifest) => {
                debug!(entries = manifest.len(), "loaded blob manifest");
                manifest
            }
            Err(err) => {
                warn!(err = %err, "unparseable ls-tree output");
                BlobHashManifest::default()
            }
        }
    }

    /// True if the index differs from `HEAD`.
    pub fn has_staged_changes(&self) -> bool {
        let result = self.git(["diff", "--cached", "--name-only"], None);
        result.success && !result.output.trim().is_empty()
    }

    /// Status entries (including untracked) in porcelain format.
    pub fn status_porcelain(&self) -> Result<Vec<StatusEntry>> {
        let result = self.git(["status", "--porcelain=v1", "-uall"], None);
        if !result.success {
            return Err(anyhow!("git status failed: {}", result.output.trim()));
        }
        result
            .output
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(parse_status_line)
            .collect()
    }

    fn git<I, S>(&self, args: I, stdin: Option<&[u8]>) -> CommandResult
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let mut cmd = Command::new("git");
        cmd.args(args).current_dir(&self.root);
        execute(cmd, stdin, self.limits)
    }
}

fn parse_status_line(line: &str) -> Result<StatusEntry> {
    if let Some(path) = line.strip_prefix("?? ") {
        return Ok(StatusEntry {
            code: "??".to_string(),
            path: path.trim().to_string(),
        });
    }
    if line.len() < 4 {
        return Err(anyhow!("unexpected porcelain line: '{line}'"));
    }
    let code = line[..2].to_string();
    let mut path = line[3..].trim().to_string();
    if let Some((_, new)) = path.split_once("->") {
        path = new.trim().to_string();
    }
    Ok(StatusEntry { code, path })
}
