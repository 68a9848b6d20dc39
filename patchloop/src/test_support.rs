//! Test-only helpers: throwaway git repositories and patch builders.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result, anyhow};
use tempfile::TempDir;

use crate::core::types::{PatchLine, PatchSpec};
use crate::io::repo::Repo;

/// A freshly initialized repository in a temporary directory.
pub struct TestRepo {
    _dir: TempDir,
    repo: Repo,
}

impl TestRepo {
    pub fn new() -> Result<Self> {
        let dir = tempfile::tempdir().context("create tempdir")?;
        let repo = Repo::new(dir.path());
        let init = repo.init();
        if !init.success {
            return Err(anyhow!("git init failed: {}", init.output));
        }
        Ok(Self { _dir: dir, repo })
    }

    pub fn path(&self) -> &Path {
        self.repo.root()
    }

    pub fn repo(&self) -> &Repo {
        &self.repo
    }

    pub fn write(&self, rel: &str, contents: &str) -> Result<()> {
        let path = self.repo.resolve(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| format!("create {}", parent.display()))?;
        }
        fs::write(&path, contents).with_context(|| format!("write {}", path.display()))
    }

    pub fn read(&self, rel: &str) -> Result<String> {
        let path = self.repo.resolve(rel);
        fs::read_to_string(&path).with_context(|| format!("read {}", path.display()))
    }

    pub fn exists(&self, rel: &str) -> bool {
        self.repo.resolve(rel).exists()
    }

    /// Stage everything and commit; returns the new `HEAD`.
    pub fn commit_all(&self, message: &str) -> Result<String> {
        let add = self.repo.run_command("git add -A");
        if !add.success {
            return Err(anyhow!("git add failed: {}", add.output));
        }
        let commit = self.repo.commit(message);
        if !commit.success {
            return Err(anyhow!("git commit failed: {}", commit.output));
        }
        let head = self.repo.current_revision_id();
        if !head.success {
            return Err(anyhow!("rev-parse failed: {}", head.output));
        }
        Ok(head.output)
    }

    /// Write `rel`, commit it, and return its committed blob hash.
    pub fn commit_file(&self, rel: &str, contents: &str) -> Result<String> {
        self.write(rel, contents)?;
        self.commit_all(&format!("add {rel}"))?;
        self.blob_hash(rel)
    }

    /// Committed blob hash of `rel`.
    pub fn blob_hash(&self, rel: &str) -> Result<String> {
        self.repo
            .blob_hash_manifest()
            .get(rel)
            .map(str::to_string)
            .ok_or_else(|| anyhow!("{rel} is not committed"))
    }
}

/// Build a patch from wire-style prefixed lines (`" ctx"`, `"+add"`, `"-del"`).
pub fn patch(file_name: &str, blob_hash: &str, diff_range: &str, lines: &[&str]) -> PatchSpec {
    PatchSpec {
        file_name: file_name.to_string(),
        blob_hash: blob_hash.to_string(),
        diff_range: diff_range.parse().expect("test diff range"),
        changes: lines
            .iter()
            .map(|line| PatchLine::try_from(line.to_string()).expect("test patch line"))
            .collect(),
    }
}
