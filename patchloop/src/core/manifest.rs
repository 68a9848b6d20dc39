//! Committed path -> blob hash manifest.
//!
//! The manifest only ever reflects the `HEAD` tree. Working-tree edits and
//! staged-but-uncommitted files are invisible here; the collaborator uses it as
//! the source of truth for the `blob_hash` it puts into the next patch.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Shortest hash prefix accepted as a blob reference (git's default abbreviation).
pub const MIN_HASH_PREFIX: usize = 7;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BlobHashManifest {
    entries: BTreeMap<String, String>,
}

/// Result of checking a claimed blob hash against the manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HashCheck {
    /// The claimed hash is the live hash (or an unambiguous prefix of it).
    Matches,
    /// The path is not part of the committed tree, so nothing can be attested.
    Untracked,
    /// The path is tracked but under a different hash.
    Stale { actual: String },
}

impl BlobHashManifest {
    /// Parse NUL-terminated `git ls-tree -r -z` output.
    ///
    /// Each record is `<mode> SP <type> SP <hash> TAB <path>`. Non-blob entries
    /// (submodule commits) are skipped.
    pub fn from_ls_tree(raw: &str) -> Result<Self, String> {
        let mut entries = BTreeMap::new();
        for record in raw.split('\0') {
            let record = record.trim_start_matches('\n');
            if record.is_empty() {
                continue;
            }
            let (meta, path) = record
                .split_once('\t')
                .ok_or_else(|| format!("unexpected ls-tree record: {record:?}"))?;
            let mut fields = meta.split(' ');
            let (Some(_mode), Some(kind), Some(hash), None) =
                (fields.next(), fields.next(), fields.next(), fields.next())
            else {
                return Err(format!("unexpected ls-tree record: {record:?}"));
            };
            if kind != "blob" {
                continue;
            }
            entries.insert(path.to_string(), hash.to_string());
        }
        Ok(Self { entries })
    }

    pub fn get(&self, path: &str) -> Option<&str> {
        self.entries.get(path).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Check whether `claimed` attests the committed content of `path`.
    pub fn check(&self, path: &str, claimed: &str) -> HashCheck {
        let Some(actual) = self.get(normalize(path)) else {
            return HashCheck::Untracked;
        };
        let claimed = claimed.trim().to_ascii_lowercase();
        if claimed.len() >= MIN_HASH_PREFIX && actual.starts_with(&claimed) {
            return HashCheck::Matches;
        }
        HashCheck::Stale {
            actual: actual.to_string(),
        }
    }
}

/// Manifest keys never carry a leading `./`.
fn normalize(path: &str) -> &str {
    let mut path = path;
    while let Some(rest) = path.strip_prefix("./") {
        path = rest;
    }
    path
}
