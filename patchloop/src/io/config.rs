//! Patchloop configuration, read from `.patchloop.toml` or `--config`.

use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::io::process::{DEFAULT_OUTPUT_LIMIT_BYTES, ProcessLimits};

/// Default config file name, looked up in the working-tree root.
pub const CONFIG_FILE_NAME: &str = ".patchloop.toml";

/// Patchloop configuration (TOML).
///
/// Missing fields fall back to defaults, so an empty file is valid.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct PatchloopConfig {
    /// Wall-clock limit for every subprocess, verification commands included.
    pub command_timeout_secs: u64,

    /// Bytes of stdout/stderr kept per stream.
    pub output_limit_bytes: usize,

    /// Refuse patches whose `blob_hash` disagrees with the committed tree.
    pub verify_blob_hash: bool,

    /// Rewrite bare `mkdir` to `mkdir -p` in verification commands.
    pub normalize_mkdir: bool,

    pub git: GitConfig,
}

/// Identity used for commits, so rounds work without a global git identity.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct GitConfig {
    pub author_name: String,
    pub author_email: String,
}

impl Default for GitConfig {
    fn default() -> Self {
        Self {
            author_name: "patchloop".to_string(),
            author_email: "patchloop@local.invalid".to_string(),
        }
    }
}

impl Default for PatchloopConfig {
    fn default() -> Self {
        Self {
            command_timeout_secs: 10 * 60,
            output_limit_bytes: DEFAULT_OUTPUT_LIMIT_BYTES,
            verify_blob_hash: true,
            normalize_mkdir: true,
            git: GitConfig::default(),
        }
    }
}

impl PatchloopConfig {
    pub fn validate(&self) -> Result<()> {
        if self.command_timeout_secs == 0 {
            return Err(anyhow!("command_timeout_secs must be > 0"));
        }
        if self.output_limit_bytes == 0 {
            return Err(anyhow!("output_limit_bytes must be > 0"));
        }
        if self.git.author_name.trim().is_empty() {
            return Err(anyhow!("git.author_name must be non-empty"));
        }
        if self.git.author_email.trim().is_empty() {
            return Err(anyhow!("git.author_email must be non-empty"));
        }
        Ok(())
    }

    pub fn limits(&self) -> ProcessLimits {
        ProcessLimits {
            timeout: Duration::from_secs(self.command_timeout_secs),
            output_limit_bytes: self.output_limit_bytes,
        }
    }
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `PatchloopConfig::default()`.
pub fn load_config(path: &Path) -> Result<PatchloopConfig> {
    if !path.exists() {
        let cfg = PatchloopConfig::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: PatchloopConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()
        .with_context(|| format!("invalid config {}", path.display()))?;
    Ok(cfg)
}

/// Write the default config to `path` unless a file is already there.
///
/// Returns `true` if a file was written. `force` replaces an existing file.
pub fn init_config(path: &Path, force: bool) -> Result<bool> {
    if path.exists() && !force {
        debug!(path = %path.display(), "config already present");
        return Ok(false);
    }
    write_config(path, &PatchloopConfig::default())?;
    Ok(true)
}

/// Atomically write config to disk (temp file + rename).
pub fn write_config(path: &Path, cfg: &PatchloopConfig) -> Result<()> {
    cfg.validate()?;
    let mut buf = toml::to_string_pretty(cfg).context("serialize config toml")?;
    buf.push('\n');
    let parent = path
        .parent()
        .with_context(|| format!("config path missing parent {}", path.display()))?;
    if !parent.as_os_str().is_empty() {
        fs::create_dir_all(parent)
            .with_context(|| format!("create directory {}", parent.display()))?;
    }
    let tmp_path = path.with_extension("toml.tmp");
    fs::write(&tmp_path, buf)
        .with_context(|| format!("write temp config {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("replace config {}", path.display()))?;
    Ok(())
}
