//! Requirement verifier.
//!
//! Runs a requirement's commands as one `&&` chain in the tree root and
//! compares the last line of stdout to the expected value. Always returns a
//! verdict; command failures become diagnostics, not errors.

use serde::Serialize;
use tracing::{debug, info, instrument};

use crate::core::pipeline::{final_line, join_commands};
use crate::core::types::Requirement;
use crate::io::config::PatchloopConfig;
use crate::io::repo::Repo;

pub const FULFILLED_MESSAGE: &str = "Requirement fulfilled";
pub const NO_COMMANDS_MESSAGE: &str = "Requirement has no verification commands";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VerifyOptions {
    /// Rewrite bare `mkdir` to `mkdir -p` before running.
    pub normalize_mkdir: bool,
}

impl Default for VerifyOptions {
    fn default() -> Self {
        Self {
            normalize_mkdir: true,
        }
    }
}

impl From<&PatchloopConfig> for VerifyOptions {
    fn from(cfg: &PatchloopConfig) -> Self {
        Self {
            normalize_mkdir: cfg.normalize_mkdir,
        }
    }
}

/// Fulfilled/unfulfilled plus the text shown to the collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Verdict {
    pub fulfilled: bool,
    pub message: String,
}

impl Verdict {
    fn fulfilled() -> Self {
        Self {
            fulfilled: true,
            message: FULFILLED_MESSAGE.to_string(),
        }
    }

    fn unfulfilled(message: impl Into<String>) -> Self {
        Self {
            fulfilled: false,
            message: message.into(),
        }
    }
}

/// Check `requirement` against the current working tree.
#[instrument(skip_all, fields(commands = requirement.verification_commands.len()))]
pub fn verify(repo: &Repo, requirement: &Requirement, options: &VerifyOptions) -> Verdict {
    if requirement.verification_commands.is_empty() {
        return Verdict::unfulfilled(NO_COMMANDS_MESSAGE);
    }

    let pipeline = join_commands(&requirement.verification_commands, options.normalize_mkdir);
    debug!(pipeline = %pipeline, "running verification pipeline");
    let result = repo.run_command(&pipeline);
    if !result.success {
        info!(failure = ?result.failure, "verification pipeline failed");
        return Verdict::unfulfilled(result.output);
    }

    let last = final_line(&result.output);
    if last != requirement.expected_output {
        info!(got = last, "unexpected verification output");
        return Verdict::unfulfilled(format!(
            "Got unexpected output: {last}, expecting {}",
            requirement.expected_output
        ));
    }
    info!("requirement fulfilled");
    Verdict::fulfilled()
}
