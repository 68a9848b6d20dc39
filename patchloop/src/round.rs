//! One collaborator round: apply a batch, commit it, re-check the requirement.

use serde::Serialize;
use tracing::{info, instrument, warn};

use crate::apply::{ApplyOptions, BatchReport, apply_batch};
use crate::core::types::{ChangeBatch, Requirement};
use crate::io::config::PatchloopConfig;
use crate::io::repo::Repo;
use crate::verify::{Verdict, VerifyOptions, verify};

/// Inputs for [`run_round`].
#[derive(Debug, Clone, Copy)]
pub struct Round<'a> {
    pub batch: &'a ChangeBatch,
    pub requirement: &'a Requirement,
    pub commit_message: &'a str,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RoundOptions {
    pub apply: ApplyOptions,
    pub verify: VerifyOptions,
}

impl From<&PatchloopConfig> for RoundOptions {
    fn from(cfg: &PatchloopConfig) -> Self {
        Self {
            apply: ApplyOptions::from(cfg),
            verify: VerifyOptions::from(cfg),
        }
    }
}

/// What a round did and what the requirement check concluded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RoundOutcome {
    pub report: BatchReport,
    /// True if this round produced a new commit.
    pub committed: bool,
    /// `HEAD` after the round, if the repository has any commit.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub revision: Option<String>,
    /// Commit diagnostics when something was staged but the commit failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub commit_error: Option<String>,
    pub verdict: Verdict,
}

/// Apply, commit (only if something is staged), then verify.
///
/// Verification runs even when entries failed or nothing was committed; the
/// collaborator needs the verdict either way.
#[instrument(skip_all, fields(message = round.commit_message))]
pub fn run_round(repo: &Repo, round: &Round<'_>, options: &RoundOptions) -> RoundOutcome {
    let report = apply_batch(repo, round.batch, &options.apply);

    let mut committed = false;
    let mut commit_error = None;
    if repo.has_staged_changes() {
        let result = repo.commit(round.commit_message);
        if result.success {
            committed = true;
        } else {
            warn!("round commit failed");
            commit_error = Some(result.output);
        }
    } else {
        info!("nothing staged, skipping commit");
    }

    let head = repo.current_revision_id();
    let revision = head.success.then_some(head.output);

    let verdict = verify(repo, round.requirement, &options.verify);
    RoundOutcome {
        report,
        committed,
        revision,
        commit_error,
        verdict,
    }
}
