//! Per-entry failures reported by the change executor.

use std::fmt;

use serde::Serialize;

/// Why a single change in a batch was not applied.
///
/// These never abort a batch; they are recorded in the entry's report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ChangeError {
    /// `git apply` refused the hunk (stale content or malformed hunk).
    ApplyRejected { file_name: String, output: String },
    /// Delete requested for a file that does not exist.
    NotFound { path: String },
    /// The patch references a blob hash other than the committed one.
    StaleReference {
        file_name: String,
        expected: String,
        actual: String,
    },
    /// The path escapes the working tree or is otherwise unusable.
    InvalidPath { path: String, reason: String },
    /// The change landed on disk but could not be staged.
    StageFailed { path: String, output: String },
    /// Filesystem operation failed.
    Io { path: String, message: String },
    /// A required subprocess could not be started or timed out.
    ProcessInvocation { message: String },
}

impl fmt::Display for ChangeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChangeError::ApplyRejected { file_name, output } => {
                write!(f, "patch for {file_name} rejected: {output}")
            }
            ChangeError::NotFound { path } => write!(f, "{path} not found"),
            ChangeError::StaleReference {
                file_name,
                expected,
                actual,
            } => write!(
                f,
                "stale blob reference for {file_name}: patch targets {expected}, HEAD has {actual}"
            ),
            ChangeError::InvalidPath { path, reason } => write!(f, "invalid path {path:?}: {reason}"),
            ChangeError::StageFailed { path, output } => {
                write!(f, "failed to stage {path}: {output}")
            }
            ChangeError::Io { path, message } => write!(f, "I/O error on {path}: {message}"),
            ChangeError::ProcessInvocation { message } => {
                write!(f, "process invocation failed: {message}")
            }
        }
    }
}

impl std::error::Error for ChangeError {}

impl ChangeError {
    pub(crate) fn io(path: &str, err: &std::io::Error) -> Self {
        ChangeError::Io {
            path: path.to_string(),
            message: err.to_string(),
        }
    }
}
