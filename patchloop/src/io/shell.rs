//! The uniform `(success, output)` execution primitive.
//!
//! Every repository operation funnels through [`execute`]. Failures are
//! returned as data, never raised, so callers decide what is fatal.

use std::path::Path;
use std::process::Command;

use serde::Serialize;
use tracing::{debug, warn};

use crate::io::process::{ProcessLimits, run_with_limits};

/// Why a command did not succeed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum CommandFailure {
    /// The command ran and exited non-zero (`None` when killed by a signal).
    Exit { code: Option<i32> },
    /// The command exceeded its time budget and was killed.
    TimedOut,
    /// The program could not be started at all.
    Spawn,
}

/// Outcome of one command invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommandResult {
    pub success: bool,
    /// On success: stdout with trailing whitespace trimmed.
    /// On failure: stdout, a newline, then stderr.
    pub output: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<CommandFailure>,
}

impl CommandResult {
    /// False when the process could not be started or was killed on timeout,
    /// i.e. its output says nothing about the command's own verdict.
    pub fn completed(&self) -> bool {
        !matches!(
            self.failure,
            Some(CommandFailure::Spawn | CommandFailure::TimedOut)
        )
    }
}

/// Run a shell pipeline (`sh -c <command>`) inside `cwd`.
pub fn run_shell(command: &str, cwd: &Path, limits: ProcessLimits) -> CommandResult {
    let mut cmd = Command::new("sh");
    cmd.arg("-c").arg(command).current_dir(cwd);
    debug!(command, cwd = %cwd.display(), "running shell command");
    execute(cmd, None, limits)
}

/// Run a prepared command and fold its outcome into a [`CommandResult`].
pub fn execute(cmd: Command, stdin: Option<&[u8]>, limits: ProcessLimits) -> CommandResult {
    let program = format!("{:?}", cmd.get_program());
    let output = match run_with_limits(cmd, stdin, limits) {
        Ok(output) => output,
        Err(err) => {
            warn!(program = %program, err = %format!("{err:#}"), "command could not be run");
            return CommandResult {
                success: false,
                output: format!("{err:#}"),
                failure: Some(CommandFailure::Spawn),
            };
        }
    };

    if output.timed_out {
        let mut text = combined(&output.stdout_lossy(), &output.stderr_lossy());
        text.push_str(&format!(
            "\ncommand timed out after {}s",
            limits.timeout.as_secs_f64()
        ));
        return CommandResult {
            success: false,
            output: text,
            failure: Some(CommandFailure::TimedOut),
        };
    }

    if !output.status.success() {
        return CommandResult {
            success: false,
            output: combined(&output.stdout_lossy(), &output.stderr_lossy()),
            failure: Some(CommandFailure::Exit {
                code: output.status.code(),
            }),
        };
    }

    CommandResult {
        success: true,
        output: output.stdout_lossy().trim_end().to_string(),
        failure: None,
    }
}

fn combined(stdout: &str, stderr: &str) -> String {
    format!("{stdout}\n{stderr}")
}
