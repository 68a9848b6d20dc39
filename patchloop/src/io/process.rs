//! Child-process execution with a timeout and bounded output capture.
//!
//! Each child leads its own process group. A timeout kills the whole group,
//! so commands forked by `sh -c "a && b"` die with the shell and release the
//! output pipes.

use std::io::{Read, Write};
use std::process::{Child, ChildStderr, ChildStdout, Command, ExitStatus, Stdio};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use tracing::{debug, error, instrument, warn};
use wait_timeout::ChildExt;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10 * 60);
pub const DEFAULT_OUTPUT_LIMIT_BYTES: usize = 1_000_000;

/// Bounds applied to every child process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessLimits {
    pub timeout: Duration,
    /// Bytes kept per stream; the rest is drained and counted.
    pub output_limit_bytes: usize,
}

impl Default for ProcessLimits {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            output_limit_bytes: DEFAULT_OUTPUT_LIMIT_BYTES,
        }
    }
}

/// One output stream, cut at the byte limit.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Captured {
    pub bytes: Vec<u8>,
    /// Bytes read past the limit and thrown away.
    pub dropped: usize,
}

impl Captured {
    fn lossy(&self, label: &str) -> String {
        let mut text = String::from_utf8_lossy(&self.bytes).into_owned();
        if self.dropped > 0 {
            text.push_str(&format!("\n[{label} truncated {} bytes]", self.dropped));
        }
        text
    }
}

/// What a finished (or killed) child left behind.
#[derive(Debug)]
pub struct CommandOutput {
    pub status: ExitStatus,
    pub stdout: Captured,
    pub stderr: Captured,
    pub timed_out: bool,
}

impl CommandOutput {
    pub fn stdout_lossy(&self) -> String {
        self.stdout.lossy("stdout")
    }

    pub fn stderr_lossy(&self) -> String {
        self.stderr.lossy("stderr")
    }
}

/// Run `cmd` to completion (or until `limits.timeout`), feeding `stdin` if given.
///
/// An `Err` means the process could not be started or waited on; a non-zero
/// exit is reported through `status`.
#[instrument(skip_all, fields(timeout_secs = limits.timeout.as_secs()))]
pub fn run_with_limits(
    mut cmd: Command,
    stdin: Option<&[u8]>,
    limits: ProcessLimits,
) -> Result<CommandOutput> {
    cmd.stdin(if stdin.is_some() {
        Stdio::piped()
    } else {
        Stdio::null()
    })
    .stdout(Stdio::piped())
    .stderr(Stdio::piped());
    own_process_group(&mut cmd);

    debug!(program = ?cmd.get_program(), "spawning child process");
    let mut child = cmd.spawn().map_err(|err| {
        error!(err = %err, "failed to spawn command");
        anyhow!(err).context(format!("spawn {:?}", cmd.get_program()))
    })?;

    // Readers start before stdin is written so a child that echoes its input
    // cannot fill a pipe and stall the write.
    let readers = Readers::start(&mut child, limits.output_limit_bytes)?;
    if let Some(input) = stdin {
        feed(&mut child, input)?;
    }

    let (status, timed_out) = wait_or_kill(&mut child, limits.timeout)?;
    let (stdout, stderr) = readers.finish()?;
    if stdout.dropped > 0 || stderr.dropped > 0 {
        warn!(
            stdout_dropped = stdout.dropped,
            stderr_dropped = stderr.dropped,
            "output truncated"
        );
    }

    debug!(exit_code = ?status.code(), timed_out, "command finished");
    Ok(CommandOutput {
        status,
        stdout,
        stderr,
        timed_out,
    })
}

fn feed(child: &mut Child, input: &[u8]) -> Result<()> {
    let mut pipe = child
        .stdin
        .take()
        .ok_or_else(|| anyhow!("stdin was not piped"))?;
    // A child may exit without reading; its exit status carries the failure.
    if let Err(err) = pipe.write_all(input) {
        warn!(err = %err, "child closed stdin early");
    }
    Ok(())
}

fn wait_or_kill(child: &mut Child, timeout: Duration) -> Result<(ExitStatus, bool)> {
    if let Some(status) = child.wait_timeout(timeout).context("wait for command")? {
        return Ok((status, false));
    }
    warn!(timeout_secs = timeout.as_secs(), "command timed out, killing its process group");
    kill_process_group(child)?;
    let status = child.wait().context("wait command after kill")?;
    Ok((status, true))
}

/// Reader threads draining stdout and stderr while the child runs.
struct Readers {
    stdout: JoinHandle<Result<Captured>>,
    stderr: JoinHandle<Result<Captured>>,
}

impl Readers {
    fn start(child: &mut Child, limit: usize) -> Result<Self> {
        let stdout: ChildStdout = child
            .stdout
            .take()
            .ok_or_else(|| anyhow!("stdout was not piped"))?;
        let stderr: ChildStderr = child
            .stderr
            .take()
            .ok_or_else(|| anyhow!("stderr was not piped"))?;
        Ok(Self {
            stdout: thread::spawn(move || capture(stdout, limit)),
            stderr: thread::spawn(move || capture(stderr, limit)),
        })
    }

    fn finish(self) -> Result<(Captured, Captured)> {
        let stdout = join(self.stdout).context("collect stdout")?;
        let stderr = join(self.stderr).context("collect stderr")?;
        Ok((stdout, stderr))
    }
}

fn join(handle: JoinHandle<Result<Captured>>) -> Result<Captured> {
    handle
        .join()
        .map_err(|_| anyhow!("output reader thread panicked"))?
}

fn capture<R: Read>(mut reader: R, limit: usize) -> Result<Captured> {
    let mut out = Captured::default();
    let mut chunk = [0u8; 8192];
    loop {
        let n = reader.read(&mut chunk).context("read output")?;
        if n == 0 {
            return Ok(out);
        }
        let keep = limit.saturating_sub(out.bytes.len()).min(n);
        out.bytes.extend_from_slice(&chunk[..keep]);
        out.dropped += n - keep;
    }
}

#[cfg(unix)]
fn own_process_group(cmd: &mut Command) {
    use std::os::unix::process::CommandExt;
    cmd.process_group(0);
}

#[cfg(not(unix))]
fn own_process_group(_cmd: &mut Command) {}

#[cfg(unix)]
fn kill_process_group(child: &mut Child) -> Result<()> {
    use nix::errno::Errno;
    use nix::sys::signal::{Signal, killpg};
    use nix::unistd::Pid;

    let pgid = i32::try_from(child.id()).context("child pid out of range")?;
    match killpg(Pid::from_raw(pgid), Signal::SIGKILL) {
        Ok(()) | Err(Errno::ESRCH) => Ok(()),
        Err(err) => {
            warn!(err = %err, "killpg failed, killing the child only");
            child.kill().context("kill command")
        }
    }
}

#[cfg(not(unix))]
fn kill_process_group(child: &mut Child) -> Result<()> {
    child.kill().context("kill command")
}
