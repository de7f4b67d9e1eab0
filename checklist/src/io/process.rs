//! Helpers for running shell commands with bounded output capture.
//!
//! `exec` runs a command synchronously to completion with no timeout (a
//! hanging command blocks the loop; the surrounding executor may impose its
//! own limit). Validation commands run with the configured timeout.

use std::io::Read;
use std::process::{Command, Stdio};
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use tracing::{debug, error, instrument, warn};
use wait_timeout::ChildExt;

use crate::core::outcome::ActualResult;

/// Captured child process output.
#[derive(Debug)]
pub struct CommandOutput {
    /// Exit code, or `None` when the process was killed by a signal.
    pub exit_code: Option<i32>,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    pub stdout_truncated: usize,
    pub stderr_truncated: usize,
    pub timed_out: bool,
}

impl CommandOutput {
    pub fn stdout_lossy(&self) -> String {
        String::from_utf8_lossy(&self.stdout).to_string()
    }

    pub fn stderr_lossy(&self) -> String {
        String::from_utf8_lossy(&self.stderr).to_string()
    }

    /// View for the output validator.
    pub fn to_actual(&self) -> ActualResult {
        ActualResult {
            stdout: self.stdout_lossy(),
            stderr: self.stderr_lossy(),
            exit_code: self.exit_code,
        }
    }
}

/// Run a shell command, capturing stdout/stderr without risking pipe deadlocks.
///
/// Output is read concurrently while the child runs. `output_limit_bytes`
/// bounds the amount of stdout/stderr stored in memory (bytes beyond this are
/// discarded while still draining the pipe). With `timeout = None` the call
/// waits indefinitely.
#[instrument(skip_all, fields(command, timeout_secs = timeout.map(|t| t.as_secs()), output_limit_bytes))]
pub fn run_shell_command(
    command: &str,
    workdir: &std::path::Path,
    timeout: Option<Duration>,
    output_limit_bytes: usize,
) -> Result<CommandOutput> {
    let mut cmd = Command::new("sh");
    cmd.arg("-c")
        .arg(command)
        .current_dir(workdir)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    debug!("spawning child process");
    let mut child = match cmd.spawn() {
        Ok(child) => child,
        Err(err) => {
            error!(err = %err, "failed to spawn command");
            return Err(err).context("spawn command");
        }
    };

    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| anyhow!("stdout was not piped"))?;
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| anyhow!("stderr was not piped"))?;

    let stdout_handle = thread::spawn(move || read_stream_limited(stdout, output_limit_bytes));
    let stderr_handle = thread::spawn(move || read_stream_limited(stderr, output_limit_bytes));

    let mut timed_out = false;
    let status = match timeout {
        None => child.wait().context("wait for command")?,
        Some(timeout) => match child.wait_timeout(timeout).context("wait for command")? {
            Some(status) => status,
            None => {
                warn!(timeout_secs = timeout.as_secs(), "command timed out, killing");
                timed_out = true;
                child.kill().context("kill command")?;
                child.wait().context("wait command after kill")?
            }
        },
    };

    let (stdout, stdout_truncated) = join_output(stdout_handle).context("join stdout")?;
    let (stderr, stderr_truncated) = join_output(stderr_handle).context("join stderr")?;

    if stdout_truncated > 0 || stderr_truncated > 0 {
        warn!(stdout_truncated, stderr_truncated, "output truncated");
    }

    debug!(exit_code = ?status.code(), timed_out, "command finished");
    Ok(CommandOutput {
        exit_code: status.code(),
        stdout,
        stderr,
        stdout_truncated,
        stderr_truncated,
        timed_out,
    })
}

fn join_output(handle: thread::JoinHandle<Result<(Vec<u8>, usize)>>) -> Result<(Vec<u8>, usize)> {
    match handle.join() {
        Ok(result) => result,
        Err(_) => Err(anyhow!("output reader thread panicked")),
    }
}

fn read_stream_limited<R: Read>(mut reader: R, limit: usize) -> Result<(Vec<u8>, usize)> {
    let mut buf = Vec::new();
    let mut truncated = 0usize;
    let mut chunk = [0u8; 8192];

    loop {
        let n = reader.read(&mut chunk).context("read output")?;
        if n == 0 {
            break;
        }
        let remaining = limit.saturating_sub(buf.len());
        if remaining > 0 {
            let keep = n.min(remaining);
            buf.extend_from_slice(&chunk[..keep]);
            truncated += n.saturating_sub(keep);
        } else {
            truncated += n;
        }
    }

    Ok((buf, truncated))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn captures_stdout_and_exit_code() {
        let temp = tempfile::tempdir().expect("tempdir");
        let output =
            run_shell_command("printf PASS", temp.path(), None, 1_000).expect("run");
        assert_eq!(output.exit_code, Some(0));
        assert_eq!(output.stdout_lossy(), "PASS");
        assert!(!output.timed_out);
    }

    #[test]
    fn captures_nonzero_exit_and_stderr() {
        let temp = tempfile::tempdir().expect("tempdir");
        let output = run_shell_command("printf err >&2; exit 3", temp.path(), None, 1_000)
            .expect("run");
        assert_eq!(output.exit_code, Some(3));
        assert_eq!(output.stderr_lossy(), "err");
    }

    #[test]
    fn output_beyond_limit_is_truncated() {
        let temp = tempfile::tempdir().expect("tempdir");
        let output = run_shell_command("printf aaaaaaaaaa", temp.path(), None, 4).expect("run");
        assert_eq!(output.stdout, b"aaaa");
        assert_eq!(output.stdout_truncated, 6);
    }

    #[test]
    fn timeout_kills_the_command() {
        let temp = tempfile::tempdir().expect("tempdir");
        let output = run_shell_command(
            "sleep 5",
            temp.path(),
            Some(Duration::from_millis(100)),
            1_000,
        )
        .expect("run");
        assert!(output.timed_out);
    }
}
