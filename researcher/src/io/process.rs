//! Child processes with a hard timeout and bounded output capture.

use std::io::Read;
use std::process::{Command, ExitStatus, Stdio};
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use tracing::{debug, instrument, warn};
use wait_timeout::ChildExt;

/// Captured output of a finished (or killed) child.
#[derive(Debug)]
pub struct CapturedOutput {
    pub status: ExitStatus,
    pub stdout: String,
    pub stderr: String,
    /// Bytes of stdout dropped beyond the capture limit.
    pub stdout_dropped: usize,
    pub timed_out: bool,
}

impl CapturedOutput {
    pub fn succeeded(&self) -> bool {
        !self.timed_out && self.status.success()
    }
}

/// Run `cmd` with stdin closed, killing it once `timeout` elapses.
///
/// Both pipes are drained on reader threads while the child runs so a chatty
/// child cannot block on a full pipe. At most `output_limit_bytes` of each
/// stream is kept; the rest is read and discarded.
#[instrument(skip_all, fields(program = ?cmd.get_program(), timeout_secs = timeout.as_secs()))]
pub fn run_captured(
    mut cmd: Command,
    timeout: Duration,
    output_limit_bytes: usize,
) -> Result<CapturedOutput> {
    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    let mut child = cmd.spawn().context("spawn command")?;
    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| anyhow!("stdout was not piped"))?;
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| anyhow!("stderr was not piped"))?;

    let stdout_reader = thread::spawn(move || drain_limited(stdout, output_limit_bytes));
    let stderr_reader = thread::spawn(move || drain_limited(stderr, output_limit_bytes));

    let (status, timed_out) = match child.wait_timeout(timeout).context("wait for command")? {
        Some(status) => (status, false),
        None => {
            warn!(timeout_secs = timeout.as_secs(), "command timed out, killing");
            child.kill().context("kill command")?;
            (child.wait().context("wait command after kill")?, true)
        }
    };

    let (stdout, stdout_dropped) = join_reader(stdout_reader).context("join stdout")?;
    let (stderr, _) = join_reader(stderr_reader).context("join stderr")?;
    if stdout_dropped > 0 {
        warn!(stdout_dropped, "command output truncated");
    }

    debug!(exit_code = ?status.code(), timed_out, "command finished");
    Ok(CapturedOutput {
        status,
        stdout: String::from_utf8_lossy(&stdout).into_owned(),
        stderr: String::from_utf8_lossy(&stderr).into_owned(),
        stdout_dropped,
        timed_out,
    })
}

fn join_reader(handle: thread::JoinHandle<Result<(Vec<u8>, usize)>>) -> Result<(Vec<u8>, usize)> {
    handle
        .join()
        .map_err(|_| anyhow!("output reader thread panicked"))?
}

fn drain_limited<R: Read>(mut reader: R, limit: usize) -> Result<(Vec<u8>, usize)> {
    let mut kept = Vec::new();
    let mut dropped = 0usize;
    let mut chunk = [0u8; 8192];
    loop {
        let n = reader.read(&mut chunk).context("read output")?;
        if n == 0 {
            break;
        }
        let keep = n.min(limit.saturating_sub(kept.len()));
        kept.extend_from_slice(&chunk[..keep]);
        dropped += n - keep;
    }
    Ok((kept, dropped))
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn sh(script: &str) -> Command {
        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg(script);
        cmd
    }

    #[test]
    fn captures_stdout_and_status() {
        let output = run_captured(sh("printf 'hello'"), Duration::from_secs(5), 1024)
            .expect("run");
        assert!(output.succeeded());
        assert_eq!(output.stdout, "hello");
        assert_eq!(output.stdout_dropped, 0);
    }

    #[test]
    fn truncates_beyond_limit() {
        let output = run_captured(sh("printf 'abcdef'"), Duration::from_secs(5), 4)
            .expect("run");
        assert_eq!(output.stdout, "abcd");
        assert_eq!(output.stdout_dropped, 2);
    }

    #[test]
    fn kills_on_timeout() {
        let output = run_captured(sh("sleep 5"), Duration::from_millis(100), 1024)
            .expect("run");
        assert!(output.timed_out);
        assert!(!output.succeeded());
    }

    #[test]
    fn reports_nonzero_exit() {
        let output = run_captured(sh("echo oops >&2; exit 3"), Duration::from_secs(5), 1024)
            .expect("run");
        assert!(!output.succeeded());
        assert_eq!(output.status.code(), Some(3));
        assert!(output.stderr.contains("oops"));
    }
}
