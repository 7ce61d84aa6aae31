//! Child-process spawning with timeouts and bounded output capture.

use std::io::{Read, Write};
use std::process::{Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result, anyhow};
use tracing::{debug, error, instrument, warn};
use wait_timeout::ChildExt;

/// Captured child process output.
#[derive(Debug)]
pub struct CommandOutput {
    pub status: ExitStatus,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    pub stdout_truncated: usize,
    pub stderr_truncated: usize,
    pub timed_out: bool,
    /// Wall-clock time from spawn to exit or termination.
    pub elapsed: Duration,
}

/// Run a command with a timeout and capture stdout/stderr without risking
/// pipe deadlocks. Output is read concurrently while the child runs;
/// `output_limit_bytes` bounds the bytes kept per stream (the pipe is still
/// drained past the limit).
///
/// `on_spawn` receives the child's pid right after spawn, before any wait, so
/// callers can register it for external cancellation. A child killed through
/// that path surfaces here as an ordinary signal exit.
#[instrument(skip_all, fields(timeout_secs = timeout.as_secs(), output_limit_bytes))]
pub fn run_command_with_timeout(
    mut cmd: Command,
    stdin: Option<&[u8]>,
    timeout: Duration,
    output_limit_bytes: usize,
    on_spawn: impl FnOnce(u32),
) -> Result<CommandOutput> {
    if stdin.is_some() {
        cmd.stdin(Stdio::piped());
    } else {
        cmd.stdin(Stdio::null());
    }
    cmd.stdout(Stdio::piped()).stderr(Stdio::piped());

    let start = Instant::now();
    debug!("spawning child process");
    let mut child = match cmd.spawn() {
        Ok(c) => c,
        Err(e) => {
            error!(err = %e, "failed to spawn command");
            return Err(e).context("spawn command");
        }
    };
    on_spawn(child.id());

    if let Some(input) = stdin {
        let mut child_stdin = child
            .stdin
            .take()
            .ok_or_else(|| anyhow!("stdin was not piped"))?;
        child_stdin.write_all(input).context("write stdin")?;
    }

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
    let status = match child.wait_timeout(timeout).context("wait for command")? {
        Some(status) => status,
        None => {
            warn!(timeout_secs = timeout.as_secs(), "command timed out, killing");
            timed_out = true;
            child.kill().context("kill command")?;
            child.wait().context("wait command after kill")?
        }
    };
    let elapsed = start.elapsed();

    let (stdout, stdout_truncated) = join_output(stdout_handle).context("join stdout")?;
    let (stderr, stderr_truncated) = join_output(stderr_handle).context("join stderr")?;

    if stdout_truncated > 0 || stderr_truncated > 0 {
        warn!(stdout_truncated, stderr_truncated, "output truncated");
    }

    debug!(exit_code = ?status.code(), timed_out, "command finished");
    Ok(CommandOutput {
        status,
        stdout,
        stderr,
        stdout_truncated,
        stderr_truncated,
        timed_out,
        elapsed,
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
    fn captures_stdout_and_exit_status() {
        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg("echo hello");
        let output =
            run_command_with_timeout(cmd, None, Duration::from_secs(5), 1024, |_| {}).expect("run");
        assert!(output.status.success());
        assert!(!output.timed_out);
        assert_eq!(String::from_utf8_lossy(&output.stdout).trim(), "hello");
    }

    #[test]
    fn reports_timeout_and_elapsed_wall_clock() {
        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg("sleep 10");
        let output =
            run_command_with_timeout(cmd, None, Duration::from_millis(200), 1024, |_| {})
                .expect("run");
        assert!(output.timed_out);
        assert!(output.elapsed >= Duration::from_millis(200));
        assert!(output.elapsed < Duration::from_secs(5));
    }

    #[test]
    fn truncates_output_past_limit_while_draining() {
        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg("yes x | head -c 10000");
        let output =
            run_command_with_timeout(cmd, None, Duration::from_secs(5), 100, |_| {}).expect("run");
        assert_eq!(output.stdout.len(), 100);
        assert!(output.stdout_truncated > 0);
    }

    #[test]
    fn passes_stdin_to_the_child() {
        let mut cmd = Command::new("cat");
        cmd.arg("-");
        let output =
            run_command_with_timeout(cmd, Some(b"payload"), Duration::from_secs(5), 1024, |_| {})
                .expect("run");
        assert_eq!(String::from_utf8_lossy(&output.stdout), "payload");
    }

    #[test]
    fn invokes_spawn_hook_with_pid() {
        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg("true");
        let mut seen = None;
        run_command_with_timeout(cmd, None, Duration::from_secs(5), 1024, |pid| {
            seen = Some(pid);
        })
        .expect("run");
        assert!(seen.is_some());
    }
}
