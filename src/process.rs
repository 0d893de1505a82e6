//! Child process execution with captured output and a wall-clock timeout.
//!
//! [`run_command`] takes a [`tokio::process::Command`] whose program and
//! arguments are already set, feeds optional stdin, drains stdout/stderr
//! while waiting, and kills the child once the timeout expires. The timeout
//! covers both the wait and the drain.

use std::process::Stdio;
use std::time::{Duration, Instant};

use serde::Serialize;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::process::Command;

use crate::error::ProcessError;

/// Maximum stdout or stderr size captured per stream (10 MiB).
const MAX_OUTPUT_BYTES: u64 = 10 * 1024 * 1024;

#[derive(Debug, Clone)]
pub struct ProcessInput {
    /// Text written to the child's stdin; stdin is null when `None`.
    pub stdin: Option<String>,
    pub timeout: Duration,
}

/// Captured result of a finished child process.
#[derive(Debug, Clone, Serialize)]
pub struct ProcessOutput {
    pub stdout: String,
    pub stderr: String,
    /// Process exit code (`-1` if killed by signal).
    pub exit_code: i32,
    pub duration_ms: u64,
}

impl ProcessOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

pub async fn run_command(
    cmd: &mut Command,
    input: ProcessInput,
) -> Result<ProcessOutput, ProcessError> {
    // `kill_on_drop(true)` kills the child when it is dropped on timeout.
    cmd.stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    if input.stdin.is_some() {
        cmd.stdin(Stdio::piped());
    } else {
        cmd.stdin(Stdio::null());
    }

    let start = Instant::now();
    let mut child = cmd.spawn()?;

    if let (Some(mut stdin), Some(text)) = (child.stdin.take(), input.stdin.as_deref()) {
        // The tool may exit without reading stdin; a broken pipe is not a failure.
        let _ = stdin.write_all(text.as_bytes()).await;
        drop(stdin);
    }

    let stdout_task = tokio::spawn(read_stream(child.stdout.take()));
    let stderr_task = tokio::spawn(read_stream(child.stderr.take()));
    let stdout_abort = stdout_task.abort_handle();
    let stderr_abort = stderr_task.abort_handle();

    // A grandchild can keep the pipes open after the child exits, so the
    // drain shares the deadline with the wait.
    let finished = tokio::time::timeout(input.timeout, async {
        let status = child.wait().await?;
        let stdout = stdout_task.await.unwrap_or_default();
        let stderr = stderr_task.await.unwrap_or_default();
        Ok::<_, std::io::Error>((status, stdout, stderr))
    })
    .await;

    match finished {
        Ok(Ok((status, stdout_bytes, stderr_bytes))) => Ok(ProcessOutput {
            stdout: String::from_utf8_lossy(&stdout_bytes).into_owned(),
            stderr: String::from_utf8_lossy(&stderr_bytes).into_owned(),
            exit_code: status.code().unwrap_or(-1),
            duration_ms: start.elapsed().as_millis() as u64,
        }),
        Ok(Err(e)) => {
            stdout_abort.abort();
            stderr_abort.abort();
            Err(ProcessError::Io(e))
        }
        Err(_elapsed) => {
            drop(child);
            stdout_abort.abort();
            stderr_abort.abort();
            Err(ProcessError::Timeout {
                elapsed_ms: start.elapsed().as_millis() as u64,
            })
        }
    }
}

async fn read_stream<R: AsyncRead + Unpin>(handle: Option<R>) -> Vec<u8> {
    let mut buf = Vec::new();
    if let Some(h) = handle {
        let _ = h.take(MAX_OUTPUT_BYTES).read_to_end(&mut buf).await;
    }
    buf
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn input(stdin: Option<&str>, timeout: Duration) -> ProcessInput {
        ProcessInput {
            stdin: stdin.map(str::to_string),
            timeout,
        }
    }

    fn sh(script: &str) -> Command {
        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg(script);
        cmd
    }

    #[tokio::test]
    async fn captures_stdout_and_stderr() {
        let out = run_command(
            &mut sh("echo out; echo err >&2"),
            input(None, Duration::from_secs(5)),
        )
        .await
        .expect("run");
        assert!(out.success());
        assert_eq!(out.stdout, "out\n");
        assert_eq!(out.stderr, "err\n");
    }

    #[tokio::test]
    async fn surfaces_nonzero_exit_code() {
        let out = run_command(&mut sh("exit 42"), input(None, Duration::from_secs(5)))
            .await
            .expect("run");
        assert_eq!(out.exit_code, 42);
        assert!(!out.success());
    }

    #[tokio::test]
    async fn writes_stdin() {
        let out = run_command(
            &mut sh("read line; echo \"got:$line\""),
            input(Some("/tmp/sample.exe\n"), Duration::from_secs(5)),
        )
        .await
        .expect("run");
        assert_eq!(out.stdout.trim(), "got:/tmp/sample.exe");
    }

    #[tokio::test]
    async fn null_stdin_reads_eof() {
        let out = run_command(&mut sh("cat; echo done"), input(None, Duration::from_secs(5)))
            .await
            .expect("run");
        assert_eq!(out.stdout, "done\n");
    }

    #[tokio::test]
    async fn kills_on_timeout() {
        let result = run_command(&mut sh("sleep 30"), input(None, Duration::from_millis(200))).await;
        assert!(matches!(result, Err(ProcessError::Timeout { .. })));
    }

    #[tokio::test]
    async fn background_child_holding_pipes_times_out() {
        let start = Instant::now();
        let result = run_command(
            &mut sh("sleep 5 & echo started"),
            input(None, Duration::from_millis(300)),
        )
        .await;
        assert!(matches!(result, Err(ProcessError::Timeout { .. })));
        assert!(start.elapsed() < Duration::from_secs(4));
    }

    #[tokio::test]
    async fn missing_program_is_io_error() {
        let mut cmd = Command::new("/nonexistent/definitely-not-here");
        let result = run_command(&mut cmd, input(None, Duration::from_secs(1))).await;
        assert!(matches!(result, Err(ProcessError::Io(_))));
    }
}
