//! Runs a single wrapped tool against a file and locates its result.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Serialize;
use tokio::process::Command;

use crate::error::ProcessError;
use crate::process::{self, ProcessInput, ProcessOutput};
use crate::tools::{FailureKind, ToolSpec};

/// A tool that ran (or tried to) without producing a result.
#[derive(Debug, Clone, Serialize)]
pub struct ToolFailure {
    pub key: String,
    pub display_name: String,
    pub message: String,
    /// Failure kind from the tool's own patterns, if any matched
    pub kind: Option<FailureKind>,
}

/// A tool that produced its expected output file.
#[derive(Debug, Clone)]
pub struct ToolSuccess {
    pub output_path: PathBuf,
    pub process: ProcessOutput,
}

/// Invokes tools from one tools directory with a shared timeout.
#[derive(Debug, Clone)]
pub struct Deobfuscator {
    tools_dir: PathBuf,
    timeout: Duration,
}

impl Deobfuscator {
    /// A relative `tools_dir` is resolved against the current directory now,
    /// since tools are started from their input's directory.
    pub fn new(tools_dir: PathBuf, timeout: Duration) -> Self {
        let tools_dir = std::path::absolute(&tools_dir).unwrap_or(tools_dir);
        Self { tools_dir, timeout }
    }

    /// Runs `tool` on `input`, returning the path of the file it wrote.
    pub async fn deobfuscate(&self, tool: &ToolSpec, input: &Path) -> Result<ToolSuccess, ToolFailure> {
        let fail = |message: String| ToolFailure {
            key: tool.key.clone(),
            display_name: tool.display_name.clone(),
            kind: tool.classify(&message),
            message,
        };

        let mut cmd = self.build_command(tool, input).map_err(|e| fail(e.to_string()))?;
        let expected = tool.expected_output(input);
        let stdin = tool.render_stdin(input, &expected, &self.tools_dir);

        tracing::debug!(tool = %tool.key, command = ?cmd.as_std(), "invoking deobfuscator");

        let output = process::run_command(
            &mut cmd,
            ProcessInput {
                stdin,
                timeout: self.timeout,
            },
        )
        .await
        .map_err(|e| match e {
            ProcessError::Timeout { elapsed_ms } => {
                tracing::debug!(tool = %tool.key, elapsed_ms, "deobfuscator timed out");
                fail("Timed out while deobfuscating.".to_string())
            }
            other => fail(format!("I/O error occurred while deobfuscating: {other}")),
        })?;

        if !output.success() {
            return Err(fail(format!(
                "An unexpected error occurred when deobfuscating. stderr {} stdout: {}.",
                output.stderr, output.stdout
            )));
        }

        if expected.exists() {
            return Ok(ToolSuccess {
                output_path: expected,
                process: output,
            });
        }

        Err(fail(format!(
            "Failed to produce the expected output file {}. Contents of the output directory are [{}].",
            expected.display(),
            list_dir(expected.parent().unwrap_or(Path::new("."))).join(", ")
        )))
    }

    /// Builds the command line for `tool`, checking the runtime and executable first.
    pub fn build_command(&self, tool: &ToolSpec, input: &Path) -> Result<Command, ProcessError> {
        let executable = tool.executable_path(&self.tools_dir);
        check_executable(&executable, tool.runtime.launcher().is_some())?;

        let mut cmd = match tool.runtime.launcher() {
            Some(launcher) => {
                let program = which::which(launcher)
                    .map_err(|_| ProcessError::RuntimeMissing { runtime: launcher })?;
                let mut cmd = Command::new(program);
                cmd.arg(&executable);
                cmd
            }
            None => Command::new(&executable),
        };

        let expected = tool.expected_output(input);
        cmd.args(tool.render_args(input, &expected, &self.tools_dir));
        if let Some(dir) = input.parent() {
            cmd.current_dir(dir);
        }
        Ok(cmd)
    }
}

/// Managed tools only need to exist; native ones must also be executable.
fn check_executable(path: &Path, has_launcher: bool) -> Result<(), ProcessError> {
    let metadata = fs::metadata(path).map_err(|_| ProcessError::NotFound(path.to_path_buf()))?;
    if !metadata.is_file() {
        return Err(ProcessError::NotFound(path.to_path_buf()));
    }

    #[cfg(unix)]
    if !has_launcher {
        use std::os::unix::fs::PermissionsExt;
        if metadata.permissions().mode() & 0o111 == 0 {
            return Err(ProcessError::PermissionDenied(path.to_path_buf()));
        }
    }
    #[cfg(not(unix))]
    let _ = has_launcher;

    Ok(())
}

fn list_dir(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = fs::read_dir(dir)
        .map(|entries| {
            entries
                .filter_map(Result::ok)
                .map(|e| e.file_name().to_string_lossy().into_owned())
                .collect()
        })
        .unwrap_or_default();
    names.sort();
    names
}
