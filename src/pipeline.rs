//! Chains the selected tools over one input file and decides the outcome.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Serialize;

use crate::deobfuscator::{Deobfuscator, ToolFailure};
use crate::pe::{self, DotnetCheck};
use crate::tools::{FailureKind, ToolSpec};
use crate::AppResult;

pub const NOT_VALID_DOTNET_MESSAGE: &str = "Deobfuscators detect file as not a valid dotnet file.";
pub const MALFORMED_MESSAGE: &str = "Dotnetfile is shorter than the header specifies.";
pub const NONE_SUCCEEDED_MESSAGE: &str = "Could not run any of the deobfuscators.";

/// Final state of a pipeline run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "message", rename_all = "snake_case")]
pub enum Outcome {
    /// At least one tool produced output
    Deobfuscated,
    /// The input is out of scope (too large, or not .NET)
    OptedOut(String),
    /// The input is a truncated .NET file
    Malformed(String),
    /// Every tool failed for an unrecognised reason
    NoneSucceeded(String),
}

impl Outcome {
    /// Process exit code for this outcome.
    pub fn exit_code(&self) -> u8 {
        match self {
            Outcome::Deobfuscated => 0,
            Outcome::NoneSucceeded(_) => 2,
            Outcome::OptedOut(_) => 3,
            Outcome::Malformed(_) => 4,
        }
    }
}

/// One tool invocation within a run.
#[derive(Debug, Clone, Serialize)]
pub struct Attempt {
    pub key: String,
    pub display_name: String,
    pub succeeded: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_kind: Option<FailureKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub input: PathBuf,
    #[serde(flatten)]
    pub outcome: Outcome,
    /// Display names of the tools that succeeded, in run order
    pub deobfuscated_by: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<PathBuf>,
    pub attempts: Vec<Attempt>,
}

impl Report {
    fn early(input: &Path, outcome: Outcome) -> Self {
        Self {
            input: input.to_path_buf(),
            outcome,
            deobfuscated_by: Vec::new(),
            output: None,
            attempts: Vec::new(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub tools_dir: PathBuf,
    pub timeout: Duration,
    pub max_file_size: u64,
    pub require_dotnet: bool,
}

/// Runs a fixed sequence of tools, each consuming the previous one's output.
#[derive(Debug)]
pub struct Pipeline {
    tools: Vec<ToolSpec>,
    deobfuscator: Deobfuscator,
    max_file_size: u64,
    require_dotnet: bool,
}

impl Pipeline {
    pub fn new(tools: Vec<ToolSpec>, settings: PipelineSettings) -> Self {
        Self {
            tools,
            deobfuscator: Deobfuscator::new(settings.tools_dir, settings.timeout),
            max_file_size: settings.max_file_size,
            require_dotnet: settings.require_dotnet,
        }
    }

    /// Runs the chain over `input`, writing the final file to `output`
    /// (or [`default_output_path`] when `None`).
    pub async fn run(&self, input: &Path, output: Option<&Path>) -> AppResult<Report> {
        let size = fs::metadata(input)?.len();
        if size > self.max_file_size {
            tracing::info!(size, max = self.max_file_size, "input too large, skipping");
            return Ok(Report::early(
                input,
                Outcome::OptedOut(format!(
                    "File exceeds maximum size of {} bytes.",
                    self.max_file_size
                )),
            ));
        }

        if self.require_dotnet {
            if let DotnetCheck::NotDotnet(reason) = pe::detect_dotnet(&fs::read(input)?)? {
                return Ok(Report::early(input, Outcome::OptedOut(reason.to_string())));
            }
        }

        // Tools write next to their input, so work on a private copy.
        let work_dir = tempfile::tempdir()?;
        let file_name = input
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "input".into());
        let mut newest = work_dir.path().join(file_name);
        fs::copy(input, &newest)?;

        let mut attempts = Vec::with_capacity(self.tools.len());
        let mut deobfuscated_by = Vec::new();
        let mut failures: Vec<ToolFailure> = Vec::new();

        for tool in &self.tools {
            match self.deobfuscator.deobfuscate(tool, &newest).await {
                Ok(success) => {
                    tracing::info!(
                        tool = %tool.display_name,
                        duration_ms = success.process.duration_ms,
                        "deobfuscator succeeded"
                    );
                    attempts.push(Attempt {
                        key: tool.key.clone(),
                        display_name: tool.display_name.clone(),
                        succeeded: true,
                        message: None,
                        failure_kind: None,
                        duration_ms: Some(success.process.duration_ms),
                    });
                    deobfuscated_by.push(tool.display_name.clone());
                    newest = success.output_path;
                }
                Err(failure) => {
                    tracing::warn!(
                        "Deobfuscator {} failed with error: {}",
                        failure.display_name,
                        failure.message
                    );
                    attempts.push(Attempt {
                        key: failure.key.clone(),
                        display_name: failure.display_name.clone(),
                        succeeded: false,
                        message: Some(failure.message.clone()),
                        failure_kind: failure.kind,
                        duration_ms: None,
                    });
                    failures.push(failure);
                }
            }
        }

        if deobfuscated_by.is_empty() {
            return Ok(Report {
                input: input.to_path_buf(),
                outcome: classify_failures(&failures),
                deobfuscated_by,
                output: None,
                attempts,
            });
        }

        let destination = output
            .map(Path::to_path_buf)
            .unwrap_or_else(|| default_output_path(input));
        fs::copy(&newest, &destination)?;

        Ok(Report {
            input: input.to_path_buf(),
            outcome: Outcome::Deobfuscated,
            deobfuscated_by,
            output: Some(destination),
            attempts,
        })
    }
}

/// Outcome when no tool succeeded; the last recognised failure decides it.
pub fn classify_failures(failures: &[ToolFailure]) -> Outcome {
    match failures.iter().rev().find_map(|f| f.kind) {
        Some(FailureKind::NotValidDotnet) => Outcome::OptedOut(NOT_VALID_DOTNET_MESSAGE.to_string()),
        Some(FailureKind::ContentLengthMismatch) => Outcome::Malformed(MALFORMED_MESSAGE.to_string()),
        None => Outcome::NoneSucceeded(NONE_SUCCEEDED_MESSAGE.to_string()),
    }
}

/// `<stem>_deobfuscated.<ext>` beside `input`.
pub fn default_output_path(input: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "output".to_string());
    let name = match input.extension() {
        Some(ext) => format!("{stem}_deobfuscated.{}", ext.to_string_lossy()),
        None => format!("{stem}_deobfuscated"),
    };
    input.with_file_name(name)
}
