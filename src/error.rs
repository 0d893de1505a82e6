use std::path::PathBuf;

use thiserror::Error;

/// Define a convenient Result type
pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("I/O Error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to read config {path}: {source}")]
    ConfigRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Unknown deobfuscator '{0}'. Run `dotnet-deob list` to see the available keys.")]
    UnknownTool(String),

    #[error("Error while parsing PE: {0}")]
    InvalidPe(#[from] goblin::error::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Missing dependencies:\n{0}")]
    MissingDependencies(String),

    #[error("Analysis error: {0}")]
    Analysis(String),
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Analysis(err.to_string())
    }
}

/// Errors raised while spawning or waiting on a wrapped tool.
#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("Executable not found: {0}")]
    NotFound(PathBuf),

    #[error("Permission denied: {0} is not executable")]
    PermissionDenied(PathBuf),

    #[error("Runtime '{runtime}' is not installed or not on PATH")]
    RuntimeMissing { runtime: &'static str },

    #[error("Timed out after {elapsed_ms}ms")]
    Timeout { elapsed_ms: u64 },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
