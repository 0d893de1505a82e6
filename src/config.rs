//! TOML configuration: where the tools live, which ones run, and limits.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use serde::Deserialize;

use crate::tools::{self, ToolSpec};
use crate::{AppError, AppResult};

pub const DEFAULT_TIMEOUT_SECS: u64 = 60;
pub const DEFAULT_MAX_FILE_SIZE: u64 = 10 * 1024 * 1024;

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Root directory of the bundled tools
    pub tools_dir: Option<PathBuf>,
    pub timeout_secs: u64,
    /// Inputs larger than this many bytes are skipped
    pub max_file_size: u64,
    /// Check the input for a CLR runtime header before running anything
    pub require_dotnet: bool,
    /// Tool keys, in run order
    pub deobfuscators: Vec<String>,
    /// Extra tools; a key matching a built-in replaces it
    pub tools: Vec<ToolSpec>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            tools_dir: None,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            max_file_size: DEFAULT_MAX_FILE_SIZE,
            require_dotnet: true,
            deobfuscators: tools::default_selection(),
            tools: Vec::new(),
        }
    }
}

impl Config {
    /// Loads and validates a config file.
    pub fn load(path: &Path) -> AppResult<Self> {
        let raw = fs::read_to_string(path).map_err(|source| AppError::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_toml(&raw)?;
        tracing::debug!(path = %path.display(), "loaded config");
        Ok(config)
    }

    pub fn from_toml(raw: &str) -> AppResult<Self> {
        let config: Config = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Loads `path` if given, otherwise the defaults.
    pub fn load_or_default(path: Option<&Path>) -> AppResult<Self> {
        match path {
            Some(p) => Self::load(p),
            None => Ok(Self::default()),
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Tools directory: the configured one, else `bin/` beside the running binary.
    ///
    /// Always absolute, since tools run from their input's directory.
    pub fn resolved_tools_dir(&self) -> AppResult<PathBuf> {
        if let Some(dir) = &self.tools_dir {
            return Ok(std::path::absolute(dir)?);
        }
        let exe = std::env::current_exe().context("cannot locate the running executable")?;
        let base = exe.parent().map(Path::to_path_buf).unwrap_or_default();
        Ok(base.join("bin"))
    }

    pub fn validate(&self) -> AppResult<()> {
        if self.timeout_secs == 0 {
            return Err(AppError::InvalidConfig(
                "timeout_secs must be greater than zero".to_string(),
            ));
        }

        let mut seen = HashSet::new();
        for key in &self.deobfuscators {
            if key.trim().is_empty() {
                return Err(AppError::InvalidConfig(
                    "deobfuscators contains an empty key".to_string(),
                ));
            }
            if !seen.insert(key.as_str()) {
                return Err(AppError::InvalidConfig(format!(
                    "deobfuscator '{key}' is listed more than once"
                )));
            }
        }

        let mut tool_keys = HashSet::new();
        for tool in &self.tools {
            if tool.key.trim().is_empty() {
                return Err(AppError::InvalidConfig("tool with an empty key".to_string()));
            }
            if !tool_keys.insert(tool.key.as_str()) {
                return Err(AppError::InvalidConfig(format!(
                    "tool '{}' is defined more than once",
                    tool.key
                )));
            }
            for pattern in &tool.failure_patterns {
                pattern.compile().map_err(|e| {
                    AppError::InvalidConfig(format!(
                        "tool '{}' has an invalid failure pattern: {e}",
                        tool.key
                    ))
                })?;
            }
        }

        Ok(())
    }
}
