pub mod check;
pub mod list;
pub mod run;

use std::collections::HashSet;

use crate::cli::Cli;
use crate::config::Config;
use crate::registry::ToolRegistry;
use crate::{AppError, AppResult};

/// Configuration and tool registry shared by every subcommand.
pub struct Context {
    pub config: Config,
    pub registry: ToolRegistry,
}

impl Context {
    /// Loads the config file and applies the global command-line overrides.
    pub fn from_cli(cli: &Cli) -> AppResult<Self> {
        let mut config = Config::load_or_default(cli.config.as_deref())?;
        if let Some(dir) = &cli.tools_dir {
            config.tools_dir = Some(dir.clone());
        }
        let tools_dir = config.resolved_tools_dir()?;
        tracing::debug!(tools_dir = %tools_dir.display(), "resolved tools directory");
        let registry = ToolRegistry::new(&config, tools_dir);
        Ok(Self { config, registry })
    }

    /// Tool keys from the command line, falling back to the configured selection.
    ///
    /// Each key may appear once; the run chain never repeats a tool.
    pub fn selection(&self, requested: &[String]) -> AppResult<Vec<String>> {
        if requested.is_empty() {
            return Ok(self.config.deobfuscators.clone());
        }
        let mut seen = HashSet::new();
        for key in requested {
            if !seen.insert(key.as_str()) {
                return Err(AppError::InvalidConfig(format!(
                    "deobfuscator '{key}' is listed more than once"
                )));
            }
        }
        Ok(requested.to_vec())
    }
}
