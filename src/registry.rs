//! Tool registry: built-in tools plus configured ones, and selection.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::config::Config;
use crate::tools::{self, Runtime, ToolSpec};
use crate::{AppError, AppResult};

/// Registry of known tools, keyed by tool key.
#[derive(Debug)]
pub struct ToolRegistry {
    tools: BTreeMap<String, ToolSpec>,
    /// Registration order, used for listing
    order: Vec<String>,
    tools_dir: PathBuf,
}

impl ToolRegistry {
    /// Creates a registry with the built-ins followed by the configured tools.
    pub fn new(config: &Config, tools_dir: PathBuf) -> Self {
        let mut registry = Self {
            tools: BTreeMap::new(),
            order: Vec::new(),
            tools_dir,
        };

        for tool in tools::builtin_tools() {
            registry.register(tool);
        }
        for tool in &config.tools {
            registry.register(tool.clone());
        }

        registry
    }

    /// Registers a tool, replacing any tool with the same key.
    pub fn register(&mut self, tool: ToolSpec) {
        if self.tools.insert(tool.key.clone(), tool.clone()).is_some() {
            tracing::debug!(key = %tool.key, "tool definition replaced by config");
        } else {
            self.order.push(tool.key);
        }
    }

    pub fn tools_dir(&self) -> &Path {
        &self.tools_dir
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&ToolSpec> {
        self.tools.get(key)
    }

    /// Returns the tools for `keys`, in the order given.
    pub fn select(&self, keys: &[String]) -> AppResult<Vec<ToolSpec>> {
        keys.iter()
            .map(|key| {
                self.get(key)
                    .cloned()
                    .ok_or_else(|| AppError::UnknownTool(key.clone()))
            })
            .collect()
    }

    /// Lists all known tools with their availability on this host.
    #[must_use]
    pub fn list_tools(&self, selected: &[String]) -> Vec<ToolInfo> {
        self.order
            .iter()
            .filter_map(|key| self.tools.get(key))
            .map(|tool| ToolInfo::inspect(tool, &self.tools_dir, selected))
            .collect()
    }
}

/// Whether `runtime`'s launcher can be found on PATH. Native tools need none.
pub fn runtime_available(runtime: Runtime) -> bool {
    match runtime.launcher() {
        Some(launcher) => which::which(launcher).is_ok(),
        None => true,
    }
}

/// Information about a tool for display purposes
#[derive(Debug, Clone, Serialize)]
pub struct ToolInfo {
    pub key: String,
    pub display_name: String,
    pub runtime: Runtime,
    pub executable: PathBuf,
    pub executable_exists: bool,
    pub runtime_available: bool,
    pub selected: bool,
}

impl ToolInfo {
    fn inspect(tool: &ToolSpec, tools_dir: &Path, selected: &[String]) -> Self {
        let executable = tool.executable_path(tools_dir);
        Self {
            key: tool.key.clone(),
            display_name: tool.display_name.clone(),
            runtime: tool.runtime,
            executable_exists: executable.is_file(),
            executable,
            runtime_available: runtime_available(tool.runtime),
            selected: selected.contains(&tool.key),
        }
    }

    /// Problems preventing this tool from running, empty when it is ready.
    pub fn problems(&self) -> Vec<String> {
        let mut problems = Vec::new();
        if !self.runtime_available {
            problems.push(format!(
                "{}: runtime '{}' is not installed or not on PATH",
                self.key,
                self.runtime.as_str()
            ));
        }
        if !self.executable_exists {
            problems.push(format!(
                "{}: executable not found at {}",
                self.key,
                self.executable.display()
            ));
        }
        problems
    }
}
