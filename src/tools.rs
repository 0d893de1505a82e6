//! Definitions of the wrapped deobfuscation tools.
//!
//! A [`ToolSpec`] describes how to launch one precompiled tool: which runtime
//! hosts it, where its executable lives under the tools directory, how the
//! command line and stdin are built, and which file it writes on success.

use std::path::{Path, PathBuf};

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Host runtime required by a wrapped tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Runtime {
    /// Modern .NET runtime (`dotnet <dll>`)
    Dotnet,
    /// Mono runtime (`mono <exe>`)
    Mono,
    /// Executed directly, no launcher
    Native,
}

impl Runtime {
    /// Launcher program placed in front of the tool executable, if any.
    pub fn launcher(&self) -> Option<&'static str> {
        match self {
            Runtime::Dotnet => Some("dotnet"),
            Runtime::Mono => Some("mono"),
            Runtime::Native => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Runtime::Dotnet => "dotnet",
            Runtime::Mono => "mono",
            Runtime::Native => "native",
        }
    }
}

/// Rule for the path a tool writes its result to, derived from its input path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum OutputNaming {
    /// `<input><suffix>`
    Append { suffix: String },
    /// `<stem><suffix>.<ext>`
    StemSuffix { suffix: String },
}

impl OutputNaming {
    pub fn output_for(&self, input: &Path) -> PathBuf {
        match self {
            OutputNaming::Append { suffix } => {
                let mut raw = input.as_os_str().to_os_string();
                raw.push(suffix);
                PathBuf::from(raw)
            }
            OutputNaming::StemSuffix { suffix } => {
                let stem = input
                    .file_stem()
                    .map(|s| s.to_string_lossy().into_owned())
                    .unwrap_or_default();
                let name = match input.extension() {
                    Some(ext) => format!("{stem}{suffix}.{}", ext.to_string_lossy()),
                    None => format!("{stem}{suffix}"),
                };
                input.with_file_name(name)
            }
        }
    }
}

/// Coarse reason a tool rejected its input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    NotValidDotnet,
    ContentLengthMismatch,
}

/// Regex over a tool's failure message mapped to a [`FailureKind`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailurePattern {
    pub pattern: String,
    pub kind: FailureKind,
}

impl FailurePattern {
    pub fn new(pattern: &str, kind: FailureKind) -> Self {
        Self {
            pattern: pattern.to_string(),
            kind,
        }
    }

    pub fn compile(&self) -> Result<Regex, regex::Error> {
        Regex::new(&self.pattern)
    }
}

/// How to invoke a single wrapped tool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolSpec {
    /// Identifier used in configuration and on the command line
    pub key: String,
    /// Name shown in reports
    pub display_name: String,
    pub runtime: Runtime,
    /// Executable path, relative to the tools directory unless absolute
    pub executable: PathBuf,
    /// Argument template; supports `{input}`, `{output}` and `{tools_dir}`
    #[serde(default)]
    pub args: Vec<String>,
    /// Text written to the tool's stdin, same placeholders as `args`
    #[serde(default)]
    pub stdin: Option<String>,
    pub output: OutputNaming,
    #[serde(default)]
    pub failure_patterns: Vec<FailurePattern>,
}

pub const UNSCRAMBLER: &str = "unscrambler";
pub const CONFUSEREX_SSD: &str = "ConfuserExSSD";
pub const DE4DOT_CEX: &str = "de4dotcex";

const INVALID_FORMAT: &str =
    r"Format of the executable \(\.exe\) or library \(\.dll\) is invalid\.";

/// The bundled tools, in their default run order.
pub fn builtin_tools() -> Vec<ToolSpec> {
    vec![
        // Unscrambler nearly always leaves the file unchanged.
        ToolSpec {
            key: UNSCRAMBLER.to_string(),
            display_name: "unscrambler".to_string(),
            runtime: Runtime::Dotnet,
            executable: PathBuf::from("dotnet/Unscrambler/Unscrambler.dll"),
            args: vec!["{input}".to_string()],
            stdin: Some("\n".to_string()),
            output: OutputNaming::StemSuffix {
                suffix: "_unscrambled".to_string(),
            },
            failure_patterns: vec![
                FailurePattern::new(
                    r"PE image does not contain a \.NET metadata directory",
                    FailureKind::NotValidDotnet,
                ),
                FailurePattern::new(
                    r"Specified argument was out of the range of valid values\. \(Parameter 'fileOffset'\)",
                    FailureKind::ContentLengthMismatch,
                ),
            ],
        },
        ToolSpec {
            key: CONFUSEREX_SSD.to_string(),
            display_name: "ConfuserEx-Static-String-Decryptor".to_string(),
            runtime: Runtime::Mono,
            executable: PathBuf::from(
                "mono/ConfuserEx_Static_String_decryptor/ConfuserEx String Decryptor.exe",
            ),
            args: vec![],
            stdin: Some("{input}".to_string()),
            output: OutputNaming::Append {
                suffix: "Cleaned.exe".to_string(),
            },
            failure_patterns: vec![
                FailurePattern::new(INVALID_FORMAT, FailureKind::NotValidDotnet),
                FailurePattern::new(
                    r"There's not enough bytes left to read",
                    FailureKind::ContentLengthMismatch,
                ),
            ],
        },
        ToolSpec {
            key: DE4DOT_CEX.to_string(),
            display_name: "de4dot-cex".to_string(),
            runtime: Runtime::Mono,
            executable: PathBuf::from("mono/de4dot-cex/de4dot-x64.exe"),
            args: vec![
                "-f".to_string(),
                "{input}".to_string(),
                "-o".to_string(),
                "{output}".to_string(),
            ],
            stdin: None,
            output: OutputNaming::Append {
                suffix: "deob-cex".to_string(),
            },
            failure_patterns: vec![FailurePattern::new(
                INVALID_FORMAT,
                FailureKind::NotValidDotnet,
            )],
        },
    ]
}

/// Keys of the tools run when nothing else is configured.
pub fn default_selection() -> Vec<String> {
    vec![
        UNSCRAMBLER.to_string(),
        CONFUSEREX_SSD.to_string(),
        DE4DOT_CEX.to_string(),
    ]
}

/// Substitutes `{input}`, `{output}` and `{tools_dir}` in a template string.
pub fn render_template(template: &str, input: &Path, output: &Path, tools_dir: &Path) -> String {
    template
        .replace("{input}", &input.to_string_lossy())
        .replace("{output}", &output.to_string_lossy())
        .replace("{tools_dir}", &tools_dir.to_string_lossy())
}

impl ToolSpec {
    /// Absolute path of the tool executable.
    pub fn executable_path(&self, tools_dir: &Path) -> PathBuf {
        if self.executable.is_absolute() {
            self.executable.clone()
        } else {
            tools_dir.join(&self.executable)
        }
    }

    pub fn expected_output(&self, input: &Path) -> PathBuf {
        self.output.output_for(input)
    }

    pub fn render_args(&self, input: &Path, output: &Path, tools_dir: &Path) -> Vec<String> {
        self.args
            .iter()
            .map(|a| render_template(a, input, output, tools_dir))
            .collect()
    }

    pub fn render_stdin(&self, input: &Path, output: &Path, tools_dir: &Path) -> Option<String> {
        self.stdin
            .as_deref()
            .map(|s| render_template(s, input, output, tools_dir))
    }

    /// First failure kind whose pattern matches `message`.
    pub fn classify(&self, message: &str) -> Option<FailureKind> {
        self.failure_patterns.iter().find_map(|p| match p.compile() {
            Ok(re) if re.is_match(message) => Some(p.kind),
            _ => None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn builtin(key: &str) -> ToolSpec {
        builtin_tools()
            .into_iter()
            .find(|t| t.key == key)
            .expect("builtin tool")
    }

    #[test]
    fn builtin_order_matches_default_selection() {
        let keys: Vec<String> = builtin_tools().into_iter().map(|t| t.key).collect();
        assert_eq!(keys, default_selection());
    }

    #[test]
    fn append_naming() {
        let naming = OutputNaming::Append {
            suffix: "deob-cex".to_string(),
        };
        assert_eq!(
            naming.output_for(Path::new("/tmp/work/sample.exe")),
            PathBuf::from("/tmp/work/sample.exedeob-cex")
        );
    }

    #[test]
    fn stem_suffix_naming_keeps_extension() {
        let naming = OutputNaming::StemSuffix {
            suffix: "_unscrambled".to_string(),
        };
        assert_eq!(
            naming.output_for(Path::new("/tmp/work/sample.dll")),
            PathBuf::from("/tmp/work/sample_unscrambled.dll")
        );
        assert_eq!(
            naming.output_for(Path::new("/tmp/work/sample")),
            PathBuf::from("/tmp/work/sample_unscrambled")
        );
    }

    #[test]
    fn de4dot_args_pass_input_through_unmodified() {
        let tool = builtin(DE4DOT_CEX);
        let input = Path::new("/tmp/dir with space/a b.exe");
        let output = tool.expected_output(input);
        let args = tool.render_args(input, &output, Path::new("/opt/bin"));
        assert_eq!(
            args,
            vec![
                "-f",
                "/tmp/dir with space/a b.exe",
                "-o",
                "/tmp/dir with space/a b.exedeob-cex"
            ]
        );
        assert_eq!(tool.render_stdin(input, &output, Path::new("/opt/bin")), None);
    }

    #[test]
    fn confuserex_reads_path_from_stdin() {
        let tool = builtin(CONFUSEREX_SSD);
        let input = Path::new("/tmp/a.exe");
        let output = tool.expected_output(input);
        assert!(tool.render_args(input, &output, Path::new("/opt")).is_empty());
        assert_eq!(
            tool.render_stdin(input, &output, Path::new("/opt")).as_deref(),
            Some("/tmp/a.exe")
        );
        assert_eq!(output, PathBuf::from("/tmp/a.exeCleaned.exe"));
    }

    #[test]
    fn executable_path_resolves_against_tools_dir() {
        let tool = builtin(UNSCRAMBLER);
        assert_eq!(
            tool.executable_path(Path::new("/opt/deob/bin")),
            PathBuf::from("/opt/deob/bin/dotnet/Unscrambler/Unscrambler.dll")
        );
    }

    #[test]
    fn builtin_patterns_compile() {
        for tool in builtin_tools() {
            for pattern in &tool.failure_patterns {
                assert!(pattern.compile().is_ok(), "{}", pattern.pattern);
            }
        }
    }

    #[test]
    fn classify_messages() {
        let unscrambler = builtin(UNSCRAMBLER);
        assert_eq!(
            unscrambler.classify(
                "stderr Unhandled exception. Specified argument was out of the range of valid values. (Parameter 'fileOffset')"
            ),
            Some(FailureKind::ContentLengthMismatch)
        );
        assert_eq!(
            unscrambler.classify("PE image does not contain a .NET metadata directory"),
            Some(FailureKind::NotValidDotnet)
        );

        let de4dot = builtin(DE4DOT_CEX);
        assert_eq!(
            de4dot.classify("Format of the executable (.exe) or library (.dll) is invalid."),
            Some(FailureKind::NotValidDotnet)
        );
        assert_eq!(de4dot.classify("There's not enough bytes left to read"), None);
    }

    #[test]
    fn runtime_launchers() {
        assert_eq!(Runtime::Dotnet.launcher(), Some("dotnet"));
        assert_eq!(Runtime::Mono.launcher(), Some("mono"));
        assert_eq!(Runtime::Native.launcher(), None);
    }
}
