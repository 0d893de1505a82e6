use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "dotnet-deob")]
#[command(about = "Runs bundled .NET deobfuscators over a binary, chaining their output")]
#[command(version)]
pub struct Cli {
    /// Path to a TOML configuration file
    #[arg(short, long, global = true, env = "DOTNET_DEOB_CONFIG")]
    pub config: Option<PathBuf>,

    /// Directory holding the bundled tool executables
    #[arg(long, global = true, env = "DOTNET_DEOB_TOOLS_DIR")]
    pub tools_dir: Option<PathBuf>,

    /// Enable debug logging (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Deobfuscate a file with the selected tools
    Run(RunArgs),

    /// List known deobfuscators and whether they can run on this host
    List {
        /// Print the listing as JSON
        #[arg(long)]
        json: bool,
    },

    /// Verify runtimes and executables for the selected deobfuscators
    Check(SelectArgs),
}

#[derive(Args, Default)]
pub struct SelectArgs {
    /// Deobfuscator key to run, in order (repeatable; defaults to the config)
    #[arg(short = 't', long = "tool", value_name = "KEY")]
    pub tools: Vec<String>,
}

#[derive(Args)]
pub struct RunArgs {
    /// Path to the .NET binary to deobfuscate
    #[arg(help = "Path to the .NET binary to deobfuscate")]
    pub file: PathBuf,

    /// Where to write the deobfuscated file (default: <stem>_deobfuscated.<ext>)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    #[command(flatten)]
    pub select: SelectArgs,

    /// Per-tool timeout in seconds
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Skip files larger than this many bytes
    #[arg(long, value_name = "BYTES")]
    pub max_size: Option<u64>,

    /// Run the tools even if the file has no CLR runtime header
    #[arg(long)]
    pub no_dotnet_check: bool,

    /// Print the report as JSON
    #[arg(long)]
    pub json: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_definition_is_valid() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_run_with_repeated_tools() {
        let cli = Cli::try_parse_from([
            "dotnet-deob",
            "run",
            "sample.exe",
            "-t",
            "de4dotcex",
            "--tool",
            "unscrambler",
            "--timeout",
            "10",
            "--json",
        ])
        .expect("parse");
        let Command::Run(args) = cli.command else {
            panic!("expected run");
        };
        assert_eq!(args.file, PathBuf::from("sample.exe"));
        assert_eq!(args.select.tools, vec!["de4dotcex", "unscrambler"]);
        assert_eq!(args.timeout, Some(10));
        assert!(args.json);
        assert!(!args.no_dotnet_check);
    }

    #[test]
    fn global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["dotnet-deob", "list", "--tools-dir", "/opt/bin", "-v"])
            .expect("parse");
        assert_eq!(cli.tools_dir, Some(PathBuf::from("/opt/bin")));
        assert!(cli.verbose);
        assert!(matches!(cli.command, Command::List { json: false }));
    }
}
