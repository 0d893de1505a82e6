pub mod cli;
pub mod commands;
pub mod config;
pub mod deobfuscator;
pub mod error;
pub mod pe;
pub mod pipeline;
pub mod process;
pub mod registry;
pub mod tools;

#[cfg(test)]
mod testing;

pub use error::{AppError, AppResult};
pub use cli::Cli;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::cli::Command;
use crate::commands::Context;

/// Main library entry point, returning the process exit code.
pub async fn run() -> AppResult<u8> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let ctx = Context::from_cli(&cli)?;
    match &cli.command {
        Command::Run(args) => commands::run::run_deobfuscate(&ctx, args).await,
        Command::List { json } => commands::list::run_list(&ctx, *json),
        Command::Check(args) => commands::check::run_check(&ctx, args),
    }
}

/// Logs to stderr so stdout carries only the report. `RUST_LOG` wins over `verbose`.
pub fn init_tracing(verbose: bool) {
    let default = if verbose { "dotnet_deob=debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
