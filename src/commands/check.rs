use crate::cli::SelectArgs;
use crate::commands::Context;
use crate::{AppError, AppResult};

/// Verifies that every selected tool has its runtime and executable.
pub fn run_check(ctx: &Context, args: &SelectArgs) -> AppResult<u8> {
    let keys = ctx.selection(&args.tools)?;
    // Fails on unknown keys before anything is inspected.
    ctx.registry.select(&keys)?;

    let problems: Vec<String> = ctx
        .registry
        .list_tools(&keys)
        .into_iter()
        .filter(|info| info.selected)
        .flat_map(|info| info.problems())
        .collect();

    if !problems.is_empty() {
        return Err(AppError::MissingDependencies(
            problems
                .iter()
                .map(|p| format!("  - {p}"))
                .collect::<Vec<_>>()
                .join("\n"),
        ));
    }

    println!("All {} selected deobfuscators are ready: {}", keys.len(), keys.join(", "));
    Ok(0)
}
