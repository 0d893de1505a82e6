use crate::commands::Context;
use crate::AppResult;

pub fn run_list(ctx: &Context, json: bool) -> AppResult<u8> {
    let infos = ctx.registry.list_tools(&ctx.config.deobfuscators);

    if json {
        println!("{}", serde_json::to_string_pretty(&infos)?);
        return Ok(0);
    }

    println!("Tools directory: {}", ctx.registry.tools_dir().display());
    println!(
        "\n{:<16} {:<36} {:<8} {:<9} {:<8}",
        "KEY", "NAME", "RUNTIME", "SELECTED", "READY"
    );
    for info in &infos {
        let ready = if info.problems().is_empty() { "yes" } else { "no" };
        let selected = if info.selected { "yes" } else { "no" };
        println!(
            "{:<16} {:<36} {:<8} {:<9} {:<8}",
            info.key,
            info.display_name,
            info.runtime.as_str(),
            selected,
            ready
        );
    }
    Ok(0)
}
