use std::time::Duration;

use crate::cli::RunArgs;
use crate::commands::Context;
use crate::pipeline::{Outcome, Pipeline, PipelineSettings, Report};
use crate::{AppError, AppResult};

pub async fn run_deobfuscate(ctx: &Context, args: &RunArgs) -> AppResult<u8> {
    let keys = ctx.selection(&args.select.tools)?;
    let tools = ctx.registry.select(&keys)?;

    let timeout = args
        .timeout
        .map(Duration::from_secs)
        .unwrap_or_else(|| ctx.config.timeout());
    if timeout.is_zero() {
        return Err(AppError::InvalidConfig(
            "--timeout must be greater than zero".to_string(),
        ));
    }

    let pipeline = Pipeline::new(
        tools,
        PipelineSettings {
            tools_dir: ctx.registry.tools_dir().to_path_buf(),
            timeout,
            max_file_size: args.max_size.unwrap_or(ctx.config.max_file_size),
            require_dotnet: ctx.config.require_dotnet && !args.no_dotnet_check,
        },
    );

    let report = pipeline.run(&args.file, args.output.as_deref()).await?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }

    Ok(report.outcome.exit_code())
}

fn print_report(report: &Report) {
    println!("Input: {}", report.input.display());

    if !report.attempts.is_empty() {
        println!("\n--- Deobfuscators ---");
        for attempt in &report.attempts {
            if attempt.succeeded {
                let ms = attempt.duration_ms.unwrap_or_default();
                println!("  [ok]     {:<36} {ms}ms", attempt.display_name);
            } else {
                println!("  [failed] {}", attempt.display_name);
                if let Some(message) = &attempt.message {
                    for line in message.lines() {
                        println!("           {line}");
                    }
                }
            }
        }
    }

    println!();
    match &report.outcome {
        Outcome::Deobfuscated => {
            println!("Deobfuscated by: {}", report.deobfuscated_by.join(","));
            if let Some(output) = &report.output {
                println!("Output written to: {}", output.display());
            }
        }
        Outcome::OptedOut(message) => println!("Skipped: {message}"),
        Outcome::Malformed(message) => println!("Malformed: {message}"),
        Outcome::NoneSucceeded(message) => println!("No deobfuscation processed: {message}"),
    }
}
