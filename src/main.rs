//! dupescan - duplicate file detection engine
//!
//! Entry point for the dupescan CLI.

use std::time::Duration;

use anyhow::Context;
use bytesize::ByteSize;
use clap::Parser;

use dupescan::cli::{Cli, OutputFormat};
use dupescan::duplicates::ScanResult;
use dupescan::engine;
use dupescan::error::ExitCode;
use dupescan::logging;
use dupescan::progress::ConsoleProgress;
use dupescan::signal;

fn main() {
    let cli = Cli::parse();

    match run(cli) {
        Ok(code) => std::process::exit(code.as_i32()),
        Err(err) => {
            eprintln!(
                "[{}] Error: {:#}",
                ExitCode::GeneralError.code_prefix(),
                err
            );
            std::process::exit(ExitCode::GeneralError.as_i32());
        }
    }
}

fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    logging::init_logging(cli.verbose, cli.quiet);

    let handler = signal::install_handler().context("failed to install signal handler")?;

    let handle = engine::start_scan(&cli.path, cli.filter_config(), cli.engine_config());

    let console = (!cli.quiet && cli.output == OutputFormat::Text).then(ConsoleProgress::new);

    loop {
        if handler.is_shutdown_requested() {
            handle.cancel();
        }
        let snapshot = handle.poll_progress();
        if let Some(console) = &console {
            console.update(&snapshot);
        }
        if handle.is_finished() {
            break;
        }
        std::thread::sleep(Duration::from_millis(100));
    }

    if let Some(console) = &console {
        console.finish();
    }

    let result = handle
        .await_result()
        .context("scan failed")?;

    match cli.output {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        OutputFormat::Text => print_report(&result),
    }

    let code = if result.stats.interrupted {
        ExitCode::Interrupted
    } else if !result.errors.is_empty() {
        ExitCode::PartialSuccess
    } else if result.groups.is_empty() {
        ExitCode::NoDuplicates
    } else {
        ExitCode::Success
    };
    Ok(code)
}

fn print_report(result: &ScanResult) {
    for (i, group) in result.groups.iter().enumerate() {
        println!(
            "Group {} — {} files × {} ({} reclaimable)",
            i + 1,
            group.len(),
            ByteSize::b(group.size),
            ByteSize::b(group.wasted_bytes())
        );
        for file in &group.files {
            println!("  {}", file.path.display());
        }
    }

    if !result.errors.is_empty() {
        println!();
        println!("{} file(s) skipped due to errors:", result.errors.len());
        for error in &result.errors {
            println!("  {}", error.message);
        }
    }

    println!();
    println!(
        "{} files examined ({}), {} duplicate groups, {} redundant files, {} reclaimable in {:.1?}{}",
        result.files_examined,
        ByteSize::b(result.stats.total_bytes_seen),
        result.groups.len(),
        result.duplicate_file_count(),
        ByteSize::b(result.total_wasted_bytes),
        result.scan_duration,
        if result.stats.interrupted {
            " (cancelled early)"
        } else {
            ""
        }
    );
}
