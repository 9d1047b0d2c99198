mod allocations;
mod artifacts;
mod cli;
mod estimates;
mod logger;
mod registry;
mod report;
mod resolver;
mod tasks;

use std::{
    env,
    io::{self, Write as _},
    process,
};

use anyhow::bail;
use colored::Colorize as _;

use crate::{report::TaskReport, resolver::Resolver};

fn main() -> anyhow::Result<()> {
    configure_terminal_colorization();

    #[allow(clippy::redundant_closure)]
    cli::handle_arguments().map(|code| process::exit(code))
}

fn run_analysis(opts: &cli::Opts) -> anyhow::Result<i32> {
    // the one fatal precondition: without the build tree there is nothing
    // to analyze
    if !opts.build_dir.is_dir() {
        bail!(
            "build directory `{}` not found; build the firmware first",
            opts.build_dir.display()
        );
    }

    let mut registry = artifacts::load(&opts.build_dir);
    if registry.is_empty() {
        log::warn!("no stack-usage facts were ingested; the report will be empty");
    }

    let entries = tasks::filter(tasks::classify(&registry), &opts.tasks);
    if entries.is_empty() {
        log::warn!("no task entry points to analyze");
    }

    let reservations = allocations::load(&opts.allocations);

    let mut resolver = Resolver::new(&mut registry);
    let mut reports = Vec::with_capacity(entries.len());
    for entry in entries {
        log::info!("analyzing {}", entry.task_name);
        let result = resolver.resolve(&entry.function);
        log::debug!("  worst case: {} bytes over {} calls", result.total_bytes, result.path.len());

        reports.push(TaskReport { task: entry, result });
    }
    drop(resolver);

    print_separator()?;
    report::print(&reports, &registry, &reservations)?;

    Ok(cli::EXIT_SUCCESS)
}

/// Print a line to separate different execution stages.
fn print_separator() -> io::Result<()> {
    writeln!(io::stderr(), "{}", "─".repeat(80).dimmed())
}

fn configure_terminal_colorization() {
    // ! This should be detected by `colored`, but currently is not.
    // See https://github.com/mackwic/colored/issues/108

    if let Ok("dumb") = env::var("TERM").as_deref() {
        colored::control::set_override(false)
    }
}
