use std::path::PathBuf;

use clap::{ArgAction, Parser};
use git_version::git_version;

/// Successful termination of process.
pub const EXIT_SUCCESS: i32 = 0;

/// Worst-case stack usage analysis for RTOS firmware build trees.
#[derive(Parser)]
#[command()]
pub struct Opts {
    /// Build directory containing the .su and .callgraph artifacts.
    #[arg(
        short = 'b',
        long,
        default_value = "build",
        env = "STACK_AUDIT_BUILD_DIR"
    )]
    pub build_dir: PathBuf,

    /// Header file declaring the *_STACK_SIZE task reservations (in
    /// 4-byte words).
    #[arg(long, default_value = "Core/Src/common.h")]
    pub allocations: PathBuf,

    /// Only analyze the given task (may be repeated).
    #[arg(short = 't', long = "task")]
    pub tasks: Vec<String>,

    /// Enable more verbose output.
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,

    /// Prints version information.
    #[arg(short = 'V', long)]
    version: bool,
}

pub fn handle_arguments() -> anyhow::Result<i32> {
    let opts = Opts::parse();

    crate::logger::init(opts.verbose);

    if opts.version {
        print_version();
        return Ok(EXIT_SUCCESS);
    }

    crate::run_analysis(&opts)
}

/// The string reported by the `--version` flag
fn print_version() {
    /// Version from `Cargo.toml` e.g. `"0.1.0"`
    const VERSION: &str = env!("CARGO_PKG_VERSION");

    // `git describe --long` output, e.g. `v0.1.0-4-g25c50d2`; the fallback
    // `"--"` yields an empty hash after `extract_git_hash`
    const GIT_DESCRIBE: &str = git_version!(fallback = "--", args = ["--long"]);
    let hash = extract_git_hash(GIT_DESCRIBE);

    println!("{VERSION} {hash}");
}

/// Extract the abbreviated object name from a `git describe` statement
fn extract_git_hash(git_describe: &str) -> &str {
    git_describe.split('-').nth(2).unwrap_or("")
}
