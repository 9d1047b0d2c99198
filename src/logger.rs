use colored::Colorize as _;
use log::{Level, LevelFilter, Log, Metadata, Record};

/// Minimal `log` backend writing colored level tags to stderr.
///
/// Filtering follows the `--verbose` count:
///   * 0: everything from stack-audit with level "info" or higher
///   * 1: everything from stack-audit
///   * 2 or more: everything, dependencies included
struct Logger {
    verbose: u8,
}

impl Log for Logger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        match self.verbose {
            0 => metadata.target().starts_with("stack_audit") && metadata.level() <= Level::Info,
            1 => metadata.target().starts_with("stack_audit"),
            _ => true,
        }
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }

        let level = match record.level() {
            Level::Error => "error".red().bold(),
            Level::Warn => "warning".yellow().bold(),
            Level::Info => "info".green(),
            Level::Debug => "debug".blue(),
            Level::Trace => "trace".dimmed(),
        };
        eprintln!("({level}) {}", record.args());
    }

    fn flush(&self) {}
}

/// Install the logger. Called once, before any analysis output.
pub fn init(verbose: u8) {
    let max_level = match verbose {
        0 => LevelFilter::Info,
        _ => LevelFilter::Trace,
    };

    if log::set_boxed_logger(Box::new(Logger { verbose })).is_ok() {
        log::set_max_level(max_level);
    }
}
