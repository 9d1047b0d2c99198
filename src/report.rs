use std::io::{self, Write as _};

use colored::Colorize as _;

use crate::{
    allocations::Allocations,
    registry::Registry,
    resolver::PathResult,
    tasks::TaskEntry,
};

/// Margins below this many bytes are flagged as tight.
const TIGHT_MARGIN_BYTES: i64 = 128;
/// Call paths longer than this are elided in the detailed listing.
const MAX_PATH_HOPS: usize = 10;

pub struct TaskReport {
    pub task: TaskEntry,
    pub result: PathResult,
}

/// Render the summary table and the detailed worst-case paths.
pub fn print(
    reports: &[TaskReport],
    registry: &Registry,
    reservations: &Allocations,
) -> io::Result<()> {
    let mut stdout = io::stdout().lock();

    print_summary(&mut stdout, reports, reservations)?;
    writeln!(stdout)?;
    print_paths(&mut stdout, reports, registry)?;

    stdout.flush()
}

fn print_summary(
    out: &mut impl io::Write,
    reports: &[TaskReport],
    reservations: &Allocations,
) -> io::Result<()> {
    let header = format!(
        "{:<28} {:>15} {:>15} {:>12}",
        "Task", "Worst-case (B)", "Reserved (B)", "Margin (B)"
    );
    writeln!(out, "{}", header.bold())?;
    writeln!(out, "{}", "-".repeat(76))?;

    let mut total_used: u64 = 0;
    let mut total_reserved: u64 = 0;

    for report in reports {
        total_used += report.result.total_bytes;

        let task_name = &report.task.task_name;
        let reserved_bytes = reservations.reserved_bytes_for(task_name);
        let margin_bytes = reservations.margin(task_name, report.result.total_bytes);

        // pad before coloring; escape codes would throw off the columns
        let (reserved, margin, status) = match (reserved_bytes, margin_bytes) {
            (Some(reserved), Some(margin)) => {
                total_reserved += u64::from(reserved);
                (
                    format!("{reserved:>15}"),
                    format!("{margin:>12}"),
                    status_flag(margin, reserved),
                )
            }
            _ => (
                format!("{:>15}", "unknown").dimmed().to_string(),
                format!("{:>12}", "n/a").dimmed().to_string(),
                String::new(),
            ),
        };

        writeln!(
            out,
            "{:<28} {:>15} {} {} {}",
            report.task.task_name, report.result.total_bytes, reserved, margin, status
        )?;
    }

    if total_reserved > 0 {
        writeln!(out, "{}", "-".repeat(76))?;
        let totals = format!(
            "{:<28} {:>15} {:>15} {:>12}",
            "TOTAL",
            total_used,
            total_reserved,
            total_reserved as i64 - total_used as i64
        );
        writeln!(out, "{}", totals.bold())?;
        let utilization = total_used as f64 / total_reserved as f64 * 100.0;
        writeln!(out, "\noverall stack utilization: {utilization:.1}%")?;
    }

    Ok(())
}

fn status_flag(margin: i64, reserved: u32) -> String {
    if margin < 0 {
        "OVERFLOW".red().bold().to_string()
    } else if margin < TIGHT_MARGIN_BYTES {
        "tight".yellow().to_string()
    } else if margin > i64::from(reserved) / 2 {
        "generous".green().to_string()
    } else {
        String::new()
    }
}

fn print_paths(
    out: &mut impl io::Write,
    reports: &[TaskReport],
    registry: &Registry,
) -> io::Result<()> {
    writeln!(out, "{}", "worst-case call paths".bold())?;

    for report in reports {
        writeln!(
            out,
            "\n{}: {} bytes",
            report.task.task_name.bold(),
            report.result.total_bytes
        )?;

        let mut cumulative: u64 = 0;
        for (depth, step) in report.result.path.iter().take(MAX_PATH_HOPS).enumerate() {
            let indent = "  ".repeat(depth);

            if step.is_recursion() {
                writeln!(out, "{indent}{}", step.to_string().red())?;
                continue;
            }

            // every function on a resolved path has a fact by now; the
            // ones without a declared figure were synthesized during
            // resolution and carry the estimate
            let name = step.function();
            let own = registry
                .declared_stack(name)
                .or_else(|| registry.fact(name).map(|fact| fact.own_stack_bytes))
                .unwrap_or(0);
            let is_dynamic = registry.fact(name).map_or(false, |fact| fact.is_dynamic);
            cumulative += u64::from(own);

            let markers = step_markers(registry.is_estimated(name), is_dynamic);
            writeln!(out, "{indent}{name}: {own} bytes (cumulative: {cumulative}){markers}")?;
        }

        if report.result.path.len() > MAX_PATH_HOPS {
            writeln!(out, "  ... and {} more calls", report.result.path.len() - MAX_PATH_HOPS)?;
        }
    }

    Ok(())
}

fn step_markers(is_estimated: bool, is_dynamic: bool) -> String {
    let mut markers = String::new();
    if is_estimated {
        markers.push(' ');
        markers.push_str(&"[estimated]".yellow().to_string());
    }
    if is_dynamic {
        markers.push(' ');
        markers.push_str(&"[dynamic]".cyan().to_string());
    }
    markers
}
