use std::{fs, path::Path, sync::OnceLock};

use regex::Regex;

/// Words are 4-byte stack words, the unit FreeRTOS sizes stacks in.
const WORD_BYTES: u32 = 4;

/// Reserved-stack declarations read from a header file, e.g.
/// `#define TSC_STACK_SIZE 128` (128 words = 512 bytes).
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Allocations {
    // (declared prefix, reserved bytes), in declaration order
    reserved: Vec<(String, u32)>,
}

/// Read stack reservations from `path`. A missing or unreadable file is
/// the non-fatal input-absent case: margins will be reported as unknown.
pub fn load(path: &Path) -> Allocations {
    match fs::read_to_string(path) {
        Ok(content) => {
            let allocations = parse(&content);
            if allocations.is_empty() {
                log::warn!("no *_STACK_SIZE declarations in `{}`", path.display());
            } else {
                log::info!(
                    "read {} stack reservations from `{}`",
                    allocations.reserved.len(),
                    path.display()
                );
            }
            allocations
        }
        Err(err) => {
            log::warn!(
                "could not read stack reservations from `{}`: {err}",
                path.display()
            );
            Allocations::default()
        }
    }
}

fn parse(content: &str) -> Allocations {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    let pattern = PATTERN
        .get_or_init(|| Regex::new(r"#define\s+(\w+)_STACK_SIZE\s+(\d+)").expect("valid regex"));

    let reserved = pattern
        .captures_iter(content)
        .filter_map(|captures| {
            let words: u32 = captures[2].parse().ok()?;
            let bytes = words.checked_mul(WORD_BYTES)?;
            Some((captures[1].to_string(), bytes))
        })
        .collect();

    Allocations { reserved }
}

impl Allocations {
    /// Match a declaration to a task name, case-insensitively: the task
    /// name starts with the declared prefix, or contains it. First match
    /// in declaration order wins.
    pub fn reserved_bytes_for(&self, task_name: &str) -> Option<u32> {
        let task_upper = task_name.to_uppercase();
        let task_lower = task_name.to_lowercase();

        self.reserved
            .iter()
            .find(|(prefix, _)| {
                task_upper.starts_with(&prefix.to_uppercase())
                    || task_lower.contains(&prefix.to_lowercase())
            })
            .map(|(_, bytes)| *bytes)
    }

    /// `reserved - worst_case`, or `None` when no declaration matches.
    /// An unknown margin is never reported as zero.
    pub fn margin(&self, task_name: &str, worst_case_bytes: u64) -> Option<i64> {
        self.reserved_bytes_for(task_name)
            .map(|reserved| i64::from(reserved) - worst_case_bytes as i64)
    }

    pub fn is_empty(&self) -> bool {
        self.reserved.is_empty()
    }
}
