use crate::registry::Registry;

/// A scheduled task paired with its entry-point function.
///
/// Entries are a filtered view over the registry's function names; today
/// the task name and the function name coincide, but the report treats
/// them as distinct concepts.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TaskEntry {
    pub task_name: String,
    pub function: String,
}

/// Naming-convention rules identifying task entry points.
///
/// This is a heuristic over the firmware's naming discipline, not a
/// semantic guarantee. Each rule is an independent case-sensitive
/// predicate; a name matching *any* rule is classified as an entry point.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum NameRule {
    /// `BlinkTask`, `TSCTask`
    TaskSuffix,
    /// `MainThread`
    ThreadSuffix,
    /// `vTaskBlink` (classic FreeRTOS convention)
    SchedulerPrefix,
    /// `StartDefaultTask` (CubeMX convention; subsumed by `TaskSuffix`,
    /// listed so the convention is named)
    StartTaskPrefix,
}

impl NameRule {
    const ALL: [NameRule; 4] = [
        NameRule::TaskSuffix,
        NameRule::ThreadSuffix,
        NameRule::SchedulerPrefix,
        NameRule::StartTaskPrefix,
    ];

    fn matches(self, name: &str) -> bool {
        match self {
            NameRule::TaskSuffix => name.len() > 4 && name.ends_with("Task"),
            NameRule::ThreadSuffix => name.len() > 6 && name.ends_with("Thread"),
            NameRule::SchedulerPrefix => name.len() > 5 && name.starts_with("vTask"),
            NameRule::StartTaskPrefix => {
                name.len() > 9 && name.starts_with("Start") && name.ends_with("Task")
            }
        }
    }
}

fn is_entry_point(name: &str) -> bool {
    NameRule::ALL.iter().any(|rule| rule.matches(name))
}

/// All task entry points known to the registry, ordered by task name.
pub fn classify(registry: &Registry) -> Vec<TaskEntry> {
    // registry names iterate in sorted order, which fixes the report order
    let entries: Vec<_> = registry
        .names()
        .filter(|name| is_entry_point(name))
        .map(|name| TaskEntry {
            task_name: name.to_string(),
            function: name.to_string(),
        })
        .collect();

    log::info!("identified {} task entry points", entries.len());
    for entry in &entries {
        log::debug!("  task: {}", entry.task_name);
    }

    entries
}

/// Restrict `entries` to the tasks named on the command line. Unknown
/// names warn and are skipped; an empty filter keeps everything.
pub fn filter(entries: Vec<TaskEntry>, requested: &[String]) -> Vec<TaskEntry> {
    if requested.is_empty() {
        return entries;
    }

    for name in requested {
        if !entries.iter().any(|entry| &entry.task_name == name) {
            log::warn!("task `{name}` not found");
        }
    }

    entries
        .into_iter()
        .filter(|entry| requested.contains(&entry.task_name))
        .collect()
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    use super::*;
    use crate::registry::SourceLocation;

    #[rstest]
    #[case::task_suffix("BlinkTask", true)]
    #[case::thread_suffix("MainThread", true)]
    #[case::freertos_prefix("vTaskBlink", true)]
    #[case::cubemx_start("StartDefaultTask", true)]
    #[case::bare_suffix("Task", false)]
    #[case::case_sensitive("blinktask", false)]
    #[case::plain_function("read_sensor", false)]
    #[case::interior_match("TaskList_print", false)]
    fn name_rules(#[case] name: &str, #[case] expected: bool) {
        assert_eq!(is_entry_point(name), expected);
    }

    #[test]
    fn classification_is_ordered_and_filtered() {
        let mut registry = Registry::new();
        for name in ["ZephyrTask", "read_sensor", "AlarmTask", "main"] {
            registry.record_fact(
                name,
                16,
                false,
                SourceLocation {
                    file: "main.c".into(),
                    line: 1,
                },
            );
        }

        let entries = classify(&registry);
        let names: Vec<_> = entries.iter().map(|e| e.task_name.as_str()).collect();
        assert_eq!(names, ["AlarmTask", "ZephyrTask"]);
    }

    #[test]
    fn unknown_filter_names_are_skipped() {
        let entries = vec![TaskEntry {
            task_name: "AlarmTask".into(),
            function: "AlarmTask".into(),
        }];

        let kept = filter(entries, &["NoSuchTask".into()]);
        assert!(kept.is_empty());
    }
}
