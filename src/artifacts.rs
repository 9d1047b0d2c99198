use std::{
    fs,
    path::{Path, PathBuf},
    sync::OnceLock,
};

use regex::Regex;
use walkdir::WalkDir;

use crate::registry::{Registry, SourceLocation};

/// One `.su` record: the frame size the compiler declared for a function.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SuRecord {
    pub file: String,
    pub line: u32,
    pub name: String,
    pub bytes: u32,
    pub is_dynamic: bool,
}

/// Build the function registry from every `.su` and `.callgraph` artifact
/// under `build_dir`.
///
/// Missing artifacts are warnings, not errors: analysis proceeds with
/// whatever was found.
pub fn load(build_dir: &Path) -> Registry {
    let mut registry = Registry::new();

    let su_files = discover(build_dir, "su");
    if su_files.is_empty() {
        log::warn!(
            "no .su files found in `{}`; build the firmware with -fstack-usage",
            build_dir.display()
        );
    } else {
        log::info!("found {} .su files", su_files.len());
    }

    for path in &su_files {
        for record in parse_su(&read_lossy(path)) {
            registry.record_fact(
                &record.name,
                record.bytes,
                record.is_dynamic,
                SourceLocation {
                    file: record.file,
                    line: record.line,
                },
            );
        }
    }
    log::info!("parsed {} unique functions", registry.len());

    let callgraph_files = discover(build_dir, "callgraph");
    if callgraph_files.is_empty() {
        log::warn!(
            "no .callgraph files found in `{}`; callgraph analysis will be limited",
            build_dir.display()
        );
    } else {
        log::info!("found {} .callgraph files", callgraph_files.len());
    }

    for path in &callgraph_files {
        for (caller, callee) in parse_callgraph(&read_lossy(path)) {
            registry.record_call(&caller, &callee);
        }
    }

    let callers = registry.iter().filter(|fact| !fact.callees.is_empty()).count();
    log::info!("found call relationships for {callers} functions");

    registry
}

fn discover(root: &Path, extension: &str) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = WalkDir::new(root)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
        .filter(|path| path.extension().map_or(false, |ext| ext == extension))
        .collect();
    files.sort();
    files
}

fn read_lossy(path: &Path) -> String {
    match fs::read(path) {
        Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
        Err(err) => {
            log::warn!("failed to read `{}`: {err}", path.display());
            String::new()
        }
    }
}

fn parse_su(content: &str) -> impl Iterator<Item = SuRecord> + '_ {
    content.lines().filter_map(parse_su_line)
}

fn parse_callgraph(content: &str) -> impl Iterator<Item = (String, String)> + '_ {
    content.lines().filter_map(parse_call_edge)
}

/// `<path>:<line>:<col>:<name>  <bytes>  <qualifier>`, e.g.
/// `main.c:123:1:myFunction	64	static`. Non-matching lines are
/// skipped silently per the artifact contract.
fn parse_su_line(line: &str) -> Option<SuRecord> {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    let pattern = PATTERN
        .get_or_init(|| Regex::new(r"^(.+?):(\d+):(\d+):(\S+)\s+(\d+)\s+(\S+)").expect("valid regex"));

    let captures = pattern.captures(line)?;
    let qualifier = &captures[6];

    Some(SuRecord {
        file: captures[1].to_string(),
        line: captures[2].parse().ok()?,
        name: captures[4].to_string(),
        bytes: captures[5].parse().ok()?,
        is_dynamic: matches!(qualifier, "dynamic" | "bounded"),
    })
}

/// A caller/callee edge in either of the two surface grammars:
/// `"caller/12" -> "callee/34"` (quoted, from GCC's callgraph dump) or
/// the whitespace-tolerant unquoted form. Node-id suffixes are dropped
/// here; clone-suffix canonicalization happens in the registry.
fn parse_call_edge(line: &str) -> Option<(String, String)> {
    static QUOTED: OnceLock<Regex> = OnceLock::new();
    static UNQUOTED: OnceLock<Regex> = OnceLock::new();

    let quoted = QUOTED.get_or_init(|| {
        Regex::new(r#""([^"]+?)(?:/\d+)?"\s*->\s*"([^"]+?)(?:/\d+)?""#).expect("valid regex")
    });
    let unquoted = UNQUOTED
        .get_or_init(|| Regex::new(r"(\S+?)(?:/\d+)?\s*->\s*(\S+?)(?:/\d+)?(\s|;|$)").expect("valid regex"));

    let captures = quoted.captures(line).or_else(|| unquoted.captures(line))?;
    Some((captures[1].to_string(), captures[2].to_string()))
}
