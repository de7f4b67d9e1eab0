//! Scratchpad artifacts: thought log, inconsistency log, command log.
//!
//! These are product artifacts in the workspace, separate from dev tracing.
//! Thoughts and unresolved inconsistencies count as pending blockers for the
//! push lock until a human resolves them.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::Utc;
use regex::Regex;

const PENDING_QUESTIONS_HEADER: &str = "## Pending Questions";
const UNRESOLVED_HEADER: &str = "## Unresolved Inconsistencies";
const THOUGHT_GLYPH: &str = "\u{2753}";
const WARNING_GLYPH: &str = "\u{26A0}\u{FE0F}";

/// Append a dated pending-question entry under the thoughts header.
pub fn append_thought(path: &Path, thought: &str) -> Result<()> {
    let entry = format!(
        "- {THOUGHT_GLYPH} [{}] {thought}\n",
        Utc::now().format("%Y-%m-%d")
    );
    insert_under_header(path, PENDING_QUESTIONS_HEADER, &entry)
}

/// Pending questions currently recorded in the thoughts file.
pub fn pending_thoughts(path: &Path) -> Result<Vec<String>> {
    list_entries(path, THOUGHT_GLYPH)
}

/// A structured validation-mismatch record for the inconsistency log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InconsistencyRecord {
    /// Expectation id that failed.
    pub id: String,
    /// Diff lines describing the mismatch.
    pub diff: Vec<String>,
    /// Captured actual output, already truncated by the process runner.
    pub actual: String,
}

/// Append a mismatch record under the unresolved-inconsistencies header.
pub fn append_inconsistency(path: &Path, record: &InconsistencyRecord) -> Result<()> {
    let mut entry = format!(
        "- {WARNING_GLYPH} [{}] Validation failed\n  - **Expectation:** {}\n",
        Utc::now().format("%Y-%m-%d"),
        record.id
    );
    for line in &record.diff {
        entry.push_str(&format!("  - **Diff:** {line}\n"));
    }
    if !record.actual.trim().is_empty() {
        entry.push_str(&format!("  - **Actual:** {}\n", record.actual.trim()));
    }
    insert_under_header(path, UNRESOLVED_HEADER, &entry)
}

/// Unresolved inconsistencies currently recorded in the log.
pub fn unresolved_inconsistencies(path: &Path) -> Result<Vec<String>> {
    list_entries(path, WARNING_GLYPH)
}

/// Append an executed command and its result to the command log.
pub fn append_command_log(path: &Path, command: &str, exit_code: Option<i32>) -> Result<()> {
    let exit = match exit_code {
        Some(code) => code.to_string(),
        None => "killed".to_string(),
    };
    let entry = format!("[{}] {} (exit: {})\n", Utc::now().to_rfc3339(), command, exit);
    let mut contents = read_or_empty(path)?;
    contents.push_str(&entry);
    fs::write(path, contents).with_context(|| format!("write {}", path.display()))?;
    Ok(())
}

fn insert_under_header(path: &Path, header: &str, entry: &str) -> Result<()> {
    let contents = read_or_empty(path)?;
    let updated = match contents.find(header) {
        Some(position) => {
            let after_header = position + header.len();
            let insert_at = contents[after_header..]
                .find('\n')
                .map(|offset| after_header + offset + 1)
                .unwrap_or(contents.len());
            let mut updated = String::with_capacity(contents.len() + entry.len());
            updated.push_str(&contents[..insert_at]);
            updated.push_str(entry);
            updated.push_str(&contents[insert_at..]);
            updated
        }
        None => {
            let mut updated = contents;
            if !updated.is_empty() && !updated.ends_with('\n') {
                updated.push('\n');
            }
            updated.push_str(&format!("{header}\n{entry}"));
            updated
        }
    };
    fs::write(path, updated).with_context(|| format!("write {}", path.display()))?;
    Ok(())
}

fn list_entries(path: &Path, glyph: &str) -> Result<Vec<String>> {
    let contents = read_or_empty(path)?;
    let pattern = Regex::new(&format!(
        r"- {}\s*\[\d{{4}}-\d{{2}}-\d{{2}}\] (.*)",
        regex::escape(glyph)
    ))
    .context("compile scratchpad entry pattern")?;
    Ok(pattern
        .captures_iter(&contents)
        .map(|captures| captures[1].trim().to_string())
        .collect())
}

fn read_or_empty(path: &Path) -> Result<String> {
    if !path.exists() {
        return Ok(String::new());
    }
    fs::read_to_string(path).with_context(|| format!("read {}", path.display()))
}
