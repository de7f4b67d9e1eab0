//! Expected-outcome validation.
//!
//! An expected outcome is authored before its step runs (blinded) and never
//! mutated by the operator under verification. Validation compares a real
//! execution result against the record and classifies match or mismatch.

use anyhow::{Context, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};

/// How expected output is compared against the captured stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompareMode {
    /// Exact string equality.
    Exact,
    /// Substring containment.
    Contains,
    /// Regular expression match.
    Pattern,
}

/// Which captured stream the expectation applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Stream {
    #[default]
    Stdout,
    Stderr,
}

/// Declared output expectation with its comparison mode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpectedOutput {
    pub mode: CompareMode,
    pub value: String,
    #[serde(default)]
    pub stream: Stream,
}

/// Pre-authored record of the correct result for a step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpectedOutcome {
    /// Step id this expectation belongs to.
    pub id: String,
    /// Exit code, compared exactly.
    pub exit_code: i32,
    /// Optional output expectation.
    #[serde(default)]
    pub output: Option<ExpectedOutput>,
    /// Optional command the runner executes to produce the actual result.
    #[serde(default)]
    pub validation_command: Option<String>,
}

/// Captured result of a real execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActualResult {
    pub stdout: String,
    pub stderr: String,
    /// `None` when the process was killed by a signal.
    pub exit_code: Option<i32>,
}

/// Validation verdict. The "never run" case is tracked separately as
/// [`OutcomeStatus::Unrun`]; this enum only classifies completed runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Validation {
    Match,
    Mismatch { diff: Vec<String> },
}

/// Persisted validation state per outcome id.
///
/// Keeps the distinction between "never run" and "ran and failed": both
/// block the push lock, but they are reported differently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum OutcomeStatus {
    #[default]
    Unrun,
    Matched,
    Mismatched,
}

/// Compare an actual execution result against a recorded expectation.
///
/// Exit code must equal exactly; the output stream is compared per the
/// expectation's declared mode. Errors only on an uncompilable pattern.
pub fn validate(actual: &ActualResult, expected: &ExpectedOutcome) -> Result<Validation> {
    let mut diff = Vec::new();

    match actual.exit_code {
        Some(code) if code == expected.exit_code => {}
        Some(code) => diff.push(format!(
            "exit code: expected {}, got {}",
            expected.exit_code, code
        )),
        None => diff.push(format!(
            "exit code: expected {}, process was killed by a signal",
            expected.exit_code
        )),
    }

    if let Some(output) = &expected.output {
        let (label, stream) = match output.stream {
            Stream::Stdout => ("stdout", actual.stdout.as_str()),
            Stream::Stderr => ("stderr", actual.stderr.as_str()),
        };
        let matched = match output.mode {
            CompareMode::Exact => stream == output.value,
            CompareMode::Contains => stream.contains(&output.value),
            CompareMode::Pattern => Regex::new(&output.value)
                .with_context(|| format!("compile expected pattern '{}'", output.value))?
                .is_match(stream),
        };
        if !matched {
            diff.push(format!(
                "{label}: expected {} '{}', got '{}'",
                mode_label(output.mode),
                output.value,
                truncate(stream, 400)
            ));
        }
    }

    if diff.is_empty() {
        Ok(Validation::Match)
    } else {
        Ok(Validation::Mismatch { diff })
    }
}

fn mode_label(mode: CompareMode) -> &'static str {
    match mode {
        CompareMode::Exact => "exactly",
        CompareMode::Contains => "substring",
        CompareMode::Pattern => "pattern",
    }
}

fn truncate(text: &str, limit: usize) -> String {
    if text.len() <= limit {
        return text.to_string();
    }
    let mut end = limit;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}... [{} bytes total]", &text[..end], text.len())
}
