//! Expected-outcome records and persisted validation state.
//!
//! One JSON record per step id lives under `expected/`. The records are
//! authored before the step runs and are never written by the runner; only
//! the validation state file is runner-owned.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::Utc;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::core::lock::OutcomeReport;
use crate::core::outcome::{CompareMode, ExpectedOutcome, OutcomeStatus};

/// Load every expected-outcome record from `expected/`, sorted by file name.
///
/// Missing directory means no expectations. A record with an uncompilable
/// pattern is rejected at load time, not at validation time.
pub fn load_outcomes(dir: &Path) -> Result<Vec<ExpectedOutcome>> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }
    let mut names: Vec<std::path::PathBuf> = fs::read_dir(dir)
        .with_context(|| format!("read {}", dir.display()))?
        .filter_map(|entry| entry.ok().map(|entry| entry.path()))
        .filter(|path| path.extension().is_some_and(|ext| ext == "json"))
        .collect();
    names.sort();

    let mut outcomes = Vec::new();
    for path in names {
        let contents =
            fs::read_to_string(&path).with_context(|| format!("read {}", path.display()))?;
        let outcome: ExpectedOutcome = serde_json::from_str(&contents)
            .with_context(|| format!("parse expected outcome {}", path.display()))?;
        if let Some(output) = &outcome.output
            && output.mode == CompareMode::Pattern
        {
            Regex::new(&output.value).with_context(|| {
                format!("compile pattern in expected outcome {}", path.display())
            })?;
        }
        outcomes.push(outcome);
    }
    Ok(outcomes)
}

/// Expectation for one step, if one was authored.
pub fn outcome_for_step<'a>(
    outcomes: &'a [ExpectedOutcome],
    step_id: &str,
) -> Option<&'a ExpectedOutcome> {
    outcomes.iter().find(|outcome| outcome.id == step_id)
}

/// Validation verdict for one outcome id, with the time it was recorded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationRecord {
    pub status: OutcomeStatus,
    pub at: Option<String>,
}

/// Runner-owned validation bookkeeping (`.checklist/state/validation_state.json`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationState {
    pub outcomes: BTreeMap<String, ValidationRecord>,
}

impl ValidationState {
    pub fn status_of(&self, id: &str) -> OutcomeStatus {
        self.outcomes
            .get(id)
            .map(|record| record.status)
            .unwrap_or_default()
    }

    pub fn record(&mut self, id: &str, status: OutcomeStatus) {
        self.outcomes.insert(
            id.to_string(),
            ValidationRecord {
                status,
                at: Some(Utc::now().to_rfc3339()),
            },
        );
    }

    /// One report per declared expectation, for lock computation.
    pub fn reports(&self, outcomes: &[ExpectedOutcome]) -> Vec<OutcomeReport> {
        outcomes
            .iter()
            .map(|outcome| OutcomeReport {
                id: outcome.id.clone(),
                status: self.status_of(&outcome.id),
            })
            .collect()
    }
}

/// Load validation state from disk. Missing file yields the default state.
pub fn load_validation_state(path: &Path) -> Result<ValidationState> {
    if !path.exists() {
        return Ok(ValidationState::default());
    }
    let contents = fs::read_to_string(path)
        .with_context(|| format!("read validation state {}", path.display()))?;
    let state: ValidationState = serde_json::from_str(&contents)
        .with_context(|| format!("parse validation state {}", path.display()))?;
    Ok(state)
}

/// Atomically write validation state to disk (temp file + rename).
pub fn write_validation_state(path: &Path, state: &ValidationState) -> Result<()> {
    let parent = path
        .parent()
        .with_context(|| format!("validation state path missing parent {}", path.display()))?;
    fs::create_dir_all(parent).with_context(|| format!("create directory {}", parent.display()))?;
    let mut buf = serde_json::to_string_pretty(state)?;
    buf.push('\n');
    let tmp_path = path.with_extension("json.tmp");
    fs::write(&tmp_path, &buf)
        .with_context(|| format!("write temp validation state {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path)
        .with_context(|| format!("replace validation state {}", path.display()))?;
    Ok(())
}
