//! Orchestration for `checklist exec`.
//!
//! Commands run synchronously with no timeout; only the configured output
//! limit applies. Every invocation lands in the command log, and when the
//! current step declares an expectation without its own validation command,
//! the exec result is routed through the output validator.

use std::path::Path;

use anyhow::Result;
use tracing::{debug, info};

use crate::core::outcome::{OutcomeStatus, Validation, validate};
use crate::io::config::load_config;
use crate::io::expected::{
    load_outcomes, load_validation_state, outcome_for_step, write_validation_state,
};
use crate::io::lockfile::current_step;
use crate::io::paths::WorkspacePaths;
use crate::io::process::{CommandOutput, run_shell_command};
use crate::io::scratchpad::{InconsistencyRecord, append_command_log, append_inconsistency};
use crate::io::store::resolve_tree;
use crate::verify::ensure_untampered;

/// Result of one exec invocation.
#[derive(Debug)]
pub struct ExecOutcome {
    pub output: CommandOutput,
    /// Verdict against the current step's expectation, when one applies.
    pub validation: Option<Validation>,
}

/// Run a shell command in the workspace root.
///
/// Allowed while halted: inspection commands stay available so a human can
/// diagnose the halt. Still refuses on a ledger mismatch: exec writes the
/// command log and validation state, and no state change happens on top of
/// a tampered tree.
pub fn run_exec(root: &Path, command: &str) -> Result<ExecOutcome> {
    let paths = WorkspacePaths::new(root);
    ensure_untampered(&paths)?;
    let cfg = load_config(&paths.config_path)?;

    let output = run_shell_command(command, &paths.root, None, cfg.output_limit_bytes)?;
    append_command_log(&paths.command_log_path, command, output.exit_code)?;

    let validation = validate_against_current_step(&paths, &output)?;
    info!(
        exit_code = ?output.exit_code,
        validated = validation.is_some(),
        "exec finished"
    );
    Ok(ExecOutcome { output, validation })
}

/// Route the exec result through the validator when the current step's
/// expectation has no validation command of its own.
fn validate_against_current_step(
    paths: &WorkspacePaths,
    output: &CommandOutput,
) -> Result<Option<Validation>> {
    let Some(current) = current_step(paths)? else {
        return Ok(None);
    };
    let tree = resolve_tree(&paths.root_doc_path)?;
    let canonical = match current.canonicalize() {
        Ok(canonical) => canonical,
        Err(_) => return Ok(None),
    };
    let Some(node) = tree.iter().find(|node| node.path == canonical) else {
        return Ok(None);
    };

    let outcomes = load_outcomes(&paths.expected_dir)?;
    let Some(expected) = outcome_for_step(&outcomes, &node.doc.id) else {
        return Ok(None);
    };
    if expected.validation_command.is_some() {
        // That expectation is checked by `verify`, not by exec results.
        debug!(id = %expected.id, "expectation has its own validation command");
        return Ok(None);
    }

    let verdict = validate(&output.to_actual(), expected)?;
    let mut state = load_validation_state(&paths.validation_state_path)?;
    match &verdict {
        Validation::Match => state.record(&expected.id, OutcomeStatus::Matched),
        Validation::Mismatch { diff } => {
            state.record(&expected.id, OutcomeStatus::Mismatched);
            append_inconsistency(
                &paths.inconsistencies_path,
                &InconsistencyRecord {
                    id: expected.id.clone(),
                    diff: diff.clone(),
                    actual: output.stdout_lossy(),
                },
            )?;
        }
    }
    write_validation_state(&paths.validation_state_path, &state)?;
    Ok(Some(verdict))
}
