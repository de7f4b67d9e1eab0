//! Orchestration for `checklist verify`.
//!
//! Verification recomputes the current step's status bottom-up from disk,
//! runs the step's blinded expected-outcome validation when one is declared,
//! and only on full success records the document digest in the hash ledger.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use tracing::{info, warn};

use crate::core::outcome::{ExpectedOutcome, OutcomeStatus, Validation, validate};
use crate::core::status::{Status, blocking_reasons, status};
use crate::io::config::load_config;
use crate::io::expected::{load_outcomes, load_validation_state, outcome_for_step, write_validation_state};
use crate::io::ledger::{check_recorded, first_tamper, load_ledger, write_ledger};
use crate::io::lockfile::{current_step, engage_lock, release_lock};
use crate::io::paths::WorkspacePaths;
use crate::io::process::run_shell_command;
use crate::io::scratchpad::{InconsistencyRecord, append_inconsistency};
use crate::io::store::{resolve_tree, write_document_in_scope};
use crate::tree::StepTree;

/// Output validation did not match the recorded expectation.
///
/// Reported, appended to the inconsistency log, retryable after fixing the
/// step. The outcome is recorded as mismatched, not reset to unrun.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationMismatchError {
    pub id: String,
    pub diff: Vec<String>,
}

impl fmt::Display for ValidationMismatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "expected outcome '{}' mismatched: {}",
            self.id,
            self.diff.join("; ")
        )
    }
}

impl std::error::Error for ValidationMismatchError {}

/// Result of a verification attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerifyOutcome {
    /// Step verified; its digest is now recorded in the ledger.
    Verified { id: String },
    /// Step is blocked; nothing was mutated.
    Blocked { id: String, reasons: Vec<String> },
}

/// Check every recorded document against the ledger before a state-changing
/// command.
///
/// On a mismatch the push lock is engaged and the tamper is surfaced as an
/// error carrying both digests.
pub fn ensure_untampered(paths: &WorkspacePaths) -> Result<()> {
    let ledger = load_ledger(&paths.ledger_path)?;
    let reports = check_recorded(&ledger, &workspace_root(paths)?)?;
    if let Some(tamper) = first_tamper(&reports) {
        warn!(path = %tamper.path, "ledger mismatch detected");
        engage_lock(paths, &format!("File tampering detected: {}", tamper.path))?;
        return Err(tamper.into());
    }
    Ok(())
}

/// Verify the current step.
///
/// Returns `Blocked` (with the enumerated blocking reasons) without mutating
/// any file when the subtree is not fully checked; fails with
/// [`ValidationMismatchError`] when the blinded expectation does not match.
pub fn run_verify(root: &Path) -> Result<VerifyOutcome> {
    let paths = WorkspacePaths::new(root);
    ensure_untampered(&paths)?;

    let tree = resolve_tree(&paths.root_doc_path)?;
    let node = find_current_node(&paths, &tree)?;
    let id = node.doc.id.clone();

    if status(node) != Status::Verified {
        let reasons = blocking_reasons(node);
        info!(id = %id, reasons = reasons.len(), "verification blocked");
        return Ok(VerifyOutcome::Blocked { id, reasons });
    }

    let outcomes = load_outcomes(&paths.expected_dir)?;
    if let Some(expected) = outcome_for_step(&outcomes, &id) {
        run_expected_validation(&paths, expected)?;
    }

    // Success: freeze the document content in the ledger. The status field
    // rewrite goes through the write-scope guard like any other mutation.
    let contents = mark_status_complete(&node.doc.to_text());
    write_document_in_scope(&paths, &node.path, &contents)?;

    let mut ledger = load_ledger(&paths.ledger_path)?;
    ledger.record(&ledger_key(&paths, &node.path)?, &contents);
    write_ledger(&paths.ledger_path, &ledger)?;
    release_lock(&paths)?;

    info!(id = %id, "step verified");
    Ok(VerifyOutcome::Verified { id })
}

/// Run the expectation's validation command and classify the result.
fn run_expected_validation(paths: &WorkspacePaths, expected: &ExpectedOutcome) -> Result<()> {
    let Some(command) = &expected.validation_command else {
        // No command declared: the outcome is validated by `exec` results
        // instead (see `exec::run_exec`). Leave its state untouched here.
        return Ok(());
    };

    let cfg = load_config(&paths.config_path)?;
    let output = run_shell_command(
        command,
        &paths.root,
        Some(Duration::from_secs(cfg.validation_timeout_secs)),
        cfg.output_limit_bytes,
    )?;

    let verdict = if output.timed_out {
        Validation::Mismatch {
            diff: vec![format!(
                "validation command timed out after {}s",
                cfg.validation_timeout_secs
            )],
        }
    } else {
        validate(&output.to_actual(), expected)?
    };

    let mut state = load_validation_state(&paths.validation_state_path)?;
    match verdict {
        Validation::Match => {
            state.record(&expected.id, OutcomeStatus::Matched);
            write_validation_state(&paths.validation_state_path, &state)?;
            Ok(())
        }
        Validation::Mismatch { diff } => {
            state.record(&expected.id, OutcomeStatus::Mismatched);
            write_validation_state(&paths.validation_state_path, &state)?;
            append_inconsistency(
                &paths.inconsistencies_path,
                &InconsistencyRecord {
                    id: expected.id.clone(),
                    diff: diff.clone(),
                    actual: output.stdout_lossy(),
                },
            )?;
            engage_lock(paths, "Expected output validation failed")?;
            Err(ValidationMismatchError {
                id: expected.id.clone(),
                diff,
            }
            .into())
        }
    }
}

/// Locate the current-step artifact's document inside the resolved tree.
pub(crate) fn find_current_node<'t>(
    paths: &WorkspacePaths,
    tree: &'t StepTree,
) -> Result<&'t StepTree> {
    let current = current_step(paths)?
        .ok_or_else(|| anyhow!("no current step defined (run `checklist next` first)"))?;
    let canonical = current
        .canonicalize()
        .with_context(|| format!("resolve current step {}", current.display()))?;
    tree.iter()
        .find(|node| node.path == canonical)
        .ok_or_else(|| {
            anyhow!(
                "current step {} is not part of the execution tree",
                canonical.display()
            )
        })
}

/// Ledger key: document path relative to the workspace root.
pub(crate) fn ledger_key(paths: &WorkspacePaths, doc_path: &Path) -> Result<String> {
    let root = workspace_root(paths)?;
    let relative = doc_path.strip_prefix(&root).unwrap_or(doc_path);
    Ok(relative.display().to_string())
}

fn workspace_root(paths: &WorkspacePaths) -> Result<PathBuf> {
    paths
        .root
        .canonicalize()
        .with_context(|| format!("resolve workspace root {}", paths.root.display()))
}

/// Rewrite a declared `**Status:**` field to complete. Documents without the
/// field are left as-is.
fn mark_status_complete(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for line in text.lines() {
        if line.trim_start().starts_with("**Status:**") {
            let indent = &line[..line.len() - line.trim_start().len()];
            out.push_str(&format!("{indent}**Status:** Complete"));
        } else {
            out.push_str(line);
        }
        out.push('\n');
    }
    out
}
