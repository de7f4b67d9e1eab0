//! Orchestration for `checklist next`.
//!
//! Advancing selects the leftmost unverified step (depth-first, document
//! order) and makes it the current active document. The current step must be
//! verified first; advancing never skips an incomplete step.

use std::fmt;
use std::path::{Path, PathBuf};

use anyhow::Result;
use tracing::info;

use crate::core::status::{Status, blocking_reasons, select_active, status};
use crate::io::ledger::load_ledger;
use crate::io::lockfile::{current_step, ensure_not_halted, set_current_step};
use crate::io::paths::WorkspacePaths;
use crate::io::store::resolve_tree;
use crate::verify::{ensure_untampered, find_current_node, ledger_key};

/// The current step is not yet verified, so `next` refuses to advance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncompleteStepError {
    pub id: String,
    pub reasons: Vec<String>,
}

impl fmt::Display for IncompleteStepError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "step '{}' is not complete", self.id)?;
        for reason in &self.reasons {
            write!(f, "\n  - {reason}")?;
        }
        Ok(())
    }
}

impl std::error::Error for IncompleteStepError {}

/// Result of an advance attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdvanceOutcome {
    /// A new step became active.
    Advanced { id: String, path: PathBuf },
    /// Every step in the tree is verified; nothing left to activate.
    Complete,
}

/// Advance to the next unverified step.
///
/// Refuses while halted, while any recorded document is tampered, or while
/// the current step is unverified ([`IncompleteStepError`]).
pub fn run_advance(root: &Path) -> Result<AdvanceOutcome> {
    let paths = WorkspacePaths::new(root);
    ensure_not_halted(&paths)?;
    ensure_untampered(&paths)?;

    let tree = resolve_tree(&paths.root_doc_path)?;

    if current_step(&paths)?.is_some() {
        let node = find_current_node(&paths, &tree)?;
        if status(node) != Status::Verified {
            return Err(IncompleteStepError {
                id: node.doc.id.clone(),
                reasons: blocking_reasons(node),
            }
            .into());
        }
        // Verified in-memory is not enough: the digest must be in the
        // ledger, i.e. `verify` ran for this step.
        let ledger = load_ledger(&paths.ledger_path)?;
        let key = ledger_key(&paths, &node.path)?;
        if !ledger.recorded_paths().any(|path| path == key) {
            return Err(IncompleteStepError {
                id: node.doc.id.clone(),
                reasons: vec![format!("step '{}' has not been verified", node.doc.id)],
            }
            .into());
        }
    }

    match select_active(&tree) {
        Some(active) => {
            set_current_step(&paths, &active.path)?;
            info!(id = %active.doc.id, "advanced to next step");
            Ok(AdvanceOutcome::Advanced {
                id: active.doc.id.clone(),
                path: active.path.clone(),
            })
        }
        None => {
            info!("execution tree fully verified");
            Ok(AdvanceOutcome::Complete)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::lockfile::{HaltedError, halt};
    use crate::test_support::TestWorkspace;
    use crate::verify::run_verify;

    fn two_step_workspace() -> TestWorkspace {
        let ws = TestWorkspace::new().expect("workspace");
        ws.write_step(
            "ROOT",
            "# Root\n\n- [ ] [STEP_01](./STEP_01.md)\n- [ ] [STEP_02](./STEP_02.md)\n",
        );
        ws.write_step("STEP_01", "# Step 1\n\n- [ ] first\n");
        ws.write_step("STEP_02", "# Step 2\n\n- [ ] second\n");
        ws
    }

    #[test]
    fn fresh_workspace_activates_the_first_step() {
        let ws = two_step_workspace();
        let outcome = run_advance(ws.root()).expect("advance");
        match outcome {
            AdvanceOutcome::Advanced { id, .. } => assert_eq!(id, "STEP_01"),
            AdvanceOutcome::Complete => panic!("should have advanced"),
        }
        let current = current_step(ws.paths()).expect("read").expect("set");
        assert!(current.ends_with("STEP_01.md"));
    }

    #[test]
    fn incomplete_current_step_refuses_to_advance() {
        let ws = two_step_workspace();
        run_advance(ws.root()).expect("first advance");

        let err = run_advance(ws.root()).expect_err("must refuse");
        let incomplete = err
            .downcast_ref::<IncompleteStepError>()
            .expect("incomplete");
        assert_eq!(incomplete.id, "STEP_01");
        assert_eq!(
            incomplete.reasons,
            vec!["STEP_01: unchecked task 'first'".to_string()]
        );
    }

    #[test]
    fn checked_but_unverified_step_still_refuses() {
        let ws = two_step_workspace();
        run_advance(ws.root()).expect("first advance");
        ws.write_step("STEP_01", "# Step 1\n\n- [x] first\n");

        let err = run_advance(ws.root()).expect_err("must refuse");
        let incomplete = err
            .downcast_ref::<IncompleteStepError>()
            .expect("incomplete");
        assert!(incomplete.reasons[0].contains("has not been verified"));
    }

    #[test]
    fn verified_step_advances_to_the_next() {
        let ws = two_step_workspace();
        run_advance(ws.root()).expect("first advance");
        ws.write_step("STEP_01", "# Step 1\n\n- [x] first\n");
        run_verify(ws.root()).expect("verify");

        let outcome = run_advance(ws.root()).expect("advance");
        match outcome {
            AdvanceOutcome::Advanced { id, .. } => assert_eq!(id, "STEP_02"),
            AdvanceOutcome::Complete => panic!("STEP_02 remains"),
        }
    }

    #[test]
    fn fully_verified_tree_reports_complete() {
        let ws = TestWorkspace::new().expect("workspace");
        ws.write_step("ROOT", "# Root\n\n- [ ] [STEP_01](./STEP_01.md)\n");
        ws.write_step("STEP_01", "# Step 1\n\n- [x] done\n");
        ws.activate("STEP_01");
        run_verify(ws.root()).expect("verify");

        // ROOT has no tasks of its own; once its only child is verified the
        // whole tree is.
        assert_eq!(run_advance(ws.root()).expect("advance"), AdvanceOutcome::Complete);
    }

    #[test]
    fn halt_freezes_advance() {
        let ws = two_step_workspace();
        halt(ws.paths(), "manual stop").expect("halt");

        let err = run_advance(ws.root()).expect_err("halted");
        let halted = err.downcast_ref::<HaltedError>().expect("halted error");
        assert_eq!(halted.reason, "manual stop");
    }
}
