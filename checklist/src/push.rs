//! Orchestration for `checklist push`.
//!
//! Push is the only irreversible operation, so it re-derives the full lock
//! state from disk immediately before acting. A blocked push enumerates
//! every reason and engages the lock artifact; it never partially commits.

use std::path::Path;

use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::core::lock::{BlockReason, LockState, compute_lock};
use crate::io::config::load_config;
use crate::io::expected::{load_outcomes, load_validation_state};
use crate::io::git::VcsClient;
use crate::io::ledger::{check_recorded, load_ledger};
use crate::io::lockfile::{engage_lock, ensure_not_halted, release_lock};
use crate::io::paths::WorkspacePaths;
use crate::io::scratchpad::{pending_thoughts, unresolved_inconsistencies};
use crate::io::store::resolve_tree;
use crate::tree::StepTree;

/// Result of a push attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PushOutcome {
    /// Changes were pushed. `committed` is false when the tree was already
    /// committed and only the push ran.
    Pushed { committed: bool },
    /// Push refused; every blocking reason enumerated.
    Blocked { reasons: Vec<BlockReason> },
}

/// Full lock derivation for one command invocation.
pub(crate) struct LockSnapshot {
    pub tree: StepTree,
    pub lock: LockState,
}

/// Re-derive the lock from disk: tree, ledger, validation state, and
/// scratchpad blockers, in that order.
pub(crate) fn lock_snapshot(paths: &WorkspacePaths) -> Result<LockSnapshot> {
    let tree = resolve_tree(&paths.root_doc_path)?;

    let ledger = load_ledger(&paths.ledger_path)?;
    let root = paths
        .root
        .canonicalize()
        .with_context(|| format!("resolve workspace root {}", paths.root.display()))?;
    let ledger_reports = check_recorded(&ledger, &root)?;

    let outcomes = load_outcomes(&paths.expected_dir)?;
    let validation = load_validation_state(&paths.validation_state_path)?;
    let outcome_reports = validation.reports(&outcomes);

    let mut lock = compute_lock(&tree, &ledger_reports, &outcome_reports);
    for text in pending_thoughts(&paths.thoughts_path)? {
        lock.reasons.push(BlockReason::PendingThought { text });
    }
    for text in unresolved_inconsistencies(&paths.inconsistencies_path)? {
        lock.reasons.push(BlockReason::UnresolvedInconsistency { text });
    }
    lock.push_blocked = !lock.reasons.is_empty();

    Ok(LockSnapshot { tree, lock })
}

/// Commit and push the workspace, if and only if the lock derives clean.
pub fn run_push<V: VcsClient>(root: &Path, vcs: &V) -> Result<PushOutcome> {
    let paths = WorkspacePaths::new(root);
    ensure_not_halted(&paths)?;

    let snapshot = lock_snapshot(&paths)?;
    if snapshot.lock.push_blocked {
        warn!(reasons = snapshot.lock.reasons.len(), "push blocked");
        engage_lock(&paths, "Checklist incomplete or validation pending")?;
        return Ok(PushOutcome::Blocked {
            reasons: snapshot.lock.reasons,
        });
    }

    release_lock(&paths)?;

    let cfg = load_config(&paths.config_path)?;
    let committed = vcs.commit_all(&cfg.commit_message)?;
    vcs.push()?;

    info!(committed, "pushed");
    Ok(PushOutcome::Pushed { committed })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    use crate::core::outcome::OutcomeStatus;
    use crate::io::expected::{load_validation_state, write_validation_state};
    use crate::io::lockfile::{HaltedError, LockArtifact, halt, read_artifact};
    use crate::io::scratchpad::append_thought;
    use crate::test_support::TestWorkspace;
    use crate::verify::run_verify;

    /// Scripted stand-in for git; records calls instead of touching a repo.
    #[derive(Default)]
    struct FakeVcs {
        calls: RefCell<Vec<String>>,
        has_changes: bool,
    }

    impl VcsClient for FakeVcs {
        fn commit_all(&self, message: &str) -> Result<bool> {
            self.calls.borrow_mut().push(format!("commit: {message}"));
            Ok(self.has_changes)
        }

        fn push(&self) -> Result<()> {
            self.calls.borrow_mut().push("push".to_string());
            Ok(())
        }
    }

    fn clean_workspace() -> TestWorkspace {
        let ws = TestWorkspace::new().expect("workspace");
        ws.write_step("ROOT", "# Root\n\n- [ ] [STEP_01](./STEP_01.md)\n");
        ws.write_step("STEP_01", "# Step 1\n\n- [x] done\n");
        ws.activate("STEP_01");
        run_verify(ws.root()).expect("verify");
        ws
    }

    #[test]
    fn clean_workspace_commits_and_pushes() {
        let ws = clean_workspace();
        let vcs = FakeVcs {
            has_changes: true,
            ..FakeVcs::default()
        };

        let outcome = run_push(ws.root(), &vcs).expect("push");
        assert_eq!(outcome, PushOutcome::Pushed { committed: true });
        assert_eq!(
            *vcs.calls.borrow(),
            vec![
                "commit: Completed checklist steps".to_string(),
                "push".to_string()
            ]
        );
    }

    #[test]
    fn unchecked_task_blocks_and_engages_lock() {
        let ws = TestWorkspace::new().expect("workspace");
        ws.write_step("ROOT", "# Root\n\n- [ ] [STEP_01](./STEP_01.md)\n");
        ws.write_step("STEP_01", "# Step 1\n\n- [ ] not done\n");
        let vcs = FakeVcs::default();

        let outcome = run_push(ws.root(), &vcs).expect("push attempt");
        match outcome {
            PushOutcome::Blocked { reasons } => {
                assert_eq!(
                    reasons,
                    vec![BlockReason::UncheckedTask {
                        path: "ROOT/STEP_01".to_string(),
                        text: "not done".to_string(),
                    }]
                );
            }
            PushOutcome::Pushed { .. } => panic!("must block"),
        }
        assert!(vcs.calls.borrow().is_empty());
        assert!(matches!(
            read_artifact(ws.paths()).expect("artifact"),
            Some(LockArtifact::Locked(_))
        ));
    }

    #[test]
    fn pending_thought_blocks_push() {
        let ws = clean_workspace();
        append_thought(&ws.paths().thoughts_path, "is the API frozen").expect("thought");
        let vcs = FakeVcs::default();

        let outcome = run_push(ws.root(), &vcs).expect("push attempt");
        match outcome {
            PushOutcome::Blocked { reasons } => {
                assert_eq!(
                    reasons,
                    vec![BlockReason::PendingThought {
                        text: "is the API frozen".to_string()
                    }]
                );
            }
            PushOutcome::Pushed { .. } => panic!("must block"),
        }
    }

    #[test]
    fn unrun_expectation_blocks_push() {
        let ws = clean_workspace();
        ws.write_expected(
            "STEP_01",
            r#"{"id":"STEP_01","exit_code":0,"output":{"mode":"contains","value":"PASS"}}"#,
        );
        let vcs = FakeVcs::default();

        let outcome = run_push(ws.root(), &vcs).expect("push attempt");
        assert_eq!(
            outcome,
            PushOutcome::Blocked {
                reasons: vec![BlockReason::OutcomeUnvalidated {
                    id: "STEP_01".to_string()
                }]
            }
        );
    }

    #[test]
    fn matched_expectation_unblocks_push() {
        let ws = clean_workspace();
        ws.write_expected(
            "STEP_01",
            r#"{"id":"STEP_01","exit_code":0,"output":{"mode":"contains","value":"PASS"}}"#,
        );
        let mut state = load_validation_state(&ws.paths().validation_state_path).expect("state");
        state.record("STEP_01", OutcomeStatus::Matched);
        write_validation_state(&ws.paths().validation_state_path, &state).expect("write");
        let vcs = FakeVcs::default();

        let outcome = run_push(ws.root(), &vcs).expect("push");
        assert_eq!(outcome, PushOutcome::Pushed { committed: false });
    }

    /// Unchecking a previously verified box re-blocks push on the next
    /// derivation, with the unchecked task enumerated.
    #[test]
    fn unchecking_a_verified_box_reblocks_push() {
        let ws = clean_workspace();
        // A scoped re-edit of the active step, then re-verify, keeps the
        // ledger consistent; here the box is simply flipped back in place.
        ws.write_step("STEP_01", "# Step 1\n\n- [ ] done\n");
        let vcs = FakeVcs::default();

        let outcome = run_push(ws.root(), &vcs).expect("push attempt");
        match outcome {
            PushOutcome::Blocked { reasons } => {
                assert!(reasons.iter().any(|reason| matches!(
                    reason,
                    BlockReason::UncheckedTask { text, .. } if text == "done"
                )));
                assert!(reasons.iter().any(|reason| matches!(
                    reason,
                    BlockReason::LedgerMismatch { path } if path == "steps/STEP_01.md"
                )));
            }
            PushOutcome::Pushed { .. } => panic!("must block"),
        }
    }

    #[test]
    fn halt_freezes_push() {
        let ws = clean_workspace();
        halt(ws.paths(), "stop the line").expect("halt");
        let vcs = FakeVcs::default();

        let err = run_push(ws.root(), &vcs).expect_err("halted");
        assert!(err.downcast_ref::<HaltedError>().is_some());
        assert!(vcs.calls.borrow().is_empty());
    }
}
