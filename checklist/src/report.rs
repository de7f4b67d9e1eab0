//! Workspace status report.
//!
//! Read-only: derives everything from disk and renders it for the `status`
//! command. Never mutates state, never engages the lock artifact.

use std::fmt::Write as _;
use std::path::Path;

use anyhow::Result;

use crate::core::lock::BlockReason;
use crate::core::status::{Status, status};
use crate::io::lockfile::{current_step, halt_reason};
use crate::io::paths::WorkspacePaths;
use crate::push::lock_snapshot;
use crate::tree::StepTree;

/// One line of the rendered execution tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepLine {
    pub id: String,
    pub depth: usize,
    pub status: Status,
}

/// Snapshot of everything the `status` command reports.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusReport {
    pub steps: Vec<StepLine>,
    /// Id of the current active step, when one is set and resolvable.
    pub current: Option<String>,
    pub halt_reason: Option<String>,
    pub push_blocked: bool,
    pub reasons: Vec<BlockReason>,
}

/// Derive the full status report from disk.
pub fn status_report(root: &Path) -> Result<StatusReport> {
    let paths = WorkspacePaths::new(root);
    let snapshot = lock_snapshot(&paths)?;

    let mut steps = Vec::new();
    collect_lines(&snapshot.tree, 0, &mut steps);

    let current = match current_step(&paths)? {
        Some(path) => path
            .canonicalize()
            .ok()
            .and_then(|canonical| {
                snapshot
                    .tree
                    .iter()
                    .find(|node| node.path == canonical)
                    .map(|node| node.doc.id.clone())
            }),
        None => None,
    };

    Ok(StatusReport {
        steps,
        current,
        halt_reason: halt_reason(&paths)?,
        push_blocked: snapshot.lock.push_blocked,
        reasons: snapshot.lock.reasons,
    })
}

fn collect_lines(tree: &StepTree, depth: usize, lines: &mut Vec<StepLine>) {
    lines.push(StepLine {
        id: tree.doc.id.clone(),
        depth,
        status: status(tree),
    });
    for child in &tree.children {
        collect_lines(child, depth + 1, lines);
    }
}

impl StatusReport {
    /// Human-readable rendering for the command loop.
    pub fn render(&self) -> String {
        let mut out = String::new();
        out.push_str("Execution tree:\n");
        for line in &self.steps {
            let marker = if self.current.as_deref() == Some(line.id.as_str()) {
                "*"
            } else {
                " "
            };
            let _ = writeln!(
                out,
                "{marker} {:indent$}{} [{}]",
                "",
                line.id,
                line.status,
                indent = line.depth * 2
            );
        }
        if let Some(reason) = &self.halt_reason {
            let _ = writeln!(out, "HALTED: {reason}");
        }
        if self.push_blocked {
            out.push_str("Push: blocked\n");
            for reason in &self.reasons {
                let _ = writeln!(out, "  - {reason}");
            }
        } else {
            out.push_str("Push: clear\n");
        }
        out
    }
}
