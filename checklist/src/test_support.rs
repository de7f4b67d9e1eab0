//! Shared helpers for unit and integration tests.
//!
//! Enabled under `cfg(test)` and the `test-support` feature so integration
//! tests and downstream crates can build fixture trees and scratch
//! workspaces without duplicating setup.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::core::document::parse;
use crate::io::lockfile::set_current_step;
use crate::io::paths::WorkspacePaths;
use crate::tree::StepTree;

/// Parse `text` into a childless tree node with a synthetic path.
///
/// Panics on invalid input; fixtures are authored inline and a parse failure
/// is a bug in the fixture.
pub fn doc(id: &str, text: &str) -> StepTree {
    let doc = parse(id, text).unwrap_or_else(|err| panic!("fixture {id} failed to parse: {err}"));
    StepTree {
        doc,
        path: PathBuf::from(format!("/fixture/{id}.md")),
        children: Vec::new(),
    }
}

/// A leaf with a single task named `task`, checked or not.
pub fn leaf(id: &str, checked: bool) -> StepTree {
    let mark = if checked { "x" } else { " " };
    doc(id, &format!("# {id}\n\n- [{mark}] task\n"))
}

/// A node whose document has no tasks of its own, with the given children.
pub fn node_with_children(id: &str, children: Vec<StepTree>) -> StepTree {
    let mut node = doc(id, &format!("# {id}\n"));
    node.children = children;
    node
}

/// Attach pending markers to a fixture node.
pub fn with_markers(mut tree: StepTree, markers: &[&str]) -> StepTree {
    tree.doc
        .pending_markers
        .extend(markers.iter().map(|marker| (*marker).to_string()));
    tree
}

/// A temporary on-disk workspace with the canonical layout.
///
/// The backing directory is removed when the value drops.
pub struct TestWorkspace {
    temp: tempfile::TempDir,
    paths: WorkspacePaths,
}

impl TestWorkspace {
    pub fn new() -> Result<Self> {
        let temp = tempfile::tempdir().context("create temp workspace")?;
        let paths = WorkspacePaths::new(temp.path());
        for dir in [&paths.state_dir, &paths.steps_dir, &paths.expected_dir, &paths.scratchpad_dir]
        {
            fs::create_dir_all(dir).with_context(|| format!("create {}", dir.display()))?;
        }
        Ok(Self { temp, paths })
    }

    pub fn root(&self) -> &Path {
        self.temp.path()
    }

    pub fn paths(&self) -> &WorkspacePaths {
        &self.paths
    }

    pub fn step_path(&self, id: &str) -> PathBuf {
        self.paths.steps_dir.join(format!("{id}.md"))
    }

    /// Author a step document and keep the ledger unaware of it.
    pub fn write_step(&self, id: &str, text: &str) {
        fs::write(self.step_path(id), text).unwrap_or_else(|err| panic!("write {id}: {err}"));
    }

    /// Overwrite a step document directly, bypassing every guard. Used to
    /// simulate out-of-band edits.
    pub fn write_step_raw(&self, id: &str, text: &str) {
        self.write_step(id, text);
    }

    pub fn read_step(&self, id: &str) -> String {
        fs::read_to_string(self.step_path(id)).unwrap_or_else(|err| panic!("read {id}: {err}"))
    }

    /// Author an expected-outcome record under `expected/`.
    pub fn write_expected(&self, id: &str, json: &str) {
        fs::write(self.paths.expected_dir.join(format!("{id}.json")), json)
            .unwrap_or_else(|err| panic!("write expectation {id}: {err}"));
    }

    /// Mark a step as the current active document.
    pub fn activate(&self, id: &str) {
        set_current_step(&self.paths, &self.step_path(id))
            .unwrap_or_else(|err| panic!("activate {id}: {err}"));
    }
}
