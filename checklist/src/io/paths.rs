//! Canonical workspace layout and `init` scaffolding.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

/// All canonical paths within a checklist workspace root.
#[derive(Debug, Clone)]
pub struct WorkspacePaths {
    pub root: PathBuf,
    pub state_dir: PathBuf,
    pub steps_dir: PathBuf,
    pub expected_dir: PathBuf,
    pub scratchpad_dir: PathBuf,
    pub root_doc_path: PathBuf,
    pub ledger_path: PathBuf,
    pub push_lock_path: PathBuf,
    pub current_step_path: PathBuf,
    pub config_path: PathBuf,
    pub validation_state_path: PathBuf,
    pub command_log_path: PathBuf,
    pub thoughts_path: PathBuf,
    pub inconsistencies_path: PathBuf,
}

impl WorkspacePaths {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let state_dir = root.join(".checklist").join("state");
        let steps_dir = root.join("steps");
        let scratchpad_dir = root.join("scratchpad");
        Self {
            root: root.clone(),
            state_dir: state_dir.clone(),
            steps_dir: steps_dir.clone(),
            expected_dir: root.join("expected"),
            scratchpad_dir: scratchpad_dir.clone(),
            root_doc_path: steps_dir.join("ROOT.md"),
            ledger_path: state_dir.join("hash_ledger"),
            push_lock_path: state_dir.join("push_lock"),
            current_step_path: state_dir.join("current_step"),
            config_path: state_dir.join("config.toml"),
            validation_state_path: state_dir.join("validation_state.json"),
            command_log_path: state_dir.join("command_log.txt"),
            thoughts_path: scratchpad_dir.join("model_thoughts_todo.md"),
            inconsistencies_path: scratchpad_dir.join("inconsistencies_pending.md"),
        }
    }
}

const ROOT_TEMPLATE: &str = "\
# ROOT: Task plan

## Required Execution Tree
- [ ] [STEP_01](./STEP_01.md)

## Notes
Author one step document per node and link children from their parent.
";

const THOUGHTS_TEMPLATE: &str = "\
# Model Thoughts and TODOs

## Pending Questions

## Resolved Items
";

const INCONSISTENCIES_TEMPLATE: &str = "\
# Inconsistencies and Pending Issues

## Unresolved Inconsistencies

## Resolved Inconsistencies
";

const STEP_TEMPLATE: &str = "\
# STEP 01: Describe the first step
**Parent:** `ROOT.md`

## Checklist
- [ ] Analyze the issue
- [ ] Identify potential solutions
- [ ] Select the best approach
";

/// Options for [`init_workspace`].
#[derive(Debug, Clone)]
pub struct InitOptions {
    /// If true, overwrite existing workspace-owned files.
    pub force: bool,
}

/// Create workspace directories and seed documents.
///
/// Existing files are left alone unless `force` is set; the hash ledger and
/// command log start empty.
pub fn init_workspace(paths: &WorkspacePaths, options: &InitOptions) -> Result<()> {
    for dir in [
        &paths.state_dir,
        &paths.steps_dir,
        &paths.expected_dir,
        &paths.scratchpad_dir,
    ] {
        fs::create_dir_all(dir).with_context(|| format!("create {}", dir.display()))?;
    }

    write_if_missing_or_force(&paths.root_doc_path, ROOT_TEMPLATE, options.force)?;
    write_if_missing_or_force(&paths.steps_dir.join("STEP_01.md"), STEP_TEMPLATE, options.force)?;
    write_if_missing_or_force(&paths.thoughts_path, THOUGHTS_TEMPLATE, options.force)?;
    write_if_missing_or_force(
        &paths.inconsistencies_path,
        INCONSISTENCIES_TEMPLATE,
        options.force,
    )?;
    write_if_missing_or_force(&paths.ledger_path, "", options.force)?;
    write_if_missing_or_force(&paths.command_log_path, "", options.force)?;
    Ok(())
}

fn write_if_missing_or_force(path: &Path, contents: &str, force: bool) -> Result<()> {
    if !force && path.exists() {
        return Ok(());
    }
    fs::write(path, contents).with_context(|| format!("write {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_creates_layout_and_seed_documents() {
        let temp = tempfile::tempdir().expect("tempdir");
        let paths = WorkspacePaths::new(temp.path());

        init_workspace(&paths, &InitOptions { force: false }).expect("init");

        assert!(paths.root_doc_path.is_file());
        assert!(paths.thoughts_path.is_file());
        assert!(paths.inconsistencies_path.is_file());
        assert!(paths.ledger_path.is_file());
        assert!(paths.expected_dir.is_dir());
    }

    #[test]
    fn init_preserves_existing_files_without_force() {
        let temp = tempfile::tempdir().expect("tempdir");
        let paths = WorkspacePaths::new(temp.path());
        init_workspace(&paths, &InitOptions { force: false }).expect("init");

        fs::write(&paths.root_doc_path, "# Customized\n").expect("write");
        init_workspace(&paths, &InitOptions { force: false }).expect("re-init");
        let contents = fs::read_to_string(&paths.root_doc_path).expect("read");
        assert_eq!(contents, "# Customized\n");

        init_workspace(&paths, &InitOptions { force: true }).expect("force init");
        let contents = fs::read_to_string(&paths.root_doc_path).expect("read");
        assert!(contents.starts_with("# ROOT"));
    }
}
