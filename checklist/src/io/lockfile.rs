//! Push-lock and current-step artifacts.
//!
//! Two small files under `.checklist/state/` carry cross-invocation state:
//! the push-lock artifact (its existence means halted or blocked, its body
//! the reason) and the current-step artifact (its entire content is the
//! absolute path of the active document).
//!
//! A `Halted:` artifact is written by the explicit `halt` command and only a
//! human `resume` clears it. A `Locked:` artifact is derived from failed
//! verification or a blocked push and clears on the next successful verify.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Utc;
use tracing::debug;

use crate::io::paths::WorkspacePaths;

/// Parsed push-lock artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LockArtifact {
    /// Operator-initiated halt; freezes `next` and `push` until `resume`.
    Halted(String),
    /// Derived lock from a failed verification or blocked push.
    Locked(String),
}

impl LockArtifact {
    pub fn reason(&self) -> &str {
        match self {
            LockArtifact::Halted(reason) | LockArtifact::Locked(reason) => reason,
        }
    }
}

/// Mutation attempted outside the active document's scope.
///
/// The operation is refused before any write happens, independent of the
/// push-lock value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockViolationError {
    pub target: PathBuf,
    pub current: PathBuf,
}

impl fmt::Display for LockViolationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "access denied: {} is not the current active checklist (active: {})",
            self.target.display(),
            self.current.display()
        )
    }
}

impl std::error::Error for LockViolationError {}

/// Workspace is under an operator halt; `next` and `push` are frozen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HaltedError {
    pub reason: String,
}

impl fmt::Display for HaltedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "workspace is halted: {}", self.reason)
    }
}

impl std::error::Error for HaltedError {}

/// Fail with [`HaltedError`] if an operator halt is in effect.
pub fn ensure_not_halted(paths: &WorkspacePaths) -> Result<()> {
    if let Some(reason) = halt_reason(paths)? {
        return Err(HaltedError { reason }.into());
    }
    Ok(())
}

/// Record an operator halt. Immediate, always succeeds, no rollback of
/// previously verified steps.
pub fn halt(paths: &WorkspacePaths, reason: &str) -> Result<()> {
    write_artifact(paths, &format!("Halted: {reason}"))?;
    debug!(reason, "halted");
    Ok(())
}

/// Engage the derived push lock with a reason.
pub fn engage_lock(paths: &WorkspacePaths, reason: &str) -> Result<()> {
    // Never downgrade an operator halt to a derived lock.
    if matches!(read_artifact(paths)?, Some(LockArtifact::Halted(_))) {
        return Ok(());
    }
    write_artifact(paths, &format!("Locked: {reason}"))?;
    debug!(reason, "push lock engaged");
    Ok(())
}

/// Remove a derived lock. An operator halt is left in place; only
/// [`resume`] clears it.
pub fn release_lock(paths: &WorkspacePaths) -> Result<()> {
    if matches!(read_artifact(paths)?, Some(LockArtifact::Locked(_))) {
        fs::remove_file(&paths.push_lock_path)
            .with_context(|| format!("remove {}", paths.push_lock_path.display()))?;
        debug!("push lock released");
    }
    Ok(())
}

/// Clear any artifact, halt included. Human action.
pub fn resume(paths: &WorkspacePaths) -> Result<()> {
    if paths.push_lock_path.exists() {
        fs::remove_file(&paths.push_lock_path)
            .with_context(|| format!("remove {}", paths.push_lock_path.display()))?;
        debug!("resumed");
    }
    Ok(())
}

/// Recorded halt reason, if the workspace was explicitly halted.
pub fn halt_reason(paths: &WorkspacePaths) -> Result<Option<String>> {
    Ok(match read_artifact(paths)? {
        Some(LockArtifact::Halted(reason)) => Some(reason),
        _ => None,
    })
}

/// Parse the artifact, whichever kind is present.
pub fn read_artifact(paths: &WorkspacePaths) -> Result<Option<LockArtifact>> {
    if !paths.push_lock_path.exists() {
        return Ok(None);
    }
    let body = fs::read_to_string(&paths.push_lock_path)
        .with_context(|| format!("read {}", paths.push_lock_path.display()))?;
    let first = body.lines().next().unwrap_or("");
    if let Some(reason) = first.strip_prefix("Halted:") {
        return Ok(Some(LockArtifact::Halted(reason.trim().to_string())));
    }
    let reason = first.strip_prefix("Locked:").unwrap_or(first);
    Ok(Some(LockArtifact::Locked(reason.trim().to_string())))
}

fn write_artifact(paths: &WorkspacePaths, first_line: &str) -> Result<()> {
    let body = format!("{first_line}\nTimestamp: {}\n", Utc::now().to_rfc3339());
    fs::create_dir_all(&paths.state_dir)
        .with_context(|| format!("create {}", paths.state_dir.display()))?;
    fs::write(&paths.push_lock_path, body)
        .with_context(|| format!("write {}", paths.push_lock_path.display()))?;
    Ok(())
}

/// Set the current active step document (stored as an absolute path).
pub fn set_current_step(paths: &WorkspacePaths, step_path: &Path) -> Result<()> {
    let absolute = absolutize(step_path)?;
    fs::create_dir_all(&paths.state_dir)
        .with_context(|| format!("create {}", paths.state_dir.display()))?;
    fs::write(&paths.current_step_path, absolute.display().to_string())
        .with_context(|| format!("write {}", paths.current_step_path.display()))?;
    debug!(step = %absolute.display(), "current step set");
    Ok(())
}

/// The current active step document, if one has been set.
pub fn current_step(paths: &WorkspacePaths) -> Result<Option<PathBuf>> {
    if !paths.current_step_path.exists() {
        return Ok(None);
    }
    let body = fs::read_to_string(&paths.current_step_path)
        .with_context(|| format!("read {}", paths.current_step_path.display()))?;
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    Ok(Some(PathBuf::from(trimmed)))
}

/// Refuse any mutation whose target is not the current active document.
///
/// Scope restriction applies even when the push lock is disengaged.
pub fn assert_in_scope(paths: &WorkspacePaths, target: &Path) -> Result<()> {
    let current = current_step(paths)?
        .ok_or_else(|| anyhow::anyhow!("no current step defined (run `checklist next` first)"))?;
    let target_abs = absolutize(target)?;
    if target_abs != current {
        return Err(LockViolationError {
            target: target_abs,
            current,
        }
        .into());
    }
    Ok(())
}

// Canonicalize when the target exists so symlinked parents (a symlinked
// /tmp, for instance) compare equal.
fn absolutize(path: &Path) -> Result<PathBuf> {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        let cwd = std::env::current_dir().context("resolve current directory")?;
        cwd.join(path)
    };
    if absolute.exists() {
        return absolute
            .canonicalize()
            .with_context(|| format!("resolve {}", absolute.display()));
    }
    Ok(absolute)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn workspace() -> (tempfile::TempDir, WorkspacePaths) {
        let temp = tempfile::tempdir().expect("tempdir");
        let paths = WorkspacePaths::new(temp.path());
        (temp, paths)
    }

    #[test]
    fn halt_then_read_reason_round_trips() {
        let (_temp, paths) = workspace();
        halt(&paths, "uncertain logic in step 3").expect("halt");
        let reason = halt_reason(&paths).expect("read").expect("present");
        assert_eq!(reason, "uncertain logic in step 3");
    }

    #[test]
    fn derived_lock_is_not_a_halt() {
        let (_temp, paths) = workspace();
        engage_lock(&paths, "checklist incomplete").expect("engage");
        assert_eq!(halt_reason(&paths).expect("read"), None);
        assert_eq!(
            read_artifact(&paths).expect("read"),
            Some(LockArtifact::Locked("checklist incomplete".to_string()))
        );
    }

    #[test]
    fn release_clears_derived_lock_but_not_halt() {
        let (_temp, paths) = workspace();
        engage_lock(&paths, "blocked").expect("engage");
        release_lock(&paths).expect("release");
        assert_eq!(read_artifact(&paths).expect("read"), None);

        halt(&paths, "manual stop").expect("halt");
        release_lock(&paths).expect("release");
        assert!(matches!(
            read_artifact(&paths).expect("read"),
            Some(LockArtifact::Halted(_))
        ));
        resume(&paths).expect("resume");
        assert_eq!(read_artifact(&paths).expect("read"), None);
    }

    #[test]
    fn engage_never_downgrades_a_halt() {
        let (_temp, paths) = workspace();
        halt(&paths, "manual stop").expect("halt");
        engage_lock(&paths, "derived").expect("engage");
        assert_eq!(
            halt_reason(&paths).expect("read"),
            Some("manual stop".to_string())
        );
    }

    #[test]
    fn current_step_artifact_holds_absolute_path() {
        let (temp, paths) = workspace();
        let step = temp.path().join("steps/STEP_01.md");
        set_current_step(&paths, &step).expect("set");
        let stored = current_step(&paths).expect("read").expect("present");
        assert!(stored.is_absolute());
        assert_eq!(stored, step);
    }

    #[test]
    fn out_of_scope_target_is_a_lock_violation() {
        let (temp, paths) = workspace();
        let active = temp.path().join("steps/STEP_01.md");
        set_current_step(&paths, &active).expect("set");

        let other = temp.path().join("steps/STEP_02.md");
        let err = assert_in_scope(&paths, &other).expect_err("must refuse");
        let violation = err
            .downcast_ref::<LockViolationError>()
            .expect("lock violation");
        assert_eq!(violation.current, active);
    }

    #[test]
    fn in_scope_target_is_allowed() {
        let (temp, paths) = workspace();
        let active = temp.path().join("steps/STEP_01.md");
        set_current_step(&paths, &active).expect("set");
        assert_in_scope(&paths, &active).expect("in scope");
    }

    #[test]
    fn missing_current_step_is_an_error_for_scope_checks() {
        let (temp, paths) = workspace();
        let target = temp.path().join("steps/STEP_01.md");
        assert!(assert_in_scope(&paths, &target).is_err());
    }
}
