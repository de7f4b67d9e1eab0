//! Document store: reads checklist documents and resolves the step tree.
//!
//! Documents are re-parsed from disk on every read; there is no persistent
//! in-memory tree across operations, so tampering between reads is always
//! caught by the ledger. Writes go through the scope guard.

use std::collections::HashSet;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};

use crate::core::document::{ChecklistNode, StructuralError, parse};
use crate::io::lockfile::assert_in_scope;
use crate::io::paths::WorkspacePaths;
use crate::tree::StepTree;

/// Read and parse one checklist document. The id is the file stem.
pub fn read_document(path: &Path) -> Result<ChecklistNode> {
    let text =
        fs::read_to_string(path).with_context(|| format!("read document {}", path.display()))?;
    let id = path
        .file_stem()
        .map(|stem| stem.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string());
    let node = parse(&id, &text)?;
    Ok(node)
}

/// Resolve the full step tree starting from the root document.
///
/// Child references are resolved relative to their owning document. A
/// declared reference that does not resolve to an existing document is a
/// [`StructuralError`], reported rather than silently skipped. Reference
/// cycles are also structural errors.
pub fn resolve_tree(root_doc_path: &Path) -> Result<StepTree> {
    let mut seen = HashSet::new();
    resolve_node(root_doc_path, &mut seen)
}

fn resolve_node(doc_path: &Path, seen: &mut HashSet<std::path::PathBuf>) -> Result<StepTree> {
    let canonical = doc_path
        .canonicalize()
        .with_context(|| format!("resolve document path {}", doc_path.display()))?;
    let doc = read_document(&canonical)?;

    if !seen.insert(canonical.clone()) {
        return Err(StructuralError {
            id: doc.id.clone(),
            line: 0,
            detail: format!("reference cycle through {}", canonical.display()),
        }
        .into());
    }

    let base = canonical
        .parent()
        .with_context(|| format!("document has no parent dir {}", canonical.display()))?
        .to_path_buf();

    let mut children = Vec::new();
    for child_ref in &doc.children {
        let child_path = base.join(&child_ref.target);
        if !child_path.exists() {
            return Err(StructuralError {
                id: doc.id.clone(),
                line: 0,
                detail: format!(
                    "child reference '{}' does not resolve to an existing document ({})",
                    child_ref.label,
                    child_path.display()
                ),
            }
            .into());
        }
        children.push(resolve_node(&child_path, seen)?);
    }

    Ok(StepTree {
        doc,
        path: canonical,
        children,
    })
}

/// Write a document, enforcing the write-scope restriction first.
///
/// Fails with `LockViolationError` before the write is attempted when
/// `target` is not the current active document.
pub fn write_document_in_scope(
    paths: &WorkspacePaths,
    target: &Path,
    contents: &str,
) -> Result<()> {
    assert_in_scope(paths, target)?;
    fs::write(target, contents).with_context(|| format!("write document {}", target.display()))?;
    Ok(())
}
