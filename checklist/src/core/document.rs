//! Checklist document model: parse plain text into a structured node.
//!
//! Parsing is pure (no I/O) and tolerant of free-form prose: unrecognized
//! lines are preserved as opaque content and do not affect status
//! computation. Documents are re-parsed from text on every read, so there is
//! no cached in-memory tree to go stale.

use std::fmt;

/// Literal sentinel meaning "unresolved question, do not proceed".
pub const PENDING_PREFIX: &str = "PENDING:";
/// Glyph sentinel with the same meaning, kept for hand-authored documents.
pub const QUESTION_GLYPH: &str = "\u{2753}";

/// A single checkbox item (`- [ ]` / `- [x]`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Task {
    pub text: String,
    pub checked: bool,
    /// Index into [`ChecklistNode::lines`] for round-trip serialization.
    pub line: usize,
}

/// Reference to a child checklist document declared via a markdown link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChildRef {
    /// Link label, used as the child id when resolving the tree.
    pub label: String,
    /// Link target relative to the owning document.
    pub target: String,
}

/// Parsed checklist document. Status is never stored here: it is always
/// recomputed from `tasks`, resolved children, and `pending_markers`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChecklistNode {
    /// Stable identifier (file stem or declared title).
    pub id: String,
    /// First heading in the document, or the id when no heading exists.
    pub title: String,
    /// Declared `**Parent:**` field, if any.
    pub parent: Option<String>,
    /// Checkbox items in document order.
    pub tasks: Vec<Task>,
    /// Child document references in document order.
    pub children: Vec<ChildRef>,
    /// Unresolved question / pending annotations found in the body.
    pub pending_markers: Vec<String>,
    /// Raw document lines, preserved verbatim for round-trip output.
    pub lines: Vec<String>,
}

/// Malformed document structure (bad checkbox token, unresolved reference).
///
/// Reported and aborts the operation; never silently skipped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StructuralError {
    pub id: String,
    pub line: usize,
    pub detail: String,
}

impl fmt::Display for StructuralError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "structural error in '{}' (line {}): {}",
            self.id, self.line, self.detail
        )
    }
}

impl std::error::Error for StructuralError {}

/// Parse a checklist document's text into a [`ChecklistNode`].
///
/// Extracts the title (first `#` heading), the declared parent field,
/// checkbox items with their checked state, child document links, and
/// pending markers (matched case-sensitively, at line start or inline).
pub fn parse(id: &str, text: &str) -> Result<ChecklistNode, StructuralError> {
    let lines: Vec<String> = text.lines().map(str::to_string).collect();
    let mut title = None;
    let mut parent = None;
    let mut tasks = Vec::new();
    let mut children = Vec::new();
    let mut pending_markers = Vec::new();

    for (index, line) in lines.iter().enumerate() {
        let trimmed = line.trim_start();

        if title.is_none()
            && let Some(heading) = trimmed.strip_prefix("# ")
        {
            title = Some(heading.trim().to_string());
        }

        if parent.is_none()
            && let Some(rest) = trimmed.strip_prefix("**Parent:**")
        {
            let value = rest.trim().trim_matches('`').trim();
            if !value.is_empty() {
                parent = Some(value.to_string());
            }
        }

        // Markers are scanned on every line, checkbox and link lines
        // included: an inline question on a checked task still blocks.
        if let Some(marker) = pending_marker(trimmed) {
            pending_markers.push(marker);
        }

        if trimmed.starts_with("- [") {
            let (checked, rest) = parse_checkbox(id, index, trimmed)?;
            if let Some(child) = parse_child_link(rest) {
                // A checked box on a child link is presentation only; child
                // completion is derived from the child's own document.
                children.push(child);
            } else {
                tasks.push(Task {
                    text: rest.trim().to_string(),
                    checked,
                    line: index,
                });
            }
            continue;
        }

        if let Some(child) = parse_child_link(trimmed) {
            children.push(child);
        }
    }

    Ok(ChecklistNode {
        id: id.to_string(),
        title: title.unwrap_or_else(|| id.to_string()),
        parent,
        tasks,
        children,
        pending_markers,
        lines,
    })
}

impl ChecklistNode {
    /// Re-serialize the document, reproducing every line verbatim except
    /// checkbox lines, which are rendered from current task state.
    pub fn to_text(&self) -> String {
        let mut out = String::new();
        for (index, line) in self.lines.iter().enumerate() {
            if let Some(task) = self.tasks.iter().find(|task| task.line == index) {
                let indent = &line[..line.len() - line.trim_start().len()];
                let mark = if task.checked { 'x' } else { ' ' };
                out.push_str(&format!("{indent}- [{mark}] {}", task.text));
            } else {
                out.push_str(line);
            }
            out.push('\n');
        }
        out
    }

    /// True when every checkbox item in this document is checked.
    pub fn all_tasks_checked(&self) -> bool {
        self.tasks.iter().all(|task| task.checked)
    }
}

/// Parse a `- [X] rest` token. Fails on an unterminated or malformed box.
fn parse_checkbox<'a>(
    id: &str,
    line: usize,
    trimmed: &'a str,
) -> Result<(bool, &'a str), StructuralError> {
    let body = &trimmed[3..];
    let malformed = |detail: String| StructuralError {
        id: id.to_string(),
        line: line + 1,
        detail,
    };

    let mut chars = body.chars();
    let state = chars
        .next()
        .ok_or_else(|| malformed("unterminated checkbox token '- ['".to_string()))?;
    let close = chars.next();
    if close != Some(']') {
        return Err(malformed(format!(
            "unterminated checkbox token in '{}'",
            trimmed
        )));
    }
    let checked = match state {
        ' ' => false,
        'x' => true,
        other => {
            return Err(malformed(format!(
                "invalid checkbox state '{other}' (expected ' ' or 'x')"
            )));
        }
    };
    Ok((checked, chars.as_str()))
}

/// Recognize a markdown link to another checklist document (`.md` target).
fn parse_child_link(text: &str) -> Option<ChildRef> {
    let open = text.find('[')?;
    let close = text[open..].find("](").map(|offset| open + offset)?;
    let end = text[close..].find(')').map(|offset| close + offset)?;
    let label = text[open + 1..close].trim();
    let target = text[close + 2..end].trim();
    if label.is_empty() || !target.ends_with(".md") {
        return None;
    }
    Some(ChildRef {
        label: label.to_string(),
        target: target.to_string(),
    })
}

/// Extract a pending marker from a line, if one is present.
fn pending_marker(trimmed: &str) -> Option<String> {
    if let Some(position) = trimmed.find(PENDING_PREFIX) {
        let text = trimmed[position + PENDING_PREFIX.len()..].trim();
        return Some(if text.is_empty() {
            PENDING_PREFIX.trim_end_matches(':').to_string()
        } else {
            text.to_string()
        });
    }
    if let Some(position) = trimmed.find(QUESTION_GLYPH) {
        let text = trimmed[position + QUESTION_GLYPH.len()..].trim();
        return Some(if text.is_empty() {
            "unresolved question".to_string()
        } else {
            text.to_string()
        });
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOC: &str = "\
# STEP 01: Pick a stack
**Parent:** `ROOT.md`

## Checklist
- [x] List candidate stacks
- [ ] Select one

## Substeps
- [ ] [STEP_01A](./STEP_01A.md)

## Notes
Free-form prose is preserved but ignored.
PENDING: confirm team expertise
";

    #[test]
    fn parses_title_parent_tasks_and_markers() {
        let node = parse("STEP_01", DOC).expect("parse");
        assert_eq!(node.title, "STEP 01: Pick a stack");
        assert_eq!(node.parent.as_deref(), Some("ROOT.md"));
        assert_eq!(node.tasks.len(), 2);
        assert!(node.tasks[0].checked);
        assert!(!node.tasks[1].checked);
        assert_eq!(node.tasks[1].text, "Select one");
        assert_eq!(
            node.pending_markers,
            vec!["confirm team expertise".to_string()]
        );
    }

    #[test]
    fn checkbox_child_link_is_a_child_not_a_task() {
        let node = parse("STEP_01", DOC).expect("parse");
        assert_eq!(node.children.len(), 1);
        assert_eq!(node.children[0].label, "STEP_01A");
        assert_eq!(node.children[0].target, "./STEP_01A.md");
        assert!(!node.tasks.iter().any(|task| task.text.contains("STEP_01A")));
    }

    #[test]
    fn round_trip_preserves_checkbox_pattern() {
        let node = parse("STEP_01", DOC).expect("parse");
        let rendered = node.to_text();
        let reparsed = parse("STEP_01", &rendered).expect("reparse");
        let pattern: Vec<bool> = node.tasks.iter().map(|task| task.checked).collect();
        let reparsed_pattern: Vec<bool> =
            reparsed.tasks.iter().map(|task| task.checked).collect();
        assert_eq!(pattern, reparsed_pattern);
        assert_eq!(rendered, reparsed.to_text());
    }

    #[test]
    fn unterminated_checkbox_is_a_structural_error() {
        let err = parse("BAD", "- [ unterminated\n").expect_err("must fail");
        assert_eq!(err.line, 1);
        assert!(err.detail.contains("unterminated"));
    }

    #[test]
    fn invalid_checkbox_state_is_a_structural_error() {
        let err = parse("BAD", "- [y] wrong glyph\n").expect_err("must fail");
        assert!(err.detail.contains("invalid checkbox state"));
    }

    #[test]
    fn marker_on_a_checked_task_line_is_still_detected() {
        let node = parse("S", "# S\n\n- [x] done \u{2753} really?\n").expect("parse");
        assert_eq!(node.tasks.len(), 1);
        assert!(node.tasks[0].checked);
        assert_eq!(node.pending_markers, vec!["really?".to_string()]);
    }

    #[test]
    fn pending_prefix_on_a_task_line_is_still_detected() {
        let node = parse("S", "- [ ] PENDING: confirm the schema\n").expect("parse");
        assert_eq!(
            node.pending_markers,
            vec!["confirm the schema".to_string()]
        );
    }

    #[test]
    fn glyph_marker_is_recognized_inline() {
        let node = parse("S", "notes \u{2753} is this right\n").expect("parse");
        assert_eq!(node.pending_markers, vec!["is this right".to_string()]);
    }

    #[test]
    fn prose_only_document_has_no_tasks() {
        let node = parse("S", "# Title\n\nJust prose here.\n").expect("parse");
        assert!(node.tasks.is_empty());
        assert!(node.children.is_empty());
        assert!(node.pending_markers.is_empty());
        assert!(node.all_tasks_checked());
    }
}
