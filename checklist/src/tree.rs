//! Resolved checklist tree.
//!
//! The document store materializes a [`StepTree`] from cross-document links
//! before any status or lock computation runs. Core logic only ever consumes
//! an already-resolved tree.

use std::path::PathBuf;

use crate::core::document::ChecklistNode;

/// A checklist document resolved into its position in the task tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepTree {
    pub doc: ChecklistNode,
    /// Absolute path of the backing document.
    pub path: PathBuf,
    /// Children in document order (insertion order = link order).
    pub children: Vec<StepTree>,
}

impl StepTree {
    /// Depth-first search by node id.
    pub fn find(&self, id: &str) -> Option<&StepTree> {
        if self.doc.id == id {
            return Some(self);
        }
        self.children.iter().find_map(|child| child.find(id))
    }

    /// Slash-joined id path from this node to `id`, e.g. `root/step_02`.
    pub fn id_path(&self, id: &str) -> Option<String> {
        if self.doc.id == id {
            return Some(self.doc.id.clone());
        }
        for child in &self.children {
            if let Some(rest) = child.id_path(id) {
                return Some(format!("{}/{}", self.doc.id, rest));
            }
        }
        None
    }

    /// All nodes in depth-first document order (self first).
    pub fn iter(&self) -> impl Iterator<Item = &StepTree> {
        let mut stack = vec![self];
        std::iter::from_fn(move || {
            let node = stack.pop()?;
            for child in node.children.iter().rev() {
                stack.push(child);
            }
            Some(node)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{leaf, node_with_children};

    #[test]
    fn find_locates_nested_node() {
        let tree = node_with_children(
            "root",
            vec![leaf("a", true), node_with_children("b", vec![leaf("b1", false)])],
        );
        assert_eq!(tree.find("b1").expect("found").doc.id, "b1");
        assert!(tree.find("missing").is_none());
    }

    #[test]
    fn id_path_joins_with_slashes() {
        let tree = node_with_children("root", vec![node_with_children("b", vec![leaf("b1", false)])]);
        assert_eq!(tree.id_path("b1").as_deref(), Some("root/b/b1"));
    }

    #[test]
    fn iter_walks_depth_first_in_document_order() {
        let tree = node_with_children(
            "root",
            vec![node_with_children("a", vec![leaf("a1", false)]), leaf("b", false)],
        );
        let ids: Vec<&str> = tree.iter().map(|node| node.doc.id.as_str()).collect();
        assert_eq!(ids, vec!["root", "a", "a1", "b"]);
    }
}
