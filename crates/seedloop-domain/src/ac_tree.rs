//! Acceptance Criterion (AC) tree.
//!
//! Owned by the executor for a single generation (spec §3's ownership note).
//! Depth is monotonic down from the root; no node's text may equal an
//! ancestor's (cycle detection, spec §4.5 — "not infinite descent").

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::errors::DomainError;
use crate::ids::AcNodeId;

pub const MAX_AC_DEPTH: u8 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AcStatus {
    Pending,
    Running,
    Done,
    Failed,
    Skipped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Atomicity {
    Atomic,
    NonAtomic,
    Unknown,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AcNode {
    pub id: AcNodeId,
    pub parent_id: Option<AcNodeId>,
    pub depth: u8,
    pub text: String,
    pub status: AcStatus,
    pub atomicity: Atomicity,
}

impl AcNode {
    pub fn root(text: impl Into<String>) -> Self {
        Self {
            id: AcNodeId::new(),
            parent_id: None,
            depth: 0,
            text: text.into(),
            status: AcStatus::Pending,
            atomicity: Atomicity::Unknown,
        }
    }
}

/// Status transitions are one-way until a retrospective rolls the tree back
/// (spec §3). `set_status` enforces that a terminal status is never silently
/// overwritten by a non-retrospective caller.
fn is_terminal(status: AcStatus) -> bool {
    matches!(status, AcStatus::Done | AcStatus::Failed | AcStatus::Skipped)
}

#[derive(Debug, Default)]
pub struct AcTree {
    nodes: HashMap<AcNodeId, AcNode>,
    roots: Vec<AcNodeId>,
}

impl AcTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_root(&mut self, node: AcNode) -> AcNodeId {
        let id = node.id.clone();
        self.roots.push(id.clone());
        self.nodes.insert(id.clone(), node);
        id
    }

    /// Inserts a child, enforcing depth-monotonicity, the depth ceiling, and
    /// the no-repeated-text cycle rule.
    pub fn insert_child(&mut self, parent_id: &AcNodeId, mut child: AcNode) -> Result<AcNodeId, DomainError> {
        let parent = self
            .nodes
            .get(parent_id)
            .ok_or_else(|| DomainError::MissingReference {
                ref_kind: format!("ac_node:{parent_id}"),
            })?
            .clone();

        if parent.text == child.text {
            return Err(DomainError::DecompositionError {
                reason: format!("child text repeats parent text at node {parent_id}"),
            });
        }
        let mut ancestor = parent.parent_id.clone();
        while let Some(ancestor_id) = ancestor {
            let node = self.nodes.get(&ancestor_id).ok_or_else(|| DomainError::MissingReference {
                ref_kind: format!("ac_node:{ancestor_id}"),
            })?;
            if node.text == child.text {
                return Err(DomainError::DecompositionError {
                    reason: format!("child text repeats ancestor text at node {ancestor_id}"),
                });
            }
            ancestor = node.parent_id.clone();
        }

        let child_depth = parent.depth + 1;
        if child_depth > MAX_AC_DEPTH {
            return Err(DomainError::DecompositionError {
                reason: format!("max AC depth {MAX_AC_DEPTH} exceeded"),
            });
        }

        child.depth = child_depth;
        child.parent_id = Some(parent_id.clone());
        let id = child.id.clone();
        self.nodes.insert(id.clone(), child);
        Ok(id)
    }

    pub fn node(&self, id: &AcNodeId) -> Option<&AcNode> {
        self.nodes.get(id)
    }

    pub fn roots(&self) -> &[AcNodeId] {
        &self.roots
    }

    pub fn children_of(&self, parent_id: &AcNodeId) -> Vec<&AcNode> {
        self.nodes
            .values()
            .filter(|n| n.parent_id.as_ref() == Some(parent_id))
            .collect()
    }

    /// Transitions a node's status, refusing to overwrite a terminal status
    /// unless `force` (set only by a retrospective rollback).
    pub fn set_status(&mut self, id: &AcNodeId, status: AcStatus, force: bool) -> Result<(), DomainError> {
        let node = self.nodes.get_mut(id).ok_or_else(|| DomainError::MissingReference {
            ref_kind: format!("ac_node:{id}"),
        })?;
        if is_terminal(node.status) && !force {
            return Err(DomainError::InvalidTransition {
                current_state: format!("{:?}", node.status),
                attempted_transition: format!("{:?}", status),
            });
        }
        node.status = status;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn depth_is_monotonic() {
        let mut tree = AcTree::new();
        let root = tree.insert_root(AcNode::root("build the thing"));
        let child = tree
            .insert_child(&root, AcNode::root("build the frontend"))
            .unwrap();
        assert_eq!(tree.node(&child).unwrap().depth, 1);
    }

    #[test]
    fn repeated_text_is_rejected_as_cycle() {
        let mut tree = AcTree::new();
        let root = tree.insert_root(AcNode::root("ship it"));
        let err = tree.insert_child(&root, AcNode::root("ship it")).unwrap_err();
        assert!(matches!(err, DomainError::DecompositionError { .. }));
    }

    #[test]
    fn depth_ceiling_is_enforced() {
        let mut tree = AcTree::new();
        let mut current = tree.insert_root(AcNode::root("level0"));
        for level in 1..=MAX_AC_DEPTH {
            current = tree
                .insert_child(&current, AcNode::root(format!("level{level}")))
                .unwrap();
        }
        let err = tree
            .insert_child(&current, AcNode::root("level_too_deep"))
            .unwrap_err();
        assert!(matches!(err, DomainError::DecompositionError { .. }));
    }

    #[test]
    fn terminal_status_is_not_overwritten_without_force() {
        let mut tree = AcTree::new();
        let root = tree.insert_root(AcNode::root("do a thing"));
        tree.set_status(&root, AcStatus::Done, false).unwrap();
        let err = tree.set_status(&root, AcStatus::Running, false).unwrap_err();
        assert!(matches!(err, DomainError::InvalidTransition { .. }));
        tree.set_status(&root, AcStatus::Pending, true).unwrap();
        assert_eq!(tree.node(&root).unwrap().status, AcStatus::Pending);
    }
}
