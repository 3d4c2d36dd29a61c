//! Per-merge working state.
//!
//! A `MergeContext` is built once per file merge and lives for the
//! pipeline's duration. It owns the four trees; everything else refers to
//! nodes by arena index, so handlers can mutate the superimposed tree
//! without fighting the borrow checker over parent back-references.

use crate::config::MergeConfig;
use crate::stats::MergeStats;
use crate::tree::{NodeId, Tree};

/// Which contribution a classification refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Side {
    Left,
    Right,
}

impl Side {
    pub fn opposite(self) -> Side {
        match self {
            Side::Left => Side::Right,
            Side::Right => Side::Left,
        }
    }
}

/// Shared state threaded through superimposition and the handlers.
#[derive(Debug)]
pub struct MergeContext {
    pub config: MergeConfig,

    pub left_tree: Tree,
    pub base_tree: Tree,
    pub right_tree: Tree,
    /// Output of tree superimposition; handlers edit this in place.
    pub super_tree: Tree,

    /// Terminals (ids into `super_tree`) present in the left contribution
    /// but not in base, in traversal order.
    pub added_left: Vec<NodeId>,
    /// Same for the right contribution.
    pub added_right: Vec<NodeId>,

    /// Base terminals (ids into `base_tree`) absent from one contribution
    /// with an equal-bodied counterpart among that side's added nodes.
    pub renamed_without_body_changes: Vec<(Side, NodeId)>,
    /// Base terminals absent from one contribution with no equal-bodied
    /// counterpart: deletions or renames that also edited the body.
    pub deleted_or_renamed_with_body_changes: Vec<(Side, NodeId)>,

    /// Line-based merge of the raw files, always computed up front.
    /// Consulted by the unstructured renaming strategy and diagnostics.
    pub unstructured_output: String,
    pub unstructured_has_conflict: bool,

    /// Final serialized output of the pipeline.
    pub output: String,
    pub has_conflict: bool,
    /// Set when the structured path failed and `output` is the
    /// unstructured result.
    pub structured_fallback: bool,

    pub stats: MergeStats,
}

impl MergeContext {
    pub fn new(config: MergeConfig) -> Self {
        Self {
            config,
            left_tree: Tree::new(),
            base_tree: Tree::new(),
            right_tree: Tree::new(),
            super_tree: Tree::new(),
            added_left: Vec::new(),
            added_right: Vec::new(),
            renamed_without_body_changes: Vec::new(),
            deleted_or_renamed_with_body_changes: Vec::new(),
            unstructured_output: String::new(),
            unstructured_has_conflict: false,
            output: String::new(),
            has_conflict: false,
            structured_fallback: false,
            stats: MergeStats::default(),
        }
    }

    /// The contribution tree for a side.
    pub fn contribution_tree(&self, side: Side) -> &Tree {
        match side {
            Side::Left => &self.left_tree,
            Side::Right => &self.right_tree,
        }
    }

    /// The added-node set for a side (ids into `super_tree`).
    pub fn added_nodes(&self, side: Side) -> &[NodeId] {
        match side {
            Side::Left => &self.added_left,
            Side::Right => &self.added_right,
        }
    }
}
