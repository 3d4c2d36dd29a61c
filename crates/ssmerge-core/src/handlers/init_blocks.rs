//! Initialization block handler.
//!
//! Initializer blocks have no identifier, so superimposition can only
//! match them when their content is untouched. An edited block therefore
//! shows up as a deletion plus an addition, duplicating the block in the
//! output. This handler re-matches blocks across the three trees by
//! textual similarity and repairs the superimposed tree: matched triples
//! are merged into a single block, unmatched contribution blocks stay as
//! independent additions.

use std::collections::HashSet;

use crate::config::SIMILARITY_THRESHOLD;
use crate::context::MergeContext;
use crate::diff3::{self, TextualMergeError};
use crate::handlers::{replace_node_text, ConflictHandler};
use crate::similarity::body_similarity;
use crate::tree::{NodeId, TerminalKind, Tree};

pub struct InitializationBlocksHandler;

impl ConflictHandler for InitializationBlocksHandler {
    fn name(&self) -> &'static str {
        "initialization-blocks"
    }

    fn handle(&self, context: &mut MergeContext) -> Result<(), TextualMergeError> {
        let ignore_ws = context.config.ignore_whitespace_change;
        let base_blocks = blocks_of(&context.base_tree);
        let mut used_left: HashSet<NodeId> = HashSet::new();
        let mut used_right: HashSet<NodeId> = HashSet::new();

        for base_id in base_blocks {
            let left_match = find_block(&context.left_tree, &context.base_tree, base_id, &used_left);
            let right_match =
                find_block(&context.right_tree, &context.base_tree, base_id, &used_right);
            if let Some((id, _)) = left_match {
                used_left.insert(id);
            }
            if let Some((id, _)) = right_match {
                used_right.insert(id);
            }

            // Untouched on both sides: superimposition already matched it.
            if matches!(left_match, Some((_, true))) && matches!(right_match, Some((_, true))) {
                continue;
            }

            let base_src = context.base_tree.node(base_id).source();
            let left_src = left_match
                .map(|(id, _)| context.left_tree.node(id).source())
                .unwrap_or_default();
            let right_src = right_match
                .map(|(id, _)| context.right_tree.node(id).source())
                .unwrap_or_default();

            let merged = diff3::merge(&left_src, &base_src, &right_src, ignore_ws)?;

            // Collect every copy of this block in the superimposed tree.
            let mut copies: Vec<NodeId> = Vec::new();
            if let Some((id, _)) = left_match {
                if let Some(c) = context
                    .super_tree
                    .retrieve_correspondent(context.left_tree.node(id))
                {
                    copies.push(c);
                }
            }
            if let Some((id, _)) = right_match {
                if let Some(c) = context
                    .super_tree
                    .retrieve_correspondent(context.right_tree.node(id))
                {
                    copies.push(c);
                }
            }
            if let Some(c) = context
                .super_tree
                .retrieve_correspondent(context.base_tree.node(base_id))
            {
                copies.push(c);
            }
            copies.dedup();

            if merged.text.trim().is_empty() {
                for copy in copies {
                    context.super_tree.remove(copy);
                }
            } else {
                let Some((host, rest)) = copies.split_first() else {
                    continue;
                };
                for &copy in rest {
                    if copy != *host {
                        context.super_tree.remove(copy);
                    }
                }
                replace_node_text(&mut context.super_tree, *host, merged.text);
            }

            if merged.has_conflict {
                context.stats.initialization_block_conflicts += 1;
            } else {
                context.stats.initialization_block_merges += 1;
            }
        }
        Ok(())
    }
}

fn blocks_of(tree: &Tree) -> Vec<NodeId> {
    tree.collect_terminals()
        .into_iter()
        .filter(|&id| tree.node(id).terminal_kind() == Some(TerminalKind::InitializerBlock))
        .collect()
}

/// Match a base block inside a contribution: first an untouched copy
/// (identical normalized content), then the first block similar above the
/// threshold. The boolean flags an exact match.
fn find_block(
    tree: &Tree,
    base_tree: &Tree,
    base_id: NodeId,
    used: &HashSet<NodeId>,
) -> Option<(NodeId, bool)> {
    let base_node = base_tree.node(base_id);
    let candidates = blocks_of(tree);

    if let Some(&exact) = candidates
        .iter()
        .find(|&&id| !used.contains(&id) && tree.node(id).identifier == base_node.identifier)
    {
        return Some((exact, true));
    }
    candidates
        .iter()
        .find(|&&id| {
            !used.contains(&id)
                && body_similarity(base_node, tree.node(id)) >= SIMILARITY_THRESHOLD
        })
        .map(|&id| (id, false))
}
