//! New-element-referencing-edited-one handler.
//!
//! A contribution may add a declaration that calls or reads an element the
//! opposite contribution edited. Textually nothing collides, but the added
//! code was written against the pre-edit behavior. Surface a conflict
//! annotation on the referring declaration so the developer inspects the
//! combination.

use crate::context::{MergeContext, Side};
use crate::diff3::{self, TextualMergeError};
use crate::handlers::{conflict_block, replace_node_text, ConflictHandler};
use crate::parser::mask;
use crate::similarity::normalize_whitespace;
use crate::tree::NodeId;

pub struct NewElementReferencingEditedOneHandler;

impl ConflictHandler for NewElementReferencingEditedOneHandler {
    fn name(&self) -> &'static str {
        "new-element-referencing-edited-one"
    }

    fn handle(&self, context: &mut MergeContext) -> Result<(), TextualMergeError> {
        let edited_by_left = edited_element_names(context, Side::Left);
        let edited_by_right = edited_element_names(context, Side::Right);

        annotate_referring_additions(context, Side::Left, &edited_by_right);
        annotate_referring_additions(context, Side::Right, &edited_by_left);
        Ok(())
    }
}

/// Simple names of base elements whose body the given side changed.
fn edited_element_names(context: &MergeContext, side: Side) -> Vec<String> {
    let ignore_ws = context.config.ignore_whitespace_change;
    let tree = context.contribution_tree(side);
    let mut names = Vec::new();
    for base_id in context.base_tree.collect_terminals() {
        let base_node = context.base_tree.node(base_id);
        let Some(counterpart) = tree.retrieve_correspondent(base_node) else {
            continue;
        };
        let changed = if ignore_ws {
            normalize_whitespace(&base_node.source())
                != normalize_whitespace(&tree.node(counterpart).source())
        } else {
            base_node.source() != tree.node(counterpart).source()
        };
        if changed {
            if let Some(name) = simple_name(&base_node.identifier) {
                names.push(name);
            }
        }
    }
    names
}

fn simple_name(identifier: &str) -> Option<String> {
    let name = identifier.split('(').next()?.trim();
    if name.is_empty() || name.contains(' ') {
        return None;
    }
    Some(name.to_string())
}

/// Wrap additions of `side` that mention one of `edited_names` in a
/// conflict annotation.
fn annotate_referring_additions(context: &mut MergeContext, side: Side, edited_names: &[String]) {
    if edited_names.is_empty() {
        return;
    }
    let added: Vec<NodeId> = context
        .added_nodes(side)
        .iter()
        .copied()
        // Concurrent additions belong to both sides; skip them.
        .filter(|id| !context.added_nodes(side.opposite()).contains(id))
        .collect();

    for id in added {
        let node = context.super_tree.node(id);
        if !node.is_terminal() || diff3::contains_conflict_marker(node.body()) {
            continue;
        }
        let source = node.source();
        if !edited_names.iter().any(|name| references(&source, name)) {
            continue;
        }
        let block = match side {
            Side::Left => conflict_block(&source, "", ""),
            Side::Right => conflict_block("", "", &source),
        };
        replace_node_text(&mut context.super_tree, id, block);
        context.stats.new_element_conflicts += 1;
    }
}

/// Word-boundary occurrence of `name` in the masked source (strings and
/// comments do not count as references).
fn references(source: &str, name: &str) -> bool {
    let masked = mask(source);
    masked
        .split(|c: char| !(c.is_alphanumeric() || c == '_' || c == '$'))
        .any(|token| token == name)
}
