//! Method and constructor renaming and deletion handler.
//!
//! Renaming and deletion conflicts happen when one developer edits an
//! element the other renamed or deleted. Superimposition matches elements
//! by identifier, so a renamed method looks deleted on one side and added
//! on the other, and the edit on the opposite side is silently dropped or
//! duplicated. This handler recovers those matches in three phases:
//!
//! 1. **Identification**: walk the base terminals, classifying each side's
//!    missing ones as renamed-without-body-changes (an added node carries
//!    the same body) or deleted-or-renamed-with-body-changes.
//! 2. **Matching**: for each classified base node, find the most accurate
//!    match in each contribution and the corresponding node in the
//!    superimposed tree, forming a scenario tuple.
//! 3. **Decision**: per tuple, apply the rename silently when the other
//!    side left the declaration alone, otherwise dispatch on the
//!    configured renaming strategy.

use crate::config::RenamingStrategy;
use crate::context::{MergeContext, Side};
use crate::diff3::{self, TextualMergeError};
use crate::handlers::{conflict_block, replace_node_text, ConflictHandler};
use crate::similarity::{
    have_equal_body, have_equal_signature, have_equal_signature_but_name, have_similar_body,
    normalize_whitespace, one_contains_the_body_from_the_other,
};
use crate::tree::{Node, NodeId, Tree};

pub struct MethodAndConstructorRenamingAndDeletionHandler;

/// The nodes involved in one renaming scenario: the contributions' most
/// accurate matches, the base original, and the corresponding node in the
/// superimposed tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ScenarioTuple {
    left: Option<NodeId>,
    base: NodeId,
    right: Option<NodeId>,
    merge: Option<NodeId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ConflictCase {
    /// One side renamed or deleted; the other edited the original.
    SingleSide(Side),
    /// Both sides renamed or deleted the original.
    Double,
}

impl ConflictHandler for MethodAndConstructorRenamingAndDeletionHandler {
    fn name(&self) -> &'static str {
        "method-constructor-renaming-deletion"
    }

    fn handle(&self, context: &mut MergeContext) -> Result<(), TextualMergeError> {
        identify_renaming_or_deletion_nodes(context);
        let tuples = retrieve_renaming_matches(context);
        for tuple in tuples {
            decide(context, tuple)?;
        }
        Ok(())
    }
}

/// Phase 1: fill the context's classification buckets.
fn identify_renaming_or_deletion_nodes(context: &mut MergeContext) {
    let ignore_ws = context.config.ignore_whitespace_change;
    let mut renamed: Vec<(Side, NodeId)> = Vec::new();
    let mut deleted: Vec<(Side, NodeId)> = Vec::new();

    for base_id in context.base_tree.collect_terminals() {
        let base_node = context.base_tree.node(base_id);
        let mut missing_somewhere = false;
        for side in [Side::Left, Side::Right] {
            if context.contribution_tree(side).is_in_tree(base_node) {
                continue;
            }
            missing_somewhere = true;
            let has_equal_added = context.added_nodes(side).iter().any(|&a| {
                let added = context.super_tree.node(a);
                added.is_terminal() && have_equal_body(base_node, added, ignore_ws)
            });
            if has_equal_added {
                renamed.push((side, base_id));
            } else {
                deleted.push((side, base_id));
            }
        }
        if !missing_somewhere && base_node.is_method_or_constructor() {
            context.stats.renaming_ignored += 1;
        }
    }

    context.renamed_without_body_changes = renamed;
    context.deleted_or_renamed_with_body_changes = deleted;
}

/// Phase 2: build the de-duplicated scenario tuples. Tuples where neither
/// contribution has a match describe a clean double deletion and are
/// discarded.
fn retrieve_renaming_matches(context: &MergeContext) -> Vec<ScenarioTuple> {
    let mut tuples: Vec<ScenarioTuple> = Vec::new();
    let classified = context
        .renamed_without_body_changes
        .iter()
        .chain(context.deleted_or_renamed_with_body_changes.iter());

    for &(_, base_id) in classified {
        let base_node = context.base_tree.node(base_id);
        let left = most_accurate_match(context, base_node, &context.left_tree);
        let right = most_accurate_match(context, base_node, &context.right_tree);
        let merge = match (left, right) {
            (Some(l), _) => context
                .super_tree
                .retrieve_correspondent(context.left_tree.node(l)),
            (None, Some(r)) => context
                .super_tree
                .retrieve_correspondent(context.right_tree.node(r)),
            (None, None) => continue,
        };
        let tuple = ScenarioTuple {
            left,
            base: base_id,
            right,
            merge,
        };
        if !tuples.contains(&tuple) {
            tuples.push(tuple);
        }
    }
    tuples
}

/// The first method or constructor (in traversal order) very similar to
/// the base node. Deliberately first-match, not argmax: two candidates may
/// both clear the threshold and the earlier one wins.
fn most_accurate_match(context: &MergeContext, base_node: &Node, tree: &Tree) -> Option<NodeId> {
    let ignore_ws = context.config.ignore_whitespace_change;
    tree.collect_terminals().into_iter().find(|&id| {
        let candidate = tree.node(id);
        candidate.is_method_or_constructor() && are_very_similar(base_node, candidate, ignore_ws)
    })
}

/// Equal signature catches body-only edits; equal body catches pure
/// renames; similar body with a name-only signature change catches edited
/// renames; containment catches small extractions.
fn are_very_similar(a: &Node, b: &Node, ignore_ws: bool) -> bool {
    have_equal_signature(a, b)
        || have_equal_body(a, b, ignore_ws)
        || (have_similar_body(a, b) && have_equal_signature_but_name(a, b))
        || one_contains_the_body_from_the_other(a, b)
}

/// Phase 3: run the decision tree for one scenario tuple.
fn decide(context: &mut MergeContext, tuple: ScenarioTuple) -> Result<(), TextualMergeError> {
    let base_node = context.base_tree.node(tuple.base).clone();
    let left_present = context.left_tree.is_in_tree(&base_node);
    let right_present = context.right_tree.is_in_tree(&base_node);

    match (left_present, right_present) {
        // Identifier survived on both sides; superimposition handled it.
        (true, true) => Ok(()),
        (false, true) => single_side(context, Side::Left, &base_node, tuple),
        (true, false) => single_side(context, Side::Right, &base_node, tuple),
        (false, false) => double_side(context, &base_node, tuple),
    }
}

fn single_side(
    context: &mut MergeContext,
    acting: Side,
    base_node: &Node,
    tuple: ScenarioTuple,
) -> Result<(), TextualMergeError> {
    let ignore_ws = context.config.ignore_whitespace_change;
    let opposite = acting.opposite();
    let opposite_tree = context.contribution_tree(opposite);
    let opposite_edited = match opposite_tree.retrieve_correspondent(base_node) {
        Some(id) => is_edited(base_node, opposite_tree.node(id), ignore_ws),
        None => false,
    };

    if opposite_edited {
        context.stats.renaming_conflicts += 1;
        apply_strategy(context, base_node, tuple, ConflictCase::SingleSide(acting))
    } else {
        apply_benign(context, acting, base_node, tuple);
        Ok(())
    }
}

fn double_side(
    context: &mut MergeContext,
    base_node: &Node,
    tuple: ScenarioTuple,
) -> Result<(), TextualMergeError> {
    let ignore_ws = context.config.ignore_whitespace_change;

    // Both sides renamed to the same identifier with identical content:
    // the concurrent addition already collapsed cleanly.
    if let (Some(l), Some(r)) = (tuple.left, tuple.right) {
        let left_node = context.left_tree.node(l);
        let right_node = context.right_tree.node(r);
        if left_node.identifier == right_node.identifier
            && !is_edited(left_node, right_node, ignore_ws)
        {
            context.stats.benign_renames += 1;
            return Ok(());
        }
    }

    context.stats.double_renaming_conflicts += 1;
    apply_strategy(context, base_node, tuple, ConflictCase::Double)
}

/// Whole-declaration difference check (signature and body), used to decide
/// whether the opposite side touched the original at all.
fn is_edited(a: &Node, b: &Node, ignore_ws: bool) -> bool {
    if ignore_ws {
        normalize_whitespace(&a.source()) != normalize_whitespace(&b.source())
    } else {
        a.source() != b.source()
    }
}

/// One side renamed or deleted, the other did not touch the original:
/// apply the change silently.
fn apply_benign(context: &mut MergeContext, acting: Side, base_node: &Node, tuple: ScenarioTuple) {
    let acting_match = match acting {
        Side::Left => tuple.left,
        Side::Right => tuple.right,
    };
    if let Some(kept) = context.super_tree.retrieve_correspondent(base_node) {
        // For a rename the added copy stays and the pre-rename original
        // goes; for a deletion there is nothing to keep.
        if acting_match.is_none() || tuple.merge != Some(kept) {
            context.super_tree.remove(kept);
        }
    }
    context.stats.benign_renames += 1;
}

fn apply_strategy(
    context: &mut MergeContext,
    base_node: &Node,
    tuple: ScenarioTuple,
    case: ConflictCase,
) -> Result<(), TextualMergeError> {
    match context.config.renaming_strategy {
        RenamingStrategy::Safe => apply_safe(context, base_node, tuple),
        RenamingStrategy::KeepBoth => apply_keep_both(context, tuple),
        RenamingStrategy::Merge => {
            if case == ConflictCase::Double {
                if let (Some(l), Some(r)) = (tuple.left, tuple.right) {
                    if context.left_tree.node(l).identifier
                        != context.right_tree.node(r).identifier
                    {
                        // Diverging rename targets cannot be merged into a
                        // single declaration.
                        return apply_safe(context, base_node, tuple);
                    }
                }
            }
            apply_merge(context, base_node, tuple, case)
        }
        RenamingStrategy::UnstructuredMerge => apply_unstructured(context, base_node, tuple),
    }
}

/// SAFE: one conflict block listing every non-null contribution, no
/// textual re-merge.
fn apply_safe(
    context: &mut MergeContext,
    base_node: &Node,
    tuple: ScenarioTuple,
) -> Result<(), TextualMergeError> {
    let left_src = tuple
        .left
        .map(|id| context.left_tree.node(id).source())
        .unwrap_or_default();
    let right_src = tuple
        .right
        .map(|id| context.right_tree.node(id).source())
        .unwrap_or_default();
    let block = conflict_block(&left_src, &base_node.source(), &right_src);

    let Some(merge_id) = tuple.merge else {
        return Ok(());
    };
    remove_other_copies(context, base_node, tuple, merge_id);
    replace_node_text(&mut context.super_tree, merge_id, block);
    Ok(())
}

/// KEEP_BOTH: the renamed and the edited version stay as siblings; the
/// superimposed tree already holds both.
fn apply_keep_both(
    _context: &mut MergeContext,
    _tuple: ScenarioTuple,
) -> Result<(), TextualMergeError> {
    Ok(())
}

/// MERGE: textually merge the variants and install the result under the
/// renamed identifier, dropping the pre-rename node. When a rename target
/// exists, only the bodies are merged and the renamed signature is kept;
/// when the acting side deleted the declaration, the whole sources are
/// merged so the deletion can win (or conflict) line by line.
fn apply_merge(
    context: &mut MergeContext,
    base_node: &Node,
    tuple: ScenarioTuple,
    case: ConflictCase,
) -> Result<(), TextualMergeError> {
    let ignore_ws = context.config.ignore_whitespace_change;
    let renamed_signature = match case {
        ConflictCase::SingleSide(Side::Left) => tuple
            .left
            .map(|id| context.left_tree.node(id).signature().to_string()),
        ConflictCase::SingleSide(Side::Right) => tuple
            .right
            .map(|id| context.right_tree.node(id).signature().to_string()),
        ConflictCase::Double => match (tuple.left, tuple.right) {
            (Some(l), Some(_)) => Some(context.left_tree.node(l).signature().to_string()),
            _ => None,
        },
    };

    // Merge first: a failure here must leave the tree untouched.
    let (merged, new_text) = match &renamed_signature {
        Some(signature) => {
            let left_body = tuple
                .left
                .map(|id| context.left_tree.node(id).body().to_string())
                .unwrap_or_default();
            let right_body = tuple
                .right
                .map(|id| context.right_tree.node(id).body().to_string())
                .unwrap_or_default();
            let merged = diff3::merge(&left_body, base_node.body(), &right_body, ignore_ws)?;
            let text = format!("{}{}", signature, merged.text);
            (merged, text)
        }
        None => {
            let left_src = tuple
                .left
                .map(|id| context.left_tree.node(id).source())
                .unwrap_or_default();
            let right_src = tuple
                .right
                .map(|id| context.right_tree.node(id).source())
                .unwrap_or_default();
            let merged = diff3::merge(&left_src, &base_node.source(), &right_src, ignore_ws)?;
            let text = merged.text.clone();
            (merged, text)
        }
    };

    let Some(merge_id) = tuple.merge else {
        return Ok(());
    };
    remove_other_copies(context, base_node, tuple, merge_id);
    if new_text.trim().is_empty() {
        context.super_tree.remove(merge_id);
    } else {
        if merged.has_conflict {
            context.stats.body_conflicts += 1;
        }
        replace_node_text(&mut context.super_tree, merge_id, new_text);
    }
    Ok(())
}

/// UNSTRUCTURED_MERGE: splice in the corresponding hunk of the line-based
/// output, located by bracketing the base declaration. Falls back to SAFE
/// when the region cannot be found.
fn apply_unstructured(
    context: &mut MergeContext,
    base_node: &Node,
    tuple: ScenarioTuple,
) -> Result<(), TextualMergeError> {
    let region = locate_unstructured_region(&context.unstructured_output, base_node);
    let Some(region) = region else {
        return apply_safe(context, base_node, tuple);
    };
    let Some(merge_id) = tuple.merge else {
        return Ok(());
    };
    remove_other_copies(context, base_node, tuple, merge_id);
    replace_node_text(&mut context.super_tree, merge_id, region);
    Ok(())
}

/// Drop every superimposed-tree copy involved in the tuple except the one
/// chosen to carry the result.
fn remove_other_copies(
    context: &mut MergeContext,
    base_node: &Node,
    tuple: ScenarioTuple,
    keep: NodeId,
) {
    let mut victims: Vec<NodeId> = Vec::new();
    if let Some(l) = tuple.left {
        if let Some(id) = context
            .super_tree
            .retrieve_correspondent(context.left_tree.node(l))
        {
            victims.push(id);
        }
    }
    if let Some(r) = tuple.right {
        if let Some(id) = context
            .super_tree
            .retrieve_correspondent(context.right_tree.node(r))
        {
            victims.push(id);
        }
    }
    if let Some(id) = context.super_tree.retrieve_correspondent(base_node) {
        victims.push(id);
    }
    for victim in victims {
        if victim != keep {
            context.super_tree.remove(victim);
        }
    }
}

/// Find the hunk of the unstructured output holding the base declaration:
/// either the surrounding conflict block or the balanced-brace region
/// starting at the declaration's first line.
fn locate_unstructured_region(text: &str, base_node: &Node) -> Option<String> {
    let name = base_node.identifier.split('(').next()?;
    if name.is_empty() {
        return None;
    }
    let lines: Vec<&str> = text.lines().collect();
    let idx = lines.iter().position(|l| line_declares(l, name))?;

    // Inside a conflict block: take the whole block.
    for j in (0..=idx).rev() {
        if j < idx && lines[j].starts_with(">>>>>>>") {
            break;
        }
        if lines[j].starts_with("<<<<<<<") {
            let end = (idx..lines.len()).find(|&k| lines[k].starts_with(">>>>>>>"))?;
            return Some(join_lines(&lines[j..=end]));
        }
    }

    // Plain declaration: balanced-brace extraction.
    let mut depth = 0i32;
    let mut opened = false;
    for (k, line) in lines.iter().enumerate().skip(idx) {
        for c in line.chars() {
            match c {
                '{' => {
                    depth += 1;
                    opened = true;
                }
                '}' => depth -= 1,
                _ => {}
            }
        }
        if opened && depth <= 0 {
            return Some(join_lines(&lines[idx..=k]));
        }
        if !opened && line.contains(';') {
            return Some(join_lines(&lines[idx..=k]));
        }
    }
    None
}

/// The line mentions `name` immediately followed by an opening paren, with
/// a word boundary in front.
fn line_declares(line: &str, name: &str) -> bool {
    let mut search_from = 0;
    while let Some(found) = line[search_from..].find(name) {
        let start = search_from + found;
        let end = start + name.len();
        let boundary_before = start == 0
            || !line[..start]
                .chars()
                .next_back()
                .is_some_and(|c| c.is_alphanumeric() || c == '_' || c == '$');
        let next_is_paren = line[end..].trim_start().starts_with('(');
        if boundary_before && next_is_paren {
            return true;
        }
        search_from = end;
    }
    false
}

fn join_lines(lines: &[&str]) -> String {
    let mut out = lines.join("\n");
    out.push('\n');
    out
}
