//! Tree superimposition.
//!
//! Composes the three declaration trees into one by matching children on
//! their identifier, container by container. Matched terminals get their
//! bodies three-way merged; children present in exactly one contribution
//! are recorded as added and inserted after their nearest surviving
//! predecessor from the contribution they came from, left before right.
//!
//! Identifier matching is cheap and precise for stable names. What it
//! cannot see (a renamed declaration looks deleted on one side and added
//! on the other) is exactly what the conflict handlers recover afterwards.

use crate::context::{MergeContext, Side};
use crate::diff3::{self, TextualMergeError};
use crate::tree::{NodeData, NodeId, Tree};

/// Build `context.super_tree` and the added-node sets from the three
/// parsed trees.
pub fn superimpose(context: &mut MergeContext) -> Result<(), TextualMergeError> {
    let mut worker = Superimposer {
        left: &context.left_tree,
        base: &context.base_tree,
        right: &context.right_tree,
        ignore_whitespace: context.config.ignore_whitespace_change,
        out: Tree::new(),
        added_left: Vec::new(),
        added_right: Vec::new(),
        body_conflicts: 0,
    };

    let l_root = worker.left.root();
    let b_root = worker.base.root();
    let r_root = worker.right.root();

    let out_root = worker.out.root();
    worker.out.node_mut(out_root).identifier = worker.base.node(b_root).identifier.clone();
    let footer = worker.merge_text(
        container_footer(worker.left, l_root),
        container_footer(worker.base, b_root),
        container_footer(worker.right, r_root),
    )?;
    set_container_footer(&mut worker.out, out_root, footer);

    worker.superimpose_children(Some(l_root), Some(b_root), Some(r_root), out_root)?;

    context.super_tree = worker.out;
    context.added_left = worker.added_left;
    context.added_right = worker.added_right;
    context.stats.body_conflicts += worker.body_conflicts;
    Ok(())
}

/// Placement of one output child, decided before emission so additions can
/// be spliced in at their anchored positions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Unit {
    /// A base child surviving in at least one contribution.
    Base(usize),
    /// Added by left only (index into the left child list).
    AddedLeft(usize),
    /// Added by right only.
    AddedRight(usize),
    /// Added concurrently by both sides under the same identifier.
    Concurrent(usize, usize),
}

struct Superimposer<'a> {
    left: &'a Tree,
    base: &'a Tree,
    right: &'a Tree,
    ignore_whitespace: bool,
    out: Tree,
    added_left: Vec<NodeId>,
    added_right: Vec<NodeId>,
    body_conflicts: u32,
}

impl<'a> Superimposer<'a> {
    fn superimpose_children(
        &mut self,
        l: Option<NodeId>,
        b: Option<NodeId>,
        r: Option<NodeId>,
        out_parent: NodeId,
    ) -> Result<(), TextualMergeError> {
        let l_children: Vec<NodeId> = l.map(|id| self.left.children(id).to_vec()).unwrap_or_default();
        let b_children: Vec<NodeId> = b.map(|id| self.base.children(id).to_vec()).unwrap_or_default();
        let r_children: Vec<NodeId> = r.map(|id| self.right.children(id).to_vec()).unwrap_or_default();

        // Three-way matching of children by identifier.
        let mut l_match_of_base: Vec<Option<usize>> = vec![None; b_children.len()];
        let mut r_match_of_base: Vec<Option<usize>> = vec![None; b_children.len()];
        let mut l_used = vec![false; l_children.len()];
        let mut r_used = vec![false; r_children.len()];

        for (bi, &bc) in b_children.iter().enumerate() {
            let key = self.base.node(bc);
            if let Some(li) = (0..l_children.len())
                .find(|&i| !l_used[i] && self.left.node(l_children[i]).corresponds_to(key))
            {
                l_used[li] = true;
                l_match_of_base[bi] = Some(li);
            }
            if let Some(ri) = (0..r_children.len())
                .find(|&i| !r_used[i] && self.right.node(r_children[i]).corresponds_to(key))
            {
                r_used[ri] = true;
                r_match_of_base[bi] = Some(ri);
            }
        }

        // Concurrent additions: unmatched left and right children with the
        // same identifier.
        let mut concurrent_of_left: Vec<Option<usize>> = vec![None; l_children.len()];
        for (li, &lc) in l_children.iter().enumerate() {
            if l_used[li] {
                continue;
            }
            let key = self.left.node(lc);
            if let Some(ri) = (0..r_children.len())
                .find(|&i| !r_used[i] && self.right.node(r_children[i]).corresponds_to(key))
            {
                r_used[ri] = true;
                concurrent_of_left[li] = Some(ri);
            }
        }

        // Decide the output order: base order first, then additions spliced
        // in after their nearest surviving predecessor.
        let mut units: Vec<Unit> = (0..b_children.len())
            .filter(|&bi| l_match_of_base[bi].is_some() || r_match_of_base[bi].is_some())
            .map(Unit::Base)
            .collect();

        let unit_for_left = |units: &[Unit], li: usize| -> Option<usize> {
            units.iter().position(|u| match *u {
                Unit::Base(bi) => l_match_of_base[bi] == Some(li),
                Unit::AddedLeft(i) | Unit::Concurrent(i, _) => i == li,
                Unit::AddedRight(_) => false,
            })
        };
        for li in 0..l_children.len() {
            if l_used[li] {
                continue;
            }
            let unit = match concurrent_of_left[li] {
                Some(ri) => Unit::Concurrent(li, ri),
                None => Unit::AddedLeft(li),
            };
            let anchor = (0..li).rev().find_map(|prev| unit_for_left(&units, prev));
            match anchor {
                Some(pos) => units.insert(pos + 1, unit),
                None => units.insert(0, unit),
            }
        }

        let unit_for_right = |units: &[Unit], ri: usize| -> Option<usize> {
            units.iter().position(|u| match *u {
                Unit::Base(bi) => r_match_of_base[bi] == Some(ri),
                Unit::Concurrent(_, j) | Unit::AddedRight(j) => j == ri,
                Unit::AddedLeft(_) => false,
            })
        };
        for ri in 0..r_children.len() {
            if r_used[ri] {
                continue;
            }
            let anchor = (0..ri).rev().find_map(|prev| unit_for_right(&units, prev));
            let mut pos = match anchor {
                Some(p) => p + 1,
                None => 0,
            };
            // Left additions anchored at the same spot come first.
            while pos < units.len()
                && matches!(units[pos], Unit::AddedLeft(_) | Unit::Concurrent(_, _))
            {
                pos += 1;
            }
            units.insert(pos, Unit::AddedRight(ri));
        }

        for unit in units {
            match unit {
                Unit::Base(bi) => {
                    let lc = l_match_of_base[bi].map(|i| l_children[i]);
                    let rc = r_match_of_base[bi].map(|i| r_children[i]);
                    self.emit_base_child(lc, b_children[bi], rc, out_parent)?;
                }
                Unit::AddedLeft(li) => {
                    self.copy_subtree(self.left, l_children[li], out_parent, Some(Side::Left));
                }
                Unit::AddedRight(ri) => {
                    self.copy_subtree(self.right, r_children[ri], out_parent, Some(Side::Right));
                }
                Unit::Concurrent(li, ri) => {
                    self.emit_concurrent(l_children[li], r_children[ri], out_parent)?;
                }
            }
        }
        Ok(())
    }

    /// Emit a base child present in at least one contribution.
    fn emit_base_child(
        &mut self,
        lc: Option<NodeId>,
        bc: NodeId,
        rc: Option<NodeId>,
        out_parent: NodeId,
    ) -> Result<(), TextualMergeError> {
        match (lc, rc) {
            (Some(lc), Some(rc)) => self.emit_matched(lc, bc, rc, out_parent),
            // Deleted by right: kept as the left contribution.
            (Some(lc), None) => {
                self.copy_subtree(self.left, lc, out_parent, None);
                Ok(())
            }
            // Deleted by left: kept as the right contribution.
            (None, Some(rc)) => {
                self.copy_subtree(self.right, rc, out_parent, None);
                Ok(())
            }
            (None, None) => Ok(()),
        }
    }

    /// All three trees hold this declaration.
    fn emit_matched(
        &mut self,
        lc: NodeId,
        bc: NodeId,
        rc: NodeId,
        out_parent: NodeId,
    ) -> Result<(), TextualMergeError> {
        let base_node = self.base.node(bc);
        match &base_node.data {
            NodeData::Terminal { kind, .. } => {
                let merged = self.merge_text(
                    &self.left.node(lc).source(),
                    &base_node.source(),
                    &self.right.node(rc).source(),
                )?;
                self.out.add_terminal(
                    out_parent,
                    *kind,
                    base_node.identifier.clone(),
                    String::new(),
                    merged,
                );
                Ok(())
            }
            NodeData::Container { kind, .. } => {
                let header = self.merge_text(
                    container_header(self.left, lc),
                    container_header(self.base, bc),
                    container_header(self.right, rc),
                )?;
                let footer = self.merge_text(
                    container_footer(self.left, lc),
                    container_footer(self.base, bc),
                    container_footer(self.right, rc),
                )?;
                let out_id = self.out.add_container(
                    out_parent,
                    *kind,
                    base_node.identifier.clone(),
                    header,
                    footer,
                );
                self.superimpose_children(Some(lc), Some(bc), Some(rc), out_id)
            }
        }
    }

    /// Both contributions added the same identifier independently.
    fn emit_concurrent(
        &mut self,
        lc: NodeId,
        rc: NodeId,
        out_parent: NodeId,
    ) -> Result<(), TextualMergeError> {
        let left_node = self.left.node(lc);
        match &left_node.data {
            NodeData::Terminal { kind, .. } => {
                let merged =
                    self.merge_text(&left_node.source(), "", &self.right.node(rc).source())?;
                let id = self.out.add_terminal(
                    out_parent,
                    *kind,
                    left_node.identifier.clone(),
                    String::new(),
                    merged,
                );
                self.added_left.push(id);
                self.added_right.push(id);
                Ok(())
            }
            NodeData::Container { kind, .. } => {
                let header = self.merge_text(
                    container_header(self.left, lc),
                    "",
                    container_header(self.right, rc),
                )?;
                let footer = self.merge_text(
                    container_footer(self.left, lc),
                    "",
                    container_footer(self.right, rc),
                )?;
                let out_id = self.out.add_container(
                    out_parent,
                    *kind,
                    left_node.identifier.clone(),
                    header,
                    footer,
                );
                self.superimpose_children(Some(lc), None, Some(rc), out_id)
            }
        }
    }

    /// Clone a contribution subtree into the output verbatim. When `record`
    /// is set, every copied terminal lands in that side's added set.
    fn copy_subtree(&mut self, src: &Tree, id: NodeId, out_parent: NodeId, record: Option<Side>) {
        let node = src.node(id);
        match &node.data {
            NodeData::Terminal {
                kind,
                signature,
                body,
            } => {
                let out_id = self.out.add_terminal(
                    out_parent,
                    *kind,
                    node.identifier.clone(),
                    signature.clone(),
                    body.clone(),
                );
                match record {
                    Some(Side::Left) => self.added_left.push(out_id),
                    Some(Side::Right) => self.added_right.push(out_id),
                    None => {}
                }
            }
            NodeData::Container {
                kind,
                header,
                footer,
                children,
            } => {
                let out_id = self.out.add_container(
                    out_parent,
                    *kind,
                    node.identifier.clone(),
                    header.clone(),
                    footer.clone(),
                );
                for &child in children {
                    self.copy_subtree(src, child, out_id, record);
                }
            }
        }
    }

    fn merge_text(&mut self, l: &str, b: &str, r: &str) -> Result<String, TextualMergeError> {
        let merged = diff3::merge(l, b, r, self.ignore_whitespace)?;
        if merged.has_conflict {
            self.body_conflicts += 1;
        }
        Ok(merged.text)
    }
}

fn container_header(tree: &Tree, id: NodeId) -> &str {
    match &tree.node(id).data {
        NodeData::Container { header, .. } => header,
        NodeData::Terminal { .. } => "",
    }
}

fn container_footer(tree: &Tree, id: NodeId) -> &str {
    match &tree.node(id).data {
        NodeData::Container { footer, .. } => footer,
        NodeData::Terminal { .. } => "",
    }
}

fn set_container_footer(tree: &mut Tree, id: NodeId, text: String) {
    if let NodeData::Container { footer, .. } = &mut tree.node_mut(id).data {
        *footer = text;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MergeConfig;
    use crate::parser;
    use crate::printer;

    fn run(left: &str, base: &str, right: &str) -> MergeContext {
        let mut context = MergeContext::new(MergeConfig::default());
        context.left_tree = parser::parse(left).unwrap();
        context.base_tree = parser::parse(base).unwrap();
        context.right_tree = parser::parse(right).unwrap();
        superimpose(&mut context).unwrap();
        context
    }

    #[test]
    fn test_identity_superimposition() {
        let src = "class C {\n  int x;\n  void a() { f(); }\n}\n";
        let context = run(src, src, src);
        assert_eq!(printer::emit(&context.super_tree), src);
        assert!(context.added_left.is_empty());
        assert!(context.added_right.is_empty());
    }

    #[test]
    fn test_disjoint_edits_merge() {
        let base = "class C {\n  void a() { old(); }\n  void b() { old(); }\n}\n";
        let left = "class C {\n  void a() { newLeft(); }\n  void b() { old(); }\n}\n";
        let right = "class C {\n  void a() { old(); }\n  void b() { newRight(); }\n}\n";
        let context = run(left, base, right);
        let text = printer::emit(&context.super_tree);
        assert!(text.contains("newLeft();"));
        assert!(text.contains("newRight();"));
        assert_eq!(context.stats.body_conflicts, 0);
    }

    #[test]
    fn test_added_nodes_recorded_per_side() {
        let base = "class C {\n  void a() { f(); }\n}\n";
        let left = "class C {\n  void a() { f(); }\n  void fromLeft() { l(); }\n}\n";
        let right = "class C {\n  void fromRight() { r(); }\n  void a() { f(); }\n}\n";
        let context = run(left, base, right);
        assert_eq!(context.added_left.len(), 1);
        assert_eq!(context.added_right.len(), 1);
        let l = context.super_tree.node(context.added_left[0]);
        let r = context.super_tree.node(context.added_right[0]);
        assert_eq!(l.identifier, "fromLeft()");
        assert_eq!(r.identifier, "fromRight()");
    }

    #[test]
    fn test_addition_position_follows_contribution() {
        let base = "class C {\n  void a() { f(); }\n  void z() { g(); }\n}\n";
        let left = "class C {\n  void a() { f(); }\n  void mid() { m(); }\n  void z() { g(); }\n}\n";
        let right = base;
        let context = run(left, base, right);
        let class = context.super_tree.children(context.super_tree.root())[0];
        let idents: Vec<_> = context
            .super_tree
            .children(class)
            .iter()
            .map(|&c| context.super_tree.node(c).identifier.clone())
            .collect();
        assert_eq!(idents, vec!["a()", "mid()", "z()"]);
    }

    #[test]
    fn test_ties_left_before_right() {
        let base = "class C {\n  void a() { f(); }\n}\n";
        let left = "class C {\n  void a() { f(); }\n  void l1() { x(); }\n}\n";
        let right = "class C {\n  void a() { f(); }\n  void r1() { y(); }\n}\n";
        let context = run(left, base, right);
        let class = context.super_tree.children(context.super_tree.root())[0];
        let idents: Vec<_> = context
            .super_tree
            .children(class)
            .iter()
            .map(|&c| context.super_tree.node(c).identifier.clone())
            .collect();
        assert_eq!(idents, vec!["a()", "l1()", "r1()"]);
    }

    #[test]
    fn test_concurrent_equal_addition_collapses() {
        let base = "class C {\n}\n";
        let both = "class C {\n  int a() { return 0; }\n}\n";
        let context = run(both, base, both);
        let class = context.super_tree.children(context.super_tree.root())[0];
        assert_eq!(context.super_tree.children(class).len(), 1);
        assert_eq!(context.stats.body_conflicts, 0);
        // The single copy is visible to both added sets.
        assert_eq!(context.added_left, context.added_right);
    }

    #[test]
    fn test_concurrent_diverging_addition_conflicts() {
        let base = "class C {\n}\n";
        let left = "class C {\n  int a() {\n    return 1;\n  }\n}\n";
        let right = "class C {\n  int a() {\n    return 2;\n  }\n}\n";
        let context = run(left, base, right);
        assert!(context.stats.body_conflicts > 0);
        let text = printer::emit(&context.super_tree);
        assert!(text.contains("<<<<<<< MINE"));
    }

    #[test]
    fn test_deletion_of_untouched_member_is_kept_by_superimposition() {
        // Deletion semantics are decided by the renaming handler, not here:
        // the superimposed tree keeps the surviving contribution's copy.
        let base = "class C {\n  void a() { f(); }\n}\n";
        let left = "class C {\n}\n";
        let right = base;
        let context = run(left, base, right);
        let text = printer::emit(&context.super_tree);
        assert!(text.contains("void a()"));
    }

    #[test]
    fn test_renamed_method_appears_deleted_and_added() {
        let base = "class C {\n  void a() { f(); }\n}\n";
        let left = "class C {\n  void b() { f(); }\n}\n";
        let right = base;
        let context = run(left, base, right);
        let text = printer::emit(&context.super_tree);
        // Before handlers run, both the rename target and the original are
        // in the tree.
        assert!(text.contains("void b()"));
        assert!(text.contains("void a()"));
        assert_eq!(context.added_left.len(), 1);
    }
}
