//! Duplicate declaration handler.
//!
//! Enforces identifier uniqueness inside each container of the
//! superimposed tree. Superimposition collapses same-identifier additions
//! when they meet in the same container, but scanner quirks and earlier
//! handler edits can still leave two declarations with one signature.
//! Equal-bodied duplicates collapse silently; diverging ones are reported
//! as an in-place conflict.

use crate::context::MergeContext;
use crate::diff3::TextualMergeError;
use crate::handlers::{conflict_block, replace_node_text, ConflictHandler};
use crate::similarity::normalize_whitespace;
use crate::tree::{NodeId, Tree};

pub struct DuplicateDeclarationsHandler;

impl ConflictHandler for DuplicateDeclarationsHandler {
    fn name(&self) -> &'static str {
        "duplicate-declarations"
    }

    fn handle(&self, context: &mut MergeContext) -> Result<(), TextualMergeError> {
        let containers = collect_containers(&context.super_tree);
        for container in containers {
            dedupe_children(context, container);
        }
        Ok(())
    }
}

fn collect_containers(tree: &Tree) -> Vec<NodeId> {
    let mut out = Vec::new();
    let mut stack = vec![tree.root()];
    while let Some(id) = stack.pop() {
        if !tree.node(id).is_terminal() {
            out.push(id);
            stack.extend(tree.children(id).iter().copied());
        }
    }
    out
}

fn dedupe_children(context: &mut MergeContext, container: NodeId) {
    loop {
        let children: Vec<NodeId> = context.super_tree.children(container).to_vec();
        let mut duplicate: Option<(NodeId, NodeId)> = None;

        'scan: for (i, &first) in children.iter().enumerate() {
            let first_node = context.super_tree.node(first);
            if !first_node.is_terminal() || first_node.identifier.is_empty() {
                continue;
            }
            for &second in &children[i + 1..] {
                if context.super_tree.node(second).corresponds_to(first_node) {
                    duplicate = Some((first, second));
                    break 'scan;
                }
            }
        }

        let Some((first, second)) = duplicate else {
            return;
        };
        let first_src = context.super_tree.node(first).source();
        let second_src = context.super_tree.node(second).source();
        if normalize_whitespace(&first_src) == normalize_whitespace(&second_src) {
            context.super_tree.remove(second);
        } else {
            let is_left_first = context.added_left.contains(&first);
            let block = if is_left_first {
                conflict_block(&first_src, "", &second_src)
            } else {
                conflict_block(&second_src, "", &first_src)
            };
            replace_node_text(&mut context.super_tree, first, block);
            context.super_tree.remove(second);
            context.stats.duplicate_declaration_conflicts += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MergeConfig;
    use crate::diff3;
    use crate::printer;
    use crate::tree::{ContainerKind, TerminalKind};

    fn context_with_duplicates(body_a: &str, body_b: &str) -> MergeContext {
        let mut context = MergeContext::new(MergeConfig::default());
        let class = context.super_tree.add_container(
            0,
            ContainerKind::Class,
            "C".into(),
            "class C {".into(),
            "\n}".into(),
        );
        context.super_tree.add_terminal(
            class,
            TerminalKind::Method,
            "a()".into(),
            "\n  int a() ".into(),
            body_a.into(),
        );
        context.super_tree.add_terminal(
            class,
            TerminalKind::Method,
            "a()".into(),
            "\n  int a() ".into(),
            body_b.into(),
        );
        context
    }

    #[test]
    fn test_equal_duplicates_collapse_silently() {
        let mut context = context_with_duplicates("{ return 0; }", "{  return 0;  }");
        DuplicateDeclarationsHandler.handle(&mut context).unwrap();
        let text = printer::emit(&context.super_tree);
        assert_eq!(text.matches("int a()").count(), 1);
        assert!(!diff3::contains_conflict_marker(&text));
        assert_eq!(context.stats.duplicate_declaration_conflicts, 0);
    }

    #[test]
    fn test_diverging_duplicates_conflict_in_place() {
        let mut context = context_with_duplicates("{ return 0; }", "{ return 1; }");
        DuplicateDeclarationsHandler.handle(&mut context).unwrap();
        let text = printer::emit(&context.super_tree);
        assert!(diff3::contains_conflict_marker(&text));
        assert!(text.contains("return 0;"));
        assert!(text.contains("return 1;"));
        assert_eq!(context.stats.duplicate_declaration_conflicts, 1);
    }

    #[test]
    fn test_distinct_identifiers_untouched() {
        let mut context = MergeContext::new(MergeConfig::default());
        let class = context.super_tree.add_container(
            0,
            ContainerKind::Class,
            "C".into(),
            "class C {".into(),
            "\n}".into(),
        );
        context.super_tree.add_terminal(
            class,
            TerminalKind::Method,
            "a()".into(),
            "\n  void a() ".into(),
            "{ }".into(),
        );
        context.super_tree.add_terminal(
            class,
            TerminalKind::Method,
            "b()".into(),
            "\n  void b() ".into(),
            "{ }".into(),
        );
        DuplicateDeclarationsHandler.handle(&mut context).unwrap();
        assert_eq!(context.super_tree.children(class).len(), 2);
    }
}
