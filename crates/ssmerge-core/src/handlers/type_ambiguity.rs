//! Import clash handler.
//!
//! When the contributions independently add imports that bring in distinct
//! types with the same simple name, the merged file would not compile even
//! though no textual region conflicts. Surface the pair as a conflict.

use crate::context::MergeContext;
use crate::diff3::TextualMergeError;
use crate::handlers::{conflict_block, replace_node_text, ConflictHandler};
use crate::tree::{Node, TerminalKind};

pub struct TypeAmbiguityHandler;

impl ConflictHandler for TypeAmbiguityHandler {
    fn name(&self) -> &'static str {
        "type-ambiguity"
    }

    fn handle(&self, context: &mut MergeContext) -> Result<(), TextualMergeError> {
        let left_imports: Vec<_> = added_imports(context, &context.added_left);
        let right_imports: Vec<_> = added_imports(context, &context.added_right);

        let mut clashes: Vec<(usize, usize)> = Vec::new();
        for &l in &left_imports {
            for &r in &right_imports {
                // Concurrent identical imports share one node.
                if l == r {
                    continue;
                }
                let ln = context.super_tree.node(l);
                let rn = context.super_tree.node(r);
                let (Some(l_type), Some(r_type)) = (imported_type(ln), imported_type(rn)) else {
                    continue;
                };
                if l_type == r_type && ln.identifier != rn.identifier {
                    clashes.push((l, r));
                }
            }
        }

        let mut consumed: Vec<usize> = Vec::new();
        for (l, r) in clashes {
            if consumed.contains(&l) || consumed.contains(&r) {
                continue;
            }
            let block = conflict_block(
                &context.super_tree.node(l).source(),
                "",
                &context.super_tree.node(r).source(),
            );
            replace_node_text(&mut context.super_tree, l, block);
            context.super_tree.remove(r);
            consumed.push(l);
            consumed.push(r);
            context.stats.type_ambiguity_conflicts += 1;
        }
        Ok(())
    }
}

fn added_imports(context: &MergeContext, added: &[usize]) -> Vec<usize> {
    added
        .iter()
        .copied()
        .filter(|&id| context.super_tree.node(id).terminal_kind() == Some(TerminalKind::Import))
        .collect()
}

/// The simple type name an import statement brings in; `None` for
/// wildcard imports.
fn imported_type(node: &Node) -> Option<String> {
    let text = node
        .identifier
        .strip_prefix("import")?
        .trim()
        .trim_end_matches(';')
        .trim();
    let text = text.strip_prefix("static").unwrap_or(text).trim();
    let last = text.rsplit('.').next()?.trim();
    if last.is_empty() || last == "*" {
        return None;
    }
    Some(last.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MergeConfig;
    use crate::diff3;
    use crate::parser;
    use crate::printer;
    use crate::superimpose::superimpose;

    fn run(left: &str, base: &str, right: &str) -> MergeContext {
        let mut context = MergeContext::new(MergeConfig::default());
        context.left_tree = parser::parse(left).unwrap();
        context.base_tree = parser::parse(base).unwrap();
        context.right_tree = parser::parse(right).unwrap();
        superimpose(&mut context).unwrap();
        TypeAmbiguityHandler.handle(&mut context).unwrap();
        context
    }

    #[test]
    fn test_same_simple_name_conflicts() {
        let base = "class C { }\n";
        let left = "import java.util.List;\nclass C { }\n";
        let right = "import java.awt.List;\nclass C { }\n";
        let context = run(left, base, right);
        let text = printer::emit(&context.super_tree);
        assert!(diff3::contains_conflict_marker(&text));
        assert!(text.contains("java.util.List"));
        assert!(text.contains("java.awt.List"));
        assert_eq!(context.stats.type_ambiguity_conflicts, 1);
    }

    #[test]
    fn test_distinct_names_pass() {
        let base = "class C { }\n";
        let left = "import java.util.List;\nclass C { }\n";
        let right = "import java.util.Map;\nclass C { }\n";
        let context = run(left, base, right);
        let text = printer::emit(&context.super_tree);
        assert!(!diff3::contains_conflict_marker(&text));
        assert_eq!(context.stats.type_ambiguity_conflicts, 0);
    }

    #[test]
    fn test_identical_concurrent_import_passes() {
        let base = "class C { }\n";
        let both = "import java.util.List;\nclass C { }\n";
        let context = run(both, base, both);
        assert_eq!(context.stats.type_ambiguity_conflicts, 0);
    }

    #[test]
    fn test_wildcard_import_ignored() {
        let base = "class C { }\n";
        let left = "import java.util.*;\nclass C { }\n";
        let right = "import java.awt.List;\nclass C { }\n";
        let context = run(left, base, right);
        assert_eq!(context.stats.type_ambiguity_conflicts, 0);
    }

    #[test]
    fn test_imported_type_extraction() {
        let node = Node {
            identifier: "import java.util.List;".into(),
            parent: None,
            data: crate::tree::NodeData::Terminal {
                kind: TerminalKind::Import,
                signature: "import java.util.List;".into(),
                body: String::new(),
            },
        };
        assert_eq!(imported_type(&node), Some("List".to_string()));
    }
}
