//! Declaration tree serialization.
//!
//! Terminals and container headers hold exact source slices (leading
//! trivia included), so emitting an unmodified tree round-trips the parsed
//! file byte for byte. Nodes synthesized or edited by handlers are emitted
//! with a separating newline when their text does not bring its own.

use crate::tree::{NodeData, NodeId, Tree};

/// Serialize the tree back to source text.
pub fn emit(tree: &Tree) -> String {
    let mut out = String::new();
    emit_node(tree, tree.root(), &mut out);
    out
}

fn emit_node(tree: &Tree, id: NodeId, out: &mut String) {
    match &tree.node(id).data {
        NodeData::Terminal {
            signature, body, ..
        } => {
            push_piece(out, signature);
            push_piece(out, body);
        }
        NodeData::Container {
            header,
            footer,
            children,
            ..
        } => {
            push_piece(out, header);
            for &child in children {
                emit_node(tree, child, out);
            }
            push_piece(out, footer);
        }
    }
}

/// Append a text piece, inserting a newline when two pieces would
/// otherwise run together without any separating whitespace.
fn push_piece(out: &mut String, piece: &str) {
    if piece.is_empty() {
        return;
    }
    let needs_break = !out.is_empty()
        && !out.ends_with(|c: char| c.is_whitespace())
        && !piece.starts_with(|c: char| c.is_whitespace());
    if needs_break {
        out.push('\n');
    }
    out.push_str(piece);
}
