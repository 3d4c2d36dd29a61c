//! Conflict handler framework.
//!
//! Handlers post-process the superimposed tree to catch situations the
//! identifier-based composition mishandles. Each handler runs once, in a
//! fixed order, over the shared [`MergeContext`], mutating the tree in
//! place. The only error a handler may surface is a
//! [`TextualMergeError`] bubbling from a body re-merge.

use crate::config::MergeConfig;
use crate::context::MergeContext;
use crate::diff3::{self, TextualMergeError};
use crate::tree::{NodeId, Tree};

pub mod duplicates;
pub mod init_blocks;
pub mod new_element_ref;
pub mod renaming;
pub mod type_ambiguity;

/// A post-superimposition conflict handler.
pub trait ConflictHandler {
    /// Human-readable name, used in trace logging.
    fn name(&self) -> &'static str;

    /// Inspect and mutate the superimposed tree.
    fn handle(&self, context: &mut MergeContext) -> Result<(), TextualMergeError>;
}

/// The enabled handlers in their fixed invocation order.
pub fn enabled_handlers(config: &MergeConfig) -> Vec<Box<dyn ConflictHandler>> {
    let mut handlers: Vec<Box<dyn ConflictHandler>> = Vec::new();
    if config.handle_type_ambiguity {
        handlers.push(Box::new(type_ambiguity::TypeAmbiguityHandler));
    }
    if config.handle_initialization_blocks {
        handlers.push(Box::new(init_blocks::InitializationBlocksHandler));
    }
    if config.handle_new_element_referencing_edited_one {
        handlers.push(Box::new(new_element_ref::NewElementReferencingEditedOneHandler));
    }
    if config.handle_duplicate_declarations {
        handlers.push(Box::new(duplicates::DuplicateDeclarationsHandler));
    }
    if config.handle_method_and_constructor_renaming_deletion {
        handlers.push(Box::new(
            renaming::MethodAndConstructorRenamingAndDeletionHandler,
        ));
    }
    handlers
}

/// Render a conflict block from up to three variants. Empty variants
/// contribute no lines, mirroring the line merge's marker layout.
pub(crate) fn conflict_block(left: &str, base: &str, right: &str) -> String {
    let mut out = String::new();
    out.push_str(diff3::CONFLICT_MINE);
    out.push('\n');
    push_trimmed(&mut out, left);
    out.push_str(diff3::CONFLICT_BASE);
    out.push('\n');
    push_trimmed(&mut out, base);
    out.push_str(diff3::CONFLICT_SEPARATOR);
    out.push('\n');
    push_trimmed(&mut out, right);
    out.push_str(diff3::CONFLICT_YOURS);
    out.push('\n');
    out
}

fn push_trimmed(out: &mut String, piece: &str) {
    let trimmed = piece.trim_matches(|c: char| c == '\n' || c == '\r');
    if !trimmed.trim().is_empty() {
        out.push_str(trimmed);
        if !trimmed.ends_with('\n') {
            out.push('\n');
        }
    }
}

/// Overwrite a terminal's whole text (signature and body) in place.
pub(crate) fn replace_node_text(tree: &mut Tree, id: NodeId, text: String) {
    tree.set_signature(id, String::new());
    tree.set_body(id, text);
}
