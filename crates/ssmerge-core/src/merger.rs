//! Per-file merge driver.
//!
//! Pipeline: fast-forward detection, line-based merge (always, since some
//! handlers consult it), the structured path (parse, superimpose, handlers
//! in order), serialization. A parse failure on any revision downgrades
//! the file to the already-computed unstructured output.

use tracing::{debug, warn};

use crate::config::MergeConfig;
use crate::context::MergeContext;
use crate::diff3::{self, TextualMergeError};
use crate::handlers;
use crate::parser;
use crate::printer;
use crate::superimpose;

/// Three-way semistructured merge of in-memory file contents.
pub fn merge_contents(
    left: &str,
    base: &str,
    right: &str,
    config: &MergeConfig,
) -> Result<MergeContext, TextualMergeError> {
    let mut context = MergeContext::new(config.clone());

    // Fast-forward: when two revisions agree, the third is the answer.
    if let Some(result) = fast_forward(left, base, right) {
        context.unstructured_output = result.to_string();
        context.output = result.to_string();
        return Ok(context);
    }

    let unstructured = diff3::merge(left, base, right, config.ignore_whitespace_change)?;
    context.unstructured_output = unstructured.text;
    context.unstructured_has_conflict = unstructured.has_conflict;

    let parsed = parser::parse(left)
        .and_then(|l| parser::parse(base).map(|b| (l, b)))
        .and_then(|(l, b)| parser::parse(right).map(|r| (l, b, r)));
    let (left_tree, base_tree, right_tree) = match parsed {
        Ok(trees) => trees,
        Err(e) => {
            warn!(error = %e, "structured merge unavailable, falling back to line merge");
            context.structured_fallback = true;
            context.output = context.unstructured_output.clone();
            context.has_conflict = context.unstructured_has_conflict;
            return Ok(context);
        }
    };
    context.left_tree = left_tree;
    context.base_tree = base_tree;
    context.right_tree = right_tree;

    superimpose::superimpose(&mut context)?;

    for handler in handlers::enabled_handlers(config) {
        debug!(handler = handler.name(), "running conflict handler");
        handler.handle(&mut context)?;
    }

    context.output = printer::emit(&context.super_tree);
    context.has_conflict = diff3::contains_conflict_marker(&context.output);
    Ok(context)
}

/// Line-based merge only, for files outside the host language.
pub fn merge_contents_unstructured(
    left: &str,
    base: &str,
    right: &str,
    config: &MergeConfig,
) -> Result<MergeContext, TextualMergeError> {
    let mut context = MergeContext::new(config.clone());
    if let Some(result) = fast_forward(left, base, right) {
        context.unstructured_output = result.to_string();
        context.output = result.to_string();
        return Ok(context);
    }
    let merged = diff3::merge(left, base, right, config.ignore_whitespace_change)?;
    context.unstructured_output = merged.text.clone();
    context.unstructured_has_conflict = merged.has_conflict;
    context.output = merged.text;
    context.has_conflict = merged.has_conflict;
    context.structured_fallback = true;
    Ok(context)
}

fn fast_forward<'a>(left: &'a str, base: &'a str, right: &'a str) -> Option<&'a str> {
    if base == right {
        return Some(left);
    }
    if base == left {
        return Some(right);
    }
    if left == right {
        return Some(left);
    }
    None
}
