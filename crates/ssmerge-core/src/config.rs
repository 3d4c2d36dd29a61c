//! Merge configuration.
//!
//! A single immutable value built once (by the CLI or by library callers)
//! and threaded read-only through the whole pipeline. Handlers and the
//! renaming strategy are selected here; nothing in the engine consults
//! global state.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Similarity threshold separating "similar" from "dissimilar" bodies.
/// A typical value of 0.7 (up to 1.0) is used; increase it for a more
/// accurate comparison, or decrease it for a more relaxed one.
pub const SIMILARITY_THRESHOLD: f64 = 0.7;

/// Policy applied by the renaming handler when a renaming or deletion
/// collides with an edit on the other side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RenamingStrategy {
    /// Report a conflict block listing every involved variant.
    Safe,
    /// Keep the renamed and the edited version as siblings.
    KeepBoth,
    /// Textually merge the variants under the renamed identifier.
    Merge,
    /// Splice in the corresponding hunk of the line-based merge output.
    UnstructuredMerge,
}

impl FromStr for RenamingStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "safe" => Ok(RenamingStrategy::Safe),
            "keep-both" | "keepboth" | "keep_both" => Ok(RenamingStrategy::KeepBoth),
            "merge" => Ok(RenamingStrategy::Merge),
            "unstructured" | "unstructured-merge" | "unstructured_merge" => {
                Ok(RenamingStrategy::UnstructuredMerge)
            }
            other => Err(format!("unknown renaming strategy: {}", other)),
        }
    }
}

impl fmt::Display for RenamingStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RenamingStrategy::Safe => write!(f, "safe"),
            RenamingStrategy::KeepBoth => write!(f, "keep-both"),
            RenamingStrategy::Merge => write!(f, "merge"),
            RenamingStrategy::UnstructuredMerge => write!(f, "unstructured-merge"),
        }
    }
}

/// Process-wide merge configuration, immutable after construction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MergeConfig {
    /// Strategy for renaming and deletion conflicts.
    pub renaming_strategy: RenamingStrategy,
    /// Detect declarations with the same signature added to different
    /// areas of the same type.
    pub handle_duplicate_declarations: bool,
    /// Match identifier-less initialization blocks by textual similarity.
    pub handle_initialization_blocks: bool,
    /// Detect new elements that reference an element edited by the
    /// opposite contribution.
    pub handle_new_element_referencing_edited_one: bool,
    /// Recover method and constructor renamings or deletions that
    /// identifier-based matching loses.
    pub handle_method_and_constructor_renaming_deletion: bool,
    /// Detect import statements that bring in distinct types with the
    /// same simple name.
    pub handle_type_ambiguity: bool,
    /// Treat whitespace-only line changes as unchanged during merge.
    pub ignore_whitespace_change: bool,
}

impl Default for MergeConfig {
    fn default() -> Self {
        Self {
            renaming_strategy: RenamingStrategy::Safe,
            handle_duplicate_declarations: true,
            handle_initialization_blocks: true,
            handle_new_element_referencing_edited_one: true,
            handle_method_and_constructor_renaming_deletion: true,
            handle_type_ambiguity: true,
            ignore_whitespace_change: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strategy_parsing() {
        assert_eq!(
            "safe".parse::<RenamingStrategy>().unwrap(),
            RenamingStrategy::Safe
        );
        assert_eq!(
            "keep-both".parse::<RenamingStrategy>().unwrap(),
            RenamingStrategy::KeepBoth
        );
        assert_eq!(
            "MERGE".parse::<RenamingStrategy>().unwrap(),
            RenamingStrategy::Merge
        );
        assert!("argmax".parse::<RenamingStrategy>().is_err());
    }

    #[test]
    fn test_defaults_enable_all_handlers() {
        let config = MergeConfig::default();
        assert!(config.handle_duplicate_declarations);
        assert!(config.handle_initialization_blocks);
        assert!(config.handle_new_element_referencing_edited_one);
        assert!(config.handle_method_and_constructor_renaming_deletion);
        assert!(config.handle_type_ambiguity);
        assert_eq!(config.renaming_strategy, RenamingStrategy::Safe);
    }
}
