//! # ssmerge-core
//!
//! Three-way **semistructured merge** for curly-brace, class-based source
//! files. Given a common ancestor and two divergent revisions, the engine
//! produces a merged output that preserves both developers' intents,
//! marking conflicts where intents collide.
//!
//! Line-based merge is oblivious to program structure; a fully structural
//! merge is too rigid around statements and whitespace. Semistructured
//! merge splits the difference: a file is partitioned into a coarse tree
//! of named declarations (types, fields, methods, constructors,
//! initializer blocks, imports), declaration-level edits compose by tree
//! superimposition, and each leaf's body is merged as opaque text with a
//! classic diff3.
//!
//! Superimposition matches declarations by identifier, so it cannot see
//! renamings or deletions: a renamed method looks deleted on one side and
//! added on the other. A suite of conflict handlers post-processes the
//! superimposed tree to recover those cases, the hardest being the
//! method/constructor renaming and deletion handler with its configurable
//! resolution strategies.
//!
//! ## Example
//!
//! ```rust
//! use ssmerge_core::{merger, MergeConfig};
//!
//! let base  = "class C {\n  void greet() {\n    hello();\n  }\n}\n";
//! let left  = "class C {\n  void greet() {\n    hello();\n    wave();\n  }\n}\n";
//! let right = "class C {\n  void greet() {\n    hello();\n  }\n  void bye() { }\n}\n";
//!
//! let context = merger::merge_contents(left, base, right, &MergeConfig::default()).unwrap();
//! assert!(!context.has_conflict);
//! assert!(context.output.contains("wave();"));
//! assert!(context.output.contains("void bye()"));
//! ```

pub mod config;
pub mod context;
pub mod diff3;
pub mod files;
pub mod handlers;
pub mod merger;
pub mod parser;
pub mod printer;
pub mod similarity;
pub mod stats;
pub mod superimpose;
pub mod tree;

// Re-export primary public API
pub use config::{MergeConfig, RenamingStrategy, SIMILARITY_THRESHOLD};
pub use context::{MergeContext, Side};
pub use diff3::{MergedText, TextualMergeError};
pub use files::{
    merge_directories, merge_files, merge_revisions, FileMergeOutcome, MergeError, Scenario,
};
pub use stats::{FileReport, MergeStats, ScenarioReport};
