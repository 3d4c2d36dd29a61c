//! Diagnostic counters and merge reports.
//!
//! Counters are per-context (one per file merge) and aggregated at the
//! scenario level, so callers parallelizing across files get correct
//! totals without shared mutable state.

use serde::Serialize;

/// Per-file diagnostic counters, filled by superimposition and handlers.
#[derive(Debug, Default, Clone, Serialize)]
pub struct MergeStats {
    /// Conflicts emitted by the per-body textual merge.
    pub body_conflicts: u32,
    /// Renamings applied silently because the other side left the
    /// declaration untouched.
    pub benign_renames: u32,
    /// Renaming or deletion conflicts (one side renamed or deleted, the
    /// other edited).
    pub renaming_conflicts: u32,
    /// Both sides renamed or deleted the same declaration.
    pub double_renaming_conflicts: u32,
    /// Base methods the renaming handler examined and left alone.
    pub renaming_ignored: u32,
    pub duplicate_declaration_conflicts: u32,
    pub initialization_block_merges: u32,
    pub initialization_block_conflicts: u32,
    pub new_element_conflicts: u32,
    pub type_ambiguity_conflicts: u32,
}

impl MergeStats {
    pub fn absorb(&mut self, other: &MergeStats) {
        self.body_conflicts += other.body_conflicts;
        self.benign_renames += other.benign_renames;
        self.renaming_conflicts += other.renaming_conflicts;
        self.double_renaming_conflicts += other.double_renaming_conflicts;
        self.renaming_ignored += other.renaming_ignored;
        self.duplicate_declaration_conflicts += other.duplicate_declaration_conflicts;
        self.initialization_block_merges += other.initialization_block_merges;
        self.initialization_block_conflicts += other.initialization_block_conflicts;
        self.new_element_conflicts += other.new_element_conflicts;
        self.type_ambiguity_conflicts += other.type_ambiguity_conflicts;
    }
}

/// Outcome summary for one merged file, suitable for JSON reporting.
#[derive(Debug, Clone, Serialize)]
pub struct FileReport {
    pub path: String,
    pub has_conflict: bool,
    /// The structured path failed to parse and the line-based output was
    /// used instead.
    pub structured_fallback: bool,
    pub stats: MergeStats,
}

/// Aggregate over a directory or revisions merge.
#[derive(Debug, Default, Clone, Serialize)]
pub struct ScenarioReport {
    pub files: Vec<FileReport>,
    pub totals: MergeStats,
    pub files_with_conflicts: usize,
    pub failed_files: Vec<String>,
}

impl ScenarioReport {
    pub fn push(&mut self, report: FileReport) {
        self.totals.absorb(&report.stats);
        if report.has_conflict {
            self.files_with_conflicts += 1;
        }
        self.files.push(report);
    }

    pub fn has_conflicts(&self) -> bool {
        self.files_with_conflicts > 0
    }
}
