//! File and directory level merge orchestration.
//!
//! Pairs revisions on disk, dispatches host-language files to the
//! semistructured pipeline and everything else to the plain line merge,
//! and aggregates per-file outcomes. A fatal error aborts only the file it
//! occurred in; directory merges continue with the remaining files.

use std::collections::BTreeSet;
use std::error::Error;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::info;
use walkdir::WalkDir;

use crate::config::MergeConfig;
use crate::context::MergeContext;
use crate::diff3::TextualMergeError;
use crate::merger;
use crate::stats::{FileReport, ScenarioReport};

/// File extensions the declaration scanner understands. Anything else is
/// merged line-based, markers preserved.
pub const HOST_EXTENSIONS: &[&str] = &["java"];

/// Errors surfaced by the file-level API.
#[derive(Debug)]
pub enum MergeError {
    /// Missing or unreadable input, or an invalid revisions file.
    Input(String),
    Io(PathBuf, io::Error),
    Textual(TextualMergeError),
}

impl fmt::Display for MergeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MergeError::Input(msg) => write!(f, "invalid input: {}", msg),
            MergeError::Io(path, e) => write!(f, "{}: {}", path.display(), e),
            MergeError::Textual(e) => write!(f, "{}", e),
        }
    }
}

impl Error for MergeError {}

impl From<TextualMergeError> for MergeError {
    fn from(e: TextualMergeError) -> Self {
        MergeError::Textual(e)
    }
}

/// Outcome of merging one file of a directory scenario.
#[derive(Debug)]
pub struct FileMergeOutcome {
    pub relative: PathBuf,
    pub context: Result<MergeContext, MergeError>,
}

/// A revisions-file scenario: three revision directories merged pairwise
/// by relative path.
#[derive(Debug)]
pub struct Scenario {
    pub left_dir: PathBuf,
    pub base_dir: PathBuf,
    pub right_dir: PathBuf,
    pub outcomes: Vec<FileMergeOutcome>,
}

/// Three-way merge of the given files. Absent revisions are treated as
/// empty files; `output` is written on success when given.
pub fn merge_files(
    left: Option<&Path>,
    base: Option<&Path>,
    right: Option<&Path>,
    output: Option<&Path>,
    config: &MergeConfig,
) -> Result<MergeContext, MergeError> {
    if left.is_none() && base.is_none() && right.is_none() {
        return Err(MergeError::Input("no input files given".into()));
    }

    let left_text = read_revision(left)?;
    let base_text = read_revision(base)?;
    let right_text = read_revision(right)?;

    let structured = [left, base, right]
        .iter()
        .flatten()
        .any(|p| is_host_language(p));

    info!(
        left = %display_or_empty(left),
        base = %display_or_empty(base),
        right = %display_or_empty(right),
        structured,
        "merging files"
    );

    let context = if structured {
        merger::merge_contents(&left_text, &base_text, &right_text, config)?
    } else {
        merger::merge_contents_unstructured(&left_text, &base_text, &right_text, config)?
    };

    if let Some(out_path) = output {
        if let Some(parent) = out_path.parent() {
            fs::create_dir_all(parent).map_err(|e| MergeError::Io(parent.to_path_buf(), e))?;
        }
        fs::write(out_path, &context.output)
            .map_err(|e| MergeError::Io(out_path.to_path_buf(), e))?;
    }
    Ok(context)
}

/// Merge three directory trees, pairing files by relative path. Missing
/// paths on a side are treated as empty files. Per-file failures do not
/// stop the remaining files.
pub fn merge_directories(
    left_dir: &Path,
    base_dir: &Path,
    right_dir: &Path,
    output_dir: Option<&Path>,
    config: &MergeConfig,
) -> Result<Vec<FileMergeOutcome>, MergeError> {
    for dir in [left_dir, base_dir, right_dir] {
        if !dir.is_dir() {
            return Err(MergeError::Input(format!(
                "not a directory: {}",
                dir.display()
            )));
        }
    }

    let mut relative_paths: BTreeSet<PathBuf> = BTreeSet::new();
    for root in [left_dir, base_dir, right_dir] {
        for entry in WalkDir::new(root).into_iter().filter_map(|e| e.ok()) {
            if entry.file_type().is_file() {
                if let Ok(rel) = entry.path().strip_prefix(root) {
                    relative_paths.insert(rel.to_path_buf());
                }
            }
        }
    }

    let mut outcomes = Vec::new();
    for relative in relative_paths {
        let left = existing(left_dir.join(&relative));
        let base = existing(base_dir.join(&relative));
        let right = existing(right_dir.join(&relative));
        let output = output_dir.map(|d| d.join(&relative));

        let context = merge_files(
            left.as_deref(),
            base.as_deref(),
            right.as_deref(),
            output.as_deref(),
            config,
        );
        outcomes.push(FileMergeOutcome { relative, context });
    }
    Ok(outcomes)
}

/// Merge the scenario described by a `.revisions` file: three lines naming
/// the left, base and right revision directories, relative to the file's
/// parent.
pub fn merge_revisions(revisions_path: &Path, config: &MergeConfig) -> Result<Scenario, MergeError> {
    let text = fs::read_to_string(revisions_path)
        .map_err(|e| MergeError::Io(revisions_path.to_path_buf(), e))?;
    let lines: Vec<&str> = text.lines().filter(|l| !l.trim().is_empty()).collect();
    if lines.len() != 3 {
        return Err(MergeError::Input(format!(
            "revisions file {} must list exactly three directories",
            revisions_path.display()
        )));
    }

    let parent = revisions_path.parent().unwrap_or_else(|| Path::new("."));
    let left_dir = parent.join(lines[0].trim());
    let base_dir = parent.join(lines[1].trim());
    let right_dir = parent.join(lines[2].trim());

    let outcomes = merge_directories(&left_dir, &base_dir, &right_dir, None, config)?;
    Ok(Scenario {
        left_dir,
        base_dir,
        right_dir,
        outcomes,
    })
}

/// Summarize directory-merge outcomes for reporting.
pub fn report(outcomes: &[FileMergeOutcome]) -> ScenarioReport {
    let mut scenario = ScenarioReport::default();
    for outcome in outcomes {
        match &outcome.context {
            Ok(context) => scenario.push(FileReport {
                path: outcome.relative.display().to_string(),
                has_conflict: context.has_conflict,
                structured_fallback: context.structured_fallback,
                stats: context.stats.clone(),
            }),
            Err(_) => scenario
                .failed_files
                .push(outcome.relative.display().to_string()),
        }
    }
    scenario
}

pub fn is_host_language(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| HOST_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

fn read_revision(path: Option<&Path>) -> Result<String, MergeError> {
    match path {
        None => Ok(String::new()),
        Some(p) => {
            let bytes = fs::read(p).map_err(|e| MergeError::Io(p.to_path_buf(), e))?;
            Ok(String::from_utf8_lossy(&bytes).into_owned())
        }
    }
}

fn existing(path: PathBuf) -> Option<PathBuf> {
    path.is_file().then_some(path)
}

fn display_or_empty(path: Option<&Path>) -> String {
    path.map(|p| p.display().to_string())
        .unwrap_or_else(|| "<empty>".into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn write(dir: &Path, rel: &str, content: &str) -> PathBuf {
        let path = dir.join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_merge_files_writes_output() {
        let tmp = TempDir::new().unwrap();
        let base = write(tmp.path(), "Base.java", "class C {\n  void a() {\n    x = 1;\n  }\n}\n");
        let left = write(tmp.path(), "Left.java", "class C {\n  void a() {\n    x = 2;\n  }\n}\n");
        let right = write(tmp.path(), "Right.java", "class C {\n  void a() {\n    x = 1;\n  }\n  void b() {\n    y();\n  }\n}\n");
        let out = tmp.path().join("out/Merged.java");

        let context = merge_files(
            Some(&left),
            Some(&base),
            Some(&right),
            Some(&out),
            &MergeConfig::default(),
        )
        .unwrap();
        assert!(!context.has_conflict);
        let written = fs::read_to_string(&out).unwrap();
        assert_eq!(written, context.output);
        assert!(written.contains("x = 2;"));
        assert!(written.contains("void b()"));
    }

    #[test]
    fn test_missing_side_is_empty_file() {
        let tmp = TempDir::new().unwrap();
        let base = write(tmp.path(), "Base.java", "class C {\n}\n");
        let left = write(tmp.path(), "Left.java", "class C {\n}\n");

        let context = merge_files(
            Some(&left),
            Some(&base),
            None,
            None,
            &MergeConfig::default(),
        )
        .unwrap();
        // Right deleted the file and left kept it untouched: deletion wins.
        assert_eq!(context.output, "");
    }

    #[test]
    fn test_unreadable_input_is_an_error() {
        let tmp = TempDir::new().unwrap();
        let missing = tmp.path().join("Nope.java");
        let result = merge_files(
            Some(&missing),
            None,
            None,
            None,
            &MergeConfig::default(),
        );
        assert!(matches!(result, Err(MergeError::Io(_, _))));
    }

    #[test]
    fn test_non_host_files_use_line_merge() {
        let tmp = TempDir::new().unwrap();
        let base = write(tmp.path(), "notes.txt", "a\nb\nc\n");
        let left = write(tmp.path(), "left.txt", "A\nb\nc\n");
        let right = write(tmp.path(), "right.txt", "a\nb\nC\n");

        let context = merge_files(
            Some(&left),
            Some(&base),
            Some(&right),
            None,
            &MergeConfig::default(),
        )
        .unwrap();
        assert!(context.structured_fallback);
        assert_eq!(context.output, "A\nb\nC\n");
    }

    #[test]
    fn test_merge_directories_pairs_by_relative_path() {
        let tmp = TempDir::new().unwrap();
        let left_dir = tmp.path().join("left");
        let base_dir = tmp.path().join("base");
        let right_dir = tmp.path().join("right");
        let out_dir = tmp.path().join("out");

        write(&base_dir, "p/A.java", "class A {\n  void a() {\n    x = 1;\n  }\n}\n");
        write(&left_dir, "p/A.java", "class A {\n  void a() {\n    x = 2;\n  }\n}\n");
        write(&right_dir, "p/A.java", "class A {\n  void a() {\n    x = 1;\n  }\n}\n");
        // Added only on the right.
        write(&right_dir, "p/B.java", "class B {\n}\n");

        let outcomes = merge_directories(
            &left_dir,
            &base_dir,
            &right_dir,
            Some(&out_dir),
            &MergeConfig::default(),
        )
        .unwrap();

        assert_eq!(outcomes.len(), 2);
        let merged_a = fs::read_to_string(out_dir.join("p/A.java")).unwrap();
        assert!(merged_a.contains("x = 2;"));
        let merged_b = fs::read_to_string(out_dir.join("p/B.java")).unwrap();
        assert!(merged_b.contains("class B"));

        let summary = report(&outcomes);
        assert_eq!(summary.files.len(), 2);
        assert!(!summary.has_conflicts());
    }

    #[test]
    fn test_merge_revisions_scenario() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "rev_left/A.java", "class A {\n  int x = 2;\n}\n");
        write(tmp.path(), "rev_base/A.java", "class A {\n  int x = 1;\n}\n");
        write(tmp.path(), "rev_right/A.java", "class A {\n  int x = 1;\n}\n");
        let revisions = write(tmp.path(), "scenario.revisions", "rev_left\nrev_base\nrev_right\n");

        let scenario = merge_revisions(&revisions, &MergeConfig::default()).unwrap();
        assert_eq!(scenario.outcomes.len(), 1);
        let context = scenario.outcomes[0].context.as_ref().unwrap();
        assert!(context.output.contains("int x = 2;"));
    }

    #[test]
    fn test_invalid_revisions_file() {
        let tmp = TempDir::new().unwrap();
        let revisions = write(tmp.path(), "bad.revisions", "only\ntwo\n");
        let result = merge_revisions(&revisions, &MergeConfig::default());
        assert!(matches!(result, Err(MergeError::Input(_))));
    }
}
