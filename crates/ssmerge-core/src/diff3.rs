//! Three-way textual merge (diff3 algorithm).
//!
//! Line-based merge used both as the body merger for matched terminals and
//! as the unstructured fallback for whole files. Built on the `similar`
//! crate for LCS diffing, following the classic diff3 partitioning of the
//! base into stable and unstable regions.
//!
//! Conflicting regions are emitted with the marker layout
//! `<<<<<<< MINE` / `||||||| BASE` / `=======` / `>>>>>>> YOURS`.

use std::error::Error;
use std::fmt;
use std::ops::Range;

use similar::{DiffOp, TextDiff};

pub const CONFLICT_MINE: &str = "<<<<<<< MINE";
pub const CONFLICT_BASE: &str = "||||||| BASE";
pub const CONFLICT_SEPARATOR: &str = "=======";
pub const CONFLICT_YOURS: &str = ">>>>>>> YOURS";

/// Result of a three-way textual merge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergedText {
    pub text: String,
    pub has_conflict: bool,
}

/// Internal failure of the line merge. The merge itself never fails on
/// ordinary input; this exists so callers can bubble faults from body
/// re-merges without inventing a second error channel.
#[derive(Debug)]
pub struct TextualMergeError(pub String);

impl fmt::Display for TextualMergeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "textual merge failed: {}", self.0)
    }
}

impl Error for TextualMergeError {}

/// Three-way merge of `left`, `base` and `right`.
///
/// Idempotent (`merge(x, x, x) == x`, no conflicts) and commutative up to
/// marker labels. With `ignore_whitespace` set, lines differing only in
/// whitespace compare as unchanged; the emitted text still uses the
/// original lines.
pub fn merge(
    left: &str,
    base: &str,
    right: &str,
    ignore_whitespace: bool,
) -> Result<MergedText, TextualMergeError> {
    // Fast paths keep the common cases byte-identical to their source.
    if left == right {
        return Ok(MergedText {
            text: left.to_string(),
            has_conflict: false,
        });
    }
    if base == right {
        return Ok(MergedText {
            text: left.to_string(),
            has_conflict: false,
        });
    }
    if base == left {
        return Ok(MergedText {
            text: right.to_string(),
            has_conflict: false,
        });
    }

    let base_lines = split_lines(base);
    let left_lines = split_lines(left);
    let right_lines = split_lines(right);

    let base_cmp = comparable(&base_lines, ignore_whitespace);
    let left_cmp = comparable(&left_lines, ignore_whitespace);
    let right_cmp = comparable(&right_lines, ignore_whitespace);

    let base_cmp_refs: Vec<&str> = base_cmp.iter().map(String::as_str).collect();
    let left_cmp_refs: Vec<&str> = left_cmp.iter().map(String::as_str).collect();
    let right_cmp_refs: Vec<&str> = right_cmp.iter().map(String::as_str).collect();

    let diff_left = TextDiff::from_slices(&base_cmp_refs, &left_cmp_refs);
    let diff_right = TextDiff::from_slices(&base_cmp_refs, &right_cmp_refs);
    let left_ops: Vec<DiffOp> = diff_left.ops().to_vec();
    let right_ops: Vec<DiffOp> = diff_right.ops().to_vec();

    let clusters = cluster_changes(&left_ops, &right_ops);

    let mut out: Vec<&str> = Vec::new();
    let mut has_conflict = false;
    let mut pos = 0usize;

    for cluster in &clusters {
        out.extend(&base_lines[pos..cluster.old.start]);
        pos = cluster.old.end;

        let left_range = side_range(&left_ops, cluster, SideTag::Left);
        let right_range = side_range(&right_ops, cluster, SideTag::Right);

        match (cluster.left_changed, cluster.right_changed) {
            (true, false) => out.extend(&left_lines[left_range]),
            (false, true) => out.extend(&right_lines[right_range]),
            (true, true) => {
                if left_cmp[left_range.clone()] == right_cmp[right_range.clone()] {
                    // Both sides made the same change.
                    out.extend(&left_lines[left_range]);
                } else {
                    has_conflict = true;
                    out.push(CONFLICT_MINE);
                    out.extend(&left_lines[left_range]);
                    out.push(CONFLICT_BASE);
                    out.extend(&base_lines[cluster.old.clone()]);
                    out.push(CONFLICT_SEPARATOR);
                    out.extend(&right_lines[right_range]);
                    out.push(CONFLICT_YOURS);
                }
            }
            (false, false) => out.extend(&base_lines[cluster.old.clone()]),
        }
    }
    out.extend(&base_lines[pos..]);

    let eol = predominant_eol(&[left, base, right]);
    let mut text = out.join(eol);
    if !text.is_empty() && merged_trailing_newline(left, base, right) {
        text.push_str(eol);
    }

    Ok(MergedText { text, has_conflict })
}

/// Whether the text contains at least one merge conflict marker.
pub fn contains_conflict_marker(text: &str) -> bool {
    text.lines().any(|l| {
        l.starts_with("<<<<<<<") || l.starts_with(">>>>>>>") || l == CONFLICT_SEPARATOR
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SideTag {
    Left,
    Right,
}

/// A run of base lines changed by at least one side, with the union extent
/// over both sides' edits.
#[derive(Debug)]
struct Cluster {
    old: Range<usize>,
    left_changed: bool,
    right_changed: bool,
    /// Union of the sides' replacement ranges, per side.
    left_new: Option<Range<usize>>,
    right_new: Option<Range<usize>>,
}

fn changed_chunks(ops: &[DiffOp], side: SideTag) -> Vec<(SideTag, Range<usize>, Range<usize>)> {
    ops.iter()
        .filter(|op| !matches!(op, DiffOp::Equal { .. }))
        .map(|op| (side, op.old_range(), op.new_range()))
        .collect()
}

/// Group overlapping change regions from both sides into clusters over the
/// base. Insertions (empty base ranges) only collide when both sides insert
/// at the same point; an insertion at the edge of the other side's changed
/// region stays independent and is emitted before it.
fn cluster_changes(left_ops: &[DiffOp], right_ops: &[DiffOp]) -> Vec<Cluster> {
    let mut chunks = changed_chunks(left_ops, SideTag::Left);
    chunks.extend(changed_chunks(right_ops, SideTag::Right));
    chunks.sort_by_key(|(_, old, _)| (old.start, old.end));

    let mut clusters: Vec<Cluster> = Vec::new();
    for (side, old, new) in chunks {
        let joins = clusters.last().is_some_and(|c| {
            let proper = old.start < c.old.end && c.old.start < old.end;
            let both_empty_same_point =
                old.start == old.end && c.old.start == c.old.end && old.start == c.old.start;
            proper || both_empty_same_point
        });
        if joins {
            let cluster = clusters.last_mut().unwrap();
            cluster.old.start = cluster.old.start.min(old.start);
            cluster.old.end = cluster.old.end.max(old.end);
            match side {
                SideTag::Left => {
                    cluster.left_changed = true;
                    cluster.left_new = Some(union(cluster.left_new.take(), new));
                }
                SideTag::Right => {
                    cluster.right_changed = true;
                    cluster.right_new = Some(union(cluster.right_new.take(), new));
                }
            }
        } else {
            clusters.push(Cluster {
                old,
                left_changed: side == SideTag::Left,
                right_changed: side == SideTag::Right,
                left_new: (side == SideTag::Left).then(|| new.clone()),
                right_new: (side == SideTag::Right).then_some(new),
            });
        }
    }
    clusters
}

fn union(a: Option<Range<usize>>, b: Range<usize>) -> Range<usize> {
    match a {
        Some(a) => a.start.min(b.start)..a.end.max(b.end),
        None => b,
    }
}

/// Map a cluster's base extent onto one side's line range.
fn side_range(ops: &[DiffOp], cluster: &Cluster, side: SideTag) -> Range<usize> {
    let mapped = old_to_new(ops, cluster.old.start)..old_to_new(ops, cluster.old.end);
    let own = match side {
        SideTag::Left => &cluster.left_new,
        SideTag::Right => &cluster.right_new,
    };
    match own {
        Some(new) => union(Some(mapped), new.clone()),
        None => mapped,
    }
}

/// Translate a base line boundary into the corresponding boundary on the
/// changed side. Boundaries at an insertion point resolve to the position
/// before the inserted lines; the caller widens with the cluster's own
/// replacement ranges where the insertion belongs to the cluster.
fn old_to_new(ops: &[DiffOp], pos: usize) -> usize {
    for op in ops {
        let old = op.old_range();
        let new = op.new_range();
        if pos < old.end || (pos == old.end && matches!(op, DiffOp::Equal { .. })) {
            if pos <= old.start {
                return new.start;
            }
            if matches!(op, DiffOp::Equal { .. }) {
                return new.start + (pos - old.start);
            }
            return new.start;
        }
    }
    ops.last().map(|op| op.new_range().end).unwrap_or(0)
}

fn split_lines(s: &str) -> Vec<&str> {
    s.lines().collect()
}

fn comparable(lines: &[&str], ignore_whitespace: bool) -> Vec<String> {
    lines
        .iter()
        .map(|l| {
            if ignore_whitespace {
                l.split_whitespace().collect::<Vec<_>>().join(" ")
            } else {
                (*l).to_string()
            }
        })
        .collect()
}

/// Line endings of the output follow the inputs' predominant style.
fn predominant_eol(inputs: &[&str]) -> &'static str {
    let crlf: usize = inputs.iter().map(|s| s.matches("\r\n").count()).sum();
    let lf: usize = inputs
        .iter()
        .map(|s| s.matches('\n').count())
        .sum::<usize>()
        - crlf;
    if crlf > lf {
        "\r\n"
    } else {
        "\n"
    }
}

/// Three-way merge of the trailing-newline bit.
fn merged_trailing_newline(left: &str, base: &str, right: &str) -> bool {
    let l = left.ends_with('\n');
    let b = base.ends_with('\n');
    let r = right.ends_with('\n');
    if l == b {
        r
    } else {
        l
    }
}
