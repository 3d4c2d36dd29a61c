//! Signature and body comparison primitives.
//!
//! Handlers use these to recover matches that identifier-based
//! superimposition loses: equal signatures catch body-only edits, equal
//! bodies catch pure renames, similar bodies with a signature that differs
//! only in the name catch edited renames, and token containment catches
//! small extractions.
//!
//! Similarity is a normalized edit-distance ratio over
//! whitespace-normalized text, compared against the fixed threshold
//! [`SIMILARITY_THRESHOLD`](crate::config::SIMILARITY_THRESHOLD).

use crate::config::SIMILARITY_THRESHOLD;
use crate::parser::method_signature_parts;
use crate::tree::{Node, TerminalKind};

/// Collapse all whitespace runs to single spaces and trim.
pub fn normalize_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// The text a terminal is compared by: the body block for members that
/// have one, the whole declaration otherwise.
fn comparable_body(node: &Node) -> String {
    match node.terminal_kind() {
        Some(TerminalKind::Method)
        | Some(TerminalKind::Constructor)
        | Some(TerminalKind::InitializerBlock) => normalize_whitespace(node.body()),
        _ => normalize_whitespace(&node.source()),
    }
}

/// Identifier equality modulo whitespace. Identifiers are derived from
/// signatures, so this catches declarations whose headers differ only in
/// formatting or modifiers.
pub fn have_equal_signature(a: &Node, b: &Node) -> bool {
    !a.identifier.is_empty() && a.identifier == b.identifier
}

/// Body equality. With `ignore_whitespace`, whitespace-only differences
/// are treated as absent; otherwise the raw body text must match.
pub fn have_equal_body(a: &Node, b: &Node, ignore_whitespace: bool) -> bool {
    if ignore_whitespace {
        let body_a = comparable_body(a);
        if body_a.is_empty() {
            return false;
        }
        body_a == comparable_body(b)
    } else {
        let (body_a, body_b) = (raw_body(a), raw_body(b));
        !body_a.is_empty() && body_a == body_b
    }
}

fn raw_body(node: &Node) -> String {
    match node.terminal_kind() {
        Some(TerminalKind::Method)
        | Some(TerminalKind::Constructor)
        | Some(TerminalKind::InitializerBlock) => node.body().to_string(),
        _ => node.source(),
    }
}

/// Same parameter list and return type, different name. Only meaningful
/// for methods and constructors.
pub fn have_equal_signature_but_name(a: &Node, b: &Node) -> bool {
    let (Some(pa), Some(pb)) = (
        method_signature_parts(a.signature()),
        method_signature_parts(b.signature()),
    ) else {
        return false;
    };
    pa.name != pb.name && pa.params == pb.params && pa.return_type == pb.return_type
}

/// Normalized similarity of the two bodies at or above the threshold.
pub fn have_similar_body(a: &Node, b: &Node) -> bool {
    body_similarity(a, b) >= SIMILARITY_THRESHOLD
}

/// `1 - levenshtein(a, b) / max(|a|, |b|)` over whitespace-normalized
/// bodies. Empty bodies compare as 1.0 to each other and 0.0 to anything
/// non-empty.
pub fn body_similarity(a: &Node, b: &Node) -> f64 {
    text_similarity(&comparable_body(a), &comparable_body(b))
}

pub fn text_similarity(a: &str, b: &str) -> f64 {
    if a.is_empty() && b.is_empty() {
        return 1.0;
    }
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let a_chars: Vec<char> = a.chars().collect();
    let b_chars: Vec<char> = b.chars().collect();
    let distance = levenshtein(&a_chars, &b_chars);
    1.0 - distance as f64 / a_chars.len().max(b_chars.len()) as f64
}

/// One body's token stream is a contiguous subsequence of the other's.
/// Empty bodies are never considered contained.
pub fn one_contains_the_body_from_the_other(a: &Node, b: &Node) -> bool {
    let body_a = comparable_body(a);
    let body_b = comparable_body(b);
    let ta: Vec<&str> = body_a.split_whitespace().collect();
    let tb: Vec<&str> = body_b.split_whitespace().collect();
    if ta.is_empty() || tb.is_empty() {
        return false;
    }
    contains_subsequence(&ta, &tb) || contains_subsequence(&tb, &ta)
}

fn contains_subsequence(haystack: &[&str], needle: &[&str]) -> bool {
    if needle.len() > haystack.len() {
        return false;
    }
    haystack.windows(needle.len()).any(|w| w == needle)
}

/// Classic two-row dynamic-programming edit distance.
fn levenshtein(a: &[char], b: &[char]) -> usize {
    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }
    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0usize; b.len() + 1];
    for (i, &ca) in a.iter().enumerate() {
        curr[0] = i + 1;
        for (j, &cb) in b.iter().enumerate() {
            let cost = if ca == cb { 0 } else { 1 };
            curr[j + 1] = (prev[j] + cost).min(prev[j + 1] + 1).min(curr[j] + 1);
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[b.len()]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::{NodeData, TerminalKind};

    fn method(identifier: &str, signature: &str, body: &str) -> Node {
        Node {
            identifier: identifier.into(),
            parent: None,
            data: NodeData::Terminal {
                kind: TerminalKind::Method,
                signature: signature.into(),
                body: body.into(),
            },
        }
    }

    #[test]
    fn test_levenshtein_basics() {
        let to_chars = |s: &str| s.chars().collect::<Vec<_>>();
        assert_eq!(levenshtein(&to_chars("test"), &to_chars("test")), 0);
        assert_eq!(levenshtein(&to_chars("test"), &to_chars("tost")), 1);
        assert_eq!(levenshtein(&to_chars("test"), &to_chars("")), 4);
        assert_eq!(levenshtein(&to_chars("kitten"), &to_chars("sitting")), 3);
    }

    #[test]
    fn test_equal_body_modulo_whitespace() {
        let a = method("a()", "void a() ", "{ x = 1; }");
        let b = method("b()", "void b() ", "{\n    x = 1;\n}");
        assert!(have_equal_body(&a, &b, true));
        assert!(!have_equal_body(&a, &b, false));
    }

    #[test]
    fn test_empty_bodies_never_equal() {
        let a = method("a()", "void a();", "");
        let b = method("b()", "void b();", "");
        assert!(!have_equal_body(&a, &b, true));
    }

    #[test]
    fn test_signature_but_name() {
        let a = method("a(int)", "void a(int x) ", "{}");
        let b = method("b(int)", "void b(int y) ", "{}");
        let c = method("c(long)", "void c(long y) ", "{}");
        assert!(have_equal_signature_but_name(&a, &b));
        assert!(!have_equal_signature_but_name(&a, &c));
        assert!(!have_equal_signature_but_name(&a, &a));
    }

    #[test]
    fn test_similarity_threshold_boundary() {
        // Ten characters: two edits give 0.8, three give exactly 0.7 (the
        // threshold counts as similar), four give 0.6.
        let base = "abcdefghij";
        assert!(text_similarity(base, "abcdefghYZ") >= SIMILARITY_THRESHOLD);
        assert!(text_similarity(base, "abcdefgXYZ") >= SIMILARITY_THRESHOLD);
        assert!(text_similarity(base, "abcdefWXYZ") < SIMILARITY_THRESHOLD);
    }

    #[test]
    fn test_empty_body_similarity() {
        assert_eq!(text_similarity("", ""), 1.0);
        assert_eq!(text_similarity("", "x"), 0.0);
    }

    #[test]
    fn test_containment() {
        let small = method("a()", "void a() ", "{ x(); }");
        let big = method("b()", "void b() ", "{ before(); x(); after(); }");
        let other = method("c()", "void c() ", "{ y(); }");
        assert!(one_contains_the_body_from_the_other(&small, &big));
        assert!(!one_contains_the_body_from_the_other(&other, &big));
    }

    #[test]
    fn test_empty_not_contained() {
        let empty = method("a()", "void a();", "");
        let big = method("b()", "void b() ", "{ x(); }");
        assert!(!one_contains_the_body_from_the_other(&empty, &big));
    }
}
