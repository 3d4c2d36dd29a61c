//! Declaration scanner for curly-brace, class-based source files.
//!
//! Produces the coarse declaration tree the merge works on: packages,
//! imports, type declarations and their members. Bodies are captured as
//! opaque text slices of the input, so serializing an unmodified tree
//! reproduces the file byte for byte.
//!
//! The scanner is not a full parser. It masks comments and literals, then
//! tracks brace/paren/bracket nesting to find member boundaries. Anything
//! it cannot classify becomes an `Other` terminal, keeping the tree
//! lossless. Whitespace-equivalent inputs yield identifier-identical
//! trees.

use std::error::Error;
use std::fmt;

use crate::similarity::normalize_whitespace;
use crate::tree::{ContainerKind, NodeId, TerminalKind, Tree};

/// Failure to partition a file into declarations. The driver falls back to
/// the unstructured merge output when this is raised.
#[derive(Debug)]
pub enum ParseError {
    /// A brace group never closes (or closes too early).
    UnbalancedBraces { offset: usize },
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseError::UnbalancedBraces { offset } => {
                write!(f, "unbalanced braces near offset {}", offset)
            }
        }
    }
}

impl Error for ParseError {}

const MODIFIERS: &[&str] = &[
    "public",
    "protected",
    "private",
    "static",
    "final",
    "abstract",
    "synchronized",
    "native",
    "strictfp",
    "transient",
    "volatile",
    "default",
];

/// Parse a source file into its declaration tree.
pub fn parse(source: &str) -> Result<Tree, ParseError> {
    let masked = mask(source);
    let mut tree = Tree::new();
    let chars: Vec<char> = source.chars().collect();
    let masked_chars: Vec<char> = masked.chars().collect();

    let root = tree.root();
    let trailing = parse_members(&mut tree, root, &chars, &masked_chars, 0, chars.len(), None)?;
    let footer: String = chars[trailing..].iter().collect();
    if let crate::tree::NodeData::Container { footer: f, .. } = &mut tree.node_mut(root).data {
        *f = footer;
    }

    // The compilation unit is identified by its package, when present.
    if let Some(pkg) = package_name(&tree) {
        tree.node_mut(root).identifier = pkg;
    }
    Ok(tree)
}

fn package_name(tree: &Tree) -> Option<String> {
    for id in tree.children(tree.root()) {
        let node = tree.node(*id);
        if node.identifier == "package" {
            let text = normalize_whitespace(&mask(&node.source()));
            let name = text
                .strip_prefix("package")?
                .trim()
                .trim_end_matches(';')
                .trim()
                .to_string();
            return Some(name);
        }
    }
    None
}

/// Parse the members of `range` into children of `parent`. Returns the
/// offset where trailing trivia (text after the last member) begins, so
/// the caller can fold it into the enclosing footer.
fn parse_members(
    tree: &mut Tree,
    parent: NodeId,
    src: &[char],
    masked: &[char],
    start: usize,
    end: usize,
    enclosing_type: Option<&str>,
) -> Result<usize, ParseError> {
    let mut pos = start;
    loop {
        if masked[pos..end].iter().all(|c| c.is_whitespace()) {
            return Ok(pos);
        }
        pos = parse_member(tree, parent, src, masked, pos, end, enclosing_type)?;
    }
}

/// Scan one member starting at `pos` (leading trivia included) and add it
/// to the tree. Returns the offset just past the member.
fn parse_member(
    tree: &mut Tree,
    parent: NodeId,
    src: &[char],
    masked: &[char],
    pos: usize,
    end: usize,
    enclosing_type: Option<&str>,
) -> Result<usize, ParseError> {
    let mut paren = 0i32;
    let mut brace = 0i32;
    let mut bracket = 0i32;
    let mut eq_at: Option<usize> = None;

    let mut i = pos;
    while i < end {
        let c = masked[i];
        let at_top = paren == 0 && brace == 0 && bracket == 0;
        match c {
            '(' => paren += 1,
            ')' => paren -= 1,
            '[' => bracket += 1,
            ']' => bracket -= 1,
            '=' if at_top && eq_at.is_none() => eq_at = Some(i),
            ';' if at_top => {
                let stop = if let Some(eq) = eq_at { eq } else { i };
                add_blockless(tree, parent, src, masked, pos, i, stop, enclosing_type, eq_at.is_some());
                return Ok(i + 1);
            }
            '{' if at_top && eq_at.is_none() => {
                return parse_block_member(tree, parent, src, masked, pos, i, end, enclosing_type);
            }
            '{' => brace += 1,
            '}' if at_top => return Err(ParseError::UnbalancedBraces { offset: i }),
            '}' => brace -= 1,
            _ => {}
        }
        i += 1;
    }
    Err(ParseError::UnbalancedBraces { offset: pos })
}

/// A member ending in `;` with no block: package, import, field, or an
/// abstract method declaration.
#[allow(clippy::too_many_arguments)]
fn add_blockless(
    tree: &mut Tree,
    parent: NodeId,
    src: &[char],
    masked: &[char],
    start: usize,
    semi: usize,
    decl_stop: usize,
    enclosing_type: Option<&str>,
    has_initializer: bool,
) {
    let text: String = src[start..=semi].iter().collect();
    let masked_decl: String = masked[start..decl_stop].iter().collect();
    let first = first_word(&masked_decl);

    if enclosing_type.is_none() {
        match first.as_deref() {
            Some("package") => {
                tree.add_terminal(parent, TerminalKind::Other, "package".into(), text, String::new());
            }
            Some("import") => {
                let id = normalize_whitespace(&masked[start..=semi].iter().collect::<String>());
                tree.add_terminal(parent, TerminalKind::Import, id, text, String::new());
            }
            _ => {
                let id = normalize_whitespace(&masked[start..=semi].iter().collect::<String>());
                tree.add_terminal(parent, TerminalKind::Other, id, text, String::new());
            }
        }
        return;
    }

    if !has_initializer {
        if let Some(parts) = method_signature_parts(&masked_decl) {
            let kind = classify_callable(&parts, enclosing_type);
            tree.add_terminal(parent, kind, parts.identifier(), text, String::new());
            return;
        }
    }

    let name = declarator_name(&masked_decl);
    tree.add_terminal(parent, TerminalKind::Field, name, text, String::new());
}

/// A member whose declaration reaches a top-level `{`: a nested type, a
/// method or constructor, an initializer block, or an unclassifiable raw
/// region.
fn parse_block_member(
    tree: &mut Tree,
    parent: NodeId,
    src: &[char],
    masked: &[char],
    start: usize,
    open: usize,
    _end: usize,
    enclosing_type: Option<&str>,
) -> Result<usize, ParseError> {
    let close = match_brace(masked, open)?;
    let header_masked: String = masked[start..open].iter().collect();

    if let Some((kind, name)) = type_declaration(&header_masked) {
        let header: String = src[start..=open].iter().collect();
        let container = tree.add_container(parent, kind, name.clone(), header, String::new());

        let body_start = open + 1;
        let trailing = if kind == ContainerKind::Enum {
            let constants_end = parse_enum_constants(tree, container, src, masked, body_start, close);
            parse_members(tree, container, src, masked, constants_end, close, Some(&name))?
        } else {
            parse_members(tree, container, src, masked, body_start, close, Some(&name))?
        };

        let footer: String = src[trailing..=close].iter().collect();
        if let crate::tree::NodeData::Container { footer: f, .. } = &mut tree.node_mut(container).data
        {
            *f = footer;
        }
        return Ok(close + 1);
    }

    let signature: String = src[start..open].iter().collect();
    let body: String = src[open..=close].iter().collect();

    if enclosing_type.is_some() {
        if let Some(parts) = method_signature_parts(&header_masked) {
            let kind = classify_callable(&parts, enclosing_type);
            tree.add_terminal(parent, kind, parts.identifier(), signature, body);
            return Ok(close + 1);
        }
        let header_words = words(&header_masked);
        if header_words.iter().all(|w| MODIFIERS.contains(&w.as_str())) {
            // Identifier-less block: identified by its own (comment-blind,
            // whitespace-normalized) content.
            let id = normalize_whitespace(&masked[start..=close].iter().collect::<String>());
            tree.add_terminal(parent, TerminalKind::InitializerBlock, id, signature, body);
            return Ok(close + 1);
        }
    }

    let id = normalize_whitespace(&masked[start..=close].iter().collect::<String>());
    tree.add_terminal(parent, TerminalKind::Other, id, signature, body);
    Ok(close + 1)
}

/// Enum bodies start with a constant list, terminated by `;` or by the
/// body's closing brace. The list is kept as one opaque region.
fn parse_enum_constants(
    tree: &mut Tree,
    parent: NodeId,
    src: &[char],
    masked: &[char],
    start: usize,
    body_end: usize,
) -> usize {
    let mut depth = 0i32;
    let mut i = start;
    while i < body_end {
        match masked[i] {
            '{' | '(' | '[' => depth += 1,
            '}' | ')' | ']' => depth -= 1,
            ';' if depth == 0 => break,
            _ => {}
        }
        i += 1;
    }
    let stop = if i < body_end { i + 1 } else { body_end };
    if masked[start..stop].iter().any(|c| !c.is_whitespace()) {
        let text: String = src[start..stop].iter().collect();
        tree.add_terminal(
            parent,
            TerminalKind::Other,
            "<enum constants>".into(),
            text,
            String::new(),
        );
    }
    stop
}

fn match_brace(masked: &[char], open: usize) -> Result<usize, ParseError> {
    let mut depth = 0i32;
    for (i, &c) in masked.iter().enumerate().skip(open) {
        match c {
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Ok(i);
                }
            }
            _ => {}
        }
    }
    Err(ParseError::UnbalancedBraces { offset: open })
}

/// `class` / `interface` / `enum` keyword in a declaration header, with the
/// declared name.
fn type_declaration(header: &str) -> Option<(ContainerKind, String)> {
    let tokens = words(header);
    for (i, token) in tokens.iter().enumerate() {
        let kind = match token.as_str() {
            "class" => ContainerKind::Class,
            "interface" => ContainerKind::Interface,
            "enum" => ContainerKind::Enum,
            _ => continue,
        };
        let name = tokens.get(i + 1)?;
        let name = name.split('<').next().unwrap_or(name).to_string();
        if name.is_empty() {
            return None;
        }
        return Some((kind, name));
    }
    None
}

fn classify_callable(parts: &SignatureParts, enclosing_type: Option<&str>) -> TerminalKind {
    if parts.return_type.is_empty() && Some(parts.name.as_str()) == enclosing_type {
        TerminalKind::Constructor
    } else {
        TerminalKind::Method
    }
}

/// Name of the first declarator in a field declaration: the last word
/// before the initializer or the terminating semicolon.
fn declarator_name(decl: &str) -> String {
    words(decl)
        .last()
        .map(|w| w.trim_end_matches("[]").to_string())
        .unwrap_or_default()
}

fn first_word(text: &str) -> Option<String> {
    words(text).into_iter().next()
}

fn words(text: &str) -> Vec<String> {
    text.split_whitespace().map(|w| w.to_string()).collect()
}

// ── signature analysis ──────────────────────────────────────────

/// Structural pieces of a method or constructor signature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct SignatureParts {
    pub name: String,
    /// Parameter types, whitespace-stripped.
    pub params: Vec<String>,
    /// Return type text; empty for constructors.
    pub return_type: String,
}

impl SignatureParts {
    /// The identifier this signature derives: `name(type,type,...)`.
    pub fn identifier(&self) -> String {
        format!("{}({})", self.name, self.params.join(","))
    }
}

/// Decompose a declaration header into name, parameter types and return
/// type. Returns `None` when the header has no callable shape (no
/// parameter list). Annotations and leading type parameters are skipped.
pub(crate) fn method_signature_parts(signature: &str) -> Option<SignatureParts> {
    let masked = mask(signature);
    let b: Vec<char> = masked.chars().collect();
    let n = b.len();

    let mut i = 0;
    let mut last_word: Option<String> = None;
    let mut preceding: Vec<String> = Vec::new();

    while i < n {
        let c = b[i];
        if c == '@' {
            i += 1;
            while i < n && is_word_char(b[i]) {
                i += 1;
            }
            let mut j = i;
            while j < n && b[j].is_whitespace() {
                j += 1;
            }
            if j < n && b[j] == '(' {
                i = skip_group(&b, j, '(', ')')? + 1;
            }
            continue;
        }
        if is_word_char(c) {
            let start = i;
            while i < n && is_word_char(b[i]) {
                i += 1;
            }
            if let Some(prev) = last_word.take() {
                preceding.push(prev);
            }
            last_word = Some(b[start..i].iter().collect());
            continue;
        }
        if c == '<' {
            let close = skip_group(&b, i, '<', '>')?;
            if let Some(word) = last_word.as_mut() {
                // Generic suffix belongs to the preceding token
                // (e.g. a parameterized return type).
                word.push_str(&b[i..=close].iter().collect::<String>());
            }
            i = close + 1;
            continue;
        }
        if c == '(' {
            let name = last_word?;
            let close = skip_group(&b, i, '(', ')')?;
            let params = parse_param_types(&b[i + 1..close]);
            let return_type = preceding
                .iter()
                .filter(|w| !MODIFIERS.contains(&w.as_str()))
                .cloned()
                .collect::<Vec<_>>()
                .join(" ");
            return Some(SignatureParts {
                name,
                params,
                return_type,
            });
        }
        i += 1;
    }
    None
}

/// Split a parameter list on top-level commas and reduce each parameter to
/// its type, dropping modifiers and the parameter name.
fn parse_param_types(params: &[char]) -> Vec<String> {
    let mut out = Vec::new();
    let mut depth = 0i32;
    let mut current = String::new();
    for &c in params {
        match c {
            '<' | '(' | '[' => depth += 1,
            '>' | ')' | ']' => depth -= 1,
            ',' if depth == 0 => {
                if let Some(ty) = param_type(&current) {
                    out.push(ty);
                }
                current.clear();
                continue;
            }
            _ => {}
        }
        current.push(c);
    }
    if let Some(ty) = param_type(&current) {
        out.push(ty);
    }
    out
}

fn param_type(param: &str) -> Option<String> {
    let tokens: Vec<&str> = param
        .split_whitespace()
        .filter(|t| !MODIFIERS.contains(t))
        .collect();
    match tokens.len() {
        0 => None,
        1 => Some(tokens[0].replace(' ', "")),
        _ => Some(tokens[..tokens.len() - 1].concat().replace(' ', "")),
    }
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '$' || c == '.' || c == '[' || c == ']'
}

fn skip_group(b: &[char], open: usize, open_c: char, close_c: char) -> Option<usize> {
    let mut depth = 0i32;
    for (i, &c) in b.iter().enumerate().skip(open) {
        if c == open_c {
            depth += 1;
        } else if c == close_c {
            depth -= 1;
            if depth == 0 {
                return Some(i);
            }
        }
    }
    None
}

// ── comment and literal masking ─────────────────────────────────

/// Replace comments and string/char literal contents with spaces, keeping
/// offsets and line structure intact. Structure scanning runs on the
/// masked text; content slices come from the original.
pub(crate) fn mask(source: &str) -> String {
    let chars: Vec<char> = source.chars().collect();
    let mut out: Vec<char> = Vec::with_capacity(chars.len());
    let n = chars.len();
    let mut i = 0;

    while i < n {
        let c = chars[i];
        match c {
            '/' if i + 1 < n && chars[i + 1] == '/' => {
                while i < n && chars[i] != '\n' {
                    out.push(' ');
                    i += 1;
                }
            }
            '/' if i + 1 < n && chars[i + 1] == '*' => {
                out.push(' ');
                out.push(' ');
                i += 2;
                while i < n {
                    if chars[i] == '*' && i + 1 < n && chars[i + 1] == '/' {
                        out.push(' ');
                        out.push(' ');
                        i += 2;
                        break;
                    }
                    out.push(if chars[i] == '\n' { '\n' } else { ' ' });
                    i += 1;
                }
            }
            '"' if i + 2 < n && chars[i + 1] == '"' && chars[i + 2] == '"' => {
                // Text block
                out.extend([' ', ' ', ' ']);
                i += 3;
                while i < n {
                    if chars[i] == '"' && i + 2 < n && chars[i + 1] == '"' && chars[i + 2] == '"' {
                        out.extend([' ', ' ', ' ']);
                        i += 3;
                        break;
                    }
                    out.push(if chars[i] == '\n' { '\n' } else { ' ' });
                    i += 1;
                }
            }
            '"' | '\'' => {
                let quote = c;
                out.push(' ');
                i += 1;
                while i < n {
                    if chars[i] == '\\' && i + 1 < n {
                        out.extend([' ', ' ']);
                        i += 2;
                        continue;
                    }
                    let done = chars[i] == quote;
                    out.push(if chars[i] == '\n' { '\n' } else { ' ' });
                    i += 1;
                    if done {
                        break;
                    }
                }
            }
            _ => {
                out.push(c);
                i += 1;
            }
        }
    }
    out.into_iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::NodeData;

    #[test]
    fn test_mask_hides_comment_braces() {
        let src = "int x; // { not a brace\n/* } neither */ int y;";
        let masked = mask(src);
        assert!(!masked.contains('{'));
        assert!(!masked.contains('}'));
        assert!(masked.contains("int y;"));
        assert_eq!(masked.chars().count(), src.chars().count());
    }

    #[test]
    fn test_mask_hides_string_contents() {
        let src = "String s = \"{;}\";";
        let masked = mask(src);
        assert!(!masked.contains('{'));
        assert!(!masked.contains(';') || masked.ends_with(';'));
    }

    #[test]
    fn test_parse_simple_class() {
        let src = "package com.example;\n\nimport java.util.List;\n\npublic class C {\n    int x = 1;\n    void a() { return; }\n}\n";
        let tree = parse(src).unwrap();
        assert_eq!(tree.node(tree.root()).identifier, "com.example");

        let terminals = tree.collect_terminals();
        let idents: Vec<_> = terminals
            .iter()
            .map(|&t| tree.node(t).identifier.clone())
            .collect();
        assert!(idents.contains(&"package".to_string()));
        assert!(idents.contains(&"import java.util.List;".to_string()));
        assert!(idents.contains(&"x".to_string()));
        assert!(idents.contains(&"a()".to_string()));
    }

    #[test]
    fn test_method_identifier_includes_param_types() {
        let src = "class C { void f(int a, String b) {} void f(long a) {} }";
        let tree = parse(src).unwrap();
        let idents: Vec<_> = tree
            .collect_terminals()
            .iter()
            .map(|&t| tree.node(t).identifier.clone())
            .collect();
        assert!(idents.contains(&"f(int,String)".to_string()));
        assert!(idents.contains(&"f(long)".to_string()));
    }

    #[test]
    fn test_constructor_recognized() {
        let src = "class C { C(int x) { this.x = x; } void C2() {} }";
        let tree = parse(src).unwrap();
        let terminals = tree.collect_terminals();
        let kinds: Vec<_> = terminals
            .iter()
            .map(|&t| tree.node(t).terminal_kind().unwrap())
            .collect();
        assert!(kinds.contains(&TerminalKind::Constructor));
        assert!(kinds.contains(&TerminalKind::Method));
    }

    #[test]
    fn test_field_with_lambda_initializer() {
        let src = "class C { Runnable r = () -> { run(); }; int y; }";
        let tree = parse(src).unwrap();
        let idents: Vec<_> = tree
            .collect_terminals()
            .iter()
            .map(|&t| tree.node(t).identifier.clone())
            .collect();
        assert!(idents.contains(&"r".to_string()));
        assert!(idents.contains(&"y".to_string()));
    }

    #[test]
    fn test_nested_class() {
        let src = "class Outer { class Inner { void deep() {} } void shallow() {} }";
        let tree = parse(src).unwrap();
        let idents: Vec<_> = tree
            .collect_terminals()
            .iter()
            .map(|&t| tree.node(t).identifier.clone())
            .collect();
        assert_eq!(idents, vec!["deep()", "shallow()"]);
    }

    #[test]
    fn test_initializer_block() {
        let src = "class C { static { init(); } }";
        let tree = parse(src).unwrap();
        let terminals = tree.collect_terminals();
        assert_eq!(terminals.len(), 1);
        assert_eq!(
            tree.node(terminals[0]).terminal_kind(),
            Some(TerminalKind::InitializerBlock)
        );
    }

    #[test]
    fn test_abstract_method_is_blockless() {
        let src = "interface I { void f(int x); }";
        let tree = parse(src).unwrap();
        let terminals = tree.collect_terminals();
        assert_eq!(terminals.len(), 1);
        let node = tree.node(terminals[0]);
        assert_eq!(node.terminal_kind(), Some(TerminalKind::Method));
        assert_eq!(node.identifier, "f(int)");
        assert_eq!(node.body(), "");
    }

    #[test]
    fn test_enum_constants_kept_opaque() {
        let src = "enum E { A, B, C; void f() {} }";
        let tree = parse(src).unwrap();
        let idents: Vec<_> = tree
            .collect_terminals()
            .iter()
            .map(|&t| tree.node(t).identifier.clone())
            .collect();
        assert!(idents.contains(&"<enum constants>".to_string()));
        assert!(idents.contains(&"f()".to_string()));
    }

    #[test]
    fn test_round_trip_reconstruction() {
        let src = "package p;\n\nclass C {\n    // kept comment\n    int x;\n\n    void a() {\n        return;\n    }\n}\n";
        let tree = parse(src).unwrap();
        assert_eq!(crate::printer::emit(&tree), src);
    }

    #[test]
    fn test_unbalanced_braces_error() {
        assert!(parse("class C { void f() {").is_err());
    }

    #[test]
    fn test_signature_parts() {
        let parts = method_signature_parts("public static List<String> find(Map<String, Integer> m, int k) ").unwrap();
        assert_eq!(parts.name, "find");
        assert_eq!(parts.return_type, "List<String>");
        assert_eq!(parts.params, vec!["Map<String,Integer>", "int"]);
        assert_eq!(parts.identifier(), "find(Map<String,Integer>,int)");
    }

    #[test]
    fn test_signature_parts_constructor_shape() {
        let parts = method_signature_parts("public C(int x) ").unwrap();
        assert_eq!(parts.name, "C");
        assert_eq!(parts.return_type, "");
    }

    #[test]
    fn test_annotation_parens_skipped() {
        let parts =
            method_signature_parts("@SuppressWarnings(\"x\") @Override void run() ").unwrap();
        assert_eq!(parts.name, "run");
        assert!(parts.params.is_empty());
    }

    #[test]
    fn test_whitespace_equivalent_inputs_match() {
        let a = parse("class C { void f(int  x) { g(); } }").unwrap();
        let b = parse("class C {\n  void f( int x )   { g(); }\n}").unwrap();
        let ta = a.collect_terminals();
        let tb = b.collect_terminals();
        assert_eq!(a.node(ta[0]).identifier, b.node(tb[0]).identifier);
    }

    #[test]
    fn test_container_header_footer() {
        let src = "class C { int x; }";
        let tree = parse(src).unwrap();
        let class = tree.children(tree.root())[0];
        match &tree.node(class).data {
            NodeData::Container { header, footer, .. } => {
                assert_eq!(header, "class C {");
                assert_eq!(footer, " }");
            }
            _ => panic!("expected container"),
        }
    }
}
