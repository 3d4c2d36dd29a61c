//! Declaration tree model.
//!
//! A source file is partitioned into a coarse tree of named declarations:
//! containers (compilation unit, class, interface, enum) and terminals
//! (field, method, constructor, initializer block, import, raw region).
//! Terminal bodies are opaque text; composition never looks inside them.
//!
//! Nodes live in an arena addressed by stable indices. Children are index
//! lists and the parent is an optional index, so handlers can re-parent and
//! detach nodes without touching ownership.

/// Index of a node within its owning [`Tree`] arena.
pub type NodeId = usize;

/// Kinds of nodes with children.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContainerKind {
    CompilationUnit,
    Class,
    Interface,
    Enum,
}

/// Kinds of leaf declarations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TerminalKind {
    Method,
    Constructor,
    Field,
    InitializerBlock,
    Import,
    /// Raw region the declaration scanner could not classify. Kept verbatim
    /// so serialization stays lossless.
    Other,
}

/// Payload of a tree node.
#[derive(Debug, Clone)]
pub enum NodeData {
    Container {
        kind: ContainerKind,
        /// Source text from the start of the declaration through the
        /// opening brace. Empty for the compilation unit.
        header: String,
        /// Closing text, normally the closing brace plus trailing trivia.
        footer: String,
        children: Vec<NodeId>,
    },
    Terminal {
        kind: TerminalKind,
        /// Source text up to (but excluding) the body block, including any
        /// leading trivia. For members without a block this is the whole
        /// declaration.
        signature: String,
        /// The body block text, or empty for blockless members.
        body: String,
    },
}

/// One declaration in the tree.
///
/// The identifier is a pure function of the declaration's signature or
/// name, never of its body: methods and constructors use
/// `name(paramTypes,...)`, fields and types their name, imports the full
/// normalized statement. Identifiers are stored whitespace-normalized so
/// equality is direct string comparison.
#[derive(Debug, Clone)]
pub struct Node {
    pub identifier: String,
    pub parent: Option<NodeId>,
    pub data: NodeData,
}

impl Node {
    pub fn is_terminal(&self) -> bool {
        matches!(self.data, NodeData::Terminal { .. })
    }

    pub fn terminal_kind(&self) -> Option<TerminalKind> {
        match &self.data {
            NodeData::Terminal { kind, .. } => Some(*kind),
            NodeData::Container { .. } => None,
        }
    }

    pub fn container_kind(&self) -> Option<ContainerKind> {
        match &self.data {
            NodeData::Container { kind, .. } => Some(*kind),
            NodeData::Terminal { .. } => None,
        }
    }

    pub fn is_method_or_constructor(&self) -> bool {
        matches!(
            self.terminal_kind(),
            Some(TerminalKind::Method) | Some(TerminalKind::Constructor)
        )
    }

    /// Signature text of a terminal, empty for containers.
    pub fn signature(&self) -> &str {
        match &self.data {
            NodeData::Terminal { signature, .. } => signature,
            NodeData::Container { .. } => "",
        }
    }

    /// Body text of a terminal, empty for containers.
    pub fn body(&self) -> &str {
        match &self.data {
            NodeData::Terminal { body, .. } => body,
            NodeData::Container { .. } => "",
        }
    }

    /// Full source text of a terminal (signature followed by body).
    pub fn source(&self) -> String {
        match &self.data {
            NodeData::Terminal {
                signature, body, ..
            } => format!("{}{}", signature, body),
            NodeData::Container { .. } => String::new(),
        }
    }

    /// Whether two nodes denote the same declaration: same kind of node and
    /// equal (pre-normalized) identifier.
    pub fn corresponds_to(&self, other: &Node) -> bool {
        if self.identifier.is_empty() || other.identifier.is_empty() {
            return false;
        }
        match (&self.data, &other.data) {
            (NodeData::Terminal { kind: a, .. }, NodeData::Terminal { kind: b, .. }) => {
                a == b && self.identifier == other.identifier
            }
            (NodeData::Container { kind: a, .. }, NodeData::Container { kind: b, .. }) => {
                a == b && self.identifier == other.identifier
            }
            _ => false,
        }
    }
}

/// Arena-backed declaration tree. Node 0 is always the compilation unit.
#[derive(Debug, Clone)]
pub struct Tree {
    nodes: Vec<Node>,
    root: NodeId,
}

impl Tree {
    /// Create a tree holding an empty compilation unit.
    pub fn new() -> Self {
        let root = Node {
            identifier: String::new(),
            parent: None,
            data: NodeData::Container {
                kind: ContainerKind::CompilationUnit,
                header: String::new(),
                footer: String::new(),
                children: Vec::new(),
            },
        };
        Self {
            nodes: vec![root],
            root: 0,
        }
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id]
    }

    pub fn node_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id]
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        match &self.nodes[id].data {
            NodeData::Container { children, .. } => children,
            NodeData::Terminal { .. } => &[],
        }
    }

    /// Append a container under `parent`, returning its id.
    pub fn add_container(
        &mut self,
        parent: NodeId,
        kind: ContainerKind,
        identifier: String,
        header: String,
        footer: String,
    ) -> NodeId {
        let id = self.nodes.len();
        self.nodes.push(Node {
            identifier,
            parent: Some(parent),
            data: NodeData::Container {
                kind,
                header,
                footer,
                children: Vec::new(),
            },
        });
        self.attach(parent, id, None);
        id
    }

    /// Append a terminal under `parent`, returning its id.
    pub fn add_terminal(
        &mut self,
        parent: NodeId,
        kind: TerminalKind,
        identifier: String,
        signature: String,
        body: String,
    ) -> NodeId {
        let id = self.nodes.len();
        self.nodes.push(Node {
            identifier,
            parent: Some(parent),
            data: NodeData::Terminal {
                kind,
                signature,
                body,
            },
        });
        self.attach(parent, id, None);
        id
    }

    /// Insert `child` into `parent`'s child list directly after `anchor`
    /// (or at the front when `anchor` is `None`). The child must already
    /// live in this arena and be detached.
    pub fn insert_child_after(&mut self, parent: NodeId, anchor: Option<NodeId>, child: NodeId) {
        self.nodes[child].parent = Some(parent);
        match &mut self.nodes[parent].data {
            NodeData::Container { children, .. } => {
                let pos = match anchor {
                    Some(a) => children.iter().position(|&c| c == a).map(|p| p + 1),
                    None => Some(0),
                };
                match pos {
                    Some(p) => children.insert(p, child),
                    None => children.push(child),
                }
            }
            NodeData::Terminal { .. } => {}
        }
    }

    fn attach(&mut self, parent: NodeId, child: NodeId, at: Option<usize>) {
        if let NodeData::Container { children, .. } = &mut self.nodes[parent].data {
            match at {
                Some(pos) => children.insert(pos, child),
                None => children.push(child),
            }
        }
    }

    /// Detach a node from its parent's child list. The node stays in the
    /// arena (ids remain stable) but no traversal reaches it anymore.
    pub fn remove(&mut self, id: NodeId) {
        if let Some(parent) = self.nodes[id].parent {
            if let NodeData::Container { children, .. } = &mut self.nodes[parent].data {
                children.retain(|&c| c != id);
            }
        }
        self.nodes[id].parent = None;
    }

    /// Replace a terminal's body text.
    pub fn set_body(&mut self, id: NodeId, new_body: String) {
        if let NodeData::Terminal { body, .. } = &mut self.nodes[id].data {
            *body = new_body;
        }
    }

    /// Replace a terminal's signature text.
    pub fn set_signature(&mut self, id: NodeId, new_signature: String) {
        if let NodeData::Terminal { signature, .. } = &mut self.nodes[id].data {
            *signature = new_signature;
        }
    }

    /// All terminals in depth-first order, children in declared order.
    /// Handlers rely on this order for deterministic tie-breaks.
    pub fn collect_terminals(&self) -> Vec<NodeId> {
        let mut out = Vec::new();
        self.collect_terminals_from(self.root, &mut out);
        out
    }

    fn collect_terminals_from(&self, id: NodeId, out: &mut Vec<NodeId>) {
        match &self.nodes[id].data {
            NodeData::Terminal { .. } => out.push(id),
            NodeData::Container { children, .. } => {
                for &child in children {
                    self.collect_terminals_from(child, out);
                }
            }
        }
    }

    /// Whether some node in this tree corresponds to `key` (same node kind
    /// and identifier).
    pub fn is_in_tree(&self, key: &Node) -> bool {
        self.retrieve_correspondent(key).is_some()
    }

    /// First node (depth-first) corresponding to `key`, if any.
    pub fn retrieve_correspondent(&self, key: &Node) -> Option<NodeId> {
        self.find_from(self.root, key)
    }

    fn find_from(&self, id: NodeId, key: &Node) -> Option<NodeId> {
        if self.nodes[id].corresponds_to(key) {
            return Some(id);
        }
        if let NodeData::Container { children, .. } = &self.nodes[id].data {
            for &child in children {
                if let Some(found) = self.find_from(child, key) {
                    return Some(found);
                }
            }
        }
        None
    }
}

impl Default for Tree {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_tree() -> Tree {
        let mut tree = Tree::new();
        let class = tree.add_container(
            tree.root(),
            ContainerKind::Class,
            "C".into(),
            "class C {".into(),
            "}".into(),
        );
        tree.add_terminal(
            class,
            TerminalKind::Field,
            "x".into(),
            "int x = 1;".into(),
            String::new(),
        );
        tree.add_terminal(
            class,
            TerminalKind::Method,
            "a()".into(),
            "void a() ".into(),
            "{ return; }".into(),
        );
        tree
    }

    #[test]
    fn test_collect_terminals_order() {
        let tree = sample_tree();
        let terminals = tree.collect_terminals();
        assert_eq!(terminals.len(), 2);
        assert_eq!(tree.node(terminals[0]).identifier, "x");
        assert_eq!(tree.node(terminals[1]).identifier, "a()");
    }

    #[test]
    fn test_correspondent_lookup() {
        let tree = sample_tree();
        let other = sample_tree();
        let method = other.collect_terminals()[1];
        let found = tree.retrieve_correspondent(other.node(method));
        assert!(found.is_some());
        assert_eq!(tree.node(found.unwrap()).identifier, "a()");
        assert!(tree.is_in_tree(other.node(method)));
    }

    #[test]
    fn test_remove_detaches() {
        let mut tree = sample_tree();
        let method = tree.collect_terminals()[1];
        tree.remove(method);
        assert_eq!(tree.collect_terminals().len(), 1);
        assert!(tree.node(method).parent.is_none());
    }

    #[test]
    fn test_insert_after_anchor() {
        let mut tree = sample_tree();
        let class = tree.children(tree.root())[0];
        let field = tree.children(class)[0];
        let id = tree.add_terminal(
            class,
            TerminalKind::Field,
            "y".into(),
            "int y;".into(),
            String::new(),
        );
        tree.remove(id);
        tree.insert_child_after(class, Some(field), id);
        let idents: Vec<_> = tree
            .children(class)
            .iter()
            .map(|&c| tree.node(c).identifier.clone())
            .collect();
        assert_eq!(idents, vec!["x", "y", "a()"]);
    }

    #[test]
    fn test_blockless_terminals_have_no_body() {
        let tree = sample_tree();
        let field = tree.collect_terminals()[0];
        assert_eq!(tree.node(field).body(), "");
        assert_eq!(tree.node(field).source(), "int x = 1;");
    }
}
