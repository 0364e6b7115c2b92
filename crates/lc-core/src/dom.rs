//! Document model
//!
//! The engine never touches a concrete DOM. It reads element kinds, reads and
//! writes one attribute, and lists children through [`DocumentTree`]. Change
//! notifications arrive as [`MutationRecord`] batches.
//!
//! [`Tree`] is a small arena-backed implementation with a mutation queue that
//! behaves like a single `MutationObserver` watching the registered subtrees.

// =============================================================================
// Element Kinds
// =============================================================================

/// What a node is, as far as rewriting is concerned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ElementKind {
    /// Any other element; never rewritten, but its children are visited
    Container,
    /// `<a>`
    Hyperlink,
    /// `<area>`
    MapArea,
    /// `<img>`
    Image,
    /// Text, comments and anything else without attributes
    Other,
}

impl ElementKind {
    /// Classify an element by its node name (case-insensitive).
    pub fn from_node_name(name: &str) -> Self {
        if name.eq_ignore_ascii_case("a") {
            Self::Hyperlink
        } else if name.eq_ignore_ascii_case("area") {
            Self::MapArea
        } else if name.eq_ignore_ascii_case("img") {
            Self::Image
        } else {
            Self::Container
        }
    }

    /// Element kinds whose address attribute may be rewritten.
    #[inline]
    pub fn carries_address(self) -> bool {
        matches!(self, Self::Hyperlink | Self::MapArea | Self::Image)
    }
}

// =============================================================================
// Document Seam
// =============================================================================

/// Access to the host document.
pub trait DocumentTree {
    /// Node handle. Cheap to clone.
    type Node: Clone;

    fn kind(&self, node: &Self::Node) -> ElementKind;

    fn attribute(&self, node: &Self::Node, name: &str) -> Option<String>;

    fn set_attribute(&mut self, node: &Self::Node, name: &str, value: &str);

    /// Element children in document order.
    fn children(&self, node: &Self::Node) -> Vec<Self::Node>;
}

// =============================================================================
// Mutation Records
// =============================================================================

bitflags::bitflags! {
    /// What an observer registration listens for.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ObserveOptions: u8 {
        /// Children added or removed
        const CHILD_LIST = 1 << 0;
        /// Attribute values set
        const ATTRIBUTES = 1 << 1;
        /// Whole subtree, not just the target node
        const SUBTREE = 1 << 2;
    }
}

/// One change notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MutationRecord<N> {
    /// An attribute of `target` was set
    Attributes { target: N, name: String },
    /// Children of `target` were added or removed
    ChildList {
        target: N,
        added: Vec<N>,
        removed: Vec<N>,
    },
}

// =============================================================================
// In-memory Tree
// =============================================================================

/// Handle to a node in a [`Tree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

#[derive(Debug, Clone)]
enum NodeData {
    Element {
        name: String,
        attributes: Vec<(String, String)>,
    },
    Text(String),
}

#[derive(Debug, Clone)]
struct Node {
    data: NodeData,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

#[derive(Debug, Clone)]
struct Registration {
    root: NodeId,
    options: ObserveOptions,
    attribute_filter: Option<Vec<String>>,
}

/// Arena-backed document with a queued mutation log.
#[derive(Debug, Clone)]
pub struct Tree {
    nodes: Vec<Node>,
    registrations: Vec<Registration>,
    records: Vec<MutationRecord<NodeId>>,
}

impl Default for Tree {
    fn default() -> Self {
        Self::new()
    }
}

impl Tree {
    /// Create a tree holding only the document node.
    pub fn new() -> Self {
        Self {
            nodes: vec![Node {
                data: NodeData::Element {
                    name: "#document".to_string(),
                    attributes: Vec::new(),
                },
                parent: None,
                children: Vec::new(),
            }],
            registrations: Vec::new(),
            records: Vec::new(),
        }
    }

    /// The document node.
    #[inline]
    pub fn document(&self) -> NodeId {
        NodeId(0)
    }

    /// Create a detached element.
    pub fn create_element(&mut self, name: &str) -> NodeId {
        self.push_node(NodeData::Element {
            name: name.to_ascii_lowercase(),
            attributes: Vec::new(),
        })
    }

    /// Create a detached text node.
    pub fn create_text(&mut self, text: &str) -> NodeId {
        self.push_node(NodeData::Text(text.to_string()))
    }

    /// Create an element with attributes and append it to `parent`.
    pub fn append_element(&mut self, parent: NodeId, name: &str, attributes: &[(&str, &str)]) -> NodeId {
        let node = self.create_element(name);
        for (key, value) in attributes {
            self.set_attribute_value(node, key, value);
        }
        self.append_child(parent, node);
        node
    }

    fn push_node(&mut self, data: NodeData) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node {
            data,
            parent: None,
            children: Vec::new(),
        });
        id
    }

    /// Append `child` as the last child of `parent`, detaching it first.
    pub fn append_child(&mut self, parent: NodeId, child: NodeId) {
        if let Some(old_parent) = self.nodes[child.0].parent {
            self.remove_child(old_parent, child);
        }
        self.nodes[child.0].parent = Some(parent);
        self.nodes[parent.0].children.push(child);

        if self.is_observed(parent, ObserveOptions::CHILD_LIST, None) {
            self.records.push(MutationRecord::ChildList {
                target: parent,
                added: vec![child],
                removed: Vec::new(),
            });
        }
    }

    /// Detach `child` from `parent`. Returns false if it was not a child.
    pub fn remove_child(&mut self, parent: NodeId, child: NodeId) -> bool {
        let children = &mut self.nodes[parent.0].children;
        let pos = match children.iter().position(|&c| c == child) {
            Some(pos) => pos,
            None => return false,
        };
        children.remove(pos);
        self.nodes[child.0].parent = None;

        if self.is_observed(parent, ObserveOptions::CHILD_LIST, None) {
            self.records.push(MutationRecord::ChildList {
                target: parent,
                added: Vec::new(),
                removed: vec![child],
            });
        }
        true
    }

    /// Set an attribute, queueing a record when the node is observed.
    /// Setting an unchanged value still counts as a mutation.
    pub fn set_attribute_value(&mut self, node: NodeId, name: &str, value: &str) {
        let name = name.to_ascii_lowercase();
        match &mut self.nodes[node.0].data {
            NodeData::Element { attributes, .. } => {
                match attributes.iter().position(|(k, _)| *k == name) {
                    Some(pos) => attributes[pos].1 = value.to_string(),
                    None => attributes.push((name.clone(), value.to_string())),
                }
            }
            NodeData::Text(_) => return,
        }

        if self.is_observed(node, ObserveOptions::ATTRIBUTES, Some(&name)) {
            self.records.push(MutationRecord::Attributes { target: node, name });
        }
    }

    /// Read an attribute.
    pub fn attribute_value(&self, node: NodeId, name: &str) -> Option<&str> {
        match &self.nodes[node.0].data {
            NodeData::Element { attributes, .. } => attributes
                .iter()
                .find(|(k, _)| k.eq_ignore_ascii_case(name))
                .map(|(_, v)| v.as_str()),
            NodeData::Text(_) => None,
        }
    }

    /// Element name, or `None` for text nodes.
    pub fn node_name(&self, node: NodeId) -> Option<&str> {
        match &self.nodes[node.0].data {
            NodeData::Element { name, .. } => Some(name),
            NodeData::Text(_) => None,
        }
    }

    #[inline]
    pub fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.nodes[node.0].parent
    }

    /// Attached elements named `name`, in document order.
    pub fn elements_by_tag_name(&self, name: &str) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![self.document()];
        while let Some(node) = stack.pop() {
            if self.node_name(node).is_some_and(|n| n.eq_ignore_ascii_case(name)) {
                out.push(node);
            }
            stack.extend(self.nodes[node.0].children.iter().rev().copied());
        }
        out
    }

    /// Register observation of `root`.
    pub fn observe(&mut self, root: NodeId, options: ObserveOptions, attribute_filter: Option<&[&str]>) {
        let attribute_filter =
            attribute_filter.map(|names| names.iter().map(|n| n.to_ascii_lowercase()).collect());
        self.registrations.retain(|r| r.root != root);
        self.registrations.push(Registration {
            root,
            options,
            attribute_filter,
        });
    }

    /// Whether any registration is attached.
    #[inline]
    pub fn is_observing(&self) -> bool {
        !self.registrations.is_empty()
    }

    /// Drain the queued batch, oldest first.
    pub fn take_records(&mut self) -> Vec<MutationRecord<NodeId>> {
        std::mem::take(&mut self.records)
    }

    #[inline]
    pub fn pending_records(&self) -> usize {
        self.records.len()
    }

    fn is_observed(&self, node: NodeId, kind: ObserveOptions, attribute: Option<&str>) -> bool {
        self.registrations.iter().any(|r| {
            if !r.options.contains(kind) {
                return false;
            }
            if let (Some(filter), Some(attribute)) = (&r.attribute_filter, attribute) {
                if !filter.iter().any(|f| f == attribute) {
                    return false;
                }
            }
            if r.root == node {
                return true;
            }
            r.options.contains(ObserveOptions::SUBTREE) && self.is_ancestor(r.root, node)
        })
    }

    fn is_ancestor(&self, ancestor: NodeId, node: NodeId) -> bool {
        let mut current = self.nodes[node.0].parent;
        while let Some(p) = current {
            if p == ancestor {
                return true;
            }
            current = self.nodes[p.0].parent;
        }
        false
    }
}

impl DocumentTree for Tree {
    type Node = NodeId;

    fn kind(&self, node: &NodeId) -> ElementKind {
        match self.node_name(*node) {
            Some(name) => ElementKind::from_node_name(name),
            None => ElementKind::Other,
        }
    }

    fn attribute(&self, node: &NodeId, name: &str) -> Option<String> {
        self.attribute_value(*node, name).map(str::to_string)
    }

    fn set_attribute(&mut self, node: &NodeId, name: &str, value: &str) {
        self.set_attribute_value(*node, name, value);
    }

    fn children(&self, node: &NodeId) -> Vec<NodeId> {
        self.nodes[node.0]
            .children
            .iter()
            .copied()
            .filter(|c| matches!(self.nodes[c.0].data, NodeData::Element { .. }))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn observed_body(tree: &mut Tree) -> NodeId {
        let body = tree.append_element(tree.document(), "body", &[]);
        tree.observe(
            body,
            ObserveOptions::SUBTREE | ObserveOptions::CHILD_LIST | ObserveOptions::ATTRIBUTES,
            Some(&["href"]),
        );
        body
    }

    #[test]
    fn test_kind_from_node_name() {
        assert_eq!(ElementKind::from_node_name("A"), ElementKind::Hyperlink);
        assert_eq!(ElementKind::from_node_name("area"), ElementKind::MapArea);
        assert_eq!(ElementKind::from_node_name("IMG"), ElementKind::Image);
        assert_eq!(ElementKind::from_node_name("div"), ElementKind::Container);
        assert_eq!(ElementKind::from_node_name("abbr"), ElementKind::Container);
        assert!(!ElementKind::Container.carries_address());
        assert!(ElementKind::Image.carries_address());
    }

    #[test]
    fn test_text_nodes_are_other() {
        let mut tree = Tree::new();
        let text = tree.create_text("hello");
        assert_eq!(tree.kind(&text), ElementKind::Other);
        assert_eq!(tree.attribute(&text, "href"), None);
    }

    #[test]
    fn test_children_skip_text() {
        let mut tree = Tree::new();
        let div = tree.append_element(tree.document(), "div", &[]);
        let text = tree.create_text("x");
        tree.append_child(div, text);
        let a = tree.append_element(div, "a", &[]);
        assert_eq!(tree.children(&div), vec![a]);
    }

    #[test]
    fn test_unobserved_mutations_not_queued() {
        let mut tree = Tree::new();
        let div = tree.append_element(tree.document(), "div", &[("href", "x")]);
        tree.set_attribute_value(div, "href", "y");
        assert_eq!(tree.pending_records(), 0);
        assert!(!tree.is_observing());
    }

    #[test]
    fn test_subtree_records_in_order() {
        let mut tree = Tree::new();
        let body = observed_body(&mut tree);
        let div = tree.append_element(body, "div", &[]);
        let a = tree.create_element("a");
        tree.set_attribute_value(a, "href", "detached");
        tree.append_child(div, a);
        tree.set_attribute_value(a, "href", "attached");

        let records = tree.take_records();
        assert_eq!(
            records,
            vec![
                MutationRecord::ChildList { target: body, added: vec![div], removed: vec![] },
                MutationRecord::ChildList { target: div, added: vec![a], removed: vec![] },
                MutationRecord::Attributes { target: a, name: "href".to_string() },
            ]
        );
        assert_eq!(tree.pending_records(), 0);
    }

    #[test]
    fn test_attribute_filter() {
        let mut tree = Tree::new();
        let body = observed_body(&mut tree);
        let a = tree.append_element(body, "a", &[]);
        tree.take_records();

        tree.set_attribute_value(a, "title", "x");
        tree.set_attribute_value(a, "HREF", "y");
        assert_eq!(
            tree.take_records(),
            vec![MutationRecord::Attributes { target: a, name: "href".to_string() }]
        );
        assert_eq!(tree.attribute_value(a, "href"), Some("y"));
    }

    #[test]
    fn test_outside_subtree_not_queued() {
        let mut tree = Tree::new();
        let _body = observed_body(&mut tree);
        let head = tree.append_element(tree.document(), "head", &[]);
        tree.append_element(head, "a", &[("href", "x")]);
        assert_eq!(tree.pending_records(), 0);
    }

    #[test]
    fn test_remove_child_record() {
        let mut tree = Tree::new();
        let body = observed_body(&mut tree);
        let a = tree.append_element(body, "a", &[]);
        tree.take_records();

        assert!(tree.remove_child(body, a));
        assert!(!tree.remove_child(body, a));
        assert_eq!(tree.parent(a), None);
        assert_eq!(
            tree.take_records(),
            vec![MutationRecord::ChildList { target: body, added: vec![], removed: vec![a] }]
        );
    }

    #[test]
    fn test_elements_by_tag_name() {
        let mut tree = Tree::new();
        let html = tree.append_element(tree.document(), "html", &[]);
        let body = tree.append_element(html, "BODY", &[]);
        assert_eq!(tree.elements_by_tag_name("body"), vec![body]);
        assert!(tree.elements_by_tag_name("a").is_empty());
    }
}
