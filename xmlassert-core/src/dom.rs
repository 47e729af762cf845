//! Immutable XML document model used by the validators.
//!
//! Payloads are parsed with libxml and snapshotted into an arena ([`XmlTree`]).
//! Nodes are addressed by [`NodeId`] and carry a [`NodePath`] of child offsets
//! from the document node, so "is this the node an expression selected" is an
//! index comparison instead of a pointer comparison.
pub(crate) mod constants;
mod parse;
mod pretty;

pub use pretty::pretty_print;

use libxml::tree::{Document, Node};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use thiserror::Error;

/// Errors emitted while turning a payload into an [`XmlDocument`].
#[derive(Debug, Error)]
pub enum XmlError {
    #[error("XML payload is empty")]
    EmptyPayload,
    #[error("XML parse error: {0}")]
    Parse(String),
    #[error("XML document has no root element")]
    MissingRoot,
}

/// Index of a node inside an [`XmlTree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    pub const DOCUMENT: NodeId = NodeId(0);

    pub fn index(self) -> usize {
        self.0
    }
}

/// Child offsets from the document node down to a node.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct NodePath(Vec<usize>);

impl NodePath {
    pub fn offsets(&self) -> &[usize] {
        &self.0
    }

    fn child(&self, offset: usize) -> NodePath {
        let mut offsets = self.0.clone();
        offsets.push(offset);
        NodePath(offsets)
    }
}

impl fmt::Display for NodePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.0.iter().map(usize::to_string).collect();
        write!(f, "/{}", parts.join("/"))
    }
}

/// Document type declaration (`<!DOCTYPE ...>`).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DocumentType {
    pub name: String,
    pub public_id: Option<String>,
    pub system_id: Option<String>,
}

/// Attribute of an element. Namespace declarations are never attributes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    pub local_name: String,
    pub prefix: Option<String>,
    pub namespace_uri: Option<String>,
    pub value: String,
}

impl Attribute {
    /// Name as written in the document, `prefix:local` or `local`.
    pub fn qualified_name(&self) -> String {
        match &self.prefix {
            Some(prefix) => format!("{prefix}:{}", self.local_name),
            None => self.local_name.clone(),
        }
    }

    pub fn is_namespace_declaration(&self) -> bool {
        self.qualified_name().starts_with(constants::XMLNS_ATTRIBUTE)
    }
}

/// `xmlns` / `xmlns:prefix` declaration on an element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamespaceDeclaration {
    /// Empty for the default namespace.
    pub prefix: String,
    pub uri: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    pub local_name: String,
    pub prefix: Option<String>,
    pub namespace_uri: Option<String>,
    pub attributes: Vec<Attribute>,
    pub namespace_declarations: Vec<NamespaceDeclaration>,
}

impl Element {
    pub fn attribute(&self, local_name: &str, namespace_uri: Option<&str>) -> Option<&Attribute> {
        self.attribute_index(local_name, namespace_uri)
            .map(|index| &self.attributes[index])
    }

    pub(crate) fn attribute_index(&self, local_name: &str, namespace_uri: Option<&str>) -> Option<usize> {
        self.attributes
            .iter()
            .position(|attr| attr.local_name == local_name && attr.namespace_uri.as_deref() == namespace_uri)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    Document,
    DocumentType(DocumentType),
    Element(Element),
    Text(String),
    CData(String),
    Comment(String),
    ProcessingInstruction { target: String, data: String },
}

#[derive(Debug, Clone)]
pub struct NodeData {
    kind: NodeKind,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    path: NodePath,
}

impl NodeData {
    pub fn kind(&self) -> &NodeKind {
        &self.kind
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    pub fn path(&self) -> &NodePath {
        &self.path
    }

    /// Character content for text-like nodes.
    pub fn value(&self) -> Option<&str> {
        match &self.kind {
            NodeKind::Text(text) | NodeKind::CData(text) | NodeKind::Comment(text) => Some(text),
            NodeKind::ProcessingInstruction { data, .. } => Some(data),
            _ => None,
        }
    }
}

/// Reference to something an expression can select.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeRef {
    Element(NodeId),
    Attribute { element: NodeId, index: usize },
    Node(NodeId),
    /// Selected node has no counterpart in the tree (e.g. a stripped whitespace node).
    Detached,
}

/// Arena of parsed nodes; index 0 is always the document node.
#[derive(Debug, Clone)]
pub struct XmlTree {
    nodes: Vec<NodeData>,
}

impl XmlTree {
    fn new() -> Self {
        Self {
            nodes: vec![NodeData {
                kind: NodeKind::Document,
                parent: None,
                children: Vec::new(),
                path: NodePath::default(),
            }],
        }
    }

    fn push(&mut self, parent: NodeId, kind: NodeKind) -> NodeId {
        let id = NodeId(self.nodes.len());
        let offset = self.nodes[parent.0].children.len();
        let path = self.nodes[parent.0].path.child(offset);
        self.nodes.push(NodeData {
            kind,
            parent: Some(parent),
            children: Vec::new(),
            path,
        });
        self.nodes[parent.0].children.push(id);
        id
    }

    pub fn node(&self, id: NodeId) -> &NodeData {
        &self.nodes[id.0]
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.len() <= 1
    }

    pub fn element(&self, id: NodeId) -> Option<&Element> {
        match &self.nodes[id.0].kind {
            NodeKind::Element(element) => Some(element),
            _ => None,
        }
    }

    pub fn root_element(&self) -> Option<NodeId> {
        self.node(NodeId::DOCUMENT)
            .children
            .iter()
            .copied()
            .find(|&id| self.element(id).is_some())
    }

    pub fn doctype(&self) -> Option<(NodeId, &DocumentType)> {
        self.node(NodeId::DOCUMENT).children.iter().find_map(|&id| match &self.node(id).kind {
            NodeKind::DocumentType(doctype) => Some((id, doctype)),
            _ => None,
        })
    }

    pub fn first_child(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).children.first().copied()
    }

    pub fn child_elements(&self, id: NodeId) -> Vec<NodeId> {
        self.node(id)
            .children
            .iter()
            .copied()
            .filter(|&child| self.element(child).is_some())
            .collect()
    }

    /// Concatenated text and CDATA content of the direct children.
    pub fn text_value(&self, id: NodeId) -> String {
        self.node(id)
            .children
            .iter()
            .filter_map(|&child| match &self.node(child).kind {
                NodeKind::Text(text) | NodeKind::CData(text) => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }

    /// All elements in document order.
    pub fn elements(&self) -> impl Iterator<Item = NodeId> + '_ {
        let mut stack = vec![NodeId::DOCUMENT];
        std::iter::from_fn(move || {
            while let Some(id) = stack.pop() {
                stack.extend(self.node(id).children.iter().rev().copied());
                if self.element(id).is_some() {
                    return Some(id);
                }
            }
            None
        })
    }

    /// Dotted path name, e.g. `Order.Customer.Name`. The document itself has an empty name.
    pub fn path_name(&self, id: NodeId) -> String {
        let mut names = Vec::new();
        let mut current = Some(id);
        while let Some(node) = current {
            if let Some(element) = self.element(node) {
                names.push(element.local_name.as_str());
            }
            current = self.node(node).parent;
        }
        names.reverse();
        names.join(".")
    }

    pub fn attribute_path_name(&self, element: NodeId, attribute: &Attribute) -> String {
        format!("{}.{}", self.path_name(element), attribute.local_name)
    }

    pub fn node_ref_path_name(&self, node: NodeRef) -> Option<String> {
        match node {
            NodeRef::Element(id) | NodeRef::Node(id) => Some(self.path_name(id)),
            NodeRef::Attribute { element, index } => self
                .element(element)
                .map(|el| self.attribute_path_name(element, &el.attributes[index])),
            NodeRef::Detached => None,
        }
    }

    /// Namespace declarations made on a node (document resolves to its root element).
    pub fn lookup_namespaces(&self, id: NodeId) -> BTreeMap<String, String> {
        let target = if id == NodeId::DOCUMENT {
            self.root_element()
        } else {
            Some(id)
        };
        target
            .and_then(|id| self.element(id))
            .map(|element| {
                element
                    .namespace_declarations
                    .iter()
                    .map(|decl| (decl.prefix.clone(), decl.uri.clone()))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Namespaces in scope for an element, nearest declaration wins.
    pub fn namespaces_in_scope(&self, id: NodeId) -> BTreeMap<String, String> {
        let mut chain = Vec::new();
        let mut current = Some(id);
        while let Some(node) = current {
            chain.push(node);
            current = self.node(node).parent;
        }
        let mut namespaces = BTreeMap::new();
        for node in chain.into_iter().rev() {
            if let Some(element) = self.element(node) {
                for decl in &element.namespace_declarations {
                    namespaces.insert(decl.prefix.clone(), decl.uri.clone());
                }
            }
        }
        namespaces
    }

    /// Resolves a dotted node path such as `Order.Customer.Name` or a short name like
    /// `Name`.
    ///
    /// A single token returns the first element with that local name in document
    /// order. Longer paths match the trailing segments of an element's ancestry, and
    /// when no element carries the last segment it is looked up as an attribute of
    /// the node named by the remaining path. Only the first match is ever returned,
    /// so a short name shared by several nodes resolves to one of them.
    pub fn find_node_by_name(&self, expression: &str) -> Option<NodeRef> {
        let tokens: Vec<&str> = expression.split('.').filter(|t| !t.is_empty()).collect();
        let last = *tokens.last()?;

        if tokens.len() == 1 {
            return self
                .elements()
                .find(|&id| self.element(id).is_some_and(|el| el.local_name == last))
                .map(NodeRef::Element);
        }

        let candidates: Vec<NodeId> = self
            .elements()
            .filter(|&id| self.element(id).is_some_and(|el| el.local_name == last))
            .collect();

        if candidates.is_empty() {
            let parent_expression = tokens[..tokens.len() - 1].join(".");
            return match self.find_node_by_name(&parent_expression)? {
                NodeRef::Element(element) => {
                    let el = self.element(element)?;
                    el.attributes
                        .iter()
                        .position(|attr| attr.qualified_name() == last)
                        .map(|index| NodeRef::Attribute { element, index })
                }
                _ => None,
            };
        }

        let ancestors_needed = tokens.len() - 1;
        candidates
            .into_iter()
            .find(|&candidate| {
                let mut names = vec![last];
                let mut parent = self.node(candidate).parent;
                while names.len() <= ancestors_needed {
                    match parent.and_then(|id| self.element(id).map(|el| (id, el))) {
                        Some((id, el)) => {
                            names.push(el.local_name.as_str());
                            parent = self.node(id).parent;
                        }
                        None => return false,
                    }
                }
                names.reverse();
                names.join(".") == expression
            })
            .map(NodeRef::Element)
    }
}

/// A parsed payload: the immutable tree plus the libxml document backing XPath and
/// schema evaluation.
pub struct XmlDocument {
    source: String,
    document: Document,
    tree: XmlTree,
    pointers: HashMap<usize, NodeId>,
}

impl fmt::Debug for XmlDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("XmlDocument")
            .field("tree", &self.tree)
            .finish_non_exhaustive()
    }
}

impl XmlDocument {
    /// Parse a payload. Leading/trailing whitespace is trimmed and whitespace-only text
    /// nodes are dropped.
    ///
    /// # Examples
    /// ```rust
    /// use xmlassert_core::dom::XmlDocument;
    ///
    /// let doc = XmlDocument::parse("<A><B>x</B></A>")?;
    /// let root = doc.tree().root_element().unwrap();
    /// assert_eq!(doc.tree().path_name(root), "A");
    /// # Ok::<(), xmlassert_core::dom::XmlError>(())
    /// ```
    pub fn parse(payload: &str) -> Result<Self, XmlError> {
        parse::parse_document(payload)
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn tree(&self) -> &XmlTree {
        &self.tree
    }

    pub fn libxml(&self) -> &Document {
        &self.document
    }

    /// Map a node selected through libxml back onto the tree.
    pub(crate) fn resolve(&self, node: &Node) -> NodeRef {
        use libxml::tree::NodeType;

        if node.get_type() == Some(NodeType::AttributeNode) {
            let Some(owner) = node.get_parent() else {
                return NodeRef::Detached;
            };
            let Some(&element) = self.pointers.get(&(owner.node_ptr() as usize)) else {
                return NodeRef::Detached;
            };
            let namespace = node.get_namespace().map(|ns| ns.get_href());
            return self
                .tree
                .element(element)
                .and_then(|el| el.attribute_index(&node.get_name(), namespace.as_deref()))
                .map(|index| NodeRef::Attribute { element, index })
                .unwrap_or(NodeRef::Detached);
        }

        match self.pointers.get(&(node.node_ptr() as usize)) {
            Some(&id) if self.tree.element(id).is_some() => NodeRef::Element(id),
            Some(&id) => NodeRef::Node(id),
            None => NodeRef::Detached,
        }
    }
}
