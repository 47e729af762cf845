//! XPath evaluation against parsed documents.
//!
//! Expressions run on the libxml document behind an [`XmlDocument`]; selected nodes
//! are mapped back onto the immutable tree as [`NodeRef`]s.
use crate::dom::constants::{DYNAMIC_NS_END, DYNAMIC_NS_PREFIX, DYNAMIC_NS_START};
use crate::dom::{NodeRef, XmlDocument};
use libxml::tree::Node;
use libxml::xpath::Context;
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

/// Errors emitted while evaluating XPath expressions.
#[derive(Debug, Error)]
pub enum XPathError {
    #[error("failed to create XPath context")]
    Context,
    #[error("failed to register namespace {prefix}={uri}")]
    Namespace { prefix: String, uri: String },
    #[error("can not evaluate XPath expression '{expression}'")]
    Evaluation { expression: String },
    #[error("no result for XPath expression '{expression}'")]
    NoResult { expression: String },
}

/// Expressions with a slash or a function call are XPath; anything else is a dotted
/// node path.
pub fn is_xpath_expression(expression: &str) -> bool {
    expression.contains('/') || expression.contains('(')
}

/// Coercion applied to an XPath result, selected by an optional `type:` prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum XPathResultType {
    Node,
    NodeSet,
    String,
    Boolean,
    Number,
    Integer,
}

impl XPathResultType {
    // node-set must be tried before node
    const PREFIXES: [(&'static str, XPathResultType); 6] = [
        ("node-set:", XPathResultType::NodeSet),
        ("node:", XPathResultType::Node),
        ("string:", XPathResultType::String),
        ("boolean:", XPathResultType::Boolean),
        ("number:", XPathResultType::Number),
        ("integer:", XPathResultType::Integer),
    ];

    /// Split `boolean://a` into the result type and the bare expression. Expressions
    /// without a prefix evaluate as [`XPathResultType::Node`].
    ///
    /// # Examples
    /// ```rust
    /// use xmlassert_core::xpath::XPathResultType;
    ///
    /// let (kind, expr) = XPathResultType::from_expression("boolean://a");
    /// assert_eq!(kind, XPathResultType::Boolean);
    /// assert_eq!(expr, "//a");
    /// ```
    pub fn from_expression(expression: &str) -> (XPathResultType, &str) {
        Self::PREFIXES
            .iter()
            .find_map(|(prefix, kind)| expression.strip_prefix(prefix).map(|rest| (*kind, rest)))
            .unwrap_or((XPathResultType::Node, expression))
    }

    /// Strip a leading `type:` token if present.
    pub fn cut_off_prefix(expression: &str) -> &str {
        Self::from_expression(expression).1
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            XPathResultType::Node => "node",
            XPathResultType::NodeSet => "node-set",
            XPathResultType::String => "string",
            XPathResultType::Boolean => "boolean",
            XPathResultType::Number => "number",
            XPathResultType::Integer => "integer",
        }
    }
}

/// Result of a typed XPath evaluation.
#[derive(Debug, Clone, PartialEq)]
pub enum XPathValue {
    Node(String),
    NodeSet(Vec<String>),
    String(String),
    Boolean(bool),
    Number(f64),
    Integer(i64),
}

impl fmt::Display for XPathValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            XPathValue::Node(value) | XPathValue::String(value) => f.write_str(value),
            XPathValue::NodeSet(values) => f.write_str(&values.join(",")),
            XPathValue::Boolean(value) => write!(f, "{value}"),
            XPathValue::Number(value) => f.write_str(&format_number(*value)),
            XPathValue::Integer(value) => write!(f, "{value}"),
        }
    }
}

/// Numbers print the way the test-authoring side writes them: plain decimals with
/// at least one fraction digit inside `[1e-3, 1e7)`, `1.0E7` style outside it.
fn format_number(value: f64) -> String {
    if value.is_nan() {
        return "NaN".to_string();
    }
    if value.is_infinite() {
        return if value > 0.0 { "Infinity" } else { "-Infinity" }.to_string();
    }
    let magnitude = value.abs();
    if value == 0.0 || (1e-3..1e7).contains(&magnitude) {
        return with_fraction(value.to_string());
    }
    let scientific = format!("{value:e}");
    match scientific.split_once('e') {
        Some((mantissa, exponent)) => format!("{}E{exponent}", with_fraction(mantissa.to_string())),
        None => scientific,
    }
}

fn with_fraction(mut digits: String) -> String {
    if !digits.contains('.') {
        digits.push_str(".0");
    }
    digits
}

/// Prefix to namespace URI bindings used while evaluating expressions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NamespaceContext {
    bindings: BTreeMap<String, String>,
}

impl NamespaceContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bindings declared on the document root, overridden by `configured`.
    pub fn for_document(document: &XmlDocument, configured: &BTreeMap<String, String>) -> Self {
        let mut context = Self::new();
        for (prefix, uri) in document.tree().lookup_namespaces(crate::dom::NodeId::DOCUMENT) {
            context.bind(prefix, uri);
        }
        for (prefix, uri) in configured {
            context.bind(prefix.clone(), uri.clone());
        }
        context
    }

    pub fn bind(&mut self, prefix: impl Into<String>, uri: impl Into<String>) {
        self.bindings.insert(prefix.into(), uri.into());
    }

    pub fn uri(&self, prefix: &str) -> Option<&str> {
        self.bindings.get(prefix).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.bindings.iter().map(|(p, u)| (p.as_str(), u.as_str()))
    }
}

pub fn has_dynamic_namespaces(expression: &str) -> bool {
    expression.contains(DYNAMIC_NS_START) && expression.contains(DYNAMIC_NS_END)
}

/// Collect `{uri}` namespaces written inline in an expression, keyed by generated
/// `dns<N>` prefixes.
pub fn dynamic_namespaces(expression: &str) -> BTreeMap<String, String> {
    let mut namespaces = BTreeMap::new();
    if !has_dynamic_namespaces(expression) {
        return namespaces;
    }
    for (i, token) in expression.split(DYNAMIC_NS_START).enumerate().skip(1) {
        let Some(end) = token.find(DYNAMIC_NS_END) else {
            continue;
        };
        let uri = &token[..end];
        if !namespaces.values().any(|existing| existing == uri) {
            namespaces.insert(format!("{DYNAMIC_NS_PREFIX}{i}"), uri.to_string());
        }
    }
    namespaces
}

/// Rewrite `/{urn:a}foo` to `/dns1:foo` using the bindings from [`dynamic_namespaces`].
pub fn replace_dynamic_namespaces(expression: &str, namespaces: &BTreeMap<String, String>) -> String {
    let mut result = expression.to_string();
    for (prefix, uri) in namespaces {
        let inline = format!("{DYNAMIC_NS_START}{uri}{DYNAMIC_NS_END}");
        result = result.replace(&inline, &format!("{prefix}:"));
    }
    result
}

/// Evaluates expressions against one document.
pub struct XPathEvaluator<'a> {
    document: &'a XmlDocument,
    context: Context,
}

impl<'a> XPathEvaluator<'a> {
    pub fn new(document: &'a XmlDocument, namespaces: &NamespaceContext) -> Result<Self, XPathError> {
        let context = Context::new(document.libxml()).map_err(|_| XPathError::Context)?;
        let evaluator = Self { document, context };
        for (prefix, uri) in namespaces.iter() {
            // the default namespace cannot be addressed from XPath 1.0
            if !prefix.is_empty() {
                evaluator.register(prefix, uri)?;
            }
        }
        Ok(evaluator)
    }

    pub fn document(&self) -> &'a XmlDocument {
        self.document
    }

    fn register(&self, prefix: &str, uri: &str) -> Result<(), XPathError> {
        self.context
            .register_namespace(prefix, uri)
            .map_err(|_| XPathError::Namespace {
                prefix: prefix.to_string(),
                uri: uri.to_string(),
            })
    }

    fn prepare(&self, expression: &str) -> Result<String, XPathError> {
        if !has_dynamic_namespaces(expression) {
            return Ok(expression.to_string());
        }
        let namespaces = dynamic_namespaces(expression);
        for (prefix, uri) in &namespaces {
            self.register(prefix, uri)?;
        }
        Ok(replace_dynamic_namespaces(expression, &namespaces))
    }

    fn raw_nodes(&self, expression: &str) -> Result<Vec<Node>, XPathError> {
        let expression = self.prepare(expression)?;
        let object = self
            .context
            .evaluate(&expression)
            .map_err(|_| XPathError::Evaluation { expression })?;
        Ok(object.get_nodes_as_vec())
    }

    fn scalar(&self, function: &str, expression: &str) -> Result<String, XPathError> {
        let expression = self.prepare(expression)?;
        let wrapped = format!("{function}({expression})");
        let object = self
            .context
            .evaluate(&wrapped)
            .map_err(|_| XPathError::Evaluation { expression })?;
        Ok(object.to_string())
    }

    /// All nodes selected by the expression, in document order.
    pub fn select_nodes(&self, expression: &str) -> Result<Vec<NodeRef>, XPathError> {
        Ok(self
            .raw_nodes(expression)?
            .iter()
            .map(|node| self.document.resolve(node))
            .collect())
    }

    pub fn select_first(&self, expression: &str) -> Result<Option<NodeRef>, XPathError> {
        Ok(self
            .raw_nodes(expression)?
            .first()
            .map(|node| self.document.resolve(node)))
    }

    /// Evaluate and coerce to `result_type`.
    pub fn evaluate(&self, expression: &str, result_type: XPathResultType) -> Result<XPathValue, XPathError> {
        let no_result = || XPathError::NoResult {
            expression: expression.to_string(),
        };
        match result_type {
            XPathResultType::Node => {
                let nodes = self.raw_nodes(expression)?;
                let node = nodes.first().ok_or_else(no_result)?;
                Ok(XPathValue::Node(self.node_value(node)))
            }
            XPathResultType::NodeSet => Ok(XPathValue::NodeSet(
                self.raw_nodes(expression)?
                    .iter()
                    .map(|node| self.node_value(node))
                    .collect(),
            )),
            XPathResultType::String => {
                let value = self.scalar("string", expression)?;
                // an empty string from a missing node is a lookup failure, not a value
                if value.is_empty() && self.raw_nodes(expression)?.is_empty() {
                    return Err(no_result());
                }
                Ok(XPathValue::String(value))
            }
            XPathResultType::Boolean => Ok(XPathValue::Boolean(
                self.scalar("boolean", expression)? == "true",
            )),
            XPathResultType::Number => Ok(XPathValue::Number(self.number(expression)?)),
            XPathResultType::Integer => {
                let number = self.number(expression)?;
                Ok(XPathValue::Integer((number + 0.5).floor() as i64))
            }
        }
    }

    fn number(&self, expression: &str) -> Result<f64, XPathError> {
        let raw = self.scalar("number", expression)?;
        Ok(raw.trim().parse::<f64>().unwrap_or(f64::NAN))
    }

    /// Element nodes yield their first child's text, everything else its own value.
    fn node_value(&self, node: &Node) -> String {
        match self.document.resolve(node) {
            NodeRef::Element(id) => node_ref_value(self.document, NodeRef::Element(id)),
            NodeRef::Attribute { element, index } => {
                node_ref_value(self.document, NodeRef::Attribute { element, index })
            }
            NodeRef::Node(_) | NodeRef::Detached => node.get_content(),
        }
    }
}

/// Value of a node selected by path: first child text for elements, value for
/// attributes.
pub(crate) fn node_ref_value(document: &XmlDocument, node: NodeRef) -> String {
    let tree = document.tree();
    match node {
        NodeRef::Element(id) => tree
            .first_child(id)
            .and_then(|child| tree.node(child).value())
            .unwrap_or_default()
            .to_string(),
        NodeRef::Attribute { element, index } => tree
            .element(element)
            .map(|el| el.attributes[index].value.clone())
            .unwrap_or_default(),
        NodeRef::Node(id) => tree.node(id).value().unwrap_or_default().to_string(),
        NodeRef::Detached => String::new(),
    }
}
