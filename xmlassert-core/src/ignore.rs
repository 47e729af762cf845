//! Decides which received nodes are excluded from comparison.
//!
//! An ignore expression is either a dotted node path (`Order.Customer.Name`), a short
//! element name (`Name`) or an XPath expression (`//Customer/@id`). XPath expressions
//! ignore every node they select; short names only ever resolve to the first matching
//! node in document order.
use crate::dom::{NodeId, NodeKind, NodeRef, XmlDocument, XmlTree};
use crate::xpath::{NamespaceContext, XPathError, XPathEvaluator, is_xpath_expression};
use std::collections::{BTreeSet, HashSet};
use tracing::debug;

/// Ignore expressions resolved against one received document.
#[derive(Debug, Clone, Default)]
pub struct IgnoreResolver {
    placeholder: String,
    paths: BTreeSet<String>,
    by_name: HashSet<NodeRef>,
    by_xpath: HashSet<NodeRef>,
}

impl IgnoreResolver {
    pub fn new(
        received: &XmlDocument,
        expressions: &BTreeSet<String>,
        namespaces: &NamespaceContext,
        placeholder: impl Into<String>,
    ) -> Result<Self, XPathError> {
        let mut resolver = Self {
            placeholder: placeholder.into(),
            ..Self::default()
        };
        if expressions.is_empty() {
            return Ok(resolver);
        }

        let tree = received.tree();
        let xpath_expressions: Vec<&String> = expressions
            .iter()
            .filter(|expression| is_xpath_expression(expression))
            .collect();

        for expression in expressions {
            resolver.paths.insert(expression.clone());
            if let Some(node) = tree.find_node_by_name(expression) {
                resolver.by_name.insert(node);
            }
        }

        if !xpath_expressions.is_empty() {
            let evaluator = XPathEvaluator::new(received, namespaces)?;
            for expression in xpath_expressions {
                resolver.by_xpath.extend(evaluator.select_nodes(expression)?);
            }
        }
        Ok(resolver)
    }

    pub fn placeholder(&self) -> &str {
        &self.placeholder
    }

    fn is_placeholder(&self, value: &str) -> bool {
        value.trim() == self.placeholder
    }

    /// Received element is ignored by expression, or the control element's text is the
    /// placeholder.
    pub fn is_element_ignored(
        &self,
        control: &XmlTree,
        control_element: NodeId,
        received: &XmlTree,
        received_element: NodeId,
    ) -> bool {
        if self.is_node_ignored(received, NodeRef::Element(received_element)) {
            return true;
        }
        let placeholder = control
            .first_child(control_element)
            .and_then(|child| match control.node(child).kind() {
                NodeKind::Text(text) => Some(text.as_str()),
                _ => None,
            })
            .is_some_and(|text| self.is_placeholder(text));
        if placeholder {
            debug!(
                element = %received.path_name(received_element),
                "Element is ignored by placeholder"
            );
        }
        placeholder
    }

    /// Exact path, then short name, then XPath selection.
    pub fn is_node_ignored(&self, received: &XmlTree, node: NodeRef) -> bool {
        let Some(path) = received.node_ref_path_name(node) else {
            return false;
        };
        let ignored = self.paths.contains(&path)
            || self.by_name.contains(&node)
            || self.by_xpath.contains(&node);
        if ignored {
            debug!(node = %path, "Node is ignored by expression");
        }
        ignored
    }

    /// Control value is the placeholder, or the received attribute is ignored by
    /// expression.
    pub fn is_attribute_ignored(
        &self,
        received: &XmlTree,
        element: NodeId,
        index: usize,
        control_value: &str,
    ) -> bool {
        if self.is_placeholder(control_value) {
            debug!(
                attribute = %received
                    .node_ref_path_name(NodeRef::Attribute { element, index })
                    .unwrap_or_default(),
                "Attribute is ignored by placeholder"
            );
            return true;
        }
        self.is_attribute_excluded(received, element, index)
    }

    /// Received attribute matched by an ignore expression: exact
    /// `element.path.qualified:name`, short name, then XPath selection.
    pub fn is_attribute_excluded(&self, received: &XmlTree, element: NodeId, index: usize) -> bool {
        let qualified = received
            .element(element)
            .map(|el| format!("{}.{}", received.path_name(element), el.attributes[index].qualified_name()));
        let node = NodeRef::Attribute { element, index };
        let ignored = qualified.is_some_and(|path| self.paths.contains(&path))
            || self.by_name.contains(&node)
            || self.by_xpath.contains(&node);
        if ignored {
            debug!(
                attribute = %received.node_ref_path_name(node).unwrap_or_default(),
                "Attribute is ignored by expression"
            );
        }
        ignored
    }
}
