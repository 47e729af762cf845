//! Recursive comparison of a received document against a control document.
use super::ValidationError;
use crate::context::TestContext;
use crate::dom::{Attribute, DocumentType, NodeId, NodeKind, XmlDocument, XmlTree};
use crate::ignore::IgnoreResolver;
use tracing::debug;

/// Compares a received tree against a control tree node by node.
///
/// Comparison stops at the first difference.
pub struct TreeValidator<'a> {
    received: &'a XmlTree,
    control: &'a XmlTree,
    ignore: &'a IgnoreResolver,
    context: &'a TestContext,
}

impl<'a> TreeValidator<'a> {
    pub fn new(
        received: &'a XmlDocument,
        control: &'a XmlDocument,
        ignore: &'a IgnoreResolver,
        context: &'a TestContext,
    ) -> Self {
        Self {
            received: received.tree(),
            control: control.tree(),
            ignore,
            context,
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        debug!("Start XML tree validation");
        self.validate_node(NodeId::DOCUMENT, NodeId::DOCUMENT)
    }

    fn validate_node(&self, received: NodeId, control: NodeId) -> Result<(), ValidationError> {
        match self.received.node(received).kind() {
            NodeKind::Document => self.validate_document(),
            NodeKind::DocumentType(doctype) => match self.control.node(control).kind() {
                NodeKind::DocumentType(expected) => self.validate_doctype(doctype, expected),
                _ => Err(ValidationError::mismatch(
                    "Missing document type definition in expected xml fragment",
                )),
            },
            NodeKind::Element(_) => self.validate_element(received, control),
            NodeKind::Text(text) | NodeKind::CData(text) => {
                let expected = self.control.node(control).value().unwrap_or_default();
                self.validate_text(received, text, expected)
            }
            NodeKind::Comment(_) => {
                debug!("Ignored comment node");
                Ok(())
            }
            NodeKind::ProcessingInstruction { target, .. } => {
                debug!(target = %target, "Ignored processing instruction");
                Ok(())
            }
        }
    }

    fn validate_document(&self) -> Result<(), ValidationError> {
        match (self.received.doctype(), self.control.doctype()) {
            (Some((received, _)), Some((control, _))) => self.validate_node(received, control)?,
            (Some(_), None) => {
                return Err(ValidationError::mismatch(
                    "Missing document type definition in expected xml fragment",
                ));
            }
            (None, Some(_)) => {
                return Err(ValidationError::mismatch(
                    "Missing document type definition in received xml fragment",
                ));
            }
            (None, None) => {}
        }
        match (self.received.root_element(), self.control.root_element()) {
            (Some(received), Some(control)) => self.validate_node(received, control),
            _ => Err(ValidationError::mismatch("Missing root element")),
        }
    }

    fn validate_doctype(&self, received: &DocumentType, control: &DocumentType) -> Result<(), ValidationError> {
        debug!(name = %received.name, "Validating document type definition");
        self.validate_doctype_id("public", received.public_id.as_deref(), control.public_id.as_deref())?;
        self.validate_doctype_id("system", received.system_id.as_deref(), control.system_id.as_deref())
    }

    fn validate_doctype_id(
        &self,
        kind: &str,
        received: Option<&str>,
        control: Option<&str>,
    ) -> Result<(), ValidationError> {
        let received = received.filter(|id| !id.trim().is_empty());
        match control.filter(|id| !id.trim().is_empty()) {
            None if received.is_none() => Ok(()),
            None => Err(ValidationError::value_mismatch(
                format!("Document type {kind} id not equal"),
                None,
                received,
            )),
            Some(expected) if expected.trim() == self.ignore.placeholder() => {
                debug!("Document type {kind} id is ignored by placeholder");
                Ok(())
            }
            Some(expected) if received == Some(expected) => Ok(()),
            Some(expected) => Err(ValidationError::value_mismatch(
                format!("Document type {kind} id not equal"),
                Some(expected),
                received,
            )),
        }
    }

    fn validate_element(&self, received: NodeId, control: NodeId) -> Result<(), ValidationError> {
        let (Some(received_el), Some(control_el)) = (self.received.element(received), self.control.element(control))
        else {
            return Err(ValidationError::mismatch(format!(
                "Node type not equal for node '{}'",
                self.received.path_name(received)
            )));
        };
        let path = self.received.path_name(received);
        debug!(element = %path, "Validating element");

        if received_el.local_name != control_el.local_name {
            return Err(ValidationError::value_mismatch(
                "Element names not equal",
                Some(control_el.local_name.as_str()),
                Some(received_el.local_name.as_str()),
            )
            .at(path));
        }

        if received_el.namespace_uri != control_el.namespace_uri {
            return Err(ValidationError::value_mismatch(
                format!("Element namespace not equal for element '{path}'"),
                control_el.namespace_uri.as_deref(),
                received_el.namespace_uri.as_deref(),
            )
            .at(path));
        }

        if self
            .ignore
            .is_element_ignored(self.control, control, self.received, received)
        {
            debug!(element = %path, "Element is ignored");
            return Ok(());
        }

        // attributes ignored by expression take no part in the comparison
        let excluded: Vec<usize> = (0..received_el.attributes.len())
            .filter(|&index| self.ignore.is_attribute_excluded(self.received, received, index))
            .collect();
        let is_excluded = |attribute: &Attribute| {
            excluded.iter().any(|&index| {
                let ignored = &received_el.attributes[index];
                ignored.local_name == attribute.local_name && ignored.namespace_uri == attribute.namespace_uri
            })
        };
        let received_attrs = count_attributes(&received_el.attributes, &is_excluded);
        let control_attrs = count_attributes(&control_el.attributes, &is_excluded);
        if received_attrs != control_attrs {
            return Err(ValidationError::value_mismatch(
                format!("Number of attributes not equal for element '{path}'"),
                Some(control_attrs.to_string().as_str()),
                Some(received_attrs.to_string().as_str()),
            )
            .at(path));
        }

        for (index, attribute) in received_el.attributes.iter().enumerate() {
            if !excluded.contains(&index) {
                self.validate_attribute(received, index, attribute, control, &path)?;
            }
        }

        if let Some(expected) = self.control_matcher_text(control) {
            let actual = self
                .received
                .first_child(received)
                .and_then(|child| self.received.node(child).value())
                .unwrap_or_default()
                .trim();
            debug!(element = %path, "Validating element text with matcher");
            return self
                .context
                .matchers()
                .validate(&path, actual, expected)
                .map_err(ValidationError::from);
        }

        let received_text = self.received.text_value(received);
        let control_text = self.control.text_value(control);
        if received_text.trim() != control_text.trim() {
            return Err(ValidationError::value_mismatch(
                format!("Node value not equal for element '{path}'"),
                Some(control_text.trim()),
                Some(received_text.trim()),
            )
            .at(path));
        }

        let received_children = self.received.child_elements(received);
        let control_children = self.control.child_elements(control);
        if received_children.len() != control_children.len() {
            return Err(ValidationError::value_mismatch(
                format!("Number of child elements not equal for element '{path}'"),
                Some(control_children.len().to_string().as_str()),
                Some(received_children.len().to_string().as_str()),
            )
            .at(path));
        }

        for (received_child, control_child) in received_children.into_iter().zip(control_children) {
            self.validate_node(received_child, control_child)?;
        }

        debug!(element = %path, "Element validation successful");
        Ok(())
    }

    /// Control element text when it is a matcher expression.
    fn control_matcher_text(&self, control: NodeId) -> Option<&'a str> {
        let control_tree: &'a XmlTree = self.control;
        let text = control_tree
            .first_child(control)
            .filter(|&child| matches!(control_tree.node(child).kind(), NodeKind::Text(_)))
            .and_then(|child| control_tree.node(child).value())?
            .trim();
        self.context.matchers().is_matcher_expression(text).then_some(text)
    }

    fn validate_attribute(
        &self,
        element: NodeId,
        index: usize,
        received: &Attribute,
        control_element: NodeId,
        path: &str,
    ) -> Result<(), ValidationError> {
        if received.is_namespace_declaration() {
            return Ok(());
        }
        let attribute_path = self.received.attribute_path_name(element, received);
        let control = self
            .control
            .element(control_element)
            .and_then(|el| el.attribute(&received.local_name, received.namespace_uri.as_deref()))
            .ok_or_else(|| {
                ValidationError::mismatch(format!(
                    "Attribute validation failed for element '{path}', unknown attribute {}",
                    describe_attribute(received)
                ))
                .at(attribute_path.clone())
            })?;

        if self
            .ignore
            .is_attribute_ignored(self.received, element, index, &control.value)
        {
            return Ok(());
        }
        debug!(attribute = %attribute_path, "Validating attribute");

        let expected = control.value.as_str();
        let actual = received.value.as_str();

        if self.context.matchers().is_matcher_expression(expected.trim()) {
            return self
                .context
                .matchers()
                .validate(&attribute_path, actual.trim(), expected.trim())
                .map_err(ValidationError::from);
        }

        let (actual, expected) = if expected.contains(':') && actual.contains(':') {
            self.qname_local_parts(element, control_element, received, actual, expected)?
        } else {
            (actual, expected)
        };

        if actual != expected {
            return Err(ValidationError::value_mismatch(
                format!(
                    "Values not equal for attribute '{}'",
                    received.qualified_name()
                ),
                Some(expected),
                Some(actual),
            )
            .at(attribute_path));
        }
        Ok(())
    }

    /// `prefix:local` values whose received prefix is declared must resolve to the
    /// same namespace URI on both sides. The prefixes themselves may differ, so only
    /// the local parts are returned for comparison. An undeclared received prefix
    /// leaves both values untouched.
    fn qname_local_parts<'v>(
        &self,
        element: NodeId,
        control_element: NodeId,
        received: &Attribute,
        actual: &'v str,
        expected: &'v str,
    ) -> Result<(&'v str, &'v str), ValidationError> {
        let (received_prefix, received_local) = split_qname(actual);
        let (control_prefix, control_local) = split_qname(expected);

        let received_ns = self.received.namespaces_in_scope(element);
        let Some(received_uri) = received_ns.get(received_prefix) else {
            return Ok((actual, expected));
        };
        let attribute_path = self.received.attribute_path_name(element, received);

        let control_ns = self.control.namespaces_in_scope(control_element);
        let Some(control_uri) = control_ns.get(control_prefix) else {
            return Err(ValidationError::mismatch(format!(
                "Received attribute value '{}' describes namespace qualified attribute value, control value '{expected}' does not",
                received.local_name
            ))
            .at(attribute_path));
        };

        if received_uri != control_uri {
            return Err(ValidationError::value_mismatch(
                format!("Values not equal for attribute value namespace '{actual}'"),
                Some(control_uri.as_str()),
                Some(received_uri.as_str()),
            )
            .at(attribute_path));
        }
        Ok((received_local, control_local))
    }

    fn validate_text(&self, received: NodeId, actual: &str, expected: &str) -> Result<(), ValidationError> {
        if actual.trim() != expected.trim() {
            let parent = self
                .received
                .node(received)
                .parent()
                .map(|id| self.received.path_name(id))
                .unwrap_or_default();
            return Err(ValidationError::value_mismatch(
                format!("Node value not equal for element '{parent}'"),
                Some(expected.trim()),
                Some(actual.trim()),
            )
            .at(parent));
        }
        Ok(())
    }
}

fn count_attributes(attributes: &[Attribute], excluded: &impl Fn(&Attribute) -> bool) -> usize {
    attributes
        .iter()
        .filter(|attribute| !attribute.is_namespace_declaration() && !excluded(attribute))
        .count()
}

fn describe_attribute(attribute: &Attribute) -> String {
    match &attribute.namespace_uri {
        Some(ns) => format!("{} ({ns})", attribute.qualified_name()),
        None => attribute.qualified_name(),
    }
}

fn split_qname(value: &str) -> (&str, &str) {
    value.split_once(':').unwrap_or(("", value))
}
