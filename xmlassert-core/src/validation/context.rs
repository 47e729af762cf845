use crate::matcher::{MatcherError, MatcherRegistry};
use std::collections::{BTreeMap, BTreeSet};

/// Settings for one message validation. Built once with
/// [`XmlValidationContext::builder`] and read-only afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XmlValidationContext {
    ignore_expressions: BTreeSet<String>,
    namespaces: BTreeMap<String, String>,
    control_namespaces: BTreeMap<String, String>,
    schema_validation: bool,
    schema: Option<String>,
    schema_repository: Option<String>,
    xpath_expressions: Vec<(String, String)>,
}

impl Default for XmlValidationContext {
    fn default() -> Self {
        Self {
            ignore_expressions: BTreeSet::new(),
            namespaces: BTreeMap::new(),
            control_namespaces: BTreeMap::new(),
            schema_validation: true,
            schema: None,
            schema_repository: None,
            xpath_expressions: Vec::new(),
        }
    }
}

impl XmlValidationContext {
    pub fn builder() -> XmlValidationContextBuilder {
        XmlValidationContextBuilder::default()
    }

    pub fn ignore_expressions(&self) -> &BTreeSet<String> {
        &self.ignore_expressions
    }

    /// Prefix bindings available to XPath expressions.
    pub fn namespaces(&self) -> &BTreeMap<String, String> {
        &self.namespaces
    }

    /// Namespace declarations the received root element must carry.
    pub fn control_namespaces(&self) -> &BTreeMap<String, String> {
        &self.control_namespaces
    }

    pub fn is_schema_validation_enabled(&self) -> bool {
        self.schema_validation
    }

    pub fn schema(&self) -> Option<&str> {
        self.schema.as_deref()
    }

    pub fn schema_repository(&self) -> Option<&str> {
        self.schema_repository.as_deref()
    }

    /// Expression to expected value, in insertion order.
    pub fn xpath_expressions(&self) -> &[(String, String)] {
        &self.xpath_expressions
    }
}

#[derive(Debug, Clone, Default)]
pub struct XmlValidationContextBuilder {
    context: XmlValidationContext,
}

impl XmlValidationContextBuilder {
    pub fn ignore(mut self, expression: impl Into<String>) -> Self {
        self.context.ignore_expressions.insert(expression.into());
        self
    }

    pub fn ignore_all<I, S>(mut self, expressions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.context
            .ignore_expressions
            .extend(expressions.into_iter().map(Into::into));
        self
    }

    pub fn namespace(mut self, prefix: impl Into<String>, uri: impl Into<String>) -> Self {
        self.context.namespaces.insert(prefix.into(), uri.into());
        self
    }

    pub fn control_namespace(mut self, prefix: impl Into<String>, uri: impl Into<String>) -> Self {
        self.context
            .control_namespaces
            .insert(prefix.into(), uri.into());
        self
    }

    pub fn schema_validation(mut self, enabled: bool) -> Self {
        self.context.schema_validation = enabled;
        self
    }

    pub fn schema(mut self, name: impl Into<String>) -> Self {
        self.context.schema = Some(name.into());
        self
    }

    pub fn schema_repository(mut self, name: impl Into<String>) -> Self {
        self.context.schema_repository = Some(name.into());
        self
    }

    /// Add an expression check. Re-adding an expression replaces its expected value
    /// and keeps its position.
    pub fn xpath(mut self, expression: impl Into<String>, expected: impl Into<String>) -> Self {
        let expression = expression.into();
        let expected = expected.into();
        match self
            .context
            .xpath_expressions
            .iter_mut()
            .find(|(existing, _)| *existing == expression)
        {
            Some(entry) => entry.1 = expected,
            None => self.context.xpath_expressions.push((expression, expected)),
        }
        self
    }

    pub fn build(self) -> XmlValidationContext {
        self.context
    }

    /// Build after resolving every matcher named in the expected XPath values, so
    /// an unknown matcher fails here instead of halfway through a validation.
    pub fn build_with(self, matchers: &MatcherRegistry) -> Result<XmlValidationContext, MatcherError> {
        for (_, expected) in &self.context.xpath_expressions {
            matchers.check(expected.trim())?;
        }
        Ok(self.context)
    }
}
