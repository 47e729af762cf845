//! Checks individual values selected by XPath expressions or dotted node paths.
use super::ValidationError;
use crate::context::TestContext;
use crate::dom::{NodeRef, XmlDocument};
use crate::ignore::IgnoreResolver;
use crate::xpath::{
    NamespaceContext, XPathError, XPathEvaluator, XPathResultType, XPathValue, is_xpath_expression,
    node_ref_value,
};
use tracing::{debug, info};

pub struct XPathElementValidator<'a> {
    received: &'a XmlDocument,
    evaluator: XPathEvaluator<'a>,
    ignore: &'a IgnoreResolver,
    context: &'a TestContext,
}

impl<'a> XPathElementValidator<'a> {
    pub fn new(
        received: &'a XmlDocument,
        namespaces: &NamespaceContext,
        ignore: &'a IgnoreResolver,
        context: &'a TestContext,
    ) -> Result<Self, ValidationError> {
        Ok(Self {
            received,
            evaluator: XPathEvaluator::new(received, namespaces)?,
            ignore,
            context,
        })
    }

    /// Check every `(expression, expected)` pair in order; the first failure stops
    /// validation.
    pub fn validate(&self, expressions: &[(String, String)]) -> Result<(), ValidationError> {
        debug!("Start XML elements validation");
        for (expression, expected) in expressions {
            let path = self.context.replace_dynamic_content(expression)?;
            let expected = self.context.replace_dynamic_content(expected)?;
            let Some(actual) = self.select(&path)? else {
                continue;
            };
            self.validate_value(&path, &actual, &expected)?;
            debug!(path = %path, expected = %expected, "Validating element: OK");
        }
        info!("XML elements validation successful: All elements OK");
        Ok(())
    }

    /// `None` when the selected node is ignored.
    fn select(&self, path: &str) -> Result<Option<XPathValue>, ValidationError> {
        let tree = self.received.tree();
        if !is_xpath_expression(path) {
            let node = tree
                .find_node_by_name(path)
                .ok_or_else(|| ValidationError::UnknownElement {
                    path: path.to_string(),
                })?;
            if self.ignore.is_node_ignored(tree, node) {
                debug!(path, "Element is ignored, skipping value check");
                return Ok(None);
            }
            return Ok(Some(XPathValue::Node(node_ref_value(self.received, node))));
        }

        let (result_type, expression) = XPathResultType::from_expression(path);
        if result_type == XPathResultType::Node {
            let node: NodeRef = self
                .evaluator
                .select_first(expression)?
                .ok_or_else(|| ValidationError::UnknownElement {
                    path: expression.to_string(),
                })?;
            if self.ignore.is_node_ignored(tree, node) {
                debug!(path, "Element is ignored, skipping value check");
                return Ok(None);
            }
        }

        match self.evaluator.evaluate(expression, result_type) {
            Ok(value) => Ok(Some(value)),
            Err(XPathError::NoResult { expression }) => Err(ValidationError::UnknownElement { path: expression }),
            Err(other) => Err(other.into()),
        }
    }

    fn validate_value(&self, path: &str, actual: &XPathValue, expected: &str) -> Result<(), ValidationError> {
        let matchers = self.context.matchers();
        if matchers.is_matcher_expression(expected.trim()) {
            return matchers
                .validate(path, &actual.to_string(), expected.trim())
                .map_err(ValidationError::from);
        }

        if let XPathValue::NodeSet(values) = actual {
            let expected_values = parse_list(expected);
            if *values != expected_values {
                return Err(ValidationError::value_mismatch(
                    format!("Values not equal for element '{path}'"),
                    Some(format!("{expected_values:?}").as_str()),
                    Some(format!("{values:?}").as_str()),
                )
                .at(path));
            }
            return Ok(());
        }

        let actual = actual.to_string();
        let actual = Some(actual.as_str()).filter(|v| !v.is_empty());
        let expected = Some(expected).filter(|v| !v.is_empty());
        if actual != expected {
            return Err(ValidationError::value_mismatch(
                format!("Values not equal for element '{path}'"),
                expected,
                actual,
            )
            .at(path));
        }
        Ok(())
    }
}

/// `a,b`, `[a, b]` or empty.
fn parse_list(expected: &str) -> Vec<String> {
    let trimmed = expected.trim();
    let inner = trimmed
        .strip_prefix('[')
        .and_then(|rest| rest.strip_suffix(']'))
        .unwrap_or(trimmed);
    if inner.trim().is_empty() {
        return Vec::new();
    }
    inner.split(',').map(|value| value.trim().to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::{BTreeMap, BTreeSet};

    const RECEIVED: &str = r#"<root xmlns="http://citrus/default" xmlns:ns1="http://citrus/ns1">
        <element attributeA="attribute-value" attributeB="attribute-value">
            <sub-elementA attribute="A">text-value</sub-elementA>
            <sub-elementB attribute="B">text-value</sub-elementB>
            <sub-element>one</sub-element>
            <sub-element>two</sub-element>
        </element>
        <ns1:ns-element>namespace</ns1:ns-element>
    </root>"#;

    fn run(expressions: &[(&str, &str)], ignore: &[&str], context: &TestContext) -> Result<(), ValidationError> {
        let doc = XmlDocument::parse(RECEIVED).unwrap();
        let configured = BTreeMap::from([("def".to_string(), "http://citrus/default".to_string())]);
        let namespaces = NamespaceContext::for_document(&doc, &configured);
        let ignore: BTreeSet<String> = ignore.iter().map(|e| e.to_string()).collect();
        let resolver = IgnoreResolver::new(&doc, &ignore, &namespaces, context.ignore_placeholder()).unwrap();
        let expressions: Vec<(String, String)> = expressions
            .iter()
            .map(|(e, v)| (e.to_string(), v.to_string()))
            .collect();
        XPathElementValidator::new(&doc, &namespaces, &resolver, context)?.validate(&expressions)
    }

    fn check(expressions: &[(&str, &str)]) -> Result<(), ValidationError> {
        run(expressions, &[], &TestContext::new())
    }

    #[test]
    fn function_prefix_inside_qnames_is_not_a_call() {
        let doc = XmlDocument::parse(r#"<fn:Order xmlns:fn="urn:o"><fn:Item/><fn:Item/></fn:Order>"#).unwrap();
        let namespaces = NamespaceContext::for_document(&doc, &BTreeMap::new());
        let context = TestContext::new();
        let resolver = IgnoreResolver::new(&doc, &BTreeSet::new(), &namespaces, context.ignore_placeholder()).unwrap();
        let expressions = vec![
            ("boolean://fn:Order[count(fn:Item)=2]".to_string(), "true".to_string()),
            ("integer:count(//fn:Item)".to_string(), "2".to_string()),
        ];
        XPathElementValidator::new(&doc, &namespaces, &resolver, &context)
            .unwrap()
            .validate(&expressions)
            .unwrap();
    }

    #[test]
    fn dot_notation_paths() {
        assert!(check(&[("root.element.sub-elementA", "text-value")]).is_ok());
        assert!(check(&[("root.element.sub-elementA.attribute", "A")]).is_ok());
        assert!(check(&[("sub-elementB", "text-value")]).is_ok());
        assert!(matches!(
            check(&[("root.element.missing", "x")]),
            Err(ValidationError::UnknownElement { .. })
        ));
    }

    #[test]
    fn xpath_expressions_with_types() {
        assert!(check(&[
            ("//def:element/def:sub-elementA", "text-value"),
            ("//def:element/def:sub-elementA/@attribute", "A"),
            ("boolean://def:element", "true"),
            ("number:count(//def:sub-element)", "2.0"),
            ("integer:count(//def:sub-element)", "2"),
            ("string:local-name(/*)", "root"),
            ("//ns1:ns-element", "namespace"),
        ])
        .is_ok());
    }

    #[test]
    fn node_set_results_compare_as_lists() {
        assert!(check(&[("node-set://def:sub-element", "one,two")]).is_ok());
        assert!(check(&[("node-set://def:sub-element", "[one, two]")]).is_ok());
        assert!(check(&[("node-set://def:missing", "")]).is_ok());
        assert!(check(&[("node-set://def:sub-element", "two,one")]).is_err());
    }

    #[test]
    fn value_mismatch_and_unknown_element() {
        let err = check(&[("//def:element/def:sub-elementA", "other")]).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Values not equal for element '//def:element/def:sub-elementA', expected 'other' but was 'text-value'"
        );
        assert!(matches!(
            check(&[("//def:element/def:missing", "x")]),
            Err(ValidationError::UnknownElement { .. })
        ));
        assert!(matches!(
            check(&[("string://def:missing", "x")]),
            Err(ValidationError::UnknownElement { .. })
        ));
    }

    #[test]
    fn ignored_nodes_are_skipped() {
        let context = TestContext::new();
        assert!(run(&[("//def:sub-elementA", "wrong")], &["//def:sub-elementA"], &context).is_ok());
        assert!(run(&[("root.element.sub-elementB", "wrong")], &["sub-elementB"], &context).is_ok());
    }

    #[test]
    fn matchers_and_variables_in_expected_values() {
        let mut context = TestContext::new();
        context.set_variable("expected", "text-value");
        context.set_variable("element", "sub-elementA");
        assert!(run(&[("//def:${element}", "${expected}")], &[], &context).is_ok());
        assert!(run(&[("//def:sub-elementA", "@startsWith('text')@")], &[], &context).is_ok());
        assert!(run(&[("//def:sub-elementA", "fn:concat('text', '-value')")], &[], &context).is_ok());
        let err = run(&[("//def:sub-elementA", "@endsWith('nope')@")], &[], &context).unwrap_err();
        assert!(err.is_mismatch());
    }

    #[test]
    fn parses_expected_lists() {
        assert_eq!(parse_list("a,b"), vec!["a", "b"]);
        assert_eq!(parse_list("[a, b]"), vec!["a", "b"]);
        assert!(parse_list("").is_empty());
        assert!(parse_list("[]").is_empty());
    }
}
