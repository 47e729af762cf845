use super::ValidationError;
use crate::dom::{NodeId, XmlDocument};
use std::collections::BTreeMap;
use tracing::{debug, info};

/// Check the namespace declarations on the received root element against the
/// expected prefix to URI map. The default namespace uses the empty prefix.
///
/// # Examples
/// ```rust
/// use std::collections::BTreeMap;
/// use xmlassert_core::dom::XmlDocument;
/// use xmlassert_core::validation::validate_namespaces;
///
/// let doc = XmlDocument::parse(r#"<a xmlns="urn:a" xmlns:b="urn:b"/>"#)?;
/// let expected = BTreeMap::from([
///     (String::new(), "urn:a".to_string()),
///     ("b".to_string(), "urn:b".to_string()),
/// ]);
/// assert!(validate_namespaces(&expected, &doc).is_ok());
/// # Ok::<(), xmlassert_core::dom::XmlError>(())
/// ```
pub fn validate_namespaces(
    expected: &BTreeMap<String, String>,
    received: &XmlDocument,
) -> Result<(), ValidationError> {
    if expected.is_empty() {
        return Ok(());
    }
    debug!("Start XML namespace validation");

    let tree = received.tree();
    let found = tree.lookup_namespaces(NodeId::DOCUMENT);
    let root = tree
        .root_element()
        .map(|id| tree.path_name(id))
        .unwrap_or_default();

    if found.len() != expected.len() {
        return Err(ValidationError::value_mismatch(
            format!("Number of namespace declarations not equal for node {root}"),
            Some(expected.len().to_string().as_str()),
            Some(found.len().to_string().as_str()),
        )
        .at(root));
    }

    for (prefix, uri) in expected {
        let Some(actual) = found.get(prefix) else {
            return Err(ValidationError::mismatch(format!(
                "Missing namespace {}({uri}) in node {root}",
                display_prefix(prefix)
            ))
            .at(root));
        };
        if actual != uri {
            return Err(ValidationError::value_mismatch(
                format!("Namespace '{}' values not equal", display_prefix(prefix)),
                Some(uri.as_str()),
                Some(actual.as_str()),
            )
            .at(root));
        }
    }

    info!("XML namespace validation successful: All values OK");
    Ok(())
}

fn display_prefix(prefix: &str) -> String {
    if prefix.is_empty() {
        "xmlns".to_string()
    } else {
        format!("xmlns:{prefix}")
    }
}
