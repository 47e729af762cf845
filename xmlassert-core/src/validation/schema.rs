//! XSD schema selection and validation.
use super::ValidationError;
use crate::dom::XmlDocument;
use libxml::error::StructuredError;
use libxml::parser::Parser;
use libxml::schemas::{SchemaParserContext, SchemaValidationContext};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("failed to load XML schema '{location}': {reason}")]
    Load { location: String, reason: String },
    #[error("unknown XML schema '{0}'")]
    UnknownSchema(String),
    #[error("unknown XML schema repository '{0}'")]
    UnknownRepository(String),
    #[error("found {0} XML schema repositories but none is marked as default")]
    AmbiguousRepository(usize),
    #[error(
        "unable to find XML schema definition for element '{element}' ({namespace}) in schema repository '{repository}'"
    )]
    NoMatchingSchema {
        element: String,
        namespace: String,
        repository: String,
    },
}

impl SchemaError {
    /// Errors caused by how schemas are wired up rather than by an unreadable file.
    pub fn is_configuration(&self) -> bool {
        !matches!(self, SchemaError::Load { .. })
    }
}

fn first_error(errors: Vec<StructuredError>) -> String {
    errors
        .into_iter()
        .next()
        .map(|error| format!("{error:?}"))
        .unwrap_or_else(|| "unknown error".to_string())
}

fn location_str(location: &Path) -> Result<&str, SchemaError> {
    location.to_str().ok_or_else(|| SchemaError::Load {
        location: location.display().to_string(),
        reason: "invalid path".to_string(),
    })
}

/// A single XSD file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XsdSchema {
    name: String,
    location: PathBuf,
    target_namespace: Option<String>,
}

impl XsdSchema {
    /// Read the XSD and remember its `targetNamespace`.
    pub fn load(name: impl Into<String>, location: impl Into<PathBuf>) -> Result<Self, SchemaError> {
        let location = location.into();
        // libxml reports a missing file as a generic parse failure
        if !location.exists() {
            return Err(SchemaError::Load {
                location: location.display().to_string(),
                reason: "file not found".to_string(),
            });
        }
        let document = Parser::default()
            .parse_file(location_str(&location)?)
            .map_err(|e| SchemaError::Load {
                location: location.display().to_string(),
                reason: format!("{e:?}"),
            })?;
        let target_namespace = document
            .get_root_element()
            .and_then(|root| root.get_property("targetNamespace"))
            .filter(|ns| !ns.is_empty());
        Ok(Self {
            name: name.into(),
            location,
            target_namespace,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn location(&self) -> &Path {
        &self.location
    }

    pub fn target_namespace(&self) -> Option<&str> {
        self.target_namespace.as_deref()
    }

    pub fn validate(&self, document: &XmlDocument) -> Result<(), ValidationError> {
        let location = location_str(&self.location)?;
        let mut parser = SchemaParserContext::from_file(location);
        let mut context = SchemaValidationContext::from_parser(&mut parser).map_err(|errors| {
            SchemaError::Load {
                location: location.to_string(),
                reason: first_error(errors),
            }
        })?;
        context.validate_document(document.libxml()).map_err(|errors| {
            ValidationError::mismatch(format!(
                "XML schema validation failed for schema '{}': {}",
                self.name,
                first_error(errors)
            ))
        })?;
        info!(schema = %self.name, "XML schema validation successful: All values OK");
        Ok(())
    }
}

/// Named group of schemas, selected by target namespace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XsdSchemaRepository {
    name: String,
    schemas: Vec<XsdSchema>,
    default: bool,
}

impl XsdSchemaRepository {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            schemas: Vec::new(),
            default: false,
        }
    }

    pub fn with_schema(mut self, schema: XsdSchema) -> Self {
        self.schemas.push(schema);
        self
    }

    pub fn as_default(mut self, default: bool) -> Self {
        self.default = default;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn schemas(&self) -> &[XsdSchema] {
        &self.schemas
    }

    pub fn is_default(&self) -> bool {
        self.default
    }

    pub fn find_schema(&self, namespace: &str) -> Option<&XsdSchema> {
        self.schemas
            .iter()
            .find(|schema| schema.target_namespace() == Some(namespace))
    }
}

/// Every schema and repository known to the validator.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchemaRegistry {
    schemas: Vec<XsdSchema>,
    repositories: Vec<XsdSchemaRepository>,
}

impl SchemaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_schema(&mut self, schema: XsdSchema) {
        self.schemas.push(schema);
    }

    pub fn add_repository(&mut self, repository: XsdSchemaRepository) {
        self.repositories.push(repository);
    }

    pub fn repositories(&self) -> &[XsdSchemaRepository] {
        &self.repositories
    }

    /// Named schema, standalone or inside any repository.
    pub fn schema(&self, name: &str) -> Option<&XsdSchema> {
        self.schemas
            .iter()
            .chain(self.repositories.iter().flat_map(|repo| repo.schemas.iter()))
            .find(|schema| schema.name == name)
    }

    pub fn repository(&self, name: &str) -> Option<&XsdSchemaRepository> {
        self.repositories.iter().find(|repo| repo.name == name)
    }

    fn select_repository(&self, name: Option<&str>) -> Result<Option<&XsdSchemaRepository>, SchemaError> {
        if let Some(name) = name {
            return self
                .repository(name)
                .map(Some)
                .ok_or_else(|| SchemaError::UnknownRepository(name.to_string()));
        }
        match self.repositories.as_slice() {
            [] => Ok(None),
            [single] => Ok(Some(single)),
            many => many
                .iter()
                .find(|repo| repo.default)
                .map(Some)
                .ok_or(SchemaError::AmbiguousRepository(many.len())),
        }
    }

    /// Pick the schema for a root element: explicit schema, explicit repository,
    /// the only repository, then the default repository. `Ok(None)` means nothing
    /// is configured at all.
    pub fn resolve(
        &self,
        element: &str,
        namespace: &str,
        schema: Option<&str>,
        repository: Option<&str>,
    ) -> Result<Option<&XsdSchema>, SchemaError> {
        if let Some(name) = schema {
            return self
                .schema(name)
                .map(Some)
                .ok_or_else(|| SchemaError::UnknownSchema(name.to_string()));
        }
        let Some(repo) = self.select_repository(repository)? else {
            return Ok(None);
        };
        repo.find_schema(namespace)
            .map(Some)
            .ok_or_else(|| SchemaError::NoMatchingSchema {
                element: element.to_string(),
                namespace: namespace.to_string(),
                repository: repo.name.clone(),
            })
    }

    /// Validate the received document against the schema selected for its root.
    pub fn validate(
        &self,
        document: &XmlDocument,
        schema: Option<&str>,
        repository: Option<&str>,
    ) -> Result<(), ValidationError> {
        let tree = document.tree();
        let Some(root) = tree.root_element().and_then(|id| tree.element(id)) else {
            return Ok(());
        };
        let Some(namespace) = root.namespace_uri.as_deref().filter(|ns| !ns.is_empty()) else {
            warn!(
                element = %root.local_name,
                "Skipping XML schema validation as root element has no namespace"
            );
            return Ok(());
        };
        debug!("Starting XML schema validation");
        match self.resolve(&root.local_name, namespace, schema, repository)? {
            Some(schema) => schema.validate(document),
            None => {
                warn!("Neither schema instance nor schema repository defined - skipping XML schema validation");
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    const ORDER_XSD: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema"
           targetNamespace="urn:orders" xmlns="urn:orders" elementFormDefault="qualified">
  <xs:element name="Order">
    <xs:complexType>
      <xs:sequence>
        <xs:element name="Id" type="xs:int"/>
      </xs:sequence>
    </xs:complexType>
  </xs:element>
</xs:schema>"#;

    const OTHER_XSD: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema" targetNamespace="urn:other">
  <xs:element name="Other" type="xs:string"/>
</xs:schema>"#;

    fn write(dir: &TempDir, name: &str, content: &str) -> PathBuf {
        let path = dir.path().join(name);
        fs::write(&path, content).unwrap();
        path
    }

    fn registry(dir: &TempDir) -> SchemaRegistry {
        let orders = XsdSchema::load("orders", write(dir, "orders.xsd", ORDER_XSD)).unwrap();
        let other = XsdSchema::load("other", write(dir, "other.xsd", OTHER_XSD)).unwrap();
        let mut registry = SchemaRegistry::new();
        registry.add_repository(XsdSchemaRepository::new("main").with_schema(orders).with_schema(other));
        registry
    }

    #[test]
    fn reads_target_namespace() {
        let dir = TempDir::new().unwrap();
        let schema = XsdSchema::load("orders", write(&dir, "orders.xsd", ORDER_XSD)).unwrap();
        assert_eq!(schema.target_namespace(), Some("urn:orders"));
        assert!(matches!(
            XsdSchema::load("missing", dir.path().join("missing.xsd")),
            Err(SchemaError::Load { .. })
        ));
    }

    #[test]
    fn validates_against_single_repository() {
        let dir = TempDir::new().unwrap();
        let registry = registry(&dir);

        let valid = XmlDocument::parse(r#"<Order xmlns="urn:orders"><Id>1</Id></Order>"#).unwrap();
        assert!(registry.validate(&valid, None, None).is_ok());

        let invalid = XmlDocument::parse(r#"<Order xmlns="urn:orders"><Id>abc</Id></Order>"#).unwrap();
        let err = registry.validate(&invalid, None, None).unwrap_err();
        assert!(err.is_mismatch());
    }

    #[test]
    fn root_without_namespace_skips_validation() {
        let dir = TempDir::new().unwrap();
        let registry = registry(&dir);
        let doc = XmlDocument::parse("<Order><Id>abc</Id></Order>").unwrap();
        assert!(registry.validate(&doc, None, None).is_ok());
    }

    #[test]
    fn resolution_errors_are_configuration_errors() {
        let dir = TempDir::new().unwrap();
        let mut registry = registry(&dir);
        let doc = XmlDocument::parse(r#"<Unknown xmlns="urn:unknown"/>"#).unwrap();

        let err = registry.validate(&doc, None, None).unwrap_err();
        assert!(matches!(
            err,
            ValidationError::Schema(SchemaError::NoMatchingSchema { .. })
        ));
        assert!(err.is_configuration());

        assert!(matches!(
            registry.resolve("Order", "urn:orders", Some("nope"), None),
            Err(SchemaError::UnknownSchema(_))
        ));
        assert!(matches!(
            registry.resolve("Order", "urn:orders", None, Some("nope")),
            Err(SchemaError::UnknownRepository(_))
        ));

        registry.add_repository(XsdSchemaRepository::new("second"));
        assert!(matches!(
            registry.resolve("Order", "urn:orders", None, None),
            Err(SchemaError::AmbiguousRepository(2))
        ));
    }

    #[test]
    fn explicit_selection_wins() {
        let dir = TempDir::new().unwrap();
        let mut registry = registry(&dir);
        registry.add_repository(XsdSchemaRepository::new("empty").as_default(true));

        let resolved = registry
            .resolve("Order", "urn:orders", None, Some("main"))
            .unwrap()
            .map(XsdSchema::name);
        assert_eq!(resolved, Some("orders"));

        let resolved = registry
            .resolve("Order", "urn:orders", Some("other"), None)
            .unwrap()
            .map(XsdSchema::name);
        assert_eq!(resolved, Some("other"));

        assert!(matches!(
            registry.resolve("Order", "urn:orders", None, None),
            Err(SchemaError::NoMatchingSchema { .. })
        ));
    }
}
