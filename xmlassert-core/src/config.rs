//! Validator configuration, loadable from TOML.
use crate::context::TestContext;
use crate::matcher::MatcherError;
use crate::validation::{
    SchemaError, SchemaRegistry, XmlValidationContext, XmlValidationContextBuilder, XsdSchema,
    XsdSchemaRepository,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Literals recognised inside control documents and expressions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub ignore_placeholder: String,
    pub matcher_prefix: String,
    pub matcher_suffix: String,
    pub variable_prefix: String,
    pub variable_suffix: String,
    pub function_prefix: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            ignore_placeholder: "@ignore@".to_string(),
            matcher_prefix: crate::matcher::DEFAULT_MATCHER_PREFIX.to_string(),
            matcher_suffix: crate::matcher::DEFAULT_MATCHER_SUFFIX.to_string(),
            variable_prefix: "${".to_string(),
            variable_suffix: "}".to_string(),
            function_prefix: "fn:".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaDefinition {
    pub name: String,
    pub location: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryDefinition {
    pub name: String,
    #[serde(default)]
    pub default: bool,
    /// Schema names declared under `[[schemas]]`.
    #[serde(default)]
    pub schemas: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct XPathCheck {
    pub expression: String,
    pub expected: String,
}

/// Validation settings applied when no explicit context is given.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationProfile {
    pub ignore: Vec<String>,
    pub namespaces: BTreeMap<String, String>,
    pub control_namespaces: BTreeMap<String, String>,
    pub schema_validation: bool,
    pub schema: Option<String>,
    pub schema_repository: Option<String>,
    pub xpath: Vec<XPathCheck>,
}

impl Default for ValidationProfile {
    fn default() -> Self {
        Self {
            ignore: Vec::new(),
            namespaces: BTreeMap::new(),
            control_namespaces: BTreeMap::new(),
            schema_validation: true,
            schema: None,
            schema_repository: None,
            xpath: Vec::new(),
        }
    }
}

/// Top-level configuration.
///
/// # Examples
/// ```rust
/// use xmlassert_core::config::Config;
///
/// let config = Config::from_toml_str(r#"
/// [settings]
/// ignore_placeholder = "*skip*"
///
/// [profile]
/// ignore = ["Order.CreatedAt"]
/// "#)?;
/// assert_eq!(config.settings().ignore_placeholder, "*skip*");
/// assert_eq!(config.validation_context()?.ignore_expressions().len(), 1);
/// # Ok::<(), xmlassert_core::Error>(())
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    settings: Settings,
    variables: BTreeMap<String, String>,
    schemas: Vec<SchemaDefinition>,
    repositories: Vec<RepositoryDefinition>,
    profile: ValidationProfile,
}

impl Config {
    pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(input)?)
    }

    /// Load a TOML file. Relative schema locations resolve against the file's
    /// directory.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let input = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config = Self::from_toml_str(&input)?;
        if let Some(base) = path.parent() {
            for schema in &mut config.schemas {
                if schema.location.is_relative() {
                    schema.location = base.join(&schema.location);
                }
            }
        }
        Ok(config)
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn variables(&self) -> &BTreeMap<String, String> {
        &self.variables
    }

    pub fn schemas(&self) -> &[SchemaDefinition] {
        &self.schemas
    }

    pub fn repositories(&self) -> &[RepositoryDefinition] {
        &self.repositories
    }

    pub fn profile(&self) -> &ValidationProfile {
        &self.profile
    }

    /// Load every configured schema. Schemas not listed by a repository are
    /// registered standalone.
    pub fn schema_registry(&self) -> Result<SchemaRegistry, SchemaError> {
        let mut loaded = BTreeMap::new();
        for definition in &self.schemas {
            let schema = XsdSchema::load(definition.name.clone(), &definition.location)?;
            loaded.insert(definition.name.clone(), schema);
        }

        let mut registry = SchemaRegistry::new();
        for definition in &self.repositories {
            let mut repository = XsdSchemaRepository::new(definition.name.clone()).as_default(definition.default);
            for name in &definition.schemas {
                let schema = loaded
                    .get(name)
                    .cloned()
                    .ok_or_else(|| SchemaError::UnknownSchema(name.clone()))?;
                repository = repository.with_schema(schema);
            }
            registry.add_repository(repository);
        }

        let in_repository: Vec<&String> = self.repositories.iter().flat_map(|r| r.schemas.iter()).collect();
        for (name, schema) in loaded {
            if !in_repository.contains(&&name) {
                registry.add_schema(schema);
            }
        }
        Ok(registry)
    }

    pub fn test_context(&self) -> TestContext {
        let mut context = TestContext::with_settings(self.settings.clone());
        for (name, value) in &self.variables {
            context.set_variable(name.clone(), value.clone());
        }
        context
    }

    /// Profile as a validation context, with XPath matchers resolved against the
    /// configured matcher delimiters.
    pub fn validation_context(&self) -> Result<XmlValidationContext, MatcherError> {
        self.validation_builder().build_with(self.test_context().matchers())
    }

    /// Builder seeded with the profile, for callers adding their own checks.
    pub fn validation_builder(&self) -> XmlValidationContextBuilder {
        let profile = &self.profile;
        let mut builder = XmlValidationContext::builder()
            .ignore_all(profile.ignore.iter().cloned())
            .schema_validation(profile.schema_validation);
        for (prefix, uri) in &profile.namespaces {
            builder = builder.namespace(prefix.clone(), uri.clone());
        }
        for (prefix, uri) in &profile.control_namespaces {
            builder = builder.control_namespace(prefix.clone(), uri.clone());
        }
        if let Some(schema) = &profile.schema {
            builder = builder.schema(schema.clone());
        }
        if let Some(repository) = &profile.schema_repository {
            builder = builder.schema_repository(repository.clone());
        }
        for check in &profile.xpath {
            builder = builder.xpath(check.expression.clone(), check.expected.clone());
        }
        builder
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn defaults() {
        let config = Config::default();
        assert_eq!(config.settings().ignore_placeholder, "@ignore@");
        assert_eq!(config.settings().variable_prefix, "${");
        assert!(config.profile().schema_validation);
        assert!(config.schema_registry().unwrap().repositories().is_empty());
    }

    #[test]
    fn parses_full_profile() {
        let config = Config::from_toml_str(
            r#"
            [variables]
            id = "42"

            [profile]
            ignore = ["//Timestamp"]
            schema_validation = false
            schema_repository = "main"

            [profile.namespaces]
            ord = "urn:orders"

            [profile.control_namespaces]
            "" = "urn:orders"

            [[profile.xpath]]
            expression = "//ord:Id"
            expected = "${id}"

            [[profile.xpath]]
            expression = "boolean://ord:Paid"
            expected = "true"
            "#,
        )
        .unwrap();

        let context = config.validation_context().unwrap();
        assert!(!context.is_schema_validation_enabled());
        assert_eq!(context.schema_repository(), Some("main"));
        assert_eq!(context.namespaces().get("ord").map(String::as_str), Some("urn:orders"));
        assert_eq!(context.control_namespaces().get("").map(String::as_str), Some("urn:orders"));
        assert_eq!(context.xpath_expressions()[0].0, "//ord:Id");
        assert_eq!(context.xpath_expressions()[1].0, "boolean://ord:Paid");
        assert_eq!(config.test_context().variable("id"), Some("42"));
    }

    #[test]
    fn profile_with_unknown_xpath_matcher_is_rejected() {
        let config = Config::from_toml_str(
            r#"
            [[profile.xpath]]
            expression = "//Id"
            expected = "@noSuchMatcher()@"
            "#,
        )
        .unwrap();
        assert!(matches!(
            config.validation_context(),
            Err(MatcherError::Unknown(name)) if name == "noSuchMatcher"
        ));
    }

    #[test]
    fn rejects_invalid_toml() {
        assert!(matches!(
            Config::from_toml_str("[profile\nignore = 1"),
            Err(ConfigError::Parse(_))
        ));
        assert!(matches!(
            Config::from_file("/definitely/not/here.toml"),
            Err(ConfigError::Read { .. })
        ));
    }

    #[test]
    fn schema_locations_resolve_relative_to_config_file() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("orders.xsd"),
            r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema" targetNamespace="urn:orders">
                 <xs:element name="Order" type="xs:string"/>
               </xs:schema>"#,
        )
        .unwrap();
        let config_path = dir.path().join("xmlassert.toml");
        fs::write(
            &config_path,
            r#"
            [[schemas]]
            name = "orders"
            location = "orders.xsd"

            [[repositories]]
            name = "main"
            default = true
            schemas = ["orders"]
            "#,
        )
        .unwrap();

        let config = Config::from_file(&config_path).unwrap();
        let registry = config.schema_registry().unwrap();
        let repository = registry.repository("main").unwrap();
        assert!(repository.is_default());
        assert_eq!(
            repository.find_schema("urn:orders").map(XsdSchema::name),
            Some("orders")
        );
    }

    #[test]
    fn repository_with_unknown_schema_fails() {
        let config = Config::from_toml_str(
            r#"
            [[repositories]]
            name = "main"
            schemas = ["missing"]
            "#,
        )
        .unwrap();
        assert!(matches!(
            config.schema_registry(),
            Err(SchemaError::UnknownSchema(_))
        ));
    }
}
