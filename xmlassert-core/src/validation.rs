//! Validators comparing a received message against control data.
pub mod context;
pub mod namespace;
pub mod schema;
pub mod tree;
pub mod validator;
pub mod xpath;

pub use context::{XmlValidationContext, XmlValidationContextBuilder};
pub use namespace::validate_namespaces;
pub use schema::{SchemaError, SchemaRegistry, XsdSchema, XsdSchemaRepository};
pub use tree::TreeValidator;
pub use validator::XmlMessageValidator;
pub use xpath::XPathElementValidator;

use crate::context::ContextError;
use crate::dom::XmlError;
use crate::matcher::MatcherError;
use crate::xpath::XPathError;
use thiserror::Error;

/// Outcome of a failed validation.
///
/// `Mismatch` and `UnknownElement` describe the message under test; the other
/// variants describe a broken setup.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("{message}")]
    Mismatch {
        message: String,
        expected: Option<String>,
        actual: Option<String>,
        location: Option<String>,
    },
    #[error("element '{path}' could not be found in DOM tree")]
    UnknownElement { path: String },
    #[error("invalid validation setup: {0}")]
    Configuration(String),
    #[error(transparent)]
    Schema(#[from] SchemaError),
    #[error(transparent)]
    Xml(#[from] XmlError),
    #[error(transparent)]
    XPath(#[from] XPathError),
    #[error(transparent)]
    Context(#[from] ContextError),
}

impl ValidationError {
    /// Mismatch without value details.
    pub fn mismatch(message: impl Into<String>) -> Self {
        ValidationError::Mismatch {
            message: message.into(),
            expected: None,
            actual: None,
            location: None,
        }
    }

    /// `"{reason}, expected '{expected}' but was '{actual}'"`. Absent values print as
    /// `null`.
    pub fn value_mismatch(reason: impl AsRef<str>, expected: Option<&str>, actual: Option<&str>) -> Self {
        let message = format!(
            "{}, expected '{}' but was '{}'",
            reason.as_ref(),
            expected.unwrap_or("null"),
            actual.unwrap_or("null")
        );
        ValidationError::Mismatch {
            message,
            expected: expected.map(str::to_string),
            actual: actual.map(str::to_string),
            location: None,
        }
    }

    /// Attach the dotted path of the offending node.
    pub fn at(self, path: impl Into<String>) -> Self {
        match self {
            ValidationError::Mismatch {
                message,
                expected,
                actual,
                ..
            } => ValidationError::Mismatch {
                message,
                expected,
                actual,
                location: Some(path.into()),
            },
            other => other,
        }
    }

    /// Failure caused by the message content rather than the setup.
    pub fn is_mismatch(&self) -> bool {
        matches!(
            self,
            ValidationError::Mismatch { .. } | ValidationError::UnknownElement { .. }
        )
    }

    pub fn is_configuration(&self) -> bool {
        match self {
            ValidationError::Configuration(_) => true,
            ValidationError::Schema(err) => err.is_configuration(),
            _ => false,
        }
    }

    pub fn location(&self) -> Option<&str> {
        match self {
            ValidationError::Mismatch { location, .. } => location.as_deref(),
            ValidationError::UnknownElement { path } => Some(path),
            _ => None,
        }
    }
}

impl From<MatcherError> for ValidationError {
    fn from(err: MatcherError) -> Self {
        match err {
            MatcherError::Mismatch { field, reason } => {
                ValidationError::mismatch(format!("Validation matcher failed for '{field}': {reason}"))
                    .at(field)
            }
            other => ValidationError::Configuration(other.to_string()),
        }
    }
}
