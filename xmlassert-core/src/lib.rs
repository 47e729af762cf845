//! XML message validation: tree comparison against control documents, ignore
//! expressions and placeholders, namespace, XSD schema and XPath checks.
//!
//! # Examples
//! ```rust
//! use xmlassert_core::context::TestContext;
//! use xmlassert_core::message::Message;
//! use xmlassert_core::validation::{XmlMessageValidator, XmlValidationContext};
//!
//! let validation = XmlValidationContext::builder()
//!     .ignore("Order.CreatedAt")
//!     .xpath("//Order/Id", "42")
//!     .build();
//! let received = Message::new("<Order><Id>42</Id><CreatedAt>now</CreatedAt></Order>");
//! let control = Message::new("<Order><Id>42</Id><CreatedAt>then</CreatedAt></Order>");
//!
//! XmlMessageValidator::default().validate_message(
//!     &received,
//!     Some(&control),
//!     &TestContext::new(),
//!     &validation,
//! )?;
//! # Ok::<(), xmlassert_core::Error>(())
//! ```
pub mod config;
pub mod context;
pub mod dom;
pub mod ignore;
pub mod matcher;
pub mod message;
pub mod validation;
pub mod xpath;

use thiserror::Error;

/// Top-level error wrapper for core operations.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Validation(#[from] validation::ValidationError),
    #[error(transparent)]
    Schema(#[from] validation::SchemaError),
    #[error(transparent)]
    Config(#[from] config::ConfigError),
    #[error(transparent)]
    Xml(#[from] dom::XmlError),
    #[error(transparent)]
    XPath(#[from] xpath::XPathError),
    #[error(transparent)]
    Matcher(#[from] matcher::MatcherError),
    #[error(transparent)]
    Context(#[from] context::ContextError),
}

#[cfg(test)]
mod tests {
    use super::Error;
    use crate::config::ConfigError;
    use crate::context::ContextError;
    use crate::dom::XmlError;
    use crate::matcher::MatcherError;
    use crate::validation::{SchemaError, ValidationError};
    use crate::xpath::XPathError;

    #[test]
    fn error_conversions_cover_variants() {
        let err: Error = ValidationError::mismatch("boom").into();
        assert!(matches!(err, Error::Validation(_)));
        assert_eq!(err.to_string(), "boom");

        let err: Error = SchemaError::UnknownSchema("orders".into()).into();
        assert!(matches!(err, Error::Schema(_)));

        let err: Error = ConfigError::Parse(toml::from_str::<toml::Value>("=").unwrap_err()).into();
        assert!(matches!(err, Error::Config(_)));

        let err: Error = XmlError::EmptyPayload.into();
        assert!(matches!(err, Error::Xml(_)));
        assert_eq!(err.to_string(), "XML payload is empty");

        let err: Error = XPathError::NoResult {
            expression: "//a".into(),
        }
        .into();
        assert!(matches!(err, Error::XPath(_)));

        let err: Error = MatcherError::Unknown("nope".into()).into();
        assert!(matches!(err, Error::Matcher(_)));

        let err: Error = ContextError::UnknownVariable("x".into()).into();
        assert!(matches!(err, Error::Context(_)));
    }
}
