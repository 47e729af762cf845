//! Sequencing of the individual validators for one received message.
use super::{
    SchemaRegistry, TreeValidator, ValidationError, XPathElementValidator, XmlValidationContext,
    validate_namespaces,
};
use crate::context::TestContext;
use crate::dom::{XmlDocument, pretty_print};
use crate::ignore::IgnoreResolver;
use crate::message::Message;
use crate::xpath::NamespaceContext;
use tracing::{debug, error, info};

/// Validates received XML messages against control messages and validation
/// contexts.
#[derive(Debug, Clone, Default)]
pub struct XmlMessageValidator {
    schemas: SchemaRegistry,
}

impl XmlMessageValidator {
    pub fn new(schemas: SchemaRegistry) -> Self {
        Self { schemas }
    }

    pub fn schemas(&self) -> &SchemaRegistry {
        &self.schemas
    }

    /// Run schema, namespace, payload, XPath and header validation in that order and
    /// stop at the first failure.
    ///
    /// # Examples
    /// ```rust
    /// use xmlassert_core::context::TestContext;
    /// use xmlassert_core::message::Message;
    /// use xmlassert_core::validation::{XmlMessageValidator, XmlValidationContext};
    ///
    /// let validator = XmlMessageValidator::default();
    /// let received = Message::new("<A><B>x</B><C>2024-01-01</C></A>");
    /// let control = Message::new("<A><B>x</B><C>@ignore@</C></A>");
    /// validator.validate_message(
    ///     &received,
    ///     Some(&control),
    ///     &TestContext::new(),
    ///     &XmlValidationContext::default(),
    /// )?;
    /// # Ok::<(), xmlassert_core::validation::ValidationError>(())
    /// ```
    pub fn validate_message(
        &self,
        received: &Message,
        control: Option<&Message>,
        context: &TestContext,
        validation: &XmlValidationContext,
    ) -> Result<(), ValidationError> {
        debug!("Start XML message validation");
        let result = self.run(received, control, context, validation);
        match &result {
            Ok(()) => info!("XML message validation successful: All values OK"),
            Err(err) if err.is_mismatch() => {
                error!(
                    "Failed to validate XML message: {err}\nReceived message:\n{}",
                    pretty_print(received.payload())
                );
            }
            Err(err) => error!("XML message validation aborted: {err}"),
        }
        result
    }

    fn run(
        &self,
        received: &Message,
        control: Option<&Message>,
        context: &TestContext,
        validation: &XmlValidationContext,
    ) -> Result<(), ValidationError> {
        for (_, expected) in validation.xpath_expressions() {
            context.matchers().check(expected.trim())?;
        }

        let document = if received.has_payload() {
            Some(XmlDocument::parse(received.payload())?)
        } else {
            None
        };

        if validation.is_schema_validation_enabled() {
            if let Some(document) = &document {
                self.schemas
                    .validate(document, validation.schema(), validation.schema_repository())?;
            }
        }

        if !validation.control_namespaces().is_empty() {
            let document = document.as_ref().ok_or_else(|| {
                ValidationError::mismatch(
                    "Unable to validate message namespaces - receive message payload was empty",
                )
            })?;
            validate_namespaces(validation.control_namespaces(), document)?;
        }

        self.validate_payload(document.as_ref(), control, context, validation)?;

        if !validation.xpath_expressions().is_empty() {
            let document = document.as_ref().ok_or_else(|| {
                ValidationError::mismatch(
                    "Unable to validate message elements - receive message payload was empty",
                )
            })?;
            let namespaces = NamespaceContext::for_document(document, validation.namespaces());
            let ignore = self.ignore_resolver(document, &namespaces, context, validation)?;
            XPathElementValidator::new(document, &namespaces, &ignore, context)?
                .validate(validation.xpath_expressions())?;
        }

        if let Some(control) = control {
            self.validate_header_data(received, control, context, validation)?;
        }
        Ok(())
    }

    fn ignore_resolver(
        &self,
        document: &XmlDocument,
        namespaces: &NamespaceContext,
        context: &TestContext,
        validation: &XmlValidationContext,
    ) -> Result<IgnoreResolver, ValidationError> {
        Ok(IgnoreResolver::new(
            document,
            validation.ignore_expressions(),
            namespaces,
            context.ignore_placeholder(),
        )?)
    }

    fn validate_payload(
        &self,
        received: Option<&XmlDocument>,
        control: Option<&Message>,
        context: &TestContext,
        validation: &XmlValidationContext,
    ) -> Result<(), ValidationError> {
        let Some(control) = control.filter(|message| message.has_payload()) else {
            debug!("Skip message payload validation as no control message was defined");
            return Ok(());
        };
        let received = received.ok_or_else(|| {
            ValidationError::mismatch(
                "Unable to validate message payload - received message payload was empty, control message payload is not",
            )
        })?;
        let control = XmlDocument::parse(control.payload())?;
        self.compare(received, &control, context, validation)?;
        info!("XML tree validation successful: All values OK");
        Ok(())
    }

    fn compare(
        &self,
        received: &XmlDocument,
        control: &XmlDocument,
        context: &TestContext,
        validation: &XmlValidationContext,
    ) -> Result<(), ValidationError> {
        let namespaces = NamespaceContext::for_document(received, validation.namespaces());
        let ignore = self.ignore_resolver(received, &namespaces, context, validation)?;
        TreeValidator::new(received, control, &ignore, context).validate()
    }

    fn validate_header_data(
        &self,
        received: &Message,
        control: &Message,
        context: &TestContext,
        validation: &XmlValidationContext,
    ) -> Result<(), ValidationError> {
        let expected = control.header_data();
        if expected.is_empty() {
            return Ok(());
        }
        let actual = received.header_data();
        if expected.len() > actual.len() {
            return Err(ValidationError::value_mismatch(
                "Failed to validate header data XML fragments - number of header fragments not equal",
                Some(expected.len().to_string().as_str()),
                Some(actual.len().to_string().as_str()),
            ));
        }
        debug!("Start XML header data validation");
        for (received_fragment, control_fragment) in actual.iter().zip(expected) {
            let received = XmlDocument::parse(received_fragment)?;
            let control = XmlDocument::parse(control_fragment)?;
            self.compare(&received, &control, context, validation)?;
        }
        info!("XML header data validation successful: All values OK");
        Ok(())
    }
}
