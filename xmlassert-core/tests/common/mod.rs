use std::fs;
use std::path::{Path, PathBuf};

use xmlassert_core::context::TestContext;
use xmlassert_core::message::Message;
use xmlassert_core::validation::{
    SchemaRegistry, ValidationError, XmlMessageValidator, XmlValidationContext, XsdSchema,
    XsdSchemaRepository,
};

#[allow(dead_code)]
pub fn fixture_path(relative: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests/fixtures")
        .join(relative)
}

#[allow(dead_code)]
pub fn fixture(relative: &str) -> String {
    fs::read_to_string(fixture_path(relative)).expect("read fixture")
}

#[allow(dead_code)]
pub fn order_schemas() -> SchemaRegistry {
    let orders = XsdSchema::load("orders", fixture_path("schemas/orders.xsd")).expect("orders schema");
    let headers =
        XsdSchema::load("headers", fixture_path("schemas/headers.xsd")).expect("headers schema");
    let mut registry = SchemaRegistry::new();
    registry.add_repository(
        XsdSchemaRepository::new("main")
            .with_schema(orders)
            .with_schema(headers),
    );
    registry
}

/// Validate a payload pair with an empty schema registry.
#[allow(dead_code)]
pub fn validate(
    received: &str,
    control: &str,
    validation: &XmlValidationContext,
) -> Result<(), ValidationError> {
    XmlMessageValidator::default().validate_message(
        &Message::new(received),
        Some(&Message::new(control)),
        &TestContext::new(),
        validation,
    )
}

#[allow(dead_code)]
pub fn no_schema() -> XmlValidationContext {
    XmlValidationContext::builder().schema_validation(false).build()
}
