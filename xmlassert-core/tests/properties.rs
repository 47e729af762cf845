mod common;

use common::{no_schema, validate};
use xmlassert_core::context::TestContext;
use xmlassert_core::message::Message;
use xmlassert_core::validation::{XmlMessageValidator, XmlValidationContext};

const DOCUMENTS: &[&str] = &[
    "<A/>",
    "<A><B>x</B></A>",
    r#"<A id="1"><B type="t">x</B><C><D/><D>y</D></C></A>"#,
    r#"<n:A xmlns:n="urn:n" xmlns:m="urn:m"><m:B m:flag="on">text</m:B></n:A>"#,
    "<A><![CDATA[raw <data>]]></A>",
    r#"<!DOCTYPE A SYSTEM "a.dtd"><A><!-- note --><B/></A>"#,
];

#[test]
fn identical_trees_always_pass() {
    for document in DOCUMENTS {
        assert!(
            validate(document, document, &no_schema()).is_ok(),
            "self-comparison failed for {document}"
        );
    }
}

#[test]
fn placeholder_element_accepts_any_received_value() {
    let control = "<Order><Id>@ignore@</Id><Total>10</Total></Order>";
    for value in ["", "1", "some text", "<Nested>deep</Nested>", "<![CDATA[x]]>"] {
        let received = format!("<Order><Id>{value}</Id><Total>10</Total></Order>");
        assert!(
            validate(&received, control, &no_schema()).is_ok(),
            "placeholder did not cover {value:?}"
        );
    }
}

#[test]
fn ignored_path_tolerates_changes_but_siblings_do_not() {
    let control = "<Order><Id>1</Id><Created>monday</Created><Total>10</Total></Order>";
    let validation = XmlValidationContext::builder()
        .schema_validation(false)
        .ignore("Order.Created")
        .build();
    for value in ["tuesday", "", "2024-01-01"] {
        let received = format!("<Order><Id>1</Id><Created>{value}</Created><Total>10</Total></Order>");
        assert!(validate(&received, control, &validation).is_ok());
    }
    let received = "<Order><Id>1</Id><Created>monday</Created><Total>11</Total></Order>";
    assert!(validate(received, control, &validation).is_err());
}

#[test]
fn attribute_count_excludes_namespace_declarations() {
    let cases = [
        (r#"<A xmlns="urn:a" x="1"/>"#, r#"<A xmlns="urn:a" x="1"/>"#),
        (
            r#"<p:A xmlns:p="urn:a" xmlns:q="urn:q" x="1"/>"#,
            r#"<r:A xmlns:r="urn:a" x="1"/>"#,
        ),
    ];
    for (received, control) in cases {
        assert!(validate(received, control, &no_schema()).is_ok(), "{received} vs {control}");
    }
}

#[test]
fn namespace_count_difference_fails_even_when_prefixes_match() {
    let validation = XmlValidationContext::builder()
        .schema_validation(false)
        .control_namespace("a", "urn:a")
        .build();
    let received = r#"<a:A xmlns:a="urn:a" xmlns:b="urn:b"/>"#;
    let err = validate(received, received, &validation).unwrap_err();
    assert!(err.to_string().starts_with("Number of namespace declarations not equal"));
}

#[test]
fn result_type_prefix_coerces_before_comparison() {
    let received = Message::new("<A><B>5</B><B>7</B></A>");
    let cases = [
        ("//B", "5"),
        ("boolean://B", "true"),
        ("boolean://C", "false"),
        ("number://B", "5.0"),
        ("number:count(//B)", "2.0"),
        ("integer:sum(//B)", "12"),
        ("string://B", "5"),
        ("node-set://B", "[5, 7]"),
    ];
    for (expression, expected) in cases {
        let validation = XmlValidationContext::builder()
            .schema_validation(false)
            .xpath(expression, expected)
            .build();
        let result = XmlMessageValidator::default().validate_message(
            &received,
            None,
            &TestContext::new(),
            &validation,
        );
        assert!(result.is_ok(), "{expression} = {expected}: {result:?}");
    }
}
