use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use tempfile::TempDir;

fn cli_exe() -> &'static str {
    env!("CARGO_BIN_EXE_xmlassert")
}

fn core_fixture(relative: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("..")
        .join("xmlassert-core")
        .join("tests")
        .join("fixtures")
        .join(relative)
}

fn write(dir: &Path, name: &str, content: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, content).expect("write temp file");
    path
}

fn run(args: &[&str]) -> Output {
    Command::new(cli_exe())
        .args(args)
        .env_remove("RUST_LOG")
        .output()
        .expect("run cli")
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

#[test]
fn validate_command_accepts_order_with_config() {
    let config = core_fixture("xmlassert.toml");
    let received = core_fixture("messages/order.xml");
    let control = core_fixture("messages/order-control.xml");

    let output = run(&[
        "validate",
        "--config",
        config.to_str().unwrap(),
        "--received",
        received.to_str().unwrap(),
        "--control",
        control.to_str().unwrap(),
    ]);

    assert!(output.status.success(), "stderr: {}", stderr(&output));
    assert_eq!(String::from_utf8_lossy(&output.stdout).trim(), "OK");
}

#[test]
fn validate_command_reports_value_mismatch() {
    let dir = TempDir::new().unwrap();
    let received = write(dir.path(), "received.xml", "<A><B>y</B></A>");
    let control = write(dir.path(), "control.xml", "<A><B>x</B></A>");

    let output = run(&[
        "validate",
        "--received",
        received.to_str().unwrap(),
        "--control",
        control.to_str().unwrap(),
    ]);

    assert!(!output.status.success());
    let stderr = stderr(&output);
    assert!(
        stderr.contains("Node value not equal for element 'A.B'"),
        "stderr: {stderr}"
    );
}

#[test]
fn validate_command_applies_ignore_flags() {
    let dir = TempDir::new().unwrap();
    let received = write(dir.path(), "received.xml", "<A><B>x</B><C>2</C></A>");
    let control = write(dir.path(), "control.xml", "<A><B>x</B><C>1</C></A>");

    let output = run(&[
        "validate",
        "--received",
        received.to_str().unwrap(),
        "--control",
        control.to_str().unwrap(),
        "--ignore",
        "A.C",
    ]);

    assert!(output.status.success(), "stderr: {}", stderr(&output));
}

#[test]
fn validate_command_rejects_schema_violation() {
    let config = core_fixture("xmlassert.toml");
    let received = core_fixture("messages/order-invalid.xml");

    let output = run(&[
        "validate",
        "--config",
        config.to_str().unwrap(),
        "--received",
        received.to_str().unwrap(),
    ]);

    assert!(!output.status.success());
    assert!(stderr(&output).contains("XML schema validation failed"));
}

#[test]
fn xpath_command_checks_expressions() {
    let dir = TempDir::new().unwrap();
    let received = write(
        dir.path(),
        "received.xml",
        r#"<ns:A xmlns:ns="urn:a"><ns:B>x</ns:B><ns:B>y</ns:B></ns:A>"#,
    );

    let output = run(&[
        "xpath",
        "--received",
        received.to_str().unwrap(),
        "--namespace",
        "n=urn:a",
        "--expression",
        "string:/n:A/n:B[1]=x",
        "--expression",
        "integer:count(//n:B)=2",
    ]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));

    let output = run(&[
        "xpath",
        "--received",
        received.to_str().unwrap(),
        "--namespace",
        "n=urn:a",
        "--expression",
        "string:/n:A/n:B[2]=x",
    ]);
    assert!(!output.status.success());
    assert!(stderr(&output).contains("expected 'x' but was 'y'"));
}

#[test]
fn xpath_command_rejects_malformed_pair() {
    let dir = TempDir::new().unwrap();
    let received = write(dir.path(), "received.xml", "<A/>");

    let output = run(&[
        "xpath",
        "--received",
        received.to_str().unwrap(),
        "--expression",
        "no-separator",
    ]);
    assert!(!output.status.success());
    assert!(stderr(&output).contains("expected KEY=VALUE"));
}

#[test]
fn xpath_command_rejects_unknown_matcher_before_validating() {
    let dir = TempDir::new().unwrap();
    let received = write(dir.path(), "received.xml", "<A><B>x</B></A>");

    let output = run(&[
        "xpath",
        "--received",
        received.to_str().unwrap(),
        "--expression",
        "//B=@noSuchMatcher()@",
    ]);
    assert!(!output.status.success());
    let stderr = stderr(&output);
    assert!(stderr.contains("invalid XPath expectation"), "stderr: {stderr}");
}
