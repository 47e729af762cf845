use super::{MatcherError, MatcherRegistry};
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use regex::Regex;

pub(super) fn register_defaults(registry: &mut MatcherRegistry) {
    registry.register("ignore", ignore);
    registry.register("equalsIgnoreCase", equals_ignore_case);
    registry.register("contains", contains);
    registry.register("containsIgnoreCase", contains_ignore_case);
    registry.register("startsWith", starts_with);
    registry.register("endsWith", ends_with);
    registry.register("matches", matches);
    registry.register("matchesDatePattern", matches_date_pattern);
    registry.register("isNumber", is_number);
    registry.register("greaterThan", greater_than);
    registry.register("lowerThan", lower_than);
    registry.register("empty", empty);
    registry.register("notEmpty", not_empty);
}

fn single_param<'p>(matcher: &str, params: &'p [String]) -> Result<&'p str, MatcherError> {
    match params {
        [param] => Ok(param),
        _ => Err(MatcherError::InvalidParameters {
            matcher: matcher.to_string(),
            reason: format!("expected exactly one parameter, got {}", params.len()),
        }),
    }
}

fn number(matcher: &str, field: &str, value: &str) -> Result<f64, MatcherError> {
    value.trim().parse::<f64>().map_err(|_| {
        MatcherError::mismatch(field, format!("{matcher} requires a number, got '{value}'"))
    })
}

fn check(field: &str, ok: bool, reason: impl FnOnce() -> String) -> Result<(), MatcherError> {
    if ok {
        Ok(())
    } else {
        Err(MatcherError::mismatch(field, reason()))
    }
}

fn ignore(_: &str, _: &str, _: &[String]) -> Result<(), MatcherError> {
    Ok(())
}

fn equals_ignore_case(field: &str, actual: &str, params: &[String]) -> Result<(), MatcherError> {
    let expected = single_param("equalsIgnoreCase", params)?;
    check(field, actual.to_lowercase() == expected.to_lowercase(), || {
        format!("'{actual}' is not equal (ignoring case) to '{expected}'")
    })
}

fn contains(field: &str, actual: &str, params: &[String]) -> Result<(), MatcherError> {
    let expected = single_param("contains", params)?;
    check(field, actual.contains(expected), || {
        format!("'{actual}' does not contain '{expected}'")
    })
}

fn contains_ignore_case(field: &str, actual: &str, params: &[String]) -> Result<(), MatcherError> {
    let expected = single_param("containsIgnoreCase", params)?;
    check(
        field,
        actual.to_lowercase().contains(&expected.to_lowercase()),
        || format!("'{actual}' does not contain (ignoring case) '{expected}'"),
    )
}

fn starts_with(field: &str, actual: &str, params: &[String]) -> Result<(), MatcherError> {
    let expected = single_param("startsWith", params)?;
    check(field, actual.starts_with(expected), || {
        format!("'{actual}' does not start with '{expected}'")
    })
}

fn ends_with(field: &str, actual: &str, params: &[String]) -> Result<(), MatcherError> {
    let expected = single_param("endsWith", params)?;
    check(field, actual.ends_with(expected), || {
        format!("'{actual}' does not end with '{expected}'")
    })
}

fn matches(field: &str, actual: &str, params: &[String]) -> Result<(), MatcherError> {
    let pattern = single_param("matches", params)?;
    let regex = Regex::new(&format!("^(?:{pattern})$")).map_err(|e| MatcherError::InvalidParameters {
        matcher: "matches".to_string(),
        reason: e.to_string(),
    })?;
    check(field, regex.is_match(actual), || {
        format!("'{actual}' does not match pattern '{pattern}'")
    })
}

/// Accepts the value if it parses as a date-time, date or time with the given chrono
/// format.
fn matches_date_pattern(field: &str, actual: &str, params: &[String]) -> Result<(), MatcherError> {
    let pattern = single_param("matchesDatePattern", params)?;
    let parsed = NaiveDateTime::parse_from_str(actual, pattern).is_ok()
        || NaiveDate::parse_from_str(actual, pattern).is_ok()
        || NaiveTime::parse_from_str(actual, pattern).is_ok();
    check(field, parsed, || {
        format!("'{actual}' does not match date pattern '{pattern}'")
    })
}

fn is_number(field: &str, actual: &str, _: &[String]) -> Result<(), MatcherError> {
    check(field, actual.trim().parse::<f64>().is_ok(), || {
        format!("'{actual}' is not a number")
    })
}

fn greater_than(field: &str, actual: &str, params: &[String]) -> Result<(), MatcherError> {
    let bound = number("greaterThan", field, single_param("greaterThan", params)?)?;
    let value = number("greaterThan", field, actual)?;
    check(field, value > bound, || format!("{actual} is not greater than {bound}"))
}

fn lower_than(field: &str, actual: &str, params: &[String]) -> Result<(), MatcherError> {
    let bound = number("lowerThan", field, single_param("lowerThan", params)?)?;
    let value = number("lowerThan", field, actual)?;
    check(field, value < bound, || format!("{actual} is not lower than {bound}"))
}

fn empty(field: &str, actual: &str, _: &[String]) -> Result<(), MatcherError> {
    check(field, actual.is_empty(), || format!("'{actual}' is not empty"))
}

fn not_empty(field: &str, actual: &str, _: &[String]) -> Result<(), MatcherError> {
    check(field, !actual.is_empty(), || "value is empty".to_string())
}
