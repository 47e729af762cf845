//! Validation matchers: `@name(params)@` expressions used in place of literal expected
//! values.
mod builtin;

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

pub const DEFAULT_MATCHER_PREFIX: &str = "@";
pub const DEFAULT_MATCHER_SUFFIX: &str = "@";

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum MatcherError {
    #[error("{field}: {reason}")]
    Mismatch { field: String, reason: String },
    #[error("unknown validation matcher '{0}'")]
    Unknown(String),
    #[error("invalid parameters for validation matcher '{matcher}': {reason}")]
    InvalidParameters { matcher: String, reason: String },
}

impl MatcherError {
    pub(crate) fn mismatch(field: &str, reason: impl Into<String>) -> Self {
        MatcherError::Mismatch {
            field: field.to_string(),
            reason: reason.into(),
        }
    }
}

/// A named check applied to an actual value.
///
/// Closures with the same shape implement the trait, so ad-hoc matchers can be
/// registered without a dedicated type.
pub trait ValidationMatcher: Send + Sync {
    fn validate(&self, field: &str, actual: &str, params: &[String]) -> Result<(), MatcherError>;
}

impl<F> ValidationMatcher for F
where
    F: Fn(&str, &str, &[String]) -> Result<(), MatcherError> + Send + Sync,
{
    fn validate(&self, field: &str, actual: &str, params: &[String]) -> Result<(), MatcherError> {
        self(field, actual, params)
    }
}

/// Parsed `@name(params)@` expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatcherExpression {
    pub name: String,
    pub params: Vec<String>,
}

impl MatcherExpression {
    fn parse(body: &str) -> Self {
        let body = body.trim();
        match body.find('(') {
            Some(open) if body.ends_with(')') => MatcherExpression {
                name: body[..open].trim().to_string(),
                params: split_params(&body[open + 1..body.len() - 1]),
            },
            _ => MatcherExpression {
                name: body.to_string(),
                params: Vec::new(),
            },
        }
    }
}

/// Split a parameter list on commas outside quotes; surrounding quotes are removed.
fn split_params(raw: &str) -> Vec<String> {
    if raw.trim().is_empty() {
        return Vec::new();
    }
    let mut params = Vec::new();
    let mut current = String::new();
    let mut quote: Option<char> = None;
    for c in raw.chars() {
        match (c, quote) {
            ('\'' | '"', None) => {
                quote = Some(c);
                current.push(c);
            }
            (c, Some(q)) if c == q => {
                quote = None;
                current.push(c);
            }
            (',', None) => params.push(unquote(std::mem::take(&mut current).trim())),
            _ => current.push(c),
        }
    }
    params.push(unquote(current.trim()));
    params
}

fn unquote(param: &str) -> String {
    let quoted = param.len() >= 2
        && ((param.starts_with('\'') && param.ends_with('\''))
            || (param.starts_with('"') && param.ends_with('"')));
    if quoted {
        param[1..param.len() - 1].to_string()
    } else {
        param.to_string()
    }
}

/// Matchers keyed by name.
#[derive(Clone)]
pub struct MatcherRegistry {
    matchers: HashMap<String, Arc<dyn ValidationMatcher>>,
    prefix: String,
    suffix: String,
}

impl fmt::Debug for MatcherRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&str> = self.matchers.keys().map(String::as_str).collect();
        names.sort_unstable();
        f.debug_struct("MatcherRegistry")
            .field("matchers", &names)
            .field("prefix", &self.prefix)
            .field("suffix", &self.suffix)
            .finish()
    }
}

impl Default for MatcherRegistry {
    fn default() -> Self {
        Self::with_delimiters(DEFAULT_MATCHER_PREFIX, DEFAULT_MATCHER_SUFFIX)
    }
}

impl MatcherRegistry {
    /// Registry holding the built-in matchers.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_delimiters(prefix: impl Into<String>, suffix: impl Into<String>) -> Self {
        let mut registry = Self::empty(prefix, suffix);
        builtin::register_defaults(&mut registry);
        registry
    }

    pub fn empty(prefix: impl Into<String>, suffix: impl Into<String>) -> Self {
        Self {
            matchers: HashMap::new(),
            prefix: prefix.into(),
            suffix: suffix.into(),
        }
    }

    pub fn register(&mut self, name: impl Into<String>, matcher: impl ValidationMatcher + 'static) {
        self.matchers.insert(name.into(), Arc::new(matcher));
    }

    pub fn contains(&self, name: &str) -> bool {
        self.matchers.contains_key(name)
    }

    pub fn is_matcher_expression(&self, value: &str) -> bool {
        value.len() > self.prefix.len() + self.suffix.len()
            && value.starts_with(&self.prefix)
            && value.ends_with(&self.suffix)
    }

    pub fn parse(&self, value: &str) -> Option<MatcherExpression> {
        if !self.is_matcher_expression(value) {
            return None;
        }
        let body = &value[self.prefix.len()..value.len() - self.suffix.len()];
        Some(MatcherExpression::parse(body))
    }

    /// Fails with [`MatcherError::Unknown`] for expressions naming an unregistered
    /// matcher. Plain values are accepted.
    pub fn check(&self, value: &str) -> Result<(), MatcherError> {
        match self.parse(value) {
            Some(expression) if !self.contains(&expression.name) => {
                Err(MatcherError::Unknown(expression.name))
            }
            _ => Ok(()),
        }
    }

    /// Run the matcher named in `control` against `actual`.
    pub fn validate(&self, field: &str, actual: &str, control: &str) -> Result<(), MatcherError> {
        let expression = self
            .parse(control)
            .ok_or_else(|| MatcherError::Unknown(control.to_string()))?;
        let matcher = self
            .matchers
            .get(&expression.name)
            .ok_or_else(|| MatcherError::Unknown(expression.name.clone()))?;
        debug!(field, matcher = %expression.name, "Running validation matcher");
        matcher.validate(field, actual, &expression.params)
    }
}
