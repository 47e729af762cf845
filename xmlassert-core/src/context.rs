//! Test context: variables, functions and matchers used to resolve dynamic content in
//! expressions and expected values.
mod functions;

pub use functions::{Function, FunctionLibrary};

use crate::config::Settings;
use crate::matcher::MatcherRegistry;
use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ContextError {
    #[error("unknown variable '{0}'")]
    UnknownVariable(String),
    #[error("unknown function '{0}'")]
    UnknownFunction(String),
    #[error("invalid arguments for function '{function}': {reason}")]
    InvalidArguments { function: String, reason: String },
    #[error("unbalanced expression '{0}'")]
    Unbalanced(String),
}

/// Runtime state shared by one validation run.
#[derive(Debug, Clone)]
pub struct TestContext {
    settings: Settings,
    variables: BTreeMap<String, String>,
    functions: FunctionLibrary,
    matchers: MatcherRegistry,
}

impl Default for TestContext {
    fn default() -> Self {
        Self::with_settings(Settings::default())
    }
}

impl TestContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_settings(settings: Settings) -> Self {
        let matchers = MatcherRegistry::with_delimiters(
            settings.matcher_prefix.clone(),
            settings.matcher_suffix.clone(),
        );
        Self {
            settings,
            variables: BTreeMap::new(),
            functions: FunctionLibrary::default(),
            matchers,
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn ignore_placeholder(&self) -> &str {
        &self.settings.ignore_placeholder
    }

    pub fn set_variable(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.variables.insert(name.into(), value.into());
    }

    pub fn variable(&self, name: &str) -> Option<&str> {
        self.variables.get(name).map(String::as_str)
    }

    pub fn functions(&self) -> &FunctionLibrary {
        &self.functions
    }

    pub fn functions_mut(&mut self) -> &mut FunctionLibrary {
        &mut self.functions
    }

    pub fn matchers(&self) -> &MatcherRegistry {
        &self.matchers
    }

    pub fn matchers_mut(&mut self) -> &mut MatcherRegistry {
        &mut self.matchers
    }

    /// Replace `${name}` variables and then `fn:name(args)` calls.
    ///
    /// # Examples
    /// ```rust
    /// use xmlassert_core::context::TestContext;
    ///
    /// let mut context = TestContext::new();
    /// context.set_variable("user", "alice");
    /// let resolved = context.replace_dynamic_content("fn:upperCase('${user}')")?;
    /// assert_eq!(resolved, "ALICE");
    /// # Ok::<(), xmlassert_core::context::ContextError>(())
    /// ```
    pub fn replace_dynamic_content(&self, input: &str) -> Result<String, ContextError> {
        let replaced = self.replace_variables(input)?;
        self.replace_functions(&replaced)
    }

    pub fn replace_variables(&self, input: &str) -> Result<String, ContextError> {
        let prefix = self.settings.variable_prefix.as_str();
        let suffix = self.settings.variable_suffix.as_str();
        let mut result = String::with_capacity(input.len());
        let mut rest = input;
        while let Some(start) = rest.find(prefix) {
            result.push_str(&rest[..start]);
            let after = &rest[start + prefix.len()..];
            let end = after
                .find(suffix)
                .ok_or_else(|| ContextError::Unbalanced(input.to_string()))?;
            let name = &after[..end];
            let value = self
                .variable(name)
                .ok_or_else(|| ContextError::UnknownVariable(name.to_string()))?;
            result.push_str(value);
            rest = &after[end + suffix.len()..];
        }
        result.push_str(rest);
        Ok(result)
    }

    /// Replace `fn:name(args)` calls. The prefix only starts a call when it does not
    /// continue a longer name and is followed by a function name and `(`, so XPath
    /// steps such as `//fn:Order` or `//defn:a` pass through untouched.
    pub fn replace_functions(&self, input: &str) -> Result<String, ContextError> {
        let prefix = self.settings.function_prefix.as_str();
        if prefix.is_empty() {
            return Ok(input.to_string());
        }
        let mut result = String::with_capacity(input.len());
        let mut rest = input;
        while let Some(start) = rest.find(prefix) {
            result.push_str(&rest[..start]);
            let call = &rest[start..];
            let Some(open) = function_call_open(&rest[..start], call, prefix) else {
                result.push_str(prefix);
                rest = &call[prefix.len()..];
                continue;
            };
            let name = &call[prefix.len()..open];
            let close = matching_paren(call, open)
                .ok_or_else(|| ContextError::Unbalanced(input.to_string()))?;
            let args = split_arguments(&call[open + 1..close])
                .into_iter()
                .map(|arg| self.resolve_argument(arg))
                .collect::<Result<Vec<_>, _>>()?;
            result.push_str(&self.functions.call(name, &args)?);
            rest = &call[close + 1..];
        }
        result.push_str(rest);
        Ok(result)
    }

    fn resolve_argument(&self, arg: &str) -> Result<String, ContextError> {
        let arg = arg.trim();
        let quoted = arg.len() >= 2
            && ((arg.starts_with('\'') && arg.ends_with('\''))
                || (arg.starts_with('"') && arg.ends_with('"')));
        if quoted {
            Ok(arg[1..arg.len() - 1].to_string())
        } else {
            self.replace_functions(arg)
        }
    }
}

/// Byte index of the `(` opening a function call at the start of `call`.
fn function_call_open(before: &str, call: &str, prefix: &str) -> Option<usize> {
    let continues_name = before
        .chars()
        .next_back()
        .is_some_and(|c| c.is_alphanumeric() || matches!(c, '_' | '-' | '.' | ':'));
    if continues_name {
        return None;
    }
    let name_len = call[prefix.len()..]
        .find(|c: char| !(c.is_alphanumeric() || c == '_'))
        .unwrap_or(call.len() - prefix.len());
    let open = prefix.len() + name_len;
    (name_len > 0 && call[open..].starts_with('(')).then_some(open)
}

/// Byte index of the parenthesis closing the one at `open`, skipping quoted text.
fn matching_paren(s: &str, open: usize) -> Option<usize> {
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    for (i, c) in s.char_indices().skip_while(|(i, _)| *i < open) {
        match (c, quote) {
            ('\'' | '"', None) => quote = Some(c),
            (c, Some(q)) if c == q => quote = None,
            (_, Some(_)) => {}
            ('(', None) => depth += 1,
            (')', None) => {
                depth -= 1;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}

/// Split on top-level commas; quotes and nested calls stay intact.
fn split_arguments(raw: &str) -> Vec<&str> {
    if raw.trim().is_empty() {
        return Vec::new();
    }
    let mut args = Vec::new();
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut start = 0;
    for (i, c) in raw.char_indices() {
        match (c, quote) {
            ('\'' | '"', None) => quote = Some(c),
            (c, Some(q)) if c == q => quote = None,
            (_, Some(_)) => {}
            ('(', None) => depth += 1,
            (')', None) => depth = depth.saturating_sub(1),
            (',', None) if depth == 0 => {
                args.push(&raw[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    args.push(&raw[start..]);
    args
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context() -> TestContext {
        let mut context = TestContext::new();
        context.set_variable("name", "citrus");
        context.set_variable("count", "3");
        context
    }

    #[test]
    fn replaces_variables() {
        let context = context();
        assert_eq!(
            context.replace_dynamic_content("Hello ${name}, ${count} times").unwrap(),
            "Hello citrus, 3 times"
        );
        assert_eq!(
            context.replace_dynamic_content("${missing}"),
            Err(ContextError::UnknownVariable("missing".into()))
        );
        assert!(matches!(
            context.replace_dynamic_content("${name"),
            Err(ContextError::Unbalanced(_))
        ));
    }

    #[test]
    fn evaluates_functions() {
        let context = context();
        assert_eq!(
            context.replace_dynamic_content("fn:concat('a', 'b', '${name}')").unwrap(),
            "abcitrus"
        );
        assert_eq!(
            context.replace_dynamic_content("fn:upperCase(fn:concat('x', 'y'))").unwrap(),
            "XY"
        );
        assert_eq!(
            context.replace_dynamic_content("len=fn:stringLength('hello')!").unwrap(),
            "len=5!"
        );
        assert_eq!(
            context.replace_dynamic_content("fn:substring('hello', '1', '3')").unwrap(),
            "el"
        );
        assert_eq!(
            context.replace_dynamic_content("fn:concat('a,(b', ')')").unwrap(),
            "a,(b)"
        );
        assert_eq!(
            context.replace_dynamic_content("fn:nope()"),
            Err(ContextError::UnknownFunction("nope".into()))
        );
    }

    #[test]
    fn leaves_plain_content_alone() {
        let context = context();
        assert_eq!(
            context.replace_dynamic_content("//root/element[@a='x']").unwrap(),
            "//root/element[@a='x']"
        );
        for xpath in [
            "//defn:a/text()",
            "//fn:Order[count(fn:Item)=2]",
            "count(//fn:Item)",
            "fn:",
        ] {
            assert_eq!(context.replace_dynamic_content(xpath).unwrap(), xpath);
        }
        assert_eq!(
            context.replace_dynamic_content("//fn:Id[.='fn:upperCase('a')']").unwrap(),
            "//fn:Id[.='A']"
        );
    }
}
