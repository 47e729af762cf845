use super::ContextError;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

pub type Function = Arc<dyn Fn(&[String]) -> Result<String, ContextError> + Send + Sync>;

/// Functions callable as `fn:name(args)`.
#[derive(Clone)]
pub struct FunctionLibrary {
    functions: HashMap<String, Function>,
}

impl fmt::Debug for FunctionLibrary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&str> = self.functions.keys().map(String::as_str).collect();
        names.sort_unstable();
        f.debug_struct("FunctionLibrary").field("functions", &names).finish()
    }
}

impl Default for FunctionLibrary {
    fn default() -> Self {
        let mut library = Self {
            functions: HashMap::new(),
        };
        library.register("concat", |args| Ok(args.concat()));
        library.register("upperCase", |args| Ok(single("upperCase", args)?.to_uppercase()));
        library.register("lowerCase", |args| Ok(single("lowerCase", args)?.to_lowercase()));
        library.register("stringLength", |args| {
            Ok(single("stringLength", args)?.chars().count().to_string())
        });
        library.register("substring", substring);
        library
    }
}

impl FunctionLibrary {
    pub fn register<F>(&mut self, name: impl Into<String>, function: F)
    where
        F: Fn(&[String]) -> Result<String, ContextError> + Send + Sync + 'static,
    {
        self.functions.insert(name.into(), Arc::new(function));
    }

    pub fn contains(&self, name: &str) -> bool {
        self.functions.contains_key(name)
    }

    pub fn call(&self, name: &str, args: &[String]) -> Result<String, ContextError> {
        let function = self
            .functions
            .get(name)
            .ok_or_else(|| ContextError::UnknownFunction(name.to_string()))?;
        function(args)
    }
}

fn invalid(function: &str, reason: impl Into<String>) -> ContextError {
    ContextError::InvalidArguments {
        function: function.to_string(),
        reason: reason.into(),
    }
}

fn single<'a>(function: &str, args: &'a [String]) -> Result<&'a str, ContextError> {
    match args {
        [arg] => Ok(arg),
        _ => Err(invalid(function, format!("expected 1 argument, got {}", args.len()))),
    }
}

/// `substring(value, begin[, end])` with character offsets.
fn substring(args: &[String]) -> Result<String, ContextError> {
    let (value, begin, end) = match args {
        [value, begin] => (value, begin, None),
        [value, begin, end] => (value, begin, Some(end)),
        _ => return Err(invalid("substring", format!("expected 2 or 3 arguments, got {}", args.len()))),
    };
    let offset = |raw: &str| {
        raw.trim()
            .parse::<usize>()
            .map_err(|_| invalid("substring", format!("'{raw}' is not an index")))
    };
    let chars: Vec<char> = value.chars().collect();
    let begin = offset(begin.as_str())?;
    let end = match end {
        Some(end) => offset(end.as_str())?,
        None => chars.len(),
    };
    if begin > end || end > chars.len() {
        return Err(invalid(
            "substring",
            format!("range {begin}..{end} out of bounds for '{value}'"),
        ));
    }
    Ok(chars[begin..end].iter().collect())
}
