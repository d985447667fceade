//! Parsing of the compact event-type DSL.
//!
//! `EVENT_TYPES` is a comma-separated list where each token is either a bare
//! name (`track`) or a name with integer parameters (`batch(2,3)`):
//!
//! ```text
//! track,page,batch(2,3),custom-checkout
//! ```

use crate::error::GeneratorError;

/// A parsed event-type token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventTypeSpec {
    /// Event type name, also the template key.
    pub name: String,
    /// Optional numeric parameters, in declaration order.
    pub values: Vec<u32>,
}

impl EventTypeSpec {
    /// Create a spec without parameters.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            values: Vec::new(),
        }
    }

    /// Create a spec with parameters.
    pub fn with_values(name: impl Into<String>, values: Vec<u32>) -> Self {
        Self {
            name: name.into(),
            values,
        }
    }
}

impl std::fmt::Display for EventTypeSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.values.is_empty() {
            write!(f, "{}", self.name)
        } else {
            let values: Vec<String> = self.values.iter().map(|v| v.to_string()).collect();
            write!(f, "{}({})", self.name, values.join(","))
        }
    }
}

/// Parse an `EVENT_TYPES` expression into specs.
///
/// Commas inside parentheses do not split tokens.
pub fn parse_event_types(input: &str) -> Result<Vec<EventTypeSpec>, GeneratorError> {
    let invalid = |reason: String| GeneratorError::InvalidEventTypes {
        input: input.to_string(),
        reason,
    };

    let mut tokens = Vec::new();
    let mut depth = 0usize;
    let mut current = String::new();
    for c in input.chars() {
        match c {
            '(' => {
                depth += 1;
                if depth > 1 {
                    return Err(invalid("nested parentheses".to_string()));
                }
                current.push(c);
            }
            ')' => {
                if depth == 0 {
                    return Err(invalid("unbalanced ')'".to_string()));
                }
                depth -= 1;
                current.push(c);
            }
            ',' if depth == 0 => tokens.push(std::mem::take(&mut current)),
            _ => current.push(c),
        }
    }
    if depth != 0 {
        return Err(invalid("unbalanced '('".to_string()));
    }
    tokens.push(current);

    tokens
        .iter()
        .map(|token| parse_token(token.trim()).map_err(&invalid))
        .collect()
}

fn parse_token(token: &str) -> Result<EventTypeSpec, String> {
    if token.is_empty() {
        return Err("empty event type".to_string());
    }

    let Some(open) = token.find('(') else {
        validate_name(token)?;
        return Ok(EventTypeSpec::new(token));
    };

    let name = token[..open].trim();
    validate_name(name)?;

    let rest = &token[open + 1..];
    let Some(inner) = rest.strip_suffix(')') else {
        return Err(format!("trailing characters after ')' in '{token}'"));
    };

    let values = if inner.trim().is_empty() {
        Vec::new()
    } else {
        inner
            .split(',')
            .map(|v| {
                v.trim()
                    .parse::<u32>()
                    .map_err(|_| format!("'{}' is not a non-negative integer", v.trim()))
            })
            .collect::<Result<Vec<_>, _>>()?
    };

    Ok(EventTypeSpec::with_values(name, values))
}

fn validate_name(name: &str) -> Result<(), String> {
    if name.is_empty() {
        return Err("empty event type name".to_string());
    }
    if !name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err(format!("invalid characters in event type name '{name}'"));
    }
    Ok(())
}

/// Parse a comma-separated list of non-negative integers.
///
/// `name` is the setting being parsed and only appears in error messages.
pub fn parse_int_list(name: &str, input: &str) -> Result<Vec<u32>, GeneratorError> {
    let input = input.trim();
    if input.is_empty() {
        return Err(GeneratorError::InvalidList {
            name: name.to_string(),
            reason: "list is empty".to_string(),
        });
    }

    input
        .split(',')
        .map(|v| {
            v.trim()
                .parse::<u32>()
                .map_err(|_| GeneratorError::InvalidList {
                    name: name.to_string(),
                    reason: format!("'{}' is not a non-negative integer", v.trim()),
                })
        })
        .collect()
}
