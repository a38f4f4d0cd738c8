use serde::{Deserialize, Deserializer};
use serde_json::Value;
use thiserror::Error;

/// Why a model response could not be turned into a typed value.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Response contains no JSON object (starts with: {preview:?})")]
    NoJson { preview: String },

    #[error("Response JSON does not match the expected shape: {0}")]
    Malformed(String),

    #[error("Required field '{0}' is missing or empty")]
    MissingField(&'static str),

    #[error("Field '{field}' is invalid: {reason}")]
    InvalidField { field: &'static str, reason: String },
}

pub fn require_text(field: &'static str, value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        Err(ValidationError::MissingField(field))
    } else {
        Ok(())
    }
}

/// Accept a list of strings in whatever shape a model produced it.
///
/// - `null` or missing: empty list
/// - a single string: one-element list
/// - objects: their `description`, `name`, `title`, `pattern` or `theme`
///   field, else the compact JSON of the object
/// - other scalars: their JSON text
///
/// Empty strings are dropped.
pub(crate) fn lenient_strings<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?.unwrap_or(Value::Null);
    Ok(flatten_strings(value))
}

pub(crate) fn flatten_strings(value: Value) -> Vec<String> {
    let items = match value {
        Value::Null => Vec::new(),
        Value::Array(items) => items,
        other => vec![other],
    };

    items
        .into_iter()
        .filter_map(|item| match item {
            Value::Null => None,
            Value::String(s) => Some(s),
            Value::Object(map) => {
                let named = ["description", "name", "title", "pattern", "theme"]
                    .iter()
                    .find_map(|k| map.get(*k).and_then(Value::as_str).map(str::to_string));
                Some(named.unwrap_or_else(|| Value::Object(map).to_string()))
            }
            other => Some(other.to_string()),
        })
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

/// Text field where `null` or a non-string becomes an empty string.
pub(crate) fn lenient_text<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::String(s)) => s,
        Some(Value::Null) | None => String::new(),
        Some(other) => other.to_string(),
    })
}
