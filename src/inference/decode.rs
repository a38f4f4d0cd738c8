//! Typed decoding of model output
//!
//! Every structured response in the pipeline goes through [`decode`]. The
//! accepted input is, in order of preference:
//!
//! 1. the whole response as JSON
//! 2. the body of the first ```` ```json ```` (or bare ```` ``` ````) fence
//! 3. the outermost `{ ... }` span of the response
//!
//! Nothing else is repaired. Default-filling for optional fields is declared
//! on the target types (`#[serde(default)]` and the lenient deserializers in
//! `report`), not here.

use crate::report::ValidationError;
use serde::de::DeserializeOwned;
use serde_json::Value;

const PREVIEW_CHARS: usize = 80;

pub fn decode<T: DeserializeOwned>(text: &str) -> Result<T, ValidationError> {
    let value = extract_json(text)?;
    serde_json::from_value(value).map_err(|e| ValidationError::Malformed(e.to_string()))
}

/// Locate and parse the JSON document in a model response.
pub fn extract_json(text: &str) -> Result<Value, ValidationError> {
    let trimmed = text.trim();

    let candidates = [Some(trimmed), fenced_body(trimmed), outer_object(trimmed)];
    for candidate in candidates.into_iter().flatten() {
        if let Ok(value @ (Value::Object(_) | Value::Array(_))) = serde_json::from_str(candidate) {
            return Ok(value);
        }
    }

    Err(ValidationError::NoJson {
        preview: trimmed.chars().take(PREVIEW_CHARS).collect(),
    })
}

fn fenced_body(text: &str) -> Option<&str> {
    let (start, skip) = match text.find("```json") {
        Some(idx) => (idx, 7),
        None => (text.find("```")?, 3),
    };
    let after = &text[start + skip..];
    let end = after.find("```")?;
    Some(after[..end].trim())
}

fn outer_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}
