//! Structured output: pulling JSON out of model text and checking it against a schema.

use relay_types::RelayError;
use serde_json::Value;

/// Parse `text` as JSON (bare, or inside a fenced code block) and validate it.
pub fn parse_structured(text: &str, schema: &Value) -> Result<Value, RelayError> {
    let value = extract_json(text).ok_or_else(|| RelayError::ResponseParse {
        message: "response contains no JSON value".to_string(),
        raw: text.to_string(),
    })?;

    let validator = jsonschema::validator_for(schema).map_err(|e| RelayError::InvalidSchema {
        message: e.to_string(),
    })?;
    if let Err(err) = validator.validate(&value) {
        return Err(RelayError::ResponseParse {
            message: err.to_string(),
            raw: text.to_string(),
        });
    }
    Ok(value)
}

/// The first JSON value found in `text`: the whole text, else the first fenced block.
#[must_use]
pub fn extract_json(text: &str) -> Option<Value> {
    let trimmed = text.trim();
    if let Ok(value) = serde_json::from_str(trimmed) {
        return Some(value);
    }
    fenced_blocks(trimmed).find_map(|block| serde_json::from_str(block.trim()).ok())
}

fn fenced_blocks(text: &str) -> impl Iterator<Item = &str> {
    text.split("```").skip(1).step_by(2).map(|block| {
        // Drop a language tag such as `json` on the opening fence line.
        match block.split_once('\n') {
            Some((tag, body)) if !tag.trim_start().starts_with(['{', '[']) => body,
            _ => block,
        }
    })
}
