//! Schema-validating parse of model completions.
//!
//! Models asked for "only JSON" still wrap it in prose or code fences. The
//! parse tries the whole completion first, then the first fenced block, and
//! reports a typed [`SchemaError`] when neither yields a JSON object of the
//! requested shape.

use crate::error::SchemaError;
use regex::Regex;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::LazyLock;

static FENCED_BLOCK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)```[A-Za-z]*[ \t]*\r?\n?(.*?)```").unwrap());

/// Parse a completion into `T`, recovering JSON from a fenced block if needed
pub fn parse_model_json<T: DeserializeOwned>(raw: &str) -> Result<T, SchemaError> {
    let value = locate_json(raw)?;

    if !value.is_object() {
        return Err(SchemaError::NotAnObject(json_kind(&value)));
    }

    serde_json::from_value(value).map_err(|e| SchemaError::Shape(e.to_string()))
}

fn locate_json(raw: &str) -> Result<Value, SchemaError> {
    let trimmed = raw.trim();
    if let Ok(value) = serde_json::from_str::<Value>(trimmed) {
        return Ok(value);
    }

    let block = FENCED_BLOCK_RE
        .captures(trimmed)
        .and_then(|caps| caps.get(1))
        .ok_or(SchemaError::NoJson)?;

    serde_json::from_str::<Value>(block.as_str().trim())
        .map_err(|e| SchemaError::InvalidFencedJson(e.to_string()))
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize, PartialEq)]
    struct TitleOnly {
        title: String,
    }

    #[test]
    fn test_direct_json() {
        let parsed: TitleOnly = parse_model_json(r#"  {"title": "Blue Widget"} "#).unwrap();
        assert_eq!(parsed.title, "Blue Widget");
    }

    #[test]
    fn test_fenced_json_with_prose() {
        let raw = "Here is the result:\n```json\n{\"title\": \"Blue Widget\"}\n```\nLet me know!";
        let parsed: TitleOnly = parse_model_json(raw).unwrap();
        assert_eq!(parsed.title, "Blue Widget");
    }

    #[test]
    fn test_unlabelled_fence() {
        let raw = "```\n{\"title\": \"Lamp\"}\n```";
        let parsed: TitleOnly = parse_model_json(raw).unwrap();
        assert_eq!(parsed.title, "Lamp");
    }

    #[test]
    fn test_no_json_at_all() {
        let err = parse_model_json::<TitleOnly>("I cannot see an image.").unwrap_err();
        assert_eq!(err, SchemaError::NoJson);
    }

    #[test]
    fn test_broken_fenced_json() {
        let err = parse_model_json::<TitleOnly>("```json\n{\"title\": \n```").unwrap_err();
        assert!(matches!(err, SchemaError::InvalidFencedJson(_)));
    }

    #[test]
    fn test_top_level_must_be_object() {
        let err = parse_model_json::<TitleOnly>("[1, 2, 3]").unwrap_err();
        assert_eq!(err, SchemaError::NotAnObject("an array"));
    }

    #[test]
    fn test_shape_mismatch() {
        let err = parse_model_json::<TitleOnly>(r#"{"name": "x"}"#).unwrap_err();
        assert!(matches!(err, SchemaError::Shape(_)));
    }
}
