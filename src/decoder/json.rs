//! JSON payload handlers
//!
//! `strict` accepts standard JSON only. `relaxed` reads the payload as a YAML
//! flow document, a superset of JSON, so single-quoted strings and unquoted
//! keys are tolerated. Block-style YAML is refused, otherwise
//! a plain text line such as `Error: disk full` would parse as a mapping.
//! Both require the top-level value to be an object.

use serde_json::{Map, Value};
use thiserror::Error;

use crate::config::JsonHandlerKind;

/// Errors produced while decoding a JSON payload.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum JsonError {
    /// The payload is not valid for the handler
    #[error("invalid JSON: {0}")]
    Syntax(String),

    /// The payload is valid but not an object
    #[error("expected a JSON object, found {0}")]
    NotAnObject(&'static str),
}

/// Decodes a raw payload into a JSON object.
pub trait JsonHandler: Send + Sync {
    /// Decode `raw` into an object.
    fn decode(&self, raw: &str) -> Result<Map<String, Value>, JsonError>;
}

/// Standard JSON via `serde_json`.
#[derive(Debug, Clone, Copy, Default)]
pub struct StrictJson;

impl JsonHandler for StrictJson {
    fn decode(&self, raw: &str) -> Result<Map<String, Value>, JsonError> {
        let value: Value =
            serde_json::from_str(raw).map_err(|e| JsonError::Syntax(e.to_string()))?;
        into_object(value)
    }
}

/// JSON superset via `serde_yaml`, restricted to flow documents.
#[derive(Debug, Clone, Copy, Default)]
pub struct RelaxedJson;

impl JsonHandler for RelaxedJson {
    fn decode(&self, raw: &str) -> Result<Map<String, Value>, JsonError> {
        if !raw.trim_start().starts_with(['{', '[']) {
            return Err(JsonError::Syntax(
                "expected a '{' delimited document".to_string(),
            ));
        }

        let value: Value =
            serde_yaml::from_str(raw).map_err(|e| JsonError::Syntax(e.to_string()))?;
        into_object(value)
    }
}

fn into_object(value: Value) -> Result<Map<String, Value>, JsonError> {
    match value {
        Value::Object(map) => Ok(map),
        Value::Null => Err(JsonError::NotAnObject("null")),
        Value::Bool(_) => Err(JsonError::NotAnObject("a boolean")),
        Value::Number(_) => Err(JsonError::NotAnObject("a number")),
        Value::String(_) => Err(JsonError::NotAnObject("a string")),
        Value::Array(_) => Err(JsonError::NotAnObject("an array")),
    }
}

/// Handler for the configured kind.
pub fn handler_for(kind: JsonHandlerKind) -> Box<dyn JsonHandler> {
    match kind {
        JsonHandlerKind::Strict => Box::new(StrictJson),
        JsonHandlerKind::Relaxed => Box::new(RelaxedJson),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_strict_decodes_object() {
        let map = StrictJson
            .decode(r#"{"level":"info","count":3,"nested":{"ok":true}}"#)
            .unwrap();
        assert_eq!(map["level"], json!("info"));
        assert_eq!(map["count"], json!(3));
        assert_eq!(map["nested"]["ok"], json!(true));
    }

    #[test]
    fn test_strict_rejects_invalid_json() {
        let err = StrictJson.decode("not json").unwrap_err();
        assert!(matches!(err, JsonError::Syntax(_)));
    }

    #[test]
    fn test_strict_rejects_relaxed_syntax() {
        assert!(StrictJson.decode("{level: 'info'}").is_err());
    }

    #[test]
    fn test_non_object_values_are_rejected() {
        assert_eq!(
            StrictJson.decode("[1,2]").unwrap_err(),
            JsonError::NotAnObject("an array")
        );
        assert_eq!(
            StrictJson.decode("42").unwrap_err(),
            JsonError::NotAnObject("a number")
        );
        assert_eq!(
            StrictJson.decode("\"text\"").unwrap_err(),
            JsonError::NotAnObject("a string")
        );
        assert_eq!(
            RelaxedJson.decode("[1, 2]").unwrap_err(),
            JsonError::NotAnObject("an array")
        );
    }

    #[test]
    fn test_relaxed_rejects_plain_text_lines() {
        for raw in ["Error: disk full", "plain text line", "key: value\nother: 1", "42"] {
            let err = RelaxedJson.decode(raw).unwrap_err();
            assert!(matches!(err, JsonError::Syntax(_)), "{:?} accepted", raw);
        }
    }

    #[test]
    fn test_relaxed_allows_leading_whitespace() {
        let map = RelaxedJson.decode("  \n{a: 1}").unwrap();
        assert_eq!(map["a"], json!(1));
    }

    #[test]
    fn test_relaxed_accepts_standard_json() {
        let map = RelaxedJson.decode(r#"{"a": 1, "b": [true, null]}"#).unwrap();
        assert_eq!(map["a"], json!(1));
        assert_eq!(map["b"], json!([true, null]));
    }

    #[test]
    fn test_relaxed_accepts_unquoted_keys_and_single_quotes() {
        let map = RelaxedJson.decode("{level: 'warn', code: 7}").unwrap();
        assert_eq!(map["level"], json!("warn"));
        assert_eq!(map["code"], json!(7));
    }

    #[test]
    fn test_relaxed_rejects_unbalanced_payload() {
        let err = RelaxedJson.decode("{\"a\": 1").unwrap_err();
        assert!(matches!(err, JsonError::Syntax(_)));
    }

    #[test]
    fn test_handler_for_kind() {
        let relaxed = handler_for(JsonHandlerKind::Relaxed);
        assert!(relaxed.decode("{a: 1}").is_ok());
        let strict = handler_for(JsonHandlerKind::Strict);
        assert!(strict.decode("{a: 1}").is_err());
    }
}
