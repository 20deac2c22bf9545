//! Tool-call contract shared by every session kind.
//!
//! Each tool has a strict object schema: every property is required and no
//! other property is allowed. Arguments arrive as raw JSON text and are
//! checked against that schema before they are deserialized.

use std::fmt;

use jsonschema::validator_for;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value, json};

/// A tool advertised to the model.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

impl ToolSpec {
    /// Build a strict spec from a `properties` object.
    pub fn new(name: &str, description: &str, properties: Value) -> Self {
        Self {
            name: name.to_string(),
            description: description.trim().to_string(),
            parameters: strict_object(properties),
        }
    }

    /// Function-definition shape expected by chat-completion services.
    pub fn definition(&self) -> Value {
        json!({
            "type": "function",
            "function": {
                "name": self.name,
                "description": self.description,
                "parameters": self.parameters,
                "strict": true,
            }
        })
    }
}

/// Object schema requiring every property in `properties` and nothing else.
pub fn strict_object(properties: Value) -> Value {
    let properties = match properties {
        Value::Object(map) => map,
        _ => Map::new(),
    };
    let required: Vec<Value> = properties.keys().cloned().map(Value::String).collect();
    json!({
        "type": "object",
        "properties": properties,
        "required": required,
        "additionalProperties": false,
    })
}

/// A tool invocation emitted by the model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCall {
    #[serde(default)]
    pub id: String,
    pub name: String,
    /// Raw JSON argument text, exactly as the model produced it.
    #[serde(default, deserialize_with = "arguments_text")]
    pub arguments: String,
}

/// Accept either raw argument text or an inline JSON value (handy in scripts).
fn arguments_text<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::String(text) => text,
        other => other.to_string(),
    })
}

impl ToolCall {
    pub fn new(id: &str, name: &str, arguments: &str) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            arguments: arguments.to_string(),
        }
    }
}

/// The call's shape is wrong: bad JSON, schema violation, or unknown tool.
///
/// This aborts the rest of the round. Semantic problems are reported to the
/// model as ordinary tool results instead.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolDecodeError {
    pub tool: String,
    pub message: String,
}

impl ToolDecodeError {
    pub fn new(tool: &str, message: impl Into<String>) -> Self {
        Self {
            tool: tool.to_string(),
            message: message.into(),
        }
    }

    pub fn unknown_tool(tool: &str) -> Self {
        Self::new(tool, "unknown tool")
    }
}

impl fmt::Display for ToolDecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tool {}: {}", self.tool, self.message)
    }
}

impl std::error::Error for ToolDecodeError {}

/// Parse, schema-check, then deserialize the arguments of a call to `spec`.
///
/// Empty argument text is read as `{}` so zero-argument tools accept it.
pub fn decode_args<T: DeserializeOwned>(spec: &ToolSpec, raw: &str) -> Result<T, ToolDecodeError> {
    let raw = if raw.trim().is_empty() { "{}" } else { raw };
    let value: Value = serde_json::from_str(raw)
        .map_err(|err| ToolDecodeError::new(&spec.name, format!("arguments are not valid JSON: {}", err)))?;
    let validator = validator_for(&spec.parameters)
        .map_err(|err| ToolDecodeError::new(&spec.name, format!("invalid tool schema: {}", err)))?;
    let violations: Vec<String> = validator
        .iter_errors(&value)
        .map(|err| err.to_string())
        .collect();
    if !violations.is_empty() {
        return Err(ToolDecodeError::new(
            &spec.name,
            format!("arguments do not match schema: {}", violations.join("; ")),
        ));
    }
    serde_json::from_value(value)
        .map_err(|err| ToolDecodeError::new(&spec.name, format!("decode arguments: {}", err)))
}

/// Find the `ToolSpec` a call refers to.
pub fn find_spec<'a>(specs: &'a [ToolSpec], call: &ToolCall) -> Result<&'a ToolSpec, ToolDecodeError> {
    specs
        .iter()
        .find(|spec| spec.name == call.name)
        .ok_or_else(|| ToolDecodeError::unknown_tool(&call.name))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Deserialize, PartialEq)]
    #[serde(deny_unknown_fields)]
    struct FinishArgs {
        id: String,
        status: String,
    }

    fn finish_spec() -> ToolSpec {
        ToolSpec::new(
            "finish_task",
            "Mark the current task finished.",
            json!({
                "id": { "type": "string" },
                "status": { "type": "string", "enum": ["completed", "failed"] },
            }),
        )
    }

    #[test]
    fn spec_requires_every_property_and_forbids_extras() {
        let spec = finish_spec();
        assert_eq!(spec.parameters["additionalProperties"], json!(false));
        let mut required: Vec<&str> = spec.parameters["required"]
            .as_array()
            .expect("required array")
            .iter()
            .filter_map(Value::as_str)
            .collect();
        required.sort_unstable();
        assert_eq!(required, vec!["id", "status"]);
        assert_eq!(spec.definition()["function"]["strict"], json!(true));
    }

    #[test]
    fn decodes_valid_arguments() {
        let args: FinishArgs =
            decode_args(&finish_spec(), r#"{"id":"1.2","status":"failed"}"#).expect("valid");
        assert_eq!(
            args,
            FinishArgs {
                id: "1.2".to_string(),
                status: "failed".to_string()
            }
        );
    }

    #[test]
    fn rejects_malformed_and_mismatched_arguments() {
        let spec = finish_spec();
        for raw in [
            "{not json",
            r#"{"id":"1"}"#,
            r#"{"id":"1","status":"completed","extra":true}"#,
            r#"{"id":1,"status":"completed"}"#,
            r#"{"id":"1","status":"paused"}"#,
            "[]",
        ] {
            let err = decode_args::<FinishArgs>(&spec, raw).unwrap_err();
            assert_eq!(err.tool, "finish_task", "{raw}");
        }
    }

    #[test]
    fn empty_arguments_fit_zero_argument_tools() {
        #[derive(Deserialize)]
        #[serde(deny_unknown_fields)]
        struct NoArgs {}

        let spec = ToolSpec::new("finish_thought", "Finish the thought.", json!({}));
        assert!(decode_args::<NoArgs>(&spec, "").is_ok());
        assert!(decode_args::<NoArgs>(&spec, "{}").is_ok());
        assert!(decode_args::<NoArgs>(&spec, r#"{"x":1}"#).is_err());
    }

    #[test]
    fn scripted_calls_may_inline_arguments() {
        let call: ToolCall =
            serde_json::from_str(r#"{"name":"finish_task","arguments":{"id":"1"}}"#).expect("call");
        assert_eq!(call.arguments, r#"{"id":"1"}"#);
        let call: ToolCall =
            serde_json::from_str(r#"{"id":"c","name":"finish_thought","arguments":"{}"}"#)
                .expect("call");
        assert_eq!(call.arguments, "{}");
    }

    #[test]
    fn unknown_tool_is_a_decode_error() {
        let specs = vec![finish_spec()];
        let call = ToolCall::new("c1", "drop_table", "{}");
        let err = find_spec(&specs, &call).unwrap_err();
        assert_eq!(err.to_string(), "tool drop_table: unknown tool");
    }
}
