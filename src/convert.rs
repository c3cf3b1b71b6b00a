//! Conversion between raw tool arguments and typed inputs and results.

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value as JsonValue};

use crate::error::{McpError, Result};

/// Deserialize tool arguments into a typed input.
///
/// Explicit `null` values count as absent, so they fall back to the field
/// default and are reported by validation rather than as type errors.
pub fn parse_args<T: DeserializeOwned>(args: Map<String, JsonValue>) -> Result<T> {
    let args: Map<String, JsonValue> = args.into_iter().filter(|(_, v)| !v.is_null()).collect();
    serde_json::from_value(JsonValue::Object(args)).map_err(|e| McpError::InvalidArg {
        name: "arguments".to_string(),
        reason: e.to_string(),
    })
}

/// Serialize a tool result for the MCP response.
pub fn to_result<T: Serialize>(result: &T) -> Result<JsonValue> {
    serde_json::to_value(result).map_err(|e| McpError::Internal(e.to_string()))
}

/// Render a tool result as the text block carried in MCP content.
pub fn result_text(value: &JsonValue) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}
