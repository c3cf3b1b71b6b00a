//! Tool registry and category definitions.
//!
//! Provides the infrastructure for registering and dispatching MCP tools.

pub mod container;
pub mod database;
pub mod item;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};
use tokio_util::sync::CancellationToken;

use crate::error::{McpError, Result};
use crate::session::McpSession;

/// Description of the `account` argument shared by every tool.
pub const ACCOUNT_PARAMETER_DESCRIPTION: &str =
    "Azure Cosmos DB account name (not required when useEmulator is true)";

/// A tool definition for the MCP tools/list response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDef {
    /// Tool name (e.g., "list_databases")
    pub name: String,
    /// Tool description
    pub description: String,
    /// JSON Schema for the input parameters
    #[serde(rename = "inputSchema")]
    pub input_schema: JsonValue,
}

impl ToolDef {
    /// Create a new tool definition.
    ///
    /// The connection arguments every tool accepts are added to the schema.
    pub fn new(name: &str, description: &str, input_schema: JsonValue) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            input_schema: with_connection(input_schema),
        }
    }
}

fn with_connection(mut schema: JsonValue) -> JsonValue {
    if let Some(props) = schema.get_mut("properties").and_then(JsonValue::as_object_mut) {
        props.insert(
            "account".to_string(),
            serde_json::json!({"type": "string", "description": ACCOUNT_PARAMETER_DESCRIPTION}),
        );
        props.insert(
            "useEmulator".to_string(),
            serde_json::json!({
                "type": "boolean",
                "description": "Set to true to use the local Cosmos DB emulator instead of the Azure service"
            }),
        );
        props.insert(
            "emulatorEndpoint".to_string(),
            serde_json::json!({
                "type": "string",
                "description": "Emulator endpoint URL (default: http://localhost:8081)"
            }),
        );
    }
    schema
}

/// Registry of all available tools.
pub struct ToolRegistry {
    tools: Vec<ToolDef>,
}

impl ToolRegistry {
    /// Create a new registry with all tools registered.
    pub fn new() -> Self {
        let mut tools = Vec::new();

        tools.extend(database::tools());
        tools.extend(container::tools());
        tools.extend(item::tools());

        Self { tools }
    }

    /// Get all tool definitions.
    pub fn tools(&self) -> &[ToolDef] {
        &self.tools
    }

    /// Dispatch a tool call to the appropriate handler.
    pub async fn dispatch(
        &self,
        session: &McpSession,
        cancel: &CancellationToken,
        name: &str,
        args: Map<String, JsonValue>,
    ) -> Result<JsonValue> {
        match name {
            database::LIST_DATABASES | database::CREATE_DATABASE => {
                database::dispatch(session, cancel, name, args).await
            }
            container::LIST_CONTAINERS
            | container::READ_CONTAINER_METADATA
            | container::CREATE_CONTAINER => container::dispatch(session, cancel, name, args).await,
            item::ADD_ITEM
            | item::READ_ITEM
            | item::EXECUTE_QUERY
            | item::BATCH_CREATE_ITEMS => item::dispatch(session, cancel, name, args).await,
            _ => Err(McpError::UnknownTool(name.to_string())),
        }
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Helper macro for creating JSON Schema for tool input parameters.
#[macro_export]
macro_rules! schema {
    // Object with required and optional properties
    (object {
        required: { $($req_name:literal : $req_type:tt),* $(,)? },
        optional: { $($opt_name:literal : $opt_type:tt),* $(,)? }
    }) => {{
        let mut required: Vec<&str> = Vec::new();
        $(required.push($req_name);)*

        let mut props = serde_json::Map::new();
        $(props.insert($req_name.to_string(), schema!(@type $req_type));)*
        $(props.insert($opt_name.to_string(), schema!(@type $opt_type));)*

        serde_json::json!({
            "type": "object",
            "properties": props,
            "required": required
        })
    }};

    // Object with only required properties
    (object {
        required: { $($req_name:literal : $req_type:tt),* $(,)? }
    }) => {{
        let mut required: Vec<&str> = Vec::new();
        $(required.push($req_name);)*

        let mut props = serde_json::Map::new();
        $(props.insert($req_name.to_string(), schema!(@type $req_type));)*

        serde_json::json!({
            "type": "object",
            "properties": props,
            "required": required
        })
    }};

    // Empty object (connection arguments only)
    (object {}) => {{
        serde_json::json!({
            "type": "object",
            "properties": {},
            "required": []
        })
    }};

    // Type mappings
    (@type string) => { serde_json::json!({"type": "string"}) };
    (@type integer) => { serde_json::json!({"type": "integer"}) };
    (@type boolean) => { serde_json::json!({"type": "boolean"}) };
    (@type array_string) => { serde_json::json!({"type": "array", "items": {"type": "string"}}) };
}
