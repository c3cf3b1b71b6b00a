//! MCP server implementation.
//!
//! Handles JSON-RPC 2.0 over stdio according to the MCP protocol specification.
//! Tool calls run as independent tasks; a single writer task owns the output
//! stream so responses never interleave.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::convert::result_text;
use crate::error::{rpc_codes, McpError, Result};
use crate::session::McpSession;
use crate::tools::ToolRegistry;

/// MCP protocol version we support.
const PROTOCOL_VERSION: &str = "2024-11-05";

/// Server information.
const SERVER_NAME: &str = "cosmosdb-mcp";
const SERVER_VERSION: &str = env!("CARGO_PKG_VERSION");

/// JSON-RPC 2.0 request.
#[derive(Debug, Deserialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: String,
    pub id: Option<JsonValue>,
    pub method: String,
    #[serde(default)]
    pub params: Option<JsonValue>,
}

/// JSON-RPC 2.0 response.
#[derive(Debug, Serialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<JsonValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<JsonValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

/// JSON-RPC 2.0 error object.
#[derive(Debug, Serialize)]
pub struct JsonRpcError {
    pub code: i32,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<JsonValue>,
}

impl JsonRpcResponse {
    /// Create a success response.
    pub fn success(id: Option<JsonValue>, result: JsonValue) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            result: Some(result),
            error: None,
        }
    }

    /// Create an error response.
    pub fn error(id: Option<JsonValue>, code: i32, message: String) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            result: None,
            error: Some(JsonRpcError {
                code,
                message,
                data: None,
            }),
        }
    }

    /// Create an error response from an McpError.
    pub fn from_error(id: Option<JsonValue>, err: McpError) -> Self {
        Self::error(id, err.rpc_code(), err.to_string())
    }

    /// Wrap the outcome of a tool call.
    ///
    /// Tool failures are results with `isError` set so the agent can read the
    /// message; only an unknown tool is a protocol error.
    pub fn tool_result(id: Option<JsonValue>, outcome: Result<JsonValue>) -> Self {
        match outcome {
            Ok(value) => Self::success(
                id,
                serde_json::json!({
                    "content": [{ "type": "text", "text": result_text(&value) }],
                    "structuredContent": value
                }),
            ),
            Err(err @ McpError::UnknownTool(_)) => Self::from_error(id, err),
            Err(err) => Self::success(
                id,
                serde_json::json!({
                    "content": [{ "type": "text", "text": err.to_string() }],
                    "isError": true
                }),
            ),
        }
    }
}

/// Cancellation handles of running tool calls, keyed by request id.
type InFlight = Arc<Mutex<HashMap<String, CancellationToken>>>;

/// MCP server.
pub struct McpServer {
    session: McpSession,
    registry: Arc<ToolRegistry>,
}

impl McpServer {
    /// Create a new MCP server with the given session.
    pub fn new(session: McpSession) -> Self {
        Self {
            session,
            registry: Arc::new(ToolRegistry::new()),
        }
    }

    /// Run the server, reading from stdin and writing to stdout.
    pub async fn run(&self) -> Result<()> {
        self.serve(tokio::io::stdin(), tokio::io::stdout()).await
    }

    /// Serve newline-delimited JSON-RPC until `reader` reaches EOF.
    ///
    /// A line that is not UTF-8 or not a request gets a parse error and the
    /// loop carries on. Calls still running when input ends (or fails) are
    /// awaited and answered before returning.
    pub async fn serve<R, W>(&self, reader: R, writer: W) -> Result<()>
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let (tx, rx) = mpsc::unbounded_channel();
        let writer_task = tokio::spawn(write_responses(writer, rx));
        let in_flight: InFlight = Arc::default();
        let mut calls = JoinSet::new();
        let mut reader = BufReader::new(reader);
        let mut buf = Vec::new();

        let read_result = loop {
            buf.clear();
            match reader.read_until(b'\n', &mut buf).await {
                Ok(0) => break Ok(()),
                Ok(_) => {}
                Err(e) => break Err(McpError::from(e)),
            }

            let response = match std::str::from_utf8(&buf) {
                Ok(line) if line.trim().is_empty() => continue,
                Ok(line) => match serde_json::from_str::<JsonRpcRequest>(line.trim()) {
                    Ok(request) => self.handle_request(request, &tx, &in_flight, &mut calls),
                    Err(e) => Some(JsonRpcResponse::error(
                        None,
                        rpc_codes::PARSE_ERROR,
                        format!("Parse error: {}", e),
                    )),
                },
                Err(e) => Some(JsonRpcResponse::error(
                    None,
                    rpc_codes::PARSE_ERROR,
                    format!("Parse error: {}", e),
                )),
            };
            if let Some(response) = response {
                let _ = tx.send(response);
            }
        };

        if let Err(e) = &read_result {
            tracing::error!(error = %e, "failed reading input");
        }
        tracing::debug!(pending = calls.len(), "input closed, draining tool calls");
        while let Some(joined) = calls.join_next().await {
            if let Err(e) = joined {
                tracing::error!(error = %e, "tool call task failed");
            }
        }

        drop(tx);
        let written = writer_task
            .await
            .map_err(|e| McpError::Internal(format!("writer task failed: {}", e)))?;
        read_result.and(written)
    }

    /// Handle a single JSON-RPC message. Returns the immediate response, if any.
    fn handle_request(
        &self,
        request: JsonRpcRequest,
        tx: &mpsc::UnboundedSender<JsonRpcResponse>,
        in_flight: &InFlight,
        calls: &mut JoinSet<()>,
    ) -> Option<JsonRpcResponse> {
        // Validate JSON-RPC version
        if request.jsonrpc != "2.0" {
            return Some(JsonRpcResponse::error(
                request.id,
                rpc_codes::INVALID_REQUEST,
                "Invalid JSON-RPC version".to_string(),
            ));
        }

        // Notifications never get a response
        let Some(id) = request.id else {
            self.handle_notification(&request.method, request.params, in_flight);
            return None;
        };

        match request.method.as_str() {
            "initialize" => Some(self.handle_initialize(id)),
            "ping" => Some(JsonRpcResponse::success(Some(id), serde_json::json!({}))),
            "tools/list" => Some(self.handle_tools_list(id)),
            "tools/call" => match parse_tool_call(request.params) {
                Ok((name, arguments)) => {
                    self.spawn_tool_call(id, name, arguments, tx.clone(), in_flight.clone(), calls);
                    None
                }
                Err(err) => Some(JsonRpcResponse::from_error(Some(id), err)),
            },
            _ => Some(JsonRpcResponse::error(
                Some(id),
                rpc_codes::METHOD_NOT_FOUND,
                format!("Unknown method: {}", request.method),
            )),
        }
    }

    fn handle_notification(&self, method: &str, params: Option<JsonValue>, in_flight: &InFlight) {
        match method {
            "notifications/initialized" | "initialized" => {
                tracing::info!("client initialized");
            }
            "notifications/cancelled" => {
                let Some(request_id) = params.as_ref().and_then(|p| p.get("requestId")) else {
                    return;
                };
                let key = request_id.to_string();
                let map = in_flight.lock().unwrap_or_else(|p| p.into_inner());
                if let Some(token) = map.get(&key) {
                    tracing::debug!(request = %key, "cancelling tool call");
                    token.cancel();
                }
            }
            other => tracing::debug!(method = other, "ignoring notification"),
        }
    }

    /// Handle the initialize request.
    fn handle_initialize(&self, id: JsonValue) -> JsonRpcResponse {
        JsonRpcResponse::success(
            Some(id),
            serde_json::json!({
                "protocolVersion": PROTOCOL_VERSION,
                "capabilities": {
                    "tools": {}
                },
                "serverInfo": {
                    "name": SERVER_NAME,
                    "version": SERVER_VERSION
                }
            }),
        )
    }

    /// Handle the tools/list request.
    fn handle_tools_list(&self, id: JsonValue) -> JsonRpcResponse {
        let tools: Vec<JsonValue> = self
            .registry
            .tools()
            .iter()
            .map(|t| {
                serde_json::json!({
                    "name": t.name,
                    "description": t.description,
                    "inputSchema": t.input_schema
                })
            })
            .collect();

        JsonRpcResponse::success(Some(id), serde_json::json!({ "tools": tools }))
    }

    fn spawn_tool_call(
        &self,
        id: JsonValue,
        name: String,
        arguments: Map<String, JsonValue>,
        tx: mpsc::UnboundedSender<JsonRpcResponse>,
        in_flight: InFlight,
        calls: &mut JoinSet<()>,
    ) {
        let key = id.to_string();
        let cancel = CancellationToken::new();
        in_flight
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .insert(key.clone(), cancel.clone());

        let session = self.session.clone();
        let registry = Arc::clone(&self.registry);
        calls.spawn(async move {
            tracing::debug!(tool = %name, request = %key, "tool call started");
            let outcome = registry.dispatch(&session, &cancel, &name, arguments).await;
            in_flight
                .lock()
                .unwrap_or_else(|p| p.into_inner())
                .remove(&key);

            if let Err(err) = &outcome {
                tracing::warn!(tool = %name, error = %err, "tool call failed");
            }
            let _ = tx.send(JsonRpcResponse::tool_result(Some(id), outcome));
        });
    }
}

/// Extract name and arguments from tools/call params.
fn parse_tool_call(params: Option<JsonValue>) -> Result<(String, Map<String, JsonValue>)> {
    let mut params = match params {
        Some(JsonValue::Object(obj)) => obj,
        _ => return Err(McpError::InvalidArg {
            name: "params".to_string(),
            reason: "missing params object".to_string(),
        }),
    };

    let name = match params.remove("name") {
        Some(JsonValue::String(n)) => n,
        _ => return Err(McpError::InvalidArg {
            name: "name".to_string(),
            reason: "missing tool name".to_string(),
        }),
    };

    let arguments = match params.remove("arguments") {
        Some(JsonValue::Object(obj)) => obj,
        Some(JsonValue::Null) | None => Map::new(),
        _ => return Err(McpError::InvalidArg {
            name: "arguments".to_string(),
            reason: "must be an object".to_string(),
        }),
    };

    Ok((name, arguments))
}

async fn write_responses<W>(mut writer: W, mut rx: mpsc::UnboundedReceiver<JsonRpcResponse>) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    while let Some(response) = rx.recv().await {
        let response_json = serde_json::to_string(&response)?;
        writer.write_all(response_json.as_bytes()).await?;
        writer.write_all(b"\n").await?;
        writer.flush().await?;
    }
    Ok(())
}
