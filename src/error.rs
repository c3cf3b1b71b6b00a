//! Error types for the MCP server.
//!
//! Maps connection, backend and validation failures to MCP-friendly error responses.

use std::time::Duration;

use crate::backend::BackendError;
use crate::connection::ConfigError;
use crate::document::DocumentError;

/// MCP server errors.
#[derive(Debug, Clone, thiserror::Error)]
pub enum McpError {
    /// A required tool argument is missing or empty. The message is returned verbatim.
    #[error("{0}")]
    Validation(String),

    /// Invalid argument value.
    #[error("invalid argument '{name}': {reason}")]
    InvalidArg {
        /// Argument name
        name: String,
        /// Reason why it's invalid
        reason: String,
    },

    /// Endpoint or credential resolution failed.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Error returned by the Cosmos DB service.
    #[error("error {operation}: {source}")]
    Backend {
        /// What the server was doing, e.g. "creating container"
        operation: String,
        /// The underlying service failure
        source: BackendError,
    },

    /// Create request hit an existing resource (HTTP 409).
    #[error("{kind} '{name}' already exists")]
    AlreadyExists {
        /// Resource kind ("database", "container")
        kind: String,
        /// Resource identifier
        name: String,
    },

    /// An item payload was rejected before reaching the service.
    #[error("error {operation}: {source}")]
    Document {
        /// What the server was doing
        operation: String,
        /// Why the payload was rejected
        source: DocumentError,
    },

    /// Transactional batch did not commit. Nothing was written.
    #[error("batch failed: {0}")]
    Batch(String),

    /// The caller cancelled the operation.
    #[error("{operation} cancelled")]
    Cancelled {
        /// Operation that was interrupted
        operation: String,
    },

    /// The configured request deadline elapsed.
    #[error("{operation} timed out after {after:?}")]
    Timeout {
        /// Operation that was interrupted
        operation: String,
        /// Configured deadline
        after: Duration,
    },

    /// Unknown tool requested.
    #[error("unknown tool: {0}")]
    UnknownTool(String),

    /// JSON-RPC protocol error.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(String),

    /// Internal error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl McpError {
    /// Wrap a backend failure with the operation that produced it.
    pub fn backend(operation: &str, source: BackendError) -> Self {
        McpError::Backend {
            operation: operation.to_string(),
            source,
        }
    }

    /// HTTP status of the backend failure, if this is one.
    pub fn status(&self) -> Option<u16> {
        match self {
            McpError::Backend { source, .. } => source.status,
            _ => None,
        }
    }

    /// Turn a 409 from a create call into [`McpError::AlreadyExists`].
    pub fn conflict_as_exists(self, kind: &str, name: &str) -> Self {
        if self.status() == Some(409) {
            McpError::AlreadyExists {
                kind: kind.to_string(),
                name: name.to_string(),
            }
        } else {
            self
        }
    }
}

impl From<std::io::Error> for McpError {
    fn from(err: std::io::Error) -> Self {
        McpError::Io(err.to_string())
    }
}

impl From<serde_json::Error> for McpError {
    fn from(err: serde_json::Error) -> Self {
        McpError::Protocol(format!("JSON error: {}", err))
    }
}

/// JSON-RPC error codes.
pub mod rpc_codes {
    /// Parse error - Invalid JSON was received.
    pub const PARSE_ERROR: i32 = -32700;
    /// Invalid Request - The JSON sent is not a valid Request object.
    pub const INVALID_REQUEST: i32 = -32600;
    /// Method not found - The method does not exist / is not available.
    pub const METHOD_NOT_FOUND: i32 = -32601;
    /// Invalid params - Invalid method parameter(s).
    pub const INVALID_PARAMS: i32 = -32602;
    /// Internal error - Internal JSON-RPC error.
    pub const INTERNAL_ERROR: i32 = -32603;
}

impl McpError {
    /// Convert to JSON-RPC error code.
    pub fn rpc_code(&self) -> i32 {
        match self {
            McpError::UnknownTool(_) => rpc_codes::METHOD_NOT_FOUND,
            McpError::Validation(_)
            | McpError::InvalidArg { .. }
            | McpError::Config(ConfigError::MissingAccount)
            | McpError::Config(ConfigError::InvalidAccount(_))
            | McpError::Document { .. } => rpc_codes::INVALID_PARAMS,
            McpError::Protocol(_) => rpc_codes::INVALID_REQUEST,
            McpError::Backend { source, .. } => match source.status {
                Some(400) | Some(404) => rpc_codes::INVALID_PARAMS,
                _ => rpc_codes::INTERNAL_ERROR,
            },
            _ => rpc_codes::INTERNAL_ERROR,
        }
    }
}

/// Result type for MCP operations.
pub type Result<T> = std::result::Result<T, McpError>;
