//! # cosmosdb-mcp
//!
//! MCP (Model Context Protocol) server for Azure Cosmos DB.
//!
//! This crate exposes Cosmos DB operations as tools for AI agents. It implements
//! the MCP protocol over stdin/stdout using JSON-RPC 2.0.
//!
//! ## Features
//!
//! - **9 tools**: list/create databases, list/create/inspect containers, add, read,
//!   query and batch-create items
//! - **Per-call connection**: every tool call names its account, or targets the
//!   local emulator with `useEmulator`
//! - **Atomic batches**: up to 100 items created all-or-nothing in one partition
//! - **Cancellation**: `notifications/cancelled` and an optional request deadline
//!   abort backend calls promptly
//!
//! ## Usage
//!
//! The server is typically run as an executable and configured in AI tools like Claude Desktop:
//!
//! ```json
//! {
//!   "mcpServers": {
//!     "cosmosdb": {
//!       "command": "/path/to/cosmosdb-mcp",
//!       "args": ["--request-timeout-secs", "60"]
//!     }
//!   }
//! }
//! ```
//!
//! ## Library Usage
//!
//! For testing or embedding, you can use the library API:
//!
//! ```no_run
//! use std::sync::Arc;
//! use cosmosdb_mcp::{McpServer, McpSession, RestClientFactory};
//!
//! # async fn run() -> cosmosdb_mcp::Result<()> {
//! let session = McpSession::new(Arc::new(RestClientFactory::new(None)));
//! let server = McpServer::new(session);
//!
//! // Reads from stdin, writes to stdout
//! server.run().await
//! # }
//! ```

pub mod backend;
pub mod batch;
pub mod connection;
pub mod convert;
pub mod document;
pub mod error;
pub mod query;
pub mod server;
pub mod session;
pub mod throughput;
pub mod tools;
pub mod validate;

pub use backend::{BackendError, CosmosClient, PartitionKey};
pub use connection::{ClientFactory, ConnectionConfig, RestClientFactory};
pub use document::Document;
pub use error::{McpError, Result};
pub use server::{JsonRpcRequest, JsonRpcResponse, McpServer};
pub use session::McpSession;
pub use throughput::ThroughputInfo;
pub use tools::{ToolDef, ToolRegistry};
