//! MCP server for Azure Cosmos DB.
//!
//! Run with `cosmosdb-mcp`; each tool call names the account (or the emulator) it targets.

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use cosmosdb_mcp::{McpServer, McpSession, RestClientFactory};

/// MCP server for Azure Cosmos DB.
///
/// Exposes Cosmos DB operations as MCP tools for AI agents.
/// Communicates via JSON-RPC 2.0 over stdin/stdout.
#[derive(Parser)]
#[command(name = "cosmosdb-mcp")]
#[command(version, about, long_about = None)]
struct Args {
    /// Account key used to sign requests to the managed service.
    /// Without it, the ambient Azure identity is used.
    #[arg(long, env = "COSMOSDB_ACCOUNT_KEY", hide_env_values = true)]
    account_key: Option<String>,

    /// Abort any backend call that takes longer than this many seconds.
    #[arg(long, env = "COSMOSDB_MCP_REQUEST_TIMEOUT_SECS", value_name = "SECS")]
    request_timeout_secs: Option<u64>,

    /// Enable debug logging to stderr.
    #[arg(long, short)]
    verbose: bool,
}

fn main() {
    let args = Args::parse();

    // Logs go to stderr; stdout carries the protocol
    let default_level = if args.verbose { "cosmosdb_mcp=debug" } else { "cosmosdb_mcp=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("Error: Failed to start async runtime: {}", e);
            std::process::exit(1);
        }
    };

    // Create session and server
    let factory = RestClientFactory::new(args.account_key.filter(|key| !key.is_empty()));
    let mut session = McpSession::new(Arc::new(factory));
    if let Some(secs) = args.request_timeout_secs.filter(|secs| *secs > 0) {
        session = session.with_request_timeout(Duration::from_secs(secs));
    }
    let server = McpServer::new(session);

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "cosmosdb-mcp starting on stdio");

    // Run the server
    if let Err(e) = runtime.block_on(server.run()) {
        eprintln!("Error: Server error: {}", e);
        std::process::exit(1);
    }

    tracing::info!("cosmosdb-mcp stopped");
}
