//! MCP session.
//!
//! Holds what every tool call needs besides its own arguments: the client
//! factory and the per-operation deadline. Sessions carry no state between
//! calls and can be shared by concurrent tool invocations.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::backend::{BackendResult, CosmosClient};
use crate::connection::{ClientFactory, ConnectionConfig};
use crate::error::{McpError, Result};

/// MCP session state.
#[derive(Clone)]
pub struct McpSession {
    /// Source of backend handles
    factory: Arc<dyn ClientFactory>,
    /// Deadline applied to each backend-bound operation
    request_timeout: Option<Duration>,
}

impl McpSession {
    /// Create a new session around a client factory.
    pub fn new(factory: Arc<dyn ClientFactory>) -> Self {
        Self {
            factory,
            request_timeout: None,
        }
    }

    /// Bound every backend-bound operation by `timeout`.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    /// The configured deadline, if any.
    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout
    }

    /// Resolve a connection into a backend handle. No network I/O happens here.
    pub fn client(&self, config: &ConnectionConfig) -> Result<Arc<dyn CosmosClient>> {
        Ok(self.factory.connect(config)?)
    }

    /// Run one backend-bound operation.
    ///
    /// Cancellation and the deadline each abort the operation with their own
    /// error. Backend failures are wrapped with `operation` for context.
    pub async fn call<T, F>(&self, cancel: &CancellationToken, operation: &str, work: F) -> Result<T>
    where
        F: Future<Output = BackendResult<T>>,
    {
        let bounded = async {
            let outcome = match self.request_timeout {
                Some(limit) => tokio::time::timeout(limit, work).await.map_err(|_| {
                    McpError::Timeout {
                        operation: operation.to_string(),
                        after: limit,
                    }
                })?,
                None => work.await,
            };
            outcome.map_err(|e| McpError::backend(operation, e))
        };

        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(McpError::Cancelled {
                operation: operation.to_string(),
            }),
            result = bounded => result,
        }
    }
}
