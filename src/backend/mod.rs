//! Backend seam.
//!
//! The server never talks to Cosmos DB directly; every tool goes through a
//! [`CosmosClient`] handle obtained from a [`ClientFactory`](crate::connection::ClientFactory).
//! [`rest::RestClient`] is the production implementation.

pub mod auth;
pub mod rest;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::document::Document;

/// A failure reported by (or while reaching) the Cosmos DB service.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{}", self.describe())]
pub struct BackendError {
    /// HTTP status code, absent for transport or credential failures.
    pub status: Option<u16>,
    /// Service error code, e.g. "NotFound" or "Conflict".
    pub code: Option<String>,
    /// Human-readable detail.
    pub message: String,
}

impl BackendError {
    /// Create a new backend error.
    pub fn new(status: Option<u16>, code: Option<String>, message: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: message.into(),
        }
    }

    /// A failure that never produced an HTTP response.
    pub fn transport(message: impl Into<String>) -> Self {
        Self::new(None, None, message)
    }

    fn describe(&self) -> String {
        match (self.status, &self.code) {
            (Some(status), Some(code)) => format!("({} {}) {}", status, code, self.message),
            (Some(status), None) => format!("({}) {}", status, self.message),
            (None, _) => self.message.clone(),
        }
    }
}

/// Result type for backend calls.
pub type BackendResult<T> = std::result::Result<T, BackendError>;

/// One page of a paginated read.
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    /// Items in arrival order.
    pub items: Vec<T>,
    /// Token for the next page. `None` (or empty) means the read is complete.
    pub continuation: Option<String>,
}

impl<T> Page<T> {
    /// A final page with no continuation.
    pub fn last(items: Vec<T>) -> Self {
        Self {
            items,
            continuation: None,
        }
    }
}

/// A partition key value. Only single string-valued keys are supported.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PartitionKey(String);

impl PartitionKey {
    /// Wrap a partition key value.
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// The raw value.
    pub fn value(&self) -> &str {
        &self.0
    }

    /// JSON array form used by the `x-ms-documentdb-partitionkey` header.
    ///
    /// Non-ASCII characters are `\u` escaped so the result is a valid header value.
    pub fn header_value(&self) -> String {
        let json = JsonValue::Array(vec![JsonValue::String(self.0.clone())]).to_string();
        let mut out = String::with_capacity(json.len());
        for ch in json.chars() {
            if ch.is_ascii() {
                out.push(ch);
            } else {
                let mut units = [0u16; 2];
                for unit in ch.encode_utf16(&mut units) {
                    out.push_str(&format!("\\u{:04x}", unit));
                }
            }
        }
        out
    }
}

/// Database resource as returned by the service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatabaseProperties {
    /// Database id.
    pub id: String,
}

/// Container resource as returned by the service.
///
/// Policy documents are kept as opaque JSON.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ContainerProperties {
    /// Container id.
    pub id: String,
    /// Internal resource id, used to look up throughput offers.
    #[serde(rename = "_rid", default, skip_serializing_if = "Option::is_none")]
    pub resource_id: Option<String>,
    /// Default time-to-live in seconds, `-1` for "on, no default".
    #[serde(rename = "defaultTtl", default)]
    pub default_ttl: Option<i64>,
    #[serde(rename = "indexingPolicy", default)]
    pub indexing_policy: Option<JsonValue>,
    #[serde(rename = "partitionKey", default)]
    pub partition_key: Option<JsonValue>,
    #[serde(rename = "conflictResolutionPolicy", default)]
    pub conflict_resolution_policy: Option<JsonValue>,
    #[serde(rename = "uniqueKeyPolicy", default)]
    pub unique_key_policy: Option<JsonValue>,
}

/// Definition of a container to create.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewContainer {
    /// Container id.
    pub id: String,
    /// Partition key path, e.g. `/category`.
    pub partition_key_path: String,
}

/// Provisioned throughput of a container offer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ThroughputProperties {
    /// Fixed RU/s, set for manually provisioned offers.
    pub manual: Option<u32>,
    /// Autoscale ceiling in RU/s, set for autoscale offers.
    pub autoscale_max: Option<u32>,
}

/// Outcome of a single operation inside a transactional batch.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct BatchOperationResult {
    /// HTTP-style status code for this operation.
    #[serde(rename = "statusCode")]
    pub status_code: u16,
}

/// A connected Cosmos DB account.
///
/// Implementations must not connect eagerly; the first network use happens in
/// one of these calls. No method retries on its own.
#[async_trait]
pub trait CosmosClient: Send + Sync {
    /// Fetch one page of the account's databases.
    async fn query_databases(
        &self,
        continuation: Option<String>,
    ) -> BackendResult<Page<DatabaseProperties>>;

    /// Create a database.
    async fn create_database(&self, id: &str) -> BackendResult<()>;

    /// Fetch one page of a database's containers.
    async fn query_containers(
        &self,
        database: &str,
        continuation: Option<String>,
    ) -> BackendResult<Page<ContainerProperties>>;

    /// Read a container's properties.
    async fn read_container(
        &self,
        database: &str,
        container: &str,
    ) -> BackendResult<ContainerProperties>;

    /// Read a container's dedicated throughput.
    ///
    /// Fails with status 404 when throughput is provisioned at database level.
    async fn read_throughput(
        &self,
        database: &str,
        container: &str,
    ) -> BackendResult<ThroughputProperties>;

    /// Create a container, optionally with dedicated manual throughput.
    async fn create_container(
        &self,
        database: &str,
        container: &NewContainer,
        throughput: Option<u32>,
    ) -> BackendResult<()>;

    /// Create a single item.
    async fn create_item(
        &self,
        database: &str,
        container: &str,
        partition_key: &PartitionKey,
        document: &Document,
    ) -> BackendResult<()>;

    /// Point-read an item, returning its JSON text.
    async fn read_item(
        &self,
        database: &str,
        container: &str,
        partition_key: &PartitionKey,
        id: &str,
    ) -> BackendResult<String>;

    /// Fetch one page of query results as JSON text.
    ///
    /// Without a partition key the query runs cross-partition.
    async fn query_items(
        &self,
        database: &str,
        container: &str,
        query: &str,
        partition_key: Option<&PartitionKey>,
        continuation: Option<String>,
    ) -> BackendResult<Page<String>>;

    /// Submit an atomic create batch scoped to one partition key.
    ///
    /// Returns one result per document, in submission order. A rejected batch
    /// still returns `Ok` with the failing statuses; nothing is persisted then.
    async fn execute_batch(
        &self,
        database: &str,
        container: &str,
        partition_key: &PartitionKey,
        documents: &[Document],
    ) -> BackendResult<Vec<BatchOperationResult>>;
}
