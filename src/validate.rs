//! Tool inputs and their validation.
//!
//! Each tool deserializes its arguments into one of the input structs below and
//! validates it before any backend handle is created. Fields are checked in a
//! fixed order (connection, database, container, then operation fields) and
//! the first failure wins, so a malformed input always yields the same message.

use serde::Deserialize;

use crate::batch::MAX_BATCH_ITEMS;
use crate::connection::ConnectionConfig;
use crate::error::{McpError, Result};

/// Verbatim validation messages, one per field.
pub mod messages {
    /// `database` empty
    pub const DATABASE_MISSING: &str = "database name missing";
    /// `container` empty
    pub const CONTAINER_MISSING: &str = "container name missing";
    /// `partitionKeyPath` empty
    pub const PARTITION_KEY_PATH_MISSING: &str = "partition key path missing";
    /// `partitionKeyPath` not rooted
    pub const PARTITION_KEY_PATH_INVALID: &str = "partition key path must start with '/'";
    /// `partitionKey` empty
    pub const PARTITION_KEY_MISSING: &str = "partition key value missing";
    /// `item` empty
    pub const ITEM_MISSING: &str = "item JSON missing";
    /// `itemID` empty
    pub const ITEM_ID_MISSING: &str = "item ID missing";
    /// `query` empty
    pub const QUERY_MISSING: &str = "query string missing";
    /// `items` empty
    pub const ITEMS_EMPTY: &str = "items array is empty";
    /// `items` longer than the batch limit
    pub const ITEMS_TOO_MANY: &str = "batch exceeds maximum of 100 items";
    /// `throughput` below the service minimum
    pub const THROUGHPUT_TOO_LOW: &str = "throughput must be at least 400 RU/s";
}

/// Smallest manual throughput the service accepts.
pub const MIN_THROUGHPUT: u32 = 400;

/// Pure, I/O-free input check.
pub trait Validate {
    /// Return the first failing field's error.
    fn validate(&self) -> Result<()>;
}

fn require(value: &str, message: &str) -> Result<()> {
    if value.is_empty() {
        Err(McpError::Validation(message.to_string()))
    } else {
        Ok(())
    }
}

fn require_connection(config: &ConnectionConfig) -> Result<()> {
    Ok(config.validate()?)
}

/// Check the size bound of a batch.
pub fn check_batch_size(len: usize) -> Result<()> {
    if len == 0 {
        return Err(McpError::Validation(messages::ITEMS_EMPTY.to_string()));
    }
    if len > MAX_BATCH_ITEMS {
        return Err(McpError::Validation(messages::ITEMS_TOO_MANY.to_string()));
    }
    Ok(())
}

/// `list_databases`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ListDatabasesInput {
    #[serde(flatten)]
    pub connection: ConnectionConfig,
}

impl Validate for ListDatabasesInput {
    fn validate(&self) -> Result<()> {
        require_connection(&self.connection)
    }
}

/// `create_database`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CreateDatabaseInput {
    #[serde(flatten)]
    pub connection: ConnectionConfig,
    pub database: String,
}

impl Validate for CreateDatabaseInput {
    fn validate(&self) -> Result<()> {
        require_connection(&self.connection)?;
        require(&self.database, messages::DATABASE_MISSING)
    }
}

/// `list_containers`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ListContainersInput {
    #[serde(flatten)]
    pub connection: ConnectionConfig,
    pub database: String,
}

impl Validate for ListContainersInput {
    fn validate(&self) -> Result<()> {
        require_connection(&self.connection)?;
        require(&self.database, messages::DATABASE_MISSING)
    }
}

/// `read_container_metadata`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ReadContainerMetadataInput {
    #[serde(flatten)]
    pub connection: ConnectionConfig,
    pub database: String,
    pub container: String,
}

impl Validate for ReadContainerMetadataInput {
    fn validate(&self) -> Result<()> {
        require_connection(&self.connection)?;
        require(&self.database, messages::DATABASE_MISSING)?;
        require(&self.container, messages::CONTAINER_MISSING)
    }
}

/// `create_container`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CreateContainerInput {
    #[serde(flatten)]
    pub connection: ConnectionConfig,
    pub database: String,
    pub container: String,
    pub partition_key_path: String,
    pub throughput: Option<u32>,
}

impl Validate for CreateContainerInput {
    fn validate(&self) -> Result<()> {
        require_connection(&self.connection)?;
        require(&self.database, messages::DATABASE_MISSING)?;
        require(&self.container, messages::CONTAINER_MISSING)?;
        require(&self.partition_key_path, messages::PARTITION_KEY_PATH_MISSING)?;
        if !self.partition_key_path.starts_with('/') {
            return Err(McpError::Validation(
                messages::PARTITION_KEY_PATH_INVALID.to_string(),
            ));
        }
        match self.throughput {
            Some(ru) if ru < MIN_THROUGHPUT => Err(McpError::Validation(
                messages::THROUGHPUT_TOO_LOW.to_string(),
            )),
            _ => Ok(()),
        }
    }
}

/// `add_item_to_container`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AddItemInput {
    #[serde(flatten)]
    pub connection: ConnectionConfig,
    pub database: String,
    pub container: String,
    pub partition_key: String,
    pub item: String,
}

impl Validate for AddItemInput {
    fn validate(&self) -> Result<()> {
        require_connection(&self.connection)?;
        require(&self.database, messages::DATABASE_MISSING)?;
        require(&self.container, messages::CONTAINER_MISSING)?;
        require(&self.partition_key, messages::PARTITION_KEY_MISSING)?;
        require(&self.item, messages::ITEM_MISSING)
    }
}

/// `read_item`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ReadItemInput {
    #[serde(flatten)]
    pub connection: ConnectionConfig,
    pub database: String,
    pub container: String,
    #[serde(rename = "itemID")]
    pub item_id: String,
    pub partition_key: String,
}

impl Validate for ReadItemInput {
    fn validate(&self) -> Result<()> {
        require_connection(&self.connection)?;
        require(&self.database, messages::DATABASE_MISSING)?;
        require(&self.container, messages::CONTAINER_MISSING)?;
        require(&self.item_id, messages::ITEM_ID_MISSING)?;
        require(&self.partition_key, messages::PARTITION_KEY_MISSING)
    }
}

/// `execute_query`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ExecuteQueryInput {
    #[serde(flatten)]
    pub connection: ConnectionConfig,
    pub database: String,
    pub container: String,
    pub query: String,
    /// Scopes the query to one partition when non-empty.
    pub partition_key: Option<String>,
}

impl ExecuteQueryInput {
    /// The partition scope, treating an empty string as absent.
    pub fn partition_key(&self) -> Option<&str> {
        self.partition_key.as_deref().filter(|pk| !pk.is_empty())
    }
}

impl Validate for ExecuteQueryInput {
    fn validate(&self) -> Result<()> {
        require_connection(&self.connection)?;
        require(&self.database, messages::DATABASE_MISSING)?;
        require(&self.container, messages::CONTAINER_MISSING)?;
        require(&self.query, messages::QUERY_MISSING)
    }
}

/// `batch_create_items`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct BatchCreateItemsInput {
    #[serde(flatten)]
    pub connection: ConnectionConfig,
    pub database: String,
    pub container: String,
    pub partition_key: String,
    pub items: Vec<String>,
}

impl Validate for BatchCreateItemsInput {
    fn validate(&self) -> Result<()> {
        require_connection(&self.connection)?;
        require(&self.database, messages::DATABASE_MISSING)?;
        require(&self.container, messages::CONTAINER_MISSING)?;
        require(&self.partition_key, messages::PARTITION_KEY_MISSING)?;
        check_batch_size(self.items.len())
    }
}
