//! Item tools.
//!
//! Tools: add_item_to_container, read_item, execute_query, batch_create_items

use serde::Serialize;
use serde_json::{Map, Value as JsonValue};
use tokio_util::sync::CancellationToken;

use crate::backend::PartitionKey;
use crate::batch;
use crate::convert::{parse_args, to_result};
use crate::document::Document;
use crate::error::{McpError, Result};
use crate::query::collect_pages;
use crate::schema;
use crate::session::McpSession;
use crate::tools::ToolDef;
use crate::validate::{
    AddItemInput, BatchCreateItemsInput, ExecuteQueryInput, ReadItemInput, Validate,
};

/// Tool name.
pub const ADD_ITEM: &str = "add_item_to_container";
/// Tool name.
pub const READ_ITEM: &str = "read_item";
/// Tool name.
pub const EXECUTE_QUERY: &str = "execute_query";
/// Tool name.
pub const BATCH_CREATE_ITEMS: &str = "batch_create_items";

const EXECUTE_QUERY_DESCRIPTION: &str = "Execute a general query on a Cosmos DB container. \
    If the query fails with an error related to cross partition query, do not ask the user \
    to provide a partition key. Instead, try a different query that does not require a \
    partition key. Do not use the `TOP`, `ORDER BY`, `OFFSET LIMIT`, `DISTINCT` and \
    `GROUP BY` clauses in the query as they are not supported by this tool. Simple \
    projections and filters are supported. Ensure that the query string is valid Cosmos DB \
    SQL. To use a partition key in the query directly, add it in the WHERE clause. \
    Example: SELECT * FROM c WHERE c.department='HR'.";

/// Get all item tool definitions.
pub fn tools() -> Vec<ToolDef> {
    vec![
        ToolDef::new(
            ADD_ITEM,
            "Add an item to the specified container in Azure Cosmos DB. \
             item is the JSON text of the document; its id field is mandatory.",
            schema!(object {
                required: { "database": string, "container": string, "partitionKey": string, "item": string }
            }),
        ),
        ToolDef::new(
            READ_ITEM,
            "Read a specific item from a container in a Cosmos DB database",
            schema!(object {
                required: { "database": string, "container": string, "itemID": string, "partitionKey": string }
            }),
        ),
        ToolDef::new(
            EXECUTE_QUERY,
            EXECUTE_QUERY_DESCRIPTION,
            schema!(object {
                required: { "database": string, "container": string, "query": string },
                optional: { "partitionKey": string }
            }),
        ),
        ToolDef::new(
            BATCH_CREATE_ITEMS,
            "Create up to 100 items atomically in one container. All items must share the \
             given partition key value and each must have an id. Either every item is \
             created or none is.",
            schema!(object {
                required: { "database": string, "container": string, "partitionKey": string, "items": array_string }
            }),
        ),
    ]
}

/// Result of `add_item_to_container`.
#[derive(Debug, Serialize)]
pub struct AddItemResult {
    pub account: String,
    pub database: String,
    pub container: String,
    pub message: String,
}

/// Result of `read_item`.
#[derive(Debug, Serialize)]
pub struct ReadItemResult {
    /// The stored document as JSON text.
    pub item: String,
}

/// Result of `execute_query`.
#[derive(Debug, Serialize)]
pub struct ExecuteQueryResult {
    /// Matching documents as JSON text, in backend order.
    pub results: Vec<String>,
}

/// Result of `batch_create_items`.
#[derive(Debug, Serialize)]
pub struct BatchCreateResult {
    pub account: String,
    pub database: String,
    pub container: String,
    #[serde(rename = "itemsCreated")]
    pub items_created: usize,
    pub message: String,
}

/// Dispatch an item tool call.
pub async fn dispatch(
    session: &McpSession,
    cancel: &CancellationToken,
    name: &str,
    args: Map<String, JsonValue>,
) -> Result<JsonValue> {
    match name {
        ADD_ITEM => to_result(&add_item(session, cancel, parse_args(args)?).await?),
        READ_ITEM => to_result(&read_item(session, cancel, parse_args(args)?).await?),
        EXECUTE_QUERY => to_result(&execute_query(session, cancel, parse_args(args)?).await?),
        BATCH_CREATE_ITEMS => {
            to_result(&batch_create_items(session, cancel, parse_args(args)?).await?)
        }
        _ => Err(McpError::UnknownTool(name.to_string())),
    }
}

/// Create one item. The payload must be a JSON object with a string `id`.
pub async fn add_item(
    session: &McpSession,
    cancel: &CancellationToken,
    input: AddItemInput,
) -> Result<AddItemResult> {
    input.validate()?;
    let document = Document::with_id(input.item.as_str()).map_err(|source| McpError::Document {
        operation: "adding item to container".to_string(),
        source,
    })?;
    let client = session.client(&input.connection)?;
    tracing::debug!(
        account = %input.connection.account,
        database = %input.database,
        container = %input.container,
        "adding item"
    );

    let partition_key = PartitionKey::new(input.partition_key.as_str());
    session
        .call(
            cancel,
            "adding item to container",
            client.create_item(&input.database, &input.container, &partition_key, &document),
        )
        .await?;

    Ok(AddItemResult {
        message: format!(
            "Item added successfully to container '{}' in database '{}'",
            input.container, input.database
        ),
        account: input.connection.account,
        database: input.database,
        container: input.container,
    })
}

/// Point-read one item by id and partition key.
pub async fn read_item(
    session: &McpSession,
    cancel: &CancellationToken,
    input: ReadItemInput,
) -> Result<ReadItemResult> {
    input.validate()?;
    let client = session.client(&input.connection)?;
    tracing::debug!(
        account = %input.connection.account,
        database = %input.database,
        container = %input.container,
        item = %input.item_id,
        "reading item"
    );

    let partition_key = PartitionKey::new(input.partition_key.as_str());
    let item = session
        .call(
            cancel,
            "reading item",
            client.read_item(&input.database, &input.container, &partition_key, &input.item_id),
        )
        .await?;

    Ok(ReadItemResult { item })
}

/// Run a query to completion, scoped to one partition when a key is given.
pub async fn execute_query(
    session: &McpSession,
    cancel: &CancellationToken,
    input: ExecuteQueryInput,
) -> Result<ExecuteQueryResult> {
    input.validate()?;
    let client = session.client(&input.connection)?;
    let partition_key = input.partition_key().map(PartitionKey::new);
    tracing::debug!(
        account = %input.connection.account,
        database = %input.database,
        container = %input.container,
        cross_partition = partition_key.is_none(),
        "executing query"
    );

    let results = session
        .call(
            cancel,
            "executing query",
            collect_pages(|continuation| {
                client.query_items(
                    &input.database,
                    &input.container,
                    &input.query,
                    partition_key.as_ref(),
                    continuation,
                )
            }),
        )
        .await?;

    Ok(ExecuteQueryResult { results })
}

/// Create every item atomically or none of them.
pub async fn batch_create_items(
    session: &McpSession,
    cancel: &CancellationToken,
    input: BatchCreateItemsInput,
) -> Result<BatchCreateResult> {
    input.validate()?;
    let client = session.client(&input.connection)?;
    tracing::debug!(
        account = %input.connection.account,
        database = %input.database,
        container = %input.container,
        count = input.items.len(),
        "batch creating items"
    );

    let partition_key = PartitionKey::new(input.partition_key.as_str());
    let created = batch::create_all(
        session,
        cancel,
        client.as_ref(),
        &input.database,
        &input.container,
        &partition_key,
        &input.items,
    )
    .await?;

    Ok(BatchCreateResult {
        message: format!(
            "Successfully created {} items in container '{}'",
            created, input.container
        ),
        account: input.connection.account,
        database: input.database,
        container: input.container,
        items_created: created,
    })
}
