//! Database-level tools.
//!
//! Tools: list_databases, create_database

use serde::Serialize;
use serde_json::{Map, Value as JsonValue};
use tokio_util::sync::CancellationToken;

use crate::convert::{parse_args, to_result};
use crate::error::{McpError, Result};
use crate::query::collect_pages;
use crate::schema;
use crate::session::McpSession;
use crate::tools::ToolDef;
use crate::validate::{CreateDatabaseInput, ListDatabasesInput, Validate};

/// Tool name.
pub const LIST_DATABASES: &str = "list_databases";
/// Tool name.
pub const CREATE_DATABASE: &str = "create_database";

/// Get all database tool definitions.
pub fn tools() -> Vec<ToolDef> {
    vec![
        ToolDef::new(
            LIST_DATABASES,
            "List all databases in a Cosmos DB account",
            schema!(object {}),
        ),
        ToolDef::new(
            CREATE_DATABASE,
            "Create a new database in a Cosmos DB account",
            schema!(object {
                required: { "database": string }
            }),
        ),
    ]
}

/// Result of `list_databases`.
#[derive(Debug, Serialize)]
pub struct ListDatabasesResult {
    pub account: String,
    pub databases: Vec<String>,
}

/// Result of `create_database`.
#[derive(Debug, Serialize)]
pub struct CreateDatabaseResult {
    pub account: String,
    pub database: String,
    pub message: String,
}

/// Dispatch a database tool call.
pub async fn dispatch(
    session: &McpSession,
    cancel: &CancellationToken,
    name: &str,
    args: Map<String, JsonValue>,
) -> Result<JsonValue> {
    match name {
        LIST_DATABASES => to_result(&list_databases(session, cancel, parse_args(args)?).await?),
        CREATE_DATABASE => to_result(&create_database(session, cancel, parse_args(args)?).await?),
        _ => Err(McpError::UnknownTool(name.to_string())),
    }
}

/// List every database in the account, draining all pages.
pub async fn list_databases(
    session: &McpSession,
    cancel: &CancellationToken,
    input: ListDatabasesInput,
) -> Result<ListDatabasesResult> {
    input.validate()?;
    let client = session.client(&input.connection)?;
    tracing::debug!(account = %input.connection.account, "listing databases");

    let databases = session
        .call(
            cancel,
            "listing databases",
            collect_pages(|continuation| client.query_databases(continuation)),
        )
        .await?;

    Ok(ListDatabasesResult {
        account: input.connection.account,
        databases: databases.into_iter().map(|db| db.id).collect(),
    })
}

/// Create a database. An existing database is reported, not overwritten.
pub async fn create_database(
    session: &McpSession,
    cancel: &CancellationToken,
    input: CreateDatabaseInput,
) -> Result<CreateDatabaseResult> {
    input.validate()?;
    let client = session.client(&input.connection)?;
    tracing::debug!(account = %input.connection.account, database = %input.database, "creating database");

    session
        .call(cancel, "creating database", client.create_database(&input.database))
        .await
        .map_err(|e| e.conflict_as_exists("database", &input.database))?;

    Ok(CreateDatabaseResult {
        message: format!("Database '{}' created successfully", input.database),
        account: input.connection.account,
        database: input.database,
    })
}
