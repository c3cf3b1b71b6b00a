//! Container tools.
//!
//! Tools: list_containers, read_container_metadata, create_container

use serde::Serialize;
use serde_json::{Map, Value as JsonValue};
use tokio_util::sync::CancellationToken;

use crate::backend::{BackendError, NewContainer};
use crate::convert::{parse_args, to_result};
use crate::error::{McpError, Result};
use crate::query::collect_pages;
use crate::schema;
use crate::session::McpSession;
use crate::throughput::{classify, ThroughputInfo};
use crate::tools::ToolDef;
use crate::validate::{
    CreateContainerInput, ListContainersInput, ReadContainerMetadataInput, Validate,
};

/// Tool name.
pub const LIST_CONTAINERS: &str = "list_containers";
/// Tool name.
pub const READ_CONTAINER_METADATA: &str = "read_container_metadata";
/// Tool name.
pub const CREATE_CONTAINER: &str = "create_container";

/// Get all container tool definitions.
pub fn tools() -> Vec<ToolDef> {
    vec![
        ToolDef::new(
            LIST_CONTAINERS,
            "List all containers in a Cosmos DB database",
            schema!(object {
                required: { "database": string }
            }),
        ),
        ToolDef::new(
            READ_CONTAINER_METADATA,
            "Read metadata of the specified container in Azure Cosmos DB, including \
             indexing policy, partition key definition and provisioned throughput",
            schema!(object {
                required: { "database": string, "container": string }
            }),
        ),
        ToolDef::new(
            CREATE_CONTAINER,
            "Create a new container in the specified Azure Cosmos DB database. \
             partitionKeyPath is a path such as /id, /tenant or /category. \
             throughput optionally provisions dedicated manual RU/s (at least 400).",
            schema!(object {
                required: { "database": string, "container": string, "partitionKeyPath": string },
                optional: { "throughput": integer }
            }),
        ),
    ]
}

/// Result of `list_containers`.
#[derive(Debug, Serialize)]
pub struct ListContainersResult {
    pub account: String,
    pub database: String,
    pub containers: Vec<String>,
}

/// Result of `read_container_metadata`.
#[derive(Debug, Serialize)]
pub struct ContainerMetadata {
    pub container_id: String,
    pub default_ttl: Option<i64>,
    pub indexing_policy: Option<JsonValue>,
    pub partition_key_definition: Option<JsonValue>,
    pub conflict_resolution_policy: Option<JsonValue>,
    pub unique_key_policy: Option<JsonValue>,
    pub throughput: ThroughputInfo,
}

/// Result of `create_container`.
#[derive(Debug, Serialize)]
pub struct CreateContainerResult {
    pub account: String,
    pub database: String,
    pub container: String,
    pub message: String,
}

/// Dispatch a container tool call.
pub async fn dispatch(
    session: &McpSession,
    cancel: &CancellationToken,
    name: &str,
    args: Map<String, JsonValue>,
) -> Result<JsonValue> {
    match name {
        LIST_CONTAINERS => to_result(&list_containers(session, cancel, parse_args(args)?).await?),
        READ_CONTAINER_METADATA => {
            to_result(&read_container_metadata(session, cancel, parse_args(args)?).await?)
        }
        CREATE_CONTAINER => to_result(&create_container(session, cancel, parse_args(args)?).await?),
        _ => Err(McpError::UnknownTool(name.to_string())),
    }
}

/// List every container in a database, draining all pages.
pub async fn list_containers(
    session: &McpSession,
    cancel: &CancellationToken,
    input: ListContainersInput,
) -> Result<ListContainersResult> {
    input.validate()?;
    let client = session.client(&input.connection)?;
    tracing::debug!(account = %input.connection.account, database = %input.database, "listing containers");

    let database = input.database.as_str();
    let containers = session
        .call(
            cancel,
            "listing containers",
            collect_pages(|continuation| client.query_containers(database, continuation)),
        )
        .await?;

    Ok(ListContainersResult {
        account: input.connection.account,
        containers: containers.into_iter().map(|c| c.id).collect(),
        database: input.database,
    })
}

/// Read a container's properties and classify its throughput.
///
/// Failing to read the container is an error; failing to read its throughput
/// is folded into [`ThroughputInfo`]. Cancellation aborts either step.
pub async fn read_container_metadata(
    session: &McpSession,
    cancel: &CancellationToken,
    input: ReadContainerMetadataInput,
) -> Result<ContainerMetadata> {
    input.validate()?;
    let client = session.client(&input.connection)?;
    tracing::debug!(
        account = %input.connection.account,
        database = %input.database,
        container = %input.container,
        "reading container metadata"
    );

    let properties = session
        .call(
            cancel,
            "reading container",
            client.read_container(&input.database, &input.container),
        )
        .await?;

    let outcome = session
        .call(cancel, "reading throughput", async {
            Ok::<_, BackendError>(client.read_throughput(&input.database, &input.container).await)
        })
        .await?;
    if let Err(err) = &outcome {
        tracing::debug!(error = %err, "throughput read failed, classifying");
    }

    Ok(ContainerMetadata {
        container_id: properties.id,
        default_ttl: properties.default_ttl,
        indexing_policy: properties.indexing_policy,
        partition_key_definition: properties.partition_key,
        conflict_resolution_policy: properties.conflict_resolution_policy,
        unique_key_policy: properties.unique_key_policy,
        throughput: classify(outcome),
    })
}

/// Create a container with a single-path partition key.
pub async fn create_container(
    session: &McpSession,
    cancel: &CancellationToken,
    input: CreateContainerInput,
) -> Result<CreateContainerResult> {
    input.validate()?;
    let client = session.client(&input.connection)?;
    tracing::debug!(
        account = %input.connection.account,
        database = %input.database,
        container = %input.container,
        throughput = ?input.throughput,
        "creating container"
    );

    let definition = NewContainer {
        id: input.container.clone(),
        partition_key_path: input.partition_key_path.clone(),
    };
    session
        .call(
            cancel,
            "creating container",
            client.create_container(&input.database, &definition, input.throughput),
        )
        .await
        .map_err(|e| e.conflict_as_exists("container", &input.container))?;

    Ok(CreateContainerResult {
        message: format!(
            "Container '{}' created successfully in database '{}'",
            input.container, input.database
        ),
        account: input.connection.account,
        database: input.database,
        container: input.container,
    })
}
