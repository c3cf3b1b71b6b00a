//! Integration tests for the MCP tools.
//!
//! Every tool is driven through the `ToolRegistry` against an in-memory
//! `CosmosClient` injected with a `ClientFactory`.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Map, Value as JsonValue};
use tokio_util::sync::CancellationToken;

use cosmosdb_mcp::backend::{
    BackendError, BackendResult, BatchOperationResult, ContainerProperties, DatabaseProperties,
    NewContainer, Page, PartitionKey, ThroughputProperties,
};
use cosmosdb_mcp::connection::{resolve, ConfigError, CredentialStrategy};
use cosmosdb_mcp::{
    ClientFactory, ConnectionConfig, CosmosClient, Document, McpError, McpSession, ToolRegistry,
};

// =============================================================================
// In-memory backend
// =============================================================================

#[derive(Default)]
struct MemoryContainer {
    partition_key_path: String,
    throughput: Option<u32>,
    /// (partition key, id) -> document text
    items: BTreeMap<(String, String), String>,
}

#[derive(Default)]
struct Store {
    databases: BTreeMap<String, BTreeMap<String, MemoryContainer>>,
}

struct MemoryClient {
    store: Mutex<Store>,
    calls: AtomicUsize,
    page_size: usize,
    throughput_unsupported: AtomicBool,
    stall_batches: AtomicBool,
}

impl MemoryClient {
    fn new(page_size: usize) -> Self {
        Self {
            store: Mutex::new(Store::default()),
            calls: AtomicUsize::new(0),
            page_size,
            throughput_unsupported: AtomicBool::new(false),
            stall_batches: AtomicBool::new(false),
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn record(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }

    fn item_count(&self, database: &str, container: &str) -> usize {
        let store = self.store.lock().unwrap();
        store.databases[database][container].items.len()
    }

    fn paginate<T: Clone>(&self, all: Vec<T>, continuation: Option<String>) -> BackendResult<Page<T>> {
        let start = match continuation {
            Some(token) => token
                .parse::<usize>()
                .map_err(|_| BackendError::new(Some(400), Some("BadRequest".into()), "bad continuation"))?,
            None => 0,
        };
        let end = (start + self.page_size).min(all.len());
        Ok(Page {
            items: all.get(start..end).map(<[T]>::to_vec).unwrap_or_default(),
            continuation: (end < all.len()).then(|| end.to_string()),
        })
    }
}

fn not_found() -> BackendError {
    BackendError::new(Some(404), Some("NotFound".into()), "Resource Not Found")
}

fn conflict() -> BackendError {
    BackendError::new(
        Some(409),
        Some("Conflict".into()),
        "Entity with the specified id already exists in the system.",
    )
}

#[async_trait]
impl CosmosClient for MemoryClient {
    async fn query_databases(&self, continuation: Option<String>) -> BackendResult<Page<DatabaseProperties>> {
        self.record();
        let all: Vec<DatabaseProperties> = {
            let store = self.store.lock().unwrap();
            store
                .databases
                .keys()
                .map(|id| DatabaseProperties { id: id.clone() })
                .collect()
        };
        self.paginate(all, continuation)
    }

    async fn create_database(&self, id: &str) -> BackendResult<()> {
        self.record();
        let mut store = self.store.lock().unwrap();
        if store.databases.contains_key(id) {
            return Err(conflict());
        }
        store.databases.insert(id.to_string(), BTreeMap::new());
        Ok(())
    }

    async fn query_containers(
        &self,
        database: &str,
        continuation: Option<String>,
    ) -> BackendResult<Page<ContainerProperties>> {
        self.record();
        let all: Vec<ContainerProperties> = {
            let store = self.store.lock().unwrap();
            let db = store.databases.get(database).ok_or_else(not_found)?;
            db.keys()
                .map(|id| ContainerProperties {
                    id: id.clone(),
                    ..Default::default()
                })
                .collect()
        };
        self.paginate(all, continuation)
    }

    async fn read_container(&self, database: &str, container: &str) -> BackendResult<ContainerProperties> {
        self.record();
        let store = self.store.lock().unwrap();
        let c = store
            .databases
            .get(database)
            .and_then(|db| db.get(container))
            .ok_or_else(not_found)?;
        Ok(ContainerProperties {
            id: container.to_string(),
            resource_id: Some("rid==".into()),
            default_ttl: None,
            indexing_policy: Some(json!({"indexingMode": "consistent", "automatic": true})),
            partition_key: Some(json!({"paths": [c.partition_key_path], "kind": "Hash"})),
            conflict_resolution_policy: Some(json!({"mode": "LastWriterWins"})),
            unique_key_policy: Some(json!({"uniqueKeys": []})),
        })
    }

    async fn read_throughput(&self, database: &str, container: &str) -> BackendResult<ThroughputProperties> {
        self.record();
        if self.throughput_unsupported.load(Ordering::SeqCst) {
            return Err(BackendError::new(Some(400), Some("BadRequest".into()), "offers not supported"));
        }
        let store = self.store.lock().unwrap();
        let c = store
            .databases
            .get(database)
            .and_then(|db| db.get(container))
            .ok_or_else(not_found)?;
        match c.throughput {
            Some(ru) => Ok(ThroughputProperties {
                manual: Some(ru),
                autoscale_max: None,
            }),
            None => Err(not_found()),
        }
    }

    async fn create_container(
        &self,
        database: &str,
        container: &NewContainer,
        throughput: Option<u32>,
    ) -> BackendResult<()> {
        self.record();
        let mut store = self.store.lock().unwrap();
        let db = store.databases.get_mut(database).ok_or_else(not_found)?;
        if db.contains_key(&container.id) {
            return Err(conflict());
        }
        db.insert(
            container.id.clone(),
            MemoryContainer {
                partition_key_path: container.partition_key_path.clone(),
                throughput,
                items: BTreeMap::new(),
            },
        );
        Ok(())
    }

    async fn create_item(
        &self,
        database: &str,
        container: &str,
        partition_key: &PartitionKey,
        document: &Document,
    ) -> BackendResult<()> {
        self.record();
        let id = document
            .id()
            .map_err(|e| BackendError::new(Some(400), Some("BadRequest".into()), e.to_string()))?;
        let mut store = self.store.lock().unwrap();
        let c = store
            .databases
            .get_mut(database)
            .and_then(|db| db.get_mut(container))
            .ok_or_else(not_found)?;
        let key = (partition_key.value().to_string(), id);
        if c.items.contains_key(&key) {
            return Err(conflict());
        }
        c.items.insert(key, document.as_str().to_string());
        Ok(())
    }

    async fn read_item(
        &self,
        database: &str,
        container: &str,
        partition_key: &PartitionKey,
        id: &str,
    ) -> BackendResult<String> {
        self.record();
        let store = self.store.lock().unwrap();
        store
            .databases
            .get(database)
            .and_then(|db| db.get(container))
            .and_then(|c| c.items.get(&(partition_key.value().to_string(), id.to_string())))
            .cloned()
            .ok_or_else(not_found)
    }

    async fn query_items(
        &self,
        database: &str,
        container: &str,
        _query: &str,
        partition_key: Option<&PartitionKey>,
        continuation: Option<String>,
    ) -> BackendResult<Page<String>> {
        self.record();
        let all: Vec<String> = {
            let store = self.store.lock().unwrap();
            let c = store
                .databases
                .get(database)
                .and_then(|db| db.get(container))
                .ok_or_else(not_found)?;
            c.items
                .iter()
                .filter(|((pk, _), _)| partition_key.map_or(true, |key| key.value() == pk))
                .map(|(_, text)| text.clone())
                .collect()
        };
        self.paginate(all, continuation)
    }

    async fn execute_batch(
        &self,
        database: &str,
        container: &str,
        partition_key: &PartitionKey,
        documents: &[Document],
    ) -> BackendResult<Vec<BatchOperationResult>> {
        self.record();
        if self.stall_batches.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }

        let mut store = self.store.lock().unwrap();
        let c = store
            .databases
            .get_mut(database)
            .and_then(|db| db.get_mut(container))
            .ok_or_else(not_found)?;

        let pk = partition_key.value().to_string();
        let mut seen = Vec::new();
        let mut statuses = Vec::new();
        for doc in documents {
            let id = doc.id().unwrap_or_default();
            let duplicate = c.items.contains_key(&(pk.clone(), id.clone())) || seen.contains(&id);
            statuses.push(if duplicate { 409 } else { 201 });
            seen.push(id);
        }

        if statuses.iter().any(|s| *s >= 400) {
            // Rolled back: the first failure keeps its status, the rest are dependents.
            let failed_at = statuses.iter().position(|s| *s >= 400).unwrap_or(0);
            return Ok((0..documents.len())
                .map(|i| BatchOperationResult {
                    status_code: if i == failed_at { statuses[i] } else { 424 },
                })
                .collect());
        }

        for (doc, id) in documents.iter().zip(seen) {
            c.items.insert((pk.clone(), id), doc.as_str().to_string());
        }
        Ok(statuses
            .into_iter()
            .map(|status_code| BatchOperationResult { status_code })
            .collect())
    }
}

struct MemoryFactory {
    client: Arc<MemoryClient>,
}

impl ClientFactory for MemoryFactory {
    fn connect(&self, config: &ConnectionConfig) -> Result<Arc<dyn CosmosClient>, ConfigError> {
        config.validate()?;
        Ok(self.client.clone())
    }
}

// =============================================================================
// Helpers
// =============================================================================

struct Fixture {
    client: Arc<MemoryClient>,
    session: McpSession,
    registry: ToolRegistry,
}

/// Create a fixture with a small page size so listings span several pages.
fn fixture() -> Fixture {
    let client = Arc::new(MemoryClient::new(2));
    let factory = MemoryFactory {
        client: client.clone(),
    };
    Fixture {
        client,
        session: McpSession::new(Arc::new(factory)),
        registry: ToolRegistry::new(),
    }
}

fn args(value: JsonValue) -> Map<String, JsonValue> {
    match value {
        JsonValue::Object(m) => m,
        _ => Map::new(),
    }
}

/// Helper to dispatch a tool call.
async fn call_tool(fx: &Fixture, name: &str, arguments: JsonValue) -> JsonValue {
    fx.registry
        .dispatch(&fx.session, &CancellationToken::new(), name, args(arguments))
        .await
        .unwrap_or_else(|e| panic!("Tool {} failed: {}", name, e))
}

/// Helper to dispatch a tool call and expect an error.
async fn call_tool_err(fx: &Fixture, name: &str, arguments: JsonValue) -> McpError {
    match fx
        .registry
        .dispatch(&fx.session, &CancellationToken::new(), name, args(arguments))
        .await
    {
        Ok(value) => panic!("Expected tool {} to fail, got {}", name, value),
        Err(e) => e,
    }
}

/// Create database "db" with container "c" partitioned on /pk.
async fn with_container(fx: &Fixture) {
    call_tool(fx, "create_database", json!({"account": "acct", "database": "db"})).await;
    call_tool(
        fx,
        "create_container",
        json!({"account": "acct", "database": "db", "container": "c", "partitionKeyPath": "/pk"}),
    )
    .await;
}

fn batch_items(prefix: &str, n: usize) -> Vec<String> {
    (0..n)
        .map(|i| json!({"id": format!("{}{}", prefix, i), "pk": "p1", "n": i}).to_string())
        .collect()
}

// =============================================================================
// Database Tools
// =============================================================================

#[tokio::test]
async fn test_list_databases_drains_pages() {
    let fx = fixture();
    for name in ["a", "b", "c", "d", "e"] {
        call_tool(&fx, "create_database", json!({"account": "acct", "database": name})).await;
    }

    let result = call_tool(&fx, "list_databases", json!({"account": "acct"})).await;
    assert_eq!(result["account"], "acct");
    assert_eq!(result["databases"], json!(["a", "b", "c", "d", "e"]));
}

#[tokio::test]
async fn test_create_database_message_and_conflict() {
    let fx = fixture();
    let result = call_tool(&fx, "create_database", json!({"account": "acct", "database": "orders"})).await;
    assert_eq!(result["message"], "Database 'orders' created successfully");
    assert_eq!(result["database"], "orders");

    let err = call_tool_err(&fx, "create_database", json!({"account": "acct", "database": "orders"})).await;
    assert_eq!(err.to_string(), "database 'orders' already exists");
}

// =============================================================================
// Container Tools
// =============================================================================

#[tokio::test]
async fn test_create_and_list_containers() {
    let fx = fixture();
    with_container(&fx).await;
    for name in ["d", "e"] {
        let result = call_tool(
            &fx,
            "create_container",
            json!({"account": "acct", "database": "db", "container": name, "partitionKeyPath": "/id"}),
        )
        .await;
        assert_eq!(
            result["message"],
            format!("Container '{}' created successfully in database 'db'", name)
        );
    }

    let result = call_tool(&fx, "list_containers", json!({"account": "acct", "database": "db"})).await;
    assert_eq!(result["containers"], json!(["c", "d", "e"]));

    let err = call_tool_err(
        &fx,
        "create_container",
        json!({"account": "acct", "database": "db", "container": "c", "partitionKeyPath": "/pk"}),
    )
    .await;
    assert_eq!(err.to_string(), "container 'c' already exists");
}

#[tokio::test]
async fn test_list_containers_missing_database() {
    let fx = fixture();
    let err = call_tool_err(&fx, "list_containers", json!({"account": "acct", "database": "nope"})).await;
    assert_eq!(err.status(), Some(404));
    assert!(err.to_string().starts_with("error listing containers: "));
}

#[tokio::test]
async fn test_metadata_manual_throughput() {
    let fx = fixture();
    call_tool(&fx, "create_database", json!({"account": "acct", "database": "db"})).await;
    call_tool(
        &fx,
        "create_container",
        json!({"account": "acct", "database": "db", "container": "hot", "partitionKeyPath": "/pk", "throughput": 400}),
    )
    .await;

    let result = call_tool(
        &fx,
        "read_container_metadata",
        json!({"account": "acct", "database": "db", "container": "hot"}),
    )
    .await;
    assert_eq!(result["container_id"], "hot");
    assert_eq!(result["partition_key_definition"]["paths"], json!(["/pk"]));
    assert_eq!(result["throughput"], json!({"type": "manual", "ru_per_second": 400}));
}

#[tokio::test]
async fn test_metadata_shared_throughput() {
    let fx = fixture();
    with_container(&fx).await;

    let result = call_tool(
        &fx,
        "read_container_metadata",
        json!({"account": "acct", "database": "db", "container": "c"}),
    )
    .await;
    let throughput = &result["throughput"];
    assert_eq!(throughput["type"], "shared");
    assert_eq!(throughput["message"], "Throughput is provisioned at database level");
    assert!(throughput.get("ru_per_second").is_none());
}

#[tokio::test]
async fn test_metadata_unsupported_throughput() {
    let fx = fixture();
    with_container(&fx).await;
    fx.client.throughput_unsupported.store(true, Ordering::SeqCst);

    let result = call_tool(
        &fx,
        "read_container_metadata",
        json!({"account": "acct", "database": "db", "container": "c"}),
    )
    .await;
    assert_eq!(result["throughput"]["type"], "unknown");
    assert!(result["throughput"].get("message").is_some());
    assert!(result["throughput"].get("ru_per_second").is_none());
}

#[tokio::test]
async fn test_metadata_missing_container_fails() {
    let fx = fixture();
    with_container(&fx).await;
    let err = call_tool_err(
        &fx,
        "read_container_metadata",
        json!({"account": "acct", "database": "db", "container": "gone"}),
    )
    .await;
    assert!(err.to_string().starts_with("error reading container: (404 NotFound)"));
}

// =============================================================================
// Item Tools
// =============================================================================

#[tokio::test]
async fn test_add_then_read_item() {
    let fx = fixture();
    with_container(&fx).await;
    let item = json!({"id": "user2", "pk": "user2", "name": "Ana", "tags": ["a", "b"], "age": 31});

    let result = call_tool(
        &fx,
        "add_item_to_container",
        json!({"account": "acct", "database": "db", "container": "c", "partitionKey": "user2", "item": item.to_string()}),
    )
    .await;
    assert_eq!(result["message"], "Item added successfully to container 'c' in database 'db'");

    let result = call_tool(
        &fx,
        "read_item",
        json!({"account": "acct", "database": "db", "container": "c", "itemID": "user2", "partitionKey": "user2"}),
    )
    .await;
    let stored: JsonValue = serde_json::from_str(result["item"].as_str().unwrap()).unwrap();
    assert_eq!(stored, item);
}

#[tokio::test]
async fn test_read_missing_item() {
    let fx = fixture();
    with_container(&fx).await;
    let err = call_tool_err(
        &fx,
        "read_item",
        json!({"account": "acct", "database": "db", "container": "c", "itemID": "ghost", "partitionKey": "p"}),
    )
    .await;
    assert_eq!(err.to_string(), "error reading item: (404 NotFound) Resource Not Found");
}

#[tokio::test]
async fn test_add_item_without_id_is_rejected_locally() {
    let fx = fixture();
    with_container(&fx).await;
    let before = fx.client.calls();

    let err = call_tool_err(
        &fx,
        "add_item_to_container",
        json!({"account": "acct", "database": "db", "container": "c", "partitionKey": "p", "item": "{\"name\":\"x\"}"}),
    )
    .await;
    assert_eq!(
        err.to_string(),
        "error adding item to container: item is missing a non-empty string 'id' field"
    );
    assert_eq!(fx.client.calls(), before);
}

#[tokio::test]
async fn test_query_scoped_to_partition() {
    let fx = fixture();
    with_container(&fx).await;
    for (id, pk) in [("u1", "alpha"), ("u2", "beta"), ("u3", "beta"), ("u4", "gamma")] {
        call_tool(
            &fx,
            "add_item_to_container",
            json!({
                "account": "acct", "database": "db", "container": "c", "partitionKey": pk,
                "item": json!({"id": id, "pk": pk}).to_string()
            }),
        )
        .await;
    }

    let result = call_tool(
        &fx,
        "execute_query",
        json!({"account": "acct", "database": "db", "container": "c", "query": "SELECT * FROM c", "partitionKey": "alpha"}),
    )
    .await;
    let results = result["results"].as_array().unwrap();
    assert_eq!(results.len(), 1);
    let doc: JsonValue = serde_json::from_str(results[0].as_str().unwrap()).unwrap();
    assert_eq!(doc, json!({"id": "u1", "pk": "alpha"}));

    // Cross-partition: four items over two pages of two.
    let result = call_tool(
        &fx,
        "execute_query",
        json!({"account": "acct", "database": "db", "container": "c", "query": "SELECT * FROM c"}),
    )
    .await;
    assert_eq!(result["results"].as_array().unwrap().len(), 4);
}

// =============================================================================
// Batch
// =============================================================================

#[tokio::test]
async fn test_batch_size_bounds() {
    let fx = fixture();
    with_container(&fx).await;
    let before = fx.client.calls();

    let base = json!({"account": "acct", "database": "db", "container": "c", "partitionKey": "p1"});
    let mut empty = base.clone();
    empty["items"] = json!([]);
    let err = call_tool_err(&fx, "batch_create_items", empty).await;
    assert_eq!(err.to_string(), "items array is empty");

    let mut too_many = base.clone();
    too_many["items"] = json!(batch_items("x", 101));
    let err = call_tool_err(&fx, "batch_create_items", too_many).await;
    assert_eq!(err.to_string(), "batch exceeds maximum of 100 items");
    assert_eq!(fx.client.calls(), before);

    let mut full = base;
    full["items"] = json!(batch_items("x", 100));
    let result = call_tool(&fx, "batch_create_items", full).await;
    assert_eq!(result["itemsCreated"], 100);
    assert_eq!(result["message"], "Successfully created 100 items in container 'c'");
    assert_eq!(fx.client.item_count("db", "c"), 100);
}

#[tokio::test]
async fn test_batch_duplicate_persists_nothing() {
    let fx = fixture();
    with_container(&fx).await;
    call_tool(
        &fx,
        "add_item_to_container",
        json!({"account": "acct", "database": "db", "container": "c", "partitionKey": "p1",
               "item": json!({"id": "dup1", "pk": "p1"}).to_string()}),
    )
    .await;

    let err = call_tool_err(
        &fx,
        "batch_create_items",
        json!({"account": "acct", "database": "db", "container": "c", "partitionKey": "p1",
               "items": batch_items("dup", 3)}),
    )
    .await;
    assert!(matches!(err, McpError::Batch(_)));
    assert!(err.to_string().starts_with("batch failed: "));
    assert!(err.to_string().contains("dup1"));

    for id in ["dup0", "dup2"] {
        let err = call_tool_err(
            &fx,
            "read_item",
            json!({"account": "acct", "database": "db", "container": "c", "itemID": id, "partitionKey": "p1"}),
        )
        .await;
        assert_eq!(err.status(), Some(404));
    }
    assert_eq!(fx.client.item_count("db", "c"), 1);
}

#[tokio::test]
async fn test_batch_malformed_item_makes_no_backend_call() {
    let fx = fixture();
    with_container(&fx).await;
    let before = fx.client.calls();

    let mut items = batch_items("m", 3);
    items[2] = "[1, 2]".to_string();
    let err = call_tool_err(
        &fx,
        "batch_create_items",
        json!({"account": "acct", "database": "db", "container": "c", "partitionKey": "p1", "items": items}),
    )
    .await;
    assert_eq!(err.to_string(), "batch failed: item 2: item must be a JSON object");
    assert_eq!(fx.client.calls(), before);
}

#[tokio::test]
async fn test_cancelled_batch_leaves_nothing() {
    let fx = fixture();
    with_container(&fx).await;
    fx.client.stall_batches.store(true, Ordering::SeqCst);

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        trigger.cancel();
    });

    let outcome = fx
        .registry
        .dispatch(
            &fx.session,
            &cancel,
            "batch_create_items",
            args(json!({"account": "acct", "database": "db", "container": "c", "partitionKey": "p1",
                        "items": batch_items("z", 5)})),
        )
        .await;
    let err = outcome.unwrap_err();
    assert!(matches!(err, McpError::Cancelled { .. }));
    assert_eq!(err.to_string(), "executing batch cancelled");
    assert_eq!(fx.client.item_count("db", "c"), 0);
}

#[tokio::test]
async fn test_request_deadline() {
    let client = Arc::new(MemoryClient::new(10));
    let session = McpSession::new(Arc::new(MemoryFactory {
        client: client.clone(),
    }))
    .with_request_timeout(Duration::from_millis(30));
    let registry = ToolRegistry::new();
    let cancel = CancellationToken::new();

    registry
        .dispatch(&session, &cancel, "create_database", args(json!({"account": "acct", "database": "db"})))
        .await
        .unwrap();
    registry
        .dispatch(
            &session,
            &cancel,
            "create_container",
            args(json!({"account": "acct", "database": "db", "container": "c", "partitionKeyPath": "/pk"})),
        )
        .await
        .unwrap();
    client.stall_batches.store(true, Ordering::SeqCst);

    let err = registry
        .dispatch(
            &session,
            &cancel,
            "batch_create_items",
            args(json!({"account": "acct", "database": "db", "container": "c", "partitionKey": "p1",
                        "items": batch_items("t", 2)})),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, McpError::Timeout { .. }));
}

// =============================================================================
// Validation and resolution
// =============================================================================

#[tokio::test]
async fn test_validation_never_reaches_backend() {
    let fx = fixture();
    let cases = [
        ("list_databases", json!({}), "account name is required"),
        ("create_database", json!({"account": "acct"}), "database name missing"),
        ("list_containers", json!({"account": "acct"}), "database name missing"),
        ("read_container_metadata", json!({"account": "acct", "database": "d"}), "container name missing"),
        (
            "create_container",
            json!({"account": "acct", "database": "d", "container": "c"}),
            "partition key path missing",
        ),
        (
            "add_item_to_container",
            json!({"account": "acct", "database": "d", "container": "c", "partitionKey": "p"}),
            "item JSON missing",
        ),
        (
            "read_item",
            json!({"account": "acct", "database": "d", "container": "c", "itemID": "i"}),
            "partition key value missing",
        ),
        ("execute_query", json!({"account": "acct", "database": "d", "container": "c"}), "query string missing"),
        (
            "batch_create_items",
            json!({"account": "acct", "database": "d", "container": "c"}),
            "partition key value missing",
        ),
    ];

    for (tool, arguments, expected) in cases {
        let err = call_tool_err(&fx, tool, arguments).await;
        assert_eq!(err.to_string(), expected, "tool {}", tool);
    }
    assert_eq!(fx.client.calls(), 0);
}

#[tokio::test]
async fn test_malformed_account_never_reaches_backend() {
    let fx = fixture();
    for account in ["evil.example/x", "evil.example#", "user@evil.example:443/?", "Upper"] {
        let err = call_tool_err(&fx, "list_databases", json!({ "account": account })).await;
        assert!(
            matches!(err, McpError::Config(ConfigError::InvalidAccount(ref name)) if name == account),
            "account {:?} gave {:?}",
            account,
            err
        );
        assert_eq!(err.rpc_code(), -32602);
    }
    assert_eq!(fx.client.calls(), 0);
}

#[tokio::test]
async fn test_emulator_mode_needs_no_account() {
    let fx = fixture();
    let result = call_tool(&fx, "list_databases", json!({"useEmulator": true})).await;
    assert_eq!(result["databases"], json!([]));
}

#[tokio::test]
async fn test_unknown_tool_and_bad_argument_types() {
    let fx = fixture();
    let err = call_tool_err(&fx, "drop_database", json!({})).await;
    assert!(matches!(err, McpError::UnknownTool(_)));

    let err = call_tool_err(&fx, "create_database", json!({"account": "acct", "database": 7})).await;
    assert!(matches!(err, McpError::InvalidArg { .. }));
}

#[test]
fn test_resolution_modes() {
    let emulator = resolve(&ConnectionConfig::emulator(), Some("ignored")).unwrap();
    assert_eq!(emulator.endpoint, "http://localhost:8081");
    assert_eq!(emulator.credential, CredentialStrategy::EmulatorKey);
    assert!(emulator.accept_invalid_certs);

    let service = resolve(&ConnectionConfig::account("acct"), None).unwrap();
    assert_eq!(service.endpoint, "https://acct.documents.azure.com:443/");
    assert_eq!(service.credential, CredentialStrategy::AmbientIdentity);
    assert!(!service.accept_invalid_certs);

    let keyed = resolve(&ConnectionConfig::account("acct"), Some("a2V5")).unwrap();
    assert_eq!(keyed.credential, CredentialStrategy::AccountKey("a2V5".into()));
}
