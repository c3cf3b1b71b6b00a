//! Bounded, all-or-nothing item creation.
//!
//! A batch is checked locally first (size bound, every item parseable with an
//! `id`) and only then submitted as one atomic backend batch scoped to a single
//! partition key. Either every item is created or none is.

use tokio_util::sync::CancellationToken;

use crate::backend::{BatchOperationResult, CosmosClient, PartitionKey};
use crate::document::Document;
use crate::error::{McpError, Result};
use crate::session::McpSession;
use crate::validate::check_batch_size;

/// Largest batch the backend executes atomically.
pub const MAX_BATCH_ITEMS: usize = 100;

/// Status the backend reports for operations skipped after another one failed.
const FAILED_DEPENDENCY: u16 = 424;

/// Check the size bound and parse every item, failing on the first bad one.
pub fn prepare(items: &[String]) -> Result<Vec<Document>> {
    check_batch_size(items.len())?;
    items
        .iter()
        .enumerate()
        .map(|(i, text)| {
            Document::with_id(text.as_str()).map_err(|e| McpError::Batch(format!("item {}: {}", i, e)))
        })
        .collect()
}

/// Create every item atomically and return how many were created.
pub async fn create_all(
    session: &McpSession,
    cancel: &CancellationToken,
    client: &dyn CosmosClient,
    database: &str,
    container: &str,
    partition_key: &PartitionKey,
    items: &[String],
) -> Result<usize> {
    let documents = prepare(items)?;

    tracing::debug!(
        database,
        container,
        count = documents.len(),
        "submitting transactional batch"
    );

    let results = session
        .call(
            cancel,
            "executing batch",
            client.execute_batch(database, container, partition_key, &documents),
        )
        .await
        .map_err(|e| match e {
            McpError::Backend { source, .. } => McpError::Batch(source.to_string()),
            other => other,
        })?;

    check_results(&documents, &results)?;
    Ok(documents.len())
}

/// Turn per-operation statuses into one aggregate outcome.
fn check_results(documents: &[Document], results: &[BatchOperationResult]) -> Result<()> {
    if results.len() != documents.len() {
        return Err(McpError::Batch(format!(
            "expected {} operation results, got {}",
            documents.len(),
            results.len()
        )));
    }

    let failed: Vec<(usize, u16)> = results
        .iter()
        .enumerate()
        .filter(|(_, r)| r.status_code >= 400)
        .map(|(i, r)| (i, r.status_code))
        .collect();

    // The root cause is the first failure that is not a dependent rollback.
    let culprit = failed
        .iter()
        .find(|(_, status)| *status != FAILED_DEPENDENCY)
        .or_else(|| failed.first());

    match culprit {
        None => Ok(()),
        Some(&(index, status)) => {
            let id = documents[index].id().unwrap_or_default();
            Err(McpError::Batch(format!(
                "operation {} (id '{}') returned status {}; no items were created",
                index, id, status
            )))
        }
    }
}
