//! Paged reads.
//!
//! Listing databases, listing containers and running queries all come back
//! one page at a time. [`collect_pages`] drains such a read into one list.

use std::future::Future;

use crate::backend::{BackendResult, Page};

/// Fetch pages until the backend stops returning a continuation.
///
/// Items keep arrival order. Any page failure aborts the read and discards
/// what was collected; a retry must start again from the first page.
pub async fn collect_pages<T, F, Fut>(mut fetch: F) -> BackendResult<Vec<T>>
where
    F: FnMut(Option<String>) -> Fut,
    Fut: Future<Output = BackendResult<Page<T>>>,
{
    let mut items = Vec::new();
    let mut continuation = None;

    loop {
        let page = fetch(continuation.take()).await?;
        items.extend(page.items);
        match page.continuation {
            Some(token) if !token.is_empty() => continuation = Some(token),
            _ => return Ok(items),
        }
    }
}
