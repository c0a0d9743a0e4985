// # Memory Document Store
//
// In-memory implementation of DocumentStore.
//
// ## Purpose
//
// Provides a simple, fast store that doesn't persist across restarts.
// Useful for testing, demos, and embedding the audit core in a process
// that supplies its own durable store for primary data.
//
// ## Crash Behavior
//
// - All records (primary and audit) are lost on restart/crash
// - Updates after a restart find no baseline and are not logged

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use super::{Collections, find_in, insert_into, update_in};
use crate::context::RequestContext;
use crate::error::Result;
use crate::model::DocumentId;
use crate::traits::document_store::{DocumentStore, Filter, Record};

/// In-memory document store
///
/// All collections live in a HashMap protected by a RwLock. Clones share
/// the same data.
///
/// # Example
///
/// ```rust,no_run
/// use docaudit_core::{DocumentStore, Filter, MemoryDocumentStore, RequestContext};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let store = MemoryDocumentStore::new();
///     let ctx = RequestContext::new();
///
///     let mut record = serde_json::Map::new();
///     record.insert("name".into(), "Alice".into());
///     let id = store.insert_one(&ctx, "users", record).await?;
///
///     let found = store.find_one(&ctx, "users", &Filter::by_id(&id)).await?;
///     assert_eq!(found["name"], "Alice");
///
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone)]
pub struct MemoryDocumentStore {
    inner: Arc<RwLock<Collections>>,
}

impl MemoryDocumentStore {
    /// Create a new empty memory store
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Number of records in a collection
    pub async fn len(&self, collection: &str) -> usize {
        self.inner
            .read()
            .await
            .get(collection)
            .map_or(0, |records| records.len())
    }

    /// Check if every collection is empty
    pub async fn is_empty(&self) -> bool {
        self.inner
            .read()
            .await
            .values()
            .all(|records| records.is_empty())
    }

    /// All records of a collection, ordered by id
    pub async fn records(&self, collection: &str) -> Vec<Record> {
        self.inner
            .read()
            .await
            .get(collection)
            .map(|records| records.values().cloned().collect())
            .unwrap_or_default()
    }

    /// Clear all collections
    pub async fn clear(&self) {
        self.inner.write().await.clear();
    }
}

impl Default for MemoryDocumentStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn find_one(
        &self,
        ctx: &RequestContext,
        collection: &str,
        filter: &Filter,
    ) -> Result<Record> {
        ctx.check()?;
        let guard = self.inner.read().await;
        find_in(&guard, collection, filter)
    }

    async fn insert_one(
        &self,
        ctx: &RequestContext,
        collection: &str,
        record: Record,
    ) -> Result<DocumentId> {
        ctx.check()?;
        let mut guard = self.inner.write().await;
        insert_into(&mut guard, collection, record)
    }

    async fn update_by_id(
        &self,
        ctx: &RequestContext,
        collection: &str,
        id: &DocumentId,
        changes: Record,
    ) -> Result<()> {
        ctx.check()?;
        let mut guard = self.inner.write().await;
        update_in(&mut guard, collection, id, changes)
    }
}
