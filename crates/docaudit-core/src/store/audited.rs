//! Audited write path
//!
//! Thin adapter that brackets every insert and update with the save hooks.
//! The hooks are invoked exactly once per write and never change its
//! outcome: a failed primary write returns its error without `post_save`,
//! and a failed audit side effect is invisible to the caller.

use std::sync::Arc;

use crate::context::RequestContext;
use crate::error::{Error, Result};
use crate::hooks::{SaveEvent, SaveHook};
use crate::model::{Document, DocumentId, Model};
use crate::traits::{DOCUMENT_ID_KEY, DocumentStore, Filter, Record};

/// Document store wrapper that runs save hooks around writes
///
/// # Example
///
/// ```rust,ignore
/// let store: Arc<dyn DocumentStore> = Arc::new(MemoryDocumentStore::new());
/// let (dispatcher, _events) = HookDispatcher::new(store.clone(), registry, AuditConfig::default())?;
/// let audited = AuditedStore::new(store, Arc::new(dispatcher));
///
/// let id = audited.insert(&ctx, "users", &user).await?;
/// audited.update(&ctx, "users", &Filter::by_id(&id), &user).await?;
/// ```
#[derive(Clone)]
pub struct AuditedStore {
    store: Arc<dyn DocumentStore>,
    hook: Arc<dyn SaveHook>,
}

impl AuditedStore {
    pub fn new(store: Arc<dyn DocumentStore>, hook: Arc<dyn SaveHook>) -> Self {
        Self { store, hook }
    }

    /// The wrapped store, for reads and unaudited writes
    pub fn inner(&self) -> &Arc<dyn DocumentStore> {
        &self.store
    }

    /// Insert `model` into `collection`
    ///
    /// Returns the store-assigned (or model-supplied) document id.
    pub async fn insert<M: Model>(
        &self,
        ctx: &RequestContext,
        collection: &str,
        model: &M,
    ) -> Result<DocumentId> {
        let event = SaveEvent::insert(collection);
        self.hook.pre_save(ctx, model, &event).await;

        let record = Document::to_record(model)?;
        let id = self.store.insert_one(ctx, collection, record).await?;

        self.hook
            .post_save(ctx, model, &event.with_document_id(id))
            .await;
        Ok(id)
    }

    /// Overwrite the fields of the first document matching `filter` with `model`
    ///
    /// The model's `_id` is never written; the matched document keeps its id.
    pub async fn update<M: Model>(
        &self,
        ctx: &RequestContext,
        collection: &str,
        filter: &Filter,
        model: &M,
    ) -> Result<DocumentId> {
        let event = SaveEvent::update(collection, filter);
        self.hook.pre_save(ctx, model, &event).await;

        let existing = self.store.find_one(ctx, collection, filter).await?;
        let id = record_id(&existing)?;

        let mut changes = Document::to_record(model)?;
        changes.remove(DOCUMENT_ID_KEY);
        self.store.update_by_id(ctx, collection, &id, changes).await?;

        self.hook
            .post_save(ctx, model, &event.with_document_id(id))
            .await;
        Ok(id)
    }
}

fn record_id(record: &Record) -> Result<DocumentId> {
    record
        .get(DOCUMENT_ID_KEY)
        .and_then(|v| v.as_str())
        .ok_or_else(|| Error::store("matched record has no _id"))
        .and_then(DocumentId::parse_hex)
}
