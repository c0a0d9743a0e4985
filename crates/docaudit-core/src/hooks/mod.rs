//! Save hook protocol
//!
//! Every insert and update that goes through the audited write path is
//! wrapped by two calls:
//!
//! - [`SaveHook::pre_save`] strictly before the physical write
//! - [`SaveHook::post_save`] strictly after the write succeeded, with the
//!   store-assigned or store-confirmed document id
//!
//! [`HookDispatcher`] is the default implementation. It delegates to a
//! model's own hook when [`Model::save_hook`](crate::Model::save_hook)
//! returns one, and otherwise performs audit logging for registered models.
//!
//! Hooks never return errors: audit logging is best-effort and must not
//! affect the primary write.

mod dispatcher;
mod locks;

pub use dispatcher::{AuditEvent, HookDispatcher};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::context::RequestContext;
use crate::model::{Document, DocumentId};
use crate::traits::Filter;

/// Kind of write a hook is wrapping
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    Insert,
    Update,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Insert => "insert",
            Operation::Update => "update",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything a hook learns about the write besides the document itself
#[derive(Debug, Clone, PartialEq)]
pub struct SaveEvent<'a> {
    /// Primary collection being written
    pub collection: &'a str,
    pub operation: Operation,
    /// Filter the update was issued with (`None` for inserts)
    pub filter: Option<&'a Filter>,
    /// Target document id; `None` in `pre_save` of an insert
    pub document_id: Option<DocumentId>,
}

impl<'a> SaveEvent<'a> {
    /// Event for an insert into `collection`
    pub fn insert(collection: &'a str) -> Self {
        Self {
            collection,
            operation: Operation::Insert,
            filter: None,
            document_id: None,
        }
    }

    /// Event for an update of the documents matching `filter`
    pub fn update(collection: &'a str, filter: &'a Filter) -> Self {
        Self {
            collection,
            operation: Operation::Update,
            filter: Some(filter),
            document_id: filter.document_id(),
        }
    }

    /// Same event with a known document id
    pub fn with_document_id(mut self, id: DocumentId) -> Self {
        self.document_id = Some(id);
        self
    }
}

/// Pre/post-save extension point
///
/// Implemented by [`HookDispatcher`] and by models that want to replace the
/// default audit behavior (see [`Model::save_hook`](crate::Model::save_hook)).
#[async_trait]
pub trait SaveHook: Send + Sync {
    /// Runs before the physical write
    async fn pre_save(&self, ctx: &RequestContext, doc: &dyn Document, event: &SaveEvent<'_>);

    /// Runs after the physical write succeeded
    async fn post_save(&self, ctx: &RequestContext, doc: &dyn Document, event: &SaveEvent<'_>);
}
