// # Document Store Trait
//
// Defines the narrow read/write contract the audit core needs from a
// document database.
//
// ## Purpose
//
// The hook dispatcher persists two kinds of audit records:
// - one live meta record per tracked document (baseline snapshot)
// - one append-only log record per update (change set)
//
// It only ever needs three operations for that: find one record by filter,
// insert one record, and merge fields into one record by id.
//
// ## Implementations
//
// - In-memory: `MemoryDocumentStore`
// - File-backed JSON: `FileDocumentStore`
// - Anything else (a real database driver) lives outside this crate
//
// ## Usage
//
// ```rust,ignore
// use docaudit_core::{DocumentStore, Filter, RequestContext};
//
// let ctx = RequestContext::new();
// let id = store.insert_one(&ctx, "users", record).await?;
// let found = store.find_one(&ctx, "users", &Filter::by_id(&id)).await?;
// store.update_by_id(&ctx, "users", &id, changes).await?;
// ```

use async_trait::async_trait;
use serde_json::Value;

use crate::context::RequestContext;
use crate::error::Result;
use crate::model::DocumentId;

/// Key under which every stored record carries its identifier
pub const DOCUMENT_ID_KEY: &str = "_id";

/// A stored document: top-level field name to JSON value
pub type Record = serde_json::Map<String, Value>;

/// Conjunction of dotted-path equality conditions
///
/// `Filter::eq("document_current_state._id", "ab12...")` matches records whose
/// nested `document_current_state` object has an `_id` equal to that string.
/// An empty filter matches every record.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    conditions: Vec<(String, Value)>,
}

impl Filter {
    /// Filter that matches everything
    pub fn new() -> Self {
        Self::default()
    }

    /// Single equality condition
    pub fn eq(path: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new().and(path, value)
    }

    /// Match on the record identifier
    pub fn by_id(id: &DocumentId) -> Self {
        Self::eq(DOCUMENT_ID_KEY, id.to_hex())
    }

    /// Add another equality condition
    pub fn and(mut self, path: impl Into<String>, value: impl Into<Value>) -> Self {
        self.conditions.push((path.into(), value.into()));
        self
    }

    /// Conditions in insertion order
    pub fn conditions(&self) -> &[(String, Value)] {
        &self.conditions
    }

    /// Whether this filter has no conditions
    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    /// The `_id` condition, if the filter pins one
    pub fn document_id(&self) -> Option<DocumentId> {
        self.conditions
            .iter()
            .find(|(path, _)| path == DOCUMENT_ID_KEY)
            .and_then(|(_, value)| value.as_str())
            .and_then(|hex| DocumentId::parse_hex(hex).ok())
    }

    /// Whether `record` satisfies every condition
    pub fn matches(&self, record: &Record) -> bool {
        self.conditions
            .iter()
            .all(|(path, expected)| lookup(record, path) == Some(expected))
    }
}

/// Resolve a dotted path inside a record
fn lookup<'a>(record: &'a Record, path: &str) -> Option<&'a Value> {
    let mut segments = path.split('.');
    let mut current = record.get(segments.next()?)?;
    for segment in segments {
        current = current.as_object()?.get(segment)?;
    }
    Some(current)
}

/// Trait for document store adapters
///
/// Implementations must be thread-safe and usable across async tasks. They
/// should honor the context's cancellation signal by failing with
/// [`Error::Cancelled`](crate::Error::Cancelled) before doing any work.
///
/// # Errors
///
/// - [`Error::NotFound`](crate::Error::NotFound) when `find_one` matches
///   nothing or `update_by_id` targets a missing record
/// - [`Error::Store`](crate::Error::Store) for adapter I/O failures
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Return the first record in `collection` that matches `filter`
    async fn find_one(
        &self,
        ctx: &RequestContext,
        collection: &str,
        filter: &Filter,
    ) -> Result<Record>;

    /// Insert a record and return its identifier
    ///
    /// A valid hex `_id` already present in `record` is kept; otherwise a
    /// fresh identifier is generated and stored under `_id`.
    async fn insert_one(
        &self,
        ctx: &RequestContext,
        collection: &str,
        record: Record,
    ) -> Result<DocumentId>;

    /// Merge `changes` into the record with the given id (`$set` semantics)
    async fn update_by_id(
        &self,
        ctx: &RequestContext,
        collection: &str,
        id: &DocumentId,
        changes: Record,
    ) -> Result<()>;
}

/// Take the record's own `_id`, or generate and store a new one
pub(crate) fn assign_id(record: &mut Record) -> DocumentId {
    let existing = record
        .get(DOCUMENT_ID_KEY)
        .and_then(Value::as_str)
        .and_then(|hex| DocumentId::parse_hex(hex).ok())
        .filter(|id| !id.is_nil());

    match existing {
        Some(id) => id,
        None => {
            let id = DocumentId::new();
            record.insert(DOCUMENT_ID_KEY.to_string(), Value::String(id.to_hex()));
            id
        }
    }
}
