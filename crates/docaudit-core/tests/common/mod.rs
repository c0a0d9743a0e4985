//! Test doubles and common utilities for audit contract tests
//!
//! This module provides a counting document store with failure injection,
//! sample models and a recording save hook.

#![allow(dead_code)]

use docaudit_core::{
    AuditConfig, AuditEvent, AuditMarker, AuditedStore, Document, DocumentId, DocumentStore,
    Error, FieldTag, Filter, HookDispatcher, MemoryDocumentStore, Model, ModelRegistry, Record,
    RequestContext, Result, SaveEvent, SaveHook,
};
use serde::Serialize;
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

/// A DocumentStore backed by memory that counts calls and can fail on demand
pub struct MockDocumentStore {
    inner: MemoryDocumentStore,
    /// Call counter for find_one()
    find_call_count: Arc<AtomicUsize>,
    /// Call counter for insert_one()
    insert_call_count: Arc<AtomicUsize>,
    /// Call counter for update_by_id()
    update_call_count: Arc<AtomicUsize>,
    /// Collection of every successful write, in order
    writes: Arc<Mutex<Vec<String>>>,
    /// Collections whose writes fail
    failing: Arc<Mutex<HashSet<String>>>,
}

impl MockDocumentStore {
    pub fn new() -> Self {
        Self {
            inner: MemoryDocumentStore::new(),
            find_call_count: Arc::new(AtomicUsize::new(0)),
            insert_call_count: Arc::new(AtomicUsize::new(0)),
            update_call_count: Arc::new(AtomicUsize::new(0)),
            writes: Arc::new(Mutex::new(Vec::new())),
            failing: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    /// Get the number of times find_one() was called
    pub fn find_call_count(&self) -> usize {
        self.find_call_count.load(Ordering::SeqCst)
    }

    /// Get the number of times insert_one() was called
    pub fn insert_call_count(&self) -> usize {
        self.insert_call_count.load(Ordering::SeqCst)
    }

    /// Get the number of times update_by_id() was called
    pub fn update_call_count(&self) -> usize {
        self.update_call_count.load(Ordering::SeqCst)
    }

    /// Number of successful writes (inserts and updates) to a collection
    pub fn writes_to(&self, collection: &str) -> usize {
        self.writes
            .lock()
            .unwrap()
            .iter()
            .filter(|c| *c == collection)
            .count()
    }

    /// Make every later write to `collection` fail with a store error
    pub fn fail_writes_to(&self, collection: &str) {
        self.failing.lock().unwrap().insert(collection.to_string());
    }

    /// All records currently in a collection
    pub async fn records(&self, collection: &str) -> Vec<Record> {
        self.inner.records(collection).await
    }

    /// Create a new MockDocumentStore that shares data and counters with an existing one
    pub fn sharing_counters_with(other: &Self) -> Self {
        Self {
            inner: other.inner.clone(),
            find_call_count: Arc::clone(&other.find_call_count),
            insert_call_count: Arc::clone(&other.insert_call_count),
            update_call_count: Arc::clone(&other.update_call_count),
            writes: Arc::clone(&other.writes),
            failing: Arc::clone(&other.failing),
        }
    }

    fn check_failure(&self, collection: &str) -> Result<()> {
        if self.failing.lock().unwrap().contains(collection) {
            return Err(Error::store(format!("injected failure writing {}", collection)));
        }
        Ok(())
    }

    fn record_write(&self, collection: &str) {
        self.writes.lock().unwrap().push(collection.to_string());
    }
}

#[async_trait::async_trait]
impl DocumentStore for MockDocumentStore {
    async fn find_one(
        &self,
        ctx: &RequestContext,
        collection: &str,
        filter: &Filter,
    ) -> Result<Record> {
        self.find_call_count.fetch_add(1, Ordering::SeqCst);
        self.inner.find_one(ctx, collection, filter).await
    }

    async fn insert_one(
        &self,
        ctx: &RequestContext,
        collection: &str,
        record: Record,
    ) -> Result<DocumentId> {
        self.insert_call_count.fetch_add(1, Ordering::SeqCst);
        self.check_failure(collection)?;
        let id = self.inner.insert_one(ctx, collection, record).await?;
        self.record_write(collection);
        Ok(id)
    }

    async fn update_by_id(
        &self,
        ctx: &RequestContext,
        collection: &str,
        id: &DocumentId,
        changes: Record,
    ) -> Result<()> {
        self.update_call_count.fetch_add(1, Ordering::SeqCst);
        self.check_failure(collection)?;
        self.inner.update_by_id(ctx, collection, id, changes).await?;
        self.record_write(collection);
        Ok(())
    }
}

/// Audit-eligible sample model
#[derive(Debug, Clone, Serialize)]
pub struct Person {
    #[serde(skip)]
    pub audit: AuditMarker,
    #[serde(rename = "_id")]
    pub id: DocumentId,
    #[serde(rename = "FullName")]
    pub full_name: String,
    pub age: u32,
    pub email: String,
}

impl Model for Person {
    const FIELD_TAGS: &'static [FieldTag] = &[
        FieldTag::new("FullName").storage("name"),
        FieldTag::new("email").omit_empty(),
    ];
}

impl Person {
    /// Person without an id; the store assigns one on insert
    pub fn new(name: &str, age: u32) -> Self {
        Self {
            audit: AuditMarker,
            id: DocumentId::nil(),
            full_name: name.to_string(),
            age,
            email: String::new(),
        }
    }
}

/// Model that is never registered
#[derive(Debug, Clone, Serialize)]
pub struct Untracked {
    pub label: String,
}

impl Model for Untracked {}

/// Save hook that counts calls and remembers what it saw
#[derive(Default)]
pub struct RecordingHook {
    pre_save_count: Arc<AtomicUsize>,
    post_save_count: Arc<AtomicUsize>,
    seen_ids: Arc<Mutex<Vec<Option<DocumentId>>>>,
}

impl RecordingHook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pre_save_count(&self) -> usize {
        self.pre_save_count.load(Ordering::SeqCst)
    }

    pub fn post_save_count(&self) -> usize {
        self.post_save_count.load(Ordering::SeqCst)
    }

    /// Document ids passed to post_save, in call order
    pub fn seen_ids(&self) -> Vec<Option<DocumentId>> {
        self.seen_ids.lock().unwrap().clone()
    }

    /// Create a new RecordingHook that shares counters with an existing one
    pub fn sharing_counters_with(other: &Self) -> Self {
        Self {
            pre_save_count: Arc::clone(&other.pre_save_count),
            post_save_count: Arc::clone(&other.post_save_count),
            seen_ids: Arc::clone(&other.seen_ids),
        }
    }
}

#[async_trait::async_trait]
impl SaveHook for RecordingHook {
    async fn pre_save(&self, _ctx: &RequestContext, _doc: &dyn Document, _event: &SaveEvent<'_>) {
        self.pre_save_count.fetch_add(1, Ordering::SeqCst);
    }

    async fn post_save(&self, _ctx: &RequestContext, _doc: &dyn Document, event: &SaveEvent<'_>) {
        self.post_save_count.fetch_add(1, Ordering::SeqCst);
        self.seen_ids.lock().unwrap().push(event.document_id);
    }
}

/// Model that replaces the default hooks with its own
#[derive(Clone, Serialize)]
pub struct SelfAudited {
    #[serde(skip)]
    pub audit: AuditMarker,
    pub title: String,
    #[serde(skip)]
    pub hook: Arc<RecordingHook>,
}

impl Model for SelfAudited {
    fn save_hook(&self) -> Option<&dyn SaveHook> {
        Some(self.hook.as_ref())
    }
}

/// Everything a contract test needs, wired the way an application would
pub struct AuditHarness {
    pub store: Arc<MockDocumentStore>,
    pub registry: Arc<ModelRegistry>,
    pub audited: AuditedStore,
    pub events: mpsc::Receiver<AuditEvent>,
    pub config: AuditConfig,
}

impl AuditHarness {
    /// Harness with `Person` registered and the registry sealed
    pub fn new() -> Self {
        let registry = Arc::new(ModelRegistry::new());
        registry.register_model::<Person>().expect("registry is open");
        registry.seal();
        Self::with_registry(registry, AuditConfig::default())
    }

    /// Harness over a caller-prepared registry and config
    pub fn with_registry(registry: Arc<ModelRegistry>, config: AuditConfig) -> Self {
        let store = Arc::new(MockDocumentStore::new());
        let (dispatcher, events) = HookDispatcher::new(
            Arc::new(MockDocumentStore::sharing_counters_with(&store)),
            Arc::clone(&registry),
            config.clone(),
        )
        .expect("dispatcher construction succeeds");
        let audited = AuditedStore::new(
            Arc::new(MockDocumentStore::sharing_counters_with(&store)),
            Arc::new(dispatcher),
        );

        Self {
            store,
            registry,
            audited,
            events,
            config,
        }
    }

    /// Every event emitted so far
    pub fn drain_events(&mut self) -> Vec<AuditEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            events.push(event);
        }
        events
    }

    pub async fn meta_records(&self) -> Vec<Record> {
        self.store.records(&self.config.meta_collection).await
    }

    pub async fn log_records(&self) -> Vec<Record> {
        self.store.records(&self.config.log_collection).await
    }
}

/// Request context carrying the usual identity values
pub fn user_context() -> RequestContext {
    RequestContext::new()
        .with_value("user_id", "u-1")
        .with_value("role", "editor")
        .with_value("ip_addr", "192.0.2.10")
        .with_value("user_agent", "contract-test/1.0")
        .with_value("url", "/people/1")
}
