//! Default save hook: audit logging
//!
//! ## Architecture
//!
//! ```text
//!                   ┌────────────────┐
//!  pre/post_save ──►│ HookDispatcher │── custom hook? ──► Model::save_hook()
//!                   └────────────────┘
//!                           │ eligible? (ModelRegistry)
//!         ┌─────────────────┼──────────────────────┐
//!         ▼                 ▼                      ▼
//! ┌──────────────┐  ┌───────────────┐      ┌─────────────┐
//! │ snapshot/diff│  │ DocumentStore │      │   Events    │
//! │ (pure)       │  │ (meta + log)  │      │  (notify)   │
//! └──────────────┘  └───────────────┘      └─────────────┘
//! ```
//!
//! ## Event Flow
//!
//! Insert:
//! 1. Snapshot the model
//! 2. Create (or overwrite) the baseline meta record for the document id
//!
//! Update:
//! 1. Lock the document id
//! 2. Find the baseline meta by `document_current_state._id`
//! 3. Snapshot the model and diff against the baseline
//! 4. Append an audit log entry
//! 5. Overwrite the baseline and bump its version
//!
//! Every failure is logged, emitted as [`AuditEvent::Failed`] and swallowed.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use super::locks::KeyedLocks;
use super::{Operation, SaveEvent, SaveHook};
use crate::config::AuditConfig;
use crate::context::{RequestContext, keys};
use crate::entities::{AuditLog, AuditLogMeta};
use crate::error::{Error, Result};
use crate::model::{Document, DocumentId};
use crate::registry::ModelRegistry;
use crate::snapshot;
use crate::traits::{DOCUMENT_ID_KEY, DocumentStore, Filter};

/// Events emitted by the HookDispatcher
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuditEvent {
    /// Baseline stored for an inserted document
    BaselineRecorded {
        collection: String,
        document_id: Option<DocumentId>,
        meta_id: DocumentId,
    },

    /// Audit entry appended for an updated document
    ChangeLogged {
        collection: String,
        document_id: DocumentId,
        log_id: DocumentId,
        changed_fields: Vec<String>,
    },

    /// Default audit behavior did not apply
    Skipped {
        collection: String,
        operation: Operation,
        reason: String,
    },

    /// Audit side effect failed (the primary write is unaffected)
    Failed {
        collection: String,
        operation: Operation,
        stage: &'static str,
        error: String,
    },

    /// A model-supplied hook replaced the default behavior
    CustomHookInvoked {
        collection: String,
        operation: Operation,
        type_identity: String,
    },
}

/// Audit-logging save hook
///
/// Holds the store audit records are written to, the registry of eligible
/// models, and a per-document lock table.
///
/// ## Concurrency
///
/// Hooks run inline on the caller's task; there is no background worker.
/// Updates to the same document id are serialized so the baseline read and
/// overwrite cannot interleave.
pub struct HookDispatcher {
    /// Store for meta and log collections
    store: Arc<dyn DocumentStore>,

    /// Eligible model types
    registry: Arc<ModelRegistry>,

    config: AuditConfig,

    /// Per-document critical sections
    locks: KeyedLocks,

    /// Set once the unsealed-registry warning has been logged
    unsealed_warned: AtomicBool,

    /// Event sender for external monitoring
    event_tx: mpsc::Sender<AuditEvent>,
}

impl HookDispatcher {
    /// Create a new dispatcher
    ///
    /// # Returns
    ///
    /// A tuple of (dispatcher, event_receiver) where event_receiver yields
    /// audit events. Dropping the receiver is fine; events are then discarded.
    pub fn new(
        store: Arc<dyn DocumentStore>,
        registry: Arc<ModelRegistry>,
        config: AuditConfig,
    ) -> Result<(Self, mpsc::Receiver<AuditEvent>)> {
        config.validate()?;

        let (tx, rx) = mpsc::channel(config.event_channel_capacity);

        let dispatcher = Self {
            store,
            registry,
            config,
            locks: KeyedLocks::new(),
            unsealed_warned: AtomicBool::new(false),
            event_tx: tx,
        };

        Ok((dispatcher, rx))
    }

    /// The audit configuration in effect
    pub fn config(&self) -> &AuditConfig {
        &self.config
    }

    /// Whether the document's type is audit-eligible
    ///
    /// Waits for the registry to be sealed, bounded by the configured timeout.
    /// Every call waits the full timeout while the registry stays unsealed;
    /// the warning is logged only for the first one.
    async fn is_eligible(&self, doc: &dyn Document) -> bool {
        match self.config.registry_wait_timeout() {
            Some(timeout) => {
                if !self.registry.wait_ready_timeout(timeout).await {
                    if !self.unsealed_warned.swap(true, Ordering::Relaxed) {
                        warn!(
                            model = doc.type_identity(),
                            "model registry not sealed after {:?}, treating models as not eligible \
                             (every audited write waits this long until it is sealed)",
                            timeout
                        );
                    } else {
                        debug!(
                            model = doc.type_identity(),
                            "model registry still not sealed, treating model as not eligible"
                        );
                    }
                    return false;
                }
            }
            None => self.registry.wait_ready().await,
        }
        self.registry.contains(doc.type_identity())
    }

    /// Record the baseline for a freshly inserted document
    async fn handle_insert(
        &self,
        ctx: &RequestContext,
        doc: &dyn Document,
        event: &SaveEvent<'_>,
    ) -> StageResult<()> {
        let mut state = doc.snapshot().map_err(stage("snapshot"))?;

        // A nil id means the store assigned the real one
        let unset = state
            .get(DOCUMENT_ID_KEY)
            .and_then(|v| v.as_str())
            .and_then(|hex| DocumentId::parse_hex(hex).ok())
            .is_some_and(|id| id.is_nil());

        if unset || !state.contains_key(DOCUMENT_ID_KEY) {
            match event.document_id {
                Some(id) => {
                    state.insert(DOCUMENT_ID_KEY.to_string(), id.to_hex().into());
                }
                None => warn!(
                    collection = event.collection,
                    model = doc.type_identity(),
                    "snapshot has no _id and no document id is known; later updates cannot find this baseline"
                ),
            }
        }

        let document_id = state
            .get(DOCUMENT_ID_KEY)
            .and_then(|v| v.as_str())
            .and_then(|hex| DocumentId::parse_hex(hex).ok())
            .or(event.document_id);

        let _guard = match document_id {
            Some(id) => Some(self.locks.lock(id).await),
            None => None,
        };

        // Re-inserting a tracked id overwrites its baseline
        if let Some(id) = document_id {
            match self.find_meta(ctx, &id).await {
                Ok(mut meta) => {
                    meta.revise(state);
                    self.store
                        .update_by_id(
                            ctx,
                            &self.config.meta_collection,
                            &meta.id,
                            meta.revision_record(),
                        )
                        .await
                        .map_err(stage("update_meta"))?;
                    info!(
                        collection = event.collection,
                        document_id = %id,
                        meta_id = %meta.id,
                        "baseline overwritten for re-inserted document"
                    );
                    self.emit_event(AuditEvent::BaselineRecorded {
                        collection: event.collection.to_string(),
                        document_id: Some(id),
                        meta_id: meta.id,
                    });
                    return Ok(());
                }
                Err(StageError { error, .. }) if error.is_not_found() => {}
                Err(e) => return Err(e),
            }
        }

        let meta = AuditLogMeta::new(state);
        let record = meta.to_record().map_err(stage("insert_meta"))?;
        let meta_id = self
            .store
            .insert_one(ctx, &self.config.meta_collection, record)
            .await
            .map_err(stage("insert_meta"))?;

        debug!(
            collection = event.collection,
            document_id = ?document_id,
            meta_id = %meta_id,
            "baseline recorded"
        );
        self.emit_event(AuditEvent::BaselineRecorded {
            collection: event.collection.to_string(),
            document_id,
            meta_id,
        });
        Ok(())
    }

    /// Diff against the baseline, append a log entry, move the baseline forward
    async fn handle_update(
        &self,
        ctx: &RequestContext,
        doc: &dyn Document,
        event: &SaveEvent<'_>,
    ) -> StageResult<()> {
        let Some(document_id) = event.document_id else {
            warn!(
                collection = event.collection,
                model = doc.type_identity(),
                "update without a document id, audit entry skipped"
            );
            self.emit_event(AuditEvent::Skipped {
                collection: event.collection.to_string(),
                operation: Operation::Update,
                reason: "no document id".to_string(),
            });
            return Ok(());
        };

        let _guard = self.locks.lock(document_id).await;

        let mut meta = self.find_meta(ctx, &document_id).await?;
        let mut new_state = doc.snapshot().map_err(stage("snapshot"))?;
        // The baseline stays keyed on the tracked id
        new_state.insert(DOCUMENT_ID_KEY.to_string(), document_id.to_hex().into());
        let change = snapshot::diff(&meta.document_current_state, &new_state);

        if change.is_empty() && self.config.skip_empty_changes {
            debug!(
                collection = event.collection,
                document_id = %document_id,
                "no field changes, audit entry skipped"
            );
            self.emit_event(AuditEvent::Skipped {
                collection: event.collection.to_string(),
                operation: Operation::Update,
                reason: "no field changes".to_string(),
            });
        } else {
            let changed_fields: Vec<String> = change.keys().cloned().collect();
            let log = self.build_log(ctx, &meta, event.collection, document_id, change);
            let record = log.to_record().map_err(stage("insert_log"))?;
            self.store
                .insert_one(ctx, &self.config.log_collection, record)
                .await
                .map_err(stage("insert_log"))?;

            info!(
                collection = event.collection,
                document_id = %document_id,
                changed = changed_fields.len(),
                "audit entry logged"
            );
            self.emit_event(AuditEvent::ChangeLogged {
                collection: event.collection.to_string(),
                document_id,
                log_id: log.id,
                changed_fields,
            });
        }

        meta.revise(new_state);
        self.store
            .update_by_id(
                ctx,
                &self.config.meta_collection,
                &meta.id,
                meta.revision_record(),
            )
            .await
            .map_err(stage("update_meta"))?;

        Ok(())
    }

    /// Baseline meta for a tracked document
    async fn find_meta(
        &self,
        ctx: &RequestContext,
        document_id: &DocumentId,
    ) -> StageResult<AuditLogMeta> {
        let filter = Filter::eq(
            format!("document_current_state.{}", DOCUMENT_ID_KEY),
            document_id.to_hex(),
        );
        let record = self
            .store
            .find_one(ctx, &self.config.meta_collection, &filter)
            .await
            .map_err(stage("find_meta"))?;
        AuditLogMeta::from_record(&record).map_err(stage("find_meta"))
    }

    fn build_log(
        &self,
        ctx: &RequestContext,
        meta: &AuditLogMeta,
        collection: &str,
        document_id: DocumentId,
        change: crate::entities::ChangeSet,
    ) -> AuditLog {
        let fallback = self.config.fallback_value.as_str();
        AuditLog {
            id: DocumentId::new(),
            audit_meta_id: meta.id,
            audit_event: Operation::Update.to_string(),
            audit_url: ctx.value_or(keys::URL, fallback),
            audit_ip_address: ctx.value_or(keys::IP_ADDR, fallback),
            audit_user_agent: ctx.value_or(keys::USER_AGENT, fallback),
            audit_tags: self.config.tags.clone(),
            audit_created_at: chrono::Utc::now(),
            user_id: ctx.value_or(keys::USER_ID, fallback),
            user_type: ctx.value_or(keys::ROLE, fallback),
            collection: collection.to_string(),
            document_id: Some(document_id),
            change,
        }
    }

    /// Emit an audit event
    fn emit_event(&self, event: AuditEvent) {
        match self.event_tx.try_send(event) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!("Audit event channel full, dropping event. Consider increasing event_channel_capacity.");
            }
            // Nobody listens; events are optional
            Err(mpsc::error::TrySendError::Closed(_)) => {}
        }
    }

    fn report_failure(&self, doc: &dyn Document, event: &SaveEvent<'_>, failure: StageError) {
        if failure.error.is_not_found() {
            warn!(
                collection = event.collection,
                operation = %event.operation,
                document_id = ?event.document_id,
                model = doc.type_identity(),
                stage = failure.stage,
                "no audit baseline for document: {}",
                failure.error
            );
        } else {
            error!(
                collection = event.collection,
                operation = %event.operation,
                document_id = ?event.document_id,
                model = doc.type_identity(),
                stage = failure.stage,
                "audit logging failed: {}",
                failure.error
            );
        }
        self.emit_event(AuditEvent::Failed {
            collection: event.collection.to_string(),
            operation: event.operation,
            stage: failure.stage,
            error: failure.error.to_string(),
        });
    }
}

#[async_trait::async_trait]
impl SaveHook for HookDispatcher {
    async fn pre_save(&self, ctx: &RequestContext, doc: &dyn Document, event: &SaveEvent<'_>) {
        if let Some(custom) = doc.save_hook() {
            self.emit_custom(doc, event);
            custom.pre_save(ctx, doc, event).await;
            return;
        }
        debug!(
            collection = event.collection,
            operation = %event.operation,
            "default pre_save hook triggered"
        );
    }

    async fn post_save(&self, ctx: &RequestContext, doc: &dyn Document, event: &SaveEvent<'_>) {
        if let Some(custom) = doc.save_hook() {
            self.emit_custom(doc, event);
            custom.post_save(ctx, doc, event).await;
            return;
        }

        if !self.is_eligible(doc).await {
            debug!(
                collection = event.collection,
                model = doc.type_identity(),
                "model not audit-eligible"
            );
            self.emit_event(AuditEvent::Skipped {
                collection: event.collection.to_string(),
                operation: event.operation,
                reason: format!("{} is not audit-eligible", doc.type_identity()),
            });
            return;
        }

        let outcome = match event.operation {
            Operation::Insert => self.handle_insert(ctx, doc, event).await,
            Operation::Update => self.handle_update(ctx, doc, event).await,
        };

        if let Err(failure) = outcome {
            self.report_failure(doc, event, failure);
        }
        debug!(
            collection = event.collection,
            operation = %event.operation,
            "default post_save hook triggered"
        );
    }
}

impl HookDispatcher {
    fn emit_custom(&self, doc: &dyn Document, event: &SaveEvent<'_>) {
        debug!(
            collection = event.collection,
            model = doc.type_identity(),
            "delegating to model save hook"
        );
        self.emit_event(AuditEvent::CustomHookInvoked {
            collection: event.collection.to_string(),
            operation: event.operation,
            type_identity: doc.type_identity().to_string(),
        });
    }
}

/// An audit failure tagged with the step it happened in
#[derive(Debug)]
struct StageError {
    stage: &'static str,
    error: Error,
}

type StageResult<T> = std::result::Result<T, StageError>;

fn stage(name: &'static str) -> impl FnOnce(Error) -> StageError {
    move |error| StageError { stage: name, error }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Model;
    use crate::store::MemoryDocumentStore;
    use serde::Serialize;
    use std::time::Duration;

    #[derive(Serialize)]
    struct Note {
        text: String,
    }

    impl Model for Note {}

    #[tokio::test]
    async fn test_unsealed_registry_warns_once_and_keeps_skipping() {
        let registry = Arc::new(ModelRegistry::new());
        registry.register_model::<Note>().unwrap();
        let config = AuditConfig {
            registry_wait_timeout_ms: 10,
            ..AuditConfig::default()
        };
        let (dispatcher, mut events) =
            HookDispatcher::new(Arc::new(MemoryDocumentStore::new()), Arc::clone(&registry), config)
                .unwrap();
        let ctx = RequestContext::new();
        let note = Note { text: "a".into() };
        let event = SaveEvent::insert("notes").with_document_id(DocumentId::new());

        assert!(!dispatcher.unsealed_warned.load(Ordering::Relaxed));
        dispatcher.post_save(&ctx, &note, &event).await;
        assert!(dispatcher.unsealed_warned.load(Ordering::Relaxed));
        dispatcher.post_save(&ctx, &note, &event).await;

        for _ in 0..2 {
            assert!(matches!(events.try_recv(), Ok(AuditEvent::Skipped { .. })));
        }

        // Sealing lifts the wait
        registry.seal();
        tokio::time::timeout(Duration::from_secs(1), dispatcher.post_save(&ctx, &note, &event))
            .await
            .unwrap();
        assert!(matches!(events.try_recv(), Ok(AuditEvent::BaselineRecorded { .. })));
    }
}
