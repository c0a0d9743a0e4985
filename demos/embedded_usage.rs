//! Minimal embedding example for docaudit-core
//!
//! Wires a memory store, a registry and the default hook dispatcher around a
//! single model, then inserts one document, updates it twice and prints the
//! resulting audit trail.

use docaudit_core::context::keys;
use docaudit_core::{
    AuditConfig, AuditLog, AuditMarker, AuditedStore, DocumentId, DocumentStore, FieldTag, Filter,
    HookDispatcher, MemoryDocumentStore, Model, ModelRegistry, RequestContext, Result,
};
use serde::Serialize;
use std::sync::Arc;
use tracing::{Level, info};
use tracing_subscriber::FmtSubscriber;

#[derive(Debug, Clone, Serialize)]
struct Person {
    #[serde(skip)]
    _audit: AuditMarker,
    #[serde(rename = "_id")]
    id: DocumentId,
    #[serde(rename = "FullName")]
    full_name: String,
    age: u32,
    #[serde(rename = "Nickname")]
    nickname: String,
}

impl Model for Person {
    const FIELD_TAGS: &'static [FieldTag] = &[
        FieldTag::new("FullName").storage("name"),
        FieldTag::new("Nickname").omit_empty(),
    ];
}

#[tokio::main]
async fn main() -> Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| docaudit_core::Error::Other(e.to_string()))?;

    let memory = Arc::new(MemoryDocumentStore::new());
    let store: Arc<dyn DocumentStore> = memory.clone();

    // Explicit registration stands in for the startup scan here
    let registry = Arc::new(ModelRegistry::new());
    registry.register_model::<Person>()?;
    registry.seal();

    let config = AuditConfig::default();
    let (meta_collection, log_collection) =
        (config.meta_collection.clone(), config.log_collection.clone());
    let (dispatcher, mut events) = HookDispatcher::new(store.clone(), registry, config)?;
    let audited = AuditedStore::new(store, Arc::new(dispatcher));

    let ctx = RequestContext::new()
        .with_value(keys::USER_ID, "u-42")
        .with_value(keys::ROLE, "admin")
        .with_value(keys::IP_ADDR, "10.0.0.7")
        .with_value(keys::URL, "/people");

    let mut person = Person {
        _audit: AuditMarker,
        id: DocumentId::nil(),
        full_name: "Ada Lovelace".into(),
        age: 36,
        nickname: String::new(),
    };

    let id = audited.insert(&ctx, "people", &person).await?;
    info!("Inserted person {}", id);

    person.age = 37;
    audited.update(&ctx, "people", &Filter::by_id(&id), &person).await?;

    person.full_name = "Augusta Ada King".into();
    person.nickname = "Ada".into();
    audited.update(&ctx, "people", &Filter::by_id(&id), &person).await?;

    while let Ok(event) = events.try_recv() {
        info!("Audit event: {:?}", event);
    }

    for record in memory.records(&log_collection).await {
        let log = AuditLog::from_record(&record)?;
        println!(
            "[{}] {} by {} ({})",
            log.audit_created_at.format("%H:%M:%S%.3f"),
            log.audit_event,
            log.user_id,
            log.user_type
        );
        for (field, change) in &log.change {
            println!("    {}: {:?} -> {:?}", field, change.old, change.new);
        }
    }

    let baseline = memory.records(&meta_collection).await;
    println!("baseline: {}", serde_json::to_string_pretty(&baseline)?);

    Ok(())
}
