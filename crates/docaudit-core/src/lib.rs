// # docaudit-core
//
// Core library for automatic field-level change tracking of document store writes.
//
// ## Architecture Overview
//
// Every insert and update that goes through the audited write path is
// bracketed by save hooks. For models that carry the audit marker, the hooks
// keep a baseline snapshot of the document and append one change entry per
// update:
// - **ModelRegistry**: Set of audit-eligible model types, sealed at startup
// - **Scanner**: Static source scan that fills the registry
// - **HookDispatcher**: Default save hook; records baselines and change logs
// - **snapshot / diff**: Canonical field snapshots and their differences
// - **DocumentStore**: Trait for the document database behind it all
// - **AuditedStore**: Write path wrapper that invokes the hooks
//
// ## Design Principles
//
// 1. **Best Effort**: Audit failures are logged, never returned to the writer
// 2. **Startup Registration**: Eligibility is decided once, before the first write
// 3. **Library-First**: Every piece can be used on its own

pub mod config;
pub mod context;
pub mod entities;
pub mod error;
pub mod hooks;
pub mod model;
pub mod registry;
pub mod scanner;
pub mod snapshot;
pub mod store;
pub mod traits;

// Re-export core types for convenience
pub use config::{AuditConfig, DocauditConfig, ScanConfig};
pub use context::RequestContext;
pub use entities::{AuditChange, AuditLog, AuditLogMeta, ChangeSet};
pub use error::{Error, Result};
pub use hooks::{AuditEvent, HookDispatcher, Operation, SaveEvent, SaveHook};
pub use model::{AuditMarker, Document, DocumentId, FieldTag, Model, type_identity};
pub use registry::ModelRegistry;
pub use scanner::{ScanReport, Scanner};
pub use snapshot::{NO_VALUE, Snapshot, diff};
pub use store::{AuditedStore, FileDocumentStore, MemoryDocumentStore};
pub use traits::{DOCUMENT_ID_KEY, DocumentStore, Filter, Record};
