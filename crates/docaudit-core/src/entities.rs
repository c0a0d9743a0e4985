//! Audit records persisted by the hook dispatcher
//!
//! - [`AuditLogMeta`]: one live row per tracked document holding its latest
//!   canonical snapshot (the baseline). Overwritten on every update.
//! - [`AuditLog`]: append-only row per update holding the change set and
//!   request metadata.
//!
//! Both are stored as plain [`Record`]s with snake_case field names and `_id`
//! as the identifier key.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use crate::error::{Error, Result};
use crate::model::DocumentId;
use crate::snapshot::{NO_VALUE, Snapshot};
use crate::traits::Record;

/// Field-level change set: field key to old/new pair
pub type ChangeSet = BTreeMap<String, AuditChange>;

/// Old and new rendering of one field
///
/// `old == "<no value>"` marks an added field, `new == ""` a removed one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditChange {
    pub old: String,
    pub new: String,
}

impl AuditChange {
    pub fn new(old: impl Into<String>, new: impl Into<String>) -> Self {
        Self {
            old: old.into(),
            new: new.into(),
        }
    }

    /// The field did not exist in the baseline
    pub fn is_addition(&self) -> bool {
        self.old == NO_VALUE
    }

    /// The field no longer exists
    pub fn is_deletion(&self) -> bool {
        self.new.is_empty()
    }
}

/// Baseline record for one tracked document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditLogMeta {
    #[serde(rename = "_id")]
    pub id: DocumentId,
    /// Latest known canonical snapshot; carries the document's own `_id`
    pub document_current_state: Snapshot,
    /// Number of updates applied since the baseline was first recorded
    #[serde(default)]
    pub version: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl AuditLogMeta {
    /// Fresh baseline for a newly inserted document
    pub fn new(document_current_state: Snapshot) -> Self {
        let now = Utc::now();
        Self {
            id: DocumentId::new(),
            document_current_state,
            version: 0,
            created_at: now,
            updated_at: now,
        }
    }

    /// Replace the baseline and bump the revision
    pub fn revise(&mut self, state: Snapshot) {
        self.document_current_state = state;
        self.version += 1;
        self.updated_at = Utc::now();
    }

    /// Fields written back on revision (`$set` payload)
    pub fn revision_record(&self) -> Record {
        let mut record = Record::new();
        record.insert(
            "document_current_state".to_string(),
            Value::Object(self.document_current_state.clone()),
        );
        record.insert("version".to_string(), Value::from(self.version));
        record.insert(
            "updated_at".to_string(),
            Value::String(self.updated_at.to_rfc3339()),
        );
        record
    }

    pub fn to_record(&self) -> Result<Record> {
        to_record(self)
    }

    pub fn from_record(record: &Record) -> Result<Self> {
        from_record(record)
    }
}

/// Immutable audit entry for one update
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditLog {
    #[serde(rename = "_id")]
    pub id: DocumentId,
    pub audit_meta_id: DocumentId,
    pub audit_event: String,
    pub audit_url: String,
    pub audit_ip_address: String,
    pub audit_user_agent: String,
    pub audit_tags: Vec<String>,
    pub audit_created_at: DateTime<Utc>,
    pub user_id: String,
    pub user_type: String,
    /// Primary collection the update was written to
    pub collection: String,
    /// Identifier of the updated document
    pub document_id: Option<DocumentId>,
    pub change: ChangeSet,
}

impl AuditLog {
    pub fn to_record(&self) -> Result<Record> {
        to_record(self)
    }

    pub fn from_record(record: &Record) -> Result<Self> {
        from_record(record)
    }
}

fn to_record<T: Serialize>(entity: &T) -> Result<Record> {
    match serde_json::to_value(entity)? {
        Value::Object(map) => Ok(map),
        _ => Err(Error::invalid_data("audit entity did not serialize to a record")),
    }
}

fn from_record<T: DeserializeOwned>(record: &Record) -> Result<T> {
    Ok(serde_json::from_value(Value::Object(record.clone()))?)
}
