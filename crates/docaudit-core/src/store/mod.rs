// # Document Store Implementations
//
// This module provides implementations of the DocumentStore trait for
// different persistence strategies, plus the audited write adapter that
// wraps any of them with the save hooks.

pub mod audited;
pub mod file;
pub mod memory;

pub use audited::AuditedStore;
pub use file::FileDocumentStore;
pub use memory::MemoryDocumentStore;

use std::collections::{BTreeMap, HashMap};

use crate::error::{Error, Result};
use crate::model::DocumentId;
use crate::traits::document_store::{Filter, Record, assign_id};

/// Collection name to records keyed by id
///
/// Shared by the in-tree stores; callers hold the lock.
pub(crate) type Collections = HashMap<String, BTreeMap<DocumentId, Record>>;

pub(crate) fn find_in(collections: &Collections, collection: &str, filter: &Filter) -> Result<Record> {
    let records = collections.get(collection);

    // Direct lookup when the filter pins the id
    if let Some(id) = filter.document_id() {
        return records
            .and_then(|records| records.get(&id))
            .filter(|record| filter.matches(record))
            .cloned()
            .ok_or_else(|| Error::not_found(format!("{} in {}", id, collection)));
    }

    records
        .and_then(|records| records.values().find(|record| filter.matches(record)))
        .cloned()
        .ok_or_else(|| Error::not_found(format!("no record in {} matches {:?}", collection, filter)))
}

pub(crate) fn insert_into(
    collections: &mut Collections,
    collection: &str,
    mut record: Record,
) -> Result<DocumentId> {
    let id = assign_id(&mut record);
    let records = collections.entry(collection.to_string()).or_default();
    if records.contains_key(&id) {
        return Err(Error::store(format!(
            "duplicate key {} in {}",
            id, collection
        )));
    }
    records.insert(id, record);
    Ok(id)
}

pub(crate) fn update_in(
    collections: &mut Collections,
    collection: &str,
    id: &DocumentId,
    changes: Record,
) -> Result<()> {
    let record = collections
        .get_mut(collection)
        .and_then(|records| records.get_mut(id))
        .ok_or_else(|| Error::not_found(format!("{} in {}", id, collection)))?;

    for (key, value) in changes {
        // The identifier is immutable
        if key == crate::traits::DOCUMENT_ID_KEY {
            continue;
        }
        record.insert(key, value);
    }
    Ok(())
}
