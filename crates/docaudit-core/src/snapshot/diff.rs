//! Change-set computation between two snapshots

use serde_json::Value;

use crate::entities::{AuditChange, ChangeSet};
use crate::traits::DOCUMENT_ID_KEY;

use super::Snapshot;

/// Rendered in place of the old value when a key is newly added
pub const NO_VALUE: &str = "<no value>";

/// Compute the field-level changes from `old` to `new`
///
/// - keys added or modified in `new` yield `{old: render(old) | NO_VALUE, new: render(new)}`
/// - keys dropped from `new` yield `{old: render(old), new: ""}`
/// - the document identifier key is never reported
///
/// Values are compared structurally before rendering, so `30` and `"30"`
/// count as different even though they render the same.
pub fn diff(old: &Snapshot, new: &Snapshot) -> ChangeSet {
    let mut changes = ChangeSet::new();

    for (key, new_value) in new {
        if key == DOCUMENT_ID_KEY {
            continue;
        }
        match old.get(key) {
            Some(old_value) if old_value == new_value => {}
            Some(old_value) => {
                changes.insert(
                    key.clone(),
                    AuditChange::new(render(old_value), render(new_value)),
                );
            }
            None => {
                changes.insert(
                    key.clone(),
                    AuditChange::new(NO_VALUE, render(new_value)),
                );
            }
        }
    }

    for (key, old_value) in old {
        if key == DOCUMENT_ID_KEY || new.contains_key(key) {
            continue;
        }
        changes.insert(key.clone(), AuditChange::new(render(old_value), ""));
    }

    changes
}

/// Human-readable text for a snapshot value
pub fn render(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => "null".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::Array(_) | Value::Object(_) => {
            serde_json::to_string(value).unwrap_or_else(|_| format!("{:?}", value))
        }
    }
}
