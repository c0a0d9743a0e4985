//! Canonical snapshot & diff
//!
//! Pure functions. [`snapshot`] projects a model instance into a flat field
//! map; [`diff`] turns two such maps into a change set.
//!
//! ## Snapshot rules
//!
//! - Only struct values (or a pointer/`Option`/newtype around one) are
//!   accepted; everything else is [`Error::InvalidData`](crate::Error::InvalidData).
//! - Only directly-declared fields are visited; nested structs stay nested.
//! - Key precedence: [`FieldTag::storage`], then [`FieldTag::external`], then
//!   the snake-cased serialized name.
//! - [`FieldTag::omit_empty`] drops the field when it is empty for its kind:
//!   `None`, a collection without entries, a nil
//!   [`DocumentId`](crate::DocumentId), or a scalar or nested struct that is
//!   zero (see [`is_empty_value`]). `Some(_)` is never empty, even around a
//!   zero value, and a map with entries is never empty.
//! - Identifier-typed fields render as lowercase hex regardless of key.

mod diff;
mod naming;
mod serializer;

use serde::Serialize;
use serde_json::Value;

use crate::error::Result;
use crate::model::{FieldTag, Model};

pub use diff::{NO_VALUE, diff, render};
pub use naming::to_snake_case;

use serializer::SnapshotSerializer;

/// Canonical field-map projection of a model instance
pub type Snapshot = serde_json::Map<String, Value>;

/// Snapshot a model using its declared [`Model::FIELD_TAGS`]
pub fn snapshot<M: Model + ?Sized>(model: &M) -> Result<Snapshot> {
    snapshot_with_tags(model, M::FIELD_TAGS)
}

/// Snapshot any serializable value with explicit field tags
pub fn snapshot_with_tags<T: Serialize + ?Sized>(value: &T, tags: &[FieldTag]) -> Result<Snapshot> {
    value.serialize(SnapshotSerializer { tags })
}

/// Whether a rendered scalar or nested struct is the zero value
///
/// Null, `false`, numeric zero, the empty string, the empty sequence and
/// the empty map are zero. An object is zero when every member is, which is
/// how a zero-valued nested struct renders. Options and collections at the
/// top level of a snapshot are judged by their shape instead.
pub fn is_empty_value(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f == 0.0),
        Value::String(s) => s.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(members) => members.values().all(is_empty_value),
    }
}

/// Short name of a value's JSON kind, for error messages
pub(crate) fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{AuditMarker, DocumentId};
    use crate::Error;
    use serde_json::json;
    use std::collections::HashMap;

    #[derive(Serialize)]
    #[serde(rename_all = "PascalCase")]
    struct TestStruct {
        #[serde(rename = "ID")]
        id: DocumentId,
        name: String,
        age: u32,
        is_active: bool,
        address: String,
        empty_val: String,
        unmapped: String,
    }

    impl Model for TestStruct {
        const FIELD_TAGS: &'static [FieldTag] = &[
            FieldTag::new("ID").storage("_id").omit_empty(),
            FieldTag::new("Name").external("name"),
            FieldTag::new("Age").storage("age").external("age").omit_empty(),
            FieldTag::new("IsActive").storage("is_active"),
            FieldTag::new("Address").storage("address").omit_empty(),
            FieldTag::new("EmptyVal").storage("empty_val").omit_empty(),
        ];
    }

    #[derive(Serialize, Default)]
    struct Person {
        #[serde(skip)]
        _audit: AuditMarker,
        #[serde(rename = "_id")]
        id: DocumentId,
        name: String,
        age: u32,
    }

    impl Model for Person {
        const FIELD_TAGS: &'static [FieldTag] = &[FieldTag::new("age").omit_empty()];
    }

    #[derive(Serialize, Default)]
    struct Inner {
        count: u32,
        label: String,
    }

    #[derive(Serialize, Default)]
    struct Shapes {
        maybe: Option<u32>,
        items: Vec<u32>,
        tags: HashMap<String, u32>,
        nested: Inner,
        parent: Option<DocumentId>,
        owner: DocumentId,
    }

    const ALL_OMIT: &[FieldTag] = &[
        FieldTag::new("maybe").omit_empty(),
        FieldTag::new("items").omit_empty(),
        FieldTag::new("tags").omit_empty(),
        FieldTag::new("nested").omit_empty(),
        FieldTag::new("parent").omit_empty(),
        FieldTag::new("owner").omit_empty(),
    ];

    #[test]
    fn test_struct_to_map() {
        let obj = TestStruct {
            id: DocumentId::new(),
            name: "John Doe".into(),
            age: 0,
            is_active: true,
            address: "123 Main St".into(),
            empty_val: String::new(),
            unmapped: "UnmappedField".into(),
        };

        let result = snapshot(&obj).unwrap();

        let expected = json!({
            "_id": obj.id.to_hex(),
            "name": "John Doe",
            "is_active": true,
            "address": "123 Main St",
            "unmapped": "UnmappedField",
        });
        assert_eq!(Value::Object(result), expected);
    }

    #[test]
    fn test_insert_scenario_snapshot() {
        let person = Person {
            id: DocumentId::new(),
            name: "Alice".into(),
            ..Default::default()
        };

        let result = snapshot(&person).unwrap();
        assert_eq!(
            Value::Object(result),
            json!({"_id": person.id.to_hex(), "name": "Alice"})
        );
    }

    #[test]
    fn test_omit_empty_only_when_empty() {
        let person = Person {
            id: DocumentId::new(),
            name: "Alice".into(),
            age: 31,
            ..Default::default()
        };
        let result = snapshot(&person).unwrap();
        assert_eq!(result.get("age"), Some(&json!(31)));
    }

    #[test]
    fn test_omit_empty_shapes() {
        let empty = snapshot_with_tags(&Shapes::default(), ALL_OMIT).unwrap();
        assert!(empty.is_empty(), "unexpected keys: {:?}", empty.keys());

        let mut tags = HashMap::new();
        tags.insert("k".to_string(), 1);
        let full = Shapes {
            maybe: Some(0),
            items: vec![1],
            tags,
            nested: Inner {
                count: 0,
                label: "x".into(),
            },
            parent: Some(DocumentId::new()),
            owner: DocumentId::new(),
        };
        let result = snapshot_with_tags(&full, ALL_OMIT).unwrap();
        for key in ["maybe", "items", "tags", "nested", "parent", "owner"] {
            assert!(result.contains_key(key), "missing {}", key);
        }
    }

    #[derive(Serialize, Default)]
    struct Counters {
        count: Option<u32>,
        label: Option<String>,
        scores: HashMap<String, u32>,
        owner: Option<DocumentId>,
        pair: (u32, u32),
        inner: Inner,
    }

    const COUNTERS_OMIT: &[FieldTag] = &[
        FieldTag::new("count").omit_empty(),
        FieldTag::new("label").omit_empty(),
        FieldTag::new("scores").omit_empty(),
        FieldTag::new("owner").omit_empty(),
        FieldTag::new("pair").omit_empty(),
        FieldTag::new("inner").omit_empty(),
    ];

    #[test]
    fn test_omit_empty_keeps_present_zero_values() {
        let mut scores = HashMap::new();
        scores.insert("k".to_string(), 0);
        let counters = Counters {
            count: Some(0),
            label: Some(String::new()),
            scores,
            owner: Some(DocumentId::nil()),
            ..Default::default()
        };

        let result = snapshot_with_tags(&counters, COUNTERS_OMIT).unwrap();

        assert_eq!(result["count"], json!(0));
        assert_eq!(result["label"], json!(""));
        assert_eq!(result["scores"], json!({"k": 0}));
        assert_eq!(result["owner"], json!("0".repeat(32)));
        // A tuple has entries even when they are zero
        assert_eq!(result["pair"], json!([0, 0]));
        assert!(!result.contains_key("inner"), "zero-valued struct is empty");
    }

    #[test]
    fn test_omit_empty_drops_absent_values() {
        let result = snapshot_with_tags(&Counters::default(), COUNTERS_OMIT).unwrap();
        assert_eq!(result.keys().collect::<Vec<_>>(), vec!["pair"]);
    }

    #[test]
    fn test_empty_fields_kept_without_omit_tag() {
        let result = snapshot_with_tags(&Shapes::default(), &[]).unwrap();
        assert_eq!(result.len(), 6);
        assert_eq!(result["maybe"], Value::Null);
        assert_eq!(result["owner"], json!("0".repeat(32)));
    }

    #[test]
    fn test_identifier_renders_as_hex_under_any_key() {
        let owner = DocumentId::new();
        let parent = DocumentId::new();
        let shapes = Shapes {
            owner,
            parent: Some(parent),
            ..Default::default()
        };
        let tags = [FieldTag::new("owner").external("ownerRef")];
        let result = snapshot_with_tags(&shapes, &tags).unwrap();
        assert_eq!(result["ownerRef"], json!(owner.to_hex()));
        assert_eq!(result["parent"], json!(parent.to_hex()));
    }

    #[test]
    fn test_pointer_to_struct_accepted() {
        let person = Box::new(Person {
            name: "Bob".into(),
            ..Default::default()
        });
        let boxed = snapshot_with_tags(&person, Person::FIELD_TAGS).unwrap();
        let optional = snapshot_with_tags(&Some(&*person), Person::FIELD_TAGS).unwrap();
        assert_eq!(boxed, optional);
        assert_eq!(boxed["name"], json!("Bob"));
    }

    #[test]
    fn test_non_struct_is_invalid_data() {
        let cases: Vec<Result<Snapshot>> = vec![
            snapshot_with_tags(&42, &[]),
            snapshot_with_tags("text", &[]),
            snapshot_with_tags(&vec![1, 2, 3], &[]),
            snapshot_with_tags(&HashMap::<String, u32>::new(), &[]),
            snapshot_with_tags(&None::<Person>, &[]),
            snapshot_with_tags(&DocumentId::new(), &[]),
        ];
        for result in cases {
            assert!(matches!(result, Err(Error::InvalidData(_))), "{:?}", result);
        }
    }

    #[test]
    fn test_unit_struct_is_empty_struct() {
        let result = snapshot_with_tags(&AuditMarker, &[]).unwrap();
        assert!(result.is_empty());
    }

    #[test]
    fn test_nested_structs_not_flattened() {
        let shapes = Shapes {
            nested: Inner {
                count: 2,
                label: "x".into(),
            },
            ..Default::default()
        };
        let result = snapshot_with_tags(&shapes, &[]).unwrap();
        assert_eq!(result["nested"], json!({"count": 2, "label": "x"}));
        assert!(!result.contains_key("count"));
    }

    #[test]
    fn test_deterministic() {
        let person = Person {
            id: DocumentId::new(),
            name: "Alice".into(),
            age: 7,
            ..Default::default()
        };
        assert_eq!(snapshot(&person).unwrap(), snapshot(&person).unwrap());
    }

    #[test]
    fn test_is_empty_value() {
        assert!(is_empty_value(&json!(null)));
        assert!(is_empty_value(&json!(0)));
        assert!(is_empty_value(&json!(0.0)));
        assert!(is_empty_value(&json!("")));
        assert!(is_empty_value(&json!(false)));
        assert!(is_empty_value(&json!([])));
        assert!(is_empty_value(&json!({})));
        assert!(is_empty_value(&json!({"a": 0, "b": ""})));
        assert!(!is_empty_value(&json!(10)));
        assert!(!is_empty_value(&json!("hello")));
        assert!(!is_empty_value(&json!([0])));
        assert!(!is_empty_value(&json!({"a": 1})));
    }
}
