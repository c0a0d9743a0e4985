//! Model capability types
//!
//! A data model opts into audit logging in two complementary ways:
//!
//! - it embeds an [`AuditMarker`] field, which the startup [`Scanner`](crate::Scanner)
//!   discovers statically from source, and/or
//! - it is registered explicitly with [`ModelRegistry::register_model`](crate::ModelRegistry::register_model).
//!
//! Either way the model must implement [`Model`], which is how the write path
//! learns per-field naming/omission rules and whether the model overrides the
//! default hooks.
//!
//! ```rust,ignore
//! use docaudit_core::{AuditMarker, DocumentId, FieldTag, Model};
//!
//! #[derive(serde::Serialize)]
//! struct User {
//!     #[serde(skip)]
//!     audit: AuditMarker,
//!     #[serde(rename = "_id")]
//!     id: DocumentId,
//!     name: String,
//!     age: u32,
//! }
//!
//! impl Model for User {
//!     const FIELD_TAGS: &'static [FieldTag] = &[FieldTag::new("age").omit_empty()];
//! }
//! ```

use serde::de::{self, Deserializer, Visitor};
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};
use crate::hooks::SaveHook;
use crate::snapshot::{self, Snapshot};
use crate::traits::Record;

/// Reserved newtype name under which [`DocumentId`] serializes itself
///
/// The snapshot serializer keys off this name to recognize identifier-typed
/// fields without runtime type inspection.
pub const DOCUMENT_ID_TOKEN: &str = "$docaudit::DocumentId";

/// Zero-sized marker that declares a model eligible for audit logging
///
/// Embed it as a field; the scanner matches on the field's declared type.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AuditMarker;

/// Identifier of a stored document
///
/// Always rendered as 32 lowercase hexadecimal characters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DocumentId(uuid::Uuid);

impl DocumentId {
    /// Generate a fresh random identifier
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }

    /// The all-zero identifier
    pub const fn nil() -> Self {
        Self(uuid::Uuid::nil())
    }

    /// Whether this is the all-zero identifier
    pub fn is_nil(&self) -> bool {
        self.0.is_nil()
    }

    /// Canonical lowercase hex form
    pub fn to_hex(&self) -> String {
        self.0.simple().to_string()
    }

    /// Parse the canonical hex form
    pub fn parse_hex(s: &str) -> Result<Self> {
        if s.len() != 32 || !s.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(Error::invalid_data(format!(
                "'{}' is not a 32-character hex document id",
                s
            )));
        }
        uuid::Uuid::try_parse(s)
            .map(Self)
            .map_err(|e| Error::invalid_data(format!("invalid document id '{}': {}", s, e)))
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.simple())
    }
}

impl FromStr for DocumentId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse_hex(s)
    }
}

impl Serialize for DocumentId {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_newtype_struct(DOCUMENT_ID_TOKEN, &self.to_hex())
    }
}

impl<'de> Deserialize<'de> for DocumentId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        struct HexVisitor;

        impl Visitor<'_> for HexVisitor {
            type Value = DocumentId;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a 32-character hex document id")
            }

            fn visit_str<E: de::Error>(self, v: &str) -> std::result::Result<DocumentId, E> {
                DocumentId::parse_hex(v).map_err(E::custom)
            }
        }

        deserializer.deserialize_str(HexVisitor)
    }
}

/// Per-field naming and omission metadata, the equivalent of struct tags
///
/// `field` is the name serde emits for the field (after any `rename`).
///
/// A serde `rename` or `rename_all` only changes which name the tag matches.
/// Without a `storage` or `external` name the snapshot key is the
/// snake-cased serialized name, so `#[serde(rename = "userName")]` produces
/// `user_name`. Use [`FieldTag::external`] to keep a name as written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldTag {
    /// Serialized field name this tag applies to
    pub field: &'static str,
    /// Secondary-storage name; wins over everything else
    pub storage: Option<&'static str>,
    /// External-representation name; used when no storage name is set
    pub external: Option<&'static str>,
    /// Drop the field from snapshots when its value is empty
    pub omit_empty: bool,
}

impl FieldTag {
    /// Tag for the given serialized field name
    pub const fn new(field: &'static str) -> Self {
        Self {
            field,
            storage: None,
            external: None,
            omit_empty: false,
        }
    }

    /// Set the storage name
    pub const fn storage(mut self, name: &'static str) -> Self {
        self.storage = Some(name);
        self
    }

    /// Set the external-representation name
    pub const fn external(mut self, name: &'static str) -> Self {
        self.external = Some(name);
        self
    }

    /// Mark the field omit-if-empty
    pub const fn omit_empty(mut self) -> Self {
        self.omit_empty = true;
        self
    }
}

/// Capability implemented by every model that flows through the audited write path
pub trait Model: Serialize + Send + Sync + 'static {
    /// Field tags consulted by [`snapshot`](crate::snapshot::snapshot)
    const FIELD_TAGS: &'static [FieldTag] = &[];

    /// Custom save hooks
    ///
    /// Return `Some(self)` (or an associated hook object) to replace the
    /// default audit behavior entirely for this model.
    fn save_hook(&self) -> Option<&dyn SaveHook> {
        None
    }
}

/// Type-erased view of a model, used across the hook protocol
pub trait Document: Send + Sync {
    /// Fully-qualified type identity, `crate::module::Type`
    fn type_identity(&self) -> &'static str;

    /// Canonical snapshot of the current value
    fn snapshot(&self) -> Result<Snapshot>;

    /// Raw serde representation, as written to the primary collection
    fn to_record(&self) -> Result<Record>;

    /// Custom hook override, if any
    fn save_hook(&self) -> Option<&dyn SaveHook>;
}

impl<M: Model> Document for M {
    fn type_identity(&self) -> &'static str {
        type_identity::<M>()
    }

    fn snapshot(&self) -> Result<Snapshot> {
        snapshot::snapshot(self)
    }

    fn to_record(&self) -> Result<Record> {
        match serde_json::to_value(self)? {
            serde_json::Value::Object(map) => Ok(map),
            other => Err(Error::invalid_data(format!(
                "{} does not serialize to a document (got {})",
                type_identity::<M>(),
                snapshot::kind_of(&other)
            ))),
        }
    }

    fn save_hook(&self) -> Option<&dyn SaveHook> {
        Model::save_hook(self)
    }
}

/// Registry key for `T`: its type path without generic arguments
pub fn type_identity<T: ?Sized>() -> &'static str {
    normalize_identity(std::any::type_name::<T>())
}

/// Strip generic arguments and a leading `::` from a type path
pub fn normalize_identity(name: &str) -> &str {
    let name = name.trim_start_matches("::");
    match name.find('<') {
        Some(idx) => &name[..idx],
        None => name,
    }
}
