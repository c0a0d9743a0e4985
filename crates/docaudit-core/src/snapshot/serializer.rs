// # Snapshot Serializer
//
// Two serde serializers cooperate to project a model into a snapshot:
//
// - `SnapshotSerializer` accepts only struct shapes (optionally behind
//   `Some`, a newtype, `Box` or `&`) and walks the directly-declared fields.
// - `FieldSerializer` renders each field value through
//   `serde_json::value::Serializer` and records the outermost shape it saw
//   (option, collection, struct, identifier) so omit-if-empty can judge the
//   field by its declared kind rather than by the rendered JSON alone.
//
// Nested values are rendered by serde_json's own serializers, so only the
// top-level shape is recorded. Non-identifier newtypes are transparent.

use serde::ser::{Impossible, SerializeStruct};
use serde::{Serialize, Serializer};
use serde_json::Value;
use serde_json::value::Serializer as ValueSerializer;

use crate::error::Error;
use crate::model::{DOCUMENT_ID_TOKEN, FieldTag};

use super::naming::output_key;
use super::{Snapshot, is_empty_value};

type Unsupported = Impossible<Snapshot, Error>;

fn not_a_struct(kind: &str) -> Error {
    Error::invalid_data(format!("expected a struct, got {}", kind))
}

/// Top-level serializer; the only accepted shape is a struct
pub(crate) struct SnapshotSerializer<'t> {
    pub(crate) tags: &'t [FieldTag],
}

impl<'t> Serializer for SnapshotSerializer<'t> {
    type Ok = Snapshot;
    type Error = Error;
    type SerializeSeq = Unsupported;
    type SerializeTuple = Unsupported;
    type SerializeTupleStruct = Unsupported;
    type SerializeTupleVariant = Unsupported;
    type SerializeMap = Unsupported;
    type SerializeStruct = StructFields<'t>;
    type SerializeStructVariant = Unsupported;

    fn serialize_bool(self, _v: bool) -> Result<Snapshot, Error> {
        Err(not_a_struct("bool"))
    }

    fn serialize_i8(self, _v: i8) -> Result<Snapshot, Error> {
        Err(not_a_struct("integer"))
    }

    fn serialize_i16(self, _v: i16) -> Result<Snapshot, Error> {
        Err(not_a_struct("integer"))
    }

    fn serialize_i32(self, _v: i32) -> Result<Snapshot, Error> {
        Err(not_a_struct("integer"))
    }

    fn serialize_i64(self, _v: i64) -> Result<Snapshot, Error> {
        Err(not_a_struct("integer"))
    }

    fn serialize_u8(self, _v: u8) -> Result<Snapshot, Error> {
        Err(not_a_struct("integer"))
    }

    fn serialize_u16(self, _v: u16) -> Result<Snapshot, Error> {
        Err(not_a_struct("integer"))
    }

    fn serialize_u32(self, _v: u32) -> Result<Snapshot, Error> {
        Err(not_a_struct("integer"))
    }

    fn serialize_u64(self, _v: u64) -> Result<Snapshot, Error> {
        Err(not_a_struct("integer"))
    }

    fn serialize_f32(self, _v: f32) -> Result<Snapshot, Error> {
        Err(not_a_struct("float"))
    }

    fn serialize_f64(self, _v: f64) -> Result<Snapshot, Error> {
        Err(not_a_struct("float"))
    }

    fn serialize_char(self, _v: char) -> Result<Snapshot, Error> {
        Err(not_a_struct("char"))
    }

    fn serialize_str(self, _v: &str) -> Result<Snapshot, Error> {
        Err(not_a_struct("string"))
    }

    fn serialize_bytes(self, _v: &[u8]) -> Result<Snapshot, Error> {
        Err(not_a_struct("bytes"))
    }

    fn serialize_none(self) -> Result<Snapshot, Error> {
        Err(not_a_struct("empty pointer"))
    }

    fn serialize_some<T: ?Sized + Serialize>(self, value: &T) -> Result<Snapshot, Error> {
        value.serialize(self)
    }

    fn serialize_unit(self) -> Result<Snapshot, Error> {
        Err(not_a_struct("unit"))
    }

    // A struct without fields is still a struct.
    fn serialize_unit_struct(self, _name: &'static str) -> Result<Snapshot, Error> {
        Ok(Snapshot::new())
    }

    fn serialize_unit_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        _variant: &'static str,
    ) -> Result<Snapshot, Error> {
        Err(not_a_struct("enum"))
    }

    fn serialize_newtype_struct<T: ?Sized + Serialize>(
        self,
        name: &'static str,
        value: &T,
    ) -> Result<Snapshot, Error> {
        if name == DOCUMENT_ID_TOKEN {
            return Err(not_a_struct("document id"));
        }
        value.serialize(self)
    }

    fn serialize_newtype_variant<T: ?Sized + Serialize>(
        self,
        _name: &'static str,
        _variant_index: u32,
        _variant: &'static str,
        _value: &T,
    ) -> Result<Snapshot, Error> {
        Err(not_a_struct("enum"))
    }

    fn serialize_seq(self, _len: Option<usize>) -> Result<Self::SerializeSeq, Error> {
        Err(not_a_struct("sequence"))
    }

    fn serialize_tuple(self, _len: usize) -> Result<Self::SerializeTuple, Error> {
        Err(not_a_struct("tuple"))
    }

    fn serialize_tuple_struct(
        self,
        _name: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeTupleStruct, Error> {
        Err(not_a_struct("tuple struct"))
    }

    fn serialize_tuple_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        _variant: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeTupleVariant, Error> {
        Err(not_a_struct("enum"))
    }

    fn serialize_map(self, _len: Option<usize>) -> Result<Self::SerializeMap, Error> {
        Err(not_a_struct("map"))
    }

    fn serialize_struct(
        self,
        _name: &'static str,
        len: usize,
    ) -> Result<Self::SerializeStruct, Error> {
        Ok(StructFields {
            tags: self.tags,
            fields: Snapshot::with_capacity(len),
        })
    }

    fn serialize_struct_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        _variant: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeStructVariant, Error> {
        Err(not_a_struct("enum"))
    }
}

/// Collects the directly-declared fields of one struct
pub(crate) struct StructFields<'t> {
    tags: &'t [FieldTag],
    fields: Snapshot,
}

impl SerializeStruct for StructFields<'_> {
    type Ok = Snapshot;
    type Error = Error;

    fn serialize_field<T: ?Sized + Serialize>(
        &mut self,
        key: &'static str,
        value: &T,
    ) -> Result<(), Error> {
        let tag = self.tags.iter().find(|tag| tag.field == key);

        let mut probe = FieldProbe::default();
        let rendered = value.serialize(FieldSerializer { probe: &mut probe })?;

        if tag.is_some_and(|tag| tag.omit_empty) && probe.is_empty(&rendered) {
            return Ok(());
        }

        self.fields.insert(output_key(key, tag), rendered);
        Ok(())
    }

    fn end(self) -> Result<Snapshot, Error> {
        Ok(self.fields)
    }
}

/// How a field value was serialized, as far as omit-if-empty cares
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
enum FieldShape {
    /// Scalars, units and anything judged by its rendered value
    #[default]
    Value,
    /// `None`
    Absent,
    /// `Some(_)`, never empty even around a zero value
    Present,
    /// Identifier newtype; empty when nil
    Identifier { nil: bool },
    /// Sequences, tuples and maps; empty when they have no entries
    Collection,
    /// Nested struct; empty when every member is
    Struct,
    /// Enum variant carrying data
    Variant,
}

/// What the field serializer learned about the value's static shape
#[derive(Debug, Default)]
struct FieldProbe {
    shape: FieldShape,
}

impl FieldProbe {
    fn is_empty(&self, rendered: &Value) -> bool {
        match self.shape {
            FieldShape::Absent => true,
            FieldShape::Present | FieldShape::Variant => false,
            FieldShape::Identifier { nil } => nil,
            FieldShape::Collection => match rendered {
                Value::Array(items) => items.is_empty(),
                Value::Object(entries) => entries.is_empty(),
                _ => false,
            },
            FieldShape::Struct | FieldShape::Value => is_empty_value(rendered),
        }
    }
}

/// Renders one field value, recording its outermost shape
struct FieldSerializer<'p> {
    probe: &'p mut FieldProbe,
}

impl Serializer for FieldSerializer<'_> {
    type Ok = Value;
    type Error = serde_json::Error;
    type SerializeSeq = <ValueSerializer as Serializer>::SerializeSeq;
    type SerializeTuple = <ValueSerializer as Serializer>::SerializeTuple;
    type SerializeTupleStruct = <ValueSerializer as Serializer>::SerializeTupleStruct;
    type SerializeTupleVariant = <ValueSerializer as Serializer>::SerializeTupleVariant;
    type SerializeMap = <ValueSerializer as Serializer>::SerializeMap;
    type SerializeStruct = <ValueSerializer as Serializer>::SerializeStruct;
    type SerializeStructVariant = <ValueSerializer as Serializer>::SerializeStructVariant;

    fn serialize_bool(self, v: bool) -> Result<Value, serde_json::Error> {
        ValueSerializer.serialize_bool(v)
    }

    fn serialize_i8(self, v: i8) -> Result<Value, serde_json::Error> {
        ValueSerializer.serialize_i8(v)
    }

    fn serialize_i16(self, v: i16) -> Result<Value, serde_json::Error> {
        ValueSerializer.serialize_i16(v)
    }

    fn serialize_i32(self, v: i32) -> Result<Value, serde_json::Error> {
        ValueSerializer.serialize_i32(v)
    }

    fn serialize_i64(self, v: i64) -> Result<Value, serde_json::Error> {
        ValueSerializer.serialize_i64(v)
    }

    fn serialize_i128(self, v: i128) -> Result<Value, serde_json::Error> {
        ValueSerializer.serialize_i128(v)
    }

    fn serialize_u8(self, v: u8) -> Result<Value, serde_json::Error> {
        ValueSerializer.serialize_u8(v)
    }

    fn serialize_u16(self, v: u16) -> Result<Value, serde_json::Error> {
        ValueSerializer.serialize_u16(v)
    }

    fn serialize_u32(self, v: u32) -> Result<Value, serde_json::Error> {
        ValueSerializer.serialize_u32(v)
    }

    fn serialize_u64(self, v: u64) -> Result<Value, serde_json::Error> {
        ValueSerializer.serialize_u64(v)
    }

    fn serialize_u128(self, v: u128) -> Result<Value, serde_json::Error> {
        ValueSerializer.serialize_u128(v)
    }

    fn serialize_f32(self, v: f32) -> Result<Value, serde_json::Error> {
        ValueSerializer.serialize_f32(v)
    }

    fn serialize_f64(self, v: f64) -> Result<Value, serde_json::Error> {
        ValueSerializer.serialize_f64(v)
    }

    fn serialize_char(self, v: char) -> Result<Value, serde_json::Error> {
        ValueSerializer.serialize_char(v)
    }

    fn serialize_str(self, v: &str) -> Result<Value, serde_json::Error> {
        ValueSerializer.serialize_str(v)
    }

    fn serialize_bytes(self, v: &[u8]) -> Result<Value, serde_json::Error> {
        ValueSerializer.serialize_bytes(v)
    }

    fn serialize_none(self) -> Result<Value, serde_json::Error> {
        self.probe.shape = FieldShape::Absent;
        ValueSerializer.serialize_none()
    }

    fn serialize_some<T: ?Sized + Serialize>(self, value: &T) -> Result<Value, serde_json::Error> {
        self.probe.shape = FieldShape::Present;
        value.serialize(ValueSerializer)
    }

    fn serialize_unit(self) -> Result<Value, serde_json::Error> {
        ValueSerializer.serialize_unit()
    }

    fn serialize_unit_struct(self, name: &'static str) -> Result<Value, serde_json::Error> {
        ValueSerializer.serialize_unit_struct(name)
    }

    fn serialize_unit_variant(
        self,
        name: &'static str,
        variant_index: u32,
        variant: &'static str,
    ) -> Result<Value, serde_json::Error> {
        ValueSerializer.serialize_unit_variant(name, variant_index, variant)
    }

    fn serialize_newtype_struct<T: ?Sized + Serialize>(
        self,
        name: &'static str,
        value: &T,
    ) -> Result<Value, serde_json::Error> {
        if name == DOCUMENT_ID_TOKEN {
            let rendered = value.serialize(ValueSerializer)?;
            let is_nil = rendered
                .as_str()
                .is_some_and(|hex| hex.bytes().all(|b| b == b'0'));
            self.probe.shape = FieldShape::Identifier { nil: is_nil };
            return Ok(rendered);
        }
        value.serialize(self)
    }

    fn serialize_newtype_variant<T: ?Sized + Serialize>(
        self,
        name: &'static str,
        variant_index: u32,
        variant: &'static str,
        value: &T,
    ) -> Result<Value, serde_json::Error> {
        self.probe.shape = FieldShape::Variant;
        ValueSerializer.serialize_newtype_variant(name, variant_index, variant, value)
    }

    fn serialize_seq(self, len: Option<usize>) -> Result<Self::SerializeSeq, serde_json::Error> {
        self.probe.shape = FieldShape::Collection;
        ValueSerializer.serialize_seq(len)
    }

    fn serialize_tuple(self, len: usize) -> Result<Self::SerializeTuple, serde_json::Error> {
        self.probe.shape = FieldShape::Collection;
        ValueSerializer.serialize_tuple(len)
    }

    fn serialize_tuple_struct(
        self,
        name: &'static str,
        len: usize,
    ) -> Result<Self::SerializeTupleStruct, serde_json::Error> {
        self.probe.shape = FieldShape::Collection;
        ValueSerializer.serialize_tuple_struct(name, len)
    }

    fn serialize_tuple_variant(
        self,
        name: &'static str,
        variant_index: u32,
        variant: &'static str,
        len: usize,
    ) -> Result<Self::SerializeTupleVariant, serde_json::Error> {
        self.probe.shape = FieldShape::Variant;
        ValueSerializer.serialize_tuple_variant(name, variant_index, variant, len)
    }

    fn serialize_map(self, len: Option<usize>) -> Result<Self::SerializeMap, serde_json::Error> {
        self.probe.shape = FieldShape::Collection;
        ValueSerializer.serialize_map(len)
    }

    fn serialize_struct(
        self,
        name: &'static str,
        len: usize,
    ) -> Result<Self::SerializeStruct, serde_json::Error> {
        self.probe.shape = FieldShape::Struct;
        ValueSerializer.serialize_struct(name, len)
    }

    fn serialize_struct_variant(
        self,
        name: &'static str,
        variant_index: u32,
        variant: &'static str,
        len: usize,
    ) -> Result<Self::SerializeStructVariant, serde_json::Error> {
        self.probe.shape = FieldShape::Variant;
        ValueSerializer.serialize_struct_variant(name, variant_index, variant, len)
    }
}
