use std::fmt;

use bytes::Bytes;
use ordered_float::OrderedFloat;
use serde::de::value::{MapDeserializer, SeqDeserializer};
use serde::de::{self, DeserializeOwned, DeserializeSeed, Deserializer, IntoDeserializer, Visitor};
use serde::ser::{self, Serialize};
use serde::forward_to_deserialize_any;

use crate::decimal::Decimal;
use crate::error::{StratumError, StratumResult};
use crate::model::Model;
use crate::schema::ModelSchema;
use crate::value::{TaggedValue, Value};

#[derive(Debug, thiserror::Error)]
#[error("{0}")]
pub struct SerdeError(String);

impl ser::Error for SerdeError {
    fn custom<T: fmt::Display>(msg: T) -> Self {
        Self(msg.to_string())
    }
}

impl de::Error for SerdeError {
    fn custom<T: fmt::Display>(msg: T) -> Self {
        Self(msg.to_string())
    }
}

impl From<SerdeError> for StratumError {
    fn from(err: SerdeError) -> Self {
        StratumError::Serde(err.0)
    }
}

fn unexpected(expected: &str, found: &Value) -> SerdeError {
    SerdeError(format!("expected {expected}, found {}", found.kind()))
}

pub fn to_value<T: Serialize + ?Sized>(value: &T) -> Result<Value, SerdeError> {
    value.serialize(ValueSerializer)
}

pub fn from_value<T: DeserializeOwned>(value: Value) -> Result<T, SerdeError> {
    T::deserialize(value)
}

/// Serde-backed [`Model`]: rows are serialized, then validated against the
/// declared schema so identifiers, decimals and timestamps reach their
/// canonical form.
pub trait SerdeModel: Serialize + DeserializeOwned {
    fn model_schema() -> ModelSchema;
}

impl<T: SerdeModel> Model for T {
    fn model_schema() -> ModelSchema {
        <T as SerdeModel>::model_schema()
    }

    fn to_value(&self) -> StratumResult<Value> {
        let raw = to_value(self)?;
        Ok(<T as SerdeModel>::model_schema().validate(&raw)?)
    }

    fn from_value(value: Value) -> StratumResult<Self> {
        Ok(from_value(value)?)
    }
}

/// Enum variants become [`Value::Tagged`]; structs become records in field
/// declaration order.
struct ValueSerializer;

impl ser::Serializer for ValueSerializer {
    type Ok = Value;
    type Error = SerdeError;
    type SerializeSeq = ListBuilder;
    type SerializeTuple = ListBuilder;
    type SerializeTupleStruct = ListBuilder;
    type SerializeTupleVariant = ListBuilder;
    type SerializeMap = MapBuilder;
    type SerializeStruct = RecordBuilder;
    type SerializeStructVariant = RecordBuilder;

    fn serialize_bool(self, v: bool) -> Result<Value, SerdeError> {
        Ok(Value::Bool(v))
    }

    fn serialize_i8(self, v: i8) -> Result<Value, SerdeError> {
        Ok(Value::Int(v.into()))
    }

    fn serialize_i16(self, v: i16) -> Result<Value, SerdeError> {
        Ok(Value::Int(v.into()))
    }

    fn serialize_i32(self, v: i32) -> Result<Value, SerdeError> {
        Ok(Value::Int(v.into()))
    }

    fn serialize_i64(self, v: i64) -> Result<Value, SerdeError> {
        Ok(Value::Int(v))
    }

    /// Out-of-range values fall back to a scale-0 decimal.
    fn serialize_i128(self, v: i128) -> Result<Value, SerdeError> {
        Ok(match i64::try_from(v) {
            Ok(small) => Value::Int(small),
            Err(_) => Value::Decimal(Decimal::new(v, 0)),
        })
    }

    fn serialize_u8(self, v: u8) -> Result<Value, SerdeError> {
        Ok(Value::UInt(v.into()))
    }

    fn serialize_u16(self, v: u16) -> Result<Value, SerdeError> {
        Ok(Value::UInt(v.into()))
    }

    fn serialize_u32(self, v: u32) -> Result<Value, SerdeError> {
        Ok(Value::UInt(v.into()))
    }

    fn serialize_u64(self, v: u64) -> Result<Value, SerdeError> {
        Ok(Value::UInt(v))
    }

    fn serialize_u128(self, v: u128) -> Result<Value, SerdeError> {
        match i128::try_from(v) {
            Ok(signed) => self.serialize_i128(signed),
            Err(_) => Err(SerdeError(format!("{v} does not fit a decimal"))),
        }
    }

    fn serialize_f32(self, v: f32) -> Result<Value, SerdeError> {
        Ok(Value::Float32(OrderedFloat(v)))
    }

    fn serialize_f64(self, v: f64) -> Result<Value, SerdeError> {
        Ok(Value::Float64(OrderedFloat(v)))
    }

    fn serialize_char(self, v: char) -> Result<Value, SerdeError> {
        Ok(Value::String(v.into()))
    }

    fn serialize_str(self, v: &str) -> Result<Value, SerdeError> {
        Ok(Value::String(v.into()))
    }

    fn serialize_bytes(self, v: &[u8]) -> Result<Value, SerdeError> {
        Ok(Value::Bytes(Bytes::copy_from_slice(v)))
    }

    fn serialize_none(self) -> Result<Value, SerdeError> {
        Ok(Value::Null)
    }

    fn serialize_some<T: ?Sized + Serialize>(self, value: &T) -> Result<Value, SerdeError> {
        value.serialize(self)
    }

    fn serialize_unit(self) -> Result<Value, SerdeError> {
        Ok(Value::Null)
    }

    fn serialize_unit_struct(self, _: &'static str) -> Result<Value, SerdeError> {
        Ok(Value::Null)
    }

    fn serialize_unit_variant(
        self,
        _: &'static str,
        _: u32,
        variant: &'static str,
    ) -> Result<Value, SerdeError> {
        Ok(Value::Tagged(TaggedValue::unit(variant)))
    }

    fn serialize_newtype_struct<T: ?Sized + Serialize>(
        self,
        _: &'static str,
        value: &T,
    ) -> Result<Value, SerdeError> {
        value.serialize(self)
    }

    fn serialize_newtype_variant<T: ?Sized + Serialize>(
        self,
        _: &'static str,
        _: u32,
        variant: &'static str,
        value: &T,
    ) -> Result<Value, SerdeError> {
        Ok(Value::tagged(variant, value.serialize(self)?))
    }

    fn serialize_seq(self, len: Option<usize>) -> Result<ListBuilder, SerdeError> {
        Ok(ListBuilder::new(None, len.unwrap_or(0)))
    }

    fn serialize_tuple(self, len: usize) -> Result<ListBuilder, SerdeError> {
        Ok(ListBuilder::new(None, len))
    }

    fn serialize_tuple_struct(self, _: &'static str, len: usize) -> Result<ListBuilder, SerdeError> {
        Ok(ListBuilder::new(None, len))
    }

    fn serialize_tuple_variant(
        self,
        _: &'static str,
        _: u32,
        variant: &'static str,
        len: usize,
    ) -> Result<ListBuilder, SerdeError> {
        Ok(ListBuilder::new(Some(variant), len))
    }

    fn serialize_map(self, len: Option<usize>) -> Result<MapBuilder, SerdeError> {
        Ok(MapBuilder {
            entries: Vec::with_capacity(len.unwrap_or(0)),
            key: None,
        })
    }

    fn serialize_struct(self, _: &'static str, len: usize) -> Result<RecordBuilder, SerdeError> {
        Ok(RecordBuilder::new(None, len))
    }

    fn serialize_struct_variant(
        self,
        _: &'static str,
        _: u32,
        variant: &'static str,
        len: usize,
    ) -> Result<RecordBuilder, SerdeError> {
        Ok(RecordBuilder::new(Some(variant), len))
    }
}

fn wrap_variant(tag: Option<&'static str>, value: Value) -> Value {
    match tag {
        Some(tag) => Value::tagged(tag, value),
        None => value,
    }
}

/// Sequences, tuples and tuple variants. A tag wraps the list as the payload
/// of that variant.
struct ListBuilder {
    tag: Option<&'static str>,
    items: Vec<Value>,
}

impl ListBuilder {
    fn new(tag: Option<&'static str>, len: usize) -> Self {
        Self {
            tag,
            items: Vec::with_capacity(len),
        }
    }

    fn push<T: ?Sized + Serialize>(&mut self, value: &T) -> Result<(), SerdeError> {
        self.items.push(value.serialize(ValueSerializer)?);
        Ok(())
    }

    fn finish(self) -> Value {
        wrap_variant(self.tag, Value::List(self.items))
    }
}

macro_rules! list_builder_impl {
    ($($trait:ident::$method:ident),* $(,)?) => {$(
        impl ser::$trait for ListBuilder {
            type Ok = Value;
            type Error = SerdeError;

            fn $method<T: ?Sized + Serialize>(&mut self, value: &T) -> Result<(), SerdeError> {
                self.push(value)
            }

            fn end(self) -> Result<Value, SerdeError> {
                Ok(self.finish())
            }
        }
    )*};
}

list_builder_impl!(
    SerializeSeq::serialize_element,
    SerializeTuple::serialize_element,
    SerializeTupleStruct::serialize_field,
    SerializeTupleVariant::serialize_field,
);

struct RecordBuilder {
    tag: Option<&'static str>,
    fields: Vec<(String, Value)>,
}

impl RecordBuilder {
    fn new(tag: Option<&'static str>, len: usize) -> Self {
        Self {
            tag,
            fields: Vec::with_capacity(len),
        }
    }

    fn push<T: ?Sized + Serialize>(&mut self, key: &str, value: &T) -> Result<(), SerdeError> {
        self.fields
            .push((key.to_owned(), value.serialize(ValueSerializer)?));
        Ok(())
    }
}

impl ser::SerializeStruct for RecordBuilder {
    type Ok = Value;
    type Error = SerdeError;

    fn serialize_field<T: ?Sized + Serialize>(
        &mut self,
        key: &'static str,
        value: &T,
    ) -> Result<(), SerdeError> {
        self.push(key, value)
    }

    fn end(self) -> Result<Value, SerdeError> {
        Ok(wrap_variant(self.tag, Value::Record(self.fields)))
    }
}

impl ser::SerializeStructVariant for RecordBuilder {
    type Ok = Value;
    type Error = SerdeError;

    fn serialize_field<T: ?Sized + Serialize>(
        &mut self,
        key: &'static str,
        value: &T,
    ) -> Result<(), SerdeError> {
        self.push(key, value)
    }

    fn end(self) -> Result<Value, SerdeError> {
        ser::SerializeStruct::end(self)
    }
}

struct MapBuilder {
    entries: Vec<(Value, Value)>,
    key: Option<Value>,
}

impl ser::SerializeMap for MapBuilder {
    type Ok = Value;
    type Error = SerdeError;

    fn serialize_key<T: ?Sized + Serialize>(&mut self, key: &T) -> Result<(), SerdeError> {
        self.key = Some(key.serialize(ValueSerializer)?);
        Ok(())
    }

    fn serialize_value<T: ?Sized + Serialize>(&mut self, value: &T) -> Result<(), SerdeError> {
        let key = self
            .key
            .take()
            .ok_or_else(|| SerdeError("map value without a key".into()))?;
        self.entries.push((key, value.serialize(ValueSerializer)?));
        Ok(())
    }

    fn end(self) -> Result<Value, SerdeError> {
        Ok(Value::Map(self.entries))
    }
}

impl<'de> IntoDeserializer<'de, SerdeError> for Value {
    type Deserializer = Value;

    fn into_deserializer(self) -> Value {
        self
    }
}

fn visit_list<'de, V: Visitor<'de>>(items: Vec<Value>, visitor: V) -> Result<V::Value, SerdeError> {
    SeqDeserializer::<_, SerdeError>::new(items.into_iter()).deserialize_any(visitor)
}

/// Rich scalars without a serde counterpart (decimals, temporals,
/// identifiers) are offered to visitors as their canonical text.
impl<'de> Deserializer<'de> for Value {
    type Error = SerdeError;

    fn deserialize_any<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, SerdeError> {
        match self {
            Value::Null => visitor.visit_unit(),
            Value::Bool(v) => visitor.visit_bool(v),
            Value::Int(v) => visitor.visit_i64(v),
            Value::UInt(v) => visitor.visit_u64(v),
            Value::Float32(v) => visitor.visit_f32(v.into_inner()),
            Value::Float64(v) => visitor.visit_f64(v.into_inner()),
            Value::String(s) => visitor.visit_string(s),
            Value::Bytes(b) => visitor.visit_byte_buf(b.to_vec()),
            Value::Decimal(d) => visitor.visit_string(d.to_string()),
            Value::Timestamp(ts) => visitor.visit_string(ts.to_rfc3339()),
            Value::NaiveTimestamp(ts) => {
                visitor.visit_string(ts.format("%Y-%m-%dT%H:%M:%S%.f").to_string())
            }
            Value::Date(d) => visitor.visit_string(d.to_string()),
            Value::Time(t) => visitor.visit_string(t.to_string()),
            Value::Uuid(u) => visitor.visit_string(u.to_string()),
            Value::Ulid(u) => visitor.visit_string(u.to_string()),
            Value::List(items) => visit_list(items, visitor),
            Value::Map(entries) => MapDeserializer::<_, SerdeError>::new(entries.into_iter())
                .deserialize_any(visitor),
            Value::Record(fields) => MapDeserializer::<_, SerdeError>::new(
                fields
                    .into_iter()
                    .map(|(name, value)| (Value::String(name), value)),
            )
            .deserialize_any(visitor),
            Value::Tagged(TaggedValue { tag, value }) => visitor.visit_enum(Variant {
                tag,
                payload: *value,
            }),
        }
    }

    fn deserialize_option<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, SerdeError> {
        match self {
            Value::Null => visitor.visit_none(),
            other => visitor.visit_some(other),
        }
    }

    /// Byte payloads also read as `Vec<u8>` through the sequence path.
    fn deserialize_seq<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, SerdeError> {
        match self {
            Value::Bytes(bytes) => visit_list(
                bytes.iter().map(|b| Value::UInt(u64::from(*b))).collect(),
                visitor,
            ),
            other => other.deserialize_any(visitor),
        }
    }

    fn deserialize_newtype_struct<V: Visitor<'de>>(
        self,
        _: &'static str,
        visitor: V,
    ) -> Result<V::Value, SerdeError> {
        visitor.visit_newtype_struct(self)
    }

    /// Unit variants may also arrive as a bare variant name.
    fn deserialize_enum<V: Visitor<'de>>(
        self,
        _: &'static str,
        _: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value, SerdeError> {
        match self {
            Value::Tagged(TaggedValue { tag, value }) => visitor.visit_enum(Variant {
                tag,
                payload: *value,
            }),
            Value::String(name) => {
                visitor.visit_enum(IntoDeserializer::<SerdeError>::into_deserializer(name))
            }
            other => Err(unexpected("tagged value for enum", &other)),
        }
    }

    forward_to_deserialize_any! {
        bool i8 i16 i32 i64 i128 u8 u16 u32 u64 u128 f32 f64 char str string bytes byte_buf
        unit unit_struct tuple tuple_struct map struct identifier ignored_any
    }
}

struct Variant {
    tag: String,
    payload: Value,
}

impl<'de> de::EnumAccess<'de> for Variant {
    type Error = SerdeError;
    type Variant = Payload;

    fn variant_seed<S: DeserializeSeed<'de>>(
        self,
        seed: S,
    ) -> Result<(S::Value, Payload), SerdeError> {
        let tag = seed.deserialize(IntoDeserializer::<SerdeError>::into_deserializer(self.tag))?;
        Ok((tag, Payload(self.payload)))
    }
}

struct Payload(Value);

impl<'de> de::VariantAccess<'de> for Payload {
    type Error = SerdeError;

    fn unit_variant(self) -> Result<(), SerdeError> {
        match self.0 {
            Value::Null => Ok(()),
            other => Err(unexpected("no payload for unit variant", &other)),
        }
    }

    fn newtype_variant_seed<S: DeserializeSeed<'de>>(self, seed: S) -> Result<S::Value, SerdeError> {
        seed.deserialize(self.0)
    }

    fn tuple_variant<V: Visitor<'de>>(self, _: usize, visitor: V) -> Result<V::Value, SerdeError> {
        match self.0 {
            Value::List(items) => visit_list(items, visitor),
            other => Err(unexpected("list payload for tuple variant", &other)),
        }
    }

    fn struct_variant<V: Visitor<'de>>(
        self,
        _: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value, SerdeError> {
        self.0.deserialize_any(visitor)
    }
}
