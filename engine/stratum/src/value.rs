use std::fmt::{self, Display, Formatter};

use bytes::Bytes;
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime};
use ordered_float::OrderedFloat;
use ulid::Ulid;
use uuid::Uuid;

use crate::decimal::Decimal;

/// Active member of a tagged union: the variant name plus its payload
/// (`Value::Null` for unit variants).
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct TaggedValue {
    pub tag: String,
    pub value: Box<Value>,
}

impl TaggedValue {
    pub fn new(tag: impl Into<String>, value: Value) -> Self {
        Self {
            tag: tag.into(),
            value: Box::new(value),
        }
    }

    pub fn unit(tag: impl Into<String>) -> Self {
        Self::new(tag, Value::Null)
    }
}

/// Dynamic value tree exchanged with the columnar layer.
///
/// Records keep their fields in declaration order. Timestamps compare by
/// instant, decimals compare numerically.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float32(OrderedFloat<f32>),
    Float64(OrderedFloat<f64>),
    String(String),
    /// Reference-counted so encoders can alias large payloads.
    Bytes(Bytes),
    Decimal(Decimal),
    Timestamp(DateTime<FixedOffset>),
    NaiveTimestamp(NaiveDateTime),
    Date(NaiveDate),
    Time(NaiveTime),
    Uuid(Uuid),
    Ulid(Ulid),
    List(Vec<Value>),
    Map(Vec<(Value, Value)>),
    Record(Vec<(String, Value)>),
    Tagged(TaggedValue),
}

impl Value {
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::UInt(_) => "uint",
            Value::Float32(_) => "f32",
            Value::Float64(_) => "f64",
            Value::String(_) => "string",
            Value::Bytes(_) => "bytes",
            Value::Decimal(_) => "decimal",
            Value::Timestamp(_) => "timestamp",
            Value::NaiveTimestamp(_) => "naive_timestamp",
            Value::Date(_) => "date",
            Value::Time(_) => "time",
            Value::Uuid(_) => "uuid",
            Value::Ulid(_) => "ulid",
            Value::List(_) => "list",
            Value::Map(_) => "map",
            Value::Record(_) => "record",
            Value::Tagged(_) => "tagged",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Build a record from `(name, value)` pairs, preserving their order.
    pub fn record<K, I>(fields: I) -> Value
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, Value)>,
    {
        Value::Record(
            fields
                .into_iter()
                .map(|(name, value)| (name.into(), value))
                .collect(),
        )
    }

    pub fn tagged(tag: impl Into<String>, value: Value) -> Value {
        Value::Tagged(TaggedValue::new(tag, value))
    }

    pub fn bytes(data: impl Into<Bytes>) -> Value {
        Value::Bytes(data.into())
    }

    /// Look up a record field by name.
    pub fn get(&self, field: &str) -> Option<&Value> {
        match self {
            Value::Record(fields) => fields
                .iter()
                .find(|(name, _)| name == field)
                .map(|(_, value)| value),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Short description used in error messages.
    pub fn summary(&self) -> String {
        const MAX_TEXT: usize = 32;
        match self {
            Value::Null => "null".into(),
            Value::Bool(v) => format!("bool {v}"),
            Value::Int(v) => format!("int {v}"),
            Value::UInt(v) => format!("uint {v}"),
            Value::Float32(v) => format!("f32 {v}"),
            Value::Float64(v) => format!("f64 {v}"),
            Value::String(s) => {
                if s.chars().count() > MAX_TEXT {
                    let head: String = s.chars().take(MAX_TEXT).collect();
                    format!("string {head:?}...")
                } else {
                    format!("string {s:?}")
                }
            }
            Value::Bytes(b) => format!("bytes(len={})", b.len()),
            Value::Decimal(d) => format!("decimal {d}"),
            Value::Timestamp(ts) => format!("timestamp {}", ts.to_rfc3339()),
            Value::NaiveTimestamp(ts) => format!("naive timestamp {ts}"),
            Value::Date(d) => format!("date {d}"),
            Value::Time(t) => format!("time {t}"),
            Value::Uuid(u) => format!("uuid {u}"),
            Value::Ulid(u) => format!("ulid {u}"),
            Value::List(items) => format!("list(len={})", items.len()),
            Value::Map(entries) => format!("map(len={})", entries.len()),
            Value::Record(fields) => {
                let names: Vec<&str> = fields.iter().map(|(name, _)| name.as_str()).collect();
                format!("record {{{}}}", names.join(", "))
            }
            Value::Tagged(tagged) => format!("tagged {}", tagged.tag),
        }
    }
}

impl Display for Value {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.summary())
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Int(value as i64)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Int(value)
    }
}

impl From<u64> for Value {
    fn from(value: u64) -> Self {
        Value::UInt(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Float64(OrderedFloat(value))
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.to_owned())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::String(value)
    }
}

impl From<Decimal> for Value {
    fn from(value: Decimal) -> Self {
        Value::Decimal(value)
    }
}

impl From<Uuid> for Value {
    fn from(value: Uuid) -> Self {
        Value::Uuid(value)
    }
}

impl From<Ulid> for Value {
    fn from(value: Ulid) -> Self {
        Value::Ulid(value)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Value::Null, Into::into)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(values: Vec<T>) -> Self {
        Value::List(values.into_iter().map(Into::into).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_lookup_preserves_order() {
        let row = Value::record([("name", Value::from("Ann")), ("age", Value::from(30))]);
        assert_eq!(row.get("age"), Some(&Value::Int(30)));
        assert_eq!(row.get("missing"), None);
        assert_eq!(row.summary(), "record {name, age}");
    }

    #[test]
    fn timestamps_compare_by_instant() {
        let utc = DateTime::parse_from_rfc3339("2024-01-01T10:00:00+00:00").expect("utc");
        let cet = DateTime::parse_from_rfc3339("2024-01-01T11:00:00+01:00").expect("cet");
        assert_eq!(Value::Timestamp(utc), Value::Timestamp(cet));
    }

    #[test]
    fn long_strings_are_truncated_in_summaries() {
        let value = Value::from("x".repeat(100));
        let summary = value.summary();
        assert!(summary.ends_with("..."));
        assert!(summary.len() < 50);
    }

    #[test]
    fn option_converts_to_null() {
        assert_eq!(Value::from(None::<i64>), Value::Null);
        assert_eq!(Value::from(Some("x")), Value::String("x".into()));
    }
}
