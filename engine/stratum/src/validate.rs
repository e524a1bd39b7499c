//! Value validation with lax coercion.
//!
//! Walking a value against a [`TypeDescriptor`] yields the canonical value
//! (strings parsed into identifiers, decimals and temporals, defaults filled
//! in, unknown record fields dropped) or every failure found on the way.

use std::collections::HashSet;
use std::str::FromStr;

use bytes::Bytes;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime};
use ordered_float::OrderedFloat;
use ulid::Ulid;
use uuid::Uuid;

use crate::decimal::Decimal;
use crate::error::{FieldError, ValidationError};
use crate::schema::{
    Constraint, Definition, EnumDef, EnumValue, IdentifierKind, ModelSchema, ScalarKind,
    StructDef, TagUnionDef, TemporalKind, TypeDescriptor,
};
use crate::value::{TaggedValue, Value};

const REQUIRED: &str = "a value (field required)";

impl ModelSchema {
    /// Validate a value against the root type and return its coerced form.
    pub fn validate(&self, value: &Value) -> Result<Value, ValidationError> {
        self.validate_as(self.root_type(), value)
    }

    /// Validate a value against any type expressed in this schema's namespace.
    pub fn validate_as(
        &self,
        ty: &TypeDescriptor,
        value: &Value,
    ) -> Result<Value, ValidationError> {
        let mut validator = Validator {
            schema: self,
            errors: Vec::new(),
            stack: HashSet::new(),
        };
        let coerced = validator.check(ty, value, "");
        if validator.errors.is_empty() {
            Ok(coerced)
        } else {
            Err(ValidationError::new(validator.errors))
        }
    }
}

struct Validator<'a> {
    schema: &'a ModelSchema,
    errors: Vec<FieldError>,
    stack: HashSet<String>,
}

impl Validator<'_> {
    fn fail(&mut self, path: &str, expected: impl Into<String>, actual: &Value) -> Value {
        self.errors.push(FieldError {
            path: path.to_owned(),
            expected: expected.into(),
            actual: actual.summary(),
        });
        Value::Null
    }

    fn check(&mut self, ty: &TypeDescriptor, value: &Value, path: &str) -> Value {
        match ty {
            TypeDescriptor::Optional(inner) => {
                if value.is_null() {
                    Value::Null
                } else {
                    self.check(inner, value, path)
                }
            }
            TypeDescriptor::Any => value.clone(),
            _ if value.is_null() => self.fail(path, REQUIRED, value),
            TypeDescriptor::Scalar(kind) => self.check_scalar(*kind, value, path),
            TypeDescriptor::List(inner) => match value {
                Value::List(items) => Value::List(
                    items
                        .iter()
                        .enumerate()
                        .map(|(i, item)| self.check(inner, item, &format!("{path}[{i}]")))
                        .collect(),
                ),
                _ => self.fail(path, "list", value),
            },
            TypeDescriptor::Map(key_ty, value_ty) => self.check_map(key_ty, value_ty, value, path),
            TypeDescriptor::Tuple(items) => match value {
                Value::List(values) if values.len() == items.len() => Value::List(
                    items
                        .iter()
                        .zip(values)
                        .enumerate()
                        .map(|(i, (ty, item))| self.check(ty, item, &format!("{path}[{i}]")))
                        .collect(),
                ),
                _ => self.fail(path, format!("tuple of {} items", items.len()), value),
            },
            TypeDescriptor::Struct(def) => self.check_struct(def, value, path),
            TypeDescriptor::TaggedUnion(def) => self.check_union(def, value, path),
            TypeDescriptor::Enum(def) => self.check_enum(def, value, path),
            TypeDescriptor::Named(name) => self.check_named(name, value, path),
            TypeDescriptor::Decimal => match coerce_decimal(value) {
                Some(decimal) => Value::Decimal(decimal),
                None => self.fail(path, "decimal", value),
            },
            TypeDescriptor::Temporal(kind) => self.check_temporal(*kind, value, path),
            TypeDescriptor::Binary => match value {
                Value::Bytes(_) => value.clone(),
                Value::String(s) => Value::Bytes(Bytes::from(s.clone().into_bytes())),
                Value::List(items) => match byte_list(items) {
                    Some(bytes) => Value::Bytes(Bytes::from(bytes)),
                    None => self.fail(path, "bytes", value),
                },
                _ => self.fail(path, "bytes", value),
            },
            TypeDescriptor::Identifier(kind) => self.check_identifier(*kind, value, path),
            TypeDescriptor::NdArray { element, shape } => {
                self.check_ndarray(*element, shape, value, path)
            }
        }
    }

    fn check_scalar(&mut self, kind: ScalarKind, value: &Value, path: &str) -> Value {
        match kind {
            ScalarKind::Bool => match value {
                Value::Bool(_) => value.clone(),
                _ => self.fail(path, kind.name(), value),
            },
            ScalarKind::String => match value {
                Value::String(_) => value.clone(),
                _ => self.fail(path, kind.name(), value),
            },
            ScalarKind::Float32 | ScalarKind::Float64 => {
                let number = match value {
                    Value::Float64(v) => Some(v.0),
                    Value::Float32(v) => Some(f64::from(v.0)),
                    Value::Int(v) => Some(*v as f64),
                    Value::UInt(v) => Some(*v as f64),
                    _ => None,
                };
                match number {
                    Some(v) if kind == ScalarKind::Float32 => Value::Float32(OrderedFloat(v as f32)),
                    Some(v) => Value::Float64(OrderedFloat(v)),
                    None => self.fail(path, kind.name(), value),
                }
            }
            _ => {
                let Some((lo, hi)) = kind.int_bounds() else {
                    return self.fail(path, kind.name(), value);
                };
                let number = match value {
                    Value::Int(v) => Some(i128::from(*v)),
                    Value::UInt(v) => Some(i128::from(*v)),
                    Value::Float64(v) if v.0.is_finite() && v.0.fract() == 0.0 => {
                        Some(v.0 as i128)
                    }
                    Value::Float32(v) if v.0.is_finite() && v.0.fract() == 0.0 => {
                        Some(v.0 as i128)
                    }
                    _ => None,
                };
                match number {
                    Some(n) if (lo..=hi).contains(&n) => {
                        if kind.is_unsigned() {
                            Value::UInt(n as u64)
                        } else {
                            Value::Int(n as i64)
                        }
                    }
                    Some(_) => self.fail(
                        path,
                        format!("{} in range [{lo}, {hi}]", kind.name()),
                        value,
                    ),
                    None => self.fail(path, kind.name(), value),
                }
            }
        }
    }

    fn check_map(
        &mut self,
        key_ty: &TypeDescriptor,
        value_ty: &TypeDescriptor,
        value: &Value,
        path: &str,
    ) -> Value {
        let entries: Vec<(Value, &Value)> = match value {
            Value::Map(entries) => entries.iter().map(|(k, v)| (k.clone(), v)).collect(),
            Value::Record(fields) => fields
                .iter()
                .map(|(k, v)| (Value::String(k.clone()), v))
                .collect(),
            _ => return self.fail(path, "map", value),
        };
        let mut out = Vec::with_capacity(entries.len());
        for (key, item) in entries {
            let key_path = format!("{path}[{}]", key.as_str().unwrap_or("?"));
            let key = self.check(key_ty, &key, &key_path);
            let item = self.check(value_ty, item, &key_path);
            out.push((key, item));
        }
        Value::Map(out)
    }

    fn check_struct(&mut self, def: &StructDef, value: &Value, path: &str) -> Value {
        if !matches!(value, Value::Record(_) | Value::Map(_)) {
            return self.fail(path, "record", value);
        }
        let mut out = Vec::with_capacity(def.fields.len());
        for field in &def.fields {
            let field_path = join(path, &field.name);
            let coerced = match lookup_field(value, &field.name) {
                Some(item) => self.check(&field.ty, item, &field_path),
                None => match &field.default {
                    Some(default) => default.clone(),
                    None if field.ty.is_optional() => Value::Null,
                    None => {
                        self.errors.push(FieldError {
                            path: field_path.clone(),
                            expected: REQUIRED.into(),
                            actual: "missing".into(),
                        });
                        Value::Null
                    }
                },
            };
            self.check_constraints(&field.constraints, &coerced, &field_path);
            out.push((field.name.clone(), coerced));
        }
        Value::Record(out)
    }

    fn check_union(&mut self, def: &TagUnionDef, value: &Value, path: &str) -> Value {
        let Value::Tagged(tagged) = value else {
            return self.fail(path, "tagged union value", value);
        };
        let Some((_, variant)) = def.variant(&tagged.tag) else {
            let names: Vec<_> = def.variants.iter().map(|v| v.name.as_str()).collect();
            return self.fail(path, format!("one of variants [{}]", names.join(", ")), value);
        };
        let variant_path = join(path, &variant.name);
        match &variant.ty {
            Some(ty) => {
                let payload = self.check(ty, &tagged.value, &variant_path);
                Value::Tagged(TaggedValue::new(tagged.tag.clone(), payload))
            }
            None if tagged.value.is_null() => value.clone(),
            None => self.fail(&variant_path, "no payload for unit variant", &tagged.value),
        }
    }

    fn check_enum(&mut self, def: &EnumDef, value: &Value, path: &str) -> Value {
        match EnumValue::resolve(value, &def.members) {
            Some(member) if def.contains(&member) => member.to_value(),
            _ => {
                let members: Vec<_> = def
                    .members
                    .iter()
                    .map(|member| member.value.to_value().summary())
                    .collect();
                self.fail(path, format!("one of [{}]", members.join(", ")), value)
            }
        }
    }

    fn check_named(&mut self, name: &str, value: &Value, path: &str) -> Value {
        if !self.stack.insert(name.to_owned()) {
            return self.fail(
                path,
                format!("non-recursive type (cycle involving {name})"),
                value,
            );
        }
        let schema = self.schema;
        let result = match schema.definition(name) {
            Some(Definition::Struct(def)) => self.check_struct(def, value, path),
            Some(Definition::TaggedUnion(def)) => self.check_union(def, value, path),
            Some(Definition::Enum(def)) => self.check_enum(def, value, path),
            None => self.fail(path, format!("defined type '{name}'"), value),
        };
        self.stack.remove(name);
        result
    }

    fn check_temporal(&mut self, kind: TemporalKind, value: &Value, path: &str) -> Value {
        match (kind, value) {
            (TemporalKind::Timestamp { .. }, Value::Timestamp(_) | Value::NaiveTimestamp(_)) => {
                value.clone()
            }
            (TemporalKind::Timestamp { .. }, Value::String(s)) => {
                if let Ok(ts) = DateTime::parse_from_rfc3339(s) {
                    Value::Timestamp(ts)
                } else if let Ok(ts) = NaiveDateTime::from_str(s) {
                    Value::NaiveTimestamp(ts)
                } else {
                    self.fail(path, "ISO 8601 timestamp", value)
                }
            }
            (TemporalKind::Date, Value::Date(_)) => value.clone(),
            (TemporalKind::Date, Value::String(s)) => match NaiveDate::from_str(s) {
                Ok(date) => Value::Date(date),
                Err(_) => self.fail(path, "date (YYYY-MM-DD)", value),
            },
            (TemporalKind::Time, Value::Time(_)) => value.clone(),
            (TemporalKind::Time, Value::String(s)) => match NaiveTime::from_str(s) {
                Ok(time) => Value::Time(time),
                Err(_) => self.fail(path, "time (HH:MM:SS[.ffffff])", value),
            },
            (TemporalKind::Timestamp { .. }, _) => self.fail(path, "timestamp", value),
            (TemporalKind::Date, _) => self.fail(path, "date", value),
            (TemporalKind::Time, _) => self.fail(path, "time", value),
        }
    }

    fn check_identifier(&mut self, kind: IdentifierKind, value: &Value, path: &str) -> Value {
        match kind {
            IdentifierKind::Uuid { version } => {
                let uuid = match value {
                    Value::Uuid(u) => Some(*u),
                    Value::String(s) => Uuid::parse_str(s).ok(),
                    Value::Bytes(b) => Uuid::from_slice(b).ok(),
                    _ => None,
                };
                match (uuid, version) {
                    (Some(u), Some(v)) if u.get_version_num() != usize::from(v) => {
                        self.fail(path, format!("uuid version {v}"), value)
                    }
                    (Some(u), _) => Value::Uuid(u),
                    (None, _) => self.fail(path, "uuid", value),
                }
            }
            IdentifierKind::Ulid => {
                let ulid = match value {
                    Value::Ulid(u) => Some(*u),
                    Value::String(s) => Ulid::from_string(s).ok(),
                    Value::Bytes(b) => <[u8; 16]>::try_from(&b[..])
                        .ok()
                        .map(Ulid::from_bytes),
                    _ => None,
                };
                match ulid {
                    Some(u) => Value::Ulid(u),
                    None => self.fail(path, "ulid", value),
                }
            }
        }
    }

    fn check_ndarray(
        &mut self,
        element: ScalarKind,
        shape: &[Option<usize>],
        value: &Value,
        path: &str,
    ) -> Value {
        let Some((dim, rest)) = shape.split_first() else {
            return self.check_scalar(element, value, path);
        };
        let Value::List(items) = value else {
            return self.fail(path, "list (array dimension)", value);
        };
        if let Some(len) = dim {
            if items.len() != *len {
                return self.fail(path, format!("array dimension of {len} elements"), value);
            }
        }
        Value::List(
            items
                .iter()
                .enumerate()
                .map(|(i, item)| self.check_ndarray(element, rest, item, &format!("{path}[{i}]")))
                .collect(),
        )
    }

    fn check_constraints(&mut self, constraints: &[Constraint], value: &Value, path: &str) {
        if value.is_null() {
            return;
        }
        for constraint in constraints {
            let satisfied = match constraint {
                Constraint::Ge(bound) => numeric(value).map_or(true, |n| n >= *bound),
                Constraint::Le(bound) => numeric(value).map_or(true, |n| n <= *bound),
                Constraint::MinLength(min) => length(value).map_or(true, |len| len >= *min),
                Constraint::MaxLength(max) => length(value).map_or(true, |len| len <= *max),
            };
            if !satisfied {
                self.errors.push(FieldError {
                    path: path.to_owned(),
                    expected: describe(constraint),
                    actual: value.summary(),
                });
            }
        }
    }
}

fn join(path: &str, segment: &str) -> String {
    if path.is_empty() {
        segment.to_owned()
    } else {
        format!("{path}.{segment}")
    }
}

fn lookup_field<'v>(value: &'v Value, name: &str) -> Option<&'v Value> {
    match value {
        Value::Record(_) => value.get(name),
        Value::Map(entries) => entries
            .iter()
            .find(|(key, _)| key.as_str() == Some(name))
            .map(|(_, item)| item),
        _ => None,
    }
}

fn byte_list(items: &[Value]) -> Option<Vec<u8>> {
    items
        .iter()
        .map(|item| match item {
            Value::Int(v) => u8::try_from(*v).ok(),
            Value::UInt(v) => u8::try_from(*v).ok(),
            _ => None,
        })
        .collect()
}

fn coerce_decimal(value: &Value) -> Option<Decimal> {
    match value {
        Value::Decimal(d) => Some(*d),
        Value::Int(v) => Some(Decimal::from(*v)),
        Value::UInt(v) => Some(Decimal::from(*v)),
        Value::String(s) => s.parse().ok(),
        Value::Float64(v) => v.0.to_string().parse().ok(),
        Value::Float32(v) => v.0.to_string().parse().ok(),
        _ => None,
    }
}

fn numeric(value: &Value) -> Option<f64> {
    match value {
        Value::Int(v) => Some(*v as f64),
        Value::UInt(v) => Some(*v as f64),
        Value::Float32(v) => Some(f64::from(v.0)),
        Value::Float64(v) => Some(v.0),
        Value::Decimal(d) => Some(d.to_f64()),
        _ => None,
    }
}

fn length(value: &Value) -> Option<usize> {
    match value {
        Value::String(s) => Some(s.chars().count()),
        Value::Bytes(b) => Some(b.len()),
        Value::List(items) => Some(items.len()),
        Value::Map(entries) => Some(entries.len()),
        _ => None,
    }
}

fn describe(constraint: &Constraint) -> String {
    match constraint {
        Constraint::Ge(bound) => format!("value >= {bound}"),
        Constraint::Le(bound) => format!("value <= {bound}"),
        Constraint::MinLength(min) => format!("length >= {min}"),
        Constraint::MaxLength(max) => format!("length <= {max}"),
    }
}
