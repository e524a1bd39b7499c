use std::collections::BTreeMap;

use crate::error::{StratumError, StratumResult};
use crate::value::Value;

/// A structured type definition: the model identity plus a root record type
/// and the named definitions it refers to.
#[derive(Clone, Debug, PartialEq)]
pub struct ModelSchema {
    identity: String,
    description: Option<String>,
    defs: BTreeMap<String, Definition>,
    root: TypeDescriptor,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Definition {
    Struct(StructDef),
    TaggedUnion(TagUnionDef),
    Enum(EnumDef),
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct StructDef {
    pub fields: Vec<Field>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Field {
    pub name: String,
    pub ty: TypeDescriptor,
    pub default: Option<Value>,
    pub constraints: Vec<Constraint>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Constraint {
    Ge(f64),
    Le(f64),
    MinLength(usize),
    MaxLength(usize),
}

#[derive(Clone, Debug, PartialEq)]
pub struct TagUnionDef {
    pub variants: Vec<UnionVariant>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct UnionVariant {
    pub name: String,
    pub ty: Option<TypeDescriptor>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct EnumDef {
    pub members: Vec<EnumMember>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct EnumMember {
    pub name: String,
    pub value: EnumValue,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum EnumValue {
    Int(i64),
    Str(String),
}

#[derive(Clone, Debug, PartialEq)]
pub enum TypeDescriptor {
    Scalar(ScalarKind),
    Optional(Box<TypeDescriptor>),
    List(Box<TypeDescriptor>),
    Map(Box<TypeDescriptor>, Box<TypeDescriptor>),
    Tuple(Vec<TypeDescriptor>),
    Struct(Box<StructDef>),
    TaggedUnion(Box<TagUnionDef>),
    Enum(Box<EnumDef>),
    Named(String),
    /// Precision and scale are fixed by the conversion config.
    Decimal,
    Temporal(TemporalKind),
    Binary,
    Identifier(IdentifierKind),
    NdArray {
        element: ScalarKind,
        shape: Vec<Option<usize>>,
    },
    Any,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ScalarKind {
    Bool,
    Int8,
    Int16,
    Int32,
    Int64,
    UInt8,
    UInt16,
    UInt32,
    UInt64,
    Float32,
    Float64,
    String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TemporalKind {
    Timestamp { tz_aware: bool },
    Date,
    Time,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum IdentifierKind {
    Uuid { version: Option<u8> },
    Ulid,
}

impl ScalarKind {
    pub fn name(self) -> &'static str {
        match self {
            ScalarKind::Bool => "bool",
            ScalarKind::Int8 => "int8",
            ScalarKind::Int16 => "int16",
            ScalarKind::Int32 => "int32",
            ScalarKind::Int64 => "int64",
            ScalarKind::UInt8 => "uint8",
            ScalarKind::UInt16 => "uint16",
            ScalarKind::UInt32 => "uint32",
            ScalarKind::UInt64 => "uint64",
            ScalarKind::Float32 => "float32",
            ScalarKind::Float64 => "float64",
            ScalarKind::String => "string",
        }
    }

    /// Inclusive value range of integer kinds.
    pub fn int_bounds(self) -> Option<(i128, i128)> {
        let bounds = match self {
            ScalarKind::Int8 => (i8::MIN.into(), i8::MAX.into()),
            ScalarKind::Int16 => (i16::MIN.into(), i16::MAX.into()),
            ScalarKind::Int32 => (i32::MIN.into(), i32::MAX.into()),
            ScalarKind::Int64 => (i64::MIN.into(), i64::MAX.into()),
            ScalarKind::UInt8 => (0, u8::MAX.into()),
            ScalarKind::UInt16 => (0, u16::MAX.into()),
            ScalarKind::UInt32 => (0, u32::MAX.into()),
            ScalarKind::UInt64 => (0, u64::MAX.into()),
            _ => return None,
        };
        Some(bounds)
    }

    pub fn is_integer(self) -> bool {
        self.int_bounds().is_some()
    }

    pub fn is_unsigned(self) -> bool {
        matches!(
            self,
            ScalarKind::UInt8 | ScalarKind::UInt16 | ScalarKind::UInt32 | ScalarKind::UInt64
        )
    }

    pub fn is_float(self) -> bool {
        matches!(self, ScalarKind::Float32 | ScalarKind::Float64)
    }
}

impl Field {
    pub fn new(name: impl Into<String>, ty: TypeDescriptor) -> Self {
        Self {
            name: name.into(),
            ty,
            default: None,
            constraints: Vec::new(),
        }
    }

    pub fn with_default(mut self, default: Value) -> Self {
        self.default = Some(default);
        self
    }

    pub fn with_constraint(mut self, constraint: Constraint) -> Self {
        self.constraints.push(constraint);
        self
    }
}

impl StructDef {
    pub fn new(fields: Vec<Field>) -> Self {
        Self { fields }
    }

    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|field| field.name == name)
    }
}

impl UnionVariant {
    pub fn new(name: impl Into<String>, ty: TypeDescriptor) -> Self {
        Self {
            name: name.into(),
            ty: Some(ty),
        }
    }

    pub fn unit(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ty: None,
        }
    }
}

impl TagUnionDef {
    pub fn new(variants: Vec<UnionVariant>) -> Self {
        Self { variants }
    }

    pub fn variant(&self, name: &str) -> Option<(usize, &UnionVariant)> {
        self.variants
            .iter()
            .enumerate()
            .find(|(_, variant)| variant.name == name)
    }
}

impl EnumMember {
    pub fn int(name: impl Into<String>, value: i64) -> Self {
        Self {
            name: name.into(),
            value: EnumValue::Int(value),
        }
    }

    pub fn str(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: EnumValue::Str(value.into()),
        }
    }
}

impl EnumDef {
    pub fn new(members: Vec<EnumMember>) -> Self {
        Self { members }
    }

    pub fn contains(&self, value: &EnumValue) -> bool {
        self.members.iter().any(|member| &member.value == value)
    }
}

impl EnumValue {
    /// Enum member matching a dynamic value, if the value has an enum shape.
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Int(v) => Some(EnumValue::Int(*v)),
            Value::UInt(v) => i64::try_from(*v).ok().map(EnumValue::Int),
            Value::String(s) => Some(EnumValue::Str(s.clone())),
            _ => None,
        }
    }

    /// Like [`EnumValue::from_value`], but a payload-less tagged value (a
    /// unit enum variant) is looked up by member name first.
    pub fn resolve(value: &Value, members: &[EnumMember]) -> Option<Self> {
        match value {
            Value::Tagged(tagged) if tagged.value.is_null() => members
                .iter()
                .find(|member| {
                    member.name == tagged.tag
                        || matches!(&member.value, EnumValue::Str(s) if *s == tagged.tag)
                })
                .map(|member| member.value.clone()),
            other => Self::from_value(other),
        }
    }

    pub fn to_value(&self) -> Value {
        match self {
            EnumValue::Int(v) => Value::Int(*v),
            EnumValue::Str(s) => Value::String(s.clone()),
        }
    }
}

impl TypeDescriptor {
    pub fn string() -> Self {
        TypeDescriptor::Scalar(ScalarKind::String)
    }

    pub fn int64() -> Self {
        TypeDescriptor::Scalar(ScalarKind::Int64)
    }

    pub fn float64() -> Self {
        TypeDescriptor::Scalar(ScalarKind::Float64)
    }

    pub fn bool() -> Self {
        TypeDescriptor::Scalar(ScalarKind::Bool)
    }

    pub fn optional(inner: TypeDescriptor) -> Self {
        TypeDescriptor::Optional(Box::new(inner))
    }

    pub fn list(inner: TypeDescriptor) -> Self {
        TypeDescriptor::List(Box::new(inner))
    }

    /// Map with string keys.
    pub fn map(value: TypeDescriptor) -> Self {
        TypeDescriptor::Map(Box::new(Self::string()), Box::new(value))
    }

    pub fn record(fields: Vec<Field>) -> Self {
        TypeDescriptor::Struct(Box::new(StructDef::new(fields)))
    }

    pub fn union(variants: Vec<UnionVariant>) -> Self {
        TypeDescriptor::TaggedUnion(Box::new(TagUnionDef::new(variants)))
    }

    pub fn enumeration(members: Vec<EnumMember>) -> Self {
        TypeDescriptor::Enum(Box::new(EnumDef::new(members)))
    }

    pub fn named(name: impl Into<String>) -> Self {
        TypeDescriptor::Named(name.into())
    }

    pub fn timestamp(tz_aware: bool) -> Self {
        TypeDescriptor::Temporal(TemporalKind::Timestamp { tz_aware })
    }

    pub fn uuid(version: Option<u8>) -> Self {
        TypeDescriptor::Identifier(IdentifierKind::Uuid { version })
    }

    pub fn is_optional(&self) -> bool {
        matches!(self, TypeDescriptor::Optional(_))
    }

    /// Canonical textual form of the declared type.
    pub fn signature(&self) -> String {
        match self {
            TypeDescriptor::Scalar(kind) => kind.name().into(),
            TypeDescriptor::Optional(inner) => format!("optional<{}>", inner.signature()),
            TypeDescriptor::List(inner) => format!("list<{}>", inner.signature()),
            TypeDescriptor::Map(key, value) => {
                format!("map<key={},value={}>", key.signature(), value.signature())
            }
            TypeDescriptor::Tuple(items) => {
                let parts: Vec<_> = items.iter().map(TypeDescriptor::signature).collect();
                format!("tuple<{}>", parts.join(","))
            }
            TypeDescriptor::Struct(def) => struct_signature(def),
            TypeDescriptor::TaggedUnion(def) => union_signature(def),
            TypeDescriptor::Enum(def) => enum_signature(def),
            TypeDescriptor::Named(name) => name.clone(),
            TypeDescriptor::Decimal => "decimal".into(),
            TypeDescriptor::Temporal(TemporalKind::Timestamp { tz_aware: true }) => {
                "timestamp<tz>".into()
            }
            TypeDescriptor::Temporal(TemporalKind::Timestamp { tz_aware: false }) => {
                "timestamp".into()
            }
            TypeDescriptor::Temporal(TemporalKind::Date) => "date".into(),
            TypeDescriptor::Temporal(TemporalKind::Time) => "time".into(),
            TypeDescriptor::Binary => "bytes".into(),
            TypeDescriptor::Identifier(IdentifierKind::Uuid { version: Some(v) }) => {
                format!("uuid<v{v}>")
            }
            TypeDescriptor::Identifier(IdentifierKind::Uuid { version: None }) => "uuid".into(),
            TypeDescriptor::Identifier(IdentifierKind::Ulid) => "ulid".into(),
            TypeDescriptor::NdArray { element, shape } => {
                let dims: Vec<_> = shape
                    .iter()
                    .map(|dim| dim.map_or_else(|| "*".to_string(), |n| n.to_string()))
                    .collect();
                format!("ndarray<{},[{}]>", element.name(), dims.join(","))
            }
            TypeDescriptor::Any => "any".into(),
        }
    }
}

pub(crate) fn struct_signature(def: &StructDef) -> String {
    let names: Vec<_> = def
        .fields
        .iter()
        .map(|field| format!("{}:{}", field.name, field.ty.signature()))
        .collect();
    format!("struct{{{}}}", names.join(","))
}

pub(crate) fn union_signature(def: &TagUnionDef) -> String {
    let names: Vec<_> = def
        .variants
        .iter()
        .map(|variant| match &variant.ty {
            Some(ty) => format!("{}:{}", variant.name, ty.signature()),
            None => variant.name.clone(),
        })
        .collect();
    format!("union{{{}}}", names.join("|"))
}

pub(crate) fn enum_signature(def: &EnumDef) -> String {
    let members: Vec<_> = def
        .members
        .iter()
        .map(|member| match &member.value {
            EnumValue::Int(v) => format!("{}={v}", member.name),
            EnumValue::Str(s) => format!("{}={s:?}", member.name),
        })
        .collect();
    format!("enum{{{}}}", members.join("|"))
}

impl ModelSchema {
    pub fn new(identity: impl Into<String>, root: TypeDescriptor) -> Self {
        Self {
            identity: identity.into(),
            description: None,
            defs: BTreeMap::new(),
            root,
        }
    }

    /// Schema whose root is an inline record with `fields`.
    pub fn record(identity: impl Into<String>, fields: Vec<Field>) -> Self {
        Self::new(identity, TypeDescriptor::record(fields))
    }

    pub fn with_definition(mut self, name: impl Into<String>, def: Definition) -> Self {
        self.defs.insert(name.into(), def);
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn identity(&self) -> &str {
        &self.identity
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn definition(&self, name: &str) -> Option<&Definition> {
        self.defs.get(name)
    }

    pub fn definitions(&self) -> impl Iterator<Item = (&str, &Definition)> {
        self.defs.iter().map(|(name, def)| (name.as_str(), def))
    }

    pub fn root_type(&self) -> &TypeDescriptor {
        &self.root
    }

    /// Resolve the root type to the record whose fields become columns.
    pub fn root_struct(&self) -> StratumResult<&StructDef> {
        match &self.root {
            TypeDescriptor::Struct(def) => Ok(def),
            TypeDescriptor::Named(name) => match self.definition(name) {
                Some(Definition::Struct(def)) => Ok(def),
                Some(_) => Err(StratumError::Schema(format!(
                    "root type '{name}' is not a record"
                ))),
                None => Err(StratumError::Schema(format!("unknown type '{name}'"))),
            },
            other => Err(StratumError::Schema(format!(
                "root type must be a record, found {}",
                other.signature()
            ))),
        }
    }
}
