use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use arrow::datatypes::{DataType, Field, Fields, TimeUnit, UnionFields, UnionMode};
use stratum::{
    Definition, EnumDef, EnumMember, EnumValue, IdentifierKind, ModelSchema, ScalarKind, StructDef,
    TagUnionDef, TemporalKind, TypeDescriptor, Value,
};

use crate::config::{ConversionConfig, DateTimePolicy, NdArrayEncoding, UnionEncoding};
use crate::error::{join_path, Error, Result};

pub const TYPE_KEY: &str = "stratum:type";
pub const KIND_KEY: &str = "stratum:kind";
pub const VARIANT_KEY: &str = "stratum:variant";
pub const UNION_KEY: &str = "stratum:union";
pub const ID_KIND_KEY: &str = "stratum:id.kind";
pub const UUID_VERSION_KEY: &str = "stratum:uuid.version";
pub const UUID_ENCODING_KEY: &str = "stratum:uuid.encoding";
pub const SERIALIZED_KEY: &str = "stratum:serialized";

pub const TAG_FIELD: &str = "tag";
pub const INSTANT_FIELD: &str = "instant";
pub const OFFSET_FIELD: &str = "offset_seconds";
pub const UTC: &str = "UTC";

/// One column (or nested child) of a resolved schema.
#[derive(Clone, Debug, PartialEq)]
pub struct SchemaNode {
    pub name: String,
    pub kind: NodeKind,
    pub nullable: bool,
    pub metadata: BTreeMap<String, String>,
    pub default: Option<Value>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum NodeKind {
    Scalar(ScalarKind),
    Decimal { precision: u8, scale: i8 },
    Timestamp { tz_aware: bool, preserve_offset: bool },
    Date,
    Time,
    Binary,
    Identifier(IdentifierKind),
    Enum { members: Vec<EnumMember>, repr: EnumRepr },
    List(Box<SchemaNode>),
    FixedSizeList { item: Box<SchemaNode>, size: usize },
    /// String-keyed map.
    Map { value: Box<SchemaNode> },
    Struct(Vec<SchemaNode>),
    Tuple(Vec<SchemaNode>),
    Union { variants: Vec<VariantNode>, mode: UnionEncoding },
    /// JSON text for values without a declared type.
    Dynamic,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EnumRepr {
    Int(ScalarKind),
    Str,
}

#[derive(Clone, Debug, PartialEq)]
pub struct VariantNode {
    pub name: String,
    /// `None` for unit variants.
    pub payload: Option<SchemaNode>,
}

impl SchemaNode {
    fn new(name: &str, kind: NodeKind, nullable: bool) -> Self {
        Self {
            name: name.to_string(),
            kind,
            nullable,
            metadata: BTreeMap::new(),
            default: None,
        }
    }

    pub fn data_type(&self) -> DataType {
        self.kind.data_type()
    }

    pub fn to_field(&self) -> Field {
        self.field_with(self.nullable)
    }

    pub(crate) fn field_with(&self, nullable: bool) -> Field {
        let metadata: HashMap<String, String> = self
            .metadata
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        let nullable = nullable || self.has_logical_nulls();
        Field::new(&self.name, self.data_type(), nullable).with_metadata(metadata)
    }

    /// Dense unions carry no validity of their own; a slot is null when the
    /// selected child is, so the field must admit nulls whenever a payload can.
    fn has_logical_nulls(&self) -> bool {
        match &self.kind {
            NodeKind::Union {
                variants,
                mode: UnionEncoding::DenseUnion,
            } => variants
                .iter()
                .filter_map(|variant| variant.payload.as_ref())
                .any(|payload| payload.nullable || payload.has_logical_nulls()),
            _ => false,
        }
    }

    /// Structural signature; equal signatures mean interchangeable columns.
    pub fn signature(&self) -> String {
        let kind = self.kind.signature();
        if self.nullable {
            format!("{kind}?")
        } else {
            kind
        }
    }

    pub fn child(&self, name: &str) -> Option<&SchemaNode> {
        match &self.kind {
            NodeKind::Struct(children) | NodeKind::Tuple(children) => {
                children.iter().find(|child| child.name == name)
            }
            _ => None,
        }
    }

    /// Inverse mapping from a persisted Arrow field, guided by its metadata.
    pub fn from_field(field: &Field) -> Result<Self> {
        let metadata: BTreeMap<String, String> = field
            .metadata()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        let kind = infer_kind(field, &metadata)?;
        let mut node = SchemaNode::new(field.name(), kind, field.is_nullable());
        node.metadata = metadata;
        Ok(node)
    }
}

impl NodeKind {
    pub fn data_type(&self) -> DataType {
        match self {
            NodeKind::Scalar(kind) => scalar_type(*kind),
            NodeKind::Decimal { precision, scale } => DataType::Decimal128(*precision, *scale),
            NodeKind::Timestamp {
                preserve_offset: false,
                ..
            } => timestamp_type(),
            NodeKind::Timestamp {
                preserve_offset: true,
                ..
            } => DataType::Struct(offset_fields()),
            NodeKind::Date => DataType::Date32,
            NodeKind::Time => DataType::Time64(TimeUnit::Microsecond),
            NodeKind::Binary => DataType::BinaryView,
            NodeKind::Identifier(_) => DataType::FixedSizeBinary(16),
            NodeKind::Enum {
                repr: EnumRepr::Int(kind),
                ..
            } => scalar_type(*kind),
            NodeKind::Enum {
                repr: EnumRepr::Str,
                ..
            } => DataType::Utf8,
            NodeKind::List(item) => DataType::List(Arc::new(item.to_field())),
            NodeKind::FixedSizeList { item, size } => {
                DataType::FixedSizeList(Arc::new(item.to_field()), *size as i32)
            }
            NodeKind::Map { value } => DataType::Map(Arc::new(map_entries_field(value)), false),
            NodeKind::Struct(children) | NodeKind::Tuple(children) => {
                DataType::Struct(children.iter().map(SchemaNode::to_field).collect())
            }
            NodeKind::Union {
                variants,
                mode: UnionEncoding::TaggedStruct,
            } => DataType::Struct(tagged_struct_fields(variants)),
            NodeKind::Union {
                variants,
                mode: UnionEncoding::DenseUnion,
            } => DataType::Union(dense_union_fields(variants), UnionMode::Dense),
            NodeKind::Dynamic => DataType::LargeUtf8,
        }
    }

    pub fn signature(&self) -> String {
        match self {
            NodeKind::Scalar(kind) => kind.name().to_string(),
            NodeKind::Decimal { precision, scale } => format!("decimal({precision},{scale})"),
            NodeKind::Timestamp {
                tz_aware,
                preserve_offset,
            } => {
                let base = if *tz_aware { "timestamp<tz>" } else { "timestamp" };
                if *preserve_offset {
                    format!("{base}+offset")
                } else {
                    base.to_string()
                }
            }
            NodeKind::Date => "date".into(),
            NodeKind::Time => "time".into(),
            NodeKind::Binary => "bytes".into(),
            NodeKind::Identifier(IdentifierKind::Uuid { version: Some(v) }) => format!("uuid<v{v}>"),
            NodeKind::Identifier(IdentifierKind::Uuid { version: None }) => "uuid".into(),
            NodeKind::Identifier(IdentifierKind::Ulid) => "ulid".into(),
            NodeKind::Enum { members, repr } => {
                let repr = match repr {
                    EnumRepr::Int(kind) => kind.name(),
                    EnumRepr::Str => "utf8",
                };
                let values: Vec<String> = members
                    .iter()
                    .map(|member| match &member.value {
                        EnumValue::Int(v) => v.to_string(),
                        EnumValue::Str(s) => format!("{s:?}"),
                    })
                    .collect();
                format!("enum<{repr}>{{{}}}", values.join("|"))
            }
            NodeKind::List(item) => format!("list<{}>", item.signature()),
            NodeKind::FixedSizeList { item, size } => {
                format!("fixed_list<{};{size}>", item.signature())
            }
            NodeKind::Map { value } => format!("map<string,{}>", value.signature()),
            NodeKind::Struct(children) => {
                let parts: Vec<String> = children
                    .iter()
                    .map(|child| format!("{}:{}", child.name, child.signature()))
                    .collect();
                format!("struct{{{}}}", parts.join(","))
            }
            NodeKind::Tuple(children) => {
                let parts: Vec<String> = children.iter().map(SchemaNode::signature).collect();
                format!("tuple<{}>", parts.join(","))
            }
            NodeKind::Union { variants, mode } => {
                let parts: Vec<String> = variants
                    .iter()
                    .map(|variant| match &variant.payload {
                        Some(payload) => format!("{}:{}", variant.name, payload.signature()),
                        None => variant.name.clone(),
                    })
                    .collect();
                format!("union[{}]{{{}}}", mode.as_str(), parts.join("|"))
            }
            NodeKind::Dynamic => "json".into(),
        }
    }
}

fn scalar_type(kind: ScalarKind) -> DataType {
    match kind {
        ScalarKind::Bool => DataType::Boolean,
        ScalarKind::Int8 => DataType::Int8,
        ScalarKind::Int16 => DataType::Int16,
        ScalarKind::Int32 => DataType::Int32,
        ScalarKind::Int64 => DataType::Int64,
        ScalarKind::UInt8 => DataType::UInt8,
        ScalarKind::UInt16 => DataType::UInt16,
        ScalarKind::UInt32 => DataType::UInt32,
        ScalarKind::UInt64 => DataType::UInt64,
        ScalarKind::Float32 => DataType::Float32,
        ScalarKind::Float64 => DataType::Float64,
        ScalarKind::String => DataType::Utf8View,
    }
}

pub(crate) fn timestamp_type() -> DataType {
    DataType::Timestamp(TimeUnit::Microsecond, Some(UTC.into()))
}

pub(crate) fn offset_fields() -> Fields {
    vec![
        Field::new(INSTANT_FIELD, timestamp_type(), false),
        Field::new(OFFSET_FIELD, DataType::Int32, true),
    ]
    .into()
}

pub(crate) fn map_entries_field(value: &SchemaNode) -> Field {
    let entries: Fields = vec![Field::new("key", DataType::Utf8, false), value.to_field()].into();
    let mut metadata = HashMap::new();
    metadata.insert(KIND_KEY.to_string(), "map_entries".to_string());
    Field::new("entries", DataType::Struct(entries), false).with_metadata(metadata)
}

fn variant_field(variant: &VariantNode, unit_type: DataType) -> Field {
    match &variant.payload {
        Some(payload) => {
            let mut field = payload.field_with(true);
            let mut metadata = field.metadata().clone();
            metadata.insert(VARIANT_KEY.to_string(), variant.name.clone());
            field.set_metadata(metadata);
            field
        }
        None => {
            let mut metadata = HashMap::new();
            metadata.insert(VARIANT_KEY.to_string(), variant.name.clone());
            metadata.insert(KIND_KEY.to_string(), "unit".to_string());
            Field::new(&variant.name, unit_type, true).with_metadata(metadata)
        }
    }
}

pub(crate) fn tagged_struct_fields(variants: &[VariantNode]) -> Fields {
    let mut fields = Vec::with_capacity(variants.len() + 1);
    fields.push(Field::new(TAG_FIELD, DataType::Utf8, false));
    for variant in variants {
        fields.push(variant_field(variant, DataType::Boolean));
    }
    fields.into()
}

pub(crate) fn dense_union_fields(variants: &[VariantNode]) -> UnionFields {
    variants
        .iter()
        .enumerate()
        .map(|(idx, variant)| (idx as i8, Arc::new(variant_field(variant, DataType::Boolean))))
        .collect()
}

/// Resolves declared types against a model, expanding named references.
pub struct TypeMapper<'a> {
    model: &'a ModelSchema,
    config: &'a ConversionConfig,
    stack: Vec<String>,
}

impl<'a> TypeMapper<'a> {
    pub fn new(model: &'a ModelSchema, config: &'a ConversionConfig) -> Self {
        Self {
            model,
            config,
            stack: Vec::new(),
        }
    }

    pub fn map_field(&mut self, field: &stratum::Field, path: &str) -> Result<SchemaNode> {
        let mut node = self.map_node(&field.name, &field.ty, path)?;
        node.default = field.default.clone();
        Ok(node)
    }

    pub fn map_struct(&mut self, def: &StructDef, path: &str) -> Result<Vec<SchemaNode>> {
        def.fields
            .iter()
            .map(|field| self.map_field(field, &join_path(path, &field.name)))
            .collect()
    }

    pub fn map_node(&mut self, name: &str, ty: &TypeDescriptor, path: &str) -> Result<SchemaNode> {
        let (kind, nullable) = self.resolve(ty, path)?;
        let mut node = SchemaNode::new(name, kind, nullable);
        node.metadata.insert(TYPE_KEY.to_string(), ty.signature());
        annotate(&mut node, ty);
        Ok(node)
    }

    fn resolve(&mut self, ty: &TypeDescriptor, path: &str) -> Result<(NodeKind, bool)> {
        let kind = match ty {
            TypeDescriptor::Optional(inner) => {
                let (kind, _) = self.resolve(inner, path)?;
                if let NodeKind::Union {
                    mode: UnionEncoding::DenseUnion,
                    ..
                } = kind
                {
                    return Err(Error::unsupported(
                        path,
                        "optional union cannot use dense_union encoding",
                    ));
                }
                return Ok((kind, true));
            }
            TypeDescriptor::Named(name) => return self.resolve_named(name, path),
            TypeDescriptor::Scalar(kind) => NodeKind::Scalar(*kind),
            TypeDescriptor::Decimal => NodeKind::Decimal {
                precision: self.config.decimal_precision,
                scale: self.config.decimal_scale,
            },
            TypeDescriptor::Temporal(TemporalKind::Timestamp { tz_aware }) => NodeKind::Timestamp {
                tz_aware: *tz_aware,
                preserve_offset: self.config.datetime_policy == DateTimePolicy::PreserveTz,
            },
            TypeDescriptor::Temporal(TemporalKind::Date) => NodeKind::Date,
            TypeDescriptor::Temporal(TemporalKind::Time) => NodeKind::Time,
            TypeDescriptor::Binary => NodeKind::Binary,
            TypeDescriptor::Identifier(kind) => NodeKind::Identifier(*kind),
            TypeDescriptor::List(inner) => {
                let item = self.map_node("item", inner, &format!("{path}[]"))?;
                NodeKind::List(Box::new(item))
            }
            TypeDescriptor::Map(key, value) => {
                let (key_kind, _) = self.resolve(key, path)?;
                if key_kind != NodeKind::Scalar(ScalarKind::String) {
                    return Err(Error::unsupported(
                        path,
                        format!("map keys must be strings, found {}", key.signature()),
                    ));
                }
                let value = self.map_node("value", value, &format!("{path}{{}}"))?;
                NodeKind::Map {
                    value: Box::new(value),
                }
            }
            TypeDescriptor::Tuple(items) => {
                if items.is_empty() {
                    return Err(Error::unsupported(path, "tuple without elements"));
                }
                let children = items
                    .iter()
                    .enumerate()
                    .map(|(idx, item)| {
                        let name = format!("f{idx}");
                        let child_path = join_path(path, &name);
                        self.map_node(&name, item, &child_path)
                    })
                    .collect::<Result<Vec<_>>>()?;
                NodeKind::Tuple(children)
            }
            TypeDescriptor::Struct(def) => self.resolve_struct(def, path)?,
            TypeDescriptor::TaggedUnion(def) => self.resolve_union(def, path)?,
            TypeDescriptor::Enum(def) => resolve_enum(def, path)?,
            TypeDescriptor::NdArray { element, shape } => self.resolve_ndarray(*element, shape, path)?,
            TypeDescriptor::Any => {
                if !self.config.allow_dynamic {
                    return Err(Error::unsupported(
                        path,
                        "values without a declared type require allow_dynamic",
                    ));
                }
                NodeKind::Dynamic
            }
        };
        Ok((kind, false))
    }

    fn resolve_named(&mut self, name: &str, path: &str) -> Result<(NodeKind, bool)> {
        if self.stack.iter().any(|entry| entry == name) {
            return Err(Error::unsupported(
                path,
                format!("recursive type cycle involving '{name}'"),
            ));
        }
        let model = self.model;
        let def = model
            .definition(name)
            .ok_or_else(|| Error::unsupported(path, format!("unknown type '{name}'")))?;
        self.stack.push(name.to_string());
        let resolved = match def {
            Definition::Struct(def) => self.resolve_struct(def, path),
            Definition::TaggedUnion(def) => self.resolve_union(def, path),
            Definition::Enum(def) => resolve_enum(def, path),
        };
        self.stack.pop();
        Ok((resolved?, false))
    }

    fn resolve_struct(&mut self, def: &StructDef, path: &str) -> Result<NodeKind> {
        if def.fields.is_empty() {
            return Err(Error::unsupported(path, "record without fields"));
        }
        Ok(NodeKind::Struct(self.map_struct(def, path)?))
    }

    fn resolve_union(&mut self, def: &TagUnionDef, path: &str) -> Result<NodeKind> {
        if def.variants.is_empty() {
            return Err(Error::unsupported(path, "union without variants"));
        }
        let mode = self.config.union_encoding;
        if mode == UnionEncoding::DenseUnion && def.variants.len() > i8::MAX as usize {
            return Err(Error::unsupported(
                path,
                format!("dense unions hold at most {} variants", i8::MAX),
            ));
        }
        let mut variants = Vec::with_capacity(def.variants.len());
        for variant in &def.variants {
            if variant.name == TAG_FIELD && mode == UnionEncoding::TaggedStruct {
                return Err(Error::unsupported(
                    path,
                    "variant name 'tag' collides with the tag column",
                ));
            }
            let payload = match &variant.ty {
                Some(ty) => {
                    let variant_path = join_path(path, &variant.name);
                    Some(self.map_node(&variant.name, ty, &variant_path)?)
                }
                None => None,
            };
            variants.push(VariantNode {
                name: variant.name.clone(),
                payload,
            });
        }
        Ok(NodeKind::Union { variants, mode })
    }

    fn resolve_ndarray(
        &mut self,
        element: ScalarKind,
        shape: &[Option<usize>],
        path: &str,
    ) -> Result<NodeKind> {
        if shape.is_empty() {
            return Err(Error::unsupported(path, "ndarray without dimensions"));
        }
        let fixed = self.config.ndarray_encoding == NdArrayEncoding::FixedSizeListIfStatic;
        let mut kind = NodeKind::Scalar(element);
        for dim in shape.iter().rev() {
            let item = Box::new(SchemaNode::new("item", kind, false));
            kind = match dim {
                Some(size) if fixed && *size > 0 && *size <= i32::MAX as usize => {
                    NodeKind::FixedSizeList { item, size: *size }
                }
                _ => NodeKind::List(item),
            };
        }
        Ok(kind)
    }
}

fn resolve_enum(def: &EnumDef, path: &str) -> Result<NodeKind> {
    if def.members.is_empty() {
        return Err(Error::unsupported(path, "enum without members"));
    }
    let ints: Vec<i64> = def
        .members
        .iter()
        .filter_map(|member| match member.value {
            EnumValue::Int(v) => Some(v),
            EnumValue::Str(_) => None,
        })
        .collect();
    let repr = if ints.len() == def.members.len() {
        EnumRepr::Int(enum_width(&ints))
    } else if ints.is_empty() {
        EnumRepr::Str
    } else {
        return Err(Error::unsupported(
            path,
            "enum mixes integer and string members",
        ));
    };
    Ok(NodeKind::Enum {
        members: def.members.clone(),
        repr,
    })
}

fn enum_width(values: &[i64]) -> ScalarKind {
    let min = values.iter().copied().min().unwrap_or(0);
    let max = values.iter().copied().max().unwrap_or(0);
    [ScalarKind::Int8, ScalarKind::Int16, ScalarKind::Int32]
        .into_iter()
        .find(|kind| {
            kind.int_bounds()
                .is_some_and(|(lo, hi)| lo <= i128::from(min) && i128::from(max) <= hi)
        })
        .unwrap_or(ScalarKind::Int64)
}

fn annotate(node: &mut SchemaNode, ty: &TypeDescriptor) {
    let mut insert = |key: &str, value: String| {
        node.metadata.insert(key.to_string(), value);
    };
    match &node.kind {
        NodeKind::Identifier(kind) => {
            match kind {
                IdentifierKind::Uuid { version } => {
                    insert(ID_KIND_KEY, "uuid".into());
                    if let Some(version) = version {
                        insert(UUID_VERSION_KEY, version.to_string());
                    }
                }
                IdentifierKind::Ulid => insert(ID_KIND_KEY, "ulid".into()),
            }
            insert(UUID_ENCODING_KEY, "binary16".into());
        }
        NodeKind::Dynamic => insert(SERIALIZED_KEY, "json".into()),
        NodeKind::Union { mode, .. } => {
            insert(KIND_KEY, "union".into());
            insert(UNION_KEY, mode.as_str().into());
        }
        NodeKind::Tuple(_) => insert(KIND_KEY, "tuple".into()),
        NodeKind::Enum { .. } => insert(KIND_KEY, "enum".into()),
        NodeKind::Timestamp {
            preserve_offset: true,
            ..
        } => insert(KIND_KEY, "timestamp_offset".into()),
        NodeKind::List(_) | NodeKind::FixedSizeList { .. } => {
            let inner = match ty {
                TypeDescriptor::Optional(inner) => inner.as_ref(),
                other => other,
            };
            if matches!(inner, TypeDescriptor::NdArray { .. }) {
                insert(KIND_KEY, "ndarray".into());
            }
        }
        _ => {}
    }
}

/// Map a single declared type to a node named after the last path segment.
pub fn map_type(
    model: &ModelSchema,
    ty: &TypeDescriptor,
    config: &ConversionConfig,
    path: &str,
) -> Result<SchemaNode> {
    let name = path.rsplit('.').next().filter(|s| !s.is_empty()).unwrap_or("item");
    TypeMapper::new(model, config).map_node(name, ty, path)
}

/// Naive timestamps share the UTC column type; only the declared type tells
/// them apart.
fn declared_naive(metadata: &BTreeMap<String, String>) -> bool {
    metadata.get(TYPE_KEY).is_some_and(|declared| {
        declared
            .trim_start_matches("optional<")
            .trim_end_matches('>')
            == "timestamp"
    })
}

fn infer_kind(field: &Field, metadata: &BTreeMap<String, String>) -> Result<NodeKind> {
    let meta = |key: &str| metadata.get(key).map(String::as_str);
    let kind = match field.data_type() {
        DataType::Boolean => NodeKind::Scalar(ScalarKind::Bool),
        DataType::Int8 => NodeKind::Scalar(ScalarKind::Int8),
        DataType::Int16 => NodeKind::Scalar(ScalarKind::Int16),
        DataType::Int32 => NodeKind::Scalar(ScalarKind::Int32),
        DataType::Int64 => NodeKind::Scalar(ScalarKind::Int64),
        DataType::UInt8 => NodeKind::Scalar(ScalarKind::UInt8),
        DataType::UInt16 => NodeKind::Scalar(ScalarKind::UInt16),
        DataType::UInt32 => NodeKind::Scalar(ScalarKind::UInt32),
        DataType::UInt64 => NodeKind::Scalar(ScalarKind::UInt64),
        DataType::Float32 => NodeKind::Scalar(ScalarKind::Float32),
        DataType::Float64 => NodeKind::Scalar(ScalarKind::Float64),
        DataType::Utf8 | DataType::LargeUtf8 | DataType::Utf8View => {
            if meta(SERIALIZED_KEY) == Some("json") {
                NodeKind::Dynamic
            } else {
                NodeKind::Scalar(ScalarKind::String)
            }
        }
        DataType::Binary | DataType::LargeBinary | DataType::BinaryView => NodeKind::Binary,
        DataType::FixedSizeBinary(16) if meta(ID_KIND_KEY) == Some("ulid") => {
            NodeKind::Identifier(IdentifierKind::Ulid)
        }
        DataType::FixedSizeBinary(16) if meta(ID_KIND_KEY) == Some("uuid") => {
            NodeKind::Identifier(IdentifierKind::Uuid {
                version: meta(UUID_VERSION_KEY).and_then(|v| v.parse().ok()),
            })
        }
        DataType::FixedSizeBinary(_) => NodeKind::Binary,
        DataType::Decimal128(precision, scale) => NodeKind::Decimal {
            precision: *precision,
            scale: *scale,
        },
        DataType::Timestamp(_, tz) => NodeKind::Timestamp {
            tz_aware: tz.is_some() && !declared_naive(metadata),
            preserve_offset: false,
        },
        DataType::Date32 => NodeKind::Date,
        DataType::Time64(_) => NodeKind::Time,
        DataType::List(item) | DataType::LargeList(item) => {
            NodeKind::List(Box::new(SchemaNode::from_field(item)?))
        }
        DataType::FixedSizeList(item, size) => NodeKind::FixedSizeList {
            item: Box::new(SchemaNode::from_field(item)?),
            size: usize::try_from(*size).unwrap_or(0),
        },
        DataType::Map(entries, _) => match entries.data_type() {
            DataType::Struct(children) if children.len() == 2 => NodeKind::Map {
                value: Box::new(SchemaNode::from_field(&children[1])?),
            },
            other => {
                return Err(Error::unsupported(
                    field.name(),
                    format!("map entries must be a two-field struct, found {other}"),
                ))
            }
        },
        DataType::Struct(children) => match meta(KIND_KEY) {
            Some("timestamp_offset") => NodeKind::Timestamp {
                tz_aware: !declared_naive(metadata),
                preserve_offset: true,
            },
            Some("tuple") => NodeKind::Tuple(infer_children(children)?),
            Some("union") => NodeKind::Union {
                variants: infer_variants(children.iter().filter(|f| f.name() != TAG_FIELD))?,
                mode: UnionEncoding::TaggedStruct,
            },
            _ => NodeKind::Struct(infer_children(children)?),
        },
        DataType::Union(fields, UnionMode::Dense) => NodeKind::Union {
            variants: infer_variants(fields.iter().map(|(_, field)| field))?,
            mode: UnionEncoding::DenseUnion,
        },
        other => {
            return Err(Error::unsupported(
                field.name(),
                format!("no value mapping for Arrow type {other}"),
            ))
        }
    };
    Ok(kind)
}

fn infer_children(fields: &Fields) -> Result<Vec<SchemaNode>> {
    fields.iter().map(|field| SchemaNode::from_field(field)).collect()
}

fn infer_variants<'f>(fields: impl Iterator<Item = &'f Arc<Field>>) -> Result<Vec<VariantNode>> {
    fields
        .map(|field| {
            let unit = field.metadata().get(KIND_KEY).map(String::as_str) == Some("unit")
                || matches!(field.data_type(), DataType::Null);
            let payload = if unit {
                None
            } else {
                Some(SchemaNode::from_field(field)?)
            };
            Ok(VariantNode {
                name: field.name().clone(),
                payload,
            })
        })
        .collect()
}
