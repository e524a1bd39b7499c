use std::ops::Range;
use std::sync::Arc;

use arrow::array::{
    Array, ArrayRef, BinaryArray, BinaryViewArray, BooleanArray, Date32Array, Decimal128Array,
    FixedSizeBinaryArray, FixedSizeListArray, Float32Array, Float64Array, Int16Array, Int32Array,
    Int64Array, Int8Array, LargeBinaryArray, LargeListArray, LargeStringArray, ListArray,
    MapArray, StringArray, StringViewArray, StructArray, Time64MicrosecondArray,
    Time64NanosecondArray, TimestampMicrosecondArray, TimestampMillisecondArray,
    TimestampNanosecondArray, TimestampSecondArray, UInt16Array, UInt32Array, UInt64Array,
    UInt8Array, UnionArray,
};
use arrow::datatypes::{DataType, TimeUnit, UnionMode};
use arrow::record_batch::RecordBatch;
use arrow_buffer::{NullBuffer, OffsetBuffer};
use bytes::Bytes;
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveTime, Offset, Utc};
use ordered_float::OrderedFloat;
use stratum::{Decimal, IdentifierKind, ScalarKind, TaggedValue, Value};
use tracing::{debug, warn};
use ulid::Ulid;
use uuid::Uuid;

use crate::config::ConversionConfig;
use crate::encode::UNIX_EPOCH_DAYS_FROM_CE;
use crate::error::{join_path, Error, Result};
use crate::json::json_to_value;
use crate::mapper::{EnumRepr, NodeKind, SchemaNode, INSTANT_FIELD, OFFSET_FIELD, TAG_FIELD};
use crate::schema::Schema;

/// Rebuilds row values from record batches against a target schema.
#[derive(Clone, Debug)]
pub struct Decoder {
    schema: Arc<Schema>,
    config: ConversionConfig,
}

impl Decoder {
    pub fn new(schema: Arc<Schema>, config: ConversionConfig) -> Self {
        Self { schema, config }
    }

    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    pub fn config(&self) -> &ConversionConfig {
        &self.config
    }

    /// One `Value::Record` per row. With `validate`, each row is run through
    /// the model's validation and the first failure is returned.
    pub fn decode(&self, batch: &RecordBatch, validate: bool) -> Result<Vec<Value>> {
        let nodes = self.schema.nodes();
        let columns = nodes
            .iter()
            .map(|node| Column::bind(node, batch.column_by_name(&node.name), &node.name))
            .collect::<Result<Vec<_>>>()?;

        let model = if validate { self.schema.model() } else { None };
        let mut rows = Vec::with_capacity(batch.num_rows());
        for row in 0..batch.num_rows() {
            let fields = nodes
                .iter()
                .zip(&columns)
                .map(|(node, column)| Ok((node.name.clone(), column.read(row)?)))
                .collect::<Result<Vec<_>>>()?;
            let value = Value::Record(fields);
            let value = match model {
                Some(model) => model
                    .validate(&value)
                    .map_err(|err| Error::Validation(err.at_row(row)))?,
                None => value,
            };
            rows.push(value);
        }
        debug!(
            model = %self.schema.metadata().model,
            rows = rows.len(),
            columns = columns.len(),
            validated = model.is_some(),
            "decoded record batch"
        );
        Ok(rows)
    }

    /// Decode using the batch's own schema and field metadata.
    pub fn decode_untyped(batch: &RecordBatch) -> Result<Vec<Value>> {
        let schema = Schema::infer(batch.schema())?;
        Decoder::new(Arc::new(schema), ConversionConfig::default()).decode(batch, false)
    }
}

enum Column {
    Present(Reader),
    Constant(Value),
}

impl Column {
    fn bind(node: &SchemaNode, array: Option<&ArrayRef>, path: &str) -> Result<Self> {
        if let Some(array) = array {
            return Ok(Column::Present(Reader::bind(node, array, path)?));
        }
        if let Some(default) = &node.default {
            warn!(field = %path, "column missing from batch, using declared default");
            return Ok(Column::Constant(default.clone()));
        }
        if node.nullable {
            warn!(field = %path, "column missing from batch, reading nulls");
            return Ok(Column::Constant(Value::Null));
        }
        Err(Error::mismatch(path, node.signature(), "missing column"))
    }

    fn read(&self, row: usize) -> Result<Value> {
        match self {
            Column::Present(reader) => reader.read(row),
            Column::Constant(value) => Ok(value.clone()),
        }
    }
}

struct Reader {
    path: String,
    nulls: Option<NullBuffer>,
    kind: ReaderKind,
}

enum ReaderKind {
    Bool(BooleanArray),
    Int {
        values: IntValues,
        kind: ScalarKind,
    },
    Float {
        values: FloatValues,
        single: bool,
    },
    Text(TextValues),
    Dynamic(TextValues),
    Decimal {
        array: Decimal128Array,
        scale: i8,
    },
    Timestamp {
        values: TimestampValues,
        tz_aware: bool,
    },
    TimestampOffset {
        instants: TimestampValues,
        offsets: Int32Array,
        tz_aware: bool,
    },
    Date(Date32Array),
    Time(TimeValues),
    Binary(BinaryValues),
    Identifier {
        array: FixedSizeBinaryArray,
        kind: IdentifierKind,
    },
    List {
        offsets: ListOffsets,
        item: Box<Reader>,
    },
    Map {
        offsets: OffsetBuffer<i32>,
        keys: TextValues,
        values: Box<Reader>,
    },
    Struct {
        names: Vec<String>,
        children: Vec<Column>,
    },
    Tuple(Vec<Reader>),
    TaggedUnion {
        tags: TextValues,
        variants: Vec<(String, Option<Reader>)>,
    },
    DenseUnion {
        array: UnionArray,
        variants: Vec<(i8, String, Option<Reader>)>,
    },
}

fn downcast<T: Array + Clone + 'static>(array: &ArrayRef) -> Option<T> {
    array.as_any().downcast_ref::<T>().cloned()
}

fn incompatible(path: &str, node: &SchemaNode, array: &ArrayRef) -> Error {
    Error::mismatch(path, node.signature(), array.data_type().to_string())
}

impl Reader {
    fn bind(node: &SchemaNode, array: &ArrayRef, path: &str) -> Result<Self> {
        let mismatch = || incompatible(path, node, array);
        let kind = match &node.kind {
            NodeKind::Scalar(ScalarKind::Bool) => {
                ReaderKind::Bool(downcast::<BooleanArray>(array).ok_or_else(mismatch)?)
            }
            NodeKind::Scalar(ScalarKind::String) => {
                ReaderKind::Text(TextValues::from_array(array).ok_or_else(mismatch)?)
            }
            NodeKind::Scalar(kind) if kind.is_float() => ReaderKind::Float {
                values: FloatValues::from_array(array).ok_or_else(mismatch)?,
                single: *kind == ScalarKind::Float32,
            },
            NodeKind::Scalar(kind) => ReaderKind::Int {
                values: IntValues::from_array(array).ok_or_else(mismatch)?,
                kind: *kind,
            },
            NodeKind::Enum {
                repr: EnumRepr::Int(_),
                ..
            } => ReaderKind::Int {
                values: IntValues::from_array(array).ok_or_else(mismatch)?,
                kind: ScalarKind::Int64,
            },
            NodeKind::Enum {
                repr: EnumRepr::Str,
                ..
            } => ReaderKind::Text(TextValues::from_array(array).ok_or_else(mismatch)?),
            NodeKind::Dynamic => {
                ReaderKind::Dynamic(TextValues::from_array(array).ok_or_else(mismatch)?)
            }
            NodeKind::Decimal { .. } => match array.data_type() {
                DataType::Decimal128(_, scale) => ReaderKind::Decimal {
                    array: downcast::<Decimal128Array>(array).ok_or_else(mismatch)?,
                    scale: *scale,
                },
                _ => return Err(mismatch()),
            },
            NodeKind::Timestamp { tz_aware, .. } => match array.data_type() {
                DataType::Timestamp(..) => ReaderKind::Timestamp {
                    values: TimestampValues::from_array(array).ok_or_else(mismatch)?,
                    tz_aware: *tz_aware,
                },
                DataType::Struct(_) => {
                    let parts = downcast::<StructArray>(array).ok_or_else(mismatch)?;
                    let instants = parts
                        .column_by_name(INSTANT_FIELD)
                        .and_then(TimestampValues::from_array)
                        .ok_or_else(mismatch)?;
                    let offsets = parts
                        .column_by_name(OFFSET_FIELD)
                        .and_then(downcast::<Int32Array>)
                        .ok_or_else(mismatch)?;
                    ReaderKind::TimestampOffset {
                        instants,
                        offsets,
                        tz_aware: *tz_aware,
                    }
                }
                _ => return Err(mismatch()),
            },
            NodeKind::Date => ReaderKind::Date(downcast::<Date32Array>(array).ok_or_else(mismatch)?),
            NodeKind::Time => ReaderKind::Time(TimeValues::from_array(array).ok_or_else(mismatch)?),
            NodeKind::Binary => {
                ReaderKind::Binary(BinaryValues::from_array(array).ok_or_else(mismatch)?)
            }
            NodeKind::Identifier(kind) => match array.data_type() {
                DataType::FixedSizeBinary(16) => ReaderKind::Identifier {
                    array: downcast::<FixedSizeBinaryArray>(array).ok_or_else(mismatch)?,
                    kind: *kind,
                },
                _ => return Err(mismatch()),
            },
            NodeKind::List(item) | NodeKind::FixedSizeList { item, .. } => {
                let item_path = format!("{path}[]");
                let (offsets, values) = match array.data_type() {
                    DataType::List(_) => {
                        let list = downcast::<ListArray>(array).ok_or_else(mismatch)?;
                        (ListOffsets::Small(list.offsets().clone()), list.values().clone())
                    }
                    DataType::LargeList(_) => {
                        let list = downcast::<LargeListArray>(array).ok_or_else(mismatch)?;
                        (ListOffsets::Large(list.offsets().clone()), list.values().clone())
                    }
                    DataType::FixedSizeList(_, size) => {
                        let list = downcast::<FixedSizeListArray>(array).ok_or_else(mismatch)?;
                        let size = usize::try_from(*size).map_err(|_| mismatch())?;
                        (ListOffsets::Fixed(size), list.values().clone())
                    }
                    _ => return Err(mismatch()),
                };
                ReaderKind::List {
                    offsets,
                    item: Box::new(Reader::bind(item, &values, &item_path)?),
                }
            }
            NodeKind::Map { value } => {
                let map = downcast::<MapArray>(array).ok_or_else(mismatch)?;
                let keys = TextValues::from_array(map.keys()).ok_or_else(mismatch)?;
                let values = Reader::bind(value, map.values(), &format!("{path}{{}}"))?;
                ReaderKind::Map {
                    offsets: map.offsets().clone(),
                    keys,
                    values: Box::new(values),
                }
            }
            NodeKind::Struct(children) => {
                let parts = downcast::<StructArray>(array).ok_or_else(mismatch)?;
                let columns = children
                    .iter()
                    .map(|child| {
                        Column::bind(
                            child,
                            parts.column_by_name(&child.name),
                            &join_path(path, &child.name),
                        )
                    })
                    .collect::<Result<Vec<_>>>()?;
                ReaderKind::Struct {
                    names: children.iter().map(|child| child.name.clone()).collect(),
                    children: columns,
                }
            }
            NodeKind::Tuple(children) => {
                let parts = downcast::<StructArray>(array).ok_or_else(mismatch)?;
                if parts.num_columns() != children.len() {
                    return Err(mismatch());
                }
                let readers = children
                    .iter()
                    .zip(parts.columns())
                    .map(|(child, column)| {
                        Reader::bind(child, column, &join_path(path, &child.name))
                    })
                    .collect::<Result<Vec<_>>>()?;
                ReaderKind::Tuple(readers)
            }
            NodeKind::Union { variants, .. } => match array.data_type() {
                DataType::Struct(_) => {
                    let parts = downcast::<StructArray>(array).ok_or_else(mismatch)?;
                    let tags = parts
                        .column_by_name(TAG_FIELD)
                        .and_then(TextValues::from_array)
                        .ok_or_else(mismatch)?;
                    let readers = variants
                        .iter()
                        .map(|variant| {
                            let payload = match &variant.payload {
                                Some(payload) => {
                                    let column = parts
                                        .column_by_name(&variant.name)
                                        .ok_or_else(mismatch)?;
                                    let variant_path = join_path(path, &variant.name);
                                    Some(Reader::bind(payload, column, &variant_path)?)
                                }
                                None => None,
                            };
                            Ok((variant.name.clone(), payload))
                        })
                        .collect::<Result<Vec<_>>>()?;
                    ReaderKind::TaggedUnion {
                        tags,
                        variants: readers,
                    }
                }
                DataType::Union(fields, UnionMode::Dense) => {
                    let union = downcast::<UnionArray>(array).ok_or_else(mismatch)?;
                    let readers = fields
                        .iter()
                        .map(|(type_id, field)| {
                            let variant = variants
                                .iter()
                                .find(|variant| &variant.name == field.name())
                                .ok_or_else(mismatch)?;
                            let payload = match &variant.payload {
                                Some(payload) => {
                                    let variant_path = join_path(path, &variant.name);
                                    Some(Reader::bind(payload, union.child(type_id), &variant_path)?)
                                }
                                None => None,
                            };
                            Ok((type_id, variant.name.clone(), payload))
                        })
                        .collect::<Result<Vec<_>>>()?;
                    ReaderKind::DenseUnion {
                        array: union,
                        variants: readers,
                    }
                }
                _ => return Err(mismatch()),
            },
        };
        Ok(Self {
            path: path.to_string(),
            nulls: array.nulls().cloned(),
            kind,
        })
    }

    fn read(&self, row: usize) -> Result<Value> {
        if self.nulls.as_ref().is_some_and(|nulls| nulls.is_null(row)) {
            return Ok(Value::Null);
        }
        let path = self.path.as_str();
        let value = match &self.kind {
            ReaderKind::Bool(array) => Value::Bool(array.value(row)),
            ReaderKind::Int { values, kind } => {
                let raw = values.get(row);
                let fits = kind
                    .int_bounds()
                    .is_some_and(|(lo, hi)| lo <= raw && raw <= hi);
                if !fits {
                    return Err(Error::mismatch(path, kind.name(), format!("integer {raw}")));
                }
                if kind.is_unsigned() {
                    Value::UInt(raw as u64)
                } else {
                    Value::Int(raw as i64)
                }
            }
            ReaderKind::Float { values, single } => {
                let v = values.get(row);
                if *single {
                    Value::Float32(OrderedFloat(v as f32))
                } else {
                    Value::Float64(OrderedFloat(v))
                }
            }
            ReaderKind::Text(values) => Value::String(values.get(row).to_string()),
            ReaderKind::Dynamic(values) => {
                let json = serde_json::from_str(values.get(row))
                    .map_err(|err| Error::mismatch(path, "json text", err.to_string()))?;
                json_to_value(json)
            }
            ReaderKind::Decimal { array, scale } => {
                Value::Decimal(Decimal::new(array.value(row), *scale))
            }
            ReaderKind::Timestamp { values, tz_aware } => {
                timestamp(path, values.micros(row), None, *tz_aware)?
            }
            ReaderKind::TimestampOffset {
                instants,
                offsets,
                tz_aware,
            } => {
                let offset = (!offsets.is_null(row)).then(|| offsets.value(row));
                timestamp(path, instants.micros(row), offset, *tz_aware)?
            }
            ReaderKind::Date(array) => {
                let days = array.value(row);
                let date = days
                    .checked_add(UNIX_EPOCH_DAYS_FROM_CE)
                    .and_then(NaiveDate::from_num_days_from_ce_opt)
                    .ok_or_else(|| Error::mismatch(path, "date", format!("day {days}")))?;
                Value::Date(date)
            }
            ReaderKind::Time(values) => {
                let nanos = values.nanos(row);
                let secs = u32::try_from(nanos.div_euclid(1_000_000_000)).ok();
                let frac = u32::try_from(nanos.rem_euclid(1_000_000_000)).ok();
                let time = secs
                    .zip(frac)
                    .and_then(|(secs, frac)| NaiveTime::from_num_seconds_from_midnight_opt(secs, frac))
                    .ok_or_else(|| Error::mismatch(path, "time of day", format!("{nanos}ns")))?;
                Value::Time(time)
            }
            ReaderKind::Binary(values) => Value::Bytes(Bytes::copy_from_slice(values.get(row))),
            ReaderKind::Identifier { array, kind } => {
                let bytes: [u8; 16] = array
                    .value(row)
                    .try_into()
                    .map_err(|_| Error::mismatch(path, "16 bytes", "short identifier"))?;
                match kind {
                    IdentifierKind::Uuid { .. } => Value::Uuid(Uuid::from_bytes(bytes)),
                    IdentifierKind::Ulid => Value::Ulid(Ulid::from_bytes(bytes)),
                }
            }
            ReaderKind::List { offsets, item } => Value::List(
                offsets
                    .range(row)
                    .map(|idx| item.read(idx))
                    .collect::<Result<Vec<_>>>()?,
            ),
            ReaderKind::Map {
                offsets,
                keys,
                values,
            } => {
                let start = offsets[row] as usize;
                let end = offsets[row + 1] as usize;
                let entries = (start..end)
                    .map(|idx| Ok((Value::String(keys.get(idx).to_string()), values.read(idx)?)))
                    .collect::<Result<Vec<_>>>()?;
                Value::Map(entries)
            }
            ReaderKind::Struct { names, children } => Value::Record(
                names
                    .iter()
                    .zip(children)
                    .map(|(name, child)| Ok((name.clone(), child.read(row)?)))
                    .collect::<Result<Vec<_>>>()?,
            ),
            ReaderKind::Tuple(children) => Value::List(
                children
                    .iter()
                    .map(|child| child.read(row))
                    .collect::<Result<Vec<_>>>()?,
            ),
            ReaderKind::TaggedUnion { tags, variants } => {
                let tag = tags.get(row);
                let (name, payload) = variants
                    .iter()
                    .find(|(name, _)| name == tag)
                    .ok_or_else(|| unknown_variant(path, variants.iter().map(|v| &v.0), tag))?;
                let payload = match payload {
                    Some(reader) => reader.read(row)?,
                    None => Value::Null,
                };
                Value::Tagged(TaggedValue::new(name.clone(), payload))
            }
            ReaderKind::DenseUnion { array, variants } => {
                let type_id = array.type_id(row);
                let offset = array.value_offset(row);
                let (_, name, payload) = variants
                    .iter()
                    .find(|(id, _, _)| *id == type_id)
                    .ok_or_else(|| {
                        unknown_variant(path, variants.iter().map(|v| &v.1), &type_id.to_string())
                    })?;
                let payload = match payload {
                    Some(reader) => reader.read(offset)?,
                    None => Value::Null,
                };
                Value::Tagged(TaggedValue::new(name.clone(), payload))
            }
        };
        Ok(value)
    }
}

fn unknown_variant<'n>(path: &str, names: impl Iterator<Item = &'n String>, found: &str) -> Error {
    let names: Vec<&str> = names.map(String::as_str).collect();
    Error::mismatch(
        path,
        format!("one of variants [{}]", names.join(", ")),
        format!("variant '{found}'"),
    )
}

fn timestamp(path: &str, micros: i64, offset: Option<i32>, tz_aware: bool) -> Result<Value> {
    let instant = DateTime::<Utc>::from_timestamp_micros(micros)
        .ok_or_else(|| Error::mismatch(path, "timestamp", format!("{micros}us")))?;
    if !tz_aware {
        return Ok(Value::NaiveTimestamp(instant.naive_utc()));
    }
    let offset = offset
        .and_then(FixedOffset::east_opt)
        .unwrap_or_else(|| Utc.fix());
    Ok(Value::Timestamp(instant.with_timezone(&offset)))
}

enum IntValues {
    I8(Int8Array),
    I16(Int16Array),
    I32(Int32Array),
    I64(Int64Array),
    U8(UInt8Array),
    U16(UInt16Array),
    U32(UInt32Array),
    U64(UInt64Array),
}

impl IntValues {
    fn from_array(array: &ArrayRef) -> Option<Self> {
        Some(match array.data_type() {
            DataType::Int8 => IntValues::I8(downcast(array)?),
            DataType::Int16 => IntValues::I16(downcast(array)?),
            DataType::Int32 => IntValues::I32(downcast(array)?),
            DataType::Int64 => IntValues::I64(downcast(array)?),
            DataType::UInt8 => IntValues::U8(downcast(array)?),
            DataType::UInt16 => IntValues::U16(downcast(array)?),
            DataType::UInt32 => IntValues::U32(downcast(array)?),
            DataType::UInt64 => IntValues::U64(downcast(array)?),
            _ => return None,
        })
    }

    fn get(&self, row: usize) -> i128 {
        match self {
            IntValues::I8(a) => a.value(row).into(),
            IntValues::I16(a) => a.value(row).into(),
            IntValues::I32(a) => a.value(row).into(),
            IntValues::I64(a) => a.value(row).into(),
            IntValues::U8(a) => a.value(row).into(),
            IntValues::U16(a) => a.value(row).into(),
            IntValues::U32(a) => a.value(row).into(),
            IntValues::U64(a) => a.value(row).into(),
        }
    }
}

enum FloatValues {
    F32(Float32Array),
    F64(Float64Array),
}

impl FloatValues {
    fn from_array(array: &ArrayRef) -> Option<Self> {
        match array.data_type() {
            DataType::Float32 => downcast(array).map(FloatValues::F32),
            DataType::Float64 => downcast(array).map(FloatValues::F64),
            _ => None,
        }
    }

    fn get(&self, row: usize) -> f64 {
        match self {
            FloatValues::F32(a) => f64::from(a.value(row)),
            FloatValues::F64(a) => a.value(row),
        }
    }
}

enum TextValues {
    Utf8(StringArray),
    Large(LargeStringArray),
    View(StringViewArray),
}

impl TextValues {
    fn from_array(array: &ArrayRef) -> Option<Self> {
        match array.data_type() {
            DataType::Utf8 => downcast(array).map(TextValues::Utf8),
            DataType::LargeUtf8 => downcast(array).map(TextValues::Large),
            DataType::Utf8View => downcast(array).map(TextValues::View),
            _ => None,
        }
    }

    fn get(&self, row: usize) -> &str {
        match self {
            TextValues::Utf8(a) => a.value(row),
            TextValues::Large(a) => a.value(row),
            TextValues::View(a) => a.value(row),
        }
    }
}

enum BinaryValues {
    Binary(BinaryArray),
    Large(LargeBinaryArray),
    View(BinaryViewArray),
    Fixed(FixedSizeBinaryArray),
}

impl BinaryValues {
    fn from_array(array: &ArrayRef) -> Option<Self> {
        match array.data_type() {
            DataType::Binary => downcast(array).map(BinaryValues::Binary),
            DataType::LargeBinary => downcast(array).map(BinaryValues::Large),
            DataType::BinaryView => downcast(array).map(BinaryValues::View),
            DataType::FixedSizeBinary(_) => downcast(array).map(BinaryValues::Fixed),
            _ => None,
        }
    }

    fn get(&self, row: usize) -> &[u8] {
        match self {
            BinaryValues::Binary(a) => a.value(row),
            BinaryValues::Large(a) => a.value(row),
            BinaryValues::View(a) => a.value(row),
            BinaryValues::Fixed(a) => a.value(row),
        }
    }
}

enum TimestampValues {
    Second(TimestampSecondArray),
    Milli(TimestampMillisecondArray),
    Micro(TimestampMicrosecondArray),
    Nano(TimestampNanosecondArray),
}

impl TimestampValues {
    fn from_array(array: &ArrayRef) -> Option<Self> {
        match array.data_type() {
            DataType::Timestamp(TimeUnit::Second, _) => downcast(array).map(TimestampValues::Second),
            DataType::Timestamp(TimeUnit::Millisecond, _) => {
                downcast(array).map(TimestampValues::Milli)
            }
            DataType::Timestamp(TimeUnit::Microsecond, _) => {
                downcast(array).map(TimestampValues::Micro)
            }
            DataType::Timestamp(TimeUnit::Nanosecond, _) => {
                downcast(array).map(TimestampValues::Nano)
            }
            _ => None,
        }
    }

    fn micros(&self, row: usize) -> i64 {
        match self {
            TimestampValues::Second(a) => a.value(row).saturating_mul(1_000_000),
            TimestampValues::Milli(a) => a.value(row).saturating_mul(1_000),
            TimestampValues::Micro(a) => a.value(row),
            TimestampValues::Nano(a) => a.value(row).div_euclid(1_000),
        }
    }
}

enum TimeValues {
    Micro(Time64MicrosecondArray),
    Nano(Time64NanosecondArray),
}

impl TimeValues {
    fn from_array(array: &ArrayRef) -> Option<Self> {
        match array.data_type() {
            DataType::Time64(TimeUnit::Microsecond) => downcast(array).map(TimeValues::Micro),
            DataType::Time64(TimeUnit::Nanosecond) => downcast(array).map(TimeValues::Nano),
            _ => None,
        }
    }

    fn nanos(&self, row: usize) -> i64 {
        match self {
            TimeValues::Micro(a) => a.value(row).saturating_mul(1_000),
            TimeValues::Nano(a) => a.value(row),
        }
    }
}

enum ListOffsets {
    Small(OffsetBuffer<i32>),
    Large(OffsetBuffer<i64>),
    Fixed(usize),
}

impl ListOffsets {
    fn range(&self, row: usize) -> Range<usize> {
        match self {
            ListOffsets::Small(offsets) => offsets[row] as usize..offsets[row + 1] as usize,
            ListOffsets::Large(offsets) => offsets[row] as usize..offsets[row + 1] as usize,
            ListOffsets::Fixed(size) => row * size..(row + 1) * size,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::{Int64Array, StringArray};
    use arrow::datatypes::{Field as ArrowField, Schema as ArrowSchema};
    use stratum::{Field, ModelSchema, TypeDescriptor};

    use crate::schema::SchemaBuilder;

    fn target(fields: Vec<Field>) -> Arc<Schema> {
        let model = ModelSchema::record("test.Decode", fields);
        SchemaBuilder::new(ConversionConfig::default())
            .build(&model)
            .expect("schema")
    }

    fn batch(columns: Vec<(&str, ArrayRef, bool)>) -> RecordBatch {
        let fields: Vec<ArrowField> = columns
            .iter()
            .map(|(name, array, nullable)| ArrowField::new(*name, array.data_type().clone(), *nullable))
            .collect();
        let arrays = columns.into_iter().map(|(_, array, _)| array).collect();
        RecordBatch::try_new(Arc::new(ArrowSchema::new(fields)), arrays).expect("batch")
    }

    #[test]
    fn coerces_string_layouts_and_int_widths() {
        let schema = target(vec![
            Field::new("name", TypeDescriptor::string()),
            Field::new("age", TypeDescriptor::optional(TypeDescriptor::int64())),
        ]);
        let input = batch(vec![
            ("name", Arc::new(StringArray::from(vec!["ann", "bo"])), false),
            ("age", Arc::new(Int32Array::from(vec![Some(30), None])), true),
        ]);
        let rows = Decoder::new(schema, ConversionConfig::default())
            .decode(&input, true)
            .expect("rows");
        assert_eq!(
            rows[0],
            Value::record([("name", Value::from("ann")), ("age", Value::from(30))])
        );
        assert_eq!(rows[1].get("age"), Some(&Value::Null));
    }

    #[test]
    fn rejects_incompatible_types_with_path() {
        let schema = target(vec![Field::new("name", TypeDescriptor::string())]);
        let input = batch(vec![("name", Arc::new(Int64Array::from(vec![1])), false)]);
        let err = Decoder::new(schema, ConversionConfig::default())
            .decode(&input, false)
            .expect_err("int for string");
        match err {
            Error::SchemaMismatch { path, found, .. } => {
                assert_eq!(path, "name");
                assert_eq!(found, "Int64");
            }
            other => panic!("unexpected error {other}"),
        }
    }

    #[test]
    fn narrowing_reads_check_the_value() {
        let schema = target(vec![Field::new(
            "small",
            TypeDescriptor::Scalar(ScalarKind::Int8),
        )]);
        let input = batch(vec![("small", Arc::new(Int64Array::from(vec![5, 500])), false)]);
        let err = Decoder::new(schema, ConversionConfig::default())
            .decode(&input, false)
            .expect_err("500 does not fit int8");
        assert!(err.to_string().contains("integer 500"), "{err}");
    }

    #[test]
    fn missing_columns_use_defaults_then_nulls() {
        let schema = target(vec![
            Field::new("name", TypeDescriptor::string()),
            Field::new("tags", TypeDescriptor::list(TypeDescriptor::string()))
                .with_default(Value::List(Vec::new())),
            Field::new("note", TypeDescriptor::optional(TypeDescriptor::string())),
        ]);
        let input = batch(vec![("name", Arc::new(StringArray::from(vec!["x"])), false)]);
        let rows = Decoder::new(Arc::clone(&schema), ConversionConfig::default())
            .decode(&input, true)
            .expect("rows");
        assert_eq!(rows[0].get("tags"), Some(&Value::List(Vec::new())));
        assert_eq!(rows[0].get("note"), Some(&Value::Null));

        let strict = target(vec![Field::new("id", TypeDescriptor::int64())]);
        let err = Decoder::new(strict, ConversionConfig::default())
            .decode(&input, false)
            .expect_err("required column");
        assert!(err.to_string().contains("missing column"), "{err}");
    }

    #[test]
    fn validation_failures_report_the_row() {
        let schema = target(vec![Field::new("score", TypeDescriptor::int64())
            .with_constraint(stratum::Constraint::Ge(0.0))]);
        let input = batch(vec![("score", Arc::new(Int64Array::from(vec![1, -4])), false)]);
        let err = Decoder::new(schema, ConversionConfig::default())
            .decode(&input, true)
            .expect_err("negative score");
        let Error::Validation(validation) = err else {
            panic!("expected validation error");
        };
        assert_eq!(validation.row, Some(1));
        assert_eq!(validation.paths(), vec!["score"]);
    }
}
