use std::sync::Arc;

use arrow::array::{
    ArrayRef, BinaryViewBuilder, BooleanArray, Date32Array, Decimal128Array, FixedSizeBinaryArray,
    FixedSizeListArray, Int32Array, LargeStringArray, ListArray, MapArray,
    PrimitiveArray, StringArray, StringViewBuilder, StructArray, Time64MicrosecondArray,
    TimestampMicrosecondArray, UnionArray,
};
use arrow::datatypes::{
    ArrowPrimitiveType, DataType, Float32Type, Float64Type, Int16Type, Int32Type, Int64Type,
    Int8Type, UInt16Type, UInt32Type, UInt64Type, UInt8Type,
};
use arrow_buffer::{
    ArrowNativeType, Buffer, NullBuffer, NullBufferBuilder, OffsetBuffer, ScalarBuffer,
};
use bytes::Bytes;
use stratum::ScalarKind;

use crate::config::UnionEncoding;
use crate::error::{Error, Result};
use crate::mapper::{
    dense_union_fields, map_entries_field, offset_fields, tagged_struct_fields, EnumRepr,
    NodeKind, SchemaNode, UTC,
};

/// Binary payloads at least this long become their own view block.
pub const ALIAS_THRESHOLD: usize = 1024;

/// Growable storage for one column: a validity vector plus typed payload.
#[derive(Debug)]
pub(crate) struct ColumnBuffer {
    validity: Vec<bool>,
    pub(crate) data: ColumnData,
}

#[derive(Debug)]
pub(crate) enum ColumnData {
    /// Also the selection flags of unit variants.
    Bool(Vec<bool>),
    Int(Vec<i64>),
    UInt(Vec<u64>),
    Float(Vec<f64>),
    Decimal(Vec<i128>),
    Timestamp(Vec<i64>),
    TimestampOffset {
        instants: Vec<i64>,
        offsets: Vec<Option<i32>>,
    },
    Date(Vec<i32>),
    Time(Vec<i64>),
    Text {
        data: Vec<u8>,
        ends: Vec<usize>,
    },
    Binary(Vec<Bytes>),
    /// 16 bytes per slot.
    Fixed(Vec<u8>),
    List {
        offsets: Vec<usize>,
        item: Box<ColumnBuffer>,
    },
    FixedList {
        size: usize,
        item: Box<ColumnBuffer>,
    },
    Map {
        offsets: Vec<usize>,
        keys: Box<ColumnBuffer>,
        values: Box<ColumnBuffer>,
    },
    /// Records, tuples and tagged-struct unions (`tag` first).
    Struct(Vec<ColumnBuffer>),
    Union {
        type_ids: Vec<i8>,
        offsets: Vec<i32>,
        children: Vec<ColumnBuffer>,
    },
}

#[derive(Clone, Copy, Debug)]
enum TextLayout {
    View,
    Utf8,
    Large,
}

impl ColumnBuffer {
    fn with_data(data: ColumnData) -> Self {
        Self {
            validity: Vec::new(),
            data,
        }
    }

    pub(crate) fn text() -> Self {
        Self::with_data(ColumnData::Text {
            data: Vec::new(),
            ends: Vec::new(),
        })
    }

    pub(crate) fn for_node(node: &SchemaNode) -> Self {
        let data = match &node.kind {
            NodeKind::Scalar(ScalarKind::Bool) => ColumnData::Bool(Vec::new()),
            NodeKind::Scalar(ScalarKind::String) | NodeKind::Dynamic => return Self::text(),
            NodeKind::Scalar(kind) if kind.is_float() => ColumnData::Float(Vec::new()),
            NodeKind::Scalar(kind) if kind.is_unsigned() => ColumnData::UInt(Vec::new()),
            NodeKind::Scalar(_) => ColumnData::Int(Vec::new()),
            NodeKind::Decimal { .. } => ColumnData::Decimal(Vec::new()),
            NodeKind::Timestamp {
                preserve_offset: false,
                ..
            } => ColumnData::Timestamp(Vec::new()),
            NodeKind::Timestamp {
                preserve_offset: true,
                ..
            } => ColumnData::TimestampOffset {
                instants: Vec::new(),
                offsets: Vec::new(),
            },
            NodeKind::Date => ColumnData::Date(Vec::new()),
            NodeKind::Time => ColumnData::Time(Vec::new()),
            NodeKind::Binary => ColumnData::Binary(Vec::new()),
            NodeKind::Identifier(_) => ColumnData::Fixed(Vec::new()),
            NodeKind::Enum {
                repr: EnumRepr::Int(_),
                ..
            } => ColumnData::Int(Vec::new()),
            NodeKind::Enum {
                repr: EnumRepr::Str,
                ..
            } => return Self::text(),
            NodeKind::List(item) => ColumnData::List {
                offsets: vec![0],
                item: Box::new(Self::for_node(item)),
            },
            NodeKind::FixedSizeList { item, size } => ColumnData::FixedList {
                size: *size,
                item: Box::new(Self::for_node(item)),
            },
            NodeKind::Map { value } => ColumnData::Map {
                offsets: vec![0],
                keys: Box::new(Self::text()),
                values: Box::new(Self::for_node(value)),
            },
            NodeKind::Struct(children) | NodeKind::Tuple(children) => {
                ColumnData::Struct(children.iter().map(Self::for_node).collect())
            }
            NodeKind::Union {
                variants,
                mode: UnionEncoding::TaggedStruct,
            } => {
                let mut children = Vec::with_capacity(variants.len() + 1);
                children.push(Self::text());
                for variant in variants {
                    children.push(match &variant.payload {
                        Some(payload) => Self::for_node(payload),
                        None => Self::with_data(ColumnData::Bool(Vec::new())),
                    });
                }
                ColumnData::Struct(children)
            }
            NodeKind::Union {
                variants,
                mode: UnionEncoding::DenseUnion,
            } => ColumnData::Union {
                type_ids: Vec::new(),
                offsets: Vec::new(),
                children: variants
                    .iter()
                    .map(|variant| match &variant.payload {
                        Some(payload) => Self::for_node(payload),
                        None => Self::with_data(ColumnData::Bool(Vec::new())),
                    })
                    .collect(),
            },
        };
        Self::with_data(data)
    }

    pub(crate) fn len(&self) -> usize {
        self.validity.len()
    }

    pub(crate) fn reserve(&mut self, additional: usize) {
        self.validity.reserve(additional);
        match &mut self.data {
            ColumnData::Bool(values) => values.reserve(additional),
            ColumnData::Int(values) | ColumnData::Timestamp(values) | ColumnData::Time(values) => {
                values.reserve(additional)
            }
            ColumnData::UInt(values) => values.reserve(additional),
            ColumnData::Float(values) => values.reserve(additional),
            ColumnData::Decimal(values) => values.reserve(additional),
            ColumnData::Date(values) => values.reserve(additional),
            ColumnData::Text { ends, .. } => ends.reserve(additional),
            ColumnData::Binary(values) => values.reserve(additional),
            ColumnData::Fixed(values) => values.reserve(additional * 16),
            ColumnData::Struct(children) => {
                children.iter_mut().for_each(|child| child.reserve(additional))
            }
            _ => {}
        }
    }

    pub(crate) fn mark_valid(&mut self) {
        self.validity.push(true);
    }

    /// Set flag for a selected unit variant.
    pub(crate) fn push_unit(&mut self) {
        if let ColumnData::Bool(flags) = &mut self.data {
            flags.push(true);
        }
        self.validity.push(true);
    }

    pub(crate) fn push_null(&mut self) {
        self.validity.push(false);
        match &mut self.data {
            ColumnData::Bool(values) => values.push(false),
            ColumnData::Int(values) | ColumnData::Timestamp(values) | ColumnData::Time(values) => {
                values.push(0)
            }
            ColumnData::UInt(values) => values.push(0),
            ColumnData::Float(values) => values.push(0.0),
            ColumnData::Decimal(values) => values.push(0),
            ColumnData::TimestampOffset { instants, offsets } => {
                instants.push(0);
                offsets.push(None);
            }
            ColumnData::Date(values) => values.push(0),
            ColumnData::Text { data, ends } => ends.push(data.len()),
            ColumnData::Binary(values) => values.push(Bytes::new()),
            ColumnData::Fixed(values) => values.extend_from_slice(&[0; 16]),
            ColumnData::List { offsets, .. } | ColumnData::Map { offsets, .. } => {
                let last = offsets.last().copied().unwrap_or(0);
                offsets.push(last);
            }
            ColumnData::FixedList { size, item } => {
                for _ in 0..*size {
                    item.push_null();
                }
            }
            ColumnData::Struct(children) => children.iter_mut().for_each(ColumnBuffer::push_null),
            ColumnData::Union {
                type_ids,
                offsets,
                children,
            } => {
                if let Some(first) = children.first_mut() {
                    type_ids.push(0);
                    offsets.push(first.len() as i32);
                    first.push_null();
                }
            }
        }
    }

    pub(crate) fn push_text(&mut self, text: &str) {
        if let ColumnData::Text { data, ends } = &mut self.data {
            data.extend_from_slice(text.as_bytes());
            ends.push(data.len());
            self.validity.push(true);
        }
    }

    /// Drop everything past `len` rows, recursively.
    pub(crate) fn truncate(&mut self, len: usize) {
        self.validity.truncate(len);
        match &mut self.data {
            ColumnData::Bool(values) => values.truncate(len),
            ColumnData::Int(values) | ColumnData::Timestamp(values) | ColumnData::Time(values) => {
                values.truncate(len)
            }
            ColumnData::UInt(values) => values.truncate(len),
            ColumnData::Float(values) => values.truncate(len),
            ColumnData::Decimal(values) => values.truncate(len),
            ColumnData::TimestampOffset { instants, offsets } => {
                instants.truncate(len);
                offsets.truncate(len);
            }
            ColumnData::Date(values) => values.truncate(len),
            ColumnData::Text { data, ends } => {
                ends.truncate(len);
                data.truncate(ends.last().copied().unwrap_or(0));
            }
            ColumnData::Binary(values) => values.truncate(len),
            ColumnData::Fixed(values) => values.truncate(len * 16),
            ColumnData::List { offsets, item } => {
                offsets.truncate(len + 1);
                item.truncate(offsets.last().copied().unwrap_or(0));
            }
            ColumnData::FixedList { size, item } => item.truncate(len * *size),
            ColumnData::Map {
                offsets,
                keys,
                values,
            } => {
                offsets.truncate(len + 1);
                let entries = offsets.last().copied().unwrap_or(0);
                keys.truncate(entries);
                values.truncate(entries);
            }
            ColumnData::Struct(children) => {
                children.iter_mut().for_each(|child| child.truncate(len))
            }
            ColumnData::Union {
                type_ids,
                offsets,
                children,
            } => {
                type_ids.truncate(len);
                offsets.truncate(len);
                for (idx, child) in children.iter_mut().enumerate() {
                    let kept = type_ids.iter().filter(|id| **id as usize == idx).count();
                    child.truncate(kept);
                }
            }
        }
    }

    fn nulls(&self) -> Option<NullBuffer> {
        let mut builder = NullBufferBuilder::new(self.validity.len());
        builder.append_slice(&self.validity);
        builder.finish()
    }

    fn is_valid(&self, idx: usize) -> bool {
        self.validity.get(idx).copied().unwrap_or(false)
    }

    pub(crate) fn finish(&self, node: &SchemaNode) -> Result<ArrayRef> {
        let nulls = self.nulls();
        let array: ArrayRef = match (&self.data, &node.kind) {
            (ColumnData::Bool(values), _) => Arc::new(BooleanArray::new(
                values.iter().copied().collect(),
                nulls,
            )),
            (
                ColumnData::Int(values),
                NodeKind::Scalar(kind)
                | NodeKind::Enum {
                    repr: EnumRepr::Int(kind),
                    ..
                },
            ) => signed(values, *kind, nulls)?,
            (ColumnData::UInt(values), NodeKind::Scalar(kind)) => unsigned(values, *kind, nulls)?,
            (ColumnData::Float(values), NodeKind::Scalar(ScalarKind::Float32)) => {
                primitive::<Float32Type>(values.iter().map(|v| *v as f32).collect(), nulls)?
            }
            (ColumnData::Float(values), _) => primitive::<Float64Type>(values.clone(), nulls)?,
            (ColumnData::Decimal(values), NodeKind::Decimal { precision, scale }) => Arc::new(
                Decimal128Array::try_new(ScalarBuffer::from(values.clone()), nulls)?
                    .with_precision_and_scale(*precision, *scale)?,
            ),
            (ColumnData::Timestamp(values), _) => Arc::new(
                TimestampMicrosecondArray::try_new(ScalarBuffer::from(values.clone()), nulls)?
                    .with_timezone(UTC),
            ),
            (ColumnData::TimestampOffset { instants, offsets }, _) => {
                let instant =
                    TimestampMicrosecondArray::try_new(ScalarBuffer::from(instants.clone()), None)?
                        .with_timezone(UTC);
                let offset = Int32Array::from(offsets.clone());
                Arc::new(StructArray::try_new(
                    offset_fields(),
                    vec![Arc::new(instant), Arc::new(offset)],
                    nulls,
                )?)
            }
            (ColumnData::Date(values), _) => {
                Arc::new(Date32Array::try_new(ScalarBuffer::from(values.clone()), nulls)?)
            }
            (ColumnData::Time(values), _) => Arc::new(Time64MicrosecondArray::try_new(
                ScalarBuffer::from(values.clone()),
                nulls,
            )?),
            (ColumnData::Text { .. }, NodeKind::Scalar(_)) => self.finish_text(TextLayout::View)?,
            (ColumnData::Text { .. }, NodeKind::Enum { .. }) => {
                self.finish_text(TextLayout::Utf8)?
            }
            (ColumnData::Text { .. }, NodeKind::Dynamic) => self.finish_text(TextLayout::Large)?,
            (ColumnData::Binary(values), _) => self.finish_binary(values)?,
            (ColumnData::Fixed(bytes), _) => Arc::new(FixedSizeBinaryArray::try_new(
                16,
                Buffer::from_vec(bytes.clone()),
                nulls,
            )?),
            (ColumnData::List { offsets, item }, NodeKind::List(item_node)) => {
                Arc::new(ListArray::try_new(
                    Arc::new(item_node.to_field()),
                    offset_buffer::<i32>(offsets, &node.name)?,
                    item.finish(item_node)?,
                    nulls,
                )?)
            }
            (
                ColumnData::FixedList { size, item },
                NodeKind::FixedSizeList {
                    item: item_node, ..
                },
            ) => Arc::new(FixedSizeListArray::try_new(
                Arc::new(item_node.to_field()),
                *size as i32,
                item.finish(item_node)?,
                nulls,
            )?),
            (
                ColumnData::Map {
                    offsets,
                    keys,
                    values,
                },
                NodeKind::Map { value },
            ) => {
                let entries_field = map_entries_field(value);
                let DataType::Struct(entry_fields) = entries_field.data_type() else {
                    return Err(Error::encode(&node.name, "map entries must be a struct"));
                };
                let entries = StructArray::try_new(
                    entry_fields.clone(),
                    vec![keys.finish_text(TextLayout::Utf8)?, values.finish(value)?],
                    None,
                )?;
                Arc::new(MapArray::try_new(
                    Arc::new(entries_field),
                    offset_buffer::<i32>(offsets, &node.name)?,
                    entries,
                    nulls,
                    false,
                )?)
            }
            (ColumnData::Struct(children), NodeKind::Struct(nodes) | NodeKind::Tuple(nodes)) => {
                if nodes.is_empty() {
                    Arc::new(StructArray::new_empty_fields(self.len(), nulls))
                } else {
                    let arrays = children
                        .iter()
                        .zip(nodes)
                        .map(|(child, child_node)| child.finish(child_node))
                        .collect::<Result<Vec<_>>>()?;
                    let fields = nodes.iter().map(SchemaNode::to_field).collect();
                    Arc::new(StructArray::try_new(fields, arrays, nulls)?)
                }
            }
            (
                ColumnData::Struct(children),
                NodeKind::Union {
                    variants,
                    mode: UnionEncoding::TaggedStruct,
                },
            ) => {
                let mut arrays = Vec::with_capacity(children.len());
                if let Some(tag) = children.first() {
                    arrays.push(tag.finish_text(TextLayout::Utf8)?);
                }
                for (child, variant) in children.iter().skip(1).zip(variants) {
                    arrays.push(match &variant.payload {
                        Some(payload) => child.finish(payload)?,
                        None => child.finish_flags()?,
                    });
                }
                Arc::new(StructArray::try_new(
                    tagged_struct_fields(variants),
                    arrays,
                    nulls,
                )?)
            }
            (
                ColumnData::Union {
                    type_ids,
                    offsets,
                    children,
                },
                NodeKind::Union { variants, .. },
            ) => {
                let arrays = children
                    .iter()
                    .zip(variants)
                    .map(|(child, variant)| match &variant.payload {
                        Some(payload) => child.finish(payload),
                        None => child.finish_flags(),
                    })
                    .collect::<Result<Vec<_>>>()?;
                Arc::new(UnionArray::try_new(
                    dense_union_fields(variants),
                    ScalarBuffer::from(type_ids.clone()),
                    Some(ScalarBuffer::from(offsets.clone())),
                    arrays,
                )?)
            }
            (_, kind) => {
                return Err(Error::encode(
                    &node.name,
                    format!("column buffer cannot produce {}", kind.signature()),
                ))
            }
        };
        Ok(array)
    }

    fn finish_flags(&self) -> Result<ArrayRef> {
        match &self.data {
            ColumnData::Bool(values) => Ok(Arc::new(BooleanArray::new(
                values.iter().copied().collect(),
                self.nulls(),
            ))),
            _ => Err(Error::encode("", "unit variant flags must be boolean")),
        }
    }

    fn finish_text(&self, layout: TextLayout) -> Result<ArrayRef> {
        let ColumnData::Text { data, ends } = &self.data else {
            return Err(Error::encode("", "text column expected"));
        };
        let offsets: Vec<usize> = std::iter::once(0).chain(ends.iter().copied()).collect();
        let array: ArrayRef = match layout {
            TextLayout::View => {
                let mut builder = StringViewBuilder::with_capacity(ends.len());
                for (idx, window) in offsets.windows(2).enumerate() {
                    if self.is_valid(idx) {
                        let text = std::str::from_utf8(&data[window[0]..window[1]])
                            .map_err(|err| Error::encode("", err.to_string()))?;
                        builder.append_value(text);
                    } else {
                        builder.append_null();
                    }
                }
                Arc::new(builder.finish())
            }
            TextLayout::Utf8 => Arc::new(StringArray::try_new(
                offset_buffer::<i32>(&offsets, "")?,
                Buffer::from_vec(data.clone()),
                self.nulls(),
            )?),
            TextLayout::Large => Arc::new(LargeStringArray::try_new(
                offset_buffer::<i64>(&offsets, "")?,
                Buffer::from_vec(data.clone()),
                self.nulls(),
            )?),
        };
        Ok(array)
    }

    fn finish_binary(&self, values: &[Bytes]) -> Result<ArrayRef> {
        let mut builder = BinaryViewBuilder::with_capacity(values.len());
        for (idx, payload) in values.iter().enumerate() {
            if !self.is_valid(idx) {
                builder.append_null();
            } else if payload.len() >= ALIAS_THRESHOLD {
                let len = u32::try_from(payload.len())
                    .map_err(|_| Error::encode("", "binary payload exceeds 4 GiB"))?;
                let block = builder.append_block(Buffer::from(payload.clone()));
                builder.try_append_view(block, 0, len)?;
            } else {
                builder.append_value(&payload[..]);
            }
        }
        Ok(Arc::new(builder.finish()))
    }
}

fn primitive<T: ArrowPrimitiveType>(
    values: Vec<T::Native>,
    nulls: Option<NullBuffer>,
) -> Result<ArrayRef> {
    Ok(Arc::new(PrimitiveArray::<T>::try_new(
        ScalarBuffer::from(values),
        nulls,
    )?))
}

fn signed(values: &[i64], kind: ScalarKind, nulls: Option<NullBuffer>) -> Result<ArrayRef> {
    match kind {
        ScalarKind::Int8 => primitive::<Int8Type>(values.iter().map(|v| *v as i8).collect(), nulls),
        ScalarKind::Int16 => {
            primitive::<Int16Type>(values.iter().map(|v| *v as i16).collect(), nulls)
        }
        ScalarKind::Int32 => {
            primitive::<Int32Type>(values.iter().map(|v| *v as i32).collect(), nulls)
        }
        _ => primitive::<Int64Type>(values.to_vec(), nulls),
    }
}

fn unsigned(values: &[u64], kind: ScalarKind, nulls: Option<NullBuffer>) -> Result<ArrayRef> {
    match kind {
        ScalarKind::UInt8 => {
            primitive::<UInt8Type>(values.iter().map(|v| *v as u8).collect(), nulls)
        }
        ScalarKind::UInt16 => {
            primitive::<UInt16Type>(values.iter().map(|v| *v as u16).collect(), nulls)
        }
        ScalarKind::UInt32 => {
            primitive::<UInt32Type>(values.iter().map(|v| *v as u32).collect(), nulls)
        }
        _ => primitive::<UInt64Type>(values.to_vec(), nulls),
    }
}

fn offset_buffer<O: ArrowNativeType>(offsets: &[usize], path: &str) -> Result<OffsetBuffer<O>> {
    let converted = offsets
        .iter()
        .map(|offset| {
            O::from_usize(*offset)
                .ok_or_else(|| Error::encode(path, "column exceeds the offset range"))
        })
        .collect::<Result<Vec<O>>>()?;
    Ok(OffsetBuffer::new(ScalarBuffer::from(converted)))
}
