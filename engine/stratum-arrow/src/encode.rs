use std::sync::Arc;

use arrow::array::StructArray;
use arrow::record_batch::{RecordBatch, RecordBatchOptions};
use chrono::{Datelike, Timelike};
use stratum::{Decimal, EnumMember, EnumValue, IdentifierKind, ScalarKind, Value};
use tracing::debug;

use crate::buffer::{ColumnBuffer, ColumnData};
use crate::config::{ConversionConfig, DateTimePolicy, UnionEncoding};
use crate::error::{join_path, Error, Result};
use crate::json::value_to_json;
use crate::mapper::{EnumRepr, NodeKind, SchemaNode, VariantNode};
use crate::schema::Schema;

/// Days from 0001-01-01 to 1970-01-01.
pub(crate) const UNIX_EPOCH_DAYS_FROM_CE: i32 = 719_163;

/// Row-at-a-time writer into per-column buffers.
///
/// A failed `append` leaves the encoder exactly as it was before the call.
#[derive(Debug)]
pub struct RowEncoder {
    schema: Arc<Schema>,
    config: ConversionConfig,
    columns: Vec<ColumnBuffer>,
    rows: usize,
}

impl RowEncoder {
    pub fn new(schema: Arc<Schema>, config: ConversionConfig) -> Self {
        Self::with_capacity(schema, config, 0)
    }

    pub fn with_capacity(schema: Arc<Schema>, config: ConversionConfig, capacity: usize) -> Self {
        let columns = schema
            .nodes()
            .iter()
            .map(|node| {
                let mut column = ColumnBuffer::for_node(node);
                column.reserve(capacity);
                column
            })
            .collect();
        Self {
            schema,
            config,
            columns,
            rows: 0,
        }
    }

    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    pub fn len(&self) -> usize {
        self.rows
    }

    pub fn is_empty(&self) -> bool {
        self.rows == 0
    }

    pub fn append(&mut self, row: &Value) -> Result<()> {
        match self.write_row(row) {
            Ok(()) => {
                self.rows += 1;
                Ok(())
            }
            Err(err) => {
                let rows = self.rows;
                self.columns
                    .iter_mut()
                    .for_each(|column| column.truncate(rows));
                Err(err)
            }
        }
    }

    pub fn append_all<'a>(&mut self, rows: impl IntoIterator<Item = &'a Value>) -> Result<()> {
        for row in rows {
            self.append(row)?;
        }
        Ok(())
    }

    fn write_row(&mut self, row: &Value) -> Result<()> {
        let nodes = self.schema.nodes();
        match row {
            Value::Record(fields) => {
                for (node, column) in nodes.iter().zip(self.columns.iter_mut()) {
                    let value = lookup(fields, &node.name);
                    write_field(column, node, value, &node.name, &self.config)?;
                }
                Ok(())
            }
            Value::Null => {
                if let Some(required) = nodes.iter().find(|node| !node.nullable) {
                    return Err(Error::mismatch(
                        &required.name,
                        required.signature(),
                        "null row",
                    ));
                }
                self.columns.iter_mut().for_each(ColumnBuffer::push_null);
                Ok(())
            }
            other => Err(Error::mismatch("", "record", other.summary())),
        }
    }

    /// Materialise the buffered rows; the encoder keeps its contents.
    pub fn finish(&self) -> Result<RecordBatch> {
        let columns = self
            .columns
            .iter()
            .zip(self.schema.nodes())
            .map(|(column, node)| column.finish(node))
            .collect::<Result<Vec<_>>>()?;
        let options = RecordBatchOptions::new().with_row_count(Some(self.rows));
        let batch =
            RecordBatch::try_new_with_options(self.schema.arrow_schema(), columns, &options)?;
        debug!(
            model = %self.schema.metadata().model,
            rows = batch.num_rows(),
            columns = batch.num_columns(),
            "materialised record batch"
        );
        Ok(batch)
    }

    pub fn finish_struct(&self) -> Result<StructArray> {
        Ok(StructArray::from(self.finish()?))
    }

    pub fn clear(&mut self) {
        self.columns.iter_mut().for_each(|column| column.truncate(0));
        self.rows = 0;
    }
}

fn lookup<'v>(fields: &'v [(String, Value)], name: &str) -> Option<&'v Value> {
    fields
        .iter()
        .find(|(field, _)| field == name)
        .map(|(_, value)| value)
}

fn write_field(
    column: &mut ColumnBuffer,
    node: &SchemaNode,
    value: Option<&Value>,
    path: &str,
    config: &ConversionConfig,
) -> Result<()> {
    match (value, &node.default) {
        (Some(value), _) | (None, Some(value)) => write_value(column, node, value, path, config),
        (None, None) if node.nullable => {
            column.push_null();
            Ok(())
        }
        (None, None) => Err(Error::mismatch(path, node.signature(), "missing field")),
    }
}

fn shape(path: &str, node: &SchemaNode, found: &Value) -> Error {
    Error::mismatch(path, node.kind.signature(), found.summary())
}

fn push_str(data: &mut Vec<u8>, ends: &mut Vec<usize>, text: &str) {
    data.extend_from_slice(text.as_bytes());
    ends.push(data.len());
}

pub(crate) fn write_value(
    column: &mut ColumnBuffer,
    node: &SchemaNode,
    value: &Value,
    path: &str,
    config: &ConversionConfig,
) -> Result<()> {
    if value.is_null() {
        if node.nullable {
            column.push_null();
            return Ok(());
        }
        if matches!(node.kind, NodeKind::Dynamic) {
            column.push_text("null");
            return Ok(());
        }
        return Err(Error::mismatch(path, node.signature(), "null"));
    }
    let fast = config.fast_path_skip_validation;
    match (&node.kind, &mut column.data) {
        (NodeKind::Scalar(ScalarKind::Bool), ColumnData::Bool(values)) => match value {
            Value::Bool(flag) => values.push(*flag),
            other => return Err(shape(path, node, other)),
        },
        (NodeKind::Scalar(kind), ColumnData::Int(values)) => {
            values.push(integer(node, *kind, value, path, fast)? as i64)
        }
        (NodeKind::Scalar(kind), ColumnData::UInt(values)) => {
            values.push(integer(node, *kind, value, path, fast)? as u64)
        }
        (NodeKind::Scalar(_), ColumnData::Float(values)) => values.push(match value {
            Value::Float32(v) => f64::from(v.0),
            Value::Float64(v) => v.0,
            Value::Int(v) => *v as f64,
            Value::UInt(v) => *v as f64,
            other => return Err(shape(path, node, other)),
        }),
        (NodeKind::Scalar(ScalarKind::String), ColumnData::Text { data, ends }) => match value {
            Value::String(text) => push_str(data, ends, text),
            other => return Err(shape(path, node, other)),
        },
        (NodeKind::Decimal { precision, scale }, ColumnData::Decimal(values)) => {
            values.push(decimal(node, value, *precision, *scale, path, fast)?)
        }
        (NodeKind::Timestamp { .. }, ColumnData::Timestamp(values)) => {
            let (micros, _) = timestamp(node, value, config.datetime_policy, path)?;
            values.push(micros);
        }
        (NodeKind::Timestamp { .. }, ColumnData::TimestampOffset { instants, offsets }) => {
            let (micros, offset) = timestamp(node, value, config.datetime_policy, path)?;
            instants.push(micros);
            offsets.push(offset);
        }
        (NodeKind::Date, ColumnData::Date(values)) => match value {
            Value::Date(date) => values.push(date.num_days_from_ce() - UNIX_EPOCH_DAYS_FROM_CE),
            other => return Err(shape(path, node, other)),
        },
        (NodeKind::Time, ColumnData::Time(values)) => match value {
            Value::Time(time) => values.push(
                i64::from(time.num_seconds_from_midnight()) * 1_000_000
                    + i64::from(time.nanosecond() / 1_000),
            ),
            other => return Err(shape(path, node, other)),
        },
        (NodeKind::Binary, ColumnData::Binary(values)) => match value {
            Value::Bytes(payload) => values.push(payload.clone()),
            other => return Err(shape(path, node, other)),
        },
        (NodeKind::Identifier(kind), ColumnData::Fixed(bytes)) => {
            bytes.extend_from_slice(&identifier(node, *kind, value, path, fast)?)
        }
        (NodeKind::Enum { members, repr: EnumRepr::Int(_) }, ColumnData::Int(values)) => {
            match enum_member(node, members, value, path, fast)? {
                EnumValue::Int(v) => values.push(v),
                EnumValue::Str(_) => return Err(shape(path, node, value)),
            }
        }
        (NodeKind::Enum { members, repr: EnumRepr::Str }, ColumnData::Text { data, ends }) => {
            match enum_member(node, members, value, path, fast)? {
                EnumValue::Str(text) => push_str(data, ends, &text),
                EnumValue::Int(_) => return Err(shape(path, node, value)),
            }
        }
        (NodeKind::Dynamic, ColumnData::Text { data, ends }) => {
            let json = serde_json::to_string(&value_to_json(value))
                .map_err(|err| Error::encode(path, err.to_string()))?;
            push_str(data, ends, &json);
        }
        (NodeKind::List(item_node), ColumnData::List { offsets, item }) => {
            let Value::List(items) = value else {
                return Err(shape(path, node, value));
            };
            for (idx, element) in items.iter().enumerate() {
                write_value(item, item_node, element, &format!("{path}[{idx}]"), config)?;
            }
            offsets.push(item.len());
        }
        (
            NodeKind::FixedSizeList {
                item: item_node,
                size,
            },
            ColumnData::FixedList { item, .. },
        ) => {
            let Value::List(items) = value else {
                return Err(shape(path, node, value));
            };
            if items.len() != *size {
                return Err(Error::encode(
                    path,
                    format!("expected {size} elements, got {}", items.len()),
                ));
            }
            for (idx, element) in items.iter().enumerate() {
                write_value(item, item_node, element, &format!("{path}[{idx}]"), config)?;
            }
        }
        (
            NodeKind::Map { value: value_node },
            ColumnData::Map {
                offsets,
                keys,
                values,
            },
        ) => {
            match value {
                Value::Map(entries) => {
                    for (key, entry) in entries {
                        let Value::String(key) = key else {
                            return Err(Error::mismatch(path, "string map key", key.summary()));
                        };
                        write_entry(keys, values, value_node, key, entry, path, config)?;
                    }
                }
                Value::Record(fields) => {
                    for (key, entry) in fields {
                        write_entry(keys, values, value_node, key, entry, path, config)?;
                    }
                }
                other => return Err(shape(path, node, other)),
            }
            offsets.push(keys.len());
        }
        (NodeKind::Struct(children), ColumnData::Struct(buffers)) => {
            let Value::Record(fields) = value else {
                return Err(shape(path, node, value));
            };
            for (child, buffer) in children.iter().zip(buffers.iter_mut()) {
                let child_path = join_path(path, &child.name);
                write_field(buffer, child, lookup(fields, &child.name), &child_path, config)?;
            }
        }
        (NodeKind::Tuple(children), ColumnData::Struct(buffers)) => {
            let items = match value {
                Value::List(items) if items.len() == children.len() => items,
                other => {
                    return Err(Error::mismatch(
                        path,
                        format!("tuple of {} elements", children.len()),
                        other.summary(),
                    ))
                }
            };
            for ((child, buffer), element) in children.iter().zip(buffers.iter_mut()).zip(items) {
                write_value(buffer, child, element, &join_path(path, &child.name), config)?;
            }
        }
        (
            NodeKind::Union {
                variants,
                mode: UnionEncoding::TaggedStruct,
            },
            ColumnData::Struct(buffers),
        ) => {
            let (active, payload) = select_variant(node, variants, value, path)?;
            let Some((tag, rest)) = buffers.split_first_mut() else {
                return Err(Error::encode(path, "union buffer lacks a tag column"));
            };
            tag.push_text(&variants[active].name);
            for (idx, (variant, buffer)) in variants.iter().zip(rest.iter_mut()).enumerate() {
                if idx != active {
                    buffer.push_null();
                    continue;
                }
                match &variant.payload {
                    Some(payload_node) => {
                        let variant_path = join_path(path, &variant.name);
                        write_value(buffer, payload_node, payload, &variant_path, config)?;
                    }
                    None => buffer.push_unit(),
                }
            }
        }
        (
            NodeKind::Union { variants, .. },
            ColumnData::Union {
                type_ids,
                offsets,
                children,
            },
        ) => {
            let (active, payload) = select_variant(node, variants, value, path)?;
            let child = &mut children[active];
            let offset = i32::try_from(child.len())
                .map_err(|_| Error::encode(path, "dense union child exceeds i32 offsets"))?;
            match &variants[active].payload {
                Some(payload_node) => {
                    let variant_path = join_path(path, &variants[active].name);
                    write_value(child, payload_node, payload, &variant_path, config)?;
                }
                None => child.push_unit(),
            }
            type_ids.push(active as i8);
            offsets.push(offset);
        }
        (kind, _) => {
            return Err(Error::encode(
                path,
                format!("no column layout for {}", kind.signature()),
            ))
        }
    }
    column.mark_valid();
    Ok(())
}

fn write_entry(
    keys: &mut ColumnBuffer,
    values: &mut ColumnBuffer,
    value_node: &SchemaNode,
    key: &str,
    entry: &Value,
    path: &str,
    config: &ConversionConfig,
) -> Result<()> {
    keys.push_text(key);
    write_value(values, value_node, entry, &format!("{path}[{key:?}]"), config)
}

/// Integer payload, range-checked against `kind` unless on the fast path.
fn integer(node: &SchemaNode, kind: ScalarKind, value: &Value, path: &str, fast: bool) -> Result<i128> {
    let raw = match value {
        Value::Int(v) => i128::from(*v),
        Value::UInt(v) => i128::from(*v),
        other => return Err(shape(path, node, other)),
    };
    if !fast {
        if let Some((lo, hi)) = kind.int_bounds() {
            if raw < lo || raw > hi {
                return Err(Error::encode(
                    path,
                    format!("{raw} is out of range for {}", kind.name()),
                ));
            }
        }
    }
    Ok(raw)
}

fn decimal(
    node: &SchemaNode,
    value: &Value,
    precision: u8,
    scale: i8,
    path: &str,
    fast: bool,
) -> Result<i128> {
    let decimal = match value {
        Value::Decimal(d) => *d,
        Value::Int(v) => Decimal::from(*v),
        Value::UInt(v) => Decimal::from(*v),
        other => return Err(shape(path, node, other)),
    };
    let rescaled = decimal
        .rescale(scale)
        .map_err(|err| Error::encode(path, err.to_string()))?;
    if !fast && rescaled.digits() > precision {
        return Err(Error::encode(
            path,
            format!(
                "{decimal} needs {} digits at scale {scale}, precision is {precision}",
                rescaled.digits()
            ),
        ));
    }
    Ok(rescaled.unscaled())
}

fn timestamp(
    node: &SchemaNode,
    value: &Value,
    policy: DateTimePolicy,
    path: &str,
) -> Result<(i64, Option<i32>)> {
    match value {
        Value::Timestamp(instant) => Ok((
            instant.timestamp_micros(),
            Some(instant.offset().local_minus_utc()),
        )),
        Value::NaiveTimestamp(_) if policy == DateTimePolicy::ErrorOnNaive => Err(Error::encode(
            path,
            "naive timestamp rejected by the error_on_naive policy",
        )),
        Value::NaiveTimestamp(naive) => Ok((naive.and_utc().timestamp_micros(), None)),
        other => Err(shape(path, node, other)),
    }
}

fn identifier(
    node: &SchemaNode,
    kind: IdentifierKind,
    value: &Value,
    path: &str,
    fast: bool,
) -> Result<[u8; 16]> {
    match (kind, value) {
        (IdentifierKind::Uuid { version }, Value::Uuid(uuid)) => {
            if let (Some(expected), false) = (version, fast) {
                let actual = uuid.get_version_num();
                if actual != usize::from(expected) {
                    return Err(Error::encode(
                        path,
                        format!("expected uuid version {expected}, got {actual}"),
                    ));
                }
            }
            Ok(*uuid.as_bytes())
        }
        (IdentifierKind::Ulid, Value::Ulid(ulid)) => Ok(ulid.to_bytes()),
        (_, other) => Err(shape(path, node, other)),
    }
}

fn enum_member(
    node: &SchemaNode,
    members: &[EnumMember],
    value: &Value,
    path: &str,
    fast: bool,
) -> Result<EnumValue> {
    let Some(candidate) = EnumValue::resolve(value, members) else {
        return Err(shape(path, node, value));
    };
    if !fast && !members.iter().any(|member| member.value == candidate) {
        let allowed: Vec<String> = members
            .iter()
            .map(|member| match &member.value {
                EnumValue::Int(v) => v.to_string(),
                EnumValue::Str(s) => format!("{s:?}"),
            })
            .collect();
        return Err(Error::mismatch(
            path,
            format!("one of [{}]", allowed.join(", ")),
            value.summary(),
        ));
    }
    Ok(candidate)
}

fn select_variant<'v>(
    node: &SchemaNode,
    variants: &[VariantNode],
    value: &'v Value,
    path: &str,
) -> Result<(usize, &'v Value)> {
    let Value::Tagged(tagged) = value else {
        return Err(shape(path, node, value));
    };
    let Some(active) = variants
        .iter()
        .position(|variant| variant.name == tagged.tag)
    else {
        let names: Vec<&str> = variants.iter().map(|v| v.name.as_str()).collect();
        return Err(Error::mismatch(
            path,
            format!("one of variants [{}]", names.join(", ")),
            format!("variant '{}'", tagged.tag),
        ));
    };
    if variants[active].payload.is_none() && !tagged.value.is_null() {
        return Err(Error::mismatch(
            &join_path(path, &tagged.tag),
            "unit variant",
            tagged.value.summary(),
        ));
    }
    Ok((active, tagged.value.as_ref()))
}
