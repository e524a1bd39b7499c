/* Copyright (c) 2026 Olle Mårtensson. This Source Code Form is subject to the terms of the Eclipse Public License, v. 2.0. */
//! Schema-driven conversion between stratum values and Apache Arrow.
//!
//! A [`ModelSchema`] is mapped once per configuration into a [`Schema`]
//! (Arrow schema plus a [`SchemaNode`] tree), cached process-wide, and then
//! drives both directions: [`RowEncoder`] / [`BatchBuilder`] write rows into
//! column buffers, [`Decoder`] reads them back and can re-validate.

mod batch;
mod buffer;
mod cache;
mod config;
mod decode;
mod encode;
mod error;
mod json;
mod mapper;
mod schema;

use std::sync::Arc;

use arrow::array::{Array, StructArray};
use arrow::record_batch::RecordBatch;
use stratum::{Model, ModelSchema, Value};

pub use batch::{BatchBuilder, DEFAULT_BATCH_SIZE};
pub use cache::SchemaCache;
pub use config::{
    ConversionConfig, DateTimePolicy, DictKeyPolicy, EnumEncoding, NdArrayEncoding,
    UnionEncoding, DEFAULT_DECIMAL_PRECISION, DEFAULT_DECIMAL_SCALE, MAX_DECIMAL_PRECISION,
};
pub use decode::Decoder;
pub use encode::RowEncoder;
pub use error::{Error, Result};
pub use mapper::{
    map_type, EnumRepr, NodeKind, SchemaNode, TypeMapper, VariantNode, ID_KIND_KEY,
    INSTANT_FIELD, KIND_KEY, OFFSET_FIELD, SERIALIZED_KEY, TAG_FIELD, TYPE_KEY, UNION_KEY,
    UUID_ENCODING_KEY, UUID_VERSION_KEY, VARIANT_KEY,
};
pub use schema::{
    Schema, SchemaBuilder, SchemaMetadata, DATETIME_POLICY_KEY, DESCRIPTION_KEY, MODEL_KEY,
    SCHEMA_HASH_KEY, TYPE_SYSTEM_VERSION, TYPE_SYSTEM_VERSION_KEY, UNION_ENCODING_KEY,
    UUID_COLUMNS_KEY,
};

/// Cached schema for `M` under `config`.
pub fn schema_from_model<M: Model>(config: &ConversionConfig) -> Result<Arc<Schema>> {
    schema_for(&M::model_schema(), config)
}

pub fn schema_for(model: &ModelSchema, config: &ConversionConfig) -> Result<Arc<Schema>> {
    SchemaCache::global().get_or_build(model, config)
}

/// One row per model. Without an explicit schema the cached schema for `M`
/// is used, so an empty slice still yields a correctly typed empty batch.
pub fn to_arrow<M: Model>(
    rows: &[M],
    schema: Option<Arc<Schema>>,
    config: &ConversionConfig,
) -> Result<RecordBatch> {
    let schema = match schema {
        Some(schema) => schema,
        None => schema_from_model::<M>(config)?,
    };
    let mut encoder = RowEncoder::with_capacity(schema, config.clone(), rows.len());
    for row in rows {
        encoder.append(&row.to_value()?)?;
    }
    encoder.finish()
}

/// Encode dynamic rows. Rows are validated against the schema's model first
/// unless `fast_path_skip_validation` is set.
pub fn to_arrow_values(
    rows: &[Value],
    schema: &Arc<Schema>,
    config: &ConversionConfig,
) -> Result<RecordBatch> {
    let mut encoder = RowEncoder::with_capacity(Arc::clone(schema), config.clone(), rows.len());
    let model = schema
        .model()
        .filter(|_| !config.fast_path_skip_validation);
    for (idx, row) in rows.iter().enumerate() {
        match model {
            Some(model) => {
                let canonical = model
                    .validate(row)
                    .map_err(|err| Error::Validation(err.at_row(idx)))?;
                encoder.append(&canonical)?;
            }
            None => encoder.append(row)?,
        }
    }
    encoder.finish()
}

/// Split `rows` into batches of at most `chunk_rows` rows sharing one schema.
pub fn to_arrow_table<M: Model>(
    rows: &[M],
    chunk_rows: usize,
    schema: Option<Arc<Schema>>,
    config: &ConversionConfig,
) -> Result<Vec<RecordBatch>> {
    if chunk_rows == 0 {
        return Err(Error::InvalidConfig(
            "chunk_rows must be greater than zero".into(),
        ));
    }
    let schema = match schema {
        Some(schema) => schema,
        None => schema_from_model::<M>(config)?,
    };
    if rows.is_empty() {
        return Ok(vec![to_arrow::<M>(rows, Some(schema), config)?]);
    }
    rows.chunks(chunk_rows)
        .map(|chunk| to_arrow(chunk, Some(Arc::clone(&schema)), config))
        .collect()
}

pub fn to_struct_array<M: Model>(
    rows: &[M],
    schema: Option<Arc<Schema>>,
    config: &ConversionConfig,
) -> Result<StructArray> {
    Ok(StructArray::from(to_arrow(rows, schema, config)?))
}

pub fn from_arrow<M: Model>(
    batch: &RecordBatch,
    validate: bool,
    config: &ConversionConfig,
) -> Result<Vec<M>> {
    let schema = schema_from_model::<M>(config)?;
    Decoder::new(schema, config.clone())
        .decode(batch, validate)?
        .into_iter()
        .map(|value| M::from_value(value).map_err(Error::from))
        .collect()
}

pub fn from_arrow_table<M: Model>(
    batches: &[RecordBatch],
    validate: bool,
    config: &ConversionConfig,
) -> Result<Vec<M>> {
    let mut rows = Vec::with_capacity(batches.iter().map(RecordBatch::num_rows).sum());
    for batch in batches {
        rows.extend(from_arrow::<M>(batch, validate, config)?);
    }
    Ok(rows)
}

/// Decode a struct array whose children are the model's columns. Top-level
/// nulls have no row representation and are rejected.
pub fn from_struct_array<M: Model>(
    array: &StructArray,
    validate: bool,
    config: &ConversionConfig,
) -> Result<Vec<M>> {
    if array.null_count() > 0 {
        return Err(Error::mismatch(
            "",
            "struct array without top-level nulls",
            format!("{} null rows", array.null_count()),
        ));
    }
    from_arrow::<M>(&RecordBatch::from(array.clone()), validate, config)
}

pub fn from_arrow_values(
    batch: &RecordBatch,
    model: &ModelSchema,
    validate: bool,
    config: &ConversionConfig,
) -> Result<Vec<Value>> {
    let schema = schema_for(model, config)?;
    Decoder::new(schema, config.clone()).decode(batch, validate)
}

/// Decode without a target type, reading structure from the batch's own
/// field metadata.
pub fn from_arrow_untyped(batch: &RecordBatch) -> Result<Vec<Value>> {
    Decoder::decode_untyped(batch)
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::{Int64Array, StringViewArray};
    use stratum::{Field, StratumError, StratumResult, TypeDescriptor};

    #[derive(Debug, PartialEq)]
    struct Reading {
        sensor: String,
        value: i64,
    }

    impl Model for Reading {
        fn model_schema() -> ModelSchema {
            ModelSchema::record(
                "test.lib.Reading",
                vec![
                    Field::new("sensor", TypeDescriptor::string()),
                    Field::new("value", TypeDescriptor::int64()),
                ],
            )
        }

        fn to_value(&self) -> StratumResult<Value> {
            Ok(Value::record([
                ("sensor", Value::from(self.sensor.as_str())),
                ("value", Value::from(self.value)),
            ]))
        }

        fn from_value(value: Value) -> StratumResult<Self> {
            match (value.get("sensor"), value.get("value")) {
                (Some(Value::String(sensor)), Some(Value::Int(v))) => Ok(Reading {
                    sensor: sensor.clone(),
                    value: *v,
                }),
                _ => Err(StratumError::Schema(format!("bad reading {value}"))),
            }
        }
    }

    fn readings(n: i64) -> Vec<Reading> {
        (0..n)
            .map(|i| Reading {
                sensor: format!("s{i}"),
                value: i * 10,
            })
            .collect()
    }

    #[test]
    fn typed_rows_round_trip() {
        let config = ConversionConfig::default();
        let rows = readings(3);
        let batch = to_arrow(&rows, None, &config).expect("encode");
        assert_eq!(batch.num_rows(), 3);
        let sensors = batch
            .column(0)
            .as_any()
            .downcast_ref::<StringViewArray>()
            .expect("utf8 view");
        assert_eq!(sensors.value(2), "s2");
        let back: Vec<Reading> = from_arrow(&batch, true, &config).expect("decode");
        assert_eq!(back, rows);
    }

    #[test]
    fn empty_input_still_has_the_model_schema() {
        let batch = to_arrow::<Reading>(&[], None, &ConversionConfig::default()).expect("empty");
        assert_eq!(batch.num_rows(), 0);
        assert_eq!(batch.schema().field(1).name(), "value");
    }

    #[test]
    fn tables_are_chunked() {
        let config = ConversionConfig::default();
        let batches = to_arrow_table(&readings(5), 2, None, &config).expect("table");
        let sizes: Vec<usize> = batches.iter().map(RecordBatch::num_rows).collect();
        assert_eq!(sizes, vec![2, 2, 1]);
        let back: Vec<Reading> = from_arrow_table(&batches, false, &config).expect("decode");
        assert_eq!(back, readings(5));
        assert!(matches!(
            to_arrow_table(&readings(1), 0, None, &config),
            Err(Error::InvalidConfig(_))
        ));
    }

    #[test]
    fn struct_arrays_round_trip() {
        let config = ConversionConfig::default();
        let array = to_struct_array(&readings(2), None, &config).expect("struct");
        let values = array
            .column(1)
            .as_any()
            .downcast_ref::<Int64Array>()
            .expect("int64");
        assert_eq!(values.value(1), 10);
        let back: Vec<Reading> = from_struct_array(&array, true, &config).expect("decode");
        assert_eq!(back, readings(2));
    }

    #[test]
    fn dynamic_values_are_validated_before_encoding() {
        let config = ConversionConfig::default();
        let schema = schema_from_model::<Reading>(&config).expect("schema");
        let err = to_arrow_values(
            &[
                Value::record([("sensor", Value::from("a")), ("value", Value::from(1))]),
                Value::record([("sensor", Value::from("b"))]),
            ],
            &schema,
            &config,
        )
        .expect_err("value missing");
        let Error::Validation(validation) = err else {
            panic!("expected validation error");
        };
        assert_eq!(validation.row, Some(1));

        let untyped = from_arrow_untyped(
            &to_arrow_values(
                &[Value::record([("sensor", Value::from("a")), ("value", Value::from(1))])],
                &schema,
                &config,
            )
            .expect("encode"),
        )
        .expect("untyped");
        assert_eq!(
            untyped,
            vec![Value::record([("sensor", Value::from("a")), ("value", Value::from(1))])]
        );
    }
}
