use std::any::{type_name, TypeId};
use std::sync::Arc;

use arrow::record_batch::RecordBatch;
use stratum::{Model, Value};
use tracing::debug;

use crate::cache::SchemaCache;
use crate::config::ConversionConfig;
use crate::encode::RowEncoder;
use crate::error::{Error, Result};
use crate::schema::Schema;

pub const DEFAULT_BATCH_SIZE: usize = 65_536;

/// Accumulates rows one at a time and materialises batches on demand.
///
/// The schema is either given up front or derived from the first appended
/// model. `batch_size` only sizes preallocation; the builder never flushes
/// on its own.
#[derive(Debug)]
pub struct BatchBuilder {
    config: ConversionConfig,
    batch_size: usize,
    encoder: Option<RowEncoder>,
    model_type: Option<TypeId>,
}

impl BatchBuilder {
    pub fn new(config: ConversionConfig) -> Self {
        Self {
            config,
            batch_size: DEFAULT_BATCH_SIZE,
            encoder: None,
            model_type: None,
        }
    }

    pub fn with_schema(schema: Arc<Schema>, config: ConversionConfig) -> Self {
        let mut builder = Self::new(config);
        builder.establish(schema);
        builder
    }

    pub fn for_model<M: Model + 'static>(config: ConversionConfig) -> Result<Self> {
        let schema = SchemaCache::global().get_or_build(&M::model_schema(), &config)?;
        let mut builder = Self::with_schema(schema, config);
        builder.model_type = Some(TypeId::of::<M>());
        Ok(builder)
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        if let Some(encoder) = &self.encoder {
            if encoder.is_empty() {
                self.establish(Arc::clone(encoder.schema()));
            }
        }
        self
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn schema(&self) -> Option<&Arc<Schema>> {
        self.encoder.as_ref().map(RowEncoder::schema)
    }

    pub fn len(&self) -> usize {
        self.encoder.as_ref().map_or(0, RowEncoder::len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn establish(&mut self, schema: Arc<Schema>) {
        self.encoder = Some(RowEncoder::with_capacity(
            schema,
            self.config.clone(),
            self.batch_size,
        ));
    }

    /// Append one model instance. The first call fixes the schema when none
    /// was given; a later model with a different schema is rejected and the
    /// accumulated rows are left as they were.
    pub fn append<M: Model + 'static>(&mut self, row: &M) -> Result<()> {
        let type_id = TypeId::of::<M>();
        if self.model_type != Some(type_id) {
            let schema = SchemaCache::global().get_or_build(&M::model_schema(), &self.config)?;
            match &self.encoder {
                None => {
                    debug!(
                        model = %schema.metadata().model,
                        batch_size = self.batch_size,
                        "batch builder schema established on first write"
                    );
                    self.establish(schema);
                }
                Some(encoder) if encoder.schema().schema_hash() != schema.schema_hash() => {
                    return Err(Error::mismatch(
                        "",
                        format!(
                            "rows of {} (schema {})",
                            encoder.schema().metadata().model,
                            encoder.schema().schema_hash()
                        ),
                        format!("{} (schema {})", type_name::<M>(), schema.schema_hash()),
                    ));
                }
                Some(_) => {}
            }
            self.model_type = Some(type_id);
        }
        let value = row.to_value()?;
        self.append_value(&value)
    }

    /// Append an already canonical value against the established schema.
    pub fn append_value(&mut self, row: &Value) -> Result<()> {
        let encoder = self.encoder.as_mut().ok_or(Error::MissingSchema)?;
        encoder.append(row)
    }

    pub fn to_record_batch(&self) -> Result<RecordBatch> {
        self.encoder
            .as_ref()
            .ok_or(Error::MissingSchema)?
            .finish()
    }

    /// Drop accumulated rows; the schema stays.
    pub fn clear(&mut self) {
        if let Some(encoder) = self.encoder.as_mut() {
            encoder.clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::{Array, Int64Array, StringViewArray};
    use stratum::{Field, ModelSchema, StratumResult, TypeDescriptor};

    struct Point {
        x: i64,
        y: i64,
    }

    impl Model for Point {
        fn model_schema() -> ModelSchema {
            ModelSchema::record(
                "test.Point",
                vec![
                    Field::new("x", TypeDescriptor::int64()),
                    Field::new("y", TypeDescriptor::int64()),
                ],
            )
        }

        fn to_value(&self) -> StratumResult<Value> {
            Ok(Value::record([("x", Value::from(self.x)), ("y", Value::from(self.y))]))
        }

        fn from_value(value: Value) -> StratumResult<Self> {
            let coord = |name| match value.get(name) {
                Some(Value::Int(v)) => Ok(*v),
                _ => Err(stratum::StratumError::Schema(format!("missing {name}"))),
            };
            Ok(Point {
                x: coord("x")?,
                y: coord("y")?,
            })
        }
    }

    struct Label(String);

    impl Model for Label {
        fn model_schema() -> ModelSchema {
            ModelSchema::record("test.Label", vec![Field::new("text", TypeDescriptor::string())])
        }

        fn to_value(&self) -> StratumResult<Value> {
            Ok(Value::record([("text", Value::from(self.0.as_str()))]))
        }

        fn from_value(value: Value) -> StratumResult<Self> {
            match value.get("text") {
                Some(Value::String(text)) => Ok(Label(text.clone())),
                _ => Err(stratum::StratumError::Schema("missing text".into())),
            }
        }
    }

    #[test]
    fn schema_is_established_on_first_write() {
        let mut builder = BatchBuilder::new(ConversionConfig::default());
        assert!(builder.schema().is_none());
        assert!(matches!(builder.to_record_batch(), Err(Error::MissingSchema)));

        builder.append(&Point { x: 1, y: 2 }).expect("first");
        builder.append(&Point { x: 3, y: 4 }).expect("second");
        let batch = builder.to_record_batch().expect("batch");
        let xs = batch
            .column(0)
            .as_any()
            .downcast_ref::<Int64Array>()
            .expect("int64");
        assert_eq!(xs.values().to_vec(), vec![1, 3]);
        assert_eq!(builder.len(), 2);
    }

    #[test]
    fn incompatible_model_leaves_rows_intact() {
        let mut builder = BatchBuilder::new(ConversionConfig::default());
        builder.append(&Point { x: 1, y: 2 }).expect("point");
        let err = builder
            .append(&Label("nope".into()))
            .expect_err("different schema");
        assert!(matches!(err, Error::SchemaMismatch { .. }), "{err}");
        assert_eq!(builder.len(), 1);
        assert_eq!(builder.to_record_batch().expect("batch").num_rows(), 1);
    }

    #[test]
    fn clear_keeps_the_schema_and_batches_are_snapshots() {
        let mut builder =
            BatchBuilder::for_model::<Label>(ConversionConfig::default()).expect("builder");
        builder.append(&Label("a".into())).expect("a");
        let first = builder.to_record_batch().expect("first");
        builder.append(&Label("b".into())).expect("b");
        builder.clear();
        assert!(builder.is_empty());
        assert!(builder.schema().is_some());
        assert_eq!(builder.to_record_batch().expect("empty").num_rows(), 0);

        let text = first
            .column(0)
            .as_any()
            .downcast_ref::<StringViewArray>()
            .expect("string view");
        assert_eq!(first.num_rows(), 1);
        assert_eq!(text.value(0), "a");
    }

    #[test]
    fn values_require_a_schema() {
        let mut builder = BatchBuilder::new(ConversionConfig::default()).with_batch_size(8);
        let err = builder
            .append_value(&Value::record([("x", Value::from(1))]))
            .expect_err("no schema yet");
        assert!(matches!(err, Error::MissingSchema));
        assert_eq!(builder.batch_size(), 8);
    }
}
