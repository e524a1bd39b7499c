use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use arrow::datatypes::{Schema as ArrowSchema, SchemaRef};
use stratum::{Fingerprint, IdentifierKind, ModelSchema};
use tracing::debug;

use crate::config::{ConversionConfig, DateTimePolicy, UnionEncoding};
use crate::error::{Error, Result};
use crate::mapper::{
    NodeKind, SchemaNode, TypeMapper, UUID_ENCODING_KEY, UUID_VERSION_KEY,
};

pub const TYPE_SYSTEM_VERSION: &str = "1";

pub const MODEL_KEY: &str = "stratum:model";
pub const TYPE_SYSTEM_VERSION_KEY: &str = "stratum:type_system_version";
pub const SCHEMA_HASH_KEY: &str = "stratum:schema_hash";
pub const DATETIME_POLICY_KEY: &str = "stratum:datetime_policy";
pub const UNION_ENCODING_KEY: &str = "stratum:union_encoding";
pub const UUID_COLUMNS_KEY: &str = "stratum:uuid_columns";
pub const DESCRIPTION_KEY: &str = "stratum:description";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SchemaMetadata {
    pub model: String,
    pub type_system_version: String,
    pub schema_hash: String,
    pub datetime_policy: DateTimePolicy,
    pub union_encoding: UnionEncoding,
    /// Top-level identifier columns and their declared UUID version
    /// (`None` for ULIDs and unversioned UUIDs).
    pub uuid_columns: BTreeMap<String, Option<u8>>,
    pub description: Option<String>,
}

/// Resolved columnar schema for one model under one config.
#[derive(Clone, Debug)]
pub struct Schema {
    nodes: Vec<SchemaNode>,
    metadata: SchemaMetadata,
    arrow: SchemaRef,
    model: Option<Arc<ModelSchema>>,
}

impl Schema {
    pub fn nodes(&self) -> &[SchemaNode] {
        &self.nodes
    }

    pub fn node(&self, name: &str) -> Option<&SchemaNode> {
        self.nodes.iter().find(|node| node.name == name)
    }

    pub fn metadata(&self) -> &SchemaMetadata {
        &self.metadata
    }

    pub fn arrow_schema(&self) -> SchemaRef {
        Arc::clone(&self.arrow)
    }

    /// The model this schema was built from; `None` for inferred schemas.
    pub fn model(&self) -> Option<&ModelSchema> {
        self.model.as_deref()
    }

    pub fn schema_hash(&self) -> &str {
        &self.metadata.schema_hash
    }

    pub fn is_compatible_with(&self, other: &Schema) -> bool {
        self.metadata.schema_hash == other.metadata.schema_hash
    }

    /// Rebuild nodes from a persisted Arrow schema.
    pub fn infer(arrow: SchemaRef) -> Result<Self> {
        let nodes = arrow
            .fields()
            .iter()
            .map(|field| SchemaNode::from_field(field))
            .collect::<Result<Vec<_>>>()?;
        let persisted = arrow.metadata();
        let get = |key: &str| persisted.get(key).cloned();
        let datetime_policy = get(DATETIME_POLICY_KEY)
            .and_then(|text| DateTimePolicy::parse(&text))
            .unwrap_or_default();
        let union_encoding = get(UNION_ENCODING_KEY)
            .and_then(|text| UnionEncoding::parse(&text))
            .unwrap_or_default();
        let metadata = SchemaMetadata {
            model: get(MODEL_KEY).unwrap_or_default(),
            type_system_version: get(TYPE_SYSTEM_VERSION_KEY)
                .unwrap_or_else(|| TYPE_SYSTEM_VERSION.to_string()),
            schema_hash: schema_hash(&nodes),
            datetime_policy,
            union_encoding,
            uuid_columns: uuid_columns(&nodes),
            description: get(DESCRIPTION_KEY),
        };
        Ok(Self {
            nodes,
            metadata,
            arrow,
            model: None,
        })
    }
}

pub struct SchemaBuilder {
    config: ConversionConfig,
}

impl SchemaBuilder {
    pub fn new(config: ConversionConfig) -> Self {
        Self { config }
    }

    pub fn build(&self, model: &ModelSchema) -> Result<Arc<Schema>> {
        self.config.validate()?;
        let root = model.root_struct()?;
        let mut mapper = TypeMapper::new(model, &self.config);
        let nodes = mapper.map_struct(root, "")?;

        let metadata = SchemaMetadata {
            model: model.identity().to_string(),
            type_system_version: TYPE_SYSTEM_VERSION.to_string(),
            schema_hash: schema_hash(&nodes),
            datetime_policy: self.config.datetime_policy,
            union_encoding: self.config.union_encoding,
            uuid_columns: uuid_columns(&nodes),
            description: model.description().map(str::to_string),
        };
        let fields: Vec<_> = nodes.iter().map(SchemaNode::to_field).collect();
        let arrow = Arc::new(ArrowSchema::new_with_metadata(
            fields,
            persisted_metadata(&metadata)?,
        ));
        debug!(
            model = %metadata.model,
            columns = nodes.len(),
            schema_hash = %metadata.schema_hash,
            "built columnar schema"
        );
        Ok(Arc::new(Schema {
            nodes,
            metadata,
            arrow,
            model: Some(Arc::new(model.clone())),
        }))
    }
}

fn schema_hash(nodes: &[SchemaNode]) -> String {
    let mut fingerprint = Fingerprint::new("stratum.schema.v1");
    fingerprint.update(TYPE_SYSTEM_VERSION);
    for node in nodes {
        fingerprint.update(&node.name).update(&node.signature());
    }
    fingerprint.finish_hex()
}

fn uuid_columns(nodes: &[SchemaNode]) -> BTreeMap<String, Option<u8>> {
    nodes
        .iter()
        .filter_map(|node| match node.kind {
            NodeKind::Identifier(IdentifierKind::Uuid { version }) => {
                Some((node.name.clone(), version))
            }
            NodeKind::Identifier(IdentifierKind::Ulid) => Some((node.name.clone(), None)),
            _ => None,
        })
        .collect()
}

fn persisted_metadata(metadata: &SchemaMetadata) -> Result<HashMap<String, String>> {
    let mut out = HashMap::new();
    out.insert(MODEL_KEY.to_string(), metadata.model.clone());
    out.insert(
        TYPE_SYSTEM_VERSION_KEY.to_string(),
        metadata.type_system_version.clone(),
    );
    out.insert(SCHEMA_HASH_KEY.to_string(), metadata.schema_hash.clone());
    out.insert(
        DATETIME_POLICY_KEY.to_string(),
        metadata.datetime_policy.as_str().to_string(),
    );
    out.insert(
        UNION_ENCODING_KEY.to_string(),
        metadata.union_encoding.as_str().to_string(),
    );
    if !metadata.uuid_columns.is_empty() {
        let columns = serde_json::to_string(&metadata.uuid_columns)
            .map_err(|err| Error::InvalidConfig(format!("uuid column metadata: {err}")))?;
        out.insert(UUID_COLUMNS_KEY.to_string(), columns);
        out.insert(UUID_ENCODING_KEY.to_string(), "binary16".to_string());
        let mut versions = metadata.uuid_columns.values();
        if let Some(Some(first)) = versions.next() {
            if versions.all(|version| *version == Some(*first)) {
                out.insert(UUID_VERSION_KEY.to_string(), first.to_string());
            }
        }
    }
    if let Some(description) = &metadata.description {
        out.insert(DESCRIPTION_KEY.to_string(), description.clone());
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use stratum::{Field, TypeDescriptor};

    fn person() -> ModelSchema {
        ModelSchema::record(
            "test.Person",
            vec![
                Field::new("id", TypeDescriptor::uuid(Some(7))),
                Field::new("name", TypeDescriptor::string()),
                Field::new("age", TypeDescriptor::optional(TypeDescriptor::int64())),
            ],
        )
    }

    #[test]
    fn persists_schema_metadata() {
        let schema = SchemaBuilder::new(ConversionConfig::default())
            .build(&person().with_description("people"))
            .expect("schema");
        let arrow = schema.arrow_schema();
        let meta = arrow.metadata();
        assert_eq!(meta.get(MODEL_KEY).map(String::as_str), Some("test.Person"));
        assert_eq!(
            meta.get(DATETIME_POLICY_KEY).map(String::as_str),
            Some("normalize_utc")
        );
        assert_eq!(
            meta.get(UUID_COLUMNS_KEY).map(String::as_str),
            Some(r#"{"id":7}"#)
        );
        assert_eq!(meta.get(UUID_VERSION_KEY).map(String::as_str), Some("7"));
        assert_eq!(meta.get(DESCRIPTION_KEY).map(String::as_str), Some("people"));
        assert_eq!(
            meta.get(SCHEMA_HASH_KEY).map(String::as_str),
            Some(schema.schema_hash())
        );
        assert_eq!(arrow.fields().len(), 3);
        assert!(arrow.field(2).is_nullable());
    }

    #[test]
    fn hash_ignores_description_but_tracks_structure() {
        let builder = SchemaBuilder::new(ConversionConfig::default());
        let plain = builder.build(&person()).expect("plain");
        let described = builder
            .build(&person().with_description("other"))
            .expect("described");
        assert_eq!(plain.schema_hash(), described.schema_hash());

        let changed = ModelSchema::record(
            "test.Person",
            vec![Field::new("name", TypeDescriptor::optional(TypeDescriptor::string()))],
        );
        let changed = builder.build(&changed).expect("changed");
        assert!(!plain.is_compatible_with(&changed));
    }

    #[test]
    fn hash_tracks_decimal_parameters() {
        let model = ModelSchema::record(
            "test.Price",
            vec![Field::new("amount", TypeDescriptor::Decimal)],
        );
        let wide = SchemaBuilder::new(ConversionConfig::default())
            .build(&model)
            .expect("wide");
        let narrow = SchemaBuilder::new(ConversionConfig::default().with_decimal(10, 2))
            .build(&model)
            .expect("narrow");
        assert_ne!(wide.schema_hash(), narrow.schema_hash());
    }

    #[test]
    fn rejects_invalid_config_and_non_record_roots() {
        let err = SchemaBuilder::new(ConversionConfig::default().with_decimal(40, 2))
            .build(&person())
            .expect_err("bad precision");
        assert!(matches!(err, Error::InvalidConfig(_)));
        let scalar = ModelSchema::new("test.Scalar", TypeDescriptor::string());
        let err = SchemaBuilder::new(ConversionConfig::default())
            .build(&scalar)
            .expect_err("scalar root");
        assert!(matches!(err, Error::Model(_)));
    }

    #[test]
    fn infer_round_trips_structure() {
        let built = SchemaBuilder::new(ConversionConfig::default())
            .build(&person())
            .expect("schema");
        let inferred = Schema::infer(built.arrow_schema()).expect("inferred");
        assert_eq!(inferred.metadata().model, "test.Person");
        assert_eq!(inferred.nodes().len(), 3);
        assert!(inferred.model().is_none());
        assert_eq!(inferred.metadata().uuid_columns.get("id"), Some(&Some(7)));
    }
}
