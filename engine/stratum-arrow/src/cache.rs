use std::collections::HashMap;
use std::sync::{Arc, OnceLock, PoisonError, RwLock};

use stratum::ModelSchema;
use tracing::{debug, trace};

use crate::config::ConversionConfig;
use crate::error::Result;
use crate::schema::{Schema, SchemaBuilder};

type CacheKey = (String, String);

/// Built schemas keyed by model identity and config fingerprint.
///
/// Schemas are built outside the lock; the first published schema for a key
/// wins and later builders adopt it.
#[derive(Debug, Default)]
pub struct SchemaCache {
    entries: RwLock<HashMap<CacheKey, Arc<Schema>>>,
}

static GLOBAL: OnceLock<SchemaCache> = OnceLock::new();

impl SchemaCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn global() -> &'static SchemaCache {
        GLOBAL.get_or_init(SchemaCache::new)
    }

    pub fn get(&self, model: &str, config: &ConversionConfig) -> Option<Arc<Schema>> {
        let key = (model.to_string(), config.fingerprint());
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&key)
            .cloned()
    }

    pub fn get_or_build(&self, model: &ModelSchema, config: &ConversionConfig) -> Result<Arc<Schema>> {
        let key = (model.identity().to_string(), config.fingerprint());
        if let Some(hit) = self
            .entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&key)
        {
            trace!(model = %key.0, "schema cache hit");
            return Ok(Arc::clone(hit));
        }

        let built = SchemaBuilder::new(config.clone()).build(model)?;
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        let published = entries.entry(key).or_insert_with(|| {
            debug!(model = %model.identity(), "schema cache publish");
            built
        });
        Ok(Arc::clone(published))
    }

    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}
