use std::collections::{BTreeSet, HashMap};

use itertools::Itertools;
use tracing::{debug, info};

use super::{schema_name, SchemaProvider, NAMESPACE};
use crate::data_types::{DatasetRef, EntitySetName};
use crate::schema::{EntitySetSchema, FieldDescriptor};

/// Entity set name -> schema and originating dataset.
///
/// Populated once by discovery before the server starts. After that it gets
/// frozen behind an `Arc` and shared by every request handler, which is why
/// lookups don't need any locking.
#[derive(Debug, Clone, Default)]
pub struct SchemaRegistry {
    schema_by_name: HashMap<EntitySetName, EntitySetSchema>,
    dataset_by_name: HashMap<EntitySetName, DatasetRef>,
}

impl SchemaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the field list of an entity set. The first registration of a
    /// name wins: returns false and leaves the registry untouched if `name` is
    /// already known.
    pub fn register_schema(&mut self, name: &str, fields: Vec<FieldDescriptor>) -> bool {
        if self.schema_by_name.contains_key(name) {
            debug!("Metadata for {name} already exists");
            return false;
        }

        info!("Registering metadata for entity set {name}");
        self.schema_by_name
            .insert(name.to_string(), EntitySetSchema::new(fields));
        true
    }

    pub fn register_dataset_ref(&mut self, name: &str, dataset: DatasetRef) {
        self.dataset_by_name.insert(name.to_string(), dataset);
    }

    pub fn get_schema(&self, name: &str) -> Option<&EntitySetSchema> {
        self.schema_by_name.get(name)
    }

    pub fn get_dataset_ref(&self, name: &str) -> Option<&DatasetRef> {
        self.dataset_by_name.get(name)
    }

    pub fn all_entity_set_names(&self) -> BTreeSet<EntitySetName> {
        self.schema_by_name.keys().cloned().collect()
    }

    /// Resolve a published entity set name (with or without the `_set` postfix)
    /// to its dataset and schema
    pub fn resolve(&self, entity_set: &str) -> Option<(&DatasetRef, &EntitySetSchema)> {
        let name = schema_name(entity_set);
        self.get_dataset_ref(name).zip(self.get_schema(name))
    }

    pub fn len(&self) -> usize {
        self.schema_by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.schema_by_name.is_empty()
    }

    /// Forget everything, e.g. to re-run discovery
    pub fn reset(&mut self) {
        self.schema_by_name.clear();
        self.dataset_by_name.clear();
    }
}

impl SchemaProvider for SchemaRegistry {
    fn entity_type_names(&self) -> Vec<String> {
        self.schema_by_name.keys().cloned().sorted().collect()
    }

    fn entity_type(&self, name: &str) -> Option<&EntitySetSchema> {
        let bare = name
            .strip_prefix(NAMESPACE)
            .and_then(|n| n.strip_prefix('.'))
            .unwrap_or(name);
        self.get_schema(bare)
    }
}
