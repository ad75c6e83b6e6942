use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use reqwest::StatusCode;
use serde_json::{json, Value};

use crate::catalog::SchemaRegistry;
use crate::config::context::SesamOdataContext;
use crate::config::schema::HttpFrontend;
use crate::data_types::DatasetRef;
use crate::provider::SesamEntityProvider;
use crate::remote::{
    Dataset, RemoteError, RemoteField, RemoteResult, RemoteStore, Runtime,
};

/// In-memory stand-in for the Sesam API. Datasets without a schema entry fail
/// schema inference, like a pipe the remote store can't sample.
#[derive(Debug, Default)]
pub struct MemoryStore {
    pub datasets: Vec<Dataset>,
    pub schemas: HashMap<String, Vec<RemoteField>>,
    pub entities: HashMap<String, Vec<Value>>,
    pub fail_listing: bool,
    /// (dataset, offset, limit) of every page request
    pub page_requests: Mutex<Vec<(String, u64, u64)>>,
}

impl MemoryStore {
    pub fn with_dataset(
        mut self,
        id: &str,
        origin: &str,
        schema: Option<Value>,
        entities: Vec<Value>,
    ) -> Self {
        self.datasets.push(Dataset {
            id: id.to_string(),
            runtime: Some(Runtime {
                origin: Some(origin.to_string()),
            }),
        });
        if let Some(schema) = schema {
            self.schemas.insert(
                id.to_string(),
                serde_json::from_value(schema).expect("Invalid test schema"),
            );
        }
        self.entities.insert(id.to_string(), entities);
        self
    }

    pub fn page_requests(&self) -> Vec<(String, u64, u64)> {
        self.page_requests.lock().unwrap().clone()
    }

    fn server_error(path: &str) -> RemoteError {
        RemoteError::Status {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            url: format!("memory://api/{path}"),
        }
    }
}

#[async_trait]
impl RemoteStore for MemoryStore {
    async fn list_datasets(&self) -> RemoteResult<Vec<Dataset>> {
        if self.fail_listing {
            return Err(Self::server_error("datasets"));
        }
        Ok(self.datasets.clone())
    }

    async fn fetch_schema(
        &self,
        dataset_id: &str,
        _sample_size: u32,
    ) -> RemoteResult<Vec<RemoteField>> {
        self.schemas
            .get(dataset_id)
            .cloned()
            .ok_or_else(|| Self::server_error(dataset_id))
    }

    async fn fetch_page(
        &self,
        dataset_id: &str,
        offset: u64,
        limit: u64,
    ) -> RemoteResult<Vec<Value>> {
        self.page_requests
            .lock()
            .unwrap()
            .push((dataset_id.to_string(), offset, limit));

        let entities = self
            .entities
            .get(dataset_id)
            .ok_or_else(|| Self::server_error(dataset_id))?;

        Ok(entities
            .iter()
            .skip(offset as usize)
            .take(limit as usize)
            .cloned()
            .collect())
    }

    async fn fetch_one(
        &self,
        dataset_id: &str,
        namespaced_id: &str,
    ) -> RemoteResult<Option<Value>> {
        let entities = self
            .entities
            .get(dataset_id)
            .ok_or_else(|| Self::server_error(dataset_id))?;

        Ok(entities
            .iter()
            .find(|e| e["_id"].as_str() == Some(namespaced_id))
            .cloned())
    }
}

pub fn person_schema() -> Value {
    json!([
        {"name": "person:name", "type": "string"},
        {"name": "person:age", "type": "integer"},
        {"name": "person:born", "type": "datetime"},
        {"name": "person:score", "type": "decimal"}
    ])
}

/// `count` entities of the "person" dataset, with ids `person:0`, `person:1`, ...
pub fn person_entities(count: usize) -> Vec<Value> {
    (0..count)
        .map(|i| {
            json!({
                "_id": format!("person:{i}"),
                "_deleted": false,
                "_updated": i,
                "person:name": format!("Person {i}"),
                "person:age": (20 + i % 50).to_string(),
                "person:born": "~t1990-01-01T00:00:00Z",
                "person:score": 1.5,
                "rdf:type": "~:person:Person"
            })
        })
        .collect()
}

pub fn person_store(count: usize) -> MemoryStore {
    MemoryStore::default().with_dataset(
        "person",
        "user",
        Some(person_schema()),
        person_entities(count),
    )
}

/// A registry holding the "person" dataset as the `Person` entity set, as
/// discovery would build it
pub fn person_registry() -> SchemaRegistry {
    let mut registry = SchemaRegistry::new();
    let fields: Vec<RemoteField> = serde_json::from_value(person_schema()).unwrap();
    let mut fields: Vec<_> = fields.iter().map(RemoteField::to_descriptor).collect();
    fields.push(crate::schema::FieldDescriptor::id());

    registry.register_schema("Person", fields);
    registry.register_dataset_ref(
        "Person",
        DatasetRef {
            dataset_id: "person".to_string(),
            origin: "user".to_string(),
        },
    );
    registry
}

pub fn person_provider(count: usize, page_size: u64) -> SesamEntityProvider {
    SesamEntityProvider::new(
        Arc::new(person_registry()),
        Arc::new(person_store(count)),
        page_size,
    )
}

pub fn person_context(count: usize) -> Arc<SesamOdataContext> {
    Arc::new(SesamOdataContext::new(
        Arc::new(person_registry()),
        Arc::new(person_store(count)),
        100,
        HttpFrontend::default(),
    ))
}
