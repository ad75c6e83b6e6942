//! Read access to the remote Sesam store: dataset listing, schema inference and
//! entity reads. [`RemoteStore`] is the seam the rest of the crate talks to,
//! [`http::SesamClient`] the implementation that goes over the wire.

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::Value;

use crate::data_types::DatasetRef;
use crate::schema::{local_name, FieldDescriptor, FieldType};

pub mod http;

pub use self::http::SesamClient;

#[derive(Debug, thiserror::Error)]
pub enum RemoteError {
    #[error("HTTP error talking to the remote store: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Remote store answered {status} for {url}")]
    Status { status: StatusCode, url: String },

    #[error("Invalid remote store URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("Unexpected payload from {url}: {reason}")]
    UnexpectedPayload { url: String, reason: String },
}

pub type RemoteResult<T> = Result<T, RemoteError>;

/// Dataset as listed by `GET /api/datasets`. Only the fields we need are read.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Dataset {
    #[serde(rename = "_id")]
    pub id: String,
    // Sesam may send `"runtime": null`
    #[serde(default)]
    pub runtime: Option<Runtime>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
pub struct Runtime {
    #[serde(default)]
    pub origin: Option<String>,
}

impl Dataset {
    pub fn origin(&self) -> Option<&str> {
        self.runtime.as_ref().and_then(|r| r.origin.as_deref())
    }

    pub fn to_ref(&self) -> DatasetRef {
        DatasetRef {
            dataset_id: self.id.clone(),
            origin: self.origin().unwrap_or_default().to_string(),
        }
    }
}

/// One entry of a pipe's inferred schema definition
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RemoteField {
    pub name: String,
    #[serde(rename = "type", default)]
    pub field_type: Option<String>,
    #[serde(default)]
    pub source_property: Option<String>,
}

impl RemoteField {
    /// Descriptor with the namespace prefix stripped off the name
    pub fn to_descriptor(&self) -> FieldDescriptor {
        FieldDescriptor {
            name: local_name(&self.name).to_string(),
            field_type: FieldType::from(self.field_type.as_deref().unwrap_or_default()),
            source_property: self.source_property.clone(),
        }
    }
}

#[async_trait]
pub trait RemoteStore: Sync + Send {
    async fn list_datasets(&self) -> RemoteResult<Vec<Dataset>>;

    /// Field schema inferred by the pipe feeding a dataset, out of a sample of
    /// `sample_size` entities
    async fn fetch_schema(
        &self,
        dataset_id: &str,
        sample_size: u32,
    ) -> RemoteResult<Vec<RemoteField>>;

    /// Non-deleted entities strictly after `offset`, at most `limit` of them
    async fn fetch_page(
        &self,
        dataset_id: &str,
        offset: u64,
        limit: u64,
    ) -> RemoteResult<Vec<Value>>;

    /// A single entity by its namespaced id, `None` if the store doesn't have it
    async fn fetch_one(
        &self,
        dataset_id: &str,
        namespaced_id: &str,
    ) -> RemoteResult<Option<Value>>;
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{Dataset, RemoteField};
    use crate::schema::FieldType;

    #[test]
    fn test_parse_dataset_listing() {
        let datasets: Vec<Dataset> = serde_json::from_value(json!([
            {"_id": "crm-person", "runtime": {"origin": "user", "count": 12}, "other": 1},
            {"_id": "system:log", "runtime": {"origin": "system"}},
            {"_id": "no-runtime"},
            {"_id": "null-runtime", "runtime": null},
            {"_id": "null-origin", "runtime": {"origin": null}}
        ]))
        .unwrap();

        assert_eq!(datasets[0].origin(), Some("user"));
        assert_eq!(datasets[1].origin(), Some("system"));
        assert_eq!(datasets[2].origin(), None);
        assert_eq!(datasets[0].to_ref().dataset_id, "crm-person");
        assert_eq!(datasets[2].to_ref().origin, "");
        assert_eq!(datasets[3].origin(), None);
        assert_eq!(datasets[4].origin(), None);
    }

    #[test]
    fn test_remote_field_to_descriptor() {
        let fields: Vec<RemoteField> = serde_json::from_value(json!([
            {"name": "crm-person:age", "type": "integer", "source_property": "AGE"},
            {"name": "born", "type": "datetime"},
            {"name": "flag", "type": "boolean"},
            {"name": "untyped"}
        ]))
        .unwrap();

        let descriptors: Vec<_> = fields.iter().map(|f| f.to_descriptor()).collect();
        assert_eq!(descriptors[0].name, "age");
        assert_eq!(descriptors[0].field_type, FieldType::Integer);
        assert_eq!(descriptors[0].source_property.as_deref(), Some("AGE"));
        assert_eq!(descriptors[1].field_type, FieldType::DateTime);
        assert_eq!(descriptors[2].field_type, FieldType::String);
        assert_eq!(descriptors[3].field_type, FieldType::String);
    }
}
