use std::fmt::{Debug, Formatter};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{header, Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;
use url::Url;

use super::{Dataset, RemoteError, RemoteField, RemoteResult, RemoteStore};
use crate::config::schema::Remote;

/// Sesam REST API client. Cloning is cheap: the underlying `reqwest::Client`
/// shares its connection pool, and the token and base URL never change after
/// startup.
#[derive(Clone)]
pub struct SesamClient {
    client: Client,
    base_url: Url,
    token: String,
    metadata_timeout: Duration,
    data_timeout: Option<Duration>,
}

impl Debug for SesamClient {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SesamClient")
            .field("base_url", &self.base_url.as_str())
            .field("metadata_timeout", &self.metadata_timeout)
            .field("data_timeout", &self.data_timeout)
            .finish_non_exhaustive()
    }
}

impl SesamClient {
    pub fn new(config: &Remote) -> RemoteResult<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .user_agent(format!("sesam-odata/{}", env!("CARGO_PKG_VERSION")))
            .build()?;

        let base_url = Url::parse(&format!(
            "{}://{}/api/",
            config.scheme,
            config.host.trim_end_matches('/')
        ))?;

        Ok(Self {
            client,
            base_url,
            token: config.token.clone(),
            metadata_timeout: Duration::from_secs(config.metadata_timeout_secs),
            data_timeout: config.data_timeout_secs.map(Duration::from_secs),
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    // Segments are percent-encoded by `url`, so dataset ids can be passed in verbatim
    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        // The base URL always has an http(s) scheme, so it can always be a base
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    fn request_builder(&self, url: Url, timeout: Option<Duration>) -> RequestBuilder {
        let builder = self
            .client
            .get(url)
            .bearer_auth(&self.token)
            .header(header::ACCEPT, "application/json");

        match timeout {
            Some(timeout) => builder.timeout(timeout),
            None => builder,
        }
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        url: Url,
        timeout: Option<Duration>,
    ) -> RemoteResult<T> {
        debug!("GET {url}");
        let response = self.request_builder(url.clone(), timeout).send().await?;

        if !response.status().is_success() {
            return Err(RemoteError::Status {
                status: response.status(),
                url: url.to_string(),
            });
        }

        Ok(response.json::<T>().await?)
    }
}

#[async_trait]
impl RemoteStore for SesamClient {
    async fn list_datasets(&self) -> RemoteResult<Vec<Dataset>> {
        let url = self.endpoint(&["datasets"]);
        self.get_json(url, Some(self.metadata_timeout)).await
    }

    async fn fetch_schema(
        &self,
        dataset_id: &str,
        sample_size: u32,
    ) -> RemoteResult<Vec<RemoteField>> {
        let mut url = self.endpoint(&["pipes", dataset_id, "generate-schema-definition"]);
        url.query_pairs_mut()
            .append_pair("sample_size", &sample_size.to_string());

        self.get_json(url, Some(self.metadata_timeout)).await
    }

    async fn fetch_page(
        &self,
        dataset_id: &str,
        offset: u64,
        limit: u64,
    ) -> RemoteResult<Vec<Value>> {
        let mut url = self.endpoint(&["datasets", dataset_id, "entities"]);
        url.query_pairs_mut()
            .append_pair("deleted", "false")
            .append_pair("limit", &limit.to_string())
            .append_pair("since", &offset.to_string());

        self.get_json(url, self.data_timeout).await
    }

    async fn fetch_one(
        &self,
        dataset_id: &str,
        namespaced_id: &str,
    ) -> RemoteResult<Option<Value>> {
        let mut url = self.endpoint(&["datasets", dataset_id, "entity"]);
        url.query_pairs_mut().append_pair("entity_id", namespaced_id);

        match self.get_json::<Value>(url.clone(), self.data_timeout).await {
            Ok(Value::Null) => Ok(None),
            Ok(entity @ Value::Object(_)) => Ok(Some(entity)),
            Ok(other) => Err(RemoteError::UnexpectedPayload {
                url: url.to_string(),
                reason: format!("expected a JSON object, got {other}"),
            }),
            Err(RemoteError::Status { status, .. }) if status == StatusCode::NOT_FOUND => {
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }
}
