use std::sync::Arc;

use tracing::info;

use crate::catalog::discovery::{discover, DiscoveryError};
use crate::catalog::{SchemaProvider, SchemaRegistry};
use crate::provider::{EntityCollectionReader, EntityReader, SesamEntityProvider};
use crate::remote::{RemoteError, RemoteStore, SesamClient};

use super::schema::{HttpFrontend, SesamOdataConfig};

#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error("Couldn't set up the remote store client: {0}")]
    Client(#[source] RemoteError),

    #[error(transparent)]
    Discovery(#[from] DiscoveryError),
}

/// Everything a request handler needs. Built once at startup, immutable after.
pub struct SesamOdataContext {
    pub schema: Arc<dyn SchemaProvider>,
    pub collections: Arc<dyn EntityCollectionReader>,
    pub entities: Arc<dyn EntityReader>,
    pub http: HttpFrontend,
}

impl SesamOdataContext {
    pub fn new(
        registry: Arc<SchemaRegistry>,
        store: Arc<dyn RemoteStore>,
        page_size: u64,
        http: HttpFrontend,
    ) -> Self {
        let provider = Arc::new(SesamEntityProvider::new(
            registry.clone(),
            store,
            page_size,
        ));

        Self {
            schema: registry,
            collections: provider.clone(),
            entities: provider,
            http,
        }
    }
}

/// Connect to the remote store and discover its datasets. Fails if the datasets
/// can't be listed.
pub async fn build_context(
    config: &SesamOdataConfig,
) -> Result<SesamOdataContext, StartupError> {
    let client = SesamClient::new(&config.remote).map_err(StartupError::Client)?;
    info!("Discovering datasets at {}", client.base_url());

    let registry = discover(&client, config.misc.schema_sample_size).await?;
    if registry.is_empty() {
        info!("No entity sets found, the service will be empty");
    }

    Ok(SesamOdataContext::new(
        Arc::new(registry),
        Arc::new(client),
        config.misc.page_size,
        config.frontend.http.clone(),
    ))
}
