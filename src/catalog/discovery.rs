use tracing::{debug, info, warn};

use super::SchemaRegistry;
use crate::data_types::USER_ORIGIN;
use crate::remote::{Dataset, RemoteError, RemoteField, RemoteStore};
use crate::schema::{canonical_entity_set_name, FieldDescriptor};

#[derive(Debug, thiserror::Error)]
pub enum DiscoveryError {
    // Fatal at startup
    #[error("Couldn't list datasets in the remote store: {0}")]
    ListDatasets(#[source] RemoteError),
}

/// Build a registry out of the user datasets the remote store currently has
pub async fn discover(
    store: &dyn RemoteStore,
    sample_size: u32,
) -> Result<SchemaRegistry, DiscoveryError> {
    let mut registry = SchemaRegistry::new();
    discover_into(&mut registry, store, sample_size).await?;
    Ok(registry)
}

/// Register every user dataset whose schema can be inferred. Returns how many
/// entity sets got registered.
///
/// Only failing to list the datasets is an error: a dataset whose schema can't
/// be fetched (or comes back empty) is logged and skipped, so that one broken
/// pipe doesn't take the whole service down.
pub async fn discover_into(
    registry: &mut SchemaRegistry,
    store: &dyn RemoteStore,
    sample_size: u32,
) -> Result<usize, DiscoveryError> {
    let datasets = store
        .list_datasets()
        .await
        .map_err(DiscoveryError::ListDatasets)?;
    info!("Found {} datasets in the remote store", datasets.len());

    let mut registered = 0;
    for dataset in &datasets {
        if dataset.origin() != Some(USER_ORIGIN) {
            debug!("Skipping non-user dataset {}", dataset.id);
            continue;
        }

        if register_dataset(registry, store, dataset, sample_size).await {
            registered += 1;
        }
    }

    info!("Registered {registered} entity sets");
    Ok(registered)
}

async fn register_dataset(
    registry: &mut SchemaRegistry,
    store: &dyn RemoteStore,
    dataset: &Dataset,
    sample_size: u32,
) -> bool {
    let remote_fields = match store.fetch_schema(&dataset.id, sample_size).await {
        Ok(fields) if fields.is_empty() => {
            warn!("No metadata inferred for pipe {}, skipping it", dataset.id);
            return false;
        }
        Ok(fields) => fields,
        Err(e) => {
            warn!("Couldn't get metadata for pipe {}. Reason: {e}", dataset.id);
            return false;
        }
    };

    let name = canonical_entity_set_name(&dataset.id);
    if name.is_empty() {
        warn!("Dataset id {:?} has no usable entity set name", dataset.id);
        return false;
    }

    // Namespaces are dropped from field names: `:` isn't valid in identifiers
    let mut fields: Vec<FieldDescriptor> =
        remote_fields.iter().map(RemoteField::to_descriptor).collect();
    fields.push(FieldDescriptor::id());

    let registered = registry.register_schema(&name, fields);
    if !registered {
        warn!(
            "Dataset {} maps to the already registered entity set {name}, keeping the first schema",
            dataset.id
        );
    }
    registry.register_dataset_ref(&name, dataset.to_ref());

    registered
}
