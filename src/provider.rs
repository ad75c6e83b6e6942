//! Readers for entity sets, backed by the remote store.

use std::cmp::min;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};
use url::{form_urlencoded, Url};

use crate::catalog::SchemaRegistry;
use crate::data_types::{EntityPage, PageOptions, Record};
use crate::remote::{RemoteError, RemoteStore};
use crate::schema::{EntitySetSchema, ID_FIELD, NAMESPACE_SEPARATOR};
use crate::translate::{translate, TranslateError};

/// Query parameter carrying the page cursor
pub const SKIPTOKEN: &str = "$skiptoken";

#[derive(Debug, thiserror::Error)]
pub enum ReadError {
    #[error(transparent)]
    Remote(#[from] RemoteError),

    #[error("Couldn't translate a record of {entity_set}: {source}")]
    Translate {
        entity_set: String,
        source: TranslateError,
    },

    #[error("Page window out of range: $skip={skip:?}, $skiptoken={skiptoken}")]
    CursorOutOfRange { skip: Option<u64>, skiptoken: u64 },
}

#[async_trait]
pub trait EntityCollectionReader: Sync + Send {
    /// Read one page of an entity set. An unknown entity set reads as empty.
    async fn read_collection(
        &self,
        entity_set: &str,
        options: PageOptions,
    ) -> Result<EntityPage, ReadError>;
}

#[async_trait]
pub trait EntityReader: Sync + Send {
    /// Read a single record by its key predicate (`'42'` or `_id='42'`).
    /// `None` if either the entity set or the record doesn't exist.
    async fn read_entity(
        &self,
        entity_set: &str,
        key_predicate: &str,
    ) -> Result<Option<Record>, ReadError>;
}

pub struct SesamEntityProvider {
    registry: Arc<SchemaRegistry>,
    store: Arc<dyn RemoteStore>,
    page_size: u64,
}

impl SesamEntityProvider {
    pub fn new(
        registry: Arc<SchemaRegistry>,
        store: Arc<dyn RemoteStore>,
        page_size: u64,
    ) -> Self {
        Self {
            registry,
            store,
            page_size,
        }
    }

    fn translate_all(
        entity_set: &str,
        raw: &[serde_json::Value],
        schema: &EntitySetSchema,
    ) -> Result<Vec<Record>, ReadError> {
        raw.iter()
            .map(|r| {
                translate(r, schema).map_err(|source| ReadError::Translate {
                    entity_set: entity_set.to_string(),
                    source,
                })
            })
            .collect()
    }
}

#[async_trait]
impl EntityCollectionReader for SesamEntityProvider {
    async fn read_collection(
        &self,
        entity_set: &str,
        options: PageOptions,
    ) -> Result<EntityPage, ReadError> {
        let (dataset, schema) = match self.registry.resolve(entity_set) {
            Some(resolved) => resolved,
            None => {
                debug!("Unknown entity set {entity_set}, returning no records");
                return Ok(EntityPage::default());
            }
        };

        let PageOptions {
            skip,
            top,
            skiptoken,
        } = options;

        let out_of_range = || ReadError::CursorOutOfRange { skip, skiptoken };
        let offset = skip
            .unwrap_or(0)
            .checked_add(skiptoken)
            .ok_or_else(out_of_range)?;
        let next = skiptoken
            .checked_add(self.page_size)
            .ok_or_else(out_of_range)?;
        let limit = match top {
            Some(top) => min(self.page_size, top.saturating_sub(skiptoken)),
            None => self.page_size,
        };
        if limit == 0 {
            return Ok(EntityPage::default());
        }

        debug!(
            "Reading {limit} records of {entity_set} from dataset {} at offset {offset}",
            dataset.dataset_id
        );
        let raw = self
            .store
            .fetch_page(&dataset.dataset_id, offset, limit)
            .await?;
        let records = Self::translate_all(entity_set, &raw, schema)?;

        // A short page means the dataset is exhausted. So does reaching $top.
        let next_skiptoken = (limit == self.page_size
            && raw.len() as u64 >= self.page_size
            && top.map_or(true, |top| next < top))
        .then_some(next);

        Ok(EntityPage {
            records,
            next_skiptoken,
        })
    }
}

#[async_trait]
impl EntityReader for SesamEntityProvider {
    async fn read_entity(
        &self,
        entity_set: &str,
        key_predicate: &str,
    ) -> Result<Option<Record>, ReadError> {
        let (dataset, schema) = match self.registry.resolve(entity_set) {
            Some(resolved) => resolved,
            None => return Ok(None),
        };
        let key = match parse_key_predicate(key_predicate) {
            Some(key) => key,
            None => {
                warn!("Unsupported key predicate {key_predicate:?} for {entity_set}");
                return Ok(None);
            }
        };

        let entity_id = format!("{}{NAMESPACE_SEPARATOR}{key}", dataset.dataset_id);
        match self.store.fetch_one(&dataset.dataset_id, &entity_id).await? {
            Some(raw) => translate(&raw, schema)
                .map(Some)
                .map_err(|source| ReadError::Translate {
                    entity_set: entity_set.to_string(),
                    source,
                }),
            None => Ok(None),
        }
    }
}

/// Key value out of a key predicate: `'42'`, `_id='42'` or a bare `42`.
/// Doubled quotes inside a quoted literal are unescaped.
pub fn parse_key_predicate(predicate: &str) -> Option<String> {
    let predicate = predicate.trim();
    let literal = match predicate.split_once('=') {
        _ if predicate.starts_with('\'') => predicate,
        Some((name, value)) if name.trim() == ID_FIELD => value.trim(),
        Some(_) => return None,
        None => predicate,
    };

    match literal
        .strip_prefix('\'')
        .and_then(|l| l.strip_suffix('\''))
    {
        Some(quoted) => Some(quoted.replace("''", "'")),
        None if !literal.is_empty() && !literal.contains('\'') => Some(literal.to_string()),
        None => None,
    }
}

/// Remove every cursor parameter from a query string. Names are compared
/// decoded, however the client encoded them.
pub fn strip_skiptoken(query: &str) -> String {
    query
        .split('&')
        .filter(|param| {
            match form_urlencoded::parse(param.as_bytes()).next() {
                Some((name, _)) => name != SKIPTOKEN,
                None => false,
            }
        })
        .collect::<Vec<_>>()
        .join("&")
}

/// Link to the page starting at `skiptoken`: the request URI with any previous
/// cursor replaced. Applying it to its own output gives the same link back.
pub fn next_link(request_uri: &str, skiptoken: u64) -> Result<Url, url::ParseError> {
    let (base, query) = match request_uri.split_once('?') {
        Some((base, query)) => (base, strip_skiptoken(query)),
        None => (request_uri, String::new()),
    };

    let link = if query.is_empty() {
        format!("{base}?{SKIPTOKEN}={skiptoken}")
    } else {
        format!("{base}?{query}&{SKIPTOKEN}={skiptoken}")
    };
    Url::parse(&link)
}
