use std::collections::BTreeMap;

use serde::Serialize;

pub type EntitySetName = String;
pub type DatasetId = String;

/// The only dataset origin that gets exposed; everything else is a system dataset
pub const USER_ORIGIN: &str = "user";

/// Binds an entity set back to the remote dataset it was derived from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetRef {
    pub dataset_id: DatasetId,
    pub origin: String,
}

/// A typed scalar, after coercion against the declared field type
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum PropertyValue {
    String(String),
    Int64(i64),
    DateTimeOffset(String),
    Null,
}

/// One remote record translated against its entity set schema
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Record {
    /// Identifier used to build the protocol key, e.g. `Person_set('1')`
    pub id: String,
    pub properties: BTreeMap<String, PropertyValue>,
}

impl Record {
    pub fn get(&self, name: &str) -> Option<&PropertyValue> {
        self.properties.get(name)
    }

    /// Protocol-level key of this record. Keys are always rendered as quoted
    /// string literals, there is no unquoted numeric form.
    pub fn key_literal(&self, entity_set: &str) -> String {
        format!("{}('{}')", entity_set, self.id.replace('\'', "''"))
    }
}

/// One page of a collection read
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct EntityPage {
    pub records: Vec<Record>,
    /// Cursor for the following page, if the remote store may have more records
    pub next_skiptoken: Option<u64>,
}

/// Pagination options of a collection read, as parsed from the request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PageOptions {
    pub skip: Option<u64>,
    pub top: Option<u64>,
    pub skiptoken: u64,
}
