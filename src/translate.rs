//! Translation of raw Sesam entities into typed records.
//!
//! Sesam entities are JSON objects whose keys are usually namespaced
//! (`"person:name"`), carry bookkeeping properties (`_updated`, `_hash`, ...) and
//! may contain anything the pipe produced. Only the properties the entity set
//! schema declares survive, stored under their local name and coerced to the
//! declared type.

use std::borrow::Cow;
use std::collections::BTreeMap;
use std::num::ParseIntError;

use serde_json::Value;
use tracing::debug;

use crate::data_types::{PropertyValue, Record};
use crate::schema::{EntitySetSchema, FieldDescriptor, FieldType, ID_FIELD, NAMESPACE_SEPARATOR};

/// Marker the remote store prefixes datetime values with (`~t2020-01-01T00:00:00Z`)
pub const DATETIME_MARKER: &str = "~t";

#[derive(Debug, thiserror::Error)]
pub enum TranslateError {
    #[error("Expected an entity to be a JSON object, got {0}")]
    NotAnObject(String),

    #[error("Entity has no `_id` property")]
    MissingId,

    #[error("Value {value:?} of property {field:?} is not a valid integer: {source}")]
    InvalidInteger {
        field: String,
        value: String,
        source: ParseIntError,
    },
}

/// Translate one raw entity against the schema of its entity set.
///
/// Properties the schema doesn't know about are dropped. If two raw keys map to
/// the same local name, the un-namespaced key wins, otherwise the first one.
pub fn translate(raw: &Value, schema: &EntitySetSchema) -> Result<Record, TranslateError> {
    let object = raw
        .as_object()
        .ok_or_else(|| TranslateError::NotAnObject(raw.to_string()))?;

    let id = object
        .get(ID_FIELD)
        .and_then(value_text)
        .map(|raw_id| record_id(&raw_id))
        .ok_or(TranslateError::MissingId)?;

    let mut properties = BTreeMap::new();
    for (key, value) in object {
        let field = match schema.resolve(key) {
            Some(field) if !field.is_key() => field,
            Some(_) => continue,
            None => {
                debug!("Dropping undeclared property {key:?}");
                continue;
            }
        };

        if key != &field.name && properties.contains_key(&field.name) {
            continue;
        }
        properties.insert(field.name.clone(), coerce(field, value)?);
    }

    properties.insert(ID_FIELD.to_string(), PropertyValue::String(id.clone()));

    Ok(Record { id, properties })
}

/// Coerce a raw value to the declared type of its field
pub fn coerce(field: &FieldDescriptor, value: &Value) -> Result<PropertyValue, TranslateError> {
    let text = match value_text(value) {
        Some(text) => text,
        None => return Ok(PropertyValue::Null),
    };

    match field.field_type {
        FieldType::String => Ok(PropertyValue::String(text.into_owned())),
        FieldType::Integer => text
            .parse::<i64>()
            .map(PropertyValue::Int64)
            .map_err(|source| TranslateError::InvalidInteger {
                field: field.name.clone(),
                value: text.into_owned(),
                source,
            }),
        FieldType::DateTime => Ok(PropertyValue::DateTimeOffset(strip_datetime_marker(
            &text,
        ))),
    }
}

pub fn strip_datetime_marker(value: &str) -> String {
    value.replace(DATETIME_MARKER, "")
}

/// Identifier of a record in protocol keys. Namespaced ids keep the segment after
/// the namespace: `"person:42"` -> `"42"`. `:` can't appear in the result.
pub fn record_id(raw_id: &str) -> String {
    let mut segments = raw_id.split(NAMESPACE_SEPARATOR);
    match (segments.next(), segments.next()) {
        (_, Some(local)) => local.to_string(),
        (Some(bare), None) => bare.to_string(),
        (None, None) => String::new(),
    }
}

// Textual form of a raw value, the way the remote store renders scalars.
// `None` for JSON null.
fn value_text(value: &Value) -> Option<Cow<'_, str>> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(Cow::Borrowed(s)),
        Value::Number(n) => Some(Cow::Owned(n.to_string())),
        Value::Bool(b) => Some(Cow::Owned(b.to_string())),
        Value::Array(_) | Value::Object(_) => Some(Cow::Owned(value.to_string())),
    }
}
