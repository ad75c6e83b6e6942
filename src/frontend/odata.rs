//! JSON payloads of the OData v4 protocol: service document, CSDL metadata
//! document and entity/collection responses (`odata.metadata=minimal`).

use serde_json::{json, Map, Value};
use url::Url;

use crate::catalog::{EntitySetInfo, SchemaProvider, CONTAINER_NAME, NAMESPACE};
use crate::data_types::{EntityPage, Record};

pub const ODATA_VERSION: &str = "4.0";
pub const METADATA_SEGMENT: &str = "$metadata";

pub fn service_document(schema: &dyn SchemaProvider) -> Value {
    let sets: Vec<Value> = schema
        .entity_sets()
        .into_iter()
        .map(|EntitySetInfo { name, .. }| {
            json!({
                "name": name,
                "kind": "EntitySet",
                "url": name,
            })
        })
        .collect();

    json!({
        "@odata.context": METADATA_SEGMENT,
        "value": sets,
    })
}

/// CSDL JSON document describing every entity type and the container exposing
/// them as entity sets
pub fn metadata_document(schema: &dyn SchemaProvider) -> Value {
    let mut namespace = Map::new();

    for name in schema.entity_type_names() {
        let entity_type = match schema.entity_type(&name) {
            Some(entity_type) => entity_type,
            None => continue,
        };

        let mut definition = Map::new();
        definition.insert("$Kind".to_string(), json!("EntityType"));
        definition.insert("$Key".to_string(), json!([entity_type.key().name]));
        for field in entity_type.fields() {
            let mut property = Map::new();
            property.insert("$Type".to_string(), json!(field.field_type.edm_type()));
            if !field.is_key() {
                property.insert("$Nullable".to_string(), json!(true));
            }
            definition.insert(field.name.clone(), Value::Object(property));
        }
        namespace.insert(name, Value::Object(definition));
    }

    let mut container = Map::new();
    container.insert("$Kind".to_string(), json!("EntityContainer"));
    for set in schema.entity_sets() {
        container.insert(
            set.name,
            json!({
                "$Collection": true,
                "$Type": set.entity_type,
            }),
        );
    }
    namespace.insert(CONTAINER_NAME.to_string(), Value::Object(container));

    json!({
        "$Version": ODATA_VERSION,
        "$EntityContainer": schema.container_name(),
        NAMESPACE: namespace,
    })
}

/// A record with its annotations, as it appears in a collection
pub fn entity_json(entity_set: &str, record: &Record) -> Value {
    let mut object = Map::new();
    object.insert("@odata.id".to_string(), json!(record.key_literal(entity_set)));
    for (name, value) in &record.properties {
        object.insert(name.clone(), json!(value));
    }
    Value::Object(object)
}

pub fn entity_response(entity_set: &str, record: &Record) -> Value {
    let mut entity = entity_json(entity_set, record);
    if let Value::Object(ref mut object) = entity {
        object.insert(
            "@odata.context".to_string(),
            json!(format!("{METADATA_SEGMENT}#{entity_set}/$entity")),
        );
    }
    entity
}

pub fn collection_response(
    entity_set: &str,
    page: &EntityPage,
    next_link: Option<&Url>,
) -> Value {
    let mut response = Map::new();
    response.insert(
        "@odata.context".to_string(),
        json!(format!("{METADATA_SEGMENT}#{entity_set}")),
    );
    response.insert(
        "value".to_string(),
        Value::Array(
            page.records
                .iter()
                .map(|record| entity_json(entity_set, record))
                .collect(),
        ),
    );
    if let Some(link) = next_link {
        response.insert("@odata.nextLink".to_string(), json!(link.as_str()));
    }
    Value::Object(response)
}
