//! Entity data model exposed to clients: the registry of discovered entity sets,
//! how it gets populated, and how it is described to the protocol layer.

pub mod discovery;
pub mod registry;

pub use self::registry::SchemaRegistry;

use crate::schema::EntitySetSchema;

/// Namespace all entity types live in
pub const NAMESPACE: &str = "Sesam.io";
pub const CONTAINER_NAME: &str = "Odata";
/// Appended to an entity type name to get its entity set name, so that the two
/// can be told apart in URLs (`Person` is published as `Person_set`)
pub const SET_POSTFIX: &str = "_set";

/// Strip the entity set postfix to get the name the schema is registered under
pub fn schema_name(entity_set: &str) -> &str {
    entity_set.strip_suffix(SET_POSTFIX).unwrap_or(entity_set)
}

pub fn entity_set_name(schema_name: &str) -> String {
    format!("{schema_name}{SET_POSTFIX}")
}

pub fn qualified_name(name: &str) -> String {
    format!("{NAMESPACE}.{name}")
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntitySetInfo {
    /// Published name, e.g. `Person_set`
    pub name: String,
    /// Namespace-qualified entity type, e.g. `Sesam.io.Person`
    pub entity_type: String,
}

impl EntitySetInfo {
    pub fn for_schema(schema_name: &str) -> Self {
        Self {
            name: entity_set_name(schema_name),
            entity_type: qualified_name(schema_name),
        }
    }
}

/// What the protocol layer needs to know to describe the service: entity types,
/// the entity sets exposing them and the container they're grouped in.
pub trait SchemaProvider: Sync + Send {
    /// Bare entity type names, sorted
    fn entity_type_names(&self) -> Vec<String>;

    /// Field list and key of an entity type, by bare or namespace-qualified name
    fn entity_type(&self, name: &str) -> Option<&EntitySetSchema>;

    /// Look up an entity set. Both `Person_set` and `Person` resolve to `Person_set`.
    fn entity_set(&self, name: &str) -> Option<EntitySetInfo> {
        let schema_name = schema_name(name);
        self.entity_type(schema_name)
            .map(|_| EntitySetInfo::for_schema(schema_name))
    }

    fn entity_sets(&self) -> Vec<EntitySetInfo> {
        self.entity_type_names()
            .iter()
            .map(|name| EntitySetInfo::for_schema(name))
            .collect()
    }

    fn container_name(&self) -> String {
        qualified_name(CONTAINER_NAME)
    }
}
