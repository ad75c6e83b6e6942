use std::collections::HashMap;
use std::fmt;

/// Name of the key field every entity set carries. Remote records always have it,
/// even though the inferred schema never lists it.
pub const ID_FIELD: &str = "_id";

/// Separator between a namespace and a local name in remote identifiers
pub const NAMESPACE_SEPARATOR: char = ':';

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldType {
    String,
    Integer,
    DateTime,
}

impl FieldType {
    /// Name of the primitive type this field is advertised as in the metadata document
    pub fn edm_type(&self) -> &'static str {
        match self {
            FieldType::String => "Edm.String",
            FieldType::Integer => "Edm.Int64",
            FieldType::DateTime => "Edm.DateTimeOffset",
        }
    }
}

// Anything the remote store infers that we don't know about is exposed as a string
impl From<&str> for FieldType {
    fn from(value: &str) -> Self {
        match value {
            "integer" => FieldType::Integer,
            "datetime" => FieldType::DateTime,
            _ => FieldType::String,
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FieldType::String => "string",
            FieldType::Integer => "integer",
            FieldType::DateTime => "datetime",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDescriptor {
    pub name: String,
    pub field_type: FieldType,
    pub source_property: Option<String>,
}

impl FieldDescriptor {
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
            source_property: None,
        }
    }

    /// The synthetic key field
    pub fn id() -> Self {
        Self::new(ID_FIELD, FieldType::String)
    }

    pub fn is_key(&self) -> bool {
        self.name == ID_FIELD
    }
}

/// Ordered field list of one entity set. The key field `_id` is always present
/// exactly once, and always comes first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntitySetSchema {
    fields: Vec<FieldDescriptor>,
    by_name: HashMap<String, usize>,
}

impl EntitySetSchema {
    /// Build a schema out of a field list. Any `_id` entries are folded into the
    /// single leading key field, and later duplicates of a name are ignored.
    pub fn new(fields: Vec<FieldDescriptor>) -> Self {
        let mut ordered = vec![FieldDescriptor::id()];
        let mut by_name = HashMap::from([(ID_FIELD.to_string(), 0)]);

        for field in fields {
            if by_name.contains_key(&field.name) {
                continue;
            }
            by_name.insert(field.name.clone(), ordered.len());
            ordered.push(field);
        }

        Self {
            fields: ordered,
            by_name,
        }
    }

    pub fn fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }

    pub fn key(&self) -> &FieldDescriptor {
        &self.fields[0]
    }

    pub fn field(&self, name: &str) -> Option<&FieldDescriptor> {
        self.by_name.get(name).map(|i| &self.fields[*i])
    }

    /// Resolve a raw (possibly namespaced) record key to its declared field.
    /// The verbatim key wins over its local part.
    pub fn resolve(&self, raw_key: &str) -> Option<&FieldDescriptor> {
        self.field(raw_key).or_else(|| self.field(local_name(raw_key)))
    }

    /// Number of fields, the key included
    pub fn field_count(&self) -> usize {
        self.fields.len()
    }
}

/// Drop any namespace prefix, keeping what follows the last separator:
/// `"foo:bar:name"` -> `"name"`
pub fn local_name(raw: &str) -> &str {
    raw.rsplit(NAMESPACE_SEPARATOR).next().unwrap_or(raw)
}

/// Turn a (possibly hyphenated) remote dataset id into the identifier the entity
/// set is published under: `"my-data-set"` -> `"MyDataSet"`. Hyphens aren't valid in
/// protocol identifiers, so each segment is lower-cased, capitalized and glued
/// back together.
pub fn canonical_entity_set_name(dataset_id: &str) -> String {
    dataset_id
        .split('-')
        .filter(|segment| !segment.is_empty())
        .map(|segment| {
            let lower = segment.to_lowercase();
            let mut chars = lower.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect()
}
