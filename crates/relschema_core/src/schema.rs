//! Schema-related structure definitions

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Prefix of `$ref` strings pointing into a `definitions` table
pub const DEFINITIONS_PREFIX: &str = "#/definitions/";
/// Prefix of `$ref` strings pointing into `components.schemas`
pub const COMPONENTS_PREFIX: &str = "#/components/schemas/";

/// Reference definition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reference {
    /// Reference path (e.g., "#/definitions/User")
    #[serde(rename = "$ref")]
    pub ref_path: String,
}

impl Reference {
    /// Create a new reference
    #[must_use]
    pub const fn new(ref_path: String) -> Self {
        Self { ref_path }
    }

    /// Create a reference into the `definitions` table
    #[must_use]
    pub fn definition(name: &str) -> Self {
        Self::new(format!("{DEFINITIONS_PREFIX}{name}"))
    }

    /// `{"$ref": ...}` as a JSON value
    #[must_use]
    pub fn to_value(&self) -> Value {
        let mut map = Map::new();
        map.insert("$ref".to_string(), Value::String(self.ref_path.clone()));
        Value::Object(map)
    }
}

/// JSON Schema type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SchemaType {
    String,
    Number,
    Integer,
    Boolean,
    Array,
    Object,
    Null,
}

impl SchemaType {
    /// The keyword as it appears in a schema document
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Number => "number",
            Self::Integer => "integer",
            Self::Boolean => "boolean",
            Self::Array => "array",
            Self::Object => "object",
            Self::Null => "null",
        }
    }

    /// Parse a `type` keyword value
    #[must_use]
    pub fn from_keyword(keyword: &str) -> Option<Self> {
        match keyword {
            "string" => Some(Self::String),
            "number" => Some(Self::Number),
            "integer" => Some(Self::Integer),
            "boolean" => Some(Self::Boolean),
            "array" => Some(Self::Array),
            "object" => Some(Self::Object),
            "null" => Some(Self::Null),
            _ => None,
        }
    }
}

impl From<SchemaType> for Value {
    fn from(value: SchemaType) -> Self {
        Value::String(value.as_str().to_string())
    }
}

/// Object schema generated for one entity.
///
/// Property subschemas stay plain JSON values: they carry whatever keywords the
/// classifier, restrictions, overrides and decision options put there, in walk
/// order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Schema {
    /// Title (entity name); absent on `definitions` entries
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Schema type
    #[serde(rename = "type")]
    pub schema_type: SchemaType,
    /// Property definitions
    #[serde(default)]
    pub properties: Map<String, Value>,
    /// List of required properties
    #[serde(skip_serializing_if = "Option::is_none")]
    pub required: Option<Vec<String>>,
    /// Description
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Flat table of referenced entity schemas
    #[serde(skip_serializing_if = "Option::is_none")]
    pub definitions: Option<BTreeMap<String, Schema>>,
}

impl Schema {
    /// Create an untitled object schema
    #[must_use]
    pub fn object(properties: Map<String, Value>) -> Self {
        Self {
            title: None,
            schema_type: SchemaType::Object,
            properties,
            required: None,
            description: None,
            definitions: None,
        }
    }

    /// Create an empty object schema titled after an entity
    #[must_use]
    pub fn titled(title: &str) -> Self {
        Self {
            title: Some(title.to_string()),
            ..Self::object(Map::new())
        }
    }

    /// The `definitions` table, created on first use
    pub fn definitions_mut(&mut self) -> &mut BTreeMap<String, Schema> {
        self.definitions.get_or_insert_with(BTreeMap::new)
    }

    /// Look up a definition by entity name
    #[must_use]
    pub fn definition(&self, name: &str) -> Option<&Schema> {
        self.definitions.as_ref().and_then(|defs| defs.get(name))
    }

    /// Serialize into a plain JSON value
    #[must_use]
    pub fn to_value(&self) -> Value {
        // Serializing a map of strings to JSON values cannot fail.
        serde_json::to_value(self).unwrap_or(Value::Null)
    }

    /// Rewrite every `$ref` string starting with `from` to start with `to`,
    /// in the properties and in all nested definitions.
    pub fn rewrite_refs(&mut self, from: &str, to: &str) {
        for value in self.properties.values_mut() {
            rewrite_refs(value, from, to);
        }
        if let Some(definitions) = &mut self.definitions {
            for schema in definitions.values_mut() {
                schema.rewrite_refs(from, to);
            }
        }
    }
}

/// Rewrite every `$ref` string value below `value` whose prefix is `from`.
pub fn rewrite_refs(value: &mut Value, from: &str, to: &str) {
    match value {
        Value::Object(map) => {
            for (key, child) in map.iter_mut() {
                if key == "$ref"
                    && let Value::String(path) = child
                    && let Some(rest) = path.strip_prefix(from)
                {
                    *path = format!("{to}{rest}");
                } else {
                    rewrite_refs(child, from, to);
                }
            }
        }
        Value::Array(items) => {
            for item in items {
                rewrite_refs(item, from, to);
            }
        }
        _ => {}
    }
}

/// `OpenAPI` Components (reusable components)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Components {
    /// Schema definitions
    pub schemas: BTreeMap<String, Schema>,
}
