//! Document layouts produced by the transformers

use crate::error::SchemaResult;
use crate::schema::{COMPONENTS_PREFIX, Components, DEFINITIONS_PREFIX, Schema};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Document layout
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Layout {
    /// Plain JSON Schema
    #[default]
    JsonSchema,
    /// Swagger 2 (`definitions` table)
    Swagger2,
    /// OpenAPI 2 (`definitions` table)
    OpenApi2,
    /// OpenAPI 3 (`components.schemas`)
    OpenApi3,
    /// AsyncAPI 2 (`components.schemas`)
    AsyncApi2,
}

/// `{"definitions": {...}}` layout (JSON Schema for several targets, Swagger/OpenAPI 2)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DefinitionsDocument {
    /// Flat table of entity schemas
    pub definitions: BTreeMap<String, Schema>,
}

impl DefinitionsDocument {
    /// Move the table under `components.schemas`, rewriting every `$ref`.
    #[must_use]
    pub fn into_components(self) -> ComponentsDocument {
        let mut schemas = self.definitions;
        for schema in schemas.values_mut() {
            schema.rewrite_refs(DEFINITIONS_PREFIX, COMPONENTS_PREFIX);
        }
        ComponentsDocument {
            components: Components { schemas },
        }
    }
}

/// `{"components": {"schemas": {...}}}` layout (OpenAPI 3, AsyncAPI 2)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ComponentsDocument {
    /// Components (reusable components)
    pub components: Components,
}

/// Any document a transformer can return
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Document {
    /// A single entity schema
    Schema(Box<Schema>),
    /// `definitions` table
    Definitions(DefinitionsDocument),
    /// `components.schemas` table
    Components(ComponentsDocument),
}

impl Document {
    /// Serialize into a plain JSON value
    pub fn to_value(&self) -> SchemaResult<Value> {
        Ok(serde_json::to_value(self)?)
    }

    /// The flat schema table of this document, if it has one
    #[must_use]
    pub fn schemas(&self) -> Option<&BTreeMap<String, Schema>> {
        match self {
            Document::Schema(schema) => schema.definitions.as_ref(),
            Document::Definitions(doc) => Some(&doc.definitions),
            Document::Components(doc) => Some(&doc.components.schemas),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Map, json};

    #[test]
    fn test_into_components_moves_table_and_rewrites_refs() {
        let mut user = Schema::titled("User");
        user.properties
            .insert("group".to_string(), json!({"$ref": "#/definitions/Group"}));
        let mut definitions = BTreeMap::new();
        definitions.insert("User".to_string(), user);
        definitions.insert("Group".to_string(), Schema::object(Map::new()));

        let doc = DefinitionsDocument { definitions }.into_components();
        let value = Document::Components(doc).to_value().unwrap();

        assert_eq!(
            value["components"]["schemas"]["User"]["properties"]["group"],
            json!({"$ref": "#/components/schemas/Group"})
        );
        assert!(value.get("definitions").is_none());
    }

    #[test]
    fn test_layout_names_are_lowercase() {
        let layout: Layout = serde_json::from_value(json!("openapi3")).unwrap();
        assert_eq!(layout, Layout::OpenApi3);
        assert_eq!(serde_json::to_value(Layout::JsonSchema).unwrap(), json!("jsonschema"));
    }
}
