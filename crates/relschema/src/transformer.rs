//! Document layouts over per-entity schemas

use crate::factory::{BuildOptions, SchemaFactory};
use relschema_core::{
    DefinitionsDocument, Document, Member, Module, Registry, SchemaResult,
};
use std::collections::BTreeMap;
use tracing::debug;

/// A build target: one entity, or every entity of a module
#[derive(Debug, Clone, Copy)]
pub enum Target<'a> {
    Entity(&'a str),
    Module(&'a Module),
}

impl<'a> From<&'a str> for Target<'a> {
    fn from(value: &'a str) -> Self {
        Target::Entity(value)
    }
}

impl<'a> From<&'a Module> for Target<'a> {
    fn from(value: &'a Module) -> Self {
        Target::Module(value)
    }
}

/// Reshapes factory output into one document layout
pub trait Transformer {
    fn transform(
        &self,
        registry: &Registry,
        targets: &[Target<'_>],
        depth: Option<usize>,
    ) -> SchemaResult<Document>;
}

/// Entity names of a module.
///
/// An explicit export list is resolved name by name; otherwise every member
/// is scanned. Only entity members are kept.
pub fn collect_models(module: &Module) -> SchemaResult<Vec<&str>> {
    let members: Vec<&Member> = match module.export_list() {
        Some(exports) => exports
            .iter()
            .map(|name| module.get(name))
            .collect::<SchemaResult<_>>()?,
        None => module.members().map(|(_, member)| member).collect(),
    };
    Ok(members
        .into_iter()
        .filter_map(|member| match member {
            Member::Entity(name) => Some(name.as_str()),
            Member::Value(_) => None,
        })
        .collect())
}

fn entity_names<'a>(targets: &[Target<'a>]) -> SchemaResult<Vec<&'a str>> {
    let mut names = Vec::new();
    for target in targets {
        match *target {
            Target::Entity(name) => names.push(name),
            Target::Module(module) => names.extend(collect_models(module)?),
        }
    }
    Ok(names)
}

/// Nested definitions of every target, then each target's own schema on top
fn accumulate(
    factory: &SchemaFactory,
    registry: &Registry,
    targets: &[Target<'_>],
    depth: Option<usize>,
) -> SchemaResult<DefinitionsDocument> {
    let mut nested = BTreeMap::new();
    let mut toplevel = BTreeMap::new();
    for name in entity_names(targets)? {
        let mut options = BuildOptions::new();
        options.depth = depth;
        let mut schema = factory.build(registry, name, options)?;
        if let Some(definitions) = schema.definitions.take() {
            nested.extend(definitions);
        }
        let title = schema.title.clone().unwrap_or_else(|| name.to_string());
        toplevel.insert(title, schema);
    }
    debug!(
        nested = nested.len(),
        toplevel = toplevel.len(),
        "accumulated definitions"
    );
    nested.extend(toplevel);
    Ok(DefinitionsDocument {
        definitions: nested,
    })
}

/// Plain JSON Schema: the entity schema for a single entity, a `definitions` table otherwise
#[derive(Debug)]
pub struct JsonSchemaTransformer {
    factory: SchemaFactory,
}

impl JsonSchemaTransformer {
    #[must_use]
    pub fn new(factory: SchemaFactory) -> Self {
        Self { factory }
    }
}

impl Transformer for JsonSchemaTransformer {
    fn transform(
        &self,
        registry: &Registry,
        targets: &[Target<'_>],
        depth: Option<usize>,
    ) -> SchemaResult<Document> {
        if let [Target::Entity(name)] = targets {
            let mut options = BuildOptions::new();
            options.depth = depth;
            let schema = self.factory.build(registry, name, options)?;
            return Ok(Document::Schema(Box::new(schema)));
        }
        accumulate(&self.factory, registry, targets, depth).map(Document::Definitions)
    }
}

/// OpenAPI 2 / Swagger 2: always a `definitions` table
#[derive(Debug)]
pub struct OpenApi2Transformer {
    factory: SchemaFactory,
}

/// Swagger 2 shares the OpenAPI 2 layout
pub type Swagger2Transformer = OpenApi2Transformer;

impl OpenApi2Transformer {
    #[must_use]
    pub fn new(factory: SchemaFactory) -> Self {
        Self { factory }
    }
}

impl Transformer for OpenApi2Transformer {
    fn transform(
        &self,
        registry: &Registry,
        targets: &[Target<'_>],
        depth: Option<usize>,
    ) -> SchemaResult<Document> {
        accumulate(&self.factory, registry, targets, depth).map(Document::Definitions)
    }
}

/// OpenAPI 3 / AsyncAPI 2: the OpenAPI 2 table under `components.schemas`
#[derive(Debug)]
pub struct OpenApi3Transformer {
    inner: OpenApi2Transformer,
}

/// AsyncAPI 2 shares the OpenAPI 3 layout
pub type AsyncApi2Transformer = OpenApi3Transformer;

impl OpenApi3Transformer {
    #[must_use]
    pub fn new(factory: SchemaFactory) -> Self {
        Self {
            inner: OpenApi2Transformer::new(factory),
        }
    }
}

impl Transformer for OpenApi3Transformer {
    fn transform(
        &self,
        registry: &Registry,
        targets: &[Target<'_>],
        depth: Option<usize>,
    ) -> SchemaResult<Document> {
        match self.inner.transform(registry, targets, depth)? {
            Document::Definitions(doc) => Ok(Document::Components(doc.into_components())),
            other => Ok(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures;
    use crate::walker::WalkerKind;
    use relschema_core::SchemaError;
    use serde_json::json;

    fn factory() -> SchemaFactory {
        SchemaFactory::new(WalkerKind::Structural)
    }

    #[test]
    fn test_json_schema_for_one_entity_is_the_entity_schema() {
        let registry = fixtures::group_user();
        let doc = JsonSchemaTransformer::new(factory())
            .transform(&registry, &["User".into()], None)
            .unwrap();
        let value = doc.to_value().unwrap();
        assert_eq!(value["title"], json!("User"));
        assert_eq!(value["properties"]["group"], json!({"$ref": "#/definitions/Group"}));
        assert!(value["definitions"]["Group"].is_object());
    }

    #[test]
    fn test_openapi2_wraps_a_single_entity_in_definitions() {
        let registry = fixtures::group_user();
        let doc = OpenApi2Transformer::new(factory())
            .transform(&registry, &["User".into()], None)
            .unwrap();
        let value = doc.to_value().unwrap();
        assert_eq!(value["definitions"]["User"]["title"], json!("User"));
        assert!(value["definitions"]["User"].get("definitions").is_none());
        assert!(value["definitions"]["Group"].is_object());
    }

    #[test]
    fn test_toplevel_schemas_win_over_nested_definitions() {
        let registry = fixtures::group_user();
        let module = fixtures::module();
        let doc = Swagger2Transformer::new(factory())
            .transform(&registry, &[Target::Module(&module)], None)
            .unwrap();
        let schemas = doc.schemas().unwrap();
        assert_eq!(schemas["Group"].title.as_deref(), Some("Group"));
        assert!(schemas["Group"].properties.contains_key("users"));
        assert_eq!(schemas["User"].title.as_deref(), Some("User"));
    }

    #[test]
    fn test_openapi3_moves_table_and_rewrites_refs() {
        let registry = fixtures::group_user();
        let doc = OpenApi3Transformer::new(factory())
            .transform(&registry, &["Group".into()], None)
            .unwrap();
        let value = doc.to_value().unwrap();
        assert!(value.get("definitions").is_none());
        assert_eq!(
            value["components"]["schemas"]["Group"]["properties"]["users"]["items"],
            json!({"$ref": "#/components/schemas/User"})
        );
        assert!(!value.to_string().contains("#/definitions/"));
    }

    #[test]
    fn test_asyncapi2_shares_the_openapi3_layout() {
        let registry = fixtures::group_user();
        let doc = AsyncApi2Transformer::new(factory())
            .transform(&registry, &["User".into()], Some(1))
            .unwrap();
        assert!(matches!(doc, Document::Components(_)));
    }

    #[test]
    fn test_collect_models_keeps_entities_only() {
        let module = fixtures::module();
        assert_eq!(collect_models(&module).unwrap(), ["Group", "User"]);
    }

    #[test]
    fn test_collect_models_follows_the_export_list() {
        let module = fixtures::module().exports(["User"]);
        assert_eq!(collect_models(&module).unwrap(), ["User"]);

        let broken = fixtures::module().exports(["Missing"]);
        assert!(matches!(
            collect_models(&broken),
            Err(SchemaError::UnknownExport { .. })
        ));
    }
}
