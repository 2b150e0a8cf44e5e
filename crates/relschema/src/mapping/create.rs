use super::lookup::ModelLookup;
use super::{Shape, properties, required, scalar_relationship};
use relschema_core::{
    Attribute, Entity, Instance, InstanceRef, NativeValue, PlainDict, Schema, SchemaError,
    SchemaResult,
};
use serde_json::{Map, Value};
use tracing::trace;

/// Builds fresh instances from schema-shaped dictionaries
#[derive(Debug, Clone, Copy, Default)]
pub struct CreateObjectWalker {
    strict: bool,
}

impl CreateObjectWalker {
    /// With `strict`, every required column must be present and non-null
    #[must_use]
    pub fn new(strict: bool) -> Self {
        Self { strict }
    }

    /// Create an `entity` instance from `params`; `entity` is already on top of `lookup`
    pub fn create(
        &self,
        params: &PlainDict,
        node: &Map<String, Value>,
        root: &Value,
        lookup: &mut ModelLookup<'_>,
        entity: &Entity,
    ) -> SchemaResult<Instance> {
        let mut instance = Instance::new(entity.name());
        for (name, sub) in properties(node) {
            let Some(value) = params.get(name) else {
                continue;
            };
            match Shape::of(sub, root)? {
                Shape::Scalar(_) => {
                    if entity.relationship_named(name).is_some() {
                        return Err(scalar_relationship(entity.name(), name));
                    }
                    instance.set_value(name.as_str(), value.clone());
                }
                Shape::One(child) => {
                    let related = match value {
                        NativeValue::Null => None,
                        NativeValue::Map(nested) => {
                            let target = lookup.resolve(name)?;
                            let created = self.create(nested, child, root, lookup, target)?;
                            lookup.pop();
                            Some(created.into_ref())
                        }
                        other => return Err(expected(name, "a map", other)),
                    };
                    instance.set(name.as_str(), Attribute::One(related));
                }
                Shape::Many(child) => {
                    let items = match value {
                        NativeValue::Null => &[][..],
                        NativeValue::List(items) => items.as_slice(),
                        other => return Err(expected(name, "a list", other)),
                    };
                    let target = lookup.resolve(name)?;
                    let mut related = Vec::with_capacity(items.len());
                    for item in items {
                        let nested = item.as_map().ok_or_else(|| expected(name, "a map", item))?;
                        related.push(self.create(nested, child, root, lookup, target)?.into_ref());
                    }
                    lookup.pop();
                    instance.set(name.as_str(), Attribute::Many(related));
                }
            }
        }

        if self.strict {
            for name in required(node) {
                if instance.value(name).is_null() {
                    return Err(SchemaError::InvalidStatus(format!(
                        "`{}.{name}` is required",
                        entity.name()
                    )));
                }
            }
        }
        trace!(entity = entity.name(), "created instance");
        Ok(instance)
    }
}

pub(crate) fn expected(name: &str, what: &str, got: &NativeValue) -> SchemaError {
    SchemaError::Value(format!("`{name}` expects {what}, got {}", got.kind()))
}

/// Build a new instance graph of the entity titled by `schema` from `params`
pub fn objectify(
    params: &PlainDict,
    schema: &Schema,
    lookup: &mut ModelLookup<'_>,
    strict: bool,
) -> SchemaResult<InstanceRef> {
    let title = schema
        .title
        .as_deref()
        .ok_or_else(|| SchemaError::Value("schema has no title naming its entity".to_string()))?;
    let root = schema.to_value();
    let node = root
        .as_object()
        .ok_or_else(|| SchemaError::NotImplemented("schema is not an object".to_string()))?;

    let entity = lookup.resolve(title)?;
    let instance = CreateObjectWalker::new(strict).create(params, node, &root, lookup, entity)?;
    lookup.pop();
    Ok(instance.into_ref())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::factory::{BuildOptions, SchemaFactory};
    use crate::fixtures;
    use crate::walker::WalkerKind;
    use indexmap::indexmap;
    use relschema_core::Registry;

    fn schema(registry: &Registry, entity: &str) -> Schema {
        SchemaFactory::new(WalkerKind::Structural)
            .build(registry, entity, BuildOptions::new())
            .unwrap()
    }

    fn dict(pairs: Vec<(&str, NativeValue)>) -> PlainDict {
        pairs.into_iter().map(|(k, v)| (k.to_string(), v)).collect()
    }

    #[test]
    fn test_nested_many_to_one_is_created() {
        let registry = fixtures::group_user();
        let params = dict(vec![
            ("pk", 1.into()),
            ("name", "foo".into()),
            ("group", NativeValue::Map(dict(vec![("pk", 1.into()), ("name", "ravenclaw".into())]))),
        ]);
        let mut lookup = ModelLookup::new(&registry);

        let user = objectify(&params, &schema(&registry, "User"), &mut lookup, false).unwrap();
        let user = user.borrow();
        assert_eq!(user.entity(), "User");
        assert_eq!(user.value("name"), NativeValue::from("foo"));
        let group = user.one("group").unwrap();
        assert_eq!(group.borrow().entity(), "Group");
        assert_eq!(group.borrow().value("name"), NativeValue::from("ravenclaw"));
        assert_eq!(lookup.depth(), 0);
    }

    #[test]
    fn test_nested_one_to_many_is_created() {
        let registry = fixtures::group_user();
        let users = NativeValue::List(vec![
            NativeValue::Map(indexmap! {
                "pk".to_string() => 1.into(),
                "name".to_string() => "foo".into(),
            }),
            NativeValue::Map(indexmap! {
                "pk".to_string() => 2.into(),
                "name".to_string() => "bar".into(),
            }),
        ]);
        let params = dict(vec![("name", "ravenclaw".into()), ("users", users)]);
        let mut lookup = ModelLookup::new(&registry);

        let group = objectify(&params, &schema(&registry, "Group"), &mut lookup, false).unwrap();
        let users = group.borrow().many("users");
        assert_eq!(users.len(), 2);
        assert_eq!(users[1].borrow().entity(), "User");
        assert_eq!(users[1].borrow().value("name"), NativeValue::from("bar"));
    }

    #[test]
    fn test_strict_mode_rejects_missing_required_columns() {
        let registry = fixtures::group_user();
        let schema = schema(&registry, "User");
        let params = dict(vec![("pk", 1.into())]);

        let mut lookup = ModelLookup::new(&registry);
        assert!(objectify(&params, &schema, &mut lookup, false).is_ok());

        let mut lookup = ModelLookup::new(&registry);
        let err = objectify(&params, &schema, &mut lookup, true).unwrap_err();
        assert!(matches!(err, SchemaError::InvalidStatus(ref msg) if msg.contains("User.name")));
    }

    #[test]
    fn test_many_to_many_placeholder_cannot_be_objectified() {
        use crate::decision::UseForeignKeyIfPossibleDecision;

        let registry = fixtures::company();
        let schema = SchemaFactory::new(WalkerKind::Structural)
            .with_decision(UseForeignKeyIfPossibleDecision)
            .build(&registry, "Team", BuildOptions::new())
            .unwrap();
        let params = dict(vec![("id", 1.into()), ("tags", NativeValue::List(vec!["7".into()]))]);
        let mut lookup = ModelLookup::new(&registry);

        let err = objectify(&params, &schema, &mut lookup, false).unwrap_err();
        assert!(matches!(err, SchemaError::Value(ref msg) if msg.contains("Team.tags")));
    }

    #[test]
    fn test_untitled_schema_cannot_be_objectified() {
        let registry = fixtures::group_user();
        let mut schema = schema(&registry, "User");
        schema.title = None;
        let mut lookup = ModelLookup::new(&registry);
        let err = objectify(&PlainDict::new(), &schema, &mut lookup, false).unwrap_err();
        assert!(matches!(err, SchemaError::Value(_)));
    }
}
