use super::create::{CreateObjectWalker, expected};
use super::lookup::ModelLookup;
use super::{Shape, is_related, properties, scalar_relationship};
use relschema_core::{
    Attribute, Entity, InstanceRef, NativeValue, PlainDict, Schema, SchemaError, SchemaResult,
};
use serde_json::{Map, Value};
use std::rc::Rc;
use tracing::{debug, trace};

/// Applies schema-shaped dictionaries onto existing instance graphs
#[derive(Debug, Clone, Copy, Default)]
pub struct UpdateObjectWalker {
    creator: CreateObjectWalker,
}

impl UpdateObjectWalker {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Update `instance` in place; `entity` is already on top of `lookup`
    pub fn update(
        &self,
        instance: &InstanceRef,
        params: &PlainDict,
        node: &Map<String, Value>,
        root: &Value,
        lookup: &mut ModelLookup<'_>,
        entity: &Entity,
    ) -> SchemaResult<()> {
        let actual = instance.borrow().entity().to_string();
        if actual != entity.name() {
            return Err(SchemaError::RuntimeMismatch {
                expected: entity.name().to_string(),
                actual,
            });
        }

        for (name, sub) in properties(node) {
            let Some(value) = params.get(name) else {
                continue;
            };
            match Shape::of(sub, root)? {
                Shape::Scalar(_) => {
                    if entity.relationship_named(name).is_some()
                        || is_related(&instance.borrow(), name)
                    {
                        return Err(scalar_relationship(entity.name(), name));
                    }
                    instance.borrow_mut().set_value(name.as_str(), value.clone());
                }
                Shape::One(child) => {
                    let target = lookup.resolve(name)?;
                    self.update_one(instance, name, value, child, root, lookup, target)?;
                    lookup.pop();
                }
                Shape::Many(child) => {
                    let target = lookup.resolve(name)?;
                    self.update_many(instance, name, value, child, root, lookup, target)?;
                    lookup.pop();
                }
            }
        }
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn update_one(
        &self,
        instance: &InstanceRef,
        name: &str,
        value: &NativeValue,
        node: &Map<String, Value>,
        root: &Value,
        lookup: &mut ModelLookup<'_>,
        target: &Entity,
    ) -> SchemaResult<()> {
        let related = match value {
            NativeValue::Null => None,
            NativeValue::Map(nested) => {
                let existing = instance.borrow().one(name);
                match existing {
                    Some(existing) => {
                        self.update(&existing, nested, node, root, lookup, target)?;
                        Some(existing)
                    }
                    None => Some(
                        self.creator
                            .create(nested, node, root, lookup, target)?
                            .into_ref(),
                    ),
                }
            }
            other => return Err(expected(name, "a map", other)),
        };
        instance.borrow_mut().set(name, Attribute::One(related));
        Ok(())
    }

    /// Reconcile a collection by primary key: matched children are updated,
    /// unmatched items created, and children absent from `value` dropped.
    #[allow(clippy::too_many_arguments)]
    fn update_many(
        &self,
        instance: &InstanceRef,
        name: &str,
        value: &NativeValue,
        node: &Map<String, Value>,
        root: &Value,
        lookup: &mut ModelLookup<'_>,
        target: &Entity,
    ) -> SchemaResult<()> {
        let items = match value {
            NativeValue::Null => &[][..],
            NativeValue::List(items) => items.as_slice(),
            other => return Err(expected(name, "a list", other)),
        };
        let pk_names = target.primary_key_names();
        let existing: Vec<(Vec<NativeValue>, InstanceRef)> = instance
            .borrow()
            .many(name)
            .into_iter()
            .map(|child| {
                let key = pk_names.iter().map(|pk| child.borrow().value(pk)).collect();
                (key, child)
            })
            .collect();
        let mut matched = vec![false; existing.len()];

        let mut children = Vec::with_capacity(items.len());
        for item in items {
            let nested = item.as_map().ok_or_else(|| expected(name, "a map", item))?;
            let key: Vec<NativeValue> = pk_names
                .iter()
                .map(|pk| nested.get(pk).cloned().unwrap_or_default())
                .collect();
            let found = if pk_names.is_empty() || key.iter().any(NativeValue::is_null) {
                None
            } else {
                existing
                    .iter()
                    .enumerate()
                    .position(|(i, (existing_key, _))| !matched[i] && *existing_key == key)
            };
            match found {
                Some(i) => {
                    matched[i] = true;
                    let child = &existing[i].1;
                    trace!(relationship = name, ?key, "updating child");
                    self.update(child, nested, node, root, lookup, target)?;
                    children.push(Rc::clone(child));
                }
                None => {
                    trace!(relationship = name, "creating child");
                    let created = self.creator.create(nested, node, root, lookup, target)?;
                    children.push(created.into_ref());
                }
            }
        }

        let dropped = matched.iter().filter(|m| !**m).count();
        debug!(
            relationship = name,
            kept = children.len(),
            dropped,
            "reconciled collection"
        );
        instance.borrow_mut().set(name, Attribute::Many(children));
        Ok(())
    }
}

/// Apply `params` onto `instance` and its related instances.
///
/// The instance must be of the entity titled by `schema`.
pub fn apply_changes(
    instance: &InstanceRef,
    params: &PlainDict,
    schema: &Schema,
    lookup: &mut ModelLookup<'_>,
) -> SchemaResult<()> {
    let title = schema
        .title
        .as_deref()
        .ok_or_else(|| SchemaError::Value("schema has no title naming its entity".to_string()))?;
    let root = schema.to_value();
    let node = root
        .as_object()
        .ok_or_else(|| SchemaError::NotImplemented("schema is not an object".to_string()))?;

    let entity = lookup.resolve(title)?;
    UpdateObjectWalker::new().update(instance, params, node, &root, lookup, entity)?;
    lookup.pop();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::factory::{BuildOptions, SchemaFactory};
    use crate::fixtures;
    use crate::walker::WalkerKind;
    use relschema_core::{Instance, Registry};

    fn schema(registry: &Registry, entity: &str) -> Schema {
        SchemaFactory::new(WalkerKind::Structural)
            .build(registry, entity, BuildOptions::new().depth(2))
            .unwrap()
    }

    fn dict(pairs: Vec<(&str, NativeValue)>) -> PlainDict {
        pairs.into_iter().map(|(k, v)| (k.to_string(), v)).collect()
    }

    fn child(pk: i64, name: &str) -> NativeValue {
        NativeValue::Map(dict(vec![("pk", pk.into()), ("name", name.into())]))
    }

    fn parent_with_children() -> InstanceRef {
        let a0 = Instance::new("A0").with("pk", 1).with("name", "a0").into_ref();
        let children = ["a", "b", "c"]
            .iter()
            .zip(1..)
            .map(|(name, pk)| {
                Instance::new("A1")
                    .with("pk", pk)
                    .with("name", *name)
                    .with_one("parent", Rc::clone(&a0))
                    .into_ref()
            })
            .collect();
        a0.borrow_mut().set("children", Attribute::Many(children));
        a0
    }

    fn names(instance: &InstanceRef) -> Vec<NativeValue> {
        instance
            .borrow()
            .many("children")
            .iter()
            .map(|c| c.borrow().value("name"))
            .collect()
    }

    #[test]
    fn test_scalars_are_overwritten() {
        let registry = fixtures::chain();
        let a0 = Instance::new("A0").with("pk", 1).with("name", "before").into_ref();
        let mut lookup = ModelLookup::new(&registry);

        let params = dict(vec![("name", "after".into())]);
        apply_changes(&a0, &params, &schema(&registry, "A0"), &mut lookup).unwrap();
        assert_eq!(a0.borrow().value("name"), NativeValue::from("after"));
        assert_eq!(a0.borrow().value("pk"), NativeValue::Int(1));
    }

    #[test]
    fn test_collections_are_reconciled_by_primary_key() {
        let registry = fixtures::chain();
        let a0 = parent_with_children();
        let kept = a0.borrow().many("children")[0].clone();
        let params = dict(vec![(
            "children",
            NativeValue::List(vec![
                child(1, "a"),
                child(2, "update"),
                NativeValue::Map(dict(vec![("name", "create".into())])),
            ]),
        )]);
        let mut lookup = ModelLookup::new(&registry);

        apply_changes(&a0, &params, &schema(&registry, "A0"), &mut lookup).unwrap();

        assert_eq!(
            names(&a0),
            [NativeValue::from("a"), NativeValue::from("update"), NativeValue::from("create")]
        );
        let children = a0.borrow().many("children");
        assert!(Rc::ptr_eq(&children[0], &kept));
        assert_eq!(children[2].borrow().entity(), "A1");
        assert!(children[2].borrow().value("pk").is_null());
    }

    #[test]
    fn test_collection_follows_parameter_order() {
        let registry = fixtures::chain();
        let a0 = parent_with_children();
        let params = dict(vec![(
            "children",
            NativeValue::List(vec![child(3, "c"), child(1, "a")]),
        )]);
        let mut lookup = ModelLookup::new(&registry);

        apply_changes(&a0, &params, &schema(&registry, "A0"), &mut lookup).unwrap();
        assert_eq!(names(&a0), [NativeValue::from("c"), NativeValue::from("a")]);
    }

    #[test]
    fn test_update_through_many_to_one_is_shared() {
        let registry = fixtures::chain();
        let a0 = parent_with_children();
        let a1 = a0.borrow().many("children")[0].clone();
        let parent = NativeValue::Map(dict(vec![("name", "renamed".into())]));
        let params = dict(vec![("parent", parent)]);
        let mut lookup = ModelLookup::new(&registry);

        apply_changes(&a1, &params, &schema(&registry, "A1"), &mut lookup).unwrap();
        assert_eq!(a0.borrow().value("name"), NativeValue::from("renamed"));
        assert!(Rc::ptr_eq(&a1.borrow().one("parent").unwrap(), &a0));
    }

    #[test]
    fn test_many_to_many_placeholder_is_not_overwritten() {
        use crate::decision::UseForeignKeyIfPossibleDecision;

        let registry = fixtures::company();
        let schema = SchemaFactory::new(WalkerKind::Structural)
            .with_decision(UseForeignKeyIfPossibleDecision)
            .build(&registry, "Team", BuildOptions::new())
            .unwrap();
        let person = Instance::new("Person").with("id", 7).into_ref();
        let team = Instance::new("Team")
            .with("id", 1)
            .with_many("tags", vec![Rc::clone(&person)])
            .into_ref();
        let params = dict(vec![("tags", NativeValue::List(vec!["7".into()]))]);
        let mut lookup = ModelLookup::new(&registry);

        let err = apply_changes(&team, &params, &schema, &mut lookup).unwrap_err();
        assert!(matches!(err, SchemaError::Value(ref msg) if msg.contains("Team.tags")));
        assert!(matches!(team.borrow().get("tags"), Some(Attribute::Many(_))));
        assert!(Rc::ptr_eq(&team.borrow().many("tags")[0], &person));
    }

    #[test]
    fn test_wrong_entity_is_a_runtime_mismatch() {
        let registry = fixtures::chain();
        let a1 = Instance::new("A1").into_ref();
        let mut lookup = ModelLookup::new(&registry);
        let err = apply_changes(&a1, &PlainDict::new(), &schema(&registry, "A0"), &mut lookup)
            .unwrap_err();
        assert!(matches!(
            err,
            SchemaError::RuntimeMismatch { ref expected, ref actual }
                if expected == "A0" && actual == "A1"
        ));
    }
}
