use super::{Shape, is_related, properties};
use relschema_core::{Instance, NativeValue, PlainDict, Schema, SchemaError, SchemaResult};
use serde_json::{Map, Value};

/// Project `instance` onto the properties of `schema`.
///
/// Scalars are copied as native values (unset ones as null), nested objects
/// become maps and collections become lists of maps. An unset many-to-one
/// relationship is left out, as is a relationship whose schema is a plain
/// value.
pub fn dictify(instance: &Instance, schema: &Schema) -> SchemaResult<PlainDict> {
    let root = schema.to_value();
    let node = root
        .as_object()
        .ok_or_else(|| SchemaError::NotImplemented("schema is not an object".to_string()))?;
    dictify_node(instance, node, &root)
}

pub(crate) fn dictify_node(
    instance: &Instance,
    node: &Map<String, Value>,
    root: &Value,
) -> SchemaResult<PlainDict> {
    let mut dict = PlainDict::new();
    for (name, sub) in properties(node) {
        match Shape::of(sub, root)? {
            Shape::Scalar(_) if is_related(instance, name) => {}
            Shape::Scalar(_) => {
                dict.insert(name.clone(), instance.value(name));
            }
            Shape::One(child) => {
                if let Some(related) = instance.one(name) {
                    let nested = dictify_node(&related.borrow(), child, root)?;
                    dict.insert(name.clone(), NativeValue::Map(nested));
                }
            }
            Shape::Many(child) => {
                let items = instance
                    .many(name)
                    .iter()
                    .map(|related| {
                        dictify_node(&related.borrow(), child, root).map(NativeValue::Map)
                    })
                    .collect::<SchemaResult<Vec<_>>>()?;
                dict.insert(name.clone(), NativeValue::List(items));
            }
        }
    }
    Ok(dict)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::factory::{BuildOptions, SchemaFactory};
    use crate::fixtures;
    use crate::walker::WalkerKind;
    use chrono::{TimeZone, Utc};
    use indexmap::indexmap;

    fn schema(entity: &str) -> Schema {
        SchemaFactory::new(WalkerKind::Structural)
            .build(&fixtures::group_user(), entity, BuildOptions::new())
            .unwrap()
    }

    fn user(name: &str) -> Instance {
        Instance::new("User")
            .with("pk", 1)
            .with("name", name)
            .with("created_at", Utc.with_ymd_and_hms(2000, 1, 1, 10, 0, 0).unwrap())
    }

    #[test]
    fn test_scalars_keep_native_values_and_nulls() {
        let dict = dictify(&Instance::new("User").with("name", "foo"), &schema("User")).unwrap();
        assert_eq!(
            dict,
            indexmap! {
                "pk".to_string() => NativeValue::Null,
                "name".to_string() => NativeValue::from("foo"),
                "created_at".to_string() => NativeValue::Null,
            }
        );
    }

    #[test]
    fn test_many_to_one_becomes_a_nested_map() {
        let group = Instance::new("Group").with("pk", 1).with("name", "ravenclaw").into_ref();
        let user = user("foo").with_one("group", group);

        let dict = dictify(&user, &schema("User")).unwrap();
        let nested = dict["group"].as_map().unwrap();
        assert_eq!(nested["name"], NativeValue::from("ravenclaw"));
        assert!(nested["color"].is_null());
        assert_eq!(
            dict["created_at"],
            NativeValue::from(Utc.with_ymd_and_hms(2000, 1, 1, 10, 0, 0).unwrap())
        );
    }

    #[test]
    fn test_one_to_many_becomes_a_list_of_maps() {
        let group = Instance::new("Group")
            .with("name", "ravenclaw")
            .with_many("users", vec![user("foo").into_ref(), user("bar").into_ref()]);

        let dict = dictify(&group, &schema("Group")).unwrap();
        let NativeValue::List(users) = &dict["users"] else {
            panic!("users is not a list: {:?}", dict["users"]);
        };
        let names: Vec<_> = users
            .iter()
            .map(|u| u.as_map().unwrap()["name"].clone())
            .collect();
        assert_eq!(names, [NativeValue::from("foo"), NativeValue::from("bar")]);
    }

    #[test]
    fn test_many_to_many_placeholder_is_omitted() {
        use crate::decision::UseForeignKeyIfPossibleDecision;
        use crate::mapping::jsonify;

        let schema = SchemaFactory::new(WalkerKind::Structural)
            .with_decision(UseForeignKeyIfPossibleDecision)
            .build(&fixtures::company(), "Team", BuildOptions::new())
            .unwrap();
        let person = Instance::new("Person").with("id", 7).into_ref();
        let team = Instance::new("Team").with("id", 1).with_many("tags", vec![person]);

        let dict = dictify(&team, &schema).unwrap();
        assert!(!dict.contains_key("tags"));
        assert_eq!(dict["id"], NativeValue::Int(1));
        let json = jsonify(&team, &schema, true).unwrap();
        assert!(!json.contains_key("tags"));
    }

    #[test]
    fn test_unset_many_to_one_is_omitted() {
        let dict = dictify(&user("foo"), &schema("User")).unwrap();
        assert!(!dict.contains_key("group"));
    }
}
