use super::plain::dictify_node;
use super::format::{parse_date, parse_time};
use super::{Shape, properties};
use chrono::{DateTime, SecondsFormat, Utc};
use relschema_core::{Instance, NativeValue, PlainDict, Schema, SchemaError, SchemaResult};
use serde_json::{Map, Number, Value};
use uuid::Uuid;

fn root_node(root: &Value) -> SchemaResult<&Map<String, Value>> {
    root.as_object()
        .ok_or_else(|| SchemaError::NotImplemented("schema is not an object".to_string()))
}

fn keyword<'s>(sub: &'s Map<String, Value>, name: &str) -> Option<&'s str> {
    sub.get(name).and_then(Value::as_str)
}

/// [`dictify`](super::dictify) with every value coerced to its JSON form
pub fn jsonify(
    instance: &Instance,
    schema: &Schema,
    verbose: bool,
) -> SchemaResult<Map<String, Value>> {
    let root = schema.to_value();
    let node = root_node(&root)?;
    let plain = dictify_node(instance, node, &root)?;
    json_node(&plain, node, &root, verbose)
}

/// Coerce an already dictified mapping to its JSON form.
///
/// Null leaves are dropped unless `verbose` is set.
pub fn jsonify_dict(
    plain: &PlainDict,
    schema: &Schema,
    verbose: bool,
) -> SchemaResult<Map<String, Value>> {
    let root = schema.to_value();
    json_node(plain, root_node(&root)?, &root, verbose)
}

fn json_node(
    plain: &PlainDict,
    node: &Map<String, Value>,
    root: &Value,
    verbose: bool,
) -> SchemaResult<Map<String, Value>> {
    let mut out = Map::new();
    for (name, sub) in properties(node) {
        let Some(value) = plain.get(name) else {
            continue;
        };
        if value.is_null() {
            if verbose {
                out.insert(name.clone(), Value::Null);
            }
            continue;
        }
        let converted = match Shape::of(sub, root)? {
            Shape::Scalar(sub) => to_json(name, value, sub)?,
            Shape::One(child) => {
                let nested = value.as_map().ok_or_else(|| {
                    SchemaError::conversion(
                        name.as_str(),
                        format!("expected a map, got {}", value.kind()),
                    )
                })?;
                Value::Object(json_node(nested, child, root, verbose)?)
            }
            Shape::Many(child) => {
                let NativeValue::List(items) = value else {
                    return Err(SchemaError::conversion(
                        name.as_str(),
                        format!("expected a list, got {}", value.kind()),
                    ));
                };
                let mut converted = Vec::with_capacity(items.len());
                for item in items {
                    let nested = item.as_map().ok_or_else(|| {
                        SchemaError::conversion(
                            name.as_str(),
                            format!("expected a map, got {}", item.kind()),
                        )
                    })?;
                    converted.push(Value::Object(json_node(nested, child, root, verbose)?));
                }
                Value::Array(converted)
            }
        };
        out.insert(name.clone(), converted);
    }
    Ok(out)
}

fn to_json(name: &str, value: &NativeValue, sub: &Map<String, Value>) -> SchemaResult<Value> {
    let schema_type = keyword(sub, "type").unwrap_or_default();
    let format = keyword(sub, "format");
    let converted = match (schema_type, format, value) {
        (_, _, NativeValue::Null) => Value::Null,
        ("string", Some("date-time"), NativeValue::DateTime(dt)) => {
            Value::String(dt.to_rfc3339_opts(SecondsFormat::AutoSi, false))
        }
        ("string", Some("date"), NativeValue::Date(date)) => {
            Value::String(date.format("%Y-%m-%d").to_string())
        }
        ("string", Some("time"), NativeValue::Time(time)) => {
            Value::String(format!("{}Z", time.format("%H:%M:%S%.f")))
        }
        ("string", Some("uuid") | None, NativeValue::Uuid(uuid)) => Value::String(uuid.to_string()),
        ("string", _, NativeValue::String(s)) => Value::String(s.clone()),
        ("string", None, NativeValue::Int(i)) => Value::String(i.to_string()),
        ("integer" | "number", _, NativeValue::Int(i)) => Value::from(*i),
        ("number", _, NativeValue::Float(f)) => Number::from_f64(*f)
            .map(Value::Number)
            .ok_or_else(|| SchemaError::conversion(name, format!("{f} is not a finite number")))?,
        ("boolean", _, NativeValue::Bool(b)) => Value::Bool(*b),
        ("object" | "array", _, NativeValue::Json(doc)) => doc.clone(),
        ("array", _, NativeValue::List(items)) => {
            let item_schema = sub.get("items").and_then(Value::as_object);
            let mut converted = Vec::with_capacity(items.len());
            for item in items {
                converted.push(match item_schema {
                    Some(item_schema) => to_json(name, item, item_schema)?,
                    None => untyped(name, item)?,
                });
            }
            Value::Array(converted)
        }
        (schema_type, format, value) => {
            return Err(SchemaError::conversion(
                name,
                format!(
                    "no conversion from {} to (type={schema_type}, format={})",
                    value.kind(),
                    format.unwrap_or("none")
                ),
            ));
        }
    };
    Ok(converted)
}

fn untyped(name: &str, value: &NativeValue) -> SchemaResult<Value> {
    match value {
        NativeValue::Null => Ok(Value::Null),
        NativeValue::Bool(b) => Ok(Value::Bool(*b)),
        NativeValue::Int(i) => Ok(Value::from(*i)),
        NativeValue::String(s) => Ok(Value::String(s.clone())),
        NativeValue::Json(doc) => Ok(doc.clone()),
        other => Err(SchemaError::conversion(
            name,
            format!("array item of kind {} has no item schema", other.kind()),
        )),
    }
}

/// Parse a JSON-form mapping back into native values using `schema`
pub fn prepare(json: &Map<String, Value>, schema: &Schema) -> SchemaResult<PlainDict> {
    let root = schema.to_value();
    prepare_node(json, root_node(&root)?, &root)
}

/// Alias of [`prepare`]
pub fn normalize(json: &Map<String, Value>, schema: &Schema) -> SchemaResult<PlainDict> {
    prepare(json, schema)
}

fn prepare_node(
    json: &Map<String, Value>,
    node: &Map<String, Value>,
    root: &Value,
) -> SchemaResult<PlainDict> {
    let mut plain = PlainDict::new();
    for (name, sub) in properties(node) {
        let Some(value) = json.get(name) else {
            continue;
        };
        let prepared = match (Shape::of(sub, root)?, value) {
            (_, Value::Null) => NativeValue::Null,
            (Shape::Scalar(sub), value) => from_json(name, value, sub)?,
            (Shape::One(child), Value::Object(nested)) => {
                NativeValue::Map(prepare_node(nested, child, root)?)
            }
            (Shape::Many(child), Value::Array(items)) => {
                let mut prepared = Vec::with_capacity(items.len());
                for item in items {
                    let nested = item.as_object().ok_or_else(|| {
                        SchemaError::conversion(
                            name.as_str(),
                            format!("expected an object, got {item}"),
                        )
                    })?;
                    prepared.push(NativeValue::Map(prepare_node(nested, child, root)?));
                }
                NativeValue::List(prepared)
            }
            (_, value) => {
                return Err(SchemaError::conversion(
                    name.as_str(),
                    format!("unexpected value {value}"),
                ));
            }
        };
        plain.insert(name.clone(), prepared);
    }
    Ok(plain)
}

fn from_json(name: &str, value: &Value, sub: &Map<String, Value>) -> SchemaResult<NativeValue> {
    let schema_type = keyword(sub, "type").unwrap_or_default();
    let format = keyword(sub, "format");
    let invalid =
        |what: &str| SchemaError::conversion(name, format!("{value} is not a valid {what}"));
    let prepared = match (schema_type, format, value) {
        (_, _, Value::Null) => NativeValue::Null,
        ("string", Some("date-time"), Value::String(s)) => DateTime::parse_from_rfc3339(s)
            .map(|dt| NativeValue::DateTime(dt.with_timezone(&Utc)))
            .map_err(|_| invalid("date-time"))?,
        ("string", Some("date"), Value::String(s)) => {
            parse_date(s).map(NativeValue::Date).ok_or_else(|| invalid("date"))?
        }
        ("string", Some("time"), Value::String(s)) => {
            parse_time(s).map(NativeValue::Time).ok_or_else(|| invalid("time"))?
        }
        ("string", Some("uuid"), Value::String(s)) => Uuid::parse_str(s)
            .map(NativeValue::Uuid)
            .map_err(|_| invalid("uuid"))?,
        ("string", _, Value::String(s)) => NativeValue::String(s.clone()),
        ("integer", _, Value::Number(n)) => n
            .as_i64()
            .map(NativeValue::Int)
            .ok_or_else(|| invalid("integer"))?,
        ("number", _, Value::Number(n)) => n
            .as_f64()
            .map(NativeValue::Float)
            .ok_or_else(|| invalid("number"))?,
        ("boolean", _, Value::Bool(b)) => NativeValue::Bool(*b),
        ("object", _, doc) => NativeValue::Json(doc.clone()),
        ("array", _, Value::Array(items)) => match sub.get("items").and_then(Value::as_object) {
            Some(item_schema) => NativeValue::List(
                items
                    .iter()
                    .map(|item| from_json(name, item, item_schema))
                    .collect::<SchemaResult<_>>()?,
            ),
            None => NativeValue::Json(value.clone()),
        },
        (schema_type, format, _) => {
            return Err(SchemaError::conversion(
                name,
                format!(
                    "no conversion from {value} to (type={schema_type}, format={})",
                    format.unwrap_or("none")
                ),
            ));
        }
    };
    Ok(prepared)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::factory::{BuildOptions, SchemaFactory};
    use crate::fixtures;
    use crate::walker::WalkerKind;
    use chrono::{NaiveDate, NaiveTime, TimeZone};
    use serde_json::json;

    fn schema(registry: &relschema_core::Registry, entity: &str) -> Schema {
        SchemaFactory::new(WalkerKind::Structural)
            .build(registry, entity, BuildOptions::new())
            .unwrap()
    }

    fn event() -> Instance {
        Instance::new("Event")
            .with("id", 1)
            .with("title", "launch")
            .with("ratio", 0.5)
            .with("active", true)
            .with("starts_at", Utc.with_ymd_and_hms(2000, 1, 1, 10, 0, 0).unwrap())
            .with("day", NaiveDate::from_ymd_opt(2000, 1, 1).unwrap())
            .with("alarm", NaiveTime::from_hms_opt(7, 30, 0).unwrap())
            .with("token", Uuid::nil())
            .with("extra", json!({"k": [1, 2]}))
            .with("scores", vec![NativeValue::Int(1), NativeValue::Int(2)])
    }

    #[test]
    fn test_scalars_are_coerced_by_type_and_format() {
        let registry = fixtures::formats();
        let json = jsonify(&event(), &schema(&registry, "Event"), false).unwrap();
        assert_eq!(
            Value::Object(json),
            json!({
                "id": 1,
                "title": "launch",
                "ratio": 0.5,
                "active": true,
                "starts_at": "2000-01-01T10:00:00+00:00",
                "day": "2000-01-01",
                "alarm": "07:30:00Z",
                "token": "00000000-0000-0000-0000-000000000000",
                "extra": {"k": [1, 2]},
                "scores": [1, 2],
            })
        );
    }

    #[test]
    fn test_nulls_are_dropped_unless_verbose() {
        let registry = fixtures::group_user();
        let user = Instance::new("User").with("name", "foo");
        let schema = schema(&registry, "User");

        assert_eq!(Value::Object(jsonify(&user, &schema, false).unwrap()), json!({"name": "foo"}));
        assert_eq!(
            Value::Object(jsonify(&user, &schema, true).unwrap()),
            json!({"pk": null, "name": "foo", "created_at": null})
        );
    }

    #[test]
    fn test_nested_objects_are_converted() {
        let registry = fixtures::group_user();
        let group = Instance::new("Group")
            .with("name", "ravenclaw")
            .with_many(
                "users",
                vec![Instance::new("User").with("pk", 1).with("name", "foo").into_ref()],
            );
        let json = jsonify(&group, &schema(&registry, "Group"), false).unwrap();
        assert_eq!(json["users"], json!([{"pk": 1, "name": "foo"}]));
    }

    #[test]
    fn test_mismatched_values_fail_to_convert() {
        let registry = fixtures::group_user();
        let user = Instance::new("User").with("pk", "not a number");
        let err = jsonify(&user, &schema(&registry, "User"), false).unwrap_err();
        assert!(matches!(err, SchemaError::Conversion { ref name, .. } if name == "pk"));
    }

    #[test]
    fn test_prepare_parses_formatted_strings() {
        let registry = fixtures::formats();
        let schema = schema(&registry, "Event");
        let json = jsonify(&event(), &schema, false).unwrap();

        let plain = prepare(&json, &schema).unwrap();
        assert_eq!(
            plain["starts_at"],
            NativeValue::from(Utc.with_ymd_and_hms(2000, 1, 1, 10, 0, 0).unwrap())
        );
        assert_eq!(plain["day"], NativeValue::from(NaiveDate::from_ymd_opt(2000, 1, 1).unwrap()));
        assert_eq!(plain["alarm"], NativeValue::from(NaiveTime::from_hms_opt(7, 30, 0).unwrap()));
        assert_eq!(plain["token"], NativeValue::from(Uuid::nil()));
        assert_eq!(plain["ratio"], NativeValue::Float(0.5));
        assert_eq!(normalize(&json, &schema).unwrap(), plain);
    }

    #[test]
    fn test_prepare_rejects_malformed_strings() {
        let registry = fixtures::formats();
        let schema = schema(&registry, "Event");
        let json = json!({"day": "2021-02-29"});
        let err = prepare(json.as_object().unwrap(), &schema).unwrap_err();
        assert!(matches!(err, SchemaError::Conversion { ref name, .. } if name == "day"));
    }
}
