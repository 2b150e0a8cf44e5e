//! Conversion between live instances and plain dictionaries, driven by a built schema
//!
//! Every conversion walks the `properties` of a schema document. A property is
//! a scalar, a nested object (a `$ref` or an inline `properties` table) or an
//! array of nested objects; references are resolved against the document root.

mod apply;
mod create;
pub mod format;
mod json;
mod lookup;
mod plain;

pub use apply::{UpdateObjectWalker, apply_changes};
pub use create::{CreateObjectWalker, objectify};
pub use json::{jsonify, jsonify_dict, normalize, prepare};
pub use lookup::ModelLookup;
pub use plain::dictify;

use relschema_core::{Attribute, Instance, SchemaError, SchemaResult};
use serde_json::{Map, Value};

/// Resolve a `#/`-rooted `$ref` of `schema` within `root`
pub fn get_reference<'s>(schema: &Value, root: &'s Value) -> SchemaResult<&'s Value> {
    let reference = schema
        .get("$ref")
        .and_then(Value::as_str)
        .ok_or_else(|| SchemaError::NotImplemented(format!("expected a `$ref` in {schema}")))?;
    let Some(path) = reference.strip_prefix("#/") else {
        return Err(SchemaError::NotImplemented(format!(
            "only local references are resolvable, got `{reference}`"
        )));
    };
    path.split('/').try_fold(root, |node, key| {
        node.get(key).ok_or_else(|| {
            SchemaError::NotImplemented(format!("unresolvable reference `{reference}`"))
        })
    })
}

/// How one property of a schema is mapped
#[derive(Debug, Clone, Copy)]
pub(crate) enum Shape<'s> {
    /// A column value, with its subschema
    Scalar(&'s Map<String, Value>),
    /// A single nested object, with the object schema
    One(&'s Map<String, Value>),
    /// A list of nested objects, with the item schema
    Many(&'s Map<String, Value>),
}

impl<'s> Shape<'s> {
    pub(crate) fn of(sub: &'s Value, root: &'s Value) -> SchemaResult<Self> {
        let map = object(sub)?;
        if map.contains_key("$ref") {
            return Ok(Shape::One(object(get_reference(sub, root)?)?));
        }
        if map.get("type").and_then(Value::as_str) == Some("array")
            && let Some(items) = map.get("items")
            && is_nested(items)
        {
            let node = if items.get("$ref").is_some() {
                get_reference(items, root)?
            } else {
                items
            };
            return Ok(Shape::Many(object(node)?));
        }
        if map.contains_key("properties") {
            return Ok(Shape::One(map));
        }
        Ok(Shape::Scalar(map))
    }
}

fn is_nested(items: &Value) -> bool {
    items.get("$ref").is_some() || items.get("properties").is_some()
}

fn object(value: &Value) -> SchemaResult<&Map<String, Value>> {
    value
        .as_object()
        .ok_or_else(|| SchemaError::NotImplemented(format!("subschema is not an object: {value}")))
}

/// Whether `instance` holds `name` as a relationship rather than a value
pub(crate) fn is_related(instance: &Instance, name: &str) -> bool {
    matches!(instance.get(name), Some(Attribute::One(_) | Attribute::Many(_)))
}

/// A relationship whose schema is a plain value, such as a many-to-many placeholder
pub(crate) fn scalar_relationship(entity: &str, name: &str) -> SchemaError {
    SchemaError::Value(format!(
        "`{entity}.{name}` is a relationship rendered as a value and cannot be mapped"
    ))
}

/// Properties of an object schema, in document order
pub(crate) fn properties(node: &Map<String, Value>) -> impl Iterator<Item = (&String, &Value)> {
    node.get("properties")
        .and_then(Value::as_object)
        .into_iter()
        .flatten()
}

/// Required property names of an object schema
pub(crate) fn required(node: &Map<String, Value>) -> impl Iterator<Item = &str> {
    node.get("required")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter_map(Value::as_str)
}
