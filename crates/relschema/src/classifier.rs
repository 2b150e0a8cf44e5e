//! Column type to JSON Schema type classification

use relschema_core::{Builtin, Column, ColumnType, SchemaError, SchemaResult, SchemaType, SqlType};
use std::collections::HashMap;
use tracing::trace;

/// How a type class is matched against a table keyed by class name.
///
/// Lookup order: the exact class, then (with `see_mro`) the nearest
/// ancestor present, then (with `see_impl`) the decorator's implementation
/// type using the same order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolution {
    pub see_mro: bool,
    pub see_impl: bool,
}

impl Default for Resolution {
    fn default() -> Self {
        Self {
            see_mro: true,
            see_impl: true,
        }
    }
}

impl Resolution {
    /// Resolve `ty` through `lookup`, returning the matched class name and value.
    pub fn resolve<'t, V, F>(&self, ty: &'t SqlType, lookup: &F) -> Option<(&'t str, V)>
    where
        F: Fn(&str) -> Option<V>,
    {
        let class = ty.class();
        if let Some(found) = lookup(class.name()) {
            return Some((class.name(), found));
        }
        if self.see_mro {
            for ancestor in class.ancestors() {
                if let Some(found) = lookup(ancestor) {
                    trace!(class = class.name(), ancestor, "resolved through ancestor");
                    return Some((ancestor, found));
                }
            }
        }
        if self.see_impl
            && let Some(inner) = ty.implementation()
        {
            trace!(class = class.name(), inner = inner.class().name(), "resolving implementation");
            return self.resolve(inner, lookup);
        }
        None
    }
}

/// Maps column types to JSON Schema primitive types
#[derive(Debug, Clone)]
pub struct Classifier {
    mapping: HashMap<String, SchemaType>,
    resolution: Resolution,
}

impl Default for Classifier {
    fn default() -> Self {
        let mut classifier = Self::empty();
        for builtin in [
            Builtin::String,
            Builtin::Text,
            Builtin::Unicode,
            Builtin::UnicodeText,
            Builtin::Enum,
            Builtin::Uuid,
            Builtin::DateTime,
            Builtin::Date,
            Builtin::Time,
            Builtin::Interval,
            Builtin::LargeBinary,
            Builtin::BigInteger,
        ] {
            classifier.insert(builtin.name(), SchemaType::String);
        }
        for builtin in [Builtin::Integer, Builtin::SmallInteger, Builtin::Numeric] {
            classifier.insert(builtin.name(), SchemaType::Integer);
        }
        classifier.insert(Builtin::Float.name(), SchemaType::Number);
        classifier.insert(Builtin::Boolean.name(), SchemaType::Boolean);
        classifier.insert(Builtin::Array.name(), SchemaType::Array);
        classifier.insert(Builtin::Json.name(), SchemaType::Object);
        classifier
    }
}

impl Classifier {
    /// A classifier with no mappings
    #[must_use]
    pub fn empty() -> Self {
        Self {
            mapping: HashMap::new(),
            resolution: Resolution::default(),
        }
    }

    /// Register a class; later registrations win
    #[must_use]
    pub fn register(mut self, class: impl Into<String>, schema_type: SchemaType) -> Self {
        self.insert(class, schema_type);
        self
    }

    pub fn insert(&mut self, class: impl Into<String>, schema_type: SchemaType) {
        self.mapping.insert(class.into(), schema_type);
    }

    #[must_use]
    pub fn see_mro(mut self, enabled: bool) -> Self {
        self.resolution.see_mro = enabled;
        self
    }

    #[must_use]
    pub fn see_impl(mut self, enabled: bool) -> Self {
        self.resolution.see_impl = enabled;
        self
    }

    #[must_use]
    pub fn resolution(&self) -> Resolution {
        self.resolution
    }

    /// Classify a type instance
    pub fn classify(&self, ty: &SqlType) -> SchemaResult<SchemaType> {
        self.resolution
            .resolve(ty, &|name| self.mapping.get(name).copied())
            .map(|(_, schema_type)| schema_type)
            .ok_or_else(|| SchemaError::Classification {
                value: ty.to_string(),
                class: ty.class().name().to_string(),
            })
    }

    /// Classify a column's type; bare classes are not supported
    pub fn classify_column(&self, column: &Column) -> SchemaResult<SchemaType> {
        match column.column_type() {
            ColumnType::Instance(ty) => self.classify(ty),
            ColumnType::Raw(class) => Err(SchemaError::NotImplemented(format!(
                "column `{}` is typed with the bare class {class}",
                column.name()
            ))),
        }
    }
}
