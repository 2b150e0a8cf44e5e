//! Live model instances and native attribute values

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use indexmap::IndexMap;
use serde_json::Value;
use std::cell::RefCell;
use std::rc::Rc;
use uuid::Uuid;

/// Shared handle to a live instance
pub type InstanceRef = Rc<RefCell<Instance>>;

/// Schema-shaped dict of native values
pub type PlainDict = IndexMap<String, NativeValue>;

/// A native (not JSON-transportable) attribute value
#[derive(Debug, Clone, PartialEq, Default)]
pub enum NativeValue {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    DateTime(DateTime<Utc>),
    Date(NaiveDate),
    Time(NaiveTime),
    Uuid(Uuid),
    /// Opaque JSON document
    Json(Value),
    List(Vec<NativeValue>),
    Map(PlainDict),
}

impl NativeValue {
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, NativeValue::Null)
    }

    /// Variant name, for error messages
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::String(_) => "string",
            Self::DateTime(_) => "datetime",
            Self::Date(_) => "date",
            Self::Time(_) => "time",
            Self::Uuid(_) => "uuid",
            Self::Json(_) => "json",
            Self::List(_) => "list",
            Self::Map(_) => "map",
        }
    }

    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            NativeValue::String(s) => Some(s),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_map(&self) -> Option<&PlainDict> {
        match self {
            NativeValue::Map(map) => Some(map),
            _ => None,
        }
    }
}

macro_rules! native_from {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for NativeValue {
                fn from(value: $ty) -> Self {
                    NativeValue::$variant(value.into())
                }
            }
        )*
    };
}

native_from! {
    bool => Bool,
    i32 => Int,
    i64 => Int,
    f64 => Float,
    String => String,
    &str => String,
    DateTime<Utc> => DateTime,
    NaiveDate => Date,
    NaiveTime => Time,
    Uuid => Uuid,
    Value => Json,
    Vec<NativeValue> => List,
    PlainDict => Map,
}

impl<T: Into<NativeValue>> From<Option<T>> for NativeValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(NativeValue::Null, Into::into)
    }
}

/// An attribute slot on an instance
#[derive(Debug, Clone)]
pub enum Attribute {
    Value(NativeValue),
    /// Scalar relationship
    One(Option<InstanceRef>),
    /// Collection relationship
    Many(Vec<InstanceRef>),
}

/// A live model object: entity name plus ordered attributes
#[derive(Debug, Clone, Default)]
pub struct Instance {
    entity: String,
    attributes: IndexMap<String, Attribute>,
}

impl Instance {
    pub fn new(entity: impl Into<String>) -> Self {
        Self {
            entity: entity.into(),
            attributes: IndexMap::new(),
        }
    }

    /// Set a scalar attribute
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<NativeValue>) -> Self {
        self.set_value(key, value);
        self
    }

    /// Set a scalar relationship
    #[must_use]
    pub fn with_one(mut self, key: impl Into<String>, related: InstanceRef) -> Self {
        self.attributes
            .insert(key.into(), Attribute::One(Some(related)));
        self
    }

    /// Set a collection relationship
    #[must_use]
    pub fn with_many(mut self, key: impl Into<String>, related: Vec<InstanceRef>) -> Self {
        self.attributes.insert(key.into(), Attribute::Many(related));
        self
    }

    #[must_use]
    pub fn into_ref(self) -> InstanceRef {
        Rc::new(RefCell::new(self))
    }

    /// Entity name
    #[must_use]
    pub fn entity(&self) -> &str {
        &self.entity
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Attribute> {
        self.attributes.get(key)
    }

    /// Scalar value of `key`; unset or non-scalar attributes read as null
    #[must_use]
    pub fn value(&self, key: &str) -> NativeValue {
        match self.attributes.get(key) {
            Some(Attribute::Value(value)) => value.clone(),
            _ => NativeValue::Null,
        }
    }

    /// The related instance of a scalar relationship
    #[must_use]
    pub fn one(&self, key: &str) -> Option<InstanceRef> {
        match self.attributes.get(key) {
            Some(Attribute::One(related)) => related.clone(),
            _ => None,
        }
    }

    /// The related instances of a collection relationship
    #[must_use]
    pub fn many(&self, key: &str) -> Vec<InstanceRef> {
        match self.attributes.get(key) {
            Some(Attribute::Many(related)) => related.clone(),
            _ => Vec::new(),
        }
    }

    pub fn set(&mut self, key: impl Into<String>, attribute: Attribute) {
        self.attributes.insert(key.into(), attribute);
    }

    pub fn set_value(&mut self, key: impl Into<String>, value: impl Into<NativeValue>) {
        self.attributes
            .insert(key.into(), Attribute::Value(value.into()));
    }

    /// Attribute keys in insertion order
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.attributes.keys().map(String::as_str)
    }
}
