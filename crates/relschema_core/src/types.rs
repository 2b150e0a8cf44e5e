//! Column type classes and type instances
//!
//! A [`TypeClass`] stands for a column type class together with its
//! inheritance chain, so lookups can fall back from a custom subclass to the
//! first registered ancestor. A [`SqlType`] is a configured instance of a
//! class (length, enum members, array item type) and may wrap an
//! implementation type the way a type decorator delegates to its `impl`.

use std::fmt;

/// Built-in column type classes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Builtin {
    String,
    Text,
    Unicode,
    UnicodeText,
    Enum,
    Integer,
    SmallInteger,
    BigInteger,
    Numeric,
    Float,
    DateTime,
    Date,
    Time,
    Interval,
    LargeBinary,
    Boolean,
    Array,
    Json,
    Uuid,
}

impl Builtin {
    /// Class name used as the lookup key
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::String => "String",
            Self::Text => "Text",
            Self::Unicode => "Unicode",
            Self::UnicodeText => "UnicodeText",
            Self::Enum => "Enum",
            Self::Integer => "Integer",
            Self::SmallInteger => "SmallInteger",
            Self::BigInteger => "BigInteger",
            Self::Numeric => "Numeric",
            Self::Float => "Float",
            Self::DateTime => "DateTime",
            Self::Date => "Date",
            Self::Time => "Time",
            Self::Interval => "Interval",
            Self::LargeBinary => "LargeBinary",
            Self::Boolean => "Boolean",
            Self::Array => "ARRAY",
            Self::Json => "JSON",
            Self::Uuid => "UUID",
        }
    }

    /// Direct base class, if any
    #[must_use]
    pub const fn parent(self) -> Option<Builtin> {
        match self {
            Self::Text | Self::Unicode | Self::Enum => Some(Self::String),
            Self::UnicodeText => Some(Self::Text),
            Self::SmallInteger | Self::BigInteger => Some(Self::Integer),
            Self::Float => Some(Self::Numeric),
            _ => None,
        }
    }
}

/// A column type class and its ancestors, nearest first.
///
/// The implicit top-level type-engine base is never part of the chain.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TypeClass {
    name: String,
    ancestors: Vec<String>,
}

impl TypeClass {
    /// A class with no registered ancestors
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ancestors: Vec::new(),
        }
    }

    /// A class deriving from `parent`
    pub fn subclass(name: impl Into<String>, parent: &TypeClass) -> Self {
        let mut ancestors = Vec::with_capacity(parent.ancestors.len() + 1);
        ancestors.push(parent.name.clone());
        ancestors.extend(parent.ancestors.iter().cloned());
        Self {
            name: name.into(),
            ancestors,
        }
    }

    /// The class of a built-in type
    #[must_use]
    pub fn builtin(builtin: Builtin) -> Self {
        match builtin.parent() {
            Some(parent) => Self::subclass(builtin.name(), &Self::builtin(parent)),
            None => Self::new(builtin.name()),
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Ancestors, nearest first, excluding the class itself
    pub fn ancestors(&self) -> impl Iterator<Item = &str> {
        self.ancestors.iter().map(String::as_str)
    }

    /// Whether this class is `name` or derives from it
    #[must_use]
    pub fn is_a(&self, name: &str) -> bool {
        self.name == name || self.ancestors.iter().any(|a| a == name)
    }
}

impl fmt::Display for TypeClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// A configured column type instance
#[derive(Debug, Clone, PartialEq)]
pub struct SqlType {
    class: TypeClass,
    length: Option<usize>,
    enums: Vec<String>,
    item_type: Option<Box<SqlType>>,
    implementation: Option<Box<SqlType>>,
}

impl SqlType {
    /// An instance of `class` with no parameters
    #[must_use]
    pub fn of(class: TypeClass) -> Self {
        Self {
            class,
            length: None,
            enums: Vec::new(),
            item_type: None,
            implementation: None,
        }
    }

    /// An instance of a built-in class with no parameters
    #[must_use]
    pub fn builtin(builtin: Builtin) -> Self {
        Self::of(TypeClass::builtin(builtin))
    }

    /// `String(length)`
    #[must_use]
    pub fn string(length: usize) -> Self {
        Self::builtin(Builtin::String).with_length(length)
    }

    /// `String` without a length
    #[must_use]
    pub fn unbounded_string() -> Self {
        Self::builtin(Builtin::String)
    }

    #[must_use]
    pub fn text() -> Self {
        Self::builtin(Builtin::Text)
    }

    #[must_use]
    pub fn integer() -> Self {
        Self::builtin(Builtin::Integer)
    }

    #[must_use]
    pub fn big_integer() -> Self {
        Self::builtin(Builtin::BigInteger)
    }

    #[must_use]
    pub fn float() -> Self {
        Self::builtin(Builtin::Float)
    }

    #[must_use]
    pub fn boolean() -> Self {
        Self::builtin(Builtin::Boolean)
    }

    #[must_use]
    pub fn datetime() -> Self {
        Self::builtin(Builtin::DateTime)
    }

    #[must_use]
    pub fn date() -> Self {
        Self::builtin(Builtin::Date)
    }

    #[must_use]
    pub fn time() -> Self {
        Self::builtin(Builtin::Time)
    }

    #[must_use]
    pub fn json() -> Self {
        Self::builtin(Builtin::Json)
    }

    #[must_use]
    pub fn uuid() -> Self {
        Self::builtin(Builtin::Uuid)
    }

    /// `Enum(*members)`; its length is the longest member
    pub fn enumeration<I, S>(members: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let enums: Vec<String> = members.into_iter().map(Into::into).collect();
        let length = enums.iter().map(|e| e.chars().count()).max();
        Self {
            length,
            enums,
            ..Self::builtin(Builtin::Enum)
        }
    }

    /// `ARRAY(item_type)`
    #[must_use]
    pub fn array(item_type: SqlType) -> Self {
        Self {
            item_type: Some(Box::new(item_type)),
            ..Self::builtin(Builtin::Array)
        }
    }

    /// A decorator of `class` delegating to an implementation instance
    #[must_use]
    pub fn decorator(class: TypeClass, implementation: SqlType) -> Self {
        Self {
            implementation: Some(Box::new(implementation)),
            ..Self::of(class)
        }
    }

    /// A decorator whose implementation is produced by a factory at construction
    pub fn decorator_with<F>(class: TypeClass, factory: F) -> Self
    where
        F: FnOnce() -> SqlType,
    {
        Self::decorator(class, factory())
    }

    #[must_use]
    pub fn with_length(mut self, length: usize) -> Self {
        self.length = Some(length);
        self
    }

    #[must_use]
    pub fn class(&self) -> &TypeClass {
        &self.class
    }

    /// The wrapped implementation type of a decorator
    #[must_use]
    pub fn implementation(&self) -> Option<&SqlType> {
        self.implementation.as_deref()
    }

    /// Length, delegating to the implementation when unset
    #[must_use]
    pub fn length(&self) -> Option<usize> {
        self.length
            .or_else(|| self.implementation().and_then(SqlType::length))
    }

    /// Enum members, delegating to the implementation when empty
    #[must_use]
    pub fn enums(&self) -> &[String] {
        match self.implementation() {
            Some(inner) if self.enums.is_empty() => inner.enums(),
            _ => &self.enums,
        }
    }

    /// Array item type, delegating to the implementation when unset
    #[must_use]
    pub fn item_type(&self) -> Option<&SqlType> {
        self.item_type
            .as_deref()
            .or_else(|| self.implementation().and_then(SqlType::item_type))
    }

    /// Whether this is an array type, directly or through its implementation
    #[must_use]
    pub fn is_array(&self) -> bool {
        self.class.is_a(Builtin::Array.name())
            || self.implementation().is_some_and(SqlType::is_array)
    }
}

impl fmt::Display for SqlType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.class)?;
        if let Some(length) = self.length {
            write!(f, "length={length}")?;
        }
        write!(f, ")")
    }
}

/// Type attached to a column
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnType {
    /// A configured type instance
    Instance(SqlType),
    /// A bare class given where an instance was expected
    Raw(TypeClass),
}

impl From<SqlType> for ColumnType {
    fn from(value: SqlType) -> Self {
        ColumnType::Instance(value)
    }
}
