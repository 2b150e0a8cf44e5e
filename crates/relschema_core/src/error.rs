//! Error types for schema generation and object mapping

use thiserror::Error;

/// Result type alias for relschema operations
pub type SchemaResult<T> = Result<T, SchemaError>;

/// Error type for schema generation and object mapping
#[derive(Error, Debug)]
pub enum SchemaError {
    /// Include and exclude lists share at least one key
    #[error("conflict includes={includes:?}, excludes={excludes:?}")]
    Conflict {
        includes: Vec<String>,
        excludes: Vec<String>,
    },

    /// No JSON Schema type is mapped for a column type
    #[error("notfound: {value}. (cls={class})")]
    Classification { value: String, class: String },

    /// A walked property is neither column-like nor relationship-like
    #[error("cannot decide how to render property `{key}` ({kind})")]
    Decision { key: String, kind: String },

    /// Unsupported raw column type or `$ref` syntax
    #[error("not implemented: {0}")]
    NotImplemented(String),

    /// Override paths that never matched a property
    #[error("invalid overrides: {0:?}")]
    InvalidOverrides(Vec<String>),

    /// Strict construction left a required field unset
    #[error("invalid status: {0}")]
    InvalidStatus(String),

    /// Resolved entity differs from the instance's entity
    #[error("runtime mismatch: expected {expected}, got {actual}")]
    RuntimeMismatch { expected: String, actual: String },

    /// Model lookup asked to descend through a non-relationship name
    #[error("value error: {0}")]
    Value(String),

    /// No coercion registered for a `(type, format)` pair, or the value does not fit it
    #[error("conversion error at `{name}`: {message}")]
    Conversion { name: String, message: String },

    /// Entity name not present in the registry
    #[error("unknown entity: {0}")]
    UnknownEntity(String),

    /// Inconsistent entity metadata
    #[error("invalid metadata: {0}")]
    Metadata(String),

    /// Module export list names a member that does not exist
    #[error("module `{module}` has no member `{name}`")]
    UnknownExport { module: String, name: String },

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Relationship nesting went past the configured limit
    #[error("recursion limit of {0} nested relationships exceeded")]
    RecursionLimit(usize),

    /// Serialization/deserialization error
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl SchemaError {
    pub fn conversion(name: impl Into<String>, message: impl Into<String>) -> Self {
        SchemaError::Conversion {
            name: name.into(),
            message: message.into(),
        }
    }
}

impl From<serde_json::Error> for SchemaError {
    fn from(err: serde_json::Error) -> Self {
        SchemaError::Serialization(err.to_string())
    }
}
