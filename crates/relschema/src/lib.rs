//! relschema - JSON Schema, OpenAPI and AsyncAPI documents from entity metadata
//!
//! Schemas are built by walking the properties of a registered entity,
//! deciding how each one is rendered, and classifying column types into JSON
//! Schema types. Transformers reshape the result into document layouts, and
//! the [`mapping`] module converts between live instances and plain dicts
//! using a built schema.

pub mod classifier;
pub mod decision;
pub mod driver;
pub mod factory;
pub mod mapping;
pub mod overrides;
pub mod restriction;
pub mod transformer;
pub mod walker;

#[cfg(test)]
mod fixtures;

// Re-export relschema_core modules so users don't need to depend on it directly
pub mod schema {
    pub use relschema_core::schema::*;
}

pub mod metadata {
    pub use relschema_core::metadata::*;
}

pub mod openapi {
    pub use relschema_core::openapi::*;
}

pub mod types {
    pub use relschema_core::types::*;
}

pub mod value {
    pub use relschema_core::value::*;
}

pub use relschema_core::{
    Column, Document, Entity, Instance, InstanceRef, Layout, Module, NativeValue, PlainDict,
    Registry, RelationshipProperty, Schema, SchemaError, SchemaResult, SqlType, TypeClass,
};

pub use classifier::{Classifier, Resolution};
pub use decision::{Decision, DecisionKind, RelationDecision, UseForeignKeyIfPossibleDecision};
pub use driver::{Driver, DriverConfig};
pub use factory::{BuildOptions, ChildFactory, SchemaFactory};
pub use mapping::{ModelLookup, apply_changes, dictify, jsonify, objectify, prepare};
pub use overrides::{Override, Overrides};
pub use restriction::Restrictions;
pub use transformer::{
    AsyncApi2Transformer, JsonSchemaTransformer, OpenApi2Transformer, OpenApi3Transformer,
    Swagger2Transformer, Target, Transformer, collect_models,
};
pub use walker::{History, Walker, WalkerKind};

// Re-export serde_json for callers inspecting generated documents
pub use serde_json;
