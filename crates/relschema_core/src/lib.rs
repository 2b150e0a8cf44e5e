//! relschema core - entity metadata and schema document types
//!
//! This crate holds the read-only metadata model the schema engine walks
//! (entities, columns, relationships, type classes), the live instance model
//! used by the object/dict mapper, and the serializable schema documents.

pub mod error;
pub mod metadata;
pub mod openapi;
pub mod schema;
pub mod types;
pub mod value;

pub use error::{SchemaError, SchemaResult};
pub use metadata::{
    Column, ColumnProperty, ColumnRef, Direction, Entity, Member, Module, Property, Registry,
    RegistryBuilder, RelationId, RelationshipProperty,
};
pub use openapi::{ComponentsDocument, DefinitionsDocument, Document, Layout};
pub use schema::{Components, Reference, Schema, SchemaType};
pub use types::{Builtin, ColumnType, SqlType, TypeClass};
pub use value::{Attribute, Instance, InstanceRef, NativeValue, PlainDict};
