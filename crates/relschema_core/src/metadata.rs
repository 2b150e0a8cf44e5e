//! Entity metadata: columns, properties, relationships and the registry
//!
//! Entities are declared with small builders and collected into a
//! [`Registry`]. Building the registry resolves what a mapper would resolve at
//! configuration time: relationship owners, reverse relationships declared
//! through `backref`, and join columns inferred from foreign keys.

use crate::error::{SchemaError, SchemaResult};
use crate::types::{ColumnType, SqlType, TypeClass};
use indexmap::IndexMap;
use serde_json::Value;
use std::fmt;
use tracing::{debug, trace};

/// A qualified column name (`entity.column`)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ColumnRef {
    pub entity: String,
    pub column: String,
}

impl ColumnRef {
    pub fn new(entity: impl Into<String>, column: impl Into<String>) -> Self {
        Self {
            entity: entity.into(),
            column: column.into(),
        }
    }
}

impl fmt::Display for ColumnRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.entity, self.column)
    }
}

/// A table column
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    name: String,
    column_type: ColumnType,
    primary_key: bool,
    nullable: bool,
    has_default: bool,
    has_server_default: bool,
    foreign_keys: Vec<ColumnRef>,
    doc: Option<String>,
}

impl Column {
    /// A nullable column with no constraints
    pub fn new(name: impl Into<String>, column_type: impl Into<ColumnType>) -> Self {
        Self {
            name: name.into(),
            column_type: column_type.into(),
            primary_key: false,
            nullable: true,
            has_default: false,
            has_server_default: false,
            foreign_keys: Vec::new(),
            doc: None,
        }
    }

    /// A column typed with a bare class instead of a type instance
    pub fn raw(name: impl Into<String>, class: TypeClass) -> Self {
        Self::new(name, ColumnType::Raw(class))
    }

    /// Mark as primary key; primary keys are not nullable
    #[must_use]
    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self.nullable = false;
        self
    }

    #[must_use]
    pub fn nullable(mut self, nullable: bool) -> Self {
        self.nullable = nullable;
        self
    }

    #[must_use]
    pub fn not_null(self) -> Self {
        self.nullable(false)
    }

    #[must_use]
    pub fn with_default(mut self) -> Self {
        self.has_default = true;
        self
    }

    #[must_use]
    pub fn server_default(mut self) -> Self {
        self.has_server_default = true;
        self
    }

    /// Add a foreign key to `entity.column`
    #[must_use]
    pub fn foreign_key(mut self, entity: impl Into<String>, column: impl Into<String>) -> Self {
        self.foreign_keys.push(ColumnRef::new(entity, column));
        self
    }

    #[must_use]
    pub fn doc(mut self, doc: impl Into<String>) -> Self {
        self.doc = Some(doc.into());
        self
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn column_type(&self) -> &ColumnType {
        &self.column_type
    }

    /// The type instance, unless the column was declared with a bare class
    #[must_use]
    pub fn sql_type(&self) -> Option<&SqlType> {
        match &self.column_type {
            ColumnType::Instance(ty) => Some(ty),
            ColumnType::Raw(_) => None,
        }
    }

    #[must_use]
    pub fn is_primary_key(&self) -> bool {
        self.primary_key
    }

    #[must_use]
    pub fn is_nullable(&self) -> bool {
        self.nullable
    }

    #[must_use]
    pub fn has_default(&self) -> bool {
        self.has_default
    }

    #[must_use]
    pub fn has_server_default(&self) -> bool {
        self.has_server_default
    }

    #[must_use]
    pub fn foreign_keys(&self) -> &[ColumnRef] {
        &self.foreign_keys
    }

    #[must_use]
    pub fn has_foreign_key(&self) -> bool {
        !self.foreign_keys.is_empty()
    }

    #[must_use]
    pub fn description(&self) -> Option<&str> {
        self.doc.as_deref()
    }
}

/// A property backed by one or more table columns
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnProperty {
    key: String,
    columns: Vec<Column>,
}

impl ColumnProperty {
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    #[must_use]
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// Whether any backing column carries a foreign key
    #[must_use]
    pub fn has_foreign_key(&self) -> bool {
        self.columns.iter().any(Column::has_foreign_key)
    }

    fn is_backed_by(&self, column: &str) -> bool {
        self.columns.iter().any(|c| c.name == column)
    }
}

/// Relationship direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    ManyToOne,
    OneToMany,
    ManyToMany,
}

impl Direction {
    /// Direction of the reverse relationship
    #[must_use]
    pub const fn inverse(self) -> Self {
        match self {
            Self::ManyToOne => Self::OneToMany,
            Self::OneToMany => Self::ManyToOne,
            Self::ManyToMany => Self::ManyToMany,
        }
    }
}

/// Identity of a relationship: owner entity name and key
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RelationId {
    pub owner: String,
    pub key: String,
}

impl fmt::Display for RelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.owner, self.key)
    }
}

/// A property linking an entity to another entity
#[derive(Debug, Clone, PartialEq)]
pub struct RelationshipProperty {
    owner: String,
    key: String,
    target: String,
    direction: Direction,
    back_populates: Option<String>,
    backref: Option<String>,
    local_columns: Vec<ColumnRef>,
    remote_side: Vec<ColumnRef>,
}

impl RelationshipProperty {
    fn new(key: impl Into<String>, target: impl Into<String>, direction: Direction) -> Self {
        Self {
            owner: String::new(),
            key: key.into(),
            target: target.into(),
            direction,
            back_populates: None,
            backref: None,
            local_columns: Vec::new(),
            remote_side: Vec::new(),
        }
    }

    pub fn many_to_one(key: impl Into<String>, target: impl Into<String>) -> Self {
        Self::new(key, target, Direction::ManyToOne)
    }

    pub fn one_to_many(key: impl Into<String>, target: impl Into<String>) -> Self {
        Self::new(key, target, Direction::OneToMany)
    }

    pub fn many_to_many(key: impl Into<String>, target: impl Into<String>) -> Self {
        Self::new(key, target, Direction::ManyToMany)
    }

    /// Name of the reverse relationship declared on the target
    #[must_use]
    pub fn back_populates(mut self, name: impl Into<String>) -> Self {
        self.back_populates = Some(name.into());
        self
    }

    /// Declare a reverse relationship on the target, created by the registry
    #[must_use]
    pub fn backref(mut self, name: impl Into<String>) -> Self {
        self.backref = Some(name.into());
        self
    }

    /// Explicit join columns; `local` and `remote` are qualified column refs
    #[must_use]
    pub fn join(mut self, local: Vec<ColumnRef>, remote: Vec<ColumnRef>) -> Self {
        self.local_columns = local;
        self.remote_side = remote;
        self
    }

    /// Owner entity name, set when the registry is built
    #[must_use]
    pub fn owner(&self) -> &str {
        &self.owner
    }

    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Target entity name
    #[must_use]
    pub fn target(&self) -> &str {
        &self.target
    }

    #[must_use]
    pub fn direction(&self) -> Direction {
        self.direction
    }

    #[must_use]
    pub fn back_populates_name(&self) -> Option<&str> {
        self.back_populates.as_deref()
    }

    #[must_use]
    pub fn backref_name(&self) -> Option<&str> {
        self.backref.as_deref()
    }

    #[must_use]
    pub fn local_columns(&self) -> &[ColumnRef] {
        &self.local_columns
    }

    #[must_use]
    pub fn remote_side(&self) -> &[ColumnRef] {
        &self.remote_side
    }

    #[must_use]
    pub fn id(&self) -> RelationId {
        RelationId {
            owner: self.owner.clone(),
            key: self.key.clone(),
        }
    }

    /// Whether this relationship has the identity `id`
    #[must_use]
    pub fn is(&self, id: &RelationId) -> bool {
        self.owner == id.owner && self.key == id.key
    }

    fn reverse(&self, key: &str) -> Self {
        Self {
            owner: self.target.clone(),
            key: key.to_string(),
            target: self.owner.clone(),
            direction: self.direction.inverse(),
            back_populates: Some(self.key.clone()),
            backref: None,
            local_columns: self.remote_side.clone(),
            remote_side: self.local_columns.clone(),
        }
    }
}

/// A mapped property of an entity
#[derive(Debug, Clone, PartialEq)]
pub enum Property {
    Column(ColumnProperty),
    Relationship(RelationshipProperty),
    /// Neither column-like nor relationship-like (synonym, composite, ...)
    Other { key: String, kind: String },
}

impl Property {
    #[must_use]
    pub fn key(&self) -> &str {
        match self {
            Property::Column(prop) => prop.key(),
            Property::Relationship(prop) => prop.key(),
            Property::Other { key, .. } => key,
        }
    }

    /// Backing columns; empty for anything but column properties
    #[must_use]
    pub fn columns(&self) -> &[Column] {
        match self {
            Property::Column(prop) => prop.columns(),
            _ => &[],
        }
    }

    #[must_use]
    pub fn as_column(&self) -> Option<&ColumnProperty> {
        match self {
            Property::Column(prop) => Some(prop),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_relationship(&self) -> Option<&RelationshipProperty> {
        match self {
            Property::Relationship(prop) => Some(prop),
            _ => None,
        }
    }
}

/// A mapped entity
#[derive(Debug, Clone, PartialEq)]
pub struct Entity {
    name: String,
    table: String,
    doc: Option<String>,
    columns: Vec<Column>,
    properties: IndexMap<String, Property>,
}

impl Entity {
    /// An entity whose table is named after it
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            table: name.clone(),
            name,
            doc: None,
            columns: Vec::new(),
            properties: IndexMap::new(),
        }
    }

    #[must_use]
    pub fn table(mut self, table: impl Into<String>) -> Self {
        self.table = table.into();
        self
    }

    #[must_use]
    pub fn doc(mut self, doc: impl Into<String>) -> Self {
        self.doc = Some(doc.into());
        self
    }

    /// Add a table column mapped under its own name
    #[must_use]
    pub fn column(self, column: Column) -> Self {
        let key = column.name.clone();
        self.column_as(key, column)
    }

    /// Add a table column mapped under a different property key
    #[must_use]
    pub fn column_as(mut self, key: impl Into<String>, column: Column) -> Self {
        let key = key.into();
        self.columns.push(column.clone());
        self.properties.insert(
            key.clone(),
            Property::Column(ColumnProperty {
                key,
                columns: vec![column],
            }),
        );
        self
    }

    #[must_use]
    pub fn relationship(mut self, relationship: RelationshipProperty) -> Self {
        self.properties
            .insert(relationship.key.clone(), Property::Relationship(relationship));
        self
    }

    /// Add a property the schema layer cannot interpret
    #[must_use]
    pub fn other(mut self, key: impl Into<String>, kind: impl Into<String>) -> Self {
        let key = key.into();
        self.properties.insert(
            key.clone(),
            Property::Other {
                key,
                kind: kind.into(),
            },
        );
        self
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn table_name(&self) -> &str {
        &self.table
    }

    #[must_use]
    pub fn description(&self) -> Option<&str> {
        self.doc.as_deref()
    }

    /// Table columns in table order
    #[must_use]
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// Properties in declaration order
    pub fn properties(&self) -> impl Iterator<Item = &Property> {
        self.properties.values()
    }

    #[must_use]
    pub fn property(&self, key: &str) -> Option<&Property> {
        self.properties.get(key)
    }

    /// Relationship properties in declaration order
    pub fn relationships(&self) -> impl Iterator<Item = &RelationshipProperty> {
        self.properties().filter_map(Property::as_relationship)
    }

    #[must_use]
    pub fn relationship_named(&self, key: &str) -> Option<&RelationshipProperty> {
        self.property(key).and_then(Property::as_relationship)
    }

    /// Column properties backed by `column`, in declaration order
    pub fn column_properties_of<'a>(
        &'a self,
        column: &'a str,
    ) -> impl Iterator<Item = &'a ColumnProperty> + 'a {
        self.properties()
            .filter_map(Property::as_column)
            .filter(move |prop| prop.is_backed_by(column))
    }

    /// Primary-key columns in table order
    pub fn primary_key(&self) -> impl Iterator<Item = &Column> {
        self.columns.iter().filter(|c| c.primary_key)
    }

    /// Property keys of the primary-key columns, sorted
    #[must_use]
    pub fn primary_key_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .primary_key()
            .flat_map(|column| {
                self.column_properties_of(column.name())
                    .map(|prop| prop.key.clone())
                    .collect::<Vec<_>>()
            })
            .collect();
        names.sort();
        names.dedup();
        names
    }

    fn qualified(&self, column: &Column) -> ColumnRef {
        ColumnRef::new(self.name.clone(), column.name.clone())
    }

    /// Columns of `self` that reference `other`, paired with the referenced column
    fn foreign_keys_to(&self, other: &str) -> Vec<(ColumnRef, ColumnRef)> {
        self.columns
            .iter()
            .flat_map(|column| {
                column
                    .foreign_keys
                    .iter()
                    .filter(|fk| fk.entity == other)
                    .map(|fk| (self.qualified(column), fk.clone()))
            })
            .collect()
    }
}

/// Catalog of entities keyed by unique name
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Registry {
    entities: IndexMap<String, Entity>,
}

impl Registry {
    #[must_use]
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::default()
    }

    /// Look up an entity by name
    pub fn entity(&self, name: &str) -> SchemaResult<&Entity> {
        self.entities
            .get(name)
            .ok_or_else(|| SchemaError::UnknownEntity(name.to_string()))
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Entity> {
        self.entities.get(name)
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.entities.contains_key(name)
    }

    /// Entities in registration order
    pub fn entities(&self) -> impl Iterator<Item = &Entity> {
        self.entities.values()
    }

    /// The target entity of a relationship
    pub fn target_of(&self, relationship: &RelationshipProperty) -> SchemaResult<&Entity> {
        self.entity(relationship.target())
    }
}

/// Collects entities and resolves cross-entity metadata on [`build`](Self::build)
#[derive(Debug, Default)]
pub struct RegistryBuilder {
    entities: Vec<Entity>,
}

impl RegistryBuilder {
    #[must_use]
    pub fn entity(mut self, entity: Entity) -> Self {
        self.entities.push(entity);
        self
    }

    /// Validate and resolve the collected entities
    pub fn build(self) -> SchemaResult<Registry> {
        let mut entities: IndexMap<String, Entity> = IndexMap::new();
        for mut entity in self.entities {
            if entities.contains_key(&entity.name) {
                return Err(SchemaError::Metadata(format!(
                    "duplicate entity name `{}`",
                    entity.name
                )));
            }
            let owner = entity.name.clone();
            for prop in entity.properties.values_mut() {
                if let Property::Relationship(rel) = prop {
                    rel.owner = owner.clone();
                }
            }
            entities.insert(owner, entity);
        }

        // join columns first, so reverse relationships swap resolved columns
        let mut joins = Vec::new();
        for entity in entities.values() {
            for rel in entity.relationships() {
                let target = entities.get(&rel.target).ok_or_else(|| {
                    SchemaError::Metadata(format!(
                        "relationship `{}` targets unknown entity `{}`",
                        rel.id(),
                        rel.target
                    ))
                })?;
                if rel.local_columns.is_empty() && rel.remote_side.is_empty() {
                    let (local, remote) = infer_join(entity, target, rel)?;
                    joins.push((rel.id(), local, remote));
                }
            }
        }
        for (id, local, remote) in joins {
            if let Some(Property::Relationship(rel)) = entities
                .get_mut(&id.owner)
                .and_then(|entity| entity.properties.get_mut(&id.key))
            {
                trace!(relationship = %id, ?local, ?remote, "inferred join columns");
                rel.local_columns = local;
                rel.remote_side = remote;
            }
        }

        let reverses: Vec<RelationshipProperty> = entities
            .values()
            .flat_map(Entity::relationships)
            .filter_map(|rel| rel.backref.as_deref().map(|key| rel.reverse(key)))
            .collect();
        for reverse in reverses {
            let target = entities.get_mut(&reverse.owner).ok_or_else(|| {
                SchemaError::Metadata(format!("backref owner `{}` is unknown", reverse.owner))
            })?;
            if target.properties.contains_key(&reverse.key) {
                return Err(SchemaError::Metadata(format!(
                    "backref `{}` conflicts with an existing property",
                    reverse.id()
                )));
            }
            debug!(relationship = %reverse.id(), "created reverse relationship");
            target
                .properties
                .insert(reverse.key.clone(), Property::Relationship(reverse));
        }

        Ok(Registry { entities })
    }
}

fn infer_join(
    owner: &Entity,
    target: &Entity,
    rel: &RelationshipProperty,
) -> SchemaResult<(Vec<ColumnRef>, Vec<ColumnRef>)> {
    let pairs = match rel.direction {
        Direction::ManyToOne => owner.foreign_keys_to(&target.name),
        Direction::OneToMany => target
            .foreign_keys_to(&owner.name)
            .into_iter()
            .map(|(fk, referenced)| (referenced, fk))
            .collect(),
        // no secondary tables; many-to-many joins are declared explicitly
        Direction::ManyToMany => return Ok((Vec::new(), Vec::new())),
    };
    if pairs.is_empty() {
        return Err(SchemaError::Metadata(format!(
            "no foreign key links `{}` to `{}` for relationship `{}`",
            owner.name,
            target.name,
            rel.id()
        )));
    }
    Ok(pairs.into_iter().unzip())
}

/// A module member
#[derive(Debug, Clone, PartialEq)]
pub enum Member {
    /// A mapped entity, by registry name
    Entity(String),
    /// Any other module-level value
    Value(Value),
}

/// A named bag of members, optionally with an explicit export list
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Module {
    name: String,
    exports: Option<Vec<String>>,
    members: IndexMap<String, Member>,
}

impl Module {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Add an entity member bound under the entity's own name
    #[must_use]
    pub fn entity(self, entity: impl Into<String>) -> Self {
        let entity = entity.into();
        self.member(entity.clone(), Member::Entity(entity))
    }

    /// Add a plain value member
    #[must_use]
    pub fn value(self, name: impl Into<String>, value: Value) -> Self {
        self.member(name, Member::Value(value))
    }

    #[must_use]
    pub fn member(mut self, name: impl Into<String>, member: Member) -> Self {
        self.members.insert(name.into(), member);
        self
    }

    /// Declare an explicit export list
    #[must_use]
    pub fn exports<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.exports = Some(names.into_iter().map(Into::into).collect());
        self
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn export_list(&self) -> Option<&[String]> {
        self.exports.as_deref()
    }

    /// Look up a member by name
    pub fn get(&self, name: &str) -> SchemaResult<&Member> {
        self.members.get(name).ok_or_else(|| SchemaError::UnknownExport {
            module: self.name.clone(),
            name: name.to_string(),
        })
    }

    /// Members in insertion order
    pub fn members(&self) -> impl Iterator<Item = (&str, &Member)> {
        self.members.iter().map(|(name, member)| (name.as_str(), member))
    }
}
