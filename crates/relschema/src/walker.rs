//! Property enumeration strategies over one entity

use relschema_core::{Entity, Property, RelationshipProperty, SchemaError, SchemaResult};
use serde::{Deserialize, Serialize};
use tracing::trace;

/// Walker strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WalkerKind {
    /// Column properties, foreign-key columns included
    ForeignKey,
    /// Column properties without foreign-key columns
    NoForeignKey,
    /// Column properties without foreign-key columns, plus relationships
    #[default]
    Structural,
}

/// Relationships traversed on the current root-to-leaf path.
///
/// Extending a history yields a new value; the receiver is left untouched,
/// so sibling branches never see each other's entries.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct History<'r> {
    path: Vec<&'r RelationshipProperty>,
}

impl<'r> History<'r> {
    #[must_use]
    pub fn pushed(&self, relationship: &'r RelationshipProperty) -> Self {
        let mut path = Vec::with_capacity(self.path.len() + 1);
        path.extend(self.path.iter().copied());
        path.push(relationship);
        Self { path }
    }

    #[must_use]
    pub fn contains(&self, relationship: &RelationshipProperty) -> bool {
        let id = relationship.id();
        self.path.iter().any(|seen| seen.is(&id))
    }

    /// The relationship the current walker was reached through
    #[must_use]
    pub fn last(&self) -> Option<&'r RelationshipProperty> {
        self.path.last().copied()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.path.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.path.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &'r RelationshipProperty> + '_ {
        self.path.iter().copied()
    }
}

/// Enumerates the exposed properties of one entity
#[derive(Debug, Clone)]
pub struct Walker<'r> {
    kind: WalkerKind,
    entity: &'r Entity,
    includes: Option<Vec<String>>,
    excludes: Option<Vec<String>>,
    history: History<'r>,
}

impl<'r> Walker<'r> {
    /// Fails with a conflict when `includes` and `excludes` share a key
    pub fn new(
        kind: WalkerKind,
        entity: &'r Entity,
        includes: Option<Vec<String>>,
        excludes: Option<Vec<String>>,
        history: History<'r>,
    ) -> SchemaResult<Self> {
        if let (Some(includes), Some(excludes)) = (&includes, &excludes)
            && includes.iter().any(|key| excludes.contains(key))
        {
            return Err(SchemaError::Conflict {
                includes: includes.clone(),
                excludes: excludes.clone(),
            });
        }
        Ok(Self {
            kind,
            entity,
            includes,
            excludes,
            history,
        })
    }

    /// A walker of the same kind for a child scope
    pub fn clone_for(
        &self,
        name: &str,
        target: &'r Entity,
        includes: Option<Vec<String>>,
        excludes: Option<Vec<String>>,
        history: History<'r>,
    ) -> SchemaResult<Self> {
        trace!(
            relationship = name,
            target = target.name(),
            ?includes,
            ?excludes,
            "child walker"
        );
        Self::new(self.kind, target, includes, excludes, history)
    }

    /// An unfiltered walker over `entity` sharing only the history
    #[must_use]
    pub fn from_child(&self, entity: &'r Entity) -> Self {
        Self {
            kind: self.kind,
            entity,
            includes: None,
            excludes: None,
            history: self.history.clone(),
        }
    }

    #[must_use]
    pub fn kind(&self) -> WalkerKind {
        self.kind
    }

    #[must_use]
    pub fn entity(&self) -> &'r Entity {
        self.entity
    }

    #[must_use]
    pub fn includes(&self) -> Option<&[String]> {
        self.includes.as_deref()
    }

    #[must_use]
    pub fn excludes(&self) -> Option<&[String]> {
        self.excludes.as_deref()
    }

    #[must_use]
    pub fn history(&self) -> &History<'r> {
        &self.history
    }

    /// Properties in table-column order; relationships follow for the
    /// structural strategy
    pub fn walk(&self) -> impl Iterator<Item = &'r Property> + '_ {
        let entity = self.entity;
        let columns = entity.columns().iter().flat_map(move |column| {
            let direct = entity.property(column.name());
            let backed = direct.is_none().then(|| {
                entity.properties().filter(move |prop| {
                    matches!(prop, Property::Column(_))
                        && prop.columns().iter().any(|c| c.name() == column.name())
                })
            });
            direct.into_iter().chain(backed.into_iter().flatten())
        });
        let relationships = (self.kind == WalkerKind::Structural)
            .then(|| {
                entity
                    .properties()
                    .filter(|prop| matches!(prop, Property::Relationship(_)))
            })
            .into_iter()
            .flatten();
        columns
            .chain(relationships)
            .filter(move |prop| self.accepts(prop))
    }

    fn accepts(&self, prop: &Property) -> bool {
        let key = prop.key();
        if let Some(includes) = &self.includes
            && !includes.iter().any(|k| k == key)
        {
            return false;
        }
        if let Some(excludes) = &self.excludes
            && excludes.iter().any(|k| k == key)
        {
            return false;
        }
        let foreign = prop.columns().iter().any(|c| c.has_foreign_key());
        match self.kind {
            WalkerKind::ForeignKey => true,
            WalkerKind::NoForeignKey => !foreign,
            WalkerKind::Structural => match prop {
                Property::Column(_) => !foreign,
                Property::Relationship(rel) => !self.history.contains(rel),
                Property::Other { .. } => false,
            },
        }
    }
}
