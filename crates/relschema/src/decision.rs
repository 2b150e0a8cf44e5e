//! Rendering decisions for walked properties

use crate::walker::Walker;
use relschema_core::{
    ColumnProperty, Direction, Property, RelationshipProperty, SchemaError, SchemaResult,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use std::collections::BTreeSet;
use std::fmt;
use tracing::{trace, warn};

/// How a walked property is rendered
#[derive(Debug, Clone, PartialEq)]
pub enum Action<'r> {
    /// Nested entity behind a `$ref`
    Relationship(&'r RelationshipProperty),
    /// Plain column subschemas
    ForeignKey(&'r ColumnProperty),
    /// Literal schema fragment stored under `key`
    Immediate { key: String, schema: Value },
}

/// An action plus the keywords merged into each resulting column subschema
#[derive(Debug, Clone, PartialEq)]
pub struct Decided<'r> {
    pub action: Action<'r>,
    pub options: Map<String, Value>,
}

impl<'r> Decided<'r> {
    fn plain(action: Action<'r>) -> Self {
        Self {
            action,
            options: Map::new(),
        }
    }
}

/// Decision strategy
pub trait Decision: fmt::Debug {
    fn decide<'r>(
        &self,
        walker: &Walker<'r>,
        property: &'r Property,
        toplevel: bool,
    ) -> SchemaResult<Vec<Decided<'r>>>;
}

/// Decision strategy names used by the driver
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DecisionKind {
    /// [`RelationDecision`]
    #[default]
    Default,
    /// [`UseForeignKeyIfPossibleDecision`]
    UseForeignKey,
}

impl DecisionKind {
    #[must_use]
    pub fn build(self) -> Box<dyn Decision> {
        match self {
            DecisionKind::Default => Box::new(RelationDecision),
            DecisionKind::UseForeignKey => Box::new(UseForeignKeyIfPossibleDecision),
        }
    }
}

fn undecidable(property: &Property) -> SchemaError {
    match property {
        Property::Other { key, kind } => SchemaError::Decision {
            key: key.clone(),
            kind: kind.clone(),
        },
        _ => SchemaError::Decision {
            key: property.key().to_string(),
            kind: "unknown".to_string(),
        },
    }
}

/// Columns render as columns; relationships nest
#[derive(Debug, Clone, Copy, Default)]
pub struct RelationDecision;

impl Decision for RelationDecision {
    fn decide<'r>(
        &self,
        _walker: &Walker<'r>,
        property: &'r Property,
        _toplevel: bool,
    ) -> SchemaResult<Vec<Decided<'r>>> {
        match property {
            Property::Relationship(rel) => Ok(vec![Decided::plain(Action::Relationship(rel))]),
            Property::Column(prop) => Ok(vec![Decided::plain(Action::ForeignKey(prop))]),
            Property::Other { .. } => Err(undecidable(property)),
        }
    }
}

/// Many-to-one relationships render as their local foreign-key columns
#[derive(Debug, Clone, Copy, Default)]
pub struct UseForeignKeyIfPossibleDecision;

impl UseForeignKeyIfPossibleDecision {
    fn local_columns<'r>(
        walker: &Walker<'r>,
        rel: &'r RelationshipProperty,
    ) -> SchemaResult<Vec<Decided<'r>>> {
        let entity = walker.entity();
        let mut decided = Vec::new();
        for local in rel.local_columns() {
            let prop = match entity.property(&local.column) {
                Some(Property::Column(prop)) => Some(prop),
                _ => entity.column_properties_of(&local.column).next(),
            }
            .ok_or_else(|| {
                SchemaError::Metadata(format!(
                    "relationship `{}` has no column property for `{local}`",
                    rel.id()
                ))
            })?;
            let mut options = Map::new();
            options.insert("relation".to_string(), Value::String(rel.key().to_string()));
            decided.push(Decided {
                action: Action::ForeignKey(prop),
                options,
            });
        }
        Ok(decided)
    }
}

impl Decision for UseForeignKeyIfPossibleDecision {
    fn decide<'r>(
        &self,
        walker: &Walker<'r>,
        property: &'r Property,
        toplevel: bool,
    ) -> SchemaResult<Vec<Decided<'r>>> {
        let rel = match property {
            Property::Relationship(rel) => rel,
            Property::Column(prop) => return Ok(vec![Decided::plain(Action::ForeignKey(prop))]),
            Property::Other { .. } => return Err(undecidable(property)),
        };
        match rel.direction() {
            Direction::ManyToOne if toplevel => Self::local_columns(walker, rel),
            Direction::ManyToOne => {
                let local: BTreeSet<_> = rel.local_columns().iter().collect();
                let arrived_by = walker.history().last();
                let returning = arrived_by.is_some_and(|parent| {
                    parent.remote_side().iter().collect::<BTreeSet<_>>() == local
                });
                if returning {
                    trace!(relationship = %rel.id(), "join columns already rendered by parent");
                    Ok(Vec::new())
                } else {
                    Self::local_columns(walker, rel)
                }
            }
            Direction::ManyToMany => {
                warn!(
                    entity = walker.entity().name(),
                    relationship = rel.key(),
                    "many-to-many relationship rendered as a list of strings"
                );
                Ok(vec![Decided::plain(Action::Immediate {
                    key: rel.key().to_string(),
                    schema: json!({"type": "array", "items": {"type": "string"}}),
                })])
            }
            Direction::OneToMany => Ok(vec![Decided::plain(Action::Relationship(rel))]),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures;
    use crate::walker::{History, WalkerKind};
    use relschema_core::Registry;

    fn walker<'r>(registry: &'r Registry, entity: &str, history: History<'r>) -> Walker<'r> {
        Walker::new(
            WalkerKind::Structural,
            registry.entity(entity).unwrap(),
            None,
            None,
            history,
        )
        .unwrap()
    }

    #[test]
    fn test_relation_decision_nests_relationships() {
        let registry = fixtures::group_user();
        let walker = walker(&registry, "User", History::default());
        let prop = walker.entity().property("group").unwrap();

        let decided = RelationDecision.decide(&walker, prop, true).unwrap();
        assert_eq!(decided.len(), 1);
        assert!(matches!(decided[0].action, Action::Relationship(rel) if rel.key() == "group"));
        assert!(decided[0].options.is_empty());
    }

    #[test]
    fn test_many_to_one_becomes_foreign_key_at_top_level() {
        let registry = fixtures::group_user();
        let walker = walker(&registry, "User", History::default());
        let prop = walker.entity().property("group").unwrap();

        let decided = UseForeignKeyIfPossibleDecision
            .decide(&walker, prop, true)
            .unwrap();
        assert_eq!(decided.len(), 1);
        assert!(matches!(decided[0].action, Action::ForeignKey(col) if col.key() == "group_id"));
        assert_eq!(decided[0].options["relation"], json!("group"));
    }

    #[test]
    fn test_many_to_one_is_suppressed_when_walking_back_over_the_parent_edge() {
        let registry = fixtures::group_user();
        let users = registry
            .entity("Group")
            .unwrap()
            .relationship_named("users")
            .unwrap();
        let walker = walker(&registry, "User", History::default().pushed(users));
        let prop = walker.entity().property("group").unwrap();

        let decided = UseForeignKeyIfPossibleDecision
            .decide(&walker, prop, false)
            .unwrap();
        assert!(decided.is_empty());
    }

    #[test]
    fn test_many_to_many_is_a_string_list_placeholder() {
        let registry = fixtures::tagged();
        let walker = walker(&registry, "Post", History::default());
        let prop = walker.entity().property("tags").unwrap();

        let decided = UseForeignKeyIfPossibleDecision
            .decide(&walker, prop, false)
            .unwrap();
        assert_eq!(
            decided[0].action,
            Action::Immediate {
                key: "tags".to_string(),
                schema: json!({"type": "array", "items": {"type": "string"}}),
            }
        );
    }

    #[test]
    fn test_other_properties_cannot_be_decided() {
        let registry = fixtures::with_synonym();
        let walker = walker(&registry, "Node", History::default());
        let prop = walker.entity().property("label").unwrap();

        for decision in [DecisionKind::Default.build(), DecisionKind::UseForeignKey.build()] {
            let err = decision.decide(&walker, prop, true).unwrap_err();
            assert!(matches!(err, SchemaError::Decision { ref key, .. } if key == "label"));
        }
    }
}
