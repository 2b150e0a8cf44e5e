use relschema_core::{Entity, Registry, SchemaError, SchemaResult};
use tracing::trace;

/// Tracks which entity a nested name refers to while descending a schema.
///
/// The first resolved name is an entity name; every later one is a
/// relationship key of the entity currently on top of the stack.
#[derive(Debug)]
pub struct ModelLookup<'r> {
    registry: &'r Registry,
    stack: Vec<&'r Entity>,
}

impl<'r> ModelLookup<'r> {
    #[must_use]
    pub fn new(registry: &'r Registry) -> Self {
        Self {
            registry,
            stack: Vec::new(),
        }
    }

    /// Resolve `name` and push the entity it denotes
    pub fn resolve(&mut self, name: &str) -> SchemaResult<&'r Entity> {
        let entity = match self.stack.last() {
            None => self.registry.entity(name)?,
            Some(current) => {
                let rel = current.relationship_named(name).ok_or_else(|| {
                    SchemaError::Value(format!(
                        "`{name}` is not a relationship of `{}`",
                        current.name()
                    ))
                })?;
                self.registry.target_of(rel)?
            }
        };
        trace!(name, entity = entity.name(), depth = self.stack.len(), "resolved model");
        self.stack.push(entity);
        Ok(entity)
    }

    pub fn pop(&mut self) -> Option<&'r Entity> {
        self.stack.pop()
    }

    #[must_use]
    pub fn current(&self) -> Option<&'r Entity> {
        self.stack.last().copied()
    }

    #[must_use]
    pub fn depth(&self) -> usize {
        self.stack.len()
    }
}
