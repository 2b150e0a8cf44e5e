//! Per-path patches applied to generated column subschemas

use indexmap::IndexMap;
use relschema_core::{SchemaError, SchemaResult};
use serde_json::{Map, Value};
use std::collections::BTreeSet;
use tracing::trace;

/// A keyword patch
#[derive(Debug, Clone, PartialEq)]
pub enum Override {
    /// Insert or replace the keyword
    Set(Value),
    /// Drop the keyword if present
    Remove,
}

/// Keyword patches keyed by dotted property path (`name`, `users.name`)
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Overrides {
    patches: IndexMap<String, Vec<(String, Override)>>,
}

impl Overrides {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set `keyword` on the subschema at `path`
    #[must_use]
    pub fn set(
        self,
        path: impl Into<String>,
        keyword: impl Into<String>,
        value: impl Into<Value>,
    ) -> Self {
        self.patch(path, keyword, Override::Set(value.into()))
    }

    /// Remove `keyword` from the subschema at `path`
    #[must_use]
    pub fn remove(self, path: impl Into<String>, keyword: impl Into<String>) -> Self {
        self.patch(path, keyword, Override::Remove)
    }

    #[must_use]
    pub fn patch(
        mut self,
        path: impl Into<String>,
        keyword: impl Into<String>,
        patch: Override,
    ) -> Self {
        self.patches
            .entry(path.into())
            .or_default()
            .push((keyword.into(), patch));
        self
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.patches.is_empty()
    }

    /// Paths in insertion order
    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.patches.keys().map(String::as_str)
    }

    /// Patches at `path` relative to `prefix`, in insertion order
    #[must_use]
    pub fn under<'o>(
        &'o self,
        prefix: &OverrideScope,
        name: &str,
    ) -> Option<(String, &'o [(String, Override)])> {
        let path = prefix.path(name);
        self.patches
            .get(&path)
            .map(|patches| (path, patches.as_slice()))
    }
}

/// The dotted path prefix of one recursion level
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OverrideScope {
    prefix: String,
}

impl OverrideScope {
    /// The top-level scope
    #[must_use]
    pub fn root() -> Self {
        Self::default()
    }

    /// The scope below relationship `name`
    #[must_use]
    pub fn child(&self, name: &str, splitter: &str) -> Self {
        Self {
            prefix: format!("{}{name}{splitter}", self.prefix),
        }
    }

    /// Full dotted path of `name` in this scope
    #[must_use]
    pub fn path(&self, name: &str) -> String {
        format!("{}{name}", self.prefix)
    }
}

/// Applies overrides during one build and records which paths were used
#[derive(Debug)]
pub struct OverrideTracker<'o> {
    overrides: &'o Overrides,
    unused: BTreeSet<String>,
}

impl<'o> OverrideTracker<'o> {
    #[must_use]
    pub fn new(overrides: &'o Overrides) -> Self {
        Self {
            overrides,
            unused: overrides.paths().map(str::to_string).collect(),
        }
    }

    /// Patch `sub` with the overrides for column `name` in `scope`
    pub fn apply(&mut self, scope: &OverrideScope, name: &str, sub: &mut Map<String, Value>) {
        let Some((path, patches)) = self.overrides.under(scope, name) else {
            return;
        };
        for (keyword, patch) in patches {
            match patch {
                Override::Set(value) => {
                    sub.insert(keyword.clone(), value.clone());
                }
                Override::Remove => {
                    sub.remove(keyword);
                }
            }
        }
        trace!(path = %path, patches = patches.len(), "applied overrides");
        self.unused.remove(&path);
    }

    /// Fails with the paths that never matched a property
    pub fn finish(self) -> SchemaResult<()> {
        if self.unused.is_empty() {
            Ok(())
        } else {
            Err(SchemaError::InvalidOverrides(self.unused.into_iter().collect()))
        }
    }
}
