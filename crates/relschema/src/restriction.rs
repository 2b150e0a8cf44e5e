//! Extra schema keywords derived from column types

use crate::classifier::Resolution;
use relschema_core::{Builtin, SqlType};
use serde_json::{Map, Value};
use std::fmt;
use std::sync::Arc;

/// Mutates a column subschema given the column's type
pub type RestrictionFn = Arc<dyn Fn(&SqlType, &mut Map<String, Value>) + Send + Sync>;

/// `maxLength` when a length is known
pub fn string_max_length(ty: &SqlType, sub: &mut Map<String, Value>) {
    if let Some(length) = ty.length() {
        sub.insert("maxLength".to_string(), Value::from(length));
    }
}

/// `enum`, in member order
pub fn enum_one_of(ty: &SqlType, sub: &mut Map<String, Value>) {
    let members = ty.enums().iter().cloned().map(Value::String).collect();
    sub.insert("enum".to_string(), Value::Array(members));
}

fn format(name: &'static str) -> RestrictionFn {
    Arc::new(move |_: &SqlType, sub: &mut Map<String, Value>| {
        sub.insert("format".to_string(), Value::String(name.to_string()));
    })
}

/// Ordered table of restriction functions keyed by type class name.
///
/// Every entry whose class matches the column type applies, in registration
/// order, and the functions of one entry apply in the order they were added.
#[derive(Clone)]
pub struct Restrictions {
    entries: Vec<(String, Vec<RestrictionFn>)>,
}

impl fmt::Debug for Restrictions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(self.entries.iter().map(|(class, fns)| (class, fns.len())))
            .finish()
    }
}

impl Default for Restrictions {
    fn default() -> Self {
        Self::empty()
            .register(Builtin::String.name(), Arc::new(string_max_length))
            .register(Builtin::Enum.name(), Arc::new(enum_one_of))
            .register(Builtin::DateTime.name(), format("date-time"))
            .register(Builtin::Date.name(), format("date"))
            .register(Builtin::Time.name(), format("time"))
            .register(Builtin::Uuid.name(), format("uuid"))
    }
}

impl Restrictions {
    #[must_use]
    pub fn empty() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Append a function for `class`
    #[must_use]
    pub fn register(mut self, class: impl Into<String>, restriction: RestrictionFn) -> Self {
        let class = class.into();
        match self.entries.iter_mut().find(|(name, _)| *name == class) {
            Some((_, fns)) => fns.push(restriction),
            None => self.entries.push((class, vec![restriction])),
        }
        self
    }

    /// Append several functions for `class`
    #[must_use]
    pub fn register_all<I>(self, class: impl Into<String>, restrictions: I) -> Self
    where
        I: IntoIterator<Item = RestrictionFn>,
    {
        let class = class.into();
        restrictions
            .into_iter()
            .fold(self, |acc, restriction| acc.register(class.clone(), restriction))
    }

    /// Apply every matching function to `sub`
    pub fn apply(&self, ty: &SqlType, sub: &mut Map<String, Value>, resolution: Resolution) {
        for (class, fns) in &self.entries {
            let matched = resolution.resolve(ty, &|name| (name == class.as_str()).then_some(()));
            if matched.is_some() {
                for restriction in fns {
                    restriction(ty, sub);
                }
            }
        }
    }
}
