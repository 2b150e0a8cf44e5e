//! Recursive schema builder

use crate::classifier::Classifier;
use crate::decision::{Action, Decision, RelationDecision};
use crate::overrides::{OverrideScope, OverrideTracker, Overrides};
use crate::restriction::Restrictions;
use crate::walker::{History, Walker, WalkerKind};
use relschema_core::{
    Column, ColumnProperty, Direction, Entity, Property, Reference, Registry,
    RelationshipProperty, Schema, SchemaError, SchemaResult, SqlType,
};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::rc::Rc;
use tracing::{debug, trace};

/// Caller predicate overriding the computed requiredness of a property
pub type AdjustRequired = Rc<dyn Fn(&Property, bool) -> bool>;

/// Derives child walkers and override scopes when the builder descends a relationship
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChildFactory {
    splitter: String,
    bidirectional: bool,
}

impl Default for ChildFactory {
    fn default() -> Self {
        Self {
            splitter: ".".to_string(),
            bidirectional: false,
        }
    }
}

impl ChildFactory {
    pub fn new(splitter: impl Into<String>, bidirectional: bool) -> Self {
        Self {
            splitter: splitter.into(),
            bidirectional,
        }
    }

    #[must_use]
    pub fn splitter(&self) -> &str {
        &self.splitter
    }

    #[must_use]
    pub fn is_bidirectional(&self) -> bool {
        self.bidirectional
    }

    /// The reverse names of `rel`, excluded from its target unless bidirectional
    #[must_use]
    pub fn default_excludes(&self, rel: &RelationshipProperty) -> Vec<String> {
        [rel.back_populates_name(), rel.backref_name()]
            .into_iter()
            .flatten()
            .map(str::to_string)
            .collect()
    }

    /// Dotted paths under `name`, with the `name` prefix stripped
    #[must_use]
    pub fn children(&self, name: &str, paths: Option<&[String]>) -> Option<Vec<String>> {
        let prefix = format!("{name}{}", self.splitter);
        paths.map(|paths| {
            paths
                .iter()
                .filter_map(|path| path.strip_prefix(&prefix))
                .map(str::to_string)
                .collect()
        })
    }

    /// A walker over the target of `rel`
    pub fn child_walker<'r>(
        &self,
        rel: &'r RelationshipProperty,
        walker: &Walker<'r>,
        target: &'r Entity,
        history: History<'r>,
    ) -> SchemaResult<Walker<'r>> {
        let includes = self.children(rel.key(), walker.includes());
        let mut excludes = self.children(rel.key(), walker.excludes());
        if !self.bidirectional {
            excludes
                .get_or_insert_with(Vec::new)
                .extend(self.default_excludes(rel));
        }
        walker.clone_for(rel.key(), target, includes, excludes, history)
    }

    /// The override scope below `rel`
    #[must_use]
    pub fn child_overrides(
        &self,
        rel: &RelationshipProperty,
        scope: &OverrideScope,
    ) -> OverrideScope {
        scope.child(rel.key(), &self.splitter)
    }
}

/// Per-call build parameters
#[derive(Clone, Default)]
pub struct BuildOptions {
    pub includes: Option<Vec<String>>,
    pub excludes: Option<Vec<String>>,
    pub overrides: Overrides,
    /// Relationship levels to expand; `None` is unlimited
    pub depth: Option<usize>,
    pub adjust_required: Option<AdjustRequired>,
}

impl fmt::Debug for BuildOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BuildOptions")
            .field("includes", &self.includes)
            .field("excludes", &self.excludes)
            .field("overrides", &self.overrides)
            .field("depth", &self.depth)
            .field("adjust_required", &self.adjust_required.is_some())
            .finish()
    }
}

impl BuildOptions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn includes<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.includes = Some(keys.into_iter().map(Into::into).collect());
        self
    }

    #[must_use]
    pub fn excludes<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.excludes = Some(keys.into_iter().map(Into::into).collect());
        self
    }

    #[must_use]
    pub fn overrides(mut self, overrides: Overrides) -> Self {
        self.overrides = overrides;
        self
    }

    #[must_use]
    pub fn depth(mut self, depth: usize) -> Self {
        self.depth = Some(depth);
        self
    }

    #[must_use]
    pub fn adjust_required<F>(mut self, adjust: F) -> Self
    where
        F: Fn(&Property, bool) -> bool + 'static,
    {
        self.adjust_required = Some(Rc::new(adjust));
        self
    }
}

/// State shared by every recursion level of one build
#[derive(Debug)]
pub struct BuildContext<'r, 'o> {
    registry: &'r Registry,
    definitions: BTreeMap<String, Schema>,
    overrides: OverrideTracker<'o>,
    level: usize,
}

impl<'r, 'o> BuildContext<'r, 'o> {
    #[must_use]
    pub fn new(registry: &'r Registry, overrides: &'o Overrides) -> Self {
        Self {
            registry,
            definitions: BTreeMap::new(),
            overrides: OverrideTracker::new(overrides),
            level: 0,
        }
    }

    /// Definitions registered so far
    #[must_use]
    pub fn definitions(&self) -> &BTreeMap<String, Schema> {
        &self.definitions
    }

    /// Fails on unconsumed overrides, otherwise yields the definitions table
    pub fn finish(self) -> SchemaResult<BTreeMap<String, Schema>> {
        self.overrides.finish()?;
        Ok(self.definitions)
    }
}

/// Builds entity schemas from a walker strategy and a decision strategy
#[derive(Debug)]
pub struct SchemaFactory {
    walker: WalkerKind,
    classifier: Classifier,
    restrictions: Restrictions,
    child_factory: ChildFactory,
    decision: Box<dyn Decision>,
    recursion_limit: Option<usize>,
}

impl Default for SchemaFactory {
    fn default() -> Self {
        Self::new(WalkerKind::default())
    }
}

impl SchemaFactory {
    #[must_use]
    pub fn new(walker: WalkerKind) -> Self {
        Self {
            walker,
            classifier: Classifier::default(),
            restrictions: Restrictions::default(),
            child_factory: ChildFactory::default(),
            decision: Box::new(RelationDecision),
            recursion_limit: None,
        }
    }

    #[must_use]
    pub fn with_classifier(mut self, classifier: Classifier) -> Self {
        self.classifier = classifier;
        self
    }

    #[must_use]
    pub fn with_restrictions(mut self, restrictions: Restrictions) -> Self {
        self.restrictions = restrictions;
        self
    }

    #[must_use]
    pub fn with_child_factory(mut self, child_factory: ChildFactory) -> Self {
        self.child_factory = child_factory;
        self
    }

    #[must_use]
    pub fn with_decision(self, decision: impl Decision + 'static) -> Self {
        self.with_boxed_decision(Box::new(decision))
    }

    #[must_use]
    pub fn with_boxed_decision(mut self, decision: Box<dyn Decision>) -> Self {
        self.decision = decision;
        self
    }

    /// Fail instead of nesting more than `limit` relationships deep
    #[must_use]
    pub fn with_recursion_limit(mut self, limit: usize) -> Self {
        self.recursion_limit = Some(limit);
        self
    }

    #[must_use]
    pub fn walker_kind(&self) -> WalkerKind {
        self.walker
    }

    /// Build the schema of `entity`
    pub fn build(
        &self,
        registry: &Registry,
        entity: &str,
        options: BuildOptions,
    ) -> SchemaResult<Schema> {
        let entity = registry.entity(entity)?;
        debug!(
            entity = entity.name(),
            walker = ?self.walker,
            depth = ?options.depth,
            "building schema"
        );
        let walker = Walker::new(
            self.walker,
            entity,
            options.includes,
            options.excludes,
            History::default(),
        )?;

        let mut cx = BuildContext::new(registry, &options.overrides);
        let mut schema = Schema::titled(entity.name());
        schema.properties =
            self.build_properties(&mut cx, &walker, &OverrideScope::root(), options.depth, true)?;
        let definitions = cx.finish()?;
        if !definitions.is_empty() {
            schema.definitions = Some(definitions);
        }

        schema.description = entity.description().map(str::to_string);
        let required = self.detect_required(&walker, options.adjust_required.as_deref());
        if !required.is_empty() {
            schema.required = Some(required);
        }
        Ok(schema)
    }

    /// Properties of the walker's entity; nested entities go to the context's definitions
    pub fn build_properties<'r>(
        &self,
        cx: &mut BuildContext<'r, '_>,
        walker: &Walker<'r>,
        scope: &OverrideScope,
        depth: Option<usize>,
        toplevel: bool,
    ) -> SchemaResult<Map<String, Value>> {
        let mut properties = Map::new();
        if depth == Some(0) {
            return Ok(properties);
        }

        for walked in walker.walk() {
            for decided in self.decision.decide(walker, walked, toplevel)? {
                match decided.action {
                    Action::Relationship(rel) => {
                        let reference = self.build_relationship(cx, walker, rel, scope, depth)?;
                        properties.insert(rel.key().to_string(), reference);
                    }
                    Action::ForeignKey(prop) => {
                        self.build_columns(cx, prop, scope, &decided.options, &mut properties)?;
                    }
                    Action::Immediate { key, schema } => {
                        trace!(key = %key, "immediate property");
                        properties.insert(key, schema);
                    }
                }
            }
        }
        Ok(properties)
    }

    fn build_relationship<'r>(
        &self,
        cx: &mut BuildContext<'r, '_>,
        walker: &Walker<'r>,
        rel: &'r RelationshipProperty,
        scope: &OverrideScope,
        depth: Option<usize>,
    ) -> SchemaResult<Value> {
        if let Some(limit) = self.recursion_limit
            && cx.level >= limit
        {
            return Err(SchemaError::RecursionLimit(limit));
        }

        let target = cx.registry.target_of(rel)?;
        let history = walker.history().pushed(rel);
        let child = self.child_factory.child_walker(rel, walker, target, history)?;
        let child_scope = self.child_factory.child_overrides(rel, scope);

        cx.level += 1;
        let built = self.build_properties(
            cx,
            &child,
            &child_scope,
            depth.map(|d| d.saturating_sub(1)),
            false,
        );
        cx.level -= 1;

        let mut definition = Schema::object(built?);
        definition.required = Some(self.detect_required(&walker.from_child(target), None));
        debug!(
            relationship = %rel.id(),
            definition = target.name(),
            "registered definition"
        );
        cx.definitions.insert(target.name().to_string(), definition);

        let reference = Reference::definition(target.name()).to_value();
        Ok(match rel.direction() {
            Direction::OneToMany => {
                let mut array = Map::new();
                array.insert("type".to_string(), Value::from("array"));
                array.insert("items".to_string(), reference);
                Value::Object(array)
            }
            Direction::ManyToOne | Direction::ManyToMany => reference,
        })
    }

    fn build_columns(
        &self,
        cx: &mut BuildContext<'_, '_>,
        prop: &ColumnProperty,
        scope: &OverrideScope,
        options: &Map<String, Value>,
        properties: &mut Map<String, Value>,
    ) -> SchemaResult<()> {
        for column in prop.columns() {
            let ty = column_type(column)?;
            let mut sub = Map::new();
            sub.insert("type".to_string(), self.classifier.classify(ty)?.into());
            self.restrictions
                .apply(ty, &mut sub, self.classifier.resolution());
            if ty.is_array()
                && let Some(item) = ty.item_type()
            {
                let mut items = Map::new();
                items.insert("type".to_string(), self.classifier.classify(item)?.into());
                sub.insert("items".to_string(), Value::Object(items));
            }
            if let Some(doc) = column.description() {
                sub.insert("description".to_string(), Value::from(doc));
            }
            cx.overrides.apply(scope, column.name(), &mut sub);
            for (keyword, value) in options {
                sub.insert(keyword.clone(), value.clone());
            }
            trace!(column = column.name(), "column property");
            properties.insert(column.name().to_string(), Value::Object(sub));
        }
        Ok(())
    }

    /// Sorted names of the columns the walker exposes that are required
    pub fn detect_required(
        &self,
        walker: &Walker<'_>,
        adjust_required: Option<&dyn Fn(&Property, bool) -> bool>,
    ) -> Vec<String> {
        let mut required = BTreeSet::new();
        for prop in walker.walk() {
            for column in prop.columns() {
                let mut is_required = !column.is_nullable();
                if let Some(adjust) = adjust_required {
                    is_required = adjust(prop, is_required);
                }
                if is_required {
                    required.insert(column.name().to_string());
                }
            }
        }
        required.into_iter().collect()
    }
}

fn column_type(column: &Column) -> SchemaResult<&SqlType> {
    column.sql_type().ok_or_else(|| {
        SchemaError::NotImplemented(format!(
            "column `{}` is typed with a bare class instead of a type instance",
            column.name()
        ))
    })
}
