//! Named-strategy entry point: picks walker, decision and layout from configuration

use crate::decision::DecisionKind;
use crate::factory::{ChildFactory, SchemaFactory};
use crate::transformer::{
    AsyncApi2Transformer, JsonSchemaTransformer, OpenApi2Transformer, OpenApi3Transformer,
    Swagger2Transformer, Target, Transformer,
};
use crate::walker::WalkerKind;
use relschema_core::{Document, Layout, Registry, SchemaError, SchemaResult};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

/// Driver configuration, usually read from a `relschema.toml`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DriverConfig {
    /// `structural`, `noforeignkey` or `foreignkey`
    pub walker: WalkerKind,
    /// `default` or `useforeignkey`
    pub decision: DecisionKind,
    /// `jsonschema`, `swagger2`, `openapi2`, `openapi3` or `asyncapi2`
    pub layout: Layout,
    /// Relationship levels to expand; unlimited when absent
    pub depth: Option<usize>,
    /// Separator of nested include/exclude/override paths
    pub splitter: String,
    /// Keep reverse relationships when descending
    pub bidirectional: bool,
    /// Fail past this many nested relationships
    pub recursion_limit: Option<usize>,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            walker: WalkerKind::default(),
            decision: DecisionKind::default(),
            layout: Layout::default(),
            depth: None,
            splitter: ".".to_string(),
            bidirectional: false,
            recursion_limit: None,
        }
    }
}

impl DriverConfig {
    /// Load configuration from a TOML file
    pub fn from_file(path: impl AsRef<Path>) -> SchemaResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| SchemaError::Config(format!("failed to read {}: {e}", path.display())))?;
        Self::from_toml_str(&content)
    }

    /// Parse configuration from TOML text
    pub fn from_toml_str(content: &str) -> SchemaResult<Self> {
        let config: Self = toml::from_str(content)
            .map_err(|e| SchemaError::Config(format!("failed to parse configuration: {e}")))?;
        if config.splitter.is_empty() {
            return Err(SchemaError::Config("splitter cannot be empty".to_string()));
        }
        Ok(config)
    }

    /// The schema factory this configuration describes
    #[must_use]
    pub fn factory(&self) -> SchemaFactory {
        let factory = SchemaFactory::new(self.walker)
            .with_boxed_decision(self.decision.build())
            .with_child_factory(ChildFactory::new(self.splitter.clone(), self.bidirectional));
        match self.recursion_limit {
            Some(limit) => factory.with_recursion_limit(limit),
            None => factory,
        }
    }
}

/// Runs the transformer selected by a [`DriverConfig`]
pub struct Driver {
    config: DriverConfig,
    transformer: Box<dyn Transformer>,
}

impl std::fmt::Debug for Driver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Driver").field("config", &self.config).finish()
    }
}

impl Driver {
    #[must_use]
    pub fn new(config: DriverConfig) -> Self {
        let factory = config.factory();
        let transformer: Box<dyn Transformer> = match config.layout {
            Layout::JsonSchema => Box::new(JsonSchemaTransformer::new(factory)),
            Layout::Swagger2 => Box::new(Swagger2Transformer::new(factory)),
            Layout::OpenApi2 => Box::new(OpenApi2Transformer::new(factory)),
            Layout::OpenApi3 => Box::new(OpenApi3Transformer::new(factory)),
            Layout::AsyncApi2 => Box::new(AsyncApi2Transformer::new(factory)),
        };
        Self { config, transformer }
    }

    #[must_use]
    pub fn config(&self) -> &DriverConfig {
        &self.config
    }

    /// Build the configured document for `targets`
    pub fn run(&self, registry: &Registry, targets: &[Target<'_>]) -> SchemaResult<Document> {
        info!(
            walker = ?self.config.walker,
            decision = ?self.config.decision,
            layout = ?self.config.layout,
            targets = targets.len(),
            "generating schema document"
        );
        self.transformer.transform(registry, targets, self.config.depth)
    }
}

impl Default for Driver {
    fn default() -> Self {
        Self::new(DriverConfig::default())
    }
}
