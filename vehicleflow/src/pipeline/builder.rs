//! Pipeline builder with validation.

use super::Pipeline;
use crate::cancellation::CancellationToken;
use crate::config::{ConfigError, PipelineConfig};
use crate::data::DataSource;
use crate::events::{EventSink, NoOpEventSink};
use crate::registry::ModelRegistry;
use crate::schema::SchemaRegistry;
use std::fmt;
use std::sync::Arc;

/// Builder wiring configuration and collaborators into a [`Pipeline`].
#[derive(Default)]
pub struct PipelineBuilder {
    config: PipelineConfig,
    source: Option<Arc<dyn DataSource>>,
    schema_registry: Option<Arc<dyn SchemaRegistry>>,
    model_registry: Option<Arc<dyn ModelRegistry>>,
    events: Option<Arc<dyn EventSink>>,
    cancellation: Option<CancellationToken>,
}

impl fmt::Debug for PipelineBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PipelineBuilder")
            .field("config", &self.config)
            .field("has_source", &self.source.is_some())
            .field("has_schema_registry", &self.schema_registry.is_some())
            .field("has_model_registry", &self.model_registry.is_some())
            .finish_non_exhaustive()
    }
}

impl PipelineBuilder {
    /// Creates a builder around `config`.
    #[must_use]
    pub fn new(config: PipelineConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    /// Sets the raw data source.
    #[must_use]
    pub fn source(mut self, source: Arc<dyn DataSource>) -> Self {
        self.source = Some(source);
        self
    }

    /// Sets the schema registry.
    #[must_use]
    pub fn schema_registry(mut self, registry: Arc<dyn SchemaRegistry>) -> Self {
        self.schema_registry = Some(registry);
        self
    }

    /// Sets the model registry used for baselines and publication.
    #[must_use]
    pub fn model_registry(mut self, registry: Arc<dyn ModelRegistry>) -> Self {
        self.model_registry = Some(registry);
        self
    }

    /// Sets the event sink. Defaults to [`NoOpEventSink`].
    #[must_use]
    pub fn event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.events = Some(sink);
        self
    }

    /// Shares an existing cancellation token with the pipeline.
    #[must_use]
    pub fn cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }

    /// Builds the pipeline.
    ///
    /// # Errors
    ///
    /// Returns an error if a collaborator is missing or the configuration
    /// fails validation.
    pub fn build(self) -> Result<Pipeline, ConfigError> {
        self.config.validate()?;

        Ok(Pipeline {
            source: self.source.ok_or(ConfigError::MissingComponent("source"))?,
            schema_registry: self
                .schema_registry
                .ok_or(ConfigError::MissingComponent("schema_registry"))?,
            model_registry: self
                .model_registry
                .ok_or(ConfigError::MissingComponent("model_registry"))?,
            events: self.events.unwrap_or_else(|| Arc::new(NoOpEventSink)),
            cancellation: self.cancellation.unwrap_or_default(),
            config: self.config,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EvaluationConfig;
    use crate::data::InMemoryDataSource;
    use crate::registry::InMemoryModelRegistry;
    use crate::schema::StaticSchemaRegistry;
    use crate::testing::vehicle_schema_document;

    fn complete() -> PipelineBuilder {
        PipelineBuilder::new(PipelineConfig::new())
            .source(Arc::new(InMemoryDataSource::new()))
            .schema_registry(Arc::new(StaticSchemaRegistry::new(vehicle_schema_document())))
            .model_registry(Arc::new(InMemoryModelRegistry::new()))
    }

    #[test]
    fn test_builder_success() {
        let pipeline = complete().build().unwrap();
        assert_eq!(pipeline.config().ingestion.collection, "vehicle_data");
        assert!(!pipeline.cancellation_token().is_cancelled());
    }

    #[test]
    fn test_builder_missing_component() {
        let err = PipelineBuilder::new(PipelineConfig::new())
            .source(Arc::new(InMemoryDataSource::new()))
            .model_registry(Arc::new(InMemoryModelRegistry::new()))
            .build()
            .unwrap_err();
        assert!(matches!(err, ConfigError::MissingComponent("schema_registry")));
    }

    #[test]
    fn test_builder_validates_config() {
        let config =
            PipelineConfig::new().with_evaluation(EvaluationConfig::default().with_threshold(-0.1));
        let err = PipelineBuilder::new(config)
            .source(Arc::new(InMemoryDataSource::new()))
            .schema_registry(Arc::new(StaticSchemaRegistry::new(vehicle_schema_document())))
            .model_registry(Arc::new(InMemoryModelRegistry::new()))
            .build()
            .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { .. }));
    }

    #[test]
    fn test_shared_cancellation_token() {
        let token = CancellationToken::new();
        let pipeline = complete().cancellation(token.clone()).build().unwrap();
        token.cancel("shutdown");
        assert!(pipeline.cancellation_token().is_cancelled());
    }
}
