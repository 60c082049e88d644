//! # Vehicleflow
//!
//! An artifact-gated batch pipeline that trains and publishes vehicle
//! insurance response models.
//!
//! A run executes six stages strictly in order:
//!
//! - **Ingestion**: fetch a collection, drop the internal id, split train/test
//! - **Validation**: check both partitions against the schema contract
//! - **Transformation**: fit encoders on train, encode both partitions
//! - **Training**: fit the configured estimator
//! - **Evaluation**: compare the candidate against the published baseline
//! - **Publication**: atomically replace the baseline in the model registry
//!
//! Every stage persists an immutable artifact under
//! `<artifact_root>/<run_id>/<stage>/`. A failed validation or a rejected
//! candidate ends the run early; faults abort it with the originating stage
//! and a cause chain.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use vehicleflow::prelude::*;
//! use std::sync::Arc;
//!
//! let pipeline = PipelineBuilder::new(PipelineConfig::from_env()?)
//!     .source(Arc::new(JsonLinesDataSource::new("data")))
//!     .schema_registry(Arc::new(JsonFileSchemaRegistry::new("config/schema.json")))
//!     .model_registry(Arc::new(FsModelRegistry::new("registry")))
//!     .build()?;
//!
//! let result = pipeline.run().await;
//! std::process::exit(result.exit_code());
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::cast_precision_loss
)]

pub mod artifacts;
pub mod cancellation;
pub mod config;
pub mod core;
pub mod data;
pub mod errors;
pub mod events;
pub mod features;
pub mod model;
pub mod observability;
pub mod pipeline;
pub mod registry;
pub mod schema;
pub mod serving;
pub mod stages;
pub mod testing;
pub mod utils;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::artifacts::{
        ArtifactStore, EvaluationArtifact, EvaluationDecision, IngestionArtifact,
        PublicationArtifact, TrainingArtifact, TransformationArtifact, ValidationArtifact,
        Violation,
    };
    pub use crate::cancellation::CancellationToken;
    pub use crate::config::{
        EvaluationConfig, IngestionConfig, PipelineConfig, PublicationConfig, TrainingConfig,
        TransformationConfig,
    };
    pub use crate::core::{Artifact, ArtifactMeta, RunId, StageName, StageStatus};
    pub use crate::data::{
        DataSource, Dataset, InMemoryDataSource, JsonLinesDataSource, RetryConfig,
        RetryingDataSource,
    };
    pub use crate::errors::{PipelineError, StageFault};
    pub use crate::events::{EventSink, LoggingEventSink, NoOpEventSink};
    pub use crate::model::{AlgorithmConfig, EvaluationMetric, ModelBundle};
    pub use crate::observability::{init_tracing, LogFormat};
    pub use crate::pipeline::{Pipeline, PipelineBuilder, PipelineResult, RunOutcome};
    pub use crate::registry::{FsModelRegistry, InMemoryModelRegistry, ModelRegistry};
    pub use crate::schema::{JsonFileSchemaRegistry, SchemaContract, SchemaRegistry};
    pub use crate::serving::{Predictor, ServingSchema};
}
