//! Error types for vehicleflow.
//!
//! Gating outcomes (a failed validation, a rejected model) are not errors:
//! they are recorded in artifacts and inspected by the orchestrator. The
//! types here cover true faults, which abort a run.

use crate::artifacts::{Partition, StoreError};
use crate::config::ConfigError;
use crate::core::StageName;
use crate::data::SourceError;
use crate::features::TransformError;
use crate::model::TrainerError;
use crate::registry::RegistryError;
use crate::schema::SchemaLoadError;
use serde::{Deserialize, Serialize};
use std::error::Error as _;
use thiserror::Error;

/// The main fault type raised by stages.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The data source could not be reached within its retry budget.
    #[error("source '{collection}' unavailable after {attempts} attempt(s)")]
    SourceUnavailable {
        /// Collection that was being fetched.
        collection: String,
        /// Attempts made, including the first.
        attempts: usize,
        /// The last error returned by the source.
        #[source]
        source: SourceError,
    },

    /// The data source returned a non-retryable error.
    #[error(transparent)]
    Source(#[from] SourceError),

    /// Retrieval succeeded but produced no rows.
    #[error("source '{collection}' returned zero rows")]
    EmptyDataset {
        /// Collection that was fetched.
        collection: String,
    },

    /// The split left one partition without rows.
    #[error("splitting {rows} rows of '{collection}' at test ratio {test_ratio} leaves the {partition} partition empty")]
    EmptyPartition {
        /// Collection that was fetched.
        collection: String,
        /// The empty partition.
        partition: Partition,
        /// Rows available after cleansing.
        rows: usize,
        /// Configured test ratio.
        test_ratio: f64,
    },

    /// The schema contract could not be loaded.
    #[error(transparent)]
    SchemaLoad(#[from] SchemaLoadError),

    /// Feature engineering failed.
    #[error(transparent)]
    Transformation(#[from] TransformError),

    /// The estimator could not be fitted or underfit its training data.
    #[error(transparent)]
    ModelTrainer(#[from] TrainerError),

    /// The currently published model could not be read.
    #[error("baseline model '{key}' could not be read")]
    BaselineUnreadable {
        /// Registry key of the baseline.
        key: String,
        /// Underlying registry error.
        #[source]
        source: RegistryError,
    },

    /// A persisted model bundle could not be decoded.
    #[error("model bundle '{key}' is not decodable")]
    ModelDecode {
        /// Registry key or path of the bundle.
        key: String,
        /// Decoding error.
        #[source]
        source: serde_json::Error,
    },

    /// Uploading the accepted model failed; the previous model is untouched.
    #[error("publication to '{key}' failed")]
    Publication {
        /// Registry key being written.
        key: String,
        /// Underlying registry error.
        #[source]
        source: RegistryError,
    },

    /// A stage was handed an upstream artifact it must not consume.
    #[error("{stage} refused its upstream artifact: {reason}")]
    UpstreamRejected {
        /// The refusing stage.
        stage: StageName,
        /// Why the artifact was refused.
        reason: String,
    },

    /// Reading or writing a run-scoped artifact failed.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// The run was cancelled at a stage boundary.
    #[error("run cancelled: {reason}")]
    Cancelled {
        /// Reason given to the cancellation token.
        reason: String,
    },

    /// Configuration was invalid.
    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl PipelineError {
    /// Creates an upstream rejection error.
    #[must_use]
    pub fn upstream_rejected(stage: StageName, reason: impl Into<String>) -> Self {
        Self::UpstreamRejected {
            stage,
            reason: reason.into(),
        }
    }

    /// Returns the taxonomy name of this error.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::SourceUnavailable { .. } => "SourceUnavailable",
            Self::Source(_) | Self::EmptyDataset { .. } | Self::EmptyPartition { .. } => {
                "DataSourceError"
            }
            Self::SchemaLoad(_) => "SchemaLoadError",
            Self::Transformation(_) => "TransformationError",
            Self::ModelTrainer(_) => "ModelTrainerError",
            Self::BaselineUnreadable { .. } | Self::ModelDecode { .. } => "EvaluationError",
            Self::Publication { .. } => "PublicationError",
            Self::UpstreamRejected { .. } => "UpstreamRejected",
            Self::Store(_) => "ArtifactStoreError",
            Self::Cancelled { .. } => "Cancelled",
            Self::Config(_) => "ConfigError",
        }
    }
}

/// A fault tagged with the stage it originated in.
#[derive(Debug, Error)]
#[error("stage '{stage}' failed")]
pub struct StageFault {
    /// The stage that raised the fault.
    pub stage: StageName,
    /// The cause.
    #[source]
    pub error: PipelineError,
}

impl StageFault {
    /// Creates a new stage fault.
    #[must_use]
    pub fn new(stage: StageName, error: PipelineError) -> Self {
        Self { stage, error }
    }

    /// Returns the messages of the cause chain, outermost first, excluding
    /// the fault's own message.
    #[must_use]
    pub fn cause_chain(&self) -> Vec<String> {
        let mut chain = Vec::new();
        let mut current: Option<&(dyn std::error::Error + 'static)> = self.source();
        while let Some(err) = current {
            chain.push(err.to_string());
            current = err.source();
        }
        chain
    }

    /// Builds a serializable summary of the fault.
    #[must_use]
    pub fn report(&self) -> FaultReport {
        FaultReport {
            stage: self.stage,
            kind: self.error.kind().to_string(),
            message: self.to_string(),
            causes: self.cause_chain(),
        }
    }
}

/// Serializable summary of a [`StageFault`], written into the run trace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FaultReport {
    /// The stage that raised the fault.
    pub stage: StageName,
    /// Taxonomy name of the cause.
    pub kind: String,
    /// The fault message.
    pub message: String,
    /// Messages of the cause chain, outermost first.
    pub causes: Vec<String>,
}
