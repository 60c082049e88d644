//! The persisted unit of a trained model.

use super::{AlgorithmConfig, ClassificationMetrics, FittedModel};
use crate::core::RunId;
use crate::data::Dataset;
use crate::errors::PipelineError;
use crate::features::FittedTransformer;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Descriptive metadata stored with a model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelMetadata {
    /// Algorithm and hyperparameters.
    pub algorithm: AlgorithmConfig,
    /// Feature-schema fingerprint the model was trained against.
    pub fingerprint: String,
    /// Run that trained the model.
    pub run_id: RunId,
    /// When training finished.
    pub trained_at: DateTime<Utc>,
    /// Accuracy on the training partition.
    pub training_score: f64,
}

/// A fitted model together with the transformer that produced its inputs.
///
/// Bundling both lets the baseline and the serving layer encode raw rows
/// exactly as they were encoded during training.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelBundle {
    /// Descriptive metadata.
    pub metadata: ModelMetadata,
    /// Fitted feature encoders.
    pub transformer: FittedTransformer,
    /// Fitted estimator.
    pub model: FittedModel,
}

impl ModelBundle {
    /// Serializes the bundle.
    pub fn to_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    /// Decodes a bundle.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }

    /// The feature-schema fingerprint.
    #[must_use]
    pub fn fingerprint(&self) -> &str {
        &self.metadata.fingerprint
    }

    /// Encodes raw rows with the bundled transformer and scores the model
    /// against their target column.
    pub fn evaluate(&self, data: &Dataset) -> Result<ClassificationMetrics, PipelineError> {
        let features = self.transformer.transform(data)?;
        let labels = self.transformer.labels(data)?;
        Ok(self.model.evaluate(&features, &labels)?)
    }
}
