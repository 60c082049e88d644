//! Pipeline configuration.
//!
//! One [`PipelineConfig`] is built at process start and handed to the
//! pipeline, which passes each stage its own section by reference.

mod stages;

pub use stages::{
    BinaryColumn, EvaluationConfig, IngestionConfig, PublicationConfig, TrainingConfig,
    TransformationConfig,
};

use crate::data::RetryConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Env var naming a JSON config file.
pub const ENV_CONFIG: &str = "VEHICLEFLOW_CONFIG";
/// Env var overriding [`PipelineConfig::artifact_root`].
pub const ENV_ARTIFACT_ROOT: &str = "VEHICLEFLOW_ARTIFACT_ROOT";
/// Env var overriding [`PipelineConfig::registry_root`].
pub const ENV_REGISTRY_ROOT: &str = "VEHICLEFLOW_REGISTRY_ROOT";
/// Env var overriding [`IngestionConfig::collection`].
pub const ENV_COLLECTION: &str = "VEHICLEFLOW_COLLECTION";

/// Errors raised while loading or checking configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The config file could not be read.
    #[error("failed to read config '{}'", path.display())]
    Io {
        /// Config path.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// The config file is not valid JSON for the expected shape.
    #[error("failed to parse config '{}'", path.display())]
    Parse {
        /// Config path.
        path: PathBuf,
        /// Decoder error.
        #[source]
        source: serde_json::Error,
    },

    /// A value is out of range.
    #[error("invalid config value for '{field}': {reason}")]
    Invalid {
        /// Dotted field path.
        field: &'static str,
        /// What is wrong.
        reason: String,
    },

    /// A pipeline collaborator was not supplied.
    #[error("pipeline is missing its {0}")]
    MissingComponent(&'static str),
}

/// Top-level configuration for a pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Directory under which each run writes its artifacts.
    #[serde(default = "default_artifact_root")]
    pub artifact_root: PathBuf,
    /// JSON schema contract read by the file schema registry.
    #[serde(default = "default_schema_path")]
    pub schema_path: PathBuf,
    /// Directory of JSON-lines collection exports.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    /// Root of the filesystem model registry.
    #[serde(default = "default_registry_root")]
    pub registry_root: PathBuf,
    /// Retry budget for data source fetches.
    #[serde(default)]
    pub source_retry: RetryConfig,
    /// Ingestion settings.
    #[serde(default)]
    pub ingestion: IngestionConfig,
    /// Transformation settings.
    #[serde(default)]
    pub transformation: TransformationConfig,
    /// Training settings.
    #[serde(default)]
    pub training: TrainingConfig,
    /// Evaluation settings.
    #[serde(default)]
    pub evaluation: EvaluationConfig,
    /// Publication settings.
    #[serde(default)]
    pub publication: PublicationConfig,
}

fn default_artifact_root() -> PathBuf {
    PathBuf::from("artifacts")
}

fn default_schema_path() -> PathBuf {
    PathBuf::from("config/schema.json")
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("data")
}

fn default_registry_root() -> PathBuf {
    PathBuf::from("registry")
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            artifact_root: default_artifact_root(),
            schema_path: default_schema_path(),
            data_dir: default_data_dir(),
            registry_root: default_registry_root(),
            source_retry: RetryConfig::default(),
            ingestion: IngestionConfig::default(),
            transformation: TransformationConfig::default(),
            training: TrainingConfig::default(),
            evaluation: EvaluationConfig::default(),
            publication: PublicationConfig::default(),
        }
    }
}

impl PipelineConfig {
    /// Creates a configuration with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads a JSON config file. Missing fields take their defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Builds a configuration from the process environment.
    ///
    /// Starts from the file named by `VEHICLEFLOW_CONFIG` (or defaults),
    /// applies the path and collection overrides, then validates.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Like [`PipelineConfig::from_env`], reading variables through `lookup`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = match lookup(ENV_CONFIG) {
            Some(path) => Self::from_json_file(path)?,
            None => Self::default(),
        };
        if let Some(root) = lookup(ENV_ARTIFACT_ROOT) {
            config.artifact_root = PathBuf::from(root);
        }
        if let Some(root) = lookup(ENV_REGISTRY_ROOT) {
            config.registry_root = PathBuf::from(root);
        }
        if let Some(collection) = lookup(ENV_COLLECTION) {
            config.ingestion.collection = collection;
        }
        config.validate()?;
        Ok(config)
    }

    /// Sets the artifact root.
    #[must_use]
    pub fn with_artifact_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.artifact_root = root.into();
        self
    }

    /// Sets the ingestion section.
    #[must_use]
    pub fn with_ingestion(mut self, ingestion: IngestionConfig) -> Self {
        self.ingestion = ingestion;
        self
    }

    /// Sets the transformation section.
    #[must_use]
    pub fn with_transformation(mut self, transformation: TransformationConfig) -> Self {
        self.transformation = transformation;
        self
    }

    /// Sets the training section.
    #[must_use]
    pub fn with_training(mut self, training: TrainingConfig) -> Self {
        self.training = training;
        self
    }

    /// Sets the evaluation section.
    #[must_use]
    pub fn with_evaluation(mut self, evaluation: EvaluationConfig) -> Self {
        self.evaluation = evaluation;
        self
    }

    /// Sets the publication section.
    #[must_use]
    pub fn with_publication(mut self, publication: PublicationConfig) -> Self {
        self.publication = publication;
        self
    }

    /// Sets the data source retry budget.
    #[must_use]
    pub fn with_source_retry(mut self, retry: RetryConfig) -> Self {
        self.source_retry = retry;
        self
    }

    /// Checks value ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        fn invalid(field: &'static str, reason: impl Into<String>) -> ConfigError {
            ConfigError::Invalid {
                field,
                reason: reason.into(),
            }
        }

        let ratio = self.ingestion.test_ratio;
        if !(ratio > 0.0 && ratio < 1.0) {
            return Err(invalid(
                "ingestion.test_ratio",
                format!("{ratio} is not in (0, 1)"),
            ));
        }
        if self.ingestion.collection.trim().is_empty() {
            return Err(invalid("ingestion.collection", "must not be empty"));
        }
        let min_score = self.training.min_training_score;
        if !(0.0..=1.0).contains(&min_score) {
            return Err(invalid(
                "training.min_training_score",
                format!("{min_score} is not in [0, 1]"),
            ));
        }
        let threshold = self.evaluation.threshold;
        if !threshold.is_finite() || threshold < 0.0 {
            return Err(invalid(
                "evaluation.threshold",
                format!("{threshold} must be a non-negative number"),
            ));
        }
        if self.evaluation.baseline_key.is_empty() {
            return Err(invalid("evaluation.baseline_key", "must not be empty"));
        }
        if self.publication.model_key.is_empty() {
            return Err(invalid("publication.model_key", "must not be empty"));
        }
        if self.source_retry.max_attempts == 0 {
            return Err(invalid("source_retry.max_attempts", "must be at least 1"));
        }
        Ok(())
    }
}
