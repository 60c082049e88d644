//! Per-stage configuration values.

use crate::model::{AlgorithmConfig, EvaluationMetric};
use serde::{Deserialize, Serialize};

/// How ingestion fetches and splits the raw collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IngestionConfig {
    /// Collection fetched from the data source.
    #[serde(default = "default_collection")]
    pub collection: String,
    /// Fraction of rows held out for testing.
    #[serde(default = "default_test_ratio")]
    pub test_ratio: f64,
    /// Seed for the reproducible shuffle.
    #[serde(default = "default_split_seed")]
    pub split_seed: u64,
    /// Internal document-store identifier column removed after fetch.
    #[serde(default = "default_id_column")]
    pub id_column: String,
    /// Text values treated as missing.
    #[serde(default = "default_missing_placeholders")]
    pub missing_placeholders: Vec<String>,
}

fn default_collection() -> String {
    "vehicle_data".to_string()
}

fn default_test_ratio() -> f64 {
    0.25
}

fn default_split_seed() -> u64 {
    42
}

fn default_id_column() -> String {
    "_id".to_string()
}

fn default_missing_placeholders() -> Vec<String> {
    vec!["na".to_string()]
}

impl Default for IngestionConfig {
    fn default() -> Self {
        Self {
            collection: default_collection(),
            test_ratio: default_test_ratio(),
            split_seed: default_split_seed(),
            id_column: default_id_column(),
            missing_placeholders: default_missing_placeholders(),
        }
    }
}

impl IngestionConfig {
    /// Sets the collection.
    #[must_use]
    pub fn with_collection(mut self, collection: impl Into<String>) -> Self {
        self.collection = collection.into();
        self
    }

    /// Sets the test ratio.
    #[must_use]
    pub fn with_test_ratio(mut self, ratio: f64) -> Self {
        self.test_ratio = ratio;
        self
    }

    /// Sets the split seed.
    #[must_use]
    pub fn with_split_seed(mut self, seed: u64) -> Self {
        self.split_seed = seed;
        self
    }

    /// Returns true if `value` is a missing-value placeholder.
    #[must_use]
    pub fn is_placeholder(&self, value: &str) -> bool {
        self.missing_placeholders
            .iter()
            .any(|p| p.eq_ignore_ascii_case(value.trim()))
    }
}

/// A categorical column mapped to a single `0`/`1` feature.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BinaryColumn {
    /// Column name.
    pub column: String,
    /// Label mapped to `1`.
    pub positive_label: String,
}

impl BinaryColumn {
    /// Creates a mapping.
    #[must_use]
    pub fn new(column: impl Into<String>, positive_label: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            positive_label: positive_label.into(),
        }
    }
}

/// Which encoder each feature column receives.
///
/// Numeric columns not listed here pass through with mean imputation;
/// categorical columns not listed as binary are one-hot encoded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransformationConfig {
    /// Numeric columns standardized to zero mean and unit variance.
    #[serde(default = "default_standard_scale")]
    pub standard_scale_columns: Vec<String>,
    /// Numeric columns scaled into `[0, 1]`.
    #[serde(default = "default_min_max_scale")]
    pub min_max_scale_columns: Vec<String>,
    /// Categorical columns mapped to a single indicator.
    #[serde(default = "default_binary")]
    pub binary_columns: Vec<BinaryColumn>,
}

fn default_standard_scale() -> Vec<String> {
    ["Age", "Vintage", "Region_Code", "Policy_Sales_Channel"]
        .into_iter()
        .map(String::from)
        .collect()
}

fn default_min_max_scale() -> Vec<String> {
    vec!["Annual_Premium".to_string()]
}

fn default_binary() -> Vec<BinaryColumn> {
    vec![BinaryColumn::new("Gender", "Male")]
}

impl Default for TransformationConfig {
    fn default() -> Self {
        Self {
            standard_scale_columns: default_standard_scale(),
            min_max_scale_columns: default_min_max_scale(),
            binary_columns: default_binary(),
        }
    }
}

impl TransformationConfig {
    /// A config with no scaling and no binary columns.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            standard_scale_columns: Vec::new(),
            min_max_scale_columns: Vec::new(),
            binary_columns: Vec::new(),
        }
    }

    /// Replaces the standardized columns.
    #[must_use]
    pub fn with_standard_scale<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.standard_scale_columns = columns.into_iter().map(Into::into).collect();
        self
    }

    /// Replaces the min-max scaled columns.
    #[must_use]
    pub fn with_min_max_scale<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.min_max_scale_columns = columns.into_iter().map(Into::into).collect();
        self
    }

    /// Adds a binary column, replacing any existing mapping for it.
    #[must_use]
    pub fn with_binary(mut self, binary: BinaryColumn) -> Self {
        self.binary_columns.retain(|b| b.column != binary.column);
        self.binary_columns.push(binary);
        self
    }

    /// Looks up the binary mapping for a column.
    #[must_use]
    pub fn binary_column(&self, column: &str) -> Option<&BinaryColumn> {
        self.binary_columns.iter().find(|b| b.column == column)
    }
}

/// How the candidate is fitted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingConfig {
    /// Algorithm and hyperparameters.
    #[serde(default)]
    pub algorithm: AlgorithmConfig,
    /// Minimum training accuracy; below it training fails as underfit.
    #[serde(default = "default_min_training_score")]
    pub min_training_score: f64,
}

fn default_min_training_score() -> f64 {
    0.6
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            algorithm: AlgorithmConfig::default(),
            min_training_score: default_min_training_score(),
        }
    }
}

impl TrainingConfig {
    /// Sets the algorithm.
    #[must_use]
    pub fn with_algorithm(mut self, algorithm: AlgorithmConfig) -> Self {
        self.algorithm = algorithm;
        self
    }

    /// Sets the underfitting floor.
    #[must_use]
    pub fn with_min_training_score(mut self, score: f64) -> Self {
        self.min_training_score = score;
        self
    }
}

/// How the candidate is compared against the published baseline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationConfig {
    /// Registry key of the baseline model.
    #[serde(default = "default_model_key")]
    pub baseline_key: String,
    /// Metric compared.
    #[serde(default)]
    pub metric: EvaluationMetric,
    /// Required improvement over the baseline; accepted iff the delta is
    /// strictly greater.
    #[serde(default = "default_threshold")]
    pub threshold: f64,
}

fn default_model_key() -> String {
    "model-registry/model.json".to_string()
}

fn default_threshold() -> f64 {
    0.02
}

impl Default for EvaluationConfig {
    fn default() -> Self {
        Self {
            baseline_key: default_model_key(),
            metric: EvaluationMetric::default(),
            threshold: default_threshold(),
        }
    }
}

impl EvaluationConfig {
    /// Sets the threshold.
    #[must_use]
    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = threshold;
        self
    }

    /// Sets the metric.
    #[must_use]
    pub fn with_metric(mut self, metric: EvaluationMetric) -> Self {
        self.metric = metric;
        self
    }
}

/// Where accepted models are published.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicationConfig {
    /// Registry key overwritten on publication.
    #[serde(default = "default_model_key")]
    pub model_key: String,
}

impl Default for PublicationConfig {
    fn default() -> Self {
        Self {
            model_key: default_model_key(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let ingestion = IngestionConfig::default();
        assert_eq!(ingestion.id_column, "_id");
        assert!(ingestion.is_placeholder("NA"));
        assert!(ingestion.is_placeholder(" na "));
        assert!(!ingestion.is_placeholder("nan"));

        let eval = EvaluationConfig::default();
        assert_eq!(eval.threshold, 0.02);
        assert_eq!(eval.baseline_key, PublicationConfig::default().model_key);
    }

    #[test]
    fn test_binary_column_replacement() {
        let config = TransformationConfig::default().with_binary(BinaryColumn::new("Gender", "Female"));
        assert_eq!(config.binary_columns.len(), 1);
        assert_eq!(config.binary_column("Gender").unwrap().positive_label, "Female");
        assert!(config.binary_column("Age").is_none());
    }

    #[test]
    fn test_partial_json() {
        let training: TrainingConfig =
            serde_json::from_str(r#"{"algorithm":{"algorithm":"majority_class"}}"#).unwrap();
        assert_eq!(training.algorithm, AlgorithmConfig::MajorityClass);
        assert_eq!(training.min_training_score, 0.6);
    }
}
