//! The immutable record each stage produces.

use crate::core::{Artifact, ArtifactMeta};
use crate::model::{AlgorithmConfig, ClassificationMetrics, EvaluationMetric};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

macro_rules! impl_artifact {
    ($($ty:ty),+ $(,)?) => {
        $(
            impl Artifact for $ty {
                fn meta(&self) -> &ArtifactMeta {
                    &self.meta
                }
            }
        )+
    };
}

/// Which ingestion partition a check ran against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Partition {
    /// Training rows.
    Train,
    /// Held-out rows.
    Test,
}

impl fmt::Display for Partition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Train => write!(f, "train"),
            Self::Test => write!(f, "test"),
        }
    }
}

/// A validation check, in evaluation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckKind {
    /// Observed column count equals the schema's.
    ColumnCount,
    /// A required column is present.
    RequiredColumn,
    /// A non-nullable column has no missing values.
    Nullability,
    /// A numeric column holds numbers.
    NumericType,
    /// A numeric value lies within the declared range.
    Range,
    /// An integer column holds whole numbers.
    Integer,
    /// A categorical value is in the allowed set.
    AllowedValues,
    /// A categorical value matches the declared pattern.
    Pattern,
    /// A target value is a 0/1 label.
    TargetLabel,
}

impl fmt::Display for CheckKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::ColumnCount => "column_count",
            Self::RequiredColumn => "required_column",
            Self::Nullability => "nullability",
            Self::NumericType => "numeric_type",
            Self::Range => "range",
            Self::Integer => "integer",
            Self::AllowedValues => "allowed_values",
            Self::Pattern => "pattern",
            Self::TargetLabel => "target_label",
        };
        write!(f, "{name}")
    }
}

/// One aggregated schema violation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Violation {
    /// Partition checked.
    pub partition: Partition,
    /// Check that failed.
    pub check: CheckKind,
    /// Column concerned, if the check is per column.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column: Option<String>,
    /// Rows that failed; zero for dataset-level checks.
    pub offending_rows: usize,
    /// First offending value, rendered.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sample: Option<String>,
    /// Human-readable description.
    pub message: String,
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.partition, self.message)
    }
}

/// Output of ingestion: the two partitions and their sizes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IngestionArtifact {
    /// Identity and lineage.
    pub meta: ArtifactMeta,
    /// Collection fetched.
    pub collection: String,
    /// Training partition dataset file.
    pub train_path: PathBuf,
    /// Test partition dataset file.
    pub test_path: PathBuf,
    /// Rows in the training partition.
    pub train_rows: usize,
    /// Rows in the test partition.
    pub test_rows: usize,
    /// Columns after dropping the internal id.
    pub column_count: usize,
    /// Seed used for the shuffle.
    pub split_seed: u64,
}

/// Output of validation: the gate verdict and its report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationArtifact {
    /// Identity and lineage.
    pub meta: ArtifactMeta,
    /// True iff the report is empty.
    pub is_valid: bool,
    /// Every violation found, in check order.
    pub validation_report: Vec<Violation>,
    /// When the checks ran.
    pub checked_at: DateTime<Utc>,
}

impl ValidationArtifact {
    /// The report rendered one line per violation.
    #[must_use]
    pub fn report_lines(&self) -> Vec<String> {
        self.validation_report.iter().map(ToString::to_string).collect()
    }
}

/// Output of transformation: encoded partitions and fitted encoder state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransformationArtifact {
    /// Identity and lineage.
    pub meta: ArtifactMeta,
    /// Encoded training features.
    pub train_features_path: PathBuf,
    /// Encoded test features.
    pub test_features_path: PathBuf,
    /// Training labels.
    pub train_labels_path: PathBuf,
    /// Test labels.
    pub test_labels_path: PathBuf,
    /// Serialized fitted transformer.
    pub transformer_path: PathBuf,
    /// Raw test partition, for scoring models through their own encoders.
    pub raw_test_path: PathBuf,
    /// Encoded feature names.
    pub feature_names: Vec<String>,
    /// Feature-schema fingerprint.
    pub fingerprint: String,
}

/// Output of training: the candidate model and how it fits its own data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingArtifact {
    /// Identity and lineage.
    pub meta: ArtifactMeta,
    /// Serialized model bundle.
    pub model_path: PathBuf,
    /// Algorithm and hyperparameters.
    pub algorithm: AlgorithmConfig,
    /// Training accuracy.
    pub training_score: f64,
    /// Full training metric breakdown.
    pub training_metrics: ClassificationMetrics,
    /// Feature-schema fingerprint the model was trained against.
    pub fingerprint: String,
}

/// The accept/reject verdict of an evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EvaluationDecision {
    /// Whether the candidate may be published.
    pub accepted: bool,
    /// `candidate_score - baseline_score`; zero when there is no baseline
    /// and no comparison took place.
    pub score_delta: f64,
    /// Baseline score; `None` when no model was published yet.
    pub baseline_score: Option<f64>,
    /// Candidate score.
    pub candidate_score: f64,
    /// Required improvement.
    pub threshold: f64,
}

/// Output of evaluation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationArtifact {
    /// Identity and lineage.
    pub meta: ArtifactMeta,
    /// The verdict.
    pub decision: EvaluationDecision,
    /// Metric the verdict was based on.
    pub metric: EvaluationMetric,
    /// Candidate metrics on the test partition.
    pub candidate_metrics: ClassificationMetrics,
    /// Baseline metrics on the same rows.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub baseline_metrics: Option<ClassificationMetrics>,
    /// Registry key the baseline was read from.
    pub baseline_key: String,
}

/// Output of publication.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublicationArtifact {
    /// Identity and lineage.
    pub meta: ArtifactMeta,
    /// Registry key written.
    pub model_key: String,
    /// Location reported by the registry.
    pub registry_location: String,
    /// When the upload committed.
    pub published_at: DateTime<Utc>,
    /// Base64 MD5 of the uploaded bytes.
    pub content_md5: String,
    /// Fingerprint of the published model.
    pub fingerprint: String,
}

impl_artifact!(
    IngestionArtifact,
    ValidationArtifact,
    TransformationArtifact,
    TrainingArtifact,
    EvaluationArtifact,
    PublicationArtifact,
);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{RunId, StageName};

    #[test]
    fn test_violation_rendering() {
        let v = Violation {
            partition: Partition::Test,
            check: CheckKind::Nullability,
            column: Some("Age".into()),
            offending_rows: 2,
            sample: None,
            message: "column 'Age' has 2 missing value(s)".into(),
        };
        assert_eq!(v.to_string(), "[test] column 'Age' has 2 missing value(s)");
        assert_eq!(CheckKind::AllowedValues.to_string(), "allowed_values");

        let json = serde_json::to_value(&v).unwrap();
        assert_eq!(json["check"], "nullability");
        assert!(json.get("sample").is_none());
    }

    #[test]
    fn test_report_lines() {
        let artifact = ValidationArtifact {
            meta: ArtifactMeta::new(
                RunId::from_string("r"),
                StageName::Validation,
                "v.json",
                vec![],
            ),
            is_valid: false,
            validation_report: vec![Violation {
                partition: Partition::Train,
                check: CheckKind::ColumnCount,
                column: None,
                offending_rows: 0,
                sample: None,
                message: "expected 3 columns, found 2".into(),
            }],
            checked_at: Utc::now(),
        };
        assert_eq!(artifact.report_lines(), vec!["[train] expected 3 columns, found 2"]);
        assert_eq!(artifact.reference().stage, StageName::Validation);
    }
}
