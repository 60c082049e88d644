//! The estimator seam and fitted model representation.

use super::logistic::{LogisticModel, LogisticRegression, LogisticRegressionParams};
use super::ClassificationMetrics;
use crate::features::FeatureMatrix;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised while fitting or applying a model.
#[derive(Debug, Error)]
pub enum TrainerError {
    /// No rows to fit on.
    #[error("training set is empty")]
    EmptyTrainingSet,

    /// Feature rows and labels disagree in length.
    #[error("{rows} feature rows but {labels} labels")]
    LabelCountMismatch {
        /// Feature rows.
        rows: usize,
        /// Labels.
        labels: usize,
    },

    /// Input width differs from what the model was fitted on.
    #[error("model expects {expected} features, got {actual}")]
    DimensionMismatch {
        /// Fitted width.
        expected: usize,
        /// Supplied width.
        actual: usize,
    },

    /// The fitted parameters are not finite.
    #[error("{algorithm} diverged during fitting")]
    Diverged {
        /// Algorithm identifier.
        algorithm: &'static str,
    },

    /// The fitted model scores below the configured floor on its own
    /// training data.
    #[error("training score {score:.4} is below the minimum {minimum:.4}")]
    Underfitting {
        /// Achieved training accuracy.
        score: f64,
        /// Configured minimum.
        minimum: f64,
    },
}

/// A black-box estimator.
pub trait Estimator: Send + Sync {
    /// Algorithm identifier.
    fn algorithm(&self) -> &'static str;

    /// Fits a model to encoded features and `0.0`/`1.0` labels.
    fn fit(&self, features: &FeatureMatrix, labels: &[f64]) -> Result<FittedModel, TrainerError>;
}

fn check_training_set(features: &FeatureMatrix, labels: &[f64]) -> Result<(), TrainerError> {
    if features.is_empty() {
        return Err(TrainerError::EmptyTrainingSet);
    }
    if features.n_rows() != labels.len() {
        return Err(TrainerError::LabelCountMismatch {
            rows: features.n_rows(),
            labels: labels.len(),
        });
    }
    Ok(())
}

impl Estimator for LogisticRegression {
    fn algorithm(&self) -> &'static str {
        "logistic_regression"
    }

    fn fit(&self, features: &FeatureMatrix, labels: &[f64]) -> Result<FittedModel, TrainerError> {
        check_training_set(features, labels)?;
        self.fit_model(features, labels)
    }
}

/// Predicts the most frequent training class for every row.
#[derive(Debug, Clone, Copy, Default)]
pub struct MajorityClass;

impl Estimator for MajorityClass {
    fn algorithm(&self) -> &'static str {
        "majority_class"
    }

    fn fit(&self, features: &FeatureMatrix, labels: &[f64]) -> Result<FittedModel, TrainerError> {
        check_training_set(features, labels)?;
        let positives = labels.iter().filter(|&&y| y >= 0.5).count();
        let class = if positives * 2 > labels.len() { 1.0 } else { 0.0 };
        Ok(FittedModel::MajorityClass {
            class,
            n_features: features.n_features(),
        })
    }
}

/// Algorithm selection and hyperparameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "algorithm", rename_all = "snake_case")]
pub enum AlgorithmConfig {
    /// Logistic regression.
    LogisticRegression(LogisticRegressionParams),
    /// Constant majority-class prediction.
    MajorityClass,
}

impl Default for AlgorithmConfig {
    fn default() -> Self {
        Self::LogisticRegression(LogisticRegressionParams::default())
    }
}

impl AlgorithmConfig {
    /// Algorithm identifier.
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.estimator().algorithm()
    }

    /// Builds the configured estimator.
    #[must_use]
    pub fn estimator(&self) -> Box<dyn Estimator> {
        match self {
            Self::LogisticRegression(params) => Box::new(LogisticRegression::new(params.clone())),
            Self::MajorityClass => Box::new(MajorityClass),
        }
    }
}

/// A fitted model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "algorithm", rename_all = "snake_case")]
pub enum FittedModel {
    /// Logistic regression weights.
    LogisticRegression(LogisticModel),
    /// A constant class.
    MajorityClass {
        /// Predicted class.
        class: f64,
        /// Width of the rows it was fitted on.
        n_features: usize,
    },
}

impl FittedModel {
    /// Number of features the model expects.
    #[must_use]
    pub fn n_features(&self) -> usize {
        match self {
            Self::LogisticRegression(m) => m.weights.len(),
            Self::MajorityClass { n_features, .. } => *n_features,
        }
    }

    /// Predicts the class of one encoded row.
    ///
    /// # Errors
    ///
    /// Returns [`TrainerError::DimensionMismatch`] on a wrong-width row.
    pub fn predict_row(&self, row: &[f64]) -> Result<f64, TrainerError> {
        if row.len() != self.n_features() {
            return Err(TrainerError::DimensionMismatch {
                expected: self.n_features(),
                actual: row.len(),
            });
        }
        Ok(match self {
            Self::LogisticRegression(m) => {
                if m.probability(row) >= m.decision_threshold {
                    1.0
                } else {
                    0.0
                }
            }
            Self::MajorityClass { class, .. } => *class,
        })
    }

    /// Predicts every row of a matrix.
    ///
    /// # Errors
    ///
    /// Returns [`TrainerError::DimensionMismatch`] on a wrong-width matrix.
    pub fn predict(&self, features: &FeatureMatrix) -> Result<Vec<f64>, TrainerError> {
        if features.n_features() != self.n_features() {
            return Err(TrainerError::DimensionMismatch {
                expected: self.n_features(),
                actual: features.n_features(),
            });
        }
        features.rows().iter().map(|r| self.predict_row(r)).collect()
    }

    /// Accuracy on `features` against `labels`.
    ///
    /// # Errors
    ///
    /// Returns [`TrainerError::DimensionMismatch`] on a wrong-width matrix.
    pub fn score(&self, features: &FeatureMatrix, labels: &[f64]) -> Result<f64, TrainerError> {
        Ok(self.evaluate(features, labels)?.accuracy)
    }

    /// Full metric breakdown on `features` against `labels`.
    ///
    /// # Errors
    ///
    /// Returns [`TrainerError::DimensionMismatch`] on a wrong-width matrix.
    pub fn evaluate(
        &self,
        features: &FeatureMatrix,
        labels: &[f64],
    ) -> Result<ClassificationMetrics, TrainerError> {
        let predictions = self.predict(features)?;
        Ok(ClassificationMetrics::compute(&predictions, labels))
    }
}
