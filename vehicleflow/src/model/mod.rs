//! Estimators, fitted models, and classification metrics.

mod bundle;
mod estimator;
mod logistic;
mod metrics;

pub use bundle::{ModelBundle, ModelMetadata};
pub use estimator::{AlgorithmConfig, Estimator, FittedModel, MajorityClass, TrainerError};
pub use logistic::{LogisticModel, LogisticRegression, LogisticRegressionParams};
pub use metrics::{ClassificationMetrics, EvaluationMetric};
