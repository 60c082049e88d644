//! Logistic regression fitted by full-batch gradient descent.
//!
//! Weights start at zero and every epoch visits rows in order, so a fit is a
//! pure function of its inputs and hyperparameters.

use super::{FittedModel, TrainerError};
use crate::features::FeatureMatrix;
use serde::{Deserialize, Serialize};

/// Hyperparameters for [`LogisticRegression`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogisticRegressionParams {
    /// Gradient step size.
    #[serde(default = "default_learning_rate")]
    pub learning_rate: f64,
    /// Passes over the training set.
    #[serde(default = "default_epochs")]
    pub epochs: usize,
    /// L2 penalty on the weights.
    #[serde(default = "default_l2")]
    pub l2: f64,
    /// Probability at or above which a row is predicted positive.
    #[serde(default = "default_decision_threshold")]
    pub decision_threshold: f64,
}

fn default_learning_rate() -> f64 {
    0.5
}

fn default_epochs() -> usize {
    300
}

fn default_l2() -> f64 {
    0.0001
}

fn default_decision_threshold() -> f64 {
    0.5
}

impl Default for LogisticRegressionParams {
    fn default() -> Self {
        Self {
            learning_rate: default_learning_rate(),
            epochs: default_epochs(),
            l2: default_l2(),
            decision_threshold: default_decision_threshold(),
        }
    }
}

impl LogisticRegressionParams {
    /// Sets the learning rate.
    #[must_use]
    pub fn with_learning_rate(mut self, learning_rate: f64) -> Self {
        self.learning_rate = learning_rate;
        self
    }

    /// Sets the number of epochs.
    #[must_use]
    pub fn with_epochs(mut self, epochs: usize) -> Self {
        self.epochs = epochs;
        self
    }

    /// Sets the decision threshold.
    #[must_use]
    pub fn with_decision_threshold(mut self, threshold: f64) -> Self {
        self.decision_threshold = threshold;
        self
    }
}

/// Fitted logistic regression weights.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogisticModel {
    /// One weight per feature.
    pub weights: Vec<f64>,
    /// Intercept.
    pub bias: f64,
    /// Probability threshold for the positive class.
    pub decision_threshold: f64,
}

impl LogisticModel {
    /// Probability of the positive class for one encoded row.
    #[must_use]
    pub fn probability(&self, row: &[f64]) -> f64 {
        let z = self.bias
            + self
                .weights
                .iter()
                .zip(row)
                .map(|(w, x)| w * x)
                .sum::<f64>();
        sigmoid(z)
    }
}

fn sigmoid(z: f64) -> f64 {
    if z >= 0.0 {
        1.0 / (1.0 + (-z).exp())
    } else {
        let e = z.exp();
        e / (1.0 + e)
    }
}

/// The logistic regression estimator.
#[derive(Debug, Clone, Default)]
pub struct LogisticRegression {
    params: LogisticRegressionParams,
}

impl LogisticRegression {
    /// Creates an estimator with the given hyperparameters.
    #[must_use]
    pub fn new(params: LogisticRegressionParams) -> Self {
        Self { params }
    }

    /// Fits weights to `features` and `labels`.
    pub(crate) fn fit_model(
        &self,
        features: &FeatureMatrix,
        labels: &[f64],
    ) -> Result<FittedModel, TrainerError> {
        let n = features.n_rows();
        let d = features.n_features();
        let p = &self.params;

        let mut weights = vec![0.0; d];
        let mut bias = 0.0;
        let mut grad = vec![0.0; d];

        for _ in 0..p.epochs {
            grad.iter_mut().for_each(|g| *g = 0.0);
            let mut grad_bias = 0.0;

            for (row, &y) in features.rows().iter().zip(labels) {
                let z = bias + weights.iter().zip(row).map(|(w, x)| w * x).sum::<f64>();
                let err = sigmoid(z) - y;
                for (g, x) in grad.iter_mut().zip(row) {
                    *g += err * x;
                }
                grad_bias += err;
            }

            let scale = 1.0 / n as f64;
            for (w, g) in weights.iter_mut().zip(&grad) {
                *w -= p.learning_rate * (g * scale + p.l2 * *w);
            }
            bias -= p.learning_rate * grad_bias * scale;
        }

        if weights.iter().any(|w| !w.is_finite()) || !bias.is_finite() {
            return Err(TrainerError::Diverged {
                algorithm: "logistic_regression",
            });
        }

        Ok(FittedModel::LogisticRegression(LogisticModel {
            weights,
            bias,
            decision_threshold: p.decision_threshold,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sigmoid_is_stable_at_extremes() {
        assert!((sigmoid(0.0) - 0.5).abs() < 1e-12);
        assert!(sigmoid(1000.0) <= 1.0);
        assert!(sigmoid(-1000.0) >= 0.0);
        assert!(sigmoid(-1000.0).is_finite());
    }

    #[test]
    fn test_probability() {
        let model = LogisticModel {
            weights: vec![2.0, -1.0],
            bias: 0.0,
            decision_threshold: 0.5,
        };
        assert!((model.probability(&[0.5, 1.0]) - 0.5).abs() < 1e-12);
        assert!(model.probability(&[3.0, 0.0]) > 0.99);
    }

    #[test]
    fn test_params_serde_defaults() {
        let params: LogisticRegressionParams = serde_json::from_str("{\"epochs\": 10}").unwrap();
        assert_eq!(params.epochs, 10);
        assert_eq!(params.learning_rate, default_learning_rate());
    }
}
