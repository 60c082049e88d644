//! Binary classification metrics.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Metric breakdown for a binary classifier.
///
/// Ratios with a zero denominator are reported as `0.0`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ClassificationMetrics {
    /// Fraction of correct predictions.
    pub accuracy: f64,
    /// `tp / (tp + fp)`.
    pub precision: f64,
    /// `tp / (tp + fn)`.
    pub recall: f64,
    /// Harmonic mean of precision and recall.
    pub f1: f64,
    /// True positives.
    pub true_positives: usize,
    /// False positives.
    pub false_positives: usize,
    /// True negatives.
    pub true_negatives: usize,
    /// False negatives.
    pub false_negatives: usize,
}

fn ratio(num: usize, den: usize) -> f64 {
    if den == 0 {
        0.0
    } else {
        num as f64 / den as f64
    }
}

impl ClassificationMetrics {
    /// Computes metrics from predicted and true `0.0`/`1.0` labels.
    ///
    /// Pairs beyond the shorter slice are ignored.
    #[must_use]
    pub fn compute(predictions: &[f64], labels: &[f64]) -> Self {
        let mut m = Self::default();
        for (&p, &y) in predictions.iter().zip(labels) {
            match (p >= 0.5, y >= 0.5) {
                (true, true) => m.true_positives += 1,
                (true, false) => m.false_positives += 1,
                (false, false) => m.true_negatives += 1,
                (false, true) => m.false_negatives += 1,
            }
        }

        let total = m.support();
        m.accuracy = ratio(m.true_positives + m.true_negatives, total);
        m.precision = ratio(m.true_positives, m.true_positives + m.false_positives);
        m.recall = ratio(m.true_positives, m.true_positives + m.false_negatives);
        m.f1 = if m.precision + m.recall == 0.0 {
            0.0
        } else {
            2.0 * m.precision * m.recall / (m.precision + m.recall)
        };
        m
    }

    /// Number of scored rows.
    #[must_use]
    pub fn support(&self) -> usize {
        self.true_positives + self.false_positives + self.true_negatives + self.false_negatives
    }
}

/// The metric used to compare a candidate against the baseline.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvaluationMetric {
    /// Accuracy.
    Accuracy,
    /// Precision.
    Precision,
    /// Recall.
    Recall,
    /// F1 score.
    #[default]
    F1,
}

impl EvaluationMetric {
    /// Reads this metric out of a breakdown.
    #[must_use]
    pub fn select(&self, metrics: &ClassificationMetrics) -> f64 {
        match self {
            Self::Accuracy => metrics.accuracy,
            Self::Precision => metrics.precision,
            Self::Recall => metrics.recall,
            Self::F1 => metrics.f1,
        }
    }
}

impl fmt::Display for EvaluationMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Accuracy => "accuracy",
            Self::Precision => "precision",
            Self::Recall => "recall",
            Self::F1 => "f1",
        };
        write!(f, "{name}")
    }
}
