//! Scores the candidate against the published baseline and decides whether
//! it may replace it.

use super::{ensure_lineage, PipelineStage, StageContext};
use crate::artifacts::{
    ArtifactStore, EvaluationArtifact, EvaluationDecision, TrainingArtifact,
    TransformationArtifact,
};
use crate::config::EvaluationConfig;
use crate::core::{Artifact, ArtifactMeta, StageName};
use crate::data::Dataset;
use crate::errors::PipelineError;
use crate::features::FeatureMatrix;
use crate::model::{ClassificationMetrics, ModelBundle};
use crate::registry::ModelRegistry;
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info};

/// Applies the acceptance rule.
///
/// With no baseline the candidate is accepted unconditionally and the delta
/// is zero, since nothing was compared. Otherwise it is accepted iff
/// `candidate - baseline > threshold`.
#[must_use]
pub fn decide(candidate_score: f64, baseline_score: Option<f64>, threshold: f64) -> EvaluationDecision {
    match baseline_score {
        None => EvaluationDecision {
            accepted: true,
            score_delta: 0.0,
            baseline_score: None,
            candidate_score,
            threshold,
        },
        Some(baseline) => {
            let score_delta = candidate_score - baseline;
            EvaluationDecision {
                accepted: score_delta > threshold,
                score_delta,
                baseline_score: Some(baseline),
                candidate_score,
                threshold,
            }
        }
    }
}

/// Upstream artifacts for evaluation.
#[derive(Debug, Clone)]
pub struct EvaluationInput {
    /// The candidate.
    pub training: TrainingArtifact,
    /// The held-out partition the candidate is scored on.
    pub transformation: TransformationArtifact,
}

/// The evaluation stage.
pub struct EvaluationStage {
    config: EvaluationConfig,
    registry: Arc<dyn ModelRegistry>,
}

impl EvaluationStage {
    /// Creates the stage.
    #[must_use]
    pub fn new(config: EvaluationConfig, registry: Arc<dyn ModelRegistry>) -> Self {
        Self { config, registry }
    }

    async fn score_baseline(
        &self,
        raw_test: &Dataset,
    ) -> Result<Option<ClassificationMetrics>, PipelineError> {
        let key = &self.config.baseline_key;
        let bytes = self
            .registry
            .get(key)
            .await
            .map_err(|source| PipelineError::BaselineUnreadable {
                key: key.clone(),
                source,
            })?;
        let Some(bytes) = bytes else {
            debug!(key = %key, "No baseline model published");
            return Ok(None);
        };

        let baseline = ModelBundle::from_bytes(&bytes).map_err(|source| {
            PipelineError::ModelDecode {
                key: key.clone(),
                source,
            }
        })?;
        debug!(
            key = %key,
            fingerprint = %baseline.fingerprint(),
            "Scoring baseline model"
        );
        baseline.evaluate(raw_test).map(Some)
    }
}

impl fmt::Debug for EvaluationStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EvaluationStage")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl PipelineStage for EvaluationStage {
    type Input = EvaluationInput;
    type Output = EvaluationArtifact;

    fn name(&self) -> StageName {
        StageName::Evaluation
    }

    async fn execute(
        &self,
        ctx: &StageContext,
        input: &EvaluationInput,
    ) -> Result<EvaluationArtifact, PipelineError> {
        let EvaluationInput {
            training,
            transformation,
        } = input;
        ensure_lineage(self.name(), training, transformation)?;

        let model_path = training.model_path.display().to_string();
        let candidate_bytes = ArtifactStore::read_bytes(&training.model_path).await?;
        let candidate = ModelBundle::from_bytes(&candidate_bytes).map_err(|source| {
            PipelineError::ModelDecode {
                key: model_path,
                source,
            }
        })?;
        let features: FeatureMatrix =
            ArtifactStore::read_json(&transformation.test_features_path).await?;
        let labels: Vec<f64> = ArtifactStore::read_json(&transformation.test_labels_path).await?;
        let candidate_metrics = candidate.model.evaluate(&features, &labels)?;

        let raw_test: Dataset = ArtifactStore::read_json(&transformation.raw_test_path).await?;
        let baseline_metrics = self.score_baseline(&raw_test).await?;

        let metric = self.config.metric;
        let decision = decide(
            metric.select(&candidate_metrics),
            baseline_metrics.as_ref().map(|m| metric.select(m)),
            self.config.threshold,
        );

        let artifact = EvaluationArtifact {
            meta: ArtifactMeta::new(
                ctx.run_id().clone(),
                self.name(),
                ctx.record_location(self.name()),
                vec![training.reference(), transformation.reference()],
            ),
            decision,
            metric,
            candidate_metrics,
            baseline_metrics,
            baseline_key: self.config.baseline_key.clone(),
        };
        ctx.persist(&artifact).await?;

        info!(
            metric = %metric,
            candidate = decision.candidate_score,
            baseline = ?decision.baseline_score,
            delta = decision.score_delta,
            threshold = decision.threshold,
            accepted = decision.accepted,
            "Evaluation complete"
        );
        Ok(artifact)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{MockModelRegistry, RegistryError};

    fn stage(registry: MockModelRegistry) -> EvaluationStage {
        EvaluationStage::new(EvaluationConfig::default(), Arc::new(registry))
    }

    #[tokio::test]
    async fn test_absent_baseline_scores_nothing() {
        let mut registry = MockModelRegistry::new();
        registry.expect_get().times(1).returning(|_| Ok(None));

        let scored = stage(registry).score_baseline(&Dataset::default()).await.unwrap();
        assert!(scored.is_none());
    }

    #[tokio::test]
    async fn test_registry_failure_is_fatal() {
        let mut registry = MockModelRegistry::new();
        registry.expect_get().times(1).returning(|key| {
            Err(RegistryError::Backend {
                key: key.to_string(),
                message: "connection reset".into(),
            })
        });

        let err = stage(registry)
            .score_baseline(&Dataset::default())
            .await
            .unwrap_err();
        match &err {
            PipelineError::BaselineUnreadable { key, source } => {
                assert_eq!(key, &EvaluationConfig::default().baseline_key);
                assert!(matches!(source, RegistryError::Backend { .. }));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(err.kind(), "EvaluationError");
    }

    #[tokio::test]
    async fn test_undecodable_baseline_is_fatal() {
        let mut registry = MockModelRegistry::new();
        registry
            .expect_get()
            .times(1)
            .returning(|_| Ok(Some(b"not a bundle".to_vec())));

        let err = stage(registry)
            .score_baseline(&Dataset::default())
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::ModelDecode { .. }));
        assert_eq!(err.kind(), "EvaluationError");
    }

    #[test]
    fn test_bootstrap_accepts() {
        let d = decide(0.1, None, 0.02);
        assert!(d.accepted);
        assert_eq!(d.baseline_score, None);
        assert_eq!(d.candidate_score, 0.1);
        assert_eq!(d.score_delta, 0.0);
    }

    #[test]
    fn test_threshold_boundary() {
        let rejected = decide(0.815, Some(0.80), 0.02);
        assert!(!rejected.accepted);
        assert!((rejected.score_delta - 0.015).abs() < 1e-9);

        let accepted = decide(0.83, Some(0.80), 0.02);
        assert!(accepted.accepted);
        assert_eq!(accepted.baseline_score, Some(0.80));
    }

    #[test]
    fn test_equal_delta_is_rejected() {
        assert!(!decide(0.5, Some(0.5), 0.0).accepted);
        assert!(decide(0.5001, Some(0.5), 0.0).accepted);
    }

    #[test]
    fn test_worse_candidate_is_rejected() {
        let d = decide(0.6, Some(0.7), 0.02);
        assert!(!d.accepted);
        assert!(d.score_delta < 0.0);
    }
}
