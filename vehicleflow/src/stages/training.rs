//! Fits the configured estimator on the encoded training partition.

use super::{PipelineStage, StageContext};
use crate::artifacts::{ArtifactStore, TrainingArtifact, TransformationArtifact};
use crate::config::TrainingConfig;
use crate::core::{Artifact, ArtifactMeta, StageName};
use crate::errors::PipelineError;
use crate::features::{FeatureMatrix, FittedTransformer};
use crate::model::{ModelBundle, ModelMetadata, TrainerError};
use async_trait::async_trait;
use chrono::Utc;
use tracing::info;

/// The training stage.
#[derive(Debug)]
pub struct TrainingStage {
    config: TrainingConfig,
}

impl TrainingStage {
    /// Creates the stage.
    #[must_use]
    pub fn new(config: TrainingConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl PipelineStage for TrainingStage {
    type Input = TransformationArtifact;
    type Output = TrainingArtifact;

    fn name(&self) -> StageName {
        StageName::Training
    }

    async fn execute(
        &self,
        ctx: &StageContext,
        transformation: &TransformationArtifact,
    ) -> Result<TrainingArtifact, PipelineError> {
        let features: FeatureMatrix =
            ArtifactStore::read_json(&transformation.train_features_path).await?;
        let labels: Vec<f64> = ArtifactStore::read_json(&transformation.train_labels_path).await?;
        let transformer: FittedTransformer =
            ArtifactStore::read_json(&transformation.transformer_path).await?;

        if transformer.fingerprint() != transformation.fingerprint {
            return Err(PipelineError::upstream_rejected(
                self.name(),
                "transformer state does not match the recorded fingerprint",
            ));
        }

        let estimator = self.config.algorithm.estimator();
        let model = estimator.fit(&features, &labels)?;
        let training_metrics = model.evaluate(&features, &labels)?;
        let training_score = training_metrics.accuracy;

        if training_score < self.config.min_training_score {
            return Err(TrainerError::Underfitting {
                score: training_score,
                minimum: self.config.min_training_score,
            }
            .into());
        }

        let bundle = ModelBundle {
            metadata: ModelMetadata {
                algorithm: self.config.algorithm.clone(),
                fingerprint: transformation.fingerprint.clone(),
                run_id: ctx.run_id().clone(),
                trained_at: Utc::now(),
                training_score,
            },
            transformer,
            model,
        };
        let model_path = ctx
            .store()
            .write_json(self.name(), "model.json", &bundle)
            .await?;

        let artifact = TrainingArtifact {
            meta: ArtifactMeta::new(
                ctx.run_id().clone(),
                self.name(),
                ctx.record_location(self.name()),
                vec![transformation.reference()],
            ),
            model_path,
            algorithm: self.config.algorithm.clone(),
            training_score,
            training_metrics,
            fingerprint: transformation.fingerprint.clone(),
        };
        ctx.persist(&artifact).await?;

        info!(
            algorithm = estimator.algorithm(),
            training_score,
            f1 = training_metrics.f1,
            "Training complete"
        );
        Ok(artifact)
    }
}
