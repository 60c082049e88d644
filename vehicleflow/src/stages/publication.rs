//! Uploads an accepted candidate to the model registry.

use super::{ensure_lineage, PipelineStage, StageContext};
use crate::artifacts::{ArtifactStore, EvaluationArtifact, PublicationArtifact, TrainingArtifact};
use crate::config::PublicationConfig;
use crate::core::{Artifact, ArtifactMeta, StageName};
use crate::errors::PipelineError;
use crate::registry::ModelRegistry;
use crate::utils::content_md5;
use async_trait::async_trait;
use chrono::Utc;
use std::fmt;
use std::sync::Arc;
use tracing::info;

/// Upstream artifacts for publication.
#[derive(Debug, Clone)]
pub struct PublicationInput {
    /// The accepted verdict.
    pub evaluation: EvaluationArtifact,
    /// The model it accepted.
    pub training: TrainingArtifact,
}

/// The publication stage.
pub struct PublicationStage {
    config: PublicationConfig,
    registry: Arc<dyn ModelRegistry>,
}

impl PublicationStage {
    /// Creates the stage.
    #[must_use]
    pub fn new(config: PublicationConfig, registry: Arc<dyn ModelRegistry>) -> Self {
        Self { config, registry }
    }
}

impl fmt::Debug for PublicationStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PublicationStage")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl PipelineStage for PublicationStage {
    type Input = PublicationInput;
    type Output = PublicationArtifact;

    fn name(&self) -> StageName {
        StageName::Publication
    }

    async fn execute(
        &self,
        ctx: &StageContext,
        input: &PublicationInput,
    ) -> Result<PublicationArtifact, PipelineError> {
        let PublicationInput {
            evaluation,
            training,
        } = input;
        if !evaluation.decision.accepted {
            return Err(PipelineError::upstream_rejected(
                self.name(),
                format!(
                    "candidate was rejected (delta {:.4} <= threshold {:.4})",
                    evaluation.decision.score_delta, evaluation.decision.threshold
                ),
            ));
        }
        ensure_lineage(self.name(), evaluation, training)?;

        let bytes = ArtifactStore::read_bytes(&training.model_path).await?;
        let checksum = content_md5(&bytes);
        let key = &self.config.model_key;
        let registry_location =
            self.registry
                .put(&bytes, key)
                .await
                .map_err(|source| PipelineError::Publication {
                    key: key.clone(),
                    source,
                })?;

        let artifact = PublicationArtifact {
            meta: ArtifactMeta::new(
                ctx.run_id().clone(),
                self.name(),
                ctx.record_location(self.name()),
                vec![evaluation.reference(), training.reference()],
            ),
            model_key: key.clone(),
            registry_location,
            published_at: Utc::now(),
            content_md5: checksum,
            fingerprint: training.fingerprint.clone(),
        };
        ctx.persist(&artifact).await?;

        info!(
            key = %artifact.model_key,
            location = %artifact.registry_location,
            bytes = bytes.len(),
            "Model published"
        );
        Ok(artifact)
    }
}
