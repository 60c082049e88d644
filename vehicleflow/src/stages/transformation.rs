//! Fits feature encoders on the training partition and encodes both
//! partitions.

use super::{ensure_lineage, PipelineStage, StageContext};
use crate::artifacts::{ArtifactStore, IngestionArtifact, TransformationArtifact, ValidationArtifact};
use crate::config::TransformationConfig;
use crate::core::{Artifact, ArtifactMeta, StageName};
use crate::data::Dataset;
use crate::errors::PipelineError;
use crate::features::FittedTransformer;
use crate::schema::SchemaContract;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;

/// Upstream artifacts for transformation.
#[derive(Debug, Clone)]
pub struct TransformationInput {
    /// The partitions to encode.
    pub ingestion: IngestionArtifact,
    /// Proof that the partitions passed validation.
    pub validation: ValidationArtifact,
}

/// The transformation stage.
#[derive(Debug)]
pub struct TransformationStage {
    config: TransformationConfig,
    schema: Arc<SchemaContract>,
}

impl TransformationStage {
    /// Creates the stage.
    #[must_use]
    pub fn new(config: TransformationConfig, schema: Arc<SchemaContract>) -> Self {
        Self { config, schema }
    }
}

#[async_trait]
impl PipelineStage for TransformationStage {
    type Input = TransformationInput;
    type Output = TransformationArtifact;

    fn name(&self) -> StageName {
        StageName::Transformation
    }

    async fn execute(
        &self,
        ctx: &StageContext,
        input: &TransformationInput,
    ) -> Result<TransformationArtifact, PipelineError> {
        let TransformationInput {
            ingestion,
            validation,
        } = input;
        if !validation.is_valid {
            return Err(PipelineError::upstream_rejected(
                self.name(),
                format!(
                    "validation failed with {} violation(s)",
                    validation.validation_report.len()
                ),
            ));
        }
        ensure_lineage(self.name(), validation, ingestion)?;

        let train: Dataset = ArtifactStore::read_json(&ingestion.train_path).await?;
        let test: Dataset = ArtifactStore::read_json(&ingestion.test_path).await?;

        let transformer = FittedTransformer::fit(&train, &self.schema, &self.config)?;
        let train_features = transformer.transform(&train)?;
        let test_features = transformer.transform(&test)?;
        let train_labels = transformer.labels(&train)?;
        let test_labels = transformer.labels(&test)?;

        let store = ctx.store();
        let stage = self.name();
        let transformer_path = store.write_json(stage, "transformer.json", &transformer).await?;
        let train_features_path = store
            .write_json(stage, "train_features.json", &train_features)
            .await?;
        let test_features_path = store
            .write_json(stage, "test_features.json", &test_features)
            .await?;
        let train_labels_path = store
            .write_json(stage, "train_labels.json", &train_labels)
            .await?;
        let test_labels_path = store
            .write_json(stage, "test_labels.json", &test_labels)
            .await?;

        let artifact = TransformationArtifact {
            meta: ArtifactMeta::new(
                ctx.run_id().clone(),
                stage,
                ctx.record_location(stage),
                vec![ingestion.reference(), validation.reference()],
            ),
            train_features_path,
            test_features_path,
            train_labels_path,
            test_labels_path,
            transformer_path,
            raw_test_path: ingestion.test_path.clone(),
            feature_names: transformer.feature_names().to_vec(),
            fingerprint: transformer.fingerprint(),
        };
        ctx.persist(&artifact).await?;

        info!(
            features = artifact.feature_names.len(),
            train_rows = train_features.n_rows(),
            test_rows = test_features.n_rows(),
            fingerprint = %artifact.fingerprint,
            "Transformation complete"
        );
        Ok(artifact)
    }
}
