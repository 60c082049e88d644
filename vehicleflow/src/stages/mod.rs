//! The pipeline stages.
//!
//! Each stage consumes upstream artifacts, does one unit of work, and
//! returns a new artifact persisted in its run-scoped stage directory.
//! Stages never see each other; the orchestrator hands artifacts along.

mod evaluation;
mod ingestion;
mod publication;
mod training;
mod transformation;
mod validation;

pub use evaluation::{decide, EvaluationInput, EvaluationStage};
pub use ingestion::{split_indices, IngestionStage};
pub use publication::{PublicationInput, PublicationStage};
pub use training::TrainingStage;
pub use transformation::{TransformationInput, TransformationStage};
pub use validation::{validate_partition, ValidationStage};

use crate::artifacts::{ArtifactStore, StoreError};
use crate::core::{Artifact, RunId, StageName};
use crate::errors::PipelineError;
use async_trait::async_trait;
use serde::Serialize;
use std::fmt::Debug;
use std::path::PathBuf;

/// File name of every persisted artifact record.
pub const ARTIFACT_FILE: &str = "artifact.json";

/// What a stage may touch while running.
#[derive(Debug, Clone)]
pub struct StageContext {
    store: ArtifactStore,
}

impl StageContext {
    /// Creates a context writing into `store`.
    #[must_use]
    pub fn new(store: ArtifactStore) -> Self {
        Self { store }
    }

    /// The run being executed.
    #[must_use]
    pub fn run_id(&self) -> &RunId {
        self.store.run_id()
    }

    /// The run's artifact store.
    #[must_use]
    pub fn store(&self) -> &ArtifactStore {
        &self.store
    }

    /// Where `stage` persists its artifact record.
    #[must_use]
    pub fn record_location(&self, stage: StageName) -> PathBuf {
        self.store.stage_dir(stage).join(ARTIFACT_FILE)
    }

    /// Writes an artifact record to its declared location.
    pub async fn persist<A>(&self, artifact: &A) -> Result<(), StoreError>
    where
        A: Artifact + Serialize + Sync,
    {
        self.store
            .write_json_pretty(artifact.meta().stage, ARTIFACT_FILE, artifact)
            .await?;
        Ok(())
    }
}

/// A pipeline stage.
#[async_trait]
pub trait PipelineStage: Send + Sync + Debug {
    /// Upstream artifacts the stage consumes.
    type Input: Send + Sync;
    /// The artifact the stage produces.
    type Output: Artifact + Serialize + Send + Sync;

    /// The stage's name.
    fn name(&self) -> StageName;

    /// Runs the stage, persisting and returning its artifact.
    async fn execute(
        &self,
        ctx: &StageContext,
        input: &Self::Input,
    ) -> Result<Self::Output, PipelineError>;
}

/// Fails with `UpstreamRejected` unless `child` derives from `parent`.
pub(crate) fn ensure_lineage<C, P>(
    stage: StageName,
    child: &C,
    parent: &P,
) -> Result<(), PipelineError>
where
    C: Artifact,
    P: Artifact,
{
    if child.meta().run_id != parent.meta().run_id || !child.meta().derives_from(&parent.reference())
    {
        return Err(PipelineError::upstream_rejected(
            stage,
            format!(
                "{} artifact {} does not derive from {} artifact {}",
                child.meta().stage,
                child.meta().artifact_id,
                parent.meta().stage,
                parent.meta().artifact_id
            ),
        ));
    }
    Ok(())
}
