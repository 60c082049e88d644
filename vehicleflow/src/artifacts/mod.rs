//! Stage artifacts and the run-scoped store they are written to.
//!
//! Artifacts are the only channel between stages. Each one is written once,
//! as `artifact.json` in its stage directory, and never mutated.

mod store;
mod types;

pub use store::{ArtifactStore, StoreError};
pub use types::{
    CheckKind, EvaluationArtifact, EvaluationDecision, IngestionArtifact, Partition,
    PublicationArtifact, TrainingArtifact, TransformationArtifact, ValidationArtifact, Violation,
};
