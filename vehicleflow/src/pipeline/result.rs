//! What a run hands back to its caller.

use crate::artifacts::{
    EvaluationArtifact, IngestionArtifact, PublicationArtifact, TrainingArtifact,
    TransformationArtifact, ValidationArtifact,
};
use crate::core::RunId;
use crate::errors::StageFault;
use crate::observability::RunTrace;
use std::fmt;
use std::path::PathBuf;

/// How a run ended.
#[derive(Debug)]
pub enum RunOutcome {
    /// The candidate replaced the baseline in the registry.
    Published,
    /// The candidate did not beat the baseline by the threshold.
    Rejected,
    /// The data failed the schema contract; nothing was trained.
    HaltedOnValidation,
    /// A stage raised a fault.
    Aborted(StageFault),
}

impl RunOutcome {
    /// Snake-case label used in logs, events and `trace.json`.
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::Published => "published",
            Self::Rejected => "rejected",
            Self::HaltedOnValidation => "halted_on_validation",
            Self::Aborted(_) => "aborted",
        }
    }

    /// The fault, if the run aborted.
    #[must_use]
    pub fn fault(&self) -> Option<&StageFault> {
        match self {
            Self::Aborted(fault) => Some(fault),
            _ => None,
        }
    }
}

impl fmt::Display for RunOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Aborted(fault) => write!(f, "aborted in {}", fault.stage),
            other => f.write_str(other.label()),
        }
    }
}

/// Artifacts produced before the run ended. A stage's slot is `None` when it
/// never ran or did not finish.
#[derive(Debug, Clone, Default)]
pub struct RunArtifacts {
    /// Split partitions.
    pub ingestion: Option<IngestionArtifact>,
    /// Schema verdict.
    pub validation: Option<ValidationArtifact>,
    /// Encoded features.
    pub transformation: Option<TransformationArtifact>,
    /// Candidate model.
    pub training: Option<TrainingArtifact>,
    /// Acceptance decision.
    pub evaluation: Option<EvaluationArtifact>,
    /// Registry upload.
    pub publication: Option<PublicationArtifact>,
}

/// The result of [`Pipeline::run`](super::Pipeline::run).
#[derive(Debug)]
pub struct PipelineResult {
    /// The run's id.
    pub run_id: RunId,
    /// How it ended.
    pub outcome: RunOutcome,
    /// Artifacts written along the way.
    pub artifacts: RunArtifacts,
    /// Stage timings.
    pub trace: RunTrace,
    /// Run-scoped artifact directory, if it could be created.
    pub run_dir: Option<PathBuf>,
}

impl PipelineResult {
    /// Whether a new model was published.
    #[must_use]
    pub fn is_published(&self) -> bool {
        matches!(self.outcome, RunOutcome::Published)
    }

    /// Process exit code for the outcome.
    ///
    /// A rejection is a normal result and exits 0, like a publish.
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        match self.outcome {
            RunOutcome::Published | RunOutcome::Rejected => 0,
            RunOutcome::HaltedOnValidation => 2,
            RunOutcome::Aborted(_) => 1,
        }
    }
}
