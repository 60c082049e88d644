//! Stage name and status enums.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The named steps of a pipeline run, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageName {
    /// Loading the schema contract before any stage runs.
    SchemaLoad,
    /// Retrieving and splitting the raw dataset.
    Ingestion,
    /// Checking the partitions against the schema contract.
    Validation,
    /// Fitting and applying feature encoders.
    Transformation,
    /// Fitting the estimator.
    Training,
    /// Comparing the candidate against the published baseline.
    Evaluation,
    /// Pushing an accepted model to the registry.
    Publication,
}

impl StageName {
    /// The stages a full run executes, in dependency order.
    pub const ORDER: [Self; 6] = [
        Self::Ingestion,
        Self::Validation,
        Self::Transformation,
        Self::Training,
        Self::Evaluation,
        Self::Publication,
    ];

    /// Returns the snake_case identifier used for directories and events.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SchemaLoad => "schema_load",
            Self::Ingestion => "ingestion",
            Self::Validation => "validation",
            Self::Transformation => "transformation",
            Self::Training => "training",
            Self::Evaluation => "evaluation",
            Self::Publication => "publication",
        }
    }

    /// Returns the stage that runs right after this one, if any.
    #[must_use]
    pub fn next(&self) -> Option<Self> {
        match self {
            Self::SchemaLoad => Some(Self::Ingestion),
            Self::Ingestion => Some(Self::Validation),
            Self::Validation => Some(Self::Transformation),
            Self::Transformation => Some(Self::Training),
            Self::Training => Some(Self::Evaluation),
            Self::Evaluation => Some(Self::Publication),
            Self::Publication => None,
        }
    }
}

impl fmt::Display for StageName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The execution status of a stage within a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageStatus {
    /// Stage completed and its artifact was written.
    Ok,
    /// Stage failed with a fault.
    Fail,
    /// Stage was not started because the run was cancelled.
    Cancel,
    /// Stage is pending execution.
    Pending,
    /// Stage is currently running.
    Running,
}

impl Default for StageStatus {
    fn default() -> Self {
        Self::Pending
    }
}

impl fmt::Display for StageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ok => write!(f, "ok"),
            Self::Fail => write!(f, "fail"),
            Self::Cancel => write!(f, "cancel"),
            Self::Pending => write!(f, "pending"),
            Self::Running => write!(f, "running"),
        }
    }
}

impl StageStatus {
    /// Returns true if the status represents a terminal state.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Ok | Self::Cancel | Self::Fail)
    }

    /// Returns true if the status indicates failure.
    #[must_use]
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Fail | Self::Cancel)
    }
}
