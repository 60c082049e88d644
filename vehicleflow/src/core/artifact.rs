//! Artifact identity and lineage types shared by every stage.

use super::StageName;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use uuid::Uuid;

/// Identifier of a single pipeline run, keyed by the run timestamp.
///
/// The random suffix keeps two runs started in the same millisecond from
/// sharing a directory.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(String);

impl RunId {
    /// Generates a run id for a run starting at `started_at`.
    #[must_use]
    pub fn generate(started_at: DateTime<Utc>) -> Self {
        let suffix = Uuid::new_v4().simple().to_string();
        Self(format!(
            "{}-{}",
            started_at.format("%Y%m%dT%H%M%S%3fZ"),
            &suffix[..8]
        ))
    }

    /// Wraps an existing run id string.
    #[must_use]
    pub fn from_string(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrows the id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A pointer from a downstream artifact to one it was derived from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactRef {
    /// Id of the referenced artifact.
    pub artifact_id: Uuid,
    /// Stage that produced it.
    pub stage: StageName,
    /// Where its record was written.
    pub location: PathBuf,
}

/// Identity, timing and lineage common to every artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactMeta {
    /// Unique id of this artifact.
    pub artifact_id: Uuid,
    /// Run that produced it.
    pub run_id: RunId,
    /// Stage that produced it.
    pub stage: StageName,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Path of the persisted artifact record.
    pub location: PathBuf,
    /// Artifacts this one was derived from.
    #[serde(default)]
    pub upstream: Vec<ArtifactRef>,
}

impl ArtifactMeta {
    /// Creates metadata for a freshly produced artifact.
    #[must_use]
    pub fn new(
        run_id: RunId,
        stage: StageName,
        location: impl Into<PathBuf>,
        upstream: Vec<ArtifactRef>,
    ) -> Self {
        Self {
            artifact_id: Uuid::new_v4(),
            run_id,
            stage,
            created_at: Utc::now(),
            location: location.into(),
            upstream,
        }
    }

    /// Returns true if `reference` is among this artifact's upstream links.
    #[must_use]
    pub fn derives_from(&self, reference: &ArtifactRef) -> bool {
        self.upstream
            .iter()
            .any(|r| r.artifact_id == reference.artifact_id && r.stage == reference.stage)
    }
}

/// Implemented by every stage artifact.
pub trait Artifact {
    /// Returns the artifact's identity and lineage.
    fn meta(&self) -> &ArtifactMeta;

    /// Builds a reference that downstream artifacts can embed.
    fn reference(&self) -> ArtifactRef {
        let meta = self.meta();
        ArtifactRef {
            artifact_id: meta.artifact_id,
            stage: meta.stage,
            location: meta.location.clone(),
        }
    }
}
