//! Core domain types for vehicleflow.
//!
//! This module contains the fundamental types used throughout the crate:
//! - Stage name and status enums
//! - Run identifiers and artifact lineage

mod artifact;
mod status;

pub use artifact::{Artifact, ArtifactMeta, ArtifactRef, RunId};
pub use status::{StageName, StageStatus};
