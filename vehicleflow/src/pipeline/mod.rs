//! Pipeline building and execution.
//!
//! This module provides:
//! - The builder wiring configuration and collaborators together
//! - The sequential, gated orchestrator
//! - Run outcomes and the artifacts a run leaves behind

mod builder;
mod integration_tests;
mod orchestrator;
mod result;

pub use builder::PipelineBuilder;
pub use orchestrator::{Pipeline, TRACE_FILE};
pub use result::{PipelineResult, RunArtifacts, RunOutcome};
