//! Run lifecycle events.

use crate::core::{RunId, StageName};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// The lifecycle point an event marks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventKind {
    /// A run began.
    #[serde(rename = "pipeline.started")]
    PipelineStarted,
    /// A stage began.
    #[serde(rename = "stage.started")]
    StageStarted,
    /// A stage produced its artifact.
    #[serde(rename = "stage.completed")]
    StageCompleted,
    /// A stage raised a fault.
    #[serde(rename = "stage.failed")]
    StageFailed,
    /// A run reached its outcome.
    #[serde(rename = "pipeline.completed")]
    PipelineCompleted,
}

impl EventKind {
    /// Dotted event name.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PipelineStarted => "pipeline.started",
            Self::StageStarted => "stage.started",
            Self::StageCompleted => "stage.completed",
            Self::StageFailed => "stage.failed",
            Self::PipelineCompleted => "pipeline.completed",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An event emitted by the orchestrator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineEvent {
    /// Lifecycle point.
    #[serde(rename = "type")]
    pub kind: EventKind,
    /// Run the event belongs to.
    pub run_id: RunId,
    /// Stage concerned, for stage events.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stage: Option<StageName>,
    /// When the event occurred.
    pub timestamp: DateTime<Utc>,
    /// Event payload.
    #[serde(default)]
    pub data: serde_json::Value,
}

impl PipelineEvent {
    /// Creates an event with an empty payload.
    #[must_use]
    pub fn new(kind: EventKind, run_id: RunId) -> Self {
        Self {
            kind,
            run_id,
            stage: None,
            timestamp: Utc::now(),
            data: serde_json::Value::Null,
        }
    }

    /// Tags the event with a stage.
    #[must_use]
    pub fn for_stage(mut self, stage: StageName) -> Self {
        self.stage = Some(stage);
        self
    }

    /// Attaches a payload.
    #[must_use]
    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = data;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_serialization() {
        let event = PipelineEvent::new(EventKind::StageFailed, RunId::from_string("r1"))
            .for_stage(StageName::Training)
            .with_data(serde_json::json!({"error": "boom"}));

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "stage.failed");
        assert_eq!(json["run_id"], "r1");
        assert_eq!(json["stage"], "training");
        assert_eq!(json["data"]["error"], "boom");
        assert_eq!(EventKind::StageFailed.to_string(), "stage.failed");
    }

    #[test]
    fn test_pipeline_event_omits_stage() {
        let event = PipelineEvent::new(EventKind::PipelineStarted, RunId::from_string("r1"));
        let json = serde_json::to_value(&event).unwrap();
        assert!(json.get("stage").is_none());
    }
}
