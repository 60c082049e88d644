//! Stage timing and the per-run trace persisted as `trace.json`.

use crate::core::{RunId, StageName, StageStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Instant;

/// Measures one stage execution.
#[derive(Debug)]
pub struct StageTimer {
    stage: StageName,
    started_at: DateTime<Utc>,
    start: Instant,
}

impl StageTimer {
    /// Starts timing `stage`.
    #[must_use]
    pub fn start(stage: StageName) -> Self {
        Self {
            stage,
            started_at: Utc::now(),
            start: Instant::now(),
        }
    }

    /// The stage being timed.
    #[must_use]
    pub fn stage(&self) -> StageName {
        self.stage
    }

    /// Milliseconds since the timer started.
    #[must_use]
    pub fn elapsed_ms(&self) -> f64 {
        self.start.elapsed().as_secs_f64() * 1000.0
    }

    /// Stops the timer, recording how the stage ended.
    #[must_use]
    pub fn finish(self, status: StageStatus) -> StageTiming {
        StageTiming {
            stage: self.stage,
            status,
            started_at: self.started_at,
            finished_at: Utc::now(),
            duration_ms: self.elapsed_ms(),
        }
    }
}

/// Start and end of one stage execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageTiming {
    /// Stage executed.
    pub stage: StageName,
    /// How it ended.
    pub status: StageStatus,
    /// Start time.
    pub started_at: DateTime<Utc>,
    /// End time.
    pub finished_at: DateTime<Utc>,
    /// Wall-clock duration.
    pub duration_ms: f64,
}

/// Ordered stage timings for one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunTrace {
    /// Run traced.
    pub run_id: RunId,
    /// When the run began.
    pub started_at: DateTime<Utc>,
    /// When the run reached its outcome.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
    /// Stage timings in execution order.
    pub stages: Vec<StageTiming>,
}

impl RunTrace {
    /// Starts a trace.
    #[must_use]
    pub fn new(run_id: RunId, started_at: DateTime<Utc>) -> Self {
        Self {
            run_id,
            started_at,
            finished_at: None,
            stages: Vec::new(),
        }
    }

    /// Appends a stage timing.
    pub fn record(&mut self, timing: StageTiming) {
        self.stages.push(timing);
    }

    /// Marks the run finished.
    pub fn close(&mut self) {
        self.finished_at = Some(Utc::now());
    }

    /// Stages in the order they ran.
    #[must_use]
    pub fn executed_stages(&self) -> Vec<StageName> {
        self.stages.iter().map(|t| t.stage).collect()
    }

    /// The timing of one stage, if it ran.
    #[must_use]
    pub fn timing(&self, stage: StageName) -> Option<&StageTiming> {
        self.stages.iter().find(|t| t.stage == stage)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timer_records_interval() {
        let timer = StageTimer::start(StageName::Validation);
        std::thread::sleep(std::time::Duration::from_millis(5));
        let timing = timer.finish(StageStatus::Ok);

        assert_eq!(timing.stage, StageName::Validation);
        assert!(timing.duration_ms >= 5.0);
        assert!(timing.finished_at >= timing.started_at);
    }

    #[test]
    fn test_trace_order() {
        let mut trace = RunTrace::new(RunId::from_string("r"), Utc::now());
        trace.record(StageTimer::start(StageName::Ingestion).finish(StageStatus::Ok));
        trace.record(StageTimer::start(StageName::Validation).finish(StageStatus::Fail));
        trace.close();

        assert_eq!(
            trace.executed_stages(),
            vec![StageName::Ingestion, StageName::Validation]
        );
        assert_eq!(
            trace.timing(StageName::Validation).map(|t| t.status),
            Some(StageStatus::Fail)
        );
        assert!(trace.timing(StageName::Training).is_none());
        assert!(trace.finished_at.is_some());
    }
}
