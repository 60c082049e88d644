//! Sequential, artifact-gated run execution.

use super::result::{PipelineResult, RunArtifacts, RunOutcome};
use crate::artifacts::ArtifactStore;
use crate::cancellation::CancellationToken;
use crate::config::PipelineConfig;
use crate::core::{Artifact, RunId, StageName, StageStatus};
use crate::data::DataSource;
use crate::errors::{FaultReport, PipelineError, StageFault};
use crate::events::{EventKind, EventSink, PipelineEvent};
use crate::observability::{RunTrace, StageTimer};
use crate::registry::ModelRegistry;
use crate::schema::{SchemaContract, SchemaRegistry};
use crate::stages::{
    EvaluationInput, EvaluationStage, IngestionStage, PipelineStage, PublicationInput,
    PublicationStage, StageContext, TrainingStage, TransformationInput, TransformationStage,
    ValidationStage,
};
use chrono::Utc;
use serde::Serialize;
use serde_json::json;
use std::fmt;
use std::sync::Arc;
use tracing::{error, info, info_span, warn, Instrument};

/// File name of the run trace, written at the run root.
pub const TRACE_FILE: &str = "trace.json";

/// What `trace.json` holds.
#[derive(Serialize)]
struct TraceRecord<'a> {
    #[serde(flatten)]
    trace: &'a RunTrace,
    outcome: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    fault: Option<FaultReport>,
}

/// Mutable bookkeeping for one run.
struct RunState {
    run_id: RunId,
    trace: RunTrace,
    artifacts: RunArtifacts,
    store: Option<ArtifactStore>,
}

/// The assembled pipeline. Build one with
/// [`PipelineBuilder`](super::PipelineBuilder).
pub struct Pipeline {
    pub(super) config: PipelineConfig,
    pub(super) source: Arc<dyn DataSource>,
    pub(super) schema_registry: Arc<dyn SchemaRegistry>,
    pub(super) model_registry: Arc<dyn ModelRegistry>,
    pub(super) events: Arc<dyn EventSink>,
    pub(super) cancellation: CancellationToken,
}

impl fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pipeline")
            .field("config", &self.config)
            .field("cancellation", &self.cancellation)
            .finish_non_exhaustive()
    }
}

impl Pipeline {
    /// The configuration the pipeline was built with.
    #[must_use]
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// A clone of the token that cancels this pipeline's runs.
    #[must_use]
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancellation.clone()
    }

    /// Executes one run under a fresh run id.
    ///
    /// Never returns an error: faults end the run as
    /// [`RunOutcome::Aborted`] and everything written before the fault stays
    /// on disk.
    pub async fn run(&self) -> PipelineResult {
        let started_at = Utc::now();
        let run_id = RunId::generate(started_at);
        let mut state = RunState {
            run_id: run_id.clone(),
            trace: RunTrace::new(run_id.clone(), started_at),
            artifacts: RunArtifacts::default(),
            store: None,
        };

        let span = info_span!("pipeline_run", run_id = %run_id);
        async move {
            info!(
                collection = %self.config.ingestion.collection,
                artifact_root = %self.config.artifact_root.display(),
                "Pipeline run started"
            );
            self.emit(PipelineEvent::new(EventKind::PipelineStarted, run_id.clone()))
                .await;

            let outcome = match self.execute(&mut state).await {
                Ok(outcome) => outcome,
                Err(fault) => RunOutcome::Aborted(fault),
            };
            state.trace.close();
            self.finish(&state, &outcome).await;

            PipelineResult {
                run_id: state.run_id,
                outcome,
                artifacts: state.artifacts,
                trace: state.trace,
                run_dir: state.store.map(|store| store.run_dir().to_path_buf()),
            }
        }
        .instrument(span)
        .await
    }

    async fn execute(&self, state: &mut RunState) -> Result<RunOutcome, StageFault> {
        let store = match ArtifactStore::create(&self.config.artifact_root, state.run_id.clone())
            .await
        {
            Ok(store) => store,
            Err(e) => {
                let fault = StageFault::new(StageName::SchemaLoad, e.into());
                self.report_fault(&state.run_id, &fault).await;
                return Err(fault);
            }
        };
        state.store = Some(store.clone());
        let schema = Arc::new(self.load_schema(state).await?);
        let ctx = StageContext::new(store);
        let config = &self.config;

        let ingestion_stage = IngestionStage::new(config.ingestion.clone(), self.source.clone());
        let ingestion = self.run_stage(&ingestion_stage, &ctx, &(), state).await?;
        state.artifacts.ingestion = Some(ingestion.clone());

        let validation_stage = ValidationStage::new(schema.clone());
        let validation = self.run_stage(&validation_stage, &ctx, &ingestion, state).await?;
        state.artifacts.validation = Some(validation.clone());
        if !validation.is_valid {
            warn!(
                violations = validation.validation_report.len(),
                "Halting: validation failed"
            );
            return Ok(RunOutcome::HaltedOnValidation);
        }

        let transformation_stage = TransformationStage::new(config.transformation.clone(), schema);
        let transformation_input = TransformationInput {
            ingestion,
            validation,
        };
        let transformation = self
            .run_stage(&transformation_stage, &ctx, &transformation_input, state)
            .await?;
        state.artifacts.transformation = Some(transformation.clone());

        let training_stage = TrainingStage::new(config.training.clone());
        let training = self
            .run_stage(&training_stage, &ctx, &transformation, state)
            .await?;
        state.artifacts.training = Some(training.clone());

        let evaluation_stage =
            EvaluationStage::new(config.evaluation.clone(), self.model_registry.clone());
        let evaluation_input = EvaluationInput {
            training: training.clone(),
            transformation,
        };
        let evaluation = self
            .run_stage(&evaluation_stage, &ctx, &evaluation_input, state)
            .await?;
        state.artifacts.evaluation = Some(evaluation.clone());
        if !evaluation.decision.accepted {
            info!(
                delta = evaluation.decision.score_delta,
                threshold = evaluation.decision.threshold,
                "Halting: candidate rejected"
            );
            return Ok(RunOutcome::Rejected);
        }

        let publication_stage =
            PublicationStage::new(config.publication.clone(), self.model_registry.clone());
        let publication_input = PublicationInput {
            evaluation,
            training,
        };
        let publication = self
            .run_stage(&publication_stage, &ctx, &publication_input, state)
            .await?;
        state.artifacts.publication = Some(publication);

        Ok(RunOutcome::Published)
    }

    async fn load_schema(&self, state: &mut RunState) -> Result<SchemaContract, StageFault> {
        let stage = StageName::SchemaLoad;
        self.checkpoint(stage, state)?;

        let timer = StageTimer::start(stage);
        match self.schema_registry.load().await {
            Ok(contract) => {
                state.trace.record(timer.finish(StageStatus::Ok));
                Ok(contract)
            }
            Err(e) => {
                let fault = StageFault::new(stage, e.into());
                state.trace.record(timer.finish(StageStatus::Fail));
                self.report_fault(&state.run_id, &fault).await;
                Err(fault)
            }
        }
    }

    /// Runs one stage with events, timing and a span around it.
    async fn run_stage<S>(
        &self,
        stage: &S,
        ctx: &StageContext,
        input: &S::Input,
        state: &mut RunState,
    ) -> Result<S::Output, StageFault>
    where
        S: PipelineStage,
    {
        let name = stage.name();
        self.checkpoint(name, state)?;

        self.emit(PipelineEvent::new(EventKind::StageStarted, state.run_id.clone()).for_stage(name))
            .await;
        let timer = StageTimer::start(name);
        let span = info_span!("stage", stage = %name);

        match stage.execute(ctx, input).instrument(span).await {
            Ok(artifact) => {
                let timing = timer.finish(StageStatus::Ok);
                info!(
                    stage = %name,
                    duration_ms = timing.duration_ms,
                    "Stage completed"
                );
                self.emit(
                    PipelineEvent::new(EventKind::StageCompleted, state.run_id.clone())
                        .for_stage(name)
                        .with_data(json!({
                            "artifact_id": artifact.meta().artifact_id,
                            "location": artifact.meta().location,
                            "duration_ms": timing.duration_ms,
                        })),
                )
                .await;
                state.trace.record(timing);
                Ok(artifact)
            }
            Err(e) => {
                state.trace.record(timer.finish(StageStatus::Fail));
                let fault = StageFault::new(name, e);
                self.report_fault(&state.run_id, &fault).await;
                Err(fault)
            }
        }
    }

    /// Fails with `Cancelled` if cancellation was requested before `stage`.
    fn checkpoint(&self, stage: StageName, state: &mut RunState) -> Result<(), StageFault> {
        if !self.cancellation.is_cancelled() {
            return Ok(());
        }
        let reason = self
            .cancellation
            .reason()
            .unwrap_or_else(|| "cancellation requested".to_string());
        warn!(stage = %stage, reason = %reason, "Run cancelled before stage");
        state
            .trace
            .record(StageTimer::start(stage).finish(StageStatus::Cancel));
        Err(StageFault::new(stage, PipelineError::Cancelled { reason }))
    }

    async fn report_fault(&self, run_id: &RunId, fault: &StageFault) {
        let report = fault.report();
        error!(
            stage = %fault.stage,
            kind = %report.kind,
            causes = ?report.causes,
            "Stage failed"
        );
        self.emit(
            PipelineEvent::new(EventKind::StageFailed, run_id.clone())
                .for_stage(fault.stage)
                .with_data(json!({
                    "kind": report.kind,
                    "causes": report.causes,
                })),
        )
        .await;
    }

    async fn finish(&self, state: &RunState, outcome: &RunOutcome) {
        if let Some(store) = &state.store {
            let record = TraceRecord {
                trace: &state.trace,
                outcome: outcome.label(),
                fault: outcome.fault().map(StageFault::report),
            };
            if let Err(e) = store.write_run_file(TRACE_FILE, &record).await {
                warn!(error = %e, "Failed to persist run trace");
            }
        }

        info!(
            outcome = outcome.label(),
            stages = state.trace.stages.len(),
            "Pipeline run finished"
        );
        self.emit(
            PipelineEvent::new(EventKind::PipelineCompleted, state.run_id.clone())
                .with_data(json!({ "outcome": outcome.label() })),
        )
        .await;
    }

    async fn emit(&self, event: PipelineEvent) {
        self.events.emit(event).await;
    }
}
