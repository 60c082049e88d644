//! End-to-end tests for pipeline runs.

#[cfg(test)]
mod tests {
    use crate::artifacts::{CheckKind, Partition};
    use crate::cancellation::CancellationToken;
    use crate::config::{IngestionConfig, PipelineConfig, TrainingConfig};
    use crate::core::{StageName, StageStatus};
    use crate::data::{
        DataSource, Dataset, InMemoryDataSource, JsonLinesDataSource, RetryConfig,
        RetryingDataSource,
    };
    use crate::errors::PipelineError;
    use crate::events::{CollectingEventSink, EventKind, EventSink, PipelineEvent};
    use crate::model::{AlgorithmConfig, FittedModel, ModelBundle};
    use crate::pipeline::{Pipeline, PipelineBuilder, PipelineResult, RunOutcome, TRACE_FILE};
    use crate::registry::{FsModelRegistry, InMemoryModelRegistry, ModelRegistry};
    use crate::schema::{JsonFileSchemaRegistry, StaticSchemaRegistry};
    use crate::serving::Predictor;
    use crate::testing::{
        vehicle_dataset, vehicle_records, vehicle_schema_document, write_json_lines,
        FaultyModelRegistry, FlakySource, VEHICLE_COLLECTION,
    };
    use crate::utils::content_md5;
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use std::path::Path;
    use std::sync::Arc;

    const MODEL_KEY: &str = "model-registry/model.json";

    fn config(root: &Path) -> PipelineConfig {
        PipelineConfig::new()
            .with_artifact_root(root.join("artifacts"))
            .with_ingestion(IngestionConfig::default().with_test_ratio(0.2))
    }

    fn source(data: Dataset) -> Arc<InMemoryDataSource> {
        Arc::new(InMemoryDataSource::new().with_collection(VEHICLE_COLLECTION, data))
    }

    fn pipeline(
        config: PipelineConfig,
        source: Arc<dyn DataSource>,
        registry: Arc<dyn ModelRegistry>,
    ) -> PipelineBuilder {
        PipelineBuilder::new(config)
            .source(source)
            .schema_registry(Arc::new(StaticSchemaRegistry::new(vehicle_schema_document())))
            .model_registry(registry)
    }

    fn majority_class(config: PipelineConfig) -> PipelineConfig {
        config.with_training(TrainingConfig::default().with_algorithm(AlgorithmConfig::MajorityClass))
    }

    async fn run(pipeline: &Pipeline) -> PipelineResult {
        pipeline.run().await
    }

    #[tokio::test]
    async fn test_bootstrap_run_publishes() {
        let dir = tempfile::tempdir().unwrap();
        let registry = Arc::new(InMemoryModelRegistry::new());
        let events = Arc::new(CollectingEventSink::new());
        let pipeline = pipeline(config(dir.path()), source(vehicle_dataset(1000, 7)), registry.clone())
            .event_sink(events.clone())
            .build()
            .unwrap();

        let result = run(&pipeline).await;

        assert!(result.is_published(), "outcome: {}", result.outcome);
        assert_eq!(result.exit_code(), 0);

        let ingestion = result.artifacts.ingestion.as_ref().unwrap();
        assert_eq!((ingestion.train_rows, ingestion.test_rows), (800, 200));
        assert!(result.artifacts.validation.as_ref().unwrap().is_valid);

        let evaluation = result.artifacts.evaluation.as_ref().unwrap();
        assert!(evaluation.decision.accepted);
        assert_eq!(evaluation.decision.baseline_score, None);
        assert_eq!(evaluation.decision.score_delta, 0.0);
        assert!(evaluation.baseline_metrics.is_none());

        let publication = result.artifacts.publication.as_ref().unwrap();
        let stored = registry.get(MODEL_KEY).await.unwrap().unwrap();
        assert_eq!(publication.content_md5, content_md5(&stored));
        assert_eq!(publication.registry_location, format!("memory://{MODEL_KEY}"));

        assert_eq!(
            result.trace.executed_stages(),
            vec![
                StageName::SchemaLoad,
                StageName::Ingestion,
                StageName::Validation,
                StageName::Transformation,
                StageName::Training,
                StageName::Evaluation,
                StageName::Publication,
            ]
        );
        assert!(result.trace.finished_at.is_some());

        let kinds = events.kinds();
        assert_eq!(kinds.first(), Some(&EventKind::PipelineStarted));
        assert_eq!(kinds.last(), Some(&EventKind::PipelineCompleted));
        assert_eq!(events.of_kind(EventKind::StageStarted).len(), 6);
        assert_eq!(events.of_kind(EventKind::StageCompleted).len(), 6);
        assert!(events.of_kind(EventKind::StageFailed).is_empty());
    }

    #[tokio::test]
    async fn test_trace_file_written() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = pipeline(
            config(dir.path()),
            source(vehicle_dataset(200, 1)),
            Arc::new(InMemoryModelRegistry::new()),
        )
        .build()
        .unwrap();

        let result = run(&pipeline).await;
        let run_dir = result.run_dir.clone().unwrap();
        assert!(run_dir.starts_with(dir.path().join("artifacts")));
        assert!(run_dir.ends_with(result.run_id.as_str()));

        let trace: serde_json::Value =
            serde_json::from_slice(&std::fs::read(run_dir.join(TRACE_FILE)).unwrap()).unwrap();
        assert_eq!(trace["outcome"], "published");
        assert_eq!(trace["run_id"], result.run_id.as_str());
        assert_eq!(trace["stages"].as_array().unwrap().len(), 7);
        assert!(trace.get("fault").is_none());

        for stage in StageName::ORDER {
            assert!(run_dir.join(stage.as_str()).join("artifact.json").is_file());
        }
    }

    #[tokio::test]
    async fn test_missing_required_value_halts_on_validation() {
        let dir = tempfile::tempdir().unwrap();
        let mut records = vehicle_records(1000, 7);
        records[17].remove("Age");
        let data = Dataset::from_records(records);
        let registry = Arc::new(InMemoryModelRegistry::new());
        let pipeline = pipeline(config(dir.path()), source(data), registry.clone())
            .build()
            .unwrap();

        let result = run(&pipeline).await;

        assert!(matches!(result.outcome, RunOutcome::HaltedOnValidation));
        assert_eq!(result.exit_code(), 2);
        let validation = result.artifacts.validation.as_ref().unwrap();
        assert!(!validation.is_valid);
        assert_eq!(validation.validation_report.len(), 1);
        let violation = &validation.validation_report[0];
        assert_eq!(violation.check, CheckKind::Nullability);
        assert_eq!(violation.column.as_deref(), Some("Age"));
        assert_eq!(violation.offending_rows, 1);

        assert!(result.artifacts.transformation.is_none());
        assert!(result.artifacts.training.is_none());
        let run_dir = result.run_dir.unwrap();
        assert!(!run_dir.join(StageName::Transformation.as_str()).exists());
        assert_eq!(result.trace.executed_stages().last(), Some(&StageName::Validation));
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn test_null_target_halts_on_validation() {
        let dir = tempfile::tempdir().unwrap();
        let mut document = vehicle_schema_document();
        for column in &mut document.columns {
            if column.name == "Response" {
                column.nullable = true;
            }
        }
        let mut records = vehicle_records(200, 5);
        records[93].insert("Response".to_string(), serde_json::Value::Null);
        let pipeline = PipelineBuilder::new(config(dir.path()))
            .source(source(Dataset::from_records(records)))
            .schema_registry(Arc::new(StaticSchemaRegistry::new(document)))
            .model_registry(Arc::new(InMemoryModelRegistry::new()))
            .build()
            .unwrap();

        let result = run(&pipeline).await;

        assert!(
            matches!(result.outcome, RunOutcome::HaltedOnValidation),
            "outcome: {}",
            result.outcome
        );
        let validation = result.artifacts.validation.as_ref().unwrap();
        assert!(!validation.is_valid);
        assert_eq!(validation.validation_report.len(), 1);
        let violation = &validation.validation_report[0];
        assert_eq!(violation.check, CheckKind::TargetLabel);
        assert_eq!(violation.column.as_deref(), Some("Response"));
        assert_eq!(violation.offending_rows, 1);
        assert!(result.artifacts.transformation.is_none());
    }

    #[tokio::test]
    async fn test_equal_candidate_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let registry = Arc::new(InMemoryModelRegistry::new());
        let pipeline = pipeline(config(dir.path()), source(vehicle_dataset(400, 3)), registry.clone())
            .build()
            .unwrap();

        let first = run(&pipeline).await;
        assert!(first.is_published());
        let published = registry.get(MODEL_KEY).await.unwrap().unwrap();

        let second = run(&pipeline).await;
        assert!(matches!(second.outcome, RunOutcome::Rejected));
        assert_eq!(second.exit_code(), 0);
        assert_ne!(first.run_id, second.run_id);

        let decision = second.artifacts.evaluation.as_ref().unwrap().decision;
        assert!(!decision.accepted);
        assert_eq!(decision.score_delta, 0.0);
        assert_eq!(decision.baseline_score, Some(decision.candidate_score));
        assert!(second.artifacts.publication.is_none());
        assert_eq!(registry.get(MODEL_KEY).await.unwrap().unwrap(), published);
    }

    #[tokio::test]
    async fn test_better_candidate_replaces_baseline() {
        let dir = tempfile::tempdir().unwrap();
        let registry = Arc::new(InMemoryModelRegistry::new());
        let data = source(vehicle_dataset(600, 11));

        let baseline = pipeline(majority_class(config(dir.path())), data.clone(), registry.clone())
            .build()
            .unwrap();
        assert!(run(&baseline).await.is_published());

        let candidate = pipeline(config(dir.path()), data, registry.clone())
            .build()
            .unwrap();
        let result = run(&candidate).await;

        assert!(result.is_published(), "outcome: {}", result.outcome);
        let evaluation = result.artifacts.evaluation.as_ref().unwrap();
        assert_eq!(evaluation.decision.baseline_score, Some(0.0));
        assert!(evaluation.decision.score_delta > evaluation.decision.threshold);

        let stored = registry.get(MODEL_KEY).await.unwrap().unwrap();
        let bundle = ModelBundle::from_bytes(&stored).unwrap();
        assert!(matches!(bundle.model, FittedModel::LogisticRegression(_)));
        assert_eq!(bundle.metadata.run_id, result.run_id);
    }

    #[tokio::test]
    async fn test_publication_fault_keeps_previous_model() {
        let dir = tempfile::tempdir().unwrap();
        let registry_root = dir.path().join("registry");
        let data = source(vehicle_dataset(600, 11));

        let baseline = pipeline(
            majority_class(config(dir.path())),
            data.clone(),
            Arc::new(FsModelRegistry::new(&registry_root)),
        )
        .build()
        .unwrap();
        assert!(run(&baseline).await.is_published());
        let object = registry_root.join(MODEL_KEY);
        let before = std::fs::read(&object).unwrap();

        let candidate = pipeline(
            config(dir.path()),
            data,
            Arc::new(FaultyModelRegistry::new(&registry_root)),
        )
        .build()
        .unwrap();
        let result = run(&candidate).await;

        let RunOutcome::Aborted(fault) = &result.outcome else {
            panic!("expected abort, got {}", result.outcome);
        };
        assert_eq!(fault.stage, StageName::Publication);
        assert!(matches!(fault.error, PipelineError::Publication { .. }));
        assert_eq!(fault.report().kind, "PublicationError");
        assert_eq!(result.exit_code(), 1);
        assert!(result.artifacts.evaluation.as_ref().unwrap().decision.accepted);

        assert_eq!(std::fs::read(&object).unwrap(), before);
        let entries = std::fs::read_dir(object.parent().unwrap()).unwrap().count();
        assert_eq!(entries, 1);
    }

    #[tokio::test]
    async fn test_transformation_is_reproducible() {
        let dir = tempfile::tempdir().unwrap();
        let data = vehicle_dataset(300, 5);
        let first = pipeline(
            config(dir.path()),
            source(data.clone()),
            Arc::new(InMemoryModelRegistry::new()),
        )
        .build()
        .unwrap();
        let second = pipeline(
            config(dir.path()),
            source(data),
            Arc::new(InMemoryModelRegistry::new()),
        )
        .build()
        .unwrap();

        let a = run(&first).await;
        let b = run(&second).await;
        let ta = a.artifacts.transformation.as_ref().unwrap();
        let tb = b.artifacts.transformation.as_ref().unwrap();

        assert_eq!(ta.fingerprint, tb.fingerprint);
        for (pa, pb) in [
            (&ta.train_features_path, &tb.train_features_path),
            (&ta.test_features_path, &tb.test_features_path),
            (&ta.train_labels_path, &tb.train_labels_path),
            (&ta.test_labels_path, &tb.test_labels_path),
            (&ta.transformer_path, &tb.transformer_path),
        ] {
            assert_ne!(pa, pb);
            assert_eq!(std::fs::read(pa).unwrap(), std::fs::read(pb).unwrap());
        }
    }

    #[tokio::test]
    async fn test_fingerprint_round_trips_to_serving() {
        let dir = tempfile::tempdir().unwrap();
        let registry = Arc::new(InMemoryModelRegistry::new());
        let pipeline = pipeline(config(dir.path()), source(vehicle_dataset(400, 2)), registry.clone())
            .build()
            .unwrap();

        let result = run(&pipeline).await;
        let training = result.artifacts.training.as_ref().unwrap();
        let publication = result.artifacts.publication.as_ref().unwrap();
        assert_eq!(training.fingerprint, publication.fingerprint);

        let predictor = Predictor::from_bytes(&registry.get(MODEL_KEY).await.unwrap().unwrap())
            .unwrap();
        let schema = predictor.schema();
        assert_eq!(schema.fingerprint, training.fingerprint);
        assert_eq!(
            schema.feature_names,
            result.artifacts.transformation.as_ref().unwrap().feature_names
        );

        let record = &vehicle_records(1, 99)[0];
        let prediction = predictor.predict(record, &training.fingerprint).unwrap();
        assert!(prediction == 0.0 || prediction == 1.0);
        assert!(predictor.predict(record, "stale").is_err());
    }

    /// Cancels the run once a given stage completes.
    struct CancelAfter {
        stage: StageName,
        token: CancellationToken,
    }

    #[async_trait]
    impl EventSink for CancelAfter {
        async fn emit(&self, event: PipelineEvent) {
            if event.kind == EventKind::StageCompleted && event.stage == Some(self.stage) {
                self.token.cancel("operator stop");
            }
        }
    }

    #[tokio::test]
    async fn test_cancellation_between_stages() {
        let dir = tempfile::tempdir().unwrap();
        let token = CancellationToken::new();
        let pipeline = pipeline(
            config(dir.path()),
            source(vehicle_dataset(200, 4)),
            Arc::new(InMemoryModelRegistry::new()),
        )
        .cancellation(token.clone())
        .event_sink(Arc::new(CancelAfter {
            stage: StageName::Validation,
            token,
        }))
        .build()
        .unwrap();

        let result = run(&pipeline).await;

        let fault = result.outcome.fault().unwrap();
        assert_eq!(fault.stage, StageName::Transformation);
        assert!(matches!(
            &fault.error,
            PipelineError::Cancelled { reason } if reason == "operator stop"
        ));
        assert!(result.artifacts.validation.is_some());
        assert!(result.artifacts.transformation.is_none());
        let last = result.trace.stages.last().unwrap();
        assert_eq!((last.stage, last.status), (StageName::Transformation, StageStatus::Cancel));
    }

    #[tokio::test]
    async fn test_unreachable_source_aborts_in_ingestion() {
        let dir = tempfile::tempdir().unwrap();
        let flaky = Arc::new(RetryingDataSource::new(
            FlakySource::always_failing(),
            RetryConfig::new().with_max_attempts(3).with_base_delay_ms(1),
        ));
        let events = Arc::new(CollectingEventSink::new());
        let pipeline = pipeline(
            config(dir.path()),
            flaky.clone(),
            Arc::new(InMemoryModelRegistry::new()),
        )
        .event_sink(events.clone())
        .build()
        .unwrap();

        let result = run(&pipeline).await;

        let fault = result.outcome.fault().unwrap();
        assert_eq!(fault.stage, StageName::Ingestion);
        assert!(matches!(
            fault.error,
            PipelineError::SourceUnavailable { attempts: 3, .. }
        ));
        assert!(!fault.cause_chain().is_empty());
        assert_eq!(flaky.inner().call_count(), 3);
        assert!(result.artifacts.ingestion.is_none());

        let failed = events.of_kind(EventKind::StageFailed);
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].stage, Some(StageName::Ingestion));
        assert_eq!(failed[0].data["kind"], "SourceUnavailable");
    }

    #[tokio::test]
    async fn test_flaky_source_recovers_within_budget() {
        let dir = tempfile::tempdir().unwrap();
        let flaky = Arc::new(RetryingDataSource::new(
            FlakySource::new(vehicle_dataset(200, 8), 2),
            RetryConfig::new().with_max_attempts(3).with_base_delay_ms(1),
        ));
        let pipeline = pipeline(
            config(dir.path()),
            flaky.clone(),
            Arc::new(InMemoryModelRegistry::new()),
        )
        .build()
        .unwrap();

        assert!(run(&pipeline).await.is_published());
        assert_eq!(flaky.inner().call_count(), 3);
    }

    #[tokio::test]
    async fn test_empty_collection_aborts() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = pipeline(
            config(dir.path()),
            Arc::new(InMemoryDataSource::new()),
            Arc::new(InMemoryModelRegistry::new()),
        )
        .build()
        .unwrap();

        let result = run(&pipeline).await;
        let fault = result.outcome.fault().unwrap();
        assert_eq!(fault.stage, StageName::Ingestion);
        assert!(matches!(fault.error, PipelineError::EmptyDataset { .. }));
    }

    #[tokio::test]
    async fn test_empty_holdout_aborts_before_publication() {
        let dir = tempfile::tempdir().unwrap();
        let registry = Arc::new(InMemoryModelRegistry::new());
        let config = config(dir.path()).with_ingestion(IngestionConfig::default().with_test_ratio(0.1));
        let pipeline = pipeline(config, source(vehicle_dataset(4, 3)), registry.clone())
            .build()
            .unwrap();

        let result = run(&pipeline).await;

        let fault = result.outcome.fault().unwrap();
        assert_eq!(fault.stage, StageName::Ingestion);
        assert!(matches!(
            fault.error,
            PipelineError::EmptyPartition {
                partition: Partition::Test,
                rows: 4,
                ..
            }
        ));
        assert_eq!(fault.report().kind, "DataSourceError");
        assert!(result.artifacts.ingestion.is_none());
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn test_malformed_schema_aborts_before_ingestion() {
        let dir = tempfile::tempdir().unwrap();
        let mut document = vehicle_schema_document();
        document.target_column = "Missing".to_string();
        let pipeline = PipelineBuilder::new(config(dir.path()))
            .source(source(vehicle_dataset(50, 1)))
            .schema_registry(Arc::new(StaticSchemaRegistry::new(document)))
            .model_registry(Arc::new(InMemoryModelRegistry::new()))
            .build()
            .unwrap();

        let result = run(&pipeline).await;
        let fault = result.outcome.fault().unwrap();
        assert_eq!(fault.stage, StageName::SchemaLoad);
        assert_eq!(fault.report().kind, "SchemaLoadError");
        assert!(result.artifacts.ingestion.is_none());
        assert_eq!(result.trace.executed_stages(), vec![StageName::SchemaLoad]);

        let trace: serde_json::Value = serde_json::from_slice(
            &std::fs::read(result.run_dir.unwrap().join(TRACE_FILE)).unwrap(),
        )
        .unwrap();
        assert_eq!(trace["outcome"], "aborted");
        assert_eq!(trace["fault"]["stage"], "schema_load");
    }

    #[tokio::test]
    async fn test_file_backed_collaborators() {
        let dir = tempfile::tempdir().unwrap();
        let data_dir = dir.path().join("data");
        std::fs::create_dir_all(&data_dir).unwrap();
        write_json_lines(
            &data_dir.join(format!("{VEHICLE_COLLECTION}.jsonl")),
            &vehicle_records(300, 21),
        )
        .unwrap();
        let schema_path = dir.path().join("schema.json");
        let document = vehicle_schema_document();
        std::fs::write(&schema_path, serde_json::to_vec_pretty(&document).unwrap()).unwrap();
        let registry_root = dir.path().join("registry");

        let pipeline = PipelineBuilder::new(config(dir.path()))
            .source(Arc::new(JsonLinesDataSource::new(&data_dir)))
            .schema_registry(Arc::new(JsonFileSchemaRegistry::new(&schema_path)))
            .model_registry(Arc::new(FsModelRegistry::new(&registry_root)))
            .build()
            .unwrap();

        let result = run(&pipeline).await;
        assert!(result.is_published(), "outcome: {}", result.outcome);
        let ingestion = result.artifacts.ingestion.as_ref().unwrap();
        assert_eq!((ingestion.train_rows, ingestion.test_rows), (240, 60));

        let publication = result.artifacts.publication.unwrap();
        let stored = std::fs::read(registry_root.join(MODEL_KEY)).unwrap();
        assert_eq!(publication.content_md5, content_md5(&stored));
    }
}
