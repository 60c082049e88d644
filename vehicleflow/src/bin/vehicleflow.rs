//! Runs the pipeline once.
//!
//! Configuration comes from `VEHICLEFLOW_CONFIG` and the override variables
//! read by [`PipelineConfig::from_env`]. The exit code is 0 when a model was
//! published or rejected, 2 when validation halted the run and 1 when it
//! aborted.

use anyhow::Context;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info};
use vehicleflow::prelude::*;

/// Selects `text` or `json` log lines.
const ENV_LOG_FORMAT: &str = "VEHICLEFLOW_LOG_FORMAT";

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let format = match std::env::var(ENV_LOG_FORMAT) {
        Ok(value) => value.parse::<LogFormat>().map_err(anyhow::Error::msg)?,
        Err(_) => LogFormat::default(),
    };
    init_tracing(format, "info").context("failed to install tracing subscriber")?;

    let config = PipelineConfig::from_env().context("failed to load pipeline configuration")?;
    let source = RetryingDataSource::new(
        JsonLinesDataSource::new(&config.data_dir),
        config.source_retry.clone(),
    );
    let schema_registry = JsonFileSchemaRegistry::new(&config.schema_path);
    let model_registry = FsModelRegistry::new(&config.registry_root);

    let token = CancellationToken::new();
    let pipeline = PipelineBuilder::new(config)
        .source(Arc::new(source))
        .schema_registry(Arc::new(schema_registry))
        .model_registry(Arc::new(model_registry))
        .event_sink(Arc::new(LoggingEventSink::default()))
        .cancellation(token.clone())
        .build()
        .context("invalid pipeline configuration")?;

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            token.cancel("interrupted");
        }
    });

    let result = pipeline.run().await;
    match &result.outcome {
        RunOutcome::Aborted(fault) => {
            let report = fault.report();
            error!(
                run_id = %result.run_id,
                stage = %report.stage,
                kind = %report.kind,
                causes = ?report.causes,
                "Run aborted"
            );
        }
        outcome => info!(run_id = %result.run_id, outcome = %outcome, "Run finished"),
    }

    Ok(ExitCode::from(u8::try_from(result.exit_code()).unwrap_or(1)))
}
