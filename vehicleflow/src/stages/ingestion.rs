//! Fetches the raw collection and splits it into train and test partitions.

use super::{PipelineStage, StageContext};
use crate::artifacts::{IngestionArtifact, Partition};
use crate::config::IngestionConfig;
use crate::core::{ArtifactMeta, StageName};
use crate::data::{Cell, DataSource, Dataset, SourceError};
use crate::errors::PipelineError;
use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info};

/// Shuffles row indices with `seed` and cuts off the test partition.
///
/// The test partition holds `round(rows * test_ratio)` rows. Returns
/// `(train, test)` index lists.
#[must_use]
pub fn split_indices(rows: usize, test_ratio: f64, seed: u64) -> (Vec<usize>, Vec<usize>) {
    let mut indices: Vec<usize> = (0..rows).collect();
    let mut rng = StdRng::seed_from_u64(seed);
    indices.shuffle(&mut rng);

    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let test_size = ((rows as f64 * test_ratio).round() as usize).min(rows);
    let train = indices.split_off(test_size);
    (train, indices)
}

/// The ingestion stage.
pub struct IngestionStage {
    config: IngestionConfig,
    source: Arc<dyn DataSource>,
}

impl IngestionStage {
    /// Creates the stage.
    #[must_use]
    pub fn new(config: IngestionConfig, source: Arc<dyn DataSource>) -> Self {
        Self { config, source }
    }

    async fn fetch(&self) -> Result<Dataset, PipelineError> {
        let collection = &self.config.collection;
        self.source.fetch(collection).await.map_err(|e| match e {
            SourceError::Exhausted { attempts, last } => PipelineError::SourceUnavailable {
                collection: collection.clone(),
                attempts,
                source: *last,
            },
            transient if transient.is_transient() => PipelineError::SourceUnavailable {
                collection: collection.clone(),
                attempts: 1,
                source: transient,
            },
            other => PipelineError::Source(other),
        })
    }

    fn cleanse(&self, raw: Dataset) -> Dataset {
        raw.drop_column(&self.config.id_column).map_cells(|cell| match cell {
            Cell::Text(s) if self.config.is_placeholder(s) => Some(Cell::Null),
            _ => None,
        })
    }
}

impl fmt::Debug for IngestionStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IngestionStage")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl PipelineStage for IngestionStage {
    type Input = ();
    type Output = IngestionArtifact;

    fn name(&self) -> StageName {
        StageName::Ingestion
    }

    async fn execute(
        &self,
        ctx: &StageContext,
        _input: &(),
    ) -> Result<IngestionArtifact, PipelineError> {
        let raw = self.fetch().await?;
        debug!(
            collection = %self.config.collection,
            rows = raw.row_count(),
            columns = raw.column_count(),
            "Fetched raw collection"
        );

        let data = self.cleanse(raw);
        if data.is_empty() {
            return Err(PipelineError::EmptyDataset {
                collection: self.config.collection.clone(),
            });
        }

        let (train_idx, test_idx) =
            split_indices(data.row_count(), self.config.test_ratio, self.config.split_seed);
        let empty = if train_idx.is_empty() {
            Some(Partition::Train)
        } else if test_idx.is_empty() {
            Some(Partition::Test)
        } else {
            None
        };
        if let Some(partition) = empty {
            return Err(PipelineError::EmptyPartition {
                collection: self.config.collection.clone(),
                partition,
                rows: data.row_count(),
                test_ratio: self.config.test_ratio,
            });
        }
        let train = data.select_rows(&train_idx);
        let test = data.select_rows(&test_idx);

        let store = ctx.store();
        let train_path = store.write_json(self.name(), "train.json", &train).await?;
        let test_path = store.write_json(self.name(), "test.json", &test).await?;

        let artifact = IngestionArtifact {
            meta: ArtifactMeta::new(
                ctx.run_id().clone(),
                self.name(),
                ctx.record_location(self.name()),
                Vec::new(),
            ),
            collection: self.config.collection.clone(),
            train_path,
            test_path,
            train_rows: train.row_count(),
            test_rows: test.row_count(),
            column_count: data.column_count(),
            split_seed: self.config.split_seed,
        };
        ctx.persist(&artifact).await?;

        info!(
            train_rows = artifact.train_rows,
            test_rows = artifact.test_rows,
            columns = artifact.column_count,
            "Ingestion complete"
        );
        Ok(artifact)
    }
}
