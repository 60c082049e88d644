//! Feature encoders fitted on the training partition.

use super::FeatureMatrix;
use crate::config::TransformationConfig;
use crate::data::{Cell, Dataset};
use crate::schema::{ColumnType, SchemaContract};
use crate::utils::sha256_hex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use thiserror::Error;

/// Errors raised while fitting or applying the transformer.
#[derive(Debug, Error)]
pub enum TransformError {
    /// The training partition has no rows to fit on.
    #[error("cannot fit encoders on an empty training partition")]
    EmptyTrainingPartition,

    /// A column the transformer needs is absent.
    #[error("column '{column}' is missing")]
    MissingColumn {
        /// Column name.
        column: String,
    },

    /// A numeric column holds text.
    #[error("column '{column}' row {row} is not numeric: {value}")]
    NonNumeric {
        /// Column name.
        column: String,
        /// Row index.
        row: usize,
        /// Offending value.
        value: String,
    },

    /// A target value is not a binary class label.
    #[error("target row {row} is not a 0/1 label: {value}")]
    InvalidLabel {
        /// Row index.
        row: usize,
        /// Offending value.
        value: String,
    },
}

/// One fitted encoder, producing one or more feature columns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FittedEncoder {
    /// `(x - mean) / std`, missing values imputed with the mean.
    Standard {
        /// Source column.
        column: String,
        /// Training mean.
        mean: f64,
        /// Training standard deviation, `1.0` when the column is constant.
        std: f64,
    },
    /// `(x - min) / (max - min)`, missing values imputed with the mean.
    MinMax {
        /// Source column.
        column: String,
        /// Training minimum.
        min: f64,
        /// Training maximum.
        max: f64,
        /// Training mean.
        mean: f64,
    },
    /// Raw value, missing values imputed with the mean.
    Passthrough {
        /// Source column.
        column: String,
        /// Training mean.
        mean: f64,
    },
    /// One indicator per training category; unseen and missing map to zeros.
    OneHot {
        /// Source column.
        column: String,
        /// Sorted training categories.
        categories: Vec<String>,
    },
    /// `1.0` for the positive label, `0.0` otherwise.
    Binary {
        /// Source column.
        column: String,
        /// Label mapped to `1.0`.
        positive: String,
    },
}

impl FittedEncoder {
    /// The source column.
    #[must_use]
    pub fn column(&self) -> &str {
        match self {
            Self::Standard { column, .. }
            | Self::MinMax { column, .. }
            | Self::Passthrough { column, .. }
            | Self::OneHot { column, .. }
            | Self::Binary { column, .. } => column,
        }
    }

    fn feature_names(&self) -> Vec<String> {
        match self {
            Self::OneHot { column, categories } => categories
                .iter()
                .map(|c| format!("{column}_{c}"))
                .collect(),
            other => vec![other.column().to_string()],
        }
    }

    fn encode(&self, cell: &Cell, row: usize, out: &mut Vec<f64>) -> Result<(), TransformError> {
        match self {
            Self::Standard { column, mean, std } => {
                let x = numeric(column, cell, row)?.unwrap_or(*mean);
                out.push((x - mean) / std);
            }
            Self::MinMax {
                column,
                min,
                max,
                mean,
            } => {
                let x = numeric(column, cell, row)?.unwrap_or(*mean);
                let range = max - min;
                out.push(if range == 0.0 { 0.0 } else { (x - min) / range });
            }
            Self::Passthrough { column, mean } => {
                out.push(numeric(column, cell, row)?.unwrap_or(*mean));
            }
            Self::OneHot { categories, .. } => {
                let label = category_label(cell);
                out.extend(
                    categories
                        .iter()
                        .map(|c| if Some(c) == label.as_ref() { 1.0 } else { 0.0 }),
                );
            }
            Self::Binary { positive, .. } => {
                let hit = category_label(cell).is_some_and(|l| l == *positive);
                out.push(if hit { 1.0 } else { 0.0 });
            }
        }
        Ok(())
    }
}

fn numeric(column: &str, cell: &Cell, row: usize) -> Result<Option<f64>, TransformError> {
    match cell {
        Cell::Null => Ok(None),
        Cell::Number(n) => Ok(Some(*n)),
        Cell::Text(s) => Err(TransformError::NonNumeric {
            column: column.to_string(),
            row,
            value: s.clone(),
        }),
    }
}

fn category_label(cell: &Cell) -> Option<String> {
    match cell {
        Cell::Null => None,
        Cell::Number(n) => Some(n.to_string()),
        Cell::Text(s) => Some(s.clone()),
    }
}

fn column_values<'a>(
    train: &'a Dataset,
    column: &str,
) -> Result<impl Iterator<Item = &'a Cell> + 'a, TransformError> {
    train
        .column(column)
        .ok_or_else(|| TransformError::MissingColumn {
            column: column.to_string(),
        })
}

fn numeric_values(train: &Dataset, column: &str) -> Result<Vec<f64>, TransformError> {
    let mut values = Vec::with_capacity(train.row_count());
    for (row, cell) in column_values(train, column)?.enumerate() {
        if let Some(x) = numeric(column, cell, row)? {
            values.push(x);
        }
    }
    Ok(values)
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

/// Encoders fitted on one training partition, applied identically to every
/// later partition and at serving time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FittedTransformer {
    input_columns: Vec<(String, ColumnType)>,
    target_column: String,
    encoders: Vec<FittedEncoder>,
    feature_names: Vec<String>,
}

impl FittedTransformer {
    /// Fits encoders on the training partition.
    ///
    /// Schema columns are visited in declared order. The target and the
    /// schema's drop columns are excluded. Categorical columns are one-hot
    /// encoded unless configured as binary; numeric columns are scaled when
    /// listed in the config and passed through otherwise.
    ///
    /// # Errors
    ///
    /// Returns an error if the partition is empty, a column is missing, or
    /// a numeric column holds text.
    pub fn fit(
        train: &Dataset,
        schema: &SchemaContract,
        config: &TransformationConfig,
    ) -> Result<Self, TransformError> {
        if train.is_empty() {
            return Err(TransformError::EmptyTrainingPartition);
        }

        let mut input_columns = Vec::new();
        let mut encoders = Vec::new();

        for spec in schema.columns() {
            let name = spec.name.as_str();
            if name == schema.target_column() || schema.drop_columns().iter().any(|d| d == name) {
                continue;
            }
            if !train.has_column(name) {
                if spec.required {
                    return Err(TransformError::MissingColumn {
                        column: name.to_string(),
                    });
                }
                continue;
            }

            let encoder = if let Some(binary) = config.binary_column(name) {
                FittedEncoder::Binary {
                    column: name.to_string(),
                    positive: binary.positive_label.clone(),
                }
            } else if spec.column_type == ColumnType::Categorical {
                let categories: BTreeSet<String> = column_values(train, name)?
                    .filter_map(category_label)
                    .collect();
                FittedEncoder::OneHot {
                    column: name.to_string(),
                    categories: categories.into_iter().collect(),
                }
            } else {
                let values = numeric_values(train, name)?;
                let mean = mean(&values);
                if config.min_max_scale_columns.iter().any(|c| c == name) {
                    let min = values.iter().copied().fold(f64::INFINITY, f64::min);
                    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
                    let (min, max) = if values.is_empty() { (0.0, 0.0) } else { (min, max) };
                    FittedEncoder::MinMax {
                        column: name.to_string(),
                        min,
                        max,
                        mean,
                    }
                } else if config.standard_scale_columns.iter().any(|c| c == name) {
                    let variance = if values.is_empty() {
                        0.0
                    } else {
                        values.iter().map(|x| (x - mean).powi(2)).sum::<f64>()
                            / values.len() as f64
                    };
                    let std = variance.sqrt();
                    FittedEncoder::Standard {
                        column: name.to_string(),
                        mean,
                        std: if std > 0.0 { std } else { 1.0 },
                    }
                } else {
                    FittedEncoder::Passthrough {
                        column: name.to_string(),
                        mean,
                    }
                }
            };

            input_columns.push((name.to_string(), spec.column_type));
            encoders.push(encoder);
        }

        let feature_names = encoders.iter().flat_map(FittedEncoder::feature_names).collect();

        Ok(Self {
            input_columns,
            target_column: schema.target_column().to_string(),
            encoders,
            feature_names,
        })
    }

    /// Encodes every row of a partition.
    ///
    /// Columns the transformer does not use (target, dropped) are ignored.
    ///
    /// # Errors
    ///
    /// Returns an error if an input column is missing or a numeric column
    /// holds text.
    pub fn transform(&self, data: &Dataset) -> Result<FeatureMatrix, TransformError> {
        let indices = self
            .encoders
            .iter()
            .map(|e| {
                data.column_index(e.column())
                    .ok_or_else(|| TransformError::MissingColumn {
                        column: e.column().to_string(),
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let mut rows = Vec::with_capacity(data.row_count());
        for (row_idx, row) in data.rows().iter().enumerate() {
            let mut encoded = Vec::with_capacity(self.feature_names.len());
            for (encoder, &idx) in self.encoders.iter().zip(&indices) {
                encoder.encode(&row[idx], row_idx, &mut encoded)?;
            }
            rows.push(encoded);
        }

        Ok(FeatureMatrix::new(self.feature_names.clone(), rows))
    }

    /// Encodes one record keyed by column name. Absent keys count as missing.
    ///
    /// # Errors
    ///
    /// Returns an error if a numeric column holds text.
    pub fn transform_record(
        &self,
        record: &serde_json::Map<String, serde_json::Value>,
    ) -> Result<Vec<f64>, TransformError> {
        let mut encoded = Vec::with_capacity(self.feature_names.len());
        for encoder in &self.encoders {
            let cell = record
                .get(encoder.column())
                .map_or(Cell::Null, Cell::from_json);
            encoder.encode(&cell, 0, &mut encoded)?;
        }
        Ok(encoded)
    }

    /// Extracts the target column as `0.0`/`1.0` labels.
    ///
    /// # Errors
    ///
    /// Returns an error if the target is missing or holds anything but 0/1.
    pub fn labels(&self, data: &Dataset) -> Result<Vec<f64>, TransformError> {
        let cells = column_values(data, &self.target_column)?;
        cells
            .enumerate()
            .map(|(row, cell)| match cell {
                Cell::Number(n) if *n == 0.0 || *n == 1.0 => Ok(*n),
                other => Err(TransformError::InvalidLabel {
                    row,
                    value: other.to_string(),
                }),
            })
            .collect()
    }

    /// Stable identifier of the feature schema this transformer produces.
    ///
    /// Covers input column names and types plus output feature names.
    #[must_use]
    pub fn fingerprint(&self) -> String {
        let mut parts =
            Vec::with_capacity(self.input_columns.len() + self.feature_names.len() + 1);
        for (name, ty) in &self.input_columns {
            parts.push(format!("in:{name}:{ty}"));
        }
        parts.push(format!("target:{}", self.target_column));
        for feature in &self.feature_names {
            parts.push(format!("out:{feature}"));
        }
        sha256_hex(&parts)
    }

    /// Input columns with their declared types, in encoding order.
    #[must_use]
    pub fn input_columns(&self) -> &[(String, ColumnType)] {
        &self.input_columns
    }

    /// The label column.
    #[must_use]
    pub fn target_column(&self) -> &str {
        &self.target_column
    }

    /// Fitted encoders in order.
    #[must_use]
    pub fn encoders(&self) -> &[FittedEncoder] {
        &self.encoders
    }

    /// Output feature names.
    #[must_use]
    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }
}
