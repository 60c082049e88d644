//! Checks both ingestion partitions against the schema contract.

use super::{PipelineStage, StageContext};
use crate::artifacts::{
    ArtifactStore, CheckKind, IngestionArtifact, Partition, ValidationArtifact, Violation,
};
use crate::core::{Artifact, ArtifactMeta, StageName};
use crate::data::{Cell, Dataset};
use crate::errors::PipelineError;
use crate::schema::{ColumnSpec, ColumnType, SchemaContract};
use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;
use tracing::{info, warn};

/// Offending rows for one (column, check) pair.
#[derive(Default)]
struct Tally {
    count: usize,
    sample: Option<String>,
}

impl Tally {
    fn hit(&mut self, cell: &Cell) {
        self.count += 1;
        if self.sample.is_none() {
            self.sample = Some(cell.to_string());
        }
    }
}

fn bound(value: Option<f64>, unbounded: &str) -> String {
    value.map_or_else(|| unbounded.to_string(), |v| v.to_string())
}

fn category_label(cell: &Cell) -> Option<String> {
    match cell {
        Cell::Null => None,
        Cell::Number(n) => Some(n.to_string()),
        Cell::Text(s) => Some(s.clone()),
    }
}

fn check_column<'a>(
    partition: Partition,
    spec: &ColumnSpec,
    cells: impl Iterator<Item = &'a Cell>,
    schema: &SchemaContract,
    report: &mut Vec<Violation>,
) {
    let mut nulls = Tally::default();
    let mut non_numeric = Tally::default();
    let mut out_of_range = Tally::default();
    let mut non_integer = Tally::default();
    let mut disallowed = Tally::default();
    let mut unmatched = Tally::default();
    let mut non_label = Tally::default();
    let pattern = schema.pattern_for(&spec.name);
    let is_target = spec.name == schema.target_column();

    for cell in cells {
        if cell.is_null() {
            if !spec.nullable {
                nulls.hit(cell);
            } else if is_target {
                non_label.hit(cell);
            }
            continue;
        }

        if spec.column_type.is_numeric() {
            let Some(x) = cell.as_f64() else {
                non_numeric.hit(cell);
                continue;
            };
            let below = spec.min.is_some_and(|min| x < min);
            let above = spec.max.is_some_and(|max| x > max);
            if below || above {
                out_of_range.hit(cell);
            }
            if spec.column_type == ColumnType::Integer && x.fract() != 0.0 {
                non_integer.hit(cell);
            }
            if is_target && x != 0.0 && x != 1.0 {
                non_label.hit(cell);
            }
        } else if let Some(label) = category_label(cell) {
            if let Some(allowed) = &spec.allowed {
                if !allowed.iter().any(|a| *a == label) {
                    disallowed.hit(cell);
                }
            }
            if let Some(re) = pattern {
                if !re.is_match(&label) {
                    unmatched.hit(cell);
                }
            }
        }
    }

    let column = &spec.name;
    let checks = [
        (
            CheckKind::Nullability,
            nulls,
            format!("column '{column}' is not nullable"),
        ),
        (
            CheckKind::NumericType,
            non_numeric,
            format!("column '{column}' must be {}", spec.column_type),
        ),
        (
            CheckKind::Range,
            out_of_range,
            format!(
                "column '{column}' must lie within [{}, {}]",
                bound(spec.min, "-inf"),
                bound(spec.max, "inf")
            ),
        ),
        (
            CheckKind::Integer,
            non_integer,
            format!("column '{column}' must hold whole numbers"),
        ),
        (
            CheckKind::AllowedValues,
            disallowed,
            format!(
                "column '{column}' must be one of {:?}",
                spec.allowed.as_deref().unwrap_or_default()
            ),
        ),
        (
            CheckKind::Pattern,
            unmatched,
            format!(
                "column '{column}' must match /{}/",
                spec.pattern.as_deref().unwrap_or_default()
            ),
        ),
        (
            CheckKind::TargetLabel,
            non_label,
            format!("target column '{column}' must hold 0/1 labels"),
        ),
    ];

    for (check, tally, rule) in checks {
        if tally.count == 0 {
            continue;
        }
        let message = match &tally.sample {
            Some(sample) if check != CheckKind::Nullability => {
                format!("{rule}: {} offending row(s), e.g. {sample}", tally.count)
            }
            _ => format!("{rule}: {} offending row(s)", tally.count),
        };
        report.push(Violation {
            partition,
            check,
            column: Some(column.clone()),
            offending_rows: tally.count,
            sample: tally.sample,
            message,
        });
    }
}

/// Checks one partition, returning its violations in check order.
///
/// The column-count check comes first, then required-column presence, then
/// per-column domain checks in the schema's declared order.
#[must_use]
pub fn validate_partition(
    partition: Partition,
    data: &Dataset,
    schema: &SchemaContract,
) -> Vec<Violation> {
    let mut report = Vec::new();

    let expected = schema.expected_column_count();
    if data.column_count() != expected {
        report.push(Violation {
            partition,
            check: CheckKind::ColumnCount,
            column: None,
            offending_rows: 0,
            sample: None,
            message: format!(
                "expected {expected} columns, found {}",
                data.column_count()
            ),
        });
    }

    for spec in schema.required_columns() {
        if !data.has_column(&spec.name) {
            report.push(Violation {
                partition,
                check: CheckKind::RequiredColumn,
                column: Some(spec.name.clone()),
                offending_rows: data.row_count(),
                sample: None,
                message: format!("required column '{}' is missing", spec.name),
            });
        }
    }

    for spec in schema.columns() {
        if let Some(cells) = data.column(&spec.name) {
            check_column(partition, spec, cells, schema, &mut report);
        }
    }

    report
}

/// The validation stage. Its verdict gates every later stage.
#[derive(Debug)]
pub struct ValidationStage {
    schema: Arc<SchemaContract>,
}

impl ValidationStage {
    /// Creates the stage.
    #[must_use]
    pub fn new(schema: Arc<SchemaContract>) -> Self {
        Self { schema }
    }
}

#[async_trait]
impl PipelineStage for ValidationStage {
    type Input = IngestionArtifact;
    type Output = ValidationArtifact;

    fn name(&self) -> StageName {
        StageName::Validation
    }

    async fn execute(
        &self,
        ctx: &StageContext,
        ingestion: &IngestionArtifact,
    ) -> Result<ValidationArtifact, PipelineError> {
        let train: Dataset = ArtifactStore::read_json(&ingestion.train_path).await?;
        let test: Dataset = ArtifactStore::read_json(&ingestion.test_path).await?;

        let mut report = validate_partition(Partition::Train, &train, &self.schema);
        report.extend(validate_partition(Partition::Test, &test, &self.schema));

        let artifact = ValidationArtifact {
            meta: ArtifactMeta::new(
                ctx.run_id().clone(),
                self.name(),
                ctx.record_location(self.name()),
                vec![ingestion.reference()],
            ),
            is_valid: report.is_empty(),
            validation_report: report,
            checked_at: Utc::now(),
        };
        ctx.persist(&artifact).await?;

        if artifact.is_valid {
            info!("Validation passed");
        } else {
            for line in artifact.report_lines() {
                warn!(violation = %line, "Schema violation");
            }
            warn!(
                violations = artifact.validation_report.len(),
                "Validation failed"
            );
        }
        Ok(artifact)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::SchemaDocument;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn schema() -> SchemaContract {
        SchemaContract::from_document(SchemaDocument {
            columns: vec![
                ColumnSpec::new("Age", ColumnType::Integer).with_range(Some(18.0), Some(100.0)),
                ColumnSpec::new("Gender", ColumnType::Categorical).with_allowed(["Male", "Female"]),
                ColumnSpec::new("Code", ColumnType::Categorical)
                    .with_pattern("^[A-Z]{2}$")
                    .nullable(),
                ColumnSpec::new("Response", ColumnType::Integer),
            ],
            target_column: "Response".into(),
            drop_columns: vec![],
        })
        .unwrap()
    }

    fn data(rows: Vec<serde_json::Value>) -> Dataset {
        Dataset::from_records(rows.into_iter().map(|r| r.as_object().cloned().unwrap()))
    }

    fn good_row() -> serde_json::Value {
        json!({"Age": 30, "Gender": "Male", "Code": "AB", "Response": 1})
    }

    #[test]
    fn test_conforming_partition() {
        let report = validate_partition(Partition::Train, &data(vec![good_row(); 5]), &schema());
        assert!(report.is_empty());
    }

    #[test]
    fn test_missing_required_value_is_one_violation() {
        let mut rows = vec![good_row(); 5];
        rows.push(json!({"Gender": "Female", "Code": "CD", "Response": 0}));
        let report = validate_partition(Partition::Test, &data(rows), &schema());

        assert_eq!(report.len(), 1);
        assert_eq!(report[0].check, CheckKind::Nullability);
        assert_eq!(report[0].column.as_deref(), Some("Age"));
        assert_eq!(report[0].offending_rows, 1);
        assert_eq!(report[0].partition, Partition::Test);
    }

    #[test]
    fn test_missing_column_reports_count_then_presence() {
        let rows = vec![json!({"Age": 30, "Gender": "Male", "Response": 1})];
        let report = validate_partition(Partition::Train, &data(rows), &schema());

        let checks: Vec<CheckKind> = report.iter().map(|v| v.check).collect();
        assert_eq!(checks, vec![CheckKind::ColumnCount, CheckKind::RequiredColumn]);
        assert_eq!(report[0].message, "expected 4 columns, found 3");
    }

    #[test]
    fn test_domain_checks_aggregate_per_column() {
        let rows = vec![
            json!({"Age": 12, "Gender": "Other", "Code": "abc", "Response": 1}),
            json!({"Age": 150.5, "Gender": "Male", "Code": null, "Response": "yes"}),
            json!({"Age": 40, "Gender": "Unknown", "Code": "AB", "Response": 0}),
        ];
        let report = validate_partition(Partition::Train, &data(rows), &schema());

        let summary: Vec<(String, CheckKind, usize)> = report
            .iter()
            .map(|v| (v.column.clone().unwrap(), v.check, v.offending_rows))
            .collect();
        assert_eq!(
            summary,
            vec![
                ("Age".to_string(), CheckKind::Range, 2),
                ("Age".to_string(), CheckKind::Integer, 1),
                ("Gender".to_string(), CheckKind::AllowedValues, 2),
                ("Code".to_string(), CheckKind::Pattern, 1),
                ("Response".to_string(), CheckKind::NumericType, 1),
            ]
        );
        assert_eq!(report[0].sample.as_deref(), Some("12"));
        assert_eq!(report[2].sample.as_deref(), Some("\"Other\""));
    }

    #[test]
    fn test_target_must_hold_binary_labels() {
        let mut rows = vec![good_row(); 3];
        rows.push(json!({"Age": 30, "Gender": "Male", "Code": "AB", "Response": 2}));
        rows.push(json!({"Age": 30, "Gender": "Male", "Code": "AB", "Response": 0.5}));
        let report = validate_partition(Partition::Train, &data(rows), &schema());

        assert_eq!(report.len(), 2);
        assert_eq!(report[0].check, CheckKind::Integer);
        assert_eq!(report[1].check, CheckKind::TargetLabel);
        assert_eq!(report[1].column.as_deref(), Some("Response"));
        assert_eq!(report[1].offending_rows, 2);
        assert_eq!(report[1].sample.as_deref(), Some("2"));
    }

    #[test]
    fn test_nullable_target_still_rejects_nulls() {
        let mut document = schema().document().clone();
        document.columns[3] = ColumnSpec::new("Response", ColumnType::Integer).nullable();
        let schema = SchemaContract::from_document(document).unwrap();
        let mut rows = vec![good_row(); 3];
        rows.push(json!({"Age": 30, "Gender": "Male", "Code": "AB", "Response": null}));
        let report = validate_partition(Partition::Test, &data(rows), &schema);

        assert_eq!(report.len(), 1);
        assert_eq!(report[0].check, CheckKind::TargetLabel);
        assert_eq!(report[0].offending_rows, 1);
    }

    #[test]
    fn test_validation_is_deterministic() {
        let rows = vec![
            json!({"Age": 5, "Gender": "X", "Code": "zz", "Response": 1}),
            json!({"Gender": "Male", "Response": 0}),
        ];
        let a = validate_partition(Partition::Train, &data(rows.clone()), &schema());
        let b = validate_partition(Partition::Train, &data(rows), &schema());
        assert_eq!(a, b);
    }
}
