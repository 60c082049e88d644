//! Synthetic vehicle-insurance data and the matching schema contract.

use crate::data::Dataset;
use crate::schema::{ColumnSpec, ColumnType, SchemaDocument};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde_json::{json, Map, Value};
use std::io::Write;
use std::path::Path;

/// Collection the fixtures are published under.
pub const VEHICLE_COLLECTION: &str = "vehicle_data";

const VEHICLE_AGES: [&str; 3] = ["< 1 Year", "1-2 Year", "> 2 Years"];

/// Schema contract for the vehicle dataset after ingestion drops `_id`.
#[must_use]
pub fn vehicle_schema_document() -> SchemaDocument {
    SchemaDocument {
        columns: vec![
            ColumnSpec::new("id", ColumnType::Integer).with_range(Some(1.0), None),
            ColumnSpec::new("Gender", ColumnType::Categorical).with_allowed(["Male", "Female"]),
            ColumnSpec::new("Age", ColumnType::Integer).with_range(Some(18.0), Some(100.0)),
            ColumnSpec::new("Driving_License", ColumnType::Integer)
                .with_range(Some(0.0), Some(1.0)),
            ColumnSpec::new("Region_Code", ColumnType::Float).with_range(Some(0.0), Some(60.0)),
            ColumnSpec::new("Previously_Insured", ColumnType::Integer)
                .with_range(Some(0.0), Some(1.0)),
            ColumnSpec::new("Vehicle_Age", ColumnType::Categorical).with_allowed(VEHICLE_AGES),
            ColumnSpec::new("Vehicle_Damage", ColumnType::Categorical).with_allowed(["Yes", "No"]),
            ColumnSpec::new("Annual_Premium", ColumnType::Float).with_range(Some(0.0), None),
            ColumnSpec::new("Policy_Sales_Channel", ColumnType::Float)
                .with_range(Some(0.0), Some(200.0)),
            ColumnSpec::new("Vintage", ColumnType::Integer).with_range(Some(0.0), Some(400.0)),
            ColumnSpec::new("Response", ColumnType::Integer).with_range(Some(0.0), Some(1.0)),
        ],
        target_column: "Response".to_string(),
        drop_columns: vec!["id".to_string()],
    }
}

/// One raw document as the store returns it, `_id` included.
///
/// `Response` is 1 exactly for damaged vehicles that were not previously
/// insured, so the target is learnable from the features.
pub fn vehicle_record(rng: &mut StdRng, index: usize) -> Map<String, Value> {
    let previously_insured: i32 = rng.gen_range(0..=1);
    let damaged = rng.gen_bool(0.5);
    let response = i32::from(damaged && previously_insured == 0);
    let gender = if rng.gen_bool(0.54) { "Male" } else { "Female" };
    let vehicle_damage = if damaged { "Yes" } else { "No" };
    let record = json!({
        "_id": format!("{:024x}", index + 1),
        "id": index + 1,
        "Gender": gender,
        "Age": rng.gen_range(20..=85_i32),
        "Driving_License": i32::from(rng.gen_bool(0.98)),
        "Region_Code": f64::from(rng.gen_range(0..=52_i32)),
        "Previously_Insured": previously_insured,
        "Vehicle_Age": VEHICLE_AGES[rng.gen_range(0..VEHICLE_AGES.len())],
        "Vehicle_Damage": vehicle_damage,
        "Annual_Premium": f64::from(rng.gen_range(2_630..=60_000_i32)),
        "Policy_Sales_Channel": f64::from(rng.gen_range(1..=163_i32)),
        "Vintage": rng.gen_range(10..=299_i32),
        "Response": response,
    });
    match record {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

/// `n` raw documents generated from `seed`.
#[must_use]
pub fn vehicle_records(n: usize, seed: u64) -> Vec<Map<String, Value>> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..n).map(|i| vehicle_record(&mut rng, i)).collect()
}

/// `n` raw documents as a dataset.
#[must_use]
pub fn vehicle_dataset(n: usize, seed: u64) -> Dataset {
    Dataset::from_records(vehicle_records(n, seed))
}

/// Writes records as a JSON-lines export.
pub fn write_json_lines(path: &Path, records: &[Map<String, Value>]) -> std::io::Result<()> {
    let mut file = std::fs::File::create(path)?;
    for record in records {
        serde_json::to_writer(&mut file, record)?;
        file.write_all(b"\n")?;
    }
    file.sync_all()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::SchemaContract;

    #[test]
    fn test_fixture_is_reproducible() {
        assert_eq!(vehicle_dataset(20, 9), vehicle_dataset(20, 9));
        assert_ne!(vehicle_dataset(20, 9), vehicle_dataset(20, 10));
    }

    #[test]
    fn test_fixture_matches_schema_width() {
        let schema = SchemaContract::from_document(vehicle_schema_document()).unwrap();
        let data = vehicle_dataset(10, 1).drop_column("_id");
        assert_eq!(data.column_count(), schema.expected_column_count());
        assert_eq!(data.row_count(), 10);
    }

    #[test]
    fn test_both_classes_present() {
        let data = vehicle_dataset(200, 5);
        let positives = data
            .column("Response")
            .unwrap()
            .filter(|c| c.as_f64() == Some(1.0))
            .count();
        assert!(positives > 20 && positives < 100);
    }
}
