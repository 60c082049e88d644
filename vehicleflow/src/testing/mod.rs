//! Testing utilities for vehicleflow pipelines.
//!
//! This module provides:
//! - Synthetic vehicle datasets and their schema contract
//! - Sources and registries that fail on demand

mod fixtures;
mod mocks;

pub use fixtures::{
    vehicle_dataset, vehicle_record, vehicle_records, vehicle_schema_document, write_json_lines,
    VEHICLE_COLLECTION,
};
pub use mocks::{FaultyModelRegistry, FlakySource};
