//! The declarative data contract and where it is loaded from.

mod contract;
mod registry;

pub use contract::{ColumnSpec, ColumnType, SchemaContract, SchemaDocument, SchemaLoadError};
pub use registry::{JsonFileSchemaRegistry, SchemaRegistry, StaticSchemaRegistry};
