//! Deterministic feature engineering.
//!
//! Encoders are fitted on the training partition only and then applied to
//! every partition, and later to serving requests, without refitting.

mod matrix;
mod transformer;

pub use matrix::FeatureMatrix;
pub use transformer::{FittedEncoder, FittedTransformer, TransformError};
