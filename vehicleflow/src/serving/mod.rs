//! The pipeline's contract with the serving side.
//!
//! A caller builds its request schema from a published bundle and sends the
//! fingerprint along with every row. Rows built against any other feature
//! schema are refused.

use crate::features::{FittedTransformer, TransformError};
use crate::model::{ModelBundle, TrainerError};
use crate::schema::ColumnType;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::debug;

/// Errors raised while serving a prediction.
#[derive(Debug, Error)]
pub enum ServingError {
    /// The bytes are not a model bundle.
    #[error("model bundle is not decodable")]
    Decode(#[from] serde_json::Error),

    /// The request was built against a different feature schema.
    #[error("feature schema mismatch: model expects {expected}, request carries {actual}")]
    FingerprintMismatch {
        /// The bundle's fingerprint.
        expected: String,
        /// The caller's fingerprint.
        actual: String,
    },

    /// The row could not be encoded.
    #[error(transparent)]
    Transform(#[from] TransformError),

    /// The model refused the encoded row.
    #[error(transparent)]
    Model(#[from] TrainerError),
}

/// The request schema a caller derives from a published bundle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServingSchema {
    /// Fingerprint every request must carry.
    pub fingerprint: String,
    /// Raw columns a request row may supply.
    pub input_columns: Vec<(String, ColumnType)>,
    /// Encoded feature names, in model order.
    pub feature_names: Vec<String>,
}

impl ServingSchema {
    /// Derives the schema from a bundle.
    #[must_use]
    pub fn from_bundle(bundle: &ModelBundle) -> Self {
        Self::from_transformer(&bundle.transformer)
    }

    /// Derives the schema from a fitted transformer.
    #[must_use]
    pub fn from_transformer(transformer: &FittedTransformer) -> Self {
        Self {
            fingerprint: transformer.fingerprint(),
            input_columns: transformer.input_columns().to_vec(),
            feature_names: transformer.feature_names().to_vec(),
        }
    }
}

/// Predicts with a published bundle.
#[derive(Debug, Clone)]
pub struct Predictor {
    bundle: ModelBundle,
    fingerprint: String,
}

impl Predictor {
    /// Wraps a decoded bundle.
    #[must_use]
    pub fn new(bundle: ModelBundle) -> Self {
        let fingerprint = bundle.transformer.fingerprint();
        Self {
            bundle,
            fingerprint,
        }
    }

    /// Decodes a bundle as stored in the registry.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ServingError> {
        Ok(Self::new(ModelBundle::from_bytes(bytes)?))
    }

    /// The schema callers should build requests from.
    #[must_use]
    pub fn schema(&self) -> ServingSchema {
        ServingSchema::from_bundle(&self.bundle)
    }

    /// The fingerprint requests must carry.
    #[must_use]
    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    /// Predicts the class of one raw record.
    ///
    /// # Errors
    ///
    /// Returns [`ServingError::FingerprintMismatch`] if `fingerprint` is not
    /// the bundle's, or an encoding error for malformed values.
    pub fn predict(&self, record: &Map<String, Value>, fingerprint: &str) -> Result<f64, ServingError> {
        if fingerprint != self.fingerprint {
            return Err(ServingError::FingerprintMismatch {
                expected: self.fingerprint.clone(),
                actual: fingerprint.to_string(),
            });
        }
        let row = self.bundle.transformer.transform_record(record)?;
        let prediction = self.bundle.model.predict_row(&row)?;
        debug!(prediction, "Served prediction");
        Ok(prediction)
    }
}
