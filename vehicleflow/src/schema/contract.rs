//! The declarative data contract checked by validation.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while loading a schema contract.
#[derive(Debug, Error)]
pub enum SchemaLoadError {
    /// The contract file could not be read.
    #[error("failed to read schema contract '{}'", path.display())]
    Io {
        /// Contract path.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// The contract is not valid JSON for the expected shape.
    #[error("schema contract could not be parsed")]
    Parse {
        /// Decoder error.
        #[source]
        source: serde_json::Error,
    },

    /// The contract parsed but contradicts itself.
    #[error("schema contract is malformed: {}", problems.join("; "))]
    Malformed {
        /// Every problem found.
        problems: Vec<String>,
    },
}

/// The declared type of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnType {
    /// Whole numbers.
    Integer,
    /// Real numbers.
    Float,
    /// Text labels from a finite set.
    Categorical,
}

impl ColumnType {
    /// Returns true for integer and float columns.
    #[must_use]
    pub fn is_numeric(&self) -> bool {
        matches!(self, Self::Integer | Self::Float)
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Integer => write!(f, "integer"),
            Self::Float => write!(f, "float"),
            Self::Categorical => write!(f, "categorical"),
        }
    }
}

/// Declaration of a single column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnSpec {
    /// Column name.
    pub name: String,
    /// Declared type.
    #[serde(rename = "type")]
    pub column_type: ColumnType,
    /// Whether missing values are allowed.
    #[serde(default)]
    pub nullable: bool,
    /// Whether the column must be present in every partition.
    #[serde(default = "default_required")]
    pub required: bool,
    /// Inclusive lower bound for numeric columns.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    /// Inclusive upper bound for numeric columns.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
    /// Allowed labels for categorical columns.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allowed: Option<Vec<String>>,
    /// Regex every categorical label must match.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
}

fn default_required() -> bool {
    true
}

impl ColumnSpec {
    /// Creates a required, non-nullable column.
    #[must_use]
    pub fn new(name: impl Into<String>, column_type: ColumnType) -> Self {
        Self {
            name: name.into(),
            column_type,
            nullable: false,
            required: true,
            min: None,
            max: None,
            allowed: None,
            pattern: None,
        }
    }

    /// Sets an inclusive numeric range.
    #[must_use]
    pub fn with_range(mut self, min: Option<f64>, max: Option<f64>) -> Self {
        self.min = min;
        self.max = max;
        self
    }

    /// Sets the allowed categorical labels.
    #[must_use]
    pub fn with_allowed<I, S>(mut self, labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allowed = Some(labels.into_iter().map(Into::into).collect());
        self
    }

    /// Sets the categorical label pattern.
    #[must_use]
    pub fn with_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.pattern = Some(pattern.into());
        self
    }

    /// Marks the column nullable.
    #[must_use]
    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    /// Marks the column optional.
    #[must_use]
    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }
}

/// The serialized form of a schema contract.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaDocument {
    /// Declared columns, in order.
    pub columns: Vec<ColumnSpec>,
    /// Label column.
    pub target_column: String,
    /// Columns removed before feature engineering.
    #[serde(default)]
    pub drop_columns: Vec<String>,
}

/// A checked, read-only schema contract.
#[derive(Debug, Clone)]
pub struct SchemaContract {
    document: SchemaDocument,
    patterns: HashMap<String, Regex>,
}

impl SchemaContract {
    /// Checks a document and compiles its patterns.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaLoadError::Malformed`] listing every problem found.
    pub fn from_document(document: SchemaDocument) -> Result<Self, SchemaLoadError> {
        let mut problems = Vec::new();
        let mut patterns = HashMap::new();
        let mut names = HashSet::new();

        if document.columns.is_empty() {
            problems.push("no columns declared".to_string());
        }

        for column in &document.columns {
            if !names.insert(column.name.as_str()) {
                problems.push(format!("column '{}' declared twice", column.name));
            }
            if let (Some(min), Some(max)) = (column.min, column.max) {
                if min > max {
                    problems.push(format!("column '{}' has min {min} > max {max}", column.name));
                }
            }
            if column.column_type.is_numeric() {
                if column.allowed.is_some() || column.pattern.is_some() {
                    problems.push(format!(
                        "numeric column '{}' declares categorical constraints",
                        column.name
                    ));
                }
            } else if column.min.is_some() || column.max.is_some() {
                problems.push(format!(
                    "categorical column '{}' declares a numeric range",
                    column.name
                ));
            }
            if let Some(pattern) = &column.pattern {
                match Regex::new(pattern) {
                    Ok(re) => {
                        patterns.insert(column.name.clone(), re);
                    }
                    Err(e) => problems.push(format!(
                        "column '{}' has an invalid pattern: {e}",
                        column.name
                    )),
                }
            }
        }

        match document
            .columns
            .iter()
            .find(|c| c.name == document.target_column)
        {
            None => problems.push(format!(
                "target column '{}' is not declared",
                document.target_column
            )),
            Some(target) if !target.column_type.is_numeric() => problems.push(format!(
                "target column '{}' must be numeric",
                target.name
            )),
            Some(target) if !target.required => problems.push(format!(
                "target column '{}' cannot be optional",
                target.name
            )),
            Some(_) => {}
        }
        for dropped in &document.drop_columns {
            if !names.contains(dropped.as_str()) {
                problems.push(format!("drop column '{dropped}' is not declared"));
            }
            if *dropped == document.target_column {
                problems.push(format!("target column '{dropped}' cannot be dropped"));
            }
        }

        if problems.is_empty() {
            Ok(Self { document, patterns })
        } else {
            Err(SchemaLoadError::Malformed { problems })
        }
    }

    /// Parses and checks a JSON contract.
    ///
    /// # Errors
    ///
    /// Returns a parse or malformed-contract error.
    pub fn from_json(json: &str) -> Result<Self, SchemaLoadError> {
        let document: SchemaDocument =
            serde_json::from_str(json).map_err(|source| SchemaLoadError::Parse { source })?;
        Self::from_document(document)
    }

    /// Returns the underlying document.
    #[must_use]
    pub fn document(&self) -> &SchemaDocument {
        &self.document
    }

    /// Returns all declared columns in order.
    #[must_use]
    pub fn columns(&self) -> &[ColumnSpec] {
        &self.document.columns
    }

    /// Looks up a column declaration.
    #[must_use]
    pub fn column(&self, name: &str) -> Option<&ColumnSpec> {
        self.document.columns.iter().find(|c| c.name == name)
    }

    /// Number of columns a conforming partition must have.
    #[must_use]
    pub fn expected_column_count(&self) -> usize {
        self.document.columns.len()
    }

    /// Columns that must be present.
    pub fn required_columns(&self) -> impl Iterator<Item = &ColumnSpec> {
        self.document.columns.iter().filter(|c| c.required)
    }

    /// Numeric columns, in declared order.
    pub fn numeric_columns(&self) -> impl Iterator<Item = &ColumnSpec> {
        self.document
            .columns
            .iter()
            .filter(|c| c.column_type.is_numeric())
    }

    /// Categorical columns, in declared order.
    pub fn categorical_columns(&self) -> impl Iterator<Item = &ColumnSpec> {
        self.document
            .columns
            .iter()
            .filter(|c| c.column_type == ColumnType::Categorical)
    }

    /// The label column.
    #[must_use]
    pub fn target_column(&self) -> &str {
        &self.document.target_column
    }

    /// Columns removed before feature engineering.
    #[must_use]
    pub fn drop_columns(&self) -> &[String] {
        &self.document.drop_columns
    }

    /// The compiled pattern for a categorical column.
    #[must_use]
    pub fn pattern_for(&self, column: &str) -> Option<&Regex> {
        self.patterns.get(column)
    }
}
