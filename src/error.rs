//! Error types for patronage forecasting

use std::path::PathBuf;

use polars::prelude::PolarsError;
use thiserror::Error;

/// Result type alias for library operations
pub type Result<T> = std::result::Result<T, PatronageError>;

/// Errors raised while loading, aggregating or modelling patronage data
#[derive(Error, Debug)]
pub enum PatronageError {
    /// The input file does not exist
    #[error("Data file not found: {}. Please check the file path", .0.display())]
    FileNotFound(PathBuf),

    /// The input file has no content or no usable rows
    #[error("Data file is empty: {}. Please provide a valid data file", .0.display())]
    EmptyData(PathBuf),

    /// The CSV could not be parsed
    #[error("Data file could not be parsed: {0}")]
    Parse(#[from] PolarsError),

    /// A required column is absent from the input
    #[error("Required column '{0}' is missing from the data file")]
    MissingColumn(String),

    /// An invoice date did not match any accepted format
    #[error("Invalid invoice date '{value}' at row {row}")]
    InvalidDate { row: usize, value: String },

    /// Insufficient data points for the operation
    #[error("Insufficient data: need at least {required} points, got {actual}")]
    InsufficientData { required: usize, actual: usize },

    /// Invalid parameter value
    #[error("Invalid parameter '{name}': {reason}")]
    InvalidParameter { name: String, reason: String },

    /// Model has not been fitted yet
    #[error("Model must be fitted before prediction")]
    NotFitted,

    /// Numerical computation error
    #[error("Numerical error: {0}")]
    Numerical(String),

    /// Invalid time series data
    #[error("Invalid data: {0}")]
    InvalidData(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl PatronageError {
    pub(crate) fn invalid_parameter(name: &str, reason: impl Into<String>) -> Self {
        PatronageError::InvalidParameter {
            name: name.to_string(),
            reason: reason.into(),
        }
    }
}
