use std::fmt;

use thiserror::Error;

use crate::decimal::DecimalError;

/// Result alias used across the crate.
pub type StratumResult<T> = Result<T, StratumError>;

/// Error variants surfaced by the data model.
#[derive(Debug, Error)]
pub enum StratumError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("schema error: {0}")]
    Schema(String),
    #[error("serde conversion error: {0}")]
    Serde(String),
    #[error(transparent)]
    Decimal(#[from] DecimalError),
}

/// One offending location inside a validated value.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FieldError {
    pub path: String,
    pub expected: String,
    pub actual: String,
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let path = if self.path.is_empty() {
            "<root>"
        } else {
            &self.path
        };
        write!(f, "{path}: expected {}, got {}", self.expected, self.actual)
    }
}

/// Every failure found while validating one value.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub struct ValidationError {
    pub row: Option<usize>,
    pub errors: Vec<FieldError>,
}

impl ValidationError {
    pub fn new(errors: Vec<FieldError>) -> Self {
        Self { row: None, errors }
    }

    pub fn at_row(mut self, row: usize) -> Self {
        self.row = Some(row);
        self
    }

    /// Paths of the offending fields, in discovery order.
    pub fn paths(&self) -> Vec<&str> {
        self.errors.iter().map(|error| error.path.as_str()).collect()
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let count = self.errors.len();
        let noun = if count == 1 { "error" } else { "errors" };
        write!(f, "{count} validation {noun}")?;
        if let Some(row) = self.row {
            write!(f, " in row {row}")?;
        }
        for (index, error) in self.errors.iter().enumerate() {
            let sep = if index == 0 { ": " } else { "; " };
            write!(f, "{sep}{error}")?;
        }
        Ok(())
    }
}
