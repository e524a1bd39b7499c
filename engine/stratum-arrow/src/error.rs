use arrow::error::ArrowError;
use stratum::{StratumError, ValidationError};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("unsupported type at {path}: {reason}")]
    UnsupportedType { path: String, reason: String },

    #[error("schema mismatch at {path}: expected {expected}, found {found}")]
    SchemaMismatch {
        path: String,
        expected: String,
        found: String,
    },

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("cannot encode value at {path}: {reason}")]
    Encode { path: String, reason: String },

    #[error("invalid conversion config: {0}")]
    InvalidConfig(String),

    #[error("no schema established; append a model or supply a schema first")]
    MissingSchema,

    #[error("model error: {0}")]
    Model(StratumError),

    #[error("Arrow error: {0}")]
    Arrow(#[from] ArrowError),
}

impl From<StratumError> for Error {
    fn from(value: StratumError) -> Self {
        match value {
            StratumError::Validation(err) => Error::Validation(err),
            other => Error::Model(other),
        }
    }
}

impl Error {
    pub(crate) fn unsupported(path: &str, reason: impl Into<String>) -> Self {
        Error::UnsupportedType {
            path: display_path(path),
            reason: reason.into(),
        }
    }

    pub(crate) fn mismatch(
        path: &str,
        expected: impl Into<String>,
        found: impl Into<String>,
    ) -> Self {
        Error::SchemaMismatch {
            path: display_path(path),
            expected: expected.into(),
            found: found.into(),
        }
    }

    pub(crate) fn encode(path: &str, reason: impl Into<String>) -> Self {
        Error::Encode {
            path: display_path(path),
            reason: reason.into(),
        }
    }
}

fn display_path(path: &str) -> String {
    if path.is_empty() {
        "<root>".to_string()
    } else {
        path.to_string()
    }
}

pub(crate) fn join_path(parent: &str, name: &str) -> String {
    if parent.is_empty() {
        name.to_string()
    } else {
        format!("{parent}.{name}")
    }
}
