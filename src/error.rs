use thiserror::Error;

use crate::mapping::{ItemId, UserId};

pub type Result<T> = std::result::Result<T, RecError>;

#[derive(Debug, Error)]
pub enum RecError {
    #[error("unknown user id: {0}")]
    UnknownUser(UserId),

    #[error("unknown item id: {0}")]
    UnknownItem(ItemId),

    #[error("position {position} out of range for {subject} mapping of size {size}")]
    UnknownPosition {
        subject: &'static str,
        position: usize,
        size: usize,
    },

    #[error("malformed input at line {line}: {reason}")]
    Parse { line: usize, reason: String },

    #[error("missing column `{0}` in header")]
    MissingColumn(String),

    #[error("column `{column}` has {found} values, expected {expected}")]
    LengthMismatch {
        column: &'static str,
        expected: usize,
        found: usize,
    },

    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("failed to create thread pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[cfg(feature = "python")]
impl From<RecError> for pyo3::PyErr {
    fn from(err: RecError) -> Self {
        use pyo3::exceptions::{PyIOError, PyRuntimeError, PyValueError};

        match err {
            RecError::Io(e) => PyIOError::new_err(e.to_string()),
            RecError::Csv(e) if e.is_io_error() => PyIOError::new_err(e.to_string()),
            RecError::ThreadPool(e) => {
                PyRuntimeError::new_err(format!("Failed to create thread pool: {e}"))
            }
            other => PyValueError::new_err(other.to_string()),
        }
    }
}
