//! Errors in the library.
use thiserror::Error;

/// Errors raised when a precondition of the library is violated.
#[derive(Error, Debug, PartialEq)]
pub enum RlError {
    #[error("Record key error: {0}")]
    RecordKeyError(String),

    #[error("Record value type error: {0}")]
    RecordValueTypeError(String),

    #[error("Capacity of a storage must be positive, given {0}")]
    InvalidCapacity(usize),

    #[error("Field '{0}' is missing in the batch")]
    MissingField(String),

    #[error("Field '{0}' is not in the data spec")]
    UnknownField(String),

    #[error("Field '{field}' has batch size {found}, expected {expected}")]
    BatchSizeMismatch {
        field: String,
        expected: usize,
        found: usize,
    },

    #[error("Field '{field}' has item shape {found:?}, expected {expected:?}")]
    ShapeMismatch {
        field: String,
        expected: Vec<usize>,
        found: Vec<usize>,
    },

    #[error("Field '{0}' was given data of the wrong column kind")]
    ColumnKindMismatch(String),

    #[error("Cannot sample from an empty storage")]
    EmptyStorage,

    #[error("Batch size must be positive")]
    ZeroBatchSize,

    #[error("Index {index} is out of the valid range [0, {size})")]
    IndexOutOfRange { index: usize, size: usize },

    #[error("Unsupported action space: {0}")]
    UnsupportedActionSpace(String),

    #[error("Unsupported observation space: {0}")]
    UnsupportedObservation(String),

    #[error("Action batch has shape {found:?}, expected {expected:?}")]
    ActionShape {
        expected: Vec<usize>,
        found: Vec<usize>,
    },

    #[error("NaN action: {0:?}")]
    NanAction(Vec<f32>),
}
