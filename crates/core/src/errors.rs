use thiserror::Error;

/// Failure while reading from or writing to the commerce store.
///
/// Store failures are never caught or masked by the engines; they
/// propagate to the caller unmodified.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("store query failed: {0}")]
    Query(String),
    #[error("store row decode failed: {0}")]
    Decode(String),
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum EngineError {
    #[error(transparent)]
    Store(#[from] StoreError),
    /// Programming error: a fan-out width of zero can never make progress.
    #[error("fan-out width must be at least 1, got {got}")]
    InvalidConcurrency { got: usize },
}

pub type EngineResult<T> = Result<T, EngineError>;
