// -----------------------------------------------------------------------------
// Error
// -----------------------------------------------------------------------------
#[derive(Debug, thiserror::Error, Clone, PartialEq)]
pub enum Error {
    #[error("Expected {expected} inputs but got {actual}")]
    InputSize { expected: usize, actual: usize },
    #[error("Empty batch")]
    EmptyBatch,
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
    #[error(transparent)]
    Grad(#[from] qgrad::Error),
}
