// -----------------------------------------------------------------------------
// Error
// -----------------------------------------------------------------------------
#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("Operand of type '{type_name}' is neither a number nor a node")]
    InvalidOperandType { type_name: String },
    #[error("Cannot convert '{input}' to a number: {reason}")]
    ConversionError { input: String, reason: String },
    #[error("Operation '{op}' returned {actual} gradients for {expected} operands")]
    ArityMismatch {
        op: String,
        expected: usize,
        actual: usize,
    },
    #[error("Different graphs are used for an operation '{0}'")]
    DifferentGraphs(&'static str),
}
