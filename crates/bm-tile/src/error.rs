use thiserror::Error;

use crate::dtype::DType;
use crate::shape::Shape;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TileError {
    #[error("{op} dimension mismatch: {lhs} vs {rhs}")]
    Dimension {
        op: &'static str,
        lhs: Shape,
        rhs: Shape,
    },
    #[error("dtype mismatch: expected {expected}, got {got}")]
    DTypeMismatch { expected: DType, got: DType },
    #[error("data length {got} does not match shape {shape} (numel={expected})")]
    DataLength {
        shape: Shape,
        expected: usize,
        got: usize,
    },
    #[error("{dtype} overflow in {op}")]
    Overflow { op: &'static str, dtype: DType },
    #[error("unknown dtype: {0}")]
    UnknownDType(String),
}

pub type Result<T> = std::result::Result<T, TileError>;
