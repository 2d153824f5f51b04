use bm_tile::{DType, Shape, TileError};
use thiserror::Error;

use crate::block::BlockId;
use crate::grid::BlockGrid;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum StoreError {
    #[error("block {block} not found in matrix '{matrix}'")]
    NotFound { matrix: String, block: BlockId },
    #[error("block {block} is outside the {grid} grid of matrix '{matrix}'")]
    OutOfRange {
        matrix: String,
        block: BlockId,
        grid: BlockGrid,
    },
    #[error("matrix '{matrix}' stores {expected}x{expected} tiles, got {got}")]
    BlockShape {
        matrix: String,
        expected: usize,
        got: Shape,
    },
    #[error("matrix '{matrix}' stores {expected} tiles, got {got}")]
    DTypeMismatch {
        matrix: String,
        expected: DType,
        got: DType,
    },
    #[error("matrix '{matrix}' is {expected}, got a {got} host matrix")]
    MatrixShape {
        matrix: String,
        expected: BlockGrid,
        got: Shape,
    },
    #[error("unknown matrix: {0}")]
    UnknownMatrix(String),
    #[error("matrix already exists: {0}")]
    AlreadyExists(String),
    #[error("invalid grid: {0}")]
    InvalidGrid(String),
    #[error("tile error: {0}")]
    Tile(#[from] TileError),
}

pub type Result<T> = std::result::Result<T, StoreError>;
