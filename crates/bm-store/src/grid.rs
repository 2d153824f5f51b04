use std::fmt;

use crate::block::{BlockId, BlockPosition};
use crate::error::{Result, StoreError};

/// Geometry of a block-partitioned matrix.
///
/// A `rows x cols` matrix with block size `B` has `ceil(rows / B)` block rows
/// and `ceil(cols / B)` block columns. Every stored tile is `B x B`; tiles on
/// the bottom and right edges are zero-padded past the logical matrix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlockGrid {
    rows: usize,
    cols: usize,
    block_size: usize,
}

impl BlockGrid {
    /// # Errors
    /// Returns `InvalidGrid` if `block_size` is zero.
    pub fn new(rows: usize, cols: usize, block_size: usize) -> Result<Self> {
        if block_size == 0 {
            return Err(StoreError::InvalidGrid(
                "block size must be > 0".to_string(),
            ));
        }
        Ok(BlockGrid {
            rows,
            cols,
            block_size,
        })
    }

    /// Logical scalar row count.
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Logical scalar column count.
    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn block_size(&self) -> usize {
        self.block_size
    }

    pub fn block_rows(&self) -> usize {
        self.rows.div_ceil(self.block_size)
    }

    pub fn block_cols(&self) -> usize {
        self.cols.div_ceil(self.block_size)
    }

    /// Total number of tiles in a fully populated grid.
    pub fn block_count(&self) -> usize {
        self.block_rows() * self.block_cols()
    }

    pub fn contains(&self, id: BlockId) -> bool {
        id.row() < self.block_rows() && id.column() < self.block_cols()
    }

    /// Scalar range covered by `id`, clipped to the logical matrix.
    pub fn position(&self, id: BlockId) -> BlockPosition {
        let b = self.block_size;
        let start_row = (id.row() * b).min(self.rows);
        let start_column = (id.column() * b).min(self.cols);
        BlockPosition {
            start_row,
            end_row: (start_row + b).min(self.rows),
            start_column,
            end_column: (start_column + b).min(self.cols),
        }
    }

    /// Every block coordinate, row-major.
    pub fn ids(&self) -> impl Iterator<Item = BlockId> {
        let cols = self.block_cols();
        (0..self.block_rows()).flat_map(move |r| (0..cols).map(move |c| BlockId::new(r, c)))
    }
}

impl fmt::Display for BlockGrid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}x{} ({}x{} blocks of {})",
            self.rows,
            self.cols,
            self.block_rows(),
            self.block_cols(),
            self.block_size
        )
    }
}
