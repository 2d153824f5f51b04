use bm_store::{BlockGrid, BlockId, BlockPosition, MatrixStore};

use crate::error::{EngineError, Result};

/// Storage column whose presence marks a block. Enumeration is keyed on it
/// and reads nothing else.
pub const BLOCK_POSITION_COLUMN: &str = "attribute:blockposition";

/// Produces the block coordinates of the left-hand operand, one task each.
///
/// The whole grid is enumerated whether or not a coordinate is populated: a
/// missing tile must fail its task, not vanish from the product.
#[derive(Debug, Clone)]
pub struct BlockEnumerator {
    matrix: String,
    grid: BlockGrid,
}

impl BlockEnumerator {
    /// # Errors
    /// Returns a configuration error if `column` is not
    /// [`BLOCK_POSITION_COLUMN`].
    pub fn new(store: &dyn MatrixStore, column: &str) -> Result<Self> {
        if column != BLOCK_POSITION_COLUMN {
            return Err(EngineError::Configuration(format!(
                "cannot enumerate '{}' by column '{}', expected '{}'",
                store.name(),
                column,
                BLOCK_POSITION_COLUMN
            )));
        }
        Ok(BlockEnumerator {
            matrix: store.name().to_string(),
            grid: store.grid(),
        })
    }

    pub fn matrix(&self) -> &str {
        &self.matrix
    }

    pub fn len(&self) -> usize {
        self.grid.block_count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Every `(BlockId, BlockPosition)` pair, row-major, each exactly once.
    pub fn iter(&self) -> impl Iterator<Item = (BlockId, BlockPosition)> + '_ {
        self.grid.ids().map(move |id| (id, self.grid.position(id)))
    }

    /// Partition the sequence into at most `n` contiguous, non-overlapping
    /// splits that together cover it.
    pub fn splits(&self, n: usize) -> Vec<BlockSplit> {
        let total = self.len();
        if total == 0 {
            return Vec::new();
        }
        let n = n.clamp(1, total);
        let chunk = total.div_ceil(n);
        (0..total)
            .step_by(chunk)
            .enumerate()
            .map(|(index, start)| BlockSplit {
                index,
                start,
                end: (start + chunk).min(total),
                grid: self.grid,
            })
            .collect()
    }
}

/// A contiguous run of the row-major block sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockSplit {
    pub index: usize,
    start: usize,
    end: usize,
    grid: BlockGrid,
}

impl BlockSplit {
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    pub fn iter(&self) -> impl Iterator<Item = (BlockId, BlockPosition)> {
        let grid = self.grid;
        let cols = grid.block_cols();
        (self.start..self.end).map(move |i| {
            let id = BlockId::new(i / cols, i % cols);
            (id, grid.position(id))
        })
    }
}
