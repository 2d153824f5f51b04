use std::fmt::Debug;
use std::sync::Arc;

use bm_tile::{DType, DenseTile, Shape};

use crate::block::BlockId;
use crate::error::{Result, StoreError};
use crate::grid::BlockGrid;

/// A block-partitioned matrix whose tiles can be fetched by coordinate.
///
/// Implementations must allow any number of concurrent readers. A matrix
/// that serves as a multiplication operand is never written while the
/// multiplication runs.
pub trait MatrixStore: Send + Sync + Debug {
    /// Identifier of the matrix in its catalog.
    fn name(&self) -> &str;

    fn grid(&self) -> BlockGrid;

    /// Element type shared by every tile.
    fn dtype(&self) -> DType;

    /// Fetch the tile at `(row, column)`.
    ///
    /// # Errors
    /// - `OutOfRange` if the coordinate lies outside the grid
    /// - `NotFound` if the coordinate is inside the grid but holds no tile
    fn get_block(&self, row: usize, column: usize) -> Result<Arc<DenseTile>>;

    /// Store a finalized tile, replacing any previous tile at `id`.
    ///
    /// # Errors
    /// Rejects out-of-range ids, tiles that are not `B x B`, and tiles of a
    /// different dtype.
    fn put_block(&self, id: BlockId, tile: DenseTile) -> Result<()>;

    /// Populated coordinates, sorted by row then column.
    fn block_ids(&self) -> Vec<BlockId>;

    /// The shared tile dimension `B`.
    fn get_block_size(&self) -> usize {
        self.grid().block_size()
    }

    fn block_count(&self) -> usize {
        self.block_ids().len()
    }

    /// True if every coordinate of the grid holds a tile.
    fn is_complete(&self) -> bool {
        self.block_count() == self.grid().block_count()
    }
}

/// Range check shared by store implementations.
pub fn check_in_grid(matrix: &str, grid: BlockGrid, id: BlockId) -> Result<()> {
    if !grid.contains(id) {
        return Err(StoreError::OutOfRange {
            matrix: matrix.to_string(),
            block: id,
            grid,
        });
    }
    Ok(())
}

/// Write-side validation shared by store implementations.
pub fn check_tile(
    matrix: &str,
    grid: BlockGrid,
    dtype: DType,
    id: BlockId,
    tile: &DenseTile,
) -> Result<()> {
    check_in_grid(matrix, grid, id)?;
    if tile.shape() != Shape::square(grid.block_size()) {
        return Err(StoreError::BlockShape {
            matrix: matrix.to_string(),
            expected: grid.block_size(),
            got: tile.shape(),
        });
    }
    if tile.dtype() != dtype {
        return Err(StoreError::DTypeMismatch {
            matrix: matrix.to_string(),
            expected: dtype,
            got: tile.dtype(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid() -> BlockGrid {
        BlockGrid::new(4, 4, 2).unwrap()
    }

    #[test]
    fn test_check_tile_accepts_block() {
        let tile = DenseTile::zeros(DType::F32, Shape::square(2));
        assert!(check_tile("a", grid(), DType::F32, BlockId::new(1, 1), &tile).is_ok());
    }

    #[test]
    fn test_check_tile_out_of_range() {
        let tile = DenseTile::zeros(DType::F32, Shape::square(2));
        assert!(matches!(
            check_tile("a", grid(), DType::F32, BlockId::new(2, 0), &tile),
            Err(StoreError::OutOfRange { .. })
        ));
    }

    #[test]
    fn test_check_tile_wrong_block_size() {
        let tile = DenseTile::zeros(DType::F32, Shape::square(3));
        assert!(matches!(
            check_tile("a", grid(), DType::F32, BlockId::new(0, 0), &tile),
            Err(StoreError::BlockShape { expected: 2, .. })
        ));
    }

    #[test]
    fn test_check_tile_wrong_dtype() {
        let tile = DenseTile::zeros(DType::I32, Shape::square(2));
        assert!(matches!(
            check_tile("a", grid(), DType::F32, BlockId::new(0, 0), &tile),
            Err(StoreError::DTypeMismatch { .. })
        ));
    }
}
