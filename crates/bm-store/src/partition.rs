//! Moving whole host-resident matrices in and out of block stores.

use bm_tile::{DenseTile, Shape};
use tracing::debug;

use crate::error::{Result, StoreError};
use crate::grid::BlockGrid;
use crate::store::MatrixStore;

/// Split `matrix` into `B x B` tiles and write every one of them.
///
/// Edge tiles are zero-padded. Returns the number of tiles written.
pub fn load_matrix(store: &dyn MatrixStore, matrix: &DenseTile) -> Result<usize> {
    let grid = store.grid();
    if matrix.shape() != Shape::new(grid.rows(), grid.cols()) {
        return Err(StoreError::MatrixShape {
            matrix: store.name().to_string(),
            expected: grid,
            got: matrix.shape(),
        });
    }

    let b = grid.block_size();
    let mut written = 0;
    for id in grid.ids() {
        let tile = matrix.region(id.row() * b, id.column() * b, b, b);
        store.put_block(id, tile)?;
        written += 1;
    }
    debug!(matrix = store.name(), tiles = written, "loaded matrix");
    Ok(written)
}

/// Read every tile of `store` and rebuild the logical `rows x cols` matrix.
///
/// # Errors
/// Returns `NotFound` if any tile of the grid is missing.
pub fn assemble_matrix(store: &dyn MatrixStore) -> Result<DenseTile> {
    let grid = store.grid();
    let b = grid.block_size();
    let mut out = DenseTile::zeros(store.dtype(), Shape::new(grid.rows(), grid.cols()));
    for id in grid.ids() {
        let tile = store.get_block(id.row(), id.column())?;
        out.write_region(id.row() * b, id.column() * b, &tile)?;
    }
    Ok(out)
}

/// Grid for a host matrix partitioned with `block_size`.
pub fn grid_for(matrix: &DenseTile, block_size: usize) -> Result<BlockGrid> {
    BlockGrid::new(matrix.rows(), matrix.cols(), block_size)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::BlockId;
    use crate::memory::ShardedMatrixStore;
    use bm_tile::DType;

    fn host(rows: usize, cols: usize) -> DenseTile {
        let data: Vec<i64> = (0..(rows * cols) as i64).collect();
        DenseTile::from_vec(data, Shape::new(rows, cols)).unwrap()
    }

    #[test]
    fn test_load_pads_edges() {
        let m = host(3, 3);
        let store = ShardedMatrixStore::new("m", grid_for(&m, 2).unwrap(), DType::I64, 2);
        assert_eq!(load_matrix(&store, &m).unwrap(), 4);

        let corner = store.get_block(1, 1).unwrap();
        assert_eq!(corner.as_slice::<i64>().unwrap(), &[8, 0, 0, 0]);
        let top_right = store.get_block(0, 1).unwrap();
        assert_eq!(top_right.as_slice::<i64>().unwrap(), &[2, 0, 5, 0]);
    }

    #[test]
    fn test_assemble_inverts_load() {
        let m = host(5, 3);
        let store = ShardedMatrixStore::new("m", grid_for(&m, 2).unwrap(), DType::I64, 3);
        load_matrix(&store, &m).unwrap();
        assert_eq!(assemble_matrix(&store).unwrap(), m);
    }

    #[test]
    fn test_load_shape_mismatch() {
        let m = host(3, 3);
        let grid = BlockGrid::new(4, 4, 2).unwrap();
        let store = ShardedMatrixStore::new("m", grid, DType::I64, 1);
        assert!(matches!(
            load_matrix(&store, &m),
            Err(StoreError::MatrixShape { .. })
        ));
    }

    #[test]
    fn test_assemble_missing_tile() {
        let m = host(4, 4);
        let store = ShardedMatrixStore::new("m", grid_for(&m, 2).unwrap(), DType::I64, 1);
        load_matrix(&store, &m).unwrap();
        store.remove_block(BlockId::new(1, 0));
        assert!(matches!(
            assemble_matrix(&store),
            Err(StoreError::NotFound { .. })
        ));
    }
}
