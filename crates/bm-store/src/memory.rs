use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use bm_tile::{DType, DenseTile};
use parking_lot::RwLock;
use tracing::trace;

use crate::block::BlockId;
use crate::error::{Result, StoreError};
use crate::grid::BlockGrid;
use crate::store::{check_in_grid, check_tile, MatrixStore};

type Shard = RwLock<HashMap<BlockId, Arc<DenseTile>>>;

/// In-memory `MatrixStore` with tiles spread over hash-selected shards.
///
/// Each shard has its own reader-writer lock, so concurrent reads never
/// block each other and writes to different shards do not contend. Tiles
/// are held behind `Arc`; a read hands out a new handle, not a copy.
#[derive(Debug)]
pub struct ShardedMatrixStore {
    name: String,
    grid: BlockGrid,
    dtype: DType,
    shards: Vec<Shard>,
}

impl ShardedMatrixStore {
    /// Create an empty store. A shard count of zero is treated as one.
    pub fn new(name: impl Into<String>, grid: BlockGrid, dtype: DType, shards: usize) -> Self {
        let shards = (0..shards.max(1))
            .map(|_| RwLock::new(HashMap::new()))
            .collect();
        ShardedMatrixStore {
            name: name.into(),
            grid,
            dtype,
            shards,
        }
    }

    pub fn shard_count(&self) -> usize {
        self.shards.len()
    }

    /// Remove the tile at `id`, returning it if present.
    pub fn remove_block(&self, id: BlockId) -> Option<Arc<DenseTile>> {
        self.shard_for(id).write().remove(&id)
    }

    fn shard_for(&self, id: BlockId) -> &Shard {
        let mut hasher = DefaultHasher::new();
        id.hash(&mut hasher);
        let index = (hasher.finish() % self.shards.len() as u64) as usize;
        &self.shards[index]
    }
}

impl MatrixStore for ShardedMatrixStore {
    fn name(&self) -> &str {
        &self.name
    }

    fn grid(&self) -> BlockGrid {
        self.grid
    }

    fn dtype(&self) -> DType {
        self.dtype
    }

    fn get_block(&self, row: usize, column: usize) -> Result<Arc<DenseTile>> {
        let id = BlockId::new(row, column);
        check_in_grid(&self.name, self.grid, id)?;
        self.shard_for(id)
            .read()
            .get(&id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound {
                matrix: self.name.clone(),
                block: id,
            })
    }

    fn put_block(&self, id: BlockId, tile: DenseTile) -> Result<()> {
        check_tile(&self.name, self.grid, self.dtype, id, &tile)?;
        trace!(matrix = %self.name, block = %id, "storing tile");
        self.shard_for(id).write().insert(id, Arc::new(tile));
        Ok(())
    }

    fn block_ids(&self) -> Vec<BlockId> {
        let mut ids: Vec<BlockId> = self
            .shards
            .iter()
            .flat_map(|s| s.read().keys().copied().collect::<Vec<_>>())
            .collect();
        ids.sort_by_key(|id| (id.row(), id.column()));
        ids
    }

    fn block_count(&self) -> usize {
        self.shards.iter().map(|s| s.read().len()).sum()
    }
}
