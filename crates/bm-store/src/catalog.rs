use std::collections::HashMap;
use std::sync::Arc;

use bm_tile::DType;
use parking_lot::RwLock;
use tracing::info;

use crate::error::{Result, StoreError};
use crate::grid::BlockGrid;
use crate::memory::ShardedMatrixStore;
use crate::store::MatrixStore;

/// Named registry of matrix stores.
///
/// Multiplication jobs refer to their operands by name; the catalog resolves
/// those names to store handles once per run.
#[derive(Debug)]
pub struct MatrixCatalog {
    stores: RwLock<HashMap<String, Arc<dyn MatrixStore>>>,
    shards: usize,
}

impl MatrixCatalog {
    /// Create an empty catalog whose `create` uses `shards` shards per store.
    pub fn new(shards: usize) -> Self {
        MatrixCatalog {
            stores: RwLock::new(HashMap::new()),
            shards: shards.max(1),
        }
    }

    /// Register an existing store under its own name.
    ///
    /// # Errors
    /// Returns `AlreadyExists` if the name is taken.
    pub fn register(&self, store: Arc<dyn MatrixStore>) -> Result<()> {
        let mut stores = self.stores.write();
        let name = store.name().to_string();
        if stores.contains_key(&name) {
            return Err(StoreError::AlreadyExists(name));
        }
        stores.insert(name, store);
        Ok(())
    }

    /// Create and register an empty sharded store.
    pub fn create(&self, name: &str, grid: BlockGrid, dtype: DType) -> Result<Arc<dyn MatrixStore>> {
        let store: Arc<dyn MatrixStore> =
            Arc::new(ShardedMatrixStore::new(name, grid, dtype, self.shards));
        self.register(Arc::clone(&store))?;
        info!(
            matrix = name,
            grid = %grid,
            dtype = %dtype,
            shards = self.shards,
            "created matrix store"
        );
        Ok(store)
    }

    /// Resolve a matrix by name.
    ///
    /// # Errors
    /// Returns `UnknownMatrix` if nothing is registered under `name`.
    pub fn open(&self, name: &str) -> Result<Arc<dyn MatrixStore>> {
        self.stores
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| StoreError::UnknownMatrix(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.stores.read().contains_key(name)
    }

    pub fn remove(&self, name: &str) -> Option<Arc<dyn MatrixStore>> {
        self.stores.write().remove(name)
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.stores.read().keys().cloned().collect();
        names.sort();
        names
    }
}

impl Default for MatrixCatalog {
    fn default() -> Self {
        Self::new(8)
    }
}
