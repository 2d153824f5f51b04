//! `bm-store` - Block addressing and sharded tile stores for blockmul.

pub mod block;
pub mod catalog;
pub mod error;
pub mod grid;
pub mod memory;
pub mod partition;
pub mod store;

pub use block::{BlockId, BlockPosition};
pub use catalog::MatrixCatalog;
pub use error::{Result, StoreError};
pub use grid::BlockGrid;
pub use memory::ShardedMatrixStore;
pub use partition::{assemble_matrix, load_matrix};
pub use store::MatrixStore;
