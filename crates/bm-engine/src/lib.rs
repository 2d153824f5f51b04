//! `bm-engine` - Block-partitioned matrix multiplication over tile stores.
//!
//! A run is split into two stages:
//! - a map stage that reads one block of A, multiplies it by every block in
//!   the matching block row of B and emits the partial products
//! - a reduce stage that sums the partial products per output block and
//!   writes each finished tile once
//!
//! `MultiplyJob` wires the stages together over a `MatrixCatalog`.

pub mod aggregate;
pub mod config;
pub mod enumerator;
pub mod error;
pub mod job;
pub mod partial;

pub use aggregate::{aggregate, partition_for, AggregationStage, Shuffle, TileAccumulator};
pub use config::MultiplyConfig;
pub use enumerator::{BlockEnumerator, BlockSplit, BLOCK_POSITION_COLUMN};
pub use error::{EngineError, ErrorKind, Result};
pub use job::{JobReport, MultiplyJob};
pub use partial::{Collector, PartialProduct, PartialProductStage};
