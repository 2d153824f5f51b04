//! `bm-tile` - Dense tile kernels with pluggable compute backends for blockmul.
//!
//! This crate provides:
//! - A `DenseTile` type: a row-major 2D block of one element type
//! - A `ComputeBackend` trait for pluggable tile compute
//! - A reference `CpuBackend` implementation (rayon row-parallel)
//! - Tile shape utilities
//! - Element type definitions (f32, f64, i32, i64) with widened accumulators

pub mod backend;
pub mod cpu;
pub mod dtype;
pub mod error;
pub mod shape;
pub mod storage;
pub mod tile;

// Re-export primary types at the crate root for convenience.
pub use backend::ComputeBackend;
pub use cpu::CpuBackend;
pub use dtype::{DType, Element};
pub use error::{Result, TileError};
pub use shape::Shape;
pub use storage::TileStorage;
pub use tile::DenseTile;
