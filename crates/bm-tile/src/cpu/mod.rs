pub mod elementwise;
pub mod matmul;

use crate::backend::ComputeBackend;
use crate::error::{Result, TileError};
use crate::storage::TileStorage;

/// Multiply-adds per product above which rows are spread over rayon.
pub const DEFAULT_PARALLEL_THRESHOLD: usize = 64 * 64 * 64;

/// Pure-Rust CPU compute backend.
///
/// Small products run on the calling thread. Products with at least
/// `parallel_threshold` multiply-adds split their output rows across the
/// rayon pool.
#[derive(Debug, Clone)]
pub struct CpuBackend {
    parallel_threshold: usize,
}

impl CpuBackend {
    pub fn new() -> Self {
        CpuBackend {
            parallel_threshold: DEFAULT_PARALLEL_THRESHOLD,
        }
    }

    pub fn with_parallel_threshold(parallel_threshold: usize) -> Self {
        CpuBackend { parallel_threshold }
    }

    /// A backend that never leaves the calling thread.
    pub fn sequential() -> Self {
        Self::with_parallel_threshold(usize::MAX)
    }

    fn parallel(&self, m: usize, k: usize, n: usize) -> bool {
        m.saturating_mul(k).saturating_mul(n) >= self.parallel_threshold
    }
}

impl Default for CpuBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl ComputeBackend for CpuBackend {
    fn name(&self) -> &str {
        "cpu"
    }

    fn matmul(
        &self,
        a: &TileStorage,
        b: &TileStorage,
        m: usize,
        k: usize,
        n: usize,
    ) -> Result<TileStorage> {
        let par = self.parallel(m, k, n);
        match (a, b) {
            (TileStorage::F32(a), TileStorage::F32(b)) => {
                matmul::gemm(a, b, m, k, n, par).map(TileStorage::F32)
            }
            (TileStorage::F64(a), TileStorage::F64(b)) => {
                matmul::gemm(a, b, m, k, n, par).map(TileStorage::F64)
            }
            (TileStorage::I32(a), TileStorage::I32(b)) => {
                matmul::gemm(a, b, m, k, n, par).map(TileStorage::I32)
            }
            (TileStorage::I64(a), TileStorage::I64(b)) => {
                matmul::gemm(a, b, m, k, n, par).map(TileStorage::I64)
            }
            (a, b) => Err(TileError::DTypeMismatch {
                expected: a.dtype(),
                got: b.dtype(),
            }),
        }
    }

    fn add(&self, a: &TileStorage, b: &TileStorage) -> Result<TileStorage> {
        match (a, b) {
            (TileStorage::F32(a), TileStorage::F32(b)) => {
                elementwise::add(a, b).map(TileStorage::F32)
            }
            (TileStorage::F64(a), TileStorage::F64(b)) => {
                elementwise::add(a, b).map(TileStorage::F64)
            }
            (TileStorage::I32(a), TileStorage::I32(b)) => {
                elementwise::add(a, b).map(TileStorage::I32)
            }
            (TileStorage::I64(a), TileStorage::I64(b)) => {
                elementwise::add(a, b).map(TileStorage::I64)
            }
            (a, b) => Err(TileError::DTypeMismatch {
                expected: a.dtype(),
                got: b.dtype(),
            }),
        }
    }
}
