use std::fmt::Debug;

use crate::error::Result;
use crate::storage::TileStorage;

/// Trait for pluggable tile compute backends.
///
/// Operands are passed as row-major storage and results are returned as
/// owned storage of the same dtype. Implementations must reject operands of
/// different dtypes and must never narrow an accumulator silently.
pub trait ComputeBackend: Send + Sync + Debug {
    /// Returns the name of this backend (e.g., "cpu").
    fn name(&self) -> &str;

    /// Matrix multiplication: C = A @ B.
    ///
    /// - `a`: row-major data of shape [m, k]
    /// - `b`: row-major data of shape [k, n]
    /// - Returns: row-major data of shape [m, n]
    fn matmul(
        &self,
        a: &TileStorage,
        b: &TileStorage,
        m: usize,
        k: usize,
        n: usize,
    ) -> Result<TileStorage>;

    /// Element-wise addition: result[i] = a[i] + b[i].
    fn add(&self, a: &TileStorage, b: &TileStorage) -> Result<TileStorage>;
}
