use std::sync::Arc;

use bm_store::{BlockGrid, BlockId, MatrixStore};
use bm_tile::{ComputeBackend, DenseTile};
use tracing::debug;

use crate::error::{EngineError, Result};

/// One tile contribution to an output block.
#[derive(Debug, Clone, PartialEq)]
pub struct PartialProduct {
    pub destination: BlockId,
    pub tile: DenseTile,
}

/// Sink for partial products emitted by a map task.
pub trait Collector {
    fn collect(&mut self, product: PartialProduct) -> Result<()>;
}

impl Collector for Vec<PartialProduct> {
    fn collect(&mut self, product: PartialProduct) -> Result<()> {
        self.push(product);
        Ok(())
    }
}

/// Map stage of `C = A @ B`.
///
/// For block `(i, k)` of A it emits `A(i, k) @ B(k, j)` for every block
/// column `j` of B, keyed by the output block `(i, j)`. The store handles
/// and backend are created once per run and shared by every task.
#[derive(Debug, Clone)]
pub struct PartialProductStage {
    a: Arc<dyn MatrixStore>,
    b: Arc<dyn MatrixStore>,
    backend: Arc<dyn ComputeBackend>,
}

impl PartialProductStage {
    /// # Errors
    /// - configuration error if the operands differ in block size or dtype
    /// - dimension error if A's block columns do not line up with B's block
    ///   rows, or the scalar inner dimensions differ
    pub fn new(
        a: Arc<dyn MatrixStore>,
        b: Arc<dyn MatrixStore>,
        backend: Arc<dyn ComputeBackend>,
    ) -> Result<Self> {
        let ga = a.grid();
        let gb = b.grid();
        if a.get_block_size() != b.get_block_size() {
            return Err(EngineError::Configuration(format!(
                "block size mismatch: '{}' uses {}, '{}' uses {}",
                a.name(),
                a.get_block_size(),
                b.name(),
                b.get_block_size()
            )));
        }
        if a.dtype() != b.dtype() {
            return Err(EngineError::Configuration(format!(
                "dtype mismatch: '{}' is {}, '{}' is {}",
                a.name(),
                a.dtype(),
                b.name(),
                b.dtype()
            )));
        }
        if ga.block_cols() != gb.block_rows() || ga.cols() != gb.rows() {
            return Err(EngineError::Dimension(format!(
                "cannot multiply '{}' {} by '{}' {}",
                a.name(),
                ga,
                b.name(),
                gb
            )));
        }
        Ok(PartialProductStage { a, b, backend })
    }

    pub fn a(&self) -> &Arc<dyn MatrixStore> {
        &self.a
    }

    pub fn b(&self) -> &Arc<dyn MatrixStore> {
        &self.b
    }

    pub fn backend(&self) -> &Arc<dyn ComputeBackend> {
        &self.backend
    }

    /// Grid of the product: A's rows by B's columns.
    pub fn output_grid(&self) -> Result<BlockGrid> {
        Ok(BlockGrid::new(
            self.a.grid().rows(),
            self.b.grid().cols(),
            self.a.get_block_size(),
        )?)
    }

    /// Partial products that sum into each output block.
    pub fn contraction_blocks(&self) -> usize {
        self.b.grid().block_rows()
    }

    /// Compute every partial product for A block `key`.
    ///
    /// All reads and multiplies happen before anything is returned, so a
    /// failure yields no products at all.
    pub fn compute(&self, key: BlockId) -> Result<Vec<PartialProduct>> {
        let gb = self.b.grid();
        if key.column() >= gb.block_rows() {
            return Err(EngineError::Dimension(format!(
                "contraction index {} of block {} is outside '{}' ({} block rows)",
                key.column(),
                key,
                self.b.name(),
                gb.block_rows()
            )));
        }

        let a = self.a.get_block(key.row(), key.column())?;
        let mut products = Vec::with_capacity(gb.block_cols());
        for j in 0..gb.block_cols() {
            let b = self.b.get_block(key.column(), j)?;
            let tile = a.multiply(&b, self.backend.as_ref())?;
            products.push(PartialProduct {
                destination: BlockId::new(key.row(), j),
                tile,
            });
        }
        Ok(products)
    }

    /// Run the map task for `key`, emitting into `collector`.
    ///
    /// Returns the number of partial products emitted.
    pub fn process_block(&self, key: BlockId, collector: &mut dyn Collector) -> Result<usize> {
        let products = self.compute(key)?;
        let n = products.len();
        for product in products {
            collector.collect(product)?;
        }
        debug!(block = %key, products = n, "emitted partial products");
        Ok(n)
    }
}
