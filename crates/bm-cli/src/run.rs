use std::sync::Arc;

use anyhow::{bail, Context, Result};
use bm_engine::{JobReport, MultiplyJob};
use bm_store::{assemble_matrix, load_matrix, BlockGrid, MatrixCatalog};
use bm_tile::{ComputeBackend, CpuBackend, DenseTile};
use tracing::info;

use crate::job_file::JobFile;

/// Result of `blockmul run`.
#[derive(Debug)]
pub struct RunSummary {
    pub report: JobReport,
    /// Largest element-wise deviation from the direct product, if verified.
    pub max_abs_diff: Option<f64>,
}

/// Generate the operands described by `file`, multiply them and optionally
/// check the product.
pub fn run_job(file: &JobFile) -> Result<RunSummary> {
    let ops = &file.operands;
    let dtype = ops.dtype()?;
    let catalog = Arc::new(MatrixCatalog::new(ops.shards));
    let backend: Arc<dyn ComputeBackend> = Arc::new(CpuBackend::new());

    let (a, b) = ops.generate()?;
    load(&catalog, &file.job.matrix_a, &a, ops.block_size)?;
    load(&catalog, &file.job.matrix_b, &b, ops.block_size)?;
    info!(m = ops.m, k = ops.k, n = ops.n, dtype = %dtype, seed = ops.seed, "operands loaded");

    let report = MultiplyJob::new(catalog.clone(), backend.clone(), file.job.clone())
        .run()
        .context("multiplication failed")?;

    let max_abs_diff = if ops.verify {
        let output = catalog.open(&report.output)?;
        let product = assemble_matrix(output.as_ref())?;
        let expected = a.multiply(&b, backend.as_ref())?;
        let diff = product.max_abs_diff(&expected)?;
        if diff > tolerance(dtype.is_integer(), ops.k) {
            bail!("product deviates from the direct product by {}", diff);
        }
        Some(diff)
    } else {
        None
    };

    Ok(RunSummary {
        report,
        max_abs_diff,
    })
}

fn load(catalog: &MatrixCatalog, name: &str, matrix: &DenseTile, block_size: usize) -> Result<()> {
    let grid = BlockGrid::new(matrix.rows(), matrix.cols(), block_size)?;
    let store = catalog.create(name, grid, matrix.dtype())?;
    load_matrix(store.as_ref(), matrix).with_context(|| format!("loading '{}'", name))?;
    Ok(())
}

// Integer products must match exactly; float sums may differ by rounding
// that grows with the inner dimension.
fn tolerance(integer: bool, k: usize) -> f64 {
    if integer {
        0.0
    } else {
        1e-5 * (k.max(1) as f64)
    }
}
