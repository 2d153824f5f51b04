use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use bm_store::{BlockId, MatrixCatalog};
use bm_tile::ComputeBackend;
use rayon::prelude::*;
use tracing::{debug, error, info, warn};

use crate::aggregate::{AggregationStage, Shuffle};
use crate::config::MultiplyConfig;
use crate::enumerator::{BlockEnumerator, BLOCK_POSITION_COLUMN};
use crate::error::{EngineError, Result};
use crate::partial::PartialProductStage;

// Input splits handed out per rayon worker thread.
const SPLITS_PER_THREAD: usize = 4;

/// Outcome of a successful multiplication run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobReport {
    pub output: String,
    /// Map tasks run, one per block of A.
    pub tasks: usize,
    pub partial_products: usize,
    pub output_blocks: usize,
    /// Task attempts including retries.
    pub attempts: usize,
    pub retried_tasks: usize,
    pub elapsed: Duration,
}

impl fmt::Display for JobReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} tasks ({} retried, {} attempts), {} partial products, {} output blocks in {:.3?}",
            self.output,
            self.tasks,
            self.retried_tasks,
            self.attempts,
            self.partial_products,
            self.output_blocks,
            self.elapsed
        )
    }
}

#[derive(Debug, Default)]
struct MapCounters {
    tasks: AtomicUsize,
    products: AtomicUsize,
    attempts: AtomicUsize,
    retried: AtomicUsize,
}

/// Drives `output = A @ B` over the stores of a catalog.
///
/// Stores and backend are resolved once per run; map tasks run on the rayon
/// pool and feed the reduce partitions through a bounded shuffle.
#[derive(Debug, Clone)]
pub struct MultiplyJob {
    catalog: Arc<MatrixCatalog>,
    backend: Arc<dyn ComputeBackend>,
    config: MultiplyConfig,
}

impl MultiplyJob {
    pub fn new(
        catalog: Arc<MatrixCatalog>,
        backend: Arc<dyn ComputeBackend>,
        config: MultiplyConfig,
    ) -> Self {
        MultiplyJob {
            catalog,
            backend,
            config,
        }
    }

    pub fn config(&self) -> &MultiplyConfig {
        &self.config
    }

    /// Run the job to completion.
    ///
    /// # Errors
    /// Configuration problems fail before any task runs. A task failure
    /// fails the run and the partially written output is dropped from the
    /// catalog.
    pub fn run(&self) -> Result<JobReport> {
        let start = Instant::now();
        self.config.validate()?;

        let a = self.catalog.open(&self.config.matrix_a)?;
        let b = self.catalog.open(&self.config.matrix_b)?;
        let stage = PartialProductStage::new(a.clone(), b, self.backend.clone())?;
        if self.catalog.contains(&self.config.output) {
            return Err(EngineError::Configuration(format!(
                "output matrix '{}' already exists",
                self.config.output
            )));
        }
        let enumerator = BlockEnumerator::new(a.as_ref(), BLOCK_POSITION_COLUMN)?;
        let output = self
            .catalog
            .create(&self.config.output, stage.output_grid()?, a.dtype())?;

        info!(
            a = %self.config.matrix_a,
            b = %self.config.matrix_b,
            output = %self.config.output,
            grid = %output.grid(),
            tasks = enumerator.len(),
            reducers = self.config.reducers,
            backend = self.backend.name(),
            "starting multiplication"
        );

        let aggregation = AggregationStage::new(
            output,
            self.backend.clone(),
            stage.contraction_blocks(),
            self.config.reducers,
        );
        let counters = MapCounters::default();
        let result =
            aggregation.run(|shuffle| self.map_phase(&stage, &enumerator, shuffle, &counters));

        match result {
            Ok(((), output_blocks)) => {
                let report = JobReport {
                    output: self.config.output.clone(),
                    tasks: counters.tasks.load(Ordering::Relaxed),
                    partial_products: counters.products.load(Ordering::Relaxed),
                    output_blocks,
                    attempts: counters.attempts.load(Ordering::Relaxed),
                    retried_tasks: counters.retried.load(Ordering::Relaxed),
                    elapsed: start.elapsed(),
                };
                info!(
                    output = %report.output,
                    blocks = report.output_blocks,
                    retried = report.retried_tasks,
                    elapsed_ms = report.elapsed.as_millis() as u64,
                    "multiplication finished"
                );
                Ok(report)
            }
            Err(e) => {
                self.catalog.remove(&self.config.output);
                error!(
                    output = %self.config.output,
                    kind = %e.kind(),
                    block = ?e.block(),
                    error = %e,
                    "multiplication failed"
                );
                Err(e)
            }
        }
    }

    fn map_phase(
        &self,
        stage: &PartialProductStage,
        enumerator: &BlockEnumerator,
        shuffle: &Shuffle,
        counters: &MapCounters,
    ) -> Result<()> {
        let splits = enumerator.splits(rayon::current_num_threads() * SPLITS_PER_THREAD);
        debug!(splits = splits.len(), tasks = enumerator.len(), "dispatching map tasks");
        splits.par_iter().try_for_each(|split| {
            split.iter().try_for_each(|(key, _)| {
                let products = self.run_task(stage, key, shuffle, counters)?;
                counters.tasks.fetch_add(1, Ordering::Relaxed);
                counters.products.fetch_add(products, Ordering::Relaxed);
                Ok(())
            })
        })
    }

    /// One map task with retries. Only failures that could go away on a
    /// second read are retried, and never after output may have been sent.
    fn run_task(
        &self,
        stage: &PartialProductStage,
        key: BlockId,
        shuffle: &Shuffle,
        counters: &MapCounters,
    ) -> Result<usize> {
        let mut collector = shuffle.clone();
        let mut attempt = 0;
        loop {
            attempt += 1;
            counters.attempts.fetch_add(1, Ordering::Relaxed);
            match stage.process_block(key, &mut collector) {
                Ok(n) => {
                    if attempt > 1 {
                        counters.retried.fetch_add(1, Ordering::Relaxed);
                    }
                    return Ok(n);
                }
                Err(e)
                    if attempt < self.config.max_attempts
                        && e.kind().is_retryable()
                        && !e.is_channel_closed() =>
                {
                    warn!(block = %key, attempt, kind = %e.kind(), error = %e, "retrying task");
                }
                Err(e) => {
                    return Err(EngineError::TaskFailed {
                        block: key,
                        attempts: attempt,
                        source: Box::new(e),
                    });
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use bm_store::{assemble_matrix, load_matrix, BlockGrid};
    use bm_tile::{CpuBackend, DType, DenseTile, Shape};

    fn catalog_with(a: (&[i32], usize, usize), b: (&[i32], usize, usize), block: usize) -> Arc<MatrixCatalog> {
        let catalog = Arc::new(MatrixCatalog::new(4));
        for (name, (data, rows, cols)) in [("a", a), ("b", b)] {
            let m = DenseTile::from_vec(data.to_vec(), Shape::new(rows, cols)).unwrap();
            let store = catalog
                .create(name, BlockGrid::new(rows, cols, block).unwrap(), DType::I32)
                .unwrap();
            load_matrix(store.as_ref(), &m).unwrap();
        }
        catalog
    }

    fn job(catalog: Arc<MatrixCatalog>) -> MultiplyJob {
        MultiplyJob::new(
            catalog,
            Arc::new(CpuBackend::new()),
            MultiplyConfig::new("a", "b", "c").with_reducers(3),
        )
    }

    #[test]
    fn test_two_by_two_unit_blocks() {
        let catalog = catalog_with((&[1, 2, 3, 4], 2, 2), (&[5, 6, 7, 8], 2, 2), 1);
        let report = job(catalog.clone()).run().unwrap();
        assert_eq!(report.tasks, 4);
        assert_eq!(report.partial_products, 8);
        assert_eq!(report.output_blocks, 4);
        assert_eq!(report.retried_tasks, 0);

        let c = assemble_matrix(catalog.open("c").unwrap().as_ref()).unwrap();
        assert_eq!(c.as_slice::<i32>().unwrap(), &[19, 22, 43, 50]);
    }

    #[test]
    fn test_existing_output_rejected() {
        let catalog = catalog_with((&[1], 1, 1), (&[1], 1, 1), 1);
        catalog
            .create("c", BlockGrid::new(1, 1, 1).unwrap(), DType::I32)
            .unwrap();
        let err = job(catalog).run().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
    }

    #[test]
    fn test_unknown_operand() {
        let catalog = catalog_with((&[1], 1, 1), (&[1], 1, 1), 1);
        let job = MultiplyJob::new(
            catalog.clone(),
            Arc::new(CpuBackend::new()),
            MultiplyConfig::new("a", "missing", "c"),
        );
        assert_eq!(job.run().unwrap_err().kind(), ErrorKind::Configuration);
        assert!(!catalog.contains("c"));
    }

    #[test]
    fn test_overflow_drops_output() {
        let big = i32::MAX / 2 + 1;
        let catalog = catalog_with((&[big, big], 1, 2), (&[1, 1], 2, 1), 1);
        let err = job(catalog.clone()).run().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Numeric);
        assert_eq!(err.block(), Some(BlockId::new(0, 0)));
        assert!(!catalog.contains("c"));
    }

    #[test]
    fn test_every_block_dispatched_once() {
        let (m, k) = (9, 11);
        let a: Vec<i32> = (0..(m * k) as i32).collect();
        let b: Vec<i32> = vec![1; k];
        let catalog = catalog_with((&a, m, k), (&b, k, 1), 1);
        let report = job(catalog.clone()).run().unwrap();
        assert_eq!(report.tasks, m * k);
        assert_eq!(report.attempts, m * k);
        assert_eq!(report.partial_products, m * k);

        let c = assemble_matrix(catalog.open("c").unwrap().as_ref()).unwrap();
        let expected: Vec<i32> = a.chunks(k).map(|row| row.iter().sum()).collect();
        assert_eq!(c.as_slice::<i32>().unwrap(), expected.as_slice());
    }

    #[test]
    fn test_report_display() {
        let catalog = catalog_with((&[2], 1, 1), (&[3], 1, 1), 1);
        let report = job(catalog).run().unwrap();
        let s = report.to_string();
        assert!(s.starts_with("c: 1 tasks"));
    }
}
