use std::collections::hash_map::DefaultHasher;
use std::collections::{HashMap, HashSet};
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use bm_store::{BlockId, MatrixStore};
use bm_tile::{ComputeBackend, DenseTile, Shape};
use crossbeam::channel::{bounded, Receiver, Sender};
use tracing::{debug, trace};

use crate::error::{EngineError, Result};
use crate::partial::{Collector, PartialProduct};

/// Bound on in-flight partial products per reduce partition.
pub const SHUFFLE_CAPACITY: usize = 64;

/// Reduce partition that owns output block `id`.
pub fn partition_for(id: BlockId, partitions: usize) -> usize {
    let mut hasher = DefaultHasher::new();
    id.hash(&mut hasher);
    (hasher.finish() % partitions.max(1) as u64) as usize
}

fn aggregation_failed(block: BlockId, source: EngineError) -> EngineError {
    EngineError::AggregationFailed {
        block,
        source: Box::new(source),
    }
}

/// Running element-wise sum of the partial products for one output block.
#[derive(Debug, Default)]
pub struct TileAccumulator {
    sum: Option<DenseTile>,
    count: usize,
}

impl TileAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, tile: DenseTile, backend: &dyn ComputeBackend) -> Result<()> {
        self.sum = Some(match self.sum.take() {
            Some(sum) => sum.add(&tile, backend)?,
            None => tile,
        });
        self.count += 1;
        Ok(())
    }

    pub fn count(&self) -> usize {
        self.count
    }

    pub fn finish(self) -> Option<DenseTile> {
        self.sum
    }
}

/// Sum `products` by destination.
///
/// Arrival order does not matter: integer sums are exact, float sums agree
/// up to rounding.
pub fn aggregate<I>(products: I, backend: &dyn ComputeBackend) -> Result<HashMap<BlockId, DenseTile>>
where
    I: IntoIterator<Item = PartialProduct>,
{
    let mut pending: HashMap<BlockId, TileAccumulator> = HashMap::new();
    for product in products {
        pending
            .entry(product.destination)
            .or_default()
            .add(product.tile, backend)?;
    }
    Ok(pending
        .into_iter()
        .filter_map(|(id, acc)| acc.finish().map(|tile| (id, tile)))
        .collect())
}

/// Sending half of the shuffle. Routes each partial product to the reduce
/// partition that owns its destination block.
#[derive(Debug, Clone)]
pub struct Shuffle {
    senders: Vec<Sender<PartialProduct>>,
}

impl Shuffle {
    pub fn partitions(&self) -> usize {
        self.senders.len()
    }

    pub fn send(&self, product: PartialProduct) -> Result<()> {
        let partition = partition_for(product.destination, self.senders.len());
        self.senders[partition]
            .send(product)
            .map_err(|_| EngineError::ChannelClosed(format!("reduce partition {}", partition)))
    }
}

impl Collector for Shuffle {
    fn collect(&mut self, product: PartialProduct) -> Result<()> {
        self.send(product)
    }
}

/// Reduce stage: folds partial products into output tiles.
///
/// An output block is written exactly once, when its contribution count
/// reaches `expected`. Each partition is folded by a single thread, so the
/// accumulators need no locking.
#[derive(Debug, Clone)]
pub struct AggregationStage {
    output: Arc<dyn MatrixStore>,
    backend: Arc<dyn ComputeBackend>,
    expected: usize,
    partitions: usize,
}

impl AggregationStage {
    pub fn new(
        output: Arc<dyn MatrixStore>,
        backend: Arc<dyn ComputeBackend>,
        expected: usize,
        partitions: usize,
    ) -> Self {
        AggregationStage {
            output,
            backend,
            expected,
            partitions: partitions.max(1),
        }
    }

    pub fn expected(&self) -> usize {
        self.expected
    }

    pub fn partitions(&self) -> usize {
        self.partitions
    }

    /// Fold everything arriving on `rx` until every sender is gone.
    ///
    /// Returns the number of output blocks written.
    pub fn reduce_partition(&self, partition: usize, rx: Receiver<PartialProduct>) -> Result<usize> {
        let mut pending: HashMap<BlockId, TileAccumulator> = HashMap::new();
        let mut finished: HashSet<BlockId> = HashSet::new();

        for product in rx.iter() {
            let id = product.destination;
            if finished.contains(&id) {
                return Err(EngineError::ExcessContribution {
                    block: id,
                    expected: self.expected,
                });
            }
            let acc = pending.entry(id).or_default();
            acc.add(product.tile, self.backend.as_ref())
                .map_err(|e| aggregation_failed(id, e))?;
            trace!(partition, block = %id, received = acc.count(), "accumulated");
            if acc.count() >= self.expected {
                if let Some(tile) = pending.remove(&id).and_then(TileAccumulator::finish) {
                    self.output
                        .put_block(id, tile)
                        .map_err(|e| aggregation_failed(id, e.into()))?;
                }
                finished.insert(id);
            }
        }

        if let Some((id, acc)) = pending
            .iter()
            .min_by_key(|(id, _)| (id.row(), id.column()))
        {
            return Err(EngineError::IncompleteAggregation {
                block: *id,
                expected: self.expected,
                received: acc.count(),
            });
        }
        debug!(partition, blocks = finished.len(), "reduce partition finished");
        Ok(finished.len())
    }

    /// Run `produce` against a fresh shuffle while one thread per partition
    /// folds its output.
    ///
    /// Returns what `produce` returned and the number of output blocks
    /// written. On failure the producer's own error wins over the reducer
    /// error it caused, and a reducer error wins over a closed channel seen
    /// by the producer.
    pub fn run<T, F>(&self, produce: F) -> Result<(T, usize)>
    where
        F: FnOnce(&Shuffle) -> Result<T>,
    {
        let (senders, receivers): (Vec<_>, Vec<_>) =
            (0..self.partitions).map(|_| bounded(SHUFFLE_CAPACITY)).unzip();
        let shuffle = Shuffle { senders };

        let (produced, reduced) = std::thread::scope(|s| {
            let handles: Vec<_> = receivers
                .into_iter()
                .enumerate()
                .map(|(partition, rx)| s.spawn(move || self.reduce_partition(partition, rx)))
                .collect();

            let produced = produce(&shuffle);
            drop(shuffle);

            let reduced: Vec<Result<usize>> = handles
                .into_iter()
                .enumerate()
                .map(|(partition, h)| {
                    h.join()
                        .unwrap_or_else(|_| Err(EngineError::ReducerPanicked { partition }))
                })
                .collect();
            (produced, reduced)
        });

        let produced = match produced {
            Err(e) if !e.is_channel_closed() => return Err(e),
            other => other,
        };
        let mut written = 0;
        for r in reduced {
            written += r?;
        }
        let produced = produced?;

        if self.expected == 0 {
            written += self.fill_zeros()?;
        }
        self.check_complete()?;
        Ok((produced, written))
    }

    // With no contraction blocks every output tile is zero.
    fn fill_zeros(&self) -> Result<usize> {
        let grid = self.output.grid();
        let shape = Shape::square(grid.block_size());
        for id in grid.ids() {
            self.output
                .put_block(id, DenseTile::zeros(self.output.dtype(), shape))
                .map_err(|e| aggregation_failed(id, e.into()))?;
        }
        Ok(grid.block_count())
    }

    fn check_complete(&self) -> Result<()> {
        let grid = self.output.grid();
        if self.output.block_count() == grid.block_count() {
            return Ok(());
        }
        match grid
            .ids()
            .find(|id| self.output.get_block(id.row(), id.column()).is_err())
        {
            Some(block) => Err(EngineError::IncompleteAggregation {
                block,
                expected: self.expected,
                received: 0,
            }),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use approx::assert_relative_eq;
    use bm_store::{assemble_matrix, BlockGrid, ShardedMatrixStore};
    use bm_tile::{CpuBackend, DType};

    fn backend() -> Arc<dyn ComputeBackend> {
        Arc::new(CpuBackend::new())
    }

    fn product(row: usize, col: usize, v: i32) -> PartialProduct {
        PartialProduct {
            destination: BlockId::new(row, col),
            tile: DenseTile::from_vec(vec![v], Shape::square(1)).unwrap(),
        }
    }

    fn output(rows: usize, cols: usize) -> Arc<dyn MatrixStore> {
        let grid = BlockGrid::new(rows, cols, 1).unwrap();
        Arc::new(ShardedMatrixStore::new("c", grid, DType::I32, 2))
    }

    #[test]
    fn test_partition_for_is_stable() {
        let id = BlockId::new(3, 7);
        let p = partition_for(id, 5);
        assert!(p < 5);
        assert_eq!(partition_for(id, 5), p);
        assert_eq!(partition_for(id, 0), 0);
    }

    #[test]
    fn test_accumulator() {
        let b = CpuBackend::new();
        assert!(TileAccumulator::new().finish().is_none());

        let mut acc = TileAccumulator::new();
        acc.add(product(0, 0, 3).tile, &b).unwrap();
        acc.add(product(0, 0, 4).tile, &b).unwrap();
        assert_eq!(acc.count(), 2);
        assert_eq!(acc.finish().unwrap().as_slice::<i32>().unwrap(), &[7]);
    }

    #[test]
    fn test_aggregate_integer_order_independent() {
        let b = CpuBackend::new();
        let forward = vec![product(0, 0, 1), product(0, 1, 10), product(0, 0, 2), product(0, 1, 20)];
        let mut backward = forward.clone();
        backward.reverse();

        let x = aggregate(forward, &b).unwrap();
        let y = aggregate(backward, &b).unwrap();
        assert_eq!(x, y);
        assert_eq!(x[&BlockId::new(0, 1)].as_slice::<i32>().unwrap(), &[30]);
    }

    #[test]
    fn test_aggregate_float_order_independent() {
        let b = CpuBackend::new();
        let tiles: Vec<PartialProduct> = [0.1f64, 0.2, 0.3, 1e-9, 7.5]
            .iter()
            .map(|&v| PartialProduct {
                destination: BlockId::new(0, 0),
                tile: DenseTile::from_vec(vec![v], Shape::square(1)).unwrap(),
            })
            .collect();
        let mut reversed = tiles.clone();
        reversed.reverse();

        let x = aggregate(tiles, &b).unwrap()[&BlockId::new(0, 0)].get_f64(0, 0);
        let y = aggregate(reversed, &b).unwrap()[&BlockId::new(0, 0)].get_f64(0, 0);
        assert_relative_eq!(x, y, epsilon = 1e-12);
        assert_relative_eq!(x, 8.100000001, epsilon = 1e-12);
    }

    #[test]
    fn test_run_writes_each_block_once() {
        let out = output(2, 2);
        let stage = AggregationStage::new(out.clone(), backend(), 2, 3);
        let (sent, written) = stage
            .run(|shuffle| {
                let mut n = 0;
                for v in [1, 2] {
                    for (r, c) in [(1, 1), (0, 0), (1, 0), (0, 1)] {
                        shuffle.send(product(r, c, v * (r * 2 + c + 1) as i32))?;
                        n += 1;
                    }
                }
                Ok(n)
            })
            .unwrap();
        assert_eq!(sent, 8);
        assert_eq!(written, 4);

        let c = assemble_matrix(out.as_ref()).unwrap();
        assert_eq!(c.as_slice::<i32>().unwrap(), &[3, 6, 9, 12]);
    }

    #[test]
    fn test_run_excess_contribution() {
        let out = output(1, 1);
        let stage = AggregationStage::new(out, backend(), 1, 1);
        let err = stage
            .run(|shuffle| {
                // The reducer may hang up after the second product.
                let _ = shuffle.send(product(0, 0, 1));
                let _ = shuffle.send(product(0, 0, 1));
                Ok(())
            })
            .unwrap_err();
        assert!(matches!(err, EngineError::ExcessContribution { .. }));
        assert_eq!(err.kind(), ErrorKind::Internal);
    }

    #[test]
    fn test_run_incomplete_aggregation() {
        let out = output(1, 2);
        let stage = AggregationStage::new(out.clone(), backend(), 2, 2);
        let err = stage
            .run(|shuffle| {
                shuffle.send(product(0, 0, 1))?;
                shuffle.send(product(0, 0, 1))?;
                shuffle.send(product(0, 1, 1))
            })
            .unwrap_err();
        match err {
            EngineError::IncompleteAggregation {
                block,
                expected,
                received,
            } => {
                assert_eq!(block, BlockId::new(0, 1));
                assert_eq!((expected, received), (2, 1));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_producer_error_wins() {
        let out = output(1, 1);
        let stage = AggregationStage::new(out, backend(), 2, 1);
        let err = stage
            .run(|shuffle| -> Result<()> {
                shuffle.send(product(0, 0, 1))?;
                Err(EngineError::Dimension("boom".to_string()))
            })
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Dimension);
    }

    #[test]
    fn test_run_overflow_names_destination() {
        let out = output(1, 2);
        let stage = AggregationStage::new(out, backend(), 2, 2);
        let err = stage
            .run(|shuffle| {
                let _ = shuffle.send(product(0, 1, i32::MAX));
                let _ = shuffle.send(product(0, 1, 1));
                Ok(())
            })
            .unwrap_err();
        assert!(matches!(err, EngineError::AggregationFailed { .. }));
        assert_eq!(err.kind(), ErrorKind::Numeric);
        assert_eq!(err.block(), Some(BlockId::new(0, 1)));
    }

    #[test]
    fn test_no_contraction_blocks_writes_zeros() {
        let out = output(2, 3);
        let stage = AggregationStage::new(out.clone(), backend(), 0, 2);
        let ((), written) = stage.run(|_| Ok(())).unwrap();
        assert_eq!(written, 6);
        let c = assemble_matrix(out.as_ref()).unwrap();
        assert_eq!(c.as_slice::<i32>().unwrap(), &[0; 6]);
    }
}
