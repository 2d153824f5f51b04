//! Built-in small multiplications with known products.

use std::sync::Arc;

use anyhow::{ensure, Result};
use bm_engine::{MultiplyConfig, MultiplyJob};
use bm_store::{assemble_matrix, load_matrix, BlockGrid, MatrixCatalog};
use bm_tile::{CpuBackend, DType, DenseTile, Shape};

pub struct Scenario {
    pub name: &'static str,
    pub block_size: usize,
    pub a: DenseTile,
    pub b: DenseTile,
    pub expected: DenseTile,
}

pub fn scenarios() -> Result<Vec<Scenario>> {
    let a = DenseTile::from_vec(vec![1i32, 2, 3, 4], Shape::square(2))?;
    Ok(vec![
        Scenario {
            name: "unit blocks times identity",
            block_size: 1,
            a: a.clone(),
            b: DenseTile::identity(DType::I32, 2),
            expected: a.clone(),
        },
        Scenario {
            name: "single identity tile",
            block_size: 2,
            a: DenseTile::identity(DType::I32, 2),
            b: DenseTile::from_vec(vec![5i32, 6, 7, 8], Shape::square(2))?,
            expected: DenseTile::from_vec(vec![5i32, 6, 7, 8], Shape::square(2))?,
        },
        Scenario {
            name: "two contraction blocks",
            block_size: 1,
            a,
            b: DenseTile::from_vec(vec![5i32, 6], Shape::new(2, 1))?,
            expected: DenseTile::from_vec(vec![17i32, 39], Shape::new(2, 1))?,
        },
    ])
}

impl Scenario {
    /// Multiply through a fresh catalog and compare with the known product.
    pub fn run(&self) -> Result<DenseTile> {
        let catalog = Arc::new(MatrixCatalog::new(2));
        for (name, m) in [("a", &self.a), ("b", &self.b)] {
            let grid = BlockGrid::new(m.rows(), m.cols(), self.block_size)?;
            let store = catalog.create(name, grid, m.dtype())?;
            load_matrix(store.as_ref(), m)?;
        }
        let config = MultiplyConfig::new("a", "b", "c").with_reducers(2);
        MultiplyJob::new(catalog.clone(), Arc::new(CpuBackend::new()), config).run()?;

        let product = assemble_matrix(catalog.open("c")?.as_ref())?;
        ensure!(
            product == self.expected,
            "{}: expected {:?}, got {:?}",
            self.name,
            self.expected.storage().to_f64_vec(),
            product.storage().to_f64_vec()
        );
        Ok(product)
    }
}
