//! TOML job files for `blockmul run`.
//!
//! ```toml
//! [job]
//! matrix_a = "left"
//! matrix_b = "right"
//! output = "product"
//! max_attempts = 3
//! reducers = 4
//!
//! [operands]
//! m = 300
//! k = 200
//! n = 150
//! block_size = 64
//! dtype = "f64"
//! seed = 7
//! ```

use std::path::Path;

use anyhow::{ensure, Context, Result};
use bm_engine::MultiplyConfig;
use bm_tile::{DType, DenseTile, Shape};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct JobFile {
    pub job: MultiplyConfig,
    pub operands: Operands,
}

/// Shapes and generation settings for the two random operands:
/// A is `m x k`, B is `k x n`.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Operands {
    pub m: usize,
    pub k: usize,
    pub n: usize,
    pub block_size: usize,
    #[serde(default = "default_dtype")]
    pub dtype: String,
    #[serde(default)]
    pub seed: u64,
    /// Shards per matrix store.
    #[serde(default = "default_shards")]
    pub shards: usize,
    /// Compare the result against a direct product.
    #[serde(default = "default_verify")]
    pub verify: bool,
}

fn default_dtype() -> String {
    "f64".to_string()
}

fn default_shards() -> usize {
    8
}

fn default_verify() -> bool {
    true
}

impl JobFile {
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading job file {}", path.display()))?;
        Self::parse(&text).with_context(|| format!("parsing job file {}", path.display()))
    }

    pub fn parse(text: &str) -> Result<Self> {
        let file: JobFile = toml::from_str(text)?;
        file.operands.dtype()?;
        ensure!(file.operands.block_size > 0, "block_size must be > 0");
        ensure!(file.operands.shards > 0, "shards must be > 0");
        Ok(file)
    }
}

impl Operands {
    pub fn dtype(&self) -> Result<DType> {
        self.dtype
            .parse()
            .with_context(|| format!("operand dtype '{}'", self.dtype))
    }

    /// Seeded random `(A, B)`.
    pub fn generate(&self) -> Result<(DenseTile, DenseTile)> {
        let dtype = self.dtype()?;
        let mut rng = StdRng::seed_from_u64(self.seed);
        let a = random_matrix(&mut rng, dtype, self.m, self.k)?;
        let b = random_matrix(&mut rng, dtype, self.k, self.n)?;
        Ok((a, b))
    }
}

/// Floats are drawn from `[-1, 1)`, integers from `[-100, 100)` so that
/// moderate inner dimensions stay clear of overflow.
pub fn random_matrix(rng: &mut StdRng, dtype: DType, rows: usize, cols: usize) -> Result<DenseTile> {
    let shape = Shape::new(rows, cols);
    let n = shape.numel();
    let tile = match dtype {
        DType::F32 => DenseTile::from_vec((0..n).map(|_| rng.gen_range(-1.0f32..1.0)).collect(), shape),
        DType::F64 => DenseTile::from_vec((0..n).map(|_| rng.gen_range(-1.0f64..1.0)).collect(), shape),
        DType::I32 => DenseTile::from_vec((0..n).map(|_| rng.gen_range(-100i32..100)).collect(), shape),
        DType::I64 => DenseTile::from_vec((0..n).map(|_| rng.gen_range(-100i64..100)).collect(), shape),
    }?;
    Ok(tile)
}
