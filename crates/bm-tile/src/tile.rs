use crate::backend::ComputeBackend;
use crate::dtype::{DType, Element};
use crate::error::{Result, TileError};
use crate::shape::Shape;
use crate::storage::TileStorage;

/// A dense, row-major 2D block of a single element type.
///
/// Tiles are immutable values as far as the multiply engine is concerned:
/// `multiply` and `add` return new tiles and never touch their operands.
/// Arithmetic is dispatched to a `ComputeBackend`.
#[derive(Debug, Clone, PartialEq)]
pub struct DenseTile {
    storage: TileStorage,
    shape: Shape,
}

impl DenseTile {
    /// Create a tile from existing storage.
    ///
    /// # Errors
    /// Returns `DataLength` if `storage.len() != shape.numel()`.
    pub fn new(storage: TileStorage, shape: Shape) -> Result<Self> {
        if storage.len() != shape.numel() {
            return Err(TileError::DataLength {
                shape,
                expected: shape.numel(),
                got: storage.len(),
            });
        }
        Ok(DenseTile { storage, shape })
    }

    /// Create a tile from a typed row-major vector.
    pub fn from_vec<T: Element>(data: Vec<T>, shape: Shape) -> Result<Self> {
        Self::new(T::into_storage(data), shape)
    }

    /// Create a zero-filled tile.
    pub fn zeros(dtype: DType, shape: Shape) -> Self {
        DenseTile {
            storage: TileStorage::zeros(dtype, shape.numel()),
            shape,
        }
    }

    /// Create an `n x n` identity tile.
    pub fn identity(dtype: DType, n: usize) -> Self {
        let storage = match dtype {
            DType::F32 => TileStorage::F32(identity_vec(n)),
            DType::F64 => TileStorage::F64(identity_vec(n)),
            DType::I32 => TileStorage::I32(identity_vec(n)),
            DType::I64 => TileStorage::I64(identity_vec(n)),
        };
        DenseTile {
            storage,
            shape: Shape::square(n),
        }
    }

    pub fn shape(&self) -> Shape {
        self.shape
    }

    pub fn rows(&self) -> usize {
        self.shape.rows()
    }

    pub fn cols(&self) -> usize {
        self.shape.cols()
    }

    pub fn dtype(&self) -> DType {
        self.storage.dtype()
    }

    pub fn storage(&self) -> &TileStorage {
        &self.storage
    }

    /// Returns the data as a typed row-major slice.
    pub fn as_slice<T: Element>(&self) -> Result<&[T]> {
        self.storage.as_slice()
    }

    /// Element at `(row, col)` widened to f64.
    ///
    /// # Panics
    /// Panics if the position lies outside the tile.
    pub fn get_f64(&self, row: usize, col: usize) -> f64 {
        let offset = self.shape.offset(row, col);
        match &self.storage {
            TileStorage::F32(v) => v[offset].to_f64(),
            TileStorage::F64(v) => v[offset],
            TileStorage::I32(v) => v[offset].to_f64(),
            TileStorage::I64(v) => v[offset].to_f64(),
        }
    }

    /// Tile product `self @ other`.
    ///
    /// `self` is [m, k], `other` is [k, n], the result is [m, n].
    ///
    /// # Errors
    /// - `Dimension` if `self.cols() != other.rows()`
    /// - `DTypeMismatch` if the element types differ
    /// - `Overflow` if an integer result does not fit the element type
    pub fn multiply(&self, other: &DenseTile, backend: &dyn ComputeBackend) -> Result<DenseTile> {
        if !self.shape.can_multiply(&other.shape) {
            return Err(TileError::Dimension {
                op: "multiply",
                lhs: self.shape,
                rhs: other.shape,
            });
        }
        check_dtype(self, other)?;

        let m = self.rows();
        let k = self.cols();
        let n = other.cols();
        let storage = backend.matmul(&self.storage, &other.storage, m, k, n)?;
        DenseTile::new(storage, Shape::new(m, n))
    }

    /// Element-wise sum of two tiles of the same shape and dtype.
    pub fn add(&self, other: &DenseTile, backend: &dyn ComputeBackend) -> Result<DenseTile> {
        if self.shape != other.shape {
            return Err(TileError::Dimension {
                op: "add",
                lhs: self.shape,
                rhs: other.shape,
            });
        }
        check_dtype(self, other)?;

        let storage = backend.add(&self.storage, &other.storage)?;
        DenseTile::new(storage, self.shape)
    }

    /// Copy the `rows x cols` rectangle starting at `(row0, col0)`.
    ///
    /// Positions past the edge of this tile read as zero, so an edge block of
    /// a ragged matrix comes back padded to full size.
    pub fn region(&self, row0: usize, col0: usize, rows: usize, cols: usize) -> DenseTile {
        let src = self.shape;
        let storage = match &self.storage {
            TileStorage::F32(v) => TileStorage::F32(copy_region(v, src, row0, col0, rows, cols)),
            TileStorage::F64(v) => TileStorage::F64(copy_region(v, src, row0, col0, rows, cols)),
            TileStorage::I32(v) => TileStorage::I32(copy_region(v, src, row0, col0, rows, cols)),
            TileStorage::I64(v) => TileStorage::I64(copy_region(v, src, row0, col0, rows, cols)),
        };
        DenseTile {
            storage,
            shape: Shape::new(rows, cols),
        }
    }

    /// Write `src` into this tile with its top-left corner at `(row0, col0)`.
    ///
    /// Parts of `src` that fall outside this tile are dropped.
    pub fn write_region(&mut self, row0: usize, col0: usize, src: &DenseTile) -> Result<()> {
        let dst_shape = self.shape;
        let src_shape = src.shape;
        match (&mut self.storage, &src.storage) {
            (TileStorage::F32(d), TileStorage::F32(s)) => {
                paste_region(d, dst_shape, s, src_shape, row0, col0)
            }
            (TileStorage::F64(d), TileStorage::F64(s)) => {
                paste_region(d, dst_shape, s, src_shape, row0, col0)
            }
            (TileStorage::I32(d), TileStorage::I32(s)) => {
                paste_region(d, dst_shape, s, src_shape, row0, col0)
            }
            (TileStorage::I64(d), TileStorage::I64(s)) => {
                paste_region(d, dst_shape, s, src_shape, row0, col0)
            }
            (d, s) => {
                return Err(TileError::DTypeMismatch {
                    expected: d.dtype(),
                    got: s.dtype(),
                })
            }
        }
        Ok(())
    }

    /// Largest absolute element-wise difference, compared in f64.
    pub fn max_abs_diff(&self, other: &DenseTile) -> Result<f64> {
        if self.shape != other.shape {
            return Err(TileError::Dimension {
                op: "compare",
                lhs: self.shape,
                rhs: other.shape,
            });
        }
        let a = self.storage.to_f64_vec();
        let b = other.storage.to_f64_vec();
        Ok(a.iter()
            .zip(&b)
            .map(|(x, y)| (x - y).abs())
            .fold(0.0, f64::max))
    }
}

fn check_dtype(a: &DenseTile, b: &DenseTile) -> Result<()> {
    if a.dtype() != b.dtype() {
        return Err(TileError::DTypeMismatch {
            expected: a.dtype(),
            got: b.dtype(),
        });
    }
    Ok(())
}

fn identity_vec<T: Element>(n: usize) -> Vec<T> {
    let mut data = vec![T::default(); n * n];
    for i in 0..n {
        data[i * n + i] = T::ONE;
    }
    data
}

fn copy_region<T: Element>(
    src: &[T],
    src_shape: Shape,
    row0: usize,
    col0: usize,
    rows: usize,
    cols: usize,
) -> Vec<T> {
    let mut out = vec![T::default(); rows * cols];
    let row_end = src_shape.rows().min(row0.saturating_add(rows));
    let col_end = src_shape.cols().min(col0.saturating_add(cols));
    if row0 >= row_end || col0 >= col_end {
        return out;
    }
    let width = col_end - col0;
    for r in row0..row_end {
        let from = r * src_shape.cols() + col0;
        let to = (r - row0) * cols;
        out[to..to + width].copy_from_slice(&src[from..from + width]);
    }
    out
}

fn paste_region<T: Element>(
    dst: &mut [T],
    dst_shape: Shape,
    src: &[T],
    src_shape: Shape,
    row0: usize,
    col0: usize,
) {
    let row_end = dst_shape.rows().min(row0.saturating_add(src_shape.rows()));
    let col_end = dst_shape.cols().min(col0.saturating_add(src_shape.cols()));
    if row0 >= row_end || col0 >= col_end {
        return;
    }
    let width = col_end - col0;
    for r in row0..row_end {
        let from = (r - row0) * src_shape.cols();
        let to = r * dst_shape.cols() + col0;
        dst[to..to + width].copy_from_slice(&src[from..from + width]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cpu::CpuBackend;
    use approx::assert_relative_eq;

    fn tile_f32(data: &[f32], rows: usize, cols: usize) -> DenseTile {
        DenseTile::from_vec(data.to_vec(), Shape::new(rows, cols)).unwrap()
    }

    #[test]
    fn test_new_tile() {
        let t = tile_f32(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0], 2, 3);
        assert_eq!(t.rows(), 2);
        assert_eq!(t.cols(), 3);
        assert_eq!(t.dtype(), DType::F32);
        assert_eq!(t.as_slice::<f32>().unwrap(), &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        assert_eq!(t.get_f64(1, 0), 4.0);
    }

    #[test]
    fn test_new_length_mismatch() {
        assert!(matches!(
            DenseTile::from_vec(vec![1.0f32, 2.0], Shape::square(2)),
            Err(TileError::DataLength { expected: 4, got: 2, .. })
        ));
    }

    #[test]
    fn test_identity() {
        let t = DenseTile::identity(DType::I32, 3);
        assert_eq!(t.as_slice::<i32>().unwrap(), &[1, 0, 0, 0, 1, 0, 0, 0, 1]);
    }

    #[test]
    fn test_multiply_identity_left() {
        let backend = CpuBackend::new();
        let a = DenseTile::identity(DType::F64, 2);
        let b = DenseTile::from_vec(vec![5.0f64, 6.0, 7.0, 8.0], Shape::square(2)).unwrap();
        let c = a.multiply(&b, &backend).unwrap();
        assert_eq!(c, b);
    }

    #[test]
    fn test_multiply_f32() {
        let backend = CpuBackend::new();
        let a = tile_f32(&[0.1, 0.2, 0.3, 0.4], 2, 2);
        let b = tile_f32(&[1.5, -2.0, 0.25, 3.0], 2, 2);
        let c = a.multiply(&b, &backend).unwrap();
        let data = c.as_slice::<f32>().unwrap();
        assert_relative_eq!(data[0], 0.1 * 1.5 + 0.2 * 0.25, epsilon = 1e-6);
        assert_relative_eq!(data[3], 0.3 * -2.0 + 0.4 * 3.0, epsilon = 1e-6);
    }

    #[test]
    fn test_multiply_square_size_mismatch() {
        let backend = CpuBackend::new();
        let a = DenseTile::identity(DType::F32, 2);
        let b = DenseTile::identity(DType::F32, 3);
        assert_eq!(
            a.multiply(&b, &backend).unwrap_err(),
            TileError::Dimension {
                op: "multiply",
                lhs: Shape::square(2),
                rhs: Shape::square(3)
            }
        );
    }

    #[test]
    fn test_multiply_dtype_mismatch() {
        let backend = CpuBackend::new();
        let a = DenseTile::identity(DType::F32, 2);
        let b = DenseTile::identity(DType::I32, 2);
        assert!(matches!(
            a.multiply(&b, &backend),
            Err(TileError::DTypeMismatch { .. })
        ));
    }

    #[test]
    fn test_multiply_integer_overflow() {
        let backend = CpuBackend::new();
        let a = DenseTile::from_vec(vec![i32::MAX], Shape::square(1)).unwrap();
        let b = DenseTile::from_vec(vec![2i32], Shape::square(1)).unwrap();
        assert!(matches!(
            a.multiply(&b, &backend),
            Err(TileError::Overflow { op: "multiply", dtype: DType::I32 })
        ));
    }

    #[test]
    fn test_add() {
        let backend = CpuBackend::new();
        let a = DenseTile::from_vec(vec![1i64, 2, 3, 4], Shape::square(2)).unwrap();
        let b = DenseTile::from_vec(vec![10i64, 20, 30, 40], Shape::square(2)).unwrap();
        let c = a.add(&b, &backend).unwrap();
        assert_eq!(c.as_slice::<i64>().unwrap(), &[11, 22, 33, 44]);
    }

    #[test]
    fn test_add_shape_mismatch() {
        let backend = CpuBackend::new();
        let a = DenseTile::zeros(DType::F32, Shape::new(2, 3));
        let b = DenseTile::zeros(DType::F32, Shape::new(3, 2));
        assert!(matches!(
            a.add(&b, &backend),
            Err(TileError::Dimension { op: "add", .. })
        ));
    }

    #[test]
    fn test_region_pads_with_zeros() {
        let m = DenseTile::from_vec((1..=6).collect::<Vec<i32>>(), Shape::new(2, 3)).unwrap();
        let edge = m.region(1, 2, 2, 2);
        assert_eq!(edge.shape(), Shape::square(2));
        assert_eq!(edge.as_slice::<i32>().unwrap(), &[6, 0, 0, 0]);

        let outside = m.region(5, 5, 2, 2);
        assert_eq!(outside.as_slice::<i32>().unwrap(), &[0, 0, 0, 0]);
    }

    #[test]
    fn test_write_region_clips() {
        let mut m = DenseTile::zeros(DType::I32, Shape::new(2, 3));
        let block = DenseTile::from_vec(vec![1i32, 2, 3, 4], Shape::square(2)).unwrap();
        m.write_region(1, 2, &block).unwrap();
        assert_eq!(m.as_slice::<i32>().unwrap(), &[0, 0, 0, 0, 0, 1]);
    }

    #[test]
    fn test_write_region_dtype_mismatch() {
        let mut m = DenseTile::zeros(DType::I32, Shape::square(2));
        let block = DenseTile::zeros(DType::F32, Shape::square(2));
        assert!(m.write_region(0, 0, &block).is_err());
    }

    #[test]
    fn test_max_abs_diff() {
        let a = tile_f32(&[1.0, 2.0], 1, 2);
        let b = tile_f32(&[1.5, 1.0], 1, 2);
        assert_relative_eq!(a.max_abs_diff(&b).unwrap(), 1.0);
    }
}
