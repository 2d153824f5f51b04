use crate::dtype::{DType, Element};
use crate::error::{Result, TileError};

/// Host-side tile storage, one variant per element type.
#[derive(Debug, Clone, PartialEq)]
pub enum TileStorage {
    F32(Vec<f32>),
    F64(Vec<f64>),
    I32(Vec<i32>),
    I64(Vec<i64>),
}

impl TileStorage {
    /// Number of elements in this storage.
    pub fn len(&self) -> usize {
        match self {
            TileStorage::F32(v) => v.len(),
            TileStorage::F64(v) => v.len(),
            TileStorage::I32(v) => v.len(),
            TileStorage::I64(v) => v.len(),
        }
    }

    /// Returns true if the storage contains no elements.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the dtype of this storage.
    pub fn dtype(&self) -> DType {
        match self {
            TileStorage::F32(_) => DType::F32,
            TileStorage::F64(_) => DType::F64,
            TileStorage::I32(_) => DType::I32,
            TileStorage::I64(_) => DType::I64,
        }
    }

    /// Create zero-filled storage for the given dtype and element count.
    pub fn zeros(dtype: DType, n: usize) -> Self {
        match dtype {
            DType::F32 => TileStorage::F32(vec![0.0; n]),
            DType::F64 => TileStorage::F64(vec![0.0; n]),
            DType::I32 => TileStorage::I32(vec![0; n]),
            DType::I64 => TileStorage::I64(vec![0; n]),
        }
    }

    /// Create storage from a typed vector.
    pub fn from_vec<T: Element>(data: Vec<T>) -> Self {
        T::into_storage(data)
    }

    /// Returns the data as a typed slice.
    ///
    /// # Errors
    /// Returns `DTypeMismatch` if the storage does not hold `T`.
    pub fn as_slice<T: Element>(&self) -> Result<&[T]> {
        let got = self.dtype();
        T::as_slice(self).ok_or(TileError::DTypeMismatch {
            expected: T::DTYPE,
            got,
        })
    }

    /// Returns the data as a mutable typed slice.
    ///
    /// # Errors
    /// Returns `DTypeMismatch` if the storage does not hold `T`.
    pub fn as_mut_slice<T: Element>(&mut self) -> Result<&mut [T]> {
        let got = self.dtype();
        T::as_mut_slice(self).ok_or(TileError::DTypeMismatch {
            expected: T::DTYPE,
            got,
        })
    }

    /// Widen every element to f64. Used for verification, never for compute.
    pub fn to_f64_vec(&self) -> Vec<f64> {
        match self {
            TileStorage::F32(v) => v.iter().map(|x| x.to_f64()).collect(),
            TileStorage::F64(v) => v.clone(),
            TileStorage::I32(v) => v.iter().map(|x| x.to_f64()).collect(),
            TileStorage::I64(v) => v.iter().map(|x| x.to_f64()).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_vec() {
        let s = TileStorage::from_vec(vec![1.0f32, 2.0, 3.0]);
        assert_eq!(s.len(), 3);
        assert!(!s.is_empty());
        assert_eq!(s.dtype(), DType::F32);
        assert_eq!(s.as_slice::<f32>().unwrap(), &[1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_zeros() {
        let s = TileStorage::zeros(DType::I64, 5);
        assert_eq!(s.len(), 5);
        assert_eq!(s.as_slice::<i64>().unwrap(), &[0; 5]);
    }

    #[test]
    fn test_wrong_dtype_slice() {
        let s = TileStorage::zeros(DType::F64, 2);
        assert_eq!(
            s.as_slice::<i32>().unwrap_err(),
            TileError::DTypeMismatch {
                expected: DType::I32,
                got: DType::F64
            }
        );
    }

    #[test]
    fn test_mut_slice() {
        let mut s = TileStorage::from_vec(vec![1i32, 2]);
        let slice = s.as_mut_slice::<i32>().unwrap();
        slice[0] = 42;
        assert_eq!(s.as_slice::<i32>().unwrap()[0], 42);
    }

    #[test]
    fn test_to_f64_vec() {
        let s = TileStorage::from_vec(vec![-3i32, 7]);
        assert_eq!(s.to_f64_vec(), vec![-3.0, 7.0]);
    }
}
