use std::fmt;
use std::str::FromStr;

use crate::error::TileError;
use crate::storage::TileStorage;

/// Supported element types for tile storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DType {
    /// 32-bit floating point, accumulated in f64.
    F32,
    /// 64-bit floating point.
    F64,
    /// 32-bit signed integer, accumulated in i64.
    I32,
    /// 64-bit signed integer, accumulated in i128.
    I64,
}

impl DType {
    /// Returns true if this dtype is an integer type. Integer arithmetic is
    /// checked and exact; float arithmetic follows IEEE 754.
    pub fn is_integer(&self) -> bool {
        matches!(self, DType::I32 | DType::I64)
    }
}

impl fmt::Display for DType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DType::F32 => write!(f, "f32"),
            DType::F64 => write!(f, "f64"),
            DType::I32 => write!(f, "i32"),
            DType::I64 => write!(f, "i64"),
        }
    }
}

impl FromStr for DType {
    type Err = TileError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "f32" => Ok(DType::F32),
            "f64" => Ok(DType::F64),
            "i32" => Ok(DType::I32),
            "i64" => Ok(DType::I64),
            other => Err(TileError::UnknownDType(other.to_string())),
        }
    }
}

/// A scalar type that can be stored in a tile.
///
/// Every element type names an accumulator at least as wide as itself. Dot
/// products are summed in the accumulator and narrowed once at the end;
/// narrowing an integer accumulator that does not fit returns `None`.
pub trait Element: Copy + Default + PartialEq + fmt::Debug + Send + Sync + 'static {
    const DTYPE: DType;
    const ONE: Self;

    type Acc: Copy + Send + Sync;
    const ACC_ZERO: Self::Acc;

    /// `acc + a * b`, or `None` on integer overflow.
    fn mul_add(acc: Self::Acc, a: Self, b: Self) -> Option<Self::Acc>;

    fn narrow(acc: Self::Acc) -> Option<Self>;

    fn checked_add(a: Self, b: Self) -> Option<Self>;

    /// Lossy view used for verification and reporting only.
    fn to_f64(self) -> f64;

    fn as_slice(storage: &TileStorage) -> Option<&[Self]>;

    fn as_mut_slice(storage: &mut TileStorage) -> Option<&mut [Self]>;

    fn into_storage(data: Vec<Self>) -> TileStorage;
}

impl Element for f32 {
    const DTYPE: DType = DType::F32;
    const ONE: Self = 1.0;

    type Acc = f64;
    const ACC_ZERO: f64 = 0.0;

    fn mul_add(acc: f64, a: f32, b: f32) -> Option<f64> {
        Some(acc + a as f64 * b as f64)
    }

    fn narrow(acc: f64) -> Option<f32> {
        Some(acc as f32)
    }

    fn checked_add(a: f32, b: f32) -> Option<f32> {
        Some(a + b)
    }

    fn to_f64(self) -> f64 {
        self as f64
    }

    fn as_slice(storage: &TileStorage) -> Option<&[f32]> {
        match storage {
            TileStorage::F32(v) => Some(v.as_slice()),
            _ => None,
        }
    }

    fn as_mut_slice(storage: &mut TileStorage) -> Option<&mut [f32]> {
        match storage {
            TileStorage::F32(v) => Some(v.as_mut_slice()),
            _ => None,
        }
    }

    fn into_storage(data: Vec<f32>) -> TileStorage {
        TileStorage::F32(data)
    }
}

impl Element for f64 {
    const DTYPE: DType = DType::F64;
    const ONE: Self = 1.0;

    type Acc = f64;
    const ACC_ZERO: f64 = 0.0;

    fn mul_add(acc: f64, a: f64, b: f64) -> Option<f64> {
        Some(acc + a * b)
    }

    fn narrow(acc: f64) -> Option<f64> {
        Some(acc)
    }

    fn checked_add(a: f64, b: f64) -> Option<f64> {
        Some(a + b)
    }

    fn to_f64(self) -> f64 {
        self
    }

    fn as_slice(storage: &TileStorage) -> Option<&[f64]> {
        match storage {
            TileStorage::F64(v) => Some(v.as_slice()),
            _ => None,
        }
    }

    fn as_mut_slice(storage: &mut TileStorage) -> Option<&mut [f64]> {
        match storage {
            TileStorage::F64(v) => Some(v.as_mut_slice()),
            _ => None,
        }
    }

    fn into_storage(data: Vec<f64>) -> TileStorage {
        TileStorage::F64(data)
    }
}

impl Element for i32 {
    const DTYPE: DType = DType::I32;
    const ONE: Self = 1;

    type Acc = i64;
    const ACC_ZERO: i64 = 0;

    fn mul_add(acc: i64, a: i32, b: i32) -> Option<i64> {
        // i32 * i32 always fits in i64
        acc.checked_add(a as i64 * b as i64)
    }

    fn narrow(acc: i64) -> Option<i32> {
        i32::try_from(acc).ok()
    }

    fn checked_add(a: i32, b: i32) -> Option<i32> {
        a.checked_add(b)
    }

    fn to_f64(self) -> f64 {
        self as f64
    }

    fn as_slice(storage: &TileStorage) -> Option<&[i32]> {
        match storage {
            TileStorage::I32(v) => Some(v.as_slice()),
            _ => None,
        }
    }

    fn as_mut_slice(storage: &mut TileStorage) -> Option<&mut [i32]> {
        match storage {
            TileStorage::I32(v) => Some(v.as_mut_slice()),
            _ => None,
        }
    }

    fn into_storage(data: Vec<i32>) -> TileStorage {
        TileStorage::I32(data)
    }
}

impl Element for i64 {
    const DTYPE: DType = DType::I64;
    const ONE: Self = 1;

    type Acc = i128;
    const ACC_ZERO: i128 = 0;

    fn mul_add(acc: i128, a: i64, b: i64) -> Option<i128> {
        acc.checked_add(a as i128 * b as i128)
    }

    fn narrow(acc: i128) -> Option<i64> {
        i64::try_from(acc).ok()
    }

    fn checked_add(a: i64, b: i64) -> Option<i64> {
        a.checked_add(b)
    }

    fn to_f64(self) -> f64 {
        self as f64
    }

    fn as_slice(storage: &TileStorage) -> Option<&[i64]> {
        match storage {
            TileStorage::I64(v) => Some(v.as_slice()),
            _ => None,
        }
    }

    fn as_mut_slice(storage: &mut TileStorage) -> Option<&mut [i64]> {
        match storage {
            TileStorage::I64(v) => Some(v.as_mut_slice()),
            _ => None,
        }
    }

    fn into_storage(data: Vec<i64>) -> TileStorage {
        TileStorage::I64(data)
    }
}
