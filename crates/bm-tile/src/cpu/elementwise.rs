use crate::dtype::Element;
use crate::error::{Result, TileError};
use crate::shape::Shape;

/// Element-wise checked sum of two equally sized slices.
pub fn add<T: Element>(a: &[T], b: &[T]) -> Result<Vec<T>> {
    if a.len() != b.len() {
        return Err(TileError::Dimension {
            op: "add",
            lhs: Shape::new(1, a.len()),
            rhs: Shape::new(1, b.len()),
        });
    }
    a.iter()
        .zip(b)
        .map(|(&x, &y)| {
            T::checked_add(x, y).ok_or(TileError::Overflow {
                op: "add",
                dtype: T::DTYPE,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add() {
        assert_eq!(add(&[1i32, 2], &[3, 4]).unwrap(), vec![4, 6]);
    }

    #[test]
    fn test_add_overflow() {
        assert!(matches!(
            add(&[i64::MAX], &[1]),
            Err(TileError::Overflow { op: "add", .. })
        ));
    }

    #[test]
    fn test_add_length_mismatch() {
        assert!(matches!(
            add(&[1.0f32], &[1.0, 2.0]),
            Err(TileError::Dimension { .. })
        ));
    }
}
