//! Row-parallel dense GEMM over any `Element`.
//!
//! Each output row is computed in i-k-j order so the inner loop streams a
//! contiguous row of `b`, and sums stay in the element's accumulator type
//! until the row is finished.

use rayon::prelude::*;

use crate::dtype::Element;
use crate::error::{Result, TileError};
use crate::shape::Shape;

/// C = A @ B for row-major `a` [m, k] and `b` [k, n].
///
/// Rows are distributed over the rayon pool when `parallel` is set.
pub fn gemm<T: Element>(
    a: &[T],
    b: &[T],
    m: usize,
    k: usize,
    n: usize,
    parallel: bool,
) -> Result<Vec<T>> {
    check_len(a, Shape::new(m, k))?;
    check_len(b, Shape::new(k, n))?;

    let mut c = vec![T::default(); m * n];
    if m == 0 || n == 0 {
        return Ok(c);
    }

    if parallel {
        c.par_chunks_mut(n)
            .enumerate()
            .try_for_each(|(i, row)| gemm_row(&a[i * k..(i + 1) * k], b, n, row))?;
    } else {
        c.chunks_mut(n)
            .enumerate()
            .try_for_each(|(i, row)| gemm_row(&a[i * k..(i + 1) * k], b, n, row))?;
    }
    Ok(c)
}

fn gemm_row<T: Element>(a_row: &[T], b: &[T], n: usize, out: &mut [T]) -> Result<()> {
    let mut acc = vec![T::ACC_ZERO; n];

    for (p, &a_ip) in a_row.iter().enumerate() {
        let b_row = &b[p * n..(p + 1) * n];
        for (acc_j, &b_pj) in acc.iter_mut().zip(b_row) {
            *acc_j = T::mul_add(*acc_j, a_ip, b_pj).ok_or(TileError::Overflow {
                op: "multiply",
                dtype: T::DTYPE,
            })?;
        }
    }

    for (dst, sum) in out.iter_mut().zip(acc) {
        *dst = T::narrow(sum).ok_or(TileError::Overflow {
            op: "multiply",
            dtype: T::DTYPE,
        })?;
    }
    Ok(())
}

fn check_len<T>(data: &[T], shape: Shape) -> Result<()> {
    if data.len() != shape.numel() {
        return Err(TileError::DataLength {
            shape,
            expected: shape.numel(),
            got: data.len(),
        });
    }
    Ok(())
}
