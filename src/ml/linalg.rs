//! Dense inverse for the OLS normal equations
//!
//! Gauss-Jordan elimination with partial pivoting on `ndarray` matrices.
//! Systems here are tiny (one row per feature), so no BLAS is needed.

use ndarray::Array2;

/// Pivots smaller than this fraction of the largest entry count as zero
const SINGULAR_RTOL: f64 = 1e-12;

/// Invert a square matrix, `None` if it is singular or not square
#[must_use]
pub fn invert(a: &Array2<f64>) -> Option<Array2<f64>> {
    let n = a.nrows();
    if n != a.ncols() || n == 0 {
        return None;
    }

    let scale = a.iter().fold(0.0f64, |m, v| m.max(v.abs()));
    if scale == 0.0 || !scale.is_finite() {
        return None;
    }
    let threshold = scale * SINGULAR_RTOL;

    let mut work = a.clone();
    let mut inv = Array2::<f64>::eye(n);

    for col in 0..n {
        let pivot_row = (col..n).max_by(|&i, &j| work[[i, col]].abs().total_cmp(&work[[j, col]].abs()))?;
        if work[[pivot_row, col]].abs() <= threshold {
            return None;
        }
        if pivot_row != col {
            swap_rows(&mut work, pivot_row, col);
            swap_rows(&mut inv, pivot_row, col);
        }

        let pivot = work[[col, col]];
        work.row_mut(col).mapv_inplace(|v| v / pivot);
        inv.row_mut(col).mapv_inplace(|v| v / pivot);

        for row in 0..n {
            if row == col {
                continue;
            }
            let factor = work[[row, col]];
            if factor == 0.0 {
                continue;
            }
            let pivot_work = work.row(col).to_owned();
            let pivot_inv = inv.row(col).to_owned();
            work.row_mut(row).scaled_add(-factor, &pivot_work);
            inv.row_mut(row).scaled_add(-factor, &pivot_inv);
        }
    }

    Some(inv)
}

fn swap_rows(m: &mut Array2<f64>, i: usize, j: usize) {
    for col in 0..m.ncols() {
        m.swap([i, col], [j, col]);
    }
}
