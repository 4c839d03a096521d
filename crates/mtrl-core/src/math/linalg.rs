//! Linear algebra operations
//!
//! Uses nalgebra as the backend. All ndarray<->nalgebra conversions are
//! contained here so callers never deal with two matrix types.

use nalgebra::DMatrix;
use ndarray::Array2;
use num_complex::Complex64;

use crate::constants::{NEAR_ZERO, PINV_TOL};

/// Convert ndarray Array2<Complex64> to nalgebra DMatrix
#[inline]
fn to_na(a: &Array2<Complex64>) -> DMatrix<Complex64> {
    let (m, n) = a.dim();
    DMatrix::from_fn(m, n, |i, j| a[[i, j]])
}

/// Convert nalgebra DMatrix back to ndarray Array2<Complex64>
#[inline]
fn from_na(m: &DMatrix<Complex64>) -> Array2<Complex64> {
    Array2::from_shape_fn((m.nrows(), m.ncols()), |(i, j)| m[(i, j)])
}

/// Moore-Penrose pseudo-inverse of a complex matrix
///
/// Built from the SVD: A+ = V * S+ * U^H, where singular values below
/// `PINV_TOL * sigma_max` are dropped. Total by construction: an
/// ill-conditioned or even all-zero input yields a finite result rather
/// than a failure. The error-box de-embedding path relies on this.
pub fn pinv_complex(a: &Array2<Complex64>) -> Array2<Complex64> {
    let (m, n) = a.dim();
    let svd = to_na(a).svd(true, true);

    let (u, v_t) = match (svd.u, svd.v_t) {
        (Some(u), Some(v_t)) => (u, v_t),
        // SVD of a finite matrix always yields factors; a NaN-poisoned
        // input falls back to a zero pseudo-inverse.
        _ => return Array2::zeros((n, m)),
    };

    let sigma_max = svd
        .singular_values
        .iter()
        .cloned()
        .fold(0.0_f64, f64::max);
    let cutoff = (PINV_TOL * sigma_max).max(NEAR_ZERO);

    // A+ = V * diag(1/sigma_i) * U^H with small sigma zeroed. The thin
    // SVD factors are m x k and k x n, so the middle term is k x k.
    let k = svd.singular_values.len();
    let mut s_inv = DMatrix::<Complex64>::zeros(k, k);
    for i in 0..k {
        let sv = svd.singular_values[i];
        if sv > cutoff {
            s_inv[(i, i)] = Complex64::new(1.0 / sv, 0.0);
        }
    }

    let pinv = v_t.adjoint() * s_inv * u.adjoint();
    from_na(&pinv)
}
