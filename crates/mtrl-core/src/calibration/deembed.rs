//! De-embedding of measured networks through the error-box state
//!
//! Per-frequency math behind `MultilineTrl::apply_cal`. Each frequency
//! point is independent, so the loop runs on rayon. The error box is
//! inverted with a pseudo-inverse: a near-singular X degrades accuracy
//! but never aborts the correction.

use ndarray::{s, Array1, Array3};
use num_complex::Complex64;
use rayon::prelude::*;

use super::state::ErrorBoxState;
use crate::math::linalg::pinv_complex;

/// Which port a mirrored 1-port result is read back from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Side {
    /// Port 1
    #[default]
    Left,
    /// Port 2
    Right,
}

/// De-embed a two-port measurement through (X, K)
///
/// Per frequency, with measured S, error box X and scale K:
///
/// ```text
/// T       = pinv(X) @ [-S11*S22 + S12*S21, -S22, S11, 1]
/// S21_cal = K * S21 / T[3]
/// T       = T / T[3]
/// S11_cal = T[2]
/// S12_cal = (T[0] - T[2]*T[1]) / S21_cal
/// S22_cal = -T[1]
/// ```
///
/// With X = identity and K = 1 the output equals the input up to floating
/// precision.
pub fn deembed_two_port(meas: &Array3<Complex64>, state: &ErrorBoxState) -> Array3<Complex64> {
    let nfreq = meas.shape()[0];
    debug_assert_eq!(nfreq, state.nfreq());

    let one = Complex64::new(1.0, 0.0);
    let rows: Vec<[Complex64; 4]> = (0..nfreq)
        .into_par_iter()
        .map(|f| {
            let s11 = meas[[f, 0, 0]];
            let s12 = meas[[f, 0, 1]];
            let s21 = meas[[f, 1, 0]];
            let s22 = meas[[f, 1, 1]];

            let x = state.x.slice(s![f, .., ..]).to_owned();
            let xinv = pinv_complex(&x);

            let m = Array1::from(vec![-s11 * s22 + s12 * s21, -s22, s11, one]);
            let t = xinv.dot(&m);

            let s21_cal = state.k[f] * s21 / t[3];
            let t = &t / t[3];
            let s11_cal = t[2];
            let s22_cal = -t[1];
            let s12_cal = (t[0] - t[2] * t[1]) / s21_cal;

            [s11_cal, s12_cal, s21_cal, s22_cal]
        })
        .collect();

    let mut out = Array3::<Complex64>::zeros((nfreq, 2, 2));
    for (f, row) in rows.iter().enumerate() {
        out[[f, 0, 0]] = row[0];
        out[[f, 0, 1]] = row[1];
        out[[f, 1, 0]] = row[2];
        out[[f, 1, 1]] = row[3];
    }
    out
}
