//! S-parameter transformation functions
//!
//! Conversion between scattering (S) and cascading/transfer (T) form for
//! 2-port networks. The calibration solver contract consumes lines in T
//! form; everything else in the crate stays in S form.

use ndarray::Array3;
use num_complex::Complex64;
use thiserror::Error;

use crate::constants::NEAR_ZERO;

/// Errors raised by parameter transforms
#[derive(Error, Debug)]
pub enum TransformError {
    #[error("T-parameters are only defined for 2-port networks, got {0} ports")]
    NotTwoPort(usize),

    #[error("S21 is singular at frequency index {0}, cannot form T-parameters")]
    SingularAtIndex(usize),
}

/// Convert 2-port S-parameters to cascading (T) parameters
///
/// T = 1/S21 * [[S12*S21 - S11*S22, S11], [-S22, 1]]
pub fn s2t(s: &Array3<Complex64>) -> Result<Array3<Complex64>, TransformError> {
    let nfreq = s.shape()[0];
    let nports = s.shape()[1];
    if nports != 2 {
        return Err(TransformError::NotTwoPort(nports));
    }

    let mut t = Array3::<Complex64>::zeros((nfreq, 2, 2));
    for f in 0..nfreq {
        let s11 = s[[f, 0, 0]];
        let s12 = s[[f, 0, 1]];
        let s21 = s[[f, 1, 0]];
        let s22 = s[[f, 1, 1]];

        if s21.norm() < NEAR_ZERO {
            return Err(TransformError::SingularAtIndex(f));
        }

        t[[f, 0, 0]] = (s12 * s21 - s11 * s22) / s21;
        t[[f, 0, 1]] = s11 / s21;
        t[[f, 1, 0]] = -s22 / s21;
        t[[f, 1, 1]] = Complex64::new(1.0, 0.0) / s21;
    }

    Ok(t)
}

/// Convert 2-port cascading (T) parameters back to S-parameters
///
/// S = 1/T22 * [[T12, T11*T22 - T12*T21], [1, -T21]]
pub fn t2s(t: &Array3<Complex64>) -> Result<Array3<Complex64>, TransformError> {
    let nfreq = t.shape()[0];
    let nports = t.shape()[1];
    if nports != 2 {
        return Err(TransformError::NotTwoPort(nports));
    }

    let mut s = Array3::<Complex64>::zeros((nfreq, 2, 2));
    for f in 0..nfreq {
        let t11 = t[[f, 0, 0]];
        let t12 = t[[f, 0, 1]];
        let t21 = t[[f, 1, 0]];
        let t22 = t[[f, 1, 1]];

        if t22.norm() < NEAR_ZERO {
            return Err(TransformError::SingularAtIndex(f));
        }

        s[[f, 0, 0]] = t12 / t22;
        s[[f, 0, 1]] = (t11 * t22 - t12 * t21) / t22;
        s[[f, 1, 0]] = Complex64::new(1.0, 0.0) / t22;
        s[[f, 1, 1]] = -t21 / t22;
    }

    Ok(s)
}
