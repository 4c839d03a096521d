//! Error-box state and its post-calibration transforms
//!
//! The calibration session owns one `ErrorBoxState` per run. Reference-plane
//! shifting and impedance renormalization are pure state transitions: they
//! return a new state and never touch the inputs, so the session can swap
//! the result in under single-writer ownership.

use ndarray::{s, Array1, Array2, Array3};
use num_complex::Complex64;

use super::error::{contract, CalError};

/// Per-frequency 4x4 error box X with scale factor K
///
/// Invariant: `x[[f, 3, 3]] == 1` at every frequency; any scale removed by
/// renormalization is absorbed into `k`.
#[derive(Debug, Clone)]
pub struct ErrorBoxState {
    /// Error-box matrices, shape [nfreq, 4, 4]
    pub x: Array3<Complex64>,
    /// Scale factors, shape [nfreq]
    pub k: Array1<Complex64>,
}

/// New reference impedance: a scalar broadcast over the sweep, or one
/// value per frequency point.
#[derive(Debug, Clone)]
pub enum Impedance {
    Scalar(Complex64),
    PerFrequency(Vec<Complex64>),
}

impl From<f64> for Impedance {
    fn from(z: f64) -> Self {
        Impedance::Scalar(Complex64::new(z, 0.0))
    }
}

impl From<Complex64> for Impedance {
    fn from(z: Complex64) -> Self {
        Impedance::Scalar(z)
    }
}

impl From<Vec<Complex64>> for Impedance {
    fn from(z: Vec<Complex64>) -> Self {
        Impedance::PerFrequency(z)
    }
}

impl Impedance {
    /// Expand to one value per frequency point
    fn broadcast(&self, field: &'static str, nfreq: usize) -> Result<Vec<Complex64>, CalError> {
        match self {
            Impedance::Scalar(z) => Ok(vec![*z; nfreq]),
            Impedance::PerFrequency(z) => {
                if z.len() != nfreq {
                    return Err(contract(
                        field,
                        format!(
                            "impedance array has {} entries, sweep has {} points",
                            z.len(),
                            nfreq
                        ),
                    ));
                }
                Ok(z.clone())
            }
        }
    }
}

impl ErrorBoxState {
    /// Build a state from raw per-frequency (X, K) pairs, renormalizing
    /// each slice so the trailing element of X is one.
    pub fn from_raw(x: Array3<Complex64>, k: Array1<Complex64>) -> Self {
        let mut state = Self { x, k };
        for f in 0..state.nfreq() {
            let kx = state.k[f] * &state.x.slice(s![f, .., ..]);
            state.assign_renormalized(f, &kx);
        }
        state
    }

    #[inline]
    pub fn nfreq(&self) -> usize {
        self.x.shape()[0]
    }

    /// Renormalize one frequency slice: X <- KX / KX[3,3], K <- KX[3,3]
    fn assign_renormalized(&mut self, f: usize, kx: &Array2<Complex64>) {
        let scale = kx[[3, 3]];
        self.x.slice_mut(s![f, .., ..]).assign(&(kx / scale));
        self.k[f] = scale;
    }

    /// Shift the calibration reference plane by `d` meters
    ///
    /// Negative `d` shifts toward the port, positive away from it. E.g.
    /// with a thru of length L, `d = -L/2` moves the plane back to the
    /// connector. Per frequency, with z = exp(-gamma*d):
    ///
    /// ```text
    /// KX' = K * X * diag(z^2, 1, 1, 1/z^2)
    /// ```
    ///
    /// followed by renormalization. Shifting by `d` then `-d` restores the
    /// original state.
    pub fn shift_plane(&self, gamma: &Array1<Complex64>, d: f64) -> Result<Self, CalError> {
        if gamma.len() != self.nfreq() {
            return Err(contract(
                "gamma",
                format!(
                    "propagation-constant array has {} entries, state has {} points",
                    gamma.len(),
                    self.nfreq()
                ),
            ));
        }

        let mut out = self.clone();
        for f in 0..self.nfreq() {
            let z = (-gamma[f] * d).exp();
            let z2 = z * z;
            let mut kx = self.k[f] * &self.x.slice(s![f, .., ..]);
            // Right-multiplication by diag(z^2, 1, 1, 1/z^2) scales columns.
            for row in 0..4 {
                kx[[row, 0]] *= z2;
                kx[[row, 3]] /= z2;
            }
            out.assign_renormalized(f, &kx);
        }
        Ok(out)
    }

    /// Renormalize the reference impedance from `z0` to `z_new`
    ///
    /// Per frequency, with Gamma = (Z_new - Z0) / (Z_new + Z0):
    ///
    /// ```text
    /// B   = kron([[1, -G], [-G, 1]], [[1, G], [G, 1]])
    /// KX' = K * X @ B / (1 - G^2)
    /// ```
    ///
    /// followed by renormalization. With Z_new == Z0 the transform is the
    /// identity.
    pub fn renorm_impedance(
        &self,
        z_new: impl Into<Impedance>,
        z0: impl Into<Impedance>,
    ) -> Result<Self, CalError> {
        let nfreq = self.nfreq();
        let z_new = z_new.into().broadcast("z_new", nfreq)?;
        let z0 = z0.into().broadcast("z0", nfreq)?;

        let one = Complex64::new(1.0, 0.0);
        let mut out = self.clone();
        for f in 0..nfreq {
            let g = (z_new[f] - z0[f]) / (z_new[f] + z0[f]);
            let b = kron_2x2(
                &[[one, -g], [-g, one]],
                &[[one, g], [g, one]],
            );
            let kx = (self.k[f] * &self.x.slice(s![f, .., ..])).dot(&b) / (one - g * g);
            out.assign_renormalized(f, &kx);
        }
        Ok(out)
    }
}

/// Kronecker product of two 2x2 complex matrices
fn kron_2x2(a: &[[Complex64; 2]; 2], b: &[[Complex64; 2]; 2]) -> Array2<Complex64> {
    let mut out = Array2::<Complex64>::zeros((4, 4));
    for i in 0..2 {
        for j in 0..2 {
            for p in 0..2 {
                for q in 0..2 {
                    out[[2 * i + p, 2 * j + q]] = a[i][j] * b[p][q];
                }
            }
        }
    }
    out
}
