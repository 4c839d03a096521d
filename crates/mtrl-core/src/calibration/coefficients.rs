//! Directional error coefficients
//!
//! Derives the six named error terms (directivity, source match,
//! reflection tracking, each direction) from the error-box array. Pure
//! functions of X; re-extracted after every state transform so the
//! exposed values never go stale.

use ndarray::{Array1, Array3};
use num_complex::Complex64;

/// The six directional error terms over the frequency sweep
///
/// Forward terms describe port 1 (source at port 1), reverse terms port 2.
#[derive(Debug, Clone)]
pub struct ErrorCoefficients {
    /// Forward directivity
    pub edf: Array1<Complex64>,
    /// Forward source match
    pub esf: Array1<Complex64>,
    /// Forward reflection tracking
    pub erf: Array1<Complex64>,
    /// Reverse directivity
    pub edr: Array1<Complex64>,
    /// Reverse source match
    pub esr: Array1<Complex64>,
    /// Reverse reflection tracking
    pub err: Array1<Complex64>,
}

impl ErrorCoefficients {
    /// Extract all six terms from the error-box array
    ///
    /// ```text
    /// ERF = X[2,2] - X[2,3]*X[3,2]    EDF =  X[2,3]    ESF = -X[3,2]
    /// ERR = X[1,1] - X[3,1]*X[1,3]    EDR = -X[1,3]    ESR =  X[3,1]
    /// ```
    pub fn extract(x: &Array3<Complex64>) -> Self {
        let nfreq = x.shape()[0];

        let edf = Array1::from_shape_fn(nfreq, |f| x[[f, 2, 3]]);
        let esf = Array1::from_shape_fn(nfreq, |f| -x[[f, 3, 2]]);
        let erf = Array1::from_shape_fn(nfreq, |f| x[[f, 2, 2]] - x[[f, 2, 3]] * x[[f, 3, 2]]);

        let edr = Array1::from_shape_fn(nfreq, |f| -x[[f, 1, 3]]);
        let esr = Array1::from_shape_fn(nfreq, |f| x[[f, 3, 1]]);
        let err = Array1::from_shape_fn(nfreq, |f| x[[f, 1, 1]] - x[[f, 3, 1]] * x[[f, 1, 3]]);

        Self {
            edf,
            esf,
            erf,
            edr,
            esr,
            err,
        }
    }

    /// Access a term by its conventional name ("EDF", "ESF", ...)
    pub fn get(&self, name: &str) -> Option<&Array1<Complex64>> {
        match name.to_uppercase().as_str() {
            "EDF" => Some(&self.edf),
            "ESF" => Some(&self.esf),
            "ERF" => Some(&self.erf),
            "EDR" => Some(&self.edr),
            "ESR" => Some(&self.esr),
            "ERR" => Some(&self.err),
            _ => None,
        }
    }

    /// All terms with their conventional names, forward then reverse
    pub fn iter(&self) -> [(&'static str, &Array1<Complex64>); 6] {
        [
            ("EDF", &self.edf),
            ("ESF", &self.esf),
            ("ERF", &self.erf),
            ("EDR", &self.edr),
            ("ESR", &self.esr),
            ("ERR", &self.err),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extraction_formulas() {
        let nfreq = 2;
        let mut x = Array3::<Complex64>::zeros((nfreq, 4, 4));
        for f in 0..nfreq {
            for i in 0..4 {
                for j in 0..4 {
                    x[[f, i, j]] =
                        Complex64::new((i * 4 + j) as f64 + f as f64, (i + j) as f64 * 0.5);
                }
            }
        }

        let coefs = ErrorCoefficients::extract(&x);
        for f in 0..nfreq {
            assert_eq!(coefs.edf[f], x[[f, 2, 3]]);
            assert_eq!(coefs.esf[f], -x[[f, 3, 2]]);
            assert_eq!(coefs.erf[f], x[[f, 2, 2]] - x[[f, 2, 3]] * x[[f, 3, 2]]);
            assert_eq!(coefs.edr[f], -x[[f, 1, 3]]);
            assert_eq!(coefs.esr[f], x[[f, 3, 1]]);
            assert_eq!(coefs.err[f], x[[f, 1, 1]] - x[[f, 3, 1]] * x[[f, 1, 3]]);
        }
    }

    #[test]
    fn test_named_access() {
        let x = Array3::<Complex64>::zeros((1, 4, 4));
        let coefs = ErrorCoefficients::extract(&x);

        assert!(coefs.get("EDF").is_some());
        assert!(coefs.get("esr").is_some());
        assert!(coefs.get("ELF").is_none());
        assert_eq!(coefs.iter().len(), 6);
    }

    #[test]
    fn test_identity_error_box_has_trivial_terms() {
        let nfreq = 3;
        let mut x = Array3::<Complex64>::zeros((nfreq, 4, 4));
        for f in 0..nfreq {
            for i in 0..4 {
                x[[f, i, i]] = Complex64::new(1.0, 0.0);
            }
        }

        let coefs = ErrorCoefficients::extract(&x);
        for f in 0..nfreq {
            assert_eq!(coefs.edf[f], Complex64::new(0.0, 0.0));
            assert_eq!(coefs.esf[f], Complex64::new(0.0, 0.0));
            assert_eq!(coefs.erf[f], Complex64::new(1.0, 0.0));
            assert_eq!(coefs.edr[f], Complex64::new(0.0, 0.0));
            assert_eq!(coefs.esr[f], Complex64::new(0.0, 0.0));
            assert_eq!(coefs.err[f], Complex64::new(1.0, 0.0));
        }
    }
}
