//! Network module - N-port electrical network representation
//!
//! Holds per-frequency complex scattering matrices aligned to a
//! `Frequency` sweep.

use ndarray::{Array1, Array3};
use num_complex::Complex64;

use crate::frequency::Frequency;

/// An N-port electrical network
#[derive(Debug, Clone)]
pub struct Network {
    /// Frequency data
    pub frequency: Frequency,
    /// S-parameter data [nfreq, nports, nports]
    pub s: Array3<Complex64>,
    /// Reference impedance (per port)
    pub z0: Array1<Complex64>,
    /// Network name
    pub name: Option<String>,
}

impl Network {
    /// Create a new Network from S-parameters
    pub fn new(frequency: Frequency, s: Array3<Complex64>, z0: Array1<Complex64>) -> Self {
        Self {
            frequency,
            s,
            z0,
            name: None,
        }
    }

    /// Get the number of ports
    #[inline]
    pub fn nports(&self) -> usize {
        self.s.shape()[1]
    }

    /// Get the number of frequency points
    #[inline]
    pub fn nfreq(&self) -> usize {
        self.s.shape()[0]
    }

    /// Get frequency vector in Hz
    pub fn f(&self) -> &[f64] {
        self.frequency.f()
    }
}

/// Mirror a 1-port network into a symmetric 2-port
///
/// The reflection appears at both ports; transmission is zero. Used to
/// feed 1-port DUTs through the 2-port de-embedding path.
pub fn two_port_reflect(nw: &Network) -> Network {
    let nfreq = nw.nfreq();
    let mut s = Array3::<Complex64>::zeros((nfreq, 2, 2));
    for f in 0..nfreq {
        s[[f, 0, 0]] = nw.s[[f, 0, 0]];
        s[[f, 1, 1]] = nw.s[[f, 0, 0]];
    }
    let z0 = Array1::from_elem(2, nw.z0[0]);
    Network::new(nw.frequency.clone(), s, z0)
}
