//! Switch-term correction
//!
//! A VNA's internal source switch leaks a direction-dependent reflection
//! into raw two-port measurements. Given the forward and reverse switch
//! terms (each a 1-port network over the same sweep), this removes that
//! leakage per frequency point.

use ndarray::Array3;
use num_complex::Complex64;

use super::error::{contract, CalError};
use crate::network::Network;

/// Forward/reverse switch terms of a two-port VNA
///
/// `forward` is measured with the source at port 1, `reverse` with the
/// source at port 2.
#[derive(Debug, Clone)]
pub struct SwitchTerms {
    pub forward: Network,
    pub reverse: Network,
}

impl SwitchTerms {
    pub fn new(forward: Network, reverse: Network) -> Result<Self, CalError> {
        if forward.nports() != 1 || reverse.nports() != 1 {
            return Err(contract(
                "switch_terms",
                format!(
                    "switch terms must be 1-port networks, got {} and {} ports",
                    forward.nports(),
                    reverse.nports()
                ),
            ));
        }
        if forward.nfreq() != reverse.nfreq() {
            return Err(contract(
                "switch_terms",
                format!(
                    "forward and reverse sweeps differ in length ({} vs {})",
                    forward.nfreq(),
                    reverse.nfreq()
                ),
            ));
        }
        Ok(Self { forward, reverse })
    }

    #[inline]
    pub fn nfreq(&self) -> usize {
        self.forward.nfreq()
    }
}

/// Correct a raw two-port measurement for switch terms
///
/// Per frequency, with raw S and terms g21 (forward), g12 (reverse):
///
/// ```text
/// D    = 1 - S12*S21*g21*g12
/// S11' = (S11 - S12*S21*g21) / D
/// S12' = (S12 - S11*S12*g12) / D
/// S21' = (S21 - S22*S21*g21) / D
/// S22' = (S22 - S12*S21*g12) / D
/// ```
///
/// Zero switch terms leave the measurement unchanged.
pub fn correct_switch_terms(nw: &Network, terms: &SwitchTerms) -> Result<Network, CalError> {
    if nw.nports() != 2 {
        return Err(CalError::PortCount(nw.nports()));
    }
    if nw.nfreq() != terms.nfreq() {
        return Err(contract(
            "switch_terms",
            format!(
                "switch-term sweep length {} does not match measurement length {}",
                terms.nfreq(),
                nw.nfreq()
            ),
        ));
    }

    let nfreq = nw.nfreq();
    let one = Complex64::new(1.0, 0.0);
    let mut corrected = Array3::<Complex64>::zeros((nfreq, 2, 2));

    for f in 0..nfreq {
        let s11 = nw.s[[f, 0, 0]];
        let s12 = nw.s[[f, 0, 1]];
        let s21 = nw.s[[f, 1, 0]];
        let s22 = nw.s[[f, 1, 1]];
        let g21 = terms.forward.s[[f, 0, 0]];
        let g12 = terms.reverse.s[[f, 0, 0]];

        let d = one - s12 * s21 * g21 * g12;
        corrected[[f, 0, 0]] = (s11 - s12 * s21 * g21) / d;
        corrected[[f, 0, 1]] = (s12 - s11 * s12 * g12) / d;
        corrected[[f, 1, 0]] = (s21 - s22 * s21 * g21) / d;
        corrected[[f, 1, 1]] = (s22 - s12 * s21 * g12) / d;
    }

    Ok(Network::new(
        nw.frequency.clone(),
        corrected,
        nw.z0.clone(),
    ))
}
