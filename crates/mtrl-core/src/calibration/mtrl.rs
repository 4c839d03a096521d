//! Multiline TRL calibration session
//!
//! Owns the measured standards and, after `run`, the per-frequency
//! error-box state. The session drives a `LineSolver` across the sweep in
//! ascending-frequency order, carrying a warm-start guess from one point
//! to the next, then exposes de-embedding and the post-calibration
//! transforms.

use std::f64::consts::PI;

use ndarray::{s, Array1, Array3};
use num_complex::Complex64;

use super::coefficients::ErrorCoefficients;
use super::deembed::{deembed_two_port, Side};
use super::error::{contract, CalError};
use super::solver::{LineSolver, SolverInput, SolverVariant};
use super::state::{ErrorBoxState, Impedance};
use super::switch_terms::{correct_switch_terms, SwitchTerms};
use crate::constants::C0;
use crate::frequency::Frequency;
use crate::math::transforms::s2t;
use crate::network::{two_port_reflect, Network};

/// A multiline TRL calibration session
///
/// Built from measured line standards (the first line is the thru and
/// defines the nominal reference plane), measured reflect standards with
/// their estimated reflection coefficients and plane offsets, and an
/// effective-permittivity estimate. Optional switch terms are applied to
/// every standard at construction and to DUTs in `apply_cal`.
pub struct MultilineTrl {
    lines: Vec<Network>,
    line_lengths: Vec<f64>,
    reflect: Vec<Network>,
    reflect_est: Vec<Complex64>,
    reflect_offset: Vec<f64>,
    ereff_est: Complex64,
    switch_terms: Option<SwitchTerms>,
    frequency: Frequency,

    state: Option<ErrorBoxState>,
    gamma: Option<Array1<Complex64>>,
    abs_lambda: Option<Array1<f64>>,
    coefficients: Option<ErrorCoefficients>,
}

impl MultilineTrl {
    /// Create a session, validating every input length before any
    /// per-frequency work
    ///
    /// Fails fast with `ContractViolation` on mismatched array lengths,
    /// non-2-port standards, inconsistent sweeps, or a sweep that is not
    /// strictly ascending (the warm-start extrapolation requires one).
    pub fn new(
        lines: Vec<Network>,
        line_lengths: Vec<f64>,
        reflect: Vec<Network>,
        reflect_est: Vec<Complex64>,
        reflect_offset: Vec<f64>,
        ereff_est: Complex64,
        switch_terms: Option<SwitchTerms>,
    ) -> Result<Self, CalError> {
        if lines.is_empty() {
            return Err(contract("lines", "at least one line standard is required"));
        }
        if lines.len() != line_lengths.len() {
            return Err(contract(
                "line_lengths",
                format!(
                    "{} lengths given for {} line standards",
                    line_lengths.len(),
                    lines.len()
                ),
            ));
        }
        if reflect.is_empty() {
            return Err(contract(
                "reflect",
                "at least one reflect standard is required",
            ));
        }
        if reflect.len() != reflect_est.len() {
            return Err(contract(
                "reflect_est",
                format!(
                    "{} estimates given for {} reflect standards",
                    reflect_est.len(),
                    reflect.len()
                ),
            ));
        }
        if reflect.len() != reflect_offset.len() {
            return Err(contract(
                "reflect_offset",
                format!(
                    "{} offsets given for {} reflect standards",
                    reflect_offset.len(),
                    reflect.len()
                ),
            ));
        }

        let frequency = lines[0].frequency.clone();
        let nfreq = frequency.npoints();
        if !frequency.is_strictly_ascending() {
            return Err(contract(
                "lines",
                "frequency sweep must be strictly ascending",
            ));
        }

        let check_standards = |field: &'static str, standards: &[Network]| {
            for (i, nw) in standards.iter().enumerate() {
                if nw.nports() != 2 {
                    return Err(contract(
                        field,
                        format!("standard {} is {}-port, expected 2-port", i, nw.nports()),
                    ));
                }
                if nw.nfreq() != nfreq {
                    return Err(contract(
                        field,
                        format!(
                            "standard {} has {} frequency points, expected {}",
                            i,
                            nw.nfreq(),
                            nfreq
                        ),
                    ));
                }
            }
            Ok(())
        };
        check_standards("lines", &lines)?;
        check_standards("reflect", &reflect)?;
        if let Some(terms) = &switch_terms {
            if terms.nfreq() != nfreq {
                return Err(contract(
                    "switch_terms",
                    format!(
                        "switch terms have {} frequency points, expected {}",
                        terms.nfreq(),
                        nfreq
                    ),
                ));
            }
        }

        // Standards are corrected once, up front.
        let (lines, reflect) = match &switch_terms {
            Some(terms) => {
                let lines = lines
                    .iter()
                    .map(|nw| correct_switch_terms(nw, terms))
                    .collect::<Result<Vec<_>, _>>()?;
                let reflect = reflect
                    .iter()
                    .map(|nw| correct_switch_terms(nw, terms))
                    .collect::<Result<Vec<_>, _>>()?;
                (lines, reflect)
            }
            None => (lines, reflect),
        };

        Ok(Self {
            lines,
            line_lengths,
            reflect,
            reflect_est,
            reflect_offset,
            ereff_est,
            switch_terms,
            frequency,
            state: None,
            gamma: None,
            abs_lambda: None,
            coefficients: None,
        })
    }

    /// Run the calibration sweep with the given solver
    ///
    /// Folds over frequency indices in ascending order, carrying the
    /// warm-start guess dictated by the solver variant. A solver failure
    /// aborts the whole sweep and names the failing frequency index; no
    /// partial results are stored.
    pub fn run(&mut self, solver: &mut dyn LineSolver) -> Result<(), CalError> {
        let f = self.frequency.f().to_vec();
        let nfreq = f.len();
        let variant = solver.variant();

        log::info!(
            "mTRL sweep: {} points, {} lines, {} reflects, {:?} solver",
            nfreq,
            self.lines.len(),
            self.reflect.len(),
            variant
        );

        let lines_t: Vec<Array3<Complex64>> = self
            .lines
            .iter()
            .map(|nw| s2t(&nw.s).map_err(CalError::from))
            .collect::<Result<_, _>>()?;

        let mut x = Array3::<Complex64>::zeros((nfreq, 4, 4));
        let mut k = Array1::<Complex64>::zeros(nfreq);
        let mut gamma = Array1::<Complex64>::zeros(nfreq);
        let mut weights = Array1::<f64>::from_elem(nfreq, f64::NAN);

        let mut guess = match variant {
            SolverVariant::Classical => {
                // gamma0 from the permittivity estimate at the first point,
                // forced into the attenuation >= 0 convention.
                let g0 = Complex64::new(2.0 * PI * f[0] / C0, 0.0) * (-self.ereff_est).sqrt();
                Complex64::new(g0.re.abs(), g0.im.abs())
            }
            SolverVariant::Improved => self.ereff_est,
        };

        for (inx, &ff) in f.iter().enumerate() {
            let input = SolverInput {
                lines_t: lines_t
                    .iter()
                    .map(|t| t.slice(s![inx, .., ..]).to_owned())
                    .collect(),
                line_lengths: &self.line_lengths,
                reflect_s: self
                    .reflect
                    .iter()
                    .map(|nw| nw.s.slice(s![inx, .., ..]).to_owned())
                    .collect(),
                guess,
                reflect_est: &self.reflect_est,
                reflect_offset: &self.reflect_offset,
                freq: ff,
            };

            let out = solver
                .solve(&input)
                .map_err(|e| CalError::NumericalFailure {
                    freq_index: inx,
                    message: e.to_string(),
                })?;
            if out.x.dim() != (4, 4) {
                return Err(CalError::NumericalFailure {
                    freq_index: inx,
                    message: format!("solver returned a {:?} error box, expected 4x4", out.x.dim()),
                });
            }

            x.slice_mut(s![inx, .., ..]).assign(&out.x);
            k[inx] = out.k;
            gamma[inx] = out.gamma;
            match out.weight {
                Some(w) => weights[inx] = w,
                // Improved solvers must produce |lambda| at every point;
                // a hole here would otherwise surface as NaN in abs_lambda.
                None if variant == SolverVariant::Improved => {
                    return Err(CalError::NumericalFailure {
                        freq_index: inx,
                        message: "solver returned no |lambda| weight".to_string(),
                    });
                }
                None => {}
            }

            match variant {
                SolverVariant::Classical => {
                    // Assumes roughly linear phase vs. frequency.
                    if inx + 1 < nfreq {
                        guess =
                            Complex64::new(out.gamma.re, out.gamma.im * f[inx + 1] / ff);
                    }
                }
                SolverVariant::Improved => {
                    if let Some(ereff) = out.ereff {
                        guess = ereff;
                    }
                }
            }

            log::debug!("frequency {:.4} GHz done", ff * 1e-9);
        }

        let state = ErrorBoxState::from_raw(x, k);
        self.coefficients = Some(ErrorCoefficients::extract(&state.x));
        self.state = Some(state);
        self.gamma = Some(gamma);
        self.abs_lambda = match variant {
            SolverVariant::Improved => Some(weights),
            SolverVariant::Classical => None,
        };

        log::info!("mTRL sweep complete");
        Ok(())
    }

    /// Apply the calibration to a measured 1- or 2-port network
    ///
    /// A 1-port input is mirrored into a symmetric 2-port, corrected, and
    /// read back from `side` (Left = port 1). `side` is ignored for 2-port
    /// inputs. Switch terms, when configured, are applied to the raw
    /// measurement first.
    pub fn apply_cal(&self, nw: &Network, side: Side) -> Result<Network, CalError> {
        let state = self.state.as_ref().ok_or(CalError::NotCalibrated)?;

        let nports = nw.nports();
        let two_port = match nports {
            1 => two_port_reflect(nw),
            2 => nw.clone(),
            n => return Err(CalError::PortCount(n)),
        };
        if two_port.nfreq() != state.nfreq() {
            return Err(contract(
                "network",
                format!(
                    "measurement has {} frequency points, calibration has {}",
                    two_port.nfreq(),
                    state.nfreq()
                ),
            ));
        }

        let two_port = match &self.switch_terms {
            Some(terms) => correct_switch_terms(&two_port, terms)?,
            None => two_port,
        };

        let s_cal = deembed_two_port(&two_port.s, state);

        if nports == 1 {
            let nfreq = s_cal.shape()[0];
            let mut s = Array3::<Complex64>::zeros((nfreq, 1, 1));
            for f in 0..nfreq {
                s[[f, 0, 0]] = match side {
                    Side::Left => s_cal[[f, 0, 0]],
                    Side::Right => s_cal[[f, 1, 1]],
                };
            }
            Ok(Network::new(nw.frequency.clone(), s, nw.z0.clone()))
        } else {
            Ok(Network::new(nw.frequency.clone(), s_cal, nw.z0.clone()))
        }
    }

    /// Shift the calibration reference plane by `d` meters
    ///
    /// Negative toward the port, positive away from it. Updates the stored
    /// state and re-derives the error coefficients.
    pub fn shift_plane(&mut self, d: f64) -> Result<(), CalError> {
        let state = self.state.as_ref().ok_or(CalError::NotCalibrated)?;
        let gamma = self.gamma.as_ref().ok_or(CalError::NotCalibrated)?;

        let shifted = state.shift_plane(gamma, d)?;
        self.coefficients = Some(ErrorCoefficients::extract(&shifted.x));
        self.state = Some(shifted);
        Ok(())
    }

    /// Renormalize the calibration reference impedance from `z0` to `z_new`
    ///
    /// Either argument may be a scalar (broadcast over the sweep) or a
    /// per-frequency vector. Updates the stored state and re-derives the
    /// error coefficients.
    pub fn renorm_impedance(
        &mut self,
        z_new: impl Into<Impedance>,
        z0: impl Into<Impedance>,
    ) -> Result<(), CalError> {
        let state = self.state.as_ref().ok_or(CalError::NotCalibrated)?;

        let renormed = state.renorm_impedance(z_new, z0)?;
        self.coefficients = Some(ErrorCoefficients::extract(&renormed.x));
        self.state = Some(renormed);
        Ok(())
    }

    /// The calibration frequency sweep
    pub fn frequency(&self) -> &Frequency {
        &self.frequency
    }

    /// The error-box state, once `run` has succeeded
    pub fn state(&self) -> Option<&ErrorBoxState> {
        self.state.as_ref()
    }

    /// Propagation constant per frequency, once `run` has succeeded
    pub fn gamma(&self) -> Option<&Array1<Complex64>> {
        self.gamma.as_ref()
    }

    /// The six directional error terms, kept in sync with the state
    pub fn coefficients(&self) -> Option<&ErrorCoefficients> {
        self.coefficients.as_ref()
    }

    /// Auxiliary weighting magnitudes (Improved variant only). When
    /// present, every entry is a finite solver-produced value; a sweep
    /// with a missing weight fails in `run` instead.
    pub fn abs_lambda(&self) -> Option<&Array1<f64>> {
        self.abs_lambda.as_ref()
    }
}
