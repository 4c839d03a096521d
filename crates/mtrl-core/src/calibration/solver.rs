//! Per-frequency multiline TRL solver contract
//!
//! The two solver algorithms (the classical NIST MultiCal formulation and
//! the improved TUG formulation) are external collaborators; only their
//! input/output contract lives here. The calibration session drives a
//! solver through this trait, one frequency point at a time.

use ndarray::Array2;
use num_complex::Complex64;
use thiserror::Error;

/// Which solver algorithm a session is configured for
///
/// The variant determines the warm-start policy between frequency points:
/// `Classical` extrapolates the returned propagation constant linearly in
/// frequency, `Improved` reuses the solver's own effective-permittivity
/// estimate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SolverVariant {
    #[default]
    Classical,
    Improved,
}

/// One frequency point's worth of solver input
#[derive(Debug)]
pub struct SolverInput<'a> {
    /// Measured lines in cascading (T) form, one 2x2 matrix per line
    pub lines_t: Vec<Array2<Complex64>>,
    /// Physical line lengths in meters, same order as `lines_t`
    pub line_lengths: &'a [f64],
    /// Measured reflect standards in scattering form, one 2x2 matrix each
    pub reflect_s: Vec<Array2<Complex64>>,
    /// Warm-start guess: propagation constant (Classical) or effective
    /// permittivity (Improved)
    pub guess: Complex64,
    /// Estimated reflection coefficient per reflect standard (e.g. -1 for a short)
    pub reflect_est: &'a [Complex64],
    /// Offset of each reflect standard from the reference plane, in meters
    /// (negative toward the port, positive away)
    pub reflect_offset: &'a [f64],
    /// Frequency of this point in Hz
    pub freq: f64,
}

/// One frequency point's worth of solver output
#[derive(Debug, Clone)]
pub struct SolverOutput {
    /// 4x4 error-box matrix (cascaded 8-term model), any scale
    pub x: Array2<Complex64>,
    /// Scale factor paired with `x`
    pub k: Complex64,
    /// Propagation constant of the line standards at this frequency
    pub gamma: Complex64,
    /// Updated effective-permittivity estimate (Improved variant only)
    pub ereff: Option<Complex64>,
    /// Auxiliary weighting magnitude |lambda|. Required for the Improved
    /// variant at every frequency point; `None` there aborts the sweep.
    /// Ignored for the Classical variant.
    pub weight: Option<f64>,
}

/// Errors produced by a solver at a single frequency point
#[derive(Error, Debug)]
pub enum SolverError {
    #[error("solver failed to converge: {0}")]
    NonConvergence(String),

    #[error("singular matrix in solver: {0}")]
    Singular(String),
}

/// A multiline TRL solver for a single frequency point
///
/// Implementations are selected by configuration (`variant`), not by the
/// session; the session only dispatches and manages the warm-start fold.
/// `solve` may keep internal scratch state, hence `&mut self`.
pub trait LineSolver {
    /// Which warm-start policy this solver expects
    fn variant(&self) -> SolverVariant;

    /// Solve one frequency point
    fn solve(&mut self, input: &SolverInput<'_>) -> Result<SolverOutput, SolverError>;
}
