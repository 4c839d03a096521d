//! Numerical constants for calibration math
//!
//! Provides standardized tolerance values and physical constants
//! used throughout the library.

/// Speed of light in vacuum (m/s). Used to seed the propagation-constant
/// estimate from an effective-permittivity guess.
pub const C0: f64 = 299_792_458.0;

/// Tolerance for detecting near-zero values in division and singularity checks.
pub const NEAR_ZERO: f64 = 1e-15;

/// Relative singular-value cutoff for the pseudo-inverse of the error box.
/// Singular values below `PINV_TOL * sigma_max` are treated as zero.
pub const PINV_TOL: f64 = 1e-12;
