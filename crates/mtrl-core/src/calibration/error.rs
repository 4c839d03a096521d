//! Calibration error taxonomy
//!
//! Policy:
//! - `ContractViolation` and `PortCount` are raised before any
//!   per-frequency work starts, naming the offending field.
//! - A solver failure aborts the whole sweep and surfaces the failing
//!   frequency index; no partial X/K/gamma arrays are ever exposed.
//! - De-embedding never raises a numerical error: it uses a pseudo-inverse
//!   of the error box instead of a strict inversion.

use thiserror::Error;

use crate::math::transforms::TransformError;

/// Errors raised by the calibration engine
#[derive(Error, Debug)]
pub enum CalError {
    /// Mismatched array lengths or otherwise invalid session inputs.
    #[error("contract violation in `{field}`: {message}")]
    ContractViolation {
        field: &'static str,
        message: String,
    },

    /// A numerical failure tied to one frequency point.
    #[error("numerical failure at frequency index {freq_index}: {message}")]
    NumericalFailure { freq_index: usize, message: String },

    /// De-embedding supports 1- and 2-port networks only.
    #[error("unsupported port count: {0} (expected 1 or 2)")]
    PortCount(usize),

    /// Calibration must run before results can be used.
    #[error("calibration has not been run yet")]
    NotCalibrated,
}

impl From<TransformError> for CalError {
    fn from(e: TransformError) -> Self {
        match e {
            TransformError::NotTwoPort(n) => CalError::PortCount(n),
            TransformError::SingularAtIndex(f) => CalError::NumericalFailure {
                freq_index: f,
                message: "singular S21 while forming cascading parameters".to_string(),
            },
        }
    }
}

/// Shorthand constructor for contract violations
pub(crate) fn contract(field: &'static str, message: impl Into<String>) -> CalError {
    CalError::ContractViolation {
        field,
        message: message.into(),
    }
}
