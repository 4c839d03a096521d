//! Multiline TRL (Thru-Reflect-Line) calibration
//!
//! Derives per-frequency systematic error-box models from measured
//! transmission-line standards plus a reflect standard, applies them to
//! de-embed DUT measurements, and offers post-calibration transforms
//! (reference-plane shift, impedance renormalization).
//!
//! # References
//!
//! - R. B. Marks, "A multiline method of network analyzer calibration",
//!   IEEE Trans. Microwave Theory Tech., vol. 39, no. 7, 1991
//! - Z. Hatab, M. Gadringer, W. Boesch, "Improving the Reliability of the
//!   Multiline TRL Calibration Algorithm", 98th ARFTG Conference, 2022

mod coefficients;
mod deembed;
mod error;
mod mtrl;
mod solver;
mod state;
mod switch_terms;

pub use coefficients::ErrorCoefficients;
pub use deembed::Side;
pub use error::CalError;
pub use mtrl::MultilineTrl;
pub use solver::{LineSolver, SolverError, SolverInput, SolverOutput, SolverVariant};
pub use state::{ErrorBoxState, Impedance};
pub use switch_terms::{correct_switch_terms, SwitchTerms};
