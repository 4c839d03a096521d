//! mtrl-core: multiline TRL calibration engine for VNA measurements
//!
//! Implements the multiline Thru-Reflect-Line (mTRL) calibration flow:
//! switch-term correction, per-frequency error-box extraction (via a
//! pluggable solver), de-embedding of DUT measurements, and
//! post-calibration transforms (reference-plane shift, impedance
//! renormalization).
//!
//! ## Modules
//!
//! - `frequency` - Frequency sweep representation
//! - `network` - N-port network (S-parameter) representation
//! - `math` - Linear algebra and S/T parameter transforms
//! - `calibration` - The mTRL calibration session and transforms

pub mod calibration;
pub mod constants;
pub mod frequency;
pub mod math;
pub mod network;

pub use calibration::{CalError, MultilineTrl, Side, SolverVariant};
pub use frequency::Frequency;
pub use network::Network;
