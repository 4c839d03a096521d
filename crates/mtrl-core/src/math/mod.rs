//! Mathematical support for the calibration engine
//!
//! - `linalg` - nalgebra-backed matrix inversion and pseudo-inversion
//! - `transforms` - S-parameter <-> cascading (T) parameter conversion

pub mod linalg;
pub mod transforms;
