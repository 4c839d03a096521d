//! Multiline TRL calibration integration tests
//!
//! Exercises the full session flow: run a solver over the sweep, de-embed
//! 1- and 2-port networks, and apply the post-calibration transforms.
//! Solvers are mocked; their input/output contract is what the session
//! depends on.

use anyhow::{Context, Result};
use approx::assert_relative_eq;
use ndarray::{s, Array1, Array2, Array3};
use num_complex::Complex64;

use mtrl_core::calibration::{
    CalError, LineSolver, MultilineTrl, Side, SolverError, SolverInput, SolverOutput,
    SolverVariant, SwitchTerms,
};
use mtrl_core::frequency::{Frequency, FrequencyUnit};
use mtrl_core::network::{two_port_reflect, Network};

const ONE: Complex64 = Complex64::new(1.0, 0.0);
const ZERO: Complex64 = Complex64::new(0.0, 0.0);

// ============================================================================
// Fixtures
// ============================================================================

fn z0_2port() -> Array1<Complex64> {
    Array1::from_elem(2, Complex64::new(50.0, 0.0))
}

fn thru_like(freq: &Frequency) -> Network {
    let nfreq = freq.npoints();
    let mut s = Array3::<Complex64>::zeros((nfreq, 2, 2));
    for f in 0..nfreq {
        s[[f, 0, 1]] = Complex64::new(0.95, -0.1);
        s[[f, 1, 0]] = Complex64::new(0.95, -0.1);
    }
    Network::new(freq.clone(), s, z0_2port())
}

fn short_like(freq: &Frequency) -> Network {
    let nfreq = freq.npoints();
    let mut s = Array3::<Complex64>::zeros((nfreq, 2, 2));
    for f in 0..nfreq {
        s[[f, 0, 0]] = Complex64::new(-0.98, 0.02);
        s[[f, 1, 1]] = Complex64::new(-0.98, 0.02);
    }
    Network::new(freq.clone(), s, z0_2port())
}

fn dut_two_port(freq: &Frequency) -> Network {
    let nfreq = freq.npoints();
    let mut s = Array3::<Complex64>::zeros((nfreq, 2, 2));
    for f in 0..nfreq {
        let t = f as f64;
        s[[f, 0, 0]] = Complex64::new(0.15 + 0.01 * t, -0.08);
        s[[f, 0, 1]] = Complex64::new(0.7, 0.1 + 0.01 * t);
        s[[f, 1, 0]] = Complex64::new(0.68, 0.12);
        s[[f, 1, 1]] = Complex64::new(-0.2, 0.05 * t);
    }
    Network::new(freq.clone(), s, z0_2port())
}

fn dut_one_port(freq: &Frequency) -> Network {
    let nfreq = freq.npoints();
    let mut s = Array3::<Complex64>::zeros((nfreq, 1, 1));
    for f in 0..nfreq {
        s[[f, 0, 0]] = Complex64::new(0.4 - 0.02 * f as f64, 0.3);
    }
    Network::new(
        freq.clone(),
        s,
        Array1::from_elem(1, Complex64::new(50.0, 0.0)),
    )
}

fn session(freq: &Frequency, switch_terms: Option<SwitchTerms>) -> MultilineTrl {
    MultilineTrl::new(
        vec![thru_like(freq), thru_like(freq), thru_like(freq)],
        vec![0.0, 0.5e-3, 2.1e-3],
        vec![short_like(freq)],
        vec![Complex64::new(-1.0, 0.0)],
        vec![0.0],
        Complex64::new(2.2, -0.005),
        switch_terms,
    )
    .expect("valid session inputs")
}

/// A synthetic, well-conditioned error box for frequency index f
fn synthetic_x(f: usize) -> Array2<Complex64> {
    let t = f as f64;
    let mut x = Array2::<Complex64>::eye(4);
    x[[0, 0]] = Complex64::new(3.0 + 0.1 * t, 0.4);
    x[[1, 1]] = Complex64::new(2.5, -0.3 + 0.05 * t);
    x[[2, 2]] = Complex64::new(2.8, 0.2);
    x[[0, 1]] = Complex64::new(0.3, 0.1);
    x[[1, 2]] = Complex64::new(-0.2, 0.15);
    x[[2, 3]] = Complex64::new(0.1, -0.05 * t);
    x[[3, 2]] = Complex64::new(-0.12, 0.04);
    x[[1, 3]] = Complex64::new(0.08, 0.02 * t);
    x[[3, 1]] = Complex64::new(0.06, -0.03);
    x
}

// ============================================================================
// Mock solvers
// ============================================================================

/// Returns the identity error box at every frequency
struct IdentitySolver;

impl LineSolver for IdentitySolver {
    fn variant(&self) -> SolverVariant {
        SolverVariant::Classical
    }

    fn solve(&mut self, _input: &SolverInput<'_>) -> Result<SolverOutput, SolverError> {
        Ok(SolverOutput {
            x: Array2::eye(4),
            k: ONE,
            gamma: Complex64::new(1.5, 120.0),
            ereff: None,
            weight: None,
        })
    }
}

/// Returns a predetermined synthetic error box per frequency index
struct SyntheticSolver {
    index: usize,
}

impl LineSolver for SyntheticSolver {
    fn variant(&self) -> SolverVariant {
        SolverVariant::Classical
    }

    fn solve(&mut self, _input: &SolverInput<'_>) -> Result<SolverOutput, SolverError> {
        let f = self.index;
        self.index += 1;
        Ok(SolverOutput {
            x: synthetic_x(f),
            k: Complex64::new(1.2, 0.1 * f as f64),
            gamma: Complex64::new(2.0 + 0.2 * f as f64, 100.0 + 15.0 * f as f64),
            ereff: None,
            weight: None,
        })
    }
}

/// Fails at one configured frequency index
struct FailingSolver {
    index: usize,
    fail_at: usize,
}

impl LineSolver for FailingSolver {
    fn variant(&self) -> SolverVariant {
        SolverVariant::Classical
    }

    fn solve(&mut self, _input: &SolverInput<'_>) -> Result<SolverOutput, SolverError> {
        let f = self.index;
        self.index += 1;
        if f == self.fail_at {
            return Err(SolverError::NonConvergence(
                "eigenvector iteration stalled".to_string(),
            ));
        }
        Ok(SolverOutput {
            x: Array2::eye(4),
            k: ONE,
            gamma: Complex64::new(1.0, 100.0),
            ereff: None,
            weight: None,
        })
    }
}

/// Counts invocations; used to prove fail-fast never reaches the solver
struct CountingSolver {
    calls: usize,
}

impl LineSolver for CountingSolver {
    fn variant(&self) -> SolverVariant {
        SolverVariant::Classical
    }

    fn solve(&mut self, _input: &SolverInput<'_>) -> Result<SolverOutput, SolverError> {
        self.calls += 1;
        Ok(SolverOutput {
            x: Array2::eye(4),
            k: ONE,
            gamma: Complex64::new(1.0, 100.0),
            ereff: None,
            weight: None,
        })
    }
}

// ============================================================================
// Forward model: embed a true network through (X, K)
// ============================================================================

/// Inverse of the de-embedding equations: given the true S at one
/// frequency and the (renormalized) error box X with scale K, produce the
/// raw measured S.
fn embed_one_freq(
    s_true: &Array2<Complex64>,
    x: &Array2<Complex64>,
    k: Complex64,
) -> Array2<Complex64> {
    let s11 = s_true[[0, 0]];
    let s12 = s_true[[0, 1]];
    let s21 = s_true[[1, 0]];
    let s22 = s_true[[1, 1]];

    let vec_true = Array1::from(vec![-s11 * s22 + s12 * s21, -s22, s11, ONE]);
    let w = x.dot(&vec_true);
    let wn = &w / w[3];

    let s11m = wn[2];
    let s22m = -wn[1];
    let s21m = s21 / (k * w[3]);
    let s12m = (wn[0] + s11m * s22m) / s21m;

    let mut out = Array2::<Complex64>::zeros((2, 2));
    out[[0, 0]] = s11m;
    out[[0, 1]] = s12m;
    out[[1, 0]] = s21m;
    out[[1, 1]] = s22m;
    out
}

fn assert_networks_close(a: &Network, b: &Network, tol: f64) {
    assert_eq!(a.nports(), b.nports());
    assert_eq!(a.nfreq(), b.nfreq());
    for f in 0..a.nfreq() {
        for i in 0..a.nports() {
            for j in 0..a.nports() {
                assert_relative_eq!(
                    a.s[[f, i, j]].re,
                    b.s[[f, i, j]].re,
                    max_relative = tol,
                    epsilon = tol
                );
                assert_relative_eq!(
                    a.s[[f, i, j]].im,
                    b.s[[f, i, j]].im,
                    max_relative = tol,
                    epsilon = tol
                );
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[test]
fn test_identity_calibration_two_port() -> Result<()> {
    let freq = Frequency::new(1.0, 5.0, 5, FrequencyUnit::GHz);
    let mut cal = session(&freq, None);
    cal.run(&mut IdentitySolver)?;

    let dut = dut_two_port(&freq);
    let corrected = cal.apply_cal(&dut, Side::Left)?;
    assert_networks_close(&corrected, &dut, 1e-12);
    Ok(())
}

#[test]
fn test_identity_calibration_one_port() -> Result<()> {
    let freq = Frequency::new(1.0, 4.0, 4, FrequencyUnit::GHz);
    let mut cal = session(&freq, None);
    cal.run(&mut IdentitySolver)?;

    let dut = dut_one_port(&freq);
    let corrected = cal.apply_cal(&dut, Side::Left)?;
    assert_eq!(corrected.nports(), 1);
    assert_networks_close(&corrected, &dut, 1e-12);
    Ok(())
}

#[test]
fn test_left_right_consistency() -> Result<()> {
    let freq = Frequency::new(1.0, 3.0, 3, FrequencyUnit::GHz);
    let mut cal = session(&freq, None);
    cal.run(&mut SyntheticSolver { index: 0 })?;

    let dut = dut_one_port(&freq);
    let mirrored = two_port_reflect(&dut);

    let full = cal.apply_cal(&mirrored, Side::Left)?;
    let left = cal.apply_cal(&dut, Side::Left)?;
    let right = cal.apply_cal(&dut, Side::Right)?;

    for f in 0..freq.npoints() {
        assert_relative_eq!(left.s[[f, 0, 0]].re, full.s[[f, 0, 0]].re, epsilon = 1e-12);
        assert_relative_eq!(left.s[[f, 0, 0]].im, full.s[[f, 0, 0]].im, epsilon = 1e-12);
        assert_relative_eq!(right.s[[f, 0, 0]].re, full.s[[f, 1, 1]].re, epsilon = 1e-12);
        assert_relative_eq!(right.s[[f, 0, 0]].im, full.s[[f, 1, 1]].im, epsilon = 1e-12);
    }
    Ok(())
}

#[test]
fn test_embed_then_deembed_recovers_dut() -> Result<()> {
    let freq = Frequency::new(1.0, 4.0, 4, FrequencyUnit::GHz);
    let mut cal = session(&freq, None);
    cal.run(&mut SyntheticSolver { index: 0 })?;

    // Embed the true DUT through the session's own (renormalized) state,
    // then check apply_cal undoes it.
    let dut = dut_two_port(&freq);
    let state = cal.state().context("no calibration state")?;
    let mut meas_s = Array3::<Complex64>::zeros((freq.npoints(), 2, 2));
    for f in 0..freq.npoints() {
        let s_true = dut.s.slice(s![f, .., ..]).to_owned();
        let x = state.x.slice(s![f, .., ..]).to_owned();
        let raw = embed_one_freq(&s_true, &x, state.k[f]);
        meas_s.slice_mut(s![f, .., ..]).assign(&raw);
    }
    let meas = Network::new(freq.clone(), meas_s, z0_2port());

    let corrected = cal.apply_cal(&meas, Side::Left)?;
    assert_networks_close(&corrected, &dut, 1e-9);
    Ok(())
}

#[test]
fn test_plane_shift_round_trip_session() -> Result<()> {
    let freq = Frequency::new(1.0, 4.0, 4, FrequencyUnit::GHz);
    let mut cal = session(&freq, None);
    cal.run(&mut SyntheticSolver { index: 0 })?;

    let dut = dut_two_port(&freq);
    let before = cal.apply_cal(&dut, Side::Left)?;

    let d = 0.75e-3;
    cal.shift_plane(d)?;
    cal.shift_plane(-d)?;

    let after = cal.apply_cal(&dut, Side::Left)?;
    assert_networks_close(&after, &before, 1e-9);
    Ok(())
}

#[test]
fn test_plane_shift_changes_coefficients() -> Result<()> {
    let freq = Frequency::new(1.0, 3.0, 3, FrequencyUnit::GHz);
    let mut cal = session(&freq, None);
    cal.run(&mut SyntheticSolver { index: 0 })?;

    // EDF is invariant under a plane shift (the column-3 scaling cancels
    // in the renormalization); the source match is not.
    let esf_before = cal.coefficients().context("no coefficients")?.esf.clone();
    cal.shift_plane(1.0e-3)?;
    let esf_after = &cal.coefficients().context("no coefficients")?.esf;

    // Coefficients are re-derived from the shifted state.
    let moved = (0..freq.npoints())
        .any(|f| (esf_before[f] - esf_after[f]).norm() > 1e-12);
    assert!(moved);
    Ok(())
}

#[test]
fn test_impedance_renorm_noop() -> Result<()> {
    let freq = Frequency::new(1.0, 3.0, 3, FrequencyUnit::GHz);
    let mut cal = session(&freq, None);
    cal.run(&mut SyntheticSolver { index: 0 })?;

    let dut = dut_two_port(&freq);
    let before = cal.apply_cal(&dut, Side::Left)?;

    cal.renorm_impedance(50.0, 50.0)?;
    let after = cal.apply_cal(&dut, Side::Left)?;
    assert_networks_close(&after, &before, 1e-12);
    Ok(())
}

#[test]
fn test_impedance_renorm_round_trip() -> Result<()> {
    let freq = Frequency::new(1.0, 3.0, 3, FrequencyUnit::GHz);
    let mut cal = session(&freq, None);
    cal.run(&mut SyntheticSolver { index: 0 })?;

    let dut = dut_two_port(&freq);
    let before = cal.apply_cal(&dut, Side::Left)?;

    cal.renorm_impedance(75.0, 50.0)?;
    cal.renorm_impedance(50.0, 75.0)?;

    let after = cal.apply_cal(&dut, Side::Left)?;
    assert_networks_close(&after, &before, 1e-9);
    Ok(())
}

#[test]
fn test_impedance_array_length_mismatch_is_contract_violation() {
    let freq = Frequency::new(1.0, 3.0, 3, FrequencyUnit::GHz);
    let mut cal = session(&freq, None);
    cal.run(&mut IdentitySolver).unwrap();

    let z_new = vec![Complex64::new(75.0, 0.0); 2]; // sweep has 3 points
    let result = cal.renorm_impedance(z_new, 50.0);
    assert!(matches!(
        result,
        Err(CalError::ContractViolation { field: "z_new", .. })
    ));
}

#[test]
fn test_solver_failure_aborts_sweep_with_index() {
    let freq = Frequency::new(1.0, 5.0, 5, FrequencyUnit::GHz);
    let mut cal = session(&freq, None);

    let result = cal.run(&mut FailingSolver {
        index: 0,
        fail_at: 2,
    });
    match result {
        Err(CalError::NumericalFailure { freq_index, .. }) => assert_eq!(freq_index, 2),
        other => panic!("expected NumericalFailure at index 2, got {:?}", other.err()),
    }

    // Abort policy: no partial results are exposed.
    assert!(cal.state().is_none());
    assert!(cal.gamma().is_none());
    assert!(cal.coefficients().is_none());
}

#[test]
fn test_fail_fast_happens_before_any_solver_call() {
    let freq = Frequency::new(1.0, 3.0, 3, FrequencyUnit::GHz);
    let mut solver = CountingSolver { calls: 0 };

    let result = MultilineTrl::new(
        vec![thru_like(&freq), thru_like(&freq)],
        vec![0.0], // one length for two lines
        vec![short_like(&freq)],
        vec![Complex64::new(-1.0, 0.0)],
        vec![0.0],
        Complex64::new(1.0, 0.0),
        None,
    );

    assert!(matches!(
        result,
        Err(CalError::ContractViolation { field: "line_lengths", .. })
    ));
    assert_eq!(solver.calls, 0);
    // keep the mock exercised so the counter is meaningful
    let _ = solver.solve(&SolverInput {
        lines_t: vec![Array2::eye(2)],
        line_lengths: &[0.0],
        reflect_s: vec![Array2::from_elem((2, 2), ZERO)],
        guess: ONE,
        reflect_est: &[Complex64::new(-1.0, 0.0)],
        reflect_offset: &[0.0],
        freq: 1e9,
    });
    assert_eq!(solver.calls, 1);
}

#[test]
fn test_zero_switch_terms_match_unconfigured_session() -> Result<()> {
    let freq = Frequency::new(1.0, 3.0, 3, FrequencyUnit::GHz);

    let zero_term = Network::new(
        freq.clone(),
        Array3::<Complex64>::zeros((3, 1, 1)),
        Array1::from_elem(1, Complex64::new(50.0, 0.0)),
    );
    let terms = SwitchTerms::new(zero_term.clone(), zero_term)?;

    let mut with_terms = session(&freq, Some(terms));
    let mut without_terms = session(&freq, None);
    with_terms.run(&mut SyntheticSolver { index: 0 })?;
    without_terms.run(&mut SyntheticSolver { index: 0 })?;

    let dut = dut_two_port(&freq);
    let a = with_terms.apply_cal(&dut, Side::Left)?;
    let b = without_terms.apply_cal(&dut, Side::Left)?;
    assert_networks_close(&a, &b, 1e-12);
    Ok(())
}

#[test]
fn test_three_port_dut_is_rejected() {
    let freq = Frequency::new(1.0, 2.0, 2, FrequencyUnit::GHz);
    let mut cal = session(&freq, None);
    cal.run(&mut IdentitySolver).unwrap();

    let s = Array3::<Complex64>::zeros((2, 3, 3));
    let nw = Network::new(
        freq.clone(),
        s,
        Array1::from_elem(3, Complex64::new(50.0, 0.0)),
    );
    assert!(matches!(
        cal.apply_cal(&nw, Side::Left),
        Err(CalError::PortCount(3))
    ));
}
