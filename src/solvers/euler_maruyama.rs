// src/solvers/euler_maruyama.rs
//! Euler-Maruyama Scheme for SDE Integration
//!
//! # Mathematical Framework
//!
//! For a general SDE:
//! ```text
//! dX_t = a(X_t) dt + b(X_t) dW_t
//! ```
//!
//! The Euler-Maruyama scheme provides the discretization:
//! ```text
//! X_{n+1} = X_n + a(X_n) Δt + b(X_n) √Δt Z_n,   Z_n ~ N(0,1)
//! ```
//!
//! For GBM this is `S + r·S·Δt + σ·S·√Δt·Z`, which is what the LSMC engine
//! simulates. Every step is recorded on the tape, so the path ensemble is
//! differentiable with respect to spot, rate and volatility.
//!
//! # Convergence Properties
//!
//! - **Strong convergence**: Order 0.5 in step size
//! - **Weak convergence**: Order 1.0 in step size

use crate::aad::{ScalarVar, Tape, VectorVar};
use crate::error::{validation::*, LsmcError, LsmcResult};
use crate::models::model::SDEModel;
use crate::rng::NormalGenerator;
use ndarray::Array1;
use std::ops::RangeInclusive;

/// `K` equally spaced steps from 0 to maturity; grid points are indices `0..=K`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TimeGrid {
    maturity: f64,
    steps: usize,
}

impl TimeGrid {
    pub fn new(maturity: f64, steps: usize) -> LsmcResult<Self> {
        validate_positive("maturity", maturity)?;
        validate_finite("maturity", maturity)?;
        validate_steps(steps)?;
        Ok(TimeGrid { maturity, steps })
    }

    pub fn steps(&self) -> usize {
        self.steps
    }

    pub fn maturity(&self) -> f64 {
        self.maturity
    }

    pub fn dt(&self) -> f64 {
        self.maturity / self.steps as f64
    }

    /// Time of grid point `index`
    pub fn time(&self, index: usize) -> f64 {
        index as f64 * self.dt()
    }

    /// Grid indices at which the option may be exercised (all but t = 0).
    pub fn exercise_dates(&self) -> RangeInclusive<usize> {
        1..=self.steps
    }
}

/// Simulated asset prices, one vector of `n` paths per grid point.
#[derive(Clone, Debug)]
pub struct PathEnsemble {
    states: Vec<VectorVar>,
    paths: usize,
}

impl PathEnsemble {
    /// Price vector at grid index `index`
    pub fn at(&self, index: usize) -> VectorVar {
        self.states[index]
    }

    pub fn paths(&self) -> usize {
        self.paths
    }

    /// Number of grid points (steps + 1).
    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }
}

/// Euler-Maruyama numerical scheme for SDE integration
pub struct EulerMaruyama;

impl EulerMaruyama {
    /// Single vectorized step
    ///
    /// # Algorithm
    ///
    /// 1. Compute drift: a(X_n) * Δt
    /// 2. Compute diffusion: b(X_n) * √Δt * Z
    /// 3. Update: X_{n+1} = X_n + drift + diffusion
    pub fn step<M: SDEModel>(
        tape: &mut Tape,
        model: &M,
        s: VectorVar,
        dt: f64,
        normal_draws: Array1<f64>,
    ) -> VectorVar {
        let drift = model.drift(tape, s);
        let drift_term = tape.scale(drift, dt);
        let diffusion = model.diffusion(tape, s);
        let diffusion_term = tape.hadamard(diffusion, normal_draws * dt.sqrt());
        let moved = tape.add(s, drift_term);
        tape.add(moved, diffusion_term)
    }
}

/// Simulate `paths` trajectories forward over `grid`, starting from `spot`.
///
/// Step `i` (from grid point `i` to `i + 1`) consumes
/// `normals.standard_normals(i, paths)`.
pub fn simulate_paths<M: SDEModel, G: NormalGenerator + ?Sized>(
    tape: &mut Tape,
    model: &M,
    spot: ScalarVar,
    grid: &TimeGrid,
    paths: usize,
    normals: &mut G,
) -> LsmcResult<PathEnsemble> {
    validate_paths(paths)?;
    let dt = grid.dt();

    let ones = tape.constant_vector(Array1::ones(paths));
    let mut states = Vec::with_capacity(grid.steps() + 1);
    states.push(tape.mul_scalar(ones, spot));

    for i in 0..grid.steps() {
        let z = normals.standard_normals(i, paths);
        if z.len() != paths {
            return Err(LsmcError::InvalidConfiguration {
                field: "normals".to_string(),
                reason: format!("generator returned {} draws, expected {}", z.len(), paths),
            });
        }
        let next = EulerMaruyama::step(tape, model, states[i], dt, z);
        states.push(next);
    }

    Ok(PathEnsemble { states, paths })
}
