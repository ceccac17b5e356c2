//! # fast-lsmc: Bermudan Put Pricing by Least-Squares Monte Carlo
//!
//! Prices a Bermudan put with the Longstaff–Schwartz algorithm and computes
//! its greeks by reverse-mode algorithmic differentiation through the whole
//! run: path simulation, basis construction, ridge regression, backward
//! induction, first-exercise selection and discounting.
//!
//! ## Key Features
//!
//! - **Chebyshev basis**: per-date min/max scaling onto `[-1, 1]`
//! - **Ridge regression**: `(XᵀX + λI)β = XᵀY` stays solvable on collinear bases
//! - **Exact greeks**: delta, vega, strike sensitivity and rho from one reverse sweep
//! - **Deterministic draws**: normals depend only on `(seed, step, paths)`
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use fast_lsmc::mc::mc_engine::{price_and_greeks_with, LsmcConfig};
//! use fast_lsmc::models::ModelParameters;
//!
//! let params = ModelParameters::new(36.0, 0.2, 40.0, 0.06);
//! let config = LsmcConfig {
//!     paths: 100_000,
//!     steps: 10,
//!     ..Default::default()
//! };
//!
//! let result = price_and_greeks_with(&params, &config).expect("Valid configuration");
//! println!("Price: {:.4} ± {:.4}", result.price, result.std_error);
//! if let Some(greeks) = result.greeks {
//!     println!("Delta: {:.4}  Vega: {:.4}", greeks.delta, greeks.vega);
//! }
//! ```

pub mod aad;
pub mod analytics;
pub mod error;
pub mod lsmc;
pub mod math_utils;
pub mod mc;
pub mod models;
pub mod rng;
pub mod solvers;

// Re-export commonly used types for convenience
pub use error::{LsmcError, LsmcResult};
pub use mc::mc_engine::{
    price_and_greeks, price_and_greeks_with, price_only, ExerciseBoundaryPoint, Greeks,
    LsmcConfig, PricingResult,
};
pub use models::{ModelParameters, Tracked};
