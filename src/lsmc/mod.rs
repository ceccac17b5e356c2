//! Least-squares Monte Carlo: basis, regression, backward induction and
//! first-exercise selection.

pub mod basis;
pub mod induction;
pub mod regression;
pub mod selector;

pub use basis::{chebyshev_basis, chebyshev_matrix, scale_to_unit, scale_to_unit_interval};
pub use induction::{BackwardInduction, InductionOutput, PayoffMatrix};
pub use regression::RidgeRegressor;
pub use selector::{first_exercise, select_first_exercise};
