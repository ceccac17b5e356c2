//! Ridge regression of discounted future values on the state basis.

use crate::aad::{ridge_fit, MatrixVar, Tape, VectorVar};
use crate::error::{validation::validate_ridge_lambda, LsmcResult};
use tracing::warn;

/// Continuation-value estimator `X (XᵀX + λI)⁻¹ Xᵀ Y`
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RidgeRegressor {
    lambda: f64,
}

impl RidgeRegressor {
    pub fn new(lambda: f64) -> LsmcResult<Self> {
        validate_ridge_lambda(lambda)?;
        if lambda == 0.0 {
            warn!("ridge_lambda = 0: normal equations are unregularized and may be singular");
        }
        Ok(RidgeRegressor { lambda })
    }

    /// Fitted values for `target` regressed on `design`.
    pub fn fit(&self, tape: &mut Tape, design: MatrixVar, target: VectorVar) -> LsmcResult<VectorVar> {
        ridge_fit(tape, design, target, self.lambda)
    }
}
