//! Differentiable ridge least-squares solve.
//!
//! # Mathematical Framework
//!
//! For a design matrix `X` (n×M), targets `y` (n) and penalty `λ ≥ 0`:
//! ```text
//! A = XᵀX + λI,   b = Xᵀy,   β = A⁻¹b,   f = Xβ
//! ```
//! `A` is symmetric positive definite whenever `λ > 0`, so it is factored with
//! Cholesky. The factor is kept on the tape for the reverse sweep.
//!
//! # Adjoint
//!
//! Given `ḡ = ∂L/∂f`:
//! ```text
//! β̄ = Xᵀḡ,   b̄ = A⁻¹β̄,   u = X b̄
//! ȳ = u
//! X̄ = (ḡ − u) βᵀ + (y − f) b̄ᵀ
//! ```

use crate::aad::tape::{AdjointRule, MatrixVar, Tape, TapeVar, Tensor, VectorVar};
use crate::error::{LsmcError, LsmcResult};
use nalgebra::{Cholesky, DMatrix, DVector, Dynamic};
use ndarray::{Array1, Array2, Zip};

const STAGE: &str = "ridge regression";
const PIVOT_TOLERANCE: f64 = 1e-10;

/// Solve `(XᵀX + λI) β = Xᵀy`.
///
/// Returns the coefficients and the Cholesky factor of the regularized matrix.
pub fn ridge_solve(
    x: &Array2<f64>,
    y: &Array1<f64>,
    lambda: f64,
) -> LsmcResult<(Array1<f64>, Cholesky<f64, Dynamic>)> {
    if x.nrows() != y.len() {
        return Err(LsmcError::numerical(
            STAGE,
            format!("design has {} rows but target has {} entries", x.nrows(), y.len()),
        ));
    }
    if !x.iter().chain(y.iter()).all(|v| v.is_finite()) {
        return Err(LsmcError::numerical(STAGE, "non-finite regression input"));
    }

    let m = x.ncols();
    let mut xtx = x.t().dot(x);
    xtx.diag_mut().iter_mut().for_each(|d| *d += lambda);
    let xty = x.t().dot(y);

    let a = DMatrix::from_fn(m, m, |i, j| xtx[[i, j]]);
    let b = DVector::from_iterator(m, xty.iter().copied());

    let factor = Cholesky::new(a).ok_or_else(|| {
        LsmcError::numerical(
            STAGE,
            format!(
                "regularized normal matrix (λ = {}) is singular or not positive definite",
                lambda
            ),
        )
    })?;

    // Pivots that vanish relative to the largest one mean A is numerically singular.
    let pivots = factor.l_dirty().diagonal();
    let largest = pivots.iter().fold(0.0_f64, |acc, p| acc.max(p.abs()));
    if !pivots.iter().all(|p| p.is_finite() && *p > PIVOT_TOLERANCE * largest) {
        return Err(LsmcError::numerical(
            STAGE,
            format!("regularized normal matrix (λ = {}) is numerically singular", lambda),
        ));
    }

    let beta = factor.solve(&b);
    if !beta.iter().all(|v| v.is_finite()) {
        return Err(LsmcError::numerical(STAGE, "non-finite regression coefficients"));
    }

    Ok((beta.iter().copied().collect(), factor))
}

/// Fitted values `X β` of a ridge regression, recorded on the tape.
pub fn ridge_fit(
    tape: &mut Tape,
    design: MatrixVar,
    target: VectorVar,
    lambda: f64,
) -> LsmcResult<VectorVar> {
    let x = tape.matrix(design);
    let (beta, factor) = ridge_solve(x, tape.vector(target), lambda)?;
    let fitted = x.dot(&beta);

    Ok(tape.record(
        Tensor::Vector(fitted),
        vec![design.node(), target.node()],
        Box::new(RidgeFitAdjoint { beta, factor }),
    ))
}

#[derive(Debug)]
struct RidgeFitAdjoint {
    beta: Array1<f64>,
    factor: Cholesky<f64, Dynamic>,
}

impl AdjointRule for RidgeFitAdjoint {
    fn backward(
        &self,
        parents: &[&Tensor],
        output: &Tensor,
        adjoint: &Tensor,
        needs_grad: &[bool],
    ) -> Vec<Option<Tensor>> {
        let (Some(x), Some(y), Some(fitted), Some(g)) = (
            parents[0].as_matrix(),
            parents[1].as_vector(),
            output.as_vector(),
            adjoint.as_vector(),
        ) else {
            return vec![None, None];
        };

        let beta_bar = x.t().dot(g);
        let b_bar: Array1<f64> = self
            .factor
            .solve(&DVector::from_iterator(beta_bar.len(), beta_bar.iter().copied()))
            .iter()
            .copied()
            .collect();
        let u = x.dot(&b_bar);

        let x_bar = needs_grad[0].then(|| {
            let lhs = g - &u;
            let rhs = y - fitted;
            let mut x_bar = Array2::<f64>::zeros(x.raw_dim());
            Zip::from(x_bar.rows_mut())
                .and(&lhs)
                .and(&rhs)
                .par_for_each(|mut row, &l, &r| {
                    for ((out, &beta), &bb) in row.iter_mut().zip(self.beta.iter()).zip(b_bar.iter()) {
                        *out = l * beta + r * bb;
                    }
                });
            Tensor::Matrix(x_bar)
        });
        let y_bar = needs_grad[1].then(|| Tensor::Vector(u));

        vec![x_bar, y_bar]
    }
}
