//! Regression basis for the continuation value.
//!
//! The state at each exercise date is mapped affinely onto `[-1, 1]` using its
//! empirical min/max, then expanded in Chebyshev polynomials of the first kind:
//! ```text
//! T₀(x) = 1,  T₁(x) = x,  Tₖ(x) = 2x·Tₖ₋₁(x) − Tₖ₋₂(x)
//! ```
//! Both steps are recorded on the tape with their own adjoint rules, so the
//! basis stays differentiable in the underlying prices (including through the
//! min/max used for scaling).

use crate::aad::{AdjointRule, MatrixVar, Tape, TapeVar, Tensor, VectorVar};
use crate::error::{LsmcError, LsmcResult};
use ndarray::{Array1, Array2, Zip};

/// Result of mapping a vector onto `[-1, 1]`.
#[derive(Clone, Debug, PartialEq)]
pub struct UnitScaling {
    pub scaled: Array1<f64>,
    pub argmin: usize,
    pub argmax: usize,
}

/// Map `values` affinely so that min → -1 and max → 1.
///
/// Fails when the range is zero (or vanishing relative to the values), which
/// is always the case for a single path or a constant state.
pub fn scale_to_unit_interval(values: &Array1<f64>) -> LsmcResult<UnitScaling> {
    if values.is_empty() {
        return Err(LsmcError::numerical("scaling", "empty state vector"));
    }

    let (mut argmin, mut argmax) = (0, 0);
    for (i, &v) in values.iter().enumerate() {
        if !v.is_finite() {
            return Err(LsmcError::numerical(
                "scaling",
                format!("non-finite state value {} at path {}", v, i),
            ));
        }
        if v < values[argmin] {
            argmin = i;
        }
        if v > values[argmax] {
            argmax = i;
        }
    }

    let (lo, hi) = (values[argmin], values[argmax]);
    let range = hi - lo;
    if !(range > f64::EPSILON * lo.abs().max(hi.abs())) {
        return Err(LsmcError::numerical(
            "scaling",
            format!("state vector has zero range (min = max = {})", lo),
        ));
    }

    let scaled = values.mapv(|v| 2.0 * (v - lo) / range - 1.0);
    Ok(UnitScaling {
        scaled,
        argmin,
        argmax,
    })
}

/// Chebyshev design matrix: column `j` holds `T_j(x)` for `j = 0..order`.
pub fn chebyshev_matrix(x: &Array1<f64>, order: usize) -> Array2<f64> {
    let mut basis = Array2::<f64>::zeros((x.len(), order));
    Zip::from(basis.rows_mut())
        .and(x)
        .par_for_each(|mut row, &xi| {
            for k in 0..order {
                let value = match k {
                    0 => 1.0,
                    1 => xi,
                    _ => 2.0 * xi * row[k - 1] - row[k - 2],
                };
                row[k] = value;
            }
        });
    basis
}

/// Recorded version of [`scale_to_unit_interval`].
pub fn scale_to_unit(tape: &mut Tape, s: VectorVar) -> LsmcResult<VectorVar> {
    let UnitScaling {
        scaled,
        argmin,
        argmax,
    } = scale_to_unit_interval(tape.vector(s))?;

    Ok(tape.record(
        Tensor::Vector(scaled),
        vec![s.node()],
        Box::new(UnitScalingAdjoint { argmin, argmax }),
    ))
}

/// Recorded version of [`chebyshev_matrix`].
pub fn chebyshev_basis(tape: &mut Tape, x: VectorVar, order: usize) -> MatrixVar {
    let basis = chebyshev_matrix(tape.vector(x), order);
    tape.record(
        Tensor::Matrix(basis),
        vec![x.node()],
        Box::new(ChebyshevAdjoint),
    )
}

/// x_i = 2(s_i − a)/(b − a) − 1 with a = s[argmin], b = s[argmax]
#[derive(Debug)]
struct UnitScalingAdjoint {
    argmin: usize,
    argmax: usize,
}

impl AdjointRule for UnitScalingAdjoint {
    fn backward(
        &self,
        parents: &[&Tensor],
        _output: &Tensor,
        adjoint: &Tensor,
        needs_grad: &[bool],
    ) -> Vec<Option<Tensor>> {
        let (true, Some(s), Some(g)) = (needs_grad[0], parents[0].as_vector(), adjoint.as_vector())
        else {
            return vec![None];
        };

        let (lo, hi) = (s[self.argmin], s[self.argmax]);
        let range = hi - lo;
        let range_sq = range * range;

        let mut s_bar = g * (2.0 / range);
        let (mut d_lo, mut d_hi) = (0.0, 0.0);
        for (&gi, &si) in g.iter().zip(s.iter()) {
            d_lo += gi * 2.0 * (si - hi) / range_sq;
            d_hi -= gi * 2.0 * (si - lo) / range_sq;
        }
        s_bar[self.argmin] += d_lo;
        s_bar[self.argmax] += d_hi;

        vec![Some(Tensor::Vector(s_bar))]
    }
}

/// dT_k/dx via T'_k = 2T_{k-1} + 2x·T'_{k-1} − T'_{k-2}
#[derive(Debug)]
struct ChebyshevAdjoint;

impl AdjointRule for ChebyshevAdjoint {
    fn backward(
        &self,
        parents: &[&Tensor],
        output: &Tensor,
        adjoint: &Tensor,
        needs_grad: &[bool],
    ) -> Vec<Option<Tensor>> {
        let (true, Some(x), Some(basis), Some(g)) = (
            needs_grad[0],
            parents[0].as_vector(),
            output.as_matrix(),
            adjoint.as_matrix(),
        ) else {
            return vec![None];
        };

        let order = basis.ncols();
        let x_bar = Zip::from(x)
            .and(basis.rows())
            .and(g.rows())
            .par_map_collect(|&xi, t, gi| {
                let (mut d_prev2, mut d_prev) = (0.0, 0.0);
                let mut acc = 0.0;
                for k in 0..order {
                    let d = match k {
                        0 => 0.0,
                        1 => 1.0,
                        _ => 2.0 * t[k - 1] + 2.0 * xi * d_prev - d_prev2,
                    };
                    acc += gi[k] * d;
                    d_prev2 = d_prev;
                    d_prev = d;
                }
                acc
            });

        vec![Some(Tensor::Vector(x_bar))]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::array;

    #[test]
    fn test_chebyshev_recurrence_on_fixed_points() {
        let x = array![-1.0, 0.0, 1.0];
        let basis = chebyshev_matrix(&x, 5);

        assert_eq!(basis.column(0), array![1.0, 1.0, 1.0]);
        assert_eq!(basis.column(1), x);
        for j in 2..5 {
            for i in 0..3 {
                let expected = 2.0 * x[i] * basis[[i, j - 1]] - basis[[i, j - 2]];
                assert_relative_eq!(basis[[i, j]], expected);
            }
        }
        // T_j(1) = 1, T_j(-1) = (-1)^j, T_j(0) = cos(jπ/2)
        assert_eq!(basis.row(2), array![1.0, 1.0, 1.0, 1.0, 1.0]);
        assert_eq!(basis.row(0), array![1.0, -1.0, 1.0, -1.0, 1.0]);
        assert_eq!(basis.row(1), array![1.0, 0.0, -1.0, 0.0, 1.0]);
    }

    #[test]
    fn test_chebyshev_matches_cosine_form() {
        let x = array![-0.9, -0.3, 0.2, 0.75];
        let basis = chebyshev_matrix(&x, 8);
        for (i, &xi) in x.iter().enumerate() {
            for j in 0..8 {
                assert_relative_eq!(
                    basis[[i, j]],
                    (j as f64 * xi.acos()).cos(),
                    epsilon = 1e-12
                );
            }
        }
    }

    #[test]
    fn test_scaling_hits_unit_bounds() {
        let s = array![36.0, 31.5, 44.2, 38.0];
        let scaling = scale_to_unit_interval(&s).unwrap();
        assert_eq!(scaling.argmin, 1);
        assert_eq!(scaling.argmax, 2);
        assert_eq!(scaling.scaled[1], -1.0);
        assert_eq!(scaling.scaled[2], 1.0);
    }

    #[test]
    fn test_constant_state_is_rejected() {
        let err = scale_to_unit_interval(&array![36.0, 36.0, 36.0]).unwrap_err();
        assert!(err.is_numerical());
        assert!(scale_to_unit_interval(&array![36.0]).is_err());
    }

    #[test]
    fn test_basis_adjoint_matches_finite_differences() {
        let s0 = array![35.0, 31.0, 42.5, 38.25, 33.0];
        let w = array![
            [0.1, -0.4, 0.3, 0.2],
            [0.5, 0.2, -0.1, 0.7],
            [-0.3, 0.6, 0.4, -0.2],
            [0.2, 0.1, -0.5, 0.3],
            [0.4, -0.2, 0.2, 0.1]
        ];

        let value = |s: &Array1<f64>| -> f64 {
            let x = scale_to_unit_interval(s).unwrap().scaled;
            (chebyshev_matrix(&x, 4) * &w).sum()
        };

        let mut tape = Tape::new();
        let s = tape.input_vector(s0.clone());
        let x = scale_to_unit(&mut tape, s).unwrap();
        let basis = chebyshev_basis(&mut tape, x, 4);
        let weights = tape.constant_matrix(w.clone());
        let weighted = tape.mul(basis, weights);
        let total = sum_matrix(&mut tape, weighted);
        let grads = tape.gradient(total);
        assert_relative_eq!(tape.value(total), value(&s0), epsilon = 1e-12);

        let gs = grads.wrt_vector(s).cloned().unwrap();
        let h = 1e-6;
        for i in 0..s0.len() {
            let mut up = s0.clone();
            let mut down = s0.clone();
            up[i] += h;
            down[i] -= h;
            let fd = (value(&up) - value(&down)) / (2.0 * h);
            assert_relative_eq!(gs[i], fd, epsilon = 1e-5);
        }
    }

    fn sum_matrix(tape: &mut Tape, m: MatrixVar) -> crate::aad::ScalarVar {
        #[derive(Debug)]
        struct SumAdjoint;
        impl AdjointRule for SumAdjoint {
            fn backward(
                &self,
                parents: &[&Tensor],
                _output: &Tensor,
                adjoint: &Tensor,
                _needs_grad: &[bool],
            ) -> Vec<Option<Tensor>> {
                let dim = parents[0].as_matrix().unwrap().raw_dim();
                let g = adjoint.as_scalar().unwrap();
                vec![Some(Tensor::Matrix(Array2::from_elem(dim, g)))]
            }
        }
        let total = tape.matrix(m).sum();
        tape.record(Tensor::Scalar(total), vec![m.node()], Box::new(SumAdjoint))
    }
}
