//! First-exercise selection.
//!
//! A path is paid at the first date whose candidate payoff is strictly
//! positive and nothing afterwards. The "not yet exercised" indicator is
//! carried forward in time and starts at one for every path:
//! ```text
//! w_c     = alive_c · 1[P_c > 0]
//! R_c     = w_c · P_c
//! alive_c+1 = alive_c · (1 − 1[P_c > 0])
//! ```
//! The weights are decision constants, so gradients flow through `P_c` only.

use crate::aad::{Tape, VectorVar};
use ndarray::{Array1, Array2, Zip};

/// Weights selecting the entries of `column` that are the first positive
/// payoff on their path. Updates `alive` in place.
fn first_exercise_weights(alive: &mut Array1<f64>, column: &Array1<f64>) -> Array1<f64> {
    let mut weights = Array1::zeros(column.len());
    Zip::from(&mut weights)
        .and(alive)
        .and(column)
        .for_each(|w, a, &p| {
            let positive = if p > 0.0 { 1.0 } else { 0.0 };
            *w = *a * positive;
            *a *= 1.0 - positive;
        });
    weights
}

/// Realized payoff columns on the tape, one per exercise date.
pub fn select_first_exercise(tape: &mut Tape, columns: &[VectorVar]) -> Vec<VectorVar> {
    let Some(first) = columns.first() else {
        return Vec::new();
    };
    let mut alive = Array1::ones(tape.vector(*first).len());

    columns
        .iter()
        .map(|&column| {
            let weights = first_exercise_weights(&mut alive, tape.vector(column));
            tape.hadamard(column, weights)
        })
        .collect()
}

/// Plain-value version over an n×K matrix (rows are paths, columns dates).
pub fn first_exercise(payoffs: &Array2<f64>) -> Array2<f64> {
    let mut alive = Array1::ones(payoffs.nrows());
    let mut realized = Array2::<f64>::zeros(payoffs.raw_dim());
    for (column, mut out) in payoffs.columns().into_iter().zip(realized.columns_mut()) {
        let column = column.to_owned();
        let weights = first_exercise_weights(&mut alive, &column);
        out.assign(&(&column * &weights));
    }
    realized
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_keeps_only_first_positive_entry() {
        let payoffs = array![[0.0, 2.0, 3.0], [1.5, 0.0, 4.0], [0.0, 0.0, 0.0]];
        assert_eq!(
            first_exercise(&payoffs),
            array![[0.0, 2.0, 0.0], [1.5, 0.0, 0.0], [0.0, 0.0, 0.0]]
        );
    }

    #[test]
    fn test_tape_selection_routes_gradient_to_first_exercise() {
        let mut tape = Tape::new();
        let a = tape.input_vector(array![0.0, 1.0]);
        let b = tape.input_vector(array![2.0, 5.0]);
        let realized = select_first_exercise(&mut tape, &[a, b]);

        assert_eq!(tape.vector(realized[0]), &array![0.0, 1.0]);
        assert_eq!(tape.vector(realized[1]), &array![2.0, 0.0]);

        let sa = tape.sum(realized[0]);
        let sb = tape.sum(realized[1]);
        let total = tape.add(sa, sb);
        let grads = tape.gradient(total);
        assert_eq!(grads.wrt_vector(a).unwrap(), &array![0.0, 1.0]);
        assert_eq!(grads.wrt_vector(b).unwrap(), &array![1.0, 0.0]);
    }

    #[test]
    fn test_no_columns_means_no_payoff() {
        let mut tape = Tape::new();
        assert!(select_first_exercise(&mut tape, &[]).is_empty());
    }
}
