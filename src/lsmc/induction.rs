//! Backward induction over the exercise dates.
//!
//! # Algorithm (Longstaff–Schwartz)
//!
//! With `D = e^{-rΔt}` and exercise dates `1..=K`:
//! ```text
//! C_K = 0,  V_K = D · cash_K
//! for t = K-1 down to 1:
//!     C_t = ridge_fit(chebyshev(scale(S_t)), V_{t+1})
//!     V_t = D · where(cash_t > C_t, cash_t, V_{t+1})
//! ```
//! Exercise happens only when the payoff strictly exceeds the continuation
//! estimate; ties continue. Once the pass is done, every date gets a payoff
//! candidate `where(cash_t > C_t, cash_t, 0)`.

use crate::aad::{ScalarVar, Tape, VectorVar};
use crate::error::LsmcResult;
use crate::lsmc::basis::{chebyshev_basis, scale_to_unit};
use crate::lsmc::regression::RidgeRegressor;
use crate::mc::payoffs::CashflowTable;
use crate::solvers::{PathEnsemble, TimeGrid};
use ndarray::{Array1, Zip};
use tracing::debug;

/// Per-path vectors for each exercise date `1..=K`, in time order.
#[derive(Clone, Debug)]
pub struct DateTable {
    entries: Vec<VectorVar>,
}

impl DateTable {
    fn from_backward(mut entries: Vec<VectorVar>) -> Self {
        entries.reverse();
        DateTable { entries }
    }

    /// Entry for grid index `date`; `None` for date 0 and beyond the last date.
    pub fn at(&self, date: usize) -> Option<VectorVar> {
        date.checked_sub(1)
            .and_then(|i| self.entries.get(i))
            .copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = VectorVar> + '_ {
        self.entries.iter().copied()
    }
}

/// n×K matrix of candidate exercise payoffs, one column per exercise date.
///
/// Column `c` corresponds to grid index `c + 1`.
#[derive(Clone, Debug)]
pub struct PayoffMatrix {
    pub columns: Vec<VectorVar>,
    pub exercise: Vec<Array1<bool>>,
}

impl PayoffMatrix {
    pub fn dates(&self) -> usize {
        self.columns.len()
    }

    pub fn date_of_column(column: usize) -> usize {
        column + 1
    }
}

/// Everything the backward pass produced.
#[derive(Clone, Debug)]
pub struct InductionOutput {
    pub continuation: DateTable,
    pub values: DateTable,
    pub payoffs: PayoffMatrix,
}

pub struct BackwardInduction {
    pub grid: TimeGrid,
    pub regressor: RidgeRegressor,
    pub poly_order: usize,
}

impl BackwardInduction {
    pub fn new(grid: TimeGrid, regressor: RidgeRegressor, poly_order: usize) -> Self {
        BackwardInduction {
            grid,
            regressor,
            poly_order,
        }
    }

    /// Run the backward pass; any failure aborts with the offending date attached.
    pub fn run(
        &self,
        tape: &mut Tape,
        ensemble: &PathEnsemble,
        cashflows: &CashflowTable,
        rate: ScalarVar,
    ) -> LsmcResult<InductionOutput> {
        let last = self.grid.steps();
        let paths = ensemble.paths();

        let neg_r_dt = tape.scale(rate, -self.grid.dt());
        let discount = tape.exp(neg_r_dt);
        let zeros = tape.constant_vector(Array1::zeros(paths));

        let mut continuation = Vec::with_capacity(last);
        let mut values = Vec::with_capacity(last);
        let mut exercise = Vec::with_capacity(last);

        continuation.push(zeros);
        values.push(tape.mul_scalar(cashflows.at(last), discount));
        exercise.push(strictly_greater(tape.vector(cashflows.at(last)), tape.vector(zeros)));

        for date in (1..last).rev() {
            let next_value = values[values.len() - 1];
            let cash = cashflows.at(date);

            let scaled = scale_to_unit(tape, ensemble.at(date)).map_err(|e| e.at_step(date))?;
            let basis = chebyshev_basis(tape, scaled, self.poly_order);
            let cont = self
                .regressor
                .fit(tape, basis, next_value)
                .map_err(|e| e.at_step(date))?;

            let mask = strictly_greater(tape.vector(cash), tape.vector(cont));
            debug!(
                date,
                exercised = mask.iter().filter(|&&m| m).count(),
                "backward induction step"
            );

            let chosen = tape.select(mask.clone(), cash, next_value);
            values.push(tape.mul_scalar(chosen, discount));
            continuation.push(cont);
            exercise.push(mask);
        }

        exercise.reverse();
        let continuation = DateTable::from_backward(continuation);
        let values = DateTable::from_backward(values);

        let columns = exercise
            .iter()
            .enumerate()
            .map(|(column, mask)| {
                let cash = cashflows.at(PayoffMatrix::date_of_column(column));
                tape.select(mask.clone(), cash, zeros)
            })
            .collect();

        Ok(InductionOutput {
            continuation,
            values,
            payoffs: PayoffMatrix { columns, exercise },
        })
    }
}

/// Exercise decision `a > b`; ties continue.
pub fn strictly_greater(a: &Array1<f64>, b: &Array1<f64>) -> Array1<bool> {
    Zip::from(a).and(b).map_collect(|&x, &y| x > y)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mc::payoffs::PutPayoff;
    use crate::models::{Gbm, ModelParameters};
    use crate::rng::SeededNormals;
    use crate::solvers::simulate_paths;
    use ndarray::array;

    fn run_small(paths: usize, steps: usize) -> (Tape, LsmcResult<InductionOutput>, CashflowTable) {
        let params = ModelParameters::new(36.0, 0.2, 40.0, 0.06);
        let grid = TimeGrid::new(1.0, steps).unwrap();
        let mut tape = Tape::new();
        let vars = params.register(&mut tape);
        let ensemble = simulate_paths(
            &mut tape,
            &Gbm::from_parameters(&vars),
            vars.spot,
            &grid,
            paths,
            &mut SeededNormals::new(11),
        )
        .unwrap();
        let cash = PutPayoff::new(vars.strike).cashflow_table(&mut tape, &ensemble);
        let engine = BackwardInduction::new(grid, RidgeRegressor::new(1.0).unwrap(), 4);
        let out = engine.run(&mut tape, &ensemble, &cash, vars.rate);
        (tape, out, cash)
    }

    #[test]
    fn test_ties_continue() {
        assert_eq!(
            strictly_greater(&array![1.0, 2.0, 0.0], &array![1.0, 1.0, 0.0]),
            array![false, true, false]
        );
    }

    #[test]
    fn test_terminal_state_and_payoff_columns() {
        let (tape, out, cash) = run_small(500, 5);
        let out = out.unwrap();

        assert_eq!(out.payoffs.dates(), 5);
        assert_eq!(out.values.len(), 5);
        assert!(tape.vector(out.continuation.at(5).unwrap()).iter().all(|&c| c == 0.0));

        let df = (-0.06_f64 * 0.2).exp();
        for (v, c) in tape.vector(out.values.at(5).unwrap()).iter().zip(tape.vector(cash.at(5))) {
            assert!((v - df * c).abs() < 1e-12);
        }

        for column in 0..5 {
            let date = PayoffMatrix::date_of_column(column);
            let payoff = tape.vector(out.payoffs.columns[column]);
            let cont = tape.vector(out.continuation.at(date).unwrap());
            let cashflow = tape.vector(cash.at(date));
            for i in 0..500 {
                let expected = if cashflow[i] > cont[i] { cashflow[i] } else { 0.0 };
                assert_eq!(payoff[i], expected);
                assert!(payoff[i] >= 0.0);
            }
        }
    }

    #[test]
    fn test_date_table_is_one_based() {
        let (_, out, _) = run_small(200, 3);
        let out = out.unwrap();
        assert!(out.values.at(0).is_none());
        assert!(out.values.at(4).is_none());
        assert!(out.values.at(1).is_some());
        assert_eq!(out.values.at(3), out.values.iter().last());
    }

    #[test]
    fn test_single_path_fails_at_first_regression_date() {
        let (_, out, _) = run_small(1, 4);
        match out.unwrap_err() {
            crate::error::LsmcError::Numerical { stage, step, .. } => {
                assert_eq!(stage, "scaling");
                assert_eq!(step, Some(3));
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn test_single_date_needs_no_regression() {
        let (tape, out, _) = run_small(1, 1);
        let out = out.unwrap();
        assert_eq!(out.payoffs.dates(), 1);
        assert!(tape.vector(out.payoffs.columns[0])[0].is_finite());
    }
}
