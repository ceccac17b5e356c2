//! Immediate-exercise payoffs
//!
//! # Mathematical Definition
//!
//! The put pays `max(K - S_t, 0)` when exercised at date `t`. The cashflow
//! table holds that amount for every path and grid point; it is derived
//! deterministically from the path ensemble and is never negative.

use crate::aad::{ScalarVar, Tape, VectorVar};
use crate::solvers::PathEnsemble;

/// Put payoff with a differentiable strike
#[derive(Clone, Copy, Debug)]
pub struct PutPayoff {
    pub strike: ScalarVar,
}

impl PutPayoff {
    pub fn new(strike: ScalarVar) -> Self {
        PutPayoff { strike }
    }

    /// max(K - S, 0) per path
    pub fn intrinsic(&self, tape: &mut Tape, s: VectorVar) -> VectorVar {
        let moneyness = tape.scalar_sub(self.strike, s);
        tape.positive_part(moneyness)
    }

    pub fn cashflow_table(&self, tape: &mut Tape, ensemble: &PathEnsemble) -> CashflowTable {
        let flows = (0..ensemble.len())
            .map(|i| self.intrinsic(tape, ensemble.at(i)))
            .collect();
        CashflowTable { flows }
    }
}

/// Immediate-exercise payoff per grid index
#[derive(Clone, Debug)]
pub struct CashflowTable {
    flows: Vec<VectorVar>,
}

impl CashflowTable {
    pub fn at(&self, index: usize) -> VectorVar {
        self.flows[index]
    }

    pub fn len(&self) -> usize {
        self.flows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.flows.is_empty()
    }
}
