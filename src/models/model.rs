// src/models/model.rs
use crate::aad::{Tape, VectorVar};

/// Diffusion `dS = a(S) dt + b(S) dW` whose coefficients are recorded on a tape.
pub trait SDEModel {
    fn drift(&self, tape: &mut Tape, s: VectorVar) -> VectorVar;
    fn diffusion(&self, tape: &mut Tape, s: VectorVar) -> VectorVar;
}
