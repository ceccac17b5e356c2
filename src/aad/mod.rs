//! Reverse-mode algorithmic differentiation.
//!
//! [`tape`] records the pricing computation; [`linalg`] adds the ridge solve
//! as a single differentiable primitive.

pub mod linalg;
pub mod tape;

pub use linalg::{ridge_fit, ridge_solve};
pub use tape::{
    AdjointRule, Gradients, MatrixVar, ScalarVar, Tape, TapeVar, Tensor, VectorVar,
};
