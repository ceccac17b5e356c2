pub mod gbm;
pub mod model;

pub use gbm::{Gbm, ModelParameters, ParameterVars, Tracked};
pub use model::SDEModel;
