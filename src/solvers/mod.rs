pub mod euler_maruyama;

pub use euler_maruyama::{simulate_paths, EulerMaruyama, PathEnsemble, TimeGrid};
