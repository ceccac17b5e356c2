// src/math_utils.rs
use ndarray::Array1;
use statrs::function::erf;
use std::f64::consts::{PI, SQRT_2};
use std::time::Instant;

/// Standard normal CDF: Φ(x) = ½(1 + erf(x/√2))
pub fn norm_cdf(x: f64) -> f64 {
    0.5 * (1.0 + erf::erf(x / SQRT_2))
}

/// Standard normal density: φ(x) = e^{-x²/2} / √(2π)
pub fn norm_pdf(x: f64) -> f64 {
    (-0.5 * x * x).exp() / (2.0 * PI).sqrt()
}

/// Sample mean and standard error of the mean.
///
/// The standard error is zero for a single sample.
pub fn mean_and_stderr(values: &Array1<f64>) -> (f64, f64) {
    let n = values.len() as f64;
    let sum = values.sum();
    let mean = sum / n;
    let var = if values.len() > 1 {
        let sum_sq = values.dot(values);
        ((sum_sq - sum * sum / n) / (n - 1.0)).max(0.0)
    } else {
        0.0
    };
    (mean, (var / n).sqrt())
}

/// Wall-clock stopwatch for pricing runs.
pub struct Timer {
    start_time: Instant,
}

impl Timer {
    pub fn new() -> Timer {
        Timer {
            start_time: Instant::now(),
        }
    }

    /// Restart from now.
    pub fn start(&mut self) {
        self.start_time = Instant::now();
    }

    pub fn elapsed_ms(&self) -> f64 {
        self.start_time.elapsed().as_secs_f64() * 1000.0
    }
}

impl Default for Timer {
    fn default() -> Self {
        Self::new()
    }
}
