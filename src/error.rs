// src/error.rs
use std::fmt;

/// Error types for the fast-lsmc library
///
/// Every failure is terminal for a pricing run: no partial price is ever
/// returned alongside an error.
#[derive(Debug, Clone, PartialEq)]
pub enum LsmcError {
    /// Invalid model parameter values
    InvalidParameters {
        parameter: String,
        value: f64,
        constraint: String,
    },

    /// Invalid run configuration (paths, steps, basis order, penalty)
    InvalidConfiguration { field: String, reason: String },

    /// Singular regression system or degenerate scaling
    Numerical {
        stage: String,
        step: Option<usize>,
        reason: String,
    },

    /// Greeks requested for a parameter that is not tracked on the tape
    GradientTracking { parameter: String },
}

impl LsmcError {
    /// Errors raised before any computation because the inputs are unusable.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            LsmcError::InvalidParameters { .. } | LsmcError::InvalidConfiguration { .. }
        )
    }

    pub fn is_numerical(&self) -> bool {
        matches!(self, LsmcError::Numerical { .. })
    }

    pub fn is_gradient_tracking(&self) -> bool {
        matches!(self, LsmcError::GradientTracking { .. })
    }

    pub(crate) fn numerical(stage: &str, reason: impl Into<String>) -> Self {
        LsmcError::Numerical {
            stage: stage.to_string(),
            step: None,
            reason: reason.into(),
        }
    }

    /// Attach the date index at which a numerical failure happened.
    pub(crate) fn at_step(self, at: usize) -> Self {
        match self {
            LsmcError::Numerical { stage, reason, .. } => LsmcError::Numerical {
                stage,
                step: Some(at),
                reason,
            },
            other => other,
        }
    }
}

impl fmt::Display for LsmcError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LsmcError::InvalidParameters {
                parameter,
                value,
                constraint,
            } => {
                write!(
                    f,
                    "Invalid parameter '{}' = {}: {}",
                    parameter, value, constraint
                )
            }
            LsmcError::InvalidConfiguration { field, reason } => {
                write!(f, "Invalid configuration for '{}': {}", field, reason)
            }
            LsmcError::Numerical {
                stage,
                step,
                reason,
            } => match step {
                Some(step) => write!(
                    f,
                    "Numerical failure in {} at exercise date {}: {}",
                    stage, step, reason
                ),
                None => write!(f, "Numerical failure in {}: {}", stage, reason),
            },
            LsmcError::GradientTracking { parameter } => {
                write!(
                    f,
                    "Parameter '{}' is not tracked for differentiation; greeks unavailable",
                    parameter
                )
            }
        }
    }
}

impl std::error::Error for LsmcError {}

/// Result type alias for fast-lsmc operations
pub type LsmcResult<T> = Result<T, LsmcError>;

/// Validation utilities
pub mod validation {
    use super::{LsmcError, LsmcResult};

    /// Validate that a parameter is positive
    pub fn validate_positive(name: &str, value: f64) -> LsmcResult<()> {
        if value <= 0.0 || value.is_nan() {
            Err(LsmcError::InvalidParameters {
                parameter: name.to_string(),
                value,
                constraint: "must be positive (> 0)".to_string(),
            })
        } else {
            Ok(())
        }
    }

    /// Validate that a value is finite and not NaN
    pub fn validate_finite(name: &str, value: f64) -> LsmcResult<()> {
        if !value.is_finite() {
            Err(LsmcError::InvalidParameters {
                parameter: name.to_string(),
                value,
                constraint: "must be finite (not NaN or infinite)".to_string(),
            })
        } else {
            Ok(())
        }
    }

    /// Validate paths count
    pub fn validate_paths(paths: usize) -> LsmcResult<()> {
        if paths == 0 {
            Err(LsmcError::InvalidConfiguration {
                field: "paths".to_string(),
                reason: "must be greater than 0".to_string(),
            })
        } else if paths > 1_000_000_000 {
            Err(LsmcError::InvalidConfiguration {
                field: "paths".to_string(),
                reason: "exceeds maximum allowed (1 billion)".to_string(),
            })
        } else {
            Ok(())
        }
    }

    /// Validate steps count
    pub fn validate_steps(steps: usize) -> LsmcResult<()> {
        if steps == 0 {
            Err(LsmcError::InvalidConfiguration {
                field: "steps".to_string(),
                reason: "must be greater than 0".to_string(),
            })
        } else if steps > 100_000 {
            Err(LsmcError::InvalidConfiguration {
                field: "steps".to_string(),
                reason: "exceeds maximum allowed (100,000)".to_string(),
            })
        } else {
            Ok(())
        }
    }

    /// Validate the number of Chebyshev basis columns
    pub fn validate_poly_order(order: usize) -> LsmcResult<()> {
        if order == 0 {
            Err(LsmcError::InvalidConfiguration {
                field: "poly_order".to_string(),
                reason: "must be greater than 0".to_string(),
            })
        } else if order > 64 {
            Err(LsmcError::InvalidConfiguration {
                field: "poly_order".to_string(),
                reason: "exceeds maximum allowed (64)".to_string(),
            })
        } else {
            Ok(())
        }
    }

    /// Validate the ridge penalty
    pub fn validate_ridge_lambda(lambda: f64) -> LsmcResult<()> {
        if lambda < 0.0 || !lambda.is_finite() {
            Err(LsmcError::InvalidConfiguration {
                field: "ridge_lambda".to_string(),
                reason: format!("must be finite and non-negative, got {}", lambda),
            })
        } else {
            Ok(())
        }
    }
}
