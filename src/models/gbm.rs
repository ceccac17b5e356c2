// src/models/gbm.rs
use super::model::SDEModel;
use crate::aad::{ScalarVar, Tape, VectorVar};
use crate::error::{validation::*, LsmcError, LsmcResult};
use bitflags::bitflags;

bitflags! {
    /// Model parameters registered on the tape as differentiable inputs.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Tracked: u32 {
        const SPOT   = 1 << 0;
        const VOL    = 1 << 1;
        const STRIKE = 1 << 2;
        const RATE   = 1 << 3;
    }
}

impl Tracked {
    /// Parameter names in greeks order (delta, vega, strike, rho).
    pub const NAMED: [(Tracked, &'static str); 4] = [
        (Tracked::SPOT, "spot"),
        (Tracked::VOL, "vol"),
        (Tracked::STRIKE, "strike"),
        (Tracked::RATE, "rate"),
    ];
}

/// Inputs of one pricing run.
///
/// Immutable once simulation starts; each run registers its own copy on a
/// fresh tape, so independent runs never share state.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ModelParameters {
    pub spot: f64,
    pub vol: f64,
    pub strike: f64,
    pub rate: f64,
    pub tracked: Tracked,
}

impl ModelParameters {
    /// All four parameters tracked for differentiation.
    pub fn new(spot: f64, vol: f64, strike: f64, rate: f64) -> Self {
        Self {
            spot,
            vol,
            strike,
            rate,
            tracked: Tracked::all(),
        }
    }

    pub fn with_tracked(mut self, tracked: Tracked) -> Self {
        self.tracked = tracked;
        self
    }

    pub fn validate(&self) -> LsmcResult<()> {
        validate_positive("spot", self.spot)?;
        validate_finite("spot", self.spot)?;
        validate_positive("vol", self.vol)?;
        validate_finite("vol", self.vol)?;
        validate_positive("strike", self.strike)?;
        validate_finite("strike", self.strike)?;
        validate_finite("rate", self.rate)?;
        Ok(())
    }

    /// Fails with the first parameter in `required` that is not tracked.
    pub fn ensure_tracked(&self, required: Tracked) -> LsmcResult<()> {
        match Tracked::NAMED
            .iter()
            .find(|(flag, _)| required.contains(*flag) && !self.tracked.contains(*flag))
        {
            Some((_, name)) => Err(LsmcError::GradientTracking {
                parameter: name.to_string(),
            }),
            None => Ok(()),
        }
    }

    /// Put the parameters on the tape: tracked ones as inputs, the rest as constants.
    pub fn register(&self, tape: &mut Tape) -> ParameterVars {
        let mut leaf = |flag: Tracked, value: f64| {
            if self.tracked.contains(flag) {
                tape.input(value)
            } else {
                tape.constant(value)
            }
        };
        ParameterVars {
            spot: leaf(Tracked::SPOT, self.spot),
            vol: leaf(Tracked::VOL, self.vol),
            strike: leaf(Tracked::STRIKE, self.strike),
            rate: leaf(Tracked::RATE, self.rate),
        }
    }
}

/// Tape handles of the model parameters.
#[derive(Clone, Copy, Debug)]
pub struct ParameterVars {
    pub spot: ScalarVar,
    pub vol: ScalarVar,
    pub strike: ScalarVar,
    pub rate: ScalarVar,
}

/// Geometric Brownian motion under the risk-neutral drift
/// ```text
/// dS_t = r S_t dt + σ S_t dW_t
/// ```
pub struct Gbm {
    pub rate: ScalarVar,
    pub vol: ScalarVar,
}

impl Gbm {
    pub fn new(rate: ScalarVar, vol: ScalarVar) -> Self {
        Gbm { rate, vol }
    }

    pub fn from_parameters(vars: &ParameterVars) -> Self {
        Gbm::new(vars.rate, vars.vol)
    }
}

impl SDEModel for Gbm {
    fn drift(&self, tape: &mut Tape, s: VectorVar) -> VectorVar {
        tape.mul_scalar(s, self.rate)
    }

    fn diffusion(&self, tape: &mut Tape, s: VectorVar) -> VectorVar {
        tape.mul_scalar(s, self.vol)
    }
}
