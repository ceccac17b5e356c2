pub mod mc_engine;
pub mod payoffs;

pub use mc_engine::{
    price_and_greeks, price_and_greeks_with, price_only, ExerciseBoundaryPoint, Greeks,
    LsmcConfig, PricingResult,
};
pub use payoffs::{CashflowTable, PutPayoff};
