//! Analytical Black-Scholes formulas for European puts and their Greeks
//!
//! # Mathematical Foundation
//!
//! Under the Black-Scholes model, the underlying asset follows:
//! ```text
//! dS_t = r S_t dt + σ S_t dW_t
//! ```
//!
//! The European put is the no-early-exercise lower bound of the Bermudan
//! put priced by the LSMC engine, so the gap between the two is the
//! early-exercise premium.

use crate::math_utils::{norm_cdf, norm_pdf};

fn d1_d2(s: f64, k: f64, r: f64, sigma: f64, t: f64) -> (f64, f64) {
    let d1 = ((s / k).ln() + (r + 0.5 * sigma * sigma) * t) / (sigma * t.sqrt());
    (d1, d1 - sigma * t.sqrt())
}

/// Black-Scholes European put option price
///
/// # Formula
/// ```text
/// P(S,K,r,σ,T) = K*e^(-rT)*Φ(-d₂) - S*Φ(-d₁)
/// ```
///
/// Where:
/// ```text
/// d₁ = [ln(S/K) + (r + σ²/2)T] / (σ√T)
/// d₂ = d₁ - σ√T
/// ```
pub fn bs_put_price(s: f64, k: f64, r: f64, sigma: f64, t: f64) -> f64 {
    let (d1, d2) = d1_d2(s, k, r, sigma, t);
    k * (-r * t).exp() * norm_cdf(-d2) - s * norm_cdf(-d1)
}

/// Put Delta: ∂P/∂S = Φ(d₁) - 1
pub fn bs_put_delta(s: f64, k: f64, r: f64, sigma: f64, t: f64) -> f64 {
    let (d1, _) = d1_d2(s, k, r, sigma, t);
    norm_cdf(d1) - 1.0
}

/// Vega (same for calls and puts): ∂P/∂σ = S * φ(d₁) * √T
pub fn bs_put_vega(s: f64, k: f64, r: f64, sigma: f64, t: f64) -> f64 {
    let (d1, _) = d1_d2(s, k, r, sigma, t);
    s * norm_pdf(d1) * t.sqrt()
}

/// Strike sensitivity: ∂P/∂K = e^(-rT) * Φ(-d₂)
pub fn bs_put_strike_sensitivity(s: f64, k: f64, r: f64, sigma: f64, t: f64) -> f64 {
    let (_, d2) = d1_d2(s, k, r, sigma, t);
    (-r * t).exp() * norm_cdf(-d2)
}

/// Put Rho: ∂P/∂r = -K * T * e^(-rT) * Φ(-d₂)
pub fn bs_put_rho(s: f64, k: f64, r: f64, sigma: f64, t: f64) -> f64 {
    let (_, d2) = d1_d2(s, k, r, sigma, t);
    -k * t * (-r * t).exp() * norm_cdf(-d2)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_put_price_reference() {
        // S=36, K=40, r=6%, σ=20%, T=1: the classic Longstaff-Schwartz table row
        let p = bs_put_price(36.0, 40.0, 0.06, 0.2, 1.0);
        assert_relative_eq!(p, 3.844, epsilon = 1e-3);
    }

    #[test]
    fn test_greeks_match_finite_differences() {
        let (s, k, r, sigma, t) = (36.0, 40.0, 0.06, 0.2, 1.0);
        let h = 1e-5;

        let fd = |f: &dyn Fn(f64) -> f64, x: f64| (f(x + h) - f(x - h)) / (2.0 * h);

        let delta = fd(&|x| bs_put_price(x, k, r, sigma, t), s);
        let vega = fd(&|x| bs_put_price(s, k, r, x, t), sigma);
        let dk = fd(&|x| bs_put_price(s, x, r, sigma, t), k);
        let rho = fd(&|x| bs_put_price(s, k, x, sigma, t), r);

        assert_relative_eq!(bs_put_delta(s, k, r, sigma, t), delta, epsilon = 1e-6);
        assert_relative_eq!(bs_put_vega(s, k, r, sigma, t), vega, epsilon = 1e-5);
        assert_relative_eq!(bs_put_strike_sensitivity(s, k, r, sigma, t), dk, epsilon = 1e-6);
        assert_relative_eq!(bs_put_rho(s, k, r, sigma, t), rho, epsilon = 1e-5);
    }
}
