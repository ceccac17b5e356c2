// tests/greeks_test.rs
use approx::assert_relative_eq;
use fast_lsmc::analytics::bs_analytic;
use fast_lsmc::mc::mc_engine::{price_and_greeks_with, price_only, LsmcConfig};
use fast_lsmc::models::ModelParameters;

fn within(value: f64, target: f64, rel: f64) -> bool {
    (value - target).abs() <= rel * target.abs()
}

#[test]
fn test_reference_greeks() {
    let params = ModelParameters::new(36.0, 0.2, 40.0, 0.06);
    let result = price_and_greeks_with(&params, &LsmcConfig::default()).expect("Valid inputs");
    let greeks = result.greeks.expect("greeks requested");

    println!("\nPrice: {} ± {}", result.price, result.std_error);
    println!("Greeks: {:?}", greeks);

    assert!(within(greeks.delta, -0.69, 0.2), "delta {}", greeks.delta);
    assert!(within(greeks.vega, 11.26, 0.2), "vega {}", greeks.vega);
    assert!(
        within(greeks.strike_sens, 0.74, 0.2),
        "strike_sens {}",
        greeks.strike_sens
    );
    assert!(within(greeks.rho, -10.93, 0.2), "rho {}", greeks.rho);
}

#[test]
fn test_greek_signs_match_put_intuition() {
    let params = ModelParameters::new(36.0, 0.2, 40.0, 0.06);
    let config = LsmcConfig {
        paths: 20_000,
        poly_order: 8,
        ridge_lambda: 10.0,
        ..Default::default()
    };
    let greeks = price_and_greeks_with(&params, &config)
        .unwrap()
        .greeks
        .unwrap();

    assert!(greeks.delta < 0.0 && greeks.delta > -1.0);
    assert!(greeks.vega > 0.0);
    assert!(greeks.strike_sens > 0.0 && greeks.strike_sens < 1.0);
    assert!(greeks.rho < 0.0);
}

/// With a single exercise date no regression happens, so the price is a
/// piecewise-linear function of the common draws and central differences
/// reproduce the adjoints.
#[test]
fn test_single_date_greeks_match_finite_differences() {
    let (spot, vol, strike, rate) = (36.0, 0.2, 40.0, 0.06);
    let config = LsmcConfig {
        paths: 50_000,
        steps: 1,
        seed: 99,
        ..Default::default()
    };
    let price = |s: f64, v: f64, k: f64, r: f64| {
        price_only(&ModelParameters::new(s, v, k, r), &config)
            .unwrap()
            .price
    };

    let greeks = price_and_greeks_with(&ModelParameters::new(spot, vol, strike, rate), &config)
        .unwrap()
        .greeks
        .unwrap();

    let h = 1e-4;
    let fd_delta = (price(spot + h, vol, strike, rate) - price(spot - h, vol, strike, rate)) / (2.0 * h);
    let fd_vega = (price(spot, vol + h, strike, rate) - price(spot, vol - h, strike, rate)) / (2.0 * h);
    let fd_strike =
        (price(spot, vol, strike + h, rate) - price(spot, vol, strike - h, rate)) / (2.0 * h);
    let fd_rho = (price(spot, vol, strike, rate + h) - price(spot, vol, strike, rate - h)) / (2.0 * h);

    assert_relative_eq!(greeks.delta, fd_delta, max_relative = 1e-3);
    assert_relative_eq!(greeks.vega, fd_vega, max_relative = 1e-3);
    assert_relative_eq!(greeks.strike_sens, fd_strike, max_relative = 1e-3);
    assert_relative_eq!(greeks.rho, fd_rho, max_relative = 1e-3);
}

#[test]
fn test_bs_put_reference_values() {
    let (s, k, r, sigma, t) = (36.0, 40.0, 0.06, 0.2, 1.0);
    let put = bs_analytic::bs_put_price(s, k, r, sigma, t);
    let call_parity = put + s - k * (-r * t).exp();

    assert_relative_eq!(put, 3.844, epsilon = 1e-3);
    assert!(call_parity > 0.0);
    assert!(bs_analytic::bs_put_delta(s, k, r, sigma, t) < 0.0);
    assert!(bs_analytic::bs_put_vega(s, k, r, sigma, t) > 0.0);
}
