// tests/integration_test.rs
use fast_lsmc::mc::mc_engine::{
    price_and_greeks, price_and_greeks_with, price_only, LsmcConfig,
};
use fast_lsmc::models::{ModelParameters, Tracked};
use fast_lsmc::LsmcError;

fn quick_config() -> LsmcConfig {
    LsmcConfig {
        paths: 20_000,
        steps: 10,
        poly_order: 8,
        ridge_lambda: 10.0,
        seed: 7,
        ..Default::default()
    }
}

#[test]
fn test_reference_bermudan_put_price() {
    let (price, _) =
        price_and_greeks(36.0, 0.2, 40.0, 0.06, 1.0, 10, 100_000, 25, 100.0).expect("Valid inputs");

    println!("\nLSMC Bermudan put price: {}", price);
    assert!(
        (price - 4.48).abs() < 0.1,
        "Price {} outside 4.48 ± 0.1",
        price
    );
}

#[test]
fn test_price_non_decreasing_in_strike() {
    let config = quick_config();
    let low = price_only(&ModelParameters::new(36.0, 0.2, 40.0, 0.06), &config).unwrap();
    let high = price_only(&ModelParameters::new(36.0, 0.2, 41.0, 0.06), &config).unwrap();

    println!("\nK=40: {}  K=41: {}", low.price, high.price);
    assert!(high.price >= low.price);
}

#[test]
fn test_same_seed_reproduces_price() {
    let params = ModelParameters::new(36.0, 0.2, 40.0, 0.06);
    let config = quick_config();
    let first = price_only(&params, &config).unwrap();
    let second = price_only(&params, &config).unwrap();
    assert_eq!(first.price, second.price);
    assert_eq!(first.exercise_boundary, second.exercise_boundary);
}

#[test]
fn test_bermudan_dominates_european() {
    let params = ModelParameters::new(36.0, 0.2, 40.0, 0.06);
    let result = price_only(&params, &quick_config()).unwrap();

    println!(
        "\nBermudan: {} ± {}  European (BS): {}  premium: {}",
        result.price, result.std_error, result.european_price, result.early_exercise_premium
    );
    assert!(result.early_exercise_premium > 0.0);
    assert!(result.std_error > 0.0 && result.std_error < 0.1);
}

#[test]
fn test_exercise_boundary_covers_every_date() {
    let params = ModelParameters::new(36.0, 0.2, 40.0, 0.06);
    let config = quick_config();
    let result = price_only(&params, &config).unwrap();

    assert_eq!(result.exercise_boundary.len(), config.steps);
    for (c, point) in result.exercise_boundary.iter().enumerate() {
        assert_eq!(point.step, c + 1);
        assert!((point.time - (c + 1) as f64 * 0.1).abs() < 1e-12);
        if let Some(spot) = point.boundary_spot {
            assert!(point.exercised_paths > 0);
            // Exercising requires a positive put payoff
            assert!(spot < 40.0);
        }
    }
}

#[test]
fn test_single_path_single_date_prices() {
    let config = LsmcConfig {
        paths: 1,
        steps: 1,
        ..Default::default()
    };
    let result =
        price_and_greeks_with(&ModelParameters::new(36.0, 0.2, 40.0, 0.06), &config).unwrap();
    assert!(result.price.is_finite());
    assert!(result.price >= 0.0);
    assert_eq!(result.std_error, 0.0);
}

#[test]
fn test_single_path_fails_at_first_regression_date() {
    let config = LsmcConfig {
        paths: 1,
        steps: 10,
        ..Default::default()
    };
    let err = price_only(&ModelParameters::new(36.0, 0.2, 40.0, 0.06), &config).unwrap_err();

    println!("\n{}", err);
    match err {
        LsmcError::Numerical { step, .. } => assert_eq!(step, Some(9)),
        other => panic!("expected numerical error, got {}", other),
    }
}

#[test]
fn test_configuration_errors_are_reported_before_pricing() {
    let params = ModelParameters::new(36.0, 0.2, 40.0, 0.06);
    let bad_configs = [
        LsmcConfig {
            paths: 0,
            ..Default::default()
        },
        LsmcConfig {
            steps: 0,
            ..Default::default()
        },
        LsmcConfig {
            poly_order: 0,
            ..Default::default()
        },
        LsmcConfig {
            ridge_lambda: -1.0,
            ..Default::default()
        },
        LsmcConfig {
            maturity: 0.0,
            ..Default::default()
        },
    ];
    for config in &bad_configs {
        let err = price_only(&params, config).unwrap_err();
        assert!(err.is_configuration(), "unexpected error: {}", err);
    }

    let err = price_only(&ModelParameters::new(36.0, -0.2, 40.0, 0.06), &quick_config())
        .unwrap_err();
    assert!(err.is_configuration());
}

#[test]
fn test_untracked_parameter_blocks_greeks() {
    let params =
        ModelParameters::new(36.0, 0.2, 40.0, 0.06).with_tracked(Tracked::all() - Tracked::STRIKE);
    let err = price_and_greeks_with(&params, &quick_config()).unwrap_err();
    assert_eq!(
        err,
        LsmcError::GradientTracking {
            parameter: "strike".to_string()
        }
    );
}
