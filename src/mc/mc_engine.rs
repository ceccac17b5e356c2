// src/mc/mc_engine.rs
use crate::aad::{ScalarVar, Tape, VectorVar};
use crate::analytics::bs_analytic;
use crate::error::{validation::*, LsmcError, LsmcResult};
use crate::lsmc::{select_first_exercise, BackwardInduction, PayoffMatrix, RidgeRegressor};
use crate::math_utils::{mean_and_stderr, Timer};
use crate::mc::payoffs::PutPayoff;
use crate::models::{Gbm, ModelParameters, Tracked};
use crate::rng::SeededNormals;
use crate::solvers::{simulate_paths, TimeGrid};
use ndarray::{Array1, Zip};
use tracing::info;

/// Shape of one LSMC run.
#[derive(Clone, Debug, PartialEq)]
pub struct LsmcConfig {
    pub paths: usize,
    pub steps: usize,
    pub maturity: f64,
    /// Number of Chebyshev basis columns (degrees `0..poly_order`).
    pub poly_order: usize,
    pub ridge_lambda: f64,
    pub seed: u64,
}

impl LsmcConfig {
    /// Validate the run configuration
    pub fn validate(&self) -> LsmcResult<()> {
        validate_paths(self.paths)?;
        validate_steps(self.steps)?;
        validate_positive("maturity", self.maturity)?;
        validate_finite("maturity", self.maturity)?;
        validate_poly_order(self.poly_order)?;
        validate_ridge_lambda(self.ridge_lambda)?;
        Ok(())
    }
}

impl Default for LsmcConfig {
    fn default() -> Self {
        LsmcConfig {
            paths: 100_000,
            steps: 10,
            maturity: 1.0,
            poly_order: 25,
            ridge_lambda: 100.0,
            seed: 12345,
        }
    }
}

/// Sensitivities of the price to the four model parameters.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Greeks {
    /// ∂V/∂S₀
    pub delta: f64,
    /// ∂V/∂σ
    pub vega: f64,
    /// ∂V/∂K
    pub strike_sens: f64,
    /// ∂V/∂r
    pub rho: f64,
}

/// Exercise activity at one exercise date.
#[derive(Clone, Debug, PartialEq)]
pub struct ExerciseBoundaryPoint {
    /// Grid index of the date.
    pub step: usize,
    pub time: f64,
    /// Paths whose positive immediate payoff beat the continuation estimate.
    pub exercised_paths: usize,
    /// Highest spot among those paths; `None` when no path exercised.
    pub boundary_spot: Option<f64>,
}

#[derive(Clone, Debug)]
pub struct PricingResult {
    pub price: f64,
    /// Standard error of the mean of discounted realized payoffs.
    pub std_error: f64,
    pub european_price: f64,
    pub early_exercise_premium: f64,
    pub greeks: Option<Greeks>,
    /// Black–Scholes greeks of the European put with the same parameters.
    pub european_greeks: Greeks,
    pub exercise_boundary: Vec<ExerciseBoundaryPoint>,
    pub elapsed_ms: f64,
}

/// Price a Bermudan put and its greeks from plain arguments.
///
/// Uses the default seed; all four parameters are tracked.
#[allow(clippy::too_many_arguments)]
pub fn price_and_greeks(
    spot: f64,
    vol: f64,
    strike: f64,
    rate: f64,
    maturity: f64,
    n_steps: usize,
    n_paths: usize,
    poly_order: usize,
    ridge_lambda: f64,
) -> LsmcResult<(f64, Greeks)> {
    let config = LsmcConfig {
        paths: n_paths,
        steps: n_steps,
        maturity,
        poly_order,
        ridge_lambda,
        ..Default::default()
    };
    let params = ModelParameters::new(spot, vol, strike, rate);
    let result = price_and_greeks_with(&params, &config)?;
    Ok((result.price, result.greeks.unwrap_or_default()))
}

/// Longstaff–Schwartz price of a Bermudan put with reverse-mode greeks
///
/// # Math Framework
///
/// Paths follow the Euler scheme for GBM; the continuation value at each
/// exercise date is a ridge regression on a Chebyshev basis of the scaled
/// spot. Each path is paid at its first exercise date; column `c` of the
/// realized payoff matrix `R` is discounted by its 0-based column index:
/// ```text
/// V = (1/n) Σ_paths Σ_c e^{-r·c·Δt} R_c
/// ```
/// The greeks are the adjoints of `V` with respect to spot, volatility,
/// strike and rate, obtained in one reverse sweep over the whole run.
///
/// # Errors
///
/// - Configuration errors before any computation
/// - `GradientTracking` if any of the four parameters is not tracked
/// - `Numerical` at the first date whose scaling or regression fails
pub fn price_and_greeks_with(
    params: &ModelParameters,
    config: &LsmcConfig,
) -> LsmcResult<PricingResult> {
    run(params, config, true)
}

/// Same engine without the reverse sweep; untracked parameters are allowed.
pub fn price_only(params: &ModelParameters, config: &LsmcConfig) -> LsmcResult<PricingResult> {
    run(params, config, false)
}

fn run(params: &ModelParameters, config: &LsmcConfig, with_greeks: bool) -> LsmcResult<PricingResult> {
    config.validate()?;
    params.validate()?;
    if with_greeks {
        params.ensure_tracked(Tracked::all())?;
    }

    let timer = Timer::new();
    let grid = TimeGrid::new(config.maturity, config.steps)?;
    let regressor = RidgeRegressor::new(config.ridge_lambda)?;

    let mut tape = Tape::new();
    let vars = params.register(&mut tape);
    let model = Gbm::from_parameters(&vars);
    let mut normals = SeededNormals::new(config.seed);

    let ensemble = simulate_paths(
        &mut tape,
        &model,
        vars.spot,
        &grid,
        config.paths,
        &mut normals,
    )?;
    let cashflows = PutPayoff::new(vars.strike).cashflow_table(&mut tape, &ensemble);
    let induction = BackwardInduction::new(grid, regressor, config.poly_order).run(
        &mut tape,
        &ensemble,
        &cashflows,
        vars.rate,
    )?;
    let realized = select_first_exercise(&mut tape, &induction.payoffs.columns);

    let (price_var, per_path) = aggregate(&mut tape, &realized, vars.rate, &grid, config.paths)?;
    let price = tape.value(price_var);
    if !price.is_finite() {
        return Err(LsmcError::numerical(
            "aggregation",
            format!("non-finite price {}", price),
        ));
    }

    let greeks = with_greeks.then(|| {
        let grads = tape.gradient(price_var);
        Greeks {
            delta: grads.wrt(vars.spot),
            vega: grads.wrt(vars.vol),
            strike_sens: grads.wrt(vars.strike),
            rho: grads.wrt(vars.rate),
        }
    });

    let exercise_boundary = induction
        .payoffs
        .columns
        .iter()
        .enumerate()
        .map(|(column, &payoff)| {
            let step = PayoffMatrix::date_of_column(column);
            boundary_point(
                step,
                grid.time(step),
                tape.vector(payoff),
                tape.vector(ensemble.at(step)),
            )
        })
        .collect();

    let (_, std_error) = mean_and_stderr(&per_path);
    let european_price = bs_analytic::bs_put_price(
        params.spot,
        params.strike,
        params.rate,
        params.vol,
        grid.maturity(),
    );
    let european_greeks = european_put_greeks(params, grid.maturity());
    let elapsed_ms = timer.elapsed_ms();

    info!(
        price,
        std_error,
        european_price,
        paths = config.paths,
        steps = config.steps,
        tape_nodes = tape.len(),
        elapsed_ms,
        "LSMC pricing finished"
    );

    Ok(PricingResult {
        price,
        std_error,
        european_price,
        early_exercise_premium: price - european_price,
        greeks,
        european_greeks,
        exercise_boundary,
        elapsed_ms,
    })
}

/// Discounted mean of the realized payoff columns.
///
/// Column `c` is discounted by `e^{-r·c·Δt}`. Returns the price node and the
/// per-path discounted payoffs used for the standard error.
fn aggregate(
    tape: &mut Tape,
    realized: &[VectorVar],
    rate: ScalarVar,
    grid: &TimeGrid,
    paths: usize,
) -> LsmcResult<(ScalarVar, Array1<f64>)> {
    let mut per_path = Array1::<f64>::zeros(paths);
    let mut total: Option<ScalarVar> = None;
    for (column, &payoff) in realized.iter().enumerate() {
        let exponent = tape.scale(rate, -grid.time(column));
        let discount = tape.exp(exponent);
        let discounted = tape.mul_scalar(payoff, discount);
        per_path += tape.vector(discounted);

        let column_sum = tape.sum(discounted);
        total = Some(match total {
            Some(acc) => tape.add(acc, column_sum),
            None => column_sum,
        });
    }
    let total =
        total.ok_or_else(|| LsmcError::numerical("aggregation", "no exercise dates on the grid"))?;
    Ok((tape.scale(total, 1.0 / paths as f64), per_path))
}

fn european_put_greeks(params: &ModelParameters, maturity: f64) -> Greeks {
    let (s, k, r, sigma) = (params.spot, params.strike, params.rate, params.vol);
    Greeks {
        delta: bs_analytic::bs_put_delta(s, k, r, sigma, maturity),
        vega: bs_analytic::bs_put_vega(s, k, r, sigma, maturity),
        strike_sens: bs_analytic::bs_put_strike_sensitivity(s, k, r, sigma, maturity),
        rho: bs_analytic::bs_put_rho(s, k, r, sigma, maturity),
    }
}

fn boundary_point(
    step: usize,
    time: f64,
    payoffs: &Array1<f64>,
    spots: &Array1<f64>,
) -> ExerciseBoundaryPoint {
    let mut exercised_paths = 0;
    let mut boundary_spot: Option<f64> = None;
    Zip::from(payoffs).and(spots).for_each(|&p, &s| {
        if p > 0.0 {
            exercised_paths += 1;
            boundary_spot = Some(boundary_spot.map_or(s, |b| b.max(s)));
        }
    });
    ExerciseBoundaryPoint {
        step,
        time,
        exercised_paths,
        boundary_spot,
    }
}
