// scripts/benchmark.rs
use fast_lsmc::math_utils::Timer;
use fast_lsmc::mc::mc_engine::{price_and_greeks_with, price_only, LsmcConfig, PricingResult};
use fast_lsmc::models::ModelParameters;
use fast_lsmc::LsmcResult;
use std::env;
use std::process::Command;
use tracing_subscriber::EnvFilter;

#[derive(Debug)]
struct SystemInfo {
    os: String,
    cpu_model: String,
    cpu_cores: usize,
    rust_version: String,
    rayon_threads: usize,
}

impl SystemInfo {
    fn gather() -> Self {
        Self {
            os: env::consts::OS.to_string(),
            cpu_model: Self::get_cpu_model(),
            cpu_cores: num_cpus::get(),
            rust_version: Self::get_rust_version(),
            rayon_threads: rayon::current_num_threads(),
        }
    }

    fn get_cpu_model() -> String {
        #[cfg(target_os = "linux")]
        {
            std::fs::read_to_string("/proc/cpuinfo")
                .ok()
                .and_then(|content| {
                    content
                        .lines()
                        .find(|line| line.starts_with("model name"))
                        .and_then(|line| line.split(':').nth(1))
                        .map(|s| s.trim().to_string())
                })
                .unwrap_or_else(|| "Unknown CPU".to_string())
        }

        #[cfg(target_os = "macos")]
        {
            Command::new("sysctl")
                .args(["-n", "machdep.cpu.brand_string"])
                .output()
                .map(|output| String::from_utf8_lossy(&output.stdout).trim().to_string())
                .unwrap_or_else(|_| "Unknown CPU".to_string())
        }

        #[cfg(not(any(target_os = "linux", target_os = "macos")))]
        {
            "Unknown CPU".to_string()
        }
    }

    fn get_rust_version() -> String {
        Command::new("rustc")
            .arg("--version")
            .output()
            .map(|output| String::from_utf8_lossy(&output.stdout).trim().to_string())
            .unwrap_or_else(|_| "Unknown Rust version".to_string())
    }
}

#[derive(Debug)]
struct BenchmarkResult {
    name: String,
    paths: usize,
    time_ms: f64,
    throughput_paths_per_sec: f64,
    price: f64,
    std_error: f64,
    european_price: f64,
}

impl BenchmarkResult {
    fn from_run(name: String, paths: usize, time_ms: f64, run: &PricingResult) -> Self {
        Self {
            name,
            paths,
            time_ms,
            throughput_paths_per_sec: paths as f64 / (time_ms / 1000.0),
            price: run.price,
            std_error: run.std_error,
            european_price: run.european_price,
        }
    }
}

fn run_lsmc_benchmarks(params: &ModelParameters) -> LsmcResult<Vec<BenchmarkResult>> {
    let mut results = Vec::new();
    let paths_configs = [10_000, 50_000, 100_000];

    for &paths in &paths_configs {
        println!("Running benchmarks with {} paths...", paths);
        let config = LsmcConfig {
            paths,
            seed: 42,
            ..Default::default()
        };

        let mut timer = Timer::new();
        timer.start();
        let plain = price_only(params, &config)?;
        results.push(BenchmarkResult::from_run(
            format!("Bermudan Put Price ({}k paths)", paths / 1000),
            paths,
            timer.elapsed_ms(),
            &plain,
        ));

        timer.start();
        let full = price_and_greeks_with(params, &config)?;
        let time_ms = timer.elapsed_ms();
        if let Some(greeks) = full.greeks {
            println!(
                "  greeks: delta {:.4}, vega {:.4}, strike {:.4}, rho {:.4}",
                greeks.delta, greeks.vega, greeks.strike_sens, greeks.rho
            );
        }
        results.push(BenchmarkResult::from_run(
            format!("Bermudan Put Price + Greeks ({}k paths)", paths / 1000),
            paths,
            time_ms,
            &full,
        ));
    }

    Ok(results)
}

fn print_results(results: &[BenchmarkResult]) {
    println!(
        "{:<42} {:>9} {:>11} {:>14} {:>9} {:>9} {:>10}",
        "Benchmark", "Paths", "Time (ms)", "Paths/sec", "Price", "StdErr", "European"
    );
    println!("{}", "-".repeat(110));
    for result in results {
        println!(
            "{:<42} {:>9} {:>11.2} {:>14.0} {:>9.4} {:>9.4} {:>10.4}",
            result.name,
            result.paths,
            result.time_ms,
            result.throughput_paths_per_sec,
            result.price,
            result.std_error,
            result.european_price
        );
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    println!("fast-lsmc Benchmark Suite");
    println!("=========================\n");

    let system_info = SystemInfo::gather();
    println!("System Information:");
    println!("  OS: {}", system_info.os);
    println!("  CPU: {}", system_info.cpu_model);
    println!("  CPU Cores: {}", system_info.cpu_cores);
    println!("  Rust Version: {}", system_info.rust_version);
    println!("  Rayon Threads: {}", system_info.rayon_threads);
    println!(
        "  Benchmark Date: {}",
        chrono::Utc::now().format("%Y-%m-%d %H:%M:%S UTC")
    );
    println!();

    let params = ModelParameters::new(36.0, 0.2, 40.0, 0.06);
    match run_lsmc_benchmarks(&params) {
        Ok(results) => {
            println!();
            print_results(&results);
        }
        Err(e) => {
            eprintln!("Benchmark failed: {}", e);
            std::process::exit(1);
        }
    }
}
