//! Tail Risk Binary
//!
//! Losses from liquidations at a chosen h', their mean-excess function, a
//! GPD fit of the tail and expected shortfall, next to the analytic loss
//! premium under normal and Student-t returns.
//!
//! ## Usage
//! ```bash
//! cargo run --bin tail_risk --release -- --haircut-dash 0.05
//! ```

use std::path::PathBuf;

use clap::Parser;
use liquidation_risk::analysis::RiskAnalysis;
use liquidation_risk::logging::init_logging;
use liquidation_risk::pnl::{loss_premium, ReturnDistribution};
use liquidation_risk::provider::load_or_synthetic;
use liquidation_risk::tail::{analyze_tail, mean_excess, quantile_grid, return_shortfall, TailSettings, TailThreshold};
use liquidation_risk::{RiskConfig, RiskError};

const SYNTHETIC_LEN: usize = 5_000;
const MEAN_EXCESS_POINTS: usize = 10;

#[derive(Parser, Debug)]
#[command(name = "tail_risk")]
#[command(about = "Liquidation loss tail: mean excess, GPD fit and expected shortfall")]
struct Args {
    #[arg(long)]
    returns: Option<PathBuf>,

    #[arg(long)]
    config: Option<PathBuf>,

    #[arg(long)]
    seed: Option<u64>,

    /// Collateral ratio margin h' of the position
    #[arg(long, default_value_t = 0.05)]
    haircut_dash: f64,

    /// Fixed tail threshold `u`; the `tail_quantile` loss quantile when absent
    #[arg(long)]
    tail_threshold: Option<f64>,

    /// Degrees of freedom for the Student-t premium
    #[arg(long, default_value_t = 3.0)]
    degrees_of_freedom: f64,

    #[arg(long)]
    json: bool,

    #[arg(short, long, default_value = "info")]
    log_level: String,
}

fn main() -> Result<(), RiskError> {
    let args = Args::parse();
    init_logging(&args.log_level);

    let mut config = match &args.config {
        Some(path) => RiskConfig::from_json_file(path)?,
        None => RiskConfig::default(),
    };
    config.seed = args.seed.or(config.seed);
    let seed = config.seed.unwrap_or_else(rand::random);

    let series = load_or_synthetic(args.returns.as_deref(), SYNTHETIC_LEN, seed)?;
    let analysis = RiskAnalysis::new(&series, &config)?;
    let losses = analysis.losses(args.haircut_dash, seed)?;
    let settings = TailSettings {
        threshold: match args.tail_threshold {
            Some(u) => TailThreshold::Fixed(u),
            None => TailThreshold::Quantile(config.tail_quantile),
        },
        es_level: config.es_level,
        min_tail_size: config.min_tail_size,
    };
    let report = analyze_tail(&losses, &settings)?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    let sigma = series.summary().std_dev * (analysis.sampler().block_len() as f64).sqrt();
    let distributions = [
        ReturnDistribution::Normal,
        ReturnDistribution::StudentT {
            degrees_of_freedom: args.degrees_of_freedom,
        },
    ];

    println!("=======================================================");
    println!("  Liquidation Loss Tail");
    println!("  h' = {:.3}, fee = {:.3}", args.haircut_dash, config.challenger_fee);
    println!("=======================================================");
    println!();
    println!("Parameters:");
    println!("  Loss sample size:   {}", losses.len());
    println!("  Horizon length n:   {}", analysis.sampler().block_len());
    match settings.threshold {
        TailThreshold::Fixed(u) => println!("  Tail threshold:     {:.4} (fixed)", u),
        TailThreshold::Quantile(q) => println!("  Tail quantile:      {:.2}", q),
    }
    println!("  ES level Q:         {:.2}", config.es_level);
    println!();

    println!("Tail Fit:");
    println!("{}", "-".repeat(50));
    report.print();
    println!();

    println!("Mean Excess:");
    println!("{}", "-".repeat(50));
    println!("| Threshold u | e(u)       |");
    println!("|-------------|------------|");
    let grid = quantile_grid(&losses, config.tail_quantile, 0.99, MEAN_EXCESS_POINTS);
    for (u, e) in mean_excess(&losses, &grid) {
        println!("| {:11.5} | {:10.5} |", u, e);
    }
    println!();

    println!("Return Shortfall and Premium:");
    println!("{}", "-".repeat(50));
    let worst = 1.0 - config.es_level;
    println!(
        "  ES over worst {:.0}% returns: {:.4}",
        worst * 100.0,
        return_shortfall(series.returns(), worst, args.haircut_dash, config.challenger_fee)
    );
    for dist in distributions {
        let premium = loss_premium(dist, sigma, args.haircut_dash, config.challenger_fee)?;
        println!("  Premium ({:9}):         {:.6}", dist.name(), premium);
    }
    Ok(())
}
