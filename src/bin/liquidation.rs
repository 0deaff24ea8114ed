//! Liquidation Probability Binary
//!
//! Bootstraps horizon returns and prints the liquidation probability and
//! expected PnL over a grid of h' values, plus the h' implied by the target
//! liquidation probability.
//!
//! ## Usage
//! ```bash
//! cargo run --bin liquidation --release -- --returns returns.json --json
//! ```

use std::path::PathBuf;

use clap::Parser;
use liquidation_risk::analysis::{default_grid, RiskAnalysis};
use liquidation_risk::logging::init_logging;
use liquidation_risk::provider::load_or_synthetic;
use liquidation_risk::{RiskConfig, RiskError};

/// Length of the synthetic series used when no returns file is given.
const SYNTHETIC_LEN: usize = 5_000;

#[derive(Parser, Debug)]
#[command(name = "liquidation")]
#[command(about = "Liquidation probability and expected PnL over a grid of h'")]
struct Args {
    /// JSON file with `returns` (and optionally `max_returns`)
    #[arg(long)]
    returns: Option<PathBuf>,

    /// JSON risk configuration; defaults apply to missing fields
    #[arg(long)]
    config: Option<PathBuf>,

    #[arg(long)]
    seed: Option<u64>,

    /// Outer replicates B
    #[arg(long)]
    replicates: Option<usize>,

    /// Inner draws K per replicate
    #[arg(long)]
    draws: Option<usize>,

    /// h' used for the tail section of the report
    #[arg(long, default_value_t = 0.05)]
    tail_haircut_dash: f64,

    /// Print the report as JSON instead of tables
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
    config.replicates = args.replicates.unwrap_or(config.replicates);
    config.draws = args.draws.or(config.draws);

    let series = load_or_synthetic(args.returns.as_deref(), SYNTHETIC_LEN, config.seed.unwrap_or(0))?;
    let analysis = RiskAnalysis::new(&series, &config)?;
    let report = analysis.run(&default_grid(), args.tail_haircut_dash)?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("=======================================================");
    println!("  Liquidation Probability");
    println!("  Block Bootstrap of Horizon Returns");
    println!("=======================================================");
    println!();
    println!("Parameters:");
    println!("  Series length:      {}", report.summary.len);
    println!(
        "  Series mean / std:  {:.5} / {:.5}",
        report.summary.mean, report.summary.std_dev
    );
    println!("  Haircut h:          {:.3}", config.haircut);
    println!("  Challenger fee:     {:.3}", config.challenger_fee);
    println!("  Horizon length n:   {}", report.horizon_length);
    println!("  Replicates x draws: {} x {}", report.replicates, report.draws);
    println!("  Seed:               {}", report.seed);
    println!("  Confidence:         {:.1}% (z = {:.3})", config.confidence * 100.0, report.z_critical);
    println!();

    println!("=======================================================");
    println!("  Liquidation Curve");
    println!("=======================================================");
    println!();
    report.print_curve();
    println!();

    println!("Implied h' for P(liquidation) = {:.0}%:", config.liquidation_probability * 100.0);
    println!("{}", "-".repeat(50));
    report.print_implied();
    println!();

    println!("Tail at h' = {:.3}:", args.tail_haircut_dash);
    println!("{}", "-".repeat(50));
    report.tail.print();
    Ok(())
}
