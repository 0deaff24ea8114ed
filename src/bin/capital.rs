//! Capital Requirement Binary
//!
//! Rolling-window VaR of the collateral and the equity and risk weighted
//! assets it implies, for a few window lengths.
//!
//! ## Usage
//! ```bash
//! cargo run --bin capital --release -- --returns returns.json --window 5
//! ```

use std::path::PathBuf;

use clap::Parser;
use liquidation_risk::capital::{capital_requirement, CapitalSettings};
use liquidation_risk::logging::init_logging;
use liquidation_risk::provider::load_or_synthetic;
use liquidation_risk::RiskError;

const SYNTHETIC_LEN: usize = 5_000;

#[derive(Parser, Debug)]
#[command(name = "capital")]
#[command(about = "Capital requirement from rolling-window VaR")]
struct Args {
    #[arg(long)]
    returns: Option<PathBuf>,

    /// Seed of the synthetic series when no returns file is given
    #[arg(long, default_value_t = 0)]
    seed: u64,

    /// Window lengths in source intervals
    #[arg(long, value_delimiter = ',', default_values_t = vec![1, 5, 10])]
    window: Vec<usize>,

    /// Lower-tail probability of the VaR quantile
    #[arg(long, default_value_t = 0.01)]
    tail_probability: f64,

    #[arg(long, default_value_t = 0.10)]
    haircut: f64,

    #[arg(long, default_value_t = 0.02)]
    challenger_fee: f64,

    #[arg(long)]
    json: bool,

    #[arg(short, long, default_value = "info")]
    log_level: String,
}

fn main() -> Result<(), RiskError> {
    let args = Args::parse();
    init_logging(&args.log_level);

    let series = load_or_synthetic(args.returns.as_deref(), SYNTHETIC_LEN, args.seed)?;
    let requirements = args
        .window
        .iter()
        .map(|&window| {
            let settings = CapitalSettings {
                window,
                tail_probability: args.tail_probability,
                challenger_fee: args.challenger_fee,
                haircut: args.haircut,
            };
            capital_requirement(&series, &settings)
        })
        .collect::<Result<Vec<_>, _>>()?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&requirements)?);
        return Ok(());
    }

    println!("=======================================================");
    println!("  Capital Requirement");
    println!("  Rolling VaR at {:.1}%", args.tail_probability * 100.0);
    println!("=======================================================");
    println!();
    println!("Parameters:");
    println!("  Series length:  {}", series.len());
    println!("  Haircut h:      {:.3}", args.haircut);
    println!("  Challenger fee: {:.3}", args.challenger_fee);
    println!();

    for req in &requirements {
        println!("Window: {}", req.window);
        println!("{}", "-".repeat(50));
        req.print();
        println!();
    }

    println!("| Window | Return q % | VaR %  | Equity % | RWA %  |");
    println!("|--------|------------|--------|----------|--------|");
    for req in &requirements {
        println!(
            "| {:6} | {:10.2} | {:6.2} | {:8.2} | {:6.2} |",
            req.window,
            req.return_quantile * 100.0,
            req.var * 100.0,
            req.equity * 100.0,
            req.risk_weighted_assets * 100.0
        );
    }
    Ok(())
}
