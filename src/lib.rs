//! Liquidation Risk Library
//!
//! Monte Carlo estimation of liquidation risk for collateralised positions
//! from a historical log-return series.
//!
//! ## Modules
//!
//! - `bootstrap`: circular block bootstrap of horizon returns
//! - `threshold`: liquidation threshold and implied h'
//! - `liquidation`: liquidation probability with confidence bands
//! - `pnl`: protocol PnL from liquidations, analytic loss premium
//! - `tail`: losses, GPD tail fit and expected shortfall
//! - `capital`: rolling-window VaR capital requirement
//! - `analysis`: end-to-end run over a grid of h' values
//!
//! ## Usage
//!
//! ```bash
//! # Liquidation curve and implied h'
//! cargo run --bin liquidation --release -- --returns returns.json
//!
//! # Tail loss and expected shortfall at a given h'
//! cargo run --bin tail_risk --release -- --haircut-dash 0.05
//!
//! # Capital requirement from rolling VaR
//! cargo run --bin capital --release
//! ```

pub mod analysis;
pub mod bootstrap;
pub mod capital;
pub mod config;
pub mod error;
pub mod liquidation;
pub mod logging;
pub mod pnl;
pub mod provider;
pub mod series;
pub mod stats;
pub mod tail;
pub mod threshold;

pub use analysis::{RiskAnalysis, RiskReport};
pub use bootstrap::{BlockBootstrap, BootstrapMatrix, BootstrapSample};
pub use config::RiskConfig;
pub use error::{Result, RiskError};
pub use liquidation::{Boundary, EarlyCheck, LiquidationPolicy};
pub use series::ReturnSeries;
pub use stats::Estimate;
