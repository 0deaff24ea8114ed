//! Rolling-window Value at Risk and the capital it implies.
//!
//! Overlapping multi-day returns are built from the series, the lower
//! quantile of those returns gives the VaR of the collateral, and the
//! equity a lender must hold follows from the haircut.

use serde::{Deserialize, Serialize};

use crate::error::{Result, RiskError};
use crate::series::ReturnSeries;
use crate::stats;

/// Multiplier applied to the equity requirement for risk weighted assets.
pub const RWA_MULTIPLIER: f64 = 1.5;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CapitalSettings {
    /// Window in source intervals (e.g. 5 daily returns)
    pub window: usize,
    /// Lower-tail probability of the VaR quantile
    pub tail_probability: f64,
    pub challenger_fee: f64,
    pub haircut: f64,
}

impl Default for CapitalSettings {
    fn default() -> Self {
        Self {
            window: 5,
            tail_probability: 0.01,
            challenger_fee: 0.02,
            haircut: 0.10,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct CapitalRequirement {
    pub window: usize,
    pub windows_used: usize,
    /// Quantile of the rolling log-returns
    pub return_quantile: f64,
    /// `(1 - e^q) + fee`
    pub var: f64,
    /// `VaR * (1 + h) - h`
    pub equity: f64,
    pub risk_weighted_assets: f64,
}

impl CapitalRequirement {
    pub fn print(&self) {
        println!(
            "  VaR {}-period: return = {:.2}%, VaR = {:.2}%",
            self.window,
            self.return_quantile * 100.0,
            self.var * 100.0
        );
        println!("  Windows used:            {}", self.windows_used);
        println!("  Equity E:                {:.2}%", self.equity * 100.0);
        println!("  RWA:                     {:.2}%", self.risk_weighted_assets * 100.0);
    }
}

pub fn capital_requirement(series: &ReturnSeries, settings: &CapitalSettings) -> Result<CapitalRequirement> {
    if settings.window == 0 {
        return Err(RiskError::config("window", "must be at least 1"));
    }
    if !(settings.tail_probability > 0.0 && settings.tail_probability < 1.0) {
        return Err(RiskError::config("tail_probability", "must be in (0, 1)"));
    }
    let sums = series.rolling_sums(settings.window);
    if sums.is_empty() {
        return Err(RiskError::config(
            "window",
            format!("window {} exceeds series length {}", settings.window, series.len()),
        ));
    }
    let q = stats::quantile(&sums, settings.tail_probability);
    let var = (1.0 - q.exp()) + settings.challenger_fee;
    let equity = var * (1.0 + settings.haircut) - settings.haircut;
    Ok(CapitalRequirement {
        window: settings.window,
        windows_used: sums.len(),
        return_quantile: q,
        var,
        equity,
        risk_weighted_assets: equity * RWA_MULTIPLIER,
    })
}
