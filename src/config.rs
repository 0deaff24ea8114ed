//! Estimation parameters.
//!
//! Every estimator receives these values explicitly; nothing is read from
//! shared state.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{Result, RiskError};
use crate::liquidation::LiquidationPolicy;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskConfig {
    /// Maintenance haircut `h`
    pub haircut: f64,
    /// Challenger fee `rateK` paid to the liquidator
    pub challenger_fee: f64,
    /// Risk horizon `tau`, minutes
    pub horizon_minutes: f64,
    /// Sampling interval of the source series `TauIn`, minutes
    pub interval_minutes: f64,
    /// Outer Monte-Carlo replicates `B`
    pub replicates: usize,
    /// Inner draws per replicate `K`; `None` uses the series length
    pub draws: Option<usize>,
    /// One-sided confidence for the reported bands
    pub confidence: f64,
    /// Target liquidation probability used to infer h'
    pub liquidation_probability: f64,
    /// Expected shortfall level `Q`
    pub es_level: f64,
    /// Loss quantile selecting the GPD tail sample
    pub tail_quantile: f64,
    pub min_tail_size: usize,
    /// Accept horizons spanning the whole series (observations reused per draw)
    pub allow_wrap_reuse: bool,
    pub seed: Option<u64>,
    pub policy: LiquidationPolicy,
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            haircut: 0.10,
            challenger_fee: 0.02,
            horizon_minutes: 24.0 * 60.0,
            interval_minutes: 1440.0,
            replicates: 5_000,
            draws: None,
            confidence: 0.99,
            liquidation_probability: 0.9,
            es_level: 0.95,
            tail_quantile: 0.9,
            min_tail_size: 50,
            allow_wrap_reuse: true,
            seed: None,
            policy: LiquidationPolicy::default(),
        }
    }
}

impl RiskConfig {
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.interval_minutes > 0.0) {
            return Err(RiskError::config("interval_minutes", "must be positive"));
        }
        if !(self.horizon_minutes >= self.interval_minutes) {
            return Err(RiskError::config(
                "horizon_minutes",
                format!(
                    "horizon {} is shorter than the sampling interval {}",
                    self.horizon_minutes, self.interval_minutes
                ),
            ));
        }
        if self.replicates == 0 {
            return Err(RiskError::config("replicates", "must be at least 1"));
        }
        if self.draws == Some(0) {
            return Err(RiskError::config("draws", "must be at least 1"));
        }
        if !(self.haircut > -1.0) {
            return Err(RiskError::config("haircut", "must be greater than -1"));
        }
        if !(self.challenger_fee > -1.0) {
            return Err(RiskError::config("challenger_fee", "must be greater than -1"));
        }
        for (field, p) in [
            ("confidence", self.confidence),
            ("liquidation_probability", self.liquidation_probability),
            ("es_level", self.es_level),
            ("tail_quantile", self.tail_quantile),
        ] {
            if !(p > 0.0 && p < 1.0) {
                return Err(RiskError::config(field, format!("{p} is not in (0, 1)")));
            }
        }
        Ok(())
    }

    /// Number of source observations summed into one horizon return,
    /// `n = round(tau / TauIn)`.
    pub fn horizon_length(&self) -> Result<usize> {
        self.validate()?;
        Ok(horizon_length(self.horizon_minutes, self.interval_minutes))
    }

    /// Checks `n` against the series length `L` under the wrap policy and
    /// logs a warning unless the horizon is small next to the series.
    pub fn check_wrap(&self, n: usize, series_len: usize) -> Result<WrapStatus> {
        if series_len == 0 {
            return Err(RiskError::EmptySeries);
        }
        let status = WrapStatus::classify(n, series_len);
        match status {
            WrapStatus::Wraps if !self.allow_wrap_reuse => {
                return Err(RiskError::config(
                    "horizon_minutes",
                    format!("horizon of {n} observations covers the whole series of {series_len}"),
                ));
            }
            WrapStatus::Wraps => {
                warn!(n, series_len, "horizon wraps the full series; draws reuse observations")
            }
            WrapStatus::Overlapping => {
                warn!(n, series_len, "horizon is a large fraction of the series; blocks overlap heavily")
            }
            WrapStatus::Clear => {}
        }
        Ok(status)
    }

    pub fn draws_for(&self, series_len: usize) -> usize {
        self.draws.unwrap_or(series_len)
    }
}

/// How a block of `n` observations sits against a series of length `L`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum WrapStatus {
    /// `10 n < L`
    Clear,
    /// `n < L <= 10 n`
    Overlapping,
    /// `n >= L`: a single draw reuses observations
    Wraps,
}

impl WrapStatus {
    pub fn classify(n: usize, series_len: usize) -> Self {
        if n >= series_len {
            Self::Wraps
        } else if n * 10 >= series_len {
            Self::Overlapping
        } else {
            Self::Clear
        }
    }

    pub fn is_flagged(self) -> bool {
        self != Self::Clear
    }
}

pub fn horizon_length(horizon_minutes: f64, interval_minutes: f64) -> usize {
    (horizon_minutes / interval_minutes).round().max(1.0) as usize
}
