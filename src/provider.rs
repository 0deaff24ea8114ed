//! Return-series input.
//!
//! Market-data acquisition and cleaning happen elsewhere; this module only
//! reads an already prepared series from JSON, or synthesises one for demos
//! and tests.

use std::path::Path;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{Result, RiskError};
use crate::series::ReturnSeries;

/// On-disk layout: `{"returns": [...], "max_returns": [...]}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeriesFile {
    pub returns: Vec<f64>,
    #[serde(default)]
    pub max_returns: Option<Vec<f64>>,
}

impl SeriesFile {
    pub fn into_series(self) -> Result<ReturnSeries> {
        let series = ReturnSeries::new(self.returns)?;
        match self.max_returns {
            Some(max) => series.with_max_returns(max),
            None => Ok(series),
        }
    }
}

pub fn load_series(path: impl AsRef<Path>) -> Result<ReturnSeries> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path)?;
    let file: SeriesFile = serde_json::from_str(&text)?;
    let series = file.into_series()?;
    info!(path = %path.display(), len = series.len(), has_max = series.max_returns().is_some(), "loaded return series");
    Ok(series)
}

/// i.i.d. Normal(`mu`, `sigma`) log-returns with intra-interval maxima
/// `max(0, r) + |N(0, sigma / 2)|`, so the maximum is never below the open
/// or the close.
pub fn synthetic_normal<R: Rng + ?Sized>(
    rng: &mut R,
    len: usize,
    mu: f64,
    sigma: f64,
) -> Result<ReturnSeries> {
    let normal = Normal::new(mu, sigma).map_err(|e| RiskError::config("sigma", e.to_string()))?;
    let wick = Normal::new(0.0, sigma / 2.0).map_err(|e| RiskError::config("sigma", e.to_string()))?;
    let returns: Vec<f64> = (0..len).map(|_| normal.sample(rng)).collect();
    let max_returns: Vec<f64> = returns
        .iter()
        .map(|&r| r.max(0.0) + wick.sample(rng).abs())
        .collect();
    ReturnSeries::new(returns)?.with_max_returns(max_returns)
}

/// Series from `path`, or a synthetic daily series (2% volatility) seeded
/// with `seed` when no path is given.
pub fn load_or_synthetic(path: Option<&Path>, len: usize, seed: u64) -> Result<ReturnSeries> {
    match path {
        Some(path) => load_series(path),
        None => {
            info!(len, seed, "no return series given; using synthetic normal returns");
            let mut rng = StdRng::seed_from_u64(seed);
            synthetic_normal(&mut rng, len, 0.0, 0.02)
        }
    }
}
