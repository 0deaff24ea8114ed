//! Liquidation Probability Estimator
//!
//! For a candidate h' every bootstrap draw is turned into a liquidation
//! indicator `D`; the per-replicate frequency of `D` estimates the
//! probability of liquidation and its spread across replicates gives the
//! standard error.
//!
//! ## Early liquidation check
//! When window maxima are available the policy decides how they gate the
//! nominal breach. The default counts a draw only when the maximum also
//! stayed below the threshold, i.e. the price never recovered during the
//! window and the liquidation was not averted.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::bootstrap::BootstrapSample;
use crate::error::Result;
use crate::stats::{self, Estimate};
use crate::threshold::threshold;

/// Comparison used at the threshold itself.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Boundary {
    /// `R < threshold`
    #[default]
    Strict,
    /// `R <= threshold`
    Inclusive,
}

impl Boundary {
    pub fn breached(self, value: f64, threshold: f64) -> bool {
        match self {
            Self::Strict => value < threshold,
            Self::Inclusive => value <= threshold,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EarlyCheck {
    /// Nominal horizon return only
    Ignore,
    /// Nominal breach and the window maximum stayed below the threshold
    #[default]
    NotAverted,
    /// Nominal breach although the window maximum crossed the threshold
    Averted,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LiquidationPolicy {
    pub boundary: Boundary,
    pub early_check: EarlyCheck,
}

impl LiquidationPolicy {
    pub const NOMINAL: Self = Self {
        boundary: Boundary::Strict,
        early_check: EarlyCheck::Ignore,
    };

    pub fn with_early_check(self, early_check: EarlyCheck) -> Self {
        Self {
            early_check,
            ..self
        }
    }

    /// Liquidation indicator `D` for one draw. Without a window maximum the
    /// early check does not apply.
    pub fn indicator(&self, ret: f64, max_ret: Option<f64>, threshold: f64) -> bool {
        let nominal = self.boundary.breached(ret, threshold);
        match (self.early_check, max_ret) {
            (EarlyCheck::Ignore, _) | (_, None) => nominal,
            (EarlyCheck::NotAverted, Some(m)) => nominal && self.boundary.breached(m, threshold),
            (EarlyCheck::Averted, Some(m)) => nominal && !self.boundary.breached(m, threshold),
        }
    }

    fn uses_max(&self) -> bool {
        self.early_check != EarlyCheck::Ignore
    }
}

/// Per-replicate mean of `f(R, D)` over the `K` draws of each row.
pub(crate) fn replicate_means<F>(
    sample: &BootstrapSample,
    policy: &LiquidationPolicy,
    thresh: f64,
    f: F,
) -> Result<Vec<f64>>
where
    F: Fn(f64, bool) -> f64 + Sync + Send,
{
    let k = sample.returns.draws() as f64;
    match &sample.max_returns {
        Some(max) if policy.uses_max() => sample.returns.zip_rows(max, |row, max_row| {
            row.iter()
                .zip(max_row)
                .map(|(&r, &m)| f(r, policy.indicator(r, Some(m), thresh)))
                .sum::<f64>()
                / k
        }),
        _ => Ok(sample.returns.map_rows(|row| {
            row.iter()
                .map(|&r| f(r, policy.indicator(r, None, thresh)))
                .sum::<f64>()
                / k
        })),
    }
}

/// Probability of liquidation at `h_dash`: mean of the per-replicate
/// liquidation frequencies and their standard error.
pub fn liquidation_probability(
    haircut: f64,
    haircut_dash: f64,
    sample: &BootstrapSample,
    policy: &LiquidationPolicy,
) -> Result<Estimate> {
    let thresh = threshold(haircut, haircut_dash);
    let per_replicate = replicate_means(sample, policy, thresh, |_, d| if d { 1.0 } else { 0.0 })?;
    let estimate = Estimate::from_replicates(&per_replicate);
    debug!(
        haircut_dash,
        thresh,
        mean = estimate.mean,
        se = estimate.standard_error,
        "liquidation probability"
    );
    Ok(estimate)
}

/// Closed-form probability under normal `n`-period returns with per-period
/// moments `mu`, `sigma`: `Phi((threshold - n mu) / (sqrt(n) sigma))`.
pub fn normal_liquidation_probability(
    haircut: f64,
    haircut_dash: f64,
    mu: f64,
    sigma: f64,
    periods: usize,
) -> f64 {
    let n = periods as f64;
    stats::normal_cdf(threshold(haircut, haircut_dash), mu * n, sigma * n.sqrt())
}
