//! Protocol PnL from liquidations.
//!
//! A liquidated draw pays the protocol `(1 + h') * exp(R) - (1 + rateK)`:
//! the collateral recovered at the horizon return minus the debt and the
//! challenger fee. Draws that are not liquidated contribute zero.

use serde::{Deserialize, Serialize};
use statrs::distribution::{Continuous, StudentsT};
use tracing::debug;

use crate::bootstrap::BootstrapSample;
use crate::error::{Result, RiskError};
use crate::liquidation::{replicate_means, LiquidationPolicy};
use crate::stats::{self, Estimate};
use crate::threshold::threshold;

/// PnL of one draw given its liquidation indicator.
pub fn liquidation_pnl(haircut_dash: f64, challenger_fee: f64, ret: f64, liquidated: bool) -> f64 {
    if liquidated {
        (1.0 + haircut_dash) * ret.exp() - (1.0 + challenger_fee)
    } else {
        0.0
    }
}

/// Expected PnL per position at `h_dash`, as the mean over replicates of
/// `sum_k D * ((1 + h') e^R - (1 + rateK)) / K`, with its standard error.
pub fn expected_pnl(
    haircut: f64,
    haircut_dash: f64,
    challenger_fee: f64,
    sample: &BootstrapSample,
    policy: &LiquidationPolicy,
) -> Result<Estimate> {
    let thresh = threshold(haircut, haircut_dash);
    let per_replicate = replicate_means(sample, policy, thresh, |r, d| {
        liquidation_pnl(haircut_dash, challenger_fee, r, d)
    })?;
    let estimate = Estimate::from_replicates(&per_replicate);
    debug!(haircut_dash, mean = estimate.mean, se = estimate.standard_error, "expected pnl");
    Ok(estimate)
}

/// Return density for the analytic loss premium.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum ReturnDistribution {
    Normal,
    StudentT { degrees_of_freedom: f64 },
}

impl ReturnDistribution {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Normal => "normal",
            Self::StudentT { .. } => "student-t",
        }
    }
}

/// Fair premium for the liquidation shortfall when horizon returns follow a
/// centred density with scale `sigma`:
/// `-integral_{-inf}^{k} ((1 + h) e^r - (1 + c)) f(r) dr`,
/// `k = ln((1 + c) / (1 + h))`.
pub fn loss_premium(
    distribution: ReturnDistribution,
    sigma: f64,
    haircut: f64,
    challenger_fee: f64,
) -> Result<f64> {
    if !(sigma > 0.0) {
        return Err(RiskError::config("sigma", "must be positive"));
    }
    let k = ((1.0 + challenger_fee) / (1.0 + haircut)).ln();
    match distribution {
        ReturnDistribution::Normal => {
            // E[e^r; r < k] = e^{s^2/2} Phi(k/s - s)
            let tail_exp = (0.5 * sigma * sigma).exp() * stats::normal_cdf(k / sigma - sigma, 0.0, 1.0);
            let tail_prob = stats::normal_cdf(k, 0.0, sigma);
            Ok(-((1.0 + haircut) * tail_exp - (1.0 + challenger_fee) * tail_prob))
        }
        ReturnDistribution::StudentT { degrees_of_freedom } => {
            let dist = StudentsT::new(0.0, sigma, degrees_of_freedom)
                .map_err(|e| RiskError::config("degrees_of_freedom", e.to_string()))?;
            // heavy tail: integrate far out; the truncated mass is negligible
            let lower = k - 400.0 * sigma;
            let integrand = |r: f64| ((1.0 + haircut) * r.exp() - (1.0 + challenger_fee)) * dist.pdf(r);
            Ok(-simpson(integrand, lower, k, 200_000))
        }
    }
}

/// Composite Simpson rule with `intervals` (rounded up to even) panels.
pub(crate) fn simpson<F: Fn(f64) -> f64>(f: F, a: f64, b: f64, intervals: usize) -> f64 {
    let n = (intervals.max(2) + 1) / 2 * 2;
    let h = (b - a) / n as f64;
    let mut acc = f(a) + f(b);
    for i in 1..n {
        let x = a + i as f64 * h;
        acc += if i % 2 == 1 { 4.0 } else { 2.0 } * f(x);
    }
    acc * h / 3.0
}
