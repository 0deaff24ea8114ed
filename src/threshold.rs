//! Threshold model
//!
//! A position with collateral ratio `1 + h'` is liquidated when
//! `(1 + h') * exp(R) <= 1 + h`, i.e. when the horizon log-return `R` falls
//! below `ln(1 + h) - ln(1 + h')`.

use serde::Serialize;

use crate::bootstrap::BootstrapMatrix;
use crate::stats::{self, Estimate};

pub fn threshold(haircut: f64, haircut_dash: f64) -> f64 {
    (1.0 + haircut).ln() - (1.0 + haircut_dash).ln()
}

/// Smallest h' that keeps the liquidation frequency of `returns` at `alpha`:
/// the `(1 - alpha)` quantile of `V = (1 + h) * exp(-R) - 1`.
pub fn implied_haircut(haircut: f64, alpha: f64, returns: &[f64]) -> f64 {
    let v: Vec<f64> = returns
        .iter()
        .map(|r| (1.0 + haircut) * (-r).exp() - 1.0)
        .collect();
    stats::quantile(&v, 1.0 - alpha)
}

/// Implied h' estimated separately on every replicate row.
#[derive(Debug, Clone, Serialize)]
pub struct ImpliedHaircut {
    pub alpha: f64,
    #[serde(skip)]
    pub per_replicate: Vec<f64>,
    pub estimate: Estimate,
    pub variance: f64,
}

impl ImpliedHaircut {
    pub fn estimate(haircut: f64, alpha: f64, returns: &BootstrapMatrix) -> Self {
        let per_replicate = returns.map_rows(|row| implied_haircut(haircut, alpha, row));
        Self {
            alpha,
            estimate: Estimate::from_replicates(&per_replicate),
            variance: stats::variance(&per_replicate),
            per_replicate,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_threshold_zero_at_maintenance() {
        assert!(threshold(0.1, 0.1).abs() < 1e-15);
        assert!((threshold(0.1, 0.0) - 1.1f64.ln()).abs() < 1e-15);
    }

    #[test]
    fn test_implied_haircut_hits_target_frequency() {
        let returns: Vec<f64> = (0..1000).map(|i| -0.1 + 0.2 * i as f64 / 999.0).collect();
        let h = 0.1;
        let alpha = 0.3;
        let h_dash = implied_haircut(h, alpha, &returns);
        let thresh = threshold(h, h_dash);
        let freq = returns.iter().filter(|&&r| r <= thresh).count() as f64 / returns.len() as f64;
        assert!((freq - alpha).abs() < 0.01, "frequency {freq}");
    }

    #[test]
    fn test_per_replicate_vector() {
        let m = BootstrapMatrix::from_rows(vec![vec![0.0; 10], vec![0.0; 10], vec![0.0; 10]]).unwrap();
        let implied = ImpliedHaircut::estimate(0.1, 0.5, &m);
        assert_eq!(implied.per_replicate.len(), 3);
        assert!((implied.estimate.mean - 0.1).abs() < 1e-12);
        assert!(implied.variance.abs() < 1e-15);
    }

    proptest! {
        #[test]
        fn prop_threshold_positive_and_decreasing(
            h in -0.5..1.0f64,
            gap in 1e-4..0.9f64,
            step in 1e-4..0.5f64,
        ) {
            let h_dash = h - gap;
            prop_assume!(h_dash > -1.0);
            prop_assert!(threshold(h, h_dash) > 0.0);
            prop_assert!(threshold(h, h_dash) > threshold(h, h_dash + step));
        }
    }
}
