//! Sample statistics shared by the estimators.
//!
//! Conventions follow the usual numerical array defaults: standard
//! deviations are population (`ddof = 0`) and quantiles interpolate
//! linearly between order statistics.

use serde::{Deserialize, Serialize};
use statrs::distribution::{ContinuousCDF, Normal};

pub fn mean(xs: &[f64]) -> f64 {
    if xs.is_empty() {
        return f64::NAN;
    }
    xs.iter().sum::<f64>() / xs.len() as f64
}

/// Population variance.
pub fn variance(xs: &[f64]) -> f64 {
    if xs.is_empty() {
        return f64::NAN;
    }
    let m = mean(xs);
    xs.iter().map(|x| (x - m).powi(2)).sum::<f64>() / xs.len() as f64
}

pub fn std_dev(xs: &[f64]) -> f64 {
    variance(xs).sqrt()
}

/// Linear-interpolated quantile of an already sorted slice.
pub fn quantile_sorted(sorted: &[f64], p: f64) -> f64 {
    if sorted.is_empty() {
        return f64::NAN;
    }
    let p = p.clamp(0.0, 1.0);
    let pos = p * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    let frac = pos - lo as f64;
    sorted[lo] + (sorted[hi] - sorted[lo]) * frac
}

/// Linear-interpolated quantile; sorts a copy of the input.
pub fn quantile(xs: &[f64], p: f64) -> f64 {
    let mut sorted = xs.to_vec();
    sorted.sort_by(f64::total_cmp);
    quantile_sorted(&sorted, p)
}

/// Standard normal quantile, e.g. `z_critical(0.99) ~= 2.326`.
pub fn z_critical(confidence: f64) -> f64 {
    match Normal::new(0.0, 1.0) {
        Ok(normal) => normal.inverse_cdf(confidence),
        Err(_) => f64::NAN,
    }
}

/// Normal CDF at `x` for the given moments.
pub fn normal_cdf(x: f64, mu: f64, sigma: f64) -> f64 {
    match Normal::new(mu, sigma) {
        Ok(normal) => normal.cdf(x),
        Err(_) => f64::NAN,
    }
}

/// Mean and standard error of a statistic computed once per bootstrap replicate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Estimate {
    pub mean: f64,
    pub standard_error: f64,
}

impl Estimate {
    /// Aggregates per-replicate values: mean and `std / sqrt(B)`.
    pub fn from_replicates(values: &[f64]) -> Self {
        let b = values.len() as f64;
        Self {
            mean: mean(values),
            standard_error: std_dev(values) / b.sqrt(),
        }
    }

    pub fn half_width(&self, z: f64) -> f64 {
        z * self.standard_error
    }

    /// `mean -/+ z * se`. This is a normal approximation to the distribution
    /// of the replicate statistic, not an exact interval.
    pub fn band(&self, z: f64) -> (f64, f64) {
        let w = self.half_width(z);
        (self.mean - w, self.mean + w)
    }

    pub fn contains(&self, value: f64, z: f64) -> bool {
        let (lo, hi) = self.band(z);
        value >= lo && value <= hi
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quantile_interpolates() {
        let xs = [4.0, 1.0, 3.0, 2.0];
        assert!((quantile(&xs, 0.0) - 1.0).abs() < 1e-12);
        assert!((quantile(&xs, 1.0) - 4.0).abs() < 1e-12);
        assert!((quantile(&xs, 0.5) - 2.5).abs() < 1e-12);
        assert!((quantile(&xs, 0.9) - 3.7).abs() < 1e-12);
    }

    #[test]
    fn test_population_std() {
        let xs = [1.0, 2.0, 3.0, 4.0];
        assert!((variance(&xs) - 1.25).abs() < 1e-12);
    }

    #[test]
    fn test_z_critical() {
        assert!((z_critical(0.99) - 2.3263).abs() < 1e-3);
        assert!((z_critical(0.5)).abs() < 1e-9);
    }

    #[test]
    fn test_estimate_band() {
        let est = Estimate::from_replicates(&[0.1, 0.2, 0.3, 0.4]);
        assert!((est.mean - 0.25).abs() < 1e-12);
        assert!((est.standard_error - 1.25f64.sqrt() * 0.1 / 2.0).abs() < 1e-12);
        let (lo, hi) = est.band(2.0);
        assert!(lo < est.mean && hi > est.mean);
        assert!(est.contains(0.25, 0.0));
    }
}
