//! Historical log-return series.

use serde::Serialize;

use crate::error::{Result, RiskError};
use crate::stats;

/// Ordered log-returns, one per sampling interval, with an optional parallel
/// series of intra-interval maximum log-returns. Immutable once built.
#[derive(Debug, Clone, PartialEq)]
pub struct ReturnSeries {
    returns: Vec<f64>,
    max_returns: Option<Vec<f64>>,
}

impl ReturnSeries {
    pub fn new(returns: Vec<f64>) -> Result<Self> {
        if returns.is_empty() {
            return Err(RiskError::EmptySeries);
        }
        check_finite("returns", &returns)?;
        Ok(Self {
            returns,
            max_returns: None,
        })
    }

    pub fn with_max_returns(mut self, max_returns: Vec<f64>) -> Result<Self> {
        if max_returns.len() != self.returns.len() {
            return Err(RiskError::LengthMismatch {
                expected: self.returns.len(),
                found: max_returns.len(),
            });
        }
        check_finite("max_returns", &max_returns)?;
        self.max_returns = Some(max_returns);
        Ok(self)
    }

    pub fn len(&self) -> usize {
        self.returns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.returns.is_empty()
    }

    pub fn returns(&self) -> &[f64] {
        &self.returns
    }

    pub fn max_returns(&self) -> Option<&[f64]> {
        self.max_returns.as_deref()
    }

    pub fn summary(&self) -> SeriesSummary {
        SeriesSummary {
            len: self.returns.len(),
            mean: stats::mean(&self.returns),
            std_dev: stats::std_dev(&self.returns),
            min: self.returns.iter().copied().fold(f64::INFINITY, f64::min),
            max: self.returns.iter().copied().fold(f64::NEG_INFINITY, f64::max),
        }
    }

    /// Sums over every window of `window` consecutive returns (no wrap),
    /// i.e. overlapping multi-period returns. Empty when the window exceeds
    /// the series.
    pub fn rolling_sums(&self, window: usize) -> Vec<f64> {
        if window == 0 || window > self.returns.len() {
            return Vec::new();
        }
        let mut out = Vec::with_capacity(self.returns.len() - window + 1);
        let mut acc: f64 = self.returns[..window].iter().sum();
        out.push(acc);
        for i in window..self.returns.len() {
            acc += self.returns[i] - self.returns[i - window];
            out.push(acc);
        }
        out
    }
}

fn check_finite(field: &'static str, xs: &[f64]) -> Result<()> {
    match xs.iter().position(|x| !x.is_finite()) {
        Some(idx) => Err(RiskError::config(field, format!("non-finite value at index {idx}"))),
        None => Ok(()),
    }
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct SeriesSummary {
    pub len: usize,
    pub mean: f64,
    pub std_dev: f64,
    pub min: f64,
    pub max: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_series_rejected() {
        assert_eq!(ReturnSeries::new(vec![]), Err(RiskError::EmptySeries));
    }

    #[test]
    fn test_max_series_length_checked() {
        let series = ReturnSeries::new(vec![0.1, 0.2, 0.3]).unwrap();
        let err = series.with_max_returns(vec![0.1]).unwrap_err();
        assert_eq!(err, RiskError::LengthMismatch { expected: 3, found: 1 });
    }

    #[test]
    fn test_non_finite_rejected() {
        assert!(ReturnSeries::new(vec![0.1, f64::NAN]).is_err());
    }

    #[test]
    fn test_rolling_sums() {
        let series = ReturnSeries::new(vec![0.1, 0.1, 0.2, 0.2, 0.4, 0.6]).unwrap();
        let sums = series.rolling_sums(2);
        let expected = [0.2, 0.3, 0.4, 0.6, 1.0];
        assert_eq!(sums.len(), expected.len());
        for (a, b) in sums.iter().zip(expected.iter()) {
            assert!((a - b).abs() < 1e-12);
        }
        assert!(series.rolling_sums(7).is_empty());
    }

    #[test]
    fn test_summary() {
        let series = ReturnSeries::new(vec![-0.02, 0.0, 0.02]).unwrap();
        let s = series.summary();
        assert_eq!(s.len, 3);
        assert!(s.mean.abs() < 1e-12);
        assert_eq!(s.min, -0.02);
        assert_eq!(s.max, 0.02);
    }
}
