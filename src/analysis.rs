//! End-to-end liquidation risk analysis.
//!
//! Ties the pieces together for one return series and one configuration:
//! a fresh bootstrap sample per run, the liquidation curve over a grid of
//! h' values, the implied h' for the target probability, and the tail
//! report for a chosen h'.

use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Serialize;
use tracing::info;

use crate::bootstrap::{BlockBootstrap, BootstrapSample};
use crate::config::RiskConfig;
use crate::error::Result;
use crate::liquidation::{liquidation_probability, normal_liquidation_probability, LiquidationPolicy};
use crate::pnl::expected_pnl;
use crate::series::{ReturnSeries, SeriesSummary};
use crate::stats::{self, Estimate};
use crate::tail::{analyze_tail, LossModel, TailRiskReport, TailSettings, TailThreshold};
use crate::threshold::ImpliedHaircut;

/// Draws used for the tail loss sample when the horizon spans several
/// source intervals.
const MIN_TAIL_DRAWS: usize = 10_000;

/// h' values from -5% to 25% in 0.5% steps.
pub fn default_grid() -> Vec<f64> {
    (0..=60).map(|i| -0.05 + 0.005 * i as f64).collect()
}

#[derive(Debug, Clone, Serialize)]
pub struct CurvePoint {
    pub haircut_dash: f64,
    /// Under the configured policy (early check applied when maxima exist)
    pub probability: Estimate,
    /// Nominal horizon return only
    pub probability_nominal: Estimate,
    /// Normal approximation from the sample moments
    pub probability_normal: f64,
    pub pnl: Estimate,
}

#[derive(Debug, Clone, Serialize)]
pub struct RiskReport {
    pub config: RiskConfig,
    pub seed: u64,
    pub summary: SeriesSummary,
    pub horizon_length: usize,
    pub replicates: usize,
    pub draws: usize,
    pub z_critical: f64,
    pub implied_haircut: ImpliedHaircut,
    pub curve: Vec<CurvePoint>,
    pub tail: TailRiskReport,
}

impl RiskReport {
    pub fn print_curve(&self) {
        let z = self.z_critical;
        println!("| h'     | P(liq) %        | P(liq) nominal % | P normal % | E[P|h'] %       |");
        println!("|--------|-----------------|------------------|------------|-----------------|");
        for p in &self.curve {
            println!(
                "| {:6.3} | {:6.2} +/- {:4.2} | {:6.2} +/- {:5.2} | {:10.2} | {:6.2} +/- {:4.2} |",
                p.haircut_dash,
                p.probability.mean * 100.0,
                p.probability.half_width(z) * 100.0,
                p.probability_nominal.mean * 100.0,
                p.probability_nominal.half_width(z) * 100.0,
                p.probability_normal * 100.0,
                p.pnl.mean * 100.0,
                p.pnl.half_width(z) * 100.0,
            );
        }
    }

    pub fn print_implied(&self) {
        let h = &self.implied_haircut;
        println!(
            "  alpha = {:.2}; h' = {:.4} +/- {:.4} (variance {:.2e})",
            h.alpha,
            h.estimate.mean,
            h.estimate.half_width(self.z_critical),
            h.variance
        );
    }
}

pub struct RiskAnalysis<'a> {
    series: &'a ReturnSeries,
    config: &'a RiskConfig,
    sampler: BlockBootstrap<'a>,
}

impl<'a> RiskAnalysis<'a> {
    pub fn new(series: &'a ReturnSeries, config: &'a RiskConfig) -> Result<Self> {
        config.validate()?;
        let sampler = BlockBootstrap::for_series(series, config)?;
        Ok(Self {
            series,
            config,
            sampler,
        })
    }

    pub fn sampler(&self) -> &BlockBootstrap<'a> {
        &self.sampler
    }

    pub fn draws(&self) -> usize {
        self.config.draws_for(self.series.len())
    }

    /// Fresh `(B, K)` sample; a random seed is drawn and logged when the
    /// configuration has none.
    pub fn bootstrap(&self) -> Result<(u64, BootstrapSample)> {
        let seed = self.config.seed.unwrap_or_else(rand::random);
        info!(
            seed,
            replicates = self.config.replicates,
            draws = self.draws(),
            n = self.sampler.block_len(),
            "bootstrapping horizon returns"
        );
        let sample = self
            .sampler
            .sample_seeded(seed, self.config.replicates, self.draws())?;
        Ok((seed, sample))
    }

    pub fn curve_point(&self, sample: &BootstrapSample, haircut_dash: f64) -> Result<CurvePoint> {
        let c = self.config;
        let summary = self.series.summary();
        Ok(CurvePoint {
            haircut_dash,
            probability: liquidation_probability(c.haircut, haircut_dash, sample, &c.policy)?,
            probability_nominal: liquidation_probability(
                c.haircut,
                haircut_dash,
                sample,
                &LiquidationPolicy::NOMINAL,
            )?,
            probability_normal: normal_liquidation_probability(
                c.haircut,
                haircut_dash,
                summary.mean,
                summary.std_dev,
                self.sampler.block_len(),
            ),
            pnl: expected_pnl(c.haircut, haircut_dash, c.challenger_fee, sample, &c.policy)?,
        })
    }

    pub fn liquidation_curve(&self, sample: &BootstrapSample, grid: &[f64]) -> Result<Vec<CurvePoint>> {
        grid.iter().map(|&hd| self.curve_point(sample, hd)).collect()
    }

    pub fn implied_haircut(&self, sample: &BootstrapSample) -> ImpliedHaircut {
        ImpliedHaircut::estimate(
            self.config.haircut,
            self.config.liquidation_probability,
            &sample.returns,
        )
    }

    /// Horizon returns (and maxima) for the loss distribution: the series
    /// itself when one interval is one horizon, block draws otherwise.
    pub fn horizon_returns(&self, seed: u64) -> (Vec<f64>, Option<Vec<f64>>) {
        if self.sampler.block_len() == 1 {
            return (
                self.series.returns().to_vec(),
                self.series.max_returns().map(<[f64]>::to_vec),
            );
        }
        let mut rng = StdRng::seed_from_u64(seed);
        let count = self.series.len().max(MIN_TAIL_DRAWS);
        self.sampler.sample_with_max(&mut rng, count)
    }

    pub fn losses(&self, haircut_dash: f64, seed: u64) -> Result<Vec<f64>> {
        let c = self.config;
        let (returns, max_returns) = self.horizon_returns(seed);
        let model = LossModel {
            haircut: c.haircut,
            haircut_dash,
            challenger_fee: c.challenger_fee,
            policy: c.policy,
        };
        model.losses(&returns, max_returns.as_deref())
    }

    pub fn tail(&self, haircut_dash: f64, seed: u64) -> Result<TailRiskReport> {
        let c = self.config;
        let losses = self.losses(haircut_dash, seed)?;
        let settings = TailSettings {
            threshold: TailThreshold::Quantile(c.tail_quantile),
            es_level: c.es_level,
            min_tail_size: c.min_tail_size,
        };
        analyze_tail(&losses, &settings)
    }

    pub fn run(&self, grid: &[f64], tail_haircut_dash: f64) -> Result<RiskReport> {
        let (seed, sample) = self.bootstrap()?;
        let curve = self.liquidation_curve(&sample, grid)?;
        let implied_haircut = self.implied_haircut(&sample);
        let tail = self.tail(tail_haircut_dash, seed)?;
        Ok(RiskReport {
            config: self.config.clone(),
            seed,
            summary: self.series.summary(),
            horizon_length: self.sampler.block_len(),
            replicates: self.config.replicates,
            draws: self.draws(),
            z_critical: stats::z_critical(self.config.confidence),
            implied_haircut,
            curve,
            tail,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RiskError;
    use crate::provider::synthetic_normal;
    use rand_distr::{Distribution, Normal};

    fn normal_series(len: usize, sigma: f64, seed: u64) -> ReturnSeries {
        let mut rng = StdRng::seed_from_u64(seed);
        let normal = Normal::new(0.0, sigma).unwrap();
        ReturnSeries::new((0..len).map(|_| normal.sample(&mut rng)).collect()).unwrap()
    }

    #[test]
    fn test_daily_scenario_against_normal_cdf() {
        let series = normal_series(10_000, 0.02, 2024);
        let config = RiskConfig {
            haircut: 0.10,
            challenger_fee: 0.02,
            horizon_minutes: 24.0 * 60.0,
            interval_minutes: 1440.0,
            replicates: 2_000,
            draws: Some(500),
            seed: Some(42),
            ..Default::default()
        };
        let analysis = RiskAnalysis::new(&series, &config).unwrap();
        assert_eq!(analysis.sampler().block_len(), 1);
        let (seed, sample) = analysis.bootstrap().unwrap();
        assert_eq!(seed, 42);
        assert_eq!(sample.shape(), (2_000, 500));

        let z = stats::z_critical(config.confidence);
        let len = series.len() as f64;
        for hd in [0.0, 0.08, 0.09, 0.1, 0.11, 0.12] {
            let point = analysis.curve_point(&sample, hd).unwrap();
            let p = point.probability;
            let thresh = 1.1f64.ln() - (1.0 + hd).ln();

            // resampling error around the series' own frequency
            let frequency = series.returns().iter().filter(|&&r| r < thresh).count() as f64 / len;
            assert!(
                (p.mean - frequency).abs() <= 4.0 * p.standard_error + 1e-12,
                "h'={hd}: bootstrap {} vs series frequency {frequency}",
                p.mean
            );

            // plus the sampling error of a 10,000-point series around the normal CDF
            let expected = stats::normal_cdf(thresh / 0.02, 0.0, 1.0);
            let series_error = 3.0 * (expected * (1.0 - expected) / len).sqrt();
            assert!(
                (p.mean - expected).abs() <= z * p.standard_error + series_error,
                "h'={hd}: {} vs {expected} (series error {series_error})",
                p.mean
            );
            // no maxima in the series: the policy cannot gate
            assert_eq!(point.probability, point.probability_nominal);
        }
        let interior = analysis.curve_point(&sample, 0.1).unwrap().probability.mean;
        assert!((0.4..0.6).contains(&interior), "{interior}");
    }

    #[test]
    fn test_point_mass_losses_do_not_yield_silent_fit() {
        let mut rng = StdRng::seed_from_u64(30);
        let series = synthetic_normal(&mut rng, 5_000, 0.0, 0.03).unwrap();
        let config = RiskConfig {
            seed: Some(1),
            ..Default::default()
        };
        let analysis = RiskAnalysis::new(&series, &config).unwrap();
        for hd in [0.05, 0.10, 0.12] {
            let report = analysis.tail(hd, 1).unwrap();
            match report.fit {
                Some(fit) => {
                    assert!(fit.scale > 1e-6 * (report.threshold.abs() + 1e-3), "h'={hd}: {fit:?}");
                    assert!(report.is_reliable() || report.parametric_es.is_none());
                }
                None => {
                    assert!(!report.is_reliable(), "h'={hd}: missing fit without warning");
                    assert!(report.parametric_es.is_none());
                }
            }
            assert!(report.empirical_es >= report.loss_quantile);
        }
    }

    #[test]
    fn test_run_produces_report() {
        let mut rng = StdRng::seed_from_u64(8);
        let series = synthetic_normal(&mut rng, 3_000, 0.0, 0.03).unwrap();
        let config = RiskConfig {
            replicates: 200,
            draws: Some(300),
            seed: Some(1),
            ..Default::default()
        };
        let analysis = RiskAnalysis::new(&series, &config).unwrap();
        let report = analysis.run(&default_grid(), 0.05).unwrap();

        assert_eq!(report.curve.len(), 61);
        assert_eq!(report.implied_haircut.per_replicate.len(), 200);
        for w in report.curve.windows(2) {
            // a higher h' lowers the threshold
            assert!(w[1].probability_nominal.mean <= w[0].probability_nominal.mean + 1e-12);
            assert!(w[1].probability_normal <= w[0].probability_normal);
        }
        for p in &report.curve {
            assert!(p.probability.mean <= p.probability_nominal.mean + 1e-12);
        }
        assert!(report.tail.empirical_es >= report.tail.loss_quantile);

        let json = serde_json::to_string(&report).unwrap();
        assert!(json.contains("\"curve\""));
    }

    #[test]
    fn test_implied_haircut_reproduces_alpha() {
        let series = normal_series(5_000, 0.02, 6);
        let config = RiskConfig {
            replicates: 100,
            draws: Some(1_000),
            seed: Some(3),
            liquidation_probability: 0.9,
            ..Default::default()
        };
        let analysis = RiskAnalysis::new(&series, &config).unwrap();
        let (_, sample) = analysis.bootstrap().unwrap();
        let implied = analysis.implied_haircut(&sample);
        let p = liquidation_probability(
            config.haircut,
            implied.estimate.mean,
            &sample,
            &LiquidationPolicy::NOMINAL,
        )
        .unwrap();
        assert!((p.mean - 0.9).abs() < 0.02, "{}", p.mean);
    }

    #[test]
    fn test_multi_period_horizon_uses_block_draws() {
        let mut rng = StdRng::seed_from_u64(15);
        let series = synthetic_normal(&mut rng, 2_000, 0.0, 0.005).unwrap();
        let config = RiskConfig {
            interval_minutes: 60.0,
            replicates: 50,
            draws: Some(100),
            seed: Some(2),
            ..Default::default()
        };
        let analysis = RiskAnalysis::new(&series, &config).unwrap();
        assert_eq!(analysis.sampler().block_len(), 24);
        let (returns, max) = analysis.horizon_returns(9);
        assert_eq!(returns.len(), MIN_TAIL_DRAWS);
        let max = max.unwrap();
        assert!(returns.iter().zip(&max).all(|(r, m)| m >= r));
    }

    #[test]
    fn test_invalid_configuration_fails_fast() {
        let series = normal_series(100, 0.02, 1);
        let config = RiskConfig {
            horizon_minutes: 10.0,
            ..Default::default()
        };
        assert!(matches!(
            RiskAnalysis::new(&series, &config),
            Err(RiskError::InvalidConfiguration { .. })
        ));

        let config = RiskConfig {
            interval_minutes: 1.0,
            allow_wrap_reuse: false,
            ..Default::default()
        };
        assert!(RiskAnalysis::new(&series, &config).is_err());
    }
}
