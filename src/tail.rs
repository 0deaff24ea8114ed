//! Tail risk: loss distribution, Generalized Pareto fit, Expected Shortfall
//!
//! Pipeline: horizon returns -> liquidation losses -> tail sample above a
//! threshold `u` -> GPD maximum-likelihood fit -> Expected Shortfall.
//!
//! ## Loss
//! `L = -D * ((1 + h') e^R - (1 + rateK))`, so a liquidation that recovers
//! less than the debt plus the challenger fee is a positive loss.
//!
//! ## Expected Shortfall
//! - empirical: mean of the losses above their `Q`-quantile
//! - parametric: `loc + scale * ((1-Q)^-c / (1-c) + ((1-Q)^-c - 1) / c)`,
//!   defined for `c < 1`
//!
//! A small tail sample or an unusable shape is reported as a warning on
//! [`TailRiskReport`]; the empirical figure is always returned.

use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{Result, RiskError};
use crate::liquidation::LiquidationPolicy;
use crate::pnl::liquidation_pnl;
use crate::stats;
use crate::threshold::threshold;

/// Shape values closer to zero than this use the exponential limit.
const SHAPE_EPS: f64 = 1e-9;

/// Largest share of a tail sample allowed to sit exactly at its minimum.
const MAX_TIE_SHARE: f64 = 0.05;

/// Smallest fitted scale, relative to the largest excess, accepted as a fit.
const MIN_SCALE_RATIO: f64 = 1e-6;

pub fn loss(ret: f64, liquidated: bool, haircut_dash: f64, challenger_fee: f64) -> f64 {
    -liquidation_pnl(haircut_dash, challenger_fee, ret, liquidated)
}

/// Parameters of the loss transform.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LossModel {
    pub haircut: f64,
    pub haircut_dash: f64,
    pub challenger_fee: f64,
    pub policy: LiquidationPolicy,
}

impl LossModel {
    /// Loss of every draw. `max_returns`, when given, must be parallel to
    /// `returns` and gates the indicator per the policy.
    pub fn losses(&self, returns: &[f64], max_returns: Option<&[f64]>) -> Result<Vec<f64>> {
        if returns.is_empty() {
            return Err(RiskError::EmptySeries);
        }
        let thresh = threshold(self.haircut, self.haircut_dash);
        let loss_of = |r: f64, m: Option<f64>| {
            let d = self.policy.indicator(r, m, thresh);
            loss(r, d, self.haircut_dash, self.challenger_fee)
        };
        match max_returns {
            Some(max) if max.len() != returns.len() => Err(RiskError::LengthMismatch {
                expected: returns.len(),
                found: max.len(),
            }),
            Some(max) => Ok(returns
                .iter()
                .zip(max)
                .map(|(&r, &m)| loss_of(r, Some(m)))
                .collect()),
            None => Ok(returns.iter().map(|&r| loss_of(r, None)).collect()),
        }
    }
}

/// How the tail threshold `u` is chosen.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TailThreshold {
    Fixed(f64),
    /// Empirical quantile of the losses at this level
    Quantile(f64),
}

impl TailThreshold {
    pub fn resolve(&self, losses: &[f64]) -> f64 {
        match *self {
            Self::Fixed(u) => u,
            Self::Quantile(p) => stats::quantile(losses, p),
        }
    }
}

/// Threshold and the losses at or above it.
pub fn tail_sample(losses: &[f64], threshold: TailThreshold) -> (f64, Vec<f64>) {
    let u = threshold.resolve(losses);
    let tail = losses.iter().copied().filter(|&l| l >= u).collect();
    (u, tail)
}

/// Mean of the losses strictly above their `level`-quantile. Falls back to
/// the quantile when nothing lies above it, so the result is never below it.
pub fn empirical_expected_shortfall(losses: &[f64], level: f64) -> f64 {
    let q = stats::quantile(losses, level);
    let above: Vec<f64> = losses.iter().copied().filter(|&l| l > q).collect();
    if above.is_empty() {
        q
    } else {
        stats::mean(&above)
    }
}

/// Loss expected over the worst `level` fraction of raw returns, counting
/// every one of them as liquidated.
pub fn return_shortfall(returns: &[f64], level: f64, haircut_dash: f64, challenger_fee: f64) -> f64 {
    let q = stats::quantile(returns, level);
    let worst: Vec<f64> = returns
        .iter()
        .copied()
        .filter(|&r| r < q)
        .map(|r| loss(r, true, haircut_dash, challenger_fee))
        .collect();
    if worst.is_empty() {
        return loss(q, true, haircut_dash, challenger_fee);
    }
    stats::mean(&worst)
}

/// Empirical mean-excess function `e(u) = sum(max(L - u, 0)) / #(L > u)`
/// at each grid threshold, i.e. the mean exceedance of the losses above `u`.
/// The numerator is the sum, not the mean, of the clipped excesses; dividing
/// a mean by the count again would scale `e(u)` by `1 / (n * #(L > u))`.
/// Thresholds without exceedances are skipped.
pub fn mean_excess(losses: &[f64], grid: &[f64]) -> Vec<(f64, f64)> {
    grid.iter()
        .filter_map(|&u| {
            let (sum, count) = losses
                .iter()
                .filter(|&&l| l > u)
                .fold((0.0, 0usize), |(s, c), &l| (s + (l - u), c + 1));
            (count > 0).then(|| (u, sum / count as f64))
        })
        .collect()
}

/// `points` thresholds spaced evenly between the `lo` and `hi` loss quantiles.
pub fn quantile_grid(losses: &[f64], lo: f64, hi: f64, points: usize) -> Vec<f64> {
    let mut sorted = losses.to_vec();
    sorted.sort_by(f64::total_cmp);
    let a = stats::quantile_sorted(&sorted, lo);
    let b = stats::quantile_sorted(&sorted, hi);
    match points {
        0 => Vec::new(),
        1 => vec![a],
        _ => (0..points)
            .map(|i| a + (b - a) * i as f64 / (points - 1) as f64)
            .collect(),
    }
}

/// Generalized Pareto distribution with shape `c`, location and scale.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GpdFit {
    pub shape: f64,
    pub loc: f64,
    pub scale: f64,
}

impl GpdFit {
    pub fn new(shape: f64, loc: f64, scale: f64) -> Self {
        Self { shape, loc, scale }
    }

    fn support_z(&self, x: f64) -> Option<f64> {
        let y = (x - self.loc) / self.scale;
        if y < 0.0 {
            return None;
        }
        let z = 1.0 + self.shape * y;
        (z > 0.0).then_some(z)
    }

    pub fn pdf(&self, x: f64) -> f64 {
        let y = (x - self.loc) / self.scale;
        match self.support_z(x) {
            None => 0.0,
            Some(_) if self.shape.abs() < SHAPE_EPS => (-y).exp() / self.scale,
            Some(z) => z.powf(-1.0 / self.shape - 1.0) / self.scale,
        }
    }

    pub fn cdf(&self, x: f64) -> f64 {
        if x < self.loc {
            return 0.0;
        }
        let y = (x - self.loc) / self.scale;
        match self.support_z(x) {
            None => 1.0,
            Some(_) if self.shape.abs() < SHAPE_EPS => 1.0 - (-y).exp(),
            Some(z) => 1.0 - z.powf(-1.0 / self.shape),
        }
    }

    pub fn quantile(&self, p: f64) -> f64 {
        if self.shape.abs() < SHAPE_EPS {
            self.loc - self.scale * (1.0 - p).ln()
        } else {
            self.loc + self.scale / self.shape * ((1.0 - p).powf(-self.shape) - 1.0)
        }
    }

    /// Inverse-CDF draw.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        let u: f64 = rng.gen();
        self.quantile(u)
    }

    pub fn log_likelihood(&self, xs: &[f64]) -> f64 {
        -negative_log_likelihood(self.shape, self.scale, xs.iter().map(|x| x - self.loc))
    }

    /// Parametric ES at level `q`. Undefined (infinite mean) for `c >= 1`.
    pub fn expected_shortfall(&self, q: f64) -> Result<f64> {
        let c = self.shape;
        if !(c < 1.0) {
            return Err(RiskError::DegenerateFit {
                shape: c,
                reason: "shape >= 1, expected shortfall is undefined",
            });
        }
        let tail = 1.0 - q;
        if c.abs() < SHAPE_EPS {
            return Ok(self.loc + self.scale * (1.0 - tail.ln()));
        }
        let t = tail.powf(-c);
        Ok(self.loc + self.scale * (t / (1.0 - c) + (t - 1.0) / c))
    }
}

fn negative_log_likelihood(shape: f64, scale: f64, excesses: impl Iterator<Item = f64>) -> f64 {
    if !(scale > 0.0) || shape <= -1.0 {
        return f64::INFINITY;
    }
    let mut n = 0usize;
    let mut acc = 0.0;
    for y in excesses {
        if y < 0.0 {
            return f64::INFINITY;
        }
        n += 1;
        if shape.abs() < SHAPE_EPS {
            acc += y / scale;
        } else {
            let z = 1.0 + shape * y / scale;
            if z <= 0.0 {
                return f64::INFINITY;
            }
            acc += (1.0 + 1.0 / shape) * z.ln();
        }
    }
    n as f64 * scale.ln() + acc
}

/// Maximum-likelihood GPD fit of a tail sample.
///
/// The location estimate is the sample minimum (the likelihood increases in
/// `loc` up to it); shape and log-scale are then found by Nelder-Mead,
/// started from the method-of-moments solution.
pub fn fit_gpd(tail: &[f64], min_size: usize) -> Result<GpdFit> {
    if tail.len() < min_size.max(3) {
        return Err(RiskError::InsufficientTailSample {
            size: tail.len(),
            minimum: min_size.max(3),
        });
    }
    let loc = tail.iter().copied().fold(f64::INFINITY, f64::min);
    let excesses: Vec<f64> = tail.iter().map(|x| x - loc).collect();
    let m = stats::mean(&excesses);
    let v = stats::variance(&excesses);
    if !(m > 0.0 && v > 0.0) {
        return Err(RiskError::DegenerateFit {
            shape: f64::NAN,
            reason: "tail sample has no spread",
        });
    }
    // the likelihood is unbounded in the scale when mass sits at `loc`
    let ties = excesses.iter().filter(|&&y| y == 0.0).count();
    if ties > 1 && ties as f64 > MAX_TIE_SHARE * tail.len() as f64 {
        return Err(RiskError::DegenerateFit {
            shape: f64::NAN,
            reason: "point mass at the tail minimum",
        });
    }

    let ratio = m * m / v;
    let shape0 = (0.5 * (1.0 - ratio)).clamp(-0.5, 0.9);
    let scale0 = (0.5 * m * (1.0 + ratio)).max(1e-12);

    let objective = |p: &[f64; 2]| negative_log_likelihood(p[0], p[1].exp(), excesses.iter().copied());
    let (best, nll) = nelder_mead(objective, [shape0, scale0.ln()], [0.1, 0.2], 5_000, 1e-12);
    if !nll.is_finite() {
        return Err(RiskError::DegenerateFit {
            shape: best[0],
            reason: "likelihood is not finite at the optimum",
        });
    }
    let scale = best[1].exp();
    let spread = excesses.iter().copied().fold(0.0, f64::max);
    if scale_collapsed(scale, spread) {
        return Err(RiskError::DegenerateFit {
            shape: best[0],
            reason: "scale collapsed to zero",
        });
    }
    let fit = GpdFit::new(best[0], loc, scale);
    debug!(shape = fit.shape, loc = fit.loc, scale = fit.scale, n = tail.len(), "gpd fit");
    Ok(fit)
}

fn scale_collapsed(scale: f64, spread: f64) -> bool {
    !scale.is_normal() || scale < MIN_SCALE_RATIO * spread
}

const REFLECTION_COEF: f64 = 1.0;
const EXPANSION_COEF: f64 = 2.0;
const CONTRACTION_COEF: f64 = 0.5;
const SHRINK_COEF: f64 = 0.5;

/// Two-dimensional Nelder-Mead minimisation.
fn nelder_mead<F>(f: F, start: [f64; 2], step: [f64; 2], max_iter: usize, tol: f64) -> ([f64; 2], f64)
where
    F: Fn(&[f64; 2]) -> f64,
{
    let mut simplex: Vec<([f64; 2], f64)> = vec![
        start,
        [start[0] + step[0], start[1]],
        [start[0], start[1] + step[1]],
    ]
    .into_iter()
    .map(|p| {
        let v = f(&p);
        (p, v)
    })
    .collect();

    let along = |from: &[f64; 2], to: &[f64; 2], coef: f64| -> [f64; 2] {
        [
            to[0] + coef * (to[0] - from[0]),
            to[1] + coef * (to[1] - from[1]),
        ]
    };

    for _ in 0..max_iter {
        simplex.sort_by(|a, b| a.1.total_cmp(&b.1));
        let (best, worst) = (simplex[0].1, simplex[2].1);
        if worst.is_finite() && (worst - best).abs() <= tol * (1.0 + best.abs()) {
            break;
        }

        let centroid = [
            (simplex[0].0[0] + simplex[1].0[0]) / 2.0,
            (simplex[0].0[1] + simplex[1].0[1]) / 2.0,
        ];
        let reflected = along(&simplex[2].0, &centroid, REFLECTION_COEF);
        let fr = f(&reflected);

        if fr < simplex[0].1 {
            let expanded = along(&simplex[2].0, &centroid, EXPANSION_COEF);
            let fe = f(&expanded);
            simplex[2] = if fe < fr { (expanded, fe) } else { (reflected, fr) };
        } else if fr < simplex[1].1 {
            simplex[2] = (reflected, fr);
        } else {
            // contract toward the better of worst and reflected
            let (anchor, fa) = if fr < simplex[2].1 {
                (reflected, fr)
            } else {
                (simplex[2].0, simplex[2].1)
            };
            let contracted = along(&anchor, &centroid, -CONTRACTION_COEF);
            let fc = f(&contracted);
            if fc < fa {
                simplex[2] = (contracted, fc);
            } else {
                let best_point = simplex[0].0;
                for vertex in simplex.iter_mut().skip(1) {
                    let p = [
                        best_point[0] + SHRINK_COEF * (vertex.0[0] - best_point[0]),
                        best_point[1] + SHRINK_COEF * (vertex.0[1] - best_point[1]),
                    ];
                    *vertex = (p, f(&p));
                }
            }
        }
    }

    simplex.sort_by(|a, b| a.1.total_cmp(&b.1));
    simplex[0]
}

/// Settings for one tail analysis.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TailSettings {
    pub threshold: TailThreshold,
    pub es_level: f64,
    pub min_tail_size: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct TailRiskReport {
    pub threshold: f64,
    pub tail_size: usize,
    pub es_level: f64,
    /// `Q`-quantile of the loss sample (VaR of the losses)
    pub loss_quantile: f64,
    pub empirical_es: f64,
    pub fit: Option<GpdFit>,
    pub parametric_es: Option<f64>,
    pub warnings: Vec<RiskError>,
}

impl TailRiskReport {
    pub fn is_reliable(&self) -> bool {
        self.warnings.is_empty()
    }

    pub fn print(&self) {
        println!("  Tail threshold u:        {:.4}", self.threshold);
        println!("  Tail sample size:        {}", self.tail_size);
        println!("  Loss quantile ({:.1}%):   {:.4}", self.es_level * 100.0, self.loss_quantile);
        println!("  ES empirical:            {:.4}", self.empirical_es);
        match &self.fit {
            Some(fit) => println!(
                "  GPD fit:                 c={:.4} loc={:.4} scale={:.4}",
                fit.shape, fit.loc, fit.scale
            ),
            None => println!("  GPD fit:                 n/a"),
        }
        match self.parametric_es {
            Some(es) => println!("  ES pareto:               {:.4}", es),
            None => println!("  ES pareto:               n/a"),
        }
        for w in &self.warnings {
            println!("  warning: {w}");
        }
    }
}

/// Runs the full tail pipeline on a loss sample.
pub fn analyze_tail(losses: &[f64], settings: &TailSettings) -> Result<TailRiskReport> {
    if losses.is_empty() {
        return Err(RiskError::EmptySeries);
    }
    let (u, tail) = tail_sample(losses, settings.threshold);
    let mut warnings = Vec::new();

    let fit = match fit_gpd(&tail, settings.min_tail_size) {
        Ok(fit) => Some(fit),
        Err(err) => {
            warn!(%err, "gpd fit skipped");
            warnings.push(err);
            None
        }
    };
    let parametric_es = fit.and_then(|fit| match fit.expected_shortfall(settings.es_level) {
        Ok(es) => Some(es),
        Err(err) => {
            warn!(%err, "parametric expected shortfall unavailable");
            warnings.push(err);
            None
        }
    });

    Ok(TailRiskReport {
        threshold: u,
        tail_size: tail.len(),
        es_level: settings.es_level,
        loss_quantile: stats::quantile(losses, settings.es_level),
        empirical_es: empirical_expected_shortfall(losses, settings.es_level),
        fit,
        parametric_es,
        warnings,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn gpd_sample(fit: GpdFit, n: usize, seed: u64) -> Vec<f64> {
        let mut rng = StdRng::seed_from_u64(seed);
        (0..n).map(|_| fit.sample(&mut rng)).collect()
    }

    #[test]
    fn test_loss_sign() {
        // deep drop: recovers less than debt plus fee
        assert!(loss(-0.2, true, 0.05, 0.02) > 0.0);
        assert_eq!(loss(-0.2, false, 0.05, 0.02), 0.0);
        assert!(loss(0.0, true, 0.05, 0.02) < 0.0);
    }

    #[test]
    fn test_loss_model_gating() {
        let model = LossModel {
            haircut: 0.1,
            haircut_dash: 0.05,
            challenger_fee: 0.02,
            policy: LiquidationPolicy::default(),
        };
        let r = [-0.2, -0.2];
        let m = [-0.1, 0.2];
        let losses = model.losses(&r, Some(&m)).unwrap();
        assert!(losses[0] > 0.0);
        assert_eq!(losses[1], 0.0);
        assert!(model.losses(&r, Some(&m[..1])).is_err());
    }

    #[test]
    fn test_gpd_round_trip() {
        let truth = GpdFit::new(0.5, 1.0, 0.5);
        let xs = gpd_sample(truth, 5_000, 2024);
        let fit = fit_gpd(&xs, 50).unwrap();
        assert!((fit.shape - truth.shape).abs() <= 0.2 * truth.shape, "shape {}", fit.shape);
        assert!((fit.scale - truth.scale).abs() <= 0.1 * truth.scale, "scale {}", fit.scale);
        assert!((fit.loc - truth.loc).abs() < 0.01, "loc {}", fit.loc);
        assert!(fit.log_likelihood(&xs) >= truth.log_likelihood(&xs) - 1e-6);
    }

    #[test]
    fn test_gpd_exponential_limit() {
        let exp = GpdFit::new(0.0, 0.0, 2.0);
        assert!((exp.cdf(2.0) - (1.0 - (-1.0f64).exp())).abs() < 1e-12);
        assert!((exp.quantile(exp.cdf(3.0)) - 3.0).abs() < 1e-9);
        assert!((exp.expected_shortfall(0.95).unwrap() - 2.0 * (1.0 - 0.05f64.ln())).abs() < 1e-12);
    }

    #[test]
    fn test_quantile_inverts_cdf() {
        let g = GpdFit::new(-0.2, 0.5, 1.5);
        for p in [0.01, 0.3, 0.9, 0.999] {
            assert!((g.cdf(g.quantile(p)) - p).abs() < 1e-12);
        }
        assert_eq!(g.pdf(0.0), 0.0);
    }

    #[test]
    fn test_parametric_es_matches_monte_carlo() {
        let truth = GpdFit::new(0.2, 0.0, 1.0);
        let xs = gpd_sample(truth, 200_000, 5);
        let emp = empirical_expected_shortfall(&xs, 0.95);
        let par = truth.expected_shortfall(0.95).unwrap();
        assert!((emp / par - 1.0).abs() < 0.05, "{emp} vs {par}");
    }

    #[test]
    fn test_degenerate_shape() {
        let err = GpdFit::new(1.2, 0.0, 1.0).expected_shortfall(0.95).unwrap_err();
        assert!(matches!(err, RiskError::DegenerateFit { .. }));
    }

    #[test]
    fn test_es_not_below_quantile() {
        let xs = gpd_sample(GpdFit::new(0.3, 0.0, 1.0), 2_000, 8);
        for q in [0.5, 0.9, 0.95, 0.99] {
            assert!(empirical_expected_shortfall(&xs, q) >= stats::quantile(&xs, q));
        }
        let flat = vec![1.0; 10];
        assert_eq!(empirical_expected_shortfall(&flat, 0.9), 1.0);
    }

    #[test]
    fn test_small_tail_reports_warning() {
        let losses: Vec<f64> = (0..100).map(|i| i as f64 / 100.0).collect();
        let settings = TailSettings {
            threshold: TailThreshold::Quantile(0.9),
            es_level: 0.95,
            min_tail_size: 50,
        };
        let report = analyze_tail(&losses, &settings).unwrap();
        assert!(report.fit.is_none());
        assert!(report.parametric_es.is_none());
        assert!(!report.is_reliable());
        assert!(matches!(
            report.warnings[0],
            RiskError::InsufficientTailSample { size: 10, minimum: 50 }
        ));
        assert!(report.empirical_es > report.loss_quantile);
    }

    /// Three quarters of the draws are not liquidated and lose exactly zero.
    fn losses_with_zero_mass() -> Vec<f64> {
        let mut losses = vec![0.0; 3_000];
        losses.extend(gpd_sample(GpdFit::new(0.0, 0.0, 0.05), 1_000, 17));
        losses
    }

    fn settings(threshold: TailThreshold) -> TailSettings {
        TailSettings {
            threshold,
            es_level: 0.95,
            min_tail_size: 50,
        }
    }

    #[test]
    fn test_point_mass_at_tail_minimum_is_degenerate() {
        let losses = losses_with_zero_mass();
        assert!(matches!(
            fit_gpd(&losses, 50),
            Err(RiskError::DegenerateFit { reason: "point mass at the tail minimum", .. })
        ));

        // median loss is zero, so every non-liquidated draw lands in the tail
        let report = analyze_tail(&losses, &settings(TailThreshold::Quantile(0.5))).unwrap();
        assert_eq!(report.threshold, 0.0);
        assert_eq!(report.tail_size, 4_000);
        assert!(report.fit.is_none());
        assert!(report.parametric_es.is_none());
        assert!(!report.is_reliable());
        assert!(matches!(report.warnings[0], RiskError::DegenerateFit { .. }));
        assert!(report.empirical_es >= report.loss_quantile);
        assert!(report.loss_quantile > 0.0);
    }

    #[test]
    fn test_fixed_threshold() {
        let losses = losses_with_zero_mass();

        let at_zero = analyze_tail(&losses, &settings(TailThreshold::Fixed(0.0))).unwrap();
        assert_eq!(at_zero.tail_size, losses.len());
        assert!(at_zero.fit.is_none());
        assert!(matches!(at_zero.warnings[0], RiskError::DegenerateFit { .. }));

        let u = 0.02;
        let (resolved, tail) = tail_sample(&losses, TailThreshold::Fixed(u));
        assert_eq!(resolved, u);
        assert_eq!(tail.len(), losses.iter().filter(|&&l| l >= u).count());
        let inside = analyze_tail(&losses, &settings(TailThreshold::Fixed(u))).unwrap();
        assert_eq!(inside.threshold, u);
        assert_eq!(inside.tail_size, tail.len());
        assert!(inside.is_reliable(), "{:?}", inside.warnings);
        let fit = inside.fit.unwrap();
        assert!(fit.loc >= u);
        assert!(fit.shape.abs() < 0.3, "shape {}", fit.shape);

        let above = losses.iter().copied().fold(f64::NEG_INFINITY, f64::max) + 1.0;
        let empty = analyze_tail(&losses, &settings(TailThreshold::Fixed(above))).unwrap();
        assert_eq!(empty.tail_size, 0);
        assert!(empty.fit.is_none());
        assert_eq!(
            empty.warnings,
            vec![RiskError::InsufficientTailSample { size: 0, minimum: 50 }]
        );
        assert!(empty.empirical_es.is_finite());
        assert!(empty.empirical_es >= empty.loss_quantile);
    }

    #[test]
    fn test_collapsed_scale_rejected() {
        assert!(scale_collapsed(1.82e-311, 0.1));
        assert!(scale_collapsed(1e-9, 0.1));
        assert!(scale_collapsed(f64::NAN, 0.1));
        assert!(!scale_collapsed(0.05, 0.1));
    }

    #[test]
    fn test_full_tail_analysis() {
        let losses = gpd_sample(GpdFit::new(0.25, 0.0, 0.05), 10_000, 31);
        let settings = TailSettings {
            threshold: TailThreshold::Quantile(0.9),
            es_level: 0.99,
            min_tail_size: 50,
        };
        let report = analyze_tail(&losses, &settings).unwrap();
        assert_eq!(report.tail_size, 1_000);
        assert!(report.is_reliable(), "{:?}", report.warnings);
        let par = report.parametric_es.unwrap();
        assert!(par > report.threshold);
    }

    #[test]
    fn test_mean_excess_linear_in_threshold() {
        let c = 0.25;
        let xs = gpd_sample(GpdFit::new(c, 0.0, 1.0), 100_000, 13);
        let grid = quantile_grid(&xs, 0.1, 0.9, 9);
        let me = mean_excess(&xs, &grid);
        assert_eq!(me.len(), 9);
        let (u0, e0) = me[0];
        let (u1, e1) = me[me.len() - 1];
        let slope = (e1 - e0) / (u1 - u0);
        // e(u) = (scale + c u) / (1 - c)
        assert!((slope - c / (1.0 - c)).abs() < 0.1, "slope {slope}");
    }

    #[test]
    fn test_mean_excess_skips_empty() {
        let me = mean_excess(&[1.0, 2.0, 3.0], &[0.0, 2.0, 5.0]);
        assert_eq!(me, vec![(0.0, 2.0), (2.0, 1.0)]);
    }

    #[test]
    fn test_return_shortfall() {
        let r: Vec<f64> = (0..1000).map(|i| -0.5 + i as f64 / 1000.0).collect();
        let es = return_shortfall(&r, 0.01, 0.05, 0.02);
        assert!(es > loss(-0.49, true, 0.05, 0.02));
    }
}
