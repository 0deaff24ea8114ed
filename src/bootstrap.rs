//! Circular Block Bootstrap
//!
//! Builds resampled multi-period log-returns from a historical series.
//! A draw picks a uniform pivot `p` in `[0, L)` and sums the `n` source
//! observations at `(p, p+1, ..., p+n-1) mod L`, which keeps the serial
//! dependence inside each block while randomizing where blocks start.
//!
//! ## Output shapes
//! - flat vector of draws, for plain Monte-Carlo integration
//! - `(B, K)` matrix: `B` replicates of `K` draws each, so replicate-level
//!   statistics give a standard error across replicates
//!
//! When the series carries intra-interval maxima, the paired sampler applies
//! the same pivot to both series so that every nominal draw has a matching
//! window maximum.

use rand::prelude::*;
use rand::rngs::StdRng;
#[cfg(feature = "parallel")]
use rayon::prelude::*;
use tracing::debug;

use crate::config::RiskConfig;
use crate::error::{Result, RiskError};
use crate::series::ReturnSeries;

/// Row-major `(replicates, draws)` matrix of horizon returns.
#[derive(Debug, Clone, PartialEq)]
pub struct BootstrapMatrix {
    replicates: usize,
    draws: usize,
    data: Vec<f64>,
}

impl BootstrapMatrix {
    pub fn from_vec(replicates: usize, draws: usize, data: Vec<f64>) -> Result<Self> {
        if replicates == 0 || draws == 0 {
            return Err(RiskError::config("replicates", "matrix dimensions must be positive"));
        }
        if data.len() != replicates * draws {
            return Err(RiskError::LengthMismatch {
                expected: replicates * draws,
                found: data.len(),
            });
        }
        Ok(Self {
            replicates,
            draws,
            data,
        })
    }

    pub fn from_rows(rows: Vec<Vec<f64>>) -> Result<Self> {
        let replicates = rows.len();
        let draws = rows.first().map_or(0, Vec::len);
        let mut data = Vec::with_capacity(replicates * draws);
        for row in rows {
            if row.len() != draws {
                return Err(RiskError::LengthMismatch {
                    expected: draws,
                    found: row.len(),
                });
            }
            data.extend(row);
        }
        Self::from_vec(replicates, draws, data)
    }

    pub fn replicates(&self) -> usize {
        self.replicates
    }

    pub fn draws(&self) -> usize {
        self.draws
    }

    pub fn shape(&self) -> (usize, usize) {
        (self.replicates, self.draws)
    }

    pub fn row(&self, i: usize) -> &[f64] {
        &self.data[i * self.draws..(i + 1) * self.draws]
    }

    pub fn rows(&self) -> std::slice::ChunksExact<'_, f64> {
        self.data.chunks_exact(self.draws)
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.data
    }

    /// Applies `f` to every replicate row, in parallel when enabled.
    pub fn map_rows<F>(&self, f: F) -> Vec<f64>
    where
        F: Fn(&[f64]) -> f64 + Sync + Send,
    {
        #[cfg(feature = "parallel")]
        {
            self.data.par_chunks_exact(self.draws).map(f).collect()
        }
        #[cfg(not(feature = "parallel"))]
        {
            self.rows().map(f).collect()
        }
    }

    /// Like [`map_rows`](Self::map_rows), pairing each row with the same row
    /// of `other`. Shapes must match.
    pub fn zip_rows<F>(&self, other: &BootstrapMatrix, f: F) -> Result<Vec<f64>>
    where
        F: Fn(&[f64], &[f64]) -> f64 + Sync + Send,
    {
        if self.shape() != other.shape() {
            return Err(RiskError::LengthMismatch {
                expected: self.data.len(),
                found: other.data.len(),
            });
        }
        #[cfg(feature = "parallel")]
        let out = self
            .data
            .par_chunks_exact(self.draws)
            .zip(other.data.par_chunks_exact(other.draws))
            .map(|(a, b)| f(a, b))
            .collect();
        #[cfg(not(feature = "parallel"))]
        let out = self.rows().zip(other.rows()).map(|(a, b)| f(a, b)).collect();
        Ok(out)
    }
}

/// Nominal horizon returns plus, optionally, the matching window maxima.
#[derive(Debug, Clone, PartialEq)]
pub struct BootstrapSample {
    pub returns: BootstrapMatrix,
    pub max_returns: Option<BootstrapMatrix>,
}

impl BootstrapSample {
    pub fn new(returns: BootstrapMatrix, max_returns: Option<BootstrapMatrix>) -> Result<Self> {
        if let Some(max) = &max_returns {
            if max.shape() != returns.shape() {
                return Err(RiskError::LengthMismatch {
                    expected: returns.as_slice().len(),
                    found: max.as_slice().len(),
                });
            }
        }
        Ok(Self {
            returns,
            max_returns,
        })
    }

    pub fn shape(&self) -> (usize, usize) {
        self.returns.shape()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct BlockBootstrap<'a> {
    returns: &'a [f64],
    max_returns: Option<&'a [f64]>,
    block_len: usize,
}

impl<'a> BlockBootstrap<'a> {
    pub fn new(returns: &'a [f64], block_len: usize) -> Result<Self> {
        if returns.is_empty() {
            return Err(RiskError::EmptySeries);
        }
        if block_len == 0 {
            return Err(RiskError::config("horizon_minutes", "block length must be at least 1"));
        }
        Ok(Self {
            returns,
            max_returns: None,
            block_len,
        })
    }

    pub fn with_max_returns(mut self, max_returns: &'a [f64]) -> Result<Self> {
        if max_returns.len() != self.returns.len() {
            return Err(RiskError::LengthMismatch {
                expected: self.returns.len(),
                found: max_returns.len(),
            });
        }
        self.max_returns = Some(max_returns);
        Ok(self)
    }

    /// Sampler for a series under `config`: block length from the horizon,
    /// wrap policy checked, max-returns attached when the series has them.
    pub fn for_series(series: &'a ReturnSeries, config: &RiskConfig) -> Result<Self> {
        let n = config.horizon_length()?;
        let wrap = config.check_wrap(n, series.len())?;
        debug!(n, len = series.len(), ?wrap, "block length for series");
        let sampler = Self::new(series.returns(), n)?;
        match series.max_returns() {
            Some(max) => sampler.with_max_returns(max),
            None => Ok(sampler),
        }
    }

    pub fn block_len(&self) -> usize {
        self.block_len
    }

    pub fn source_len(&self) -> usize {
        self.returns.len()
    }

    pub fn has_max_returns(&self) -> bool {
        self.max_returns.is_some()
    }

    /// Sum of the `n` returns starting at `pivot`, wrapping around the end.
    pub fn block_sum(&self, pivot: usize) -> f64 {
        let len = self.returns.len();
        (0..self.block_len)
            .map(|i| self.returns[(pivot + i) % len])
            .sum()
    }

    /// Highest log-return reached inside the window starting at `pivot`:
    /// the running maximum of (cumulative nominal return before step `j`)
    /// plus (intra-interval maximum at step `j`). With `n = 1` this is the
    /// source maximum itself.
    pub fn block_max(&self, pivot: usize) -> Option<f64> {
        let max_returns = self.max_returns?;
        let len = self.returns.len();
        let mut cumulative = 0.0;
        let mut best = f64::NEG_INFINITY;
        for i in 0..self.block_len {
            let idx = (pivot + i) % len;
            best = best.max(cumulative + max_returns[idx]);
            cumulative += self.returns[idx];
        }
        Some(best)
    }

    fn pivot<R: Rng + ?Sized>(&self, rng: &mut R) -> usize {
        rng.gen_range(0..self.returns.len())
    }

    pub fn draw<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        let pivot = self.pivot(rng);
        self.block_sum(pivot)
    }

    /// Flat vector of `count` block draws.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R, count: usize) -> Vec<f64> {
        (0..count).map(|_| self.draw(rng)).collect()
    }

    /// Flat vector of `count` horizon returns where each of the `n` terms is
    /// drawn independently (no block structure).
    pub fn sample_iid<R: Rng + ?Sized>(&self, rng: &mut R, count: usize) -> Vec<f64> {
        (0..count)
            .map(|_| {
                (0..self.block_len)
                    .map(|_| self.returns[self.pivot(rng)])
                    .sum::<f64>()
            })
            .collect()
    }

    /// Flat draws with their window maxima (when the series has them), one
    /// pivot per draw.
    pub fn sample_with_max<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        count: usize,
    ) -> (Vec<f64>, Option<Vec<f64>>) {
        let (returns, max_returns) = self.fill_row(rng, count);
        (returns, self.has_max_returns().then_some(max_returns))
    }

    /// `(B, K)` matrix of block draws from a single random source.
    pub fn sample_matrix<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        replicates: usize,
        draws: usize,
    ) -> Result<BootstrapMatrix> {
        check_dims(replicates, draws)?;
        debug!(replicates, draws, n = self.block_len, "sampling bootstrap matrix");
        let data = self.sample(rng, replicates * draws);
        BootstrapMatrix::from_vec(replicates, draws, data)
    }

    /// Nominal and (when available) max matrices sharing every pivot.
    pub fn sample_paired<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        replicates: usize,
        draws: usize,
    ) -> Result<BootstrapSample> {
        check_dims(replicates, draws)?;
        debug!(replicates, draws, n = self.block_len, "sampling paired bootstrap matrices");
        let (returns, max_returns) = self.fill_row(rng, replicates * draws);
        self.assemble(replicates, draws, returns, max_returns)
    }

    /// Reproducible paired sample: replicate `i` draws from its own
    /// generator, seeded from a master generator seeded with `seed`. Rows are
    /// filled in parallel when enabled; the result does not depend on it.
    pub fn sample_seeded(&self, seed: u64, replicates: usize, draws: usize) -> Result<BootstrapSample> {
        check_dims(replicates, draws)?;
        debug!(seed, replicates, draws, n = self.block_len, "sampling seeded bootstrap");
        let mut master = StdRng::seed_from_u64(seed);
        let row_seeds: Vec<u64> = (0..replicates).map(|_| master.next_u64()).collect();

        let fill = |row_seed: &u64| {
            let mut rng = StdRng::seed_from_u64(*row_seed);
            self.fill_row(&mut rng, draws)
        };
        #[cfg(feature = "parallel")]
        let rows: Vec<(Vec<f64>, Vec<f64>)> = row_seeds.par_iter().map(fill).collect();
        #[cfg(not(feature = "parallel"))]
        let rows: Vec<(Vec<f64>, Vec<f64>)> = row_seeds.iter().map(fill).collect();

        let mut returns = Vec::with_capacity(replicates * draws);
        let mut max_returns = Vec::with_capacity(if self.has_max_returns() {
            replicates * draws
        } else {
            0
        });
        for (r, m) in rows {
            returns.extend(r);
            max_returns.extend(m);
        }
        self.assemble(replicates, draws, returns, max_returns)
    }

    fn fill_row<R: Rng + ?Sized>(&self, rng: &mut R, count: usize) -> (Vec<f64>, Vec<f64>) {
        let mut returns = Vec::with_capacity(count);
        let mut max_returns = Vec::new();
        if self.has_max_returns() {
            max_returns.reserve(count);
        }
        for _ in 0..count {
            let pivot = self.pivot(rng);
            returns.push(self.block_sum(pivot));
            if let Some(m) = self.block_max(pivot) {
                max_returns.push(m);
            }
        }
        (returns, max_returns)
    }

    fn assemble(
        &self,
        replicates: usize,
        draws: usize,
        returns: Vec<f64>,
        max_returns: Vec<f64>,
    ) -> Result<BootstrapSample> {
        let returns = BootstrapMatrix::from_vec(replicates, draws, returns)?;
        let max_returns = if self.has_max_returns() {
            Some(BootstrapMatrix::from_vec(replicates, draws, max_returns)?)
        } else {
            None
        };
        BootstrapSample::new(returns, max_returns)
    }
}

fn check_dims(replicates: usize, draws: usize) -> Result<()> {
    if replicates == 0 {
        return Err(RiskError::config("replicates", "must be at least 1"));
    }
    if draws == 0 {
        return Err(RiskError::config("draws", "must be at least 1"));
    }
    Ok(())
}
