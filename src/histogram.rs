//! Fixed-width histograms centred on a frame's mean.

use crate::error::{Error, Result};

/// Half-width of the histogram window in σ.
pub const WINDOW_SIGMAS: f64 = 5.0;

/// Default bin count, 12 edges.
pub const DEFAULT_BINS: usize = 11;

#[derive(Debug, Clone, PartialEq)]
pub struct Histogram {
    edges: Vec<f64>,
    counts: Vec<u64>,
}

impl Histogram {
    /// Bin `values` over `[mu - 5σ, mu + 5σ]` in `bins` equal bins. The last
    /// bin is closed on the right; values outside the window are dropped.
    pub fn around<I>(values: I, mu: f64, sigma: f64, bins: usize) -> Result<Self>
    where
        I: IntoIterator<Item = f64>,
    {
        if !(sigma.is_finite() && sigma > 0.0) {
            return Err(Error::HistogramWidth(sigma));
        }
        let bins = bins.max(1);
        let lo = mu - WINDOW_SIGMAS * sigma;
        let hi = mu + WINDOW_SIGMAS * sigma;
        let width = (hi - lo) / bins as f64;

        let edges: Vec<f64> = (0..=bins).map(|i| lo + width * i as f64).collect();
        let mut counts = vec![0u64; bins];

        for v in values {
            if !(lo..=hi).contains(&v) {
                continue;
            }
            let bin = (((v - lo) / width) as usize).min(bins - 1);
            counts[bin] += 1;
        }

        Ok(Self { edges, counts })
    }

    pub fn edges(&self) -> &[f64] {
        &self.edges
    }

    pub fn counts(&self) -> &[u64] {
        &self.counts
    }

    pub fn max_count(&self) -> u64 {
        self.counts.iter().copied().max().unwrap_or(0)
    }

    pub fn total(&self) -> u64 {
        self.counts.iter().sum()
    }

    /// `(left edge, right edge, count)` per bin.
    pub fn bins(&self) -> impl Iterator<Item = (f64, f64, u64)> + '_ {
        self.edges
            .windows(2)
            .zip(&self.counts)
            .map(|(w, &c)| (w[0], w[1], c))
    }
}
