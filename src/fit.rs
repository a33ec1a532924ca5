//! Ordinary least-squares line fits.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

/// `y = slope * x + intercept`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LinearFit {
    pub slope: f64,
    pub intercept: f64,
    /// Pearson correlation coefficient.
    pub r_value: f64,
    /// Standard error of the slope.
    pub slope_stderr: f64,
    pub points: usize,
}

impl LinearFit {
    pub fn fit(x: &[f64], y: &[f64]) -> Result<Self> {
        if x.len() != y.len() {
            return Err(Error::LengthMismatch(x.len(), y.len()));
        }
        let n = x.len();
        if n < 2 {
            return Err(Error::TooFewPoints(n));
        }

        let nf = n as f64;
        let mean_x = x.iter().sum::<f64>() / nf;
        let mean_y = y.iter().sum::<f64>() / nf;

        let (mut sxx, mut syy, mut sxy) = (0.0, 0.0, 0.0);
        for (&xi, &yi) in x.iter().zip(y) {
            let dx = xi - mean_x;
            let dy = yi - mean_y;
            sxx += dx * dx;
            syy += dy * dy;
            sxy += dx * dy;
        }

        if sxx == 0.0 {
            return Err(Error::DegenerateFit);
        }

        let slope = sxy / sxx;
        let intercept = mean_y - slope * mean_x;

        // A flat y series is fit exactly.
        let r_value = if syy == 0.0 {
            1.0
        } else {
            (sxy / (sxx * syy).sqrt()).clamp(-1.0, 1.0)
        };

        let slope_stderr = if n > 2 {
            ((1.0 - r_value * r_value) * syy / sxx / (nf - 2.0))
                .max(0.0)
                .sqrt()
        } else {
            0.0
        };

        Ok(Self {
            slope,
            intercept,
            r_value,
            slope_stderr,
            points: n,
        })
    }

    /// Fit only the first `n` points, e.g. the linear region of a PTC.
    pub fn fit_prefix(x: &[f64], y: &[f64], n: usize) -> Result<Self> {
        if x.len() != y.len() {
            return Err(Error::LengthMismatch(x.len(), y.len()));
        }
        let n = n.min(x.len());
        Self::fit(&x[..n], &y[..n])
    }

    pub fn r_squared(&self) -> f64 {
        self.r_value * self.r_value
    }

    pub fn predict(&self, x: f64) -> f64 {
        self.slope * x + self.intercept
    }
}

impl std::fmt::Display for LinearFit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let sign = if self.intercept < 0.0 { '-' } else { '+' };
        write!(
            f,
            "y = {:.2}x {} {:.2}",
            self.slope,
            sign,
            self.intercept.abs()
        )
    }
}
