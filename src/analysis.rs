//! Sensor parameters derived from reduced sweeps.

use crate::error::{Error, Result};
use crate::fit::LinearFit;
use crate::sweep::{Exposure, SweepStack};
use serde::{Deserialize, Serialize};

/// μ and σ of one averaged dark pair, in scaled ADU.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExposureStats {
    pub label: String,
    pub exposure_s: f64,
    pub mean_adu: f64,
    pub sigma_adu: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DarkAnalysis {
    /// Read noise (σ_diff / √2) vs exposure time.
    pub read_noise_fit: LinearFit,
    /// Mean dark level vs exposure time. The slope is the dark current in
    /// ADU/s and the intercept the bias level.
    pub dark_current_fit: LinearFit,
    pub adu_scale: f64,
    pub table: Vec<ExposureStats>,
}

impl DarkAnalysis {
    pub fn new(
        exposures: &[Exposure],
        noise: &SweepStack,
        mean: &SweepStack,
        adu_scale: f64,
    ) -> Result<Self> {
        let times = exposure_seconds(exposures);
        let read_noise_fit = LinearFit::fit(&times, &noise.sigmas)?;
        let dark_current_fit = LinearFit::fit(&times, &mean.means)?;

        if mean.len() != exposures.len() {
            return Err(Error::LengthMismatch(exposures.len(), mean.len()));
        }
        let table = exposures
            .iter()
            .zip(mean.means.iter().zip(&mean.sigmas))
            .map(|(exposure, (&mu, &sigma))| ExposureStats {
                label: exposure.label.clone(),
                exposure_s: exposure.seconds(),
                mean_adu: mu / adu_scale,
                sigma_adu: sigma / adu_scale,
            })
            .collect();

        Ok(Self {
            read_noise_fit,
            dark_current_fit,
            adu_scale,
            table,
        })
    }

    /// Dark current in ADU/s, in the raw (unscaled) ADU of the frames.
    pub fn dark_current_adu_per_s(&self) -> f64 {
        self.dark_current_fit.slope
    }

    pub fn bias_adu(&self) -> f64 {
        self.dark_current_fit.intercept
    }
}

/// Signal-to-noise at one point of the linear region. A decibel value is
/// `None` where it is not finite, e.g. a pair with no temporal noise.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SnrPoint {
    pub signal_e: f64,
    pub snr_db: Option<f64>,
    /// Shot-noise limit `20·log10(√N)`.
    pub ideal_db: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DynamicRange {
    pub ratio: f64,
    pub db: f64,
    pub bits: f64,
}

impl DynamicRange {
    /// `None` unless the ratio is positive and finite.
    pub fn from_ratio(ratio: f64) -> Option<Self> {
        if !ratio.is_finite() || ratio <= 0.0 {
            return None;
        }
        Some(Self {
            ratio,
            db: 20.0 * ratio.log10(),
            bits: ratio.log2(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PtcAnalysis {
    /// Temporal variance vs mean over the linear region. Slope is K in ADU/e⁻.
    pub ptc_fit: LinearFit,
    /// Mean vs exposure time over the linear region.
    pub linearity_fit: LinearFit,
    pub adu_scale: f64,
    /// Conversion gain K, ADU/e⁻.
    pub conversion_gain: f64,
    /// 1/K, e⁻/ADU.
    pub system_gain: f64,
    pub saturation_index: usize,
    pub full_well_e: f64,
    pub read_noise_adu: f64,
    pub read_noise_e: f64,
    /// `None` when the read noise is zero.
    pub dynamic_range: Option<DynamicRange>,
    pub snr: Vec<SnrPoint>,
}

impl PtcAnalysis {
    /// `fit_points` leading points form the linear region. The saturation
    /// mean is taken at `saturation_index`, clamped to the last point.
    /// `read_noise_adu` overrides the noise of the shortest exposure.
    pub fn new(
        exposures: &[Exposure],
        stack: &SweepStack,
        fit_points: usize,
        saturation_index: Option<usize>,
        read_noise_adu: Option<f64>,
        adu_scale: f64,
    ) -> Result<Self> {
        if stack.is_empty() {
            return Err(Error::EmptySweep);
        }
        if stack.len() != exposures.len() {
            return Err(Error::LengthMismatch(exposures.len(), stack.len()));
        }

        let n = fit_points.min(stack.len());
        let times = exposure_seconds(exposures);

        // Variance scales with the square of the ADU scale, so K follows the
        // scale while FWC and electron counts do not.
        let means: Vec<f64> = stack.means.iter().map(|m| m / adu_scale).collect();
        let variances: Vec<f64> = stack
            .variances
            .iter()
            .map(|v| v / (adu_scale * adu_scale))
            .collect();

        let ptc_fit = LinearFit::fit_prefix(&means, &variances, n)?;
        let linearity_fit = LinearFit::fit_prefix(&times, &stack.means, n)?;

        let conversion_gain = ptc_fit.slope;
        if !conversion_gain.is_finite() || conversion_gain <= 0.0 {
            return Err(Error::NonPositiveGain(conversion_gain));
        }
        let saturation_index = saturation_index.unwrap_or(n).min(stack.len() - 1);
        let full_well_e = means[saturation_index] / conversion_gain;

        let read_noise_adu = match read_noise_adu {
            Some(noise) if !noise.is_finite() || noise < 0.0 => {
                return Err(Error::ReadNoise(noise));
            }
            Some(noise) => noise,
            None => stack.variances[0].max(0.0).sqrt() / adu_scale,
        };
        let read_noise_e = read_noise_adu / conversion_gain;

        let snr = stack.means[..n]
            .iter()
            .zip(&stack.sigmas[..n])
            .map(|(&mu, &sigma)| {
                let signal_e = mu / adu_scale / conversion_gain;
                SnrPoint {
                    signal_e,
                    snr_db: finite(20.0 * (mu / sigma).log10()),
                    ideal_db: finite(20.0 * signal_e.sqrt().log10()),
                }
            })
            .collect();

        Ok(Self {
            ptc_fit,
            linearity_fit,
            adu_scale,
            conversion_gain,
            system_gain: 1.0 / conversion_gain,
            saturation_index,
            full_well_e,
            read_noise_adu,
            read_noise_e,
            dynamic_range: DynamicRange::from_ratio(full_well_e / read_noise_e),
            snr,
        })
    }
}

fn exposure_seconds(exposures: &[Exposure]) -> Vec<f64> {
    exposures.iter().map(Exposure::seconds).collect()
}

fn finite(value: f64) -> Option<f64> {
    value.is_finite().then_some(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn exposures(n: usize) -> Vec<Exposure> {
        (1..=n)
            .map(|i| Exposure::with_seconds(&i.to_string(), i as f64))
            .collect()
    }

    #[test]
    fn test_dark_analysis() {
        let exposures = exposures(4);
        let noise = SweepStack {
            sigmas: vec![3.0, 3.1, 3.2, 3.3],
            means: vec![0.0; 4],
            ..Default::default()
        };
        let mean = SweepStack {
            means: vec![116.0, 132.0, 148.0, 164.0],
            sigmas: vec![16.0, 16.0, 32.0, 32.0],
            ..Default::default()
        };

        let analysis = DarkAnalysis::new(&exposures, &noise, &mean, 16.0).unwrap();
        assert_relative_eq!(analysis.read_noise_fit.slope, 0.1, epsilon = 1e-12);
        assert_relative_eq!(analysis.dark_current_adu_per_s(), 16.0, epsilon = 1e-12);
        assert_relative_eq!(analysis.bias_adu(), 100.0, epsilon = 1e-12);
        assert_eq!(analysis.table.len(), 4);
        assert_relative_eq!(analysis.table[0].mean_adu, 7.25);
        assert_relative_eq!(analysis.table[3].sigma_adu, 2.0);
    }

    #[test]
    fn test_ptc_analysis() {
        // K = 0.5 ADU/e⁻, read variance 4 ADU², saturation after 4 points.
        let exposures = exposures(5);
        let means = vec![100.0, 1100.0, 2100.0, 3100.0, 4000.0];
        let variances: Vec<f64> = means.iter().map(|m| 0.5 * m + 4.0).collect();
        let stack = SweepStack {
            sigmas: variances.iter().map(|v| (2.0 * v).sqrt()).collect(),
            means,
            variances,
            frames: Vec::new(),
        };

        let analysis = PtcAnalysis::new(&exposures, &stack, 4, None, None, 1.0).unwrap();
        assert_relative_eq!(analysis.conversion_gain, 0.5, epsilon = 1e-12);
        assert_relative_eq!(analysis.system_gain, 2.0, epsilon = 1e-12);
        assert_relative_eq!(analysis.ptc_fit.intercept, 4.0, epsilon = 1e-9);
        assert_eq!(analysis.saturation_index, 4);
        assert_relative_eq!(analysis.full_well_e, 8000.0, epsilon = 1e-9);
        assert_relative_eq!(analysis.read_noise_adu, 54f64.sqrt(), epsilon = 1e-12);
        let dr = analysis.dynamic_range.unwrap();
        assert_relative_eq!(dr.ratio, 8000.0 / (54f64.sqrt() / 0.5), epsilon = 1e-9);
        assert_relative_eq!(dr.db, 20.0 * dr.ratio.log10());
        assert_eq!(analysis.snr.len(), 4);
        assert_relative_eq!(analysis.snr[1].signal_e, 2200.0, epsilon = 1e-9);
        assert!(analysis.snr.iter().all(|p| p.snr_db.is_some()));
    }

    #[test]
    fn test_noiseless_pair_serializes() {
        // First pair identical: no temporal noise, zero read noise.
        let exposures = exposures(4);
        let means = vec![100.0, 1100.0, 2100.0, 3100.0];
        let mut variances: Vec<f64> = means.iter().map(|m| 0.5 * m).collect();
        variances[0] = 0.0;
        let stack = SweepStack {
            sigmas: variances.iter().map(|v| (2.0 * v).sqrt()).collect(),
            means,
            variances,
            frames: Vec::new(),
        };

        let analysis = PtcAnalysis::new(&exposures, &stack, 4, None, None, 1.0).unwrap();
        assert_eq!(analysis.read_noise_e, 0.0);
        assert!(analysis.dynamic_range.is_none());
        assert!(analysis.snr[0].snr_db.is_none());
        assert!(analysis.snr[1].snr_db.is_some());

        let json = serde_json::to_string(&analysis).unwrap();
        let back: PtcAnalysis = serde_json::from_str(&json).unwrap();
        assert!(back.dynamic_range.is_none());
        assert!(back.snr[0].snr_db.is_none());
        assert_relative_eq!(back.conversion_gain, analysis.conversion_gain);
        assert_relative_eq!(back.full_well_e, analysis.full_well_e);
    }

    #[test]
    fn test_flat_or_falling_ptc_is_rejected() {
        let exposures = exposures(3);
        let flat = SweepStack {
            means: vec![100.0, 200.0, 300.0],
            sigmas: vec![2.0; 3],
            variances: vec![2.0; 3],
            frames: Vec::new(),
        };
        assert!(matches!(
            PtcAnalysis::new(&exposures, &flat, 3, None, None, 1.0),
            Err(Error::NonPositiveGain(k)) if k == 0.0
        ));

        let falling = SweepStack {
            variances: vec![6.0, 4.0, 2.0],
            ..flat.clone()
        };
        assert!(matches!(
            PtcAnalysis::new(&exposures, &falling, 3, None, None, 1.0),
            Err(Error::NonPositiveGain(_))
        ));

        let rising = SweepStack {
            variances: vec![50.0, 100.0, 150.0],
            ..flat
        };
        assert!(matches!(
            PtcAnalysis::new(&exposures, &rising, 3, None, Some(f64::NAN), 1.0),
            Err(Error::ReadNoise(_))
        ));
    }

    #[test]
    fn test_ptc_scale_and_overrides() {
        let exposures = exposures(3);
        let means = vec![160.0, 1760.0, 3360.0];
        // Raw read variance 256 ADU².
        let variances: Vec<f64> = means.iter().map(|m| 0.5 * m + 256.0).collect();
        let stack = SweepStack {
            sigmas: vec![1.0; 3],
            means,
            variances,
            frames: Vec::new(),
        };

        let analysis = PtcAnalysis::new(&exposures, &stack, 17, Some(99), Some(2.0), 16.0).unwrap();
        assert_relative_eq!(analysis.conversion_gain, 0.5 / 16.0, epsilon = 1e-12);
        // Intercept is a variance, divided by the square of the scale.
        assert_relative_eq!(analysis.ptc_fit.intercept, 1.0, epsilon = 1e-9);
        assert_eq!(analysis.saturation_index, 2);
        // Electron counts do not depend on the ADU scale.
        assert_relative_eq!(analysis.full_well_e, 3360.0 / 0.5, epsilon = 1e-9);
        assert_relative_eq!(analysis.read_noise_e, 64.0, epsilon = 1e-9);
        assert_relative_eq!(analysis.snr[2].signal_e, 6720.0, epsilon = 1e-9);
    }

    #[test]
    fn test_dynamic_range_units() {
        let dr = DynamicRange::from_ratio(1024.0).unwrap();
        assert_relative_eq!(dr.bits, 10.0);
        assert_relative_eq!(dr.db, 20.0 * 1024f64.log10());
        assert!(DynamicRange::from_ratio(f64::INFINITY).is_none());
        assert!(DynamicRange::from_ratio(0.0).is_none());
    }
}
