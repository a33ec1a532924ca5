//! Exposure sweeps: one frame pair per exposure, reduced and stacked in
//! sweep order.

use crate::error::{Error, Result};
use crate::frame::{Frame, PathTemplate, load_frame};
use crate::reduce::{Reduction, average, difference};
use rayon::prelude::*;
use std::f64::consts::SQRT_2;
use tracing::debug;
use uom::si::f64::Time;
use uom::si::time;

/// One exposure setting of a sweep.
#[derive(Debug, Clone, PartialEq)]
pub struct Exposure {
    /// Label as it appears in the folder names, e.g. `40u` or `77,5m`.
    pub label: String,
    pub time: Time,
}

impl Exposure {
    /// Parse a label with an optional `u` (µs) or `m` (ms) suffix. Both `,` and
    /// `.` are accepted as decimal separator.
    pub fn parse(label: &str) -> Result<Self> {
        let trimmed = label.trim();
        let (number, unit) = match trimmed.char_indices().last() {
            Some((i, 'u')) => (&trimmed[..i], 'u'),
            Some((i, 'm')) => (&trimmed[..i], 'm'),
            _ => (trimmed, 's'),
        };

        let value: f64 = number
            .replace(',', ".")
            .parse()
            .map_err(|_| Error::ExposureLabel(label.to_string()))?;
        if !value.is_finite() || value < 0.0 {
            return Err(Error::ExposureLabel(label.to_string()));
        }

        let duration = match unit {
            'u' => Time::new::<time::microsecond>(value),
            'm' => Time::new::<time::millisecond>(value),
            _ => Time::new::<time::second>(value),
        };

        Ok(Self {
            label: label.to_string(),
            time: duration,
        })
    }

    pub fn with_seconds(label: &str, seconds: f64) -> Self {
        Self {
            label: label.to_string(),
            time: Time::new::<time::second>(seconds),
        }
    }

    pub fn seconds(&self) -> f64 {
        self.time.get::<time::second>()
    }
}

/// Build the exposure list from labels, optionally overriding the parsed
/// durations with explicit times in seconds.
pub fn exposures(labels: &[String], seconds: Option<&[f64]>) -> Result<Vec<Exposure>> {
    if labels.is_empty() {
        return Err(Error::EmptySweep);
    }

    match seconds {
        Some(seconds) => {
            if seconds.len() != labels.len() {
                return Err(Error::LengthMismatch(labels.len(), seconds.len()));
            }
            Ok(labels
                .iter()
                .zip(seconds)
                .map(|(label, &s)| Exposure::with_seconds(label, s))
                .collect())
        }
        None => labels.iter().map(|label| Exposure::parse(label)).collect(),
    }
}

/// Per-exposure derived frames and scalar series, indexed by sweep position.
#[derive(Debug, Clone, Default)]
pub struct SweepStack {
    pub frames: Vec<Frame>,
    pub means: Vec<f64>,
    pub sigmas: Vec<f64>,
    pub variances: Vec<f64>,
}

impl SweepStack {
    pub fn len(&self) -> usize {
        self.means.len()
    }

    pub fn is_empty(&self) -> bool {
        self.means.is_empty()
    }

    pub fn dimensions(&self) -> Option<(usize, usize)> {
        self.frames.first().map(Frame::dimensions)
    }

    fn push(&mut self, frame: Frame, mean: f64, sigma: f64, variance: f64) -> Result<()> {
        if let Some(dims) = self.dimensions() {
            if dims != frame.dimensions() {
                return Err(Error::ShapeMismatch {
                    left: dims,
                    right: frame.dimensions(),
                });
            }
        }
        self.frames.push(frame);
        self.means.push(mean);
        self.sigmas.push(sigma);
        self.variances.push(variance);
        Ok(())
    }
}

/// Source of the two frames captured at each exposure.
pub trait PairSource: Sync {
    fn load_pair(&self, exposure: &Exposure) -> Result<(Frame, Frame)>;
}

impl PairSource for PathTemplate {
    fn load_pair(&self, exposure: &Exposure) -> Result<(Frame, Frame)> {
        let first_path = self.render(&exposure.label, 1);
        let second_path = self.render(&exposure.label, 2);
        debug!("loading pair {:?} / {:?}", first_path, second_path);
        Ok((load_frame(first_path)?, load_frame(second_path)?))
    }
}

/// Load every pair in parallel and reduce it; results keep sweep order.
fn reduce_pairs<S, F, T>(source: &S, exposures: &[Exposure], reduce: F) -> Result<Vec<T>>
where
    S: PairSource + ?Sized,
    F: Fn(&Frame, &Frame) -> Result<T> + Sync,
    T: Send,
{
    if exposures.is_empty() {
        return Err(Error::EmptySweep);
    }

    exposures
        .par_iter()
        .map(|exposure| {
            let (a, b) = source.load_pair(exposure)?;
            reduce(&a, &b)
        })
        .collect()
}

impl SweepStack {
    /// Difference pair: mean of the difference and read noise `σ_diff / √2`.
    fn push_noise(&mut self, diff: Reduction) -> Result<()> {
        let Reduction {
            frame,
            mean,
            std,
            variance,
        } = diff;
        self.push(frame, mean, std / SQRT_2, variance / 2.0)
    }

    /// Average pair: mean and spatial σ of the averaged frame.
    fn push_mean(&mut self, avg: Reduction) -> Result<()> {
        self.push(avg.frame, avg.mean, avg.std, avg.variance)
    }
}

fn reduce_both(a: &Frame, b: &Frame) -> Result<(Reduction, Reduction)> {
    Ok((difference(a, b)?, average(a, b)?))
}

/// Difference pairs. Records the mean of the difference and the read noise
/// `σ_diff / √2`.
pub fn noise_sweep<S>(source: &S, exposures: &[Exposure]) -> Result<SweepStack>
where
    S: PairSource + ?Sized,
{
    let mut stack = SweepStack::default();
    for diff in reduce_pairs(source, exposures, difference)? {
        stack.push_noise(diff)?;
    }
    Ok(stack)
}

/// Average pairs. Records mean and spatial σ of the averaged frame.
pub fn mean_sweep<S>(source: &S, exposures: &[Exposure]) -> Result<SweepStack>
where
    S: PairSource + ?Sized,
{
    let mut stack = SweepStack::default();
    for avg in reduce_pairs(source, exposures, average)? {
        stack.push_mean(avg)?;
    }
    Ok(stack)
}

/// Noise and mean sweeps from a single pass over the frames, each pair is
/// decoded once.
pub fn dark_sweep<S>(source: &S, exposures: &[Exposure]) -> Result<(SweepStack, SweepStack)>
where
    S: PairSource + ?Sized,
{
    let mut noise = SweepStack::default();
    let mut mean = SweepStack::default();
    for (diff, avg) in reduce_pairs(source, exposures, reduce_both)? {
        noise.push_noise(diff)?;
        mean.push_mean(avg)?;
    }
    Ok((noise, mean))
}

/// Photon transfer sweep. Records the mean of the averaged frame, σ of the
/// difference and temporal variance `var(diff) / 2`; stacks averaged frames.
pub fn ptc_sweep<S>(source: &S, exposures: &[Exposure]) -> Result<SweepStack>
where
    S: PairSource + ?Sized,
{
    let mut stack = SweepStack::default();
    for (diff, avg) in reduce_pairs(source, exposures, reduce_both)? {
        stack.push(avg.frame, avg.mean, diff.std, diff.variance / 2.0)?;
    }
    Ok(stack)
}
