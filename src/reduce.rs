//! Pairwise reduction of two frames taken at the same exposure.

use crate::error::{Error, Result};
use crate::frame::Frame;

/// A derived frame and its scalar statistics.
#[derive(Debug, Clone)]
pub struct Reduction {
    pub frame: Frame,
    pub mean: f64,
    pub std: f64,
    pub variance: f64,
}

impl Reduction {
    fn from_frame(frame: Frame) -> Self {
        let mean = frame.mean();
        let variance = frame.variance();
        Self {
            std: variance.sqrt(),
            mean,
            variance,
            frame,
        }
    }
}

fn check_shapes(a: &Frame, b: &Frame) -> Result<()> {
    if a.dimensions() != b.dimensions() {
        return Err(Error::ShapeMismatch {
            left: a.dimensions(),
            right: b.dimensions(),
        });
    }
    Ok(())
}

/// `a - b`. Fixed pattern cancels; the spread is √2 times the temporal noise.
pub fn difference(a: &Frame, b: &Frame) -> Result<Reduction> {
    check_shapes(a, b)?;
    Ok(Reduction::from_frame(Frame::new(a.data() - b.data())))
}

/// `(a + b) / 2`.
pub fn average(a: &Frame, b: &Frame) -> Result<Reduction> {
    check_shapes(a, b)?;
    Ok(Reduction::from_frame(Frame::new(
        (a.data() + b.data()) / 2.0,
    )))
}
