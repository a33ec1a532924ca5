use std::path::PathBuf;
use thiserror::Error;

/// Errors raised by the numeric pipeline.
#[derive(Debug, Error)]
pub enum Error {
    #[error("failed to read frame {path:?}")]
    Load {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("unsupported pixel layout {layout:?} in {path:?}, expected 8 or 16-bit grey")]
    UnsupportedLayout { path: PathBuf, layout: image::ColorType },

    #[error("decoded buffer of {path:?} does not match its dimensions")]
    Buffer {
        path: PathBuf,
        #[source]
        source: ndarray::ShapeError,
    },

    #[error("frame shapes differ: {left:?} vs {right:?}")]
    ShapeMismatch {
        left: (usize, usize),
        right: (usize, usize),
    },

    #[error("path template {0:?} must contain both {{exposure}} and {{frame}}")]
    Template(String),

    #[error("invalid exposure label {0:?}")]
    ExposureLabel(String),

    #[error("exposure sweep is empty")]
    EmptySweep,

    #[error("series lengths differ: {0} vs {1}")]
    LengthMismatch(usize, usize),

    #[error("at least two points are needed for a fit, got {0}")]
    TooFewPoints(usize),

    #[error("x values have no spread, the fit is undetermined")]
    DegenerateFit,

    #[error("photon transfer slope {0} gives no positive conversion gain")]
    NonPositiveGain(f64),

    #[error("read noise must be finite and non-negative, got {0}")]
    ReadNoise(f64),

    #[error("histogram width must be positive and finite, got sigma={0}")]
    HistogramWidth(f64),
}

pub type Result<T> = std::result::Result<T, Error>;
