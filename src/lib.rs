//! Image sensor characterization from pairs of frames taken over an exposure
//! sweep: read noise, dark current, photon transfer gain, full well, dynamic
//! range and SNR.

pub mod analysis;
pub mod cli;
pub mod config;
pub mod dark;
pub mod error;
pub mod fit;
pub mod frame;
pub mod histogram;
pub mod plot;
pub mod ptc;
pub mod reduce;
pub mod report;
pub mod sweep;

pub use error::{Error, Result};
