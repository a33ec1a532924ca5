//! Loading raw sensor frames.
//!
//! Frames are kept as `f32` ADU samples in row-major `(rows, cols)` order.
//! Statistics are accumulated in `f64`.

use crate::error::{Error, Result};
use image::{DynamicImage, ImageReader};
use ndarray::Array2;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    data: Array2<f32>,
}

impl Frame {
    pub fn new(data: Array2<f32>) -> Self {
        Self { data }
    }

    /// Build a frame from row-major samples.
    pub fn from_raw(rows: usize, cols: usize, samples: Vec<f32>) -> Option<Self> {
        Array2::from_shape_vec((rows, cols), samples)
            .ok()
            .map(Self::new)
    }

    /// (rows, cols)
    pub fn dimensions(&self) -> (usize, usize) {
        self.data.dim()
    }

    /// Number of pixels.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn data(&self) -> &Array2<f32> {
        &self.data
    }

    pub fn into_data(self) -> Array2<f32> {
        self.data
    }

    pub fn mean(&self) -> f64 {
        if self.data.is_empty() {
            return f64::NAN;
        }
        self.data.iter().map(|&v| v as f64).sum::<f64>() / self.data.len() as f64
    }

    /// Population variance (no Bessel correction).
    pub fn variance(&self) -> f64 {
        let mean = self.mean();
        self.data
            .iter()
            .map(|&v| (v as f64 - mean).powi(2))
            .sum::<f64>()
            / self.data.len() as f64
    }

    /// Population standard deviation.
    pub fn std(&self) -> f64 {
        self.variance().sqrt()
    }
}

/// Read a grey image into a frame, keeping raw ADU values.
///
/// 8-bit data is not stretched to 16 bits.
pub fn load_frame(path: impl AsRef<Path>) -> Result<Frame> {
    let path = path.as_ref();
    let image = ImageReader::open(path)
        .map_err(|e| Error::Load {
            path: path.to_path_buf(),
            source: image::ImageError::IoError(e),
        })?
        .with_guessed_format()
        .map_err(|e| Error::Load {
            path: path.to_path_buf(),
            source: image::ImageError::IoError(e),
        })?
        .decode()
        .map_err(|source| Error::Load {
            path: path.to_path_buf(),
            source,
        })?;

    let (cols, rows) = (image.width() as usize, image.height() as usize);
    let samples: Vec<f32> = match image {
        DynamicImage::ImageLuma8(buffer) => buffer.into_raw().into_iter().map(f32::from).collect(),
        DynamicImage::ImageLuma16(buffer) => {
            buffer.into_raw().into_iter().map(f32::from).collect()
        }
        other => {
            return Err(Error::UnsupportedLayout {
                path: path.to_path_buf(),
                layout: other.color(),
            });
        }
    };

    frame_from_samples(path, rows, cols, samples)
}

fn frame_from_samples(path: &Path, rows: usize, cols: usize, samples: Vec<f32>) -> Result<Frame> {
    Array2::from_shape_vec((rows, cols), samples)
        .map(Frame::new)
        .map_err(|source| Error::Buffer {
            path: path.to_path_buf(),
            source,
        })
}

/// A file path pattern with `{exposure}` and `{frame}` placeholders.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathTemplate(String);

impl PathTemplate {
    pub const EXPOSURE: &'static str = "{exposure}";
    pub const FRAME: &'static str = "{frame}";

    pub fn parse(template: &str) -> Result<Self> {
        if !template.contains(Self::EXPOSURE) || !template.contains(Self::FRAME) {
            return Err(Error::Template(template.to_string()));
        }

        Ok(Self(template.to_string()))
    }

    /// Path of frame `index` (1-based) at the given exposure label.
    pub fn render(&self, exposure: &str, index: usize) -> PathBuf {
        PathBuf::from(
            self.0
                .replace(Self::EXPOSURE, exposure)
                .replace(Self::FRAME, &index.to_string()),
        )
    }
}

impl std::fmt::Display for PathTemplate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use image::{ImageBuffer, Luma};
    use tempfile::TempDir;

    #[test]
    fn test_template_requires_placeholders() {
        assert!(PathTemplate::parse("dark/{exposure}s/1.tiff").is_err());
        assert!(PathTemplate::parse("dark/10s/{frame}.tiff").is_err());

        let template = PathTemplate::parse("dark/{exposure}s/{frame}.tiff").unwrap();
        assert_eq!(
            template.render("40u", 2),
            PathBuf::from("dark/40us/2.tiff")
        );
    }

    #[test]
    fn test_population_statistics() {
        let frame = Frame::from_raw(2, 2, vec![1.0, 2.0, 3.0, 4.0]).unwrap();
        assert_relative_eq!(frame.mean(), 2.5);
        assert_relative_eq!(frame.variance(), 1.25);
        assert_relative_eq!(frame.std(), 1.25f64.sqrt());
        assert_eq!(frame.dimensions(), (2, 2));
        assert_eq!(frame.len(), 4);
    }

    #[test]
    fn test_load_16bit_keeps_raw_values() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("frame.tiff");
        let buffer: ImageBuffer<Luma<u16>, Vec<u16>> =
            ImageBuffer::from_fn(3, 2, |x, y| Luma([1000 + (y * 3 + x) as u16]));
        buffer.save(&path).unwrap();

        let frame = load_frame(&path).unwrap();
        assert_eq!(frame.dimensions(), (2, 3));
        assert_eq!(frame.data()[[0, 0]], 1000.0);
        assert_eq!(frame.data()[[1, 2]], 1005.0);
    }

    #[test]
    fn test_load_8bit_is_not_rescaled() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("frame.png");
        let buffer: ImageBuffer<Luma<u8>, Vec<u8>> = ImageBuffer::from_pixel(4, 4, Luma([7]));
        buffer.save(&path).unwrap();

        let frame = load_frame(&path).unwrap();
        assert_relative_eq!(frame.mean(), 7.0);
    }

    #[test]
    fn test_short_buffer_is_reported_with_its_path() {
        let err = frame_from_samples(Path::new("short.tiff"), 2, 3, vec![0.0; 5]).unwrap_err();
        assert!(matches!(&err, Error::Buffer { path, .. } if path == Path::new("short.tiff")));

        let frame = frame_from_samples(Path::new("ok.tiff"), 2, 3, vec![1.0; 6]).unwrap();
        assert_eq!(frame.dimensions(), (2, 3));
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        let err = load_frame(dir.path().join("absent.tiff")).unwrap_err();
        assert!(matches!(err, Error::Load { .. }));
    }
}
