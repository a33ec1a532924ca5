use anyhow::Context;
use anyhow::Result;
use serde::de::DeserializeOwned;
use std::io::Read;
use std::path::Path;
use uom::si::f64::Length;
use uom::si::length::micron;

/// Where the frame pairs live and which exposures were swept.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct SweepParams {
    /// Path with `{exposure}` and `{frame}` placeholders.
    pub path_template: String,
    /// Exposure labels in sweep order, as used in the folder names.
    pub exposures: Vec<String>,
    /// Exposure times in seconds. Parsed from the labels when absent.
    #[serde(default)]
    pub exposure_times_s: Option<Vec<f64>>,
}

fn labels(labels: &[&str]) -> Vec<String> {
    labels.iter().map(|l| l.to_string()).collect()
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct DarkParams {
    pub sweep: SweepParams,
    pub pixel_size_um: f64,
    /// Divisor from container ADU to ADC ADU in the per-exposure table.
    pub adu_scale: f64,
    /// Sweep position rendered as 2D intensity maps.
    pub preview_index: usize,
    pub histogram_bins: usize,
}

impl Default for DarkParams {
    fn default() -> Self {
        Self {
            sweep: SweepParams {
                path_template: "dark/{exposure}s/{frame}.tiff".to_string(),
                exposures: labels(&["40u", "1", "2", "3", "4", "5", "6", "7", "8", "9", "10"]),
                exposure_times_s: None,
            },
            pixel_size_um: 5.86,
            adu_scale: 16.,
            preview_index: 1,
            histogram_bins: crate::histogram::DEFAULT_BINS,
        }
    }
}

impl DarkParams {
    pub fn pixel_size(&self) -> Length {
        Length::new::<micron>(self.pixel_size_um)
    }
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct PtcParams {
    pub sweep: SweepParams,
    /// Leading sweep points forming the linear region.
    pub fit_points: usize,
    /// Sweep position of the saturation mean. Defaults to `fit_points`.
    pub saturation_index: Option<usize>,
    /// Read noise in scaled ADU. Taken from the shortest exposure when absent.
    pub read_noise_adu: Option<f64>,
    pub adu_scale: f64,
}

impl Default for PtcParams {
    fn default() -> Self {
        Self {
            sweep: SweepParams {
                path_template: "led/{exposure}s/{frame}.tiff".to_string(),
                exposures: labels(&[
                    "40u", "100u", "500u", "1m", "5m", "10m", "15m", "20m", "25m", "30m", "35m",
                    "40m", "45m", "50m", "55m", "60m", "65m", "70m", "75m", "77,5m", "80m",
                    "82,5m", "85m", "87,5m", "90m", "92,5m", "95m", "97,5m", "100m",
                ]),
                exposure_times_s: None,
            },
            fit_points: 17,
            saturation_index: None,
            read_noise_adu: None,
            adu_scale: 16.,
        }
    }
}

/// Read TOML formatted params, falling back to the defaults when no path is given.
pub fn load_params<T>(path: Option<&Path>) -> Result<T>
where
    T: DeserializeOwned + Default,
{
    match path {
        Some(path) => parse_params(path),
        None => Ok(T::default()),
    }
}

fn parse_params<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let mut buffer = String::new();
    std::fs::File::open(path)
        .with_context(|| format!("failed to open params {path:?}"))?
        .read_to_string(&mut buffer)?;
    let params =
        toml::from_str(&buffer).with_context(|| format!("failed to parse params {path:?}"))?;

    Ok(params)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_defaults_match_campaign() {
        let dark = DarkParams::default();
        assert_eq!(dark.sweep.exposures.len(), 11);
        assert_eq!(dark.histogram_bins, 11);

        let ptc = PtcParams::default();
        assert_eq!(ptc.sweep.exposures.len(), 29);
        assert_eq!(ptc.fit_points, 17);
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
fit_points = 5
read_noise_adu = 2.5

[sweep]
path_template = "frames/{{exposure}}/{{frame}}.png"
exposures = ["1m", "2m"]
exposure_times_s = [0.001, 0.002]
"#
        )
        .unwrap();

        let params: PtcParams = load_params(Some(file.path())).unwrap();
        assert_eq!(params.fit_points, 5);
        assert_eq!(params.read_noise_adu, Some(2.5));
        assert_eq!(params.adu_scale, 16.);
        assert_eq!(params.sweep.path_template, "frames/{exposure}/{frame}.png");
        assert_eq!(params.sweep.exposure_times_s, Some(vec![0.001, 0.002]));
    }

    #[test]
    fn test_bad_params_are_errors() {
        assert!(load_params::<DarkParams>(Some(Path::new("/nonexistent/params.toml"))).is_err());

        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "adu_scale = \"sixteen\"").unwrap();
        assert!(load_params::<DarkParams>(Some(file.path())).is_err());
    }
}
