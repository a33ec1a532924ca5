//! Console and JSON summaries of an analysis run.

use crate::analysis::{DarkAnalysis, PtcAnalysis};
use crate::fit::LinearFit;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::io::{self, Write};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SensorInfo {
    pub rows: usize,
    pub cols: usize,
    pub area: usize,
}

impl SensorInfo {
    pub fn from_dimensions((rows, cols): (usize, usize)) -> Self {
        Self {
            rows,
            cols,
            area: rows * cols,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DarkReport {
    pub generated_at: DateTime<Utc>,
    pub sensor: SensorInfo,
    pub analysis: DarkAnalysis,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PtcReport {
    pub generated_at: DateTime<Utc>,
    pub sensor: SensorInfo,
    pub analysis: PtcAnalysis,
}

fn heading(w: &mut impl Write, title: &str) -> io::Result<()> {
    writeln!(w, "\n{title}:")?;
    writeln!(w, "{}", "-".repeat(title.len() + 1))
}

fn write_fit(w: &mut impl Write, fit: &LinearFit, decimals: usize) -> io::Result<()> {
    writeln!(w, "- slope : {:.3}", fit.slope)?;
    writeln!(w, "- y-intercept : {:.3}", fit.intercept)?;
    writeln!(w, "- R-squared : {:.*}", decimals, fit.r_squared())
}

fn write_sensor(w: &mut impl Write, sensor: &SensorInfo) -> io::Result<()> {
    heading(w, "Sensor")?;
    writeln!(w, "- Resolution (Height,Width) : ({}, {})", sensor.rows, sensor.cols)?;
    writeln!(w, "- Area : {}", sensor.area)
}

pub fn write_dark_text(w: &mut impl Write, report: &DarkReport) -> io::Result<()> {
    let analysis = &report.analysis;
    write_sensor(w, &report.sensor)?;

    heading(w, "Read noise vs exposure time")?;
    write_fit(w, &analysis.read_noise_fit, 3)?;

    heading(w, "Dark current from mean")?;
    write_fit(w, &analysis.dark_current_fit, 3)?;
    writeln!(
        w,
        "- dark current : {:.3} ADU/s, bias : {:.3} ADU",
        analysis.dark_current_adu_per_s(),
        analysis.bias_adu()
    )?;

    heading(w, &format!("Averaged dark frames (ADU / {})", analysis.adu_scale))?;
    for row in &analysis.table {
        writeln!(w, "- Exp.time : {} s", row.label)?;
        writeln!(w, "  µ = {:.2} ADU", row.mean_adu)?;
        writeln!(w, "  σ = {:.2} ADU", row.sigma_adu)?;
    }
    Ok(())
}

pub fn write_ptc_text(w: &mut impl Write, report: &PtcReport) -> io::Result<()> {
    let analysis = &report.analysis;
    write_sensor(w, &report.sensor)?;

    heading(
        w,
        &format!("Photon transfer curve (ADU / {})", analysis.adu_scale),
    )?;
    write_fit(w, &analysis.ptc_fit, 4)?;
    writeln!(
        w,
        "- conversion gain : {:.4} ADU/e- ({:.3} e-/ADU)",
        analysis.conversion_gain, analysis.system_gain
    )?;
    writeln!(
        w,
        "- FWC (Full well capacity) : {:.2} e- at point {}",
        analysis.full_well_e, analysis.saturation_index
    )?;
    writeln!(
        w,
        "- read noise : {:.3} ADU ({:.3} e-)",
        analysis.read_noise_adu, analysis.read_noise_e
    )?;
    match &analysis.dynamic_range {
        Some(dr) => writeln!(
            w,
            "- dynamic range : {:.1} ({:.2} dB, {:.2} bit)",
            dr.ratio, dr.db, dr.bits
        )?,
        None => writeln!(w, "- dynamic range : n/a")?,
    }

    heading(w, "Mean signal vs exposure time")?;
    write_fit(w, &analysis.linearity_fit, 4)?;

    heading(w, "SNR")?;
    for point in &analysis.snr {
        writeln!(
            w,
            "- {:>10.1} e- : {} dB (ideal {} dB)",
            point.signal_e,
            db(point.snr_db),
            db(point.ideal_db)
        )?;
    }
    Ok(())
}

fn db(value: Option<f64>) -> String {
    match value {
        Some(v) => format!("{v:6.2}"),
        None => format!("{:>6}", "n/a"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::{ExposureStats, SnrPoint};

    fn fit(slope: f64, intercept: f64) -> LinearFit {
        LinearFit {
            slope,
            intercept,
            r_value: 0.99,
            slope_stderr: 0.0,
            points: 3,
        }
    }

    fn dark_report() -> DarkReport {
        DarkReport {
            generated_at: "2022-03-03T09:10:52Z".parse().unwrap(),
            sensor: SensorInfo::from_dimensions((1200, 1920)),
            analysis: DarkAnalysis {
                read_noise_fit: fit(0.012, 2.5),
                dark_current_fit: fit(1.25, 480.0),
                adu_scale: 16.0,
                table: vec![ExposureStats {
                    label: "40u".to_string(),
                    exposure_s: 40e-6,
                    mean_adu: 30.0,
                    sigma_adu: 1.5,
                }],
            },
        }
    }

    #[test]
    fn test_dark_text() {
        let mut out = Vec::new();
        write_dark_text(&mut out, &dark_report()).unwrap();
        let text = String::from_utf8(out).unwrap();

        assert!(text.contains("- Resolution (Height,Width) : (1200, 1920)"));
        assert!(text.contains("- Area : 2304000"));
        assert!(text.contains("- slope : 1.250"));
        assert!(text.contains("- R-squared : 0.980"));
        assert!(text.contains("- Exp.time : 40u s"));
        assert!(text.contains("µ = 30.00 ADU"));
    }

    #[test]
    fn test_report_json_round_trip() {
        let report = dark_report();
        let json = serde_json::to_string_pretty(&report).unwrap();
        assert!(json.contains("\"generated_at\": \"2022-03-03T09:10:52Z\""));

        let back: DarkReport = serde_json::from_str(&json).unwrap();
        assert_eq!(back.sensor, report.sensor);
        assert_eq!(back.analysis.table[0].label, "40u");
        approx::assert_relative_eq!(back.analysis.dark_current_fit.slope, 1.25);
    }

    #[test]
    fn test_ptc_text_without_read_noise() {
        let report = PtcReport {
            generated_at: "2022-03-03T09:10:52Z".parse().unwrap(),
            sensor: SensorInfo::from_dimensions((1200, 1920)),
            analysis: PtcAnalysis {
                ptc_fit: fit(0.5, 0.0),
                linearity_fit: fit(1000.0, 0.0),
                adu_scale: 1.0,
                conversion_gain: 0.5,
                system_gain: 2.0,
                saturation_index: 4,
                full_well_e: 800.0,
                read_noise_adu: 0.0,
                read_noise_e: 0.0,
                dynamic_range: None,
                snr: vec![
                    SnrPoint {
                        signal_e: 0.0,
                        snr_db: None,
                        ideal_db: None,
                    },
                    SnrPoint {
                        signal_e: 32.0,
                        snr_db: Some(12.04),
                        ideal_db: Some(15.05),
                    },
                ],
            },
        };

        let mut out = Vec::new();
        write_ptc_text(&mut out, &report).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("- dynamic range : n/a"));
        assert!(text.contains("   n/a dB (ideal    n/a dB)"));
        assert!(text.contains(" 12.04 dB (ideal  15.05 dB)"));
        assert!(text.contains("- FWC (Full well capacity) : 800.00 e- at point 4"));
    }
}
