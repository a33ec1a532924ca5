//! Photon transfer curve, full well, dynamic range and SNR from an
//! illuminated exposure sweep.

use crate::analysis::PtcAnalysis;
use crate::cli::ReportFormat;
use crate::config::{PtcParams, load_params};
use crate::frame::PathTemplate;
use crate::plot::{self, FitPlot};
use crate::report::{PtcReport, SensorInfo, write_ptc_text};
use crate::sweep::{self, Exposure, SweepStack};
use anyhow::Context;
use anyhow::Result;
use chrono::Utc;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

pub struct PtcRun {
    pub exposures: Vec<Exposure>,
    pub stack: SweepStack,
    pub report: PtcReport,
}

pub fn run(
    params: &Option<PathBuf>,
    output_dir: &PathBuf,
    format: ReportFormat,
    plots: bool,
) -> Result<()> {
    let params: PtcParams = load_params(params.as_deref())?;
    let run = analyze(&params)?;

    std::fs::create_dir_all(output_dir)
        .with_context(|| format!("failed to create output directory {output_dir:?}"))?;

    let json_path = output_dir.join("ptc_report.json");
    let json = serde_json::to_string_pretty(&run.report)?;
    std::fs::write(&json_path, &json).with_context(|| format!("failed to write {json_path:?}"))?;
    info!("report saved to {:?}", json_path);

    if plots {
        render(&run, output_dir)?;
    }

    let mut stdout = std::io::stdout().lock();
    match format {
        ReportFormat::Text => write_ptc_text(&mut stdout, &run.report)?,
        ReportFormat::Json => {
            use std::io::Write;
            writeln!(stdout, "{json}")?
        }
    }

    Ok(())
}

pub fn analyze(params: &PtcParams) -> Result<PtcRun> {
    let exposures = sweep::exposures(
        &params.sweep.exposures,
        params.sweep.exposure_times_s.as_deref(),
    )?;
    let template = PathTemplate::parse(&params.sweep.path_template)?;
    info!(
        "photon transfer sweep over {} exposures from {}",
        exposures.len(),
        template
    );
    if params.fit_points > exposures.len() {
        warn!(
            "linear region of {} points exceeds the sweep, fitting all {}",
            params.fit_points,
            exposures.len()
        );
    }

    let stack = sweep::ptc_sweep(&template, &exposures).context("photon transfer sweep failed")?;
    let analysis = PtcAnalysis::new(
        &exposures,
        &stack,
        params.fit_points,
        params.saturation_index,
        params.read_noise_adu,
        params.adu_scale,
    )?;
    let sensor = SensorInfo::from_dimensions(stack.dimensions().unwrap_or_default());

    Ok(PtcRun {
        exposures,
        stack,
        report: PtcReport {
            generated_at: Utc::now(),
            sensor,
            analysis,
        },
    })
}

fn render(run: &PtcRun, output_dir: &Path) -> Result<()> {
    let analysis = &run.report.analysis;
    let times: Vec<f64> = run.exposures.iter().map(Exposure::seconds).collect();
    let scale = analysis.adu_scale;
    let means: Vec<f64> = run.stack.means.iter().map(|m| m / scale).collect();
    let variances: Vec<f64> = run
        .stack
        .variances
        .iter()
        .map(|v| v / (scale * scale))
        .collect();

    plot::fit_overlay(
        &output_dir.join("mean_vs_time.png"),
        &FitPlot {
            title: "Mean signal vs exposure time. Full-frame average",
            x_desc: "t [s]",
            y_desc: "Mean signal [ADU]",
            x: &times,
            y: &run.stack.means,
            fit: &analysis.linearity_fit,
            r2_decimals: 4,
        },
    )?;

    plot::fit_overlay(
        &output_dir.join("ptc.png"),
        &FitPlot {
            title: "Photon Transfer Curve (PTC). Full-frame",
            x_desc: "Mean pixel value [ADU]",
            y_desc: "Variance [ADU²]",
            x: &means,
            y: &variances,
            fit: &analysis.ptc_fit,
            r2_decimals: 4,
        },
    )?;

    match plot::snr(&output_dir.join("snr.png"), &analysis.snr) {
        Ok(()) => {}
        Err(e) => warn!("skipping SNR plot: {}", e),
    }

    info!("plots saved to {:?}", output_dir);
    Ok(())
}
