//! Read noise and dark current from a sweep of dark frame pairs.

use crate::analysis::DarkAnalysis;
use crate::cli::ReportFormat;
use crate::config::{DarkParams, load_params};
use crate::frame::PathTemplate;
use crate::histogram::Histogram;
use crate::plot::{self, FitPlot, LogFloor};
use crate::report::{DarkReport, SensorInfo, write_dark_text};
use crate::sweep::{self, Exposure, SweepStack};
use anyhow::Context;
use anyhow::Result;
use chrono::Utc;
use std::f64::consts::SQRT_2;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Outcome of a dark sweep, kept together for plotting.
pub struct DarkRun {
    pub exposures: Vec<Exposure>,
    pub noise: SweepStack,
    pub mean: SweepStack,
    pub report: DarkReport,
}

pub fn run(
    params: &Option<PathBuf>,
    output_dir: &PathBuf,
    format: ReportFormat,
    plots: bool,
) -> Result<()> {
    let params: DarkParams = load_params(params.as_deref())?;
    let run = analyze(&params)?;

    std::fs::create_dir_all(output_dir)
        .with_context(|| format!("failed to create output directory {output_dir:?}"))?;

    let json_path = output_dir.join("dark_report.json");
    let json = serde_json::to_string_pretty(&run.report)?;
    std::fs::write(&json_path, &json).with_context(|| format!("failed to write {json_path:?}"))?;
    info!("report saved to {:?}", json_path);

    if plots {
        render(&run, &params, output_dir)?;
    }

    let mut stdout = std::io::stdout().lock();
    match format {
        ReportFormat::Text => write_dark_text(&mut stdout, &run.report)?,
        ReportFormat::Json => {
            use std::io::Write;
            writeln!(stdout, "{json}")?
        }
    }

    Ok(())
}

/// Load and reduce every pair, then fit the noise and mean series.
pub fn analyze(params: &DarkParams) -> Result<DarkRun> {
    let exposures = sweep::exposures(
        &params.sweep.exposures,
        params.sweep.exposure_times_s.as_deref(),
    )?;
    let template = PathTemplate::parse(&params.sweep.path_template)?;
    info!(
        "dark sweep over {} exposures from {}",
        exposures.len(),
        template
    );

    let (noise, mean) = sweep::dark_sweep(&template, &exposures).context("dark sweep failed")?;

    let analysis = DarkAnalysis::new(&exposures, &noise, &mean, params.adu_scale)?;
    let sensor = SensorInfo::from_dimensions(mean.dimensions().unwrap_or_default());

    Ok(DarkRun {
        exposures,
        noise,
        mean,
        report: DarkReport {
            generated_at: Utc::now(),
            sensor,
            analysis,
        },
    })
}

fn render(run: &DarkRun, params: &DarkParams, output_dir: &Path) -> Result<()> {
    for (idx, exposure) in run.exposures.iter().enumerate() {
        let mu = run.noise.means[idx];
        let sigma_diff = run.noise.sigmas[idx] * SQRT_2;
        let frame = &run.noise.frames[idx];

        let hist = match Histogram::around(
            frame.data().iter().map(|&v| v as f64),
            mu,
            sigma_diff,
            params.histogram_bins,
        ) {
            Ok(hist) => hist,
            Err(e) => {
                warn!("no histogram at {}s: {}", exposure.label, e);
                continue;
            }
        };

        let path = output_dir.join(format!("histogram_{}s.png", exposure.label));
        let title = format!(
            "Histogram @ {}s. μ: {:.2} ADU. σdiff: {:.2} ADU",
            exposure.label, mu, sigma_diff
        );
        plot::histogram(&path, &hist, mu, &title)?;
    }

    let idx = params.preview_index;
    match run.exposures.get(idx) {
        Some(exposure) => {
            let path = output_dir.join(format!("mean_frame_{}s.png", exposure.label));
            plot::intensity_map(
                &path,
                &run.mean.frames[idx],
                LogFloor::MinPositive,
                params.pixel_size(),
                &format!("Mean dark frame @ {}s", exposure.label),
            )?;

            let path = output_dir.join(format!("diff_frame_{}s.png", exposure.label));
            plot::intensity_map(
                &path,
                &run.noise.frames[idx],
                LogFloor::Fixed(100.0),
                params.pixel_size(),
                &format!("Diff. dark frame @ {}s", exposure.label),
            )?;
        }
        None => warn!("preview index {} is outside the sweep", idx),
    }

    let times: Vec<f64> = run.exposures.iter().map(Exposure::seconds).collect();
    let analysis = &run.report.analysis;

    plot::fit_overlay(
        &output_dir.join("read_noise.png"),
        &FitPlot {
            title: "Readout noise vs exposure time. Full-frame average",
            x_desc: "t [s]",
            y_desc: "σR [ADU]",
            x: &times,
            y: &run.noise.sigmas,
            fit: &analysis.read_noise_fit,
            r2_decimals: 3,
        },
    )?;

    plot::fit_overlay(
        &output_dir.join("dark_current.png"),
        &FitPlot {
            title: "Dark current from mean pixel value. Full-frame average",
            x_desc: "t [s]",
            y_desc: "μ [ADU]",
            x: &times,
            y: &run.mean.means,
            fit: &analysis.dark_current_fit,
            r2_decimals: 3,
        },
    )?;

    info!("plots saved to {:?}", output_dir);
    Ok(())
}
