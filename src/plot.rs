//! PNG rendering of histograms, intensity maps and fit overlays.

use crate::analysis::SnrPoint;
use crate::fit::LinearFit;
use crate::frame::Frame;
use crate::histogram::Histogram;
use anyhow::Result;
use plotters::coord::Shift;
use plotters::prelude::*;
use plotters::series::DashedLineSeries;
use std::path::Path;
use uom::si::f64::Length;
use uom::si::length::micron;

const PLOT_SIZE: (u32, u32) = (1024, 768);
const COLOR_BAR_WIDTH: u32 = 140;

/// Map `x` on `[x_min, x_max]` to a blue-cyan-yellow-red colour.
pub fn to_rgb(x: f64, x_min: f64, x_max: f64) -> Option<[u8; 3]> {
    if x.is_nan() || x < x_min || x > x_max {
        return None;
    }

    let t = if x_max > x_min {
        (x - x_min) / (x_max - x_min)
    } else {
        0.0
    };

    // Piecewise-linear ramps, each channel peaks over a quarter of the range.
    let ramp = |centre: f64| (1.5 - (4.0 * (t - centre)).abs()).clamp(0.0, 1.0);
    let channel = |v: f64| (v * 255.0).round() as u8;

    Some([channel(ramp(0.75)), channel(ramp(0.5)), channel(ramp(0.25))])
}

/// Diverging blue-white-red map on `[0, 1]`, used for histogram bars.
pub fn coolwarm(t: f64) -> RGBColor {
    let t = t.clamp(0.0, 1.0);
    let cool = (59.0, 76.0, 192.0);
    let mid = (221.0, 221.0, 221.0);
    let warm = (180.0, 4.0, 38.0);
    let (a, b, s) = if t < 0.5 {
        (cool, mid, t * 2.0)
    } else {
        (mid, warm, (t - 0.5) * 2.0)
    };
    let lerp = |p: f64, q: f64| (p + (q - p) * s).round() as u8;
    RGBColor(lerp(a.0, b.0), lerp(a.1, b.1), lerp(a.2, b.2))
}

/// Histogram of a derived frame with a dashed marker at the mean.
pub fn histogram(path: &Path, hist: &Histogram, mu: f64, title: &str) -> Result<()> {
    let root = BitMapBackend::new(path, PLOT_SIZE).into_drawing_area();
    root.fill(&WHITE)?;

    let edges = hist.edges();
    let (lo, hi) = (edges[0], edges[edges.len() - 1]);
    let max = hist.max_count().max(1);
    let y_max = max + max / 10 + 1;

    let mut chart = ChartBuilder::on(&root)
        .caption(title, ("sans-serif", 22).into_font())
        .margin(15)
        .x_label_area_size(40)
        .y_label_area_size(70)
        .build_cartesian_2d(lo..hi, 0u64..y_max)?;

    chart
        .configure_mesh()
        .disable_x_mesh()
        .x_desc("ADU")
        .y_desc("Counts")
        .x_label_formatter(&|x| format!("{x:.1}"))
        .axis_desc_style(("sans-serif", 18))
        .draw()?;

    chart.draw_series(hist.bins().map(|(left, right, count)| {
        let color = coolwarm(count as f64 / max as f64);
        Rectangle::new([(left, 0), (right, count)], color.mix(0.7).filled())
    }))?;

    chart
        .draw_series(DashedLineSeries::new(
            vec![(mu, 0), (mu, y_max)],
            8,
            5,
            BLACK.stroke_width(2),
        ))?
        .label("mean")
        .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], BLACK.stroke_width(2)));

    chart
        .configure_series_labels()
        .position(SeriesLabelPosition::UpperRight)
        .background_style(WHITE.mix(0.8))
        .border_style(BLACK)
        .draw()?;

    root.present()?;
    Ok(())
}

/// Lower bound of the logarithmic colour scale of an intensity map.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LogFloor {
    /// Smallest positive value in the frame.
    MinPositive,
    Fixed(f64),
}

/// `|frame|` on a logarithmic colour scale with a colour bar and a scale bar.
pub fn intensity_map(
    path: &Path,
    frame: &Frame,
    floor: LogFloor,
    pixel_size: Length,
    title: &str,
) -> Result<()> {
    let (rows, cols) = frame.dimensions();
    let magnitude = frame.data().mapv(|v| (v as f64).abs());

    let max = magnitude.iter().copied().fold(0.0f64, f64::max);
    let floor = match floor {
        LogFloor::MinPositive => magnitude
            .iter()
            .copied()
            .filter(|&v| v > 0.0)
            .fold(f64::INFINITY, f64::min),
        LogFloor::Fixed(v) => v,
    };
    let floor = if floor.is_finite() && floor > 0.0 { floor } else { 1.0 };
    let (log_lo, log_hi) = (floor.ln(), max.max(floor).ln());

    let caption_height = 40;
    let size = (cols as u32 + COLOR_BAR_WIDTH, rows as u32 + caption_height);
    let root = BitMapBackend::new(path, size).into_drawing_area();
    root.fill(&WHITE)?;
    let root = root.titled(title, ("sans-serif", 24))?;
    let (map_area, bar_area) = root.split_horizontally(cols as u32);

    for ((row, col), &v) in magnitude.indexed_iter() {
        let t = v.max(floor).ln();
        let [r, g, b] = to_rgb(t, log_lo, log_hi).unwrap_or([255, 255, 255]);
        map_area.draw_pixel((col as i32, row as i32), &RGBColor(r, g, b))?;
    }

    draw_scale_bar(&map_area, rows, pixel_size)?;
    draw_color_bar(&bar_area, floor, max.max(floor))?;

    root.present()?;
    Ok(())
}

/// Scale bar of a round number of microns in the lower-left corner.
fn draw_scale_bar(
    area: &DrawingArea<BitMapBackend, Shift>,
    rows: usize,
    pixel_size: Length,
) -> Result<()> {
    let pitch_um = pixel_size.get::<micron>();
    if !(pitch_um > 0.0) {
        return Ok(());
    }

    let (width, _) = area.dim_in_pixel();
    let target_um = width as f64 * pitch_um / 5.0;
    let bar_um = nice_length(target_um);
    let bar_px = (bar_um / pitch_um).round() as i32;
    let y = rows as i32 - 20;

    area.draw(&Rectangle::new(
        [(10, y - 30), (20 + bar_px, y + 6)],
        WHITE.mix(0.95).filled(),
    ))?;
    area.draw(&Rectangle::new([(15, y), (15 + bar_px, y + 4)], BLACK.filled()))?;
    let label = if bar_um >= 1000.0 {
        format!("{} mm", bar_um / 1000.0)
    } else {
        format!("{bar_um} µm")
    };
    area.draw(&Text::new(label, (15, y - 24), ("sans-serif", 16).into_font()))?;
    Ok(())
}

/// Largest 1, 2 or 5 times a power of ten not above `x`.
fn nice_length(x: f64) -> f64 {
    let exponent = x.log10().floor();
    let base = 10f64.powf(exponent);
    [5.0, 2.0, 1.0]
        .into_iter()
        .map(|m| m * base)
        .find(|&v| v <= x)
        .unwrap_or(base)
}

fn draw_color_bar(area: &DrawingArea<BitMapBackend, Shift>, lo: f64, hi: f64) -> Result<()> {
    let hi = if hi > lo { hi } else { lo * 10.0 };
    let mut chart = ChartBuilder::on(area)
        .margin(20)
        .y_label_area_size(70)
        .build_cartesian_2d(0.0..1.0, (lo..hi).log_scale())?;

    chart
        .configure_mesh()
        .disable_mesh()
        .disable_x_axis()
        .y_desc("Log intensity (ADU)")
        .y_label_formatter(&|y| format!("{y:.0}"))
        .draw()?;

    let steps = 256;
    let (log_lo, log_hi) = (lo.ln(), hi.ln());
    chart.draw_series((0..steps).map(|i| {
        let t0 = log_lo + (log_hi - log_lo) * i as f64 / steps as f64;
        let t1 = log_lo + (log_hi - log_lo) * (i + 1) as f64 / steps as f64;
        let [r, g, b] = to_rgb(t0, log_lo, log_hi).unwrap_or([255, 255, 255]);
        Rectangle::new([(0.0, t0.exp()), (1.0, t1.exp())], RGBColor(r, g, b).filled())
    }))?;

    Ok(())
}

/// Data points of one series against another with a fitted line.
pub struct FitPlot<'a> {
    pub title: &'a str,
    pub x_desc: &'a str,
    pub y_desc: &'a str,
    pub x: &'a [f64],
    pub y: &'a [f64],
    pub fit: &'a LinearFit,
    /// Decimals of the R² annotation.
    pub r2_decimals: usize,
}

pub fn fit_overlay(path: &Path, plot: &FitPlot) -> Result<()> {
    let root = BitMapBackend::new(path, PLOT_SIZE).into_drawing_area();
    root.fill(&WHITE)?;

    let (x_lo, x_hi) = padded_range(plot.x.iter().copied());
    let fitted = plot.x.iter().map(|&x| plot.fit.predict(x));
    let (y_lo, y_hi) = padded_range(plot.y.iter().copied().chain(fitted));

    let mut chart = ChartBuilder::on(&root)
        .caption(plot.title, ("sans-serif", 22).into_font())
        .margin(15)
        .x_label_area_size(45)
        .y_label_area_size(80)
        .build_cartesian_2d(x_lo..x_hi, y_lo..y_hi)?;

    chart
        .configure_mesh()
        .light_line_style(WHITE)
        .bold_line_style(RGBColor(160, 160, 160).mix(0.6))
        .x_desc(plot.x_desc)
        .y_desc(plot.y_desc)
        .axis_desc_style(("sans-serif", 18))
        .draw()?;

    chart
        .draw_series(
            plot.x
                .iter()
                .zip(plot.y)
                .map(|(&x, &y)| {
                    EmptyElement::at((x, y))
                        + Rectangle::new([(-5, -5), (5, 5)], BLUE.filled())
                }),
        )?
        .label("data")
        .legend(|(x, y)| Rectangle::new([(x + 5, y - 5), (x + 15, y + 5)], BLUE.filled()));

    let line: Vec<(f64, f64)> = [x_lo, x_hi]
        .into_iter()
        .map(|x| (x, plot.fit.predict(x)))
        .collect();
    chart
        .draw_series(DashedLineSeries::new(line, 10, 6, BLACK.stroke_width(2)))?
        .label("linear fit")
        .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], BLACK.stroke_width(2)));

    chart
        .configure_series_labels()
        .position(SeriesLabelPosition::LowerRight)
        .background_style(WHITE.mix(0.8))
        .border_style(BLACK)
        .draw()?;

    let annotation = [
        plot.fit.to_string(),
        format!(
            "R² = {:.*}",
            plot.r2_decimals,
            plot.fit.r_squared()
        ),
    ];
    let style = ("sans-serif", 18).into_font();
    root.draw(&Rectangle::new(
        [(105, 30), (380, 90)],
        RGBColor(192, 192, 192).mix(0.7).filled(),
    ))?;
    for (i, line) in annotation.iter().enumerate() {
        root.draw(&Text::new(line.as_str(), (115, 38 + 26 * i as i32), style.clone()))?;
    }

    root.present()?;
    Ok(())
}

/// Measured SNR against signal on log axes, with the shot-noise limit.
pub fn snr(path: &Path, points: &[SnrPoint]) -> Result<()> {
    // (signal, measured, ideal), log axes keep only positive values.
    let points: Vec<(f64, f64, f64)> = points
        .iter()
        .filter_map(|p| Some((p.signal_e, p.snr_db?, p.ideal_db?)))
        .filter(|&(signal, measured, ideal)| signal > 0.0 && measured > 0.0 && ideal > 0.0)
        .collect();
    if points.is_empty() {
        anyhow::bail!("no positive SNR points to plot");
    }

    let root = BitMapBackend::new(path, PLOT_SIZE).into_drawing_area();
    root.fill(&WHITE)?;

    let (x_lo, x_hi) = log_range(points.iter().map(|p| p.0));
    let (y_lo, y_hi) = log_range(points.iter().flat_map(|p| [p.1, p.2]));

    let mut chart = ChartBuilder::on(&root)
        .caption("Input SNR", ("sans-serif", 22).into_font())
        .margin(15)
        .x_label_area_size(45)
        .y_label_area_size(70)
        .build_cartesian_2d((x_lo..x_hi).log_scale(), (y_lo..y_hi).log_scale())?;

    chart
        .configure_mesh()
        .x_desc("Average value [e⁻]")
        .y_desc("SNR [dB]")
        .x_label_formatter(&|x| format!("{x:.0e}"))
        .axis_desc_style(("sans-serif", 18))
        .draw()?;

    chart
        .draw_series(DashedLineSeries::new(
            points.iter().map(|p| (p.0, p.1)),
            8,
            4,
            BLUE.stroke_width(2),
        ))?
        .label("data")
        .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], BLUE.stroke_width(2)));
    chart.draw_series(points.iter().map(|p| {
        EmptyElement::at((p.0, p.1)) + Rectangle::new([(-4, -4), (4, 4)], BLUE.filled())
    }))?;

    chart
        .draw_series(LineSeries::new(
            points.iter().map(|p| (p.0, p.2)),
            RED.stroke_width(2),
        ))?
        .label("ideal")
        .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], RED.stroke_width(2)));

    chart
        .configure_series_labels()
        .position(SeriesLabelPosition::LowerRight)
        .background_style(WHITE.mix(0.8))
        .border_style(BLACK)
        .draw()?;

    root.present()?;
    Ok(())
}

fn padded_range(values: impl Iterator<Item = f64>) -> (f64, f64) {
    let (lo, hi) = values
        .filter(|v| v.is_finite())
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
            (lo.min(v), hi.max(v))
        });
    if !lo.is_finite() {
        return (0.0, 1.0);
    }
    let pad = if hi > lo { (hi - lo) * 0.05 } else { lo.abs().max(1.0) * 0.05 };
    (lo - pad, hi + pad)
}

fn log_range(values: impl Iterator<Item = f64>) -> (f64, f64) {
    let (lo, hi) = values
        .filter(|v| v.is_finite() && *v > 0.0)
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
            (lo.min(v), hi.max(v))
        });
    if !lo.is_finite() {
        return (1.0, 10.0);
    }
    (lo / 1.5, hi * 1.5)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_rgb_range() {
        assert_eq!(to_rgb(-1.0, 0.0, 1.0), None);
        assert_eq!(to_rgb(2.0, 0.0, 1.0), None);
        assert_eq!(to_rgb(f64::NAN, 0.0, 1.0), None);

        let [r, _, b] = to_rgb(0.0, 0.0, 1.0).unwrap();
        assert!(b > r);
        let [r, _, b] = to_rgb(1.0, 0.0, 1.0).unwrap();
        assert!(r > b);
        let [_, g, _] = to_rgb(0.5, 0.0, 1.0).unwrap();
        assert_eq!(g, 255);
    }

    #[test]
    fn test_coolwarm_ends() {
        assert_eq!(coolwarm(0.0), RGBColor(59, 76, 192));
        assert_eq!(coolwarm(1.0), RGBColor(180, 4, 38));
        assert_eq!(coolwarm(0.5), RGBColor(221, 221, 221));
    }

    #[test]
    fn test_nice_length() {
        assert_eq!(nice_length(1200.0), 1000.0);
        assert_eq!(nice_length(270.0), 200.0);
        assert_eq!(nice_length(64.0), 50.0);
    }
}
