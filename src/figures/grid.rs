//! Descriptive 2x2 grid: violin, boxplot, histogram with density, dose scatter

use super::{
    build_chart, category_formatter, dose_groups, draw_mesh, fonts, padded_range, DrawResult,
};
use crate::dataset::{Dataset, DOSE_NUMERIC_COLUMN};
use crate::explorer::curve_fit::{polyfit, polyval};
use crate::stats::{linspace, min_max, quantile, GaussianKde};
use crate::{Error, Result};
use plotters::coord::Shift;
use plotters::prelude::*;
use std::path::Path;
use tracing::debug;

const SIZE: (u32, u32) = (1400, 1000);
const VIOLIN_HALF_WIDTH: f64 = 0.4;
const BOX_HALF_WIDTH: f64 = 0.3;
const KDE_POINTS: usize = 100;

/// Render `<response>_plot_grid.png`-style figure to `path`
///
/// Panels: violin and boxplot of the response per dose group, histogram
/// (Sturges bins) with a KDE overlay, and the response against
/// `Dose_numeric` with its least-squares line.
///
/// # Errors
/// Returns error if the dose or response column is unusable or drawing fails
pub fn render_plot_grid(dataset: &Dataset, response: &str, path: &Path) -> Result<()> {
    let groups = dose_groups(dataset, response)?;
    let values: Vec<f64> = dataset.f64_values(response)?.into_iter().flatten().collect();
    let scatter: Vec<(f64, f64)> = if dataset.is_numeric(DOSE_NUMERIC_COLUMN) {
        dataset
            .f64_values(DOSE_NUMERIC_COLUMN)?
            .into_iter()
            .zip(dataset.f64_values(response)?)
            .filter_map(|(x, y)| x.zip(y))
            .collect()
    } else {
        Vec::new()
    };

    draw_grid(path, response, &groups, &values, &scatter)
        .map_err(|e| Error::Plot(format!("{}: {e}", path.display())))?;
    debug!(path = %path.display(), groups = groups.len(), "plot grid written");
    Ok(())
}

fn draw_grid(
    path: &Path,
    response: &str,
    groups: &[(String, Vec<f64>)],
    values: &[f64],
    scatter: &[(f64, f64)],
) -> DrawResult {
    let text = fonts::text_available();
    let root = BitMapBackend::new(path, SIZE).into_drawing_area();
    root.fill(&WHITE)?;
    let panels = root.split_evenly((2, 2));

    let labels: Vec<String> = groups.iter().map(|(l, _)| l.clone()).collect();
    draw_violin(&panels[0], response, groups, &labels, text)?;
    draw_box(&panels[1], response, groups, &labels, text)?;
    draw_histogram(&panels[2], response, values, text)?;
    draw_scatter(&panels[3], response, scatter, text)?;

    root.present()?;
    Ok(())
}

fn category_range(count: usize) -> std::ops::Range<f64> {
    #[allow(clippy::cast_precision_loss)]
    let upper = count.max(1) as f64 - 0.5;
    -0.5..upper
}

#[allow(clippy::cast_precision_loss)]
fn draw_violin<DB: DrawingBackend>(
    area: &DrawingArea<DB, Shift>,
    response: &str,
    groups: &[(String, Vec<f64>)],
    labels: &[String],
    text: bool,
) -> DrawResult
where
    DB::ErrorType: 'static,
{
    let y_range = padded_range(groups.iter().flat_map(|(_, v)| v.iter().copied()));
    let mut chart = build_chart(
        area,
        &format!("Violin plot of {response} by dose"),
        category_range(groups.len()),
        y_range,
        text,
    )?;
    let formatter = category_formatter(labels);
    draw_mesh(&mut chart, "Dose", response, text, Some(&formatter), labels.len() + 1)?;

    for (i, (_, v)) in groups.iter().enumerate() {
        let center = i as f64;
        let color = Palette99::pick(i).to_rgba();
        match (GaussianKde::new(v), min_max(v)) {
            (Some(kde), Some((lo, hi))) => {
                let ys = linspace(lo, hi, KDE_POINTS);
                let densities: Vec<f64> = ys.iter().map(|y| kde.density(*y)).collect();
                let peak = densities.iter().copied().fold(0.0, f64::max).max(f64::EPSILON);
                let mut outline: Vec<(f64, f64)> = ys
                    .iter()
                    .zip(&densities)
                    .map(|(y, d)| (center - VIOLIN_HALF_WIDTH * d / peak, *y))
                    .collect();
                outline.extend(
                    ys.iter()
                        .zip(&densities)
                        .rev()
                        .map(|(y, d)| (center + VIOLIN_HALF_WIDTH * d / peak, *y)),
                );
                chart.draw_series(std::iter::once(Polygon::new(outline, color.mix(0.5).filled())))?;

                for (q, weight) in [(0.25, 1), (0.5, 2), (0.75, 1)] {
                    if let Some(level) = quantile(v, q) {
                        let half = VIOLIN_HALF_WIDTH * kde.density(level) / peak;
                        chart.draw_series(std::iter::once(PathElement::new(
                            vec![(center - half, level), (center + half, level)],
                            BLACK.stroke_width(weight),
                        )))?;
                    }
                }
            }
            (None, Some((lo, _))) => {
                chart.draw_series(std::iter::once(PathElement::new(
                    vec![(center - VIOLIN_HALF_WIDTH, lo), (center + VIOLIN_HALF_WIDTH, lo)],
                    color.stroke_width(2),
                )))?;
            }
            _ => {}
        }
    }
    Ok(())
}

#[allow(clippy::cast_precision_loss)]
fn draw_box<DB: DrawingBackend>(
    area: &DrawingArea<DB, Shift>,
    response: &str,
    groups: &[(String, Vec<f64>)],
    labels: &[String],
    text: bool,
) -> DrawResult
where
    DB::ErrorType: 'static,
{
    let y_range = padded_range(groups.iter().flat_map(|(_, v)| v.iter().copied()));
    let mut chart = build_chart(
        area,
        &format!("Boxplot of {response} by dose"),
        category_range(groups.len()),
        y_range,
        text,
    )?;
    let formatter = category_formatter(labels);
    draw_mesh(&mut chart, "Dose", response, text, Some(&formatter), labels.len() + 1)?;

    for (i, (_, v)) in groups.iter().enumerate() {
        let (Some(q1), Some(median), Some(q3)) =
            (quantile(v, 0.25), quantile(v, 0.5), quantile(v, 0.75))
        else {
            continue;
        };
        let center = i as f64;
        let color = Palette99::pick(i).to_rgba();
        let iqr = q3 - q1;
        let fence_lo = 1.5f64.mul_add(-iqr, q1);
        let fence_hi = 1.5f64.mul_add(iqr, q3);
        let inside: Vec<f64> = v
            .iter()
            .copied()
            .filter(|x| (fence_lo..=fence_hi).contains(x))
            .collect();
        let (whisker_lo, whisker_hi) = min_max(&inside).unwrap_or((q1, q3));

        chart.draw_series(std::iter::once(Rectangle::new(
            [(center - BOX_HALF_WIDTH, q1), (center + BOX_HALF_WIDTH, q3)],
            color.mix(0.5).filled(),
        )))?;
        chart.draw_series(std::iter::once(Rectangle::new(
            [(center - BOX_HALF_WIDTH, q1), (center + BOX_HALF_WIDTH, q3)],
            BLACK.stroke_width(1),
        )))?;
        chart.draw_series(std::iter::once(PathElement::new(
            vec![(center - BOX_HALF_WIDTH, median), (center + BOX_HALF_WIDTH, median)],
            BLACK.stroke_width(2),
        )))?;
        for (from, to) in [(q1, whisker_lo), (q3, whisker_hi)] {
            chart.draw_series(std::iter::once(PathElement::new(
                vec![(center, from), (center, to)],
                BLACK.stroke_width(1),
            )))?;
            chart.draw_series(std::iter::once(PathElement::new(
                vec![(center - BOX_HALF_WIDTH / 2.0, to), (center + BOX_HALF_WIDTH / 2.0, to)],
                BLACK.stroke_width(1),
            )))?;
        }
        chart.draw_series(
            v.iter()
                .filter(|x| !(fence_lo..=fence_hi).contains(*x))
                .map(|x| Circle::new((center, *x), 3, BLACK.stroke_width(1))),
        )?;
    }
    Ok(())
}

/// Sturges' rule: `ceil(log2 n) + 1`
#[must_use]
#[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub(crate) fn sturges_bins(n: usize) -> usize {
    if n <= 1 {
        return 1;
    }
    (n as f64).log2().ceil() as usize + 1
}

#[allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]
fn draw_histogram<DB: DrawingBackend>(
    area: &DrawingArea<DB, Shift>,
    response: &str,
    values: &[f64],
    text: bool,
) -> DrawResult
where
    DB::ErrorType: 'static,
{
    let title = format!("Histogram of {response}");
    let Some((lo, hi)) = min_max(values) else {
        let mut chart = build_chart(area, &title, 0.0..1.0, 0.0..1.0, text)?;
        draw_mesh(&mut chart, response, "Count", text, None, 6)?;
        return Ok(());
    };

    let bins = sturges_bins(values.len());
    let (lo, hi) = if hi > lo { (lo, hi) } else { (lo - 0.5, hi + 0.5) };
    let width = (hi - lo) / bins as f64;
    let mut counts = vec![0usize; bins];
    for v in values {
        let index = (((v - lo) / width) as usize).min(bins - 1);
        counts[index] += 1;
    }
    let max_count = counts.iter().copied().max().unwrap_or(0).max(1) as f64;

    let kde = GaussianKde::new(values);
    let scale = values.len() as f64 * width;
    let density_line: Vec<(f64, f64)> = kde.as_ref().map_or_else(Vec::new, |kde| {
        linspace(lo, hi, KDE_POINTS)
            .into_iter()
            .map(|x| (x, kde.density(x) * scale))
            .collect()
    });
    let y_max = density_line
        .iter()
        .map(|(_, y)| *y)
        .fold(max_count, f64::max)
        * 1.1;

    let mut chart = build_chart(area, &title, lo..hi, 0.0..y_max, text)?;
    draw_mesh(&mut chart, response, "Count", text, None, 6)?;

    let fill = Palette99::pick(0).to_rgba();
    chart.draw_series(counts.iter().enumerate().map(|(i, c)| {
        let x0 = (i as f64).mul_add(width, lo);
        Rectangle::new([(x0, 0.0), (x0 + width, *c as f64)], fill.mix(0.6).filled())
    }))?;
    if !density_line.is_empty() {
        chart.draw_series(LineSeries::new(density_line, BLACK.stroke_width(2)))?;
    }
    Ok(())
}

fn draw_scatter<DB: DrawingBackend>(
    area: &DrawingArea<DB, Shift>,
    response: &str,
    points: &[(f64, f64)],
    text: bool,
) -> DrawResult
where
    DB::ErrorType: 'static,
{
    let x_range = padded_range(points.iter().map(|(x, _)| *x));
    let y_range = padded_range(points.iter().map(|(_, y)| *y));
    let mut chart = build_chart(
        area,
        &format!("{response} vs dose (linear fit)"),
        x_range,
        y_range,
        text,
    )?;
    draw_mesh(&mut chart, "Dose (Gy)", response, text, None, 6)?;

    let color = Palette99::pick(1).to_rgba();
    chart.draw_series(
        points
            .iter()
            .map(|p| Circle::new(*p, 3, color.mix(0.7).filled())),
    )?;

    let (x, y): (Vec<f64>, Vec<f64>) = points.iter().copied().unzip();
    let distinct_x = min_max(&x).is_some_and(|(lo, hi)| hi > lo);
    if distinct_x {
        if let (Some(c), Some((lo, hi))) = (polyfit(&x, &y, 1), min_max(&x)) {
            chart.draw_series(LineSeries::new(
                [lo, hi].into_iter().map(|v| (v, polyval(&c, v))),
                RED.stroke_width(2),
            ))?;
        }
    }
    Ok(())
}
