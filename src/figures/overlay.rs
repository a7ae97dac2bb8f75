//! Competing regression curves over the raw scatter

use super::{build_chart, draw_mesh, fonts, padded_range, DrawResult};
use crate::dataset::Dataset;
use crate::explorer::CompetingFits;
use crate::{Error, Result};
use plotters::prelude::*;
use std::path::Path;
use tracing::debug;

const SIZE: (u32, u32) = (1100, 750);

/// Render the raw `(x_var, y_var)` scatter plus every fitted curve
///
/// # Errors
/// Returns error if either column is absent or not numeric, or drawing fails
pub fn render_regression_models(
    dataset: &Dataset,
    x_var: &str,
    y_var: &str,
    fits: &CompetingFits,
    path: &Path,
) -> Result<()> {
    let points: Vec<(f64, f64)> = dataset
        .f64_values(x_var)?
        .into_iter()
        .zip(dataset.f64_values(y_var)?)
        .filter_map(|(x, y)| x.zip(y))
        .collect();

    draw(path, x_var, y_var, &points, fits)
        .map_err(|e| Error::Plot(format!("{}: {e}", path.display())))?;
    debug!(path = %path.display(), curves = fits.len(), "regression models figure written");
    Ok(())
}

fn draw(
    path: &Path,
    x_var: &str,
    y_var: &str,
    points: &[(f64, f64)],
    fits: &CompetingFits,
) -> DrawResult {
    let text = fonts::text_available();
    let root = BitMapBackend::new(path, SIZE).into_drawing_area();
    root.fill(&WHITE)?;

    let x_range = padded_range(points.iter().map(|(x, _)| *x));
    // Curves can run far outside the data (cubic tails, exponentials); keep the data in view
    let y_range = padded_range(points.iter().map(|(_, y)| *y).chain(
        fits.values()
            .flat_map(|c| c.finite_points().map(|(_, y)| y))
            .filter(|y| y.abs() < 1e12),
    ));

    let mut chart = build_chart(
        &root,
        &format!("Regression models: {y_var} vs {x_var}"),
        x_range,
        y_range,
        text,
    )?;
    draw_mesh(&mut chart, x_var, y_var, text, None, 8)?;

    let data_series = chart.draw_series(
        points
            .iter()
            .map(|p| Circle::new(*p, 3, BLACK.mix(0.6).filled())),
    )?;
    if text {
        data_series
            .label("Data")
            .legend(|(x, y)| Circle::new((x + 10, y), 3, BLACK.mix(0.6).filled()));
    }

    for (i, (model, curve)) in fits.iter().enumerate() {
        let color = Palette99::pick(i).to_rgba();
        let series = chart.draw_series(LineSeries::new(
            curve.finite_points().filter(|(_, y)| y.abs() < 1e12),
            color.stroke_width(2),
        ))?;
        if text {
            series.label(model.name()).legend(move |(x, y)| {
                PathElement::new(vec![(x, y), (x + 20, y)], color.stroke_width(2))
            });
        }
    }

    if text {
        chart
            .configure_series_labels()
            .position(SeriesLabelPosition::UpperLeft)
            .background_style(WHITE.mix(0.8))
            .border_style(BLACK)
            .label_font((fonts::FONT_FAMILY, 14))
            .draw()?;
    }

    root.present()?;
    Ok(())
}
