//! PNG figures rendered with `plotters`
//!
//! - [`render_plot_grid`]: 2x2 descriptive grid of the response by dose
//! - [`render_regression_models`]: raw scatter plus every competing curve
//!
//! Text (captions, tick labels, legends) is only drawn when a font could be
//! registered (see [`fonts::text_available`]).

pub mod fonts;
mod grid;
mod overlay;

pub use grid::render_plot_grid;
pub use overlay::render_regression_models;

use crate::dataset::{parse_dose, Dataset, DOSE_COLUMN};
use crate::Result;
use plotters::coord::cartesian::Cartesian2d;
use plotters::coord::types::RangedCoordf64;
use plotters::coord::Shift;
use plotters::prelude::*;
use rustc_hash::FxHashMap;
use std::ops::Range;

/// Plot grid file name for a response
#[must_use]
pub fn plot_grid_file_name(response: &str) -> String {
    format!("{response}_plot_grid.png")
}

/// Regression models file name for a response
#[must_use]
pub fn regression_models_file_name(response: &str) -> String {
    format!("{response}_regression_models.png")
}

type DrawResult<T = ()> = std::result::Result<T, Box<dyn std::error::Error>>;
type Chart<'a, DB> = ChartContext<'a, DB, Cartesian2d<RangedCoordf64, RangedCoordf64>>;

/// Response values grouped by dose label
///
/// Groups are ordered numerically when every label parses as a dose, else
/// lexicographically. Rows with a missing dose or response are ignored.
///
/// # Errors
/// Returns error if the dose or response column is absent, or the response is not numeric
pub fn dose_groups(dataset: &Dataset, response: &str) -> Result<Vec<(String, Vec<f64>)>> {
    let labels = dataset.text_values(DOSE_COLUMN)?;
    let values = dataset.f64_values(response)?;

    let mut groups: FxHashMap<String, Vec<f64>> = FxHashMap::default();
    for (label, value) in labels.iter().zip(&values) {
        if let (Some(l), Some(v)) = (label, value) {
            groups.entry(l.clone()).or_default().push(*v);
        }
    }

    let mut ordered: Vec<(String, Vec<f64>)> = groups.into_iter().collect();
    if ordered.iter().all(|(l, _)| parse_dose(l).is_some()) {
        ordered.sort_by(|(a, _), (b, _)| {
            let a = parse_dose(a).unwrap_or(f64::NAN);
            let b = parse_dose(b).unwrap_or(f64::NAN);
            a.total_cmp(&b)
        });
    } else {
        ordered.sort_by(|(a, _), (b, _)| a.cmp(b));
    }
    Ok(ordered)
}

/// Axis range covering `values` with a small margin
fn padded_range(values: impl IntoIterator<Item = f64>) -> Range<f64> {
    let (lo, hi) = values
        .into_iter()
        .filter(|v| v.is_finite())
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| (lo.min(v), hi.max(v)));
    if !lo.is_finite() {
        return 0.0..1.0;
    }
    if (hi - lo).abs() < f64::EPSILON {
        return (lo - 0.5)..(hi + 0.5);
    }
    let pad = (hi - lo) * 0.05;
    (lo - pad)..(hi + pad)
}

fn build_chart<'a, DB: DrawingBackend>(
    area: &'a DrawingArea<DB, Shift>,
    title: &str,
    x: Range<f64>,
    y: Range<f64>,
    text: bool,
) -> std::result::Result<Chart<'a, DB>, DrawingAreaErrorKind<DB::ErrorType>> {
    let mut builder = ChartBuilder::on(area);
    builder.margin(12);
    if text {
        builder
            .caption(title, (fonts::FONT_FAMILY, 20))
            .x_label_area_size(36)
            .y_label_area_size(56);
    }
    builder.build_cartesian_2d(x, y)
}

/// Axis labels for a chart whose x positions are category indices
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn category_formatter(labels: &[String]) -> impl Fn(&f64) -> String + '_ {
    move |v: &f64| {
        let rounded = v.round();
        if (v - rounded).abs() > 1e-6 || rounded < 0.0 {
            return String::new();
        }
        labels.get(rounded as usize).cloned().unwrap_or_default()
    }
}

fn draw_mesh<DB: DrawingBackend>(
    chart: &mut Chart<'_, DB>,
    x_desc: &str,
    y_desc: &str,
    text: bool,
    x_formatter: Option<&dyn Fn(&f64) -> String>,
    x_labels: usize,
) -> std::result::Result<(), DrawingAreaErrorKind<DB::ErrorType>> {
    let mut mesh = chart.configure_mesh();
    mesh.light_line_style(BLACK.mix(0.05));
    if text {
        mesh.x_desc(x_desc).y_desc(y_desc).x_labels(x_labels).y_labels(6);
        if let Some(f) = x_formatter {
            mesh.x_label_formatter(f);
        }
    } else {
        mesh.x_labels(0).y_labels(0);
    }
    mesh.draw()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::ColumnData;

    #[test]
    fn test_dose_groups_numeric_order() {
        let ds = Dataset::from_columns(vec![
            (
                "Dose",
                ColumnData::Text(vec![
                    Some("10".into()),
                    Some("2".into()),
                    Some("0.5".into()),
                    None,
                ]),
            ),
            (
                "y",
                ColumnData::Numeric(vec![Some(1.0), Some(2.0), Some(3.0), Some(4.0)]),
            ),
        ])
        .unwrap();
        let groups = dose_groups(&ds, "y").unwrap();
        let labels: Vec<&str> = groups.iter().map(|(l, _)| l.as_str()).collect();
        assert_eq!(labels, vec!["0.5", "2", "10"]);
    }

    #[test]
    fn test_dose_groups_text_order() {
        let ds = Dataset::from_columns(vec![
            ("Dose", ColumnData::Text(vec![Some("b".into()), Some("a".into())])),
            ("y", ColumnData::Numeric(vec![Some(1.0), Some(2.0)])),
        ])
        .unwrap();
        let groups = dose_groups(&ds, "y").unwrap();
        assert_eq!(groups[0].0, "a");
    }

    #[test]
    fn test_padded_range_degenerate() {
        assert_eq!(padded_range([2.0, 2.0]), 1.5..2.5);
        assert_eq!(padded_range(std::iter::empty()), 0.0..1.0);
    }

    #[test]
    fn test_category_formatter() {
        let labels = vec!["0".to_string(), "2".to_string()];
        let f = category_formatter(&labels);
        assert_eq!(f(&1.0), "2");
        assert_eq!(f(&0.5), "");
        assert_eq!(f(&5.0), "");
    }
}
