//! Regression explorer: competing functional forms for one x/y pair
//!
//! Every model is fitted independently. A model that cannot be fitted (no
//! usable rows, too few points, non-convergence) is left out of the result
//! and logged; it never fails the whole operation.

pub mod curve_fit;

use crate::dataset::Dataset;
use crate::stats::{linspace, min_max};
use crate::Result;
use curve_fit::{fit_exponential, polyfit, polyval, ExponentialParams};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use tracing::{debug, warn};

/// Number of evenly spaced samples per curve
pub const CURVE_SAMPLES: usize = 200;

/// Functional forms compared by the explorer (in legend order)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum CurveModel {
    /// `y = c0 + c1 x`
    Linear,
    /// Degree-2 polynomial
    Quadratic,
    /// Degree-3 polynomial
    Cubic,
    /// `y = a exp(b x)`, fitted on rows with `y > 0`
    Exponential,
    /// `y = a + b ln(x)`, fitted on rows with `x > 0`
    Logarithmic,
    /// `ln(y) = a + b x`, fitted on rows with `y > 0`
    LogLinear,
}

impl CurveModel {
    /// All models in legend order
    pub const ALL: [Self; 6] = [
        Self::Linear,
        Self::Quadratic,
        Self::Cubic,
        Self::Exponential,
        Self::Logarithmic,
        Self::LogLinear,
    ];

    /// Display name
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Linear => "Linear",
            Self::Quadratic => "Quadratic",
            Self::Cubic => "Cubic",
            Self::Exponential => "Exponential",
            Self::Logarithmic => "Logarithmic",
            Self::LogLinear => "Log-Linear",
        }
    }
}

impl fmt::Display for CurveModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Sampled curve; undefined samples are NaN
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Curve {
    /// Sample positions
    pub x: Vec<f64>,
    /// Model values
    pub y: Vec<f64>,
}

impl Curve {
    fn sample(grid: &[f64], f: impl Fn(f64) -> f64) -> Self {
        Self {
            x: grid.to_vec(),
            y: grid.iter().map(|&x| f(x)).collect(),
        }
    }

    /// Finite `(x, y)` points, for drawing
    pub fn finite_points(&self) -> impl Iterator<Item = (f64, f64)> + '_ {
        self.x
            .iter()
            .zip(&self.y)
            .filter(|(x, y)| x.is_finite() && y.is_finite())
            .map(|(x, y)| (*x, *y))
    }
}

/// Fitted curves keyed by model, iterated in [`CurveModel::ALL`] order
pub type CompetingFits = BTreeMap<CurveModel, Curve>;

/// Fit every [`CurveModel`] to `y_var` against `x_var`
///
/// Rows with a missing x or y are ignored. Curves span `[min x, max x]`.
///
/// # Errors
/// Returns error if either column is absent or not numeric
pub fn fit_competing_models(
    dataset: &Dataset,
    x_var: &str,
    y_var: &str,
) -> Result<CompetingFits> {
    let xs = dataset.f64_values(x_var)?;
    let ys = dataset.f64_values(y_var)?;
    let (x, y): (Vec<f64>, Vec<f64>) = xs
        .iter()
        .zip(&ys)
        .filter_map(|(x, y)| x.zip(*y))
        .filter(|(x, y)| x.is_finite() && y.is_finite())
        .unzip();

    let mut fits = CompetingFits::new();
    let Some((lo, hi)) = min_max(&x) else {
        warn!(x_var, y_var, "no complete rows; no curves fitted");
        return Ok(fits);
    };
    let grid = linspace(lo, hi, CURVE_SAMPLES);

    for (model, degree) in [
        (CurveModel::Linear, 1),
        (CurveModel::Quadratic, 2),
        (CurveModel::Cubic, 3),
    ] {
        match polyfit(&x, &y, degree) {
            Some(c) => {
                fits.insert(model, Curve::sample(&grid, |v| polyval(&c, v)));
            }
            None => warn!(%model, points = x.len(), "too few points for polynomial fit"),
        }
    }

    let (pos_x, log_y): (Vec<f64>, Vec<f64>) = x
        .iter()
        .zip(&y)
        .filter(|(_, y)| **y > 0.0)
        .map(|(x, y)| (*x, y.ln()))
        .unzip();
    if pos_x.is_empty() {
        debug!(y_var, "no positive responses; exponential, logarithmic and log-linear skipped");
        return Ok(fits);
    }

    let log_linear = polyfit(&pos_x, &log_y, 1);
    match log_linear.as_deref() {
        Some(&[a, b]) => {
            fits.insert(
                CurveModel::LogLinear,
                Curve::sample(&grid, |v| b.mul_add(v, a).exp()),
            );
        }
        _ => debug!("log-linear fit skipped: fewer than two positive responses"),
    }

    if let Some(&[a0, b0]) = log_linear.as_deref() {
        let pos_y: Vec<f64> = log_y.iter().map(|v| v.exp()).collect();
        match fit_exponential(&pos_x, &pos_y, ExponentialParams { a: a0.exp(), b: b0 }) {
            Ok(params) => {
                fits.insert(CurveModel::Exponential, Curve::sample(&grid, |v| params.eval(v)));
            }
            Err(e) => warn!(error = %e, "exponential fit skipped"),
        }
    }

    let (log_x, log_x_y): (Vec<f64>, Vec<f64>) = x
        .iter()
        .zip(&y)
        .filter(|(x, _)| **x > 0.0)
        .map(|(x, y)| (x.ln(), *y))
        .unzip();
    match polyfit(&log_x, &log_x_y, 1).as_deref() {
        Some(&[a, b]) => {
            fits.insert(
                CurveModel::Logarithmic,
                Curve::sample(&grid, |v| if v > 0.0 { b.mul_add(v.ln(), a) } else { f64::NAN }),
            );
        }
        _ => debug!("logarithmic fit skipped: fewer than two rows with x > 0"),
    }

    Ok(fits)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::ColumnData;

    fn dataset(x: &[f64], y: &[f64]) -> Dataset {
        Dataset::from_columns(vec![
            ("x", ColumnData::Numeric(x.iter().copied().map(Some).collect())),
            ("y", ColumnData::Numeric(y.iter().copied().map(Some).collect())),
        ])
        .unwrap()
    }

    #[test]
    fn test_all_models_on_positive_data() {
        let x = [0.5, 1.0, 2.0, 3.0, 4.0, 5.0];
        let y: Vec<f64> = x.iter().map(|v| 1.5 * (0.3_f64 * v).exp()).collect();
        let fits = fit_competing_models(&dataset(&x, &y), "x", "y").unwrap();
        let models: Vec<CurveModel> = fits.keys().copied().collect();
        assert_eq!(models, CurveModel::ALL.to_vec());
        for curve in fits.values() {
            assert_eq!(curve.x.len(), CURVE_SAMPLES);
            assert!((curve.x[0] - 0.5).abs() < 1e-12);
            assert!((curve.x[CURVE_SAMPLES - 1] - 5.0).abs() < 1e-12);
        }
        let exp = &fits[&CurveModel::Exponential];
        assert!((exp.y[CURVE_SAMPLES - 1] - 1.5 * 1.5f64.exp()).abs() < 1e-6);
    }

    #[test]
    fn test_logarithmic_undefined_samples_are_nan() {
        let x = [0.0, 1.0, 2.0, 3.0, 4.0];
        let y = [1.0, 2.0, 2.5, 2.8, 3.0];
        let fits = fit_competing_models(&dataset(&x, &y), "x", "y").unwrap();
        let log = &fits[&CurveModel::Logarithmic];
        assert!(log.y[0].is_nan());
        assert!(log.y[1].is_finite());
        assert_eq!(log.finite_points().count(), CURVE_SAMPLES - 1);
    }

    #[test]
    fn test_missing_rows_ignored() {
        let ds = Dataset::from_columns(vec![
            (
                "x",
                ColumnData::Numeric(vec![Some(1.0), None, Some(2.0), Some(3.0), Some(4.0)]),
            ),
            (
                "y",
                ColumnData::Numeric(vec![Some(1.0), Some(5.0), None, Some(3.0), Some(4.0)]),
            ),
        ])
        .unwrap();
        let fits = fit_competing_models(&ds, "x", "y").unwrap();
        // 3 complete points: cubic needs 4
        assert!(fits.contains_key(&CurveModel::Quadratic));
        assert!(!fits.contains_key(&CurveModel::Cubic));
    }

    #[test]
    fn test_model_names() {
        assert_eq!(CurveModel::LogLinear.to_string(), "Log-Linear");
    }
}
