//! Least-squares curve fitting primitives
//!
//! - [`polyfit`]: linear least squares on a Vandermonde matrix (SVD solve)
//! - [`fit_exponential`]: Levenberg-Marquardt for `y = a * exp(b * x)`

use crate::{Error, Result};
use nalgebra::{DMatrix, DVector, Matrix2, Vector2};
use tracing::warn;

/// Function-evaluation cap for nonlinear fits
pub const MAX_EVALUATIONS: usize = 10_000;

/// Singular value ratio above which a polynomial fit is reported as poorly conditioned
const CONDITION_WARNING: f64 = 1e12;

const SVD_EPSILON: f64 = 1e-14;

/// Polynomial coefficients, lowest power first
///
/// Returns `None` with fewer than `degree + 1` points.
#[must_use]
#[allow(clippy::cast_possible_wrap, clippy::cast_possible_truncation)]
pub fn polyfit(x: &[f64], y: &[f64], degree: usize) -> Option<Vec<f64>> {
    let n = x.len().min(y.len());
    if n < degree + 1 {
        return None;
    }

    let vandermonde = DMatrix::from_fn(n, degree + 1, |r, c| x[r].powi(c as i32));
    let rhs = DVector::from_column_slice(&y[..n]);
    let svd = vandermonde.svd(true, true);

    let max_sv = svd.singular_values.max();
    let min_sv = svd.singular_values.min();
    if min_sv <= 0.0 || max_sv / min_sv > CONDITION_WARNING {
        warn!(degree, "polynomial fit may be poorly conditioned");
    }

    svd.solve(&rhs, SVD_EPSILON)
        .ok()
        .map(|beta| beta.iter().copied().collect())
}

/// Evaluate a polynomial (lowest power first) with Horner's rule
#[must_use]
pub fn polyval(coefficients: &[f64], x: f64) -> f64 {
    coefficients
        .iter()
        .rev()
        .fold(0.0, |acc, c| acc.mul_add(x, *c))
}

/// Parameters of `y = a * exp(b * x)`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExponentialParams {
    /// Scale
    pub a: f64,
    /// Rate
    pub b: f64,
}

impl ExponentialParams {
    /// Model value at `x`
    #[must_use]
    pub fn eval(&self, x: f64) -> f64 {
        self.a * (self.b * x).exp()
    }
}

fn sum_squares(x: &[f64], y: &[f64], p: ExponentialParams) -> f64 {
    x.iter()
        .zip(y)
        .map(|(xi, yi)| (yi - p.eval(*xi)).powi(2))
        .sum()
}

/// Fit `y = a * exp(b * x)` by Levenberg-Marquardt starting from `initial`
///
/// # Errors
/// Returns error if:
/// - Fewer than two points are given
/// - The solver exceeds [`MAX_EVALUATIONS`] model evaluations
/// - The fit diverges to non-finite parameters
pub fn fit_exponential(
    x: &[f64],
    y: &[f64],
    initial: ExponentialParams,
) -> Result<ExponentialParams> {
    const TOLERANCE: f64 = 1e-12;

    if x.len() < 2 || x.len() != y.len() {
        return Err(Error::InsufficientData(
            "Exponential fit needs at least two points".to_string(),
        ));
    }

    let mut params = initial;
    let mut sse = sum_squares(x, y, params);
    let mut evaluations = x.len();
    let mut lambda = 1e-3;

    while evaluations < MAX_EVALUATIONS {
        let mut jtj = Matrix2::zeros();
        let mut jtr = Vector2::zeros();
        for (xi, yi) in x.iter().zip(y) {
            let e = (params.b * xi).exp();
            let grad = Vector2::new(e, params.a * xi * e);
            jtj += grad * grad.transpose();
            jtr += grad * (yi - params.a * e);
        }
        evaluations += x.len();

        let mut damped = jtj;
        for i in 0..2 {
            damped[(i, i)] += lambda * jtj[(i, i)].max(f64::EPSILON);
        }
        let Some(step) = damped.try_inverse().map(|inv| inv * jtr) else {
            lambda *= 10.0;
            continue;
        };

        let candidate = ExponentialParams {
            a: params.a + step[0],
            b: params.b + step[1],
        };
        let candidate_sse = sum_squares(x, y, candidate);
        evaluations += x.len();

        if candidate_sse.is_finite() && candidate_sse <= sse {
            let improvement = sse - candidate_sse;
            params = candidate;
            sse = candidate_sse;
            lambda = (lambda / 10.0).max(1e-12);
            let scale = params.a.abs() + params.b.abs() + TOLERANCE;
            let step_small = step.norm() <= TOLERANCE * scale;
            if improvement <= TOLERANCE * sse.max(TOLERANCE) || step_small {
                return if params.a.is_finite() && params.b.is_finite() {
                    Ok(params)
                } else {
                    Err(Error::FitFailed("Exponential fit diverged".to_string()))
                };
            }
        } else {
            lambda *= 10.0;
            if lambda > 1e16 {
                // No descent direction left: the current point is a minimum
                return Ok(params);
            }
        }
    }

    Err(Error::NoConvergence { evaluations })
}
