//! Descriptive statistics and distribution helpers
//!
//! All functions work on `f64` slices of present values; callers strip
//! missing values first. Empty input yields `None` rather than NaN.

pub mod kde;
pub mod studentized_range;

pub use kde::GaussianKde;

/// Arithmetic mean
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Variance with `ddof` delta degrees of freedom (0 = population, 1 = sample)
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn variance(values: &[f64], ddof: usize) -> Option<f64> {
    if values.len() <= ddof {
        return None;
    }
    let m = mean(values)?;
    let ss: f64 = values.iter().map(|v| (v - m).powi(2)).sum();
    Some(ss / (values.len() - ddof) as f64)
}

/// Standard deviation with `ddof` delta degrees of freedom
#[must_use]
pub fn std_dev(values: &[f64], ddof: usize) -> Option<f64> {
    variance(values, ddof).map(f64::sqrt)
}

/// Minimum and maximum
#[must_use]
pub fn min_max(values: &[f64]) -> Option<(f64, f64)> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
        (lo.min(v), hi.max(v))
    }))
}

/// Quantile with linear interpolation between order statistics (R-7)
#[must_use]
#[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn quantile(values: &[f64], q: f64) -> Option<f64> {
    if values.is_empty() || !(0.0..=1.0).contains(&q) {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);

    let position = q * (sorted.len() - 1) as f64;
    let lower = position.floor() as usize;
    let upper = position.ceil() as usize;
    let weight = position - lower as f64;
    Some(sorted[lower] + (sorted[upper] - sorted[lower]) * weight)
}

/// Evenly spaced samples over `[start, end]` (inclusive)
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn linspace(start: f64, end: f64, count: usize) -> Vec<f64> {
    match count {
        0 => Vec::new(),
        1 => vec![start],
        _ => {
            let step = (end - start) / (count - 1) as f64;
            (0..count)
                .map(|i| if i == count - 1 { end } else { start + step * i as f64 })
                .collect()
        }
    }
}

/// Standard normal cumulative distribution function
#[must_use]
pub fn normal_cdf(x: f64) -> f64 {
    0.5 * statrs::function::erf::erfc(-x / std::f64::consts::SQRT_2)
}
