//! Response-column preprocessing
//!
//! Three independent transforms, each returning a NEW dataset:
//! - [`remove_outliers`]: z-score rejection on the response column
//! - [`apply_normalization`]: log1p / z-score / min-max rewrite of the response
//! - [`create_derived_vars`]: per-nucleus / per-ROS ratio metrics
//!
//! Missing response values never take part in a statistic and are never
//! turned into numbers.

use crate::dataset::Dataset;
use crate::stats::{mean, min_max, std_dev};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::debug;

/// Default |z| cut-off for outlier rejection
pub const DEFAULT_Z_THRESHOLD: f64 = 3.0;

/// Rows kept after outlier rejection
#[derive(Debug, Clone)]
pub struct OutlierFiltered {
    /// Dataset without the rejected rows
    pub dataset: Dataset,
    /// Number of rows dropped
    pub removed: usize,
}

/// Drop rows whose response z-score satisfies `|z| >= threshold`
///
/// The z-score uses the population standard deviation of the non-missing
/// values. Rows with a missing response are kept. A constant column has no
/// outliers.
///
/// # Errors
/// Returns error if the response column is absent or not numeric
pub fn remove_outliers(
    dataset: &Dataset,
    response: &str,
    threshold: f64,
) -> Result<OutlierFiltered> {
    let values = dataset.f64_values(response)?;
    let present: Vec<f64> = values.iter().flatten().copied().collect();

    let (Some(m), Some(sd)) = (mean(&present), std_dev(&present, 0)) else {
        return Ok(OutlierFiltered {
            dataset: dataset.clone(),
            removed: 0,
        });
    };
    if sd <= 0.0 {
        return Ok(OutlierFiltered {
            dataset: dataset.clone(),
            removed: 0,
        });
    }

    let mask: Vec<bool> = values
        .iter()
        .map(|v| v.map_or(true, |x| ((x - m) / sd).abs() < threshold))
        .collect();
    let removed = mask.iter().filter(|keep| !**keep).count();
    debug!(response, threshold, removed, "outlier rejection");

    Ok(OutlierFiltered {
        dataset: dataset.filter(&mask)?,
        removed,
    })
}

/// Response normalization method
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Normalization {
    /// Leave values unchanged
    #[default]
    None,
    /// `ln(1 + x)`
    Log1p,
    /// `(x - mean) / sd` with the sample standard deviation
    Zscore,
    /// `(x - min) / (max - min)`
    Minmax,
}

impl fmt::Display for Normalization {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::None => "none",
            Self::Log1p => "log1p",
            Self::Zscore => "zscore",
            Self::Minmax => "minmax",
        };
        f.write_str(name)
    }
}

impl FromStr for Normalization {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "none" => Ok(Self::None),
            "log1p" => Ok(Self::Log1p),
            "zscore" => Ok(Self::Zscore),
            "minmax" => Ok(Self::Minmax),
            other => Err(Error::Config(format!(
                "Unknown normalization '{other}' (expected none, log1p, zscore or minmax)"
            ))),
        }
    }
}

/// Rewrite the response column with the chosen normalization
///
/// A zero spread (constant column) maps every value to 0. `log1p` of a
/// value at or below -1 is undefined and becomes missing.
///
/// # Errors
/// Returns error if the response column is absent or not numeric
pub fn apply_normalization(
    dataset: &Dataset,
    response: &str,
    method: Normalization,
) -> Result<Dataset> {
    let values = dataset.f64_values(response)?;
    let present: Vec<f64> = values.iter().flatten().copied().collect();

    let transform: Box<dyn Fn(f64) -> Option<f64>> = match method {
        Normalization::None => return Ok(dataset.clone()),
        Normalization::Log1p => Box::new(|x: f64| Some(x.ln_1p()).filter(|v| v.is_finite())),
        Normalization::Zscore => {
            let m = mean(&present).unwrap_or(0.0);
            match std_dev(&present, 1) {
                Some(sd) if sd > 0.0 => Box::new(move |x: f64| Some((x - m) / sd)),
                _ => Box::new(|_: f64| Some(0.0)),
            }
        }
        Normalization::Minmax => match min_max(&present) {
            Some((lo, hi)) if hi > lo => Box::new(move |x: f64| Some((x - lo) / (hi - lo))),
            _ => Box::new(|_: f64| Some(0.0)),
        },
    };

    let rewritten = values.iter().map(|v| v.and_then(&transform)).collect();
    dataset.with_f64_column(response, rewritten)
}

/// Ratio metrics computed when both source columns are present
///
/// `(name, numerator, denominator)`
pub const DERIVED_VARIABLES: [(&str, &str, &str); 4] = [
    ("ROS_per_Nucleus", "NumROS", "NumNuclei"),
    ("Fluo_per_Nucleus", "TotalROSFluorescence", "NumNuclei"),
    ("Area_per_ROS", "TotalROSArea", "NumROS"),
    ("LDAreaRed_per_Nucleus", "TotalLDAreaRed", "NumNuclei"),
];

/// Add every derivable ratio metric
///
/// Metrics whose source columns are missing or not numeric are skipped.
/// A zero or missing denominator yields a missing value.
///
/// # Errors
/// Returns error only if rebuilding the batch fails
pub fn create_derived_vars(dataset: &Dataset) -> Result<Dataset> {
    let mut result = dataset.clone();
    for (name, numerator, denominator) in DERIVED_VARIABLES {
        if !(result.is_numeric(numerator) && result.is_numeric(denominator)) {
            debug!(name, "derived variable skipped: source columns unavailable");
            continue;
        }
        let num = result.f64_values(numerator)?;
        let den = result.f64_values(denominator)?;
        let ratio = num
            .iter()
            .zip(&den)
            .map(|(n, d)| match (n, d) {
                (Some(n), Some(d)) if *d != 0.0 => Some(n / d),
                _ => None,
            })
            .collect();
        result = result.with_f64_column(name, ratio)?;
    }
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::ColumnData;

    fn dataset(values: Vec<Option<f64>>) -> Dataset {
        Dataset::from_columns(vec![("y", ColumnData::Numeric(values))]).unwrap()
    }

    #[test]
    fn test_remove_outliers_drops_extreme_value() {
        let mut values: Vec<Option<f64>> = (0..20).map(|i| Some(10.0 + f64::from(i % 3))).collect();
        values.push(Some(1000.0));
        values.push(None);
        let result = remove_outliers(&dataset(values), "y", DEFAULT_Z_THRESHOLD).unwrap();
        assert_eq!(result.removed, 1);
        assert_eq!(result.dataset.num_rows(), 21);
    }

    #[test]
    fn test_remove_outliers_constant_column() {
        let result = remove_outliers(&dataset(vec![Some(2.0); 5]), "y", 3.0).unwrap();
        assert_eq!(result.removed, 0);
        assert_eq!(result.dataset.num_rows(), 5);
    }

    #[test]
    fn test_minmax_bounds() {
        let ds = apply_normalization(
            &dataset(vec![Some(2.0), None, Some(6.0), Some(4.0)]),
            "y",
            Normalization::Minmax,
        )
        .unwrap();
        assert_eq!(
            ds.f64_values("y").unwrap(),
            vec![Some(0.0), None, Some(1.0), Some(0.5)]
        );
    }

    #[test]
    fn test_zscore_uses_sample_sd() {
        let ds = apply_normalization(
            &dataset(vec![Some(1.0), Some(2.0), Some(3.0)]),
            "y",
            Normalization::Zscore,
        )
        .unwrap();
        let v: Vec<f64> = ds.f64_values("y").unwrap().into_iter().flatten().collect();
        assert!((v[0] + 1.0).abs() < 1e-12);
        assert!(v[1].abs() < 1e-12);
        assert!((v[2] - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_log1p_undefined_becomes_missing() {
        let ds = apply_normalization(
            &dataset(vec![Some(0.0), Some(-1.0), Some(std::f64::consts::E - 1.0)]),
            "y",
            Normalization::Log1p,
        )
        .unwrap();
        let v = ds.f64_values("y").unwrap();
        assert_eq!(v[0], Some(0.0));
        assert_eq!(v[1], None);
        assert!((v[2].unwrap() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_normalization_parse() {
        assert_eq!("None".parse::<Normalization>().unwrap(), Normalization::None);
        assert_eq!("zscore".parse::<Normalization>().unwrap(), Normalization::Zscore);
        assert!("rank".parse::<Normalization>().is_err());
    }

    #[test]
    fn test_derived_vars_only_when_sources_present() {
        let ds = Dataset::from_columns(vec![
            ("NumROS", ColumnData::Numeric(vec![Some(10.0), Some(4.0)])),
            ("NumNuclei", ColumnData::Numeric(vec![Some(5.0), Some(0.0)])),
        ])
        .unwrap();
        let derived = create_derived_vars(&ds).unwrap();
        assert_eq!(
            derived.f64_values("ROS_per_Nucleus").unwrap(),
            vec![Some(2.0), None]
        );
        assert!(!derived.has_column("Fluo_per_Nucleus"));
        assert!(!derived.has_column("Area_per_ROS"));
        assert!(!derived.has_column("LDAreaRed_per_Nucleus"));
    }
}
