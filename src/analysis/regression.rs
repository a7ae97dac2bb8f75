//! Moderated regression: numeric covariate, categorical factor and their interaction

use crate::dataset::Dataset;
use crate::model::{Design, FittedModel, Formula};
use crate::{Error, Result};
use tracing::debug;

/// Fit `response ~ numeric + C(categorical) + numeric:C(categorical)`
///
/// Returns the fitted model and its text summary.
///
/// # Errors
/// Returns error if:
/// - A column is absent, or `response`/`numeric` is not numeric
/// - `numeric` and `categorical` name the same column
/// - The fit has no residual degrees of freedom
pub fn run_regression(
    dataset: &Dataset,
    response: &str,
    numeric: &str,
    categorical: &str,
) -> Result<(FittedModel, String)> {
    if numeric == categorical {
        return Err(Error::InvalidInput(format!(
            "'{numeric}' cannot be both the covariate and the moderating factor"
        )));
    }

    let formula = Formula::moderated(response, numeric, categorical);
    let design = Design::build(dataset, &formula)?;
    let model = FittedModel::fit(&design)?;
    debug!(
        formula = %formula,
        r_squared = model.r_squared,
        aliased = model.aliased.len(),
        "regression fitted"
    );

    let summary = model.summary();
    Ok((model, summary))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::ColumnData;

    fn dataset() -> Dataset {
        // Slope 1 for group "a", slope 3 for group "b"
        let mut dose = Vec::new();
        let mut np = Vec::new();
        let mut y = Vec::new();
        let noise = [0.05, -0.05, 0.02, -0.02];
        for (group, slope) in [("a", 1.0), ("b", 3.0)] {
            for d in [0.0, 1.0, 2.0, 4.0] {
                for e in noise {
                    dose.push(Some(d));
                    np.push(Some(group.to_string()));
                    y.push(Some(slope * d + 2.0 + e));
                }
            }
        }
        Dataset::from_columns(vec![
            ("Dose_numeric", ColumnData::Numeric(dose)),
            ("NP", ColumnData::Text(np)),
            ("y", ColumnData::Numeric(y)),
        ])
        .unwrap()
    }

    #[test]
    fn test_interaction_slope_recovered() {
        let (model, summary) = run_regression(&dataset(), "y", "Dose_numeric", "NP").unwrap();
        let base = model.numeric_coefficient("Dose_numeric").unwrap();
        assert!((base.estimate - 1.0).abs() < 0.05);

        let interaction = model
            .coefficients
            .iter()
            .find(|c| c.label == "Dose_numeric:C(NP)[T.b]")
            .unwrap();
        assert!((interaction.estimate - 2.0).abs() < 0.05);
        assert!(interaction.p_value < 0.001);
        assert!(summary.contains("Dose_numeric:C(NP)[T.b]"));
    }

    #[test]
    fn test_same_column_rejected() {
        assert!(run_regression(&dataset(), "y", "NP", "NP").is_err());
    }
}
