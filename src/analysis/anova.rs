//! Type-II ANOVA with eta-squared effect sizes
//!
//! For every term T the sum of squares is the drop in residual SS when T is
//! added to the model made of all terms that do not contain T:
//!
//! ```text
//! SS(T) = RSS(M \ {T and terms containing T}) - RSS(M \ {terms containing T})
//! ```

use super::TabularResult;
use crate::dataset::{ColumnData, Dataset};
use crate::model::{Design, FittedModel, Formula, LeastSquares, Term};
use crate::{Error, Result};
use serde::Serialize;
use statrs::distribution::{ContinuousCDF, FisherSnedecor};
use std::fmt;

/// Label of the residual row
pub const RESIDUAL_ROW: &str = "Residual";

/// One row of the ANOVA table
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnovaRow {
    /// Term label (`C(Dose)`, `C(Dose):C(NP)`, `Residual`)
    pub term: String,
    /// Sum of squares
    pub sum_sq: f64,
    /// Degrees of freedom
    pub df: f64,
    /// F statistic (absent for the residual row or zero-df terms)
    pub f_value: Option<f64>,
    /// p-value of the F test
    pub p_value: Option<f64>,
    /// `sum_sq` over (Σ `sum_sq` of every row, Residual included, + RSS)
    pub eta_sq: f64,
}

/// Type-II ANOVA table
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnovaTable {
    /// Term rows followed by the residual row
    pub rows: Vec<AnovaRow>,
}

impl AnovaTable {
    /// Row for a term label
    #[must_use]
    pub fn row(&self, term: &str) -> Option<&AnovaRow> {
        self.rows.iter().find(|r| r.term == term)
    }

    /// Whether the table has no rows
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

impl TabularResult for AnovaTable {
    fn to_dataset(&self) -> Result<Dataset> {
        Dataset::from_columns(vec![
            (
                "term",
                ColumnData::Text(self.rows.iter().map(|r| Some(r.term.clone())).collect()),
            ),
            (
                "sum_sq",
                ColumnData::Numeric(self.rows.iter().map(|r| Some(r.sum_sq)).collect()),
            ),
            (
                "df",
                ColumnData::Numeric(self.rows.iter().map(|r| Some(r.df)).collect()),
            ),
            (
                "F",
                ColumnData::Numeric(self.rows.iter().map(|r| r.f_value).collect()),
            ),
            (
                "PR(>F)",
                ColumnData::Numeric(self.rows.iter().map(|r| r.p_value).collect()),
            ),
            (
                "eta_sq",
                ColumnData::Numeric(self.rows.iter().map(|r| Some(r.eta_sq)).collect()),
            ),
        ])
    }
}

impl fmt::Display for AnovaTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let width = self
            .rows
            .iter()
            .map(|r| r.term.len())
            .max()
            .unwrap_or(0)
            .max(8);
        writeln!(
            f,
            "{:<width$} {:>14} {:>6} {:>12} {:>12} {:>8}",
            "", "sum_sq", "df", "F", "PR(>F)", "eta_sq"
        )?;
        for row in &self.rows {
            let fv = row.f_value.map_or_else(|| "NaN".to_string(), |v| format!("{v:.4}"));
            let pv = row.p_value.map_or_else(|| "NaN".to_string(), |v| format!("{v:.4e}"));
            writeln!(
                f,
                "{:<width$} {:>14.6} {:>6} {:>12} {:>12} {:>8.4}",
                row.term, row.sum_sq, row.df, fv, pv, row.eta_sq
            )?;
        }
        Ok(())
    }
}

/// Fit `response ~ C(f1) + ... + C(fk) + C(f1):...:C(fk)` and decompose it
///
/// # Errors
/// Returns error if:
/// - `factors` is empty
/// - A factor has fewer than two levels among complete rows
/// - The full model leaves no residual degrees of freedom
pub fn perform_anova(
    dataset: &Dataset,
    response: &str,
    factors: &[String],
) -> Result<(FittedModel, AnovaTable)> {
    if factors.is_empty() {
        return Err(Error::InvalidInput(
            "ANOVA needs at least one factor".to_string(),
        ));
    }

    let formula = Formula::factorial(response, factors);
    let design = Design::build(dataset, &formula)?;
    for factor in factors {
        let levels = design.levels_of(factor).map_or(0, <[String]>::len);
        if levels < 2 {
            return Err(Error::FitFailed(format!(
                "Factor '{factor}' has {levels} distinct group(s) in {formula}; \
                 at least 2 are required"
            )));
        }
    }

    let model = FittedModel::fit(&design)?;
    let table = type_ii_table(&design, &model)?;
    Ok((model, table))
}

#[allow(clippy::cast_precision_loss)]
fn type_ii_table(design: &Design, model: &FittedModel) -> Result<AnovaTable> {
    let terms = design.formula.terms();
    let mse = model.rss / model.df_resid as f64;
    let f_dist_for = |df: usize| FisherSnedecor::new(df as f64, model.df_resid as f64).ok();

    let mut rows = Vec::new();
    for (index, term) in terms.iter().enumerate() {
        if matches!(term, Term::Intercept) {
            continue;
        }

        let base: Vec<usize> = terms
            .iter()
            .enumerate()
            .filter(|(i, other)| *i != index && !other.contains(term))
            .map(|(i, _)| i)
            .collect();
        let mut with_term = base.clone();
        with_term.push(index);
        with_term.sort_unstable();

        let reduced = LeastSquares::fit(design, &design.columns_for_terms(&base))?;
        let augmented = LeastSquares::fit(design, &design.columns_for_terms(&with_term))?;

        let sum_sq = (reduced.rss - augmented.rss).max(0.0);
        let df = augmented.rank().saturating_sub(reduced.rank());
        let (f_value, p_value) = if df == 0 || mse <= 0.0 {
            (None, None)
        } else {
            let f = (sum_sq / df as f64) / mse;
            (Some(f), f_dist_for(df).map(|dist| dist.sf(f)))
        };

        rows.push(AnovaRow {
            term: term.label(),
            sum_sq,
            df: df as f64,
            f_value,
            p_value,
            eta_sq: 0.0,
        });
    }

    rows.push(AnovaRow {
        term: RESIDUAL_ROW.to_string(),
        sum_sq: model.rss,
        df: model.df_resid as f64,
        f_value: None,
        p_value: None,
        eta_sq: 0.0,
    });

    // Residual SS appears in the row sum and is added once more
    let total: f64 = rows.iter().map(|r| r.sum_sq).sum::<f64>() + model.rss;
    for row in &mut rows {
        row.eta_sq = if total > 0.0 { row.sum_sq / total } else { 0.0 };
    }

    Ok(AnovaTable { rows })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_way() -> Dataset {
        // 2 x 2 balanced, 3 replicates, additive effects plus noise
        let mut dose = Vec::new();
        let mut np = Vec::new();
        let mut y = Vec::new();
        let noise = [0.3, -0.2, -0.1];
        for (d, d_effect) in [("0", 0.0), ("2", 4.0)] {
            for (n, n_effect) in [("AuNP", 1.0), ("None", 0.0)] {
                for e in noise {
                    dose.push(Some(d.to_string()));
                    np.push(Some(n.to_string()));
                    y.push(Some(10.0 + d_effect + n_effect + e));
                }
            }
        }
        Dataset::from_columns(vec![
            ("Dose", ColumnData::Text(dose)),
            ("NP", ColumnData::Text(np)),
            ("y", ColumnData::Numeric(y)),
        ])
        .unwrap()
    }

    fn factors(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| (*s).to_string()).collect()
    }

    #[test]
    fn test_one_way_partition() {
        let (model, table) = perform_anova(&two_way(), "y", &factors(&["Dose"])).unwrap();
        assert_eq!(table.rows.len(), 2);
        let dose = table.row("C(Dose)").unwrap();
        let resid = table.row(RESIDUAL_ROW).unwrap();
        // One-way: term SS + residual SS = total SS
        assert!((dose.sum_sq + resid.sum_sq - model.tss).abs() < 1e-9);
        let denominator = dose.sum_sq + 2.0 * resid.sum_sq;
        assert!((dose.eta_sq - dose.sum_sq / denominator).abs() < 1e-12);
        assert!((resid.eta_sq - resid.sum_sq / denominator).abs() < 1e-12);
        assert!(dose.p_value.unwrap() < 0.001);
        assert!((dose.df - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_eta_squared_counts_residual_twice() {
        // Groups {1,2,3} and {4,5,6}: SS dose = 13.5, RSS = 4
        let dose = ["1", "1", "1", "2", "2", "2"].map(|s| Some(s.to_string()));
        let ds = Dataset::from_columns(vec![
            ("Dose", ColumnData::Text(dose.to_vec())),
            ("y", ColumnData::Numeric((1..=6).map(|v| Some(f64::from(v))).collect())),
        ])
        .unwrap();
        let (_, table) = perform_anova(&ds, "y", &factors(&["Dose"])).unwrap();
        let dose = table.row("C(Dose)").unwrap();
        assert!((dose.sum_sq - 13.5).abs() < 1e-9);
        assert!((dose.eta_sq - 13.5 / 21.5).abs() < 1e-9);
        assert!((dose.eta_sq - 0.6279).abs() < 1e-4);
        assert!((table.row(RESIDUAL_ROW).unwrap().eta_sq - 4.0 / 21.5).abs() < 1e-9);
    }

    #[test]
    fn test_two_way_with_joint_interaction() {
        let (_, table) = perform_anova(&two_way(), "y", &factors(&["Dose", "NP"])).unwrap();
        let labels: Vec<&str> = table.rows.iter().map(|r| r.term.as_str()).collect();
        assert_eq!(labels, vec!["C(Dose)", "C(NP)", "C(Dose):C(NP)", "Residual"]);
        // Balanced design: dose SS = 12 * (2^2) = 48
        assert!((table.row("C(Dose)").unwrap().sum_sq - 48.0).abs() < 1e-9);
        assert!((table.row("C(NP)").unwrap().sum_sq - 3.0).abs() < 1e-9);
        assert!(table.row("C(Dose):C(NP)").unwrap().sum_sq < 1e-9);
        for row in &table.rows {
            assert!((0.0..=1.0).contains(&row.eta_sq));
        }
    }

    #[test]
    fn test_single_group_factor_fails() {
        let ds = two_way().filter_eq("Dose", "0").unwrap();
        let err = perform_anova(&ds, "y", &factors(&["Dose"])).unwrap_err();
        assert!(matches!(err, Error::FitFailed(_)));
    }

    #[test]
    fn test_empty_factor_list_rejected() {
        assert!(perform_anova(&two_way(), "y", &[]).is_err());
    }

    #[test]
    fn test_table_to_dataset() {
        let (_, table) = perform_anova(&two_way(), "y", &factors(&["Dose"])).unwrap();
        let ds = table.to_dataset().unwrap();
        assert_eq!(ds.num_rows(), 2);
        assert_eq!(ds.column_names(), vec!["term", "sum_sq", "df", "F", "PR(>F)", "eta_sq"]);
        assert_eq!(ds.f64_values("F").unwrap()[1], None);
    }
}
