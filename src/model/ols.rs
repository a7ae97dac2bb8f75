//! Ordinary least squares
//!
//! Collinear columns are detected by sequential (modified) Gram-Schmidt and
//! dropped before solving, so rank-deficient designs (empty factor cells,
//! numeric covariates aliased with a factor) still fit. The dropped columns
//! are reported as aliased and carry no estimate.

use super::design::{Design, DesignColumn};
use super::{CodedOperand, Formula, Operand, TermKind};
use crate::{Error, Result};
use nalgebra::{DMatrix, DVector};
use serde::Serialize;
use statrs::distribution::{ContinuousCDF, FisherSnedecor, StudentsT};
use std::fmt::Write as _;

/// Relative residual norm below which a column counts as aliased
const ALIAS_TOLERANCE: f64 = 1e-10;

/// Singular value cut-off for the least-squares solve
const SVD_EPSILON: f64 = 1e-12;

/// Minimal least-squares result for a subset of design columns
#[derive(Debug, Clone)]
pub struct LeastSquares {
    /// Indices (into the design) of the columns actually used
    pub kept: Vec<usize>,
    /// Indices of the columns dropped as collinear
    pub aliased: Vec<usize>,
    /// Estimates, parallel to `kept`
    pub beta: DVector<f64>,
    /// Residual sum of squares
    pub rss: f64,
}

impl LeastSquares {
    /// Fit `y` on the given design columns
    ///
    /// # Errors
    /// Returns error if the reduced system cannot be solved
    pub fn fit(design: &Design, columns: &[usize]) -> Result<Self> {
        let (kept, aliased) = independent_columns(&design.x, columns);
        let n = design.n_obs();

        if kept.is_empty() {
            let rss = design.y.iter().map(|v| v * v).sum();
            return Ok(Self {
                kept,
                aliased,
                beta: DVector::zeros(0),
                rss,
            });
        }

        let xr = design.x.select_columns(kept.iter());
        let svd = xr.clone().svd(true, true);
        let beta = svd
            .solve(&design.y, SVD_EPSILON)
            .map_err(|e| Error::FitFailed(format!("Least-squares solve failed: {e}")))?;

        let residuals = &design.y - &xr * &beta;
        let rss = residuals.norm_squared();
        debug_assert_eq!(residuals.len(), n);

        Ok(Self {
            kept,
            aliased,
            beta,
            rss,
        })
    }

    /// Number of estimated parameters
    #[must_use]
    pub fn rank(&self) -> usize {
        self.kept.len()
    }
}

/// Greedy selection of linearly independent columns in the given order
fn independent_columns(x: &DMatrix<f64>, columns: &[usize]) -> (Vec<usize>, Vec<usize>) {
    let mut basis: Vec<DVector<f64>> = Vec::new();
    let mut kept = Vec::new();
    let mut aliased = Vec::new();

    for &c in columns {
        let original = x.column(c).into_owned();
        let norm = original.norm();
        if norm <= f64::EPSILON {
            aliased.push(c);
            continue;
        }
        let mut v = original;
        for q in &basis {
            let projection = q.dot(&v);
            v -= q * projection;
        }
        let residual = v.norm();
        if residual > ALIAS_TOLERANCE * norm {
            basis.push(v / residual);
            kept.push(c);
        } else {
            aliased.push(c);
        }
    }
    (kept, aliased)
}

/// One estimated coefficient
#[derive(Debug, Clone, Serialize)]
pub struct Coefficient {
    /// Display label, e.g. `Dose_numeric:C(NP)[T.AuNP]`
    pub label: String,
    /// Kind of the owning term
    pub kind: TermKind,
    /// Coded operands of the design column
    pub operands: Vec<CodedOperand>,
    /// Point estimate
    pub estimate: f64,
    /// Standard error
    pub std_error: f64,
    /// t statistic
    pub t_value: f64,
    /// Two-sided p-value
    pub p_value: f64,
    /// Lower 95% confidence bound
    pub conf_low: f64,
    /// Upper 95% confidence bound
    pub conf_high: f64,
}

impl Coefficient {
    /// True for the main effect of the numeric variable `name`
    #[must_use]
    pub fn is_numeric_main(&self, name: &str) -> bool {
        self.kind == TermKind::Main
            && matches!(self.operands.as_slice(),
                [CodedOperand { operand: Operand::Numeric(n), .. }] if n == name)
    }
}

/// Fitted OLS model with inference statistics
///
/// Created fresh per analysis; never mutated after [`FittedModel::fit`].
#[derive(Debug, Clone, Serialize)]
pub struct FittedModel {
    /// Model formula
    pub formula: Formula,
    /// Estimated coefficients in design order
    pub coefficients: Vec<Coefficient>,
    /// Labels of design columns dropped as collinear
    pub aliased: Vec<String>,
    /// Complete observations used
    pub n_obs: usize,
    /// Model degrees of freedom (rank minus intercept)
    pub df_model: usize,
    /// Residual degrees of freedom
    pub df_resid: usize,
    /// Residual sum of squares
    pub rss: f64,
    /// Centered total sum of squares
    pub tss: f64,
    /// Coefficient of determination
    pub r_squared: f64,
    /// Adjusted R²
    pub adj_r_squared: f64,
    /// Overall F statistic
    pub f_statistic: f64,
    /// p-value of the overall F statistic
    pub f_pvalue: f64,
}

impl FittedModel {
    /// Fit every column of the design
    ///
    /// # Errors
    /// Returns error if no residual degrees of freedom remain or the normal
    /// equations of the reduced design are singular
    #[allow(clippy::cast_precision_loss)]
    pub fn fit(design: &Design) -> Result<Self> {
        let all: Vec<usize> = (0..design.columns.len()).collect();
        let ls = LeastSquares::fit(design, &all)?;
        let n = design.n_obs();
        let rank = ls.rank();

        if rank >= n {
            return Err(Error::FitFailed(format!(
                "{} has {rank} parameters for {n} observations (no residual degrees of freedom)",
                design.formula
            )));
        }
        let df_resid = n - rank;
        let has_intercept = ls.kept.iter().any(|&c| design.columns[c].operands.is_empty());
        let df_model = if has_intercept { rank - 1 } else { rank };

        let y_mean = design.y.mean();
        let tss: f64 = design.y.iter().map(|v| (v - y_mean).powi(2)).sum();
        let rss = ls.rss;
        let sigma2 = rss / df_resid as f64;

        let xr = design.x.select_columns(ls.kept.iter());
        let xtx_inv = (xr.transpose() * &xr).try_inverse().ok_or_else(|| {
            Error::FitFailed(format!("Singular normal equations for {}", design.formula))
        })?;

        let t_dist = StudentsT::new(0.0, 1.0, df_resid as f64)
            .map_err(|e| Error::FitFailed(format!("t distribution: {e}")))?;
        let t_crit = t_dist.inverse_cdf(0.975);

        let coefficients = ls
            .kept
            .iter()
            .enumerate()
            .map(|(i, &c)| {
                let column: &DesignColumn = &design.columns[c];
                let estimate = ls.beta[i];
                let std_error = (sigma2 * xtx_inv[(i, i)]).max(0.0).sqrt();
                let t_value = estimate / std_error;
                let p_value = if t_value.is_nan() {
                    f64::NAN
                } else {
                    2.0 * t_dist.sf(t_value.abs())
                };
                Coefficient {
                    label: column.label(),
                    kind: design.formula.terms()[column.term].kind(),
                    operands: column.operands.clone(),
                    estimate,
                    std_error,
                    t_value,
                    p_value,
                    conf_low: t_crit.mul_add(-std_error, estimate),
                    conf_high: t_crit.mul_add(std_error, estimate),
                }
            })
            .collect();

        let r_squared = if tss > 0.0 { 1.0 - rss / tss } else { 0.0 };
        let adj_r_squared = if has_intercept {
            1.0 - (1.0 - r_squared) * (n - 1) as f64 / df_resid as f64
        } else {
            1.0 - (1.0 - r_squared) * n as f64 / df_resid as f64
        };
        let (f_statistic, f_pvalue) = overall_f(tss, rss, df_model, df_resid);

        Ok(Self {
            formula: design.formula.clone(),
            coefficients,
            aliased: ls
                .aliased
                .iter()
                .map(|&c| design.columns[c].label())
                .collect(),
            n_obs: n,
            df_model,
            df_resid,
            rss,
            tss,
            r_squared,
            adj_r_squared,
            f_statistic,
            f_pvalue,
        })
    }

    /// Coefficient of the numeric main effect `name`, if estimated
    #[must_use]
    pub fn numeric_coefficient(&self, name: &str) -> Option<&Coefficient> {
        self.coefficients.iter().find(|c| c.is_numeric_main(name))
    }

    /// Fixed-width text summary of the fit
    #[must_use]
    pub fn summary(&self) -> String {
        let rule = "=".repeat(78);
        let thin = "-".repeat(78);
        let mut out = String::new();

        let _ = writeln!(out, "{:^78}", "OLS Regression Results");
        let _ = writeln!(out, "{rule}");
        let header = [
            (
                "Dep. Variable:",
                self.formula.response().to_string(),
                "R-squared:",
                format!("{:.3}", self.r_squared),
            ),
            (
                "Model:",
                "OLS".to_string(),
                "Adj. R-squared:",
                format!("{:.3}", self.adj_r_squared),
            ),
            (
                "Method:",
                "Least Squares".to_string(),
                "F-statistic:",
                format!("{:.4}", self.f_statistic),
            ),
            (
                "No. Observations:",
                self.n_obs.to_string(),
                "Prob (F-statistic):",
                format!("{:.3e}", self.f_pvalue),
            ),
            (
                "Df Residuals:",
                self.df_resid.to_string(),
                "Residual SS:",
                format!("{:.4}", self.rss),
            ),
        ];
        for (left, left_value, right, right_value) in header {
            let _ = writeln!(out, "{left:<20}{left_value:>19}   {right:<20}{right_value:>16}");
        }
        let _ = writeln!(out, "{:<20}{:>19}", "Df Model:", self.df_model);
        let _ = writeln!(out, "Formula: {}", self.formula);
        let _ = writeln!(out, "{rule}");

        let width = self
            .coefficients
            .iter()
            .map(|c| c.label.len())
            .max()
            .unwrap_or(0)
            .max(10);
        let _ = writeln!(
            out,
            "{:<width$} {:>10} {:>10} {:>8} {:>8} {:>10} {:>10}",
            "", "coef", "std err", "t", "P>|t|", "[0.025", "0.975]"
        );
        let _ = writeln!(out, "{thin}");
        for c in &self.coefficients {
            let _ = writeln!(
                out,
                "{:<width$} {:>10.4} {:>10.4} {:>8.3} {:>8.3} {:>10.3} {:>10.3}",
                c.label, c.estimate, c.std_error, c.t_value, c.p_value, c.conf_low, c.conf_high
            );
        }
        let _ = writeln!(out, "{rule}");
        if !self.aliased.is_empty() {
            let _ = writeln!(
                out,
                "Aliased (collinear) terms dropped from the fit: {}",
                self.aliased.join(", ")
            );
        }
        out
    }
}

#[allow(clippy::cast_precision_loss)]
fn overall_f(tss: f64, rss: f64, df_model: usize, df_resid: usize) -> (f64, f64) {
    if df_model == 0 || df_resid == 0 {
        return (f64::NAN, f64::NAN);
    }
    let f = ((tss - rss) / df_model as f64) / (rss / df_resid as f64);
    if f.is_infinite() {
        return (f, 0.0);
    }
    let p = FisherSnedecor::new(df_model as f64, df_resid as f64)
        .map_or(f64::NAN, |dist| dist.sf(f));
    (f, p)
}
