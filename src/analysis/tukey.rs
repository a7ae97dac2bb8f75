//! Tukey HSD pairwise comparisons (Tukey-Kramer for unequal group sizes)

use super::TabularResult;
use crate::dataset::{ColumnData, Dataset};
use crate::model::design::sorted_levels;
use crate::stats::{mean, studentized_range};
use crate::{Error, Result};
use rustc_hash::FxHashMap;
use serde::Serialize;
use std::fmt::Write as _;

/// Family-wise error rate of the comparisons
pub const FWER: f64 = 0.05;

/// One pair of groups
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TukeyComparison {
    /// First group (earlier in level order)
    pub group1: String,
    /// Second group
    pub group2: String,
    /// `mean(group2) - mean(group1)`
    pub meandiff: f64,
    /// Family-wise adjusted p-value
    pub p_adj: f64,
    /// Lower simultaneous confidence bound
    pub lower: f64,
    /// Upper simultaneous confidence bound
    pub upper: f64,
    /// Whether the difference is significant at [`FWER`]
    pub reject: bool,
}

/// All pairwise comparisons for one factor
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TukeyResult {
    /// Grouping column
    pub factor: String,
    /// Family-wise error rate
    pub alpha: f64,
    /// One entry per unordered pair of levels
    pub comparisons: Vec<TukeyComparison>,
    /// Fixed-width text table
    pub summary: String,
}

/// Result of a Tukey request
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum TukeyOutcome {
    /// Fewer than two groups; the message explains why
    Skipped(String),
    /// Comparisons were computed
    Completed(TukeyResult),
}

impl TabularResult for TukeyResult {
    fn to_dataset(&self) -> Result<Dataset> {
        let text = |f: fn(&TukeyComparison) -> String| {
            ColumnData::Text(self.comparisons.iter().map(|c| Some(f(c))).collect())
        };
        let number = |f: fn(&TukeyComparison) -> f64| {
            ColumnData::Numeric(self.comparisons.iter().map(|c| Some(f(c))).collect())
        };
        Dataset::from_columns(vec![
            ("group1", text(|c| c.group1.clone())),
            ("group2", text(|c| c.group2.clone())),
            ("meandiff", number(|c| c.meandiff)),
            ("p-adj", number(|c| c.p_adj)),
            ("lower", number(|c| c.lower)),
            ("upper", number(|c| c.upper)),
            (
                "reject",
                text(|c| if c.reject { "True" } else { "False" }.to_string()),
            ),
        ])
    }
}

/// Compare the response across every pair of levels of `factor`
///
/// Rows with a missing response or factor value are ignored. A factor with
/// fewer than two groups is not an error: the outcome is
/// [`TukeyOutcome::Skipped`].
///
/// # Errors
/// Returns error if:
/// - The response or factor column is absent, or the response is not numeric
/// - Fewer than two error degrees of freedom remain
#[allow(clippy::cast_precision_loss)]
pub fn run_tukey(dataset: &Dataset, response: &str, factor: &str) -> Result<TukeyOutcome> {
    let values = dataset.f64_values(response)?;
    let labels = dataset.text_values(factor)?;

    let mut groups: FxHashMap<String, Vec<f64>> = FxHashMap::default();
    for (value, label) in values.iter().zip(&labels) {
        if let (Some(v), Some(l)) = (value, label) {
            groups.entry(l.clone()).or_default().push(*v);
        }
    }

    let names: Vec<String> = groups.keys().cloned().collect();
    let levels = sorted_levels(&names);
    if levels.len() < 2 {
        return Ok(TukeyOutcome::Skipped(format!(
            "Tukey HSD skipped: only one group in '{factor}'"
        )));
    }

    let k = levels.len();
    let total: usize = groups.values().map(Vec::len).sum();
    if total < k + 2 {
        return Err(Error::InsufficientData(format!(
            "Tukey HSD on '{factor}' needs at least 2 error degrees of freedom \
             ({total} observations, {k} groups)"
        )));
    }
    let df = (total - k) as f64;

    let mut means = Vec::with_capacity(k);
    let mut sizes = Vec::with_capacity(k);
    let mut ss_within = 0.0;
    for level in &levels {
        let group = groups
            .get(level)
            .ok_or_else(|| Error::Other(format!("Level '{level}' lost while grouping")))?;
        let m = mean(group).unwrap_or(0.0);
        ss_within += group.iter().map(|v| (v - m).powi(2)).sum::<f64>();
        means.push(m);
        sizes.push(group.len() as f64);
    }
    let mse = ss_within / df;
    let q_crit = studentized_range::quantile(1.0 - FWER, k, df);

    let mut comparisons = Vec::with_capacity(k * (k - 1) / 2);
    for i in 0..k {
        for j in (i + 1)..k {
            let meandiff = means[j] - means[i];
            let se = (mse / 2.0 * (1.0 / sizes[i] + 1.0 / sizes[j])).sqrt();
            let p_adj = if se > 0.0 {
                studentized_range::sf(meandiff.abs() / se, k, df)
            } else if meandiff == 0.0 {
                1.0
            } else {
                0.0
            };
            let half_width = q_crit * se;
            comparisons.push(TukeyComparison {
                group1: levels[i].clone(),
                group2: levels[j].clone(),
                meandiff,
                p_adj,
                lower: meandiff - half_width,
                upper: meandiff + half_width,
                reject: p_adj < FWER,
            });
        }
    }

    let summary = render_summary(&comparisons);
    Ok(TukeyOutcome::Completed(TukeyResult {
        factor: factor.to_string(),
        alpha: FWER,
        comparisons,
        summary,
    }))
}

fn render_summary(comparisons: &[TukeyComparison]) -> String {
    let w = comparisons
        .iter()
        .flat_map(|c| [c.group1.len(), c.group2.len()])
        .max()
        .unwrap_or(0)
        .max(6);
    let header = format!(
        "{:<w$} {:<w$} {:>9} {:>7} {:>9} {:>9} {:>6}",
        "group1", "group2", "meandiff", "p-adj", "lower", "upper", "reject"
    );
    let rule = "=".repeat(header.len());

    let mut out = String::new();
    let _ = writeln!(out, "Multiple Comparison of Means - Tukey HSD, FWER={FWER:.2}");
    let _ = writeln!(out, "{rule}");
    let _ = writeln!(out, "{header}");
    let _ = writeln!(out, "{}", "-".repeat(header.len()));
    for c in comparisons {
        let _ = writeln!(
            out,
            "{:<w$} {:<w$} {:>9.4} {:>7.4} {:>9.4} {:>9.4} {:>6}",
            c.group1,
            c.group2,
            c.meandiff,
            c.p_adj,
            c.lower,
            c.upper,
            if c.reject { "True" } else { "False" }
        );
    }
    let _ = writeln!(out, "{rule}");
    out
}
