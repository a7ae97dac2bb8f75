//! One analysis run, end to end
//!
//! [`run_analysis`] takes the dataset BY REFERENCE and never mutates it:
//! every step produces a new [`Dataset`]. Each phase returns an explicit
//! [`Result`]; the orchestrator logs failures and decides what still runs:
//!
//! ```text
//! validate -> filter -> Dose_numeric -> derived vars -> drop missing
//!   -> outliers -> min rows -> normalize -> output dir      (abort on failure)
//! ANOVA -> Tukey per factor                                 (Tukey needs ANOVA)
//! plot grid                                                 (independent)
//! regression -> conclusion                                  (independent)
//! competing models figure                                   (independent)
//! filtered_data.csv
//! ```
//!
//! Toyota Way: Jidoka - a failing phase stops itself, not the line

pub mod config;
pub mod log;
pub mod output;

pub use config::AnalysisConfig;
pub use log::{AnalysisLog, LogEntry, LogLevel};

use crate::analysis::{
    perform_anova, run_regression, run_tukey, AnovaTable, TabularResult, TukeyOutcome,
};
use crate::dataset::{Dataset, DOSE_NUMERIC_COLUMN};
use crate::explorer::{fit_competing_models, CurveModel};
use crate::figures::{
    plot_grid_file_name, regression_models_file_name, render_plot_grid, render_regression_models,
};
use crate::interpret::generate_conclusion;
use crate::preprocess::{
    apply_normalization, create_derived_vars, remove_outliers, Normalization, DEFAULT_Z_THRESHOLD,
};
use crate::{Error, Result};
use serde::Serialize;
use std::path::{Path, PathBuf};

/// Fewest rows an analysis will run on
pub const MIN_ROWS: usize = 5;

/// Everything one run produced
#[derive(Debug, Clone, Default, Serialize)]
pub struct AnalysisReport {
    /// Directory the artifacts were written to
    pub output_dir: Option<PathBuf>,
    /// Rows in the analysed dataset
    pub rows_used: usize,
    /// Rows dropped by outlier rejection
    pub outliers_removed: usize,
    /// ANOVA table, when the ANOVA phase succeeded
    pub anova: Option<AnovaTable>,
    /// Tukey outcome per factor, in factor order
    pub tukey: Vec<(String, TukeyOutcome)>,
    /// Regression summary text
    pub regression_summary: Option<String>,
    /// Natural-language conclusion
    pub conclusion: Option<String>,
    /// Competing curve models that could be fitted
    pub curves: Vec<CurveModel>,
    /// Figures written
    pub figures: Vec<PathBuf>,
    /// Progress and error messages
    pub log: AnalysisLog,
    /// True when the run stopped before the statistical phases
    pub aborted: bool,
}

impl AnalysisReport {
    fn abort(mut self, message: String) -> Self {
        self.log.error(message);
        self.log.error("Analysis aborted");
        self.aborted = true;
        self
    }
}

/// Dataset after filtering and preprocessing, plus what it took
struct Prepared {
    dataset: Dataset,
    outliers_removed: usize,
}

/// Run one analysis and write its artifacts under `output_root`
///
/// Never fails: every problem ends up in [`AnalysisReport::log`], and
/// [`AnalysisReport::aborted`] tells whether the statistical phases ran.
pub fn run_analysis(
    dataset: &Dataset,
    config: &AnalysisConfig,
    output_root: &Path,
) -> AnalysisReport {
    let mut report = AnalysisReport::default();
    report.log.info(format!(
        "Analysing '{}' by {} ({} rows)",
        config.response,
        config.factors.join(", "),
        dataset.num_rows()
    ));

    let prepared = match prepare(dataset, config, &mut report.log) {
        Ok(prepared) => prepared,
        Err(e) => return report.abort(e.to_string()),
    };
    report.outliers_removed = prepared.outliers_removed;
    let data = prepared.dataset;
    report.rows_used = data.num_rows();

    let out_dir =
        output::group_directory(output_root, config.cell_line_filter(), config.np_filter());
    if let Err(e) = output::ensure_dir(&out_dir) {
        return report.abort(e.to_string());
    }
    report.log.info(format!("Writing results to {}", out_dir.display()));
    report.output_dir = Some(out_dir.clone());

    let response = config.response.as_str();

    match anova_phase(&data, config, &out_dir, &mut report.log) {
        Ok(table) => {
            report.anova = Some(table);
            report.tukey = tukey_phase(&data, config, &out_dir, &mut report.log);
        }
        Err(e) => {
            report.log.error(format!("ANOVA failed: {e}"));
            report.log.warn("Tukey HSD not run because ANOVA failed");
        }
    }

    let grid_path = out_dir.join(plot_grid_file_name(response));
    match render_plot_grid(&data, response, &grid_path) {
        Ok(()) => report.figures.push(grid_path),
        Err(e) => report.log.error(format!("Plot grid failed: {e}")),
    }

    let categorical = config
        .factors
        .get(1)
        .or_else(|| config.factors.first())
        .map_or("", String::as_str);
    match regression_phase(&data, response, categorical, &out_dir, &mut report.log) {
        Ok((summary, conclusion)) => {
            report.regression_summary = Some(summary);
            report.conclusion = Some(conclusion);
        }
        Err(e) => report.log.error(format!("Regression failed: {e}")),
    }

    let models_path = out_dir.join(regression_models_file_name(response));
    match explorer_phase(&data, response, &models_path) {
        Ok(curves) => {
            report.log.info(format!(
                "Fitted curves: {}",
                curves.iter().map(|m| m.name()).collect::<Vec<_>>().join(", ")
            ));
            report.curves = curves;
            report.figures.push(models_path);
        }
        Err(e) => report.log.error(format!("Regression models figure failed: {e}")),
    }

    let filtered_path = out_dir.join(output::FILTERED_DATA_FILE);
    match data.write_csv(&filtered_path) {
        Ok(()) => report.log.info(format!("Saved {}", filtered_path.display())),
        Err(e) => report.log.error(format!("Failed to save filtered data: {e}")),
    }

    report.log.info("Analysis complete");
    report
}

fn prepare(dataset: &Dataset, config: &AnalysisConfig, log: &mut AnalysisLog) -> Result<Prepared> {
    config.validate(dataset)?;

    let mut data = dataset.clone();
    for (column, value) in [
        ("CellLine", config.cell_line_filter()),
        ("NP", config.np_filter()),
    ] {
        if let Some(value) = value {
            data = data.filter_eq(column, value)?;
            log.info(format!("Filtered {column} = {value}: {} rows", data.num_rows()));
        }
    }

    data = data.with_dose_numeric()?;

    if config.derived_vars {
        data = create_derived_vars(&data)?;
        log.info("Derived variables computed");
    }

    if !data.has_column(&config.response) {
        return Err(Error::ColumnNotFound(config.response.clone()));
    }
    if !data.is_numeric(&config.response) {
        return Err(Error::NotNumeric(config.response.clone()));
    }
    data = data.drop_nulls(&config.response)?;

    let mut outliers_removed = 0;
    if config.remove_outliers {
        let filtered = remove_outliers(&data, &config.response, DEFAULT_Z_THRESHOLD)?;
        outliers_removed = filtered.removed;
        data = filtered.dataset;
        log.info(format!("Removed {outliers_removed} outlier(s)"));
    }

    if data.num_rows() < MIN_ROWS {
        return Err(Error::InsufficientData(format!(
            "Not enough data for analysis: {} rows after filtering (minimum {MIN_ROWS})",
            data.num_rows()
        )));
    }

    if config.normalization != Normalization::None {
        data = apply_normalization(&data, &config.response, config.normalization)?;
        log.info(format!("Applied {} normalization", config.normalization));
    }

    Ok(Prepared {
        dataset: data,
        outliers_removed,
    })
}

fn anova_phase(
    data: &Dataset,
    config: &AnalysisConfig,
    out_dir: &Path,
    log: &mut AnalysisLog,
) -> Result<AnovaTable> {
    let (model, table) = perform_anova(data, &config.response, &config.factors)?;
    table.to_dataset()?.write_csv(out_dir.join(output::ANOVA_FILE))?;
    log.info(format!(
        "ANOVA on {} ({} observations, R\u{b2} = {:.3})",
        model.formula, model.n_obs, model.r_squared
    ));
    Ok(table)
}

fn tukey_phase(
    data: &Dataset,
    config: &AnalysisConfig,
    out_dir: &Path,
    log: &mut AnalysisLog,
) -> Vec<(String, TukeyOutcome)> {
    let mut outcomes = Vec::with_capacity(config.factors.len());
    for factor in &config.factors {
        let outcome = run_tukey(data, &config.response, factor).and_then(|outcome| {
            if let TukeyOutcome::Completed(result) = &outcome {
                result
                    .to_dataset()?
                    .write_csv(out_dir.join(output::tukey_file_name(factor)))?;
            }
            Ok(outcome)
        });
        match outcome {
            Ok(TukeyOutcome::Skipped(message)) => {
                log.warn(message.clone());
                outcomes.push((factor.clone(), TukeyOutcome::Skipped(message)));
            }
            Ok(outcome) => {
                log.info(format!("Tukey HSD completed for '{factor}'"));
                outcomes.push((factor.clone(), outcome));
            }
            Err(e) => log.error(format!("Tukey HSD failed for '{factor}': {e}")),
        }
    }
    outcomes
}

fn regression_phase(
    data: &Dataset,
    response: &str,
    categorical: &str,
    out_dir: &Path,
    log: &mut AnalysisLog,
) -> Result<(String, String)> {
    let (model, summary) = run_regression(data, response, DOSE_NUMERIC_COLUMN, categorical)?;
    output::write_text(&out_dir.join(output::REGRESSION_FILE), &summary)?;

    let conclusion = generate_conclusion(&model, response, categorical);
    output::write_text(&out_dir.join(output::CONCLUSION_FILE), &conclusion)?;
    log.info(format!("Conclusion: {conclusion}"));
    Ok((summary, conclusion))
}

fn explorer_phase(data: &Dataset, response: &str, path: &Path) -> Result<Vec<CurveModel>> {
    let fits = fit_competing_models(data, DOSE_NUMERIC_COLUMN, response)?;
    render_regression_models(data, DOSE_NUMERIC_COLUMN, response, &fits, path)?;
    Ok(fits.keys().copied().collect())
}
