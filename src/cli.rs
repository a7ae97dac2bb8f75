//! CLI argument parsing for Statlysis
//!
//! The command line stands in for the interactive control panel: `inspect`
//! lists what a user could choose, `analyze` runs one configured analysis.

use crate::pipeline::AnalysisConfig;
use crate::preprocess::Normalization;
use crate::Result;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Command-line interface
#[derive(Parser, Debug)]
#[command(name = "statlysis")]
#[command(version)]
#[command(about = "Exploratory statistics for dose-response assay spreadsheets", long_about = None)]
pub struct Cli {
    /// Verbose logging (same as RUST_LOG=statlysis=debug)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Command to run
    #[command(subcommand)]
    pub command: Command,
}

/// Subcommands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// List response candidates, cell lines and nanoparticles in a data folder
    Inspect {
        /// Folder with Aggregated_*.xlsx files
        folder: PathBuf,
    },
    /// Run one analysis and write its artifacts
    Analyze(AnalyzeArgs),
}

/// Arguments of `statlysis analyze`
#[derive(Args, Debug, Clone)]
pub struct AnalyzeArgs {
    /// Folder with Aggregated_*.xlsx files
    pub folder: PathBuf,

    /// TOML analysis configuration; flags below override it
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Response variable (numeric column)
    #[arg(short, long)]
    pub response: Option<String>,

    /// Grouping factor (repeatable, e.g. --factor Dose --factor NP)
    #[arg(short, long = "factor", value_name = "FACTOR")]
    pub factors: Vec<String>,

    /// Keep only this cell line
    #[arg(long)]
    pub cell_line: Option<String>,

    /// Keep only this nanoparticle
    #[arg(long)]
    pub np: Option<String>,

    /// Drop rows with |z| >= 3 on the response
    #[arg(long)]
    pub remove_outliers: bool,

    /// Compute ratio metrics (per nucleus, per ROS)
    #[arg(long)]
    pub derived_vars: bool,

    /// none, log1p, zscore or minmax
    #[arg(long, value_name = "METHOD")]
    pub normalization: Option<Normalization>,

    /// Root directory for result folders
    #[arg(short, long, default_value = "results", env = "STATLYSIS_OUTPUT")]
    pub output: PathBuf,

    /// Print the report as JSON
    #[arg(long)]
    pub json: bool,
}

impl AnalyzeArgs {
    /// Configuration file (if any) with command-line overrides applied
    ///
    /// # Errors
    /// Returns error if the configuration file cannot be read or parsed
    pub fn analysis_config(&self) -> Result<AnalysisConfig> {
        let mut config = match &self.config {
            Some(path) => AnalysisConfig::from_toml_file(path)?,
            None => AnalysisConfig::default(),
        };
        if let Some(response) = &self.response {
            config.response.clone_from(response);
        }
        if !self.factors.is_empty() {
            config.factors.clone_from(&self.factors);
        }
        if self.cell_line.is_some() {
            config.cell_line.clone_from(&self.cell_line);
        }
        if self.np.is_some() {
            config.np.clone_from(&self.np);
        }
        config.remove_outliers |= self.remove_outliers;
        config.derived_vars |= self.derived_vars;
        if let Some(method) = self.normalization {
            config.normalization = method;
        }
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn analyze(args: &[&str]) -> AnalyzeArgs {
        let cli = Cli::try_parse_from(args).unwrap();
        match cli.command {
            Command::Analyze(args) => args,
            Command::Inspect { .. } => panic!("expected analyze"),
        }
    }

    #[test]
    fn test_flags_build_config() {
        let args = analyze(&[
            "statlysis", "analyze", "data", "-r", "NumROS", "-f", "Dose", "-f", "NP",
            "--normalization", "zscore", "--remove-outliers",
        ]);
        let config = args.analysis_config().unwrap();
        assert_eq!(config.response, "NumROS");
        assert_eq!(config.factors, vec!["Dose", "NP"]);
        assert_eq!(config.normalization, Normalization::Zscore);
        assert!(config.remove_outliers);
        assert!(!config.derived_vars);
    }

    #[test]
    fn test_flags_override_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("analysis.toml");
        std::fs::write(
            &path,
            "response = \"A\"\nfactors = [\"Dose\"]\nnp = \"AuNP\"\nderived_vars = true\n",
        )
        .unwrap();
        let args = analyze(&[
            "statlysis",
            "analyze",
            "data",
            "--config",
            path.to_str().unwrap(),
            "--response",
            "B",
        ]);
        let config = args.analysis_config().unwrap();
        assert_eq!(config.response, "B");
        assert_eq!(config.factors, vec!["Dose"]);
        assert_eq!(config.np.as_deref(), Some("AuNP"));
        assert!(config.derived_vars);
    }

    #[test]
    fn test_bad_normalization_rejected() {
        let result =
            Cli::try_parse_from(["statlysis", "analyze", "data", "--normalization", "rank"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_inspect() {
        let cli = Cli::try_parse_from(["statlysis", "inspect", "data"]).unwrap();
        assert!(matches!(cli.command, Command::Inspect { .. }));
    }
}
