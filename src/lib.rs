//! # Statlysis: Exploratory Statistics for Dose-Response Assays
//!
//! **Version**: 0.1.0
//!
//! Statlysis pools `Aggregated_<CellLine>_<Radiation>_<NP>_<Dose>[Gy].xlsx`
//! workbooks into one Arrow-backed dataset and runs a fixed analysis on a
//! chosen response: type-II ANOVA with eta-squared, Tukey HSD per factor, a
//! dose-by-factor OLS regression with a plain-language conclusion, six
//! competing curve fits and descriptive figures.
//!
//! ## Design Principles (Toyota Way Aligned)
//!
//! - **Jidoka**: Each analysis phase fails on its own; the run keeps going
//! - **Poka-Yoke**: Missing values are nulls, model terms are typed values
//! - **Genchi Genbutsu**: `filtered_data.csv` records exactly what was analysed
//! - **Heijunka**: Immutable datasets, deterministic file and level ordering
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use statlysis::loader::load_all_aggregated_files;
//! use statlysis::pipeline::{run_analysis, AnalysisConfig};
//! use std::path::Path;
//!
//! let loaded = load_all_aggregated_files("data/")?;
//! let config = AnalysisConfig::new("NumROS", vec!["Dose".to_string()]);
//! let report = run_analysis(&loaded.dataset, &config, Path::new("results"));
//! for entry in report.log.entries() {
//!     println!("{entry}");
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

pub mod analysis;
pub mod cli;
pub mod dataset;
pub mod error;
pub mod explorer;
pub mod figures;
pub mod interpret;
pub mod loader;
pub mod model;
pub mod pipeline;
pub mod preprocess;
pub mod stats;

pub use dataset::Dataset;
pub use error::{Error, Result};
pub use pipeline::{run_analysis, AnalysisConfig, AnalysisReport};
