//! Statistical engine: ANOVA, post-hoc comparisons, moderated regression
//!
//! Every entry point returns an explicit [`Result`]; the pipeline decides
//! whether a failure stops the current phase or the whole run.
//!
//! Toyota Way Principles:
//! - Jidoka: Fit failures surface as `Error::FitFailed`, never as NaN tables
//! - Poka-Yoke: Terms are structured values, so no label parsing downstream

pub mod anova;
pub mod regression;
pub mod tukey;

pub use anova::{perform_anova, AnovaRow, AnovaTable};
pub use regression::run_regression;
pub use tukey::{run_tukey, TukeyComparison, TukeyOutcome, TukeyResult};

use crate::dataset::Dataset;
use crate::Result;

/// A result that can be exported as a table (CSV artifacts)
pub trait TabularResult {
    /// Render the result as a dataset, one row per table row
    ///
    /// # Errors
    /// Returns error if the columns cannot be assembled into a batch
    fn to_dataset(&self) -> Result<Dataset>;
}
