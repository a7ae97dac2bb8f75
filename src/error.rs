//! Error types for Statlysis
//!
//! Toyota Way: Clear error messages with actionable guidance (Respect for People)

use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// Statlysis error types
#[derive(Error, Debug)]
pub enum Error {
    /// Spreadsheet could not be opened or parsed
    #[error("Spreadsheet error: {0}")]
    Spreadsheet(String),

    /// Requested column is not part of the dataset
    #[error("Column not found: {0}")]
    ColumnNotFound(String),

    /// Column exists but is not numeric
    #[error("Column '{0}' is not numeric")]
    NotNumeric(String),

    /// Invalid input parameters
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Not enough rows (or groups) left to run the requested step
    #[error("Insufficient data: {0}")]
    InsufficientData(String),

    /// Least-squares fit could not be computed (singular design, no residual df)
    #[error("Model fit failed: {0}")]
    FitFailed(String),

    /// Iterative fit hit its evaluation cap
    #[error("Fit did not converge after {evaluations} evaluations")]
    NoConvergence {
        /// Function evaluations spent before giving up
        evaluations: usize,
    },

    /// Figure rendering failed
    #[error("Plot error: {0}")]
    Plot(String),

    /// Configuration file or value rejected
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Arrow error
    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    /// Generic error
    #[error("{0}")]
    Other(String),
}
