//! Analysis configuration record
//!
//! ```toml
//! response = "ROS_per_Nucleus"
//! factors = ["Dose", "NP"]
//! cell_line = "A549"       # optional
//! np = "NDAuNP"            # optional
//! remove_outliers = true
//! derived_vars = true
//! normalization = "zscore" # none | log1p | zscore | minmax
//! ```

use crate::dataset::Dataset;
use crate::preprocess::Normalization;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Everything one analysis run needs to know
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AnalysisConfig {
    /// Numeric response column
    pub response: String,
    /// Grouping factors (at least one)
    pub factors: Vec<String>,
    /// Keep only this cell line
    pub cell_line: Option<String>,
    /// Keep only this nanoparticle
    pub np: Option<String>,
    /// Drop rows with `|z| >= 3` on the response
    pub remove_outliers: bool,
    /// Compute ratio metrics before analysis
    pub derived_vars: bool,
    /// Response normalization
    pub normalization: Normalization,
}

impl AnalysisConfig {
    /// Configuration with a response and factors, every option off
    #[must_use]
    pub fn new(response: impl Into<String>, factors: Vec<String>) -> Self {
        Self {
            response: response.into(),
            factors,
            ..Self::default()
        }
    }

    /// Parse from TOML text
    ///
    /// # Errors
    /// Returns error if the text is not valid TOML or has unknown keys
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::Config(format!("Invalid analysis config: {e}")))
    }

    /// Read and parse a TOML file
    ///
    /// # Errors
    /// Returns error if the file cannot be read or parsed
    pub fn from_toml_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("Failed to read config {}: {e}", path.display()))
        })?;
        Self::from_toml_str(&content)
    }

    /// Empty filter values count as "no filter"
    #[must_use]
    pub fn cell_line_filter(&self) -> Option<&str> {
        self.cell_line.as_deref().map(str::trim).filter(|s| !s.is_empty())
    }

    /// Empty filter values count as "no filter"
    #[must_use]
    pub fn np_filter(&self) -> Option<&str> {
        self.np.as_deref().map(str::trim).filter(|s| !s.is_empty())
    }

    /// Check the parts of the configuration that do not depend on derived columns
    ///
    /// # Errors
    /// Returns error if:
    /// - The response name is empty
    /// - No factor is selected, or a factor column is absent
    pub fn validate(&self, dataset: &Dataset) -> Result<()> {
        if self.response.trim().is_empty() {
            return Err(Error::Config("No response variable selected".to_string()));
        }
        if self.factors.is_empty() {
            return Err(Error::Config("Select at least one factor".to_string()));
        }
        if let Some(missing) = self.factors.iter().find(|f| !dataset.has_column(f)) {
            return Err(Error::ColumnNotFound(missing.clone()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::ColumnData;

    #[test]
    fn test_parse_full_config() {
        let config = AnalysisConfig::from_toml_str(
            r#"
            response = "NumROS"
            factors = ["Dose", "NP"]
            cell_line = "A549"
            remove_outliers = true
            normalization = "log1p"
            "#,
        )
        .unwrap();
        assert_eq!(config.response, "NumROS");
        assert_eq!(config.factors, vec!["Dose", "NP"]);
        assert_eq!(config.cell_line_filter(), Some("A549"));
        assert_eq!(config.np_filter(), None);
        assert!(config.remove_outliers);
        assert!(!config.derived_vars);
        assert_eq!(config.normalization, Normalization::Log1p);
    }

    #[test]
    fn test_unknown_key_rejected() {
        let err = AnalysisConfig::from_toml_str("respnse = \"x\"").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_validate() {
        let ds = Dataset::from_columns(vec![("Dose", ColumnData::Text(vec![Some("1".into())]))])
            .unwrap();
        assert!(AnalysisConfig::new("y", vec![]).validate(&ds).is_err());
        assert!(AnalysisConfig::new("y", vec!["NP".into()]).validate(&ds).is_err());
        assert!(AnalysisConfig::new("y", vec!["Dose".into()]).validate(&ds).is_ok());
    }
}
