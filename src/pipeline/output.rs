//! Output directory layout and text artifacts

use crate::{Error, Result};
use std::path::{Path, PathBuf};

/// ANOVA table file
pub const ANOVA_FILE: &str = "anova.csv";
/// Regression summary file
pub const REGRESSION_FILE: &str = "regression.txt";
/// Conclusion file
pub const CONCLUSION_FILE: &str = "conclusion.txt";
/// Dataset actually analysed
pub const FILTERED_DATA_FILE: &str = "filtered_data.csv";

/// Placeholder for an absent filter
const ALL: &str = "ALL";

/// Single path component made from a user value
///
/// Whitespace, path separators and `:` become `_`; `..` becomes `__`.
fn path_component(value: &str) -> String {
    value
        .chars()
        .map(|c| {
            if c.is_whitespace() || matches!(c, '/' | '\\' | ':') {
                '_'
            } else {
                c
            }
        })
        .collect::<String>()
        .replace("..", "__")
}

/// Tukey table file for a factor
#[must_use]
pub fn tukey_file_name(factor: &str) -> String {
    format!("tukey_{}.csv", path_component(factor))
}

/// `<root>/<CellLine|ALL>_ALL_<NP|ALL>`, always a direct child of `root`
#[must_use]
pub fn group_directory(root: &Path, cell_line: Option<&str>, np: Option<&str>) -> PathBuf {
    let name = format!(
        "{}_{ALL}_{}",
        path_component(cell_line.unwrap_or(ALL)),
        path_component(np.unwrap_or(ALL))
    );
    root.join(name)
}

/// Create `dir` and its parents
///
/// # Errors
/// Returns error if the directory cannot be created
pub fn ensure_dir(dir: &Path) -> Result<()> {
    std::fs::create_dir_all(dir)
        .map_err(|e| Error::Other(format!("Failed to create {}: {e}", dir.display())))
}

/// Write a text artifact
///
/// # Errors
/// Returns error if the file cannot be written
pub fn write_text(path: &Path, content: &str) -> Result<()> {
    std::fs::write(path, content)?;
    Ok(())
}
