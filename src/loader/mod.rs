//! Spreadsheet ingestion
//!
//! Turns a folder of `Aggregated_<CellLine>_<Radiation>_<NP>_<Dose>[Gy].xlsx`
//! workbooks into one pooled [`Dataset`]:
//!
//! 1. Parse the metadata tuple from each file name
//! 2. Read the first sheet (header row + records)
//! 3. Attach the metadata as constant text columns
//! 4. Coerce comma-decimal text columns (see [`coerce`])
//! 5. Concatenate every non-empty file under a schema union
//!
//! Toyota Way: Jidoka - one unreadable file is reported and skipped, it never
//! stops the line.

pub mod coerce;
mod xlsx;

pub use coerce::coerce_decimal_commas;

use crate::dataset::{ColumnData, Dataset, METADATA_COLUMNS};
use crate::{Error, Result};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// File name prefix of aggregated result workbooks
pub const FILE_PREFIX: &str = "Aggregated_";

/// Extension of aggregated result workbooks
pub const FILE_EXTENSION: &str = "xlsx";

/// Placeholder for metadata that cannot be recovered from a file name
pub const UNKNOWN: &str = "Unknown";

/// Metadata tuple encoded in an aggregated file name
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct FileMetadata {
    /// Cell line, e.g. `A549`
    pub cell_line: String,
    /// Radiation type, e.g. `Xray`
    pub radiation: String,
    /// Nanoparticle status, e.g. `NDAuNP`
    pub np: String,
    /// Dose label with any `Gy` suffix removed
    pub dose: String,
}

impl FileMetadata {
    /// All four fields set to [`UNKNOWN`]
    #[must_use]
    pub fn unknown() -> Self {
        Self {
            cell_line: UNKNOWN.to_string(),
            radiation: UNKNOWN.to_string(),
            np: UNKNOWN.to_string(),
            dose: UNKNOWN.to_string(),
        }
    }

    /// Values in [`METADATA_COLUMNS`] order
    #[must_use]
    pub fn values(&self) -> [&str; 4] {
        [&self.cell_line, &self.radiation, &self.np, &self.dose]
    }
}

/// Parse `{CellLine, Radiation, NP, Dose}` from a file name
///
/// The extension is dropped and the stem split on `_`. Segments 1-4 map to
/// the four fields; with fewer than five segments every field is
/// [`UNKNOWN`] (no partial recovery).
///
/// # Example
/// ```
/// use statlysis::loader::parse_metadata_from_name;
///
/// let meta = parse_metadata_from_name("Aggregated_A549_Xray_NDAuNP_2Gy.xlsx");
/// assert_eq!(meta.cell_line, "A549");
/// assert_eq!(meta.dose, "2");
/// ```
#[must_use]
pub fn parse_metadata_from_name(filename: &str) -> FileMetadata {
    let path = Path::new(filename);
    let stem = path
        .file_stem()
        .map_or_else(|| filename.to_string(), |s| s.to_string_lossy().into_owned());

    let parts: Vec<&str> = stem.split('_').collect();
    if parts.len() < 5 {
        return FileMetadata::unknown();
    }

    FileMetadata {
        cell_line: parts[1].to_string(),
        radiation: parts[2].to_string(),
        np: parts[3].to_string(),
        dose: parts[4].replace("Gy", "").trim().to_string(),
    }
}

/// Load one aggregated workbook with its metadata columns attached
///
/// # Errors
/// Returns error if the workbook cannot be opened or its first sheet read
pub fn load_aggregated_file<P: AsRef<Path>>(path: P) -> Result<Dataset> {
    let path = path.as_ref();
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let metadata = parse_metadata_from_name(&file_name);

    let mut columns = xlsx::read_first_sheet(path)?;
    let num_rows = columns.first().map_or(0, |(_, c)| c.len());
    if num_rows == 0 {
        debug!(path = %path.display(), "workbook has no records");
        return Ok(Dataset::empty());
    }

    for (name, value) in METADATA_COLUMNS.iter().zip(metadata.values()) {
        let data = ColumnData::Text(vec![Some(value.to_string()); num_rows]);
        match columns.iter_mut().find(|(n, _)| n == name) {
            Some((_, existing)) => *existing = data,
            None => columns.push(((*name).to_string(), data)),
        }
    }

    let columns = coerce_decimal_commas(columns);
    Dataset::from_columns(columns)
}

/// A file that could not be loaded and why
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadFailure {
    /// Offending file
    pub path: PathBuf,
    /// Human-readable reason
    pub reason: String,
}

/// Outcome of loading a folder
#[derive(Debug, Clone, Default)]
pub struct LoadReport {
    /// Pooled records of every file that loaded with at least one row
    pub dataset: Dataset,
    /// Files that contributed rows
    pub loaded: Vec<PathBuf>,
    /// Files that failed to load
    pub failures: Vec<LoadFailure>,
}

/// Whether a file name matches the aggregated workbook pattern
#[must_use]
pub fn is_aggregated_file_name(name: &str) -> bool {
    name.starts_with(FILE_PREFIX)
        && Path::new(name)
            .extension()
            .is_some_and(|ext| ext == FILE_EXTENSION)
}

/// Load every aggregated workbook in `folder` (non-recursive)
///
/// Files are visited in sorted name order. Unreadable files are logged and
/// listed in [`LoadReport::failures`]; they never abort the scan. The pooled
/// dataset has its metadata columns trimmed.
///
/// # Errors
/// Returns error if the folder itself cannot be listed
pub fn load_all_aggregated_files<P: AsRef<Path>>(folder: P) -> Result<LoadReport> {
    let folder = folder.as_ref();
    let entries = std::fs::read_dir(folder).map_err(|e| {
        Error::Io(std::io::Error::new(
            e.kind(),
            format!("Failed to list {}: {e}", folder.display()),
        ))
    })?;

    let mut paths: Vec<PathBuf> = entries
        .filter_map(std::result::Result::ok)
        .map(|entry| entry.path())
        .filter(|path| path.is_file())
        .filter(|path| {
            path.file_name()
                .is_some_and(|n| is_aggregated_file_name(&n.to_string_lossy()))
        })
        .collect();
    paths.sort();

    let mut report = LoadReport::default();
    let mut datasets = Vec::with_capacity(paths.len());

    for path in paths {
        match load_aggregated_file(&path) {
            Ok(dataset) if dataset.is_empty() => {
                debug!(path = %path.display(), "skipping empty workbook");
            }
            Ok(dataset) => {
                debug!(path = %path.display(), rows = dataset.num_rows(), "loaded workbook");
                datasets.push(dataset);
                report.loaded.push(path);
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "failed to read workbook");
                report.failures.push(LoadFailure {
                    path,
                    reason: e.to_string(),
                });
            }
        }
    }

    report.dataset = Dataset::concat(&datasets)?.trim_metadata()?;
    info!(
        files = report.loaded.len(),
        failed = report.failures.len(),
        rows = report.dataset.num_rows(),
        "loaded aggregated data"
    );
    Ok(report)
}
