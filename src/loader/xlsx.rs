//! First-sheet reader for `.xlsx` workbooks (calamine)

use crate::dataset::{format_number, ColumnData};
use crate::{Error, Result};
use calamine::{open_workbook_auto, Data, Reader};
use std::path::Path;

/// Cell value after type normalisation
enum Cell {
    Number(f64),
    Text(String),
    Empty,
}

impl From<&Data> for Cell {
    #[allow(clippy::cast_precision_loss)]
    fn from(value: &Data) -> Self {
        match value {
            Data::Int(i) => Self::Number(*i as f64),
            Data::Float(f) if f.is_finite() => Self::Number(*f),
            Data::Float(_) | Data::Empty | Data::Error(_) => Self::Empty,
            Data::String(s) => Self::Text(s.clone()),
            other => Self::Text(other.to_string()),
        }
    }
}

/// Read the first worksheet: first row is the header, the rest are records
///
/// A column is numeric when every non-empty cell is numeric; otherwise its
/// numbers are rendered as text.
pub(super) fn read_first_sheet(path: &Path) -> Result<Vec<(String, ColumnData)>> {
    let mut workbook = open_workbook_auto(path).map_err(|e| {
        Error::Spreadsheet(format!("Failed to open {}: {e}", path.display()))
    })?;

    let sheet = workbook.sheet_names().first().cloned().ok_or_else(|| {
        Error::Spreadsheet(format!("Workbook {} has no sheets", path.display()))
    })?;

    let range = workbook.worksheet_range(&sheet).map_err(|e| {
        Error::Spreadsheet(format!(
            "Failed to read sheet '{sheet}' of {}: {e}",
            path.display()
        ))
    })?;

    let mut rows = range.rows();
    let Some(header) = rows.next() else {
        return Ok(Vec::new());
    };
    let names = header_names(header);

    let mut cells: Vec<Vec<Cell>> = names.iter().map(|_| Vec::new()).collect();
    for row in rows {
        for (index, column) in cells.iter_mut().enumerate() {
            column.push(row.get(index).map_or(Cell::Empty, Cell::from));
        }
    }

    Ok(names
        .into_iter()
        .zip(cells)
        .map(|(name, column)| (name, into_column(column)))
        .collect())
}

/// Header labels; blanks become `Unnamed: <i>`, repeats get a `.N` suffix
fn header_names(header: &[Data]) -> Vec<String> {
    let mut names: Vec<String> = Vec::with_capacity(header.len());
    for (index, cell) in header.iter().enumerate() {
        let base = match cell {
            Data::Empty => format!("Unnamed: {index}"),
            Data::Float(f) => format_number(*f),
            other => other.to_string().trim().to_string(),
        };
        let base = if base.is_empty() {
            format!("Unnamed: {index}")
        } else {
            base
        };

        let mut name = base.clone();
        let mut suffix = 1;
        while names.contains(&name) {
            name = format!("{base}.{suffix}");
            suffix += 1;
        }
        names.push(name);
    }
    names
}

fn into_column(cells: Vec<Cell>) -> ColumnData {
    let all_numeric = cells
        .iter()
        .all(|c| matches!(c, Cell::Number(_) | Cell::Empty));

    if all_numeric {
        ColumnData::Numeric(
            cells
                .into_iter()
                .map(|c| match c {
                    Cell::Number(v) => Some(v),
                    _ => None,
                })
                .collect(),
        )
    } else {
        ColumnData::Text(
            cells
                .into_iter()
                .map(|c| match c {
                    Cell::Number(v) => Some(format_number(v)),
                    Cell::Text(s) => Some(s),
                    Cell::Empty => None,
                })
                .collect(),
        )
    }
}
