//! Locale-aware numeric coercion
//!
//! Workbooks exported with a European locale store decimals as `"1,25"`,
//! which arrive as text. Coercion is a deterministic two-stage parse:
//!
//! 1. A text column is a candidate if ANY value contains `,`
//! 2. Every `,` is replaced by `.` and every non-null value parsed as `f64`
//!
//! If every value parses the column becomes numeric; otherwise the column is
//! passed through unchanged. Columns without commas are never touched.

use crate::dataset::ColumnData;

/// Apply comma-decimal coercion to every text column
#[must_use]
pub fn coerce_decimal_commas(columns: Vec<(String, ColumnData)>) -> Vec<(String, ColumnData)> {
    columns
        .into_iter()
        .map(|(name, data)| {
            let data = match data {
                ColumnData::Text(values) => coerce_text_column(values),
                numeric @ ColumnData::Numeric(_) => numeric,
            };
            (name, data)
        })
        .collect()
}

/// Coerce a single text column, falling back to the original values
#[must_use]
pub fn coerce_text_column(values: Vec<Option<String>>) -> ColumnData {
    let has_comma = values.iter().flatten().any(|v| v.contains(','));
    if !has_comma {
        return ColumnData::Text(values);
    }

    let parsed: Option<Vec<Option<f64>>> = values
        .iter()
        .map(|v| match v {
            None => Some(None),
            Some(s) => s
                .replace(',', ".")
                .trim()
                .parse::<f64>()
                .ok()
                .map(|x| x.is_finite().then_some(x)),
        })
        .collect();

    parsed.map_or(ColumnData::Text(values), ColumnData::Numeric)
}
