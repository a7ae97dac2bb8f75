//! Pooled assay dataset (Arrow columnar storage)
//!
//! **Immutable Design** (replace, never mutate):
//! - A `Dataset` wraps exactly one Arrow `RecordBatch`
//! - Every transformation returns a NEW dataset; the caller swaps it in
//! - Numeric columns are nullable `Float64`, everything else is nullable `Utf8`
//!
//! Toyota Way Principles:
//! - Poka-Yoke: Missing values are Arrow nulls, never sentinel numbers
//! - Jidoka: Schema union on concat surfaces type conflicts as text columns

use crate::{Error, Result};
use arrow::array::{
    new_null_array, Array, ArrayRef, BooleanArray, Float64Array, RecordBatch, RecordBatchOptions,
    StringArray,
};
use arrow::compute;
use arrow::datatypes::{DataType, Field, Schema, SchemaRef};
use std::path::Path;
use std::sync::Arc;

/// Categorical metadata attached to every row (parsed from file names)
pub const METADATA_COLUMNS: [&str; 4] = ["CellLine", "Radiation", "NP", "Dose"];

/// Column holding the dose as text (possibly with a `Gy` suffix)
pub const DOSE_COLUMN: &str = "Dose";

/// Column holding the dose converted to a number
pub const DOSE_NUMERIC_COLUMN: &str = "Dose_numeric";

/// Owned column values used to build or extend a dataset
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnData {
    /// Nullable numeric values
    Numeric(Vec<Option<f64>>),
    /// Nullable text values
    Text(Vec<Option<String>>),
}

impl ColumnData {
    /// Number of values in the column
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::Numeric(v) => v.len(),
            Self::Text(v) => v.len(),
        }
    }

    /// Whether the column has no values
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn data_type(&self) -> DataType {
        match self {
            Self::Numeric(_) => DataType::Float64,
            Self::Text(_) => DataType::Utf8,
        }
    }

    fn into_array(self) -> ArrayRef {
        match self {
            Self::Numeric(v) => Arc::new(Float64Array::from(v)),
            Self::Text(v) => Arc::new(StringArray::from(v)),
        }
    }
}

/// Immutable table of assay records
#[derive(Debug, Clone)]
pub struct Dataset {
    batch: RecordBatch,
}

impl Default for Dataset {
    fn default() -> Self {
        Self::empty()
    }
}

impl PartialEq for Dataset {
    fn eq(&self, other: &Self) -> bool {
        self.batch == other.batch
    }
}

impl Dataset {
    /// Dataset with no columns and no rows
    #[must_use]
    pub fn empty() -> Self {
        Self {
            batch: RecordBatch::new_empty(Arc::new(Schema::empty())),
        }
    }

    /// Build a dataset from named columns
    ///
    /// # Errors
    /// Returns error if columns have different lengths or a name repeats
    pub fn from_columns<S: Into<String>>(columns: Vec<(S, ColumnData)>) -> Result<Self> {
        let mut fields = Vec::with_capacity(columns.len());
        let mut arrays = Vec::with_capacity(columns.len());
        let mut num_rows = None;

        for (name, data) in columns {
            let name = name.into();
            if fields.iter().any(|f: &Field| f.name() == &name) {
                return Err(Error::InvalidInput(format!("Duplicate column: {name}")));
            }
            match num_rows {
                None => num_rows = Some(data.len()),
                Some(n) if n != data.len() => {
                    return Err(Error::InvalidInput(format!(
                        "Column '{name}' has {} rows, expected {n}",
                        data.len()
                    )));
                }
                Some(_) => {}
            }
            fields.push(Field::new(name, data.data_type(), true));
            arrays.push(data.into_array());
        }

        Self::assemble(Arc::new(Schema::new(fields)), arrays, num_rows.unwrap_or(0))
    }

    fn assemble(schema: SchemaRef, arrays: Vec<ArrayRef>, num_rows: usize) -> Result<Self> {
        let options = RecordBatchOptions::new().with_row_count(Some(num_rows));
        let batch = RecordBatch::try_new_with_options(schema, arrays, &options)?;
        Ok(Self { batch })
    }

    /// Underlying Arrow batch
    #[must_use]
    pub const fn batch(&self) -> &RecordBatch {
        &self.batch
    }

    /// Number of rows
    #[must_use]
    pub fn num_rows(&self) -> usize {
        self.batch.num_rows()
    }

    /// True when the dataset has no rows
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.batch.num_rows() == 0
    }

    /// Column names in schema order
    #[must_use]
    pub fn column_names(&self) -> Vec<String> {
        self.batch
            .schema()
            .fields()
            .iter()
            .map(|f| f.name().clone())
            .collect()
    }

    /// Names of the `Float64` columns (response variable candidates)
    #[must_use]
    pub fn numeric_columns(&self) -> Vec<String> {
        self.batch
            .schema()
            .fields()
            .iter()
            .filter(|f| f.data_type() == &DataType::Float64)
            .map(|f| f.name().clone())
            .collect()
    }

    /// Whether a column with this name exists
    #[must_use]
    pub fn has_column(&self, name: &str) -> bool {
        self.batch.column_by_name(name).is_some()
    }

    /// Whether the column exists and is numeric
    #[must_use]
    pub fn is_numeric(&self, name: &str) -> bool {
        self.batch
            .column_by_name(name)
            .is_some_and(|c| c.data_type() == &DataType::Float64)
    }

    fn column(&self, name: &str) -> Result<&ArrayRef> {
        self.batch
            .column_by_name(name)
            .ok_or_else(|| Error::ColumnNotFound(name.to_string()))
    }

    /// Values of a numeric column (`None` = missing)
    ///
    /// # Errors
    /// Returns error if the column is absent or holds text
    pub fn f64_values(&self, name: &str) -> Result<Vec<Option<f64>>> {
        let column = self.column(name)?;
        let array = column
            .as_any()
            .downcast_ref::<Float64Array>()
            .ok_or_else(|| Error::NotNumeric(name.to_string()))?;
        Ok(array.iter().collect())
    }

    /// Values of any column rendered as text (for grouping)
    ///
    /// # Errors
    /// Returns error if the column is absent
    pub fn text_values(&self, name: &str) -> Result<Vec<Option<String>>> {
        let column = self.column(name)?;
        match column.data_type() {
            DataType::Utf8 => {
                let array = column
                    .as_any()
                    .downcast_ref::<StringArray>()
                    .ok_or_else(|| Error::Other("Failed to downcast to StringArray".to_string()))?;
                Ok(array.iter().map(|v| v.map(str::to_string)).collect())
            }
            DataType::Float64 => {
                let array = column
                    .as_any()
                    .downcast_ref::<Float64Array>()
                    .ok_or_else(|| {
                        Error::Other("Failed to downcast to Float64Array".to_string())
                    })?;
                Ok(array.iter().map(|v| v.map(format_number)).collect())
            }
            dt => Err(Error::InvalidInput(format!(
                "Unsupported column type for '{name}': {dt:?}"
            ))),
        }
    }

    /// Keep rows where `mask` is true
    ///
    /// # Errors
    /// Returns error if the mask length differs from the row count
    pub fn filter(&self, mask: &[bool]) -> Result<Self> {
        if mask.len() != self.num_rows() {
            return Err(Error::InvalidInput(format!(
                "Filter mask has {} entries for {} rows",
                mask.len(),
                self.num_rows()
            )));
        }
        let mask = BooleanArray::from(mask.to_vec());
        let batch = compute::filter_record_batch(&self.batch, &mask)?;
        Ok(Self { batch })
    }

    /// Keep rows whose text value in `column` equals `value`
    ///
    /// # Errors
    /// Returns error if the column is absent
    pub fn filter_eq(&self, column: &str, value: &str) -> Result<Self> {
        let mask: Vec<bool> = self
            .text_values(column)?
            .iter()
            .map(|v| v.as_deref() == Some(value))
            .collect();
        self.filter(&mask)
    }

    /// Drop rows where `column` is missing
    ///
    /// # Errors
    /// Returns error if the column is absent
    pub fn drop_nulls(&self, column: &str) -> Result<Self> {
        let array = self.column(column)?;
        let mask: Vec<bool> = (0..array.len()).map(|i| array.is_valid(i)).collect();
        self.filter(&mask)
    }

    /// Return a dataset with `name` set to `data` (replaced in place or appended)
    ///
    /// # Errors
    /// Returns error if the length differs from the row count
    pub fn with_column(&self, name: &str, data: ColumnData) -> Result<Self> {
        if data.len() != self.num_rows() {
            return Err(Error::InvalidInput(format!(
                "Column '{name}' has {} rows, expected {}",
                data.len(),
                self.num_rows()
            )));
        }

        let schema = self.batch.schema();
        let field = Field::new(name, data.data_type(), true);
        let array = data.into_array();

        let mut fields: Vec<Field> = schema.fields().iter().map(|f| f.as_ref().clone()).collect();
        let mut arrays: Vec<ArrayRef> = self.batch.columns().to_vec();

        if let Some(index) = fields.iter().position(|f| f.name() == name) {
            fields[index] = field;
            arrays[index] = array;
        } else {
            fields.push(field);
            arrays.push(array);
        }

        Self::assemble(Arc::new(Schema::new(fields)), arrays, self.num_rows())
    }

    /// Shorthand for replacing a numeric column
    ///
    /// # Errors
    /// Returns error if the length differs from the row count
    pub fn with_f64_column(&self, name: &str, values: Vec<Option<f64>>) -> Result<Self> {
        self.with_column(name, ColumnData::Numeric(values))
    }

    /// Coerce the metadata columns to trimmed text
    ///
    /// Metadata columns that are absent are left absent.
    ///
    /// # Errors
    /// Returns error if rebuilding the batch fails
    pub fn trim_metadata(&self) -> Result<Self> {
        let mut dataset = self.clone();
        for name in METADATA_COLUMNS {
            if !dataset.has_column(name) {
                continue;
            }
            let trimmed = dataset
                .text_values(name)?
                .into_iter()
                .map(|v| v.map(|s| s.trim().to_string()))
                .collect();
            dataset = dataset.with_column(name, ColumnData::Text(trimmed))?;
        }
        Ok(dataset)
    }

    /// Add `Dose_numeric` parsed from the `Dose` text column
    ///
    /// # Errors
    /// Returns error if the `Dose` column is absent
    pub fn with_dose_numeric(&self) -> Result<Self> {
        let values = self
            .text_values(DOSE_COLUMN)?
            .iter()
            .map(|v| v.as_deref().and_then(parse_dose))
            .collect();
        self.with_f64_column(DOSE_NUMERIC_COLUMN, values)
    }

    /// Sorted distinct non-missing text values of a column
    ///
    /// # Errors
    /// Returns error if the column is absent
    pub fn distinct_values(&self, column: &str) -> Result<Vec<String>> {
        let mut values: Vec<String> = self.text_values(column)?.into_iter().flatten().collect();
        values.sort();
        values.dedup();
        Ok(values)
    }

    /// Concatenate datasets under the union of their schemas
    ///
    /// Columns missing from a source are filled with nulls. A column that is
    /// numeric in one source and text in another becomes text everywhere.
    ///
    /// # Errors
    /// Returns error if Arrow concatenation fails
    pub fn concat(datasets: &[Self]) -> Result<Self> {
        let non_empty: Vec<&Self> = datasets.iter().filter(|d| !d.is_empty()).collect();
        match non_empty.len() {
            0 => return Ok(Self::empty()),
            1 => return Ok(non_empty[0].clone()),
            _ => {}
        }

        let mut union: Vec<Field> = Vec::new();
        for dataset in &non_empty {
            for field in dataset.batch.schema().fields() {
                match union.iter_mut().find(|f| f.name() == field.name()) {
                    Some(existing) if existing.data_type() != field.data_type() => {
                        *existing = Field::new(field.name(), DataType::Utf8, true);
                    }
                    Some(_) => {}
                    None => union.push(Field::new(field.name(), field.data_type().clone(), true)),
                }
            }
        }
        let schema = Arc::new(Schema::new(union));

        let mut batches = Vec::with_capacity(non_empty.len());
        for dataset in &non_empty {
            let rows = dataset.num_rows();
            let mut arrays = Vec::with_capacity(schema.fields().len());
            for field in schema.fields() {
                let array = match dataset.batch.column_by_name(field.name()) {
                    None => new_null_array(field.data_type(), rows),
                    Some(col) if col.data_type() == field.data_type() => col.clone(),
                    Some(_) => {
                        let text = dataset.text_values(field.name())?;
                        Arc::new(StringArray::from(text)) as ArrayRef
                    }
                };
                arrays.push(array);
            }
            batches.push(Self::assemble(schema.clone(), arrays, rows)?.batch);
        }

        let batch = compute::concat_batches(&schema, &batches)?;
        Ok(Self { batch })
    }

    /// Write the dataset as CSV with a header row
    ///
    /// # Errors
    /// Returns error if the file cannot be created or written
    pub fn write_csv<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let file = std::fs::File::create(path.as_ref())?;
        let mut writer = arrow::csv::WriterBuilder::new()
            .with_header(true)
            .build(file);
        writer.write(&self.batch)?;
        Ok(())
    }
}

/// Parse a dose label such as `"2Gy"`, `" 0.5 "` or `"4"`
///
/// Returns `None` for labels that are not a finite number.
#[must_use]
pub fn parse_dose(label: &str) -> Option<f64> {
    label
        .replace("Gy", "")
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
}

/// Render a number the way it is shown as a group label
#[must_use]
pub fn format_number(value: f64) -> String {
    format!("{value}")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Dataset {
        Dataset::from_columns(vec![
            (
                "Dose",
                ColumnData::Text(vec![Some("0Gy".into()), Some(" 2 ".into()), Some("x".into())]),
            ),
            ("Signal", ColumnData::Numeric(vec![Some(1.0), None, Some(3.0)])),
        ])
        .unwrap()
    }

    #[test]
    fn test_from_columns_rejects_ragged() {
        let result = Dataset::from_columns(vec![
            ("a", ColumnData::Numeric(vec![Some(1.0)])),
            ("b", ColumnData::Numeric(vec![Some(1.0), Some(2.0)])),
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_numeric_columns_and_lookup() {
        let ds = sample();
        assert_eq!(ds.numeric_columns(), vec!["Signal".to_string()]);
        assert!(ds.is_numeric("Signal"));
        assert!(!ds.is_numeric("Dose"));
        assert!(matches!(ds.f64_values("Dose"), Err(Error::NotNumeric(_))));
        assert!(matches!(ds.f64_values("Nope"), Err(Error::ColumnNotFound(_))));
    }

    #[test]
    fn test_dose_numeric() {
        let ds = sample().with_dose_numeric().unwrap();
        assert_eq!(
            ds.f64_values(DOSE_NUMERIC_COLUMN).unwrap(),
            vec![Some(0.0), Some(2.0), None]
        );
    }

    #[test]
    fn test_drop_nulls_and_filter_eq() {
        let ds = sample();
        assert_eq!(ds.drop_nulls("Signal").unwrap().num_rows(), 2);
        assert_eq!(ds.filter_eq("Dose", "x").unwrap().num_rows(), 1);
    }

    #[test]
    fn test_trim_metadata() {
        let ds = sample().trim_metadata().unwrap();
        assert_eq!(ds.text_values("Dose").unwrap()[1].as_deref(), Some("2"));
    }

    #[test]
    fn test_with_column_replaces_in_place() {
        let ds = sample();
        let replaced = ds
            .with_f64_column("Signal", vec![Some(9.0), Some(9.0), Some(9.0)])
            .unwrap();
        assert_eq!(replaced.column_names(), ds.column_names());
        assert_eq!(ds.f64_values("Signal").unwrap()[0], Some(1.0));
        assert_eq!(replaced.f64_values("Signal").unwrap()[0], Some(9.0));
    }

    #[test]
    fn test_concat_schema_union() {
        let a = Dataset::from_columns(vec![
            ("x", ColumnData::Numeric(vec![Some(1.0)])),
            ("y", ColumnData::Numeric(vec![Some(2.0)])),
        ])
        .unwrap();
        let b = Dataset::from_columns(vec![
            ("x", ColumnData::Text(vec![Some("n/a".into())])),
            ("z", ColumnData::Numeric(vec![Some(5.0)])),
        ])
        .unwrap();

        let pooled = Dataset::concat(&[a, Dataset::empty(), b]).unwrap();
        assert_eq!(pooled.num_rows(), 2);
        assert_eq!(pooled.column_names(), vec!["x", "y", "z"]);
        assert!(!pooled.is_numeric("x"));
        assert_eq!(
            pooled.text_values("x").unwrap(),
            vec![Some("1".to_string()), Some("n/a".to_string())]
        );
        assert_eq!(pooled.f64_values("y").unwrap(), vec![Some(2.0), None]);
    }

    #[test]
    fn test_concat_of_nothing_is_empty() {
        assert!(Dataset::concat(&[]).unwrap().is_empty());
    }

    #[test]
    fn test_parse_dose() {
        assert_eq!(parse_dose("2Gy"), Some(2.0));
        assert_eq!(parse_dose(" 0.5 Gy"), Some(0.5));
        assert_eq!(parse_dose("Unknown"), None);
        assert_eq!(parse_dose("NaN"), None);
    }
}
