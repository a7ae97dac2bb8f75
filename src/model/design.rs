//! Design matrix construction (treatment coding)
//!
//! - Numeric operand: one column with the raw values
//! - Categorical operand: one indicator per level except the first (the
//!   reference level); levels are sorted (numerically for numeric columns)
//! - Interaction: element-wise products of the operands' coded columns
//!
//! Rows with a missing value in any referenced column are dropped.

use super::{CodedOperand, Formula, Operand, Term};
use crate::dataset::Dataset;
use crate::{Error, Result};
use nalgebra::{DMatrix, DVector};
use rustc_hash::FxHashMap;

/// One column of the design matrix
#[derive(Debug, Clone, PartialEq)]
pub struct DesignColumn {
    /// Index of the owning term in [`Formula::terms`]
    pub term: usize,
    /// Coded operands (empty for the intercept)
    pub operands: Vec<CodedOperand>,
}

impl DesignColumn {
    /// Display label, e.g. `Dose_numeric:C(NP)[T.AuNP]`
    #[must_use]
    pub fn label(&self) -> String {
        if self.operands.is_empty() {
            return "Intercept".to_string();
        }
        self.operands
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(":")
    }
}

/// Model matrix, response vector and column metadata
#[derive(Debug, Clone)]
pub struct Design {
    /// Formula the design was built from
    pub formula: Formula,
    /// `n x p` model matrix
    pub x: DMatrix<f64>,
    /// Response vector (length `n`)
    pub y: DVector<f64>,
    /// Column metadata, parallel to the columns of `x`
    pub columns: Vec<DesignColumn>,
    /// Sorted levels for every categorical operand
    pub levels: FxHashMap<String, Vec<String>>,
}

/// Values of one operand over the kept rows
enum OperandValues {
    Numeric(Vec<f64>),
    Categorical(Vec<String>),
}

impl Design {
    /// Build the design for `formula` over `dataset`
    ///
    /// # Errors
    /// Returns error if:
    /// - The response or a numeric operand is absent or not numeric
    /// - A categorical operand column is absent
    /// - No complete rows remain
    pub fn build(dataset: &Dataset, formula: &Formula) -> Result<Self> {
        let response = dataset.f64_values(formula.response())?;

        let mut operands: Vec<&Operand> = Vec::new();
        for term in formula.terms() {
            for op in term.operands() {
                if !operands.contains(&op) {
                    operands.push(op);
                }
            }
        }

        let mut numeric_raw: FxHashMap<&str, Vec<Option<f64>>> = FxHashMap::default();
        let mut text_raw: FxHashMap<&str, Vec<Option<String>>> = FxHashMap::default();
        for op in &operands {
            match op {
                Operand::Numeric(name) => {
                    numeric_raw.insert(name, dataset.f64_values(name)?);
                }
                Operand::Categorical(name) => {
                    text_raw.insert(name, dataset.text_values(name)?);
                }
            }
        }

        let rows: Vec<usize> = (0..dataset.num_rows())
            .filter(|&i| {
                response[i].is_some()
                    && numeric_raw.values().all(|col| col[i].is_some())
                    && text_raw.values().all(|col| col[i].is_some())
            })
            .collect();
        if rows.is_empty() {
            return Err(Error::InsufficientData(format!(
                "No complete rows for {formula}"
            )));
        }

        let mut values: FxHashMap<&str, OperandValues> = FxHashMap::default();
        let mut levels: FxHashMap<String, Vec<String>> = FxHashMap::default();
        for (name, col) in &numeric_raw {
            let v = rows.iter().filter_map(|&i| col[i]).collect();
            values.insert(name, OperandValues::Numeric(v));
        }
        for (name, col) in &text_raw {
            let v: Vec<String> = rows.iter().filter_map(|&i| col[i].clone()).collect();
            levels.insert((*name).to_string(), sorted_levels(&v));
            values.insert(name, OperandValues::Categorical(v));
        }

        let n = rows.len();
        let mut data: Vec<Vec<f64>> = Vec::new();
        let mut columns = Vec::new();

        for (term_index, term) in formula.terms().iter().enumerate() {
            if matches!(term, Term::Intercept) {
                data.push(vec![1.0; n]);
                columns.push(DesignColumn {
                    term: term_index,
                    operands: Vec::new(),
                });
                continue;
            }

            // Cartesian product of the operands' coded columns
            let mut partial: Vec<(Vec<CodedOperand>, Vec<f64>)> = vec![(Vec::new(), vec![1.0; n])];
            for op in term.operands() {
                let coded = Self::code_operand(op, &values, &levels)?;
                let mut next = Vec::with_capacity(partial.len() * coded.len());
                for (labels, base) in &partial {
                    for (coded_op, column) in &coded {
                        let mut labels = labels.clone();
                        labels.push(coded_op.clone());
                        let product = base.iter().zip(column).map(|(a, b)| a * b).collect();
                        next.push((labels, product));
                    }
                }
                partial = next;
            }

            for (coded, column) in partial {
                data.push(column);
                columns.push(DesignColumn {
                    term: term_index,
                    operands: coded,
                });
            }
        }

        let x = DMatrix::from_fn(n, data.len(), |r, c| data[c][r]);
        let y = DVector::from_iterator(n, rows.iter().filter_map(|&i| response[i]));

        Ok(Self {
            formula: formula.clone(),
            x,
            y,
            columns,
            levels,
        })
    }

    fn code_operand(
        op: &Operand,
        values: &FxHashMap<&str, OperandValues>,
        levels: &FxHashMap<String, Vec<String>>,
    ) -> Result<Vec<(CodedOperand, Vec<f64>)>> {
        let missing = || Error::Other(format!("Operand {op} was not materialised"));
        match (op, values.get(op.name()).ok_or_else(missing)?) {
            (Operand::Numeric(_), OperandValues::Numeric(v)) => Ok(vec![(
                CodedOperand {
                    operand: op.clone(),
                    level: None,
                },
                v.clone(),
            )]),
            (Operand::Categorical(name), OperandValues::Categorical(v)) => {
                let levels = levels.get(name).ok_or_else(missing)?;
                Ok(levels
                    .iter()
                    .skip(1)
                    .map(|level| {
                        let indicator = v
                            .iter()
                            .map(|value| if value == level { 1.0 } else { 0.0 })
                            .collect();
                        (
                            CodedOperand {
                                operand: op.clone(),
                                level: Some(level.clone()),
                            },
                            indicator,
                        )
                    })
                    .collect())
            }
            _ => Err(Error::InvalidInput(format!(
                "Column '{}' is used both as numeric and categorical",
                op.name()
            ))),
        }
    }

    /// Number of complete observations
    #[must_use]
    pub fn n_obs(&self) -> usize {
        self.x.nrows()
    }

    /// Column indices belonging to the given term indices
    #[must_use]
    pub fn columns_for_terms(&self, terms: &[usize]) -> Vec<usize> {
        self.columns
            .iter()
            .enumerate()
            .filter(|(_, c)| terms.contains(&c.term))
            .map(|(i, _)| i)
            .collect()
    }

    /// Sorted levels of a categorical operand
    #[must_use]
    pub fn levels_of(&self, name: &str) -> Option<&[String]> {
        self.levels.get(name).map(Vec::as_slice)
    }
}

/// Sorted distinct levels; by value when every level parses as a number
pub(crate) fn sorted_levels(values: &[String]) -> Vec<String> {
    let mut levels: Vec<String> = values.to_vec();
    levels.sort();
    levels.dedup();
    let keys: Option<Vec<f64>> = levels.iter().map(|l| l.trim().parse::<f64>().ok()).collect();
    if let Some(keys) = keys {
        let mut keyed: Vec<(f64, String)> = keys.into_iter().zip(levels).collect();
        keyed.sort_by(|(a, _), (b, _)| a.total_cmp(b));
        levels = keyed.into_iter().map(|(_, l)| l).collect();
    }
    levels
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::ColumnData;

    fn dataset() -> Dataset {
        Dataset::from_columns(vec![
            (
                "y",
                ColumnData::Numeric(vec![Some(1.0), Some(2.0), Some(3.0), None, Some(5.0)]),
            ),
            (
                "x",
                ColumnData::Numeric(vec![Some(0.0), Some(1.0), Some(2.0), Some(3.0), Some(4.0)]),
            ),
            (
                "g",
                ColumnData::Text(vec![
                    Some("b".into()),
                    Some("a".into()),
                    Some("b".into()),
                    Some("a".into()),
                    Some("c".into()),
                ]),
            ),
        ])
        .unwrap()
    }

    #[test]
    fn test_listwise_deletion_and_shape() {
        let design = Design::build(&dataset(), &Formula::moderated("y", "x", "g")).unwrap();
        assert_eq!(design.n_obs(), 4);
        // Intercept, x, g[T.b], g[T.c], x:g[T.b], x:g[T.c]
        assert_eq!(design.x.ncols(), 6);
        let labels: Vec<String> = design.columns.iter().map(DesignColumn::label).collect();
        assert_eq!(
            labels,
            vec![
                "Intercept",
                "x",
                "C(g)[T.b]",
                "C(g)[T.c]",
                "x:C(g)[T.b]",
                "x:C(g)[T.c]"
            ]
        );
    }

    #[test]
    fn test_interaction_is_product() {
        let design = Design::build(&dataset(), &Formula::moderated("y", "x", "g")).unwrap();
        // Row 2 (x = 2, g = b) survives as design row 2
        assert!((design.x[(2, 4)] - 2.0).abs() < f64::EPSILON);
        assert!(design.x[(2, 5)].abs() < f64::EPSILON);
    }

    #[test]
    fn test_numeric_levels_sort_by_value() {
        let levels = sorted_levels(&["10".into(), "2".into(), "2".into(), "0.5".into()]);
        assert_eq!(levels, vec!["0.5", "2", "10"]);
    }

    #[test]
    fn test_mixed_levels_sort_as_text() {
        let levels = sorted_levels(&["b".into(), "10".into(), "2".into(), "a".into()]);
        assert_eq!(levels, vec!["10", "2", "a", "b"]);
    }

    #[test]
    fn test_text_dose_column_reference_is_lowest_dose() {
        let dose = ["2", "10", "2", "10", "4"].map(|s| Some(s.to_string()));
        let ds = Dataset::from_columns(vec![
            ("Dose", ColumnData::Text(dose.to_vec())),
            ("y", ColumnData::Numeric(vec![Some(1.0); 5])),
        ])
        .unwrap();
        let formula = Formula::factorial("y", &["Dose".to_string()]);
        let design = Design::build(&ds, &formula).unwrap();
        assert_eq!(design.levels_of("Dose").unwrap(), ["2", "4", "10"]);
    }

    #[test]
    fn test_missing_response_column() {
        let err = Design::build(&dataset(), &Formula::new("nope")).unwrap_err();
        assert!(matches!(err, Error::ColumnNotFound(_)));
    }
}
