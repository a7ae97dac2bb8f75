//! Property-based tests for statlysis
//!
//! - Test preprocessing invariants (outliers, normalization)
//! - Test file-name metadata parsing
//! - Run with ProptestConfig::with_cases(100)

use proptest::prelude::*;
use statlysis::dataset::{ColumnData, Dataset};
use statlysis::loader::{parse_metadata_from_name, UNKNOWN};
use statlysis::preprocess::{apply_normalization, remove_outliers, Normalization};
use statlysis::stats::{mean, std_dev};

// ============================================================================
// Property Test Generators (Strategies)
// ============================================================================

/// Nullable response column (about one value in eight missing)
fn arb_response(max_rows: usize) -> impl Strategy<Value = Vec<Option<f64>>> {
    proptest::collection::vec(
        prop_oneof![7 => (-1000.0f64..1000.0).prop_map(Some), 1 => Just(None)],
        1..max_rows,
    )
}

fn dataset(values: Vec<Option<f64>>) -> Dataset {
    Dataset::from_columns(vec![("y", ColumnData::Numeric(values))]).unwrap()
}

fn present(ds: &Dataset) -> Vec<f64> {
    ds.f64_values("y").unwrap().into_iter().flatten().collect()
}

/// File-name segment without delimiters or dots
fn arb_segment() -> impl Strategy<Value = String> {
    "[A-Za-z0-9]{1,8}"
}

// ============================================================================
// Property Tests
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Property: rows with |z| < threshold survive and the count is exact
    #[test]
    fn prop_outliers_keep_inliers_and_count_drops(
        values in arb_response(60),
        threshold in 0.5f64..4.0
    ) {
        let ds = dataset(values.clone());
        let result = remove_outliers(&ds, "y", threshold).unwrap();
        prop_assert_eq!(result.dataset.num_rows() + result.removed, ds.num_rows());

        let observed: Vec<f64> = values.iter().flatten().copied().collect();
        let kept = result.dataset.f64_values("y").unwrap();
        match (mean(&observed), std_dev(&observed, 0)) {
            (Some(m), Some(sd)) if sd > 0.0 => {
                let expected: Vec<Option<f64>> = values
                    .iter()
                    .copied()
                    .filter(|v| v.map_or(true, |x| ((x - m) / sd).abs() < threshold))
                    .collect();
                prop_assert_eq!(kept, expected);
            }
            _ => prop_assert_eq!(result.removed, 0),
        }
    }

    /// Property: missing responses are never dropped by outlier rejection
    #[test]
    fn prop_outliers_keep_missing(values in arb_response(60)) {
        let missing = values.iter().filter(|v| v.is_none()).count();
        let result = remove_outliers(&dataset(values), "y", 2.0).unwrap();
        let kept_missing = result
            .dataset
            .f64_values("y")
            .unwrap()
            .iter()
            .filter(|v| v.is_none())
            .count();
        prop_assert_eq!(kept_missing, missing);
    }

    /// Property: min-max maps into [0, 1] with min -> 0 and max -> 1
    #[test]
    fn prop_minmax_unit_interval(values in arb_response(60)) {
        let ds = dataset(values.clone());
        let normalized = apply_normalization(&ds, "y", Normalization::Minmax).unwrap();
        let out = normalized.f64_values("y").unwrap();

        for (before, after) in values.iter().zip(&out) {
            prop_assert_eq!(before.is_none(), after.is_none());
        }
        let scaled: Vec<f64> = out.iter().flatten().copied().collect();
        for v in &scaled {
            prop_assert!((0.0..=1.0).contains(v));
        }

        let observed: Vec<f64> = values.iter().flatten().copied().collect();
        if let Some((lo, hi)) = statlysis::stats::min_max(&observed) {
            if hi > lo {
                let lo_at = observed.iter().position(|v| *v == lo).unwrap();
                let hi_at = observed.iter().position(|v| *v == hi).unwrap();
                prop_assert!(scaled[lo_at].abs() < 1e-12);
                prop_assert!((scaled[hi_at] - 1.0).abs() < 1e-12);
            }
        }
    }

    /// Property: z-score output has mean 0 and sample sd 1
    #[test]
    fn prop_zscore_standardizes(
        values in proptest::collection::vec(-1000.0f64..1000.0, 3..60)
    ) {
        prop_assume!(std_dev(&values, 1).unwrap() > 1e-6);
        let ds = dataset(values.into_iter().map(Some).collect());
        let out = present(&apply_normalization(&ds, "y", Normalization::Zscore).unwrap());
        prop_assert!(mean(&out).unwrap().abs() < 1e-9);
        prop_assert!((std_dev(&out, 1).unwrap() - 1.0).abs() < 1e-9);
    }

    /// Property: five or more segments map positionally, with Gy stripped
    #[test]
    fn prop_metadata_positional(
        cell in arb_segment(),
        radiation in arb_segment(),
        np in arb_segment(),
        dose in 0u32..100
    ) {
        let name = format!("Aggregated_{cell}_{radiation}_{np}_{dose}Gy.xlsx");
        let meta = parse_metadata_from_name(&name);
        prop_assert_eq!(meta.cell_line, cell);
        prop_assert_eq!(meta.radiation, radiation);
        prop_assert_eq!(meta.np, np);
        prop_assert_eq!(meta.dose, dose.to_string());
    }

    /// Property: fewer than five segments means every field is Unknown
    #[test]
    fn prop_metadata_short_name_unknown(
        segments in proptest::collection::vec(arb_segment(), 1..5)
    ) {
        let name = format!("{}.xlsx", segments.join("_"));
        let meta = parse_metadata_from_name(&name);
        prop_assert_eq!(meta.values(), [UNKNOWN; 4]);
    }
}
