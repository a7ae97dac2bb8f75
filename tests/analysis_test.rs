//! Integration tests for the statistical building blocks

use statlysis::analysis::{perform_anova, run_tukey, TukeyOutcome};
use statlysis::dataset::{ColumnData, Dataset};
use statlysis::explorer::{fit_competing_models, CurveModel};

fn text(values: &[&str]) -> ColumnData {
    ColumnData::Text(values.iter().map(|s| Some((*s).to_string())).collect())
}

fn numeric(values: &[f64]) -> ColumnData {
    ColumnData::Numeric(values.iter().copied().map(Some).collect())
}

#[test]
fn test_tukey_single_group_is_skipped() {
    let ds = Dataset::from_columns(vec![
        ("NP", text(&["AuNP"; 6])),
        ("y", numeric(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0])),
    ])
    .unwrap();
    let outcome = run_tukey(&ds, "y", "NP").unwrap();
    assert_eq!(
        outcome,
        TukeyOutcome::Skipped("Tukey HSD skipped: only one group in 'NP'".to_string())
    );
}

#[test]
fn test_tukey_three_groups_all_pairs() {
    let ds = Dataset::from_columns(vec![
        ("Dose", text(&["0", "0", "0", "2", "2", "2", "8", "8", "8"])),
        ("y", numeric(&[1.0, 1.2, 0.8, 1.1, 0.9, 1.0, 5.0, 5.2, 4.8])),
    ])
    .unwrap();
    let TukeyOutcome::Completed(result) = run_tukey(&ds, "y", "Dose").unwrap() else {
        panic!("expected a completed comparison");
    };
    let pairs: Vec<(&str, &str)> = result
        .comparisons
        .iter()
        .map(|c| (c.group1.as_str(), c.group2.as_str()))
        .collect();
    assert_eq!(pairs, vec![("0", "2"), ("0", "8"), ("2", "8")]);
    assert!(!result.comparisons[0].reject);
    assert!(result.comparisons[1].reject);
    assert!(result.comparisons[2].reject);
}

#[test]
fn test_anova_eta_squared_bounded() {
    let ds = Dataset::from_columns(vec![
        ("Dose", text(&["1", "1", "1", "2", "2", "2"])),
        ("NP", text(&["a", "b", "a", "b", "a", "b"])),
        ("y", numeric(&[2.0, 2.5, 1.8, 4.1, 3.6, 4.4])),
    ])
    .unwrap();
    let factors = vec!["Dose".to_string(), "NP".to_string()];
    let (_, table) = perform_anova(&ds, "y", &factors).unwrap();
    for row in &table.rows {
        assert!((0.0..=1.0).contains(&row.eta_sq), "{}: {}", row.term, row.eta_sq);
    }
}

#[test]
fn test_non_positive_response_keeps_polynomials_only() {
    let x = [0.0, 1.0, 2.0, 3.0, 4.0, 5.0];
    let y = [-1.0, -2.5, -3.0, -4.2, -5.1, -6.0];
    let ds =
        Dataset::from_columns(vec![("Dose_numeric", numeric(&x)), ("y", numeric(&y))]).unwrap();

    let fits = fit_competing_models(&ds, "Dose_numeric", "y").unwrap();
    let models: Vec<CurveModel> = fits.keys().copied().collect();
    assert_eq!(
        models,
        vec![CurveModel::Linear, CurveModel::Quadratic, CurveModel::Cubic]
    );
}
