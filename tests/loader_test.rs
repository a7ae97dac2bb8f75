//! Folder loading tests (no real workbooks needed)

use statlysis::loader::{is_aggregated_file_name, load_all_aggregated_files};
use statlysis::Error;

#[test]
fn test_empty_folder_gives_empty_dataset() {
    let dir = tempfile::tempdir().unwrap();
    let report = load_all_aggregated_files(dir.path()).unwrap();
    assert!(report.dataset.is_empty());
    assert!(report.loaded.is_empty());
    assert!(report.failures.is_empty());
}

#[test]
fn test_non_matching_files_ignored() {
    let dir = tempfile::tempdir().unwrap();
    for name in ["notes.txt", "Summary_A549.xlsx", "Aggregated_A549_X_Au_2Gy.csv"] {
        std::fs::write(dir.path().join(name), b"not a workbook").unwrap();
    }
    std::fs::create_dir(dir.path().join("Aggregated_dir.xlsx")).unwrap();

    let report = load_all_aggregated_files(dir.path()).unwrap();
    assert!(report.dataset.is_empty());
    assert!(report.failures.is_empty());
}

#[test]
fn test_corrupt_workbook_reported_not_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let bad = dir.path().join("Aggregated_A549_Xray_AuNP_2Gy.xlsx");
    std::fs::write(&bad, b"garbage bytes").unwrap();
    std::fs::write(dir.path().join("readme.md"), b"# data").unwrap();

    let report = load_all_aggregated_files(dir.path()).unwrap();
    assert!(report.dataset.is_empty());
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].path, bad);
    assert!(!report.failures[0].reason.is_empty());
}

#[test]
fn test_missing_folder_is_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let result = load_all_aggregated_files(dir.path().join("absent"));
    assert!(matches!(result, Err(Error::Io(_))));
}

#[test]
fn test_file_name_pattern() {
    assert!(is_aggregated_file_name("Aggregated_A549_Xray_AuNP_2Gy.xlsx"));
    assert!(is_aggregated_file_name("Aggregated_short.xlsx"));
    assert!(!is_aggregated_file_name("aggregated_A549.xlsx"));
    assert!(!is_aggregated_file_name("Aggregated_A549.xls"));
}
