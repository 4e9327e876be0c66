//! Unit tests for SuiteSnapshot

use core_types::{Experiment, SuiteSnapshot, Test};

#[test]
fn test_capture_copies_persisted_fields() {
    let mut experiment = Experiment::default();
    experiment.title = "Sorting".to_string();
    experiment.tests = vec![Test::new("sort", "xs.sort()")];

    let snapshot = SuiteSnapshot::capture(&experiment);
    assert_eq!(snapshot.title, "Sorting");
    assert_eq!(snapshot.baseline, experiment.baseline);
    assert_eq!(snapshot.tests, experiment.tests);
}

#[test]
fn test_snapshot_json_survives_reload() {
    let snapshot = SuiteSnapshot::capture(&Experiment::default());
    let json = serde_json::to_string(&snapshot).unwrap();
    let back: SuiteSnapshot = serde_json::from_str(&json).unwrap();
    assert_eq!(back, snapshot);
}
