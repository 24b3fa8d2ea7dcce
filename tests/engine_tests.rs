use std::collections::BTreeMap;
use std::fs;

use cutflow::report::write_cut_report;
use cutflow::{
    apply_cuts, cumulative_efficiencies, efficiency, Column, CutError, CutGroup, CutSet, Dataset,
    Predicate, LABEL_COLUMN,
};
use tempfile::TempDir;

fn three_events() -> Dataset {
    Dataset::from_columns([
        (LABEL_COLUMN, Column::from(vec!["sig", "sig", "bkg"])),
        ("x", Column::from(vec![1_i64, 5, 10])),
    ])
    .unwrap()
}

#[test]
fn test_single_cut_set_scenario() {
    let cuts = CutSet::new().with("x", Predicate::parse("< 6").unwrap()).unwrap();
    let filtered = apply_cuts(&three_events(), &cuts).unwrap();
    assert_eq!(filtered.column("x").unwrap(), &Column::Int(vec![1, 5]));
    assert_eq!(filtered.labels(), &["sig", "sig"]);

    let cuts = cuts.with("x2", Predicate::parse(">= 0").unwrap()).unwrap();
    assert_eq!(
        apply_cuts(&three_events(), &cuts).unwrap_err(),
        CutError::MissingColumn { column: "x2".into() }
    );
}

#[test]
fn test_custom_closure_predicate() {
    let even = Predicate::new("is even", |col: &Column| match col {
        Column::Int(v) => Ok(v.iter().map(|i| i % 2 == 0).collect()),
        other => Err(CutError::ColumnType {
            column: String::new(),
            expected: "int",
            found: other.type_name(),
        }),
    });
    let cuts = CutSet::new().with("x", even).unwrap();
    let filtered = apply_cuts(&three_events(), &cuts).unwrap();
    assert_eq!(filtered.labels(), &["bkg"]);
}

#[test]
fn test_cumulative_scenario() {
    let stage1: Vec<i64> = vec![1, 1, 1, 1, 1, 1, 1, 1, 0, 0];
    let stage2: Vec<f64> = vec![0.1, 0.2, 0.3, 0.4, 0.5, 9.0, 9.0, 9.0, 0.1, 0.1];
    let dataset = Dataset::from_columns([
        (LABEL_COLUMN, Column::from(vec!["sig"; 10])),
        ("a", Column::from(stage1)),
        ("b", Column::from(stage2)),
    ])
    .unwrap();

    let group = CutGroup::parse(["a == 1", "b < 1"]).unwrap();
    let record = cumulative_efficiencies(&dataset, &group).unwrap();
    let sig = record.get("sig").unwrap();
    let series: Vec<(&str, f64)> = sig.iter().collect();
    assert_eq!(series, [("1 cut(s)", 0.8), ("2 cut(s)", 0.5)]);
}

#[test]
fn test_zero_before_reports_zero_percent() {
    let dir = TempDir::new().unwrap();
    let cuts = CutSet::from_conditions([("x", "< 6")]).unwrap();
    let filtered = apply_cuts(&three_events(), &cuts).unwrap();
    let pre = BTreeMap::from([
        ("sig".to_string(), 2),
        ("bkg".to_string(), 1),
        ("ghost".to_string(), 0),
    ]);

    let report_dir = dir.path().join("nested/reports");
    let (path, post) = write_cut_report(&cuts, &pre, &filtered, &report_dir, "cut_report").unwrap();
    assert_eq!(path, report_dir.join("cut_report_x.txt"));
    assert_eq!(post.get("ghost"), Some(&0));
    assert_eq!(post.get("bkg"), Some(&0));
    assert_eq!(post.get("sig"), Some(&2));

    let text = fs::read_to_string(&path).unwrap();
    let ghost = text.lines().find(|l| l.starts_with("ghost")).unwrap();
    assert!(ghost.ends_with("0.00"));
    assert_eq!(efficiency(0, 5), 0.0);
}
