//! Plain-text cut report and efficiency summaries.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::data::cut::CutSet;
use crate::data::efficiency::efficiency;
use crate::data::model::Dataset;

const RULE_WIDTH: usize = 90;

/// Survivors per label, for every label of `pre_cut_counts`. Labels with no
/// surviving events get 0.
pub fn post_cut_counts(
    pre_cut_counts: &BTreeMap<String, usize>,
    filtered: &Dataset,
) -> BTreeMap<String, usize> {
    let survivors = filtered.label_counts();
    pre_cut_counts
        .keys()
        .map(|label| (label.clone(), survivors.get(label).copied().unwrap_or(0)))
        .collect()
}

/// Render the report text.
pub fn render_cut_report(
    cuts: &CutSet,
    pre_cut_counts: &BTreeMap<String, usize>,
    post_cut_counts: &BTreeMap<String, usize>,
) -> String {
    let mut out = String::new();
    out.push_str("==== Cut Report====\n\n");
    out.push_str("Applied cuts:\n");
    for (column, predicate) in cuts.iter() {
        out.push_str(&format!(" - {column}: {}\n", predicate.description()));
    }
    out.push_str(&format!(
        "{:<50}{:>10}{:>10}{:>15}\n",
        "Process", "Before", "After", "Efficiency[%]"
    ));
    out.push_str(&"-".repeat(RULE_WIDTH));
    out.push('\n');

    for (label, &before) in pre_cut_counts {
        let after = post_cut_counts.get(label).copied().unwrap_or(0);
        let eff = 100.0 * efficiency(before, after);
        out.push_str(&format!("{label:<50}{before:>10}{after:>10}{eff:>15.2}\n"));
    }

    out.push_str("\nReport generated by cutflow\n");
    out
}

/// Write `<report_dir>/<base_name>_<cut columns>.txt`, overwriting any
/// previous report, and return the post-cut counts per label.
pub fn write_cut_report(
    cuts: &CutSet,
    pre_cut_counts: &BTreeMap<String, usize>,
    filtered: &Dataset,
    report_dir: &Path,
    base_name: &str,
) -> Result<(PathBuf, BTreeMap<String, usize>)> {
    fs::create_dir_all(report_dir)
        .with_context(|| format!("creating report directory {}", report_dir.display()))?;
    let path = report_dir.join(format!("{base_name}_{}.txt", cuts.joined_names()));

    let post = post_cut_counts(pre_cut_counts, filtered);
    let text = render_cut_report(cuts, pre_cut_counts, &post);
    fs::write(&path, text).with_context(|| format!("writing report {}", path.display()))?;

    log::info!("Cut report saved to {}", path.display());
    Ok((path, post))
}

/// Log post-cut totals and the surviving percentage of each process.
pub fn log_efficiencies(pre_cut_counts: &BTreeMap<String, usize>, filtered: &Dataset) {
    log::info!("After cuts: total events: {}", filtered.len());
    for (label, after) in filtered.label_counts() {
        let before = pre_cut_counts.get(&label).copied().unwrap_or(0);
        let percent = 100.0 * efficiency(before, after);
        log::info!("Process: {label}; total number of events: {after} ({percent:.2}%)");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::model::{Column, LABEL_COLUMN};

    #[test]
    fn layout_is_fixed_width() {
        let cuts = CutSet::from_conditions([("x", "< 6"), ("n", ">= 2")]).unwrap();
        let pre = BTreeMap::from([("bkg".to_string(), 4), ("sig".to_string(), 0)]);
        let post = BTreeMap::from([("bkg".to_string(), 1)]);
        let text = render_cut_report(&cuts, &pre, &post);
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines[0], "==== Cut Report====");
        assert_eq!(lines[1], "");
        assert_eq!(lines[2], "Applied cuts:");
        assert_eq!(lines[3], " - n: >= 2");
        assert_eq!(lines[4], " - x: < 6");
        assert_eq!(lines[5].len(), 85);
        assert!(lines[5].starts_with("Process "));
        assert!(lines[5].ends_with("Before     After  Efficiency[%]"));
        assert_eq!(lines[6], "-".repeat(90));
        assert_eq!(
            lines[7],
            format!("{:<50}{:>10}{:>10}{:>15}", "bkg", 4, 1, "25.00")
        );
        // no events before the cuts → 0%, not a division error
        assert_eq!(
            lines[8],
            format!("{:<50}{:>10}{:>10}{:>15}", "sig", 0, 0, "0.00")
        );
        assert_eq!(lines[9], "");
        assert_eq!(lines[10], "Report generated by cutflow");
    }

    #[test]
    fn post_counts_include_vanished_labels() {
        let filtered = Dataset::from_columns([
            (LABEL_COLUMN, Column::from(vec!["sig", "sig"])),
            ("x", Column::from(vec![1.0, 5.0])),
        ])
        .unwrap();
        let pre = BTreeMap::from([("sig".to_string(), 2), ("bkg".to_string(), 1)]);
        let post = post_cut_counts(&pre, &filtered);
        assert_eq!(post.get("sig"), Some(&2));
        assert_eq!(post.get("bkg"), Some(&0));
    }
}
