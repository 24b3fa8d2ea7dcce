//! The full selection run: load, cut, report, export.

use std::collections::BTreeMap;
use std::path::PathBuf;

use anyhow::{Context, Result};

use crate::config::Config;
use crate::data::cut::{CutGroup, CutSet};
use crate::data::efficiency::{cumulative_efficiencies, EfficiencyRecord};
use crate::data::filter::apply_cuts;
use crate::data::loader;
use crate::data::model::Dataset;
use crate::export;
use crate::report;

/// What a run produced.
#[derive(Debug)]
pub struct RunSummary {
    pub pre_cut_counts: BTreeMap<String, usize>,
    pub post_cut_counts: BTreeMap<String, usize>,
    pub report_path: PathBuf,
    /// `None` when the Parquet export was skipped.
    pub snapshot_path: Option<PathBuf>,
    /// Cut group name → cumulative efficiencies.
    pub efficiencies: BTreeMap<String, EfficiencyRecord>,
}

/// Load every chunk named by `config` and run the selection on the merged
/// events.
pub fn run(config: &Config, export_snapshot: bool) -> Result<RunSummary> {
    // Parse cuts before spending time on I/O.
    let cuts = config.cut_set().context("parsing [cuts]")?;
    let groups = config.cut_groups().context("parsing [cut_groups]")?;

    let merged = loader::merge(loader::load_all(config)?)?;
    run_on(config, &merged, &cuts, &groups, export_snapshot)
}

/// Run the selection on an already merged dataset.
pub fn run_on(
    config: &Config,
    merged: &Dataset,
    cuts: &CutSet,
    groups: &[(String, CutGroup)],
    export_snapshot: bool,
) -> Result<RunSummary> {
    let pre_cut_counts = loader::count_events(merged);

    let filtered = apply_cuts(merged, cuts)?;
    let snapshot_path = if export_snapshot {
        Some(export::save_filtered(&filtered, cuts, &config.output.filtered_dir)?)
    } else {
        None
    };

    report::log_efficiencies(&pre_cut_counts, &filtered);
    let (report_path, post_cut_counts) = report::write_cut_report(
        cuts,
        &pre_cut_counts,
        &filtered,
        &config.output.report_dir,
        &config.output.report_base_name,
    )?;

    let colors = config.process_colors();
    let mut efficiencies = BTreeMap::new();
    for (name, group) in groups {
        let record = cumulative_efficiencies(merged, group)
            .with_context(|| format!("cut group {name}"))?;
        export::write_efficiencies(&record, &colors, name, &config.output.efficiency_dir)?;
        efficiencies.insert(name.clone(), record);
    }

    Ok(RunSummary {
        pre_cut_counts,
        post_cut_counts,
        report_path,
        snapshot_path,
        efficiencies,
    })
}
