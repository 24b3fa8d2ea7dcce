use std::collections::BTreeMap;
use std::iter;

use serde::ser::{Serialize, SerializeMap, Serializer};

use crate::error::CutResult;

use super::cut::{stage_label, CutGroup};
use super::filter::cut_mask;
use super::model::Dataset;

/// Fraction of events surviving: `after / before`, or `0` when nothing was
/// there to begin with.
///
/// Every efficiency and percentage in the crate goes through here.
pub fn efficiency(before: usize, after: usize) -> f64 {
    if before == 0 {
        return 0.0;
    }
    after as f64 / before as f64
}

// ---------------------------------------------------------------------------
// Efficiency record
// ---------------------------------------------------------------------------

/// Cumulative efficiencies of one process, in stage order
/// (`"1 cut(s)"`, `"2 cut(s)"`, …).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StageEfficiencies(Vec<(String, f64)>);

impl StageEfficiencies {
    pub fn get(&self, stage: &str) -> Option<f64> {
        self.0
            .iter()
            .find(|(name, _)| name == stage)
            .map(|&(_, eff)| eff)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.0.iter().map(|(name, eff)| (name.as_str(), *eff))
    }

    pub fn values(&self) -> impl Iterator<Item = f64> + '_ {
        self.0.iter().map(|&(_, eff)| eff)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

// Serialised as a JSON object that keeps stage order.
impl Serialize for StageEfficiencies {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (stage, eff) in &self.0 {
            map.serialize_entry(stage, eff)?;
        }
        map.end()
    }
}

/// process label → cumulative efficiency per stage.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize)]
#[serde(transparent)]
pub struct EfficiencyRecord(BTreeMap<String, StageEfficiencies>);

impl EfficiencyRecord {
    pub fn get(&self, label: &str) -> Option<&StageEfficiencies> {
        self.0.get(label)
    }

    /// Native layout: one series per process.
    pub fn by_process(&self) -> &BTreeMap<String, StageEfficiencies> {
        &self.0
    }

    /// Transposed layout: one `(stage, label → efficiency)` entry per stage,
    /// in stage order.
    pub fn by_stage(&self) -> Vec<(String, BTreeMap<String, f64>)> {
        let mut stages: Vec<(String, BTreeMap<String, f64>)> = Vec::new();
        for (label, series) in &self.0 {
            for (i, (stage, eff)) in series.iter().enumerate() {
                if stages.len() <= i {
                    stages.push((stage.to_string(), BTreeMap::new()));
                }
                stages[i].1.insert(label.clone(), eff);
            }
        }
        stages
    }

    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Cumulative computation
// ---------------------------------------------------------------------------

/// Per-process efficiency after stage 1, stages 1+2, … of `group`.
///
/// Each process is isolated first; every stage then narrows the survivors of
/// the previous one, and the survivor count is divided by the process's
/// original count. A process with no events reports 0 at every stage.
pub fn cumulative_efficiencies(dataset: &Dataset, group: &CutGroup) -> CutResult<EfficiencyRecord> {
    let mut record = BTreeMap::new();

    for label in dataset.unique_labels() {
        let mut passed = dataset.filter(&dataset.label_mask(label))?;
        let total = passed.len();
        let mut series = Vec::with_capacity(group.len());

        for (k, stage) in group.stages().iter().enumerate() {
            let mask = cut_mask(&passed, iter::once((stage.column.as_str(), &stage.predicate)))?;
            passed = passed.filter(&mask)?;
            series.push((stage_label(k + 1), efficiency(total, passed.len())));
        }

        log::debug!("{label}: {total} events, efficiencies {series:?}");
        record.insert(label.to_string(), StageEfficiencies(series));
    }

    log::info!(
        "cumulative efficiencies computed for {} process(es) over {} stage(s)",
        record.len(),
        group.len()
    );
    Ok(EfficiencyRecord(record))
}
