//! Output files: Parquet snapshot of the filtered events and per-group
//! efficiency tables for the plotting side.

use std::fs::{self, File};
use std::collections::BTreeMap;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use arrow::array::{ArrayRef, BooleanArray, Float64Array, Int64Array, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use parquet::arrow::ArrowWriter;
use serde::Serialize;

use crate::data::cut::CutSet;
use crate::data::efficiency::EfficiencyRecord;
use crate::data::model::{Column, Dataset};

/// `filtered_<col1>_<col2>_….parquet` for the given cut set.
pub fn filtered_file_name(cuts: &CutSet) -> String {
    format!("filtered_{}.parquet", cuts.joined_names())
}

/// Convert a dataset to one Arrow record batch, one field per column.
pub fn to_record_batch(dataset: &Dataset) -> Result<RecordBatch> {
    let mut fields = Vec::new();
    let mut arrays: Vec<ArrayRef> = Vec::new();

    for (name, column) in dataset.columns() {
        let (data_type, array) = match column {
            Column::Float(v) => (
                DataType::Float64,
                Arc::new(Float64Array::from(v.clone())) as ArrayRef,
            ),
            Column::Int(v) => (
                DataType::Int64,
                Arc::new(Int64Array::from(v.clone())) as ArrayRef,
            ),
            Column::Bool(v) => (
                DataType::Boolean,
                Arc::new(BooleanArray::from(v.clone())) as ArrayRef,
            ),
            Column::Str(v) => {
                let values: Vec<&str> = v.iter().map(String::as_str).collect();
                (DataType::Utf8, Arc::new(StringArray::from(values)) as ArrayRef)
            }
        };
        fields.push(Field::new(name, data_type, false));
        arrays.push(array);
    }

    RecordBatch::try_new(Arc::new(Schema::new(fields)), arrays)
        .context("building record batch")
}

/// Write the filtered events to `<dir>/filtered_<cut columns>.parquet`,
/// creating `dir` if needed. Returns the file path.
pub fn save_filtered(filtered: &Dataset, cuts: &CutSet, dir: &Path) -> Result<PathBuf> {
    fs::create_dir_all(dir)
        .with_context(|| format!("creating output directory {}", dir.display()))?;
    let path = dir.join(filtered_file_name(cuts));

    let batch = to_record_batch(filtered)?;
    let file = File::create(&path)
        .with_context(|| format!("creating {}", path.display()))?;
    let mut writer =
        ArrowWriter::try_new(file, batch.schema(), None).context("creating parquet writer")?;
    writer.write(&batch).context("writing parquet batch")?;
    writer.close().context("closing parquet writer")?;

    log::info!("Filtered dataset ({} events) saved to {}", filtered.len(), path.display());
    Ok(path)
}

#[derive(Debug, Serialize)]
struct EfficiencyRow<'a> {
    process: &'a str,
    stage: &'a str,
    efficiency: f64,
    color: Option<&'a str>,
}

/// JSON layout: the record plus the colours of the processes it contains.
#[derive(Debug, Serialize)]
struct EfficiencyFile<'a> {
    group: &'a str,
    colors: BTreeMap<&'a str, &'a str>,
    efficiencies: &'a EfficiencyRecord,
}

/// Write `efficiency_<group>.csv` (long format: process, stage, efficiency,
/// color) and `efficiency_<group>.json` into `dir`. Returns both paths.
///
/// `colors` maps process labels to plotting colours; labels without an entry
/// get an empty `color` cell and no `colors` key.
pub fn write_efficiencies(
    record: &EfficiencyRecord,
    colors: &BTreeMap<String, String>,
    group_name: &str,
    dir: &Path,
) -> Result<(PathBuf, PathBuf)> {
    fs::create_dir_all(dir)
        .with_context(|| format!("creating output directory {}", dir.display()))?;

    let csv_path = dir.join(format!("efficiency_{group_name}.csv"));
    let mut writer = csv::Writer::from_path(&csv_path)
        .with_context(|| format!("creating {}", csv_path.display()))?;
    for (process, series) in record.by_process() {
        let color = colors.get(process).map(String::as_str);
        for (stage, efficiency) in series.iter() {
            writer.serialize(EfficiencyRow {
                process,
                stage,
                efficiency,
                color,
            })?;
        }
    }
    writer
        .flush()
        .with_context(|| format!("writing {}", csv_path.display()))?;

    let json_path = dir.join(format!("efficiency_{group_name}.json"));
    let file = File::create(&json_path)
        .with_context(|| format!("creating {}", json_path.display()))?;
    let contents = EfficiencyFile {
        group: group_name,
        colors: record
            .labels()
            .filter_map(|label| Some((label, colors.get(label)?.as_str())))
            .collect(),
        efficiencies: record,
    };
    let mut json = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut json, &contents)
        .with_context(|| format!("writing {}", json_path.display()))?;
    json.flush()
        .with_context(|| format!("writing {}", json_path.display()))?;

    log::info!("Efficiencies for {group_name} saved to {}", dir.display());
    Ok((csv_path, json_path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::cut::CutGroup;
    use crate::data::efficiency::cumulative_efficiencies;
    use crate::data::model::LABEL_COLUMN;
    use tempfile::TempDir;

    fn record() -> EfficiencyRecord {
        let dataset = Dataset::from_columns([
            (LABEL_COLUMN, Column::from(vec!["sig", "sig", "bkg", "bkg"])),
            ("x", Column::from(vec![1.0, 5.0, 2.0, 9.0])),
        ])
        .unwrap();
        let group = CutGroup::parse(["x < 6", "x < 3"]).unwrap();
        cumulative_efficiencies(&dataset, &group).unwrap()
    }

    #[test]
    fn efficiency_files_carry_process_colors() {
        let dir = TempDir::new().unwrap();
        let colors = BTreeMap::from([
            ("sig".to_string(), "#228B22".to_string()),
            ("elsewhere".to_string(), "#000000".to_string()),
        ]);
        let (csv_path, json_path) =
            write_efficiencies(&record(), &colors, "x_twice", &dir.path().join("eff")).unwrap();

        let csv = fs::read_to_string(&csv_path).unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(
            lines,
            [
                "process,stage,efficiency,color",
                "bkg,1 cut(s),0.5,",
                "bkg,2 cut(s),0.5,",
                "sig,1 cut(s),1.0,#228B22",
                "sig,2 cut(s),0.5,#228B22",
            ]
        );

        let json: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&json_path).unwrap()).unwrap();
        assert_eq!(json["group"], "x_twice");
        assert_eq!(json["colors"], serde_json::json!({ "sig": "#228B22" }));
        assert_eq!(json["efficiencies"]["bkg"]["2 cut(s)"], 0.5);
        assert_eq!(json["efficiencies"]["sig"]["1 cut(s)"], 1.0);
    }
}
