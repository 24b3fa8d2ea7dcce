use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use anyhow::{Context, Result, bail};
use arrow::array::{
    Array, ArrayRef, AsArray, BooleanArray, Float32Array, Float64Array, Int32Array, Int64Array,
    StringArray,
};
use arrow::datatypes::DataType;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use rayon::prelude::*;
use serde_json::Value as JsonValue;

use crate::config::Config;

use super::model::{Column, Dataset, LABEL_COLUMN};

/// Columns read from one file, before a label is attached.
pub type ColumnTable = BTreeMap<String, Column>;

// ---------------------------------------------------------------------------
// Public entry-points
// ---------------------------------------------------------------------------

/// Load the columns of a file.  Dispatch by extension.
///
/// Supported formats:
/// * `.parquet` – flat schema of numeric, boolean and string columns (recommended)
/// * `.json`    – `[{ "EVT_NTau23Pi": 2, "EVT_ThrustEmin_E": 31.4, ... }, ...]`
/// * `.csv`     – header row of column names, one event per line
pub fn load_file(path: &Path) -> Result<ColumnTable> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();

    match ext.as_str() {
        "parquet" | "pq" => load_parquet(path),
        "json" => load_json(path),
        "csv" => load_csv(path),
        other => bail!("Unsupported file extension: .{other}"),
    }
}

/// Load a file that already carries a `label` column, e.g. a filtered
/// snapshot written by [`crate::export::save_filtered`].
pub fn load_dataset(path: &Path) -> Result<Dataset> {
    let columns = load_file(path)?;
    Dataset::new(columns).with_context(|| format!("building dataset from {}", path.display()))
}

/// Read `<base_path>/<folder>/<chunk>`, keep the configured branches and tag
/// every row with the folder's process label.
///
/// Branches absent from the file are logged and skipped. Returns `None` when
/// none of them was found. With no `[branches]` configured, every column is
/// kept.
pub fn load_chunk(config: &Config, folder: &str, chunk: &str) -> Result<Option<Dataset>> {
    let path = config.input.base_path.join(folder).join(chunk);
    let mut columns = load_file(&path)?;

    let mut data = if config.branches.is_empty() {
        columns
    } else {
        let mut kept = ColumnTable::new();
        for branch in config.branches.keys() {
            match columns.remove(branch) {
                Some(col) => {
                    kept.insert(branch.clone(), col);
                }
                None => log::warn!("Branch {branch} not found in {}", path.display()),
            }
        }
        kept
    };
    data.remove(LABEL_COLUMN);

    let Some(n_rows) = data.values().next().map(Column::len) else {
        return Ok(None);
    };
    let label = config.process_label(folder);
    data.insert(
        LABEL_COLUMN.to_string(),
        Column::Str(vec![label.to_string(); n_rows]),
    );

    let dataset =
        Dataset::new(data).with_context(|| format!("building dataset from {}", path.display()))?;
    log::debug!("{folder}/{chunk}: {} events as '{label}'", dataset.len());
    Ok(Some(dataset))
}

/// Load every (folder, chunk) pair of `config` on a bounded worker pool.
///
/// Tasks are independent: a chunk that fails to load is logged and dropped
/// without affecting the others. Only failing to set up the pool is an error.
pub fn load_all(config: &Config) -> Result<Vec<Dataset>> {
    let tasks = config.load_tasks();
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(config.threads.unwrap_or(0))
        .build()
        .context("building loader thread pool")?;

    let results: Vec<Option<Dataset>> = pool.install(|| {
        tasks
            .par_iter()
            .map(|(folder, chunk)| match load_chunk(config, folder, chunk) {
                Ok(dataset) => dataset,
                Err(e) => {
                    log::error!("Error loading {folder}/{chunk}: {e:#}");
                    None
                }
            })
            .collect()
    });

    let loaded: Vec<Dataset> = results.into_iter().flatten().collect();
    log::info!("loaded {} of {} chunk(s)", loaded.len(), tasks.len());
    Ok(loaded)
}

/// Concatenate chunk datasets into one. Schemas must agree.
pub fn merge(datasets: Vec<Dataset>) -> Result<Dataset> {
    let mut iter = datasets.into_iter();
    let Some(mut merged) = iter.next() else {
        bail!("no datasets to merge: every chunk failed to load or was empty");
    };
    for dataset in iter {
        merged.append(&dataset)?;
    }
    Ok(merged)
}

/// Events per process label, logged as they are counted.
pub fn count_events(dataset: &Dataset) -> BTreeMap<String, usize> {
    let counts = dataset.label_counts();
    for (label, count) in &counts {
        log::info!("Process {label}: total number of events: {count}");
    }
    log::info!("Total events: {}", dataset.len());
    counts
}

// ---------------------------------------------------------------------------
// JSON loader
// ---------------------------------------------------------------------------

/// Expected JSON schema (records-oriented, the default `df.to_json(orient='records')`):
///
/// ```json
/// [
///   { "EVT_NTau23Pi": 2, "EVT_ThrustEmin_E": 31.4 },
///   { "EVT_NTau23Pi": 0, "EVT_ThrustEmin_E": 45.0 }
/// ]
/// ```
///
/// Columns are the union of the keys of all records; a key missing from a
/// record reads as null there.
fn load_json(path: &Path) -> Result<ColumnTable> {
    let text = std::fs::read_to_string(path).context("reading JSON file")?;
    let root: JsonValue = serde_json::from_str(&text).context("parsing JSON")?;

    let records = root
        .as_array()
        .context("Expected top-level JSON array")?;

    let mut names: BTreeSet<&String> = BTreeSet::new();
    for (i, rec) in records.iter().enumerate() {
        let obj = rec
            .as_object()
            .with_context(|| format!("Row {i} is not a JSON object"))?;
        for key in obj.keys() {
            if names.insert(key) && i > 0 {
                log::debug!("{}: column '{key}' first appears in row {i}", path.display());
            }
        }
    }

    let null = JsonValue::Null;
    let mut cells: Vec<Vec<&JsonValue>> = vec![Vec::with_capacity(records.len()); names.len()];
    for rec in records {
        let Some(obj) = rec.as_object() else { continue };
        for (name, column) in names.iter().zip(cells.iter_mut()) {
            column.push(obj.get(*name).unwrap_or(&null));
        }
    }

    names
        .into_iter()
        .zip(cells)
        .map(|(name, values)| {
            let col = json_column(&values).with_context(|| format!("JSON column '{name}'"))?;
            Ok((name.clone(), col))
        })
        .collect()
}

fn json_column(values: &[&JsonValue]) -> Result<Column> {
    if values.iter().all(|v| v.is_i64()) {
        return Ok(Column::Int(values.iter().filter_map(|v| v.as_i64()).collect()));
    }
    if values.iter().all(|v| v.is_number() || v.is_null()) {
        return Ok(Column::Float(
            values
                .iter()
                .map(|v| v.as_f64().unwrap_or(f64::NAN))
                .collect(),
        ));
    }
    if values.iter().all(|v| v.is_boolean()) {
        return Ok(Column::Bool(values.iter().filter_map(|v| v.as_bool()).collect()));
    }
    if values.iter().all(|v| v.is_string()) {
        return Ok(Column::Str(
            values
                .iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect(),
        ));
    }
    bail!("mixed or nested values are not supported")
}

// ---------------------------------------------------------------------------
// CSV loader
// ---------------------------------------------------------------------------

/// CSV layout: header row with column names, one event per record.
/// Each column's type is guessed from all of its cells.
fn load_csv(path: &Path) -> Result<ColumnTable> {
    let mut reader = csv::Reader::from_path(path).context("opening CSV")?;
    let headers: Vec<String> = reader
        .headers()
        .context("reading CSV headers")?
        .iter()
        .map(|h| h.to_string())
        .collect();

    let mut cells: Vec<Vec<String>> = vec![Vec::new(); headers.len()];
    for (row_no, result) in reader.records().enumerate() {
        let record = result.with_context(|| format!("CSV row {row_no}"))?;
        for (col_idx, column) in cells.iter_mut().enumerate() {
            column.push(record.get(col_idx).unwrap_or("").to_string());
        }
    }

    Ok(headers
        .into_iter()
        .zip(cells)
        .map(|(name, values)| (name, guess_column_type(values)))
        .collect())
}

/// Integer if every cell parses as one, then float (empty cells become NaN),
/// then boolean; anything else stays text.
fn guess_column_type(values: Vec<String>) -> Column {
    if let Ok(ints) = values.iter().map(|s| s.parse::<i64>()).collect::<Result<Vec<_>, _>>() {
        return Column::Int(ints);
    }
    let floats: Option<Vec<f64>> = values
        .iter()
        .map(|s| {
            if s.is_empty() {
                Some(f64::NAN)
            } else {
                s.parse::<f64>().ok()
            }
        })
        .collect();
    if let Some(floats) = floats {
        return Column::Float(floats);
    }
    if values.iter().all(|s| s == "true" || s == "false") {
        return Column::Bool(values.iter().map(|s| s == "true").collect());
    }
    Column::Str(values)
}

// ---------------------------------------------------------------------------
// Parquet loader
// ---------------------------------------------------------------------------

/// Load a flat Parquet file, one column per branch.
///
/// Works with files written by both **Pandas** (`df.to_parquet()`) and
/// **Polars** (`df.write_parquet()`), and with snapshots from
/// [`crate::export::save_filtered`].
fn load_parquet(path: &Path) -> Result<ColumnTable> {
    let file = std::fs::File::open(path).context("opening parquet file")?;
    let builder = ParquetRecordBatchReaderBuilder::try_new(file)
        .context("reading parquet metadata")?;
    let reader = builder.build().context("building parquet reader")?;

    let mut columns = ColumnTable::new();

    for batch_result in reader {
        let batch = batch_result.context("reading parquet record batch")?;
        let schema = batch.schema();

        for (field, array) in schema.fields().iter().zip(batch.columns()) {
            let name = field.name();
            let col = arrow_to_column(array)
                .with_context(|| format!("Parquet column '{name}'"))?;
            match columns.get_mut(name) {
                Some(existing) => {
                    if !existing.extend_from(&col) {
                        bail!("Parquet column '{name}' appears with conflicting types");
                    }
                }
                None => {
                    columns.insert(name.clone(), col);
                }
            }
        }
    }

    Ok(columns)
}

// -- Parquet / Arrow helpers --

/// Convert a whole Arrow array to a [`Column`]. Float nulls read as NaN;
/// nulls in any other type are rejected.
fn arrow_to_column(col: &ArrayRef) -> Result<Column> {
    let data_type = col.data_type();
    if col.null_count() > 0 && !matches!(data_type, DataType::Float32 | DataType::Float64) {
        bail!("{} null value(s) in non-float column", col.null_count());
    }

    let column = match data_type {
        DataType::Float64 => {
            let arr = downcast::<Float64Array>(col)?;
            Column::Float(arr.iter().map(|v| v.unwrap_or(f64::NAN)).collect())
        }
        DataType::Float32 => {
            let arr = downcast::<Float32Array>(col)?;
            Column::Float(arr.iter().map(|v| v.map_or(f64::NAN, f64::from)).collect())
        }
        DataType::Int64 => Column::Int(downcast::<Int64Array>(col)?.values().to_vec()),
        DataType::Int32 => Column::Int(
            downcast::<Int32Array>(col)?
                .values()
                .iter()
                .map(|&v| i64::from(v))
                .collect(),
        ),
        DataType::Boolean => {
            let arr = downcast::<BooleanArray>(col)?;
            Column::Bool((0..arr.len()).map(|i| arr.value(i)).collect())
        }
        DataType::Utf8 => {
            let arr = downcast::<StringArray>(col)?;
            Column::Str((0..arr.len()).map(|i| arr.value(i).to_string()).collect())
        }
        DataType::LargeUtf8 => {
            let arr = col.as_string::<i64>();
            Column::Str((0..arr.len()).map(|i| arr.value(i).to_string()).collect())
        }
        other => bail!("unsupported column type {other:?}"),
    };
    Ok(column)
}

fn downcast<T: Array + 'static>(col: &ArrayRef) -> Result<&T> {
    col.as_any()
        .downcast_ref::<T>()
        .with_context(|| format!("expected {}", std::any::type_name::<T>()))
}
