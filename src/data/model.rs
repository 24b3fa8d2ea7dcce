use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use crate::error::{CutError, CutResult};

/// Name of the reserved column holding each event's process identity.
pub const LABEL_COLUMN: &str = "label";

/// A row mask: `true` keeps the row.
pub type Mask = Vec<bool>;

// ---------------------------------------------------------------------------
// Column – one typed, full-length sequence of values
// ---------------------------------------------------------------------------

/// A dynamically-typed column mirroring the dtypes found in event files.
#[derive(Debug, Clone, PartialEq)]
pub enum Column {
    Float(Vec<f64>),
    Int(Vec<i64>),
    Bool(Vec<bool>),
    Str(Vec<String>),
}

impl Column {
    pub fn len(&self) -> usize {
        match self {
            Column::Float(v) => v.len(),
            Column::Int(v) => v.len(),
            Column::Bool(v) => v.len(),
            Column::Str(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Short dtype name used in error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Column::Float(_) => "float",
            Column::Int(_) => "int",
            Column::Bool(_) => "bool",
            Column::Str(_) => "string",
        }
    }

    /// Numeric view of the column; integers are widened to `f64`.
    pub fn as_f64(&self) -> Option<Vec<f64>> {
        match self {
            Column::Float(v) => Some(v.clone()),
            Column::Int(v) => Some(v.iter().map(|&i| i as f64).collect()),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&[String]> {
        match self {
            Column::Str(v) => Some(v),
            _ => None,
        }
    }

    /// Keep only the rows where `mask` is set. The caller guarantees
    /// `mask.len() == self.len()`.
    pub fn take(&self, mask: &[bool]) -> Column {
        fn pick<T: Clone>(values: &[T], mask: &[bool]) -> Vec<T> {
            values
                .iter()
                .zip(mask)
                .filter(|(_, keep)| **keep)
                .map(|(v, _)| v.clone())
                .collect()
        }
        match self {
            Column::Float(v) => Column::Float(pick(v, mask)),
            Column::Int(v) => Column::Int(pick(v, mask)),
            Column::Bool(v) => Column::Bool(pick(v, mask)),
            Column::Str(v) => Column::Str(pick(v, mask)),
        }
    }

    /// Append `other` to `self`; both must share the same dtype.
    pub fn extend_from(&mut self, other: &Column) -> bool {
        match (self, other) {
            (Column::Float(a), Column::Float(b)) => a.extend_from_slice(b),
            (Column::Int(a), Column::Int(b)) => a.extend_from_slice(b),
            (Column::Bool(a), Column::Bool(b)) => a.extend_from_slice(b),
            (Column::Str(a), Column::Str(b)) => a.extend_from_slice(b),
            _ => return false,
        }
        true
    }
}

impl fmt::Display for Column {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}]", self.type_name(), self.len())
    }
}

impl From<Vec<f64>> for Column {
    fn from(v: Vec<f64>) -> Self {
        Column::Float(v)
    }
}

impl From<Vec<i64>> for Column {
    fn from(v: Vec<i64>) -> Self {
        Column::Int(v)
    }
}

impl From<Vec<bool>> for Column {
    fn from(v: Vec<bool>) -> Self {
        Column::Bool(v)
    }
}

impl From<Vec<String>> for Column {
    fn from(v: Vec<String>) -> Self {
        Column::Str(v)
    }
}

impl From<Vec<&str>> for Column {
    fn from(v: Vec<&str>) -> Self {
        Column::Str(v.into_iter().map(str::to_string).collect())
    }
}

// ---------------------------------------------------------------------------
// Dataset – the in-memory event table
// ---------------------------------------------------------------------------

/// Column store of simulated events: column_name → equal-length column.
///
/// Always carries a string [`LABEL_COLUMN`]. Datasets are never mutated by
/// the cut engine; filtering returns a fresh value.
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    columns: BTreeMap<String, Column>,
    n_rows: usize,
}

impl Dataset {
    /// Build a dataset, checking the label column and the row-count invariant.
    pub fn new(columns: BTreeMap<String, Column>) -> CutResult<Self> {
        let labels = columns
            .get(LABEL_COLUMN)
            .ok_or_else(|| CutError::MissingLabel {
                column: LABEL_COLUMN.to_string(),
            })?;
        if labels.as_str().is_none() {
            return Err(CutError::MissingLabel {
                column: LABEL_COLUMN.to_string(),
            });
        }
        let n_rows = labels.len();
        for (name, col) in &columns {
            if col.len() != n_rows {
                return Err(CutError::RowCountMismatch {
                    column: name.clone(),
                    expected: n_rows,
                    found: col.len(),
                });
            }
        }
        Ok(Dataset { columns, n_rows })
    }

    /// Convenience constructor from `(name, column)` pairs.
    pub fn from_columns<I, S>(columns: I) -> CutResult<Self>
    where
        I: IntoIterator<Item = (S, Column)>,
        S: Into<String>,
    {
        Dataset::new(columns.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    /// Number of events.
    pub fn len(&self) -> usize {
        self.n_rows
    }

    pub fn is_empty(&self) -> bool {
        self.n_rows == 0
    }

    pub fn column(&self, name: &str) -> CutResult<&Column> {
        self.columns.get(name).ok_or_else(|| CutError::MissingColumn {
            column: name.to_string(),
        })
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.contains_key(name)
    }

    /// Column names in sorted order (includes `label`).
    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.keys().map(String::as_str)
    }

    pub fn columns(&self) -> &BTreeMap<String, Column> {
        &self.columns
    }

    /// Process label of every row.
    pub fn labels(&self) -> &[String] {
        // Presence and dtype are checked in `new`.
        self.columns
            .get(LABEL_COLUMN)
            .and_then(Column::as_str)
            .unwrap_or(&[])
    }

    /// Distinct process labels, sorted.
    pub fn unique_labels(&self) -> BTreeSet<&str> {
        self.labels().iter().map(String::as_str).collect()
    }

    /// Number of events per process label.
    pub fn label_counts(&self) -> BTreeMap<String, usize> {
        let mut counts = BTreeMap::new();
        for label in self.labels() {
            *counts.entry(label.clone()).or_insert(0) += 1;
        }
        counts
    }

    /// Mask selecting the rows of one process.
    pub fn label_mask(&self, label: &str) -> Mask {
        self.labels().iter().map(|l| l == label).collect()
    }

    /// New dataset holding, for every column, only the rows where `mask` is set.
    pub fn filter(&self, mask: &[bool]) -> CutResult<Dataset> {
        if mask.len() != self.n_rows {
            return Err(CutError::MaskLength {
                column: LABEL_COLUMN.to_string(),
                expected: self.n_rows,
                found: mask.len(),
            });
        }
        let columns: BTreeMap<String, Column> = self
            .columns
            .iter()
            .map(|(name, col)| (name.clone(), col.take(mask)))
            .collect();
        let n_rows = mask.iter().filter(|&&keep| keep).count();
        Ok(Dataset { columns, n_rows })
    }

    /// Concatenate `other` below `self`. Column sets and dtypes must match.
    pub fn append(&mut self, other: &Dataset) -> CutResult<()> {
        let ours: BTreeSet<&String> = self.columns.keys().collect();
        let theirs: BTreeSet<&String> = other.columns.keys().collect();
        if ours != theirs {
            return Err(CutError::SchemaMismatch(format!(
                "columns {ours:?} vs {theirs:?}"
            )));
        }
        // Check every dtype before touching anything so a failure leaves
        // `self` intact.
        for (name, col) in &self.columns {
            let rhs = &other.columns[name];
            if col.type_name() != rhs.type_name() {
                return Err(CutError::SchemaMismatch(format!(
                    "column '{name}' is {} in one dataset and {} in the other",
                    col.type_name(),
                    rhs.type_name()
                )));
            }
        }
        for (name, col) in self.columns.iter_mut() {
            col.extend_from(&other.columns[name]);
        }
        self.n_rows += other.n_rows;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Dataset {
        Dataset::from_columns([
            (LABEL_COLUMN, Column::from(vec!["sig", "sig", "bkg"])),
            ("x", Column::from(vec![1.0, 5.0, 10.0])),
            ("n", Column::from(vec![2_i64, 0, 3])),
        ])
        .unwrap()
    }

    #[test]
    fn rejects_ragged_columns() {
        let err = Dataset::from_columns([
            (LABEL_COLUMN, Column::from(vec!["a", "b"])),
            ("x", Column::from(vec![1.0])),
        ])
        .unwrap_err();
        assert_eq!(
            err,
            CutError::RowCountMismatch {
                column: "x".into(),
                expected: 2,
                found: 1
            }
        );
    }

    #[test]
    fn requires_string_label() {
        let err = Dataset::from_columns([("x", Column::from(vec![1.0]))]).unwrap_err();
        assert!(matches!(err, CutError::MissingLabel { .. }));

        let err = Dataset::from_columns([(LABEL_COLUMN, Column::from(vec![1.0]))]).unwrap_err();
        assert!(matches!(err, CutError::MissingLabel { .. }));
    }

    #[test]
    fn filter_keeps_every_column() {
        let ds = sample();
        let out = ds.filter(&[true, false, true]).unwrap();
        assert_eq!(out.len(), 2);
        assert_eq!(out.labels(), &["sig".to_string(), "bkg".to_string()]);
        assert_eq!(out.column("n").unwrap(), &Column::Int(vec![2, 3]));
        // input untouched
        assert_eq!(ds.len(), 3);
    }

    #[test]
    fn counts_per_label() {
        let counts = sample().label_counts();
        assert_eq!(counts.get("sig"), Some(&2));
        assert_eq!(counts.get("bkg"), Some(&1));
    }

    #[test]
    fn append_checks_schema() {
        let mut ds = sample();
        ds.append(&sample()).unwrap();
        assert_eq!(ds.len(), 6);

        let other = Dataset::from_columns([
            (LABEL_COLUMN, Column::from(vec!["sig"])),
            ("x", Column::from(vec![1_i64])),
            ("n", Column::from(vec![1_i64])),
        ])
        .unwrap();
        let err = ds.append(&other).unwrap_err();
        assert!(matches!(err, CutError::SchemaMismatch(_)));
        assert_eq!(ds.len(), 6);
    }
}
