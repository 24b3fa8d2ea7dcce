use thiserror::Error;

/// Errors raised by the dataset model and the cut engine.
///
/// All of these indicate a malformed request (a cut on a column that does
/// not exist, a predicate producing the wrong number of flags, …) and abort
/// the operation instead of silently applying fewer cuts.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum CutError {
    #[error("column '{column}' is not present in the dataset")]
    MissingColumn { column: String },

    #[error("a cut on column '{column}' is already registered")]
    DuplicateCutKey { column: String },

    #[error("dataset has no '{column}' string column")]
    MissingLabel { column: String },

    #[error("column '{column}' has {found} rows, expected {expected}")]
    RowCountMismatch {
        column: String,
        expected: usize,
        found: usize,
    },

    #[error("predicate on '{column}' produced {found} flags for {expected} rows")]
    MaskLength {
        column: String,
        expected: usize,
        found: usize,
    },

    #[error("column '{column}' holds {found} values, {expected} required")]
    ColumnType {
        column: String,
        expected: &'static str,
        found: &'static str,
    },

    #[error("invalid cut condition '{text}': {reason}")]
    InvalidCondition { text: String, reason: String },

    #[error("cannot merge datasets: {0}")]
    SchemaMismatch(String),
}

pub type CutResult<T> = Result<T, CutError>;
