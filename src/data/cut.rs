use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::error::{CutError, CutResult};

use super::model::{Column, Mask};

// ---------------------------------------------------------------------------
// Comparison conditions – the "<op> <value>" form used in configs
// ---------------------------------------------------------------------------

/// Comparison operator of a threshold cut.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
    Ne,
}

impl CmpOp {
    // Two-character operators first so "<=" is not read as "<".
    const TOKENS: [(&'static str, CmpOp); 6] = [
        ("<=", CmpOp::Le),
        (">=", CmpOp::Ge),
        ("==", CmpOp::Eq),
        ("!=", CmpOp::Ne),
        ("<", CmpOp::Lt),
        (">", CmpOp::Gt),
    ];

    pub fn symbol(self) -> &'static str {
        match self {
            CmpOp::Lt => "<",
            CmpOp::Le => "<=",
            CmpOp::Gt => ">",
            CmpOp::Ge => ">=",
            CmpOp::Eq => "==",
            CmpOp::Ne => "!=",
        }
    }

    pub fn compare(self, lhs: f64, rhs: f64) -> bool {
        match self {
            CmpOp::Lt => lhs < rhs,
            CmpOp::Le => lhs <= rhs,
            CmpOp::Gt => lhs > rhs,
            CmpOp::Ge => lhs >= rhs,
            CmpOp::Eq => lhs == rhs,
            CmpOp::Ne => lhs != rhs,
        }
    }

    /// Split a leading operator off `text`.
    fn strip(text: &str) -> Option<(CmpOp, &str)> {
        CmpOp::TOKENS
            .iter()
            .find_map(|(tok, op)| text.strip_prefix(tok).map(|rest| (*op, rest)))
    }
}

impl fmt::Display for CmpOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

fn invalid(text: &str, reason: impl Into<String>) -> CutError {
    CutError::InvalidCondition {
        text: text.to_string(),
        reason: reason.into(),
    }
}

// ---------------------------------------------------------------------------
// Predicate – description + vectorised column test
// ---------------------------------------------------------------------------

/// Column-wise test: takes the full column, returns one flag per row.
pub type ColumnTest = dyn Fn(&Column) -> CutResult<Mask> + Send + Sync;

/// A named cut: a human-readable description and a vectorised test over one
/// column.
#[derive(Clone)]
pub struct Predicate {
    description: String,
    test: Arc<ColumnTest>,
}

impl Predicate {
    pub fn new<F>(description: impl Into<String>, test: F) -> Self
    where
        F: Fn(&Column) -> CutResult<Mask> + Send + Sync + 'static,
    {
        Predicate {
            description: description.into(),
            test: Arc::new(test),
        }
    }

    /// Numeric threshold cut, e.g. `Predicate::threshold(CmpOp::Ge, 2.0)`.
    /// Integer columns are compared after widening to `f64`.
    pub fn threshold(op: CmpOp, value: f64) -> Self {
        Self::threshold_described(format!("{op} {value}"), op, value)
    }

    fn threshold_described(description: String, op: CmpOp, value: f64) -> Self {
        Predicate::new(description, move |col: &Column| {
            let values = col.as_f64().ok_or(CutError::ColumnType {
                column: String::new(),
                expected: "numeric",
                found: col.type_name(),
            })?;
            Ok(values.iter().map(|&v| op.compare(v, value)).collect())
        })
    }

    /// Parse a condition like `">= 2"` or `"<43"`. The trimmed text becomes
    /// the description.
    pub fn parse(text: &str) -> CutResult<Self> {
        let trimmed = text.trim();
        let (op, rest) =
            CmpOp::strip(trimmed).ok_or_else(|| invalid(text, "expected one of < <= > >= == !="))?;
        let rest = rest.trim();
        if rest.is_empty() {
            return Err(invalid(text, "missing threshold value"));
        }
        let value: f64 = rest
            .parse()
            .map_err(|_| invalid(text, format!("'{rest}' is not a number")))?;
        if !value.is_finite() {
            return Err(invalid(text, format!("'{rest}' is not a finite threshold")));
        }
        Ok(Self::threshold_described(trimmed.to_string(), op, value))
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    /// Run the test on `column`, checking the returned mask length.
    pub fn evaluate(&self, name: &str, column: &Column) -> CutResult<Mask> {
        let mask = (self.test)(column).map_err(|err| match err {
            CutError::ColumnType {
                column, expected, found,
            } if column.is_empty() => CutError::ColumnType {
                column: name.to_string(),
                expected,
                found,
            },
            other => other,
        })?;
        if mask.len() != column.len() {
            return Err(CutError::MaskLength {
                column: name.to_string(),
                expected: column.len(),
                found: mask.len(),
            });
        }
        Ok(mask)
    }
}

impl fmt::Debug for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Predicate")
            .field("description", &self.description)
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// CutSet – unordered conjunction of per-column predicates
// ---------------------------------------------------------------------------

/// Predicates combined with logical AND into one mask.
///
/// At most one predicate per column: registering a second one for the same
/// column is rejected with [`CutError::DuplicateCutKey`]. Iteration is in
/// sorted column order, which fixes the report and snapshot file names.
#[derive(Debug, Clone, Default)]
pub struct CutSet {
    cuts: BTreeMap<String, Predicate>,
}

impl CutSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, column: impl Into<String>, predicate: Predicate) -> CutResult<()> {
        let column = column.into();
        if self.cuts.contains_key(&column) {
            return Err(CutError::DuplicateCutKey { column });
        }
        self.cuts.insert(column, predicate);
        Ok(())
    }

    /// Builder form of [`CutSet::insert`].
    pub fn with(mut self, column: impl Into<String>, predicate: Predicate) -> CutResult<Self> {
        self.insert(column, predicate)?;
        Ok(self)
    }

    /// Build from `(column, "<op> <value>")` pairs.
    pub fn from_conditions<I, K, V>(conditions: I) -> CutResult<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: AsRef<str>,
    {
        let mut set = CutSet::new();
        for (column, text) in conditions {
            set.insert(column, Predicate::parse(text.as_ref())?)?;
        }
        Ok(set)
    }

    /// Union of two cut sets; a column present in both is an error.
    pub fn merge(mut self, other: CutSet) -> CutResult<Self> {
        for (column, predicate) in other.cuts {
            self.insert(column, predicate)?;
        }
        Ok(self)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Predicate)> {
        self.cuts.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.cuts.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.cuts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cuts.is_empty()
    }

    /// Column names joined with `_`, used in output file names.
    pub fn joined_names(&self) -> String {
        self.columns().collect::<Vec<_>>().join("_")
    }
}

// ---------------------------------------------------------------------------
// CutGroup – ordered stages for cumulative efficiencies
// ---------------------------------------------------------------------------

/// One stage of a cut group: a single predicate on a single column.
#[derive(Debug, Clone)]
pub struct Stage {
    pub column: String,
    pub predicate: Predicate,
}

impl Stage {
    pub fn new(column: impl Into<String>, predicate: Predicate) -> Self {
        Stage {
            column: column.into(),
            predicate,
        }
    }

    /// Parse `"EVT_NTau23Pi >= 2"`: column name, operator, value.
    pub fn parse(text: &str) -> CutResult<Self> {
        let split = text
            .find(['<', '>', '=', '!'])
            .ok_or_else(|| invalid(text, "expected '<column> <op> <value>'"))?;
        let column = text[..split].trim();
        if column.is_empty() {
            return Err(invalid(text, "missing column name"));
        }
        Ok(Stage::new(column, Predicate::parse(&text[split..])?))
    }
}

/// Identifier of the `k`-th (1-based) cumulative stage.
pub fn stage_label(k: usize) -> String {
    format!("{k} cut(s)")
}

/// Ordered stages; stage `k` is applied on the survivors of stages `1..k`.
#[derive(Debug, Clone, Default)]
pub struct CutGroup {
    stages: Vec<Stage>,
}

impl CutGroup {
    pub fn new(stages: Vec<Stage>) -> Self {
        CutGroup { stages }
    }

    /// Build from `"<column> <op> <value>"` strings, keeping their order.
    pub fn parse<I, S>(stages: I) -> CutResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let stages = stages
            .into_iter()
            .map(|s| Stage::parse(s.as_ref()))
            .collect::<CutResult<Vec<_>>>()?;
        Ok(CutGroup { stages })
    }

    pub fn push(&mut self, stage: Stage) {
        self.stages.push(stage);
    }

    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }
}
