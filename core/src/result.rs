//! Result shapes for executed statements.

use crate::value::{Row, Value};

/// How the rows produced by a statement are returned to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResultMode {
    /// Affected-row count for writes, produced-row count for reads.
    #[default]
    None,
    /// Every row as a column-keyed map.
    Full,
    /// The first row, or nothing.
    SingleRow,
    /// The first column of every row.
    SingleColumn,
    /// The first column of the first row, or nothing.
    SingleCell,
}

/// The value produced by a statement, shaped by a [`ResultMode`].
///
/// # Examples
///
/// ```
/// use tablerow_core::{QueryResult, ResultMode, Value};
///
/// let empty = QueryResult::empty(ResultMode::SingleCell);
/// assert_eq!(empty, QueryResult::Cell(None));
/// assert_eq!(QueryResult::Cell(Some(Value::from(3))).into_cell(), Some(Value::Integer(3)));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum QueryResult {
    /// [`ResultMode::None`].
    Count(usize),
    /// [`ResultMode::Full`].
    Rows(Vec<Row>),
    /// [`ResultMode::SingleRow`].
    Row(Option<Row>),
    /// [`ResultMode::SingleColumn`].
    Column(Vec<Value>),
    /// [`ResultMode::SingleCell`]; `None` when the statement produced no rows.
    Cell(Option<Value>),
}

impl QueryResult {
    /// The result a statement with no rows and no effect yields for `mode`.
    pub fn empty(mode: ResultMode) -> Self {
        match mode {
            ResultMode::None => QueryResult::Count(0),
            ResultMode::Full => QueryResult::Rows(Vec::new()),
            ResultMode::SingleRow => QueryResult::Row(None),
            ResultMode::SingleColumn => QueryResult::Column(Vec::new()),
            ResultMode::SingleCell => QueryResult::Cell(None),
        }
    }

    /// The mode this result was shaped for.
    pub fn mode(&self) -> ResultMode {
        match self {
            QueryResult::Count(_) => ResultMode::None,
            QueryResult::Rows(_) => ResultMode::Full,
            QueryResult::Row(_) => ResultMode::SingleRow,
            QueryResult::Column(_) => ResultMode::SingleColumn,
            QueryResult::Cell(_) => ResultMode::SingleCell,
        }
    }

    /// Returns the count for [`QueryResult::Count`], `None` otherwise.
    pub fn count(&self) -> Option<usize> {
        match self {
            QueryResult::Count(n) => Some(*n),
            _ => None,
        }
    }

    pub fn into_rows(self) -> Vec<Row> {
        match self {
            QueryResult::Rows(rows) => rows,
            QueryResult::Row(row) => row.into_iter().collect(),
            _ => Vec::new(),
        }
    }

    pub fn into_row(self) -> Option<Row> {
        match self {
            QueryResult::Row(row) => row,
            QueryResult::Rows(rows) => rows.into_iter().next(),
            _ => None,
        }
    }

    pub fn into_column(self) -> Vec<Value> {
        match self {
            QueryResult::Column(values) => values,
            QueryResult::Cell(cell) => cell.into_iter().collect(),
            _ => Vec::new(),
        }
    }

    pub fn into_cell(self) -> Option<Value> {
        match self {
            QueryResult::Cell(cell) => cell,
            QueryResult::Column(values) => values.into_iter().next(),
            _ => None,
        }
    }
}
