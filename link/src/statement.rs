//! Statement execution against a raw connection.
//!
//! Binds named parameters, runs the statement and shapes the produced rows
//! according to a [`ResultMode`]. Shared by the registry's query dispatcher
//! and by anything that drives a [`Link`](crate::Link) directly.

use std::borrow::Cow;

use rusqlite::types::{Value as SqlValue, ValueRef};
use rusqlite::{Connection, Statement};
use tablerow_core::{DATETIME_FORMAT, Params, QueryResult, ResultMode, Row, Value};
use tracing::trace;

/// Outcome of one executed statement.
#[derive(Debug, Clone, PartialEq)]
pub struct Executed {
    /// The shaped result.
    pub result: QueryResult,
    /// Affected rows for writes, produced rows for reads.
    pub row_count: usize,
}

/// Converts a [`Value`] into the driver's owned value type.
pub fn to_sql_value(value: &Value) -> SqlValue {
    match value {
        Value::Null => SqlValue::Null,
        Value::Integer(i) => SqlValue::Integer(*i),
        Value::Real(f) => SqlValue::Real(*f),
        Value::Text(s) => SqlValue::Text(s.clone()),
        Value::Blob(b) => SqlValue::Blob(b.clone()),
        Value::DateTime(dt) => SqlValue::Text(dt.format(DATETIME_FORMAT).to_string()),
    }
}

/// Converts a borrowed driver value into a [`Value`].
pub fn from_value_ref(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::Integer(i),
        ValueRef::Real(f) => Value::Real(f),
        ValueRef::Text(t) => Value::Text(String::from_utf8_lossy(t).into_owned()),
        ValueRef::Blob(b) => Value::Blob(b.to_vec()),
    }
}

/// Returns the placeholder form of a parameter key (`name` → `:name`).
pub(crate) fn placeholder(key: &str) -> Cow<'_, str> {
    if key.starts_with([':', '@', '$']) {
        Cow::Borrowed(key)
    } else {
        Cow::Owned(format!(":{key}"))
    }
}

fn bind_params(stmt: &mut Statement<'_>, params: &Params) -> rusqlite::Result<()> {
    for (key, value) in params {
        let name = placeholder(key);
        match stmt.parameter_index(&name)? {
            Some(index) => stmt.raw_bind_parameter(index, to_sql_value(value))?,
            None => trace!(param = %name, "parameter not referenced by statement"),
        }
    }
    Ok(())
}

fn read_row(row: &rusqlite::Row<'_>, names: &[String]) -> rusqlite::Result<Row> {
    let mut out = Row::with_capacity(names.len());
    for (i, name) in names.iter().enumerate() {
        out.insert(name.clone(), from_value_ref(row.get_ref(i)?));
    }
    Ok(out)
}

/// Prepares, binds and runs `sql`, shaping the output per `mode`.
///
/// Statements without result columns report their affected-row count;
/// statements with result columns are read to the end so that
/// [`Executed::row_count`] is the number of rows produced.
pub fn run(
    conn: &Connection,
    sql: &str,
    params: &Params,
    mode: ResultMode,
) -> rusqlite::Result<Executed> {
    let mut stmt = conn.prepare(sql)?;
    bind_params(&mut stmt, params)?;

    if stmt.column_count() == 0 {
        let affected = stmt.raw_execute()?;
        let result = match mode {
            ResultMode::None => QueryResult::Count(affected),
            other => QueryResult::empty(other),
        };
        return Ok(Executed {
            result,
            row_count: affected,
        });
    }

    let names: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
    let mut rows = stmt.raw_query();

    let mut produced = 0usize;
    let mut all = Vec::new();
    let mut first: Option<Row> = None;
    let mut column = Vec::new();
    let mut cell: Option<Value> = None;

    while let Some(row) = rows.next()? {
        match mode {
            ResultMode::None => {}
            ResultMode::Full => all.push(read_row(row, &names)?),
            ResultMode::SingleRow if produced == 0 => first = Some(read_row(row, &names)?),
            ResultMode::SingleColumn => column.push(from_value_ref(row.get_ref(0)?)),
            ResultMode::SingleCell if produced == 0 => {
                cell = Some(from_value_ref(row.get_ref(0)?));
            }
            _ => {}
        }
        produced += 1;
    }

    let result = match mode {
        ResultMode::None => QueryResult::Count(produced),
        ResultMode::Full => QueryResult::Rows(all),
        ResultMode::SingleRow => QueryResult::Row(first),
        ResultMode::SingleColumn => QueryResult::Column(column),
        ResultMode::SingleCell => QueryResult::Cell(cell),
    };
    Ok(Executed {
        result,
        row_count: produced,
    })
}
