//! Table-level bulk helpers.
//!
//! A [`Table`] pairs a link with one table's cached schema and hands out
//! [`Record`]s: fresh ones via [`Table::record`], populated ones via the
//! bulk loaders. Every row of a bulk result becomes its own
//! [`Found::Confirmed`](crate::Found::Confirmed) record.

use std::sync::Arc;

use tablerow_core::{Params, Row, TableRef, Value, quote_ident};
use tablerow_link::Link;
use tracing::debug;

use crate::error::{RecordError, Result};
use crate::record::Record;
use crate::schema::{SchemaCache, SchemaDescriptor};
use crate::sql;

/// Statement keywords that [`Table::load_multiple`] refuses to run.
const MUTATING_KEYWORDS: [&str; 4] = ["INSERT", "REPLACE", "DELETE", "UPDATE"];

/// Clause keywords appended to an implicit `SELECT * FROM <table>`.
const CLAUSE_KEYWORDS: [&str; 3] = ["WHERE", "GROUP", "ORDER"];

/// Row selection for [`Table::load_multiple`].
#[derive(Debug, Clone, PartialEq)]
pub enum Criteria {
    /// Column equality on every pair; `Null` matches with `IS NULL`.
    Match(Row),
    /// A `WHERE`/`GROUP BY`/`ORDER BY` tail for `SELECT * FROM <table>`.
    Clause(String),
    /// A complete `SELECT` statement, run as given.
    Statement(String),
}

impl Criteria {
    /// Classifies raw SQL by its first keyword.
    ///
    /// # Errors
    ///
    /// Returns [`RecordError::UsageError`] for `INSERT`, `REPLACE`, `DELETE` and
    /// `UPDATE` statements.
    ///
    /// # Examples
    ///
    /// ```
    /// use tablerow_record::Criteria;
    ///
    /// assert!(matches!(Criteria::parse("where id > 3"), Ok(Criteria::Clause(_))));
    /// assert!(matches!(Criteria::parse("SELECT 1"), Ok(Criteria::Statement(_))));
    /// assert!(Criteria::parse("DELETE FROM users").is_err());
    /// ```
    pub fn parse(sql: &str) -> Result<Self> {
        let sql = sql.trim();
        let keyword = first_keyword(sql);
        if MUTATING_KEYWORDS.contains(&keyword.as_str()) {
            return Err(RecordError::UsageError(format!(
                "bulk loading only reads rows, refusing {keyword} statement"
            )));
        }
        if CLAUSE_KEYWORDS.contains(&keyword.as_str()) {
            Ok(Self::Clause(sql.to_string()))
        } else {
            Ok(Self::Statement(sql.to_string()))
        }
    }
}

impl From<Row> for Criteria {
    fn from(row: Row) -> Self {
        Self::Match(row)
    }
}

/// Strips leading whitespace and `--`/`/* */` comments.
fn skip_comments(mut sql: &str) -> &str {
    loop {
        sql = sql.trim_start();
        if let Some(rest) = sql.strip_prefix("--") {
            sql = rest.split_once('\n').map_or("", |(_, tail)| tail);
        } else if let Some(rest) = sql.strip_prefix("/*") {
            sql = rest.split_once("*/").map_or("", |(_, tail)| tail);
        } else {
            return sql;
        }
    }
}

fn first_keyword(sql: &str) -> String {
    skip_comments(sql)
        .split(|c: char| !c.is_ascii_alphabetic())
        .next()
        .unwrap_or_default()
        .to_ascii_uppercase()
}

/// One group of [`Table::index`]: rows whose column starts with `character`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexEntry {
    pub character: String,
    pub count: usize,
    /// Cumulative row count through this group divided by the page size,
    /// when paging was requested.
    pub page: Option<usize>,
}

/// Bulk access to one table.
///
/// # Examples
///
/// ```
/// use tablerow_core::row;
/// use tablerow_link::{LinkConfig, LinkRegistry};
/// use tablerow_record::{Criteria, SchemaCache, Table};
///
/// let registry = LinkRegistry::new();
/// let link = registry.connect("main", Some(LinkConfig::memory())).unwrap();
/// link.with_connection(|c| {
///     c.execute_batch(
///         "CREATE TABLE tags (id INTEGER PRIMARY KEY, label TEXT);
///          INSERT INTO tags (label) VALUES ('red'), ('green'), ('blue');",
///     )
/// })
/// .unwrap();
///
/// let tags = Table::open(link, &SchemaCache::new(), "tags").unwrap();
/// assert_eq!(tags.total().unwrap(), 3);
///
/// let green = tags
///     .load_multiple(row([("label", "green")]).into(), &Default::default())
///     .unwrap();
/// assert_eq!(green.len(), 1);
///
/// let sorted = tags.all(Some("label"), Some(2), None).unwrap();
/// assert_eq!(sorted[0].get("label").and_then(|v| v.as_str()), Some("blue"));
/// ```
#[derive(Debug, Clone)]
pub struct Table {
    link: Arc<Link>,
    schema: Arc<SchemaDescriptor>,
}

impl Table {
    /// Binds to `table`, loading its schema through `schemas` if needed.
    ///
    /// # Errors
    ///
    /// Returns [`RecordError::MissingTableNameError`] for a blank table name and
    /// [`RecordError::SchemaLoadError`] when the table has no columns.
    pub fn open(link: Arc<Link>, schemas: &SchemaCache, table: impl Into<TableRef>) -> Result<Self> {
        let table = table.into();
        if table.is_blank() {
            return Err(RecordError::MissingTableNameError);
        }
        let schema = schemas.load(&link, &table)?;
        Ok(Self { link, schema })
    }

    pub fn schema(&self) -> &SchemaDescriptor {
        &self.schema
    }

    /// A fresh, empty record for this table.
    pub fn record(&self) -> Record {
        Record::with_schema(Arc::clone(&self.link), Arc::clone(&self.schema))
    }

    fn qualified(&self) -> String {
        self.schema.table.qualified()
    }

    /// Loads every row selected by `criteria` as a confirmed record.
    ///
    /// `params` is bound to `Clause` and `Statement` SQL; `Match` criteria
    /// bind their own values.
    ///
    /// # Errors
    ///
    /// Returns [`RecordError::UsageError`] for any statement that would write,
    /// including writes behind a `WITH` prefix or a leading comment. The
    /// statement is only compiled, never run.
    pub fn load_multiple(&self, criteria: Criteria, params: &Params) -> Result<Vec<Record>> {
        let (sql, params) = match criteria {
            Criteria::Match(pairs) => self.match_sql(pairs)?,
            Criteria::Clause(clause) => (
                format!("SELECT * FROM {} {}", self.qualified(), clause.trim()),
                params.clone(),
            ),
            Criteria::Statement(statement) => match Criteria::parse(&statement)? {
                Criteria::Clause(clause) => (
                    format!("SELECT * FROM {} {clause}", self.qualified()),
                    params.clone(),
                ),
                _ => (statement, params.clone()),
            },
        };
        let readonly = self
            .link
            .with_connection(|conn| conn.prepare(&sql).map(|stmt| stmt.readonly()))?;
        if !readonly {
            return Err(RecordError::UsageError(format!(
                "bulk loading only reads rows, refusing statement that writes: {sql}"
            )));
        }
        let rows = self.link.fetch_all(&sql, &params)?;
        debug!(table = %self.schema.table, rows = rows.len(), "bulk load");
        Ok(rows
            .into_iter()
            .map(|row| Record::from_row(Arc::clone(&self.link), Arc::clone(&self.schema), row))
            .collect())
    }

    fn match_sql(&self, pairs: Row) -> Result<(String, Params)> {
        if pairs.is_empty() {
            return Ok((format!("SELECT * FROM {}", self.qualified()), Params::new()));
        }
        let known: Vec<(&str, Value)> = pairs
            .iter()
            .filter(|(column, _)| self.schema.has_column(column))
            .map(|(column, value)| (column.as_str(), value.clone()))
            .collect();
        if known.is_empty() {
            return Err(RecordError::UsageError(format!(
                "no match criteria name a column of '{}'",
                self.schema.table
            )));
        }
        let (clause, params) = sql::equality_clause(known, "");
        Ok((
            format!("SELECT * FROM {} WHERE {clause}", self.qualified()),
            params,
        ))
    }

    /// Loads rows in `order_by` order, optionally windowed.
    ///
    /// `order_by` is an SQL ordering expression such as `"name DESC"` and is
    /// inserted as given.
    pub fn all(
        &self,
        order_by: Option<&str>,
        limit: Option<usize>,
        offset: Option<usize>,
    ) -> Result<Vec<Record>> {
        let mut sql = format!("SELECT * FROM {}", self.qualified());
        if let Some(order) = order_by.filter(|o| !o.trim().is_empty()) {
            sql.push_str(&format!(" ORDER BY {order}"));
        }
        match (limit, offset) {
            (Some(limit), Some(offset)) => sql.push_str(&format!(" LIMIT {limit} OFFSET {offset}")),
            (Some(limit), None) => sql.push_str(&format!(" LIMIT {limit}")),
            (None, Some(offset)) => sql.push_str(&format!(" LIMIT -1 OFFSET {offset}")),
            (None, None) => {}
        }
        self.load_multiple(Criteria::Statement(sql), &Params::new())
    }

    /// Number of rows in the table.
    pub fn total(&self) -> Result<u64> {
        let sql = format!("SELECT COUNT(*) FROM {}", self.qualified());
        let count = self
            .link
            .fetch_cell(&sql, &Params::new())?
            .and_then(|v| v.as_i64())
            .unwrap_or(0);
        Ok(u64::try_from(count).unwrap_or(0))
    }

    /// Groups rows by the first character of `column`.
    ///
    /// Groups come back in character order; `NULL` values are skipped. With
    /// a non-zero `page_size`, each entry also carries a page number: the
    /// running row count up to and including the group, divided by
    /// `page_size`.
    ///
    /// # Errors
    ///
    /// Returns [`RecordError::UsageError`] if `column` is not a column of the table.
    pub fn index(&self, column: &str, page_size: Option<usize>) -> Result<Vec<IndexEntry>> {
        if !self.schema.has_column(column) {
            return Err(RecordError::UsageError(format!(
                "cannot index '{}' by unknown column '{column}'",
                self.schema.table
            )));
        }
        let column = quote_ident(column);
        let sql = format!(
            "SELECT SUBSTR({column}, 1, 1) AS initial, COUNT(*) AS total \
             FROM {} WHERE {column} IS NOT NULL \
             GROUP BY initial ORDER BY initial",
            self.qualified()
        );
        let rows = self.link.fetch_all(&sql, &Params::new())?;

        let page_size = page_size.filter(|&size| size > 0);
        let mut seen = 0usize;
        let mut entries = Vec::with_capacity(rows.len());
        for row in rows {
            let character = row
                .get("initial")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            let count = row
                .get("total")
                .and_then(Value::as_i64)
                .and_then(|n| usize::try_from(n).ok())
                .unwrap_or(0);
            seen += count;
            entries.push(IndexEntry {
                character,
                count,
                page: page_size.map(|size| seen / size),
            });
        }
        Ok(entries)
    }
}
