//! The row-mapping [`Record`].

use std::sync::Arc;

use tablerow_core::{Params, Row, TableRef, Value, quote_ident};
use tablerow_link::Link;
use tracing::debug;

use crate::coerce::process_value;
use crate::error::{RecordError, Result};
use crate::schema::{SchemaCache, SchemaDescriptor};
use crate::sql::{self, KEY_PREFIX};

/// Whether a record's primary key is known to exist in the database.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Found {
    /// Not checked yet.
    #[default]
    Unknown,
    /// A load or save matched a stored row.
    Confirmed,
    /// A load found nothing; the fields hold an unsaved draft.
    Absent,
}

/// One table row, persisted or pending.
///
/// A record is bound to one table for its whole life. Field values live in
/// an ordered `column → value` container; only columns known to the table's
/// [`SchemaDescriptor`] take part in generated SQL.
///
/// # Examples
///
/// ```
/// use tablerow_core::Value;
/// use tablerow_link::{LinkConfig, LinkRegistry};
/// use tablerow_record::{Found, Record, SchemaCache};
///
/// let registry = LinkRegistry::new();
/// let link = registry.connect("main", Some(LinkConfig::memory())).unwrap();
/// link.with_connection(|c| {
///     c.execute_batch("CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT)")
/// })
/// .unwrap();
///
/// let schemas = SchemaCache::new();
/// let mut user = Record::new(link.clone(), &schemas, "users").unwrap();
/// user.assign("name", "ann");
/// assert!(user.save(false).unwrap());
/// assert_eq!(user.get("id"), Some(&Value::Integer(1)));
///
/// let mut again = Record::new(link, &schemas, "users").unwrap();
/// assert!(again.load_by_key(1).unwrap());
/// assert_eq!(again.found(), Found::Confirmed);
/// assert_eq!(again.get("name"), Some(&Value::from("ann")));
/// ```
#[derive(Debug, Clone)]
pub struct Record {
    link: Arc<Link>,
    schema: Arc<SchemaDescriptor>,
    fields: Row,
    found: Found,
}

impl Record {
    /// Binds a new, empty record to `table`, loading the table's schema
    /// through `schemas` if it is not cached yet.
    ///
    /// # Errors
    ///
    /// Returns [`RecordError::MissingTableNameError`] for a blank table name and
    /// [`RecordError::SchemaLoadError`] when the table has no columns.
    pub fn new(link: Arc<Link>, schemas: &SchemaCache, table: impl Into<TableRef>) -> Result<Self> {
        let table = table.into();
        if table.is_blank() {
            return Err(RecordError::MissingTableNameError);
        }
        let schema = schemas.load(&link, &table)?;
        Ok(Self::with_schema(link, schema))
    }

    pub(crate) fn with_schema(link: Arc<Link>, schema: Arc<SchemaDescriptor>) -> Self {
        Self {
            link,
            schema,
            fields: Row::new(),
            found: Found::Unknown,
        }
    }

    /// A record populated from a stored row.
    pub(crate) fn from_row(link: Arc<Link>, schema: Arc<SchemaDescriptor>, row: Row) -> Self {
        Self {
            link,
            schema,
            fields: row,
            found: Found::Confirmed,
        }
    }

    pub fn found(&self) -> Found {
        self.found
    }

    pub fn table(&self) -> &TableRef {
        &self.schema.table
    }

    pub fn schema(&self) -> &SchemaDescriptor {
        &self.schema
    }

    pub fn link(&self) -> &Arc<Link> {
        &self.link
    }

    pub fn fields(&self) -> &Row {
        &self.fields
    }

    pub fn into_fields(self) -> Row {
        self.fields
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    /// Sets a field in memory only. See [`set`](Self::set) for the
    /// persisting variant.
    pub fn assign(&mut self, field: impl Into<String>, value: impl Into<Value>) -> &mut Self {
        self.fields.insert(field.into(), value.into());
        self
    }

    /// Merges `row` over the current fields.
    pub fn import(&mut self, row: Row) -> &mut Self {
        self.fields.extend(row);
        self
    }

    /// Drops the named fields from the container.
    pub fn filter(&mut self, columns: &[&str]) -> &mut Self {
        self.fields.retain(|name, _| !columns.contains(&name.as_str()));
        self
    }

    /// Keeps only the named fields in the container.
    pub fn allow(&mut self, columns: &[&str]) -> &mut Self {
        self.fields.retain(|name, _| columns.contains(&name.as_str()));
        self
    }

    fn coerced(&self, column: &str, value: &Value) -> Value {
        process_value(value, self.schema.column_type(column).unwrap_or_default())
    }

    fn missing_key(&self, column: Option<&str>) -> RecordError {
        RecordError::MissingPrimaryKeyError {
            table: self.table().to_string(),
            column: column.map(String::from),
        }
    }

    fn has_complete_key(&self) -> bool {
        !self.schema.primary_keys.is_empty()
            && self
                .schema
                .primary_keys
                .iter()
                .all(|k| self.fields.get(k).is_some_and(|v| !v.is_null()))
    }

    /// Current primary-key values, in key order.
    fn key_values(&self) -> Result<Vec<(&str, Value)>> {
        if self.schema.primary_keys.is_empty() {
            return Err(self.missing_key(None));
        }
        self.schema
            .primary_keys
            .iter()
            .map(|column| match self.fields.get(column) {
                Some(value) if !value.is_null() => Ok((column.as_str(), self.coerced(column, value))),
                _ => Err(self.missing_key(Some(column))),
            })
            .collect()
    }

    /// `WHERE` body and parameters matching the current primary key.
    fn key_filter(&self) -> Result<(String, Params)> {
        Ok(sql::equality_clause(self.key_values()?, KEY_PREFIX))
    }

    /// Resolves [`Found`] with a `COUNT(*)` on the primary key.
    fn probe(&mut self) -> Result<Found> {
        let (clause, params) = self.key_filter()?;
        let sql = format!("SELECT COUNT(*) FROM {} WHERE {clause}", self.table().qualified());
        let count = self
            .link
            .fetch_cell(&sql, &params)?
            .and_then(|v| v.as_i64())
            .unwrap_or(0);
        self.found = if count > 0 { Found::Confirmed } else { Found::Absent };
        Ok(self.found)
    }

    /// Loads the row matching the primary-key values already in the record.
    ///
    /// # Errors
    ///
    /// Returns [`RecordError::MissingPrimaryKeyError`] if any key value is absent.
    pub fn load(&mut self) -> Result<bool> {
        let criteria: Row = self
            .key_values()?
            .into_iter()
            .map(|(column, value)| (column.to_string(), value))
            .collect();
        self.load_by(criteria)
    }

    /// Loads the row whose first primary-key column equals `value`.
    pub fn load_by_key(&mut self, value: impl Into<Value>) -> Result<bool> {
        let column = self
            .schema
            .first_primary_key()
            .ok_or_else(|| self.missing_key(None))?
            .to_string();
        self.load_by_field(&column, value)
    }

    /// Loads the row where `field` equals `value`.
    pub fn load_by_field(&mut self, field: &str, value: impl Into<Value>) -> Result<bool> {
        let mut criteria = Row::new();
        criteria.insert(field.to_string(), value.into());
        self.load_by(criteria)
    }

    /// Loads the row matching every `column → value` pair in `criteria`.
    ///
    /// On a match the stored row is merged over the current fields and the
    /// record becomes [`Found::Confirmed`]. Otherwise it becomes
    /// [`Found::Absent`] and `criteria` is merged in as a draft, so a later
    /// [`save`](Self::save) inserts it. Columns unknown to the table are
    /// ignored.
    ///
    /// # Errors
    ///
    /// Returns [`RecordError::UsageError`] when no criterion names a known column.
    pub fn load_by(&mut self, criteria: Row) -> Result<bool> {
        let known: Row = criteria
            .into_iter()
            .filter(|(column, _)| self.schema.has_column(column))
            .collect();
        if known.is_empty() {
            return Err(RecordError::UsageError(format!(
                "no lookup criteria name a column of '{}'",
                self.table()
            )));
        }
        let (clause, params) = sql::equality_clause(
            known
                .iter()
                .map(|(column, value)| (column.as_str(), self.coerced(column, value))),
            "",
        );
        let matched = self.load_where(&clause, &params)?;
        if !matched {
            self.import(known);
        }
        Ok(matched)
    }

    /// Runs `SELECT * FROM <table> WHERE <clause>` and imports the first row.
    pub fn load_where(&mut self, clause: &str, params: &Params) -> Result<bool> {
        let sql = format!("SELECT * FROM {} WHERE {clause}", self.table().qualified());
        match self.link.fetch_row(&sql, params)? {
            Some(row) => {
                self.import(row);
                self.found = Found::Confirmed;
                Ok(true)
            }
            None => {
                self.found = Found::Absent;
                Ok(false)
            }
        }
    }

    /// Schema columns to write, coerced, excluding the auto-increment column.
    fn assignments(&self) -> Vec<(String, Value)> {
        self.fields
            .iter()
            .filter(|(column, _)| {
                self.schema.has_column(column) && !self.schema.is_auto_increment(column)
            })
            .map(|(column, value)| (column.clone(), self.coerced(column, value)))
            .collect()
    }

    /// Writes the record.
    ///
    /// With `as_replace` the row is written with `REPLACE INTO` without any
    /// existence check. Otherwise an unresolved [`Found`] is settled first
    /// (a probe when the key is complete, "new row" when it is not); existing
    /// rows are updated by primary key and new rows inserted. After an insert
    /// the generated auto-increment id is stored in the record.
    ///
    /// Returns `false` when the statement affected no rows.
    pub fn save(&mut self, as_replace: bool) -> Result<bool> {
        if !as_replace && self.found == Found::Unknown {
            if self.has_complete_key() {
                self.probe()?;
            } else {
                self.found = Found::Absent;
            }
        }

        if !as_replace && self.found == Found::Confirmed {
            let values = self.assignments();
            let (clause, mut params) = self.key_filter()?;
            if values.is_empty() {
                return Ok(true);
            }
            let sets = sql::assignment_list(&values, &mut params);
            let sql = format!("UPDATE {} SET {sets} WHERE {clause}", self.table().qualified());
            let affected = self.link.execute(&sql, &params)?;
            return Ok(affected > 0);
        }

        let verb = if as_replace { "REPLACE" } else { "INSERT" };
        let (body, params) = sql::insert_body(&self.assignments());
        let sql = format!("{verb} INTO {} {body}", self.table().qualified());
        let (affected, id) = self.link.execute_insert(&sql, &params)?;
        if affected == 0 {
            return Ok(false);
        }
        if let Some(column) = &self.schema.auto_increment {
            self.fields.insert(column.clone(), Value::Integer(id));
        }
        self.found = Found::Confirmed;
        Ok(true)
    }

    /// Sets one field and persists it immediately.
    ///
    /// Existing rows get a single-column `UPDATE`; rows that do not exist yet
    /// are inserted through [`save`](Self::save). Returns `Ok(false)` without
    /// touching the database or the fields when `field` is not a column of
    /// the table or is the auto-increment column.
    ///
    /// Changing a primary-key column through `set` moves the stored row: the
    /// `WHERE` clause is built from the key values held before the change.
    ///
    /// # Errors
    ///
    /// Returns [`RecordError::MissingPrimaryKeyError`] if the key is incomplete.
    pub fn set(&mut self, field: &str, value: impl Into<Value>) -> Result<bool> {
        let (clause, mut params) = self.key_filter()?;
        if !self.schema.has_column(field) {
            debug!(table = %self.table(), field, "ignoring set of unknown column");
            return Ok(false);
        }
        if self.schema.is_auto_increment(field) {
            debug!(table = %self.table(), field, "ignoring set of auto-increment column");
            return Ok(false);
        }
        if self.found == Found::Unknown {
            self.probe()?;
        }

        let value = value.into();
        let bound = self.coerced(field, &value);
        self.fields.insert(field.to_string(), value);

        if self.found != Found::Confirmed {
            return self.save(false);
        }

        let name = sql::param_name(&params, "", field);
        params.insert(name.clone(), bound);
        let sql = format!(
            "UPDATE {} SET {} = :{name} WHERE {clause}",
            self.table().qualified(),
            quote_ident(field)
        );
        Ok(self.link.execute(&sql, &params)? > 0)
    }

    /// Deletes the row identified by the primary key.
    ///
    /// On success the key fields are cleared and [`Found`] returns to
    /// `Unknown`, so the record must be re-keyed before it can update again.
    pub fn delete(&mut self) -> Result<bool> {
        let (clause, params) = self.key_filter()?;
        let sql = format!("DELETE FROM {} WHERE {clause}", self.table().qualified());
        if self.link.execute(&sql, &params)? == 0 {
            return Ok(false);
        }
        for column in &self.schema.primary_keys {
            self.fields.shift_remove(column);
        }
        self.found = Found::Unknown;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tablerow_core::row;
    use tablerow_link::{LinkConfig, LinkRegistry};

    fn fixture() -> (Arc<Link>, SchemaCache) {
        let registry = LinkRegistry::new();
        let link = registry.connect("mem", Some(LinkConfig::memory())).unwrap();
        link.with_connection(|conn| {
            conn.execute_batch(
                "CREATE TABLE items (id INTEGER PRIMARY KEY, name TEXT, qty INTEGER, added DATETIME);
                 CREATE TABLE pairs (a TEXT, b TEXT, note TEXT, PRIMARY KEY (a, b));
                 CREATE TABLE loose (x TEXT);",
            )
        })
        .unwrap();
        (link, SchemaCache::new())
    }

    #[test]
    fn test_blank_table_rejected() {
        let (link, cache) = fixture();
        let err = Record::new(link, &cache, "").unwrap_err();
        assert!(matches!(err, RecordError::MissingTableNameError));
    }

    #[test]
    fn test_filter_and_allow_are_complementary() {
        let (link, cache) = fixture();
        let mut a = Record::new(link, &cache, "items").unwrap();
        a.import(row([("a", 1), ("b", 2), ("c", 3)]));
        let mut b = a.clone();

        a.filter(&["a"]);
        assert_eq!(a.fields().keys().collect::<Vec<_>>(), ["b", "c"]);

        b.allow(&["a"]);
        assert_eq!(b.fields().keys().collect::<Vec<_>>(), ["a"]);
    }

    #[test]
    fn test_load_without_key_fails() {
        let (link, cache) = fixture();
        let mut r = Record::new(link, &cache, "items").unwrap();
        let err = r.load().unwrap_err();
        assert!(matches!(
            err,
            RecordError::MissingPrimaryKeyError { ref column, .. } if column.as_deref() == Some("id")
        ));
        assert_eq!(r.found(), Found::Unknown);
    }

    #[test]
    fn test_set_auto_increment_is_ignored() {
        let (link, cache) = fixture();
        let mut r = Record::new(link, &cache, "items").unwrap();
        r.assign("id", 1);
        assert!(!r.set("id", 99).unwrap());
        assert_eq!(r.get("id"), Some(&Value::Integer(1)));
        assert_eq!(r.found(), Found::Unknown);
    }

    #[test]
    fn test_keyless_table_cannot_delete() {
        let (link, cache) = fixture();
        let mut r = Record::new(link, &cache, "loose").unwrap();
        r.assign("x", "1");
        let err = r.delete().unwrap_err();
        assert!(matches!(err, RecordError::MissingPrimaryKeyError { column: None, .. }));
    }

    #[test]
    fn test_assignments_skip_unknown_and_auto_increment() {
        let (link, cache) = fixture();
        let mut r = Record::new(link, &cache, "items").unwrap();
        r.assign("id", 9).assign("name", "bolt").assign("bogus", 1).assign("qty", "7");
        assert_eq!(
            r.assignments(),
            vec![
                ("name".to_string(), Value::from("bolt")),
                ("qty".to_string(), Value::Integer(7)),
            ]
        );
    }

    #[test]
    fn test_failed_load_keeps_draft() {
        let (link, cache) = fixture();
        let mut r = Record::new(link, &cache, "pairs").unwrap();
        let found = r
            .load_by(row([("a", "x"), ("b", "y"), ("ignored", "z")]))
            .unwrap();
        assert!(!found);
        assert_eq!(r.found(), Found::Absent);
        assert_eq!(r.fields(), &row([("a", "x"), ("b", "y")]));
    }

    #[test]
    fn test_load_by_unknown_column_is_usage_error() {
        let (link, cache) = fixture();
        let mut r = Record::new(link, &cache, "items").unwrap();
        assert!(matches!(
            r.load_by_field("nope", 1).unwrap_err(),
            RecordError::UsageError(_)
        ));
    }

    #[test]
    fn test_set_unknown_column_is_ignored() {
        let (link, cache) = fixture();
        let mut r = Record::new(link, &cache, "items").unwrap();
        r.assign("id", 1);
        assert!(!r.set("nope", 1).unwrap());
        assert_eq!(r.fields().len(), 1);
        assert_eq!(r.found(), Found::Unknown);
    }

    #[test]
    fn test_set_requires_key() {
        let (link, cache) = fixture();
        let mut r = Record::new(link, &cache, "items").unwrap();
        assert!(matches!(
            r.set("name", "x").unwrap_err(),
            RecordError::MissingPrimaryKeyError { .. }
        ));
    }
}
