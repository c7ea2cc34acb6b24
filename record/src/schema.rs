//! Table schema introspection and the shared descriptor cache.
//!
//! A [`SchemaDescriptor`] records a table's columns (in database order),
//! its primary-key columns and its auto-increment column. Descriptors are
//! introspected once per link and table and then reused by every record for
//! that table; there is no invalidation, so schema changes are only seen by
//! a fresh [`SchemaCache`].

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use indexmap::IndexMap;
use tablerow_core::{Params, TableRef, Value, row};
use tablerow_link::Link;
use tracing::debug;

use crate::error::{RecordError, Result};

/// Column metadata for one table.
#[derive(Debug, Clone, PartialEq)]
pub struct SchemaDescriptor {
    pub table: TableRef,
    /// Column name → declared type, in database column order.
    pub columns: IndexMap<String, String>,
    /// Primary-key columns in key order.
    pub primary_keys: Vec<String>,
    /// Column whose value the database generates on insert.
    pub auto_increment: Option<String>,
}

impl SchemaDescriptor {
    pub fn has_column(&self, column: &str) -> bool {
        self.columns.contains_key(column)
    }

    /// Declared type of `column`, if the column exists.
    pub fn column_type(&self, column: &str) -> Option<&str> {
        self.columns.get(column).map(String::as_str)
    }

    pub fn is_primary_key(&self, column: &str) -> bool {
        self.primary_keys.iter().any(|k| k == column)
    }

    pub fn is_auto_increment(&self, column: &str) -> bool {
        self.auto_increment.as_deref() == Some(column)
    }

    pub fn first_primary_key(&self) -> Option<&str> {
        self.primary_keys.first().map(String::as_str)
    }
}

/// Reads column metadata for `table` from the database behind `link`.
///
/// The auto-increment column is the table's single primary-key column when
/// it is declared `INTEGER` (an alias of SQLite's row id).
///
/// # Errors
///
/// Returns [`RecordError::SchemaLoadError`] when the table has no columns (which
/// includes tables that do not exist).
pub fn introspect(link: &Link, table: &TableRef) -> Result<SchemaDescriptor> {
    let params: Params = row([
        ("table", table.table.as_str()),
        ("schema", table.database_or_main()),
    ]);
    let rows = link.fetch_all(
        "SELECT name, type, pk FROM pragma_table_info(:table, :schema) ORDER BY cid",
        &params,
    )?;
    if rows.is_empty() {
        return Err(RecordError::SchemaLoadError(table.to_string()));
    }

    let mut columns = IndexMap::with_capacity(rows.len());
    let mut keyed: Vec<(i64, String)> = Vec::new();
    for r in rows {
        let name = text(r.get("name"));
        let declared = text(r.get("type"));
        let pk = r.get("pk").and_then(Value::as_i64).unwrap_or(0);
        if pk > 0 {
            keyed.push((pk, name.clone()));
        }
        columns.insert(name, declared);
    }
    keyed.sort_by_key(|(ordinal, _)| *ordinal);
    let primary_keys: Vec<String> = keyed.into_iter().map(|(_, name)| name).collect();

    let auto_increment = match primary_keys.as_slice() {
        [only] if columns
            .get(only)
            .is_some_and(|t| t.eq_ignore_ascii_case("INTEGER")) =>
        {
            Some(only.clone())
        }
        _ => None,
    };

    debug!(
        link = link.name(),
        table = %table,
        columns = columns.len(),
        primary_keys = ?primary_keys,
        auto_increment = ?auto_increment,
        "loaded table schema"
    );

    Ok(SchemaDescriptor {
        table: table.clone(),
        columns,
        primary_keys,
        auto_increment,
    })
}

fn text(value: Option<&Value>) -> String {
    value.and_then(Value::as_str).unwrap_or_default().to_string()
}

/// Shared cache of [`SchemaDescriptor`]s keyed by link, database and table.
///
/// Readers share a read lock; a miss takes the write lock, re-checks and
/// introspects, so concurrent callers for the same table get the same
/// [`Arc`] and the table is introspected once.
#[derive(Debug, Default)]
pub struct SchemaCache {
    entries: RwLock<HashMap<String, Arc<SchemaDescriptor>>>,
}

impl SchemaCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn key(link_name: &str, table: &TableRef) -> String {
        format!("{link_name}:{}.{}", table.database_or_main(), table.table)
    }

    /// Returns the cached descriptor, introspecting the table on a miss.
    pub fn load(&self, link: &Link, table: &TableRef) -> Result<Arc<SchemaDescriptor>> {
        let key = Self::key(link.name(), table);
        if let Some(found) = self
            .entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&key)
        {
            return Ok(Arc::clone(found));
        }

        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(found) = entries.get(&key) {
            return Ok(Arc::clone(found));
        }
        let descriptor = Arc::new(introspect(link, table)?);
        entries.insert(key, Arc::clone(&descriptor));
        Ok(descriptor)
    }

    /// Returns the cached descriptor without touching the database.
    pub fn get(&self, link_name: &str, table: &TableRef) -> Option<Arc<SchemaDescriptor>> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&Self::key(link_name, table))
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
