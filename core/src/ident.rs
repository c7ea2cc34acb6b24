//! Identifier quoting, literal escaping and table references.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::value::{DATETIME_FORMAT, Value};

/// Wraps an identifier in back-ticks, doubling embedded back-ticks.
///
/// ```
/// use tablerow_core::quote_ident;
///
/// assert_eq!(quote_ident("name"), "`name`");
/// assert_eq!(quote_ident("we`ird"), "`we``ird`");
/// ```
pub fn quote_ident(name: &str) -> String {
    format!("`{}`", name.replace('`', "``"))
}

/// Renders a value as an inline SQL literal.
///
/// Only used to reconstruct statements for diagnostics; execution always
/// binds parameters.
pub fn escape_literal(value: &Value) -> String {
    match value {
        Value::Null => "NULL".to_string(),
        Value::Integer(i) => i.to_string(),
        Value::Real(f) => f.to_string(),
        Value::Text(s) => format!("'{}'", s.replace('\'', "''")),
        Value::Blob(bytes) => {
            let hex: String = bytes.iter().map(|b| format!("{b:02X}")).collect();
            format!("X'{hex}'")
        }
        Value::DateTime(dt) => format!("'{}'", dt.format(DATETIME_FORMAT)),
    }
}

/// Default database qualifier for unqualified tables.
pub const MAIN_DATABASE: &str = "main";

/// A table name plus an optional database qualifier.
///
/// `"app.users"` parses as database `app`, table `users`; a name without a
/// dot is unqualified and resolves against the link's main database.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TableRef {
    pub database: Option<String>,
    pub table: String,
}

impl TableRef {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            database: None,
            table: table.into(),
        }
    }

    pub fn in_database(database: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            database: Some(database.into()),
            table: table.into(),
        }
    }

    /// Returns `true` when no table name is bound.
    pub fn is_blank(&self) -> bool {
        self.table.trim().is_empty()
    }

    /// Database qualifier, defaulting to `main`.
    pub fn database_or_main(&self) -> &str {
        self.database.as_deref().unwrap_or(MAIN_DATABASE)
    }

    /// Back-tick quoted, optionally qualified name for use in SQL.
    pub fn qualified(&self) -> String {
        match &self.database {
            Some(db) => format!("{}.{}", quote_ident(db), quote_ident(&self.table)),
            None => quote_ident(&self.table),
        }
    }
}

impl From<&str> for TableRef {
    fn from(name: &str) -> Self {
        match name.split_once('.') {
            Some((db, table)) if !db.is_empty() => TableRef::in_database(db, table),
            _ => TableRef::new(name),
        }
    }
}

impl From<String> for TableRef {
    fn from(name: String) -> Self {
        TableRef::from(name.as_str())
    }
}

impl fmt::Display for TableRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.database {
            Some(db) => write!(f, "{db}.{}", self.table),
            None => f.write_str(&self.table),
        }
    }
}
