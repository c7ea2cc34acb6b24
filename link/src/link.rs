//! An opened database link.

use std::sync::{Mutex, MutexGuard, PoisonError};

use rusqlite::Connection;
use tablerow_core::{Params, ResultMode, Row, Value, escape_literal};
use tracing::{debug, info};

use crate::config::{DriverKind, LinkConfig};
use crate::error::{LinkError, Result};
use crate::statement::{self, Executed};

/// One open database handle together with the configuration it was opened
/// from.
///
/// The underlying connection is not safe for concurrent statements, so every
/// call locks it for the duration of the statement. Use
/// [`with_connection`](Self::with_connection) when several statements must
/// observe the same connection state (for example an `INSERT` followed by
/// [`Connection::last_insert_rowid`]).
pub struct Link {
    name: String,
    config: LinkConfig,
    conn: Mutex<Connection>,
}

impl std::fmt::Debug for Link {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Link")
            .field("name", &self.name)
            .field("driver", &self.config.driver)
            .finish_non_exhaustive()
    }
}

impl Link {
    /// Opens a link. Open failures are always reported, regardless of
    /// `silent_errors`.
    pub(crate) fn open(name: &str, config: LinkConfig) -> Result<Self> {
        let conn_err = |source| LinkError::ConnectionError {
            name: name.to_string(),
            source,
        };

        let conn = match config.driver {
            DriverKind::Sqlite => Connection::open(&config.database),
            DriverKind::Memory => Connection::open_in_memory(),
        }
        .map_err(conn_err)?;

        conn.execute_batch("PRAGMA foreign_keys = ON;")
            .map_err(conn_err)?;

        for (alias, path) in &config.attach {
            let path = path.to_string_lossy().into_owned();
            conn.execute(&format!("ATTACH DATABASE ?1 AS {alias}"), [path])
                .map_err(conn_err)?;
        }

        if config.host.is_some() || config.username.is_some() {
            debug!(link = name, "host and credentials are not used by the sqlite driver");
        }
        info!(link = name, driver = ?config.driver, database = %config.database, "opened link");

        Ok(Self {
            name: name.to_string(),
            config,
            conn: Mutex::new(conn),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &LinkConfig {
        &self.config
    }

    fn lock(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Runs `f` with exclusive access to the connection.
    pub fn with_connection<T, E>(
        &self,
        f: impl FnOnce(&Connection) -> std::result::Result<T, E>,
    ) -> std::result::Result<T, E> {
        let conn = self.lock();
        f(&conn)
    }

    /// Runs a statement and shapes its rows per `mode`.
    ///
    /// This is the raw path: no debug log, no error suppression.
    pub fn run(&self, sql: &str, params: &Params, mode: ResultMode) -> Result<Executed> {
        debug!(link = %self.name, sql, "running statement");
        Ok(statement::run(&self.lock(), sql, params, mode)?)
    }

    /// Runs a statement and returns the affected-row count.
    pub fn execute(&self, sql: &str, params: &Params) -> Result<usize> {
        Ok(self.run(sql, params, ResultMode::None)?.row_count)
    }

    pub fn fetch_all(&self, sql: &str, params: &Params) -> Result<Vec<Row>> {
        Ok(self.run(sql, params, ResultMode::Full)?.result.into_rows())
    }

    pub fn fetch_row(&self, sql: &str, params: &Params) -> Result<Option<Row>> {
        Ok(self.run(sql, params, ResultMode::SingleRow)?.result.into_row())
    }

    pub fn fetch_cell(&self, sql: &str, params: &Params) -> Result<Option<Value>> {
        Ok(self.run(sql, params, ResultMode::SingleCell)?.result.into_cell())
    }

    /// Runs a write and returns the affected count together with the row id
    /// it generated, both read under the same lock.
    pub fn execute_insert(&self, sql: &str, params: &Params) -> Result<(usize, i64)> {
        debug!(link = %self.name, sql, "running insert");
        let conn = self.lock();
        let executed = statement::run(&conn, sql, params, ResultMode::None)?;
        Ok((executed.row_count, conn.last_insert_rowid()))
    }

    /// Row id generated by the most recent successful insert on this link.
    pub fn last_insert_id(&self) -> i64 {
        self.lock().last_insert_rowid()
    }

    /// Quotes `value` as an inline literal for this link's driver.
    pub fn escape(&self, value: &Value) -> String {
        escape_literal(value)
    }
}
