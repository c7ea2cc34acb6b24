//! Request-scoped query dispatch and diagnostics.
//!
//! A [`Session`] runs statements through the registry, writes the debug
//! query log, applies each link's `silent_errors` policy and remembers the
//! last query, result, row count and insert id. Diagnostics belong to the
//! session, so concurrent requests never observe each other's state.

use tablerow_core::{Params, QueryResult, ResultMode};
use tracing::{debug, warn};

use crate::debug_log;
use crate::error::Result;
use crate::registry::LinkRegistry;
use crate::statement;

/// Query dispatcher with per-request diagnostic state.
pub struct Session<'r> {
    registry: &'r LinkRegistry,
    last_query: Option<String>,
    last_result: Option<QueryResult>,
    total_results: usize,
    last_insert_id: i64,
}

impl<'r> Session<'r> {
    pub(crate) fn new(registry: &'r LinkRegistry) -> Self {
        Self {
            registry,
            last_query: None,
            last_result: None,
            total_results: 0,
            last_insert_id: 0,
        }
    }

    /// Runs raw SQL against link `name` (default: first registered).
    pub fn query(&mut self, sql: &str, mode: ResultMode, name: Option<&str>) -> Result<QueryResult> {
        self.dispatch(sql, &Params::new(), mode, name)
    }

    /// Runs SQL with named parameters bound against link `name`.
    ///
    /// The SQL recorded as [`last_query`](Self::last_query) and written to
    /// the debug log has the parameters inlined.
    ///
    /// # Errors
    ///
    /// Configuration and open failures are always returned. Statement
    /// failures are returned unless the link has `silent_errors`, in which
    /// case they are logged and the empty result for `mode` is returned.
    pub fn prepared_query(
        &mut self,
        sql: &str,
        params: &Params,
        mode: ResultMode,
        name: Option<&str>,
    ) -> Result<QueryResult> {
        self.dispatch(sql, params, mode, name)
    }

    fn dispatch(
        &mut self,
        sql: &str,
        params: &Params,
        mode: ResultMode,
        name: Option<&str>,
    ) -> Result<QueryResult> {
        let link = self.registry.link(name)?;
        let rendered = debug_log::substitute(sql, params);
        debug!(link = link.name(), sql = %rendered, "executing query");

        if let Some(path) = &link.config().debug_log {
            if let Err(e) = debug_log::append(path, &rendered) {
                warn!(link = link.name(), path = %path.display(), error = %e, "failed to append to debug log");
            }
        }
        self.last_query = Some(rendered);

        let outcome = link.with_connection(|conn| {
            statement::run(conn, sql, params, mode).map(|executed| (executed, conn.last_insert_rowid()))
        });

        match outcome {
            Ok((executed, insert_id)) => {
                self.total_results = executed.row_count;
                self.last_insert_id = insert_id;
                self.last_result = Some(executed.result.clone());
                Ok(executed.result)
            }
            Err(e) if link.config().silent_errors => {
                warn!(link = link.name(), error = %e, "query failed; error suppressed");
                let empty = QueryResult::empty(mode);
                self.total_results = 0;
                self.last_result = Some(empty.clone());
                Ok(empty)
            }
            Err(e) => {
                self.total_results = 0;
                self.last_result = None;
                Err(e.into())
            }
        }
    }

    /// The most recently executed SQL, with parameters inlined.
    pub fn last_query(&self) -> Option<&str> {
        self.last_query.as_deref()
    }

    /// The most recent result.
    pub fn last_result(&self) -> Option<&QueryResult> {
        self.last_result.as_ref()
    }

    /// Rows produced or affected by the most recent statement.
    pub fn total_results(&self) -> usize {
        self.total_results
    }

    /// Row id generated by the most recent insert in this session.
    pub fn last_insert_id(&self) -> i64 {
        self.last_insert_id
    }
}
