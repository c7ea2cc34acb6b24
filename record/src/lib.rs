//! Row-mapping persistence over registry links.
//!
//! A [`Record`] is one row of one table: it loads itself by key or by
//! arbitrary column criteria, tracks whether its key exists in the database,
//! and writes itself back with `INSERT`, `UPDATE` or `REPLACE` as needed.
//! Column metadata comes from live introspection and is cached per link and
//! table in a [`SchemaCache`]; values are coerced to each column's declared
//! type family before binding.
//!
//! # Architecture
//!
//! - **`schema`**: table introspection and the shared descriptor cache
//! - **`coerce`**: per-column value normalization (dates, integers, floats)
//! - **`record`**: the single-row [`Record`] and its [`Found`] state
//! - **`table`**: bulk helpers returning many records at once
//!
//! # Quick start
//!
//! ```
//! use tablerow_link::{LinkConfig, LinkRegistry};
//! use tablerow_record::{Record, SchemaCache, Table};
//!
//! let registry = LinkRegistry::new();
//! registry.add_link("main", LinkConfig::memory()).unwrap();
//! let link = registry.link(None).unwrap();
//! link.with_connection(|c| {
//!     c.execute_batch("CREATE TABLE notes (id INTEGER PRIMARY KEY, body TEXT, created DATETIME)")
//! })
//! .unwrap();
//!
//! let schemas = SchemaCache::new();
//! let mut note = Record::new(link.clone(), &schemas, "notes").unwrap();
//! note.assign("body", "hello").assign("created", "now");
//! note.save(false).unwrap();
//!
//! let notes = Table::open(link, &schemas, "notes").unwrap();
//! assert_eq!(notes.total().unwrap(), 1);
//! ```

mod coerce;
mod error;
mod record;
mod schema;
mod sql;
mod table;

pub use coerce::{ColumnKind, ZERO_DATE, process_value};
pub use error::{RecordError, Result};
pub use record::{Found, Record};
pub use schema::{SchemaCache, SchemaDescriptor, introspect};
pub use table::{Criteria, IndexEntry, Table};
