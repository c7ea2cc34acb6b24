//! Named database links for tablerow.
//!
//! This crate owns the connection side of tablerow: named link
//! configurations, lazily opened handles, and a query dispatcher that
//! shapes results and keeps per-request diagnostics.
//!
//! # Architecture
//!
//! - **`config`**: [`LinkConfig`] / [`RegistryConfig`], loadable from YAML
//!   or JSON
//! - **`registry`**: [`LinkRegistry`]: registration, lazy open, close
//! - **`link`**: [`Link`]: one open handle, serialized per connection
//! - **`session`**: [`Session`]: result-shape dispatch, debug log,
//!   `silent_errors`, last query / result / insert id
//! - **`statement`**: parameter binding and row conversion
//!
//! # Quick start
//!
//! ```no_run
//! use tablerow_core::{ResultMode, row};
//! use tablerow_link::{LinkConfig, LinkRegistry};
//!
//! let registry = LinkRegistry::new();
//! registry
//!     .add_link("main", LinkConfig::sqlite("app.db").with_debug_log("queries.log"))
//!     .unwrap();
//!
//! let mut session = registry.session();
//! let names = session
//!     .prepared_query(
//!         "SELECT name FROM users WHERE age > :age",
//!         &row([("age", 30)]),
//!         ResultMode::SingleColumn,
//!         None,
//!     )
//!     .unwrap();
//! println!("{} users; last query: {:?}", session.total_results(), session.last_query());
//! # let _ = names;
//! ```

mod config;
mod debug_log;
mod error;
mod link;
mod registry;
mod session;
mod statement;

pub use config::{DriverKind, LinkConfig, RegistryConfig};
pub use debug_log::substitute as render_sql;
pub use error::{LinkError, Result};
pub use link::Link;
pub use registry::LinkRegistry;
pub use session::Session;
pub use statement::{Executed, from_value_ref, to_sql_value};
