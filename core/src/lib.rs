//! Driver-independent building blocks shared by the tablerow crates.
//!
//! This crate defines the data model that flows between the link registry
//! and the record engine:
//!
//! - [`Value`]: a single SQL value (null, integer, real, text, blob, or a
//!   structured date-time that is normalized before it reaches the driver).
//! - [`Row`] / [`Params`]: insertion-ordered `column → value` maps. Order
//!   follows the database column order for fetched rows.
//! - [`ResultMode`] / [`QueryResult`]: the result shape a caller asks for
//!   and the value it receives back.
//! - [`TableRef`]: a table name with an optional database qualifier.
//!
//! Identifier quoting ([`quote_ident`]) and literal escaping
//! ([`escape_literal`]) live here as well, so every crate renders SQL the
//! same way.
//!
//! # Example
//!
//! ```
//! use tablerow_core::{TableRef, Value, escape_literal, row};
//!
//! let users = TableRef::in_database("app", "users");
//! assert_eq!(users.qualified(), "`app`.`users`");
//!
//! let r = row([("id", Value::from(7)), ("name", Value::from("O'Hara"))]);
//! assert_eq!(escape_literal(&r["name"]), "'O''Hara'");
//! ```

mod ident;
mod result;
mod value;

pub use ident::{TableRef, escape_literal, quote_ident};
pub use result::{QueryResult, ResultMode};
pub use value::{DATETIME_FORMAT, Params, Row, Value, row};
