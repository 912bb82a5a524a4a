//! SQLite message-store layer for Courier.
//!
//! This crate provides:
//! - A mutex-serialized database handle with an explicit lock guard
//! - A fixed table of predefined, cached prepared statements
//! - A persistent key/value config store with typed getters
//! - Reentrant transactions (only the outermost level reaches SQLite)
//! - Database migrations
//!
//! # Architecture
//!
//! All access goes through [`Sql::lock`], which returns a [`SqlGuard`].
//! Database operations are methods on the guard (or free functions in
//! [`queries`] taking one), so exclusive access is a compile-time fact
//! rather than a calling convention:
//!
//! ```no_run
//! use courier_database::{queries, Sql};
//!
//! # fn main() -> courier_database::SqlResult<()> {
//! let sql = Sql::new();
//! let mut guard = sql.lock();
//! guard.open(std::path::Path::new("courier.db"), false)?;
//!
//! guard.set_config("displayname", Some("Alice"))?;
//! let fresh = queries::fresh_message_ids(&guard)?;
//! # let _ = fresh;
//! # Ok(())
//! # }
//! ```
//!
//! Lock at the highest call-site level feasible: helpers take `&SqlGuard`
//! rather than re-locking, which keeps lock traffic low and makes nested
//! acquisition (a deadlock) structurally impossible.

mod config;
mod error;
mod migrations;
mod models;
pub mod queries;
mod sql;
mod statements;

pub use error::{SqlError, SqlResult};
pub use migrations::run_migrations;
pub use models::*;
pub use sql::{Sql, SqlGuard};
pub use statements::{Predefined, PREDEFINED_COUNT};
