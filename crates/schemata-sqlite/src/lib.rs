//! # schemata-sqlite
//!
//! The SQLite side of schemata: a `rusqlite`-backed driver implementing
//! [`Executor`](schemata_sql::Executor), prepared statements, and the schema
//! introspector that fills a [`Catalog`](schemata_catalog::Catalog) from a
//! live database.
//!
//! ## Module Overview
//!
//! - [`sqlite`] - [`SqliteDatabase`]: one writer, a read pool, binding and decoding
//! - [`prepared`] - [`PreparedFetch`] / [`PreparedExecute`]: render once, rebind by name
//! - [`introspect`] - [`DatabaseIntrospector`] and its [`Filter`]

#![allow(clippy::doc_markdown)]
#![allow(clippy::missing_const_for_fn)]
#![allow(clippy::too_many_lines)]

pub mod introspect;
pub mod prepared;
pub mod sqlite;

pub use introspect::{DatabaseIntrospector, Filter};
pub use prepared::{PreparedExecute, PreparedFetch};
pub use sqlite::SqliteDatabase;
