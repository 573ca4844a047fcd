//! # schemata-sql
//!
//! The SQL side of schemata: typed values, the placeholder template engine,
//! row decoding, and the abstract [`Executor`](executor::Executor) trait that
//! database drivers implement.
//!
//! ## Module Overview
//!
//! - [`value`] - [`Value`](value::Value) and the bindable [`BaseValue`](value::BaseValue)
//! - [`template`] - [`Query`](template::Query) rendering and rebinding
//! - [`row`] - [`Row`](row::Row) decoding and the `{*}` probe
//! - [`executor`] - the fetch/execute interface

// These clippy lints are intentionally allowed for the SQL crate:
// - cast_precision_loss / cast_possible_truncation: SQLite storage classes convert lossily
// - result_large_err: QueryBuildingError carries the full value list
// - doc_markdown: backtick requirements for documentation items are too strict
// - module_name_repetitions: `QueryBuildingError` reads better than `BuildingError`
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::result_large_err)]
#![allow(clippy::doc_markdown)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_const_for_fn)]
#![allow(clippy::option_if_let_else)]
// literal_string_with_formatting_args: template strings using {name}/{} are intentional
#![allow(clippy::literal_string_with_formatting_args)]

pub mod executor;
pub mod row;
pub mod template;
pub mod value;

pub use executor::{prepare_fetch, ExecuteResult, Executor};
pub use row::{ColumnValue, FromColumn, Row};
pub use template::{Query, QueryBuildingError};
pub use value::{BaseValue, Value};
