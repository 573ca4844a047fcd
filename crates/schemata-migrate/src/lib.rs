//! # schemata-migrate
//!
//! Automigration planning. Given the catalog a database has and the catalog
//! it should have, the [`Automigrator`] works out which tables to drop or
//! create and how each remaining table differs, producing a [`DiffPlan`].
//!
//! ## Module Overview
//!
//! - [`automigrate`] - `Automigrator`, the catalog comparison
//! - [`plan`] - `DiffPlan`, `TableDiff`, `TableChange`

#![allow(clippy::doc_markdown)]
#![allow(clippy::missing_const_for_fn)]

pub mod automigrate;
pub mod plan;

pub use automigrate::Automigrator;
pub use plan::{ColumnChange, DiffPlan, TableChange, TableDiff};
