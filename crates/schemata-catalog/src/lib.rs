//! # schemata-catalog
//!
//! The in-memory schema catalog: the [`Catalog`](model::Catalog) data model,
//! the [`CatalogCache`](cache::CatalogCache) keyed index over it, and the
//! naming and normalization helpers used when comparing catalogs.
//!
//! ## Module Overview
//!
//! - [`model`] - Catalog, Schema, Table, View, Column, Constraint, Index, Trigger
//! - [`cache`] - O(1) lookup, get-or-create and add-or-update by natural key
//! - [`naming`] - synthetic constraint names and type/default normalization

// struct_excessive_bools: Column mirrors the catalog's flag columns
#![allow(clippy::struct_excessive_bools)]
#![allow(clippy::doc_markdown)]
#![allow(clippy::missing_const_for_fn)]
#![allow(clippy::return_self_not_must_use)]

pub mod cache;
pub mod model;
pub mod naming;

pub use cache::CatalogCache;
pub use model::{Catalog, Column, Constraint, ConstraintType, Index, Schema, Table, Trigger, View};
