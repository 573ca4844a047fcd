//! # schemata-core
//!
//! Core types shared by every schemata crate: the error enum, settings and
//! their loader, and logging setup. This crate has no dependency on the other
//! workspace crates.
//!
//! ## Modules
//!
//! - [`error`] - Error types and result aliases
//! - [`settings`] - Database, introspection and migration settings
//! - [`settings_loader`] - TOML/JSON loading with `SCHEMATA_*` overrides
//! - [`logging`] - Tracing-based logging integration

pub mod error;
pub mod logging;
pub mod settings;
pub mod settings_loader;

// Re-export the most commonly used types at the crate root.
pub use error::{SchemaError, SchemaResult};
pub use settings::Settings;
