//! Settings for schemata.
//!
//! [`Settings`] holds everything the CLI and library entry points need to open
//! a database, scope introspection and choose a migration policy. Every field
//! has a sensible default so an empty configuration file is valid.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Database connection configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseSettings {
    /// The database file path (or `:memory:`).
    pub path: PathBuf,
    /// Number of read-only connections kept in the read pool.
    pub pool_size: usize,
    /// How long a connection waits on a locked database, in milliseconds.
    pub busy_timeout_ms: u64,
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            path: PathBuf::from(":memory:"),
            pool_size: 2,
            busy_timeout_ms: 5_000,
        }
    }
}

/// Which objects the introspector reads.
///
/// Table and view lists are inclusive when non-empty; the `exclude_*` lists
/// only apply when the matching inclusive list is empty.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IntrospectionSettings {
    /// Include `sqlite_*` internal tables.
    pub include_system_catalogs: bool,
    /// Object kinds to read (`TABLES`, `VIEWS`). Empty means all.
    pub object_types: Vec<String>,
    /// Constraint kinds to read (`PRIMARY KEY`, `UNIQUE`, `FOREIGN KEY`). Empty means all.
    pub constraint_types: Vec<String>,
    pub tables: Vec<String>,
    pub exclude_tables: Vec<String>,
    pub views: Vec<String>,
    pub exclude_views: Vec<String>,
}

/// Migration planning policy.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MigrationSettings {
    /// Allow destructive changes (drops, alters) in generated plans.
    pub drop_objects: bool,
}

/// The complete set of schemata settings.
///
/// # Examples
///
/// ```
/// use schemata_core::settings::Settings;
///
/// let settings = Settings::default();
/// assert!(settings.debug);
/// assert_eq!(settings.database.pool_size, 2);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    // ── Core ─────────────────────────────────────────────────────────

    /// Whether debug mode (pretty logs) is enabled.
    pub debug: bool,

    // ── Logging ──────────────────────────────────────────────────────

    /// The log level / `EnvFilter` directive.
    pub log_level: String,

    // ── Database ─────────────────────────────────────────────────────

    pub database: DatabaseSettings,

    // ── Introspection ────────────────────────────────────────────────

    pub introspection: IntrospectionSettings,

    // ── Migration ────────────────────────────────────────────────────

    pub migration: MigrationSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            debug: true,
            log_level: "info".to_string(),
            database: DatabaseSettings::default(),
            introspection: IntrospectionSettings::default(),
            migration: MigrationSettings::default(),
        }
    }
}
