//! Core error types for schemata.
//!
//! [`SchemaError`] is the workspace-wide error enum. Template building has its
//! own richer error type in `schemata-sql` that converts into
//! [`SchemaError::QueryBuilding`] at the executor boundary.

use thiserror::Error;

/// The primary error type for schemata.
///
/// Variants are grouped by the layer that raises them. Each maps to a process
/// exit code through [`SchemaError::exit_code`] so the CLI can report failures
/// consistently.
#[derive(Error, Debug)]
pub enum SchemaError {
    // ── Statement building ───────────────────────────────────────────

    /// A SQL template could not be rendered into a bindable statement.
    #[error("Query building error: {0}")]
    QueryBuilding(String),

    // ── Database ─────────────────────────────────────────────────────

    /// A statement failed to prepare, bind or step.
    #[error("Database error: {0}")]
    DatabaseError(String),

    /// The database could not be opened or configured.
    #[error("Operational error: {0}")]
    OperationalError(String),

    /// A column value could not be decoded into the requested type.
    #[error("Conversion error: {0}")]
    ConversionError(String),

    // ── Configuration ────────────────────────────────────────────────

    /// A configuration value is missing or invalid.
    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    // ── Serialization ────────────────────────────────────────────────

    /// A catalog or plan could not be serialized or deserialized.
    #[error("Serialization error: {0}")]
    SerializationError(String),

    // ── Commands ─────────────────────────────────────────────────────

    /// A management command was invoked incorrectly.
    #[error("Command error: {0}")]
    CommandError(String),

    // ── IO ───────────────────────────────────────────────────────────

    /// An I/O error occurred.
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl SchemaError {
    /// Returns the process exit code associated with this error.
    ///
    /// Codes follow the BSD `sysexits` conventions:
    ///
    /// - `CommandError` -> 64 (usage)
    /// - `SerializationError`, `ConversionError` -> 65 (data error)
    /// - `OperationalError` -> 69 (unavailable)
    /// - `IoError` -> 74
    /// - `ConfigurationError` -> 78
    /// - Everything else -> 1
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::CommandError(_) => 64,
            Self::SerializationError(_) | Self::ConversionError(_) => 65,
            Self::OperationalError(_) => 69,
            Self::IoError(_) => 74,
            Self::ConfigurationError(_) => 78,
            Self::QueryBuilding(_) | Self::DatabaseError(_) => 1,
        }
    }
}

impl From<serde_json::Error> for SchemaError {
    fn from(err: serde_json::Error) -> Self {
        Self::SerializationError(err.to_string())
    }
}

/// A convenience type alias for `Result<T, SchemaError>`.
pub type SchemaResult<T> = Result<T, SchemaError>;
