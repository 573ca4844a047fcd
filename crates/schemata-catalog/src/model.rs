//! The catalog data model.
//!
//! A [`Catalog`] is a snapshot of one database's schema. It owns its
//! [`Schema`]s; a schema owns its [`Table`]s and [`View`]s; a table owns its
//! [`Column`]s, [`Constraint`]s, [`Index`]es and [`Trigger`]s. Children are
//! stored by value in insertion order and are never removed: setting
//! `ignore` tombstones an entity instead (see [`crate::cache::CatalogCache`]).
//!
//! Every type serializes to JSON with PascalCase keys. Zero-valued fields are
//! omitted and defaulted again on the way back in, so snapshots stay small.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Suffix-less kind name for indexes, used by [`crate::naming::generate_name`].
pub const INDEX: &str = "INDEX";

// Referential actions.
pub const RESTRICT: &str = "RESTRICT";
pub const CASCADE: &str = "CASCADE";
pub const NO_ACTION: &str = "NO ACTION";
pub const SET_NULL: &str = "SET NULL";
pub const SET_DEFAULT: &str = "SET DEFAULT";

#[allow(clippy::trivially_copy_pass_by_ref)]
const fn is_false(b: &bool) -> bool {
    !*b
}

/// The kind of a table constraint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConstraintType {
    #[serde(rename = "PRIMARY KEY")]
    PrimaryKey,
    #[serde(rename = "FOREIGN KEY")]
    ForeignKey,
    #[serde(rename = "UNIQUE")]
    Unique,
    #[serde(rename = "CHECK")]
    Check,
}

impl ConstraintType {
    /// Returns the SQL spelling, e.g. `"PRIMARY KEY"`.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::PrimaryKey => "PRIMARY KEY",
            Self::ForeignKey => "FOREIGN KEY",
            Self::Unique => "UNIQUE",
            Self::Check => "CHECK",
        }
    }
}

impl fmt::Display for ConstraintType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConstraintType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "PRIMARY KEY" => Ok(Self::PrimaryKey),
            "FOREIGN KEY" => Ok(Self::ForeignKey),
            "UNIQUE" => Ok(Self::Unique),
            "CHECK" => Ok(Self::Check),
            other => Err(format!("unknown constraint type: {other}")),
        }
    }
}

/// A snapshot of a database schema.
///
/// # Examples
///
/// ```
/// use schemata_catalog::model::Catalog;
///
/// let catalog = Catalog::default();
/// assert_eq!(serde_json::to_string(&catalog).unwrap(), "{}");
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct Catalog {
    /// Database engine version, e.g. `[3, 45, 1]`.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub version_nums: Vec<i64>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub catalog_name: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub current_schema: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub schemas: Vec<Schema>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct Schema {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub schema_name: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tables: Vec<Table>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub views: Vec<View>,
    /// Set once views have been read, so an empty `views` list is meaningful.
    #[serde(skip_serializing_if = "is_false")]
    pub views_valid: bool,
    #[serde(skip_serializing_if = "is_false")]
    pub ignore: bool,
}

impl Schema {
    pub fn new(schema_name: impl Into<String>) -> Self {
        Self {
            schema_name: schema_name.into(),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct View {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub view_schema: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub view_name: String,
    #[serde(rename = "SQL", skip_serializing_if = "String::is_empty")]
    pub sql: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub columns: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub column_types: Vec<String>,
    #[serde(skip_serializing_if = "is_false")]
    pub ignore: bool,
}

impl View {
    pub fn new(view_schema: impl Into<String>, view_name: impl Into<String>) -> Self {
        Self {
            view_schema: view_schema.into(),
            view_name: view_name.into(),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct Table {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub table_schema: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub table_name: String,
    #[serde(rename = "SQL", skip_serializing_if = "String::is_empty")]
    pub sql: String,
    #[serde(skip_serializing_if = "is_false")]
    pub is_virtual: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub columns: Vec<Column>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub constraints: Vec<Constraint>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub indexes: Vec<Index>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub triggers: Vec<Trigger>,
    #[serde(skip_serializing_if = "is_false")]
    pub ignore: bool,
}

impl Table {
    pub fn new(table_schema: impl Into<String>, table_name: impl Into<String>) -> Self {
        Self {
            table_schema: table_schema.into(),
            table_name: table_name.into(),
            ..Self::default()
        }
    }

    /// Returns `true` for virtual tables (FTS, R-tree, ...), which are never
    /// migrated.
    pub fn is_virtual_table(&self) -> bool {
        const PREFIX: &str = "CREATE VIRTUAL TABLE";
        if self.is_virtual {
            return true;
        }
        self.sql
            .trim_start()
            .get(..PREFIX.len())
            .is_some_and(|head| head.eq_ignore_ascii_case(PREFIX))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
#[allow(clippy::struct_excessive_bools)]
pub struct Column {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub table_schema: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub table_name: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub column_name: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub column_type: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub character_length: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub numeric_precision: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub numeric_scale: String,
    #[serde(skip_serializing_if = "is_false")]
    pub is_not_null: bool,
    #[serde(skip_serializing_if = "is_false")]
    pub is_primary_key: bool,
    #[serde(skip_serializing_if = "is_false")]
    pub is_unique: bool,
    #[serde(skip_serializing_if = "is_false")]
    pub is_autoincrement: bool,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub references_schema: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub references_table: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub references_column: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub update_rule: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub delete_rule: String,
    #[serde(skip_serializing_if = "is_false")]
    pub is_generated: bool,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub generated_expr: String,
    #[serde(skip_serializing_if = "is_false")]
    pub generated_expr_stored: bool,
    /// The default expression; non-literals are kept wrapped in brackets.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub column_default: String,
    #[serde(skip_serializing_if = "is_false")]
    pub ignore: bool,
}

impl Column {
    pub fn new(
        table_schema: impl Into<String>,
        table_name: impl Into<String>,
        column_name: impl Into<String>,
    ) -> Self {
        Self {
            table_schema: table_schema.into(),
            table_name: table_name.into(),
            column_name: column_name.into(),
            ..Self::default()
        }
    }

    /// Sets the column type.
    pub fn column_type(mut self, column_type: impl Into<String>) -> Self {
        self.column_type = column_type.into();
        self
    }

    /// Marks the column NOT NULL.
    pub fn not_null(mut self) -> Self {
        self.is_not_null = true;
        self
    }

    /// Sets the default expression.
    pub fn default_value(mut self, column_default: impl Into<String>) -> Self {
        self.column_default = column_default.into();
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct Constraint {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub table_schema: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub table_name: String,
    /// Empty for engines (SQLite) that do not name constraints.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub constraint_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub constraint_type: Option<ConstraintType>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub columns: Vec<String>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub references_schema: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub references_table: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub references_columns: Vec<String>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub update_rule: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub delete_rule: String,
    #[serde(skip_serializing_if = "is_false")]
    pub ignore: bool,
}

impl Constraint {
    pub fn new(
        table_schema: impl Into<String>,
        table_name: impl Into<String>,
        constraint_name: impl Into<String>,
    ) -> Self {
        Self {
            table_schema: table_schema.into(),
            table_name: table_name.into(),
            constraint_name: constraint_name.into(),
            ..Self::default()
        }
    }

    /// Sets the constraint kind and its columns.
    pub fn of_type<I, S>(mut self, constraint_type: ConstraintType, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.constraint_type = Some(constraint_type);
        self.columns = columns.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the referenced table and columns of a foreign key.
    pub fn references<I, S>(mut self, table: impl Into<String>, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.references_table = table.into();
        self.references_columns = columns.into_iter().map(Into::into).collect();
        self
    }

    pub fn is_type(&self, constraint_type: ConstraintType) -> bool {
        self.constraint_type == Some(constraint_type)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct Index {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub table_schema: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub table_name: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub index_name: String,
    #[serde(skip_serializing_if = "is_false")]
    pub is_unique: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub columns: Vec<String>,
    #[serde(rename = "SQL", skip_serializing_if = "String::is_empty")]
    pub sql: String,
    #[serde(skip_serializing_if = "is_false")]
    pub ignore: bool,
}

impl Index {
    pub fn new(
        table_schema: impl Into<String>,
        table_name: impl Into<String>,
        index_name: impl Into<String>,
    ) -> Self {
        Self {
            table_schema: table_schema.into(),
            table_name: table_name.into(),
            index_name: index_name.into(),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct Trigger {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub table_schema: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub table_name: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub trigger_name: String,
    #[serde(rename = "SQL", skip_serializing_if = "String::is_empty")]
    pub sql: String,
    #[serde(skip_serializing_if = "is_false")]
    pub ignore: bool,
}

impl Trigger {
    pub fn new(
        table_schema: impl Into<String>,
        table_name: impl Into<String>,
        trigger_name: impl Into<String>,
    ) -> Self {
        Self {
            table_schema: table_schema.into(),
            table_name: table_name.into(),
            trigger_name: trigger_name.into(),
            ..Self::default()
        }
    }
}
