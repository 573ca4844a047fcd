//! The migration plan produced by the [`Automigrator`](crate::Automigrator).
//!
//! A [`DiffPlan`] lists whole-table drops and creates plus one [`TableDiff`]
//! per table that exists on both sides but differs. It describes structural
//! changes only; rendering DDL from it is left to the consumer.

use std::collections::BTreeSet;
use std::fmt;

use schemata_catalog::model::{Column, Constraint, Index, Table};
use serde::Serialize;

/// A column present on both sides whose definition changed.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ColumnChange {
    pub src: Column,
    pub dest: Column,
}

/// The changes needed to bring one existing table in line with its
/// destination definition.
///
/// Each list holds entries in the order they were detected. The two name
/// sets let DDL renderers tell a rebuilt column from a carried-over one.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct TableDiff {
    pub table_name: String,
    #[serde(skip)]
    pub src_table: Table,
    #[serde(skip)]
    pub dest_table: Table,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub drop_constraints: Vec<Constraint>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub drop_indexes: Vec<Index>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub drop_columns: Vec<Column>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub add_columns: Vec<Column>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub alter_columns: Vec<ColumnChange>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub add_constraints: Vec<Constraint>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub create_indexes: Vec<Index>,
    #[serde(skip_serializing_if = "BTreeSet::is_empty")]
    pub dropped_columns: BTreeSet<String>,
    #[serde(skip_serializing_if = "BTreeSet::is_empty")]
    pub added_columns: BTreeSet<String>,
}

impl TableDiff {
    pub fn new(src_table: &Table, dest_table: &Table) -> Self {
        Self {
            table_name: dest_table.table_name.clone(),
            src_table: src_table.clone(),
            dest_table: dest_table.clone(),
            ..Self::default()
        }
    }

    /// Returns `true` when nothing differs.
    pub fn is_empty(&self) -> bool {
        self.drop_constraints.is_empty()
            && self.drop_indexes.is_empty()
            && self.drop_columns.is_empty()
            && self.add_columns.is_empty()
            && self.alter_columns.is_empty()
            && self.add_constraints.is_empty()
            && self.create_indexes.is_empty()
    }

    /// Returns `true` when the diff only adds columns or creates indexes.
    pub fn has_additions(&self) -> bool {
        !self.add_columns.is_empty() || !self.create_indexes.is_empty()
    }

    /// Clears every change that removes or rewrites existing objects,
    /// leaving added columns and created indexes.
    pub fn retain_additive(&mut self) {
        self.drop_indexes.clear();
        self.drop_constraints.clear();
        self.drop_columns.clear();
        self.dropped_columns.clear();
        self.alter_columns.clear();
        self.add_constraints.clear();
    }

    /// All changes in application order: drop constraints, drop indexes,
    /// drop columns, add columns, alter columns, add constraints, create
    /// indexes.
    pub fn changes(&self) -> Vec<TableChange<'_>> {
        let mut changes = Vec::new();
        changes.extend(self.drop_constraints.iter().map(TableChange::DropConstraint));
        changes.extend(self.drop_indexes.iter().map(TableChange::DropIndex));
        changes.extend(self.drop_columns.iter().map(TableChange::DropColumn));
        changes.extend(self.add_columns.iter().map(TableChange::AddColumn));
        changes.extend(self.alter_columns.iter().map(TableChange::AlterColumn));
        changes.extend(self.add_constraints.iter().map(TableChange::AddConstraint));
        changes.extend(self.create_indexes.iter().map(TableChange::CreateIndex));
        changes
    }
}

/// One entry of a [`TableDiff`], borrowed from it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TableChange<'a> {
    DropConstraint(&'a Constraint),
    DropIndex(&'a Index),
    DropColumn(&'a Column),
    AddColumn(&'a Column),
    AlterColumn(&'a ColumnChange),
    AddConstraint(&'a Constraint),
    CreateIndex(&'a Index),
}

fn column_definition(column: &Column) -> String {
    let mut definition = column.column_name.clone();
    if !column.column_type.is_empty() {
        definition.push(' ');
        definition.push_str(&column.column_type);
    }
    if column.is_not_null {
        definition.push_str(" NOT NULL");
    }
    if !column.column_default.is_empty() {
        definition.push_str(" DEFAULT ");
        definition.push_str(&column.column_default);
    }
    definition
}

impl fmt::Display for TableChange<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DropConstraint(c) => write!(f, "drop constraint {}", c.constraint_name),
            Self::DropIndex(i) => write!(f, "drop index {}", i.index_name),
            Self::DropColumn(c) => write!(f, "drop column {}", c.column_name),
            Self::AddColumn(c) => write!(f, "add column {}", column_definition(c)),
            Self::AlterColumn(change) => write!(
                f,
                "alter column {} -> {}",
                column_definition(&change.src),
                column_definition(&change.dest)
            ),
            Self::AddConstraint(c) => {
                let kind = c.constraint_type.map_or("CONSTRAINT", |t| t.as_str());
                write!(f, "add constraint {} {kind} ({})", c.constraint_name, c.columns.join(", "))?;
                if !c.references_table.is_empty() {
                    write!(
                        f,
                        " REFERENCES {} ({})",
                        c.references_table,
                        c.references_columns.join(", ")
                    )?;
                }
                Ok(())
            }
            Self::CreateIndex(i) => {
                let unique = if i.is_unique { "unique " } else { "" };
                write!(f, "create {unique}index {} ({})", i.index_name, i.columns.join(", "))
            }
        }
    }
}

/// The complete set of changes between two catalogs.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct DiffPlan {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub drop_tables: Vec<Table>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub create_tables: Vec<Table>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub alter_tables: Vec<TableDiff>,
}

impl DiffPlan {
    pub fn is_empty(&self) -> bool {
        self.drop_tables.is_empty() && self.create_tables.is_empty() && self.alter_tables.is_empty()
    }

    /// One human-readable line per change: table drops, then creates, then
    /// each altered table's changes in application order.
    pub fn describe(&self) -> Vec<String> {
        let mut lines = Vec::new();
        for table in &self.drop_tables {
            lines.push(format!("drop table {}", table.table_name));
        }
        for table in &self.create_tables {
            lines.push(format!("create table {}", table.table_name));
        }
        for diff in &self.alter_tables {
            for change in diff.changes() {
                lines.push(format!("alter table {}: {change}", diff.table_name));
            }
        }
        lines
    }
}
