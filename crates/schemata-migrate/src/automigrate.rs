//! Migration planning by comparing two catalogs.
//!
//! The [`Automigrator`] compares a source [`Catalog`] (the database as it
//! is) against a destination [`Catalog`] (as it should be) and produces a
//! [`DiffPlan`]. The first schema of each catalog is the unit of comparison.
//!
//! SQLite does not name primary key, unique or foreign key constraints, so
//! before comparing, the planner gives every such constraint a deterministic
//! name built from its table and columns (see
//! [`generate_name`](schemata_catalog::naming::generate_name)). Two
//! constraints are the same constraint exactly when those names match.
//!
//! With `drop_objects` unset the plan is purely additive: tables are created,
//! columns added and indexes created, but nothing is dropped or rewritten.

use schemata_catalog::model::{Catalog, Column, ConstraintType, Schema, Table};
use schemata_catalog::naming::{generate_name, normalize_column_default, normalize_column_type};
use schemata_catalog::CatalogCache;
use tracing::{debug, info};

use crate::plan::{ColumnChange, DiffPlan, TableDiff};

/// Compares two catalogs and plans the changes between them.
///
/// The inputs are cloned and normalized on construction; the caller's
/// catalogs are never modified.
#[derive(Debug, Clone)]
pub struct Automigrator {
    src: Catalog,
    dest: Catalog,
    src_cache: CatalogCache,
    dest_cache: CatalogCache,
    /// Whether the plan may drop or rewrite existing objects.
    pub drop_objects: bool,
}

impl Automigrator {
    pub fn new(src: &Catalog, dest: &Catalog, drop_objects: bool) -> Self {
        let mut src = src.clone();
        let mut dest = dest.clone();
        name_constraints(&mut src);
        name_constraints(&mut dest);
        let src_cache = CatalogCache::new(&src);
        let dest_cache = CatalogCache::new(&dest);
        Self {
            src,
            dest,
            src_cache,
            dest_cache,
            drop_objects,
        }
    }

    /// Builds the plan.
    pub fn plan(&self) -> DiffPlan {
        let mut plan = DiffPlan::default();
        match (self.src.schemas.first(), self.dest.schemas.first()) {
            (None, None) => {}
            (Some(src_schema), None) => {
                if self.drop_objects {
                    plan.drop_tables = migratable(src_schema).cloned().collect();
                }
            }
            (None, Some(dest_schema)) => {
                plan.create_tables = migratable(dest_schema).cloned().collect();
            }
            (Some(src_schema), Some(dest_schema)) => {
                self.plan_schema(src_schema, dest_schema, &mut plan);
            }
        }
        info!(
            drop_tables = plan.drop_tables.len(),
            create_tables = plan.create_tables.len(),
            alter_tables = plan.alter_tables.len(),
            drop_objects = self.drop_objects,
            "migration planned"
        );
        plan
    }

    fn plan_schema(&self, src_schema: &Schema, dest_schema: &Schema, plan: &mut DiffPlan) {
        if self.drop_objects {
            for src_table in migratable(src_schema) {
                if self
                    .dest_cache
                    .get_table(Some(dest_schema), &src_table.table_name)
                    .is_none()
                {
                    plan.drop_tables.push(src_table.clone());
                }
            }
        }

        for dest_table in migratable(dest_schema) {
            let Some(src_table) = self.src_cache.get_table(Some(src_schema), &dest_table.table_name)
            else {
                plan.create_tables.push(dest_table.clone());
                continue;
            };

            let mut diff = self.diff_table(src_table, dest_table);
            if diff.is_empty() {
                continue;
            }
            if self.drop_objects {
                plan.alter_tables.push(diff);
            } else if diff.has_additions() {
                diff.retain_additive();
                plan.alter_tables.push(diff);
            } else {
                debug!(table = %dest_table.table_name, "destructive-only changes skipped");
            }
        }
    }

    fn diff_table(&self, src_table: &Table, dest_table: &Table) -> TableDiff {
        let src = Some(src_table);
        let dest = Some(dest_table);
        let mut diff = TableDiff::new(src_table, dest_table);

        for constraint in src_table.constraints.iter().filter(|c| !c.ignore) {
            if self
                .dest_cache
                .get_constraint(dest, &constraint.constraint_name)
                .is_none()
            {
                diff.drop_constraints.push(constraint.clone());
            }
        }

        for index in src_table.indexes.iter().filter(|i| !i.ignore) {
            if self.dest_cache.get_index(dest, &index.index_name).is_none() {
                diff.drop_indexes.push(index.clone());
            }
        }

        for column in src_table.columns.iter().filter(|c| !c.ignore) {
            if self.dest_cache.get_column(dest, &column.column_name).is_none() {
                diff.drop_columns.push(column.clone());
                diff.dropped_columns.insert(column.column_name.clone());
            }
        }

        for dest_column in dest_table.columns.iter().filter(|c| !c.ignore) {
            match self.src_cache.get_column(src, &dest_column.column_name) {
                None => {
                    diff.add_columns.push(dest_column.clone());
                    diff.added_columns.insert(dest_column.column_name.clone());
                }
                Some(src_column) if columns_differ(src_column, dest_column) => {
                    diff.alter_columns.push(ColumnChange {
                        src: src_column.clone(),
                        dest: dest_column.clone(),
                    });
                }
                Some(_) => {}
            }
        }

        for index in dest_table.indexes.iter().filter(|i| !i.ignore) {
            if self.src_cache.get_index(src, &index.index_name).is_none() {
                diff.create_indexes.push(index.clone());
            }
        }

        for constraint in dest_table.constraints.iter().filter(|c| !c.ignore) {
            if self
                .src_cache
                .get_constraint(src, &constraint.constraint_name)
                .is_none()
            {
                diff.add_constraints.push(constraint.clone());
            }
        }

        diff
    }
}

/// Live, non-virtual tables of a schema.
fn migratable(schema: &Schema) -> impl Iterator<Item = &Table> {
    schema
        .tables
        .iter()
        .filter(|t| !t.ignore && !t.is_virtual_table())
}

/// Names every primary key, unique and foreign key constraint after its
/// table and columns.
fn name_constraints(catalog: &mut Catalog) {
    for schema in &mut catalog.schemas {
        for table in schema.tables.iter_mut().filter(|t| !t.is_virtual_table()) {
            for constraint in &mut table.constraints {
                let Some(kind @ (ConstraintType::PrimaryKey | ConstraintType::Unique | ConstraintType::ForeignKey)) =
                    constraint.constraint_type
                else {
                    continue;
                };
                let table_name = if constraint.table_name.is_empty() {
                    &table.table_name
                } else {
                    &constraint.table_name
                };
                constraint.constraint_name = generate_name(kind.as_str(), table_name, &constraint.columns);
            }
        }
    }
}

/// Column definitions differ in type, default, or nullability.
fn columns_differ(src: &Column, dest: &Column) -> bool {
    normalize_column_type(&src.column_type) != normalize_column_type(&dest.column_type)
        || normalize_column_default(&src.column_default) != normalize_column_default(&dest.column_default)
        || src.is_not_null != dest.is_not_null
}
