//! Keyed lookup over a [`Catalog`].
//!
//! [`CatalogCache`] maps natural keys to positions in the parent collections
//! of a catalog it does not own. Entities are only ever appended, so a
//! position stays valid for the life of the catalog as long as every append
//! goes through the cache (or the cache is rebuilt afterwards).
//!
//! Lookups skip tombstoned entries (`ignore == true`). Creating or adding
//! under a tombstoned key appends a fresh entity instead of reviving the old
//! one, and the key then points at the new slot.
//!
//! ```
//! use schemata_catalog::cache::CatalogCache;
//! use schemata_catalog::model::Catalog;
//!
//! let mut catalog = Catalog::default();
//! let mut cache = CatalogCache::new(&catalog);
//! let schema = cache.get_or_create_schema(&mut catalog, "main");
//! cache.get_or_create_table(schema, "users");
//!
//! let schema = cache.get_schema(Some(&catalog), "main");
//! assert!(cache.get_table(schema, "users").is_some());
//! ```

use std::collections::HashMap;
use std::hash::Hash;

use crate::model::{
    Catalog, Column, Constraint, ConstraintType, Index, Schema, Table, Trigger, View,
};

type Pair = (String, String);
type Triple = (String, String, String);

fn pair(a: &str, b: &str) -> Pair {
    (a.to_string(), b.to_string())
}

fn triple(a: &str, b: &str, c: &str) -> Triple {
    (a.to_string(), b.to_string(), c.to_string())
}

/// Entities that carry an `ignore` tombstone.
pub trait Tombstoned {
    fn is_ignored(&self) -> bool;
}

macro_rules! impl_tombstoned {
    ($($ty:ty),*) => {
        $(impl Tombstoned for $ty {
            fn is_ignored(&self) -> bool {
                self.ignore
            }
        })*
    };
}

impl_tombstoned!(Schema, View, Table, Column, Constraint, Index, Trigger);

/// Returns the slot if it exists and is not tombstoned.
fn live<T: Tombstoned>(items: &[T], slot: Option<&usize>) -> Option<usize> {
    let &i = slot?;
    items.get(i).filter(|item| !item.is_ignored()).map(|_| i)
}

/// Records `slot` under `key` while indexing a catalog. A tombstoned entry
/// never shadows a live one with the same key.
fn index_slot<K: Eq + Hash, T: Tombstoned>(
    indices: &mut HashMap<K, usize>,
    key: K,
    items: &[T],
    slot: usize,
) {
    let ignored = items.get(slot).is_some_and(Tombstoned::is_ignored);
    if ignored && live(items, indices.get(&key)).is_some() {
        return;
    }
    indices.insert(key, slot);
}

/// Appends `item` and returns its slot.
fn append<T>(items: &mut Vec<T>, item: T) -> usize {
    items.push(item);
    items.len() - 1
}

/// Positions of every catalog entity, keyed by natural key.
#[derive(Debug, Clone, Default)]
pub struct CatalogCache {
    schema_indices: HashMap<String, usize>,
    view_indices: HashMap<Pair, usize>,
    table_indices: HashMap<Pair, usize>,
    column_indices: HashMap<Triple, usize>,
    constraint_indices: HashMap<Triple, usize>,
    index_indices: HashMap<Triple, usize>,
    trigger_indices: HashMap<Triple, usize>,
    primary_key_indices: HashMap<Pair, usize>,
    foreign_key_indices: HashMap<Pair, Vec<usize>>,
}

impl CatalogCache {
    /// Indexes every entity in `catalog`.
    ///
    /// Anonymous constraints are left out of the name index but still
    /// recorded as their table's primary key or foreign keys.
    pub fn new(catalog: &Catalog) -> Self {
        let mut cache = Self::default();
        for (i, schema) in catalog.schemas.iter().enumerate() {
            index_slot(&mut cache.schema_indices, schema.schema_name.clone(), &catalog.schemas, i);
            let sn = &schema.schema_name;
            for (j, view) in schema.views.iter().enumerate() {
                index_slot(&mut cache.view_indices, pair(sn, &view.view_name), &schema.views, j);
            }
            for (j, table) in schema.tables.iter().enumerate() {
                index_slot(&mut cache.table_indices, pair(sn, &table.table_name), &schema.tables, j);
                let (ts, tn) = (&table.table_schema, &table.table_name);
                for (k, column) in table.columns.iter().enumerate() {
                    let key = triple(ts, tn, &column.column_name);
                    index_slot(&mut cache.column_indices, key, &table.columns, k);
                }
                for (k, constraint) in table.constraints.iter().enumerate() {
                    cache.track_constraint_type(table, constraint, k);
                    if !constraint.constraint_name.is_empty() {
                        let key = triple(ts, tn, &constraint.constraint_name);
                        index_slot(&mut cache.constraint_indices, key, &table.constraints, k);
                    }
                }
                for (k, index) in table.indexes.iter().enumerate() {
                    let key = triple(ts, tn, &index.index_name);
                    index_slot(&mut cache.index_indices, key, &table.indexes, k);
                }
                for (k, trigger) in table.triggers.iter().enumerate() {
                    let key = triple(ts, tn, &trigger.trigger_name);
                    index_slot(&mut cache.trigger_indices, key, &table.triggers, k);
                }
            }
        }
        cache
    }

    fn track_constraint_type(&mut self, table: &Table, constraint: &Constraint, slot: usize) {
        let table_id = pair(&table.table_schema, &table.table_name);
        match constraint.constraint_type {
            Some(ConstraintType::PrimaryKey) => {
                self.primary_key_indices.insert(table_id, slot);
            }
            Some(ConstraintType::ForeignKey) => {
                let slots = self.foreign_key_indices.entry(table_id).or_default();
                if !slots.contains(&slot) {
                    slots.push(slot);
                }
            }
            _ => {}
        }
    }

    // ── Schemas ─────────────────────────────────────────────────────

    pub fn get_schema<'a>(&self, catalog: Option<&'a Catalog>, schema_name: &str) -> Option<&'a Schema> {
        let catalog = catalog?;
        let i = live(&catalog.schemas, self.schema_indices.get(schema_name))?;
        catalog.schemas.get(i)
    }

    pub fn get_schema_mut<'a>(
        &self,
        catalog: &'a mut Catalog,
        schema_name: &str,
    ) -> Option<&'a mut Schema> {
        let i = live(&catalog.schemas, self.schema_indices.get(schema_name))?;
        catalog.schemas.get_mut(i)
    }

    pub fn get_or_create_schema<'a>(
        &mut self,
        catalog: &'a mut Catalog,
        schema_name: &str,
    ) -> &'a mut Schema {
        let i = match live(&catalog.schemas, self.schema_indices.get(schema_name)) {
            Some(i) => i,
            None => {
                let i = append(&mut catalog.schemas, Schema::new(schema_name));
                self.schema_indices.insert(schema_name.to_string(), i);
                i
            }
        };
        &mut catalog.schemas[i]
    }

    pub fn add_or_update_schema(&mut self, catalog: &mut Catalog, schema: Schema) {
        if let Some(i) = live(&catalog.schemas, self.schema_indices.get(&schema.schema_name)) {
            catalog.schemas[i] = schema;
            return;
        }
        let name = schema.schema_name.clone();
        let i = append(&mut catalog.schemas, schema);
        self.schema_indices.insert(name, i);
    }

    // ── Views ───────────────────────────────────────────────────────

    pub fn get_view<'a>(&self, schema: Option<&'a Schema>, view_name: &str) -> Option<&'a View> {
        let schema = schema?;
        let key = pair(&schema.schema_name, view_name);
        let i = live(&schema.views, self.view_indices.get(&key))?;
        schema.views.get(i)
    }

    pub fn get_view_mut<'a>(&self, schema: &'a mut Schema, view_name: &str) -> Option<&'a mut View> {
        let key = pair(&schema.schema_name, view_name);
        let i = live(&schema.views, self.view_indices.get(&key))?;
        schema.views.get_mut(i)
    }

    pub fn get_or_create_view<'a>(&mut self, schema: &'a mut Schema, view_name: &str) -> &'a mut View {
        let key = pair(&schema.schema_name, view_name);
        let i = match live(&schema.views, self.view_indices.get(&key)) {
            Some(i) => i,
            None => {
                let view = View::new(schema.schema_name.clone(), view_name);
                let i = append(&mut schema.views, view);
                self.view_indices.insert(key, i);
                i
            }
        };
        &mut schema.views[i]
    }

    pub fn add_or_update_view(&mut self, schema: &mut Schema, view: View) {
        let key = pair(&schema.schema_name, &view.view_name);
        if let Some(i) = live(&schema.views, self.view_indices.get(&key)) {
            schema.views[i] = view;
            return;
        }
        let i = append(&mut schema.views, view);
        self.view_indices.insert(key, i);
    }

    // ── Tables ──────────────────────────────────────────────────────

    pub fn get_table<'a>(&self, schema: Option<&'a Schema>, table_name: &str) -> Option<&'a Table> {
        let schema = schema?;
        let key = pair(&schema.schema_name, table_name);
        let i = live(&schema.tables, self.table_indices.get(&key))?;
        schema.tables.get(i)
    }

    pub fn get_table_mut<'a>(&self, schema: &'a mut Schema, table_name: &str) -> Option<&'a mut Table> {
        let key = pair(&schema.schema_name, table_name);
        let i = live(&schema.tables, self.table_indices.get(&key))?;
        schema.tables.get_mut(i)
    }

    pub fn get_or_create_table<'a>(&mut self, schema: &'a mut Schema, table_name: &str) -> &'a mut Table {
        let key = pair(&schema.schema_name, table_name);
        let i = match live(&schema.tables, self.table_indices.get(&key)) {
            Some(i) => i,
            None => {
                let table = Table::new(schema.schema_name.clone(), table_name);
                let i = append(&mut schema.tables, table);
                self.table_indices.insert(key, i);
                i
            }
        };
        &mut schema.tables[i]
    }

    pub fn add_or_update_table(&mut self, schema: &mut Schema, table: Table) {
        let key = pair(&schema.schema_name, &table.table_name);
        if let Some(i) = live(&schema.tables, self.table_indices.get(&key)) {
            schema.tables[i] = table;
            return;
        }
        let i = append(&mut schema.tables, table);
        self.table_indices.insert(key, i);
    }

    // ── Columns ─────────────────────────────────────────────────────

    pub fn get_column<'a>(&self, table: Option<&'a Table>, column_name: &str) -> Option<&'a Column> {
        let table = table?;
        let key = triple(&table.table_schema, &table.table_name, column_name);
        let i = live(&table.columns, self.column_indices.get(&key))?;
        table.columns.get(i)
    }

    pub fn get_column_mut<'a>(&self, table: &'a mut Table, column_name: &str) -> Option<&'a mut Column> {
        let key = triple(&table.table_schema, &table.table_name, column_name);
        let i = live(&table.columns, self.column_indices.get(&key))?;
        table.columns.get_mut(i)
    }

    pub fn get_or_create_column<'a>(&mut self, table: &'a mut Table, column_name: &str) -> &'a mut Column {
        let key = triple(&table.table_schema, &table.table_name, column_name);
        let i = match live(&table.columns, self.column_indices.get(&key)) {
            Some(i) => i,
            None => {
                let column = Column::new(
                    table.table_schema.clone(),
                    table.table_name.clone(),
                    column_name,
                );
                let i = append(&mut table.columns, column);
                self.column_indices.insert(key, i);
                i
            }
        };
        &mut table.columns[i]
    }

    pub fn add_or_update_column(&mut self, table: &mut Table, column: Column) {
        let key = triple(&table.table_schema, &table.table_name, &column.column_name);
        if let Some(i) = live(&table.columns, self.column_indices.get(&key)) {
            table.columns[i] = column;
            return;
        }
        let i = append(&mut table.columns, column);
        self.column_indices.insert(key, i);
    }

    // ── Constraints ─────────────────────────────────────────────────

    /// Looks up a named constraint. Anonymous constraints are never found by
    /// name; use [`CatalogCache::get_primary_key`] or
    /// [`CatalogCache::get_foreign_keys`].
    pub fn get_constraint<'a>(
        &self,
        table: Option<&'a Table>,
        constraint_name: &str,
    ) -> Option<&'a Constraint> {
        let table = table?;
        let key = triple(&table.table_schema, &table.table_name, constraint_name);
        let i = live(&table.constraints, self.constraint_indices.get(&key))?;
        table.constraints.get(i)
    }

    pub fn get_constraint_mut<'a>(
        &self,
        table: &'a mut Table,
        constraint_name: &str,
    ) -> Option<&'a mut Constraint> {
        let key = triple(&table.table_schema, &table.table_name, constraint_name);
        let i = live(&table.constraints, self.constraint_indices.get(&key))?;
        table.constraints.get_mut(i)
    }

    pub fn get_or_create_constraint<'a>(
        &mut self,
        table: &'a mut Table,
        constraint_name: &str,
    ) -> &'a mut Constraint {
        let key = triple(&table.table_schema, &table.table_name, constraint_name);
        let i = match live(&table.constraints, self.constraint_indices.get(&key)) {
            Some(i) => i,
            None => {
                let constraint = Constraint::new(
                    table.table_schema.clone(),
                    table.table_name.clone(),
                    constraint_name,
                );
                let i = append(&mut table.constraints, constraint);
                if !constraint_name.is_empty() {
                    self.constraint_indices.insert(key, i);
                }
                i
            }
        };
        &mut table.constraints[i]
    }

    /// Adds or replaces a constraint, keeping the per-table primary key and
    /// foreign key indices current.
    pub fn add_or_update_constraint(&mut self, table: &mut Table, constraint: Constraint) {
        let key = triple(
            &table.table_schema,
            &table.table_name,
            &constraint.constraint_name,
        );
        let existing = if constraint.constraint_name.is_empty() {
            None
        } else {
            live(&table.constraints, self.constraint_indices.get(&key))
        };
        let i = match existing {
            Some(i) => {
                table.constraints[i] = constraint;
                i
            }
            None => {
                let named = !constraint.constraint_name.is_empty();
                let i = append(&mut table.constraints, constraint);
                if named {
                    self.constraint_indices.insert(key, i);
                }
                i
            }
        };
        let table_ref: &Table = table;
        self.track_constraint_type(table_ref, &table_ref.constraints[i], i);
    }

    /// Returns the table's live primary key constraint.
    pub fn get_primary_key<'a>(&self, table: Option<&'a Table>) -> Option<&'a Constraint> {
        let table = table?;
        let key = pair(&table.table_schema, &table.table_name);
        let i = live(&table.constraints, self.primary_key_indices.get(&key))?;
        table
            .constraints
            .get(i)
            .filter(|c| c.is_type(ConstraintType::PrimaryKey))
    }

    /// Returns the table's live foreign key constraints in the order they
    /// were added.
    pub fn get_foreign_keys<'a>(&self, table: Option<&'a Table>) -> Vec<&'a Constraint> {
        let Some(table) = table else {
            return Vec::new();
        };
        let key = pair(&table.table_schema, &table.table_name);
        let Some(slots) = self.foreign_key_indices.get(&key) else {
            return Vec::new();
        };
        slots
            .iter()
            .filter_map(|&i| table.constraints.get(i))
            .filter(|c| !c.ignore && c.is_type(ConstraintType::ForeignKey))
            .collect()
    }

    // ── Indexes ─────────────────────────────────────────────────────

    pub fn get_index<'a>(&self, table: Option<&'a Table>, index_name: &str) -> Option<&'a Index> {
        let table = table?;
        let key = triple(&table.table_schema, &table.table_name, index_name);
        let i = live(&table.indexes, self.index_indices.get(&key))?;
        table.indexes.get(i)
    }

    pub fn get_index_mut<'a>(&self, table: &'a mut Table, index_name: &str) -> Option<&'a mut Index> {
        let key = triple(&table.table_schema, &table.table_name, index_name);
        let i = live(&table.indexes, self.index_indices.get(&key))?;
        table.indexes.get_mut(i)
    }

    pub fn get_or_create_index<'a>(&mut self, table: &'a mut Table, index_name: &str) -> &'a mut Index {
        let key = triple(&table.table_schema, &table.table_name, index_name);
        let i = match live(&table.indexes, self.index_indices.get(&key)) {
            Some(i) => i,
            None => {
                let index = Index::new(
                    table.table_schema.clone(),
                    table.table_name.clone(),
                    index_name,
                );
                let i = append(&mut table.indexes, index);
                self.index_indices.insert(key, i);
                i
            }
        };
        &mut table.indexes[i]
    }

    pub fn add_or_update_index(&mut self, table: &mut Table, index: Index) {
        let key = triple(&table.table_schema, &table.table_name, &index.index_name);
        if let Some(i) = live(&table.indexes, self.index_indices.get(&key)) {
            table.indexes[i] = index;
            return;
        }
        let i = append(&mut table.indexes, index);
        self.index_indices.insert(key, i);
    }

    // ── Triggers ────────────────────────────────────────────────────

    pub fn get_trigger<'a>(&self, table: Option<&'a Table>, trigger_name: &str) -> Option<&'a Trigger> {
        let table = table?;
        let key = triple(&table.table_schema, &table.table_name, trigger_name);
        let i = live(&table.triggers, self.trigger_indices.get(&key))?;
        table.triggers.get(i)
    }

    pub fn get_trigger_mut<'a>(
        &self,
        table: &'a mut Table,
        trigger_name: &str,
    ) -> Option<&'a mut Trigger> {
        let key = triple(&table.table_schema, &table.table_name, trigger_name);
        let i = live(&table.triggers, self.trigger_indices.get(&key))?;
        table.triggers.get_mut(i)
    }

    pub fn get_or_create_trigger<'a>(
        &mut self,
        table: &'a mut Table,
        trigger_name: &str,
    ) -> &'a mut Trigger {
        let key = triple(&table.table_schema, &table.table_name, trigger_name);
        let i = match live(&table.triggers, self.trigger_indices.get(&key)) {
            Some(i) => i,
            None => {
                let trigger = Trigger::new(
                    table.table_schema.clone(),
                    table.table_name.clone(),
                    trigger_name,
                );
                let i = append(&mut table.triggers, trigger);
                self.trigger_indices.insert(key, i);
                i
            }
        };
        &mut table.triggers[i]
    }

    pub fn add_or_update_trigger(&mut self, table: &mut Table, trigger: Trigger) {
        let key = triple(&table.table_schema, &table.table_name, &trigger.trigger_name);
        if let Some(i) = live(&table.triggers, self.trigger_indices.get(&key)) {
            table.triggers[i] = trigger;
            return;
        }
        let i = append(&mut table.triggers, trigger);
        self.trigger_indices.insert(key, i);
    }
}

impl From<&Catalog> for CatalogCache {
    fn from(catalog: &Catalog) -> Self {
        Self::new(catalog)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog_with_users() -> (Catalog, CatalogCache) {
        let mut catalog = Catalog::default();
        let mut cache = CatalogCache::new(&catalog);
        let schema = cache.get_or_create_schema(&mut catalog, "main");
        let table = cache.get_or_create_table(schema, "users");
        cache.get_or_create_column(table, "id").column_type = "INTEGER".into();
        cache.get_or_create_column(table, "email").column_type = "TEXT".into();
        (catalog, cache)
    }

    fn users(catalog: &Catalog) -> &Table {
        &catalog.schemas[0].tables[0]
    }

    // ── Build ───────────────────────────────────────────────────────

    #[test]
    fn test_new_indexes_existing_catalog() {
        let (catalog, _) = catalog_with_users();
        let cache = CatalogCache::new(&catalog);
        let schema = cache.get_schema(Some(&catalog), "main");
        let table = cache.get_table(schema, "users");
        assert_eq!(cache.get_column(table, "email").unwrap().column_type, "TEXT");
        assert!(cache.get_column(table, "missing").is_none());
    }

    #[test]
    fn test_absent_parent_returns_none() {
        let cache = CatalogCache::default();
        assert!(cache.get_schema(None, "main").is_none());
        assert!(cache.get_table(None, "t").is_none());
        assert!(cache.get_column(None, "c").is_none());
        assert!(cache.get_primary_key(None).is_none());
        assert!(cache.get_foreign_keys(None).is_empty());
    }

    // ── get_or_create ───────────────────────────────────────────────

    #[test]
    fn test_get_or_create_fills_parent_keys() {
        let (catalog, _) = catalog_with_users();
        let column = &users(&catalog).columns[1];
        assert_eq!(column.table_schema, "main");
        assert_eq!(column.table_name, "users");
        assert_eq!(column.column_name, "email");
    }

    #[test]
    fn test_get_or_create_returns_existing() {
        let (mut catalog, mut cache) = catalog_with_users();
        let schema = cache.get_or_create_schema(&mut catalog, "main");
        let table = cache.get_or_create_table(schema, "users");
        let column = cache.get_or_create_column(table, "id");
        assert_eq!(column.column_type, "INTEGER");
        assert_eq!(catalog.schemas.len(), 1);
        assert_eq!(users(&catalog).columns.len(), 2);
    }

    #[test]
    fn test_get_or_create_does_not_disturb_other_entries() {
        let (mut catalog, mut cache) = catalog_with_users();
        let schema = cache.get_schema_mut(&mut catalog, "main").unwrap();
        let orders = cache.get_or_create_table(schema, "orders");
        cache.get_or_create_column(orders, "id");

        let schema = cache.get_schema(Some(&catalog), "main");
        let users = cache.get_table(schema, "users");
        assert_eq!(cache.get_column(users, "id").unwrap().table_name, "users");
        let orders = cache.get_table(schema, "orders");
        assert_eq!(cache.get_column(orders, "id").unwrap().table_name, "orders");
    }

    // ── add_or_update ───────────────────────────────────────────────

    #[test]
    fn test_add_or_update_replaces_in_place() {
        let (mut catalog, mut cache) = catalog_with_users();
        let table = &mut catalog.schemas[0].tables[0];
        let replacement = Column::new("main", "users", "id").column_type("BIGINT");
        cache.add_or_update_column(table, replacement);
        assert_eq!(table.columns.len(), 2);
        assert_eq!(table.columns[0].column_type, "BIGINT");
    }

    #[test]
    fn test_add_or_update_then_get() {
        let mut catalog = Catalog::default();
        let mut cache = CatalogCache::default();
        cache.add_or_update_schema(&mut catalog, Schema::new("main"));
        let schema = cache.get_schema_mut(&mut catalog, "main").unwrap();
        cache.add_or_update_view(schema, View::new("main", "v"));
        cache.add_or_update_table(schema, Table::new("main", "t"));
        let table = cache.get_table_mut(schema, "t").unwrap();
        cache.add_or_update_index(table, Index::new("main", "t", "t_idx"));
        cache.add_or_update_trigger(table, Trigger::new("main", "t", "t_trg"));

        let schema = cache.get_schema(Some(&catalog), "main");
        assert_eq!(cache.get_view(schema, "v").unwrap().view_name, "v");
        let table = cache.get_table(schema, "t");
        assert_eq!(cache.get_index(table, "t_idx").unwrap().index_name, "t_idx");
        assert_eq!(cache.get_trigger(table, "t_trg").unwrap().trigger_name, "t_trg");
    }

    // ── Tombstones ──────────────────────────────────────────────────

    #[test]
    fn test_tombstoned_entity_is_hidden_but_present() {
        let (mut catalog, cache) = catalog_with_users();
        catalog.schemas[0].tables[0].columns[1].ignore = true;

        let schema = cache.get_schema(Some(&catalog), "main");
        let table = cache.get_table(schema, "users");
        assert!(cache.get_column(table, "email").is_none());
        assert_eq!(users(&catalog).columns[1].column_name, "email");
    }

    #[test]
    fn test_get_or_create_on_tombstone_appends_fresh_entry() {
        let (mut catalog, mut cache) = catalog_with_users();
        catalog.schemas[0].tables[0].columns[1].ignore = true;

        let table = &mut catalog.schemas[0].tables[0];
        let fresh = cache.get_or_create_column(table, "email");
        assert!(!fresh.ignore);
        assert!(fresh.column_type.is_empty());

        let table = users(&catalog);
        assert_eq!(table.columns.len(), 3);
        assert!(table.columns[1].ignore);
        let found = cache.get_column(Some(table), "email").unwrap();
        assert!(std::ptr::eq(found, &table.columns[2]));
    }

    #[test]
    fn test_add_or_update_on_tombstone_appends() {
        let (mut catalog, mut cache) = catalog_with_users();
        catalog.schemas[0].tables[0].ignore = true;
        let schema = &mut catalog.schemas[0];
        cache.add_or_update_table(schema, Table::new("main", "users"));
        assert_eq!(schema.tables.len(), 2);
        let found = cache.get_table(Some(schema), "users").unwrap();
        assert!(std::ptr::eq(found, &schema.tables[1]));
    }

    #[test]
    fn test_rebuild_keeps_live_entry_over_later_tombstone() {
        let (mut catalog, _) = catalog_with_users();
        let table = &mut catalog.schemas[0].tables[0];
        let mut stale = Column::new("main", "users", "email");
        stale.ignore = true;
        table.columns.push(stale);
        table.constraints.push(
            Constraint::new("main", "users", "users_email_key").of_type(ConstraintType::Unique, ["email"]),
        );
        let mut stale_unique =
            Constraint::new("main", "users", "users_email_key").of_type(ConstraintType::Unique, ["email"]);
        stale_unique.ignore = true;
        table.constraints.push(stale_unique);

        let cache = CatalogCache::new(&catalog);
        let table = users(&catalog);
        let column = cache.get_column(Some(table), "email").unwrap();
        assert!(std::ptr::eq(column, &table.columns[1]));
        let unique = cache.get_constraint(Some(table), "users_email_key").unwrap();
        assert!(std::ptr::eq(unique, &table.constraints[0]));
    }

    #[test]
    fn test_rebuild_prefers_live_entry_after_tombstone() {
        let (mut catalog, _) = catalog_with_users();
        let table = &mut catalog.schemas[0].tables[0];
        table.columns[1].ignore = true;
        table.columns.push(Column::new("main", "users", "email").column_type("VARCHAR(255)"));

        let cache = CatalogCache::new(&catalog);
        let column = cache.get_column(Some(users(&catalog)), "email").unwrap();
        assert_eq!(column.column_type, "VARCHAR(255)");
    }

    #[test]
    fn test_tombstoned_schema() {
        let (mut catalog, mut cache) = catalog_with_users();
        catalog.schemas[0].ignore = true;
        assert!(cache.get_schema(Some(&catalog), "main").is_none());
        cache.get_or_create_schema(&mut catalog, "main");
        assert_eq!(catalog.schemas.len(), 2);
    }

    // ── Constraints ─────────────────────────────────────────────────

    #[test]
    fn test_anonymous_constraints_tracked_by_type() {
        let (mut catalog, mut cache) = catalog_with_users();
        let table = &mut catalog.schemas[0].tables[0];
        cache.add_or_update_constraint(
            table,
            Constraint::new("main", "users", "").of_type(ConstraintType::PrimaryKey, ["id"]),
        );
        cache.add_or_update_constraint(
            table,
            Constraint::new("main", "users", "").of_type(ConstraintType::Unique, ["email"]),
        );
        assert_eq!(table.constraints.len(), 2);
        assert!(cache.get_constraint(Some(table), "").is_none());
        let pk = cache.get_primary_key(Some(table)).unwrap();
        assert_eq!(pk.columns, vec!["id"]);
    }

    #[test]
    fn test_get_foreign_keys_only_live_in_add_order() {
        let (mut catalog, mut cache) = catalog_with_users();
        let table = &mut catalog.schemas[0].tables[0];
        cache.add_or_update_constraint(
            table,
            Constraint::new("main", "users", "").of_type(ConstraintType::PrimaryKey, ["id"]),
        );
        for (name, target) in [("fk_a", "a"), ("fk_b", "b"), ("fk_c", "c")] {
            cache.add_or_update_constraint(
                table,
                Constraint::new("main", "users", name)
                    .of_type(ConstraintType::ForeignKey, ["id"])
                    .references(target, ["id"]),
            );
        }
        cache.add_or_update_constraint(
            table,
            Constraint::new("main", "users", "uq").of_type(ConstraintType::Unique, ["email"]),
        );
        cache.get_constraint_mut(table, "fk_b").unwrap().ignore = true;

        let fks = cache.get_foreign_keys(Some(table));
        let targets: Vec<&str> = fks.iter().map(|c| c.references_table.as_str()).collect();
        assert_eq!(targets, vec!["a", "c"]);
    }

    #[test]
    fn test_replacing_foreign_key_does_not_duplicate() {
        let (mut catalog, mut cache) = catalog_with_users();
        let table = &mut catalog.schemas[0].tables[0];
        let fk = Constraint::new("main", "users", "fk")
            .of_type(ConstraintType::ForeignKey, ["id"])
            .references("a", ["id"]);
        cache.add_or_update_constraint(table, fk.clone());
        cache.add_or_update_constraint(table, fk.references("b", ["id"]));
        let fks = cache.get_foreign_keys(Some(table));
        assert_eq!(fks.len(), 1);
        assert_eq!(fks[0].references_table, "b");
    }

    #[test]
    fn test_tombstoned_primary_key_is_hidden() {
        let (mut catalog, mut cache) = catalog_with_users();
        let table = &mut catalog.schemas[0].tables[0];
        cache.add_or_update_constraint(
            table,
            Constraint::new("main", "users", "").of_type(ConstraintType::PrimaryKey, ["id"]),
        );
        table.constraints[0].ignore = true;
        assert!(cache.get_primary_key(Some(table)).is_none());
    }

    #[test]
    fn test_cache_built_from_catalog_tracks_keys() {
        let (mut catalog, mut cache) = catalog_with_users();
        let table = &mut catalog.schemas[0].tables[0];
        cache.add_or_update_constraint(
            table,
            Constraint::new("main", "users", "").of_type(ConstraintType::PrimaryKey, ["id"]),
        );
        cache.add_or_update_constraint(
            table,
            Constraint::new("main", "users", "users_org_fkey")
                .of_type(ConstraintType::ForeignKey, ["org_id"])
                .references("orgs", ["id"]),
        );

        let rebuilt = CatalogCache::from(&catalog);
        let table = Some(users(&catalog));
        assert!(rebuilt.get_primary_key(table).is_some());
        assert_eq!(rebuilt.get_foreign_keys(table).len(), 1);
        assert!(rebuilt.get_constraint(table, "users_org_fkey").is_some());
    }
}
